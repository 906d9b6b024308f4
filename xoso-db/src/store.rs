use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::db::{draw_exists, fetch_draws, insert_draw, migrate, prune};
use crate::models::{Draw, Game, History, HistoryCaps};

/// Fournisseur d'historique par jeu : ajout idempotent par clé naturelle.
pub trait HistoryStore {
    fn load(&self, game: Game) -> Result<History>;
    /// Retourne `false` si le tirage était déjà connu.
    fn append(&self, game: Game, draw: &Draw) -> Result<bool>;
    fn save(&self, history: &History) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
    caps: HistoryCaps,
}

impl SqliteStore {
    pub fn new(conn: Connection, caps: HistoryCaps) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self { conn, caps })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl HistoryStore for SqliteStore {
    fn load(&self, game: Game) -> Result<History> {
        let cap = self.caps.get(game);
        let limit = u32::try_from(cap).unwrap_or(u32::MAX);
        let draws = fetch_draws(&self.conn, game, limit)
            .with_context(|| format!("Lecture de l'historique {}", game.label()))?;
        Ok(History::from_draws(game, cap, draws))
    }

    fn append(&self, game: Game, draw: &Draw) -> Result<bool> {
        if !insert_draw(&self.conn, game, draw)? {
            return Ok(false);
        }
        let id = self.conn.last_insert_rowid();
        prune(&self.conn, game, self.caps.get(game))?;
        // Historique plein et tirage plus ancien que tous les autres : aussitôt purgé
        let kept = draw_exists(&self.conn, id)?;
        if !kept {
            debug!(game = game.id(), date = %draw.date, "tirage hors de l'historique conservé");
        }
        Ok(kept)
    }

    fn save(&self, history: &History) -> Result<()> {
        let game = history.game();
        let tx = self.conn.unchecked_transaction()
            .context("Impossible de démarrer la transaction")?;
        let mut inserted = 0usize;
        for draw in history.draws() {
            if insert_draw(&tx, game, draw)? {
                inserted += 1;
            }
        }
        let removed = prune(&tx, game, self.caps.get(game))?;
        tx.commit().context("Échec du commit")?;
        debug!(game = game.id(), inserted, removed, "historique enregistré");
        Ok(())
    }
}

/// Stockage en mémoire, sans persistance.
#[derive(Default)]
pub struct MemoryStore {
    caps: HistoryCaps,
    histories: RefCell<BTreeMap<Game, History>>,
}

impl MemoryStore {
    pub fn new(caps: HistoryCaps) -> Self {
        Self {
            caps,
            histories: RefCell::new(BTreeMap::new()),
        }
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self, game: Game) -> Result<History> {
        Ok(self
            .histories
            .borrow()
            .get(&game)
            .cloned()
            .unwrap_or_else(|| History::new(game, self.caps.get(game))))
    }

    fn append(&self, game: Game, draw: &Draw) -> Result<bool> {
        let cap = self.caps.get(game);
        let mut histories = self.histories.borrow_mut();
        let history = histories.entry(game).or_insert_with(|| History::new(game, cap));
        Ok(history.append(draw.clone()))
    }

    fn save(&self, history: &History) -> Result<()> {
        let game = history.game();
        let cap = self.caps.get(game);
        let mut histories = self.histories.borrow_mut();
        let stored = histories.entry(game).or_insert_with(|| History::new(game, cap));
        for draw in history.draws() {
            stored.append(draw.clone());
        }
        Ok(())
    }
}
