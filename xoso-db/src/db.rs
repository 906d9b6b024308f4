use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::{Draw, Game, Session};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    game         TEXT NOT NULL,
    date         TEXT NOT NULL,
    session      TEXT NOT NULL DEFAULT '',
    numbers      TEXT NOT NULL,
    special      TEXT NOT NULL DEFAULT '',
    source       TEXT NOT NULL DEFAULT '',
    key_session  TEXT NOT NULL DEFAULT '',
    key_numbers  TEXT NOT NULL DEFAULT '',
    key_special  TEXT NOT NULL DEFAULT '',
    UNIQUE (game, date, key_session, key_numbers, key_special)
);
CREATE INDEX IF NOT EXISTS draws_game_date ON draws (game, date);
";

/// Ordre chronologique ; '' < '13' < '21' < '?' suit l'ordre de `Session`.
const CHRONO_DESC: &str = "ORDER BY date DESC, session DESC, id DESC";

pub fn data_dir() -> PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path
}

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("xoso.db")
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

fn join_numbers(numbers: &[String]) -> String {
    numbers.join(" ")
}

fn session_text(session: Option<Session>) -> &'static str {
    session.map(|s| s.as_str()).unwrap_or("")
}

/// Insère un tirage s'il est absent (clé naturelle du jeu). Retourne `false` pour un doublon.
pub fn insert_draw(conn: &Connection, game: Game, draw: &Draw) -> Result<bool> {
    let key = game.natural_key(draw);
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (game, date, session, numbers, special, source, key_session, key_numbers, key_special)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            game.id(),
            draw.date,
            session_text(draw.session),
            join_numbers(&draw.numbers),
            draw.special.as_deref().unwrap_or(""),
            draw.source,
            session_text(key.session),
            join_numbers(&key.numbers),
            key.special.as_deref().unwrap_or(""),
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

struct RawDraw {
    date: NaiveDate,
    session: String,
    numbers: String,
    special: String,
    source: String,
}

impl RawDraw {
    fn into_draw(self) -> Result<Draw> {
        let session = if self.session.is_empty() {
            None
        } else {
            Some(self.session.parse::<Session>()?)
        };
        Ok(Draw {
            date: self.date,
            session,
            numbers: self.numbers.split_whitespace().map(str::to_string).collect(),
            special: (!self.special.is_empty()).then_some(self.special),
            source: self.source,
        })
    }
}

/// Les `limit` tirages les plus récents d'un jeu, en ordre chronologique.
/// Les lignes illisibles sont ignorées.
pub fn fetch_draws(conn: &Connection, game: Game, limit: u32) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT date, session, numbers, special, source
         FROM draws WHERE game = ?1 {CHRONO_DESC} LIMIT ?2"
    ))?;
    let rows = stmt.query_map(rusqlite::params![game.id(), limit], |row| {
        Ok(RawDraw {
            date: row.get(0)?,
            session: row.get(1)?,
            numbers: row.get(2)?,
            special: row.get(3)?,
            source: row.get(4)?,
        })
    })?;

    let mut draws = Vec::new();
    for row in rows {
        match row.map_err(anyhow::Error::from).and_then(RawDraw::into_draw) {
            Ok(draw) => draws.push(draw),
            Err(e) => warn!(game = game.id(), error = %e, "ligne d'historique ignorée"),
        }
    }
    draws.reverse();
    Ok(draws)
}

pub fn count_draws(conn: &Connection, game: Game) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM draws WHERE game = ?1",
        [game.id()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn latest_date(conn: &Connection, game: Game) -> Result<Option<NaiveDate>> {
    let date = conn
        .query_row(
            "SELECT MAX(date) FROM draws WHERE game = ?1",
            [game.id()],
            |row| row.get::<_, Option<NaiveDate>>(0),
        )
        .optional()?
        .flatten();
    Ok(date)
}

pub fn draw_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM draws WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Ne conserve que les `cap` tirages les plus récents du jeu.
pub fn prune(conn: &Connection, game: Game, cap: usize) -> Result<usize> {
    let removed = conn.execute(
        &format!(
            "DELETE FROM draws WHERE game = ?1 AND id NOT IN (
                SELECT id FROM draws WHERE game = ?1 {CHRONO_DESC} LIMIT ?2
            )"
        ),
        rusqlite::params![game.id(), cap as i64],
    ).context("Échec de la purge")?;
    Ok(removed)
}
