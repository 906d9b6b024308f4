use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Xsmb,
    Mega,
    Power,
    Max3d,
    L535,
}

impl Game {
    pub const ALL: [Game; 5] = [Game::Xsmb, Game::Mega, Game::Power, Game::Max3d, Game::L535];

    pub fn id(&self) -> &'static str {
        match self {
            Game::Xsmb => "xsmb",
            Game::Mega => "mega",
            Game::Power => "power",
            Game::Max3d => "max3d",
            Game::L535 => "l535",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Game::Xsmb => "XSMB",
            Game::Mega => "Mega 6/45",
            Game::Power => "Power 6/55",
            Game::Max3d => "Max 3D",
            Game::L535 => "Lotto 5/35",
        }
    }

    /// Plage légale des numéros tirés.
    pub fn domain(&self) -> Domain {
        match self {
            Game::Xsmb => Domain::new(0, 99, 2),
            Game::Mega => Domain::new(1, 45, 2),
            Game::Power => Domain::new(1, 55, 2),
            Game::Max3d => Domain::new(0, 999, 3),
            Game::L535 => Domain::new(1, 35, 2),
        }
    }

    /// Nombre exact de numéros par tirage, `None` pour les jeux à liste libre.
    pub fn pick_count(&self) -> Option<usize> {
        match self {
            Game::Mega | Game::Power => Some(6),
            Game::L535 => Some(5),
            Game::Xsmb | Game::Max3d => None,
        }
    }

    pub fn special_domain(&self) -> Option<Domain> {
        match self {
            Game::Power => Some(Domain::new(1, 55, 2)),
            Game::L535 => Some(Domain::new(1, 12, 2)),
            _ => None,
        }
    }

    pub fn requires_special(&self) -> bool {
        matches!(self, Game::L535)
    }

    pub fn has_sessions(&self) -> bool {
        matches!(self, Game::L535)
    }

    /// Clé naturelle de déduplication.
    ///
    /// XSMB : un tirage par jour, clé = date. Mega, Power, Max 3D : date + numéros.
    /// Lotto 5/35 : date + session + numéros + numéro spécial.
    pub fn natural_key(&self, draw: &Draw) -> DrawKey {
        match self {
            Game::Xsmb => DrawKey {
                date: draw.date,
                session: None,
                numbers: Vec::new(),
                special: None,
            },
            Game::Mega | Game::Power | Game::Max3d => DrawKey {
                date: draw.date,
                session: None,
                numbers: draw.numbers.clone(),
                special: None,
            },
            Game::L535 => DrawKey {
                date: draw.date,
                session: draw.session,
                numbers: draw.numbers.clone(),
                special: draw.special.clone(),
            },
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Game {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "xsmb" => Ok(Game::Xsmb),
            "mega" | "6/45" => Ok(Game::Mega),
            "power" | "6/55" => Ok(Game::Power),
            "max3d" => Ok(Game::Max3d),
            "l535" | "5/35" => Ok(Game::L535),
            other => bail!("Jeu inconnu : '{}' (xsmb, mega, power, max3d, l535)", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
    pub min: u16,
    pub max: u16,
    pub width: usize,
}

impl Domain {
    pub const fn new(min: u16, max: u16, width: usize) -> Self {
        Self { min, max, width }
    }

    pub fn size(&self) -> usize {
        (self.max - self.min + 1) as usize
    }

    pub fn format(&self, n: u16) -> String {
        format!("{:0width$}", n, width = self.width)
    }

    /// Tous les numéros légaux, formatés, en ordre croissant.
    pub fn numbers(&self) -> Vec<String> {
        (self.min..=self.max).map(|n| self.format(n)).collect()
    }

    pub fn contains(&self, s: &str) -> bool {
        s.len() == self.width
            && s.bytes().all(|b| b.is_ascii_digit())
            && s.parse::<u16>().is_ok_and(|n| n >= self.min && n <= self.max)
    }

    /// Parse un numéro brut (« 7 », « 07 ») et le complète par des zéros.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        let n: u16 = raw
            .parse()
            .with_context(|| format!("Numéro invalide : '{}'", raw))?;
        if n < self.min || n > self.max {
            bail!("Numéro {} hors limites ({}-{})", n, self.format(self.min), self.format(self.max));
        }
        Ok(self.format(n))
    }
}

/// Séance de tirage pour les jeux à plusieurs tirages par jour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Session {
    #[serde(rename = "13")]
    Midday,
    #[serde(rename = "21")]
    Evening,
    #[serde(rename = "?")]
    Unknown,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Midday => "13",
            Session::Evening => "21",
            Session::Unknown => "?",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Session {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.as_str() {
            "13" => Ok(Session::Midday),
            "21" => Ok(Session::Evening),
            "" => Ok(Session::Unknown),
            other => bail!("Séance inconnue : '{}' (13, 21)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    pub numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<String>,
    pub source: String,
}

/// Clé naturelle composite, comparée champ par champ dans l'ordre :
/// date, session, numéros, numéro spécial. Les champs qu'un jeu n'utilise
/// pas restent vides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawKey {
    pub date: NaiveDate,
    pub session: Option<Session>,
    pub numbers: Vec<String>,
    pub special: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryCaps {
    pub xsmb: usize,
    pub mega: usize,
    pub power: usize,
    pub max3d: usize,
    pub l535: usize,
}

impl Default for HistoryCaps {
    fn default() -> Self {
        Self {
            xsmb: 120,
            mega: 400,
            power: 400,
            max3d: 400,
            l535: 600,
        }
    }
}

impl HistoryCaps {
    pub fn get(&self, game: Game) -> usize {
        match game {
            Game::Xsmb => self.xsmb,
            Game::Mega => self.mega,
            Game::Power => self.power,
            Game::Max3d => self.max3d,
            Game::L535 => self.l535,
        }
    }
}

/// Historique d'un jeu, trié par date, sans doublon de clé naturelle et
/// borné à `cap` tirages (les plus anciens sont supprimés en premier).
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    game: Game,
    cap: usize,
    draws: Vec<Draw>,
}

impl History {
    pub fn new(game: Game, cap: usize) -> Self {
        Self {
            game,
            cap,
            draws: Vec::new(),
        }
    }

    pub fn from_draws(game: Game, cap: usize, draws: impl IntoIterator<Item = Draw>) -> Self {
        let mut history = Self::new(game, cap);
        for draw in draws {
            history.append(draw);
        }
        history
    }

    pub fn game(&self) -> Game {
        self.game
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn contains(&self, key: &DrawKey) -> bool {
        self.draws.iter().any(|d| &self.game.natural_key(d) == key)
    }

    /// Ajoute un tirage s'il est absent. Retourne `false` pour un doublon
    /// ou pour un tirage plus ancien que tout l'historique quand celui-ci
    /// est plein.
    pub fn append(&mut self, draw: Draw) -> bool {
        if self.contains(&self.game.natural_key(&draw)) {
            return false;
        }
        let pos = self
            .draws
            .partition_point(|d| (d.date, d.session) <= (draw.date, draw.session));
        self.draws.insert(pos, draw);

        let overflow = self.draws.len().saturating_sub(self.cap);
        self.draws.drain(..overflow);
        pos >= overflow
    }

    /// Les `n` tirages les plus récents, en ordre chronologique.
    pub fn tail(&self, n: usize) -> &[Draw] {
        let start = self.draws.len().saturating_sub(n);
        &self.draws[start..]
    }

    pub fn latest(&self) -> Option<&Draw> {
        self.draws.last()
    }

    pub fn latest_on(&self, date: NaiveDate) -> Option<&Draw> {
        self.draws.iter().rev().find(|d| d.date == date)
    }

    pub fn latest_in_session(&self, session: Session) -> Option<&Draw> {
        self.draws.iter().rev().find(|d| d.session == Some(session))
    }
}

pub fn validate_draw(game: Game, draw: &Draw) -> Result<()> {
    if draw.numbers.is_empty() {
        bail!("{} : aucun numéro", game.label());
    }
    let domain = game.domain();
    for n in &draw.numbers {
        if !domain.contains(n) {
            bail!(
                "{} : numéro '{}' hors limites ({}-{})",
                game.label(),
                n,
                domain.format(domain.min),
                domain.format(domain.max)
            );
        }
    }

    if let Some(k) = game.pick_count() {
        if draw.numbers.len() != k {
            bail!("{} : {} numéros attendus, {} reçus", game.label(), k, draw.numbers.len());
        }
        for i in 0..draw.numbers.len() {
            for j in (i + 1)..draw.numbers.len() {
                if draw.numbers[i] == draw.numbers[j] {
                    bail!("{} : numéro en double : {}", game.label(), draw.numbers[i]);
                }
            }
        }
    }

    match (game.special_domain(), &draw.special) {
        (None, Some(s)) => bail!("{} : pas de numéro spécial ({} reçu)", game.label(), s),
        (Some(_), None) if game.requires_special() => {
            bail!("{} : numéro spécial manquant", game.label())
        }
        (Some(domain), Some(s)) if !domain.contains(s) => {
            bail!("{} : numéro spécial '{}' hors limites", game.label(), s)
        }
        _ => {}
    }

    match (game.has_sessions(), draw.session) {
        (true, None) => bail!("{} : séance manquante (13, 21)", game.label()),
        (false, Some(s)) => bail!("{} : pas de séance ({} reçue)", game.label(), s),
        _ => {}
    }

    Ok(())
}
