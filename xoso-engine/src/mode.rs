use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// ANALYZE : les pronostics du jour sont (re)calculés.
/// RESULTS : les pronostics sont figés, seuls les résultats sont mis à jour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Analyze,
    Results,
}

impl Mode {
    pub fn at(now: DateTime<FixedOffset>, analyze_before_hour: u32) -> Self {
        if now.hour() < analyze_before_hour {
            Mode::Analyze
        } else {
            Mode::Results
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Analyze => write!(f, "ANALYZE"),
            Mode::Results => write!(f, "RESULTS"),
        }
    }
}

/// Recalcul en mode ANALYZE, ou au premier passage d'une nouvelle journée.
pub fn should_regenerate(mode: Mode, stored_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    mode == Mode::Analyze || stored_date != Some(today)
}

pub fn local_now(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}
