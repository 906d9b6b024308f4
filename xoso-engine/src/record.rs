use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use xoso_db::models::Draw;

use crate::mode::Mode;
use crate::scorer::TwoDigitPick;
use crate::sets::{NamedSets, Ticket};

/// Pronostic d'un jeu pour la journée.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GameSlot<T> {
    Ready { date: NaiveDate, picks: T },
    /// Pas de tirage ce jour-là.
    OffDay,
    Failed { reason: String },
}

impl<T> GameSlot<T> {
    pub fn picks(&self) -> Option<&T> {
        match self {
            GameSlot::Ready { picks, .. } => Some(picks),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTickets {
    #[serde(rename = "13")]
    pub midday: NamedSets<Ticket>,
    #[serde(rename = "21")]
    pub evening: NamedSets<Ticket>,
}

/// Pronostics figés pour `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub date: NaiveDate,
    pub xsmb: GameSlot<TwoDigitPick>,
    pub mega: GameSlot<NamedSets<Vec<String>>>,
    pub power: GameSlot<NamedSets<Vec<String>>>,
    pub max3d: GameSlot<Vec<String>>,
    pub l535: GameSlot<SessionTickets>,
}

/// Dernier tirage observé par jeu, avec sa source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcomes {
    pub xsmb: Option<Draw>,
    pub mega: Option<Draw>,
    pub power: Option<Draw>,
    pub max3d: Option<Draw>,
    pub l535_13: Option<Draw>,
    pub l535_21: Option<Draw>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub updated_at: DateTime<FixedOffset>,
    pub mode: Mode,
    pub predictions: Predictions,
    pub outcomes: Outcomes,
}

pub fn record_path(data_dir: &Path) -> PathBuf {
    data_dir.join("predictions.json")
}

/// Fichier absent ou illisible : `None`, on repart de zéro.
pub fn load_record(path: &Path) -> Option<DailyRecord> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "fichier de pronostics illisible");
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "fichier de pronostics corrompu, ignoré");
            None
        }
    }
}

pub fn save_record(path: &Path, record: &DailyRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json)
        .with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> DailyRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let sets = NamedSets {
            hot: vec!["01".to_string()],
            cold: vec!["02".to_string()],
            mixed: vec!["03".to_string()],
            decay_weighted: vec!["04".to_string()],
            random: vec!["05".to_string()],
        };
        DailyRecord {
            updated_at: FixedOffset::east_opt(7 * 3600)
                .unwrap()
                .from_local_datetime(&date.and_hms_opt(6, 30, 0).unwrap())
                .unwrap(),
            mode: Mode::Analyze,
            predictions: Predictions {
                date,
                xsmb: GameSlot::Ready {
                    date,
                    picks: TwoDigitPick {
                        best: "07".to_string(),
                        confidence: 0.42,
                        pairs: vec![["07".to_string(), "23".to_string()]],
                        top10: vec!["07".to_string(), "23".to_string()],
                    },
                },
                mega: GameSlot::Ready { date, picks: sets },
                power: GameSlot::OffDay,
                max3d: GameSlot::Failed { reason: "test".to_string() },
                l535: GameSlot::OffDay,
            },
            outcomes: Outcomes::default(),
        }
    }

    use chrono::TimeZone;

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["mode"], "ANALYZE");
        assert_eq!(json["predictions"]["power"]["status"], "off_day");
        assert_eq!(json["predictions"]["mega"]["status"], "ready");
        assert_eq!(json["predictions"]["mega"]["picks"]["decay_weighted"][0], "04");
        assert_eq!(json["predictions"]["max3d"]["reason"], "test");
        assert_eq!(json["predictions"]["xsmb"]["picks"]["best"], "07");
        assert!(json["outcomes"]["mega"].is_null());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = record_path(dir.path());
        let record = sample_record();
        save_record(&path, &record).unwrap();
        assert_eq!(load_record(&path), Some(record));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_record(&record_path(dir.path())), None);
    }

    #[test]
    fn test_load_corrupt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = record_path(dir.path());
        std::fs::write(&path, "{\"mode\": \"ANALYZE\"").unwrap();
        assert_eq!(load_record(&path), None);
    }

    #[test]
    fn test_slot_picks() {
        let slot: GameSlot<Vec<String>> = GameSlot::OffDay;
        assert!(slot.picks().is_none());
        let slot = GameSlot::Ready { date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), picks: vec!["123".to_string()] };
        assert_eq!(slot.picks().unwrap().len(), 1);
    }
}
