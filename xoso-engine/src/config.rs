use std::path::Path;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::warn;

use xoso_db::models::{Game, HistoryCaps};

use crate::schedule::DrawSchedule;
use crate::scorer::TOP_COUNT;

/// Mélange fréquence brute / indicateur exponentiel du `estimator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub window: usize,
    pub decay: f64,
    pub count_weight: f64,
    pub ema_weight: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window: 30,
            decay: 0.15,
            count_weight: 1.0,
            ema_weight: 5.0,
        }
    }
}

/// Poids du score XSMB : `f30*w30 + f14*w14 + f7*w7 + ema*w_ema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub f30: f64,
    pub f14: f64,
    pub f7: f64,
    pub ema: f64,
    pub ema_decay: f64,
    pub confidence_cap: f64,
    pub confidence_rank: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            f30: 1.0,
            f14: 0.6,
            f7: 0.4,
            ema: 2.0,
            ema_decay: 0.2,
            confidence_cap: 0.99,
            confidence_rank: TOP_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreeDigitConfig {
    pub window: usize,
    pub floor: f64,
    pub increment: f64,
    pub picks: usize,
}

impl Default for ThreeDigitConfig {
    fn default() -> Self {
        Self {
            window: 30,
            floor: 0.1,
            increment: 0.02,
            picks: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetSizes {
    pub mega: usize,
    pub power: usize,
    pub l535: usize,
}

impl Default for SetSizes {
    fn default() -> Self {
        Self {
            mega: 6,
            power: 6,
            l535: 5,
        }
    }
}

impl SetSizes {
    pub fn get(&self, game: Game) -> Option<usize> {
        match game {
            Game::Mega => Some(self.mega),
            Game::Power => Some(self.power),
            Game::L535 => Some(self.l535),
            Game::Xsmb | Game::Max3d => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub utc_offset_hours: i32,
    /// Avant cette heure locale : mode ANALYZE.
    pub analyze_before_hour: u32,
    pub estimator: EstimatorConfig,
    pub scorer: ScorerConfig,
    pub three_digit: ThreeDigitConfig,
    pub schedule: DrawSchedule,
    pub history_caps: HistoryCaps,
    pub set_sizes: SetSizes,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 7,
            analyze_before_hour: 8,
            estimator: EstimatorConfig::default(),
            scorer: ScorerConfig::default(),
            three_digit: ThreeDigitConfig::default(),
            schedule: DrawSchedule::default(),
            history_caps: HistoryCaps::default(),
            set_sizes: SetSizes::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {:?}", path))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Configuration invalide : {:?}", path))?;
        Ok(config)
    }

    /// Configuration par défaut si aucun fichier n'est donné ou s'il est illisible.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            None => Self::default(),
            Some(p) => Self::load(p).unwrap_or_else(|e| {
                warn!(error = %format!("{e:#}"), "configuration ignorée, valeurs par défaut");
                Self::default()
            }),
        }
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .with_context(|| format!("Décalage horaire invalide : UTC{:+}", self.utc_offset_hours))
    }
}
