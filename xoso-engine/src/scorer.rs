use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use xoso_db::models::{Domain, Draw};

use crate::config::ScorerConfig;

const SHORT_DAYS: f64 = 7.0;
const MID_DAYS: f64 = 14.0;
const LONG_DAYS: f64 = 30.0;

/// Taille du top publié ; rang de référence par défaut de la confiance.
pub const TOP_COUNT: usize = 10;

/// Pronostic XSMB : meilleur numéro, confiance, paires (xiên) et top 10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoDigitPick {
    pub best: String,
    pub confidence: f64,
    pub pairs: Vec<[String; 2]>,
    pub top10: Vec<String>,
}

/// Score de chaque numéro 00..99, trié par score décroissant (tri stable).
///
/// Les fenêtres 7/14/30 jours se mesurent entre `now` et minuit du jour de
/// tirage, dans le fuseau de `now`. L'EMA avance à chaque apparition d'un
/// numéro, sur tout l'historique.
pub fn score(draws: &[Draw], now: DateTime<FixedOffset>, config: &ScorerConfig) -> Vec<(String, f64)> {
    let domain = Domain::new(0, 99, 2);
    let size = domain.size();
    let mut f7 = vec![0u32; size];
    let mut f14 = vec![0u32; size];
    let mut f30 = vec![0u32; size];
    let mut ema = vec![0.0f64; size];

    let local_now = now.naive_local();
    let alpha = config.ema_decay;

    for draw in draws {
        let Some(midnight) = draw.date.and_hms_opt(0, 0, 0) else {
            continue;
        };
        let age_days = (local_now - midnight).num_seconds() as f64 / 86_400.0;

        for n in &draw.numbers {
            if !domain.contains(n) {
                continue;
            }
            let Ok(idx) = n.parse::<usize>() else {
                continue;
            };
            if age_days <= SHORT_DAYS {
                f7[idx] += 1;
            }
            if age_days <= MID_DAYS {
                f14[idx] += 1;
            }
            if age_days <= LONG_DAYS {
                f30[idx] += 1;
            }
            ema[idx] = ema[idx] * (1.0 - alpha) + alpha;
        }
    }

    let mut scored: Vec<(String, f64)> = domain
        .numbers()
        .into_iter()
        .enumerate()
        .map(|(i, n)| {
            let s = f30[i] as f64 * config.f30
                + f14[i] as f64 * config.f14
                + f7[i] as f64 * config.f7
                + ema[i] * config.ema;
            (n, s)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Confiance = `min(cap, top / score_au_rang_N)`, dénominateur ramené à 1 s'il est nul.
/// `N` est borné à la longueur du classement.
pub fn confidence(ranked: &[(String, f64)], config: &ScorerConfig) -> f64 {
    let Some((_, top)) = ranked.first() else {
        return 0.0;
    };
    let rank = config.confidence_rank.max(1).min(ranked.len());
    let denom = ranked[rank - 1].1;
    let denom = if denom > 0.0 { denom } else { 1.0 };
    let raw = top / denom;
    if raw.is_finite() {
        raw.clamp(0.0, config.confidence_cap)
    } else {
        0.0
    }
}

pub fn best_pick(ranked: &[(String, f64)], config: &ScorerConfig) -> TwoDigitPick {
    let top: Vec<String> = ranked.iter().take(TOP_COUNT).map(|(n, _)| n.clone()).collect();
    let best = top.first().cloned().unwrap_or_else(|| "—".to_string());

    let pairs = top
        .chunks(2)
        .take(2)
        .filter(|c| c.len() == 2)
        .map(|c| [c[0].clone(), c[1].clone()])
        .collect();

    let conf = confidence(ranked, config);
    let rounded = ((conf * 100.0).round() / 100.0).min(config.confidence_cap);

    TwoDigitPick {
        best,
        confidence: rounded,
        pairs,
        top10: top,
    }
}
