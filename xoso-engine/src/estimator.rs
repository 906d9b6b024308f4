use std::collections::HashSet;

use xoso_db::models::{Domain, Draw};

use crate::config::EstimatorConfig;

/// Poids normalisés par numéro, dans l'ordre croissant du domaine.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    entries: Vec<(String, f64)>,
}

impl WeightTable {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn uniform(domain: Domain) -> Self {
        let p = 1.0 / domain.size() as f64;
        Self::new(domain.numbers().into_iter().map(|n| (n, p)).collect())
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, number: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == number).map(|(_, w)| *w)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Tri décroissant par poids ; à poids égal, l'ordre du domaine est conservé.
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        sorted
    }
}

/// Fréquence sur les `window` derniers tirages + indicateur à décroissance exponentielle.
///
/// `draws` est en ordre chronologique (le plus ancien d'abord). Poids brut :
/// `count * count_weight + ema * ema_weight`, puis normalisation. Sans
/// donnée exploitable, distribution uniforme sur le domaine.
pub fn estimate(draws: &[Draw], domain: Domain, config: &EstimatorConfig) -> WeightTable {
    let numbers = domain.numbers();
    let start = draws.len().saturating_sub(config.window);
    let tail = &draws[start..];

    let mut counts = vec![0u32; numbers.len()];
    let mut ema = vec![0.0f64; numbers.len()];

    for draw in tail {
        let present: HashSet<&str> = draw.numbers.iter().map(String::as_str).collect();
        for (i, n) in numbers.iter().enumerate() {
            let hit = present.contains(n.as_str());
            if hit {
                counts[i] += 1;
            }
            ema[i] = ema[i] * (1.0 - config.decay) + if hit { config.decay } else { 0.0 };
        }
    }

    let raw: Vec<f64> = counts
        .iter()
        .zip(&ema)
        .map(|(&c, &e)| (c as f64 * config.count_weight + e * config.ema_weight).max(0.0))
        .collect();
    let total: f64 = raw.iter().sum();

    if total > 0.0 && total.is_finite() {
        WeightTable::new(numbers.into_iter().zip(raw).map(|(n, w)| (n, w / total)).collect())
    } else {
        WeightTable::uniform(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_draw;
    use xoso_db::models::Game;

    fn assert_normalized(table: &WeightTable) {
        assert!((table.total() - 1.0).abs() < 1e-9, "Sum = {}", table.total());
        for (n, w) in table.entries() {
            assert!(*w >= 0.0, "poids négatif pour {n}: {w}");
        }
    }

    #[test]
    fn test_estimate_sums_to_one() {
        let draws = vec![
            test_draw("2024-01-01", &["01", "02", "03", "04", "05", "06"]),
            test_draw("2024-01-03", &["06", "07", "08", "09", "10", "11"]),
            test_draw("2024-01-05", &["01", "13", "25", "37", "44", "45"]),
        ];
        let table = estimate(&draws, Game::Mega.domain(), &EstimatorConfig::default());
        assert_eq!(table.len(), 45);
        assert_normalized(&table);
    }

    #[test]
    fn test_estimate_uniform_when_empty() {
        let table = estimate(&[], Game::Power.domain(), &EstimatorConfig::default());
        assert_eq!(table.len(), 55);
        let expected = 1.0 / 55.0;
        for (_, w) in table.entries() {
            assert!((w - expected).abs() < 1e-12);
        }
        assert_eq!(table.entries()[0].0, "01");
        assert_eq!(table.entries()[54].0, "55");
    }

    #[test]
    fn test_estimate_single_xsmb_draw() {
        let draws = vec![test_draw("2024-01-03", &["07", "23"])];
        let table = estimate(&draws, Game::Xsmb.domain(), &EstimatorConfig::default());
        assert_eq!(table.len(), 100);
        assert_normalized(&table);

        let w07 = table.get("07").unwrap();
        let w23 = table.get("23").unwrap();
        assert!(w07 > 0.0);
        assert!((w07 - w23).abs() < 1e-12);

        let others: Vec<f64> = table
            .entries()
            .iter()
            .filter(|(n, _)| n != "07" && n != "23")
            .map(|(_, w)| *w)
            .collect();
        assert_eq!(others.len(), 98);
        assert!(others.iter().all(|&w| (w - others[0]).abs() < 1e-12 && w < w07));
    }

    #[test]
    fn test_estimate_window_limits_history() {
        let mut draws = vec![test_draw("2024-01-01", &["01", "02", "03", "04", "05", "06"])];
        for day in 2..=4 {
            draws.push(test_draw(&format!("2024-01-{:02}", day), &["10", "11", "12", "13", "14", "15"]));
        }
        let config = EstimatorConfig { window: 3, ..EstimatorConfig::default() };
        let table = estimate(&draws, Game::Mega.domain(), &config);
        assert_eq!(table.get("01"), Some(0.0));
        assert!(table.get("10").unwrap() > 0.0);
    }

    #[test]
    fn test_estimate_recent_streak_higher() {
        // 01 sort au premier tirage, 09 au dernier : même fréquence, EMA plus forte pour 09
        let draws = vec![
            test_draw("2024-01-01", &["01", "02", "03", "04", "05", "06"]),
            test_draw("2024-01-03", &["09", "20", "21", "22", "23", "24"]),
        ];
        let table = estimate(&draws, Game::Mega.domain(), &EstimatorConfig::default());
        assert!(table.get("09").unwrap() > table.get("01").unwrap());
    }

    #[test]
    fn test_estimate_ignores_foreign_numbers() {
        let draws = vec![test_draw("2024-01-01", &["99", "7"])];
        let table = estimate(&draws, Game::Mega.domain(), &EstimatorConfig::default());
        assert_normalized(&table);
        assert!((table.get("07").unwrap() - 1.0 / 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_ranked_is_stable() {
        let table = WeightTable::new(vec![
            ("01".to_string(), 0.2),
            ("02".to_string(), 0.5),
            ("03".to_string(), 0.2),
            ("04".to_string(), 0.1),
        ]);
        let names: Vec<String> = table.ranked().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["02", "01", "03", "04"]);
    }
}
