use anyhow::{Context, Result, bail};
use rand::distr::weighted::WeightedIndex;
use rand::prelude::Distribution;
use serde::{Deserialize, Serialize};

use xoso_db::models::{Domain, Draw};

use crate::config::ThreeDigitConfig;
use crate::estimator::WeightTable;
use crate::rng::SeededRng;

/// Les cinq grilles nommées d'un jeu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSets<T> {
    pub hot: T,
    pub cold: T,
    pub mixed: T,
    pub decay_weighted: T,
    pub random: T,
}

impl<T> NamedSets<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &T)> {
        [
            ("hot", &self.hot),
            ("cold", &self.cold),
            ("mixed", &self.mixed),
            ("decay_weighted", &self.decay_weighted),
            ("random", &self.random),
        ]
        .into_iter()
    }

    /// Applique `f` dans l'ordre hot, cold, mixed, decay_weighted, random.
    pub fn try_map<U>(self, mut f: impl FnMut(T) -> Result<U>) -> Result<NamedSets<U>> {
        Ok(NamedSets {
            hot: f(self.hot)?,
            cold: f(self.cold)?,
            mixed: f(self.mixed)?,
            decay_weighted: f(self.decay_weighted)?,
            random: f(self.random)?,
        })
    }
}

/// Grille Lotto 5/35 : numéros principaux + numéro spécial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub main: Vec<String>,
    pub special: String,
}

/// Indice tiré par parcours cumulatif : cible `u * total`, premier poids non
/// nul qui l'atteint. `None` si aucun poids n'est positif.
pub fn pick_index(weights: &[f64], rng: &mut SeededRng) -> Option<usize> {
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    let target = rng.next_f64() * total;

    let mut acc = 0.0;
    for (i, w) in weights.iter().enumerate() {
        let w = w.max(0.0);
        acc += w;
        if w > 0.0 && acc >= target {
            return Some(i);
        }
    }
    // Arrondi flottant : dernier candidat de poids non nul
    weights.iter().rposition(|w| *w > 0.0)
}

/// Tirage pondéré sans remise.
///
/// Un `pick_index` par tour. S'arrête dès que le poids restant est nul : le
/// résultat peut alors compter moins de `k` numéros.
pub fn weighted_sample(pool: &[(String, f64)], k: usize, rng: &mut SeededRng) -> Vec<String> {
    let mut remaining: Vec<(&str, f64)> = pool
        .iter()
        .map(|(n, w)| (n.as_str(), w.max(0.0)))
        .collect();
    let mut selected = Vec::with_capacity(k.min(remaining.len()));

    while selected.len() < k && !remaining.is_empty() {
        let weights: Vec<f64> = remaining.iter().map(|(_, w)| *w).collect();
        let Some(idx) = pick_index(&weights, rng) else {
            break;
        };
        selected.push(remaining.remove(idx).0.to_string());
    }

    selected
}

fn extend_unique(set: &mut Vec<String>, picks: Vec<String>) {
    for num in picks {
        if !set.contains(&num) {
            set.push(num);
        }
    }
}

/// Construit les cinq grilles de taille `k` à partir d'une table de poids.
///
/// hot/cold ne dépendent que du classement ; mixed, decay_weighted et random
/// consomment `rng` dans cet ordre. mixed est complété uniformément dans la
/// tranche médiane quand ses poids ne suffisent pas à atteindre `k`.
pub fn build_sets(weights: &WeightTable, k: usize, rng: &mut SeededRng) -> NamedSets<Vec<String>> {
    let ranked = weights.ranked();
    let n = ranked.len();
    let names = |slice: &[(String, f64)]| slice.iter().map(|(num, _)| num.clone()).collect::<Vec<_>>();

    let hot = names(&ranked[..k.min(n)]);
    let cold = names(&ranked[n.saturating_sub(k)..]);

    let mid = &ranked[n * 3 / 10..n * 7 / 10];
    let mut mixed = names(&ranked[..3.min(n)]);
    extend_unique(&mut mixed, weighted_sample(mid, k.saturating_sub(3), rng));
    if mixed.len() < k {
        // Tranche médiane à poids nuls (historique clairsemé) : complément uniforme
        let rest: Vec<(String, f64)> = mid
            .iter()
            .filter(|(num, _)| !mixed.contains(num))
            .map(|(num, _)| (num.clone(), 1.0))
            .collect();
        let missing = k - mixed.len();
        extend_unique(&mut mixed, weighted_sample(&rest, missing, rng));
    }
    mixed.truncate(k);

    let decay_weighted = weighted_sample(weights.entries(), k, rng);

    let flat: Vec<(String, f64)> = weights.entries().iter().map(|(num, _)| (num.clone(), 1.0)).collect();
    let random = weighted_sample(&flat, k, rng);

    NamedSets {
        hot,
        cold,
        mixed,
        decay_weighted,
        random,
    }
}

/// Poids par chiffre (centaines, dizaines, unités) pour Max 3D.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitTables {
    pub positions: [[f64; 10]; 3],
}

pub fn digit_tables(draws: &[Draw], config: &ThreeDigitConfig) -> DigitTables {
    let mut positions = [[config.floor; 10]; 3];
    let start = draws.len().saturating_sub(config.window);
    for draw in &draws[start..] {
        for number in &draw.numbers {
            let digits = number.as_bytes();
            if digits.len() != 3 || !digits.iter().all(u8::is_ascii_digit) {
                continue;
            }
            for (pos, &d) in digits.iter().enumerate() {
                positions[pos][(d - b'0') as usize] += config.increment;
            }
        }
    }
    DigitTables { positions }
}

/// `picks` numéros à trois chiffres ; le numéro `i` utilise la graine `"{seed}|{i}"`.
///
/// Chaque chiffre est tiré par `pick_index`, indépendamment de la version de `rand`.
pub fn three_digit_picks(tables: &DigitTables, seed: &str, picks: usize) -> Result<Vec<String>> {
    if tables.positions.iter().any(|weights| !weights.iter().any(|w| *w > 0.0 && w.is_finite())) {
        bail!("Poids de chiffres invalides : une position n'a aucun poids positif");
    }

    let mut out = Vec::with_capacity(picks);
    for i in 0..picks {
        let mut rng = SeededRng::from_seed_str(&format!("{seed}|{i}"));
        let mut number = String::with_capacity(3);
        for weights in &tables.positions {
            let digit = pick_index(weights, &mut rng).context("Poids de chiffres invalides")?;
            number.push(char::from(b'0' + digit as u8));
        }
        out.push(number);
    }
    Ok(out)
}

/// Poids `1 + occurrences` pour chaque numéro spécial du domaine.
pub fn special_weights(draws: &[Draw], domain: Domain) -> Vec<(String, f64)> {
    domain
        .numbers()
        .into_iter()
        .map(|n| {
            let hits = draws.iter().filter(|d| d.special.as_deref() == Some(n.as_str())).count();
            (n, 1.0 + hits as f64)
        })
        .collect()
}

/// Complète chaque grille par un numéro spécial tiré selon `weights`.
pub fn attach_specials(
    sets: NamedSets<Vec<String>>,
    weights: &[(String, f64)],
    rng: &mut SeededRng,
) -> Result<NamedSets<Ticket>> {
    let dist = WeightedIndex::<f64>::new(weights.iter().map(|(_, w)| *w))
        .context("Poids des numéros spéciaux invalides")?;
    sets.try_map(|main| {
        let special = weights[dist.sample(&mut *rng)].0.clone();
        Ok(Ticket { main, special })
    })
}
