use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use xoso_db::models::{Draw, Game};

/// Une ligne du jeu de données long format : un numéro pour un jour.
///
/// `f7`, `f14`, `f30` sont des colonnes réservées aux fréquences glissantes,
/// exportées vides.
#[derive(Debug, Serialize, PartialEq)]
pub struct DatasetRow {
    pub game: &'static str,
    pub date: NaiveDate,
    pub number: String,
    pub target: u8,
    pub f7: Option<u32>,
    pub f14: Option<u32>,
    pub f30: Option<u32>,
    pub last_seen_days: Option<i64>,
}

/// `last_seen_days` : jours depuis la dernière sortie du numéro (au moins 1), vide sinon.
pub fn dataset_rows(draws: &[Draw]) -> Vec<DatasetRow> {
    let domain = Game::Xsmb.domain();
    let mut seen: HashMap<String, NaiveDate> = HashMap::new();
    let mut rows = Vec::with_capacity(draws.len() * domain.size());

    for draw in draws {
        for number in domain.numbers() {
            let target = u8::from(draw.numbers.contains(&number));
            let last_seen_days = seen
                .get(&number)
                .map(|last| (draw.date - *last).num_days().max(1));
            rows.push(DatasetRow {
                game: Game::Xsmb.id(),
                date: draw.date,
                number,
                target,
                f7: None,
                f14: None,
                f30: None,
                last_seen_days,
            });
        }
        for number in &draw.numbers {
            seen.insert(number.clone(), draw.date);
        }
    }
    rows
}

pub fn write_dataset<W: Write>(draws: &[Draw], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let rows = dataset_rows(draws);
    for row in &rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

pub fn export_dataset(draws: &[Draw], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Impossible de créer {:?}", path))?;
    write_dataset(draws, file)
}
