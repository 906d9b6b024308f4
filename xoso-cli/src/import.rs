use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::warn;

use xoso_db::models::{Draw, Game, Session, validate_draw};
use xoso_db::store::HistoryStore;

pub const CSV_SOURCE: &str = "csv";

/// Accepte `AAAA-MM-JJ` et `JJ/MM/AAAA`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if raw.contains('/') {
        let parts: Vec<&str> = raw.split('/').collect();
        if parts.len() != 3 {
            bail!("Format de date invalide: '{}'", raw);
        }
        let iso = format!("{}-{}-{}", parts[2], parts[1], parts[0]);
        return NaiveDate::parse_from_str(&iso, "%Y-%m-%d")
            .with_context(|| format!("Date invalide: '{}'", raw));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("Date invalide: '{}'", raw))
}

/// Extrait les deux derniers chiffres de chaque nombre de 2 à 6 chiffres, sans doublon.
pub fn extract_twos(text: &str) -> Vec<String> {
    let mut twos: Vec<String> = Vec::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        if !(2..=6).contains(&token.len()) || !token.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let two = token[token.len() - 2..].to_string();
        if !twos.contains(&two) {
            twos.push(two);
        }
    }
    twos
}

struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(header: &csv::StringRecord) -> Self {
        Self {
            names: header.iter().map(|h| h.trim().to_lowercase()).collect(),
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Result<&'r str> {
        let idx = self.index(name).with_context(|| format!("Colonne '{}' absente", name))?;
        record
            .get(idx)
            .map(str::trim)
            .with_context(|| format!("Champ '{}' manquant", name))
    }

    fn date(&self, record: &csv::StringRecord) -> Result<NaiveDate> {
        let idx = self.index("date").unwrap_or(0);
        let raw = record.get(idx).context("Champ 'date' manquant")?;
        parse_date(raw)
    }
}

fn parse_record(game: Game, columns: &Columns, record: &csv::StringRecord) -> Result<Draw> {
    let date = columns.date(record)?;
    let domain = game.domain();
    let picks = |names: &[&str]| -> Result<Vec<String>> {
        names
            .iter()
            .map(|name| domain.normalize(columns.get(record, name)?))
            .collect()
    };

    let mut draw = Draw {
        date,
        session: None,
        numbers: Vec::new(),
        special: None,
        source: CSV_SOURCE.to_string(),
    };

    match game {
        Game::Xsmb => {
            let text = match columns.index("all_numbers_text") {
                Some(idx) => record.get(idx).unwrap_or_default().to_string(),
                None => record.iter().skip(1).collect::<Vec<_>>().join(" "),
            };
            draw.numbers = extract_twos(&text);
        }
        Game::Mega | Game::Power => {
            draw.numbers = picks(&["n1", "n2", "n3", "n4", "n5", "n6"])?;
            if game == Game::Power {
                if let Some(pb) = columns.index("pb").and_then(|idx| record.get(idx)) {
                    if !pb.trim().is_empty() {
                        draw.special = Some(domain.normalize(pb)?);
                    }
                }
            }
        }
        Game::Max3d => {
            let date_idx = columns.index("date").unwrap_or(0);
            draw.numbers = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != date_idx)
                .map(|(_, v)| v.trim())
                .filter(|v| v.len() == 3 && v.bytes().all(|b| b.is_ascii_digit()))
                .map(str::to_string)
                .collect();
        }
        Game::L535 => {
            let when = columns.index("when").and_then(|idx| record.get(idx)).unwrap_or_default();
            draw.session = Some(when.parse::<Session>()?);
            draw.numbers = picks(&["main1", "main2", "main3", "main4", "main5"])?;
            let special_domain = game.special_domain().context("Domaine du numéro spécial manquant")?;
            draw.special = Some(special_domain.normalize(columns.get(record, "sp")?)?);
        }
    }

    validate_draw(game, &draw)?;
    Ok(draw)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

/// Importe les tirages d'un CSV à en-tête ; séparateur `;` ou `,`.
pub fn import_reader<R: Read>(store: &dyn HistoryStore, game: Game, reader: R, delimiter: u8) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let columns = Columns::new(reader.headers().context("En-tête CSV illisible")?);

    let mut result = ImportResult::default();

    for record_result in reader.records() {
        result.total_records += 1;
        let line = result.total_records;
        let record = match record_result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "ligne CSV illisible");
                result.errors += 1;
                continue;
            }
        };
        let draw = match parse_record(game, &columns, &record) {
            Ok(draw) => draw,
            Err(e) => {
                warn!(line, error = %format!("{e:#}"), "ligne ignorée");
                result.errors += 1;
                continue;
            }
        };
        match store.append(game, &draw) {
            Ok(true) => result.inserted += 1,
            Ok(false) => result.skipped += 1,
            Err(e) => {
                warn!(line, error = %format!("{e:#}"), "insertion impossible");
                result.errors += 1;
            }
        }
    }

    Ok(result)
}

pub fn import_csv(store: &dyn HistoryStore, game: Game, path: &Path) -> Result<ImportResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    let header = content.lines().next().unwrap_or_default();
    let delimiter = if header.contains(';') { b';' } else { b',' };
    import_reader(store, game, content.as_bytes(), delimiter)
}
