use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};

use xoso_db::models::Draw;
use xoso_engine::record::{DailyRecord, GameSlot, Outcomes, Predictions};
use xoso_engine::sets::{NamedSets, Ticket};

use crate::import::ImportResult;

const NONE: &str = "—";

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Rendu d'un tirage 5/35 : « 01 02 03 04 05 | SB 06 ».
pub fn format_ticket_draw(draw: Option<&Draw>) -> String {
    match draw {
        Some(d) => match &d.special {
            Some(sp) => format!("{} | SB {}", d.numbers.join(" "), sp),
            None => d.numbers.join(" "),
        },
        None => NONE.to_string(),
    }
}

fn format_draw(draw: Option<&Draw>) -> String {
    match draw {
        Some(d) => d.numbers.join(" "),
        None => NONE.to_string(),
    }
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Date", "Séance", "Numéros", "Spécial", "Source"]);
    for draw in draws.iter().rev() {
        table.add_row(vec![
            draw.date.to_string(),
            draw.session.map(|s| s.to_string()).unwrap_or_else(|| NONE.to_string()),
            draw.numbers.join(" "),
            draw.special.clone().unwrap_or_else(|| NONE.to_string()),
            draw.source.clone(),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
}

fn slot_status<T>(slot: &GameSlot<T>) -> Cell {
    match slot {
        GameSlot::Ready { date, .. } => Cell::new(date.to_string()).fg(Color::Green),
        GameSlot::OffDay => Cell::new("pas de tirage").fg(Color::Yellow),
        GameSlot::Failed { reason } => Cell::new(format!("échec : {reason}")).fg(Color::Red),
    }
}

fn display_sets(title: &str, slot: &GameSlot<NamedSets<Vec<String>>>) {
    println!("\n── {title} ──");
    let Some(sets) = slot.picks() else {
        let mut table = new_table(vec!["Statut"]);
        table.add_row(vec![slot_status(slot)]);
        println!("{table}");
        return;
    };
    let mut table = new_table(vec!["Grille", "Numéros"]);
    for (name, set) in sets.iter() {
        table.add_row(vec![name.to_string(), set.join(" - ")]);
    }
    println!("{table}");
}

fn add_ticket_rows(table: &mut Table, session: &str, sets: &NamedSets<Ticket>) {
    for (name, ticket) in sets.iter() {
        table.add_row(vec![
            format!("{session}h"),
            name.to_string(),
            ticket.main.join(" - "),
            ticket.special.clone(),
        ]);
    }
}

pub fn display_predictions(predictions: &Predictions) {
    println!("\n🎯 Pronostics du {}\n", predictions.date);

    println!("── XSMB ──");
    match predictions.xsmb.picks() {
        Some(pick) => {
            let mut table = new_table(vec!["Meilleur", "Confiance", "Xiên", "Top 10"]);
            let pairs = pick
                .pairs
                .iter()
                .map(|[a, b]| format!("{a}-{b}"))
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![
                Cell::new(&pick.best).fg(Color::Green),
                Cell::new(format!("{:.2}", pick.confidence)),
                Cell::new(pairs),
                Cell::new(pick.top10.join(" ")),
            ]);
            println!("{table}");
        }
        None => {
            let mut table = new_table(vec!["Statut"]);
            table.add_row(vec![slot_status(&predictions.xsmb)]);
            println!("{table}");
        }
    }

    display_sets("Mega 6/45", &predictions.mega);
    display_sets("Power 6/55", &predictions.power);

    println!("\n── Max 3D ──");
    let mut table = new_table(vec!["Statut", "Numéros"]);
    let picks = predictions.max3d.picks().map(|p| p.join(" ")).unwrap_or_default();
    table.add_row(vec![slot_status(&predictions.max3d), Cell::new(picks)]);
    println!("{table}");

    println!("\n── Lotto 5/35 ──");
    match predictions.l535.picks() {
        Some(tickets) => {
            let mut table = new_table(vec!["Séance", "Grille", "Numéros", "SB"]);
            add_ticket_rows(&mut table, "13", &tickets.midday);
            add_ticket_rows(&mut table, "21", &tickets.evening);
            println!("{table}");
        }
        None => {
            let mut table = new_table(vec!["Statut"]);
            table.add_row(vec![slot_status(&predictions.l535)]);
            println!("{table}");
        }
    }
}

pub fn display_outcomes(outcomes: &Outcomes) {
    println!("\n📋 Derniers résultats\n");
    let mut table = new_table(vec!["Jeu", "Date", "Résultat", "Source"]);
    let rows = [
        ("XSMB", outcomes.xsmb.as_ref(), format_draw(outcomes.xsmb.as_ref())),
        ("Mega 6/45", outcomes.mega.as_ref(), format_draw(outcomes.mega.as_ref())),
        ("Power 6/55", outcomes.power.as_ref(), format_draw(outcomes.power.as_ref())),
        ("Max 3D", outcomes.max3d.as_ref(), format_draw(outcomes.max3d.as_ref())),
        ("Lotto 5/35 13h", outcomes.l535_13.as_ref(), format_ticket_draw(outcomes.l535_13.as_ref())),
        ("Lotto 5/35 21h", outcomes.l535_21.as_ref(), format_ticket_draw(outcomes.l535_21.as_ref())),
    ];
    for (label, draw, text) in rows {
        table.add_row(vec![
            label.to_string(),
            draw.map(|d| d.date.to_string()).unwrap_or_else(|| NONE.to_string()),
            text,
            draw.map(|d| d.source.clone()).unwrap_or_else(|| NONE.to_string()),
        ]);
    }
    println!("{table}");
}

pub fn display_record(record: &DailyRecord) {
    println!("Mise à jour : {}  |  Mode : {}", record.updated_at.format("%Y-%m-%d %H:%M:%S %:z"), record.mode);
    display_predictions(&record.predictions);
    display_outcomes(&record.outcomes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use xoso_db::models::Session;

    fn l535_draw(special: Option<&str>) -> Draw {
        Draw {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            session: Some(Session::Midday),
            numbers: ["01", "02", "03", "04", "05"].iter().map(|s| s.to_string()).collect(),
            special: special.map(String::from),
            source: "csv".to_string(),
        }
    }

    #[test]
    fn test_format_ticket_draw() {
        assert_eq!(format_ticket_draw(Some(&l535_draw(Some("06")))), "01 02 03 04 05 | SB 06");
        assert_eq!(format_ticket_draw(Some(&l535_draw(None))), "01 02 03 04 05");
        assert_eq!(format_ticket_draw(None), "—");
    }

    #[test]
    fn test_format_draw() {
        assert_eq!(format_draw(Some(&l535_draw(Some("06")))), "01 02 03 04 05");
        assert_eq!(format_draw(None), "—");
    }
}
