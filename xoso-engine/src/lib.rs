pub mod config;
pub mod engine;
pub mod estimator;
pub mod mode;
pub mod record;
pub mod rng;
pub mod schedule;
pub mod scorer;
pub mod sets;

#[cfg(test)]
pub(crate) fn test_draw(date: &str, numbers: &[&str]) -> xoso_db::models::Draw {
    xoso_db::models::Draw {
        date: chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        session: None,
        numbers: numbers.iter().map(|n| n.to_string()).collect(),
        special: None,
        source: "test".to_string(),
    }
}
