use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::{debug, info, warn};

use xoso_db::models::{Draw, Game, History, HistoryCaps, Session};
use xoso_db::store::HistoryStore;

use crate::config::EngineConfig;
use crate::estimator::estimate;
use crate::mode::{Mode, should_regenerate};
use crate::record::{DailyRecord, GameSlot, Outcomes, Predictions, SessionTickets};
use crate::rng::SeededRng;
use crate::scorer::{TwoDigitPick, best_pick, score};
use crate::sets::{NamedSets, attach_specials, build_sets, digit_tables, special_weights, three_digit_picks};

/// Historiques chargés pour une exécution, un par jeu.
#[derive(Debug, Clone, Default)]
pub struct Histories {
    by_game: BTreeMap<Game, History>,
}

impl Histories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, history: History) {
        self.by_game.insert(history.game(), history);
    }

    pub fn get(&self, game: Game) -> Option<&History> {
        self.by_game.get(&game)
    }

    /// Tirages chronologiques du jeu, vide s'il n'a pas d'historique.
    pub fn draws(&self, game: Game) -> &[Draw] {
        self.by_game.get(&game).map(History::draws).unwrap_or(&[])
    }
}

/// Un historique illisible est remplacé par un historique vide.
pub fn load_histories(store: &dyn HistoryStore, caps: &HistoryCaps) -> Histories {
    let mut histories = Histories::new();
    for game in Game::ALL {
        let history = match store.load(game) {
            Ok(history) => history,
            Err(e) => {
                warn!(game = game.id(), error = %format!("{e:#}"), "historique illisible, on repart d'un historique vide");
                History::new(game, caps.get(game))
            }
        };
        debug!(game = game.id(), draws = history.len(), "historique chargé");
        histories.insert(history);
    }
    histories
}

pub fn seed_for(game: Game, date: NaiveDate) -> String {
    format!("{}|{}", game.id(), date.format("%Y-%m-%d"))
}

pub fn session_seed(session: Session, date: NaiveDate) -> String {
    format!("{}|{}|{}", Game::L535.id(), session.as_str(), date.format("%Y-%m-%d"))
}

fn isolate<T>(game: Game, date: NaiveDate, result: Result<T>) -> GameSlot<T> {
    match result {
        Ok(picks) => GameSlot::Ready { date, picks },
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(game = game.id(), %reason, "échec du pronostic");
            GameSlot::Failed { reason }
        }
    }
}

fn scheduled<T>(
    game: Game,
    date: NaiveDate,
    config: &EngineConfig,
    predict: impl FnOnce() -> Result<T>,
) -> GameSlot<T> {
    if !config.schedule.is_draw_day(game, date) {
        debug!(game = game.id(), %date, "pas de tirage ce jour");
        return GameSlot::OffDay;
    }
    isolate(game, date, predict())
}

fn set_size(game: Game, config: &EngineConfig) -> Result<usize> {
    let k = config
        .set_sizes
        .get(game)
        .with_context(|| format!("{} : pas de taille de grille", game.label()))?;
    if k == 0 {
        bail!("{} : taille de grille nulle", game.label());
    }
    Ok(k)
}

pub fn predict_two_digit(draws: &[Draw], now: DateTime<FixedOffset>, config: &EngineConfig) -> Result<TwoDigitPick> {
    let ranked = score(draws, now, &config.scorer);
    if ranked.is_empty() {
        bail!("XSMB : aucun score calculé");
    }
    Ok(best_pick(&ranked, &config.scorer))
}

pub fn predict_lotto(game: Game, draws: &[Draw], seed: &str, config: &EngineConfig) -> Result<NamedSets<Vec<String>>> {
    let k = set_size(game, config)?;
    let weights = estimate(draws, game.domain(), &config.estimator);
    let mut rng = SeededRng::from_seed_str(seed);
    Ok(build_sets(&weights, k, &mut rng))
}

pub fn predict_three_digit(draws: &[Draw], seed: &str, config: &EngineConfig) -> Result<Vec<String>> {
    let tables = digit_tables(draws, &config.three_digit);
    three_digit_picks(&tables, seed, config.three_digit.picks)
}

/// Deux jeux de grilles 5/35, un par séance, chacun complété d'un numéro spécial.
pub fn predict_sessions(draws: &[Draw], date: NaiveDate, config: &EngineConfig) -> Result<SessionTickets> {
    let special_domain = Game::L535
        .special_domain()
        .context("Lotto 5/35 : domaine du numéro spécial manquant")?;
    let specials = special_weights(draws, special_domain);

    let tickets = |session: Session| {
        let seed = session_seed(session, date);
        let sets = predict_lotto(Game::L535, draws, &seed, config)?;
        let mut rng = SeededRng::from_seed_str(&format!("{seed}|sb"));
        attach_specials(sets, &specials, &mut rng)
    };

    Ok(SessionTickets {
        midday: tickets(Session::Midday)?,
        evening: tickets(Session::Evening)?,
    })
}

/// Calcule les pronostics de tous les jeux pour la date locale de `now`.
///
/// Chaque jeu est isolé : une erreur donne un `Failed` pour ce jeu seulement.
pub fn predict_all(histories: &Histories, now: DateTime<FixedOffset>, config: &EngineConfig) -> Predictions {
    let date = now.date_naive();

    let xsmb = scheduled(Game::Xsmb, date, config, || {
        predict_two_digit(histories.draws(Game::Xsmb), now, config)
    });
    let mega = scheduled(Game::Mega, date, config, || {
        predict_lotto(Game::Mega, histories.draws(Game::Mega), &seed_for(Game::Mega, date), config)
    });
    let power = scheduled(Game::Power, date, config, || {
        predict_lotto(Game::Power, histories.draws(Game::Power), &seed_for(Game::Power, date), config)
    });
    let max3d = scheduled(Game::Max3d, date, config, || {
        predict_three_digit(histories.draws(Game::Max3d), &seed_for(Game::Max3d, date), config)
    });
    let l535 = scheduled(Game::L535, date, config, || {
        predict_sessions(histories.draws(Game::L535), date, config)
    });

    Predictions {
        date,
        xsmb,
        mega,
        power,
        max3d,
        l535,
    }
}

/// XSMB : tirage du jour s'il existe, sinon le plus récent.
pub fn collect_outcomes(histories: &Histories, today: NaiveDate) -> Outcomes {
    let latest = |game: Game| histories.get(game).and_then(History::latest).cloned();
    let session = |session: Session| {
        histories
            .get(Game::L535)
            .and_then(|h| h.latest_in_session(session))
            .cloned()
    };

    Outcomes {
        xsmb: histories
            .get(Game::Xsmb)
            .and_then(|h| h.latest_on(today).or_else(|| h.latest()))
            .cloned(),
        mega: latest(Game::Mega),
        power: latest(Game::Power),
        max3d: latest(Game::Max3d),
        l535_13: session(Session::Midday),
        l535_21: session(Session::Evening),
    }
}

/// Remplace les résultats observés sans toucher aux pronostics. Idempotent.
pub fn merge_outcomes(record: &mut DailyRecord, histories: &Histories, today: NaiveDate) {
    record.outcomes = collect_outcomes(histories, today);
}

/// Une exécution quotidienne : pronostics recalculés ou conservés selon le
/// mode, puis fusion des résultats observés.
pub fn run_daily(
    histories: &Histories,
    previous: Option<DailyRecord>,
    now: DateTime<FixedOffset>,
    config: &EngineConfig,
) -> DailyRecord {
    let today = now.date_naive();
    let mode = Mode::at(now, config.analyze_before_hour);
    let stored_date = previous.as_ref().map(|r| r.predictions.date);

    let predictions = match previous {
        Some(record) if !should_regenerate(mode, stored_date, today) => {
            info!(%mode, date = %today, "pronostics figés, mise à jour des résultats");
            record.predictions
        }
        _ => {
            info!(%mode, date = %today, "calcul des pronostics");
            predict_all(histories, now, config)
        }
    };

    let mut record = DailyRecord {
        updated_at: now,
        mode,
        predictions,
        outcomes: Outcomes::default(),
    };
    merge_outcomes(&mut record, histories, today);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThreeDigitConfig;
    use crate::record::{load_record, record_path, save_record};
    use crate::test_draw;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use xoso_db::store::MemoryStore;

    fn at(date: &str, hour: u32) -> DateTime<FixedOffset> {
        let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .from_local_datetime(&d.and_hms_opt(hour, 0, 0).unwrap())
            .unwrap()
    }

    fn l535_draw(date: &str, session: Session, numbers: &[&str], special: &str) -> Draw {
        let mut draw = test_draw(date, numbers);
        draw.session = Some(session);
        draw.special = Some(special.to_string());
        draw
    }

    fn make_test_histories() -> Histories {
        let caps = HistoryCaps::default();
        let mut histories = Histories::new();
        histories.insert(History::from_draws(Game::Xsmb, caps.xsmb, vec![
            test_draw("2024-01-01", &["07", "23", "45"]),
            test_draw("2024-01-02", &["07", "11"]),
        ]));
        histories.insert(History::from_draws(Game::Mega, caps.mega, vec![
            test_draw("2023-12-29", &["01", "02", "03", "04", "05", "06"]),
            test_draw("2023-12-31", &["05", "12", "18", "27", "33", "41"]),
        ]));
        histories.insert(History::from_draws(Game::Power, caps.power, vec![
            test_draw("2024-01-02", &["03", "14", "22", "35", "47", "55"]),
        ]));
        histories.insert(History::from_draws(Game::Max3d, caps.max3d, vec![
            test_draw("2024-01-01", &["123", "456", "789"]),
        ]));
        histories.insert(History::from_draws(Game::L535, caps.l535, vec![
            l535_draw("2024-01-02", Session::Midday, &["01", "07", "13", "22", "35"], "04"),
            l535_draw("2024-01-02", Session::Evening, &["02", "09", "15", "28", "31"], "11"),
        ]));
        histories
    }

    #[test]
    fn test_seeds() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(seed_for(Game::Mega, date), "mega|2024-01-03");
        assert_eq!(session_seed(Session::Midday, date), "l535|13|2024-01-03");
        assert_eq!(session_seed(Session::Evening, date), "l535|21|2024-01-03");
    }

    #[test]
    fn test_off_day_placeholder() {
        // 2024-01-02 : mardi, ni Mega ni Max 3D
        let predictions = predict_all(&make_test_histories(), at("2024-01-02", 6), &EngineConfig::default());
        assert_eq!(predictions.mega, GameSlot::OffDay);
        assert_eq!(predictions.max3d, GameSlot::OffDay);
        assert!(matches!(predictions.power, GameSlot::Ready { .. }));
        assert!(matches!(predictions.xsmb, GameSlot::Ready { .. }));
        assert!(matches!(predictions.l535, GameSlot::Ready { .. }));

        let json = serde_json::to_value(&predictions).unwrap();
        assert_eq!(json["mega"], serde_json::json!({"status": "off_day"}));
    }

    #[test]
    fn test_predict_all_deterministic() {
        let histories = make_test_histories();
        let config = EngineConfig::default();
        let a = predict_all(&histories, at("2024-01-03", 6), &config);
        let b = predict_all(&histories, at("2024-01-03", 7), &config);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_sessions_differ_and_specials_in_range() {
        let predictions = predict_all(&make_test_histories(), at("2024-01-03", 6), &EngineConfig::default());
        let tickets = predictions.l535.picks().unwrap();
        assert_ne!(tickets.midday, tickets.evening);
        for sets in [&tickets.midday, &tickets.evening] {
            for (name, ticket) in sets.iter() {
                assert_eq!(ticket.main.len(), 5, "{name}");
                assert!(Game::L535.special_domain().unwrap().contains(&ticket.special));
            }
        }
    }

    #[test]
    fn test_empty_history_gives_full_sets() {
        let predictions = predict_all(&Histories::new(), at("2024-01-03", 6), &EngineConfig::default());

        let mega = predictions.mega.picks().unwrap();
        for (name, set) in mega.iter() {
            assert_eq!(set.len(), 6, "{name}");
            let unique: HashSet<&String> = set.iter().collect();
            assert_eq!(unique.len(), 6);
        }
        assert_eq!(predictions.max3d.picks().unwrap().len(), 5);
        let xsmb = predictions.xsmb.picks().unwrap();
        assert_eq!(xsmb.top10.len(), 10);
        for (_, ticket) in predictions.l535.picks().unwrap().midday.iter() {
            assert_eq!(ticket.main.len(), 5);
        }
    }

    #[test]
    fn test_failing_game_is_isolated() {
        let config = EngineConfig {
            three_digit: ThreeDigitConfig { floor: 0.0, ..ThreeDigitConfig::default() },
            ..EngineConfig::default()
        };
        // Max 3D sans historique et plancher nul : poids tous nuls
        let mut histories = make_test_histories();
        histories.insert(History::new(Game::Max3d, 400));

        let record = run_daily(&histories, None, at("2024-01-03", 6), &config);
        assert!(matches!(record.predictions.max3d, GameSlot::Failed { .. }));
        assert!(matches!(record.predictions.mega, GameSlot::Ready { .. }));
        assert!(matches!(record.predictions.xsmb, GameSlot::Ready { .. }));
        assert!(record.outcomes.mega.is_some());
    }

    #[test]
    fn test_zero_set_size_fails() {
        let mut config = EngineConfig::default();
        config.set_sizes.power = 0;
        let predictions = predict_all(&make_test_histories(), at("2024-01-02", 6), &config);
        match predictions.power {
            GameSlot::Failed { reason } => assert!(reason.contains("Power")),
            other => panic!("attendu Failed, obtenu {other:?}"),
        }
    }

    #[test]
    fn test_collect_outcomes() {
        let histories = make_test_histories();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let outcomes = collect_outcomes(&histories, today);
        assert_eq!(outcomes.xsmb.unwrap().date, today);

        let outcomes = collect_outcomes(&histories, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(outcomes.xsmb.unwrap().numbers, vec!["07", "11"]);
        assert_eq!(outcomes.mega.unwrap().numbers[0], "05");
        assert_eq!(outcomes.l535_13.unwrap().special.as_deref(), Some("04"));
        assert_eq!(outcomes.l535_21.unwrap().special.as_deref(), Some("11"));
        assert!(collect_outcomes(&Histories::new(), today).xsmb.is_none());
    }

    #[test]
    fn test_merge_outcomes_idempotent() {
        let histories = make_test_histories();
        let now = at("2024-01-03", 9);
        let mut record = run_daily(&histories, None, now, &EngineConfig::default());
        let before = record.clone();
        merge_outcomes(&mut record, &histories, now.date_naive());
        merge_outcomes(&mut record, &histories, now.date_naive());
        assert_eq!(record, before);
    }

    #[test]
    fn test_results_mode_keeps_frozen_predictions() {
        let config = EngineConfig::default();
        let store = MemoryStore::new(HistoryCaps::default());
        for draw in [
            test_draw("2024-01-01", &["01", "02", "03", "04", "05", "06"]),
            test_draw("2024-01-01", &["10", "20"]),
        ] {
            let game = if draw.numbers.len() == 6 { Game::Mega } else { Game::Xsmb };
            store.append(game, &draw).unwrap();
        }

        let morning = run_daily(&load_histories(&store, &config.history_caps), None, at("2024-01-03", 6), &config);
        assert_eq!(morning.mode, Mode::Analyze);

        let dir = tempfile::tempdir().unwrap();
        let path = record_path(dir.path());
        save_record(&path, &morning).unwrap();
        let frozen = serde_json::to_string(&morning.predictions).unwrap();

        // Nouveau tirage publié dans la journée
        store.append(Game::Mega, &test_draw("2024-01-03", &["07", "14", "21", "28", "35", "42"])).unwrap();
        store.append(Game::Xsmb, &test_draw("2024-01-03", &["99", "45"])).unwrap();

        let previous = load_record(&path);
        let evening = run_daily(&load_histories(&store, &config.history_caps), previous, at("2024-01-03", 19), &config);
        assert_eq!(evening.mode, Mode::Results);
        assert_eq!(serde_json::to_string(&evening.predictions).unwrap(), frozen);
        assert_eq!(evening.outcomes.mega.unwrap().date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(evening.outcomes.xsmb.unwrap().numbers, vec!["99", "45"]);
    }

    #[test]
    fn test_results_mode_new_day_regenerates() {
        let config = EngineConfig::default();
        let histories = make_test_histories();
        let yesterday = run_daily(&histories, None, at("2024-01-02", 6), &config);
        let today = run_daily(&histories, Some(yesterday), at("2024-01-03", 10), &config);
        assert_eq!(today.mode, Mode::Results);
        assert_eq!(today.predictions.date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert!(matches!(today.predictions.mega, GameSlot::Ready { .. }));
    }

    #[test]
    fn test_analyze_mode_recomputes() {
        let config = EngineConfig::default();
        let histories = make_test_histories();
        let first = run_daily(&histories, None, at("2024-01-03", 6), &config);

        let mut stale = first.clone();
        stale.predictions.mega = GameSlot::Failed { reason: "ancien".to_string() };
        let second = run_daily(&histories, Some(stale), at("2024-01-03", 7), &config);
        assert_eq!(second.predictions, first.predictions);
    }

    #[test]
    fn test_load_histories_from_memory_store() {
        let store = MemoryStore::new(HistoryCaps::default());
        store.append(Game::Power, &test_draw("2024-01-02", &["03", "14", "22", "35", "47", "55"])).unwrap();
        let histories = load_histories(&store, &HistoryCaps::default());
        assert_eq!(histories.draws(Game::Power).len(), 1);
        assert!(histories.draws(Game::Mega).is_empty());
        assert_eq!(histories.get(Game::L535).unwrap().cap(), 600);
    }
}
