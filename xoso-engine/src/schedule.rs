use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use xoso_db::models::Game;

/// Jours de tirage des jeux non quotidiens. XSMB et Lotto 5/35 tirent tous les jours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSchedule {
    pub mega: Vec<Weekday>,
    pub power: Vec<Weekday>,
    pub max3d: Vec<Weekday>,
}

impl Default for DrawSchedule {
    fn default() -> Self {
        Self {
            mega: vec![Weekday::Wed, Weekday::Fri, Weekday::Sun],
            power: vec![Weekday::Tue, Weekday::Thu, Weekday::Sat],
            max3d: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
        }
    }
}

impl DrawSchedule {
    /// `None` pour un jeu quotidien.
    pub fn days(&self, game: Game) -> Option<&[Weekday]> {
        match game {
            Game::Mega => Some(&self.mega),
            Game::Power => Some(&self.power),
            Game::Max3d => Some(&self.max3d),
            Game::Xsmb | Game::L535 => None,
        }
    }

    pub fn is_draw_day(&self, game: Game, date: NaiveDate) -> bool {
        self.days(game)
            .is_none_or(|days| days.contains(&date.weekday()))
    }
}
