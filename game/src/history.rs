use std::collections::BTreeSet;

use log::info;
use serde::{Deserialize, Serialize};

use crate::storage::{HISTORY_KEY, KeyValueStore, StorageError, load_json, save_json};

pub const DEFAULT_PLAYER: &str = "Player";

/// One finished round as kept in the `gameHistory` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub id: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub score: u32,
    /// Levels completed.
    pub level: u32,
    /// Seconds.
    pub duration: u64,
    pub is_new_record: bool,
    #[serde(default = "default_player")]
    pub player: String,
}

fn default_player() -> String {
    DEFAULT_PLAYER.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    pub total_games: usize,
    pub best_score: u32,
    /// Rounded to the nearest whole point.
    pub average_score: u32,
    pub total_players: usize,
}

#[derive(Debug)]
pub struct GameHistory<S> {
    store: S,
    rounds: Vec<RoundSummary>,
}

impl<S: KeyValueStore> GameHistory<S> {
    /// Loads the stored list; a malformed list starts over empty.
    pub fn open(store: S) -> Self {
        let rounds = load_json(&store, HISTORY_KEY).unwrap_or_default();
        Self { store, rounds }
    }

    pub fn rounds(&self) -> &[RoundSummary] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Appends and persists. The entry stays in memory even if the write
    /// fails.
    pub fn record(&mut self, summary: RoundSummary) -> Result<(), StorageError> {
        info!(
            "round recorded: score {} level {} ({}s)",
            summary.score, summary.level, summary.duration
        );
        self.rounds.push(summary);
        save_json(&self.store, HISTORY_KEY, &self.rounds)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.rounds.clear();
        self.store.remove(HISTORY_KEY)
    }

    pub fn report(&self) -> HistoryReport {
        let total_games = self.rounds.len();
        let best_score = self.rounds.iter().map(|r| r.score).max().unwrap_or(0);
        let average_score = if total_games == 0 {
            0
        } else {
            let sum: u64 = self.rounds.iter().map(|r| u64::from(r.score)).sum();
            (sum as f64 / total_games as f64).round() as u32
        };
        let total_players = self
            .rounds
            .iter()
            .map(|r| r.player.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        HistoryReport {
            total_games,
            best_score,
            average_score,
            total_players,
        }
    }
}
