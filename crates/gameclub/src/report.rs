//! Analytics and friend-group reports over a loaded store.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use gameclub_engine::queries::{self, PlayerRecord, ShortestGame};
use gameclub_engine::{EngineError, ExtremalSet, FrequencyLeader, LeaderboardEntry};
use gameclub_store::Transaction;
use serde::Serialize;

/// Sequences listed per extremal set in text output.
const SEQUENCE_SAMPLE: usize = 5;

const RULE: &str = "------------------------------------------";

/// Club-wide analytics.
#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub shortest_game: Option<ShortestGame>,
    pub check_counts: BTreeMap<String, i64>,
    pub most_frequent_opening: Option<FrequencyLeader>,
    pub most_common_sequences: ExtremalSet,
    pub least_common_sequences: ExtremalSet,
    pub top_wins: Vec<LeaderboardEntry>,
    pub top_losses: Vec<LeaderboardEntry>,
}

impl AnalyticsReport {
    pub async fn collect(tx: &mut dyn Transaction) -> Result<Self, EngineError> {
        Ok(Self {
            shortest_game: queries::shortest_game(tx).await?,
            check_counts: queries::check_counts(tx).await?,
            most_frequent_opening: queries::most_frequent_opening(tx).await?,
            most_common_sequences: queries::most_common_sequences(tx).await?,
            least_common_sequences: queries::least_common_sequences(tx).await?,
            top_wins: queries::top_wins(tx).await?,
            top_losses: queries::top_losses(tx).await?,
        })
    }
}

impl fmt::Display for AnalyticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}\nShortest Game:\n")?;
        match &self.shortest_game {
            Some(game) => writeln!(f, "{} ({} turns)\n", game.game_id, game.number_of_turns)?,
            None => writeln!(f, "(no games)\n")?,
        }

        writeln!(f, "{RULE}\nCheck Counts (all games):\n")?;
        for (game_id, count) in &self.check_counts {
            writeln!(f, "{game_id}: {count}")?;
        }
        writeln!(f)?;

        writeln!(f, "{RULE}\nMost Frequent Opening:\n")?;
        match &self.most_frequent_opening {
            Some(leader) => writeln!(f, "{} ({} games)\n", leader.category, leader.count)?,
            None => writeln!(f, "(no games)\n")?,
        }

        write_sequences(f, "Most Common 3-Move Sequences", &self.most_common_sequences)?;
        write_sequences(f, "Least Common 3-Move Sequences", &self.least_common_sequences)?;

        write_leaderboard(f, "Top Wins", &self.top_wins)?;
        write_leaderboard(f, "Top Losses", &self.top_losses)
    }
}

fn write_sequences(f: &mut fmt::Formatter<'_>, title: &str, set: &ExtremalSet) -> fmt::Result {
    writeln!(f, "{RULE}\n{title}:\n")?;
    writeln!(f, "Used: {}", set.count.unwrap_or(0))?;
    writeln!(f, "Sequences:")?;
    for seq in set.categories.iter().take(SEQUENCE_SAMPLE) {
        writeln!(f, "- {seq}")?;
    }
    if set.categories.len() > SEQUENCE_SAMPLE {
        writeln!(f, "  (+{} more)", set.categories.len() - SEQUENCE_SAMPLE)?;
    }
    writeln!(f)
}

fn write_leaderboard(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    entries: &[LeaderboardEntry],
) -> fmt::Result {
    writeln!(f, "{RULE}\n{title}:\n")?;
    for (rank, entry) in entries.iter().enumerate() {
        writeln!(f, "{:>2}. {} ({})", rank + 1, entry.entity_id, entry.score)?;
    }
    writeln!(f)
}

/// Friend-group and history view of one player.
#[derive(Debug, Serialize)]
pub struct PlayerReport {
    pub player: String,
    pub record: PlayerRecord,
    pub most_frequent_opening: Option<FrequencyLeader>,
    pub match_history: Vec<String>,
    pub scheduled_games: Vec<String>,
    pub friend_group: BTreeSet<String>,
    pub friends_of_friends: BTreeSet<String>,
    pub stronger_friends_of_friends: BTreeSet<String>,
}

impl PlayerReport {
    pub async fn collect(tx: &mut dyn Transaction, player: &str) -> Result<Self, EngineError> {
        Ok(Self {
            player: player.to_string(),
            record: queries::player_record(tx, player).await?,
            most_frequent_opening: queries::player_most_frequent_opening(tx, player).await?,
            match_history: queries::match_history(tx, player).await?,
            scheduled_games: queries::scheduled_games(tx, player).await?,
            friend_group: queries::friend_group(tx, player).await?,
            friends_of_friends: queries::friends_of_friends(tx, player).await?,
            stronger_friends_of_friends: queries::stronger_friends_of_friends(tx, player).await?,
        })
    }
}

impl fmt::Display for PlayerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let PlayerRecord {
            wins,
            losses,
            draws,
        } = self.record;
        writeln!(f, "{RULE}\nPlayer '{}':\n", self.player)?;
        writeln!(f, "Record: {wins} wins, {losses} losses, {draws} draws")?;
        if let Some(leader) = &self.most_frequent_opening {
            writeln!(f, "Most used opening: {} ({} games)", leader.category, leader.count)?;
        }
        writeln!(f, "Match history: {}", join(&self.match_history))?;
        writeln!(f, "Scheduled games: {}", join(&self.scheduled_games))?;

        writeln!(f, "Friend group: {} players", self.friend_group.len())?;
        // Large sets are summarised.
        if self.friends_of_friends.len() > 20 {
            writeln!(f, "FoF: (set of {} players)", self.friends_of_friends.len())?;
        } else {
            writeln!(f, "FoF: {}", join(&self.friends_of_friends))?;
        }
        writeln!(f, "Filtered FoF: {}", join(&self.stronger_friends_of_friends))
    }
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let out = items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if out.is_empty() {
        "(none)".to_string()
    } else {
        out
    }
}

/// Everything printed after a load.
#[derive(Debug, Serialize)]
pub struct Report {
    pub analytics: AnalyticsReport,
    pub players: Vec<PlayerReport>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.analytics)?;
        for player in &self.players {
            write!(f, "{player}")?;
        }
        Ok(())
    }
}
