//! Key schema for the club database.
//!
//! Every key the engine touches is built here. Parameterised keys take the
//! player id (`pid`), game id (`gid`), friend-group id (`fid`), opening code
//! (`eco`) or three-move sequence (`seq`) they are scoped to.

// =========================================================================
// Player
// =========================================================================

pub fn player_email(pid: &str) -> String {
    format!("player:{pid}:email")
}

pub fn player_wins(pid: &str) -> String {
    format!("player:{pid}:number_of_wins")
}

pub fn player_losses(pid: &str) -> String {
    format!("player:{pid}:number_of_losses")
}

pub fn player_draws(pid: &str) -> String {
    format!("player:{pid}:number_of_draws")
}

/// Game ids in the order they were recorded.
pub fn player_games_list(pid: &str) -> String {
    format!("player:{pid}:games-list")
}

/// Game ids as a set, for intersections.
pub fn player_games_set(pid: &str) -> String {
    format!("player:{pid}:games-set")
}

pub fn player_opponents(pid: &str) -> String {
    format!("player:{pid}:opponents")
}

pub fn player_opening_count(pid: &str, eco: &str) -> String {
    format!("player:{pid}:openings:{eco}:count")
}

pub fn player_most_freq_opening(pid: &str) -> String {
    format!("player:{pid}:most_freq_opening")
}

pub fn player_most_freq_opening_count(pid: &str) -> String {
    format!("player:{pid}:most_freq_opening:count")
}

/// Reverse pointer from a player to its friend group id.
pub fn player_friend_group(pid: &str) -> String {
    format!("player:{pid}:friend_group")
}

pub fn player_scheduled_games(pid: &str) -> String {
    format!("player:{pid}:scheduled_games")
}

pub fn player_scheduled_game_opponent(pid: &str, gid: &str) -> String {
    format!("player:{pid}:scheduled_games:{gid}:opponent")
}

// =========================================================================
// Game
// =========================================================================

pub fn game_winner(gid: &str) -> String {
    format!("game:{gid}:winner")
}

pub fn game_victory_status(gid: &str) -> String {
    format!("game:{gid}:victory_status")
}

pub fn game_turns(gid: &str) -> String {
    format!("game:{gid}:number_of_turns")
}

pub fn game_checks(gid: &str) -> String {
    format!("game:{gid}:number_of_checks")
}

pub fn game_white_player(gid: &str) -> String {
    format!("game:{gid}:white_player_id")
}

pub fn game_black_player(gid: &str) -> String {
    format!("game:{gid}:black_player_id")
}

pub fn game_opening_eco(gid: &str) -> String {
    format!("game:{gid}:opening_eco")
}

pub fn game_moves(gid: &str) -> String {
    format!("game:{gid}:moves")
}

/// Scan pattern matching every game's check counter.
pub const GAME_CHECKS_PATTERN: &str = "game:*:number_of_checks";

/// Extract the game id from a key matching [`GAME_CHECKS_PATTERN`].
pub fn game_id_from_checks_key(key: &str) -> Option<&str> {
    key.strip_prefix("game:")?.strip_suffix(":number_of_checks")
}

// =========================================================================
// Global
// =========================================================================

pub const GLOBAL_PLAYERS_EMAILS: &str = "global:players:emails";
pub const GLOBAL_PLAYERS_IDS: &str = "global:players:ids";
pub const GLOBAL_GAMES_IDS: &str = "global:games:ids";

pub fn global_friend_group(fid: &str) -> String {
    format!("global:friend_group:{fid}")
}

pub fn global_seq_games(seq: &str) -> String {
    format!("global:seq:{seq}:games")
}

pub fn global_seq_count(seq: &str) -> String {
    format!("global:seq:{seq}:count")
}

/// Scan pattern matching every sequence counter.
pub const GLOBAL_SEQ_COUNT_PATTERN: &str = "global:seq:*:count";

/// Extract the sequence from a key matching [`GLOBAL_SEQ_COUNT_PATTERN`].
pub fn seq_from_count_key(key: &str) -> Option<&str> {
    key.strip_prefix("global:seq:")?.strip_suffix(":count")
}

pub fn global_opening_count(eco: &str) -> String {
    format!("global:openings:{eco}:count")
}

// =========================================================================
// Analytics
// =========================================================================

pub const ANALYTICS_TOP_WINS: &str = "analytics:top_wins";
pub const ANALYTICS_TOP_LOSSES: &str = "analytics:top_losses";
pub const ANALYTICS_MOST_FREQ_OPENING: &str = "analytics:most_freq_opening";
pub const ANALYTICS_MOST_FREQ_OPENING_COUNT: &str = "analytics:most_freq_opening:count";
pub const ANALYTICS_SHORTEST_GAME: &str = "analytics:shortest_game";
pub const ANALYTICS_SHORTEST_GAME_TURNS: &str = "analytics:shortest_game:number_of_turns";
pub const ANALYTICS_LEAST_COMMON_SEQS: &str = "analytics:least_common_seqs";
pub const ANALYTICS_LEAST_COMMON_SEQ_COUNT: &str = "analytics:least_common_seq:count";
pub const ANALYTICS_MOST_COMMON_SEQS: &str = "analytics:most_common_seqs";
pub const ANALYTICS_MOST_COMMON_SEQ_COUNT: &str = "analytics:most_common_seq:count";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameterised_keys() {
        assert_eq!(player_wins("a-00"), "player:a-00:number_of_wins");
        assert_eq!(
            player_opening_count("p1", "B21"),
            "player:p1:openings:B21:count"
        );
        assert_eq!(
            player_scheduled_game_opponent("p1", "g1"),
            "player:p1:scheduled_games:g1:opponent"
        );
        assert_eq!(global_seq_count("e4,e5,Nf3"), "global:seq:e4,e5,Nf3:count");
    }

    #[test]
    fn test_key_parsers_invert_builders() {
        let key = global_seq_count("Kc7,Rh6,Nc4+");
        assert_eq!(seq_from_count_key(&key), Some("Kc7,Rh6,Nc4+"));
        assert_eq!(seq_from_count_key("global:openings:A00:count"), None);

        let key = game_checks("0ehBTCJp");
        assert_eq!(game_id_from_checks_key(&key), Some("0ehBTCJp"));
        assert_eq!(game_id_from_checks_key("game:x:number_of_turns"), None);
    }
}
