//! Records accepted by the ingestion orchestrator.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::EngineError;

/// A club member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player id.
    pub user_id: String,
    /// Contact address, registered in the global email set.
    pub email: String,
}

/// A game scheduled between two players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub game_id: String,
    pub player_1: String,
    pub player_2: String,
}

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// Outcome of a completed game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    #[serde(alias = "White")]
    White,
    #[serde(alias = "Black")]
    Black,
    #[serde(alias = "Draw")]
    Draw,
}

impl Winner {
    /// The winning side, if any.
    pub fn color(self) -> Option<Color> {
        match self {
            Winner::White => Some(Color::White),
            Winner::Black => Some(Color::Black),
            Winner::Draw => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Winner::White => "white",
            Winner::Black => "black",
            Winner::Draw => "draw",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moves of a game, either already split or as exported text.
///
/// Exported text is either a list literal (`['e4', 'e5', 'Nf3']`, with
/// single or double quotes) or plain whitespace-separated SAN (`e4 e5 Nf3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveSet {
    List(Vec<String>),
    Encoded(String),
}

impl MoveSet {
    /// Split into individual moves.
    pub fn parse(&self) -> Result<Vec<String>, EngineError> {
        match self {
            MoveSet::List(moves) => Ok(moves.clone()),
            MoveSet::Encoded(text) => {
                let text = text.trim();
                if text.starts_with('[') {
                    serde_json::from_str(&text.replace('\'', "\"")).map_err(|e| {
                        EngineError::MalformedCategorySource(format!("{text:?}: {e}"))
                    })
                } else {
                    Ok(text.split_whitespace().map(str::to_string).collect())
                }
            }
        }
    }
}

impl From<Vec<&str>> for MoveSet {
    fn from(moves: Vec<&str>) -> Self {
        MoveSet::List(moves.into_iter().map(str::to_string).collect())
    }
}

/// A completed game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub moveset: MoveSet,
    pub winner: Winner,
    #[serde(default)]
    pub victory_status: String,
    #[serde(deserialize_with = "deserialize_turns")]
    pub number_of_turns: u32,
    pub white_player_id: String,
    pub black_player_id: String,
    pub opening_eco: String,
}

impl GameRecord {
    /// Player id on the given side.
    pub fn player(&self, color: Color) -> &str {
        match color {
            Color::White => &self.white_player_id,
            Color::Black => &self.black_player_id,
        }
    }
}

/// Turn counts arrive as numbers or as numeric strings.
fn deserialize_turns<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Turns {
        Number(u32),
        Text(String),
    }

    match Turns::deserialize(deserializer)? {
        Turns::Number(n) => Ok(n),
        Turns::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Contiguous three-move windows, each joined with commas (`"d4,d5,c4"`).
pub fn three_move_sequences(moves: &[String]) -> Vec<String> {
    moves.windows(3).map(|window| window.join(",")).collect()
}

/// Number of moves giving check.
pub fn count_checks(moves: &[String]) -> usize {
    moves.iter().filter(|m| m.contains('+')).count()
}
