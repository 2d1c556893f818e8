//! Stateful property testing for the aggregate engine.
//!
//! Uses proptest-state-machine to ingest random game records (including
//! repeated ids) and checks the leaderboard, extremal set, friend group and
//! frequency invariants against a plain in-memory reference model.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest, prop_state_machine};
use tokio::runtime::Runtime;

use gameclub_engine::{
    EngineConfig, GameRecord, Ingestor, LeaderboardEntry, MoveSet, Winner, cluster, model,
    queries,
};
use gameclub_store::{MemoryStore, Store};

/// Leaderboard capacity under test, small enough to force trimming.
const CAPACITY: usize = 3;

const PLAYERS: [&str; 6] = ["ann", "bo", "cy", "dee", "eli", "fay"];
const MOVES: [&str; 4] = ["e4", "e5", "Nf3", "d4"];
const OPENINGS: [&str; 3] = ["A00", "B21", "C20"];

/// A game record to ingest.
#[derive(Debug, Clone)]
pub struct RecordGame {
    pub game_id: String,
    pub white: usize,
    pub black: usize,
    pub winner: Winner,
    pub moves: Vec<String>,
    pub eco: String,
}

impl RecordGame {
    fn to_record(&self) -> GameRecord {
        GameRecord {
            game_id: self.game_id.clone(),
            moveset: MoveSet::List(self.moves.clone()),
            winner: self.winner,
            victory_status: "resign".to_string(),
            number_of_turns: self.moves.len() as u32,
            white_player_id: PLAYERS[self.white].to_string(),
            black_player_id: PLAYERS[self.black].to_string(),
            opening_eco: self.eco.clone(),
        }
    }
}

/// Reference model of the aggregates.
#[derive(Clone, Debug, Default)]
pub struct EngineModel {
    pub game_ids: BTreeSet<String>,
    pub wins: BTreeMap<String, i64>,
    pub losses: BTreeMap<String, i64>,
    pub seq_counts: BTreeMap<String, i64>,
    pub opening_counts: BTreeMap<String, i64>,
    pub opening_leader: Option<(String, i64)>,
    /// Connected components of the "played against" graph.
    pub groups: Vec<BTreeSet<String>>,
}

impl EngineModel {
    fn connect(&mut self, a: &str, b: &str) {
        let mut merged: BTreeSet<String> = [a.to_string(), b.to_string()].into();
        self.groups.retain(|group| {
            if group.contains(a) || group.contains(b) {
                merged.extend(group.iter().cloned());
                false
            } else {
                true
            }
        });
        self.groups.push(merged);
    }

    fn group_of(&self, player: &str) -> BTreeSet<String> {
        self.groups
            .iter()
            .find(|group| group.contains(player))
            .cloned()
            .unwrap_or_default()
    }

    /// Expected (count, categories) for the least or most common sequences.
    fn extreme(&self, least: bool) -> (Option<i64>, BTreeSet<String>) {
        let counts = self.seq_counts.values().copied();
        let target = if least { counts.min() } else { counts.max() };
        let categories = self
            .seq_counts
            .iter()
            .filter(|(_, count)| Some(**count) == target)
            .map(|(seq, _)| seq.clone())
            .collect();
        (target, categories)
    }
}

impl ReferenceStateMachine for EngineModel {
    type State = Self;
    type Transition = RecordGame;

    fn init_state() -> BoxedStrategy<Self::State> {
        Just(Self::default()).boxed()
    }

    fn transitions(_state: &Self::State) -> BoxedStrategy<Self::Transition> {
        (
            0u8..10,
            0..PLAYERS.len(),
            1..PLAYERS.len(),
            prop_oneof![
                Just(Winner::White),
                Just(Winner::Black),
                Just(Winner::Draw)
            ],
            prop::collection::vec(proptest::sample::select(MOVES.to_vec()), 0..7),
            proptest::sample::select(OPENINGS.to_vec()),
        )
            .prop_map(|(id, white, offset, winner, moves, eco)| RecordGame {
                game_id: format!("g{id}"),
                white,
                black: (white + offset) % PLAYERS.len(),
                winner,
                moves: moves.into_iter().map(str::to_string).collect(),
                eco: eco.to_string(),
            })
            .boxed()
    }

    fn apply(mut state: Self::State, game: &Self::Transition) -> Self::State {
        // Repeated ids are skipped under the default policy.
        if !state.game_ids.insert(game.game_id.clone()) {
            return state;
        }

        for seq in model::three_move_sequences(&game.moves) {
            *state.seq_counts.entry(seq).or_default() += 1;
        }

        let white = PLAYERS[game.white];
        let black = PLAYERS[game.black];
        let decided = match game.winner {
            Winner::White => Some((white, black)),
            Winner::Black => Some((black, white)),
            Winner::Draw => None,
        };
        if let Some((winner, loser)) = decided {
            *state.wins.entry(winner.to_string()).or_default() += 1;
            *state.losses.entry(loser.to_string()).or_default() += 1;
        }

        let count = state.opening_counts.entry(game.eco.clone()).or_default();
        *count += 1;
        let count = *count;
        if state
            .opening_leader
            .as_ref()
            .is_none_or(|(_, best)| count > *best)
        {
            state.opening_leader = Some((game.eco.clone(), count));
        }

        state.connect(white, black);
        state
    }
}

/// Test harness driving the real ingestor.
pub struct EngineTestHarness {
    runtime: Runtime,
    store: MemoryStore,
    ingestor: Ingestor<MemoryStore>,
}

impl EngineTestHarness {
    fn new() -> Self {
        let runtime = Runtime::new().expect("Failed to create tokio runtime");
        let store = MemoryStore::new();
        let config = EngineConfig::default().with_leaderboard_capacity(CAPACITY);
        let ingestor = Ingestor::new(store.clone(), config);
        Self {
            runtime,
            store,
            ingestor,
        }
    }
}

impl StateMachineTest for EngineTestHarness {
    type SystemUnderTest = Self;
    type Reference = EngineModel;

    fn init_test(
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        Self::new()
    }

    fn apply(
        state: Self::SystemUnderTest,
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        state
            .runtime
            .block_on(state.ingestor.add_game_record(&transition.to_record()))
            .expect("ingestion failed");
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        state.runtime.block_on(async {
            let mut tx = state.store.begin().await.unwrap();

            // Leaderboards: sorted, capped, no repeats, true top scores.
            let wins = queries::top_wins(tx.as_mut()).await.unwrap();
            check_leaderboard("top wins", &wins, &ref_state.wins);
            let losses = queries::top_losses(tx.as_mut()).await.unwrap();
            check_leaderboard("top losses", &losses, &ref_state.losses);

            // Extremal sets hold exactly the categories at the extreme.
            for least in [true, false] {
                let found = if least {
                    queries::least_common_sequences(tx.as_mut()).await.unwrap()
                } else {
                    queries::most_common_sequences(tx.as_mut()).await.unwrap()
                };
                let (count, categories) = ref_state.extreme(least);
                assert_eq!(found.count, count, "least={least}");
                assert_eq!(found.categories, categories, "least={least}");
            }

            // Friend groups are exactly the connected components.
            for player in PLAYERS {
                let members = cluster::members(tx.as_mut(), player).await.unwrap();
                assert_eq!(members, ref_state.group_of(player), "group of {player}");
            }

            let leader = queries::most_frequent_opening(tx.as_mut()).await.unwrap();
            assert_eq!(
                leader.map(|l| (l.category, l.count)),
                ref_state.opening_leader.clone()
            );

            // Registered ids are never counted twice.
            let registered = tx.scard(gameclub_store::keys::GLOBAL_GAMES_IDS).await.unwrap();
            assert_eq!(registered, ref_state.game_ids.len());
        });
    }
}

fn check_leaderboard(name: &str, board: &[LeaderboardEntry], scores: &BTreeMap<String, i64>) {
    assert!(board.len() <= CAPACITY, "{name} over capacity");
    assert!(
        board.windows(2).all(|pair| pair[0].score >= pair[1].score),
        "{name} out of order"
    );
    let ids: BTreeSet<_> = board.iter().map(|e| e.entity_id.clone()).collect();
    assert_eq!(ids.len(), board.len(), "duplicate entry in {name}");
    for entry in board {
        assert_eq!(
            Some(&entry.score),
            scores.get(&entry.entity_id),
            "stale entry in {name}"
        );
    }
    let mut expected: Vec<i64> = scores.values().copied().collect();
    expected.sort_unstable_by(|a, b| b.cmp(a));
    expected.truncate(CAPACITY);
    let found: Vec<i64> = board.iter().map(|e| e.score).collect();
    assert_eq!(found, expected, "{name} scores");
}

prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 5000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn engine_state_machine_test(sequential 1..40 => EngineTestHarness);
}

proptest! {
    #[test]
    fn three_move_windows_cover_every_position(moves in prop::collection::vec("[a-h][1-8]", 0..12)) {
        let windows = model::three_move_sequences(&moves);
        prop_assert_eq!(windows.len(), moves.len().saturating_sub(2));
        for (i, window) in windows.iter().enumerate() {
            prop_assert_eq!(window, &moves[i..i + 3].join(","));
        }
    }
}
