use serde::{Deserialize, Serialize};

pub mod expr;
pub mod solver;

pub const TARGET: f64 = 24.0;
// Solver tolerance is strictly tighter than the acceptance tolerance, so a
// hand the solver declares solvable is never rejected when the equivalent
// expression is submitted by a player.
pub const SOLVE_EPSILON: f64 = 1e-6;
pub const GOAL_EPSILON: f64 = 1e-4;
pub const CARD_MIN: u8 = 1;
pub const CARD_MAX: u8 = 13;
pub const PUZZLE_SIZE: usize = 4;
pub const PROTOCOL_VERSION: u32 = 1;

/// The four cards a round must be solved with.
pub type Puzzle = [u8; PUZZLE_SIZE];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat {
        timestamp: u64,
    },
    FindGame {
        name: String,
    },
    SubmitSolution {
        session_id: String,
        expression: String,
    },
    RequestNewGame {
        session_id: String,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    Waiting,
    GameFound {
        session_id: String,
        players: Vec<PlayerInfo>,
        numbers: Puzzle,
    },
    GameWon {
        winner: String,
        expression: String,
        elapsed_ms: u64,
    },
    InvalidSolution {
        expression: String,
    },
    NewGame {
        numbers: Puzzle,
    },
    PlayerDisconnected {
        name: String,
    },
    MatchFailed {
        reason: String,
    },
}
