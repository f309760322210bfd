//! Per-pair game session state machine.

use crate::utils::get_timestamp;
use serde::Serialize;
use shared::{PlayerInfo, Puzzle};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Playing,
    Finished,
}

/// An accepted solution, kept as the round's audit trail. Serializable
/// so outcome recording can hand it to an external stats sink as-is.
#[derive(Debug, Clone, Serialize)]
pub struct SolutionRecord {
    pub player_name: String,
    pub expression: String,
    /// Unix milliseconds at acceptance.
    pub accepted_at: u64,
}

/// A paired round between exactly two participants. Created in `Playing`
/// with a freshly generated puzzle; a winning submission finishes it; a
/// new-round request rewinds it to `Playing` with new cards under the same
/// identifier and pair.
#[derive(Debug)]
pub struct GameSession {
    pub id: String,
    pub players: [PlayerInfo; 2],
    pub puzzle: Puzzle,
    pub status: SessionStatus,
    pub winner: Option<u32>,
    pub started_at: Instant,
    pub solutions: Vec<SolutionRecord>,
}

impl GameSession {
    pub fn new(id: String, players: [PlayerInfo; 2], puzzle: Puzzle) -> Self {
        Self {
            id,
            players,
            puzzle,
            status: SessionStatus::Playing,
            winner: None,
            started_at: Instant::now(),
            solutions: Vec::new(),
        }
    }

    pub fn is_member(&self, client_id: u32) -> bool {
        self.players.iter().any(|p| p.id == client_id)
    }

    pub fn player(&self, client_id: u32) -> Option<&PlayerInfo> {
        self.players.iter().find(|p| p.id == client_id)
    }

    pub fn opponent_of(&self, client_id: u32) -> Option<&PlayerInfo> {
        if !self.is_member(client_id) {
            return None;
        }
        self.players.iter().find(|p| p.id != client_id)
    }

    pub fn member_ids(&self) -> [u32; 2] {
        [self.players[0].id, self.players[1].id]
    }

    /// Records a winning submission and finishes the round. Returns the
    /// winner's name and the elapsed round time in milliseconds, or `None`
    /// when the submitter is not a member or the round is already over —
    /// a submission racing an in-flight new-round request is dropped
    /// without touching any state.
    pub fn record_win(&mut self, client_id: u32, expression: &str) -> Option<(String, u64)> {
        if self.status != SessionStatus::Playing {
            return None;
        }
        let name = self.player(client_id)?.name.clone();

        self.status = SessionStatus::Finished;
        self.winner = Some(client_id);
        self.solutions.push(SolutionRecord {
            player_name: name.clone(),
            expression: expression.to_string(),
            accepted_at: get_timestamp(),
        });

        Some((name, self.started_at.elapsed().as_millis() as u64))
    }

    /// Swaps in a fresh puzzle and rewinds to `Playing`: winner cleared,
    /// solution log cleared, round timer restarted. Identifier and pair
    /// are untouched.
    pub fn start_round(&mut self, puzzle: Puzzle) {
        self.puzzle = puzzle;
        self.status = SessionStatus::Playing;
        self.winner = None;
        self.solutions.clear();
        self.started_at = Instant::now();
    }
}
