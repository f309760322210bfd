//! Matchmaking queue, session registry, and the operations that mutate them.
//!
//! `Lobby` is the single authority over shared game state. The network
//! layer feeds it one event at a time and maps the returned outcome values
//! onto packets; nothing in this module knows about sockets, so every game
//! rule is testable without a live transport. A participant is held by the
//! waiting queue or by exactly one session, never both.

use crate::puzzle::PuzzleGenerator;
use crate::session::{GameSession, SessionStatus};
use crate::utils::generate_session_id;
use log::{info, warn};
use shared::{expr, PlayerInfo, Puzzle};
use std::collections::{HashMap, VecDeque};

/// FIFO queue of participants waiting for an opponent.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: VecDeque<PlayerInfo>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self {
            waiting: VecDeque::new(),
        }
    }

    /// Appends a participant. Any previous entry for the same participant
    /// is dropped first, so repeated find-game requests replace rather
    /// than duplicate a spot in line.
    pub fn enqueue(&mut self, player: PlayerInfo) {
        self.remove(player.id);
        self.waiting.push_back(player);
    }

    /// Pops the longest-waiting participant.
    pub fn pop_waiting(&mut self) -> Option<PlayerInfo> {
        self.waiting.pop_front()
    }

    /// Drops a participant from the queue. No-op when absent.
    pub fn remove(&mut self, client_id: u32) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|p| p.id != client_id);
        before != self.waiting.len()
    }

    pub fn contains(&self, client_id: u32) -> bool {
        self.waiting.iter().any(|p| p.id == client_id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

/// Directory of live sessions, keyed by session identifier.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, GameSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, session: GameSession) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<&GameSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GameSession> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<GameSession> {
        self.sessions.remove(id)
    }

    pub fn find_id_by_participant(&self, client_id: u32) -> Option<String> {
        self.sessions
            .values()
            .find(|session| session.is_member(client_id))
            .map(|session| session.id.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FindGameOutcome {
    /// No opponent available; the requester is queued.
    Waiting,
    /// Paired with the longest-waiting participant into a fresh session.
    Matched {
        session_id: String,
        players: [PlayerInfo; 2],
        puzzle: Puzzle,
    },
    /// Puzzle generation gave up; both participants land back in the menu.
    Failed { participants: [PlayerInfo; 2] },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted {
        winner: String,
        expression: String,
        elapsed_ms: u64,
        recipients: [u32; 2],
    },
    /// Reported to the submitter only.
    Rejected { expression: String },
    /// Unknown session, non-member, or round already over.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewRoundOutcome {
    Started {
        puzzle: Puzzle,
        recipients: [u32; 2],
    },
    /// Puzzle generation gave up; the session is torn down.
    Failed { recipients: [u32; 2] },
    Ignored,
}

/// Who is left behind when a session is torn down.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTeardown {
    pub session_id: String,
    pub remaining: PlayerInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectOutcome {
    /// Dropped from the waiting queue.
    LeftQueue,
    /// Session destroyed; the remaining member should be notified.
    LeftSession(SessionTeardown),
    /// Participant held no game state.
    NoOp,
}

/// The authoritative matchmaking and session state.
pub struct Lobby {
    queue: MatchQueue,
    registry: SessionRegistry,
    generator: PuzzleGenerator,
}

impl Lobby {
    pub fn new(generator: PuzzleGenerator) -> Self {
        Self {
            queue: MatchQueue::new(),
            registry: SessionRegistry::new(),
            generator,
        }
    }

    pub fn waiting_count(&self) -> usize {
        self.queue.len()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn session(&self, id: &str) -> Option<&GameSession> {
        self.registry.get(id)
    }

    /// Pairs the requester with the longest-waiting participant, or queues
    /// it when nobody is waiting. Callers must tear down any session the
    /// requester still belongs to first (see [`Lobby::leave_session`]).
    pub fn find_game(&mut self, player: PlayerInfo) -> FindGameOutcome {
        // A repeated request replaces the stale queue entry, which also
        // guarantees the requester can never be matched with itself.
        self.queue.remove(player.id);

        let Some(opponent) = self.queue.pop_waiting() else {
            info!("Player {} ({}) is waiting for an opponent", player.id, player.name);
            self.queue.enqueue(player);
            return FindGameOutcome::Waiting;
        };

        let puzzle = match self.generator.generate() {
            Ok(puzzle) => puzzle,
            Err(e) => {
                warn!(
                    "Matchmaking for players {} and {} failed: {}",
                    opponent.id, player.id, e
                );
                return FindGameOutcome::Failed {
                    participants: [opponent, player],
                };
            }
        };

        let session_id = self.unused_session_id();
        let players = [opponent, player];
        info!(
            "Matched players {} ({}) and {} ({}) into session {}",
            players[0].id, players[0].name, players[1].id, players[1].name, session_id
        );

        self.registry.insert(GameSession::new(
            session_id.clone(),
            players.clone(),
            puzzle,
        ));

        FindGameOutcome::Matched {
            session_id,
            players,
            puzzle,
        }
    }

    /// Tears down the session a participant belongs to, reporting who is
    /// left to notify. `None` when the participant is in no session.
    pub fn leave_session(&mut self, client_id: u32) -> Option<SessionTeardown> {
        let session_id = self.registry.find_id_by_participant(client_id)?;
        let session = self.registry.remove(&session_id)?;
        let remaining = session.opponent_of(client_id)?.clone();

        info!(
            "Session {} closed, player {} ({}) remains",
            session_id, remaining.id, remaining.name
        );

        Some(SessionTeardown {
            session_id,
            remaining,
        })
    }

    /// Checks a submitted expression against the session's current puzzle.
    /// Stale references and late submissions are silent no-ops.
    pub fn submit_solution(
        &mut self,
        client_id: u32,
        session_id: &str,
        expression: &str,
    ) -> SubmitOutcome {
        let Some(session) = self.registry.get_mut(session_id) else {
            return SubmitOutcome::Ignored;
        };
        if !session.is_member(client_id) || session.status != SessionStatus::Playing {
            return SubmitOutcome::Ignored;
        }

        if let Err(reason) = expr::validate(&session.puzzle, expression) {
            info!(
                "Rejected submission '{}' from player {} in session {}: {}",
                expression, client_id, session_id, reason
            );
            return SubmitOutcome::Rejected {
                expression: expression.to_string(),
            };
        }

        let Some((winner, elapsed_ms)) = session.record_win(client_id, expression) else {
            return SubmitOutcome::Ignored;
        };
        info!(
            "Player {} won session {} with '{}' in {}ms",
            winner, session_id, expression, elapsed_ms
        );

        SubmitOutcome::Accepted {
            winner,
            expression: expression.to_string(),
            elapsed_ms,
            recipients: session.member_ids(),
        }
    }

    /// Re-rolls the session's puzzle and rewinds it to playing. Allowed
    /// from either status; stale references are silent no-ops.
    pub fn request_new_round(&mut self, client_id: u32, session_id: &str) -> NewRoundOutcome {
        let is_member = self
            .registry
            .get(session_id)
            .is_some_and(|session| session.is_member(client_id));
        if !is_member {
            return NewRoundOutcome::Ignored;
        }

        match self.generator.generate() {
            Ok(puzzle) => {
                let Some(session) = self.registry.get_mut(session_id) else {
                    return NewRoundOutcome::Ignored;
                };
                session.start_round(puzzle);
                info!("Session {} started a new round", session_id);
                NewRoundOutcome::Started {
                    puzzle,
                    recipients: session.member_ids(),
                }
            }
            Err(e) => {
                let Some(session) = self.registry.remove(session_id) else {
                    return NewRoundOutcome::Ignored;
                };
                warn!("Session {} closed, new round failed: {}", session_id, e);
                NewRoundOutcome::Failed {
                    recipients: session.member_ids(),
                }
            }
        }
    }

    /// Removes a participant from whichever structure holds it. Idempotent:
    /// removing an unknown participant changes nothing.
    pub fn remove_participant(&mut self, client_id: u32) -> DisconnectOutcome {
        if self.queue.remove(client_id) {
            info!("Player {} left the waiting queue", client_id);
            return DisconnectOutcome::LeftQueue;
        }

        match self.leave_session(client_id) {
            Some(teardown) => DisconnectOutcome::LeftSession(teardown),
            None => DisconnectOutcome::NoOp,
        }
    }

    fn unused_session_id(&self) -> String {
        loop {
            let id = generate_session_id();
            if self.registry.get(&id).is_none() {
                return id;
            }
        }
    }
}
