//! # Math 24 Game Server Library
//!
//! This library provides the authoritative server implementation for the
//! two-player "make 24" arithmetic duel. It pairs waiting players, issues
//! each pair a shared puzzle of four cards, validates every submitted
//! expression against the game rules, and broadcasts outcomes to both
//! participants.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! Players asking for a game are paired first-come-first-served: the new
//! arrival is matched with the longest-waiting participant, or queued when
//! nobody is waiting. A participant is held by the queue or by exactly one
//! session, never both.
//!
//! ### Session Authority
//! Each pair plays inside a `GameSession` with a collision-resistant
//! identifier, the current puzzle, a status of playing or finished, and an
//! audit trail of accepted solutions. The first valid submission wins the
//! round; a new-round request re-rolls the puzzle for the same pair; a
//! disconnect tears the whole session down and notifies the remaining
//! player.
//!
//! ### Solution Validation
//! Submitted expressions are untrusted text. A dedicated tokenizer and
//! recursive-descent evaluator (in the `shared` crate) enforce the
//! grammar, the exactly-once card usage, standard operator precedence, and
//! the 24 goal check. Nothing submitted by a client is ever executed as
//! code.
//!
//! ## Architecture Design
//!
//! ### Serialized Event Loop
//! All game-state mutations funnel through a single `tokio::select!` loop
//! in [`network::Server::run`]. Background tasks only receive datagrams,
//! send queued packets, and watch for client timeouts; they never touch
//! the lobby. This makes every match, submission, new round and disconnect
//! an atomic step relative to the others.
//!
//! ### UDP-Based Communication
//! Clients exchange bincode-encoded [`shared::Packet`] values over UDP.
//! Liveness is tracked per client from any received packet (clients send
//! heartbeats while idle); a silent client is disconnected by the timeout
//! checker through the same path as an explicit leave.
//!
//! ## Module Organization
//!
//! - [`client_manager`] — connection lifecycle, addresses, display names,
//!   liveness timeouts, capacity.
//! - [`lobby`] — the matchmaking queue, the session registry, and the
//!   operations that mutate them; returns transport-free outcome values.
//! - [`session`] — the per-pair state machine.
//! - [`puzzle`] — solvable-puzzle generation with a retry cap.
//! - [`network`] — UDP socket handling, packet dispatch, and the main
//!   event loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind the server and allow up to 64 concurrent clients.
//!     let mut server = Server::new("127.0.0.1:8080", 64).await?;
//!
//!     // Run the event loop: accept connections, pair players, validate
//!     // submissions, and broadcast outcomes until shutdown.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod lobby;
pub mod network;
pub mod puzzle;
pub mod session;
mod utils;
