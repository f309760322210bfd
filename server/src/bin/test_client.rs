//! Headless test client exercising the full game protocol against a live
//! server: connect, find a game, auto-solve each puzzle, request new
//! rounds, disconnect. Run two of these against one server to watch a
//! complete duel.

use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{solver, Packet, Puzzle, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::{sleep, Duration};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name sent with the find-game request
    #[arg(short, long, default_value = "tester")]
    name: String,

    /// Rounds to play before disconnecting
    #[arg(short, long, default_value = "3")]
    rounds: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
    println!("Client socket bound to {}", socket.local_addr()?);

    let server_addr = args.server.parse::<SocketAddr>()?;

    println!("Sending connection request to {}", server_addr);
    let connect = Packet::Connect {
        client_version: PROTOCOL_VERSION,
    };
    send(&socket, server_addr, &connect).await?;

    // Keep the connection alive while idle (e.g. waiting for an opponent).
    {
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(2)).await;
                let heartbeat = Packet::Heartbeat {
                    timestamp: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or(Duration::from_secs(0))
                        .as_millis() as u64,
                };
                if let Ok(data) = serialize(&heartbeat) {
                    let _ = socket.send_to(&data, server_addr).await;
                }
            }
        });
    }

    let mut buf = [0u8; 2048];
    let mut session_id = String::new();
    let mut rounds_played = 0;

    loop {
        let (len, _) = socket.recv_from(&mut buf).await?;

        let packet = match deserialize::<Packet>(&buf[0..len]) {
            Ok(packet) => packet,
            Err(e) => {
                println!("Failed to deserialize packet: {}", e);
                continue;
            }
        };

        match packet {
            Packet::Connected { client_id } => {
                println!("Connected with client ID: {}", client_id);
                let find_game = Packet::FindGame {
                    name: args.name.clone(),
                };
                send(&socket, server_addr, &find_game).await?;
            }
            Packet::Disconnected { reason } => {
                println!("Rejected by server: {}", reason);
                return Ok(());
            }
            Packet::Waiting => {
                println!("Waiting for an opponent...");
            }
            Packet::GameFound {
                session_id: id,
                players,
                numbers,
            } => {
                let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
                println!("Game {} found: {:?}, numbers {:?}", id, names, numbers);
                session_id = id;
                submit_answer(&socket, server_addr, &session_id, &numbers).await?;
            }
            Packet::NewGame { numbers } => {
                println!("New round with numbers {:?}", numbers);
                submit_answer(&socket, server_addr, &session_id, &numbers).await?;
            }
            Packet::GameWon {
                winner,
                expression,
                elapsed_ms,
            } => {
                println!("{} won with {} in {}ms", winner, expression, elapsed_ms);
                rounds_played += 1;
                if rounds_played >= args.rounds {
                    break;
                }
                sleep(Duration::from_millis(500)).await;
                let request = Packet::RequestNewGame {
                    session_id: session_id.clone(),
                };
                send(&socket, server_addr, &request).await?;
            }
            Packet::InvalidSolution { expression } => {
                println!("Solution '{}' was rejected", expression);
            }
            Packet::PlayerDisconnected { name } => {
                println!("{} disconnected, game over", name);
                break;
            }
            Packet::MatchFailed { reason } => {
                println!("Match failed: {}", reason);
                break;
            }
            other => {
                println!("Unexpected packet: {:?}", other);
            }
        }
    }

    println!("Sending disconnect request");
    send(&socket, server_addr, &Packet::Disconnect).await?;
    println!("Test client finished");

    Ok(())
}

async fn submit_answer(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    session_id: &str,
    numbers: &Puzzle,
) -> Result<(), Box<dyn std::error::Error>> {
    match solver::solve(numbers) {
        Some(expression) => {
            println!("Submitting {}", expression);
            let submit = Packet::SubmitSolution {
                session_id: session_id.to_string(),
                expression,
            };
            send(socket, server_addr, &submit).await
        }
        None => {
            // Should never happen for server-issued puzzles.
            println!("No solution found for {:?}", numbers);
            Ok(())
        }
    }
}

async fn send(
    socket: &UdpSocket,
    addr: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
