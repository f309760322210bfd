//! Server network layer handling UDP communications and event dispatch

use crate::client_manager::ClientManager;
use crate::lobby::{
    DisconnectOutcome, FindGameOutcome, Lobby, NewRoundOutcome, SessionTeardown, SubmitOutcome,
};
use crate::puzzle::PuzzleGenerator;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerInfo, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the event loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    SendToMany {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Main server coordinating networking and game state
///
/// The lobby is owned by the server and only ever touched from `run()`,
/// so every mutation (match, submit, new round, disconnect) executes as
/// one non-interleaved step. Outgoing packets are queued to the sender
/// task and never block the mutation that produced them.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    lobby: Lobby,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, max_clients: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            lobby: Lobby::new(PuzzleGenerator::new()),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToMany { packet, addrs } => {
                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send packet to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let clients_guard = clients.read().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Queues a packet for every given client that is still connected.
    async fn send_to_clients(&self, packet: &Packet, client_ids: &[u32]) {
        let addrs: Vec<SocketAddr> = {
            let clients = self.clients.read().await;
            client_ids
                .iter()
                .filter_map(|id| clients.addr_of(*id))
                .collect()
        };

        if addrs.is_empty() {
            return;
        }

        if let Err(e) = self.game_tx.send(GameMessage::SendToMany {
            packet: packet.clone(),
            addrs,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn client_at(&self, addr: SocketAddr) -> Option<u32> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        // Any packet from a known client counts as liveness.
        {
            let mut clients = self.clients.write().await;
            if let Some(client_id) = clients.find_client_by_addr(addr) {
                clients.touch(client_id);
            }
        }

        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(client_version, addr).await;
            }
            Packet::Heartbeat { .. } => {}
            Packet::FindGame { name } => {
                self.handle_find_game(name, addr).await;
            }
            Packet::SubmitSolution {
                session_id,
                expression,
            } => {
                self.handle_submit(&session_id, &expression, addr).await;
            }
            Packet::RequestNewGame { session_id } => {
                self.handle_new_round(&session_id, addr).await;
            }
            Packet::Disconnect => {
                if let Some(client_id) = self.client_at(addr).await {
                    self.handle_disconnect(client_id).await;
                }
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            let response = Packet::Disconnected {
                reason: "Protocol version mismatch".to_string(),
            };
            self.send_packet(&response, addr).await;
            return;
        }

        // A reconnect from the same address replaces the old connection,
        // including its queue entry or session.
        if let Some(existing_id) = self.client_at(addr).await {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.handle_disconnect(existing_id).await;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        if let Some(client_id) = client_id {
            let response = Packet::Connected { client_id };
            self.send_packet(&response, addr).await;
        } else {
            let response = Packet::Disconnected {
                reason: "Server full".to_string(),
            };
            self.send_packet(&response, addr).await;
        }
    }

    async fn handle_find_game(&mut self, name: String, addr: SocketAddr) {
        let Some(client_id) = self.client_at(addr).await else {
            warn!("Find-game request from unknown address {}", addr);
            return;
        };

        let display_name = {
            let mut clients = self.clients.write().await;
            clients.set_name(client_id, name);
            clients.display_name(client_id)
        };
        let Some(display_name) = display_name else {
            return;
        };

        // Re-queuing while still in a session abandons the opponent.
        if let Some(teardown) = self.lobby.leave_session(client_id) {
            self.notify_departure(&teardown, &display_name).await;
        }

        let player = PlayerInfo {
            id: client_id,
            name: display_name,
        };

        match self.lobby.find_game(player) {
            FindGameOutcome::Waiting => {
                self.send_packet(&Packet::Waiting, addr).await;
            }
            FindGameOutcome::Matched {
                session_id,
                players,
                puzzle,
            } => {
                let packet = Packet::GameFound {
                    session_id,
                    players: players.to_vec(),
                    numbers: puzzle,
                };
                self.send_to_clients(&packet, &[players[0].id, players[1].id])
                    .await;
            }
            FindGameOutcome::Failed { participants } => {
                let packet = Packet::MatchFailed {
                    reason: "Could not start a game, please try again".to_string(),
                };
                self.send_to_clients(&packet, &[participants[0].id, participants[1].id])
                    .await;
            }
        }
    }

    async fn handle_submit(&mut self, session_id: &str, expression: &str, addr: SocketAddr) {
        let Some(client_id) = self.client_at(addr).await else {
            return;
        };

        match self.lobby.submit_solution(client_id, session_id, expression) {
            SubmitOutcome::Accepted {
                winner,
                expression,
                elapsed_ms,
                recipients,
            } => {
                let packet = Packet::GameWon {
                    winner,
                    expression,
                    elapsed_ms,
                };
                self.send_to_clients(&packet, &recipients).await;
            }
            SubmitOutcome::Rejected { expression } => {
                // Rejections go to the submitter only.
                self.send_packet(&Packet::InvalidSolution { expression }, addr)
                    .await;
            }
            SubmitOutcome::Ignored => {}
        }
    }

    async fn handle_new_round(&mut self, session_id: &str, addr: SocketAddr) {
        let Some(client_id) = self.client_at(addr).await else {
            return;
        };

        match self.lobby.request_new_round(client_id, session_id) {
            NewRoundOutcome::Started { puzzle, recipients } => {
                self.send_to_clients(&Packet::NewGame { numbers: puzzle }, &recipients)
                    .await;
            }
            NewRoundOutcome::Failed { recipients } => {
                let packet = Packet::MatchFailed {
                    reason: "Could not start a new round".to_string(),
                };
                self.send_to_clients(&packet, &recipients).await;
            }
            NewRoundOutcome::Ignored => {}
        }
    }

    /// Funnel for both explicit disconnects and timeouts. Safe to call
    /// twice for the same client; the second pass finds nothing to do.
    async fn handle_disconnect(&mut self, client_id: u32) {
        let display_name = {
            let mut clients = self.clients.write().await;
            let name = clients.display_name(client_id);
            clients.remove_client(&client_id);
            name
        };
        let display_name = display_name.unwrap_or_else(|| format!("Player {}", client_id));

        match self.lobby.remove_participant(client_id) {
            DisconnectOutcome::LeftSession(teardown) => {
                self.notify_departure(&teardown, &display_name).await;
            }
            DisconnectOutcome::LeftQueue | DisconnectOutcome::NoOp => {}
        }
    }

    async fn notify_departure(&self, teardown: &SessionTeardown, departed_name: &str) {
        let packet = Packet::PlayerDisconnected {
            name: departed_name.to_string(),
        };
        self.send_to_clients(&packet, &[teardown.remaining.id]).await;
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut stats_interval = interval(Duration::from_secs(30));

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.handle_disconnect(client_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Periodic load monitoring
                _ = stats_interval.tick() => {
                    let client_count = {
                        let clients = self.clients.read().await;
                        clients.len()
                    };

                    if client_count > 0 {
                        debug!(
                            "{} clients connected, {} waiting, {} active sessions",
                            client_count,
                            self.lobby.waiting_count(),
                            self.lobby.session_count()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}
