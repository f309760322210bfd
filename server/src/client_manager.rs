//! Client connection management for the matchmaking server
//!
//! This module handles the server-side view of connected clients:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Display-name registration with a deterministic fallback
//! - Connection health monitoring via last-seen timestamps
//! - Client capacity enforcement and address tracking
//!
//! Game-level ownership (queue membership, sessions) lives in the lobby;
//! this manager only knows who is reachable and at which address.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a client may stay silent before it is considered gone.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client and its connection metadata
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Display name from the last find-game request; empty until then
    pub name: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            name: String::new(),
            last_seen: Instant::now(),
        }
    }

    /// Marks the client as recently active.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if no packets have been received from this client
    /// within the timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Provides centralized control over connections, enforces the capacity
/// limit, and answers address/name lookups for the network layer. Client
/// IDs start from 1 and increment for each new connection.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at
    /// capacity. Logs the new connection for server monitoring.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they
    /// were already gone. Handles both explicit disconnections and
    /// timeout cleanup.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    ///
    /// Used to associate incoming packets with existing connections.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Records the display name a client asked to play under.
    pub fn set_name(&mut self, client_id: u32, name: String) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.name = name;
        }
    }

    /// The client's display name, substituting "Player {id}" when the
    /// client never provided one (or provided an empty string).
    pub fn display_name(&self, client_id: u32) -> Option<String> {
        self.clients.get(&client_id).map(|client| {
            let trimmed = client.name.trim();
            if trimmed.is_empty() {
                format!("Player {}", client.id)
            } else {
                trimmed.to_string()
            }
        })
    }

    /// Refreshes the liveness timestamp for a client.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    /// Collects clients that have exceeded the connection timeout
    ///
    /// Does not remove them; the main loop funnels each ID through the
    /// same disconnect path as an explicit leave so queue and session
    /// cleanup happen exactly once, in order.
    pub fn check_timeouts(&self) -> Vec<u32> {
        self.clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert!(client.name.is_empty());
    }

    #[test]
    fn test_client_timeout() {
        let addr = test_addr();
        let mut client = Client::new(1, addr);

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client() {
        let mut manager = ClientManager::new(2);
        let addr = test_addr();

        let client_id = manager.add_client(addr).unwrap();
        assert_eq!(client_id, 1);
        assert_eq!(manager.len(), 1);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let addr1 = test_addr();
        let addr2 = test_addr2();

        let client_id1 = manager.add_client(addr1).unwrap();
        let _client_id2 = manager.add_client(addr2).unwrap();

        assert_eq!(manager.find_client_by_addr(addr1), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_addr_lookup() {
        let mut manager = ClientManager::new(2);
        let addr = test_addr();
        let client_id = manager.add_client(addr).unwrap();

        assert_eq!(manager.addr_of(client_id), Some(addr));
        assert_eq!(manager.addr_of(999), None);
    }

    #[test]
    fn test_display_name_fallback() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert_eq!(
            manager.display_name(client_id),
            Some(format!("Player {}", client_id))
        );

        manager.set_name(client_id, "   ".to_string());
        assert_eq!(
            manager.display_name(client_id),
            Some(format!("Player {}", client_id))
        );

        manager.set_name(client_id, "Ada".to_string());
        assert_eq!(manager.display_name(client_id), Some("Ada".to_string()));

        assert_eq!(manager.display_name(999), None);
    }

    #[test]
    fn test_check_timeouts_reports_without_removing() {
        let mut manager = ClientManager::new(3);
        let id1 = manager.add_client(test_addr()).unwrap();
        let id2 = manager.add_client(test_addr2()).unwrap();

        assert!(manager.check_timeouts().is_empty());

        if let Some(client) = manager.clients.get_mut(&id1) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let timed_out = manager.check_timeouts();
        assert_eq!(timed_out, vec![id1]);
        // Removal is the disconnect path's job.
        assert_eq!(manager.len(), 2);
        assert!(manager.addr_of(id2).is_some());
    }

    #[test]
    fn test_touch_refreshes_liveness() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        if let Some(client) = manager.clients.get_mut(&client_id) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }
        assert_eq!(manager.check_timeouts(), vec![client_id]);

        manager.touch(client_id);
        assert!(manager.check_timeouts().is_empty());
    }
}
