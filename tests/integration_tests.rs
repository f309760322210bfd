//! Integration tests for the matchmaking and game components
//!
//! These tests validate cross-component interactions and real network behavior.

use bincode::{deserialize, serialize};
use server::lobby::{DisconnectOutcome, FindGameOutcome, Lobby, NewRoundOutcome, SubmitOutcome};
use server::puzzle::PuzzleGenerator;
use shared::{expr, solver, Packet, PlayerInfo, Puzzle, CARD_MAX, CARD_MIN, PROTOCOL_VERSION};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;
use tokio::time::sleep;

fn player(id: u32, name: &str) -> PlayerInfo {
    PlayerInfo {
        id,
        name: name.to_string(),
    }
}

/// Pairs two fresh players through the lobby, returning the new session.
fn pair(lobby: &mut Lobby, a: u32, b: u32) -> (String, Puzzle) {
    assert!(matches!(
        lobby.find_game(player(a, &format!("player-{}", a))),
        FindGameOutcome::Waiting
    ));
    match lobby.find_game(player(b, &format!("player-{}", b))) {
        FindGameOutcome::Matched {
            session_id, puzzle, ..
        } => (session_id, puzzle),
        other => panic!("expected a match, got {:?}", other),
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for network protocol validation
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
            Packet::FindGame {
                name: "Ada".to_string(),
            },
            Packet::GameFound {
                session_id: "abc123".to_string(),
                players: vec![player(1, "Ada"), player(2, "Grace")],
                numbers: [4, 6, 1, 1],
            },
            Packet::SubmitSolution {
                session_id: "abc123".to_string(),
                expression: "4*6*1*1".to_string(),
            },
            Packet::GameWon {
                winner: "Ada".to_string(),
                expression: "4*6*1*1".to_string(),
                elapsed_ms: 3_200,
            },
            Packet::PlayerDisconnected {
                name: "Grace".to_string(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();

            // Verify packet type matches (simplified check)
            match (&packet, &deserialized) {
                (Packet::Connect { .. }, Packet::Connect { .. }) => {}
                (Packet::FindGame { .. }, Packet::FindGame { .. }) => {}
                (Packet::GameFound { .. }, Packet::GameFound { .. }) => {}
                (Packet::SubmitSolution { .. }, Packet::SubmitSolution { .. }) => {}
                (Packet::GameWon { .. }, Packet::GameWon { .. }) => {}
                (Packet::PlayerDisconnected { .. }, Packet::PlayerDisconnected { .. }) => {}
                _ => panic!("Packet type mismatch after serialization"),
            }
        }
    }

    /// Tests real UDP socket communication
    #[tokio::test]
    async fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; 1024];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        sleep(Duration::from_millis(10)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        let test_packet = Packet::FindGame {
            name: "Ada".to_string(),
        };
        let serialized = serialize(&test_packet).unwrap();

        client_socket.send_to(&serialized, server_addr).unwrap();

        let mut buf = [0; 1024];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();

        match received_packet {
            Packet::FindGame { name } => assert_eq!(name, "Ada"),
            _ => panic!("Wrong packet type received"),
        }
    }
}

/// GAME RULE INTEGRATION TESTS
mod game_rule_tests {
    use super::*;

    /// Generator output must always satisfy the solvability checker.
    #[test]
    fn generated_puzzles_are_solvable() {
        let mut generator = PuzzleGenerator::with_seed(2024);

        for _ in 0..100 {
            let puzzle = generator.generate().expect("generation failed");
            assert!(solver::is_solvable(&puzzle), "unsolvable {:?}", puzzle);
            for &card in &puzzle {
                assert!((CARD_MIN..=CARD_MAX).contains(&card));
            }
        }
    }

    /// The solver and validator must agree: every expression the solver
    /// produces for a puzzle is accepted for that puzzle.
    #[test]
    fn solver_output_passes_validation() {
        let mut generator = PuzzleGenerator::with_seed(7);

        for _ in 0..100 {
            let puzzle = generator.generate().expect("generation failed");
            let expression = solver::solve(&puzzle).expect("solver disagreed with generator");
            assert!(
                expr::check_solution(&puzzle, &expression),
                "solver output '{}' rejected for {:?}",
                expression,
                puzzle
            );
        }
    }

    #[test]
    fn validator_examples_from_the_rules() {
        // Soundness: value decides, not shape.
        assert!(expr::check_solution(&[4, 6, 1, 1], "4*6*1*1"));
        assert!(!expr::check_solution(&[4, 6, 1, 1], "4+6+1+1"));

        // Multiset enforcement: 3 used twice, 1 used once.
        assert!(!expr::check_solution(&[1, 1, 2, 3], "1+2+3+3"));

        // Grammar rejection happens before any evaluation.
        assert!(!expr::check_solution(&[4, 6, 1, 1], "4*6; process.exit()"));
    }
}

/// MATCHMAKING AND SESSION FLOW TESTS
mod matchmaking_tests {
    use super::*;

    /// Full happy path: pair, reject an invalid claim, accept a valid one,
    /// roll a new round, win again.
    #[test]
    fn full_duel_flow() {
        let mut lobby = Lobby::new(PuzzleGenerator::with_seed(11));
        let (session_id, puzzle) = pair(&mut lobby, 1, 2);

        // A wrong claim only bounces back to the submitter.
        assert!(matches!(
            lobby.submit_solution(1, &session_id, "1+1"),
            SubmitOutcome::Rejected { .. }
        ));

        // The first valid claim wins the round for player 2.
        let expression = solver::solve(&puzzle).unwrap();
        match lobby.submit_solution(2, &session_id, &expression) {
            SubmitOutcome::Accepted {
                winner, recipients, ..
            } => {
                assert_eq!(winner, "player-2");
                assert_eq!(recipients, [1, 2]);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }

        // Late duplicate from the loser is dropped silently.
        assert!(matches!(
            lobby.submit_solution(1, &session_id, &expression),
            SubmitOutcome::Ignored
        ));

        // New round resets the session and both players can win again.
        let new_puzzle = match lobby.request_new_round(1, &session_id) {
            NewRoundOutcome::Started { puzzle, .. } => puzzle,
            other => panic!("expected a new round, got {:?}", other),
        };
        let expression = solver::solve(&new_puzzle).unwrap();
        assert!(matches!(
            lobby.submit_solution(1, &session_id, &expression),
            SubmitOutcome::Accepted { .. }
        ));
    }

    /// Participants pair strictly first-come-first-served.
    #[test]
    fn fifo_pairing_order() {
        let mut lobby = Lobby::new(PuzzleGenerator::with_seed(3));

        assert!(matches!(
            lobby.find_game(player(1, "A")),
            FindGameOutcome::Waiting
        ));
        match lobby.find_game(player(2, "B")) {
            FindGameOutcome::Matched { players, .. } => {
                assert_eq!(players[0].id, 1);
                assert_eq!(players[1].id, 2);
            }
            other => panic!("expected a match, got {:?}", other),
        }
        assert!(matches!(
            lobby.find_game(player(3, "C")),
            FindGameOutcome::Waiting
        ));

        // C is still first in line for the next arrival.
        match lobby.find_game(player(4, "D")) {
            FindGameOutcome::Matched { players, .. } => {
                assert_eq!(players[0].id, 3);
                assert_eq!(players[1].id, 4);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    /// A disconnect destroys only the leaver's session.
    #[test]
    fn disconnect_isolation() {
        let mut lobby = Lobby::new(PuzzleGenerator::with_seed(5));
        let (s1, _) = pair(&mut lobby, 1, 2);
        let (s2, puzzle2) = pair(&mut lobby, 3, 4);

        match lobby.remove_participant(1) {
            DisconnectOutcome::LeftSession(teardown) => {
                assert_eq!(teardown.session_id, s1);
                assert_eq!(teardown.remaining.id, 2);
            }
            other => panic!("expected teardown, got {:?}", other),
        }

        // The unrelated pair keeps playing.
        assert_eq!(lobby.session_count(), 1);
        let expression = solver::solve(&puzzle2).unwrap();
        assert!(matches!(
            lobby.submit_solution(3, &s2, &expression),
            SubmitOutcome::Accepted { .. }
        ));
    }

    /// Disconnecting a participant nobody knows is a complete no-op.
    #[test]
    fn disconnect_is_idempotent() {
        let mut lobby = Lobby::new(PuzzleGenerator::with_seed(9));
        pair(&mut lobby, 1, 2);

        assert_eq!(lobby.remove_participant(42), DisconnectOutcome::NoOp);
        assert_eq!(lobby.session_count(), 1);

        assert!(matches!(
            lobby.remove_participant(1),
            DisconnectOutcome::LeftSession(_)
        ));
        assert_eq!(lobby.remove_participant(1), DisconnectOutcome::NoOp);
        assert_eq!(lobby.session_count(), 0);
    }

    /// Stale session references are ignored, not errored.
    #[test]
    fn stale_references_are_silent() {
        let mut lobby = Lobby::new(PuzzleGenerator::with_seed(13));
        let (session_id, _) = pair(&mut lobby, 1, 2);
        lobby.remove_participant(2);

        assert!(matches!(
            lobby.submit_solution(1, &session_id, "4*6*1*1"),
            SubmitOutcome::Ignored
        ));
        assert!(matches!(
            lobby.request_new_round(1, &session_id),
            NewRoundOutcome::Ignored
        ));
    }
}

/// STRESS AND ERROR HANDLING TESTS
mod stress_tests {
    use super::*;

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_packet = Packet::FindGame {
            name: "Ada".to_string(),
        };
        let valid_data = serialize(&valid_packet).unwrap();

        // Test truncated packet
        let truncated_data = &valid_data[..valid_data.len() / 2];
        let result: Result<Packet, _> = deserialize(truncated_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize truncated packet"
        );

        // Test corrupted packet
        let mut corrupted_data = valid_data.clone();
        if !corrupted_data.is_empty() {
            corrupted_data[0] = 0xFF; // Corrupt first byte
        }
        let result: Result<Packet, _> = deserialize(&corrupted_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize corrupted packet"
        );

        // Test empty packet
        let empty_data = vec![];
        let result: Result<Packet, _> = deserialize(&empty_data);
        assert!(result.is_err(), "Should fail to deserialize empty packet");
    }

    /// Many independent sessions coexist and tear down independently.
    #[test]
    fn many_concurrent_sessions() {
        let mut lobby = Lobby::new(PuzzleGenerator::with_seed(17));

        let mut sessions = Vec::new();
        for i in 0..20 {
            let a = i * 2 + 1;
            let b = i * 2 + 2;
            sessions.push(pair(&mut lobby, a, b));
        }
        assert_eq!(lobby.session_count(), 20);

        // Finish half of them, tear down the rest via disconnects.
        for (i, (session_id, puzzle)) in sessions.iter().enumerate() {
            let a = (i as u32) * 2 + 1;
            if i % 2 == 0 {
                let expression = solver::solve(puzzle).unwrap();
                assert!(matches!(
                    lobby.submit_solution(a, session_id, &expression),
                    SubmitOutcome::Accepted { .. }
                ));
            } else {
                assert!(matches!(
                    lobby.remove_participant(a),
                    DisconnectOutcome::LeftSession(_)
                ));
            }
        }

        assert_eq!(lobby.session_count(), 10);
    }
}
