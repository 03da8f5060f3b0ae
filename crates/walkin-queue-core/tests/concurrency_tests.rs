//! Several sessions sharing one queue.

use std::sync::{Arc, Barrier};
use std::thread;

use walkin_queue_core::models::{NewTicket, Priority, TicketStatus};
use walkin_queue_core::{QueueConfig, QueueError, QueueService};

fn file_service(dir: &tempfile::TempDir) -> QueueService {
    let config = QueueConfig {
        database_path: Some(dir.path().join("queue.db").to_string_lossy().into_owned()),
        ..Default::default()
    };
    QueueService::open(config).unwrap()
}

fn issue_from_threads(queue: Arc<QueueService>, threads: usize, per_thread: usize) -> Vec<u64> {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread)
                    .map(|i| {
                        queue
                            .create_ticket(&NewTicket::walk_in(
                                format!("Walk-in {}-{}", t, i),
                                Priority::Normal,
                            ))
                            .unwrap()
                            .sequence
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut sequences: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    sequences.sort_unstable();
    sequences
}

#[test]
fn test_concurrent_creates_get_unique_numbers() {
    let queue = Arc::new(QueueService::open(QueueConfig::default()).unwrap());
    let sequences = issue_from_threads(Arc::clone(&queue), 8, 10);

    let expected: Vec<u64> = (1..=80).collect();
    assert_eq!(sequences, expected);

    // Waiting line is in issue order
    let waiting = queue.waiting_queue().unwrap();
    assert_eq!(waiting.len(), 80);
    assert!(waiting.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

#[test]
fn test_concurrent_creates_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(file_service(&dir));
    let sequences = issue_from_threads(Arc::clone(&queue), 4, 10);

    let expected: Vec<u64> = (1..=40).collect();
    assert_eq!(sequences, expected);
    assert_eq!(queue.queued().unwrap().len(), 40);
}

#[test]
fn test_racing_starts_on_one_room() {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(file_service(&dir));
    let tickets: Vec<_> = (0..2)
        .map(|i| {
            queue
                .create_ticket(&NewTicket::walk_in(format!("Racer {}", i), Priority::Normal))
                .unwrap()
        })
        .collect();

    let barrier = Arc::new(Barrier::new(tickets.len()));
    let handles: Vec<_> = tickets
        .iter()
        .map(|ticket| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            let id = ticket.id.clone();
            thread::spawn(move || {
                barrier.wait();
                queue.start_treatment(&id, 1)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let occupied = results
        .iter()
        .filter(|r| matches!(r, Err(QueueError::RoomOccupied { .. })))
        .count();
    assert_eq!(winners.len(), 1);
    assert_eq!(occupied, 1);

    let rooms = queue.room_summary().unwrap();
    let room1 = rooms.iter().find(|r| r.room.id == 1).unwrap();
    assert_eq!(room1.room.occupant_ticket_id.as_deref(), Some(winners[0].id.as_str()));

    // Loser is still waiting
    let waiting = queue.waiting_queue().unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].status, TicketStatus::Waiting);
}

#[test]
fn test_readers_never_see_half_applied_transition() {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(file_service(&dir));
    let ids: Vec<String> = (0..20)
        .map(|i| {
            queue
                .create_ticket(&NewTicket::walk_in(format!("Patient {}", i), Priority::Normal))
                .unwrap()
                .id
        })
        .collect();

    let writer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for id in &ids {
                queue.start_treatment(id, 1).unwrap();
                queue.complete(id).unwrap();
            }
        })
    };

    let reader = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for _ in 0..50 {
                for summary in queue.room_summary().unwrap() {
                    if let Some(occupant) = &summary.occupant {
                        assert_eq!(occupant.status, TicketStatus::InTreatment);
                        assert_eq!(occupant.room_id, Some(summary.room.id));
                    }
                }
                for ticket in queue.active_treatments().unwrap() {
                    assert!(ticket.room_id.is_some());
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(queue.dashboard_stats().unwrap().treated_today, 20);
}
