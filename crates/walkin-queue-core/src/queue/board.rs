//! Room occupancy.

use tracing::{debug, info};

use super::{Entity, QueueError, QueueResult};
use crate::db::Database;
use crate::models::{Room, RoomConfig};

/// Tracks which ticket holds which room.
///
/// `occupy` and `release` do not open a transaction themselves: the ticket
/// registry calls them inside the transaction that also moves the ticket.
pub struct RoomBoard<'a> {
    db: &'a Database,
}

impl<'a> RoomBoard<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Bring the stored room set in line with configuration.
    ///
    /// Configured rooms are inserted or renamed. Free rooms that are no longer
    /// configured are dropped; occupied ones stay until their ticket completes.
    pub fn sync(&self, rooms: &[RoomConfig]) -> QueueResult<()> {
        let tx = self.db.begin_immediate()?;
        for room in rooms {
            self.db.upsert_room(room)?;
        }
        let ids: Vec<u32> = rooms.iter().map(|r| r.id).collect();
        let removed = self.db.remove_unlisted_rooms(&ids)?;
        tx.commit()?;

        info!(rooms = rooms.len(), removed, "Room board synced");
        Ok(())
    }

    /// Mark `room_id` as held by `ticket_id`. Re-occupying with the same ticket
    /// is a no-op.
    pub fn occupy(&self, room_id: u32, ticket_id: &str) -> QueueResult<()> {
        let room = self.require_room(room_id)?;
        match room.occupant_ticket_id {
            Some(occupant) if occupant == ticket_id => Ok(()),
            Some(occupant) => Err(QueueError::RoomOccupied {
                room_id,
                occupant_ticket_id: occupant,
            }),
            None => {
                self.db.set_room_occupant(room_id, Some(ticket_id))?;
                debug!(room_id, ticket_id, "Room occupied");
                Ok(())
            }
        }
    }

    /// Free a room. No-op if it is already free.
    pub fn release(&self, room_id: u32) -> QueueResult<()> {
        let room = self.require_room(room_id)?;
        if !room.is_free() {
            self.db.set_room_occupant(room_id, None)?;
            debug!(room_id, "Room released");
        }
        Ok(())
    }

    /// All rooms with their current occupant, ordered by ID.
    pub fn snapshot(&self) -> QueueResult<Vec<Room>> {
        Ok(self.db.list_rooms()?)
    }

    pub fn get(&self, room_id: u32) -> QueueResult<Room> {
        self.require_room(room_id)
    }

    fn require_room(&self, room_id: u32) -> QueueResult<Room> {
        self.db
            .get_room(room_id)?
            .ok_or_else(|| QueueError::not_found(Entity::Room, room_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_rooms;
    use crate::models::{NewTicket, Priority};
    use crate::queue::TicketRegistry;
    use crate::QueueConfig;

    fn setup() -> (Database, QueueConfig) {
        let db = Database::open_in_memory().unwrap();
        let config = QueueConfig::default();
        RoomBoard::new(&db).sync(&config.rooms).unwrap();
        (db, config)
    }

    fn issue(db: &Database, config: &QueueConfig, name: &str) -> String {
        TicketRegistry::new(db, config)
            .create(&NewTicket::walk_in(name, Priority::Normal))
            .unwrap()
            .id
    }

    #[test]
    fn test_sync_seeds_configured_rooms() {
        let (db, _) = setup();
        let rooms = RoomBoard::new(&db).snapshot().unwrap();
        assert_eq!(rooms.len(), 4);
        assert!(rooms.iter().all(Room::is_free));
        assert_eq!(rooms[3].clinician, Some("Dr. Brown".into()));
    }

    #[test]
    fn test_occupy_idempotent_for_same_ticket() {
        let (db, config) = setup();
        let ticket = issue(&db, &config, "Ana");
        let board = RoomBoard::new(&db);

        board.occupy(1, &ticket).unwrap();
        board.occupy(1, &ticket).unwrap();
        assert_eq!(board.get(1).unwrap().occupant_ticket_id, Some(ticket));
    }

    #[test]
    fn test_occupy_conflict() {
        let (db, config) = setup();
        let first = issue(&db, &config, "Ana");
        let second = issue(&db, &config, "Bo");
        let board = RoomBoard::new(&db);

        board.occupy(2, &first).unwrap();
        let err = board.occupy(2, &second).unwrap_err();
        match err {
            QueueError::RoomOccupied {
                room_id,
                occupant_ticket_id,
            } => {
                assert_eq!(room_id, 2);
                assert_eq!(occupant_ticket_id, first);
            }
            other => panic!("expected RoomOccupied, got {:?}", other),
        }
    }

    #[test]
    fn test_release_idempotent() {
        let (db, config) = setup();
        let ticket = issue(&db, &config, "Ana");
        let board = RoomBoard::new(&db);

        board.occupy(3, &ticket).unwrap();
        board.release(3).unwrap();
        board.release(3).unwrap();
        assert!(board.get(3).unwrap().is_free());
    }

    #[test]
    fn test_unknown_room() {
        let (db, _) = setup();
        let board = RoomBoard::new(&db);
        assert!(matches!(
            board.release(99),
            Err(QueueError::NotFound { entity: Entity::Room, .. })
        ));
    }

    #[test]
    fn test_resync_keeps_occupied_rooms() {
        let (db, config) = setup();
        let ticket = issue(&db, &config, "Ana");
        let board = RoomBoard::new(&db);
        board.occupy(4, &ticket).unwrap();

        let shrunk: Vec<_> = default_rooms().into_iter().take(2).collect();
        board.sync(&shrunk).unwrap();

        let ids: Vec<_> = board.snapshot().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }
}
