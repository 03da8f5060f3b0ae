//! Room database operations.

use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{Room, RoomConfig};

impl Database {
    /// Insert or rename a configured room. Occupancy is left untouched.
    pub fn upsert_room(&self, room: &RoomConfig) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO rooms (room_id, name, clinician) VALUES (?1, ?2, ?3)
            ON CONFLICT(room_id) DO UPDATE SET
                name = excluded.name,
                clinician = excluded.clinician
            "#,
            params![room.id, room.name, room.clinician],
        )?;
        Ok(())
    }

    /// Drop free rooms that are not in `keep`. Occupied rooms always stay.
    pub fn remove_unlisted_rooms(&self, keep: &[u32]) -> DbResult<usize> {
        let placeholders = (1..=keep.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = if keep.is_empty() {
            "DELETE FROM rooms WHERE occupant_ticket_id IS NULL".to_string()
        } else {
            format!(
                "DELETE FROM rooms WHERE occupant_ticket_id IS NULL AND room_id NOT IN ({})",
                placeholders
            )
        };
        Ok(self.conn.execute(&sql, params_from_iter(keep.iter()))?)
    }

    /// Get a room by ID.
    pub fn get_room(&self, room_id: u32) -> DbResult<Option<Room>> {
        self.conn
            .query_row(
                "SELECT room_id, name, clinician, occupant_ticket_id FROM rooms WHERE room_id = ?",
                [room_id],
                read_room,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Room currently held by a ticket, if any.
    pub fn get_room_by_occupant(&self, ticket_id: &str) -> DbResult<Option<Room>> {
        self.conn
            .query_row(
                "SELECT room_id, name, clinician, occupant_ticket_id FROM rooms WHERE occupant_ticket_id = ?",
                [ticket_id],
                read_room,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all rooms by ID.
    pub fn list_rooms(&self) -> DbResult<Vec<Room>> {
        let mut stmt = self.conn.prepare(
            "SELECT room_id, name, clinician, occupant_ticket_id FROM rooms ORDER BY room_id",
        )?;
        let rows = stmt.query_map([], read_room)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Set or clear a room's occupant.
    pub fn set_room_occupant(&self, room_id: u32, ticket_id: Option<&str>) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE rooms SET occupant_ticket_id = ?2 WHERE room_id = ?1",
            params![room_id, ticket_id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn read_room(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        clinician: row.get(2)?,
        occupant_ticket_id: row.get(3)?,
    })
}
