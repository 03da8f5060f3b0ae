//! Ticket lifecycle and room assignment engine.
//!
//! - [`PatientDirectory`]: identity records, search, visit history
//! - [`TicketRegistry`]: numbering and the status state machine
//! - [`RoomBoard`]: room occupancy
//! - [`QueueView`]: derived waiting line, estimates and dashboard figures
//!
//! Components borrow a [`Database`](crate::db::Database). Registry
//! transitions open their own write transaction, so ticket status and room
//! occupancy always change together.

mod board;
mod directory;
mod registry;
mod view;

pub use board::*;
pub use directory::*;
pub use registry::*;
pub use view::*;

use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use thiserror::Error;

use crate::db::DbError;
use crate::models::TicketStatus;

/// Kind of record a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Patient,
    Ticket,
    Room,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Patient => "Patient",
            Entity::Ticket => "Ticket",
            Entity::Room => "Room",
        })
    }
}

/// Queue errors. None of these are retried internally.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The ticket is in `from`, which does not lead to `to`
    #[error("Ticket {ticket_id} cannot move from {from} to {to}")]
    InvalidTransition {
        ticket_id: String,
        from: TicketStatus,
        to: TicketStatus,
    },

    #[error("Room {room_id} is occupied by ticket {occupant_ticket_id}")]
    RoomOccupied {
        room_id: u32,
        occupant_ticket_id: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        QueueError::Database(DbError::Sqlite(e))
    }
}

impl QueueError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        QueueError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Start of the local calendar day containing `now`, in UTC.
pub fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_day = now.with_timezone(&Local).date_naive();
    local_day
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        // Midnight skipped by a DST jump: fall back to the UTC day start
        .unwrap_or_else(|| Utc.from_utc_datetime(&now.date_naive().and_time(chrono::NaiveTime::MIN)))
}
