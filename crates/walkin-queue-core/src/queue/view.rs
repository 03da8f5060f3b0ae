//! Derived, read-only queue projections.
//!
//! Nothing here is stored: every call recomputes from the current tickets
//! and rooms, read inside one snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{local_midnight, QueueResult};
use crate::config::{QueueConfig, QueueOrder};
use crate::db::{Database, TicketOrder};
use crate::models::{RoomState, RoomSummary, Ticket, TicketFilter, TicketStatus};

/// A waiting ticket with its place in line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedTicket {
    pub ticket: Ticket,
    /// 0-based place in the waiting line
    pub position: usize,
    pub estimated_wait_minutes: u32,
}

/// Aggregates for the clinician dashboard. Display only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DashboardStats {
    /// Tickets completed since local midnight
    pub treated_today: u32,
    /// Mean registration-to-treatment time of those tickets, in minutes
    pub avg_wait_minutes: u32,
    /// Mean treatment duration of those tickets, in minutes
    pub avg_treatment_minutes: u32,
    pub waiting_count: u32,
    pub active_rooms: u32,
}

impl DashboardStats {
    /// Compute averages over tickets completed today.
    pub fn from_completed(completed: &[Ticket], waiting_count: u32, active_rooms: u32) -> Self {
        Self {
            treated_today: completed.len() as u32,
            avg_wait_minutes: mean_minutes(completed.iter().filter_map(Ticket::wait_time)),
            avg_treatment_minutes: mean_minutes(completed.iter().filter_map(Ticket::treatment_time)),
            waiting_count,
            active_rooms,
        }
    }
}

fn mean_minutes(durations: impl Iterator<Item = chrono::Duration>) -> u32 {
    let (total, count) = durations.fold((0i64, 0i64), |(total, count), d| {
        (total + d.num_seconds().max(0), count + 1)
    });
    if count == 0 {
        0
    } else {
        (total / count / 60) as u32
    }
}

/// What the public kiosk display shows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayBoard {
    /// Tickets in treatment, with their rooms
    pub now_serving: Vec<Ticket>,
    /// Head of the waiting line
    pub up_next: Vec<QueuedTicket>,
    pub waiting_count: u32,
}

/// `max(minimum, (position + 1) * per_position)` minutes.
pub fn estimated_wait_minutes(position: usize, per_position: u32, minimum: u32) -> u32 {
    let places = u32::try_from(position).unwrap_or(u32::MAX).saturating_add(1);
    places.saturating_mul(per_position).max(minimum)
}

/// Read-only projections over the registry and room board.
pub struct QueueView<'a> {
    db: &'a Database,
    config: &'a QueueConfig,
}

impl<'a> QueueView<'a> {
    pub fn new(db: &'a Database, config: &'a QueueConfig) -> Self {
        Self { db, config }
    }

    /// Waiting tickets in service order (registration order unless the
    /// priority policy is configured).
    pub fn waiting_queue(&self) -> QueueResult<Vec<Ticket>> {
        self.load_waiting()
    }

    /// Static per-position estimate; not based on service history.
    pub fn estimated_wait(&self, position: usize) -> u32 {
        estimated_wait_minutes(
            position,
            self.config.minutes_per_position,
            self.config.minimum_wait_minutes,
        )
    }

    /// Waiting line with positions and estimates.
    pub fn queued(&self) -> QueueResult<Vec<QueuedTicket>> {
        Ok(self.number(self.load_waiting()?))
    }

    /// Every room with its status and occupant.
    pub fn room_summary(&self) -> QueueResult<Vec<RoomSummary>> {
        let _snapshot = self.db.begin_read()?;
        self.load_room_summary()
    }

    pub fn dashboard_stats(&self, now: DateTime<Utc>) -> QueueResult<DashboardStats> {
        let _snapshot = self.db.begin_read()?;
        let completed = self
            .db
            .list_tickets(&TicketFilter::completed_since(local_midnight(now)), TicketOrder::CompletedDesc)?;
        let waiting = self.db.count_tickets_with_status(TicketStatus::Waiting)?;
        let active_rooms = self
            .db
            .list_rooms()?
            .iter()
            .filter(|room| !room.is_free())
            .count() as u32;
        Ok(DashboardStats::from_completed(&completed, waiting, active_rooms))
    }

    /// Kiosk board: who is being seen, and who is up next.
    pub fn display_board(&self) -> QueueResult<DisplayBoard> {
        let _snapshot = self.db.begin_read()?;
        let now_serving = self
            .db
            .list_tickets(&TicketFilter::status(TicketStatus::InTreatment), TicketOrder::UpdatedDesc)?;
        let waiting = self.load_waiting()?;
        let waiting_count = waiting.len() as u32;

        let mut up_next = self.number(waiting);
        up_next.truncate(self.config.display_upcoming);

        Ok(DisplayBoard {
            now_serving,
            up_next,
            waiting_count,
        })
    }

    fn load_waiting(&self) -> QueueResult<Vec<Ticket>> {
        let order = match self.config.queue_order {
            QueueOrder::Fifo => TicketOrder::CreatedAsc,
            QueueOrder::PriorityThenFifo => TicketOrder::PriorityThenCreatedAsc,
        };
        Ok(self
            .db
            .list_tickets(&TicketFilter::status(TicketStatus::Waiting), order)?)
    }

    fn load_room_summary(&self) -> QueueResult<Vec<RoomSummary>> {
        let rooms = self.db.list_rooms()?;
        let mut active = self
            .db
            .list_tickets(&TicketFilter::status(TicketStatus::InTreatment), TicketOrder::UpdatedDesc)?;

        Ok(rooms
            .into_iter()
            .map(|room| {
                let occupant = room.occupant_ticket_id.as_ref().and_then(|id| {
                    active
                        .iter()
                        .position(|t| &t.id == id)
                        .map(|i| active.swap_remove(i))
                });
                let status = if occupant.is_some() {
                    RoomState::Active
                } else {
                    RoomState::Empty
                };
                RoomSummary {
                    room,
                    status,
                    occupant,
                }
            })
            .collect())
    }

    fn number(&self, waiting: Vec<Ticket>) -> Vec<QueuedTicket> {
        waiting
            .into_iter()
            .enumerate()
            .map(|(position, ticket)| QueuedTicket {
                estimated_wait_minutes: self.estimated_wait(position),
                ticket,
                position,
            })
            .collect()
    }
}
