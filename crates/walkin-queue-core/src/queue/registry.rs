//! Ticket issuing and status transitions.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{local_midnight, Entity, PatientDirectory, QueueError, QueueResult, RoomBoard};
use crate::config::{QueueConfig, QueueOrder};
use crate::db::{Database, TicketOrder};
use crate::models::{
    format_ticket_number, timestamp_now, NewTicket, Ticket, TicketFilter, TicketStatus,
};

/// Single source of truth for tickets.
///
/// Each write runs in one `BEGIN IMMEDIATE` transaction: numbering, and the
/// paired ticket/room updates, either fully apply or not at all.
pub struct TicketRegistry<'a> {
    db: &'a Database,
    config: &'a QueueConfig,
}

impl<'a> TicketRegistry<'a> {
    pub fn new(db: &'a Database, config: &'a QueueConfig) -> Self {
        Self { db, config }
    }

    /// Issue a ticket, registering the patient first if needed.
    pub fn create(&self, request: &NewTicket) -> QueueResult<Ticket> {
        let tx = self.db.begin_immediate()?;

        let patient = PatientDirectory::new(self.db, self.config)
            .find_or_create(request.patient_id.as_deref(), request.patient_name.as_deref())?;

        let sequence = self.db.next_ticket_sequence()?;
        let now = timestamp_now();
        let ticket = Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            number: format_ticket_number(&self.config.ticket_prefix, sequence, self.config.ticket_digits),
            sequence,
            patient,
            status: TicketStatus::Waiting,
            priority: request.priority,
            service_type: request.service_type_or_default(),
            room_id: None,
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        self.db.insert_ticket(&ticket)?;
        tx.commit()?;

        info!(
            ticket_id = %ticket.id,
            number = %ticket.number,
            priority = %ticket.priority,
            "Ticket issued"
        );
        Ok(ticket)
    }

    /// Move a waiting ticket into `room_id`.
    ///
    /// Replaying the call for a ticket already in that room returns it
    /// unchanged.
    pub fn start_treatment(&self, ticket_id: &str, room_id: u32) -> QueueResult<Ticket> {
        let tx = self.db.begin_immediate()?;
        let ticket = self.get(ticket_id)?;

        if ticket.status == TicketStatus::InTreatment && ticket.room_id == Some(room_id) {
            return Ok(ticket);
        }

        let ticket = self.begin_treatment(ticket, room_id)?;
        tx.commit()?;
        Ok(ticket)
    }

    /// Start treatment for whoever is next in line. `None` if nobody waits.
    pub fn call_next(&self, room_id: u32) -> QueueResult<Option<Ticket>> {
        let tx = self.db.begin_immediate()?;

        let order = match self.config.queue_order {
            QueueOrder::Fifo => TicketOrder::CreatedAsc,
            QueueOrder::PriorityThenFifo => TicketOrder::PriorityThenCreatedAsc,
        };
        let next = self
            .db
            .list_tickets(&TicketFilter::status(TicketStatus::Waiting), order)?
            .into_iter()
            .next();

        let Some(ticket) = next else {
            // still report a bad room id
            RoomBoard::new(self.db).get(room_id)?;
            return Ok(None);
        };

        let ticket = self.begin_treatment(ticket, room_id)?;
        tx.commit()?;
        Ok(Some(ticket))
    }

    /// Finish treatment and free the room.
    pub fn complete(&self, ticket_id: &str) -> QueueResult<Ticket> {
        let tx = self.db.begin_immediate()?;
        let mut ticket = self.get(ticket_id)?;
        self.check_transition(&ticket, TicketStatus::Completed)?;

        if let Some(room) = self.db.get_room_by_occupant(&ticket.id)? {
            RoomBoard::new(self.db).release(room.id)?;
        }

        let now = timestamp_now();
        let room_id = ticket.room_id.take();
        ticket.status = TicketStatus::Completed;
        ticket.completed_at = Some(now);
        ticket.updated_at = now;
        self.db.update_ticket_state(&ticket)?;
        tx.commit()?;

        info!(
            ticket_id = %ticket.id,
            number = %ticket.number,
            room_id = ?room_id,
            "Treatment completed"
        );
        Ok(ticket)
    }

    /// Apply an operator status change given as text (`IN_TREATMENT`,
    /// `completed`, ...).
    pub fn update_status(&self, ticket_id: &str, status: &str, room_id: Option<u32>) -> QueueResult<Ticket> {
        let target = TicketStatus::parse(status)
            .ok_or_else(|| QueueError::Validation(format!("unknown ticket status {:?}", status)))?;

        match target {
            TicketStatus::InTreatment => {
                let room_id = room_id.ok_or_else(|| {
                    QueueError::Validation("a room is required to start treatment".into())
                })?;
                self.start_treatment(ticket_id, room_id)
            }
            TicketStatus::Completed => self.complete(ticket_id),
            TicketStatus::Waiting => {
                let ticket = self.get(ticket_id)?;
                Err(self.reject(&ticket, TicketStatus::Waiting))
            }
        }
    }

    pub fn get(&self, ticket_id: &str) -> QueueResult<Ticket> {
        self.db
            .get_ticket(ticket_id)?
            .ok_or_else(|| QueueError::not_found(Entity::Ticket, ticket_id))
    }

    /// Tickets matching `filter`, newest first.
    pub fn list(&self, filter: &TicketFilter) -> QueueResult<Vec<Ticket>> {
        Ok(self.db.list_tickets(filter, TicketOrder::CreatedDesc)?)
    }

    /// Tickets in treatment, most recently changed first.
    pub fn active_treatments(&self) -> QueueResult<Vec<Ticket>> {
        Ok(self
            .db
            .list_tickets(&TicketFilter::status(TicketStatus::InTreatment), TicketOrder::UpdatedDesc)?)
    }

    /// Tickets completed since local midnight, most recent first.
    pub fn completed_today(&self, now: DateTime<Utc>) -> QueueResult<Vec<Ticket>> {
        let filter = TicketFilter::completed_since(local_midnight(now));
        Ok(self.db.list_tickets(&filter, TicketOrder::CompletedDesc)?)
    }

    /// Caller holds the write transaction.
    fn begin_treatment(&self, mut ticket: Ticket, room_id: u32) -> QueueResult<Ticket> {
        self.check_transition(&ticket, TicketStatus::InTreatment)?;

        if let Err(e) = RoomBoard::new(self.db).occupy(room_id, &ticket.id) {
            if let QueueError::RoomOccupied { occupant_ticket_id, .. } = &e {
                warn!(
                    ticket_id = %ticket.id,
                    room_id,
                    occupant = %occupant_ticket_id,
                    "Room already occupied"
                );
            }
            return Err(e);
        }

        let now = timestamp_now();
        ticket.status = TicketStatus::InTreatment;
        ticket.room_id = Some(room_id);
        ticket.started_at = Some(now);
        ticket.updated_at = now;
        self.db.update_ticket_state(&ticket)?;

        info!(
            ticket_id = %ticket.id,
            number = %ticket.number,
            room_id,
            "Treatment started"
        );
        Ok(ticket)
    }

    fn check_transition(&self, ticket: &Ticket, to: TicketStatus) -> QueueResult<()> {
        if ticket.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(self.reject(ticket, to))
        }
    }

    fn reject(&self, ticket: &Ticket, to: TicketStatus) -> QueueError {
        warn!(
            ticket_id = %ticket.id,
            from = %ticket.status,
            to = %to,
            "Rejected status change"
        );
        QueueError::InvalidTransition {
            ticket_id: ticket.id.clone(),
            from: ticket.status,
            to,
        }
    }
}
