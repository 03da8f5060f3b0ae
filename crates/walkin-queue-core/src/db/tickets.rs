//! Ticket database operations.

use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{parse_optional_timestamp, parse_timestamp, to_timestamp, Database, DbError, DbResult};
use crate::models::{Patient, Priority, Ticket, TicketFilter, TicketStatus};

/// Sort order for ticket listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TicketOrder {
    /// Newest first (default listing)
    #[default]
    CreatedDesc,
    /// Oldest first (waiting line)
    CreatedAsc,
    /// Highest priority first, then oldest first
    PriorityThenCreatedAsc,
    /// Most recently changed first
    UpdatedDesc,
    /// Most recently completed first
    CompletedDesc,
}

impl TicketOrder {
    fn sql(&self) -> &'static str {
        match self {
            TicketOrder::CreatedDesc => "t.created_at DESC, t.sequence DESC",
            TicketOrder::CreatedAsc => "t.created_at ASC, t.sequence ASC",
            TicketOrder::PriorityThenCreatedAsc => {
                "t.priority DESC, t.created_at ASC, t.sequence ASC"
            }
            TicketOrder::UpdatedDesc => "t.updated_at DESC, t.sequence DESC",
            TicketOrder::CompletedDesc => "t.completed_at DESC, t.sequence DESC",
        }
    }
}

const TICKET_COLUMNS: &str = r#"
    t.ticket_id, t.number, t.sequence, t.status, t.priority, t.service_type,
    t.room_id, t.notes, t.created_at, t.updated_at, t.started_at, t.completed_at,
    p.patient_id, p.name, p.created_at
"#;

impl Database {
    /// Bump the issued-ticket counter and return the new value.
    ///
    /// Must run inside the same write transaction as the matching
    /// `insert_ticket`.
    pub fn next_ticket_sequence(&self) -> DbResult<u64> {
        self.conn
            .execute("UPDATE ticket_sequence SET issued = issued + 1 WHERE id = 1", [])?;
        self.issued_ticket_count()
    }

    /// Count of tickets ever issued.
    pub fn issued_ticket_count(&self) -> DbResult<u64> {
        let issued: i64 = self.conn.query_row(
            "SELECT issued FROM ticket_sequence WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(issued as u64)
    }

    /// Insert a new ticket.
    pub fn insert_ticket(&self, ticket: &Ticket) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO tickets (
                ticket_id, number, sequence, patient_id, status, priority,
                service_type, room_id, notes, created_at, updated_at,
                started_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                ticket.id,
                ticket.number,
                ticket.sequence as i64,
                ticket.patient.id,
                ticket.status.as_str(),
                ticket.priority.level(),
                ticket.service_type,
                ticket.room_id,
                ticket.notes,
                to_timestamp(&ticket.created_at),
                to_timestamp(&ticket.updated_at),
                ticket.started_at.as_ref().map(to_timestamp),
                ticket.completed_at.as_ref().map(to_timestamp),
            ],
        )?;
        Ok(())
    }

    /// Write a ticket's lifecycle fields (status, room, timestamps).
    pub fn update_ticket_state(&self, ticket: &Ticket) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE tickets SET
                status = ?2,
                room_id = ?3,
                updated_at = ?4,
                started_at = ?5,
                completed_at = ?6
            WHERE ticket_id = ?1
            "#,
            params![
                ticket.id,
                ticket.status.as_str(),
                ticket.room_id,
                to_timestamp(&ticket.updated_at),
                ticket.started_at.as_ref().map(to_timestamp),
                ticket.completed_at.as_ref().map(to_timestamp),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a ticket by ID, with its patient.
    pub fn get_ticket(&self, ticket_id: &str) -> DbResult<Option<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets t JOIN patients p ON p.patient_id = t.patient_id WHERE t.ticket_id = ?",
            TICKET_COLUMNS
        );
        self.conn
            .query_row(&sql, [ticket_id], read_ticket_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List tickets matching a filter.
    pub fn list_tickets(&self, filter: &TicketFilter, order: TicketOrder) -> DbResult<Vec<Ticket>> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            args.push(status.as_str().to_string());
            clauses.push(format!("t.status = ?{}", args.len()));
        }
        if let Some(cutoff) = filter.completed_since {
            args.push(to_timestamp(&cutoff));
            clauses.push(format!("t.completed_at >= ?{}", args.len()));
        }
        if let Some(patient_id) = &filter.patient_id {
            args.push(patient_id.clone());
            clauses.push(format!("t.patient_id = ?{}", args.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM tickets t JOIN patients p ON p.patient_id = t.patient_id {} ORDER BY {}",
            TICKET_COLUMNS,
            where_sql,
            order.sql()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), read_ticket_row)?;

        let mut tickets: Vec<Ticket> = Vec::new();
        for row in rows {
            tickets.push(row?.try_into()?);
        }
        Ok(tickets)
    }

    /// Count tickets created at or after `cutoff`.
    pub fn count_tickets_created_since(&self, cutoff: &chrono::DateTime<chrono::Utc>) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE created_at >= ?",
            [to_timestamp(cutoff)],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Count tickets per status.
    pub fn count_tickets_with_status(&self, status: TicketStatus) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}

/// Intermediate row struct for database mapping.
struct TicketRow {
    ticket_id: String,
    number: String,
    sequence: i64,
    status: String,
    priority: i64,
    service_type: String,
    room_id: Option<u32>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    patient_id: String,
    patient_name: String,
    patient_created_at: String,
}

fn read_ticket_row(row: &Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        ticket_id: row.get(0)?,
        number: row.get(1)?,
        sequence: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        service_type: row.get(5)?,
        room_id: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        patient_id: row.get(12)?,
        patient_name: row.get(13)?,
        patient_created_at: row.get(14)?,
    })
}

impl TryFrom<TicketRow> for Ticket {
    type Error = DbError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let status = TicketStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown ticket status: {}", row.status)))?;
        let priority = Priority::from_level(row.priority)
            .ok_or_else(|| DbError::Constraint(format!("Unknown priority: {}", row.priority)))?;

        Ok(Ticket {
            id: row.ticket_id,
            number: row.number,
            sequence: row.sequence as u64,
            patient: Patient {
                id: row.patient_id,
                name: row.patient_name,
                created_at: parse_timestamp(&row.patient_created_at)?,
            },
            status,
            priority,
            service_type: row.service_type,
            room_id: row.room_id,
            notes: row.notes,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            started_at: parse_optional_timestamp(row.started_at)?,
            completed_at: parse_optional_timestamp(row.completed_at)?,
        })
    }
}
