//! Ticket models and the status state machine.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Patient;

/// Service type used when registration leaves it blank.
pub const DEFAULT_SERVICE_TYPE: &str = "General Consultation";

/// Ticket lifecycle status.
///
/// `Waiting` → `InTreatment` → `Completed`. There is no way back to `Waiting`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Registered, in the waiting line
    Waiting,
    /// Assigned to a room
    InTreatment,
    /// Done (terminal)
    Completed,
}

impl TicketStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::InTreatment => "in_treatment",
            TicketStatus::Completed => "completed",
        }
    }

    /// Parse operator/storage text, ignoring case (`IN_TREATMENT`, `in_treatment`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "waiting" => Some(TicketStatus::Waiting),
            "in_treatment" => Some(TicketStatus::InTreatment),
            "completed" => Some(TicketStatus::Completed),
            _ => None,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Waiting, TicketStatus::InTreatment)
                | (TicketStatus::InTreatment, TicketStatus::Completed)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketStatus::Waiting => "WAITING",
            TicketStatus::InTreatment => "IN_TREATMENT",
            TicketStatus::Completed => "COMPLETED",
        })
    }
}

/// Triage tier, fixed at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
    Critical,
}

impl Priority {
    /// Numeric level (0, 1, 2) as stored.
    pub fn level(&self) -> u8 {
        match self {
            Priority::Normal => 0,
            Priority::Urgent => 1,
            Priority::Critical => 2,
        }
    }

    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Priority::Normal),
            1 => Some(Priority::Urgent),
            2 => Some(Priority::Critical),
            _ => None,
        }
    }

    /// Parse a registration form value. Unrecognized input is `Normal`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(level) = s.parse::<i64>() {
            return Self::from_level(level).unwrap_or_default();
        }
        match s.to_ascii_lowercase().as_str() {
            "urgent" => Priority::Urgent,
            "critical" => Priority::Critical,
            _ => Priority::Normal,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Normal => "Normal",
            Priority::Urgent => "Urgent",
            Priority::Critical => "Critical",
        })
    }
}

/// A service request tracked from registration to completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Opaque UUID
    pub id: String,
    /// Display number, e.g. "A-007"
    pub number: String,
    /// Position in issue order (1-based, never reused)
    pub sequence: u64,
    /// Patient this ticket was issued to (read through a join, not owned)
    pub patient: Patient,
    pub status: TicketStatus,
    pub priority: Priority,
    /// Free-text category; informational only
    pub service_type: String,
    /// Set only while in treatment
    pub room_id: Option<u32>,
    /// Opaque free text
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stamped when treatment starts; kept after completion
    pub started_at: Option<DateTime<Utc>>,
    /// Stamped exactly once, on completion
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn patient_id(&self) -> &str {
        &self.patient.id
    }

    /// Check the room/status and completion/status pairings.
    pub fn is_consistent(&self) -> bool {
        let in_treatment = self.status == TicketStatus::InTreatment;
        let completed = self.status == TicketStatus::Completed;
        self.room_id.is_some() == in_treatment && self.completed_at.is_some() == completed
    }

    /// Time between registration and the start of treatment.
    pub fn wait_time(&self) -> Option<Duration> {
        self.started_at.map(|started| started - self.created_at)
    }

    /// Time spent in treatment, once completed.
    pub fn treatment_time(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }
}

/// Format a ticket number: `prefix-NNN`, zero-padded to at least `digits`.
pub fn format_ticket_number(prefix: &str, sequence: u64, digits: usize) -> String {
    format!("{}-{:0width$}", prefix, sequence, width = digits)
}

/// Input for issuing a ticket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTicket {
    /// Existing patient; when `None` a patient is created from `patient_name`
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub service_type: Option<String>,
    pub priority: Priority,
    pub notes: Option<String>,
}

impl NewTicket {
    /// Registration for someone not yet in the directory.
    pub fn walk_in(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            patient_name: Some(name.into()),
            priority,
            ..Default::default()
        }
    }

    /// Registration for a returning patient.
    pub fn returning(patient_id: impl Into<String>, priority: Priority) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            priority,
            ..Default::default()
        }
    }

    /// Service type with the blank-input default applied.
    pub fn service_type_or_default(&self) -> String {
        self.service_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVICE_TYPE)
            .to_string()
    }
}

/// Filter for ticket listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    /// Only tickets completed at or after this instant
    pub completed_since: Option<DateTime<Utc>>,
    pub patient_id: Option<String>,
}

impl TicketFilter {
    pub fn status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn completed_since(cutoff: DateTime<Utc>) -> Self {
        Self {
            status: Some(TicketStatus::Completed),
            completed_since: Some(cutoff),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ticket_number() {
        assert_eq!(format_ticket_number("A", 1, 3), "A-001");
        assert_eq!(format_ticket_number("A", 42, 3), "A-042");
        assert_eq!(format_ticket_number("A", 1000, 3), "A-1000");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TicketStatus::parse("IN_TREATMENT"), Some(TicketStatus::InTreatment));
        assert_eq!(TicketStatus::parse("completed"), Some(TicketStatus::Completed));
        assert_eq!(TicketStatus::parse(" Waiting "), Some(TicketStatus::Waiting));
        assert_eq!(TicketStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_state_machine() {
        use TicketStatus::*;
        assert!(Waiting.can_transition_to(InTreatment));
        assert!(InTreatment.can_transition_to(Completed));
        assert!(!Waiting.can_transition_to(Completed));
        assert!(!InTreatment.can_transition_to(Waiting));
        assert!(!Completed.can_transition_to(Waiting));
        assert!(!Completed.can_transition_to(InTreatment));
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("Critical"), Priority::Critical);
        assert_eq!(Priority::parse("urgent"), Priority::Urgent);
        assert_eq!(Priority::parse("2"), Priority::Critical);
        assert_eq!(Priority::parse("7"), Priority::Normal);
        assert_eq!(Priority::parse("whenever"), Priority::Normal);
        assert!(Priority::Critical > Priority::Normal);
    }

    #[test]
    fn test_service_type_default() {
        let mut request = NewTicket::walk_in("Ana", Priority::Normal);
        assert_eq!(request.service_type_or_default(), DEFAULT_SERVICE_TYPE);

        request.service_type = Some("   ".into());
        assert_eq!(request.service_type_or_default(), DEFAULT_SERVICE_TYPE);

        request.service_type = Some("Vaccination".into());
        assert_eq!(request.service_type_or_default(), "Vaccination");
    }

    #[test]
    fn test_wait_and_treatment_time() {
        let created = crate::models::timestamp_now();
        let mut ticket = Ticket {
            id: "t1".into(),
            number: "A-001".into(),
            sequence: 1,
            patient: Patient::new("Ana".into()),
            status: TicketStatus::Waiting,
            priority: Priority::Normal,
            service_type: DEFAULT_SERVICE_TYPE.into(),
            room_id: None,
            notes: None,
            created_at: created,
            updated_at: created,
            started_at: None,
            completed_at: None,
        };
        assert_eq!(ticket.wait_time(), None);

        ticket.started_at = Some(created + Duration::minutes(12));
        assert_eq!(ticket.wait_time(), Some(Duration::minutes(12)));
        assert_eq!(ticket.treatment_time(), None);

        ticket.completed_at = Some(created + Duration::minutes(40));
        assert_eq!(ticket.treatment_time(), Some(Duration::minutes(28)));
    }
}
