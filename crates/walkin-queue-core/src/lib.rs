//! Walk-in Queue Core Library
//!
//! Ticket lifecycle and room assignment engine for a walk-in clinic.
//!
//! # Architecture
//!
//! ```text
//!   Reception            Clinician dashboard          Kiosk display
//!   (register)           (start / complete)           (poll every 5-10 s)
//!       │                        │                          │
//!       ▼                        ▼                          ▼
//!  ┌─────────────────────────────────────────────────────────────────┐
//!  │                          WalkinQueue                            │
//!  │   writes: one writer connection, one transaction per operation  │
//!  │   reads:  pooled read-only connections (WAL snapshots)          │
//!  └───────────────┬──────────────────────────────┬──────────────────┘
//!                  │                              │
//!    PatientDirectory ─► TicketRegistry ◄──► RoomBoard     QueueView
//!                          (numbering,        (occupancy)  (derived:
//!                           state machine)                  line, waits,
//!                                                           dashboard)
//! ```
//!
//! # Core Principle
//!
//! **A ticket holds a room exactly while it is in treatment.** The ticket
//! status and the room occupant change in the same transaction or not at all.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage and schema constraints
//! - [`models`]: Domain types (Patient, Ticket, Room, ...)
//! - [`queue`]: Patient directory, ticket registry, room board, queue view
//! - [`service`]: Thread-safe facade used by every session
//! - [`config`]: Runtime configuration
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod queue;
pub mod service;

// Re-export commonly used types
pub use config::{QueueConfig, QueueOrder};
pub use db::Database;
pub use models::{
    NewTicket, Patient, Priority, Room, RoomConfig, RoomState, RoomSummary, Ticket, TicketFilter,
    TicketStatus,
};
pub use queue::{
    DashboardStats, DisplayBoard, PatientDirectory, QueueError, QueueView, QueuedTicket,
    RoomBoard, TicketRegistry,
};
pub use service::QueueService;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use chrono::{DateTime, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum QueueFfiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Room occupied: {0}")]
    RoomOccupied(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<QueueError> for QueueFfiError {
    fn from(e: QueueError) -> Self {
        let message = e.to_string();
        match e {
            QueueError::Validation(_) => QueueFfiError::ValidationError(message),
            QueueError::NotFound { .. } => QueueFfiError::NotFound(message),
            QueueError::InvalidTransition { .. } => QueueFfiError::InvalidTransition(message),
            QueueError::RoomOccupied { .. } => QueueFfiError::RoomOccupied(message),
            QueueError::Database(_) => QueueFfiError::DatabaseError(message),
        }
    }
}

impl From<db::DbError> for QueueFfiError {
    fn from(e: db::DbError) -> Self {
        QueueFfiError::DatabaseError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open a queue backed by the SQLite file at `path`, with default rooms.
#[uniffi::export]
pub fn open_queue(path: String) -> Result<Arc<WalkinQueue>, QueueFfiError> {
    let config = QueueConfig {
        database_path: Some(path),
        ..Default::default()
    };
    WalkinQueue::open(config)
}

/// Open a queue configured from `WALKIN_*` environment variables.
#[uniffi::export]
pub fn open_queue_from_env() -> Result<Arc<WalkinQueue>, QueueFfiError> {
    let config = QueueConfig::from_env();
    logging::init(&config.log_filter);
    WalkinQueue::open(config)
}

/// Open a queue with a JSON-encoded [`QueueConfig`].
#[uniffi::export]
pub fn open_queue_with_config(config_json: String) -> Result<Arc<WalkinQueue>, QueueFfiError> {
    let config: QueueConfig = serde_json::from_str(&config_json)
        .map_err(|e| QueueFfiError::ValidationError(format!("bad config: {}", e)))?;
    WalkinQueue::open(config)
}

/// Create an in-memory queue (for testing).
#[uniffi::export]
pub fn open_queue_in_memory() -> Result<Arc<WalkinQueue>, QueueFfiError> {
    WalkinQueue::open(QueueConfig::default())
}

/// Install the tracing subscriber. Returns false if one was already set.
#[uniffi::export]
pub fn init_logging(filter: String) -> bool {
    logging::init(&filter)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Shared queue handle for host applications.
#[derive(uniffi::Object)]
pub struct WalkinQueue {
    service: QueueService,
}

impl WalkinQueue {
    fn open(config: QueueConfig) -> Result<Arc<Self>, QueueFfiError> {
        Ok(Arc::new(Self {
            service: QueueService::open(config)?,
        }))
    }
}

#[uniffi::export]
impl WalkinQueue {
    // =========================================================================
    // Ticket Operations
    // =========================================================================

    /// Register a visit: reuse `patient_id` or create a patient from `name`.
    pub fn create_ticket(&self, request: FfiNewTicket) -> Result<FfiTicket, QueueFfiError> {
        let ticket = self.service.create_ticket(&request.into())?;
        Ok(ticket.into())
    }

    /// Get a ticket by ID.
    pub fn get_ticket(&self, ticket_id: String) -> Result<FfiTicket, QueueFfiError> {
        Ok(self.service.get_ticket(&ticket_id)?.into())
    }

    /// List tickets, newest first.
    pub fn list_tickets(&self, filter: Option<FfiTicketFilter>) -> Result<Vec<FfiTicket>, QueueFfiError> {
        let filter = match filter {
            Some(f) => f.try_into()?,
            None => TicketFilter::default(),
        };
        let tickets = self.service.list_tickets(&filter)?;
        Ok(tickets.into_iter().map(|t| t.into()).collect())
    }

    /// Change a ticket's status (`IN_TREATMENT` needs a room).
    pub fn update_ticket_status(
        &self,
        ticket_id: String,
        status: String,
        room_id: Option<u32>,
    ) -> Result<FfiTicket, QueueFfiError> {
        let ticket = self
            .service
            .update_ticket_status(&ticket_id, &status, room_id)?;
        Ok(ticket.into())
    }

    /// Assign a waiting ticket to a room.
    pub fn start_treatment(&self, ticket_id: String, room_id: u32) -> Result<FfiTicket, QueueFfiError> {
        Ok(self.service.start_treatment(&ticket_id, room_id)?.into())
    }

    /// Finish a treatment and free its room.
    pub fn complete_treatment(&self, ticket_id: String) -> Result<FfiTicket, QueueFfiError> {
        Ok(self.service.complete(&ticket_id)?.into())
    }

    /// Start treatment for the next waiting ticket.
    pub fn call_next_patient(&self, room_id: u32) -> Result<Option<FfiTicket>, QueueFfiError> {
        Ok(self.service.call_next(room_id)?.map(|t| t.into()))
    }

    /// Tickets in treatment.
    pub fn get_active_treatments(&self) -> Result<Vec<FfiTicket>, QueueFfiError> {
        let tickets = self.service.active_treatments()?;
        Ok(tickets.into_iter().map(|t| t.into()).collect())
    }

    /// Tickets completed since local midnight.
    pub fn get_todays_completed(&self) -> Result<Vec<FfiTicket>, QueueFfiError> {
        let tickets = self.service.todays_completed()?;
        Ok(tickets.into_iter().map(|t| t.into()).collect())
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Search patients by name (at most the configured limit).
    pub fn search_patients(&self, query: String) -> Result<Vec<FfiPatient>, QueueFfiError> {
        let patients = self.service.search_patients(&query)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: String) -> Result<FfiPatient, QueueFfiError> {
        Ok(self.service.get_patient(&patient_id)?.into())
    }

    /// A patient's tickets, newest first.
    pub fn get_patient_tickets(&self, patient_id: String) -> Result<Vec<FfiTicket>, QueueFfiError> {
        let tickets = self.service.patient_tickets(&patient_id)?;
        Ok(tickets.into_iter().map(|t| t.into()).collect())
    }

    pub fn get_patient_visit_stats(&self, patient_id: String) -> Result<FfiVisitStats, QueueFfiError> {
        Ok(self.service.patient_visit_stats(&patient_id)?.into())
    }

    pub fn get_directory_stats(&self) -> Result<FfiDirectoryStats, QueueFfiError> {
        let stats = self.service.directory_stats()?;
        Ok(FfiDirectoryStats {
            total_patients: stats.total_patients,
            visits_today: stats.visits_today,
            active_cases: stats.active_cases,
        })
    }

    // =========================================================================
    // Queue View
    // =========================================================================

    /// Waiting line with estimated waits.
    pub fn get_waiting_queue(&self) -> Result<Vec<FfiQueuedTicket>, QueueFfiError> {
        let queued = self.service.queued()?;
        Ok(queued.into_iter().map(|q| q.into()).collect())
    }

    pub fn get_room_summary(&self) -> Result<Vec<FfiRoomSummary>, QueueFfiError> {
        let rooms = self.service.room_summary()?;
        Ok(rooms.into_iter().map(|r| r.into()).collect())
    }

    pub fn get_dashboard_stats(&self) -> Result<FfiDashboardStats, QueueFfiError> {
        Ok(self.service.dashboard_stats()?.into())
    }

    /// Everything the kiosk display needs in one read.
    pub fn get_display_board(&self) -> Result<FfiDisplayBoard, QueueFfiError> {
        let board = self.service.display_board()?;
        Ok(FfiDisplayBoard {
            now_serving: board.now_serving.into_iter().map(|t| t.into()).collect(),
            up_next: board.up_next.into_iter().map(|q| q.into()).collect(),
            waiting_count: board.waiting_count,
        })
    }
}

// =========================================================================
// FFI Types
// =========================================================================

fn ffi_time(at: &DateTime<Utc>) -> String {
    db::to_timestamp(at)
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            created_at: ffi_time(&patient.created_at),
            id: patient.id,
            name: patient.name,
        }
    }
}

/// FFI-safe registration request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewTicket {
    /// Returning patient; takes precedence over `name`
    pub patient_id: Option<String>,
    pub name: Option<String>,
    pub service_type: Option<String>,
    /// "Normal", "Urgent" or "Critical"; anything else is Normal
    pub priority: Option<String>,
    pub notes: Option<String>,
}

impl From<FfiNewTicket> for NewTicket {
    fn from(request: FfiNewTicket) -> Self {
        NewTicket {
            patient_id: request.patient_id,
            patient_name: request.name,
            service_type: request.service_type,
            priority: request
                .priority
                .as_deref()
                .map(Priority::parse)
                .unwrap_or_default(),
            notes: request.notes,
        }
    }
}

/// FFI-safe ticket listing filter.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTicketFilter {
    pub status: Option<String>,
    /// RFC 3339; only tickets completed at or after this instant
    pub completed_since: Option<String>,
}

impl TryFrom<FfiTicketFilter> for TicketFilter {
    type Error = QueueFfiError;

    fn try_from(filter: FfiTicketFilter) -> Result<Self, Self::Error> {
        let status = filter
            .status
            .as_deref()
            .map(|s| {
                TicketStatus::parse(s)
                    .ok_or_else(|| QueueFfiError::ValidationError(format!("unknown ticket status {:?}", s)))
            })
            .transpose()?;
        let completed_since = filter
            .completed_since
            .as_deref()
            .map(|s| {
                db::parse_timestamp(s)
                    .map_err(|_| QueueFfiError::ValidationError(format!("bad timestamp {:?}", s)))
            })
            .transpose()?;

        Ok(TicketFilter {
            status,
            completed_since,
            patient_id: None,
        })
    }
}

/// FFI-safe ticket, with its patient embedded.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTicket {
    pub id: String,
    pub number: String,
    pub patient: FfiPatient,
    /// WAITING, IN_TREATMENT or COMPLETED
    pub status: String,
    pub priority: String,
    pub priority_level: u8,
    pub service_type: String,
    pub room_id: Option<u32>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<Ticket> for FfiTicket {
    fn from(ticket: Ticket) -> Self {
        Self {
            status: ticket.status.to_string(),
            priority: ticket.priority.to_string(),
            priority_level: ticket.priority.level(),
            created_at: ffi_time(&ticket.created_at),
            updated_at: ffi_time(&ticket.updated_at),
            started_at: ticket.started_at.as_ref().map(ffi_time),
            completed_at: ticket.completed_at.as_ref().map(ffi_time),
            id: ticket.id,
            number: ticket.number,
            patient: ticket.patient.into(),
            service_type: ticket.service_type,
            room_id: ticket.room_id,
            notes: ticket.notes,
        }
    }
}

/// FFI-safe waiting-line entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueuedTicket {
    pub ticket: FfiTicket,
    pub position: u32,
    pub estimated_wait_minutes: u32,
}

impl From<QueuedTicket> for FfiQueuedTicket {
    fn from(queued: QueuedTicket) -> Self {
        Self {
            ticket: queued.ticket.into(),
            position: queued.position as u32,
            estimated_wait_minutes: queued.estimated_wait_minutes,
        }
    }
}

/// FFI-safe room status.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRoomSummary {
    pub room_id: u32,
    pub name: String,
    pub clinician: Option<String>,
    /// "empty" or "active"
    pub status: String,
    pub occupant: Option<FfiTicket>,
}

impl From<RoomSummary> for FfiRoomSummary {
    fn from(summary: RoomSummary) -> Self {
        Self {
            room_id: summary.room.id,
            name: summary.room.name,
            clinician: summary.room.clinician,
            status: summary.status.as_str().to_string(),
            occupant: summary.occupant.map(|t| t.into()),
        }
    }
}

/// FFI-safe dashboard aggregates.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDashboardStats {
    pub treated_today: u32,
    pub avg_wait_minutes: u32,
    pub avg_treatment_minutes: u32,
    pub waiting_count: u32,
    pub active_rooms: u32,
}

impl From<DashboardStats> for FfiDashboardStats {
    fn from(stats: DashboardStats) -> Self {
        Self {
            treated_today: stats.treated_today,
            avg_wait_minutes: stats.avg_wait_minutes,
            avg_treatment_minutes: stats.avg_treatment_minutes,
            waiting_count: stats.waiting_count,
            active_rooms: stats.active_rooms,
        }
    }
}

/// FFI-safe kiosk board.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDisplayBoard {
    pub now_serving: Vec<FfiTicket>,
    pub up_next: Vec<FfiQueuedTicket>,
    pub waiting_count: u32,
}

/// FFI-safe count of visits for one service type.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiServiceCount {
    pub service_type: String,
    pub visits: u32,
}

/// FFI-safe patient visit summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitStats {
    pub total_visits: u32,
    pub completed_visits: u32,
    pub priority_visits: u32,
    pub service_types: Vec<FfiServiceCount>,
    pub last_visit: Option<String>,
}

impl From<models::VisitStats> for FfiVisitStats {
    fn from(stats: models::VisitStats) -> Self {
        Self {
            total_visits: stats.total_visits,
            completed_visits: stats.completed_visits,
            priority_visits: stats.priority_visits,
            service_types: stats
                .service_types
                .into_iter()
                .map(|(service_type, visits)| FfiServiceCount {
                    service_type,
                    visits,
                })
                .collect(),
            last_visit: stats.last_visit.as_ref().map(ffi_time),
        }
    }
}

/// FFI-safe directory counters.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDirectoryStats {
    pub total_patients: u32,
    pub visits_today: u32,
    pub active_cases: u32,
}
