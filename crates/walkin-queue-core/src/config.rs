//! Runtime configuration.
//!
//! Loads from environment variables with defaults for a four-room clinic.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::RoomConfig;
use crate::queue::{QueueError, QueueResult};

/// Widest zero padding a ticket number may ask for.
pub const MAX_TICKET_DIGITS: usize = 9;

/// How the waiting line is ordered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Strict registration order; priority is informational
    #[default]
    Fifo,
    /// Critical before Urgent before Normal, registration order within a tier
    PriorityThenFifo,
}

impl QueueOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Some(QueueOrder::Fifo),
            "priority" | "priority_then_fifo" => Some(QueueOrder::PriorityThenFifo),
            _ => None,
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// SQLite file; `None` keeps everything in memory
    pub database_path: Option<String>,
    /// The fixed set of treatment rooms
    pub rooms: Vec<RoomConfig>,
    /// Ticket number prefix ("A" gives "A-001")
    pub ticket_prefix: String,
    /// Minimum digits in a ticket number
    pub ticket_digits: usize,
    /// Estimated minutes per place in the waiting line
    pub minutes_per_position: u32,
    /// Floor for any wait estimate
    pub minimum_wait_minutes: u32,
    /// Max results from a patient search
    pub search_limit: usize,
    /// Waiting tickets shown on the kiosk board
    pub display_upcoming: usize,
    pub queue_order: QueueOrder,
    /// Longest wait for the storage write lock, in milliseconds
    pub busy_timeout_ms: u64,
    /// Default tracing filter (RUST_LOG overrides)
    pub log_filter: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            rooms: default_rooms(),
            ticket_prefix: "A".to_string(),
            ticket_digits: 3,
            minutes_per_position: 15,
            minimum_wait_minutes: 5,
            search_limit: 10,
            display_upcoming: 5,
            queue_order: QueueOrder::Fifo,
            busy_timeout_ms: 5_000,
            log_filter: "info".to_string(),
        }
    }
}

/// Four examination rooms, each with its clinician.
pub fn default_rooms() -> Vec<RoomConfig> {
    vec![
        RoomConfig::new(1, "Examination 1", Some("Dr. Smith")),
        RoomConfig::new(2, "Examination 2", Some("Dr. Johnson")),
        RoomConfig::new(3, "Emergency", Some("Dr. Williams")),
        RoomConfig::new(4, "Consultation", Some("Dr. Brown")),
    ]
}

impl QueueConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env::var("WALKIN_DB_PATH").ok().filter(|s| !s.trim().is_empty()),
            rooms: env::var("WALKIN_ROOMS")
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or(defaults.rooms),
            ticket_prefix: env::var("WALKIN_TICKET_PREFIX").unwrap_or(defaults.ticket_prefix),
            ticket_digits: defaults.ticket_digits,
            minutes_per_position: env::var("WALKIN_MINUTES_PER_POSITION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.minutes_per_position),
            minimum_wait_minutes: env::var("WALKIN_MIN_WAIT_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.minimum_wait_minutes),
            search_limit: defaults.search_limit,
            display_upcoming: defaults.display_upcoming,
            queue_order: env::var("WALKIN_QUEUE_ORDER")
                .ok()
                .and_then(|s| QueueOrder::parse(&s))
                .unwrap_or(defaults.queue_order),
            busy_timeout_ms: env::var("WALKIN_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.busy_timeout_ms),
            log_filter: env::var("WALKIN_LOG").unwrap_or(defaults.log_filter),
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> QueueResult<()> {
        if self.rooms.is_empty() {
            return Err(QueueError::Validation("at least one room is required".into()));
        }
        let mut seen = HashSet::new();
        for room in &self.rooms {
            if !seen.insert(room.id) {
                return Err(QueueError::Validation(format!("duplicate room id {}", room.id)));
            }
            if room.name.trim().is_empty() {
                return Err(QueueError::Validation(format!("room {} has no name", room.id)));
            }
        }
        if self.ticket_prefix.trim().is_empty() {
            return Err(QueueError::Validation("ticket prefix is empty".into()));
        }
        if !(1..=MAX_TICKET_DIGITS).contains(&self.ticket_digits) {
            return Err(QueueError::Validation(format!(
                "ticket digits must be 1..={}, got {}",
                MAX_TICKET_DIGITS, self.ticket_digits
            )));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
