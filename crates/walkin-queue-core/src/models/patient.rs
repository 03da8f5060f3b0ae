//! Patient models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record for someone who has registered at least once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Opaque UUID, assigned at creation
    pub id: String,
    /// Display name (never empty)
    pub name: String,
    /// First registration
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Create a new patient stamped with the current time.
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            created_at: super::timestamp_now(),
        }
    }
}

/// Per-patient visit summary for the history view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitStats {
    pub total_visits: u32,
    pub completed_visits: u32,
    /// Visits registered as Urgent or Critical
    pub priority_visits: u32,
    /// (service type, count), most frequent first
    pub service_types: Vec<(String, u32)>,
    pub last_visit: Option<DateTime<Utc>>,
}

/// Directory-wide counters shown on the history page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DirectoryStats {
    pub total_patients: u32,
    /// Tickets created since local midnight
    pub visits_today: u32,
    /// Tickets waiting or in treatment
    pub active_cases: u32,
}
