//! Patient directory and visit history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use super::{local_midnight, Entity, QueueError, QueueResult};
use crate::config::QueueConfig;
use crate::db::{Database, TicketOrder};
use crate::models::{DirectoryStats, Patient, Priority, Ticket, TicketFilter, TicketStatus, VisitStats};

/// Identity records for everyone who has registered.
pub struct PatientDirectory<'a> {
    db: &'a Database,
    config: &'a QueueConfig,
}

impl<'a> PatientDirectory<'a> {
    pub fn new(db: &'a Database, config: &'a QueueConfig) -> Self {
        Self { db, config }
    }

    /// Resolve a returning patient by ID, or register a new one by name.
    pub fn find_or_create(&self, existing_id: Option<&str>, name: Option<&str>) -> QueueResult<Patient> {
        if let Some(id) = existing_id.map(str::trim).filter(|id| !id.is_empty()) {
            return self.get(id);
        }

        let name = name.map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(QueueError::Validation("patient name is required".into()));
        }

        let patient = Patient::new(name.to_string());
        self.db.insert_patient(&patient)?;
        info!(patient_id = %patient.id, "Patient registered");
        Ok(patient)
    }

    pub fn get(&self, patient_id: &str) -> QueueResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| QueueError::not_found(Entity::Patient, patient_id))
    }

    /// Case-insensitive name search, capped at the configured limit.
    ///
    /// A blank query returns nothing rather than everyone.
    pub fn search(&self, query: &str) -> QueueResult<Vec<Patient>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.search_patients(query, self.config.search_limit)?)
    }

    /// All tickets issued to a patient, newest first.
    pub fn tickets(&self, patient_id: &str) -> QueueResult<Vec<Ticket>> {
        self.get(patient_id)?;
        let filter = TicketFilter {
            patient_id: Some(patient_id.to_string()),
            ..Default::default()
        };
        Ok(self.db.list_tickets(&filter, TicketOrder::CreatedDesc)?)
    }

    pub fn visit_stats(&self, patient_id: &str) -> QueueResult<VisitStats> {
        Ok(summarize_visits(&self.tickets(patient_id)?))
    }

    pub fn stats(&self, now: DateTime<Utc>) -> QueueResult<DirectoryStats> {
        let _snapshot = self.db.begin_read()?;
        Ok(DirectoryStats {
            total_patients: self.db.count_patients()?,
            visits_today: self.db.count_tickets_created_since(&local_midnight(now))?,
            active_cases: self.db.count_tickets_with_status(TicketStatus::Waiting)?
                + self.db.count_tickets_with_status(TicketStatus::InTreatment)?,
        })
    }
}

/// Summarize a patient's tickets.
pub fn summarize_visits(tickets: &[Ticket]) -> VisitStats {
    let mut by_type: HashMap<&str, u32> = HashMap::new();
    for ticket in tickets {
        *by_type.entry(ticket.service_type.as_str()).or_default() += 1;
    }
    let mut service_types: Vec<(String, u32)> = by_type
        .into_iter()
        .map(|(service, count)| (service.to_string(), count))
        .collect();
    service_types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    VisitStats {
        total_visits: tickets.len() as u32,
        completed_visits: tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Completed)
            .count() as u32,
        priority_visits: tickets
            .iter()
            .filter(|t| t.priority >= Priority::Urgent)
            .count() as u32,
        service_types,
        last_visit: tickets.iter().map(|t| t.created_at).max(),
    }
}
