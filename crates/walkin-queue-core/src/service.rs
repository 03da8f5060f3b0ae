//! Thread-safe entry point tying configuration, storage and the queue
//! components together.
//!
//! Writers are serialized on the store's writer connection and each runs in
//! its own transaction. Readers use the reader pool.

use chrono::Utc;
use tracing::info;

use crate::config::QueueConfig;
use crate::db::Store;
use crate::models::{
    DirectoryStats, NewTicket, Patient, RoomSummary, Ticket, TicketFilter, VisitStats,
};
use crate::queue::{
    DashboardStats, DisplayBoard, PatientDirectory, QueueResult, QueueView, QueuedTicket,
    RoomBoard, TicketRegistry,
};

/// Shared queue state for reception, clinician and display sessions.
pub struct QueueService {
    store: Store,
    config: QueueConfig,
}

impl QueueService {
    /// Open the store named by `config` (in memory when no path is set) and
    /// seed the configured rooms.
    pub fn open(config: QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        let store = match &config.database_path {
            Some(path) => Store::open(path, config.busy_timeout())?,
            None => Store::open_in_memory()?,
        };
        store.write(|db| RoomBoard::new(db).sync(&config.rooms))?;

        info!(
            path = config.database_path.as_deref().unwrap_or(":memory:"),
            rooms = config.rooms.len(),
            order = ?config.queue_order,
            "Queue opened"
        );
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn create_ticket(&self, request: &NewTicket) -> QueueResult<Ticket> {
        self.store
            .write(|db| TicketRegistry::new(db, &self.config).create(request))
    }

    pub fn start_treatment(&self, ticket_id: &str, room_id: u32) -> QueueResult<Ticket> {
        self.store
            .write(|db| TicketRegistry::new(db, &self.config).start_treatment(ticket_id, room_id))
    }

    pub fn complete(&self, ticket_id: &str) -> QueueResult<Ticket> {
        self.store
            .write(|db| TicketRegistry::new(db, &self.config).complete(ticket_id))
    }

    pub fn update_ticket_status(
        &self,
        ticket_id: &str,
        status: &str,
        room_id: Option<u32>,
    ) -> QueueResult<Ticket> {
        self.store.write(|db| {
            TicketRegistry::new(db, &self.config).update_status(ticket_id, status, room_id)
        })
    }

    pub fn call_next(&self, room_id: u32) -> QueueResult<Option<Ticket>> {
        self.store
            .write(|db| TicketRegistry::new(db, &self.config).call_next(room_id))
    }

    // =========================================================================
    // Tickets
    // =========================================================================

    pub fn get_ticket(&self, ticket_id: &str) -> QueueResult<Ticket> {
        self.store
            .read(|db| TicketRegistry::new(db, &self.config).get(ticket_id))
    }

    pub fn list_tickets(&self, filter: &TicketFilter) -> QueueResult<Vec<Ticket>> {
        self.store
            .read(|db| TicketRegistry::new(db, &self.config).list(filter))
    }

    pub fn active_treatments(&self) -> QueueResult<Vec<Ticket>> {
        self.store
            .read(|db| TicketRegistry::new(db, &self.config).active_treatments())
    }

    pub fn todays_completed(&self) -> QueueResult<Vec<Ticket>> {
        self.store
            .read(|db| TicketRegistry::new(db, &self.config).completed_today(Utc::now()))
    }

    // =========================================================================
    // Patients
    // =========================================================================

    pub fn search_patients(&self, query: &str) -> QueueResult<Vec<Patient>> {
        self.store
            .read(|db| PatientDirectory::new(db, &self.config).search(query))
    }

    pub fn get_patient(&self, patient_id: &str) -> QueueResult<Patient> {
        self.store
            .read(|db| PatientDirectory::new(db, &self.config).get(patient_id))
    }

    pub fn patient_tickets(&self, patient_id: &str) -> QueueResult<Vec<Ticket>> {
        self.store
            .read(|db| PatientDirectory::new(db, &self.config).tickets(patient_id))
    }

    pub fn patient_visit_stats(&self, patient_id: &str) -> QueueResult<VisitStats> {
        self.store
            .read(|db| PatientDirectory::new(db, &self.config).visit_stats(patient_id))
    }

    pub fn directory_stats(&self) -> QueueResult<DirectoryStats> {
        self.store
            .read(|db| PatientDirectory::new(db, &self.config).stats(Utc::now()))
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn waiting_queue(&self) -> QueueResult<Vec<Ticket>> {
        self.store
            .read(|db| QueueView::new(db, &self.config).waiting_queue())
    }

    pub fn queued(&self) -> QueueResult<Vec<QueuedTicket>> {
        self.store.read(|db| QueueView::new(db, &self.config).queued())
    }

    pub fn room_summary(&self) -> QueueResult<Vec<RoomSummary>> {
        self.store
            .read(|db| QueueView::new(db, &self.config).room_summary())
    }

    pub fn dashboard_stats(&self) -> QueueResult<DashboardStats> {
        self.store
            .read(|db| QueueView::new(db, &self.config).dashboard_stats(Utc::now()))
    }

    pub fn display_board(&self) -> QueueResult<DisplayBoard> {
        self.store
            .read(|db| QueueView::new(db, &self.config).display_board())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::queue::QueueError;

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = QueueConfig {
            rooms: vec![],
            ..Default::default()
        };
        assert!(matches!(QueueService::open(config), Err(QueueError::Validation(_))));
    }

    #[test]
    fn test_round_trip_through_service() {
        let service = QueueService::open(QueueConfig::default()).unwrap();
        let ticket = service
            .create_ticket(&NewTicket::walk_in("Ana", Priority::Urgent))
            .unwrap();

        assert_eq!(service.get_ticket(&ticket.id).unwrap(), ticket);
        assert_eq!(service.waiting_queue().unwrap().len(), 1);
        assert_eq!(service.search_patients("ana").unwrap().len(), 1);
        assert_eq!(service.room_summary().unwrap().len(), 4);
    }
}
