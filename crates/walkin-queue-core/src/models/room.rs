//! Room models.

use serde::{Deserialize, Serialize};

use super::Ticket;

/// Static description of a treatment room, supplied by configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomConfig {
    pub id: u32,
    pub name: String,
    /// Clinician usually staffing the room (display only)
    #[serde(default)]
    pub clinician: Option<String>,
}

impl RoomConfig {
    pub fn new(id: u32, name: impl Into<String>, clinician: Option<&str>) -> Self {
        Self {
            id,
            name: name.into(),
            clinician: clinician.map(str::to_string),
        }
    }
}

/// A room and its current occupant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: u32,
    pub name: String,
    pub clinician: Option<String>,
    /// Ticket currently in treatment here
    pub occupant_ticket_id: Option<String>,
}

impl Room {
    pub fn is_free(&self) -> bool {
        self.occupant_ticket_id.is_none()
    }
}

/// Occupancy as shown on the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Empty,
    Active,
}

impl RoomState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomState::Empty => "empty",
            RoomState::Active => "active",
        }
    }
}

/// Room with its occupant resolved to a full ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSummary {
    pub room: Room,
    pub status: RoomState,
    pub occupant: Option<Ticket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_deserialize_without_clinician() {
        let rooms: Vec<RoomConfig> =
            serde_json::from_str(r#"[{"id": 7, "name": "Triage"}]"#).unwrap();
        assert_eq!(rooms, vec![RoomConfig::new(7, "Triage", None)]);
    }

    #[test]
    fn test_room_state_str() {
        assert_eq!(RoomState::Empty.as_str(), "empty");
        assert_eq!(RoomState::Active.as_str(), "active");
    }
}
