//! Domain models for the walk-in queue.

mod patient;
mod room;
mod ticket;

pub use patient::*;
pub use room::*;
pub use ticket::*;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the microsecond precision the store keeps, so a record
/// handed back to a caller equals the one read from storage later.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
