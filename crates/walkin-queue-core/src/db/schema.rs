//! SQLite schema definition.

/// Complete database schema for the walk-in queue.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients (created once, never deleted)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- ============================================================================
-- Tickets (never deleted, retained for history)
-- ============================================================================

CREATE TABLE IF NOT EXISTS tickets (
    ticket_id TEXT PRIMARY KEY,
    number TEXT NOT NULL UNIQUE,
    sequence INTEGER NOT NULL UNIQUE,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    status TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'in_treatment', 'completed')),
    priority INTEGER NOT NULL DEFAULT 0 CHECK (priority IN (0, 1, 2)),
    service_type TEXT NOT NULL,
    room_id INTEGER,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    -- room is held exactly while in treatment
    CHECK ((status = 'in_treatment') = (room_id IS NOT NULL)),
    -- completion is stamped exactly when completed
    CHECK ((status = 'completed') = (completed_at IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status, created_at);
CREATE INDEX IF NOT EXISTS idx_tickets_created ON tickets(created_at);
CREATE INDEX IF NOT EXISTS idx_tickets_patient ON tickets(patient_id);
CREATE INDEX IF NOT EXISTS idx_tickets_completed ON tickets(completed_at);

-- Completed tickets are frozen
CREATE TRIGGER IF NOT EXISTS tickets_completed_frozen BEFORE UPDATE ON tickets
WHEN old.status = 'completed'
BEGIN
    SELECT RAISE(ABORT, 'Completed tickets cannot change');
END;

-- Tickets are retained for history
CREATE TRIGGER IF NOT EXISTS tickets_no_delete BEFORE DELETE ON tickets
BEGIN
    SELECT RAISE(ABORT, 'Tickets cannot be deleted');
END;

-- Count of tickets ever issued (single row, bumped atomically with each insert)
CREATE TABLE IF NOT EXISTS ticket_sequence (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    issued INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO ticket_sequence (id, issued) VALUES (1, 0);

-- ============================================================================
-- Rooms (fixed set, seeded from configuration)
-- ============================================================================

CREATE TABLE IF NOT EXISTS rooms (
    room_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    clinician TEXT,
    occupant_ticket_id TEXT UNIQUE REFERENCES tickets(ticket_id)
);
"#;
