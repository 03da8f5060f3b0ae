//! Patient database operations.

use rusqlite::{params, OptionalExtension};

use super::{parse_timestamp, to_timestamp, Database, DbError, DbResult};
use crate::models::Patient;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO patients (patient_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![patient.id, patient.name, to_timestamp(&patient.created_at)],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                "SELECT patient_id, name, created_at FROM patients WHERE patient_id = ?",
                [patient_id],
                |row| {
                    Ok(PatientRow {
                        patient_id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search patients by name (case-insensitive substring match, Unicode
    /// aware through `casefold`).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT patient_id, name, created_at
            FROM patients
            WHERE instr(casefold(name), casefold(?1)) > 0
            ORDER BY casefold(name), name
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![query, limit as i64], |row| {
            Ok(PatientRow {
                patient_id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;

        let mut patients: Vec<Patient> = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Count registered patients.
    pub fn count_patients(&self) -> DbResult<u32> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as u32)
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    patient_id: String,
    name: String,
    created_at: String,
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.patient_id,
            name: row.name,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let patient = Patient::new("Ana".into());
        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved, patient);

        assert!(db.get_patient("missing").unwrap().is_none());
    }

    #[test]
    fn test_empty_name_rejected_by_storage() {
        let db = setup_db();
        let patient = Patient::new("   ".into());
        assert!(db.insert_patient(&patient).is_err());
    }

    #[test]
    fn test_search_substring_case_insensitive() {
        let db = setup_db();

        for name in ["Maria Lopez", "Amaro", "Bo", "mario"] {
            db.insert_patient(&Patient::new(name.into())).unwrap();
        }

        let results = db.search_patients("MAR", 10).unwrap();
        let names: Vec<_> = results.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Amaro", "Maria Lopez", "mario"]);
    }

    #[test]
    fn test_search_limit() {
        let db = setup_db();
        for i in 0..15 {
            db.insert_patient(&Patient::new(format!("Patient {:02}", i)))
                .unwrap();
        }

        let results = db.search_patients("patient", 10).unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(results[0].name, "Patient 00");
        assert_eq!(db.count_patients().unwrap(), 15);
    }

    #[test]
    fn test_search_wildcards_are_literal() {
        let db = setup_db();
        db.insert_patient(&Patient::new("Ana".into())).unwrap();
        db.insert_patient(&Patient::new("50% Off".into())).unwrap();

        let results = db.search_patients("%", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "50% Off");

        assert!(db.search_patients("_", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let db = setup_db();
        db.insert_patient(&Patient::new("Émile Zoë".into())).unwrap();
        db.insert_patient(&Patient::new("Ørjan Ås".into())).unwrap();
        db.insert_patient(&Patient::new("emil".into())).unwrap();

        let hits = db.search_patients("émile", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Émile Zoë");

        assert_eq!(db.search_patients("ZOË", 10).unwrap().len(), 1);
        assert_eq!(db.search_patients("øRJAN", 10).unwrap()[0].name, "Ørjan Ås");

        // Folding is case only; accents still distinguish
        let names: Vec<_> = db
            .search_patients("EMIL", 10)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["emil"]);
    }
}
