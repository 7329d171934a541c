use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, doctor_uid, full_name, age, sex, address, contact_number, email,
     medical_history, source, registration_token_id, created_at";

struct PatientRow {
    id: String,
    doctor_uid: String,
    full_name: String,
    age: Option<u32>,
    sex: Option<String>,
    address: Option<String>,
    contact_number: Option<String>,
    email: Option<String>,
    medical_history: Option<String>,
    source: String,
    registration_token_id: Option<String>,
    created_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            doctor_uid: row.get(1)?,
            full_name: row.get(2)?,
            age: row.get(3)?,
            sex: row.get(4)?,
            address: row.get(5)?,
            contact_number: row.get(6)?,
            email: row.get(7)?,
            medical_history: row.get(8)?,
            source: row.get(9)?,
            registration_token_id: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_patient(self) -> Result<Patient, DatabaseError> {
        Ok(Patient {
            id: Uuid::parse_str(&self.id).map_err(|_| DatabaseError::InvalidId {
                field: "patients.id".into(),
                value: self.id.clone(),
            })?,
            doctor_uid: self.doctor_uid,
            full_name: self.full_name,
            age: self.age,
            sex: self.sex,
            address: self.address,
            contact_number: self.contact_number,
            email: self.email,
            medical_history: self.medical_history,
            source: self.source.parse()?,
            registration_token_id: self.registration_token_id,
            created_at: parse_timestamp("patients.created_at", &self.created_at)?,
        })
    }
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, doctor_uid, full_name, age, sex, address, contact_number, email,
             medical_history, source, registration_token_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            patient.id.to_string(),
            patient.doctor_uid,
            patient.full_name,
            patient.age,
            patient.sex,
            patient.address,
            patient.contact_number,
            patient.email,
            patient.medical_history,
            patient.source.as_str(),
            patient.registration_token_id,
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], PatientRow::from_row)
        .optional()?;
    row.map(PatientRow::into_patient).transpose()
}

/// All patients owned by a doctor, newest first.
pub fn list_patients_for_doctor(
    conn: &Connection,
    doctor_uid: &str,
) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE doctor_uid = ?1 ORDER BY created_at DESC, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![doctor_uid], PatientRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PatientRow::into_patient).collect()
}
