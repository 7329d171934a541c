use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Insert one audit entry.
pub fn insert_audit_entry(
    conn: &Connection,
    timestamp: &str,
    source: &str,
    action: &str,
    entity: &str,
    doctor_uid: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, source, action, entity, doctor_uid) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![timestamp, source, action, entity, doctor_uid],
    )?;
    Ok(())
}

/// Prune audit entries with a timestamp before the given cutoff.
pub fn prune_audit_log(conn: &Connection, cutoff: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

/// Most recent audit entries attributed to a doctor.
/// Returns (timestamp, source, action, entity) tuples, newest first.
pub fn query_audit_by_doctor(
    conn: &Connection,
    doctor_uid: &str,
    limit: u32,
) -> Result<Vec<(String, String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, source, action, entity FROM audit_log
         WHERE doctor_uid = ?1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![doctor_uid, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
