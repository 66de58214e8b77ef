use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, timestamp_now, DatabaseError};
use crate::models::*;

/// Stored login material for one account.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub id: Uuid,
    pub name: String,
    pub password_hash: String,
}

fn account_table(role: Role) -> &'static str {
    match role {
        Role::Patient => "patients",
        Role::Doctor => "doctors",
        Role::Admin => "admins",
    }
}

pub fn insert_patient(
    conn: &Connection,
    patient: &Patient,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, email, phone, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.email,
            patient.phone,
            password_hash,
            timestamp_now(),
        ],
    )
    .map_err(DatabaseError::classify)?;
    Ok(())
}

pub fn insert_doctor(
    conn: &Connection,
    doctor: &Doctor,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, email, specialty, available, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.email,
            doctor.specialty,
            doctor.available as i32,
            password_hash,
            timestamp_now(),
        ],
    )
    .map_err(DatabaseError::classify)?;
    Ok(())
}

pub fn insert_admin(
    conn: &Connection,
    admin: &Admin,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO admins (id, name, email, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            admin.id.to_string(),
            admin.name,
            admin.email,
            password_hash,
            timestamp_now(),
        ],
    )
    .map_err(DatabaseError::classify)?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, email, phone FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, name, email, phone)| {
        Ok(Patient {
            id: parse_uuid(&id)?,
            name,
            email,
            phone,
        })
    })
    .transpose()
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, specialty, available FROM doctors WHERE id = ?1",
    )?;
    let mut rows = list_doctor_rows(&mut stmt, params![id.to_string()])?;
    Ok(rows.pop())
}

/// All doctors ordered by name.
pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, specialty, available FROM doctors ORDER BY name ASC",
    )?;
    list_doctor_rows(&mut stmt, [])
}

fn list_doctor_rows<P: rusqlite::Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
) -> Result<Vec<Doctor>, DatabaseError> {
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, bool>(4)?,
        ))
    })?;

    let mut doctors = Vec::new();
    for row in rows {
        let (id, name, email, specialty, available) = row?;
        doctors.push(Doctor {
            id: parse_uuid(&id)?,
            name,
            email,
            specialty,
            available,
        });
    }
    Ok(doctors)
}

pub fn get_admin(conn: &Connection, id: &Uuid) -> Result<Option<Admin>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, email FROM admins WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, name, email)| {
        Ok(Admin {
            id: parse_uuid(&id)?,
            name,
            email,
        })
    })
    .transpose()
}

/// Every admin id, oldest account first.
pub fn list_admin_ids(conn: &Connection) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id FROM admins ORDER BY created_at ASC, id ASC")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter().map(|id| parse_uuid(id)).collect()
}

pub fn count_admins(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))?)
}

/// Display name of any account, if it exists.
pub fn account_name(
    conn: &Connection,
    role: Role,
    id: &Uuid,
) -> Result<Option<String>, DatabaseError> {
    let sql = format!("SELECT name FROM {} WHERE id = ?1", account_table(role));
    Ok(conn
        .query_row(&sql, params![id.to_string()], |row| row.get(0))
        .optional()?)
}

/// Look up login material by email within one role.
pub fn find_credentials(
    conn: &Connection,
    role: Role,
    email: &str,
) -> Result<Option<StoredCredentials>, DatabaseError> {
    let sql = format!(
        "SELECT id, name, password_hash FROM {} WHERE email = ?1",
        account_table(role)
    );
    let row = conn
        .query_row(&sql, params![email.trim()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .optional()?;

    row.map(|(id, name, password_hash)| {
        Ok(StoredCredentials {
            id: parse_uuid(&id)?,
            name,
            password_hash,
        })
    })
    .transpose()
}
