//! Account credentials: registration, login and password hashing.
//!
//! Passwords are stored as `pbkdf2-sha256$<iterations>$<salt>$<hash>` with
//! base64 salt and hash, so the iteration count can be raised later without
//! invalidating existing accounts. Verification compares in constant time.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::db::{repository, DatabaseError};
use crate::models::{Actor, Admin, Doctor, Patient, Role};

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
const SCHEME: &str = "pbkdf2-sha256";
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Invalid account details: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Registration payload for a patient.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub password: Zeroizing<String>,
    pub phone: Option<String>,
}

/// Admin-supplied payload for a doctor account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub password: Zeroizing<String>,
    pub specialty: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════
// Password hashing
// ═══════════════════════════════════════════════════════════

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Hash a password with a fresh salt and the default work factor.
pub fn hash_password(password: &str) -> String {
    hash_password_with(password, PBKDF2_ITERATIONS, &generate_salt())
}

/// Hash a password with an explicit work factor and salt.
pub fn hash_password_with(password: &str, iterations: u32, salt: &[u8]) -> String {
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut hash);
    let encoded = format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    );
    hash.zeroize();
    encoded
}

/// Work factor of the unknown-account hash; matches seeded accounts in tests.
const DUMMY_ITERATIONS: u32 = if cfg!(test) { 1_000 } else { PBKDF2_ITERATIONS };
const DUMMY_PASSWORD: &str = "optidoc-no-such-account";

/// Hash verified against when no account matches a login.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password_with(DUMMY_PASSWORD, DUMMY_ITERATIONS, &generate_salt()))
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt),
        STANDARD_NO_PAD.decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return false;
    }

    let mut actual = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);
    let matches = actual.ct_eq(expected.as_slice()).unwrap_u8() == 1;
    actual.zeroize();
    matches
}

// ═══════════════════════════════════════════════════════════
// Accounts
// ═══════════════════════════════════════════════════════════

fn validate_account(name: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::Validation("name is required".into()));
    }
    let email = email.trim();
    if email.len() < 3 || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AuthError::Validation("email is not valid".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn map_insert_error(err: DatabaseError) -> AuthError {
    if err.is_unique_violation() {
        AuthError::EmailTaken
    } else {
        AuthError::Database(err)
    }
}

/// Self-service patient registration.
pub fn register_patient(conn: &Connection, new: &NewPatient) -> Result<Patient, AuthError> {
    validate_account(&new.name, &new.email, &new.password)?;
    let patient = Patient {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        email: new.email.trim().to_string(),
        phone: new.phone.as_ref().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
    };
    repository::insert_patient(conn, &patient, &hash_password(&new.password))
        .map_err(map_insert_error)?;
    tracing::info!(patient_id = %patient.id, "Patient registered");
    Ok(patient)
}

pub fn create_doctor(conn: &Connection, new: &NewDoctor) -> Result<Doctor, AuthError> {
    validate_account(&new.name, &new.email, &new.password)?;
    if new.specialty.trim().is_empty() {
        return Err(AuthError::Validation("specialty is required".into()));
    }
    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        email: new.email.trim().to_string(),
        specialty: new.specialty.trim().to_string(),
        available: new.available,
    };
    repository::insert_doctor(conn, &doctor, &hash_password(&new.password))
        .map_err(map_insert_error)?;
    tracing::info!(doctor_id = %doctor.id, "Doctor account created");
    Ok(doctor)
}

pub fn create_admin(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
) -> Result<Admin, AuthError> {
    validate_account(name, email, password)?;
    let admin = Admin {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email: email.trim().to_string(),
    };
    repository::insert_admin(conn, &admin, &hash_password(password)).map_err(map_insert_error)?;
    tracing::info!(admin_id = %admin.id, "Admin account created");
    Ok(admin)
}

/// Create the first admin when none exists yet. Returns `None` otherwise.
pub fn ensure_bootstrap_admin(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
) -> Result<Option<Admin>, AuthError> {
    if repository::count_admins(conn)? > 0 {
        return Ok(None);
    }
    create_admin(conn, name, email, password).map(Some)
}

/// Authenticate by role, email and password.
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub fn login(
    conn: &Connection,
    role: Role,
    email: &str,
    password: &str,
) -> Result<Actor, AuthError> {
    let Some(creds) = repository::find_credentials(conn, role, email)? else {
        // Burn the same work as a real check so response time does not
        // reveal whether the account exists.
        let _ = verify_password(password, dummy_hash());
        tracing::info!(role = %role, "Login rejected: unknown account");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &creds.password_hash) {
        tracing::info!(role = %role, account_id = %creds.id, "Login rejected: bad password");
        return Err(AuthError::InvalidCredentials);
    }
    Ok(Actor::new(creds.id, role, creds.name))
}
