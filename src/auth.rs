//! Email/password accounts and sessions

use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::init_schema;
use crate::error::{ReceiptError, Result};
use crate::models::{Session, UserProfile};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Authenticates users and exposes their profile
pub trait IdentityProvider {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile>;

    fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    fn current_user(&self, session: &Session) -> Result<UserProfile>;

    fn sign_out(&self, session: Session) -> Result<()>;
}

/// Trim, lower-case and sanity-check an email address
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if EMAIL.is_match(&email) {
        Ok(email)
    } else {
        Err(ReceiptError::InvalidEmail(email))
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ReceiptError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| ReceiptError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Identity provider backed by the `users` and `sessions` tables
pub struct SqliteIdentityProvider {
    conn: Connection,
}

impl SqliteIdentityProvider {
    pub fn new(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT uid, email, display_name, created_at FROM users WHERE uid = ?1",
                [uid],
                |row| {
                    Ok(UserProfile {
                        uid: row.get(0)?,
                        email: row.get(1)?,
                        display_name: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }
}

impl IdentityProvider for SqliteIdentityProvider {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ReceiptError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let taken: Option<String> = self
            .conn
            .query_row("SELECT uid FROM users WHERE email = ?1", [&email], |row| {
                row.get(0)
            })
            .optional()?;
        if taken.is_some() {
            return Err(ReceiptError::EmailInUse(email));
        }

        let uid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO users (uid, email, password_hash, display_name) VALUES (?1, ?2, ?3, ?4)",
            (&uid, &email, hash_password(password)?, display_name),
        )?;
        info!(%uid, %email, "account created");

        self.profile(&uid)?.ok_or(ReceiptError::NotFound(uid))
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        let account: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT uid, password_hash FROM users WHERE email = ?1",
                [&email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((uid, stored)) = account else {
            warn!(%email, "sign-in for unknown account");
            return Err(ReceiptError::InvalidCredentials);
        };
        if !verify_password(password, &stored)? {
            warn!(%email, "sign-in with wrong password");
            return Err(ReceiptError::InvalidCredentials);
        }

        let token = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO sessions (token, uid) VALUES (?1, ?2)",
            (&token, &uid),
        )?;
        info!(%uid, "signed in");
        Ok(Session { token, uid })
    }

    fn current_user(&self, session: &Session) -> Result<UserProfile> {
        let uid: Option<String> = self
            .conn
            .query_row(
                "SELECT uid FROM sessions WHERE token = ?1",
                [&session.token],
                |row| row.get(0),
            )
            .optional()?;

        match uid {
            Some(uid) if uid == session.uid => {
                self.profile(&uid)?.ok_or(ReceiptError::InvalidSession)
            }
            _ => Err(ReceiptError::InvalidSession),
        }
    }

    fn sign_out(&self, session: Session) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", [&session.token])?;
        if removed == 0 {
            return Err(ReceiptError::InvalidSession);
        }
        info!(uid = %session.uid, "signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("  Lab@Example.COM ").unwrap(),
            "lab@example.com"
        );
        assert!(matches!(
            normalize_email("not-an-email"),
            Err(ReceiptError::InvalidEmail(_))
        ));
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }
}
