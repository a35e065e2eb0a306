use serde::Deserialize;
use std::path::Path;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

use crate::types::Member;

pub const DUPLICATE_EMAIL: &str = "An account with this email already exists.";

#[derive(Debug, Error)]
pub enum MemberError {
    #[error("invalid sign-up: {}", .0.join(" "))]
    Invalid(Vec<String>),
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Raw sign-up form as posted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub city: String,
    pub country: String,
    pub interest: String,
}

impl SignupForm {
    /// Trim every field and lowercase the email.
    pub fn normalized(&self) -> SignupForm {
        SignupForm {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            city: self.city.trim().to_string(),
            country: self.country.trim().to_string(),
            interest: self.interest.trim().to_string(),
        }
    }

    /// Messages for every problem with an already-normalized form.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push("Name is required.".to_string());
        }
        if self.email.is_empty() {
            errors.push("Email is required.".to_string());
        } else if !self.email.contains('@') || self.email.chars().count() < 5 {
            errors.push("Enter a valid email address.".to_string());
        }
        errors
    }
}

/// File path of a `sqlite://` url, `None` for in-memory databases.
fn database_file(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next()?;
    (!path.is_empty() && !path.starts_with(":memory:")).then(|| Path::new(path))
}

#[derive(Clone)]
pub struct MemberStore {
    pool: SqlitePool,
}

impl MemberStore {
    pub async fn connect(url: &str) -> Result<Self, MemberError> {
        if let Some(parent) = database_file(url).and_then(|p| p.parent()) {
            std::fs::create_dir_all(parent).map_err(|e| MemberError::Database(e.into()))?;
        }
        let pool = SqlitePoolOptions::new().max_connections(4).connect(url).await?;
        let store = MemberStore { pool };
        store.init().await?;
        info!(url, "member store ready");
        Ok(store)
    }

    /// Private in-memory database. One connection, so every query sees the
    /// same data.
    pub async fn in_memory() -> Result<Self, MemberError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = MemberStore { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), MemberError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS members (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                city TEXT,
                country TEXT,
                interest TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Validate and store a sign-up, returning the new member id.
    pub async fn register(&self, form: &SignupForm) -> Result<i64, MemberError> {
        let form = form.normalized();
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(MemberError::Invalid(errors));
        }

        let result = sqlx::query(
            "INSERT INTO members (name, email, city, country, interest) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&form.name)
        .bind(&form.email)
        .bind(&form.city)
        .bind(&form.country)
        .bind(&form.interest)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                info!(id = done.last_insert_rowid(), "member registered");
                Ok(done.last_insert_rowid())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(MemberError::DuplicateEmail),
            Err(e) => Err(e.into()),
        }
    }

    /// All members, newest first.
    pub async fn list(&self) -> Result<Vec<Member>, MemberError> {
        let members = sqlx::query_as::<_, Member>(
            "SELECT id, name, email, city, country, interest, CAST(created_at AS TEXT) AS created_at
             FROM members ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }
}
