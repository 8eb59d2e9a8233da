//! SQLite-Implementierung des AccountRepository

use sqlx::Row as _;

use notekeeper_core::KontoId;

use crate::error::DbError;
use crate::models::{KontoRecord, NeuesKonto};
use crate::repository::{AccountRepository, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{eindeutigkeit_verletzt, jetzt, parse_zeitstempel, zeitstempel};

impl AccountRepository for SqliteDb {
    async fn create(&self, data: NeuesKonto<'_>) -> DbResult<KontoRecord> {
        let now = jetzt();
        let now_str = zeitstempel(now);

        let ergebnis = sqlx::query(
            "INSERT INTO users (email, password_hash, is_active, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if eindeutigkeit_verletzt(&e) {
                DbError::Eindeutigkeit(format!("E-Mail '{}' bereits vergeben", data.email))
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(KontoRecord {
            id: KontoId(ergebnis.last_insert_rowid()),
            email: data.email.to_string(),
            password_hash: data.password_hash.to_string(),
            is_active: false,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: KontoId) -> DbResult<Option<KontoRecord>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, is_active, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id.inner())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_konto(&r)).transpose()
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<KontoRecord>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, is_active, created_at, updated_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_konto(&r)).transpose()
    }
}

fn row_to_konto(row: &sqlx::sqlite::SqliteRow) -> DbResult<KontoRecord> {
    let is_active: i64 = row.try_get("is_active")?;

    Ok(KontoRecord {
        id: KontoId(row.try_get("id")?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_active: is_active != 0,
        created_at: parse_zeitstempel(row, "created_at")?,
        updated_at: parse_zeitstempel(row, "updated_at")?,
    })
}
