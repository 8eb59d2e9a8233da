//! SQLite-Implementierung des TokenRepository
//!
//! Einloesungen laufen in einer Transaktion: der Token wird per bedingtem
//! UPDATE umgeschaltet (`confirmed = 0` und noch im Fenster), erst danach wird
//! das Konto geschrieben. Trifft das UPDATE keine Zeile, wird der Grund aus
//! dem aktuellen Datensatz abgeleitet.

use chrono::{DateTime, Utc};
use sqlx::{Row as _, Sqlite, Transaction};
use tracing::debug;

use notekeeper_core::{KontoId, TokenId};

use crate::error::DbError;
use crate::models::{TokenAblehnung, TokenPruefung, TokenRecord, TokenZweck};
use crate::repository::{DbResult, TokenRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{
    eindeutigkeit_verletzt, fremdschluessel_verletzt, jetzt, parse_zeitstempel, zeitstempel,
};

const TOKEN_SPALTEN: &str = "id, user_id, purpose, token, confirmed, created_at, updated_at";

impl TokenRepository for SqliteDb {
    async fn create(&self, owner: KontoId, zweck: TokenZweck, wert: &str) -> DbResult<TokenRecord> {
        let now = jetzt();
        let now_str = zeitstempel(now);

        let ergebnis = sqlx::query(
            "INSERT INTO user_tokens (user_id, purpose, token, confirmed, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(owner.inner())
        .bind(zweck.als_str())
        .bind(wert)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if eindeutigkeit_verletzt(&e) {
                DbError::Eindeutigkeit("Token-Wert bereits vergeben".into())
            } else if fremdschluessel_verletzt(&e) {
                DbError::nicht_gefunden(format!("Konto {owner}"))
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(TokenRecord {
            id: TokenId(ergebnis.last_insert_rowid()),
            owner_id: owner,
            zweck,
            wert: wert.to_string(),
            confirmed: false,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_pending(&self, owner: KontoId, zweck: TokenZweck) -> DbResult<Option<TokenRecord>> {
        let sql = format!(
            "SELECT {TOKEN_SPALTEN} FROM user_tokens
             WHERE user_id = ? AND purpose = ? AND confirmed = 0
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(owner.inner())
            .bind(zweck.als_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_token(&r)).transpose()
    }

    async fn check(&self, wert: &str, zweck: TokenZweck) -> DbResult<TokenPruefung> {
        let sql = format!("SELECT {TOKEN_SPALTEN} FROM user_tokens WHERE token = ?");
        let row = sqlx::query(&sql)
            .bind(wert)
            .fetch_optional(&self.pool)
            .await?;

        let record = row.map(|r| row_to_token(&r)).transpose()?;
        Ok(klassifizieren(record.as_ref(), zweck, jetzt(), self))
    }

    async fn confirm(&self, wert: &str) -> DbResult<TokenPruefung<KontoId>> {
        let now = jetzt();
        let mut tx = self.pool.begin().await?;

        let owner = einloesen(&mut tx, wert, TokenZweck::Bestaetigung, now, self).await?;
        let owner = match owner {
            Ok(owner) => owner,
            Err(grund) => {
                tx.rollback().await?;
                debug!(grund = %grund, "Bestaetigung abgelehnt");
                return Ok(TokenPruefung::Abgelehnt(grund));
            }
        };

        let affected = sqlx::query("UPDATE users SET is_active = 1, updated_at = ? WHERE id = ?")
            .bind(zeitstempel(now))
            .bind(owner.inner())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if affected == 0 {
            tx.rollback().await?;
            return Err(DbError::intern(format!("Konto {owner} zum Token fehlt")));
        }

        tx.commit().await?;
        debug!(konto = %owner, "Konto aktiviert");
        Ok(TokenPruefung::Gueltig(owner))
    }

    async fn supersede(&self, token_id: TokenId, neuer_wert: &str) -> DbResult<()> {
        let now_str = zeitstempel(jetzt());

        let affected = sqlx::query(
            "UPDATE user_tokens SET token = ?, created_at = ?, updated_at = ?
             WHERE id = ? AND confirmed = 0",
        )
        .bind(neuer_wert)
        .bind(&now_str)
        .bind(&now_str)
        .bind(token_id.inner())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if eindeutigkeit_verletzt(&e) {
                DbError::Eindeutigkeit("Token-Wert bereits vergeben".into())
            } else {
                DbError::Sqlx(e)
            }
        })?
        .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Ausstehender Token {token_id}")));
        }
        Ok(())
    }

    async fn consume_for_password_reset(
        &self,
        wert: &str,
        neuer_hash: &str,
    ) -> DbResult<TokenPruefung<String>> {
        let now = jetzt();
        let mut tx = self.pool.begin().await?;

        let owner = einloesen(&mut tx, wert, TokenZweck::PasswortReset, now, self).await?;
        let owner = match owner {
            Ok(owner) => owner,
            Err(grund) => {
                tx.rollback().await?;
                debug!(grund = %grund, "Passwort-Reset abgelehnt");
                return Ok(TokenPruefung::Abgelehnt(grund));
            }
        };

        let row = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ? RETURNING email",
        )
        .bind(neuer_hash)
        .bind(zeitstempel(now))
        .bind(owner.inner())
        .fetch_optional(&mut *tx)
        .await?;

        let email: String = match row {
            Some(r) => r.try_get("email")?,
            None => {
                tx.rollback().await?;
                return Err(DbError::intern(format!("Konto {owner} zum Token fehlt")));
            }
        };

        tx.commit().await?;
        debug!(konto = %owner, "Passwort per Token zurueckgesetzt");
        Ok(TokenPruefung::Gueltig(email))
    }
}

/// Schaltet einen ausstehenden Token innerhalb der Transaktion auf `confirmed`.
///
/// Liefert den Besitzer, oder den Ablehnungsgrund wenn der Token nicht
/// (mehr) einloesbar ist.
async fn einloesen(
    tx: &mut Transaction<'_, Sqlite>,
    wert: &str,
    zweck: TokenZweck,
    now: DateTime<Utc>,
    db: &SqliteDb,
) -> DbResult<Result<KontoId, TokenAblehnung>> {
    let frist = zeitstempel(now - db.token_ttl);

    let row = sqlx::query(
        "UPDATE user_tokens SET confirmed = 1, updated_at = ?
         WHERE token = ? AND purpose = ? AND confirmed = 0 AND created_at >= ?
         RETURNING user_id",
    )
    .bind(zeitstempel(now))
    .bind(wert)
    .bind(zweck.als_str())
    .bind(&frist)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(row) = row {
        return Ok(Ok(KontoId(row.try_get("user_id")?)));
    }

    let sql = format!("SELECT {TOKEN_SPALTEN} FROM user_tokens WHERE token = ?");
    let row = sqlx::query(&sql)
        .bind(wert)
        .fetch_optional(&mut **tx)
        .await?;
    let record = row.map(|r| row_to_token(&r)).transpose()?;

    match klassifizieren(record.as_ref(), zweck, now, db) {
        TokenPruefung::Abgelehnt(grund) => Ok(Err(grund)),
        TokenPruefung::Gueltig(()) => Err(DbError::intern(
            "Token einloesbar, aber bedingtes UPDATE traf keine Zeile",
        )),
    }
}

/// Ein Token mit anderem Zweck gilt als nicht vorhanden
fn klassifizieren(
    record: Option<&TokenRecord>,
    zweck: TokenZweck,
    now: DateTime<Utc>,
    db: &SqliteDb,
) -> TokenPruefung {
    match record {
        Some(t) if t.zweck == zweck => t.pruefen(now, db.token_ttl),
        _ => TokenPruefung::Abgelehnt(TokenAblehnung::NichtGefunden),
    }
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> DbResult<TokenRecord> {
    let zweck_str: String = row.try_get("purpose")?;
    let zweck = zweck_str.parse::<TokenZweck>().map_err(DbError::UngueltigeDaten)?;
    let confirmed: i64 = row.try_get("confirmed")?;

    Ok(TokenRecord {
        id: TokenId(row.try_get("id")?),
        owner_id: KontoId(row.try_get("user_id")?),
        zweck,
        wert: row.try_get("token")?,
        confirmed: confirmed != 0,
        created_at: parse_zeitstempel(row, "created_at")?,
        updated_at: parse_zeitstempel(row, "updated_at")?,
    })
}
