//! SQLite Connection Pool mit WAL-Modus

use chrono::Duration;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::DbError;
use crate::repository::{DatabaseConfig, TOKEN_TTL_SEKUNDEN_STANDARD, TTL_SEKUNDEN_MAX};

/// Wrapper um den SQLite Connection Pool
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pub(crate) pool: SqlitePool,
    pub(crate) token_ttl: Duration,
}

impl SqliteDb {
    /// Erstellt einen neuen Pool, fuehrt Migrationen aus
    pub async fn oeffnen(config: &DatabaseConfig) -> Result<Self, DbError> {
        let token_ttl = token_ttl(config.token_ttl_sekunden)?;
        let opts = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(if config.sqlite_wal {
                SqliteJournalMode::Wal
            } else {
                SqliteJournalMode::Delete
            })
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_verbindungen)
            .connect_with(opts)
            .await?;

        info!(url = %config.url, wal = config.sqlite_wal, "SQLite-Pool geoeffnet");

        let db = Self { pool, token_ttl };
        db.migrationen_ausfuehren().await?;

        Ok(db)
    }

    /// Fuehrt alle ausstehenden Migrationen aus
    pub async fn migrationen_ausfuehren(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Datenbank-Migrationen abgeschlossen");
        Ok(())
    }

    /// Setzt das Gueltigkeitsfenster fuer Tokens.
    ///
    /// Wirkt auch auf bereits ausgestellte Tokens, da der Ablauf bei jeder
    /// Pruefung aus `created_at` berechnet wird.
    pub fn mit_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Gibt den internen Pool zurueck (fuer Tests)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Erstellt eine In-Memory-Datenbank fuer Tests
    pub async fn in_memory() -> Result<Self, DbError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            // In-Memory benoetigt mindestens 1 persistente Verbindung
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let db = Self {
            pool,
            token_ttl: Duration::seconds(TOKEN_TTL_SEKUNDEN_STANDARD),
        };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }
}

/// Token-TTL aus Sekunden; nur 1 Sekunde bis [`TTL_SEKUNDEN_MAX`] ist erlaubt
fn token_ttl(sekunden: i64) -> Result<Duration, DbError> {
    if !(1..=TTL_SEKUNDEN_MAX).contains(&sekunden) {
        return Err(DbError::UngueltigeDaten(format!(
            "Token-TTL {sekunden}s ausserhalb von 1..={TTL_SEKUNDEN_MAX}"
        )));
    }
    Duration::try_seconds(sekunden)
        .ok_or_else(|| DbError::UngueltigeDaten(format!("Token-TTL {sekunden}s")))
}
