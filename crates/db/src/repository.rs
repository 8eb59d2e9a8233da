//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank-Implementierung. `SqliteDb` implementiert alle Traits; fuer
//! Tests genuegen einfache In-Memory-Implementierungen.

use std::future::Future;

use notekeeper_core::{KontoId, TokenId};

use crate::error::DbError;
use crate::models::{KontoRecord, NeuesKonto, TokenPruefung, TokenRecord, TokenZweck};

/// Result-Alias fuer Datenbankoperationen
pub type DbResult<T> = Result<T, DbError>;

/// Standard-Gueltigkeit eines Tokens: 1 Stunde
pub const TOKEN_TTL_SEKUNDEN_STANDARD: i64 = 60 * 60;

/// Obergrenze fuer konfigurierte Gueltigkeiten: 10 Jahre
pub const TTL_SEKUNDEN_MAX: i64 = 10 * 365 * 24 * 60 * 60;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://notekeeper.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
    /// Gueltigkeitsfenster fuer Tokens, gemessen ab `created_at`
    pub token_ttl_sekunden: i64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://notekeeper.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
            token_ttl_sekunden: TOKEN_TTL_SEKUNDEN_STANDARD,
        }
    }
}

/// Repository fuer Konten
pub trait AccountRepository: Send + Sync {
    /// Legt ein neues, inaktives Konto an.
    ///
    /// Eine bereits vergebene E-Mail-Adresse ergibt `DbError::Eindeutigkeit`.
    fn create(&self, data: NeuesKonto<'_>) -> impl Future<Output = DbResult<KontoRecord>> + Send;

    fn get_by_id(&self, id: KontoId) -> impl Future<Output = DbResult<Option<KontoRecord>>> + Send;

    fn get_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = DbResult<Option<KontoRecord>>> + Send;
}

/// Repository fuer Bestaetigungs- und Reset-Tokens
///
/// Alle Einloesungen (`confirm`, `consume_for_password_reset`) sind atomar:
/// von zwei gleichzeitigen Aufrufern mit demselben Wert gewinnt genau einer.
pub trait TokenRepository: Send + Sync {
    /// Legt einen neuen, unbestaetigten Token an.
    ///
    /// Prueft nicht, ob bereits ein ausstehender Token existiert. Ein bereits
    /// vergebener Wert ergibt `DbError::Eindeutigkeit`.
    fn create(
        &self,
        owner: KontoId,
        zweck: TokenZweck,
        wert: &str,
    ) -> impl Future<Output = DbResult<TokenRecord>> + Send;

    /// Liefert den ausstehenden (unbestaetigten) Token eines Kontos
    fn find_pending(
        &self,
        owner: KontoId,
        zweck: TokenZweck,
    ) -> impl Future<Output = DbResult<Option<TokenRecord>>> + Send;

    /// Klassifiziert einen Token-Wert ohne ihn zu veraendern
    fn check(
        &self,
        wert: &str,
        zweck: TokenZweck,
    ) -> impl Future<Output = DbResult<TokenPruefung>> + Send;

    /// Loest einen Bestaetigungs-Token ein und aktiviert das Konto
    fn confirm(&self, wert: &str) -> impl Future<Output = DbResult<TokenPruefung<KontoId>>> + Send;

    /// Ersetzt den Wert eines ausstehenden Tokens und startet dessen Fenster neu
    fn supersede(
        &self,
        token_id: TokenId,
        neuer_wert: &str,
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Loest einen Reset-Token ein, setzt den neuen Passwort-Hash und
    /// liefert die E-Mail-Adresse des Kontos
    fn consume_for_password_reset(
        &self,
        wert: &str,
        neuer_hash: &str,
    ) -> impl Future<Output = DbResult<TokenPruefung<String>>> + Send;
}
