//! notekeeper-db – Konto- und Token-Speicher
//!
//! Das Repository-Pattern entkoppelt den Identity-Service von der konkreten
//! Datenbank. `SqliteDb` implementiert beide Repository-Traits; Tests koennen
//! stattdessen eigene In-Memory-Implementierungen verwenden.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use models::{
    KontoRecord, NeuesKonto, TokenAblehnung, TokenPruefung, TokenRecord, TokenZweck,
};
pub use repository::{
    AccountRepository, DatabaseConfig, DbResult, TokenRepository, TTL_SEKUNDEN_MAX,
};
pub use sqlite::SqliteDb;
