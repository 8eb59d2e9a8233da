//! notekeeper-core – Gemeinsame Typen
//!
//! Stellt die Identifikationstypen bereit, die von Datenbank-, Auth- und
//! Server-Crate gemeinsam genutzt werden.

pub mod types;

pub use types::{KontoId, TokenId};
