//! Gemeinsame Identifikationstypen fuer Notekeeper
//!
//! IDs werden von der Datenbank vergeben (numerisch, autoincrement).
//! Das Newtype-Pattern verhindert Verwechslungen zwischen Konto- und Token-IDs.

use serde::{Deserialize, Serialize};

/// Eindeutige Konto-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KontoId(pub i64);

impl KontoId {
    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }

    /// Nur positive IDs bezeichnen ein echtes Konto
    pub fn ist_gueltig(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for KontoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "konto:{}", self.0)
    }
}

/// Eindeutige Token-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub i64);

impl TokenId {
    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn konto_id_gueltigkeit() {
        assert!(KontoId(1).ist_gueltig());
        assert!(!KontoId(0).ist_gueltig());
        assert!(!KontoId(-7).ist_gueltig());
    }

    #[test]
    fn anzeige() {
        assert_eq!(KontoId(42).to_string(), "konto:42");
        assert_eq!(TokenId(7).to_string(), "token:7");
    }

    #[test]
    fn serde_transparent() {
        let json = serde_json::to_string(&KontoId(5)).unwrap();
        assert_eq!(json, "5");
        let zurueck: KontoId = serde_json::from_str("5").unwrap();
        assert_eq!(zurueck, KontoId(5));
    }
}
