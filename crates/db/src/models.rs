//! Datenbankmodelle fuer Notekeeper
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank sowie die
//! Pruefergebnisse fuer Tokens. Sie sind reine Datenuebertragungsobjekte.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use notekeeper_core::{KontoId, TokenId};

// ---------------------------------------------------------------------------
// Konten
// ---------------------------------------------------------------------------

/// Konto-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KontoRecord {
    pub id: KontoId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Daten zum Erstellen eines neuen Kontos
#[derive(Debug, Clone)]
pub struct NeuesKonto<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Verwendungszweck eines Tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenZweck {
    /// Bestaetigung der E-Mail-Adresse nach der Registrierung
    Bestaetigung,
    /// Zuruecksetzen des Passworts
    PasswortReset,
}

impl TokenZweck {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Bestaetigung => "bestaetigung",
            Self::PasswortReset => "passwort_reset",
        }
    }
}

impl std::str::FromStr for TokenZweck {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bestaetigung" => Ok(Self::Bestaetigung),
            "passwort_reset" => Ok(Self::PasswortReset),
            other => Err(format!("Unbekannter Token-Zweck: {other}")),
        }
    }
}

/// Token-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: TokenId,
    pub owner_id: KontoId,
    pub zweck: TokenZweck,
    pub wert: String,
    pub confirmed: bool,
    /// Beginn des Gueltigkeitsfensters (wird beim Ersetzen zurueckgesetzt)
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Abgelaufen ist ein Token, sobald `jetzt - created_at > ttl`.
    /// Der Zustand wird berechnet, nicht gespeichert.
    pub fn ist_abgelaufen(&self, jetzt: DateTime<Utc>, ttl: Duration) -> bool {
        jetzt - self.created_at > ttl
    }

    /// Klassifiziert den Token zum Zeitpunkt `jetzt`
    ///
    /// Ablauf hat Vorrang vor der Bestaetigung: ein eingeloester Token meldet
    /// nach Ablauf des Fensters `Abgelaufen`, davor `BereitsBestaetigt`.
    pub fn pruefen(&self, jetzt: DateTime<Utc>, ttl: Duration) -> TokenPruefung {
        if self.ist_abgelaufen(jetzt, ttl) {
            TokenPruefung::Abgelehnt(TokenAblehnung::Abgelaufen)
        } else if self.confirmed {
            TokenPruefung::Abgelehnt(TokenAblehnung::BereitsBestaetigt)
        } else {
            TokenPruefung::Gueltig(())
        }
    }
}

/// Grund, aus dem ein Token nicht eingeloest werden kann
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAblehnung {
    NichtGefunden,
    BereitsBestaetigt,
    Abgelaufen,
}

impl std::fmt::Display for TokenAblehnung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NichtGefunden => write!(f, "Token nicht gefunden"),
            Self::BereitsBestaetigt => write!(f, "Token bereits bestaetigt"),
            Self::Abgelaufen => write!(f, "Token abgelaufen"),
        }
    }
}

/// Ergebnis einer Token-Pruefung oder -Einloesung
///
/// `Gueltig` traegt den Nutzwert der Operation (z.B. die Konto-ID bei der
/// Bestaetigung oder die E-Mail-Adresse beim Passwort-Reset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPruefung<T = ()> {
    Gueltig(T),
    Abgelehnt(TokenAblehnung),
}

impl<T> TokenPruefung<T> {
    pub fn ist_gueltig(&self) -> bool {
        matches!(self, Self::Gueltig(_))
    }

    pub fn ablehnung(&self) -> Option<TokenAblehnung> {
        match self {
            Self::Gueltig(_) => None,
            Self::Abgelehnt(grund) => Some(*grund),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TokenPruefung<U> {
        match self {
            Self::Gueltig(wert) => TokenPruefung::Gueltig(f(wert)),
            Self::Abgelehnt(grund) => TokenPruefung::Abgelehnt(grund),
        }
    }
}
