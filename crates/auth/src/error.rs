//! Fehlertypen fuer den Identity-Service
//!
//! Jeder Fehler gehoert zu genau einer [`FehlerArt`]. Die HTTP-Schicht
//! entscheidet anhand der Art ueber Statuscode und Seite, der Service selbst
//! kennt keine Statuscodes.

use notekeeper_db::{DbError, TokenAblehnung};
use thiserror::Error;

use crate::validierung::{
    FeldFehler, EMAIL_NICHT_VERFUEGBAR, KONTO_NICHT_AKTIV, UNGUELTIGE_ANMELDEDATEN,
};

/// Alle moeglichen Fehler im Identity-Service
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Eingaben ---
    #[error("Ungueltige Eingaben: {0}")]
    Validierung(FeldFehler),

    // --- Konflikte ---
    #[error("E-Mail-Adresse bereits vergeben")]
    EmailVergeben,

    // --- Anmeldung ---
    #[error("E-Mail oder Passwort falsch")]
    UngueltigeAnmeldedaten,

    #[error("Konto noch nicht bestaetigt")]
    KontoNichtBestaetigt {
        /// Ausstehender Bestaetigungs-Token, falls vorhanden (fuer "erneut senden")
        ausstehender_token: Option<String>,
    },

    // --- Tokens ---
    #[error("Token nicht gefunden")]
    TokenNichtGefunden,

    #[error("Token bereits bestaetigt")]
    TokenBereitsBestaetigt,

    #[error("Token abgelaufen")]
    TokenAbgelaufen,

    // --- Infrastruktur ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    #[error("Datenbankfehler ({kontext}): {quelle}")]
    Datenbank {
        kontext: &'static str,
        #[source]
        quelle: DbError,
    },

    #[error("Sitzungsfehler: {0}")]
    Sitzung(String),

    #[error("Mailversand fehlgeschlagen: {0}")]
    Mail(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

/// Grobe Einordnung eines Fehlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FehlerArt {
    /// Fehlende oder fehlerhafte Formularfelder
    Validierung,
    /// Doppelte E-Mail, bereits eingeloester Token
    Konflikt,
    /// Unbekannter oder abgelaufener Token
    Token,
    /// Falsche Anmeldedaten oder unbestaetigtes Konto
    Anmeldung,
    /// Speicher, Hashing, Sitzung, Mail
    Intern,
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Liefert einen Mapper fuer `map_err`, der den Kontext der Operation mitgibt
    pub fn datenbank(kontext: &'static str) -> impl FnOnce(DbError) -> Self {
        move |quelle| Self::Datenbank { kontext, quelle }
    }

    /// Einzelner Feldfehler als Validierungsfehler
    pub fn feld(feld: &str, nachricht: &str) -> Self {
        Self::Validierung(FeldFehler::einzeln(feld, nachricht))
    }

    pub fn art(&self) -> FehlerArt {
        match self {
            Self::Validierung(_) => FehlerArt::Validierung,
            Self::EmailVergeben | Self::TokenBereitsBestaetigt => FehlerArt::Konflikt,
            Self::UngueltigeAnmeldedaten | Self::KontoNichtBestaetigt { .. } => {
                FehlerArt::Anmeldung
            }
            Self::TokenNichtGefunden | Self::TokenAbgelaufen => FehlerArt::Token,
            Self::PasswortHashing(_)
            | Self::Datenbank { .. }
            | Self::Sitzung(_)
            | Self::Mail(_)
            | Self::Intern(_) => FehlerArt::Intern,
        }
    }

    /// Text fuer den Benutzer. Interne Ursachen werden nie preisgegeben.
    pub fn nutzer_nachricht(&self) -> &'static str {
        match self {
            Self::Validierung(_) => "please check the highlighted fields",
            Self::EmailVergeben => EMAIL_NICHT_VERFUEGBAR,
            Self::UngueltigeAnmeldedaten => UNGUELTIGE_ANMELDEDATEN,
            Self::KontoNichtBestaetigt { .. } => KONTO_NICHT_AKTIV,
            Self::TokenNichtGefunden => "invalid token, please request a new link",
            Self::TokenBereitsBestaetigt => "this token was already used",
            Self::TokenAbgelaufen => "your token has expired, please try again",
            _ => "something went wrong, please try again later",
        }
    }

    /// Feldfehler fuer das Formular, aus dem der Fehler stammt
    pub fn feld_fehler(&self) -> Option<FeldFehler> {
        match self {
            Self::Validierung(fehler) => Some(fehler.clone()),
            Self::EmailVergeben | Self::UngueltigeAnmeldedaten | Self::KontoNichtBestaetigt { .. } => {
                Some(FeldFehler::einzeln("email", self.nutzer_nachricht()))
            }
            _ => None,
        }
    }

    /// Protokolliert den Fehler passend zu seiner Art.
    ///
    /// Fachliche Ergebnisse landen hoechstens auf debug, nur interne Fehler
    /// werden mit voller Ursache als error geloggt.
    pub fn protokollieren(&self, operation: &str) {
        match self.art() {
            FehlerArt::Intern => {
                tracing::error!(operation, fehler = %self, ursache = ?std::error::Error::source(self), "Interner Fehler");
            }
            FehlerArt::Konflikt => {
                tracing::debug!(operation, fehler = %self, "Konflikt");
            }
            FehlerArt::Validierung | FehlerArt::Token | FehlerArt::Anmeldung => {
                tracing::trace!(operation, fehler = %self, "Abgelehnt");
            }
        }
    }
}

impl From<TokenAblehnung> for AuthError {
    fn from(grund: TokenAblehnung) -> Self {
        match grund {
            TokenAblehnung::NichtGefunden => Self::TokenNichtGefunden,
            TokenAblehnung::BereitsBestaetigt => Self::TokenBereitsBestaetigt,
            TokenAblehnung::Abgelaufen => Self::TokenAbgelaufen,
        }
    }
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Sitzung(e.to_string())
    }
}

/// Result-Alias fuer den Identity-Service
pub type AuthResult<T> = Result<T, AuthError>;
