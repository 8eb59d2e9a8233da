//! notekeeper-auth – Identity-Service und Sitzungen
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id
//! - Token-Werte fuer Bestaetigung und Passwort-Reset
//! - Formular-Validierung mit Feldfehlern
//! - Mail-Vertrag (Transport austauschbar)
//! - Session-Gate und In-Memory-Store fuer `tower-sessions`, inkl. CSRF-Token
//! - IdentityService (Registrierung, Bestaetigung, Login, Logout, Reset)

pub mod error;
pub mod mail;
pub mod password;
pub mod service;
pub mod session;
pub mod token;
pub mod validierung;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult, FehlerArt};
pub use mail::{LogMailer, Mailer, Nachricht, SpeicherMailer};
pub use password::{Argon2Hasher, PasswortHasher};
pub use service::{IdentityKonfig, IdentityService};
pub use session::{
    Flash, FlashArt, SessionGate, SitzungsSpeicher, CSRF_SCHLUESSEL, SITZUNG_LEBENSDAUER_SEKUNDEN,
};
pub use token::token_generieren;
pub use validierung::{
    AnmeldeFormular, EmailFormular, FeldFehler, PasswortResetFormular, RegistrierungsFormular,
};
