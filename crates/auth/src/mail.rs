//! Mailversand
//!
//! Der Identity-Service uebergibt fertig zusammengesetzte Nachrichten an einen
//! [`Mailer`]. Der Transport (SMTP, HTTP-API, ...) ist nicht Teil dieses
//! Crates; mitgeliefert werden nur [`LogMailer`] und [`SpeicherMailer`].

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::AuthResult;

pub const BETREFF_BESTAETIGUNG: &str = "Your confirmation token";
pub const BETREFF_NEUE_BESTAETIGUNG: &str = "Your new confirmation token";
pub const BETREFF_RESET: &str = "Reset your password";
pub const BETREFF_PASSWORT_GEAENDERT: &str = "Password changed";

/// Eine ausgehende E-Mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nachricht {
    pub von: String,
    pub an: Vec<String>,
    pub betreff: String,
    pub inhalt: String,
    pub ist_html: bool,
}

impl Nachricht {
    /// Bestaetigungslink nach der Registrierung (oder erneut angefordert)
    pub fn bestaetigung(von: &str, an: &str, link: &str, erneut: bool) -> Self {
        let betreff = if erneut {
            BETREFF_NEUE_BESTAETIGUNG
        } else {
            BETREFF_BESTAETIGUNG
        };
        Self {
            von: von.to_string(),
            an: vec![an.to_string()],
            betreff: betreff.to_string(),
            inhalt: format!(
                "<p>Please confirm your account by following this link:</p>\
                 <p><a href=\"{link}\">{link}</a></p>"
            ),
            ist_html: true,
        }
    }

    pub fn passwort_reset(von: &str, an: &str, link: &str) -> Self {
        Self {
            von: von.to_string(),
            an: vec![an.to_string()],
            betreff: BETREFF_RESET.to_string(),
            inhalt: format!(
                "<p>Someone requested a password reset for your account.</p>\
                 <p><a href=\"{link}\">{link}</a></p>\
                 <p>If this was not you, you can ignore this email.</p>"
            ),
            ist_html: true,
        }
    }

    pub fn passwort_geaendert(von: &str, an: &str) -> Self {
        Self {
            von: von.to_string(),
            an: vec![an.to_string()],
            betreff: BETREFF_PASSWORT_GEAENDERT.to_string(),
            inhalt: "Your password was successfully changed".to_string(),
            ist_html: false,
        }
    }
}

/// Versendet Nachrichten
pub trait Mailer: Send + Sync {
    fn senden(&self, nachricht: Nachricht) -> impl Future<Output = AuthResult<()>> + Send;
}

/// Schreibt ausgehende Mails ins Log statt sie zu versenden
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn senden(&self, nachricht: Nachricht) -> AuthResult<()> {
        tracing::info!(
            von = %nachricht.von,
            an = ?nachricht.an,
            betreff = %nachricht.betreff,
            html = nachricht.ist_html,
            "Mail versendet (Log-Transport)"
        );
        tracing::debug!(inhalt = %nachricht.inhalt, "Mail-Inhalt");
        Ok(())
    }
}

/// Haelt versendete Nachrichten im Speicher (Tests, lokale Entwicklung)
#[derive(Debug, Clone, Default)]
pub struct SpeicherMailer {
    postausgang: Arc<Mutex<Vec<Nachricht>>>,
}

impl SpeicherMailer {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn nachrichten(&self) -> Vec<Nachricht> {
        self.postausgang
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn letzte(&self) -> Option<Nachricht> {
        self.postausgang
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// Letzter Pfadabschnitt des ersten Links in der letzten Nachricht
    pub fn letzter_token(&self) -> Option<String> {
        let nachricht = self.letzte()?;
        let start = nachricht.inhalt.find("href=\"")? + "href=\"".len();
        let rest = &nachricht.inhalt[start..];
        let link = &rest[..rest.find('"')?];
        link.rsplit('/').next().map(str::to_string)
    }
}

impl Mailer for SpeicherMailer {
    async fn senden(&self, nachricht: Nachricht) -> AuthResult<()> {
        tracing::debug!(an = ?nachricht.an, betreff = %nachricht.betreff, "Mail gespeichert");
        self.postausgang
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(nachricht);
        Ok(())
    }
}
