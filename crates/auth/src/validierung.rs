//! Formular-Validierung
//!
//! Feldfehler werden pro Feld gesammelt (erste Meldung gewinnt) und als
//! geordnete Map an den Renderer weitergegeben. Die Feldnamen entsprechen
//! den Namen im Formular: `email`, `password`, `new_password`,
//! `password_confirm`, `token`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const FELD_ERFORDERLICH: &str = "field required";
pub const UNGUELTIGE_EMAIL: &str = "invalid email";
pub const UNGUELTIGE_ANMELDEDATEN: &str = "invalid credentials";
pub const KONTO_NICHT_AKTIV: &str = "your account is not active";
pub const EMAIL_NICHT_VERFUEGBAR: &str = "email not available";
pub const PASSWOERTER_UNGLEICH: &str = "passwords do not match";
pub const PASSWORT_LAENGE: &str = "must be between 6 and 20 characters";

pub const PASSWORT_MIN_LAENGE: usize = 6;
pub const PASSWORT_MAX_LAENGE: usize = 20;

/// Feldname -> Fehlermeldung
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeldFehler(BTreeMap<String, String>);

impl FeldFehler {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn einzeln(feld: &str, nachricht: &str) -> Self {
        let mut fehler = Self::neu();
        fehler.hinzufuegen(feld, nachricht);
        fehler
    }

    /// Fuegt eine Meldung hinzu, sofern das Feld noch keine hat
    pub fn hinzufuegen(&mut self, feld: &str, nachricht: &str) {
        self.0
            .entry(feld.to_string())
            .or_insert_with(|| nachricht.to_string());
    }

    pub fn get(&self, feld: &str) -> Option<&str> {
        self.0.get(feld).map(String::as_str)
    }

    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` wenn keine Fehler gesammelt wurden
    pub fn ergebnis(self) -> Result<(), FeldFehler> {
        if self.ist_leer() {
            Ok(())
        } else {
            Err(self)
        }
    }

    // --- Regeln ---

    pub fn pflichtfeld(&mut self, feld: &str, wert: &str) -> &mut Self {
        if wert.trim().is_empty() {
            self.hinzufuegen(feld, FELD_ERFORDERLICH);
        }
        self
    }

    pub fn email(&mut self, feld: &str, wert: &str) -> &mut Self {
        if !wert.trim().is_empty() && !email_format_gueltig(wert.trim()) {
            self.hinzufuegen(feld, UNGUELTIGE_EMAIL);
        }
        self
    }

    pub fn passwort_laenge(&mut self, feld: &str, wert: &str) -> &mut Self {
        let laenge = wert.chars().count();
        if !wert.trim().is_empty()
            && !(PASSWORT_MIN_LAENGE..=PASSWORT_MAX_LAENGE).contains(&laenge)
        {
            self.hinzufuegen(feld, PASSWORT_LAENGE);
        }
        self
    }

    pub fn gleich(&mut self, feld: &str, wert: &str, erwartet: &str) -> &mut Self {
        if wert != erwartet {
            self.hinzufuegen(feld, PASSWOERTER_UNGLEICH);
        }
        self
    }
}

impl fmt::Display for FeldFehler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut erstes = true;
        for (feld, nachricht) in &self.0 {
            if !erstes {
                write!(f, ", ")?;
            }
            write!(f, "{feld}: {nachricht}")?;
            erstes = false;
        }
        Ok(())
    }
}

/// Einfache Strukturpruefung: `lokal@domain.tld`, keine Leerzeichen
pub fn email_format_gueltig(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((lokal, domain)) = email.split_once('@') else {
        return false;
    };
    if lokal.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.split('.');
    let anzahl = domain.split('.').count();
    anzahl >= 2 && labels.all(|l| !l.is_empty() && !l.starts_with('-') && !l.ends_with('-'))
}

/// E-Mail-Adressen werden getrimmt und klein geschrieben gespeichert
pub fn email_normalisieren(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Formulare
// ---------------------------------------------------------------------------

/// `POST /users/signup`
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrierungsFormular {
    pub email: String,
    pub password: String,
}

/// `POST /users/signin`
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnmeldeFormular {
    pub email: String,
    pub password: String,
}

/// `POST /users/forgot-password` und `POST /users/resend-token`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailFormular {
    pub email: String,
}

/// `POST /users/reset-password`
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswortResetFormular {
    pub token: String,
    pub new_password: String,
    pub password_confirm: String,
}

// Passwoerter tauchen nie in Debug-Ausgaben auf
impl fmt::Debug for RegistrierungsFormular {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrierungsFormular")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for AnmeldeFormular {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnmeldeFormular")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for PasswortResetFormular {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswortResetFormular")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_formate() {
        assert!(email_format_gueltig("a@x.com"));
        assert!(email_format_gueltig("vor.name+tag@sub.example.org"));
        assert!(!email_format_gueltig("ohne-at.com"));
        assert!(!email_format_gueltig("@x.com"));
        assert!(!email_format_gueltig("a@x"));
        assert!(!email_format_gueltig("a@x..com"));
        assert!(!email_format_gueltig("a@@x.com"));
        assert!(!email_format_gueltig("a b@x.com"));
    }

    #[test]
    fn normalisierung() {
        assert_eq!(email_normalisieren("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn erste_meldung_gewinnt() {
        let mut fehler = FeldFehler::neu();
        fehler.pflichtfeld("email", "").email("email", "");
        fehler.hinzufuegen("email", "zweite Meldung");
        assert_eq!(fehler.get("email"), Some(FELD_ERFORDERLICH));
    }

    #[test]
    fn passwort_grenzen() {
        let pruefe = |pw: &str| {
            let mut f = FeldFehler::neu();
            f.passwort_laenge("password", pw);
            f.ist_leer()
        };
        assert!(!pruefe("12345"));
        assert!(pruefe("123456"));
        assert!(pruefe(&"x".repeat(20)));
        assert!(!pruefe(&"x".repeat(21)));
        // Zeichen, nicht Bytes
        assert!(pruefe("ääääää"));
    }

    #[test]
    fn passwoerter_ungleich() {
        let mut fehler = FeldFehler::neu();
        fehler.gleich("password_confirm", "abcdef", "abcdeg");
        assert_eq!(fehler.get("password_confirm"), Some(PASSWOERTER_UNGLEICH));
    }

    #[test]
    fn anzeige_und_serialisierung() {
        let mut fehler = FeldFehler::neu();
        fehler.hinzufuegen("password", PASSWORT_LAENGE);
        fehler.hinzufuegen("email", UNGUELTIGE_EMAIL);
        assert_eq!(
            fehler.to_string(),
            "email: invalid email, password: must be between 6 and 20 characters"
        );
        let json = serde_json::to_value(&fehler).unwrap();
        assert_eq!(json["email"], "invalid email");
    }

    #[test]
    fn debug_ohne_passwort() {
        let formular = AnmeldeFormular {
            email: "a@x.com".into(),
            password: "geheim123".into(),
        };
        let ausgabe = format!("{formular:?}");
        assert!(ausgabe.contains("a@x.com"));
        assert!(!ausgabe.contains("geheim123"));
    }
}
