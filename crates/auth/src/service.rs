//! Identity-Service fuer Notekeeper
//!
//! Zentraler Einstiegspunkt fuer Registrierung, Bestaetigung, Anmeldung,
//! Abmeldung, erneutes Senden des Bestaetigungslinks und Passwort-Reset.
//! Nutzt die Repositories aus `notekeeper-db`, den Passwort-Hasher, den
//! Mailer und den Session-Gate.
//!
//! Jede Operation liefert ein `AuthResult`; die Fehlerart entscheidet in der
//! HTTP-Schicht ueber Seite und Statuscode.

use std::sync::Arc;

use tower_sessions::Session;
use tracing::{debug, error, info, warn};

use notekeeper_core::{KontoId, TokenId};
use notekeeper_db::{
    AccountRepository, KontoRecord, NeuesKonto, TokenAblehnung, TokenPruefung, TokenRepository,
    TokenZweck,
};

use crate::{
    error::{AuthError, AuthResult},
    mail::{Mailer, Nachricht},
    password::PasswortHasher,
    session::SessionGate,
    token::token_generieren,
    validierung::{email_normalisieren, FeldFehler, UNGUELTIGE_EMAIL},
};

/// Maximale Anzahl Versuche bei einer Token-Wert-Kollision
pub const MAX_TOKEN_VERSUCHE: usize = 3;

/// Einstellungen fuer Links und Absender
#[derive(Debug, Clone)]
pub struct IdentityKonfig {
    /// Basis-URL fuer Links in Mails, z.B. `http://localhost:8080`
    pub app_domain: String,
    /// Absenderadresse ausgehender Mails
    pub absender: String,
}

/// Identity-Service
pub struct IdentityService<R, H, M> {
    repo: Arc<R>,
    hasher: Arc<H>,
    mailer: Arc<M>,
    sitzungen: SessionGate,
    konfig: IdentityKonfig,
    /// Vergleichs-Hash fuer unbekannte E-Mails
    dummy_hash: String,
}

impl<R, H, M> IdentityService<R, H, M>
where
    R: AccountRepository + TokenRepository,
    H: PasswortHasher,
    M: Mailer,
{
    /// Erstellt einen neuen Identity-Service
    pub fn neu(
        repo: Arc<R>,
        hasher: Arc<H>,
        mailer: Arc<M>,
        konfig: IdentityKonfig,
    ) -> AuthResult<Self> {
        let dummy_hash = hasher.hashen(&token_generieren())?;
        Ok(Self {
            repo,
            hasher,
            mailer,
            sitzungen: SessionGate::neu(),
            konfig,
            dummy_hash,
        })
    }

    pub fn sitzungen(&self) -> &SessionGate {
        &self.sitzungen
    }

    pub fn konfig(&self) -> &IdentityKonfig {
        &self.konfig
    }

    /// Registriert ein neues, inaktives Konto und versendet den Bestaetigungslink
    pub async fn registrieren(&self, email: &str, passwort: &str) -> AuthResult<KontoRecord> {
        let mut fehler = FeldFehler::neu();
        fehler
            .pflichtfeld("email", email)
            .email("email", email)
            .pflichtfeld("password", passwort)
            .passwort_laenge("password", passwort);
        fehler.ergebnis().map_err(AuthError::Validierung)?;

        let email = email_normalisieren(email);
        let passwort_hash = self.hasher.hashen(passwort)?;

        let konto = AccountRepository::create(
            &*self.repo,
            NeuesKonto {
                email: &email,
                password_hash: &passwort_hash,
            },
        )
        .await
        .map_err(|e| {
            if e.ist_eindeutigkeit() {
                AuthError::EmailVergeben
            } else {
                AuthError::datenbank("Konto anlegen")(e)
            }
        })?;

        let wert = self
            .token_ausstellen(konto.id, TokenZweck::Bestaetigung)
            .await?;
        let link = self.link("confirm", &wert);
        self.mailer
            .senden(Nachricht::bestaetigung(
                &self.konfig.absender,
                &konto.email,
                &link,
                false,
            ))
            .await?;

        info!(konto = %konto.id, email = %konto.email, "Neues Konto registriert");
        Ok(konto)
    }

    /// Loest einen Bestaetigungs-Token ein und aktiviert das Konto
    pub async fn registrierung_bestaetigen(&self, token: &str) -> AuthResult<KontoId> {
        if token.trim().is_empty() {
            return Err(AuthError::TokenNichtGefunden);
        }

        match self
            .repo
            .confirm(token)
            .await
            .map_err(AuthError::datenbank("Token bestaetigen"))?
        {
            TokenPruefung::Gueltig(konto) => {
                info!(konto = %konto, "Konto bestaetigt");
                Ok(konto)
            }
            TokenPruefung::Abgelehnt(grund) => Err(grund.into()),
        }
    }

    /// Meldet ein Konto an und bindet es an eine neue Sitzung.
    ///
    /// Unbekannte E-Mail und falsches Passwort sind von aussen nicht
    /// unterscheidbar. Der Aktiv-Status wird erst nach dem Passwort geprueft.
    pub async fn anmelden(
        &self,
        sitzung: &Session,
        email: &str,
        passwort: &str,
    ) -> AuthResult<KontoRecord> {
        let mut fehler = FeldFehler::neu();
        fehler
            .pflichtfeld("email", email)
            .email("email", email)
            .pflichtfeld("password", passwort);
        fehler.ergebnis().map_err(AuthError::Validierung)?;

        let email = email_normalisieren(email);
        let konto = self
            .repo
            .get_by_email(&email)
            .await
            .map_err(AuthError::datenbank("Konto laden"))?;

        let Some(konto) = konto else {
            self.passwort_pruefen(passwort, &self.dummy_hash);
            debug!("Anmeldung mit unbekannter E-Mail");
            return Err(AuthError::UngueltigeAnmeldedaten);
        };

        if !self.passwort_pruefen(passwort, &konto.password_hash) {
            warn!(konto = %konto.id, "Fehlgeschlagener Login-Versuch");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        if !konto.is_active {
            let ausstehend = self
                .repo
                .find_pending(konto.id, TokenZweck::Bestaetigung)
                .await
                .map_err(AuthError::datenbank("Ausstehenden Token laden"))?;
            return Err(AuthError::KontoNichtBestaetigt {
                ausstehender_token: ausstehend.map(|t| t.wert),
            });
        }

        self.sitzungen.etablieren(sitzung, konto.id).await?;
        info!(konto = %konto.id, "Konto angemeldet");
        Ok(konto)
    }

    /// Meldet ab, indem die Sitzung serverseitig zerstoert wird
    pub async fn abmelden(&self, sitzung: &Session) -> AuthResult<()> {
        let konto = self.sitzungen.konto_id(sitzung).await?;
        self.sitzungen.abbauen(sitzung).await?;
        if let Some(konto) = konto {
            info!(konto = %konto, "Konto abgemeldet");
        }
        Ok(())
    }

    /// Ersetzt den ausstehenden Bestaetigungs-Token und versendet den neuen Link.
    ///
    /// Der Token wird auch dann ersetzt, wenn er noch gueltig ist. Hat ein
    /// inaktives Konto keinen ausstehenden Token (Versand bei der Registrierung
    /// fehlgeschlagen), wird ein neuer ausgestellt.
    pub async fn bestaetigung_erneut_senden(&self, email: &str) -> AuthResult<()> {
        let email = self.email_pruefen(email)?;
        let konto = self.konto_fuer_formular(&email).await?;

        let ausstehend = self
            .repo
            .find_pending(konto.id, TokenZweck::Bestaetigung)
            .await
            .map_err(AuthError::datenbank("Ausstehenden Token laden"))?;

        let wert = match ausstehend {
            Some(token) => self.token_ersetzen(token.id).await?,
            None if !konto.is_active => {
                debug!(konto = %konto.id, "Kein ausstehender Token, stelle neuen aus");
                self.token_ausstellen(konto.id, TokenZweck::Bestaetigung)
                    .await?
            }
            None => return Err(AuthError::feld("email", UNGUELTIGE_EMAIL)),
        };
        let link = self.link("confirm", &wert);
        self.mailer
            .senden(Nachricht::bestaetigung(
                &self.konfig.absender,
                &konto.email,
                &link,
                true,
            ))
            .await?;

        info!(konto = %konto.id, "Bestaetigungslink erneut versendet");
        Ok(())
    }

    /// Stellt einen Reset-Token aus und versendet den Link.
    ///
    /// Ein bereits ausstehender Reset-Token wird ersetzt, sodass pro Konto
    /// hoechstens einer offen ist.
    pub async fn passwort_vergessen(&self, email: &str) -> AuthResult<()> {
        let email = self.email_pruefen(email)?;
        let konto = self.konto_fuer_formular(&email).await?;

        let ausstehend = self
            .repo
            .find_pending(konto.id, TokenZweck::PasswortReset)
            .await
            .map_err(AuthError::datenbank("Ausstehenden Reset-Token laden"))?;

        let wert = match ausstehend {
            Some(token) => self.token_ersetzen(token.id).await?,
            None => {
                self.token_ausstellen(konto.id, TokenZweck::PasswortReset)
                    .await?
            }
        };

        let link = self.link("reset-password", &wert);
        self.mailer
            .senden(Nachricht::passwort_reset(
                &self.konfig.absender,
                &konto.email,
                &link,
            ))
            .await?;

        info!(konto = %konto.id, "Passwort-Reset angefordert");
        Ok(())
    }

    /// Prueft einen Reset-Token, bevor das Formular angezeigt wird
    pub async fn reset_token_pruefen(&self, token: &str) -> AuthResult<()> {
        if token.trim().is_empty() {
            return Err(AuthError::TokenNichtGefunden);
        }

        match self
            .repo
            .check(token, TokenZweck::PasswortReset)
            .await
            .map_err(AuthError::datenbank("Reset-Token pruefen"))?
        {
            TokenPruefung::Gueltig(()) => Ok(()),
            TokenPruefung::Abgelehnt(grund) => Err(reset_ablehnung(grund)),
        }
    }

    /// Setzt das Passwort per Reset-Token neu und liefert die E-Mail des Kontos
    pub async fn passwort_zuruecksetzen(
        &self,
        token: &str,
        neues_passwort: &str,
        bestaetigung: &str,
    ) -> AuthResult<String> {
        let mut fehler = FeldFehler::neu();
        fehler
            .pflichtfeld("token", token)
            .pflichtfeld("new_password", neues_passwort)
            .passwort_laenge("new_password", neues_passwort)
            .pflichtfeld("password_confirm", bestaetigung)
            .gleich("password_confirm", bestaetigung, neues_passwort);
        fehler.ergebnis().map_err(AuthError::Validierung)?;

        let neuer_hash = self.hasher.hashen(neues_passwort)?;

        let email = match self
            .repo
            .consume_for_password_reset(token, &neuer_hash)
            .await
            .map_err(AuthError::datenbank("Passwort zuruecksetzen"))?
        {
            TokenPruefung::Gueltig(email) => email,
            TokenPruefung::Abgelehnt(grund) => return Err(reset_ablehnung(grund)),
        };

        if let Err(e) = self
            .mailer
            .senden(Nachricht::passwort_geaendert(&self.konfig.absender, &email))
            .await
        {
            warn!(fehler = %e, "Benachrichtigung ueber Passwortaenderung nicht versendet");
        }

        info!(email = %email, "Passwort zurueckgesetzt");
        Ok(email)
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn link(&self, pfad: &str, token: &str) -> String {
        format!(
            "{}/users/{pfad}/{token}",
            self.konfig.app_domain.trim_end_matches('/')
        )
    }

    /// Ein nicht auswertbarer Hash zaehlt als falsches Passwort
    fn passwort_pruefen(&self, passwort: &str, hash: &str) -> bool {
        match self.hasher.verifizieren(passwort, hash) {
            Ok(korrekt) => korrekt,
            Err(e) => {
                error!(fehler = %e, "Passwort-Hash nicht auswertbar");
                false
            }
        }
    }

    fn email_pruefen(&self, email: &str) -> AuthResult<String> {
        let mut fehler = FeldFehler::neu();
        fehler.pflichtfeld("email", email).email("email", email);
        fehler.ergebnis().map_err(AuthError::Validierung)?;
        Ok(email_normalisieren(email))
    }

    /// Unbekannte Adressen ergeben denselben Feldfehler wie ungueltige
    async fn konto_fuer_formular(&self, email: &str) -> AuthResult<KontoRecord> {
        self.repo
            .get_by_email(email)
            .await
            .map_err(AuthError::datenbank("Konto laden"))?
            .ok_or_else(|| {
                debug!("Formular mit unbekannter E-Mail");
                AuthError::feld("email", UNGUELTIGE_EMAIL)
            })
    }

    async fn token_ausstellen(&self, konto: KontoId, zweck: TokenZweck) -> AuthResult<String> {
        for versuch in 1..=MAX_TOKEN_VERSUCHE {
            let wert = token_generieren();
            match TokenRepository::create(&*self.repo, konto, zweck, &wert).await {
                Ok(_) => return Ok(wert),
                Err(e) if e.ist_eindeutigkeit() => {
                    warn!(versuch, "Token-Wert bereits vergeben, neuer Versuch");
                }
                Err(e) => return Err(AuthError::datenbank("Token anlegen")(e)),
            }
        }
        Err(AuthError::intern(format!(
            "Kein eindeutiger Token-Wert nach {MAX_TOKEN_VERSUCHE} Versuchen"
        )))
    }

    async fn token_ersetzen(&self, token_id: TokenId) -> AuthResult<String> {
        for versuch in 1..=MAX_TOKEN_VERSUCHE {
            let wert = token_generieren();
            match self.repo.supersede(token_id, &wert).await {
                Ok(()) => return Ok(wert),
                Err(e) if e.ist_eindeutigkeit() => {
                    warn!(versuch, "Token-Wert bereits vergeben, neuer Versuch");
                }
                Err(e) => return Err(AuthError::datenbank("Token ersetzen")(e)),
            }
        }
        Err(AuthError::intern(format!(
            "Kein eindeutiger Token-Wert nach {MAX_TOKEN_VERSUCHE} Versuchen"
        )))
    }
}

/// Im Reset-Ablauf ist ein eingeloester Token nicht von einem unbekannten zu
/// unterscheiden; nur der Ablauf wird gesondert gemeldet.
fn reset_ablehnung(grund: TokenAblehnung) -> AuthError {
    match grund {
        TokenAblehnung::Abgelaufen => AuthError::TokenAbgelaufen,
        TokenAblehnung::NichtGefunden | TokenAblehnung::BereitsBestaetigt => {
            AuthError::TokenNichtGefunden
        }
    }
}
