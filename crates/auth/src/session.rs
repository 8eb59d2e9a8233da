//! Sitzungen fuer angemeldete Konten
//!
//! Cookie und Laden pro Request uebernimmt `tower-sessions`; hier liegen der
//! serverseitige Speicher ([`SitzungsSpeicher`]) und der [`SessionGate`],
//! der ein Konto an eine Sitzung bindet. Beim Anmelden wird die ID immer
//! rotiert, damit eine vorher bekannte ID danach wertlos ist.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tower_sessions::{
    session::{Id, Record},
    session_store, Session, SessionStore,
};

use notekeeper_core::KontoId;

use crate::error::AuthResult;
use crate::token::token_generieren;

/// Standard-Lebensdauer einer Sitzung ohne Aktivitaet: 1 Stunde
pub const SITZUNG_LEBENSDAUER_SEKUNDEN: i64 = 60 * 60;

/// Schluessel, unter dem die Konto-ID in der Sitzung liegt
pub const KONTO_SCHLUESSEL: &str = "user_id";

/// Schluessel des CSRF-Tokens; gleichzeitig der Name des Formularfelds
pub const CSRF_SCHLUESSEL: &str = "csrf_token";

const FLASH_SCHLUESSEL: &str = "_flash";

// ---------------------------------------------------------------------------
// In-Memory-Speicher
// ---------------------------------------------------------------------------

/// In-Memory Session-Store
///
/// Abgelaufene Eintraege gelten als nicht vorhanden. Sie werden beim Zugriff
/// entfernt und bei jedem Anlegen einer neuen Sitzung weggeraeumt, sodass
/// die Map nicht mit verlassenen Sitzungen waechst.
///
/// `save` legt nie einen Eintrag an: eine inzwischen zerstoerte Sitzung
/// (Abmeldung in einem parallelen Request) bleibt zerstoert.
#[derive(Debug, Clone, Default)]
pub struct SitzungsSpeicher {
    eintraege: Arc<RwLock<HashMap<Id, Record>>>,
}

impl SitzungsSpeicher {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Anzahl gespeicherter Eintraege, abgelaufene eingeschlossen
    pub async fn anzahl(&self) -> usize {
        self.eintraege.read().await.len()
    }

    pub async fn anzahl_aktive(&self) -> usize {
        let jetzt = OffsetDateTime::now_utc();
        let eintraege = self.eintraege.read().await;
        eintraege.values().filter(|r| r.expiry_date > jetzt).count()
    }
}

#[async_trait]
impl SessionStore for SitzungsSpeicher {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let jetzt = OffsetDateTime::now_utc();
        let mut eintraege = self.eintraege.write().await;

        let vorher = eintraege.len();
        eintraege.retain(|_, r| r.expiry_date > jetzt);
        let entfernt = vorher - eintraege.len();
        if entfernt > 0 {
            tracing::debug!(entfernt, "Abgelaufene Sitzungen entfernt");
        }

        while eintraege.contains_key(&record.id) {
            record.id = Id::default();
        }
        eintraege.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let jetzt = OffsetDateTime::now_utc();
        let mut eintraege = self.eintraege.write().await;
        match eintraege.get_mut(&record.id) {
            Some(eintrag) if eintrag.expiry_date > jetzt => *eintrag = record.clone(),
            Some(_) => {
                eintraege.remove(&record.id);
                tracing::debug!("Sitzung beim Speichern abgelaufen, verworfen");
            }
            None => tracing::debug!("Sitzung bereits zerstoert, Speichern verworfen"),
        }
        Ok(())
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        let jetzt = OffsetDateTime::now_utc();
        {
            let eintraege = self.eintraege.read().await;
            match eintraege.get(id) {
                None => return Ok(None),
                Some(r) if r.expiry_date > jetzt => return Ok(Some(r.clone())),
                Some(_) => {}
            }
        }
        self.eintraege.write().await.remove(id);
        tracing::debug!("Abgelaufene Sitzung entfernt");
        Ok(None)
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        self.eintraege.write().await.remove(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Flash-Meldungen
// ---------------------------------------------------------------------------

/// Art einer Flash-Meldung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashArt {
    #[serde(rename = "success")]
    Erfolg,
    #[serde(rename = "error")]
    Fehler,
}

/// Einmalige Meldung, die auf der naechsten Seite angezeigt wird
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub art: FlashArt,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Session-Gate
// ---------------------------------------------------------------------------

/// Bindet Konten an Sitzungen und baut sie wieder ab
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionGate;

impl SessionGate {
    pub fn neu() -> Self {
        Self
    }

    /// Meldet ein Konto in der Sitzung an.
    ///
    /// Die alte ID wird im Store geloescht und eine neue vergeben, bevor die
    /// Konto-ID geschrieben wird. Der CSRF-Token der anonymen Sitzung gilt
    /// danach nicht mehr. Die Sitzung ist beim Rueckkehren bereits gespeichert.
    pub async fn etablieren(&self, sitzung: &Session, konto: KontoId) -> AuthResult<()> {
        sitzung.cycle_id().await?;
        sitzung.remove_value(CSRF_SCHLUESSEL).await?;
        sitzung.insert(KONTO_SCHLUESSEL, konto.inner()).await?;
        sitzung.save().await?;
        tracing::debug!(konto = %konto, "Sitzung etabliert");
        Ok(())
    }

    /// Zerstoert die Sitzung serverseitig; die alte ID ist danach anonym
    pub async fn abbauen(&self, sitzung: &Session) -> AuthResult<()> {
        sitzung.flush().await?;
        tracing::debug!("Sitzung abgebaut");
        Ok(())
    }

    /// Angemeldetes Konto; fehlende, fremde oder nicht-positive Werte gelten als anonym
    pub async fn konto_id(&self, sitzung: &Session) -> AuthResult<Option<KontoId>> {
        Ok(sitzung
            .get_value(KONTO_SCHLUESSEL)
            .await?
            .and_then(|v| v.as_i64())
            .map(KontoId)
            .filter(KontoId::ist_gueltig))
    }

    pub async fn flash_setzen(
        &self,
        sitzung: &Session,
        art: FlashArt,
        text: impl Into<String>,
    ) -> AuthResult<()> {
        let flash = Flash {
            art,
            text: text.into(),
        };
        sitzung.insert(FLASH_SCHLUESSEL, flash).await?;
        Ok(())
    }

    /// Liest die Flash-Meldung und entfernt sie aus der Sitzung
    pub async fn flash_nehmen(&self, sitzung: &Session) -> AuthResult<Option<Flash>> {
        Ok(sitzung
            .remove_value(FLASH_SCHLUESSEL)
            .await?
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    /// CSRF-Token der Sitzung; wird beim ersten Aufruf erzeugt
    pub async fn csrf_token(&self, sitzung: &Session) -> AuthResult<String> {
        if let Some(token) = self.gespeicherter_csrf_token(sitzung).await? {
            return Ok(token);
        }
        let token = token_generieren();
        sitzung.insert(CSRF_SCHLUESSEL, &token).await?;
        Ok(token)
    }

    /// Vergleicht einen gesendeten CSRF-Token in konstanter Zeit.
    ///
    /// Ohne gespeicherten Token ist jeder gesendete Wert ungueltig.
    pub async fn csrf_pruefen(&self, sitzung: &Session, gesendet: &str) -> AuthResult<bool> {
        let Some(erwartet) = self.gespeicherter_csrf_token(sitzung).await? else {
            return Ok(false);
        };
        Ok(bool::from(gesendet.as_bytes().ct_eq(erwartet.as_bytes())))
    }

    async fn gespeicherter_csrf_token(&self, sitzung: &Session) -> AuthResult<Option<String>> {
        Ok(sitzung
            .get_value(CSRF_SCHLUESSEL)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}
