//! HTTP-Schicht fuer Notekeeper
//!
//! Formulare kommen als `application/x-www-form-urlencoded`, Seiten gehen
//! ueber einen [`SeitenRenderer`](render::SeitenRenderer) hinaus. Sitzung und
//! Session-Cookie verwaltet der `SessionManagerLayer` von `tower-sessions`;
//! Handler erhalten die Sitzung als [`Session`]-Extractor.

pub mod handlers;
pub mod middleware;
pub mod render;
pub mod routes;

use std::sync::Arc;

use time::Duration;
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};

use notekeeper_auth::{Argon2Hasher, IdentityService, LogMailer, SitzungsSpeicher};
use notekeeper_core::KontoId;
use notekeeper_db::SqliteDb;

use render::SeitenRenderer;

pub use routes::router;
pub use tower_sessions::Session;

/// Konkreter Identity-Service des Servers
pub type Identity = IdentityService<SqliteDb, Argon2Hasher, LogMailer>;

/// Axum-State fuer alle Routen
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<Identity>,
    pub renderer: Arc<dyn SeitenRenderer>,
    pub sitzungen: SitzungsSpeicher,
    pub sitzung: SitzungsKonfig,
}

impl AppState {
    pub fn neu(
        identity: Arc<Identity>,
        renderer: Arc<dyn SeitenRenderer>,
        sitzungen: SitzungsSpeicher,
        sitzung: SitzungsKonfig,
    ) -> Self {
        Self {
            identity,
            renderer,
            sitzungen,
            sitzung,
        }
    }

    /// Session-Layer ueber dem Sitzungsspeicher dieses States
    pub fn sitzungs_layer(&self) -> SessionManagerLayer<SitzungsSpeicher> {
        self.sitzung.layer(self.sitzungen.clone())
    }
}

/// Attribute des Session-Cookies und Lebensdauer der Sitzung
#[derive(Debug, Clone)]
pub struct SitzungsKonfig {
    pub cookie_name: String,
    pub secure: bool,
    pub lebensdauer_sekunden: i64,
}

impl SitzungsKonfig {
    /// Cookie mit Path=/, HttpOnly und SameSite=Lax; die Sitzung laeuft nach
    /// `lebensdauer_sekunden` ohne Aktivitaet ab
    pub fn layer(&self, speicher: SitzungsSpeicher) -> SessionManagerLayer<SitzungsSpeicher> {
        SessionManagerLayer::new(speicher)
            .with_name(self.cookie_name.clone())
            .with_path("/")
            .with_http_only(true)
            .with_same_site(SameSite::Lax)
            .with_secure(self.secure)
            .with_expiry(Expiry::OnInactivity(Duration::seconds(
                self.lebensdauer_sekunden,
            )))
    }
}

/// Angemeldetes Konto (als Extension gespeichert)
#[derive(Debug, Clone, Copy)]
pub struct AngemeldetesKonto(pub KontoId);
