//! notekeeper-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod web;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::ServerConfig;
use notekeeper_auth::{IdentityKonfig, IdentityService, LogMailer, SitzungsSpeicher};
use notekeeper_db::SqliteDb;
use web::{render::JsonRenderer, AppState, SitzungsKonfig};

/// Baut den Axum-State aus Konfiguration und geoeffneter Datenbank
pub fn state_bauen(config: &ServerConfig, db: SqliteDb) -> Result<AppState> {
    config.pruefen()?;

    let hasher = config
        .hasher()
        .context("Argon2-Parameter ungueltig")?;

    let identity = IdentityService::neu(
        Arc::new(db),
        Arc::new(hasher),
        Arc::new(LogMailer),
        IdentityKonfig {
            app_domain: config.app_domain(),
            absender: config.mail.absender.clone(),
        },
    )
    .context("Identity-Service konnte nicht erstellt werden")?;

    let sitzung = SitzungsKonfig {
        cookie_name: config.sitzung.cookie_name.clone(),
        secure: config.sitzung.cookie_secure,
        lebensdauer_sekunden: config.sitzung.lebensdauer_sekunden,
    };

    Ok(AppState::neu(
        Arc::new(identity),
        Arc::new(JsonRenderer),
        SitzungsSpeicher::neu(),
        sitzung,
    ))
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den HTTP-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen und Migrationen ausfuehren
    /// 2. Identity-Service und Router aufbauen
    /// 3. Listener binden
    /// 4. Bis Ctrl-C bedienen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %self.config.bind_adresse(),
            app_domain = %self.config.app_domain(),
            "Server startet"
        );

        let db = SqliteDb::oeffnen(&self.config.datenbank_config())
            .await
            .context("Datenbank konnte nicht geoeffnet werden")?;
        tracing::info!(
            url = %self.config.datenbank.url,
            token_ttl_sekunden = self.config.token.ttl_sekunden,
            "Datenbank bereit"
        );

        let state = state_bauen(&self.config, db)?;
        let app = web::router(state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_adresse())
            .await
            .with_context(|| format!("Bind auf {} fehlgeschlagen", self.config.bind_adresse()))?;
        tracing::info!(adresse = %self.config.bind_adresse(), "HTTP-Listener bereit");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(fehler = %e, "Shutdown-Signal konnte nicht empfangen werden");
                }
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            })
            .await
            .context("HTTP-Server beendet mit Fehler")?;

        Ok(())
    }
}
