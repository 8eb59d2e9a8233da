//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use notekeeper_auth::{Argon2Hasher, AuthResult, SITZUNG_LEBENSDAUER_SEKUNDEN};
use notekeeper_db::{DatabaseConfig, TTL_SEKUNDEN_MAX};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Sitzungen und Session-Cookie
    pub sitzung: SitzungEinstellungen,
    /// Bestaetigungs- und Reset-Tokens
    pub token: TokenEinstellungen,
    /// Arbeitsaufwand des Passwort-Hashings
    pub passwort: PasswortEinstellungen,
    /// Ausgehende Mails
    pub mail: MailEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Bind-Adresse fuer HTTP
    pub bind_adresse: String,
    /// Port fuer HTTP
    pub port: u16,
    /// Basis-URL fuer Links in Mails (leer = aus Bind-Adresse abgeleitet)
    pub app_domain: Option<String>,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Notekeeper".into(),
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
            app_domain: None,
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus fuer SQLite
    pub sqlite_wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://notekeeper.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Sitzungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungEinstellungen {
    /// Lebensdauer einer Sitzung ohne Aktivitaet in Sekunden
    pub lebensdauer_sekunden: i64,
    /// Name des Session-Cookies
    pub cookie_name: String,
    /// Cookie nur ueber HTTPS senden
    pub cookie_secure: bool,
}

impl Default for SitzungEinstellungen {
    fn default() -> Self {
        Self {
            lebensdauer_sekunden: SITZUNG_LEBENSDAUER_SEKUNDEN,
            cookie_name: "notekeeper_session".into(),
            cookie_secure: false,
        }
    }
}

/// Token-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEinstellungen {
    /// Gueltigkeit ab Ausstellung in Sekunden (gilt auch fuer bestehende Tokens)
    pub ttl_sekunden: i64,
}

impl Default for TokenEinstellungen {
    fn default() -> Self {
        Self { ttl_sekunden: 60 * 60 }
    }
}

/// Argon2-Parameter; fehlende Werte bedeuten Bibliotheks-Standard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswortEinstellungen {
    /// Speicher in KiB
    pub m_kib: Option<u32>,
    /// Iterationen
    pub t_cost: Option<u32>,
    /// Parallelitaet
    pub p_cost: Option<u32>,
}

/// Mail-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailEinstellungen {
    /// Absenderadresse
    pub absender: String,
}

impl Default for MailEinstellungen {
    fn default() -> Self {
        Self {
            absender: "noreply@notekeeper.local".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                Self::aus_toml(&inhalt).with_context(|| format!("Konfigurationsfehler in '{pfad}'"))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Parst und prueft eine Konfiguration im TOML-Format
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(inhalt)?;
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht abdeckt.
    ///
    /// Dauern muessen positiv sein und duerfen [`TTL_SEKUNDEN_MAX`] nicht
    /// ueberschreiten, sonst laufen Zeitberechnungen ueber.
    pub fn pruefen(&self) -> anyhow::Result<()> {
        dauer_pruefen("sitzung.lebensdauer_sekunden", self.sitzung.lebensdauer_sekunden)?;
        dauer_pruefen("token.ttl_sekunden", self.token.ttl_sekunden)?;
        if self.sitzung.cookie_name.trim().is_empty() {
            bail!("sitzung.cookie_name darf nicht leer sein");
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer HTTP zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.server.port)
    }

    /// Basis-URL fuer Links in Mails
    pub fn app_domain(&self) -> String {
        if let Some(domain) = self.server.app_domain.as_deref().filter(|d| !d.is_empty()) {
            return domain.trim_end_matches('/').to_string();
        }
        let host = match self.server.bind_adresse.as_str() {
            "0.0.0.0" | "::" | "[::]" => "localhost",
            andere => andere,
        };
        format!("http://{host}:{}", self.server.port)
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
            token_ttl_sekunden: self.token.ttl_sekunden,
        }
    }

    /// Argon2-Hasher mit den konfigurierten Parametern.
    ///
    /// Nur vollstaendig angegebene Parameter ersetzen den Bibliotheks-Standard.
    pub fn hasher(&self) -> AuthResult<Argon2Hasher> {
        match (self.passwort.m_kib, self.passwort.t_cost, self.passwort.p_cost) {
            (Some(m), Some(t), Some(p)) => Argon2Hasher::mit_parametern(m, t, p),
            (None, None, None) => Ok(Argon2Hasher::default()),
            _ => {
                tracing::warn!("Unvollstaendige Argon2-Parameter, verwende Standardwerte");
                Ok(Argon2Hasher::default())
            }
        }
    }
}

fn dauer_pruefen(feld: &str, sekunden: i64) -> anyhow::Result<()> {
    if !(1..=TTL_SEKUNDEN_MAX).contains(&sekunden) {
        bail!("{feld} = {sekunden} ausserhalb von 1..={TTL_SEKUNDEN_MAX}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.sitzung.lebensdauer_sekunden, 3600);
        assert_eq!(cfg.token.ttl_sekunden, 3600);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.hasher().is_ok());
    }

    #[test]
    fn adressen_und_domain() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:8080");
        assert_eq!(cfg.app_domain(), "http://localhost:8080");

        let mut cfg = ServerConfig::default();
        cfg.server.app_domain = Some("https://notes.example.com/".into());
        assert_eq!(cfg.app_domain(), "https://notes.example.com");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Meine Notizen"
            port = 9000

            [token]
            ttl_sekunden = 600

            [passwort]
            m_kib = 8
            t_cost = 1
            p_cost = 1
        "#;
        let cfg = ServerConfig::aus_toml(toml).unwrap();
        assert_eq!(cfg.server.name, "Meine Notizen");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.datenbank_config().token_ttl_sekunden, 600);
        assert!(cfg.hasher().is_ok());
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.sitzung.cookie_name, "notekeeper_session");
        assert_eq!(cfg.datenbank.max_verbindungen, 5);
    }

    #[test]
    fn zu_grosse_dauern_werden_abgelehnt() {
        let err = ServerConfig::aus_toml("[sitzung]\nlebensdauer_sekunden = 9223372036854775807")
            .unwrap_err();
        assert!(err.to_string().contains("sitzung.lebensdauer_sekunden"));

        let err = ServerConfig::aus_toml("[token]\nttl_sekunden = 100000000000000").unwrap_err();
        assert!(err.to_string().contains("token.ttl_sekunden"));

        assert!(ServerConfig::aus_toml("[token]\nttl_sekunden = 0").is_err());
        assert!(ServerConfig::aus_toml("[sitzung]\nlebensdauer_sekunden = -60").is_err());
        assert!(ServerConfig::aus_toml("[sitzung]\ncookie_name = \" \"").is_err());
    }

    #[test]
    fn laden_prueft_dauern() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let pfad = verzeichnis.path().join("notekeeper.toml");
        std::fs::write(&pfad, "[token]\nttl_sekunden = 9223372036854775807\n").unwrap();

        let err = ServerConfig::laden(pfad.to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("token.ttl_sekunden"));
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/notekeeper.toml").unwrap();
        assert_eq!(cfg.server.port, 8080);
    }
}
