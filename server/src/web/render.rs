//! Seiten-Rendering
//!
//! Handler bauen eine [`Seite`] aus strukturierten Daten (Feldfehler,
//! Formularwerte, Flash-Meldung) und uebergeben sie einem
//! [`SeitenRenderer`]. HTML-Templates sind nicht Teil des Servers; der
//! mitgelieferte [`JsonRenderer`] liefert die Seitendaten als JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;

use notekeeper_auth::{FeldFehler, Flash};

/// Strukturierte Daten einer Seite
#[derive(Debug, Clone, Serialize)]
pub struct Seite {
    /// Seitenname, z.B. "user-signin"
    pub seite: &'static str,
    pub daten: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feld_fehler: Option<FeldFehler>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
    pub angemeldet: bool,
    /// Muss in jedem Formular als Feld `csrf_token` zurueckkommen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl Seite {
    pub fn neu(seite: &'static str) -> Self {
        Self {
            seite,
            daten: Value::Object(Default::default()),
            feld_fehler: None,
            flash: None,
            angemeldet: false,
            csrf_token: None,
        }
    }

    pub fn mit_daten(mut self, daten: Value) -> Self {
        self.daten = daten;
        self
    }

    pub fn mit_feld_fehler(mut self, fehler: FeldFehler) -> Self {
        self.feld_fehler = Some(fehler);
        self
    }

    pub fn mit_flash(mut self, flash: Option<Flash>) -> Self {
        self.flash = flash;
        self
    }

    pub fn angemeldet(mut self, angemeldet: bool) -> Self {
        self.angemeldet = angemeldet;
        self
    }

    pub fn mit_csrf_token(mut self, token: String) -> Self {
        self.csrf_token = Some(token);
        self
    }
}

/// Wandelt Seitendaten in eine HTTP-Antwort
pub trait SeitenRenderer: Send + Sync {
    fn rendern(&self, status: StatusCode, seite: Seite) -> Response;
}

/// Liefert die Seitendaten als JSON
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer;

impl SeitenRenderer for JsonRenderer {
    fn rendern(&self, status: StatusCode, seite: Seite) -> Response {
        (status, Json(seite)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notekeeper_auth::FlashArt;

    #[tokio::test]
    async fn json_renderer_serialisiert_seite() {
        let seite = Seite::neu("user-signin")
            .mit_feld_fehler(FeldFehler::einzeln("email", "invalid credentials"))
            .mit_flash(Some(Flash {
                art: FlashArt::Erfolg,
                text: "ok".into(),
            }))
            .mit_csrf_token("tok".into());
        let antwort = JsonRenderer.rendern(StatusCode::UNAUTHORIZED, seite);
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["seite"], "user-signin");
        assert_eq!(json["feld_fehler"]["email"], "invalid credentials");
        assert_eq!(json["flash"]["art"], "success");
        assert_eq!(json["angemeldet"], false);
        assert_eq!(json["csrf_token"], "tok");
    }

    #[test]
    fn leere_felder_werden_weggelassen() {
        let json = serde_json::to_value(Seite::neu("home")).unwrap();
        assert!(json.get("feld_fehler").is_none());
        assert!(json.get("flash").is_none());
        assert!(json.get("csrf_token").is_none());
    }
}
