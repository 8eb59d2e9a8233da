//! Axum-Middleware fuer geschuetzte Routen und CSRF-Schutz

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use notekeeper_auth::{Flash, FlashArt};

use crate::web::{render::Seite, AngemeldetesKonto, AppState, Session};

/// Ziel fuer nicht angemeldete Zugriffe auf geschuetzte Routen
pub const ANMELDE_PFAD: &str = "/users/signin";

/// Header fuer den CSRF-Token bei Requests ohne Formular
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Groesster Formular-Body, der fuer die CSRF-Pruefung gepuffert wird
const FORMULAR_LIMIT: usize = 64 * 1024;

/// Laesst nur Requests mit angemeldetem Konto durch.
///
/// Ohne gueltige Konto-ID in der Sitzung antwortet sie mit `302 Found` auf
/// die Anmeldeseite, ohne den Handler aufzurufen.
pub async fn anmeldung_erforderlich(
    State(state): State<AppState>,
    sitzung: Session,
    mut req: Request,
    next: Next,
) -> Response {
    let konto = match state.identity.sitzungen().konto_id(&sitzung).await {
        Ok(konto) => konto,
        Err(e) => {
            e.protokollieren("anmeldung_pruefen");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(konto) = konto else {
        tracing::debug!(pfad = %req.uri().path(), "Nicht angemeldet, Umleitung");
        return (StatusCode::FOUND, [(header::LOCATION, ANMELDE_PFAD)]).into_response();
    };

    req.extensions_mut().insert(AngemeldetesKonto(konto));
    next.run(req).await
}

#[derive(Debug, Deserialize)]
struct CsrfFeld {
    #[serde(default, rename = "csrf_token")]
    token: String,
}

/// Prueft bei jedem POST den CSRF-Token der Sitzung.
///
/// Der Token kommt aus dem Formularfeld `csrf_token` oder dem Header
/// `X-CSRF-Token`. Fehlt er oder stimmt er nicht, endet der Request mit
/// `403 Forbidden`, bevor ein Handler laeuft. Der gepufferte Body wird dem
/// Handler unveraendert weitergereicht.
pub async fn csrf_pruefen(
    State(state): State<AppState>,
    sitzung: Session,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, FORMULAR_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(fehler = %e, "Formular-Body nicht lesbar");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let gesendet = match header_token(&parts.headers) {
        Some(token) => Some(token),
        None => formular_token(&bytes).await,
    };

    let gueltig = match gesendet.filter(|t| !t.is_empty()) {
        Some(token) => match state.identity.sitzungen().csrf_pruefen(&sitzung, &token).await {
            Ok(gueltig) => gueltig,
            Err(e) => {
                e.protokollieren("csrf_pruefen");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
        None => false,
    };

    if !gueltig {
        tracing::warn!(pfad = %parts.uri.path(), "CSRF-Token fehlt oder ist ungueltig");
        let seite = Seite::neu("generic-message").mit_flash(Some(Flash {
            art: FlashArt::Fehler,
            text: "invalid csrf token".into(),
        }));
        return state.renderer.rendern(StatusCode::FORBIDDEN, seite);
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Liest `csrf_token` aus einem urlencodierten Formular-Body
async fn formular_token(bytes: &Bytes) -> Option<String> {
    let anfrage = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes.clone()))
        .ok()?;
    Form::<CsrfFeld>::from_request(anfrage, &())
        .await
        .ok()
        .map(|Form(feld)| feld.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use notekeeper_auth::CSRF_SCHLUESSEL;

    #[tokio::test]
    async fn token_aus_formular() {
        let body = Bytes::from(format!("email=a%40x.com&{CSRF_SCHLUESSEL}=abc-123"));
        assert_eq!(formular_token(&body).await.as_deref(), Some("abc-123"));

        let ohne = Bytes::from_static(b"email=a%40x.com");
        assert_eq!(formular_token(&ohne).await.as_deref(), Some(""));

        let kaputt = Bytes::from_static(b"%%%=");
        assert!(formular_token(&kaputt).await.unwrap_or_default().is_empty());
    }

    #[test]
    fn token_aus_header() {
        let mut headers = HeaderMap::new();
        assert!(header_token(&headers).is_none());
        headers.insert(CSRF_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(header_token(&headers).as_deref(), Some("xyz"));
    }
}
