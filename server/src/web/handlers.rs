//! Handler fuer die Konto-Routen (/users/...) und die Startseiten

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;
use serde_json::{json, Value};

use notekeeper_auth::{
    AnmeldeFormular, AuthError, AuthResult, EmailFormular, FehlerArt, FlashArt,
    PasswortResetFormular, RegistrierungsFormular,
};

use crate::web::{render::Seite, AngemeldetesKonto, AppState, Session};

const PFAD_SIGNIN: &str = "/users/signin";
const PFAD_SIGNUP_ERFOLG: &str = "/users/signup-success";
const PFAD_NOTES: &str = "/notes";
const PFAD_RESET_ANFORDERN: &str = "/users/email-form?sub=forgot-password";

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Seite mit Flash-Meldung, Anmeldestatus und CSRF-Token der Sitzung
async fn seite(state: &AppState, sitzung: &Session, name: &'static str) -> AuthResult<Seite> {
    let gate = state.identity.sitzungen();
    Ok(Seite::neu(name)
        .mit_flash(gate.flash_nehmen(sitzung).await?)
        .angemeldet(gate.konto_id(sitzung).await?.is_some())
        .mit_csrf_token(gate.csrf_token(sitzung).await?))
}

fn rendern(state: &AppState, status: StatusCode, seite: AuthResult<Seite>) -> Response {
    match seite {
        Ok(seite) => state.renderer.rendern(status, seite),
        Err(e) => {
            e.protokollieren("seite");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Eine verlorene Flash-Meldung bricht den Request nicht ab
async fn flash(state: &AppState, sitzung: &Session, art: FlashArt, text: &str) {
    if let Err(e) = state
        .identity
        .sitzungen()
        .flash_setzen(sitzung, art, text)
        .await
    {
        e.protokollieren("flash_setzen");
    }
}

/// Nach erfolgreichem POST immer `303 See Other`
fn umleiten(ziel: &str) -> Response {
    Redirect::to(ziel).into_response()
}

fn status_fuer(fehler: &AuthError) -> StatusCode {
    match fehler.art() {
        FehlerArt::Validierung => StatusCode::UNPROCESSABLE_ENTITY,
        FehlerArt::Konflikt => StatusCode::CONFLICT,
        FehlerArt::Token => StatusCode::BAD_REQUEST,
        FehlerArt::Anmeldung => StatusCode::UNAUTHORIZED,
        FehlerArt::Intern => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Meldung als Flash auf der allgemeinen Nachrichtenseite
async fn fehler_seite(state: &AppState, sitzung: &Session, fehler: &AuthError) -> Response {
    flash(state, sitzung, FlashArt::Fehler, fehler.nutzer_nachricht()).await;
    let seite = seite(state, sitzung, "generic-message").await;
    rendern(state, status_fuer(fehler), seite)
}

/// Feldfehler zurueck ans Formular, alles andere auf die Nachrichtenseite
async fn formular_fehler(
    state: &AppState,
    sitzung: &Session,
    name: &'static str,
    daten: Value,
    fehler: AuthError,
    operation: &str,
) -> Response {
    fehler.protokollieren(operation);
    match fehler.feld_fehler() {
        Some(feld_fehler) => {
            let seite = seite(state, sitzung, name)
                .await
                .map(|s| s.mit_daten(daten).mit_feld_fehler(feld_fehler));
            rendern(state, status_fuer(&fehler), seite)
        }
        None => fehler_seite(state, sitzung, &fehler).await,
    }
}

fn email_form_daten(sub: &str) -> Option<Value> {
    match sub {
        "forgot-password" => Some(json!({
            "title": "Forgot Password",
            "action": "/users/forgot-password",
        })),
        "resend-token" => Some(json!({
            "title": "Resend Token",
            "action": "/users/resend-token",
        })),
        _ => None,
    }
}

fn mit_email(mut daten: Value, email: &str) -> Value {
    if let Some(objekt) = daten.as_object_mut() {
        objekt.insert("email".into(), json!(email));
    }
    daten
}

// ---------------------------------------------------------------------------
// Startseiten
// ---------------------------------------------------------------------------

/// GET /
pub async fn home(State(state): State<AppState>, sitzung: Session) -> Response {
    let seite = seite(&state, &sitzung, "home").await;
    rendern(&state, StatusCode::OK, seite)
}

/// GET /notes – Platzhalter fuer die Notizen des angemeldeten Kontos
pub async fn notes(
    State(state): State<AppState>,
    sitzung: Session,
    Extension(AngemeldetesKonto(konto)): Extension<AngemeldetesKonto>,
) -> Response {
    let seite = seite(&state, &sitzung, "notes")
        .await
        .map(|s| s.mit_daten(json!({ "konto_id": konto.inner() })));
    rendern(&state, StatusCode::OK, seite)
}

// ---------------------------------------------------------------------------
// Registrierung
// ---------------------------------------------------------------------------

/// GET /users/signup
pub async fn signup(State(state): State<AppState>, sitzung: Session) -> Response {
    let seite = seite(&state, &sitzung, "user-signup").await;
    rendern(&state, StatusCode::OK, seite)
}

/// POST /users/signup
pub async fn signup_post(
    State(state): State<AppState>,
    sitzung: Session,
    Form(formular): Form<RegistrierungsFormular>,
) -> Response {
    match state
        .identity
        .registrieren(&formular.email, &formular.password)
        .await
    {
        Ok(_) => umleiten(PFAD_SIGNUP_ERFOLG),
        Err(e) => {
            let daten = json!({ "email": formular.email });
            formular_fehler(&state, &sitzung, "user-signup", daten, e, "signup").await
        }
    }
}

/// GET /users/signup-success
pub async fn signup_success(State(state): State<AppState>, sitzung: Session) -> Response {
    let seite = seite(&state, &sitzung, "user-signup-success").await;
    rendern(&state, StatusCode::OK, seite)
}

/// GET /users/confirm/:token
pub async fn confirm(
    State(state): State<AppState>,
    sitzung: Session,
    Path(token): Path<String>,
) -> Response {
    match state.identity.registrierung_bestaetigen(&token).await {
        Ok(_) => {
            flash(
                &state,
                &sitzung,
                FlashArt::Erfolg,
                "your registration was successfully confirmed",
            )
            .await;
            let seite = seite(&state, &sitzung, "generic-message").await;
            rendern(&state, StatusCode::OK, seite)
        }
        Err(e) => {
            e.protokollieren("confirm");
            fehler_seite(&state, &sitzung, &e).await
        }
    }
}

// ---------------------------------------------------------------------------
// Anmeldung
// ---------------------------------------------------------------------------

/// GET /users/signin
pub async fn signin(State(state): State<AppState>, sitzung: Session) -> Response {
    let seite = seite(&state, &sitzung, "user-signin").await;
    rendern(&state, StatusCode::OK, seite)
}

/// POST /users/signin
pub async fn signin_post(
    State(state): State<AppState>,
    sitzung: Session,
    Form(formular): Form<AnmeldeFormular>,
) -> Response {
    match state
        .identity
        .anmelden(&sitzung, &formular.email, &formular.password)
        .await
    {
        Ok(_) => umleiten(PFAD_NOTES),
        Err(e) => {
            let mut daten = json!({ "email": formular.email });
            // Erneutes Senden stellt bei Bedarf einen neuen Token aus; der
            // Token selbst verlaesst den Server nur per Mail
            if matches!(e, AuthError::KontoNichtBestaetigt { .. }) {
                daten["ask_resend_token"] = json!(true);
            }
            formular_fehler(&state, &sitzung, "user-signin", daten, e, "signin").await
        }
    }
}

/// GET /users/signout
pub async fn signout(State(state): State<AppState>, sitzung: Session) -> Response {
    match state.identity.abmelden(&sitzung).await {
        Ok(()) => umleiten(PFAD_SIGNIN),
        Err(e) => {
            e.protokollieren("signout");
            fehler_seite(&state, &sitzung, &e).await
        }
    }
}

// ---------------------------------------------------------------------------
// Passwort vergessen / Token erneut senden
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EmailFormQuery {
    #[serde(default)]
    pub sub: String,
}

/// GET /users/email-form?sub=forgot-password|resend-token
pub async fn email_form(
    State(state): State<AppState>,
    sitzung: Session,
    Query(query): Query<EmailFormQuery>,
) -> Response {
    match email_form_daten(&query.sub) {
        Some(daten) => {
            let seite = seite(&state, &sitzung, "user-email-form")
                .await
                .map(|s| s.mit_daten(daten));
            rendern(&state, StatusCode::OK, seite)
        }
        None => {
            flash(&state, &sitzung, FlashArt::Fehler, "invalid sub").await;
            let seite = seite(&state, &sitzung, "generic-message").await;
            rendern(&state, StatusCode::BAD_REQUEST, seite)
        }
    }
}

/// POST /users/forgot-password
pub async fn forgot_password_post(
    State(state): State<AppState>,
    sitzung: Session,
    Form(formular): Form<EmailFormular>,
) -> Response {
    match state.identity.passwort_vergessen(&formular.email).await {
        Ok(()) => {
            flash(
                &state,
                &sitzung,
                FlashArt::Erfolg,
                "Almost there, check your email to reset your password",
            )
            .await;
            umleiten(PFAD_SIGNIN)
        }
        Err(e) => {
            let daten = email_form_daten("forgot-password").unwrap_or_default();
            let daten = mit_email(daten, &formular.email);
            formular_fehler(&state, &sitzung, "user-email-form", daten, e, "forgot_password")
                .await
        }
    }
}

/// POST /users/resend-token
pub async fn resend_token_post(
    State(state): State<AppState>,
    sitzung: Session,
    Form(formular): Form<EmailFormular>,
) -> Response {
    match state
        .identity
        .bestaetigung_erneut_senden(&formular.email)
        .await
    {
        Ok(()) => {
            flash(
                &state,
                &sitzung,
                FlashArt::Erfolg,
                "your token was successfully sent",
            )
            .await;
            umleiten(PFAD_SIGNUP_ERFOLG)
        }
        Err(e) => {
            let daten = email_form_daten("resend-token").unwrap_or_default();
            let daten = mit_email(daten, &formular.email);
            formular_fehler(&state, &sitzung, "user-email-form", daten, e, "resend_token").await
        }
    }
}

// ---------------------------------------------------------------------------
// Passwort zuruecksetzen
// ---------------------------------------------------------------------------

/// GET /users/reset-password/:token
pub async fn reset_password(
    State(state): State<AppState>,
    sitzung: Session,
    Path(token): Path<String>,
) -> Response {
    match state.identity.reset_token_pruefen(&token).await {
        Ok(()) => {
            let seite = seite(&state, &sitzung, "user-reset-pw")
                .await
                .map(|s| s.mit_daten(json!({ "token": token })));
            rendern(&state, StatusCode::OK, seite)
        }
        Err(e @ AuthError::TokenAbgelaufen) => {
            e.protokollieren("reset_password");
            flash(&state, &sitzung, FlashArt::Fehler, e.nutzer_nachricht()).await;
            umleiten(PFAD_RESET_ANFORDERN)
        }
        Err(e) => {
            e.protokollieren("reset_password");
            fehler_seite(&state, &sitzung, &e).await
        }
    }
}

/// POST /users/reset-password
pub async fn reset_password_post(
    State(state): State<AppState>,
    sitzung: Session,
    Form(formular): Form<PasswortResetFormular>,
) -> Response {
    let ergebnis = state
        .identity
        .passwort_zuruecksetzen(
            &formular.token,
            &formular.new_password,
            &formular.password_confirm,
        )
        .await;
    match ergebnis {
        Ok(_) => {
            flash(
                &state,
                &sitzung,
                FlashArt::Erfolg,
                "your password was successfully changed, you can now sign in",
            )
            .await;
            umleiten(PFAD_SIGNIN)
        }
        Err(e @ AuthError::TokenAbgelaufen) => {
            e.protokollieren("reset_password_post");
            flash(&state, &sitzung, FlashArt::Fehler, e.nutzer_nachricht()).await;
            umleiten(PFAD_RESET_ANFORDERN)
        }
        Err(e) => {
            let daten = json!({ "token": formular.token });
            formular_fehler(&state, &sitzung, "user-reset-pw", daten, e, "reset_password_post")
                .await
        }
    }
}
