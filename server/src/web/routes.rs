//! Route-Definitionen

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::web::{handlers, middleware as mw, AppState};

/// Erstellt den vollstaendigen Router inklusive Sitzungs- und Trace-Layer.
///
/// Reihenfolge von aussen nach innen: Trace, Sitzung, CSRF-Pruefung, Route.
pub fn router(state: AppState) -> Router {
    let sitzungs_layer = state.sitzungs_layer();

    let offen = Router::new()
        .route("/", get(handlers::home))
        // Registrierung
        .route(
            "/users/signup",
            get(handlers::signup).post(handlers::signup_post),
        )
        .route("/users/signup-success", get(handlers::signup_success))
        .route("/users/confirm/:token", get(handlers::confirm))
        // Anmeldung
        .route(
            "/users/signin",
            get(handlers::signin).post(handlers::signin_post),
        )
        // Passwort und Token
        .route("/users/email-form", get(handlers::email_form))
        .route("/users/forgot-password", post(handlers::forgot_password_post))
        .route("/users/reset-password/:token", get(handlers::reset_password))
        .route("/users/reset-password", post(handlers::reset_password_post))
        .route("/users/resend-token", post(handlers::resend_token_post));

    let geschuetzt = Router::new()
        .route("/users/signout", get(handlers::signout))
        .route("/notes", get(handlers::notes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw::anmeldung_erforderlich,
        ));

    Router::new()
        .merge(offen)
        .merge(geschuetzt)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            mw::csrf_pruefen,
        ))
        .layer(sitzungs_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
