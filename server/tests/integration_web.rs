//! HTTP-Ablaeufe gegen den vollstaendigen Router (In-Memory SQLite)

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::Value;
use tower::ServiceExt;

use notekeeper_db::SqliteDb;
use notekeeper_server::{
    config::ServerConfig,
    state_bauen,
    web::{self, middleware::CSRF_HEADER},
};

struct TestApp {
    app: Router,
    db: SqliteDb,
}

async fn aufbau() -> TestApp {
    let mut config = ServerConfig::default();
    config.passwort.m_kib = Some(8);
    config.passwort.t_cost = Some(1);
    config.passwort.p_cost = Some(1);

    let db = SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden");
    let state = state_bauen(&config, db.clone()).expect("State bauen");
    TestApp {
        app: web::router(state),
        db,
    }
}

impl TestApp {
    fn browser(&self) -> Browser {
        Browser {
            app: self.app.clone(),
            cookie: None,
            csrf: None,
        }
    }

    /// Neuester Token-Wert eines Zwecks direkt aus der Datenbank
    async fn letzter_token(&self, zweck: &str) -> String {
        sqlx::query_scalar::<_, String>(
            "SELECT token FROM user_tokens WHERE purpose = ? \
             ORDER BY updated_at DESC, id DESC LIMIT 1",
        )
        .bind(zweck)
        .fetch_one(self.db.pool())
        .await
        .unwrap()
    }

    async fn anzahl_konten(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }

    async fn tokens_zurueckdatieren(&self, alter: Duration) {
        let zeitpunkt = (Utc::now() - alter).to_rfc3339_opts(SecondsFormat::Micros, true);
        sqlx::query("UPDATE user_tokens SET created_at = ?")
            .bind(zeitpunkt)
            .execute(self.db.pool())
            .await
            .unwrap();
    }

    /// Registriert und bestaetigt ein Konto
    async fn aktives_konto(&self, email: &str, passwort: &str) {
        let mut b = self.browser();
        let antwort = b.post("/users/signup", &formular(email, passwort)).await;
        assert_eq!(antwort.status(), StatusCode::SEE_OTHER);

        let token = self.letzter_token("bestaetigung").await;
        let antwort = b.get(&format!("/users/confirm/{token}")).await;
        assert_eq!(antwort.status(), StatusCode::OK);
    }
}

/// Haelt das Session-Cookie wie ein Browser und sendet bei POST den
/// CSRF-Token der aktuellen Sitzung mit
#[derive(Clone)]
struct Browser {
    app: Router,
    cookie: Option<String>,
    csrf: Option<String>,
}

impl Browser {
    async fn get(&mut self, pfad: &str) -> Response {
        self.senden(Method::GET, pfad, None, None).await
    }

    async fn post(&mut self, pfad: &str, formular: &str) -> Response {
        let token = self.csrf_token().await;
        let formular = format!("{formular}&csrf_token={token}");
        self.senden(Method::POST, pfad, Some(&formular), None).await
    }

    /// POST, der den Token als Header statt als Formularfeld traegt
    async fn post_mit_header(&mut self, pfad: &str, formular: &str) -> Response {
        let token = self.csrf_token().await;
        self.senden(Method::POST, pfad, Some(formular), Some(&token))
            .await
    }

    /// POST genau mit dem gegebenen Formular, ohne Token zu ergaenzen
    async fn post_roh(&mut self, pfad: &str, formular: &str) -> Response {
        self.senden(Method::POST, pfad, Some(formular), None).await
    }

    async fn csrf_token(&mut self) -> String {
        if let Some(token) = &self.csrf {
            return token.clone();
        }
        let antwort = self.get("/").await;
        let token = json(antwort).await["csrf_token"]
            .as_str()
            .expect("CSRF-Token auf jeder Seite")
            .to_string();
        self.csrf = Some(token.clone());
        token
    }

    async fn senden(
        &mut self,
        methode: Method,
        pfad: &str,
        formular: Option<&str>,
        csrf_header: Option<&str>,
    ) -> Response {
        let mut anfrage = Request::builder().method(methode).uri(pfad);
        if let Some(cookie) = &self.cookie {
            anfrage = anfrage.header(header::COOKIE, cookie);
        }
        if let Some(token) = csrf_header {
            anfrage = anfrage.header(CSRF_HEADER, token);
        }
        let body = match formular {
            Some(f) => {
                anfrage = anfrage.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                Body::from(f.to_string())
            }
            None => Body::empty(),
        };
        let antwort = self
            .app
            .clone()
            .oneshot(anfrage.body(body).unwrap())
            .await
            .unwrap();
        self.cookie_uebernehmen(&antwort);
        antwort
    }

    fn cookie_uebernehmen(&mut self, antwort: &Response) {
        let Some(gesetzt) = set_cookie(antwort) else {
            return;
        };
        let neu = session_cookie(antwort).filter(|_| !gesetzt.contains("Max-Age=0"));
        if neu != self.cookie {
            self.cookie = neu;
            self.csrf = None;
        }
    }
}

fn formular(email: &str, passwort: &str) -> String {
    format!("email={}&password={passwort}", email.replace('@', "%40"))
}

fn ziel(antwort: &Response) -> &str {
    antwort
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn set_cookie(antwort: &Response) -> Option<&str> {
    antwort
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
}

/// `name=wert` aus einem Set-Cookie-Header mit nicht-leerem Wert
fn session_cookie(antwort: &Response) -> Option<String> {
    let paar = set_cookie(antwort)?.split(';').next()?.trim();
    let (_, wert) = paar.split_once('=')?;
    (!wert.is_empty()).then(|| paar.to_string())
}

async fn json(antwort: Response) -> Value {
    let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Meldet an und prueft die Umleitung auf /notes
async fn anmelden(b: &mut Browser, email: &str, passwort: &str) {
    let antwort = b.post("/users/signin", &formular(email, passwort)).await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(ziel(&antwort), "/notes");
    assert!(b.cookie.is_some(), "Session-Cookie nach Anmeldung erwartet");
}

#[tokio::test]
async fn geschuetzte_route_ohne_sitzung_leitet_um() {
    let t = aufbau().await;
    let antwort = t.browser().get("/notes").await;
    assert_eq!(antwort.status(), StatusCode::FOUND);
    assert_eq!(ziel(&antwort), "/users/signin");
}

#[tokio::test]
async fn session_cookie_attribute() {
    let t = aufbau().await;
    let antwort = t.browser().get("/").await;
    assert_eq!(antwort.status(), StatusCode::OK);

    let cookie = set_cookie(&antwort).expect("Sitzung fuer den CSRF-Token erwartet");
    assert!(cookie.starts_with("notekeeper_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn registrieren_bestaetigen_anmelden_abmelden() {
    let t = aufbau().await;
    let mut b = t.browser();

    let antwort = b.post("/users/signup", "email=a%40x.com&password=secret1").await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(ziel(&antwort), "/users/signup-success");

    let token = t.letzter_token("bestaetigung").await;
    let antwort = b.get(&format!("/users/confirm/{token}")).await;
    assert_eq!(antwort.status(), StatusCode::OK);
    let seite = json(antwort).await;
    assert_eq!(seite["seite"], "generic-message");
    assert_eq!(seite["flash"]["art"], "success");

    // Zweiter Aufruf desselben Links
    let antwort = b.get(&format!("/users/confirm/{token}")).await;
    assert_eq!(antwort.status(), StatusCode::CONFLICT);
    assert_eq!(json(antwort).await["flash"]["text"], "this token was already used");

    anmelden(&mut b, "a@x.com", "secret1").await;

    let antwort = b.get("/notes").await;
    assert_eq!(antwort.status(), StatusCode::OK);
    let seite = json(antwort).await;
    assert_eq!(seite["angemeldet"], true);
    assert!(seite["daten"]["konto_id"].as_i64().unwrap() > 0);

    let alter_browser = b.clone();
    let antwort = b.get("/users/signout").await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(ziel(&antwort), "/users/signin");
    assert!(set_cookie(&antwort).unwrap().contains("Max-Age=0"));
    assert!(b.cookie.is_none());

    // Die alte Sitzungs-ID ist serverseitig zerstoert
    let antwort = alter_browser.clone().get("/notes").await;
    assert_eq!(antwort.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn ungueltige_email_bei_registrierung() {
    let t = aufbau().await;
    let antwort = t
        .browser()
        .post("/users/signup", "email=kein-at&password=secret1")
        .await;
    assert_eq!(antwort.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let seite = json(antwort).await;
    assert_eq!(seite["seite"], "user-signup");
    assert_eq!(seite["feld_fehler"]["email"], "invalid email");
    assert_eq!(seite["daten"]["email"], "kein-at");
    assert!(seite["csrf_token"].is_string(), "Formular erneut absendbar");
}

#[tokio::test]
async fn doppelte_registrierung_meldet_konflikt() {
    let t = aufbau().await;
    t.aktives_konto("a@x.com", "secret1").await;
    let antwort = t
        .browser()
        .post("/users/signup", "email=A%40X.com&password=secret1")
        .await;
    assert_eq!(antwort.status(), StatusCode::CONFLICT);
    assert_eq!(
        json(antwort).await["feld_fehler"]["email"],
        "email not available"
    );
}

#[tokio::test]
async fn email_form_mit_unbekanntem_sub() {
    let t = aufbau().await;
    let mut b = t.browser();
    let antwort = b.get("/users/email-form?sub=anderes").await;
    assert_eq!(antwort.status(), StatusCode::BAD_REQUEST);

    let antwort = b.get("/users/email-form?sub=resend-token").await;
    assert_eq!(antwort.status(), StatusCode::OK);
    assert_eq!(json(antwort).await["daten"]["action"], "/users/resend-token");
}

#[tokio::test]
async fn falsches_passwort() {
    let t = aufbau().await;
    t.aktives_konto("a@x.com", "secret1").await;

    let mut b = t.browser();
    b.csrf_token().await;
    let anonym = b.cookie.clone();

    let antwort = b.post("/users/signin", "email=a%40x.com&password=falsch1").await;
    assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(b.cookie, anonym, "Keine neue Sitzung ohne gueltiges Passwort");
    assert_eq!(
        json(antwort).await["feld_fehler"]["email"],
        "invalid credentials"
    );
}

#[tokio::test]
async fn unbestaetigtes_konto_gibt_token_nicht_heraus() {
    let t = aufbau().await;
    let mut b = t.browser();
    b.post("/users/signup", "email=a%40x.com&password=secret1")
        .await;
    let token = t.letzter_token("bestaetigung").await;

    let antwort = b.post("/users/signin", "email=a%40x.com&password=secret1").await;
    assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
    let seite = json(antwort).await;
    assert_eq!(seite["feld_fehler"]["email"], "your account is not active");
    assert_eq!(seite["daten"]["ask_resend_token"], true);
    assert!(!seite.to_string().contains(&token));
}

#[tokio::test]
async fn anmeldung_vergibt_neue_sitzungs_id() {
    let t = aufbau().await;
    t.aktives_konto("a@x.com", "secret1").await;

    let mut b = t.browser();
    let antwort = b.post("/users/forgot-password", "email=a%40x.com").await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(ziel(&antwort), "/users/signin");
    let vorher = b.clone();
    assert!(vorher.cookie.is_some(), "anonyme Sitzung erwartet");

    anmelden(&mut b, "a@x.com", "secret1").await;
    assert_ne!(vorher.cookie, b.cookie);

    assert_eq!(vorher.clone().get("/notes").await.status(), StatusCode::FOUND);
    assert_eq!(b.get("/notes").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn post_ohne_gueltigen_csrf_token_wird_abgelehnt() {
    let t = aufbau().await;
    let mut b = t.browser();
    b.csrf_token().await;

    let antwort = b
        .post_roh("/users/signup", "email=a%40x.com&password=secret1")
        .await;
    assert_eq!(antwort.status(), StatusCode::FORBIDDEN);
    assert_eq!(json(antwort).await["flash"]["text"], "invalid csrf token");

    let antwort = b
        .post_roh(
            "/users/signup",
            "email=a%40x.com&password=secret1&csrf_token=geraten",
        )
        .await;
    assert_eq!(antwort.status(), StatusCode::FORBIDDEN);

    // Token einer fremden Sitzung
    let fremd = t.browser().csrf_token().await;
    let antwort = b
        .post_roh(
            "/users/signup",
            &format!("email=a%40x.com&password=secret1&csrf_token={fremd}"),
        )
        .await;
    assert_eq!(antwort.status(), StatusCode::FORBIDDEN);

    // Ohne Sitzung gibt es keinen gueltigen Token
    let antwort = t
        .browser()
        .post_roh("/users/signin", "email=a%40x.com&password=secret1&csrf_token=x")
        .await;
    assert_eq!(antwort.status(), StatusCode::FORBIDDEN);

    assert_eq!(t.anzahl_konten().await, 0, "Kein Handler darf gelaufen sein");
}

#[tokio::test]
async fn csrf_token_im_header() {
    let t = aufbau().await;
    let antwort = t
        .browser()
        .post_mit_header("/users/signup", "email=a%40x.com&password=secret1")
        .await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(t.anzahl_konten().await, 1);
}

#[tokio::test]
async fn csrf_token_wechselt_mit_der_anmeldung() {
    let t = aufbau().await;
    t.aktives_konto("a@x.com", "secret1").await;

    let mut b = t.browser();
    let anonym = b.csrf_token().await;
    anmelden(&mut b, "a@x.com", "secret1").await;
    let angemeldet = b.csrf_token().await;
    assert_ne!(anonym, angemeldet);

    let antwort = b
        .post_roh(
            "/users/forgot-password",
            &format!("email=a%40x.com&csrf_token={anonym}"),
        )
        .await;
    assert_eq!(antwort.status(), StatusCode::FORBIDDEN);

    let antwort = b.post("/users/forgot-password", "email=a%40x.com").await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn passwort_zuruecksetzen_ueber_http() {
    let t = aufbau().await;
    t.aktives_konto("a@x.com", "secret1").await;

    let mut b = t.browser();
    b.post("/users/forgot-password", "email=a%40x.com").await;
    let token = t.letzter_token("passwort_reset").await;

    let antwort = b.get(&format!("/users/reset-password/{token}")).await;
    assert_eq!(antwort.status(), StatusCode::OK);
    assert_eq!(json(antwort).await["daten"]["token"], token);

    let formular = format!("token={token}&new_password=neues1&password_confirm=anders1");
    let antwort = b.post("/users/reset-password", &formular).await;
    assert_eq!(antwort.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json(antwort).await["feld_fehler"]["password_confirm"],
        "passwords do not match"
    );

    let formular = format!("token={token}&new_password=neues1&password_confirm=neues1");
    let antwort = b.post("/users/reset-password", &formular).await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(ziel(&antwort), "/users/signin");

    anmelden(&mut t.browser(), "a@x.com", "neues1").await;
}

#[tokio::test]
async fn abgelaufener_reset_token_fuehrt_zum_email_formular() {
    let t = aufbau().await;
    t.aktives_konto("a@x.com", "secret1").await;
    let mut b = t.browser();
    b.post("/users/forgot-password", "email=a%40x.com").await;
    let token = t.letzter_token("passwort_reset").await;
    t.tokens_zurueckdatieren(Duration::hours(2)).await;

    let antwort = b.get(&format!("/users/reset-password/{token}")).await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(ziel(&antwort), "/users/email-form?sub=forgot-password");

    let antwort = b.get("/users/email-form?sub=forgot-password").await;
    let seite = json(antwort).await;
    assert_eq!(seite["flash"]["art"], "error");
    assert_eq!(seite["flash"]["text"], "your token has expired, please try again");
}

#[tokio::test]
async fn token_erneut_senden() {
    let t = aufbau().await;
    let mut b = t.browser();
    b.post("/users/signup", "email=a%40x.com&password=secret1")
        .await;
    let erster = t.letzter_token("bestaetigung").await;

    let antwort = b.post("/users/resend-token", "email=a%40x.com").await;
    assert_eq!(antwort.status(), StatusCode::SEE_OTHER);
    assert_eq!(ziel(&antwort), "/users/signup-success");

    let zweiter = t.letzter_token("bestaetigung").await;
    assert_ne!(erster, zweiter);
    let antwort = b.get(&format!("/users/confirm/{erster}")).await;
    assert_eq!(antwort.status(), StatusCode::BAD_REQUEST);
    let antwort = b.get(&format!("/users/confirm/{zweiter}")).await;
    assert_eq!(antwort.status(), StatusCode::OK);
}
