// Fake authority for integration tests: static config, application shell,
// bundle, identity provider and JWKS, all served by one wiremock server.
#![allow(dead_code, clippy::unwrap_used)]

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use urssaf_api::{RetryPolicy, Session, SiteConfig};

pub const SECRET: &[u8] = b"urssaf-integration-test-hmac-key-000";
pub const USERNAME: &str = "me@example.test";
pub const PASSWORD: &str = "hunter2";
pub const ACCESS_TOKEN: &str = "access-token-1";

/// `requestOrigin` as the identity provider puts it in the login page URL.
pub const REQUEST_ORIGIN: &str =
    "https%3A%2F%2Fidp.test%2Fauthorize%3Fclient_id%3Dcli%26redirect_uri%3Dhttps%3A%2F%2Fapp.test%2Fcb%26END%3DTRUE";
/// The same value once re-encoded by the client.
pub const FIXED_REQUEST_ORIGIN: &str =
    "https%3A%2F%2Fidp.test%2Fauthorize%3Fclient_id%3Dcli%26redirect_uri%3Dhttps%253A%252F%252Fapp.test%252Fcb";

// ── Session ─────────────────────────────────────────────────────────

pub fn session(server: &MockServer) -> Session {
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let site = SiteConfig::from_base_url(base).unwrap();
    let http = reqwest::Client::builder().cookie_store(true).build().unwrap();
    let retry = RetryPolicy {
        backoff_factor: Duration::ZERO,
        ..RetryPolicy::default()
    };
    Session::with_client(site, http, retry)
}

pub fn password() -> SecretString {
    SecretString::from(PASSWORD.to_string())
}

pub fn id_token(secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".into());
    let claims = json!({ "sub": USERNAME, "nonce": "n" });
    jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(secret)).unwrap()
}

// ── Discovery ───────────────────────────────────────────────────────

fn bundle(response_type: &str) -> String {
    format!(
        concat!(
            "(self.webpackChunk=self.webpackChunk||[]).push([[179],{{4711:function(t,n,r){{",
            "var o=r(1);e=r(7),b=window.location.href,i=!0,c={{",
            "oauth:{{responseType:\"{}\",clientId:\"cli\",redirectUri:b+\"callback\",",
            "scope:\"openid profile\",loginUrl:e.ARCHIMED_LOGIN_API_URL+\"authorize\",",
            "tokenEndpoint:e.ARCHIMED_LOGIN_API_URL+\"token\",pkce:!0}},",
            "profil:{{baseURL:e.API_URL+\"/profil\",retries:parseInt(\"2\")}},",
            "mandat:{{baseURL:e.API_URL+\"/mandat\"}},",
            "declaration:{{baseURL:e.PRODUCTION?e.API_URL+\"/declaration\":\"/mock\"}}}};",
            "t.exports=c}}}}]);"
        ),
        response_type
    )
}

/// Mount the static config, shell, bundle and JWKS.
///
/// A session fetches each of the first three at most once.
pub async fn mount_discovery(server: &MockServer, response_type: &str) {
    let static_config = format!(
        "window.__env = {{\n  \"ARCHIMED_LOGIN_API_URL\": \"{uri}/api/login/\",\n  \"API_URL\": \"{uri}/api\",\n  \"PRODUCTION\": true,\n}};\n",
        uri = server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/services/assets/config/config.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(static_config))
        .expect(..=1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><script src="runtime.9f.js"></script><script src="main.4b1d.js" defer></script></head><body><app-root></app-root></body></html>"#,
        ))
        .expect(..=1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/main.4b1d.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(bundle(response_type)))
        .expect(..=1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/login/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{ "kty": "oct", "kid": "k1", "k": URL_SAFE_NO_PAD.encode(SECRET) }]
        })))
        .mount(server)
        .await;
}

// ── Identity provider ───────────────────────────────────────────────

/// Mount the login page and the identification endpoint.
///
/// `redirect` is what the identification XHR answers on success.
pub async fn mount_identification(server: &MockServer, redirect: &str) {
    Mock::given(method("GET"))
        .and(path("/api/login/authorize"))
        .and(query_param("client_id", "cli"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("/login/page?requestOrigin={REQUEST_ORIGIN}")),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <form id="search" action="/search"></form>
                <form id="identification" method="post" action="/login/identify">
                  <input name="username"><input name="password" type="password">
                </form>
            </body></html>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login/identify"))
        .and(body_partial_json(json!({
            "username": USERNAME,
            "password": PASSWORD,
            "requestOrigin": FIXED_REQUEST_ORIGIN,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 302,
            "redirect": redirect,
        })))
        .mount(server)
        .await;
}

/// Mount the token endpoint of the authorization-code flow.
pub async fn mount_token_endpoint(server: &MockServer, id_token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/login/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("code_verifier="))
        .and(body_string_contains("client_id=cli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "id_token": id_token,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// A server with a complete code-flow login mounted, and a logged-in session.
pub async fn logged_in() -> (MockServer, Session) {
    let server = MockServer::start().await;
    mount_discovery(&server, "code").await;
    mount_identification(
        &server,
        &format!("{}/services/callback?code=auth-code-1&state=s", server.uri()),
    )
    .await;
    mount_token_endpoint(&server, &id_token(SECRET)).await;
    mount_profile(&server).await;

    let mut session = session(&server);
    session.login(USERNAME, &password()).await.unwrap();
    (server, session)
}

// ── XHR endpoints ───────────────────────────────────────────────────

pub fn authorized() -> wiremock::matchers::HeaderExactMatcher {
    header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str())
}

pub async fn mount_profile(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/profil/contexte"))
        .and(authorized())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profil": { "siret": "12345678900011" }
        })))
        .expect(..=1)
        .mount(server)
        .await;
}

pub async fn mount_mandates(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/mandat/mandat/lister"))
        .and(authorized())
        .and(body_partial_json(json!({ "profil": { "siret": "12345678900011" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contexte": { "mandats": [{
                "banque_lib": "Bank X",
                "debiteur_siret": "12345678900011",
                "debiteur_bic": "BANKFRPP",
                "debiteur_iban": "FR7630001007941234567890185",
                "ICS": "FR00ZZZ000000",
                "RUM": "R1",
                "creancier_lib": "URSSAF",
                "creancier_orga": "117",
                "creancier_ics": "FR11ZZZ111111"
            }]}
        })))
        .expect(..=1)
        .mount(server)
        .await;
}

/// A declaration context as the server sends it.
pub fn declaration_context(mode: &str, certif: Value, attendu: &str, declared: &str) -> Value {
    json!({
        "contexte": { "mode": mode },
        "data": {
            "declaration": {
                "certif": certif,
                "ass": { "ass_autres": declared },
                "cts": [],
                "mts": { "mtapa": "0" }
            },
            "paiement": {
                "attendu": attendu,
                "sepa": {
                    "SepaRum_0": "R0",
                    "SepaMontant_0": "",
                    "SepaMontantVal_0": "",
                    "SepaRum_1": "R1",
                    "SepaMontant_1": "",
                    "SepaMontantVal_1": "",
                    "SepaTotalMontant": ""
                }
            }
        }
    })
}

/// An open period: nothing declared, nothing to pay yet.
pub fn open_period() -> Value {
    declaration_context("nouvelle", json!([]), "false", "")
}

/// A period declared and paid at `declared` euros.
pub fn closed_period(declared: &str) -> Value {
    declaration_context("existante", json!(["c1", "c2", "c3"]), "false", declared)
}

/// The context the server returns after computing contributions.
pub fn calculated(declared: &str) -> Value {
    let mut context = open_period();
    context["data"]["declaration"]["ass"]["ass_autres"] = json!(declared);
    context["data"]["declaration"]["cts"] = json!([
        { "lib": "Prestations sociales", "mt": "19.61", "taux": "21.2%" },
        { "lib": "Formation professionnelle", "mt": "0.19", "taux": "0.2%" },
        { "lib": "Taxe pour frais de chambre", "mt": "0", "taux": "0.044%" }
    ]);
    context["data"]["declaration"]["mts"]["mtapa"] = json!("20");
    context
}

pub async fn mount_context(server: &MockServer, context: Value) {
    Mock::given(method("POST"))
        .and(path("/api/declaration/declaration/contexte"))
        .and(authorized())
        .respond_with(ResponseTemplate::new(200).set_body_json(context))
        .mount(server)
        .await;
}
