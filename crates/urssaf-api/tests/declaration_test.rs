#![allow(clippy::unwrap_used, clippy::float_cmp)]
// Integration tests for the declaration engine using wiremock.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use urssaf_api::{DeclarationState, Error, Mandate, RedoPolicy, TaxLineItem};

use common::{
    authorized, calculated, closed_period, declaration_context, logged_in, mount_context,
    mount_discovery, mount_mandates, open_period, session,
};

const CALCULATE: &str = "/api/declaration/declaration/calculer";
const VALIDATE: &str = "/api/declaration/declaration/valider";
const PAY: &str = "/api/declaration/paiement/sepa";

async fn mount_calculate(server: &MockServer, declared: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(CALCULATE))
        .and(authorized())
        .and(body_partial_json(json!({
            "data": { "declaration": { "ass": { "ass_autres": declared } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(calculated(declared)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Any calculate call not matched by a more specific mock.
async fn forbid_calculate(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(CALCULATE))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

// ── Full sequence ───────────────────────────────────────────────────

#[tokio::test]
async fn test_declare_validate_pay() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, open_period()).await;
    mount_mandates(&server).await;
    mount_calculate(&server, "1234", 1).await;

    let mut validated = calculated("1234");
    validated["data"]["declaration"]["certif"] = json!(["c1", "c2", "c3"]);
    Mock::given(method("POST"))
        .and(path(VALIDATE))
        .and(authorized())
        .and(body_partial_json(json!({ "data": { "declaration": { "certif": null } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(validated.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let mut paid = validated.clone();
    paid["data"]["declaration_pdf"] = json!("/api/declaration/pdf/CA_2026_09.pdf");
    Mock::given(method("POST"))
        .and(path(PAY))
        .and(authorized())
        .and(body_partial_json(json!({
            "data": { "paiement": { "sepa": {
                "SepaRum_1": "R1",
                "SepaMontant_1": "20",
                "SepaMontantVal_1": "20",
                "SepaTotalMontant": "20",
                "SepaMontant_0": ""
            } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(paid))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/declaration/pdf/CA_2026_09.pdf"))
        .and(authorized())
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 receipt".to_vec()))
        .mount(&server)
        .await;

    // 1234.5 rounds half to even.
    let summary = session.declare(1234.5, RedoPolicy::Never).await.unwrap();
    assert_eq!(summary.declared, "1234");
    assert_eq!(summary.total_due, 20.0);
    assert_eq!(summary.tax_lines.len(), 3);
    assert_eq!(
        summary.tax_lines[0],
        TaxLineItem {
            description: "Prestations sociales".into(),
            amount: 19.61,
            rate: 21.2,
        }
    );
    assert_eq!(session.state(), DeclarationState::Declared);

    session.validate_declaration().await.unwrap();
    assert_eq!(session.state(), DeclarationState::Validated);

    let payment = session.pay(None).await.unwrap();
    assert_eq!(payment.receipt_url, "/api/declaration/pdf/CA_2026_09.pdf");
    assert_eq!(payment.context["data"]["declaration"]["ass"]["ass_autres"], "1234");
    assert_eq!(session.state(), DeclarationState::Unstarted);

    let pdf = session.fetch_authenticated(&payment.receipt_url).await.unwrap();
    assert!(pdf.starts_with(b"%PDF-"));

    // A second payment needs a new declaration.
    let result = session.pay(None).await;
    assert!(matches!(
        result,
        Err(Error::InvalidState {
            actual: DeclarationState::Unstarted,
            ..
        })
    ));
}

// ── Preconditions ───────────────────────────────────────────────────

#[tokio::test]
async fn test_validate_before_declare() {
    let server = MockServer::start().await;
    let mut session = session(&server);

    let result = session.validate_declaration().await;
    assert!(matches!(result, Err(ref e) if e.is_precondition()));
    assert!(matches!(
        result,
        Err(Error::InvalidState {
            actual: DeclarationState::Unstarted,
            ..
        })
    ));
}

#[tokio::test]
async fn test_pay_before_validate() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, open_period()).await;
    mount_calculate(&server, "500", 1).await;

    session.declare(500.0, RedoPolicy::Never).await.unwrap();
    let result = session.pay(None).await;
    assert!(matches!(
        result,
        Err(Error::InvalidState {
            actual: DeclarationState::Declared,
            ..
        })
    ));
}

#[tokio::test]
async fn test_invalid_amount() {
    let server = MockServer::start().await;
    let mut session = session(&server);

    for amount in [-1.0, f64::NAN, f64::INFINITY] {
        let result = session.declare(amount, RedoPolicy::Always).await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))), "{amount}");
    }
}

// ── Idempotency ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_redeclare_same_amount_is_a_no_op() {
    let (server, mut session) = logged_in().await;

    // First the period is open, then the server reports it declared at 100.
    Mock::given(method("POST"))
        .and(path("/api/declaration/declaration/contexte"))
        .respond_with(ResponseTemplate::new(200).set_body_json(open_period()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_context(&server, closed_period("100")).await;
    mount_calculate(&server, "100", 1).await;

    session.declare(100.0, RedoPolicy::Never).await.unwrap();
    let result = session.declare(100.0, RedoPolicy::Never).await;
    match result {
        Err(ref e @ Error::AlreadyDeclared { ref amount }) => {
            assert_eq!(amount, "100");
            assert!(e.is_already_declared());
        }
        other => panic!("expected AlreadyDeclared, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_different_amount_with_never() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, closed_period("100")).await;
    forbid_calculate(&server).await;

    let result = session.declare(150.0, RedoPolicy::Never).await;
    match result {
        Err(Error::DeclaredDifferentAmount { declared, requested }) => {
            assert_eq!(declared, "100");
            assert_eq!(requested, "150");
        }
        other => panic!("expected DeclaredDifferentAmount, got: {other:?}"),
    }
    assert_eq!(session.state(), DeclarationState::Unstarted);
}

#[tokio::test]
async fn test_different_amount_with_ifchanged() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, closed_period("100")).await;
    mount_calculate(&server, "150", 1).await;

    let summary = session.declare(150.0, RedoPolicy::IfChanged).await.unwrap();
    assert_eq!(summary.declared, "150");
    assert_eq!(session.state(), DeclarationState::Declared);
}

#[tokio::test]
async fn test_same_amount_with_ifchanged() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, closed_period("100")).await;
    forbid_calculate(&server).await;

    let result = session.declare(100.4, RedoPolicy::IfChanged).await;
    assert!(matches!(result, Err(Error::AlreadyDeclared { .. })));
}

#[tokio::test]
async fn test_always_redeclares() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, closed_period("100")).await;
    mount_calculate(&server, "100", 1).await;

    session.declare(100.0, RedoPolicy::Always).await.unwrap();
    assert_eq!(session.state(), DeclarationState::Declared);
}

#[tokio::test]
async fn test_payment_expected_means_not_done() {
    let (server, mut session) = logged_in().await;
    mount_context(
        &server,
        declaration_context("existante", json!(["c1", "c2", "c3"]), "true", "100"),
    )
    .await;
    mount_calculate(&server, "100", 1).await;

    session.declare(100.0, RedoPolicy::Never).await.unwrap();
}

// ── Declaration mode ────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_mode_blocks_declaration() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, declaration_context("rectificative", json!([]), "false", "")).await;
    forbid_calculate(&server).await;

    session.get_context().await.unwrap();
    assert_eq!(session.state(), DeclarationState::ModeError);

    let result = session.declare(100.0, RedoPolicy::Always).await;
    assert!(matches!(
        result,
        Err(Error::UnsupportedMode { ref mode }) if mode.contains("rectificative")
    ));

    assert!(matches!(
        session.validate_declaration().await,
        Err(Error::InvalidState {
            actual: DeclarationState::ModeError,
            ..
        })
    ));
    assert!(matches!(
        session.pay(None).await,
        Err(Error::InvalidState {
            actual: DeclarationState::ModeError,
            ..
        })
    ));
    assert_eq!(session.state(), DeclarationState::ModeError);
}

#[tokio::test]
async fn test_fresh_context_discards_declaration_in_progress() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, open_period()).await;
    mount_calculate(&server, "100", 2).await;
    Mock::given(method("POST"))
        .and(path(VALIDATE))
        .respond_with(ResponseTemplate::new(200).set_body_json(calculated("100")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PAY))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    session.declare(100.0, RedoPolicy::Never).await.unwrap();
    session.get_context().await.unwrap();
    assert_eq!(session.state(), DeclarationState::Unstarted);
    assert!(matches!(
        session.validate_declaration().await,
        Err(Error::InvalidState {
            actual: DeclarationState::Unstarted,
            ..
        })
    ));

    session.declare(100.0, RedoPolicy::Never).await.unwrap();
    session.validate_declaration().await.unwrap();
    session.get_context().await.unwrap();
    assert_eq!(session.state(), DeclarationState::Unstarted);
    assert!(matches!(
        session.pay(None).await,
        Err(Error::InvalidState {
            actual: DeclarationState::Unstarted,
            ..
        })
    ));
}

// ── Payment ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pay_with_unknown_mandate() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, open_period()).await;
    mount_calculate(&server, "100", 1).await;
    Mock::given(method("POST"))
        .and(path(VALIDATE))
        .respond_with(ResponseTemplate::new(200).set_body_json(calculated("100")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PAY))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    session.declare(100.0, RedoPolicy::Never).await.unwrap();
    session.validate_declaration().await.unwrap();

    let mut mandate: Mandate = serde_json::from_value(json!({
        "bank_name": "Other",
        "siret": "",
        "bic": "",
        "iban": "FR00",
        "ics": "",
        "rum": "R9",
        "creditor": { "name": "", "org": "", "ics": "" }
    }))
    .unwrap();
    let result = session.pay(Some(&mandate)).await;
    assert!(matches!(result, Err(Error::MandateNotInContext { ref rum }) if rum == "R9"));
    assert_eq!(session.state(), DeclarationState::Validated);

    mandate.rum = "R0".into();
    Mock::given(method("POST"))
        .and(path(PAY))
        .and(body_partial_json(json!({
            "data": { "paiement": { "sepa": { "SepaMontant_0": "20", "SepaTotalMontant": "20" } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "declaration_pdf": "/pdf/receipt.pdf" }
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    let payment = session.pay(Some(&mandate)).await.unwrap();
    assert_eq!(payment.receipt_url, "/pdf/receipt.pdf");
}

#[tokio::test]
async fn test_no_mandate() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, open_period()).await;
    mount_calculate(&server, "100", 1).await;
    Mock::given(method("POST"))
        .and(path(VALIDATE))
        .respond_with(ResponseTemplate::new(200).set_body_json(calculated("100")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/mandat/mandat/lister"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contexte": { "mandats": [] }
        })))
        .mount(&server)
        .await;

    session.declare(100.0, RedoPolicy::Never).await.unwrap();
    session.validate_declaration().await.unwrap();
    assert!(session.mandates().await.unwrap().is_empty());
    assert!(matches!(session.pay(None).await, Err(Error::NoMandate)));
}

// ── Retries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/assets/config/config.js"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_discovery(&server, "code").await;

    let mut session = session(&server);
    let config = session.static_config().await.unwrap();
    assert!(config.contains_key("ARCHIMED_LOGIN_API_URL"));
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/assets/config/config.js"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let mut session = session(&server);
    let result = session.static_config().await;
    match result {
        Err(ref e @ Error::Http { status, .. }) => {
            assert_eq!(status, 429);
            assert!(e.is_transient());
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_financial_calls_are_not_retried() {
    let (server, mut session) = logged_in().await;
    mount_context(&server, open_period()).await;
    Mock::given(method("POST"))
        .and(path(CALCULATE))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = session.declare(100.0, RedoPolicy::Never).await;
    assert!(matches!(result, Err(Error::Http { status: 503, .. })));
    assert_eq!(session.state(), DeclarationState::Unstarted);
}
