//! End-to-end turn scenarios against the real router and the shipped menu
//! configuration, with the in-memory KV store and a scripted backend.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use ussd_gateway_core::{AuthStatus, KvStore, MemoryKvStore, SessionConfig, SessionStore, Slot};
use ussd_gateway_engine::{HandlerRegistry, MenuEngine, MenuStore};
use ussd_gateway_modules::{register_all, BusinessRules};
use ussd_gateway_upstream::{decode_envelope, BankingApi, MockBankingApi};
use ussd_gateway_web::{build_router, AppState, UpstreamApiPort};

const MSISDN: &str = "254700111222";
const SESSION_ID: &str = "S1";
const SHORTCODE: &str = "527";

struct TestGateway {
    router: Router,
    kv: Arc<MemoryKvStore>,
    sessions: SessionStore,
    api: Arc<MockBankingApi>,
}

fn gateway() -> TestGateway {
    let kv = Arc::new(MemoryKvStore::new());
    let sessions = SessionStore::new(kv.clone(), SessionConfig::default());

    let api = Arc::new(MockBankingApi::new());
    let api_dyn: Arc<dyn BankingApi> = api.clone();

    let menus = MenuStore::load("../config/menus").expect("menu config loads");

    let mut registry = HandlerRegistry::new();
    register_all(&mut registry, &sessions, &api_dyn, &BusinessRules::default());

    let engine = MenuEngine::new(menus, registry, sessions.clone())
        .with_api(Arc::new(UpstreamApiPort::new(Arc::clone(&api_dyn))));

    let state = Arc::new(AppState::new(sessions.clone(), engine, api_dyn));

    TestGateway {
        router: build_router(state),
        kv,
        sessions,
        api,
    }
}

async fn post_turn(router: &Router, response: &str) -> (StatusCode, String) {
    post_raw(
        router,
        &format!(
            "msisdn={MSISDN}&sessionid={SESSION_ID}&shortcode={SHORTCODE}&response={response}"
        ),
    )
    .await
}

async fn post_raw(router: &Router, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/ussd")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn scenario_fresh_session_unknown_customer() {
    let gw = gateway();
    // GETCUSTOMER is un-scripted: the mock answers with the connection
    // error envelope, which is a lookup failure.

    let (status, body) = post_turn(&gw.router, "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "con Hello Customer, welcome to SidianVIBE (Mobile Banking)\n\n\
         Please enter your PIN to continue.\n\n\
         Forgot your PIN? Reply with 1 to reset your PIN"
    );

    let key = gw.sessions.key(MSISDN, SESSION_ID, Some(SHORTCODE));
    let session = gw.sessions.get(&key).await.unwrap().unwrap();
    assert_eq!(session.current_menu, "home");
    assert_eq!(session.customer_data.unwrap().customer_id, "GUEST");
}

#[tokio::test]
async fn scenario_forgot_pin_branch() {
    let gw = gateway();

    post_turn(&gw.router, "").await;
    let (status, body) = post_turn(&gw.router, "1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("con "));
    assert!(body.contains("reset your PIN") || body.contains("customer care"));

    let key = gw.sessions.key(MSISDN, SESSION_ID, Some(SHORTCODE));
    let session = gw.sessions.get(&key).await.unwrap().unwrap();
    assert_eq!(session.current_menu, "forgot_pin_info");

    assert_eq!(gw.api.call_count("LOGIN"), 0);
}

#[tokio::test]
async fn scenario_successful_pin() {
    let gw = gateway();
    gw.api.enqueue(
        "LOGIN",
        decode_envelope("STATUS:000:ACCOUNTS:0102030405-Main,0102030406-Savings:"),
    );

    post_turn(&gw.router, "").await;
    let (status, body) = post_turn(&gw.router, "1234").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("con "));

    let key = gw.sessions.key(MSISDN, SESSION_ID, Some(SHORTCODE));
    let session = gw.sessions.get(&key).await.unwrap().unwrap();
    assert_eq!(session.auth_status, AuthStatus::Authenticated);
    assert_eq!(session.current_menu, "main_menu");
    assert_eq!(
        session.customer_data.unwrap().accounts,
        vec!["0102030405-Main", "0102030406-Savings"]
    );

    assert_eq!(gw.api.call_count("LOGIN"), 1);

    let attempt: Option<String> = gw
        .sessions
        .grab(&key, &Slot::PinAttempt)
        .await
        .unwrap();
    assert_eq!(attempt.as_deref(), Some("1234"));
}

#[tokio::test]
async fn scenario_blocked_account() {
    let gw = gateway();
    gw.api.enqueue("LOGIN", decode_envelope("STATUS:102:"));

    post_turn(&gw.router, "").await;
    let (status, body) = post_turn(&gw.router, "1234").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("end Your account has been blocked"));

    let key = gw.sessions.key(MSISDN, SESSION_ID, Some(SHORTCODE));
    assert!(gw.sessions.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_balance_happy_path() {
    let gw = gateway();
    gw.api.enqueue(
        "LOGIN",
        decode_envelope("STATUS:000:ACCOUNTS:0102030405-Main,0102030406-Savings:"),
    );
    gw.api.enqueue("LOGIN", decode_envelope("STATUS:000:"));
    gw.api.enqueue(
        "B-",
        decode_envelope("STATUS:000:MESSAGE:BALANCE|KES 1,234.00|AVAILABLE|KES 1,200.00"),
    );

    post_turn(&gw.router, "").await; // home render
    post_turn(&gw.router, "1234").await; // login -> main_menu

    let (_, accounts_body) = post_turn(&gw.router, "3").await; // balance
    assert!(accounts_body.contains("1. 0102030405-Main"));
    assert!(accounts_body.contains("2. 0102030406-Savings"));

    let (_, pin_body) = post_turn(&gw.router, "1").await; // first account
    assert!(pin_body.contains("PIN"));

    let (status, body) = post_turn(&gw.router, "1234").await; // balance PIN

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("con "));
    assert!(body.contains("BALANCE: KES 1,234.00"));
    assert!(body.contains("AVAILABLE: KES 1,200.00"));

    assert_eq!(gw.api.call_count("B-"), 1);
    assert_eq!(gw.api.call_count("LOGIN"), 2);
}

#[tokio::test]
async fn scenario_session_expiry() {
    let gw = gateway();
    gw.api.enqueue(
        "LOGIN",
        decode_envelope("STATUS:000:ACCOUNTS:0102030405-Main:"),
    );

    post_turn(&gw.router, "").await;
    post_turn(&gw.router, "1234").await; // authenticated, accounts present

    let key = gw.sessions.key(MSISDN, SESSION_ID, Some(SHORTCODE));
    let before = gw.sessions.get(&key).await.unwrap().unwrap();
    assert_eq!(before.current_menu, "main_menu");

    // Rewind the creation anchor past the TTL and let the slots lapse, as
    // wall-clock expiry would.
    let rewound = chrono::Utc::now().timestamp_millis() - 301_000;
    gw.kv
        .set(&key.start_key(), &rewound.to_string(), Some(300))
        .await
        .unwrap();
    gw.kv
        .expire_now(&key.slot_key(&Slot::PinAttempt))
        .unwrap();

    let (status, body) = post_turn(&gw.router, "").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("con Hello"));

    let fresh = gw.sessions.get(&key).await.unwrap().unwrap();
    assert_eq!(fresh.current_menu, "home");
    assert_eq!(fresh.auth_status, AuthStatus::Pending);
    assert!(fresh.customer_data.unwrap().accounts.is_empty());
    assert_ne!(fresh.created_at_millis, before.created_at_millis);

    let attempt: Option<String> = gw
        .sessions
        .grab(&key, &Slot::PinAttempt)
        .await
        .unwrap();
    assert!(attempt.is_none());
}

#[tokio::test]
async fn invariant_missing_parameters_reject_without_side_effects() {
    let gw = gateway();

    let (status, body) = post_raw(&gw.router, "sessionid=S1&response=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "end Invalid parameters");

    let (status, body) = post_raw(&gw.router, "msisdn=254700111222&response=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "end Invalid parameters");

    assert!(gw.kv.is_empty().unwrap());
}

#[tokio::test]
async fn invariant_created_at_stable_within_ttl() {
    let gw = gateway();

    post_turn(&gw.router, "").await;
    let key = gw.sessions.key(MSISDN, SESSION_ID, Some(SHORTCODE));
    let first = gw.sessions.get(&key).await.unwrap().unwrap();

    post_turn(&gw.router, "9").await; // invalid input, same session
    let second = gw.sessions.get(&key).await.unwrap().unwrap();

    assert_eq!(first.created_at_millis, second.created_at_millis);
}

#[tokio::test]
async fn invariant_upstream_failure_keeps_session() {
    let gw = gateway();
    // LOGIN un-scripted: transport-level failure envelope.

    post_turn(&gw.router, "").await;
    let (status, body) = post_turn(&gw.router, "1234").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("con "));

    let key = gw.sessions.key(MSISDN, SESSION_ID, Some(SHORTCODE));
    assert!(gw.sessions.get(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn json_body_is_accepted() {
    let gw = gateway();

    let request = Request::builder()
        .method("POST")
        .uri("/api/ussd")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!(
            r#"{{"msisdn": "{MSISDN}", "sessionid": "{SESSION_ID}", "shortcode": "{SHORTCODE}", "response": ""}}"#
        )))
        .unwrap();

    let response = gw.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.starts_with("con Hello"));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let gw = gateway();

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = gw.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["services"]["redis"], true);
}
