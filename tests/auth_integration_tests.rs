use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use fakebuster_api::{
    AppState, MemoryRepository, MockMediaSink,
    auth::{AuthUser, Claims, DEV_USER_HEADER},
    config::{AppConfig, Env},
    models::User,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

/// Signs a token for `user_id` that expires `exp_offset` seconds from now.
fn create_token(user_id: Uuid, exp_offset: i64, secret: &str) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, known_users: Vec<User>) -> AppState {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    let repo = MemoryRepository::new();
    for user in known_users {
        repo.add_user(user);
    }

    AppState::new(Arc::new(repo), Arc::new(MockMediaSink::new()), config)
}

fn test_user() -> User {
    User {
        id: TEST_USER_ID,
        username: "factchecker".to_string(),
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

async fn rejection_message(parts: &mut Parts, state: &AppState) -> (StatusCode, String) {
    let err = AuthUser::from_request_parts(parts, state)
        .await
        .expect_err("extraction should fail");
    (err.status_code(), err.to_string())
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let token = create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET);
    let app_state = create_app_state(Env::Production, vec![test_user()]);

    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    with_bearer(&mut parts, &token);

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.username, "factchecker");
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, vec![test_user()]);
    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());

    let (status, message) = rejection_message(&mut parts, &app_state).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "No token, authorization denied");
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let app_state = create_app_state(Env::Production, vec![test_user()]);
    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );

    let (status, _) = rejection_message(&mut parts, &app_state).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    // Well past the default 60 second leeway.
    let token = create_token(TEST_USER_ID, -600, TEST_JWT_SECRET);
    let app_state = create_app_state(Env::Production, vec![test_user()]);

    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    with_bearer(&mut parts, &token);

    let (status, message) = rejection_message(&mut parts, &app_state).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "Token has expired");
}

#[tokio::test]
async fn test_auth_failure_with_wrong_secret() {
    let token = create_token(TEST_USER_ID, 3600, "some-other-secret");
    let app_state = create_app_state(Env::Production, vec![test_user()]);

    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    with_bearer(&mut parts, &token);

    let (status, message) = rejection_message(&mut parts, &app_state).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "Token is not valid");
}

#[tokio::test]
async fn test_auth_failure_for_unknown_user() {
    let token = create_token(Uuid::new_v4(), 3600, TEST_JWT_SECRET);
    let app_state = create_app_state(Env::Production, vec![test_user()]);

    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    with_bearer(&mut parts, &token);

    let (status, _) = rejection_message(&mut parts, &app_state).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let app_state = create_app_state(Env::Local, vec![test_user()]);

    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_str(&TEST_USER_ID.to_string()).unwrap(),
    );

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, TEST_USER_ID);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let app_state = create_app_state(Env::Production, vec![test_user()]);

    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_str(&TEST_USER_ID.to_string()).unwrap(),
    );

    let (status, _) = rejection_message(&mut parts, &app_state).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_resolved_identity_is_reused() {
    // No credentials at all: the identity comes from the request extensions.
    let app_state = create_app_state(Env::Production, vec![]);
    let mut parts = get_request_parts(Method::POST, "/news".parse().unwrap());
    let cached = AuthUser {
        id: TEST_USER_ID,
        username: "factchecker".to_string(),
    };
    parts.extensions.insert(cached.clone());

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user, cached);
}
