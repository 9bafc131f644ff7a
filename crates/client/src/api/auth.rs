//! Authentication and user administration endpoints.

use newsfeed_core::{Error, Role, TokenPair, User};
use serde::Serialize;
use serde_json::Value;

use super::{ensure_id, ensure_present};
use crate::transport::Transport;

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct Registration<'a> {
    username: &'a str,
    password: &'a str,
    confirm_password: &'a str,
}

#[derive(Debug, Serialize)]
struct RoleChange {
    role: Role,
}

/// Client for `/api/v1/auth`.
///
/// Sign-in, registration and [`AuthApi::me`] go through an unguarded
/// transport: a 401 there is a rejected attempt, not an expired session.
#[derive(Debug, Clone)]
pub struct AuthApi {
    transport: Transport,
    unguarded: Transport,
}

impl AuthApi {
    pub fn new(transport: Transport) -> Self {
        let unguarded = transport.unguarded();
        Self { transport, unguarded }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Exchange username and password for a token pair. Nothing is persisted here.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, Error> {
        ensure_present(username, "username")?;
        ensure_present(password, "password")?;

        self.unguarded
            .post("/auth/login", &[], &Credentials { username, password })
            .await
            .map_err(|e| e.into_api_error("login"))
    }

    /// Create an account. Returns the server's response body untouched.
    pub async fn register(&self, username: &str, password: &str, confirm_password: &str) -> Result<Value, Error> {
        ensure_present(username, "username")?;
        ensure_present(password, "password")?;
        if password != confirm_password {
            return Err(Error::InvalidInput("passwords do not match".into()));
        }

        self.unguarded
            .post("/auth/register", &[], &Registration { username, password, confirm_password })
            .await
            .map_err(|e| e.into_api_error("register"))
    }

    /// The account the current access token belongs to.
    pub async fn me(&self) -> Result<User, Error> {
        self.unguarded
            .get("/auth/users/me", &[])
            .await
            .map_err(|e| e.into_api_error("get current user"))
    }

    /// All accounts (admin only).
    pub async fn users(&self) -> Result<Vec<User>, Error> {
        self.transport
            .get("/auth/users", &[])
            .await
            .map_err(|e| e.into_api_error("list users"))
    }

    pub async fn update_role(&self, id: i64, role: Role) -> Result<User, Error> {
        ensure_id(id, "user")?;
        self.transport
            .put(&format!("/auth/users/{id}/role"), &RoleChange { role })
            .await
            .map_err(|e| e.into_api_error("update user role"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::page_transport;
    use newsfeed_core::{CredentialKey, CredentialStore, MemoryCredentials};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_login_returns_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .and(body_json(json!({"username": "alice", "password": "hunter2"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "a", "refresh_token": "r"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = AuthApi::new(page_transport(&server, Arc::new(MemoryCredentials::new())));
        let tokens = api.login("alice", "hunter2").await.unwrap();
        assert_eq!(tokens.access_token, "a");
        assert_eq!(tokens.refresh_token, "r");
    }

    #[tokio::test]
    async fn test_rejected_login_reports_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect username or password"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentials::new());
        store.set(CredentialKey::AccessToken, "still-valid").unwrap();
        let transport = page_transport(&server, store.clone());
        let mut signals = transport.subscribe();

        let err = AuthApi::new(transport).login("alice", "wrong").await.unwrap_err();
        assert_eq!(err, Error::failed("login", "Incorrect username or password"));
        assert!(!err.is_session_invalid());
        assert_eq!(store.access_token().as_deref(), Some("still-valid"));
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_register_validates_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let api = AuthApi::new(page_transport(&server, Arc::new(MemoryCredentials::new())));
        assert!(matches!(api.register("", "pw", "pw").await, Err(Error::InvalidInput(_))));
        assert!(matches!(
            api.register("bob", "pw1", "pw2").await,
            Err(Error::InvalidInput(msg)) if msg == "passwords do not match"
        ));
    }

    #[tokio::test]
    async fn test_register_surfaces_detail_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/register"))
            .and(body_json(json!({"username": "bob", "password": "pw", "confirm_password": "pw"})))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "detail": [{"msg": "password too short"}, {"msg": "username taken"}]
            })))
            .mount(&server)
            .await;

        let api = AuthApi::new(page_transport(&server, Arc::new(MemoryCredentials::new())));
        let err = api.register("bob", "pw", "pw").await.unwrap_err();
        assert_eq!(err.user_message(), "password too short; username taken");
    }

    #[tokio::test]
    async fn test_update_role_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/auth/users/3/role"))
            .and(body_json(json!({"role": "admin"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 3, "username": "carol", "role": "admin"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = AuthApi::new(page_transport(&server, Arc::new(MemoryCredentials::new())));
        let user = api.update_role(3, Role::Admin).await.unwrap();
        assert!(user.is_admin());
    }
}
