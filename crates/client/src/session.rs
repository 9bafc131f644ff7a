//! Signed-in user context.
//!
//! [`Session`] owns the in-memory user and keeps the persisted credentials in
//! step with it. Transport-level invalidation arrives as a [`SessionSignal`];
//! one top-level listener applies it and decides where to navigate.

use std::sync::{Arc, PoisonError, RwLock};

use newsfeed_core::{CredentialKey, CredentialStore, Error, User};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::api::AuthApi;
use crate::transport::SessionSignal;

/// Explicit session context, shared by cloning.
#[derive(Debug, Clone)]
pub struct Session {
    auth: AuthApi,
    store: Arc<dyn CredentialStore>,
    user: Arc<RwLock<Option<User>>>,
}

impl Session {
    pub fn new(auth: AuthApi, store: Arc<dyn CredentialStore>) -> Self {
        Self { auth, store, user: Arc::new(RwLock::new(None)) }
    }

    /// Restore a session from persisted credentials.
    ///
    /// A stored token is checked against the API. If the check fails for any
    /// reason the tokens are cleared and no user is signed in.
    pub async fn init(&self) -> Result<Option<User>, Error> {
        if self.store.access_token().is_none() {
            return Ok(None);
        }

        match self.auth.me().await {
            Ok(user) => {
                self.store.set(CredentialKey::UserId, &user.id.to_string())?;
                self.set_user(Some(user.clone()));
                tracing::debug!(user_id = user.id, "session restored");
                Ok(Some(user))
            }
            Err(e) => {
                tracing::warn!("stored session rejected: {}", e);
                self.store.clear_tokens()?;
                self.set_user(None);
                Ok(None)
            }
        }
    }

    /// Sign in and persist the tokens and user id.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, Error> {
        let tokens = self.auth.login(username, password).await?;
        self.store.set(CredentialKey::AccessToken, &tokens.access_token)?;
        self.store.set(CredentialKey::RefreshToken, &tokens.refresh_token)?;

        let user = match self.auth.me().await {
            Ok(user) => user,
            Err(e) => {
                self.store.clear_tokens()?;
                return Err(e);
            }
        };

        self.store.set(CredentialKey::UserId, &user.id.to_string())?;
        self.set_user(Some(user.clone()));
        tracing::info!(user_id = user.id, "signed in");
        Ok(user)
    }

    /// Create an account, then sign in with it.
    pub async fn register(&self, username: &str, password: &str, confirm_password: &str) -> Result<User, Error> {
        self.auth.register(username, password, confirm_password).await?;
        self.login(username, password).await
    }

    /// Forget the user and every persisted key.
    pub fn logout(&self) -> Result<(), Error> {
        self.store.clear_all()?;
        self.set_user(None);
        tracing::info!("signed out");
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(User::is_admin)
    }

    /// Apply a transport signal and return where to navigate.
    pub fn handle_signal(&self, signal: SessionSignal) -> &'static str {
        apply_signal(&self.user, signal)
    }

    /// Apply every signal from `signals` until the transport goes away.
    ///
    /// The task holds no transport itself, so it ends once every transport
    /// is dropped and the queued signals are delivered.
    pub fn spawn_listener<F>(&self, mut signals: broadcast::Receiver<SessionSignal>, on_navigate: F) -> JoinHandle<()>
    where
        F: Fn(&'static str) + Send + 'static,
    {
        let user = Arc::clone(&self.user);
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => on_navigate(apply_signal(&user, signal)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn set_user(&self, user: Option<User>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }
}

fn apply_signal(user: &RwLock<Option<User>>, signal: SessionSignal) -> &'static str {
    match signal {
        SessionSignal::Invalidated { redirect_to } => {
            *user.write().unwrap_or_else(PoisonError::into_inner) = None;
            redirect_to
        }
    }
}
