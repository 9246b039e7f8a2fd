//! Read-only view of the authentication service.
//!
//! Token storage and sign-in live outside the storefront; consumers only ask
//! whether someone is signed in, who, and which bearer token to send, and
//! may follow identity changes through [`AuthFacade::subscribe`].

use std::sync::{PoisonError, RwLock};
use tokio::sync::watch;

/// The signed-in user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    /// Backend user id
    pub id: String,
    /// Email, when known
    pub email: Option<String>,
}

impl UserIdentity {
    /// Identity with only an id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// Authentication facade consumed by the query facade and the HTTP backend
pub trait AuthFacade: Send + Sync {
    /// Whether a user is signed in
    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    /// The signed-in user
    fn current_user(&self) -> Option<UserIdentity>;

    /// Token to send as `Authorization: Bearer …`
    fn bearer_token(&self) -> Option<String>;

    /// Follow the signed-in user
    ///
    /// The receiver starts marked as seen with the current user and wakes on
    /// every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>>;
}

/// Authentication state set from configuration or by the host application
#[derive(Debug)]
pub struct StaticAuth {
    identity: watch::Sender<Option<UserIdentity>>,
    token: RwLock<Option<String>>,
}

impl Default for StaticAuth {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl StaticAuth {
    fn new(user: Option<UserIdentity>, token: Option<String>) -> Self {
        let (identity, _) = watch::channel(user);
        Self {
            identity,
            token: RwLock::new(token),
        }
    }

    /// Nobody signed in
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Signed in as `user`
    #[must_use]
    pub fn signed_in(user: UserIdentity, token: Option<String>) -> Self {
        Self::new(Some(user), token)
    }

    /// Replace the signed-in user and notify subscribers
    pub fn sign_in(&self, user: UserIdentity, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
        self.identity.send_replace(Some(user));
    }

    /// Forget the signed-in user and notify subscribers
    pub fn sign_out(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.identity.send_replace(None);
    }
}

impl AuthFacade for StaticAuth {
    fn current_user(&self) -> Option<UserIdentity> {
        self.identity.borrow().clone()
    }

    fn bearer_token(&self) -> Option<String> {
        if self.identity.borrow().is_none() {
            return None;
        }
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.identity.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let auth = StaticAuth::anonymous();
        assert!(!auth.is_authenticated());

        auth.sign_in(UserIdentity::new("u-1"), Some("token".to_string()));
        assert!(auth.is_authenticated());
        assert_eq!(auth.current_user().map(|u| u.id), Some("u-1".to_string()));
        assert_eq!(auth.bearer_token().as_deref(), Some("token"));

        auth.sign_out();
        assert_eq!(auth.current_user(), None);
        assert_eq!(auth.bearer_token(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_change() {
        let auth = StaticAuth::signed_in(UserIdentity::new("u-1"), None);
        let mut identity = auth.subscribe();
        assert_eq!(identity.borrow().as_ref().map(|u| u.id.as_str()), Some("u-1"));
        assert!(!identity.has_changed().unwrap_or(true));

        auth.sign_in(UserIdentity::new("u-2"), Some("token".to_string()));
        assert!(identity.changed().await.is_ok());
        assert_eq!(
            identity.borrow_and_update().as_ref().map(|u| u.id.as_str()),
            Some("u-2")
        );

        auth.sign_out();
        assert!(identity.changed().await.is_ok());
        assert_eq!(*identity.borrow_and_update(), None);
    }
}
