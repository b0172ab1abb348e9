//! The persisted authentication session.
//!
//! `AuthSession` is built once at the application root and handed to
//! whatever needs it (route guard, views). It persists under the `"auth"`
//! key, so a login survives restarts until `logout`.

use std::sync::Arc;

use harbor_core::{DurableStore, PersistentValue, Result, SubId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const AUTH_KEY: &str = "auth";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Fields this crate does not interpret, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserIdentity {
    pub fn with_id(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// `{}` when signed out. Only `user` decides access.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone)]
pub struct AuthSession {
    value: PersistentValue<AuthRecord>,
}

impl AuthSession {
    /// Restore the session from `store`; a corrupt record starts signed out.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            value: PersistentValue::new(store, AUTH_KEY, AuthRecord::default()),
        }
    }

    /// Like [`AuthSession::new`] but refuses to start over a corrupt record.
    pub fn try_new(store: Arc<dyn DurableStore>) -> Result<Self> {
        Ok(Self {
            value: PersistentValue::try_new(store, AUTH_KEY, AuthRecord::default())?,
        })
    }

    pub fn current(&self) -> AuthRecord {
        self.value.get()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.value.with(|r| r.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.value.with(|r| r.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.value.with(|r| r.user.is_some())
    }

    pub fn set(&self, record: AuthRecord) {
        self.value.set(record);
    }

    pub fn login(&self, user: UserIdentity, token: Option<String>) {
        log::info!("auth: signed in as {}", user.id);
        self.value.set(AuthRecord {
            user: Some(user),
            token,
            extra: Map::new(),
        });
    }

    /// Back to `{}`, persisted.
    pub fn logout(&self) {
        log::info!("auth: signed out");
        self.value.reset();
    }

    pub fn subscribe(&self, f: impl Fn(&AuthRecord) + 'static) -> SubId {
        self.value.subscribe(f)
    }

    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.value.unsubscribe(id)
    }
}
