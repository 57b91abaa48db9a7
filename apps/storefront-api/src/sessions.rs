//! # Session Store
//!
//! In-process per-user session data: the cart the user is looking at and
//! pending flash messages. Cookie handling belongs to the outer session layer;
//! here a session is keyed by user id.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /carts ─────────► bind_cart(user, cart_id)                         │
//! │                        take_flashes(user)  (consumed once)              │
//! │                                                                         │
//! │  POST /carts/* ──────► push_flash(user, Success | Error)                │
//! │                                                                         │
//! │  settlement ─────────► unbind_cart(user)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Flash {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Flash {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    cart_id: Option<String>,
    flashes: Vec<Flash>,
}

/// Shared session map. Clones share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bind_cart(&self, user_id: &str, cart_id: &str) {
        self.lock()
            .entry(user_id.to_string())
            .or_default()
            .cart_id = Some(cart_id.to_string());
    }

    pub fn cart_binding(&self, user_id: &str) -> Option<String> {
        self.lock()
            .get(user_id)
            .and_then(|session| session.cart_id.clone())
    }

    pub fn unbind_cart(&self, user_id: &str) {
        if let Some(session) = self.lock().get_mut(user_id) {
            session.cart_id = None;
        }
    }

    pub fn push_flash(&self, user_id: &str, flash: Flash) {
        self.lock()
            .entry(user_id.to_string())
            .or_default()
            .flashes
            .push(flash);
    }

    /// Returns and removes the user's pending flashes.
    pub fn take_flashes(&self, user_id: &str) -> Vec<Flash> {
        self.lock()
            .get_mut(user_id)
            .map(|session| std::mem::take(&mut session.flashes))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flashes_are_consumed_once() {
        let store = SessionStore::new();
        store.push_flash("u1", Flash::error("Out of stock"));
        store.push_flash("u1", Flash::success("Added"));

        let flashes = store.take_flashes("u1");
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].level, FlashLevel::Error);
        assert!(store.take_flashes("u1").is_empty());
        assert!(store.take_flashes("nobody").is_empty());
    }

    #[test]
    fn test_cart_binding() {
        let store = SessionStore::new();
        let shared = store.clone();

        store.bind_cart("u1", "cart-1");
        assert_eq!(shared.cart_binding("u1").as_deref(), Some("cart-1"));

        shared.unbind_cart("u1");
        assert!(store.cart_binding("u1").is_none());
    }
}
