//! Identity state and change notifications.
//!
//! `IdentityHub` is the in-process identity source: whoever owns the auth
//! session publishes to it, and the entries coordinator subscribes through an
//! explicit handle that is torn down by dropping or unsubscribing it.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Who, if anyone, is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    #[default]
    SignedOut,
    SignedIn {
        user_id: String,
    },
}

impl IdentityState {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self::SignedIn {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SignedOut => None,
            Self::SignedIn { user_id } => Some(user_id),
        }
    }

    pub const fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn { .. })
    }
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedOut => f.write_str("signed out"),
            Self::SignedIn { user_id } => write!(f, "signed in as {user_id}"),
        }
    }
}

/// Supplies the current identity and notifies on every change
pub trait IdentitySource {
    /// Synchronous snapshot of the current identity
    fn current(&self) -> IdentityState;

    /// Start receiving identity changes published after this call
    fn subscribe(&self) -> IdentitySubscription;
}

#[derive(Debug)]
struct HubInner {
    current: RwLock<IdentityState>,
    sender: broadcast::Sender<IdentityState>,
}

/// Broadcasts identity changes to any number of subscribers.
#[derive(Debug, Clone)]
pub struct IdentityHub {
    inner: Arc<HubInner>,
}

impl Default for IdentityHub {
    fn default() -> Self {
        Self::new(IdentityState::SignedOut)
    }
}

impl IdentityHub {
    pub fn new(initial: IdentityState) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                current: RwLock::new(initial),
                sender,
            }),
        }
    }

    /// Record `state` as current and deliver it to every subscriber.
    ///
    /// Identical re-announcements are delivered too; subscribers decide
    /// whether they matter.
    pub fn publish(&self, state: IdentityState) {
        {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            current.clone_from(&state);
        }
        tracing::debug!("Identity changed: {}", state);
        // No subscribers is fine
        let _ = self.inner.sender.send(state);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

impl IdentitySource for IdentityHub {
    fn current(&self) -> IdentityState {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription {
            receiver: self.inner.sender.subscribe(),
            hub: Arc::downgrade(&self.inner),
        }
    }
}

/// Registration handle for identity changes.
#[derive(Debug)]
pub struct IdentitySubscription {
    receiver: broadcast::Receiver<IdentityState>,
    hub: Weak<HubInner>,
}

impl IdentitySubscription {
    /// Wait for the next identity change.
    ///
    /// Returns `None` once the hub is gone. A subscriber that fell behind
    /// skips straight to the current state.
    pub async fn next(&mut self) -> Option<IdentityState> {
        match self.receiver.recv().await {
            Ok(state) => Some(state),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Identity subscriber lagged by {} events", skipped);
                self.receiver = self.receiver.resubscribe();
                let hub = self.hub.upgrade()?;
                let current = hub
                    .current
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                Some(current)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Stop receiving changes
    pub fn unsubscribe(self) {
        drop(self);
    }
}
