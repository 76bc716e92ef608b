//! Background task feeding identity changes into a coordinator.

use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};

use super::{EntriesCoordinator, FollowUp};
use crate::identity::{IdentitySource, IdentityState};
use crate::local::KeyValueStore;
use crate::remote::RemoteStore;

/// Handle to a running identity listener.
///
/// Dropping the handle detaches the listener, aborting any load or
/// migration it started.
#[derive(Debug)]
pub struct IdentityListener {
    task: JoinHandle<()>,
}

impl IdentityListener {
    /// Stop listening for identity changes
    pub fn detach(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for IdentityListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<K, R> EntriesCoordinator<K, R>
where
    K: KeyValueStore + 'static,
    R: RemoteStore + 'static,
{
    /// Follow `source`, starting from its current state.
    ///
    /// Transitions are applied in the order they are published; the loads
    /// and migrations they trigger run alongside, so a sign-out is never
    /// stuck behind a slow batch insert. Must be called inside a tokio
    /// runtime.
    pub fn attach<S>(self: &Arc<Self>, source: &S) -> IdentityListener
    where
        S: IdentitySource + ?Sized,
    {
        let mut subscription = source.subscribe();
        let initial = source.current();
        let coordinator = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut follow_ups = JoinSet::new();
            coordinator.dispatch(initial, &mut follow_ups);

            loop {
                tokio::select! {
                    next = subscription.next() => match next {
                        Some(state) => coordinator.dispatch(state, &mut follow_ups),
                        None => break,
                    },
                    Some(_) = follow_ups.join_next(), if !follow_ups.is_empty() => {}
                }
            }

            tracing::debug!("Identity source closed; finishing pending work");
            while follow_ups.join_next().await.is_some() {}
        });

        IdentityListener { task }
    }

    fn dispatch(self: &Arc<Self>, state: IdentityState, follow_ups: &mut JoinSet<()>) {
        let Some(follow_up) = self.transition(state) else {
            return;
        };
        let coordinator = Arc::clone(self);
        follow_ups.spawn(async move {
            let migrating = matches!(follow_up, FollowUp::Migrate { .. });
            match coordinator.run_follow_up(follow_up).await {
                Ok(outcome) if migrating && outcome.migrated_count > 0 => {
                    tracing::info!(
                        "Migrated {} guest entries after sign-in",
                        outcome.migrated_count
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!("Identity follow-up failed: {}", error);
                }
            }
        });
    }
}
