//! Follow toggle
//!
//! [`FollowView`] is the materialized follow state of one target user as seen
//! by the viewer. It is updated from three directions:
//!
//! - the optimistic controller's callbacks for the viewer's own clicks
//! - `follow_delta` events on `follow:<target>` from other tabs and users
//! - the initial status fetch
//!
//! Authoritative updates (responses and deltas) carry the server's version and
//! are applied last-write-wins: anything older than the newest version already
//! applied is ignored, so a late broadcast cannot undo a newer toggle.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use uuid::Uuid;

use crate::channel::{Channel, ChannelHandle, Listeners};
use crate::client::api::{ClientError, FollowApi, MutationError};
use crate::client::optimistic::{
    OptimisticController, Settlement, ToggleCallbacks, ToggleMutation, ToggleOutcome,
};
use crate::shared::{EventType, FollowCounts, FollowDelta, FollowStatus, FollowToggleResponse, Topic};

/// What the UI renders for one target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowState {
    pub is_following: bool,
    pub followers: i64,
    pub following: i64,
    /// Newest authoritative version applied; 0 before any
    pub version: i64,
}

struct ViewInner {
    state: FollowState,
    /// `(is_following before, delta applied)` of the change awaiting an answer
    optimistic: Option<(bool, i64)>,
}

/// Materialized follow state for one target
pub struct FollowView {
    target_id: Uuid,
    viewer_id: Option<Uuid>,
    inner: Mutex<ViewInner>,
    tx: watch::Sender<FollowState>,
}

impl FollowView {
    pub fn new(target_id: Uuid, viewer_id: Option<Uuid>) -> Self {
        Self {
            target_id,
            viewer_id,
            inner: Mutex::new(ViewInner {
                state: FollowState::default(),
                optimistic: None,
            }),
            tx: watch::channel(FollowState::default()).0,
        }
    }

    pub fn target_id(&self) -> Uuid {
        self.target_id
    }

    pub fn state(&self) -> FollowState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FollowState> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ViewInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: FollowState) {
        self.tx.send_replace(state);
    }

    /// Seed from a status fetch unless something authoritative arrived first
    pub fn load(&self, status: &FollowStatus) {
        let mut inner = self.lock();
        if inner.state.version > 0 || inner.optimistic.is_some() {
            return;
        }
        inner.state.is_following = status.is_following;
        inner.state.followers = status.counts.followers;
        inner.state.following = status.counts.following;
        let state = inner.state;
        drop(inner);
        self.publish(state);
    }

    /// Apply an authoritative change. Returns false when it was stale.
    ///
    /// `delta_pending` is the part of `delta` not yet reflected in the
    /// follower count; it is only used when `counts` is absent.
    fn apply_authoritative(
        &self,
        is_following: Option<bool>,
        counts: Option<FollowCounts>,
        delta_pending: i64,
        version: i64,
    ) -> bool {
        let mut inner = self.lock();
        if version <= inner.state.version {
            tracing::debug!(
                "[Follow] Ignoring stale version {} for {} (have {})",
                version,
                self.target_id,
                inner.state.version
            );
            return false;
        }

        inner.state.version = version;
        // Without a viewer flag this is someone else's edge; a pending guess
        // of ours stays on top of their counts so a rollback can still undo it.
        let pending = match is_following {
            Some(is_following) => {
                inner.optimistic = None;
                inner.state.is_following = is_following;
                0
            }
            None => inner.optimistic.map(|(_, delta)| delta).unwrap_or(0),
        };
        match counts {
            Some(counts) => {
                inner.state.followers = (counts.followers + pending).max(0);
                inner.state.following = counts.following;
            }
            None => inner.state.followers = (inner.state.followers + delta_pending).max(0),
        }
        let state = inner.state;
        drop(inner);
        self.publish(state);
        true
    }

    /// Apply a `follow_delta` broadcast
    pub fn apply_remote(&self, delta: &FollowDelta) -> bool {
        if delta.target_id != self.target_id {
            return false;
        }
        let from_viewer = self.viewer_id.is_some() && delta.follower_id == self.viewer_id;
        self.apply_authoritative(
            from_viewer.then_some(delta.is_following),
            delta.counts,
            delta.delta,
            delta.version,
        )
    }
}

impl ToggleCallbacks<FollowToggleResponse> for FollowView {
    fn on_optimistic(&self, assumed_on: bool, assumed_delta: i64) {
        let mut inner = self.lock();
        inner.optimistic = Some((inner.state.is_following, assumed_delta));
        inner.state.is_following = assumed_on;
        inner.state.followers = (inner.state.followers + assumed_delta).max(0);
        let state = inner.state;
        drop(inner);
        self.publish(state);
    }

    fn on_rollback(&self) {
        let mut inner = self.lock();
        let Some((was_following, delta)) = inner.optimistic.take() else {
            return;
        };
        inner.state.is_following = was_following;
        inner.state.followers = (inner.state.followers - delta).max(0);
        let state = inner.state;
        drop(inner);
        self.publish(state);
    }

    fn on_reconcile(&self, settlement: &Settlement<FollowToggleResponse>) {
        self.apply_authoritative(
            Some(settlement.is_on),
            settlement.detail.counts,
            settlement.delta,
            settlement.detail.version,
        );
    }

    fn on_settled(&self, settlement: &Settlement<FollowToggleResponse>) {
        // The delta is already in the count from the optimistic step.
        self.apply_authoritative(
            Some(settlement.is_on),
            settlement.detail.counts,
            0,
            settlement.detail.version,
        );
    }
}

/// Follow edges as a [`ToggleMutation`]
pub struct FollowMutation<'a, A> {
    api: &'a A,
    follower_id: Option<Uuid>,
    handle: Option<&'a ChannelHandle>,
}

impl<'a, A: FollowApi> FollowMutation<'a, A> {
    pub fn new(api: &'a A, follower_id: Option<Uuid>, handle: Option<&'a ChannelHandle>) -> Self {
        Self {
            api,
            follower_id,
            handle,
        }
    }
}

impl<A: FollowApi> ToggleMutation for FollowMutation<'_, A> {
    type Key = Uuid;
    type Detail = FollowToggleResponse;

    async fn apply(&self, target_id: &Uuid, turn_on: bool) -> Result<Settlement<FollowToggleResponse>, MutationError> {
        let response = if turn_on {
            self.api.follow(*target_id).await?
        } else {
            self.api.unfollow(*target_id).await?
        };
        Ok(Settlement {
            delta: response.delta,
            is_on: response.is_following,
            detail: response,
        })
    }

    fn announce(&self, target_id: &Uuid, settlement: &Settlement<FollowToggleResponse>) {
        let Some(handle) = self.handle else {
            return;
        };
        let delta = FollowDelta {
            target_id: *target_id,
            follower_id: self.follower_id,
            delta: settlement.delta,
            is_following: settlement.is_on,
            counts: settlement.detail.counts,
            version: settlement.detail.version,
        };
        let result = serde_json::to_value(&delta)
            .map_err(|e| e.to_string())
            .and_then(|payload| handle.send(EventType::FollowDelta, payload).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!("[Follow] Failed to announce delta for {}: {}", target_id, e);
        }
    }
}

/// Follow button for one target: view, channel subscription and controller
pub struct FollowToggle<A> {
    target_id: Uuid,
    viewer_id: Option<Uuid>,
    api: Arc<A>,
    controller: OptimisticController<Uuid>,
    view: Arc<FollowView>,
    handle: ChannelHandle,
}

impl<A: FollowApi> FollowToggle<A> {
    /// Subscribe to `follow:<target>` and load the current status
    ///
    /// The subscription is opened before the fetch so no delta published in
    /// between is lost; [`FollowView::load`] then yields to anything newer.
    pub async fn open<C: Channel>(
        channel: &C,
        api: Arc<A>,
        controller: OptimisticController<Uuid>,
        viewer_id: Option<Uuid>,
        target_id: Uuid,
    ) -> Result<Self, ClientError> {
        let view = Arc::new(FollowView::new(target_id, viewer_id));

        let listener_view = view.clone();
        let listeners = Listeners::new().on(EventType::FollowDelta, move |event| {
            match event.decode::<FollowDelta>() {
                Ok(delta) => {
                    listener_view.apply_remote(&delta);
                }
                Err(e) => tracing::warn!("[Follow] Malformed delta on {}: {}", event.topic, e),
            }
        });
        let handle = channel.open(&Topic::follow(target_id), None, listeners).await?;

        let status = api.follow_status(target_id).await?;
        view.load(&status);

        Ok(Self {
            target_id,
            viewer_id,
            api,
            controller,
            view,
            handle,
        })
    }

    pub fn view(&self) -> &Arc<FollowView> {
        &self.view
    }

    pub fn state(&self) -> FollowState {
        self.view.state()
    }

    /// Flip the follow state of the target
    pub async fn toggle(&self) -> ToggleOutcome<FollowToggleResponse> {
        let mutation = FollowMutation::new(self.api.as_ref(), self.viewer_id, Some(&self.handle));
        let guess = self.view.state().is_following;
        self.controller
            .toggle(&mutation, self.target_id, guess, self.view.as_ref())
            .await
    }

    pub fn close(&self) {
        self.handle.close();
    }
}
