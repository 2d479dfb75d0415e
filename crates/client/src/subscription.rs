//! Live subscriptions owned by a [`Client`](crate::Client).
//!
//! The registry maps handles to callbacks. Dispatch clones the callback out
//! under the lock and invokes it with the lock released, so a callback may
//! freely call back into the client, including cancelling itself.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use torii_proto::schema::Entity;
use torii_proto::{
    AchievementProgression, Activity, AggregationEntry, Contract, Event, EventMessage,
    SubscriptionFilter, SubscriptionKind, Token, TokenBalance, TokenTransfer, Transaction, Update,
};
use tracing::{debug, error, trace, warn};

use crate::error::{DojoError, Error};

pub(crate) const LOG_TARGET: &str = "torii::client::subscription";

/// Receives the records of one subscription.
///
/// Both methods are called from the subscription's delivery task, one call at
/// a time, in the order the server emitted the updates.
pub trait UpdateCallback<T>: Send + Sync {
    fn on_update(&self, update: T);

    fn on_error(&self, error: DojoError) {
        warn!(target: LOG_TARGET, error = %error, "Unhandled subscription error.");
    }
}

impl<T, F> UpdateCallback<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn on_update(&self, update: T) {
        self(update)
    }
}

#[derive(Clone)]
pub enum SubscriptionCallback {
    Entity(Arc<dyn UpdateCallback<Entity>>),
    EventMessage(Arc<dyn UpdateCallback<EventMessage>>),
    Event(Arc<dyn UpdateCallback<Event>>),
    Token(Arc<dyn UpdateCallback<Token>>),
    TokenBalance(Arc<dyn UpdateCallback<TokenBalance>>),
    TokenTransfer(Arc<dyn UpdateCallback<TokenTransfer>>),
    Transaction(Arc<dyn UpdateCallback<Transaction>>),
    Activity(Arc<dyn UpdateCallback<Activity>>),
    AchievementProgression(Arc<dyn UpdateCallback<AchievementProgression>>),
    Aggregation(Arc<dyn UpdateCallback<AggregationEntry>>),
    Contract(Arc<dyn UpdateCallback<Contract>>),
}

impl std::fmt::Debug for SubscriptionCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SubscriptionCallback").field(&self.kind()).finish()
    }
}

impl SubscriptionCallback {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            SubscriptionCallback::Entity(_) => SubscriptionKind::Entity,
            SubscriptionCallback::EventMessage(_) => SubscriptionKind::EventMessage,
            SubscriptionCallback::Event(_) => SubscriptionKind::Event,
            SubscriptionCallback::Token(_) => SubscriptionKind::Token,
            SubscriptionCallback::TokenBalance(_) => SubscriptionKind::TokenBalance,
            SubscriptionCallback::TokenTransfer(_) => SubscriptionKind::TokenTransfer,
            SubscriptionCallback::Transaction(_) => SubscriptionKind::Transaction,
            SubscriptionCallback::Activity(_) => SubscriptionKind::Activity,
            SubscriptionCallback::AchievementProgression(_) => {
                SubscriptionKind::AchievementProgression
            }
            SubscriptionCallback::Aggregation(_) => SubscriptionKind::Aggregation,
            SubscriptionCallback::Contract(_) => SubscriptionKind::Contract,
        }
    }

    /// Hands the update to the callback, or gives it back if the kinds differ.
    fn deliver(&self, update: Update) -> Result<(), Update> {
        match (self, update) {
            (SubscriptionCallback::Entity(cb), Update::Entity(u)) => cb.on_update(u),
            (SubscriptionCallback::EventMessage(cb), Update::EventMessage(u)) => cb.on_update(u),
            (SubscriptionCallback::Event(cb), Update::Event(u)) => cb.on_update(u),
            (SubscriptionCallback::Token(cb), Update::Token(u)) => cb.on_update(u),
            (SubscriptionCallback::TokenBalance(cb), Update::TokenBalance(u)) => cb.on_update(u),
            (SubscriptionCallback::TokenTransfer(cb), Update::TokenTransfer(u)) => {
                cb.on_update(u)
            }
            (SubscriptionCallback::Transaction(cb), Update::Transaction(u)) => cb.on_update(u),
            (SubscriptionCallback::Activity(cb), Update::Activity(u)) => cb.on_update(u),
            (SubscriptionCallback::AchievementProgression(cb), Update::AchievementProgression(u)) => {
                cb.on_update(u)
            }
            (SubscriptionCallback::Aggregation(cb), Update::Aggregation(u)) => cb.on_update(u),
            (SubscriptionCallback::Contract(cb), Update::Contract(u)) => cb.on_update(u),
            (_, update) => return Err(update),
        }
        Ok(())
    }

    fn deliver_error(&self, error: DojoError) {
        match self {
            SubscriptionCallback::Entity(cb) => cb.on_error(error),
            SubscriptionCallback::EventMessage(cb) => cb.on_error(error),
            SubscriptionCallback::Event(cb) => cb.on_error(error),
            SubscriptionCallback::Token(cb) => cb.on_error(error),
            SubscriptionCallback::TokenBalance(cb) => cb.on_error(error),
            SubscriptionCallback::TokenTransfer(cb) => cb.on_error(error),
            SubscriptionCallback::Transaction(cb) => cb.on_error(error),
            SubscriptionCallback::Activity(cb) => cb.on_error(error),
            SubscriptionCallback::AchievementProgression(cb) => cb.on_error(error),
            SubscriptionCallback::Aggregation(cb) => cb.on_error(error),
            SubscriptionCallback::Contract(cb) => cb.on_error(error),
        }
    }
}

#[derive(Debug)]
pub struct Subscription {
    pub filter: SubscriptionFilter,
    /// Id of the subscription on the transport side.
    pub remote_id: u64,
    pub callback: SubscriptionCallback,
    task: Option<AbortHandle>,
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Delivered,
    /// The handle is gone. The event was dropped.
    Cancelled,
    /// The callback panicked. The subscription stays registered.
    Panicked,
    /// The update kind does not match the callback kind. The event was dropped.
    Mismatched,
}

#[derive(Debug)]
struct Inner {
    next_id: u64,
    subscriptions: HashMap<u64, Subscription>,
}

#[derive(Debug)]
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                subscriptions: HashMap::new(),
            }),
        }
    }

    /// Registers a subscription and returns its handle. Handles are never reused.
    pub fn register(
        &self,
        filter: SubscriptionFilter,
        remote_id: u64,
        callback: SubscriptionCallback,
    ) -> Result<u64, Error> {
        if filter.kind() != callback.kind() {
            return Err(Error::SubscriptionKindMismatch {
                expected: filter.kind(),
                found: callback.kind(),
            });
        }

        let kind = filter.kind();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscriptions.insert(
            id,
            Subscription {
                filter,
                remote_id,
                callback,
                task: None,
            },
        );
        drop(inner);

        debug!(target: LOG_TARGET, id, remote_id, kind = kind.as_ref(), "Registered subscription.");
        Ok(id)
    }

    /// Ties the delivery task to the handle. If the handle was cancelled in the
    /// meantime the task is aborted right away.
    pub fn attach_task(&self, id: u64, task: AbortHandle) -> bool {
        let mut inner = self.inner.lock();
        match inner.subscriptions.get_mut(&id) {
            Some(subscription) => {
                subscription.task = Some(task);
                true
            }
            None => {
                drop(inner);
                task.abort();
                false
            }
        }
    }

    /// Returns the remote id of `id`, checking that `kind` matches.
    pub fn remote_id(&self, id: u64, kind: SubscriptionKind) -> Result<u64, Error> {
        let inner = self.inner.lock();
        let subscription = inner
            .subscriptions
            .get(&id)
            .ok_or(Error::SubscriptionNotFound(id))?;
        let expected = subscription.filter.kind();
        if expected != kind {
            return Err(Error::SubscriptionKindMismatch {
                expected,
                found: kind,
            });
        }
        Ok(subscription.remote_id)
    }

    /// Replaces the filter in place. The handle and callback are kept.
    pub fn update(&self, id: u64, filter: SubscriptionFilter) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        let subscription = inner
            .subscriptions
            .get_mut(&id)
            .ok_or(Error::SubscriptionNotFound(id))?;
        let expected = subscription.filter.kind();
        if expected != filter.kind() {
            return Err(Error::SubscriptionKindMismatch {
                expected,
                found: filter.kind(),
            });
        }
        subscription.filter = filter;
        drop(inner);

        debug!(target: LOG_TARGET, id, "Updated subscription.");
        Ok(())
    }

    /// Removes the subscription and aborts its delivery task.
    ///
    /// A callback invocation already in progress runs to completion; nothing
    /// is delivered to the handle afterwards.
    pub fn cancel(&self, id: u64) -> Option<Subscription> {
        let mut subscription = self.inner.lock().subscriptions.remove(&id)?;
        if let Some(task) = subscription.task.take() {
            task.abort();
        }
        debug!(target: LOG_TARGET, id, "Cancelled subscription.");
        Some(subscription)
    }

    /// Cancels every subscription. Returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let subscriptions = std::mem::take(&mut self.inner.lock().subscriptions);
        let count = subscriptions.len();
        for (_, mut subscription) in subscriptions {
            if let Some(task) = subscription.task.take() {
                task.abort();
            }
        }
        if count > 0 {
            debug!(target: LOG_TARGET, count, "Cancelled all subscriptions.");
        }
        count
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner.lock().subscriptions.contains_key(&id)
    }

    pub fn filter(&self, id: u64) -> Option<SubscriptionFilter> {
        self.inner.lock().subscriptions.get(&id).map(|s| s.filter.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn callback(&self, id: u64) -> Option<SubscriptionCallback> {
        self.inner.lock().subscriptions.get(&id).map(|s| s.callback.clone())
    }

    /// Delivers `update` to the callback registered under `id`.
    pub fn dispatch(&self, id: u64, update: Update) -> Dispatch {
        let Some(callback) = self.callback(id) else {
            trace!(target: LOG_TARGET, id, "Dropping update for cancelled subscription.");
            return Dispatch::Cancelled;
        };

        let kind = update.kind();
        match catch_unwind(AssertUnwindSafe(|| callback.deliver(update))) {
            Ok(Ok(())) => {
                trace!(target: LOG_TARGET, id, kind = kind.as_ref(), "Delivered update.");
                Dispatch::Delivered
            }
            Ok(Err(_)) => {
                warn!(
                    target: LOG_TARGET,
                    id,
                    expected = callback.kind().as_ref(),
                    found = kind.as_ref(),
                    "Dropping update of unexpected kind."
                );
                Dispatch::Mismatched
            }
            Err(panic) => {
                error!(target: LOG_TARGET, id, reason = %panic_message(&*panic), "Subscription callback panicked.");
                Dispatch::Panicked
            }
        }
    }

    /// Delivers a stream error to the callback registered under `id`.
    pub fn dispatch_error(&self, id: u64, error: DojoError) -> Dispatch {
        let Some(callback) = self.callback(id) else {
            return Dispatch::Cancelled;
        };

        match catch_unwind(AssertUnwindSafe(|| callback.deliver_error(error))) {
            Ok(()) => Dispatch::Delivered,
            Err(panic) => {
                error!(target: LOG_TARGET, id, reason = %panic_message(&*panic), "Subscription error callback panicked.");
                Dispatch::Panicked
            }
        }
    }
}

/// Text of a caught panic payload.
pub fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
