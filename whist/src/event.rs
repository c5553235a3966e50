//! A typed, synchronous publish/subscribe channel.
//!
//! Subscribers are invoked in subscription order, on the thread that calls
//! [`EventChannel::trigger`]. Nothing is spawned and nothing is caught: a
//! panicking subscriber unwinds through the triggering call and the
//! remaining subscribers are not invoked for that event.

use std::{fmt, sync::Arc};

/// A subscriber callback receiving the event source and the event.
pub type Subscriber<S, T> = Arc<dyn Fn(&S, &T) + Send + Sync>;

/// An ordered list of subscribers for events of type `T` raised by a
/// source of type `S`.
///
/// Cloning a channel is cheap and shares the subscriber callbacks, which
/// lets an owner snapshot the list under a lock and trigger outside it.
pub struct EventChannel<S, T> {
    subscribers: Vec<Subscriber<S, T>>,
}

impl<S, T> EventChannel<S, T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Append a subscriber. It is invoked after every subscriber added
    /// before it.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&S, &T) + Send + Sync + 'static,
    {
        self.subscribers.push(Arc::new(subscriber));
    }

    /// Invoke every subscriber with `source` and `args`, in subscription
    /// order. A no-op when there are no subscribers.
    pub fn trigger(&self, source: &S, args: &T) {
        for subscriber in &self.subscribers {
            subscriber(source, args);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<S, T> Clone for EventChannel<S, T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<S, T> Default for EventChannel<S, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T> fmt::Debug for EventChannel<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
