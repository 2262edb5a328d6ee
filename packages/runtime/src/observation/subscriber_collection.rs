/*
 * Subscriber Collection
 *
 * Insertion-ordered subscriber storage with inline capacity for the dominant
 * zero/one/two-subscriber cases; a third subscription spills to the heap.
 * Notification order is insertion order, regardless of storage layer.
 */

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::values::Value;

/// Which side of a binding produced a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Source,
    Target,
}

/// Which subscriber collection a connection lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Notified synchronously, inside the mutating `set_value` call.
    Immediate,
    /// Notified when the flush queue processes the observer.
    Batched,
}

/// Receiver of change notifications. The two methods mirror the two
/// notification passes; the parameter names carry the ordering contract.
pub trait Subscriber {
    fn handle_change(&self, _origin: Origin, _new_value: &Value, _old_value: &Value) {}

    fn handle_batched_change(&self, _origin: Origin, _old_value: &Value, _new_value: &Value) {}
}

#[derive(Clone)]
pub(crate) struct SubscriberEntry {
    pub origin: Origin,
    pub subscriber: Rc<dyn Subscriber>,
}

/// Two inline slots plus heap overflow. Semantically a plain ordered set;
/// the inline capacity only avoids allocating for typical UI bindings.
#[derive(Default)]
pub struct SubscriberCollection {
    entries: SmallVec<[SubscriberEntry; 2]>,
}

impl SubscriberCollection {
    pub fn new() -> SubscriberCollection {
        SubscriberCollection {
            entries: SmallVec::new(),
        }
    }

    /// Append a subscriber. A duplicate (same origin, same identity) is a
    /// no-op so double-subscribe cannot double-notify. Returns whether the
    /// subscriber was added.
    pub fn add(&mut self, origin: Origin, subscriber: Rc<dyn Subscriber>) -> bool {
        if self.contains(origin, &subscriber) {
            return false;
        }
        self.entries.push(SubscriberEntry { origin, subscriber });
        true
    }

    /// Remove by reference identity. Absent subscribers are tolerated.
    /// Survivors keep their relative order. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, origin: Origin, subscriber: &Rc<dyn Subscriber>) -> bool {
        let position = self
            .entries
            .iter()
            .position(|e| e.origin == origin && Rc::ptr_eq(&e.subscriber, subscriber));
        match position {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, origin: Origin, subscriber: &Rc<dyn Subscriber>) -> bool {
        self.entries
            .iter()
            .any(|e| e.origin == origin && Rc::ptr_eq(&e.subscriber, subscriber))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether the entries still live in the inline slots.
    pub fn is_inline(&self) -> bool {
        !self.entries.spilled()
    }

    /// Snapshot for notification: mutations made by a subscriber mid-notify
    /// take effect from the next pass.
    pub(crate) fn snapshot(&self) -> SmallVec<[SubscriberEntry; 2]> {
        self.entries.clone()
    }
}
