/*
 * Property Observer
 *
 * One interception unit per (object, key) pair. Attaches lazily on the first
 * subscription of either kind, tracks current/previous/old values, notifies
 * immediate subscribers synchronously on every change, and marks itself dirty
 * for the flush queue's batched pass.
 */

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::observation::flush_queue::FlushQueue;
use crate::observation::subscriber_collection::{Origin, Subscriber, SubscriberCollection};
use crate::values::{Obj, Value, WeakObj};

pub struct PropertyObserver {
    obj: RefCell<WeakObj>,
    key: String,
    current_value: RefCell<Value>,
    previous_value: RefCell<Value>,
    old_value: RefCell<Value>,
    has_changes: Cell<bool>,
    observing: Cell<bool>,
    // Snapshot of the property's pre-observation shape, for restoration.
    existed: Cell<bool>,
    immediate: RefCell<SubscriberCollection>,
    batched: RefCell<SubscriberCollection>,
    queue: Weak<FlushQueue>,
    queued: Cell<bool>,
    disposed: Cell<bool>,
    self_weak: Weak<PropertyObserver>,
}

impl PropertyObserver {
    pub(crate) fn new(obj: &Obj, key: &str, queue: Weak<FlushQueue>) -> Rc<PropertyObserver> {
        Rc::new_cyclic(|self_weak| PropertyObserver {
            obj: RefCell::new(obj.downgrade()),
            key: key.to_string(),
            current_value: RefCell::new(Value::Undefined),
            previous_value: RefCell::new(Value::Undefined),
            old_value: RefCell::new(Value::Undefined),
            has_changes: Cell::new(false),
            observing: Cell::new(false),
            existed: Cell::new(false),
            immediate: RefCell::new(SubscriberCollection::new()),
            batched: RefCell::new(SubscriberCollection::new()),
            queue,
            queued: Cell::new(false),
            disposed: Cell::new(false),
            self_weak: self_weak.clone(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_observing(&self) -> bool {
        self.observing.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes.get()
    }

    pub(crate) fn owner(&self) -> Option<Obj> {
        self.obj.borrow().upgrade()
    }

    /// Current value. Before interception starts this reads the plain
    /// property; afterwards the observer's own slot is authoritative.
    pub fn get_value(&self) -> Value {
        if self.observing.get() {
            return self.current_value.borrow().clone();
        }
        match self.obj.borrow().upgrade() {
            Some(obj) => obj.get_raw(&self.key),
            None => Value::Undefined,
        }
    }

    /// Write a value. Equal writes (strict) are complete no-ops; a change
    /// notifies immediate subscribers synchronously and marks the observer
    /// dirty for the next flush.
    pub fn set_value(&self, new_value: Value) {
        if self.disposed.get() {
            return;
        }
        if !self.observing.get() {
            if let Some(obj) = self.obj.borrow().upgrade() {
                obj.set_raw(&self.key, new_value);
            }
            return;
        }
        let previous = self.current_value.borrow().clone();
        if new_value == previous {
            return;
        }
        *self.previous_value.borrow_mut() = previous.clone();
        *self.current_value.borrow_mut() = new_value.clone();
        self.notify_immediate(&new_value, &previous);
    }

    /// Recompute the dirty flag against `old_value`, enqueue on the dirty
    /// transition, then notify immediate subscribers in insertion order.
    pub fn notify_immediate(&self, new_value: &Value, previous_value: &Value) {
        let dirty = *new_value != *self.old_value.borrow();
        self.has_changes.set(dirty);
        if dirty && !self.queued.get() {
            if let (Some(queue), Some(me)) = (self.queue.upgrade(), self.self_weak.upgrade()) {
                self.queued.set(true);
                queue.enqueue(me);
            }
        }
        let snapshot = self.immediate.borrow().snapshot();
        for entry in snapshot {
            entry
                .subscriber
                .handle_change(entry.origin, new_value, previous_value);
        }
    }

    /// Deliver the coalesced change to batched subscribers. Idempotent when
    /// clean.
    pub fn flush_changes(&self) {
        if !self.has_changes.get() {
            return;
        }
        let old = self.old_value.borrow().clone();
        let current = self.current_value.borrow().clone();
        // Resynchronize before notifying so a write made by a batched
        // subscriber queues as a fresh change instead of being clobbered.
        *self.old_value.borrow_mut() = current.clone();
        *self.previous_value.borrow_mut() = current.clone();
        self.has_changes.set(false);
        let snapshot = self.batched.borrow().snapshot();
        for entry in snapshot {
            entry
                .subscriber
                .handle_batched_change(entry.origin, &old, &current);
        }
    }

    pub fn subscribe_immediate(&self, origin: Origin, subscriber: Rc<dyn Subscriber>) {
        if self.disposed.get() {
            return;
        }
        self.ensure_observing();
        self.immediate.borrow_mut().add(origin, subscriber);
    }

    pub fn unsubscribe_immediate(&self, origin: Origin, subscriber: &Rc<dyn Subscriber>) {
        self.immediate.borrow_mut().remove(origin, subscriber);
    }

    pub fn subscribe_batched(&self, origin: Origin, subscriber: Rc<dyn Subscriber>) {
        if self.disposed.get() {
            return;
        }
        self.ensure_observing();
        self.batched.borrow_mut().add(origin, subscriber);
    }

    pub fn unsubscribe_batched(&self, origin: Origin, subscriber: &Rc<dyn Subscriber>) {
        self.batched.borrow_mut().remove(origin, subscriber);
    }

    pub fn immediate_count(&self) -> usize {
        self.immediate.borrow().len()
    }

    pub fn batched_count(&self) -> usize {
        self.batched.borrow().len()
    }

    /// Restore the plain property, detach from the owner and null out all
    /// observer state. Failures are diagnostics, not panics: teardown of one
    /// component must not abort an unrelated teardown in the same pass.
    pub fn dispose(&self) {
        if self.disposed.get() {
            return;
        }
        if self.observing.get() {
            match self.obj.borrow().upgrade() {
                Some(obj) => {
                    let restored = if self.existed.get() {
                        Some(self.current_value.borrow().clone())
                    } else {
                        None
                    };
                    if obj.restore_property(&self.key, restored).is_err() {
                        warn!(
                            key = %self.key,
                            "cannot restore property on a frozen object; value discarded"
                        );
                    }
                }
                None => {
                    warn!(
                        key = %self.key,
                        "owner was dropped before its property observer was disposed"
                    );
                }
            }
        }
        *self.obj.borrow_mut() = WeakObj::new();
        self.immediate.borrow_mut().clear();
        self.batched.borrow_mut().clear();
        *self.current_value.borrow_mut() = Value::Undefined;
        *self.previous_value.borrow_mut() = Value::Undefined;
        *self.old_value.borrow_mut() = Value::Undefined;
        self.has_changes.set(false);
        self.observing.set(false);
        self.disposed.set(true);
    }

    pub(crate) fn mark_dequeued(&self) {
        self.queued.set(false);
    }

    /// First subscription of either kind starts interception: the property's
    /// value moves into the observer and the object routes the key through it.
    fn ensure_observing(&self) {
        if self.observing.get() {
            return;
        }
        let Some(obj) = self.obj.borrow().upgrade() else {
            warn!(key = %self.key, "cannot observe a property on a dropped object");
            return;
        };
        match obj.attach_observer(&self.key, self.self_weak.clone()) {
            Ok((existed, value)) => {
                self.existed.set(existed);
                *self.current_value.borrow_mut() = value.clone();
                *self.previous_value.borrow_mut() = value.clone();
                *self.old_value.borrow_mut() = value;
                self.observing.set(true);
            }
            Err(_) => {
                warn!(key = %self.key, "cannot observe a property on a frozen object");
            }
        }
    }
}
