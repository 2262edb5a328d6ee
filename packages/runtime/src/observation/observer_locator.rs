/*
 * Observer Locator
 *
 * The sole factory for property observers. Keyed by (object identity, key) so
 * a pair is never wrapped twice; holds the only strong references, so
 * releasing here is authoritative teardown.
 */

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::observation::flush_queue::FlushQueue;
use crate::observation::property_observer::PropertyObserver;
use crate::values::Obj;

pub struct ObserverLocator {
    observers: RefCell<HashMap<(usize, String), Rc<PropertyObserver>>>,
    queue: Rc<FlushQueue>,
}

impl ObserverLocator {
    pub fn new() -> ObserverLocator {
        ObserverLocator::with_queue(Rc::new(FlushQueue::new()))
    }

    pub fn with_queue(queue: Rc<FlushQueue>) -> ObserverLocator {
        ObserverLocator {
            observers: RefCell::new(HashMap::new()),
            queue,
        }
    }

    pub fn queue(&self) -> &Rc<FlushQueue> {
        &self.queue
    }

    /// Return the observer for the pair, creating it on first request. A
    /// cached entry is reused only while it still points at the same live
    /// object, so allocation-address recycling cannot alias observers.
    pub fn get_observer(&self, obj: &Obj, key: &str) -> Rc<PropertyObserver> {
        let map_key = (obj.id(), key.to_string());
        {
            let observers = self.observers.borrow();
            if let Some(existing) = observers.get(&map_key) {
                if Self::is_live_for(existing, obj) {
                    return existing.clone();
                }
            }
        }
        let observer = PropertyObserver::new(obj, key, Rc::downgrade(&self.queue));
        self.observers
            .borrow_mut()
            .insert(map_key, observer.clone());
        observer
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    pub fn has_changes(&self) -> bool {
        self.queue.has_changes()
    }

    /// Drain the flush queue.
    pub fn flush_changes(&self) {
        self.queue.flush();
    }

    /// Dispose and forget the observer for one pair.
    pub fn release(&self, obj: &Obj, key: &str) {
        let map_key = (obj.id(), key.to_string());
        if let Some(observer) = self.observers.borrow_mut().remove(&map_key) {
            observer.dispose();
        }
    }

    /// Dispose and forget every observer attached to the object.
    pub fn release_all(&self, obj: &Obj) {
        let id = obj.id();
        let removed: Vec<Rc<PropertyObserver>> = {
            let mut observers = self.observers.borrow_mut();
            let keys: Vec<(usize, String)> = observers
                .keys()
                .filter(|(obj_id, _)| *obj_id == id)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| observers.remove(&key))
                .collect()
        };
        for observer in removed {
            observer.dispose();
        }
    }

    fn is_live_for(observer: &Rc<PropertyObserver>, obj: &Obj) -> bool {
        if observer.is_disposed() {
            return false;
        }
        match observer.owner() {
            Some(owner) => owner.ptr_eq(obj),
            None => false,
        }
    }
}

impl Default for ObserverLocator {
    fn default() -> Self {
        ObserverLocator::new()
    }
}
