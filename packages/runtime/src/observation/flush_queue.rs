/*
 * Flush Queue
 *
 * Collects dirty observers so batched subscribers see one coalesced
 * notification per property, decoupled from the mutating call stack.
 */

use std::cell::RefCell;
use std::rc::Rc;

use crate::observation::property_observer::PropertyObserver;

#[derive(Default)]
pub struct FlushQueue {
    queue: RefCell<Vec<Rc<PropertyObserver>>>,
}

impl FlushQueue {
    pub fn new() -> FlushQueue {
        FlushQueue {
            queue: RefCell::new(Vec::new()),
        }
    }

    /// Observers enqueue themselves on their clean-to-dirty transition; the
    /// queued flag on the observer keeps this deduplicated.
    pub(crate) fn enqueue(&self, observer: Rc<PropertyObserver>) {
        self.queue.borrow_mut().push(observer);
    }

    pub fn has_changes(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Drain in enqueue order. The drain operates on the queue as it was when
    /// the flush began; values written during the flush re-enqueue their
    /// observer for the next flush.
    pub fn flush(&self) {
        let drained = self.queue.take();
        for observer in drained {
            observer.mark_dequeued();
            observer.flush_changes();
        }
    }

    /// Drop pending entries without notifying anyone. Observers keep their
    /// dirty flag and re-enqueue on their next change.
    pub fn clear(&self) {
        let drained = self.queue.take();
        for observer in drained {
            observer.mark_dequeued();
        }
    }
}
