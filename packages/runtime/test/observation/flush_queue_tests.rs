/*
 * Flush Queue Tests
 */

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use aster_runtime::{Obj, ObserverLocator, Origin, Subscriber, Value};

    struct OrderLogger {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Subscriber for OrderLogger {
        fn handle_batched_change(&self, _origin: Origin, _old: &Value, _new: &Value) {
            self.log.borrow_mut().push(self.name);
        }
    }

    #[test]
    fn queue_is_empty_until_a_value_changes() {
        let obj = Obj::from_pairs(vec![("n", Value::Number(0.0))]);
        let locator = ObserverLocator::new();
        let observer = locator.get_observer(&obj, "n");
        let log = Rc::new(RefCell::new(Vec::new()));
        observer.subscribe_batched(
            Origin::Source,
            Rc::new(OrderLogger { name: "n", log }),
        );

        assert!(!locator.has_changes());
        obj.set("n", Value::Number(1.0));
        assert!(locator.has_changes());
        assert_eq!(locator.queue().len(), 1);
    }

    #[test]
    fn repeated_writes_enqueue_once() {
        let obj = Obj::from_pairs(vec![("n", Value::Number(0.0))]);
        let locator = ObserverLocator::new();
        let observer = locator.get_observer(&obj, "n");
        let log = Rc::new(RefCell::new(Vec::new()));
        observer.subscribe_batched(
            Origin::Source,
            Rc::new(OrderLogger { name: "n", log }),
        );

        obj.set("n", Value::Number(1.0));
        obj.set("n", Value::Number(2.0));
        obj.set("n", Value::Number(3.0));
        assert_eq!(locator.queue().len(), 1);
    }

    #[test]
    fn flush_drains_in_enqueue_order() {
        let obj = Obj::from_pairs(vec![
            ("a", Value::Number(0.0)),
            ("b", Value::Number(0.0)),
            ("c", Value::Number(0.0)),
        ]);
        let locator = ObserverLocator::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for key in ["a", "b", "c"] {
            let observer = locator.get_observer(&obj, key);
            observer.subscribe_batched(
                Origin::Source,
                Rc::new(OrderLogger {
                    name: key,
                    log: log.clone(),
                }),
            );
        }

        // Dirty them in reverse of subscription order.
        obj.set("c", Value::Number(1.0));
        obj.set("a", Value::Number(1.0));
        obj.set("b", Value::Number(1.0));

        locator.flush_changes();
        assert_eq!(*log.borrow(), vec!["c", "a", "b"]);
        assert!(!locator.has_changes());
    }

    #[test]
    fn writes_during_flush_land_in_the_next_flush() {
        struct Chained {
            other: Obj,
            log: Rc<RefCell<Vec<&'static str>>>,
        }

        impl Subscriber for Chained {
            fn handle_batched_change(&self, _origin: Origin, _old: &Value, _new: &Value) {
                self.log.borrow_mut().push("first");
                self.other.set("b", Value::Number(99.0));
            }
        }

        let obj = Obj::from_pairs(vec![
            ("a", Value::Number(0.0)),
            ("b", Value::Number(0.0)),
        ]);
        let locator = ObserverLocator::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = locator.get_observer(&obj, "a");
        a.subscribe_batched(
            Origin::Source,
            Rc::new(Chained {
                other: obj.clone(),
                log: log.clone(),
            }),
        );
        let b = locator.get_observer(&obj, "b");
        b.subscribe_batched(
            Origin::Source,
            Rc::new(OrderLogger {
                name: "second",
                log: log.clone(),
            }),
        );

        obj.set("a", Value::Number(1.0));
        locator.flush_changes();
        assert_eq!(*log.borrow(), vec!["first"]);
        assert!(locator.has_changes(), "the write from the flush re-queued");

        locator.flush_changes();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn clear_drops_pending_notifications() {
        let obj = Obj::from_pairs(vec![("n", Value::Number(0.0))]);
        let locator = ObserverLocator::new();
        let observer = locator.get_observer(&obj, "n");
        let log = Rc::new(RefCell::new(Vec::new()));
        observer.subscribe_batched(
            Origin::Source,
            Rc::new(OrderLogger {
                name: "n",
                log: log.clone(),
            }),
        );

        obj.set("n", Value::Number(1.0));
        locator.queue().clear();
        locator.flush_changes();
        assert!(log.borrow().is_empty());

        // The observer is still dirty and re-queues on its next change.
        assert!(observer.has_changes());
        obj.set("n", Value::Number(2.0));
        locator.flush_changes();
        assert_eq!(*log.borrow(), vec!["n"]);
    }
}
