/*
 * Observation
 *
 * Property interception and change propagation: one observer per
 * (object, key) pair, two subscriber collections per observer (immediate and
 * batched), and a flush queue that drains dirty observers in a dedicated pass.
 */

pub mod flush_queue;
pub mod observer_locator;
pub mod property_observer;
pub mod subscriber_collection;

pub use flush_queue::FlushQueue;
pub use observer_locator::ObserverLocator;
pub use property_observer::PropertyObserver;
pub use subscriber_collection::{Origin, Subscriber, SubscriberCollection, SubscriptionKind};
