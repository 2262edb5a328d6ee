#![deny(clippy::all)]

/**
 * aster runtime
 *
 * Observation and binding core for UI change propagation: property observers
 * with immediate and batched subscriber collections, a binding-expression
 * parser and evaluator, scopes, bindings, and a flush queue.
 */
pub mod binding;
pub mod chars;
mod error;
pub mod expression_parser;
pub mod observation;
pub mod values;

pub use binding::{Binding, BindingMode, Connectable, Listener, OverrideContext, PropertyBinding, Scope};
pub use error::{EvalError, ParseError, Result};
pub use expression_parser::{Expression, ExpressionParser, ParseFlags};
pub use observation::{
    FlushQueue, ObserverLocator, Origin, PropertyObserver, Subscriber, SubscriberCollection,
    SubscriptionKind,
};
pub use values::{Event, EventHandler, NativeFunction, Obj, Value, WeakObj};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
