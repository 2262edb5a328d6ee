/*
 * Property Binding
 *
 * Wires an expression source to a target property. One-way bindings update
 * the target from the flush pass so DOM-style writes coalesce; two-way
 * bindings update it synchronously and route target events back into the
 * source through `assign`. The strict-inequality guard in the observer is
 * what terminates the two-way echo.
 */

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::binding::scope::Scope;
use crate::binding::{Binding, BindingMode, Connectable};
use crate::error::EvalError;
use crate::expression_parser::ast::Expression;
use crate::observation::{
    ObserverLocator, Origin, PropertyObserver, Subscriber, SubscriptionKind,
};
use crate::values::{Event, EventHandler, Obj, Value};

pub const DEFAULT_TARGET_EVENT: &str = "change";

pub struct PropertyBinding {
    source_expression: Rc<Expression>,
    target: Obj,
    target_property: String,
    mode: BindingMode,
    target_event: RefCell<String>,
    locator: Rc<ObserverLocator>,
    scope: RefCell<Option<Scope>>,
    observers: RefCell<Vec<Rc<PropertyObserver>>>,
    target_handler: RefCell<Option<Rc<dyn EventHandler>>>,
    bound: Cell<bool>,
    self_weak: Weak<PropertyBinding>,
}

impl PropertyBinding {
    pub fn new(
        source_expression: Rc<Expression>,
        target: Obj,
        target_property: impl Into<String>,
        mode: BindingMode,
        locator: Rc<ObserverLocator>,
    ) -> Rc<PropertyBinding> {
        Rc::new_cyclic(|self_weak| PropertyBinding {
            source_expression,
            target,
            target_property: target_property.into(),
            mode,
            target_event: RefCell::new(DEFAULT_TARGET_EVENT.to_string()),
            locator,
            scope: RefCell::new(None),
            observers: RefCell::new(Vec::new()),
            target_handler: RefCell::new(None),
            bound: Cell::new(false),
            self_weak: self_weak.clone(),
        })
    }

    /// Configure which target event carries target-originated changes for
    /// two-way mode. Takes effect at the next `bind`.
    pub fn set_target_event(&self, event: impl Into<String>) {
        *self.target_event.borrow_mut() = event.into();
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    pub fn target(&self) -> &Obj {
        &self.target
    }

    pub fn target_property(&self) -> &str {
        &self.target_property
    }

    fn subscription_kind(&self) -> SubscriptionKind {
        match self.mode {
            BindingMode::OneTime | BindingMode::OneWay => SubscriptionKind::Batched,
            BindingMode::TwoWay => SubscriptionKind::Immediate,
        }
    }

    /// Dispatch a change by the side that produced it. A source-originated
    /// notification re-evaluates the whole expression, so a change to any one
    /// operand of a composite refreshes the target with the composite's value.
    pub fn call(&self, origin: Origin, new_value: &Value, _old_value: &Value) {
        if !self.bound.get() {
            return;
        }
        match origin {
            Origin::Source => self.evaluate_to_target(),
            Origin::Target => self.update_source(new_value),
        }
    }

    fn evaluate_to_target(&self) {
        let scope = self.scope.borrow().clone();
        let Some(scope) = scope else {
            return;
        };
        match self.source_expression.evaluate(&scope) {
            Ok(value) => {
                self.update_target(&value);
                self.reconnect(&scope);
            }
            Err(error) => {
                warn!(
                    error = %error,
                    property = %self.target_property,
                    "binding source failed to re-evaluate"
                );
            }
        }
    }

    /// The dependency set can change when an intermediate object in a member
    /// chain is replaced; drop the old subscriptions and resolve them afresh.
    fn reconnect(&self, scope: &Scope) {
        if let Some(me) = self.self_weak.upgrade() {
            let subscriber: Rc<dyn Subscriber> = me;
            for observer in self.observers.borrow_mut().drain(..) {
                observer.unsubscribe_immediate(Origin::Source, &subscriber);
                observer.unsubscribe_batched(Origin::Source, &subscriber);
            }
        }
        self.source_expression.connect(self, scope);
    }

    fn update_target(&self, value: &Value) {
        self.target.set(&self.target_property, value.clone());
    }

    fn update_source(&self, value: &Value) {
        let scope = self.scope.borrow().clone();
        let Some(scope) = scope else {
            return;
        };
        if let Err(error) = self.source_expression.assign(&scope, value.clone()) {
            warn!(
                error = %error,
                property = %self.target_property,
                "two-way binding could not write back to its source"
            );
        }
    }

    fn attach_target_listener(&self) {
        let Some(me) = self.self_weak.upgrade() else {
            return;
        };
        let handler: Rc<dyn EventHandler> = Rc::new(TargetChangeHandler {
            binding: Rc::downgrade(&me),
        });
        let event = self.target_event.borrow().clone();
        self.target.add_event_listener(&event, handler.clone());
        *self.target_handler.borrow_mut() = Some(handler);
    }
}

impl Binding for PropertyBinding {
    fn bind(&self, scope: Scope) -> Result<(), EvalError> {
        if self.bound.get() {
            self.unbind();
        }
        let value = self.source_expression.evaluate(&scope)?;
        self.target.set(&self.target_property, value);
        *self.scope.borrow_mut() = Some(scope.clone());
        self.bound.set(true);

        match self.mode {
            BindingMode::OneTime => {}
            BindingMode::OneWay | BindingMode::TwoWay => {
                self.source_expression.connect(self, &scope);
            }
        }

        if self.mode == BindingMode::TwoWay {
            self.attach_target_listener();
        }
        Ok(())
    }

    fn unbind(&self) {
        if !self.bound.get() {
            return;
        }
        if let Some(me) = self.self_weak.upgrade() {
            let subscriber: Rc<dyn Subscriber> = me;
            for observer in self.observers.borrow_mut().drain(..) {
                observer.unsubscribe_immediate(Origin::Source, &subscriber);
                observer.unsubscribe_batched(Origin::Source, &subscriber);
            }
        }
        if let Some(handler) = self.target_handler.borrow_mut().take() {
            let event = self.target_event.borrow().clone();
            self.target.remove_event_listener(&event, &handler);
        }
        *self.scope.borrow_mut() = None;
        self.bound.set(false);
    }

    fn is_bound(&self) -> bool {
        self.bound.get()
    }
}

impl Connectable for PropertyBinding {
    fn observe_property(&self, obj: &Obj, key: &str) {
        let Some(me) = self.self_weak.upgrade() else {
            return;
        };
        let observer = self.locator.get_observer(obj, key);
        let subscriber: Rc<dyn Subscriber> = me;
        match self.subscription_kind() {
            SubscriptionKind::Immediate => {
                observer.subscribe_immediate(Origin::Source, subscriber)
            }
            SubscriptionKind::Batched => observer.subscribe_batched(Origin::Source, subscriber),
        }
        let mut observers = self.observers.borrow_mut();
        if !observers.iter().any(|o| Rc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }
}

impl Subscriber for PropertyBinding {
    fn handle_change(&self, origin: Origin, new_value: &Value, old_value: &Value) {
        self.call(origin, new_value, old_value);
    }

    fn handle_batched_change(&self, origin: Origin, old_value: &Value, new_value: &Value) {
        self.call(origin, new_value, old_value);
    }
}

/// Routes the configured target event into `call(Origin::Target, …)`.
struct TargetChangeHandler {
    binding: Weak<PropertyBinding>,
}

impl EventHandler for TargetChangeHandler {
    fn handle_event(&self, _event: &Event) {
        let Some(binding) = self.binding.upgrade() else {
            return;
        };
        let new_value = binding.target.get(&binding.target_property);
        let old_value = binding
            .scope
            .borrow()
            .as_ref()
            .and_then(|scope| binding.source_expression.evaluate(scope).ok())
            .unwrap_or(Value::Undefined);
        binding.call(Origin::Target, &new_value, &old_value);
    }
}
