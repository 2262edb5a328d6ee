/*
 * Listener
 *
 * Wires a target event to an action expression. The event is exposed to the
 * expression as `$event`; unless the expression evaluates to `true`, the
 * event's default action is prevented, the escape hatch for handlers that
 * manage submission or navigation themselves.
 */

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::binding::scope::Scope;
use crate::binding::Binding;
use crate::error::EvalError;
use crate::expression_parser::ast::Expression;
use crate::values::{Event, EventHandler, Obj, Value};

pub struct Listener {
    event_name: String,
    target: Obj,
    source_expression: Rc<Expression>,
    scope: RefCell<Option<Scope>>,
    bound: Cell<bool>,
    self_weak: Weak<Listener>,
}

impl Listener {
    pub fn new(
        event_name: impl Into<String>,
        target: Obj,
        source_expression: Rc<Expression>,
    ) -> Rc<Listener> {
        Rc::new_cyclic(|self_weak| Listener {
            event_name: event_name.into(),
            target,
            source_expression,
            scope: RefCell::new(None),
            bound: Cell::new(false),
            self_weak: self_weak.clone(),
        })
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }
}

impl Binding for Listener {
    fn bind(&self, scope: Scope) -> Result<(), EvalError> {
        if self.bound.get() {
            self.unbind();
        }
        *self.scope.borrow_mut() = Some(scope);
        if let Some(me) = self.self_weak.upgrade() {
            let handler: Rc<dyn EventHandler> = me;
            self.target.add_event_listener(&self.event_name, handler);
        }
        self.bound.set(true);
        Ok(())
    }

    fn unbind(&self) {
        if !self.bound.get() {
            return;
        }
        if let Some(me) = self.self_weak.upgrade() {
            let handler: Rc<dyn EventHandler> = me;
            self.target.remove_event_listener(&self.event_name, &handler);
        }
        *self.scope.borrow_mut() = None;
        self.bound.set(false);
    }

    fn is_bound(&self) -> bool {
        self.bound.get()
    }
}

impl EventHandler for Listener {
    fn handle_event(&self, event: &Event) {
        if !self.bound.get() {
            return;
        }
        let scope = self.scope.borrow().clone();
        let Some(scope) = scope else {
            return;
        };

        let event_view = Obj::from_pairs([
            ("type", Value::string(event.event_type())),
            ("detail", event.detail()),
        ]);
        scope.override_context.set("$event", Value::Object(event_view));
        let result = self.source_expression.evaluate(&scope);
        scope.override_context.remove("$event");

        match result {
            Ok(value) => {
                if value != Value::Boolean(true) {
                    event.prevent_default();
                }
            }
            Err(error) => {
                warn!(
                    error = %error,
                    event = %self.event_name,
                    "listener expression failed"
                );
                event.prevent_default();
            }
        }
    }
}
