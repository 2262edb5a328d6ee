/*
 * Scope
 *
 * Two-level name resolution: a binding context (the view model) layered under
 * an override context (synthetic bindings such as `$index`). Override
 * contexts chain through parents; resolution walks the chain checking each
 * level's synthetic properties before its binding context, nearest scope
 * wins.
 */

use std::rc::Rc;

use crate::values::{Obj, Value};

/// Synthetic bindings layered over a binding context, with an optional parent
/// level. Structurally immutable once created; the synthetic property bag is
/// an ordinary object, so its properties can themselves be observed.
pub struct OverrideContext {
    binding_context: Value,
    parent: Option<Rc<OverrideContext>>,
    properties: Obj,
}

impl OverrideContext {
    pub fn new(binding_context: Value) -> Rc<OverrideContext> {
        Rc::new(OverrideContext {
            binding_context,
            parent: None,
            properties: Obj::new(),
        })
    }

    pub fn with_parent(
        binding_context: Value,
        parent: Rc<OverrideContext>,
    ) -> Rc<OverrideContext> {
        Rc::new(OverrideContext {
            binding_context,
            parent: Some(parent),
            properties: Obj::new(),
        })
    }

    pub fn binding_context(&self) -> &Value {
        &self.binding_context
    }

    pub fn parent(&self) -> Option<&Rc<OverrideContext>> {
        self.parent.as_ref()
    }

    /// The synthetic property bag for this level.
    pub fn properties(&self) -> &Obj {
        &self.properties
    }

    pub fn set(&self, name: &str, value: Value) {
        self.properties.set(name, value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.has(name)
    }

    pub fn remove(&self, name: &str) {
        self.properties.remove(name);
    }
}

/// The resolution record a binding activates against. A new scope is created
/// per activation; expressions receive it as a parameter and never store it.
#[derive(Clone)]
pub struct Scope {
    pub binding_context: Value,
    pub override_context: Rc<OverrideContext>,
}

impl Scope {
    pub fn new(binding_context: Value) -> Scope {
        Scope {
            override_context: OverrideContext::new(binding_context.clone()),
            binding_context,
        }
    }

    pub fn from_override(override_context: Rc<OverrideContext>) -> Scope {
        Scope {
            binding_context: override_context.binding_context().clone(),
            override_context,
        }
    }

    /// Child scope layered over this one, as a repeater creates per item.
    pub fn child(&self, binding_context: Value) -> Scope {
        Scope {
            override_context: OverrideContext::with_parent(
                binding_context.clone(),
                self.override_context.clone(),
            ),
            binding_context,
        }
    }
}

/// The override context `ancestor` hops up from the scope's own level.
pub fn ancestor_override(scope: &Scope, ancestor: usize) -> Option<Rc<OverrideContext>> {
    let mut current = scope.override_context.clone();
    for _ in 0..ancestor {
        current = current.parent()?.clone();
    }
    Some(current)
}

/// Resolve the context object a name lives on.
///
/// With an explicit ancestor hop the indicated level answers directly:
/// its synthetic properties if they declare the name, its binding context
/// otherwise. Without one, the chain is searched from the nearest level
/// outward, and the scope's own binding context is the fallback when nothing
/// declares the name.
pub fn get_context(scope: &Scope, name: &str, ancestor: usize) -> Value {
    if ancestor > 0 {
        let Some(level) = ancestor_override(scope, ancestor) else {
            return Value::Undefined;
        };
        if level.has(name) {
            return Value::Object(level.properties().clone());
        }
        return level.binding_context().clone();
    }

    let mut current = Some(scope.override_context.clone());
    while let Some(level) = current {
        if level.has(name) {
            return Value::Object(level.properties().clone());
        }
        if let Value::Object(obj) = level.binding_context() {
            if obj.has(name) {
                return level.binding_context().clone();
            }
        }
        current = level.parent().cloned();
    }
    scope.binding_context.clone()
}
