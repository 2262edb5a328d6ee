/*
 * Value Model
 *
 * The dynamic value universe the binding language operates on. Objects are
 * reference-identity property bags; reads and writes route through an attached
 * property observer once one is observing the key, which is how property
 * interception is expressed without runtime descriptor mutation.
 */

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::observation::PropertyObserver;

/// A dynamic value: the union of everything a binding expression can produce.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Obj),
    Function(NativeFunction),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness: `false`, `0`, `NaN`, the empty string, `null` and
    /// `undefined` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Numeric coercion. Reference types coerce to NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// String coercion.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(elements) => {
                let elements = elements.borrow();
                elements
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.to_string_value(),
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            }
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "function".to_string(),
        }
    }

    /// Loose equality: strict equality plus the `null == undefined` pair and
    /// number/string numeric comparison. Reference types never loosely equal
    /// primitives.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(n), Value::Str(_)) => *n == other.to_number(),
            (Value::Str(_), Value::Number(n)) => self.to_number() == *n,
            (Value::Boolean(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Value::Boolean(_)) => self.loose_eq(&Value::Number(other.to_number())),
            _ => self == other,
        }
    }
}

/// Strict equality: primitives by value, reference types by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(elements) => match elements.try_borrow() {
                Ok(elements) => f.debug_list().entries(elements.iter()).finish(),
                Err(_) => write!(f, "[<borrowed>]"),
            },
            Value::Object(obj) => obj.fmt(f),
            Value::Function(_) => write!(f, "[function]"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::string(s)
    }
}

/// Format a number the way template output expects: integral values without a
/// fraction, `NaN`/`Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        format!("{}", n)
    }
}

/// A callable value: receiver plus positional arguments.
#[derive(Clone)]
pub struct NativeFunction(Rc<dyn Fn(&Value, &[Value]) -> Value>);

impl NativeFunction {
    pub fn new(f: impl Fn(&Value, &[Value]) -> Value + 'static) -> Self {
        NativeFunction(Rc::new(f))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        (self.0)(this, args)
    }

    fn ptr_eq(&self, other: &NativeFunction) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction")
    }
}

/// An event dispatched against an object's listeners.
pub struct Event {
    event_type: String,
    detail: Value,
    default_prevented: Cell<bool>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, detail: Value) -> Self {
        Event {
            event_type: event_type.into(),
            detail,
            default_prevented: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn detail(&self) -> Value {
        self.detail.clone()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// Receiver of dispatched events. Listener bindings implement this.
pub trait EventHandler {
    fn handle_event(&self, event: &Event);
}

pub(crate) struct FrozenObject;

struct ObjectData {
    properties: IndexMap<String, Value>,
    observers: HashMap<String, Weak<PropertyObserver>>,
    listeners: HashMap<String, Vec<Rc<dyn EventHandler>>>,
    frozen: bool,
}

/// A reference-identity dynamic object. Cloning an `Obj` clones the handle,
/// not the object.
#[derive(Clone)]
pub struct Obj {
    inner: Rc<RefCell<ObjectData>>,
}

impl Obj {
    pub fn new() -> Obj {
        Obj {
            inner: Rc::new(RefCell::new(ObjectData {
                properties: IndexMap::new(),
                observers: HashMap::new(),
                listeners: HashMap::new(),
                frozen: false,
            })),
        }
    }

    /// Build an object from key/value pairs.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Obj {
        let obj = Obj::new();
        {
            let mut data = obj.inner.borrow_mut();
            for (key, value) in pairs {
                data.properties.insert(key.into(), value);
            }
        }
        obj
    }

    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Allocation identity, used to key observer registries.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub fn downgrade(&self) -> WeakObj {
        WeakObj(Rc::downgrade(&self.inner))
    }

    /// Read a property. Routes through the attached observer when one is
    /// observing this key.
    pub fn get(&self, key: &str) -> Value {
        if let Some(observer) = self.observing_observer(key) {
            return observer.get_value();
        }
        self.get_raw(key)
    }

    /// Write a property. Routes through the attached observer when one is
    /// observing this key; ignored on frozen objects.
    pub fn set(&self, key: &str, value: Value) {
        if self.is_frozen() {
            return;
        }
        if let Some(observer) = self.observing_observer(key) {
            observer.set_value(value);
            return;
        }
        self.set_raw(key, value);
    }

    pub fn has(&self, key: &str) -> bool {
        if self.observing_observer(key).is_some() {
            return true;
        }
        self.inner.borrow().properties.contains_key(key)
    }

    /// Remove a plain property. Keys under observation are left to their
    /// observer's lifecycle.
    pub fn remove(&self, key: &str) {
        let mut data = self.inner.borrow_mut();
        if data.frozen {
            return;
        }
        data.properties.shift_remove(key);
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().properties.keys().cloned().collect()
    }

    /// Freeze the property table. Subsequent writes are ignored and observer
    /// restoration becomes a reported diagnostic.
    pub fn freeze(&self) {
        self.inner.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.borrow().frozen
    }

    pub(crate) fn get_raw(&self, key: &str) -> Value {
        self.inner
            .borrow()
            .properties
            .get(key)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub(crate) fn set_raw(&self, key: &str, value: Value) -> bool {
        let mut data = self.inner.borrow_mut();
        if data.frozen {
            return false;
        }
        data.properties.insert(key.to_string(), value);
        true
    }

    /// Move the property's value into the observer and register the observer
    /// as the interception point for the key.
    pub(crate) fn attach_observer(
        &self,
        key: &str,
        observer: Weak<PropertyObserver>,
    ) -> Result<(bool, Value), FrozenObject> {
        let mut data = self.inner.borrow_mut();
        if data.frozen {
            return Err(FrozenObject);
        }
        let existing = data.properties.shift_remove(key);
        let existed = existing.is_some();
        let value = existing.unwrap_or(Value::Undefined);
        data.observers.insert(key.to_string(), observer);
        Ok((existed, value))
    }

    /// Detach the observer for the key and restore the plain property:
    /// `Some(value)` reinstates a data entry, `None` removes the key.
    pub(crate) fn restore_property(
        &self,
        key: &str,
        restored: Option<Value>,
    ) -> Result<(), FrozenObject> {
        let mut data = self.inner.borrow_mut();
        data.observers.remove(key);
        if data.frozen {
            return Err(FrozenObject);
        }
        match restored {
            Some(value) => {
                data.properties.insert(key.to_string(), value);
            }
            None => {
                data.properties.shift_remove(key);
            }
        }
        Ok(())
    }

    fn observing_observer(&self, key: &str) -> Option<Rc<PropertyObserver>> {
        let data = self.inner.borrow();
        let observer = data.observers.get(key)?.upgrade()?;
        drop(data);
        if observer.is_observing() {
            Some(observer)
        } else {
            None
        }
    }

    pub fn add_event_listener(&self, event_type: &str, handler: Rc<dyn EventHandler>) {
        self.inner
            .borrow_mut()
            .listeners
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    pub fn remove_event_listener(&self, event_type: &str, handler: &Rc<dyn EventHandler>) {
        let mut data = self.inner.borrow_mut();
        if let Some(handlers) = data.listeners.get_mut(event_type) {
            handlers.retain(|h| !Rc::ptr_eq(h, handler));
        }
    }

    /// Dispatch an event to the listeners registered for its type, in
    /// registration order. Listeners added or removed by a handler take
    /// effect from the next dispatch.
    pub fn dispatch_event(&self, event: &Event) {
        let handlers: Vec<Rc<dyn EventHandler>> = {
            let data = self.inner.borrow();
            data.listeners
                .get(event.event_type())
                .cloned()
                .unwrap_or_default()
        };
        for handler in handlers {
            handler.handle_event(event);
        }
    }
}

impl Default for Obj {
    fn default() -> Self {
        Obj::new()
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(data) => write!(f, "Obj{:?}", data.properties.keys().collect::<Vec<_>>()),
            Err(_) => write!(f, "Obj(<borrowed>)"),
        }
    }
}

/// Weak handle to an object; observers hold their owner this way.
#[derive(Clone, Default)]
pub struct WeakObj(Weak<RefCell<ObjectData>>);

impl WeakObj {
    pub fn new() -> WeakObj {
        WeakObj(Weak::new())
    }

    pub fn upgrade(&self) -> Option<Obj> {
        self.0.upgrade().map(|inner| Obj { inner })
    }
}
