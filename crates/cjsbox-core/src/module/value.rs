//! Exports values.
//!
//! Compound values (`Object`, `Array`, `Host`) are shared handles: cloning
//! a `Value` clones the handle, so every holder observes the same mutations.
//! This is what lets a circular require see a partially filled exports
//! object fill in later. It also means exports graphs can be cyclic, so
//! every recursive walk (`Debug`, `to_json`) tracks the handles it is
//! currently inside.

use indexmap::IndexMap;
use serde_json::Value as Json;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identity of a compound value's shared allocation.
type HandleId = *const ();

/// A value a module can export.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Array),
    Object(Object),
    /// Opaque value owned by the executor (functions, classes, ...).
    Host(Rc<dyn Any>),
}

impl Value {
    /// A fresh, empty object.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Object::new())
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Downcast a host value.
    #[must_use]
    pub fn as_host<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Host(h) => h.downcast_ref(),
            _ => None,
        }
    }

    /// Strict identity: handle identity for compound values, value
    /// equality for primitives (`NaN` is never the same as itself).
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.same(b),
            (Self::Object(a), Self::Object(b)) => a.same(b),
            (Self::Host(a), Self::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convert to JSON. Host values and `undefined` become `null`;
    /// non-finite numbers become `null`; a reference back to an enclosing
    /// object or array becomes `null`.
    #[must_use]
    pub fn to_json(&self) -> Json {
        self.to_json_within(&mut Vec::new())
    }

    fn to_json_within(&self, open: &mut Vec<HandleId>) -> Json {
        match self {
            Self::Undefined | Self::Null | Self::Host(_) => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Json::String(s.to_string()),
            Self::Array(a) => {
                if open.contains(&a.id()) {
                    return Json::Null;
                }
                open.push(a.id());
                let items = a.0.borrow().iter().map(|v| v.to_json_within(open)).collect();
                open.pop();
                Json::Array(items)
            }
            Self::Object(o) => {
                if open.contains(&o.id()) {
                    return Json::Null;
                }
                open.push(o.id());
                let entries = o
                    .0
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_within(open)))
                    .collect();
                open.pop();
                Json::Object(entries)
            }
        }
    }
}

/// Integral numbers in the exactly representable range are emitted as
/// JSON integers.
#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> Json {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = RefCell::new(Vec::new());
        Guarded { value: self, open: &open }.fmt(f)
    }
}

/// Debug view that prints `[Circular]` instead of re-entering a handle it
/// is already inside.
struct Guarded<'a> {
    value: &'a Value,
    open: &'a RefCell<Vec<HandleId>>,
}

impl Guarded<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Guarded<'b> {
        Guarded {
            value,
            open: self.open,
        }
    }

    fn enter(&self, id: HandleId) -> bool {
        let mut open = self.open.borrow_mut();
        if open.contains(&id) {
            return false;
        }
        open.push(id);
        true
    }

    fn leave(&self) {
        self.open.borrow_mut().pop();
    }
}

impl fmt::Debug for Guarded<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Host(_) => f.write_str("[host]"),
            Value::Array(a) => {
                if !self.enter(a.id()) {
                    return f.write_str("[Circular]");
                }
                let items = a.0.borrow();
                let result = f.debug_list().entries(items.iter().map(|v| self.child(v))).finish();
                self.leave();
                result
            }
            Value::Object(o) => {
                if !self.enter(o.id()) {
                    return f.write_str("[Circular]");
                }
                let entries = o.0.borrow();
                let result = f
                    .debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, self.child(v))))
                    .finish();
                self.leave();
                result
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::from(s),
            Json::Array(items) => Self::Array(Array::from_values(
                items.into_iter().map(Self::from).collect(),
            )),
            Json::Object(entries) => {
                let object = Object::new();
                for (k, v) in entries {
                    object.set(k, Self::from(v));
                }
                Self::Object(object)
            }
        }
    }
}

/// Shared, mutable object. Keys keep insertion order; overwriting a key
/// keeps its position.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<IndexMap<String, Value>>>);

impl Object {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn id(&self) -> HandleId {
        Rc::as_ptr(&self.0).cast()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Value::Object(self.clone()).fmt(f)
    }
}

/// Shared, mutable array.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_values(values: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn id(&self) -> HandleId {
        Rc::as_ptr(&self.0).cast()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Value::Array(self.clone()).fmt(f)
    }
}
