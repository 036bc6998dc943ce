use std::fmt;
use std::rc::Rc;

use crate::closure::GuestCallback;
use crate::string::HostString;

/// A host-realm value.
///
/// This is the canonical representation of everything the registry can hold:
/// primitives, host strings, structured data, binary buffers, host errors,
/// module-backed callables, and embedder-owned platform objects. All
/// non-primitive shapes are reference counted so that handles can be cloned
/// cheaply and two handles can observably alias the same object.
#[derive(Clone)]
pub enum HostValue {
  /// The host `undefined` value.
  Undefined,
  /// The host `null` value.
  Null,
  /// A host boolean.
  Bool(bool),
  /// A host number (IEEE-754 double).
  Number(f64),
  /// A host string.
  String(Rc<HostString>),
  /// A host sequence.
  Array(Rc<Vec<HostValue>>),
  /// A plain structured-data object.
  Object(Rc<DataObject>),
  /// A binary buffer (the byte-array shape bulk data crosses the boundary
  /// in).
  Bytes(Rc<[u8]>),
  /// A host error object.
  Error(Rc<ErrorValue>),
  /// A module-backed callable produced by the closure bridge.
  Callback(Rc<GuestCallback>),
  /// An embedder-owned rich object (a DOM node, a graphics context, ...).
  Platform(Rc<dyn PlatformObject>),
}

impl HostValue {
  /// Convenience constructor for a host string value.
  pub fn string(text: &str) -> Self {
    Self::String(Rc::new(HostString::from(text)))
  }

  /// Convenience constructor for a plain host error.
  pub fn error(message: &str) -> Self {
    Self::Error(Rc::new(ErrorValue::new(message)))
  }

  /// Whether this value is `undefined` or `null`.
  ///
  /// Optional-return import shapes collapse both to the absent sentinel.
  pub fn is_like_none(&self) -> bool {
    matches!(self, Self::Undefined | Self::Null)
  }

  /// The number payload, if this value is a number.
  pub fn as_number(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      _ => None,
    }
  }

  /// The boolean payload, if this value is a boolean.
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      _ => None,
    }
  }

  /// SameValue semantics.
  ///
  /// This differs from IEEE `==` for numbers:
  /// - `NaN` is the same as `NaN`
  /// - `+0` and `-0` are distinct
  ///
  /// Strings compare by code units; every other non-primitive shape compares
  /// by reference identity.
  pub fn same_value(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Undefined, Self::Undefined) => true,
      (Self::Null, Self::Null) => true,
      (Self::Bool(a), Self::Bool(b)) => a == b,
      (Self::Number(a), Self::Number(b)) => {
        if a.is_nan() && b.is_nan() {
          return true;
        }
        if *a == 0.0 && *b == 0.0 {
          // Distinguish +0 and -0.
          return a.to_bits() == b.to_bits();
        }
        a == b
      }
      (Self::String(a), Self::String(b)) => a == b,
      (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
      (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
      (Self::Bytes(a), Self::Bytes(b)) => Rc::ptr_eq(a, b),
      (Self::Error(a), Self::Error(b)) => Rc::ptr_eq(a, b),
      (Self::Callback(a), Self::Callback(b)) => Rc::ptr_eq(a, b),
      (Self::Platform(a), Self::Platform(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl fmt::Debug for HostValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Undefined => f.write_str("Undefined"),
      Self::Null => f.write_str("Null"),
      Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
      Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
      Self::String(s) => f.debug_tuple("String").field(&s.to_utf8_lossy()).finish(),
      Self::Array(items) => f.debug_tuple("Array").field(&items.len()).finish(),
      Self::Object(obj) => f.debug_tuple("Object").field(&obj.len()).finish(),
      Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
      Self::Error(e) => f.debug_tuple("Error").field(&e.message).finish(),
      Self::Callback(_) => f.write_str("Callback"),
      Self::Platform(p) => f.debug_tuple("Platform").field(&p.type_name()).finish(),
    }
  }
}

impl From<bool> for HostValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<f64> for HostValue {
  fn from(value: f64) -> Self {
    Self::Number(value)
  }
}

impl From<HostString> for HostValue {
  fn from(value: HostString) -> Self {
    Self::String(Rc::new(value))
  }
}

/// A plain structured-data object with insertion-ordered entries.
///
/// This is deliberately not a hash map: the bridge's data objects are small,
/// and insertion order keeps diagnostic rendering deterministic.
#[derive(Debug, Default)]
pub struct DataObject {
  entries: Vec<(String, HostValue)>,
}

impl DataObject {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts or replaces an entry. Replacement keeps the original position.
  pub fn insert(&mut self, key: &str, value: HostValue) {
    match self.entries.iter_mut().find(|(k, _)| k.as_str() == key) {
      Some(entry) => entry.1 = value,
      None => self.entries.push((key.to_string(), value)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&HostValue> {
    self
      .entries
      .iter()
      .find(|(k, _)| k.as_str() == key)
      .map(|(_, v)| v)
  }

  pub fn entries(&self) -> impl Iterator<Item = (&str, &HostValue)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// A host error object: name, message, and a stack rendering.
#[derive(Debug, Clone)]
pub struct ErrorValue {
  pub name: String,
  pub message: String,
  pub stack: String,
}

impl ErrorValue {
  /// A plain `Error` with a synthesized stack.
  pub fn new(message: &str) -> Self {
    Self::with_name("Error", message)
  }

  pub fn with_name(name: &str, message: &str) -> Self {
    Self {
      name: name.to_string(),
      message: message.to_string(),
      stack: format!("{name}: {message}"),
    }
  }
}

/// An embedder-owned rich host object.
///
/// The bridge never looks inside platform objects; it only forwards to this
/// narrow seam, so embedders can back it with whatever object model they
/// have (a real DOM, a test double, a recording fake). `Err` results from
/// [`PlatformObject::set_property`] and [`PlatformObject::call`] are host
/// throws and feed the guarded call boundary.
pub trait PlatformObject {
  /// The object's type tag, used for diagnostics rendering and
  /// instance-of-style checks.
  fn type_name(&self) -> &str;

  /// Reads a property. `None` maps to the absent sentinel in
  /// optional-return import shapes.
  fn property(&self, name: &str) -> Option<HostValue> {
    let _ = name;
    None
  }

  /// Writes a property. Implementations use interior mutability; the bridge
  /// shares platform objects behind `Rc`.
  fn set_property(&self, name: &str, value: HostValue) -> Result<(), HostValue> {
    let _ = value;
    Err(HostValue::error(&format!(
      "cannot set property '{name}' on {}",
      self.type_name()
    )))
  }

  /// Invokes a method. `Err` is a thrown host value.
  fn call(&self, method: &str, args: &[HostValue]) -> Result<HostValue, HostValue> {
    let _ = args;
    Err(HostValue::error(&format!(
      "{}.{method} is not a function",
      self.type_name()
    )))
  }
}
