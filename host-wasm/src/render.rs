use itertools::Itertools;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::value::HostValue;

/// Best-effort human-readable rendering of an arbitrary host value.
///
/// Used by the diagnostics import the module calls when formatting opaque
/// handles. This must never fail: unserializable structured data falls back
/// to a generic marker.
///
/// - numbers and booleans render literally, `undefined`/`null` by name
/// - strings render quoted
/// - callables render as `Function(name)` or `Function`
/// - sequences render recursively with comma separation
/// - plain data objects render as their JSON serialization when possible
/// - errors render as `name: message` followed by the stack
/// - anything else renders via its type tag
pub fn debug_render(value: &HostValue) -> String {
  match value {
    HostValue::Undefined => "undefined".to_string(),
    HostValue::Null => "null".to_string(),
    HostValue::Bool(b) => b.to_string(),
    HostValue::Number(n) => render_number(*n),
    HostValue::String(s) => format!("\"{}\"", s.to_utf8_lossy()),
    HostValue::Callback(_) => "Function".to_string(),
    HostValue::Array(items) => {
      format!("[{}]", items.iter().map(debug_render).join(", "))
    }
    HostValue::Object(_) => match serde_json::to_string(&Json(value)) {
      Ok(json) => format!("Object({json})"),
      Err(_) => "Object".to_string(),
    },
    HostValue::Bytes(_) => "Uint8Array".to_string(),
    HostValue::Error(e) => format!("{}: {}\n{}", e.name, e.message, e.stack),
    HostValue::Platform(p) => {
      // Callable platform objects get the function rendering, with their
      // name when they expose a non-empty one.
      if p.type_name() == "Function" {
        match p.property("name") {
          Some(HostValue::String(name)) if !name.is_empty() => {
            format!("Function({})", name.to_utf8_lossy())
          }
          _ => "Function".to_string(),
        }
      } else {
        p.type_name().to_string()
      }
    }
  }
}

fn render_number(n: f64) -> String {
  if n == 0.0 {
    // Both zeroes render as "0".
    "0".to_string()
  } else if n.is_infinite() {
    if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
  } else {
    n.to_string()
  }
}

/// JSON projection of a host value for the structured-data render branch.
///
/// Mirrors host JSON semantics: `undefined` and callables disappear from
/// objects and become `null` in sequences, non-finite numbers become
/// `null`, errors serialize as empty objects.
struct Json<'a>(&'a HostValue);

impl Serialize for Json<'_> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self.0 {
      HostValue::Undefined | HostValue::Null => serializer.serialize_unit(),
      HostValue::Bool(b) => serializer.serialize_bool(*b),
      HostValue::Number(n) => {
        if !n.is_finite() {
          serializer.serialize_unit()
        } else if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
          // Integral numbers serialize without a fractional part, the way
          // the host realm's own JSON does.
          serializer.serialize_i64(*n as i64)
        } else {
          serializer.serialize_f64(*n)
        }
      }
      HostValue::String(s) => serializer.serialize_str(&s.to_utf8_lossy()),
      HostValue::Array(items) => {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
          seq.serialize_element(&Json(item))?;
        }
        seq.end()
      }
      HostValue::Bytes(bytes) => {
        let mut seq = serializer.serialize_seq(Some(bytes.len()))?;
        for byte in bytes.iter() {
          seq.serialize_element(byte)?;
        }
        seq.end()
      }
      HostValue::Object(obj) => {
        let entries = obj
          .entries()
          .filter(|(_, value)| !matches!(
            value,
            HostValue::Undefined | HostValue::Callback(_) | HostValue::Platform(_)
          ))
          .collect::<Vec<_>>();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
          map.serialize_entry(key, &Json(value))?;
        }
        map.end()
      }
      // Error objects have no serializable own properties.
      HostValue::Error(_) => serializer.serialize_map(Some(0))?.end(),
      // Unreachable through object/sequence recursion (filtered or nulled
      // above); kept total so top-level misuse still renders something.
      HostValue::Callback(_) | HostValue::Platform(_) => serializer.serialize_unit(),
    }
  }
}
