use std::fmt;

use crate::error::BridgeError;

/// A host-realm string value.
///
/// The host realm's native string representation is a sequence of UTF-16
/// code units, and the marshalling layer's fast/slow path split is defined
/// in terms of those units, so the bridge stores them directly rather than
/// round-tripping through `String`.
#[derive(Clone)]
pub struct HostString {
  units: Box<[u16]>,
}

impl HostString {
  pub fn from_code_units(units: &[u16]) -> Self {
    Self::from_u16_vec(units.to_vec())
  }

  pub fn from_u16_vec(mut units: Vec<u16>) -> Self {
    // Prefer an exact-sized backing allocation (avoid spare capacity).
    units.shrink_to_fit();
    Self {
      units: units.into_boxed_slice(),
    }
  }

  /// Strict UTF-8 ingestion. Invalid bytes are a hard
  /// [`BridgeError::Encoding`] failure, never a lossy substitution.
  pub fn from_utf8(bytes: &[u8]) -> Result<Self, BridgeError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(Self::from(text))
  }

  pub fn len_code_units(&self) -> usize {
    self.units.len()
  }

  pub fn is_empty(&self) -> bool {
    self.units.is_empty()
  }

  pub fn as_code_units(&self) -> &[u16] {
    self.units.as_ref()
  }

  /// Lossy UTF-8 conversion for display and diagnostics. Unpaired surrogate
  /// code units become U+FFFD.
  pub fn to_utf8_lossy(&self) -> String {
    String::from_utf16_lossy(self.as_code_units())
  }
}

impl From<&str> for HostString {
  fn from(text: &str) -> Self {
    Self::from_u16_vec(text.encode_utf16().collect())
  }
}

impl PartialEq for HostString {
  fn eq(&self, other: &Self) -> bool {
    self.units == other.units
  }
}

impl Eq for HostString {}

impl fmt::Debug for HostString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // `String` cannot represent lone surrogates; use a lossy conversion so
    // Debug never panics.
    f.debug_struct("HostString")
      .field("len_code_units", &self.len_code_units())
      .field("utf8_lossy", &self.to_utf8_lossy())
      .finish()
  }
}
