use std::cell::Ref;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::guest::GuestExports;
use crate::memory::{ByteView, F32Slice, F32View, I32Slice, I32View};
use crate::string::HostString;

/// A region of module memory: byte offset plus byte length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuestSlice {
  pub ptr: u32,
  pub len: u32,
}

fn at(ptr: u32, offset: u32) -> Result<u32, BridgeError> {
  ptr.checked_add(offset).ok_or(BridgeError::OutOfBounds {
    offset: ptr as u64,
    len: offset as u64,
  })
}

/// Decodes `len` bytes at `ptr` as strict UTF-8.
///
/// Invalid bytes fail with [`BridgeError::Encoding`]; there is no lossy
/// fallback on this path.
pub fn decode_string(view: &ByteView, ptr: u32, len: u32) -> Result<HostString, BridgeError> {
  let bytes = view.read(ptr, len)?;
  HostString::from_utf8(&bytes)
}

/// Encodes `text` into module memory using the module's allocator and
/// reallocator exports.
///
/// Two-path strategy:
/// - **Fast path**: allocate one byte per UTF-16 code unit and copy ASCII
///   units directly, one byte each, until the first non-ASCII unit or the
///   end of the string.
/// - **Slow path**: on a non-ASCII unit at position `k`, issue a single
///   `realloc` growing the region to `k + remaining_units * 3` (the UTF-8
///   worst case for the rest of the string), then encode the remaining
///   suffix in one shot. Unpaired surrogates encode as U+FFFD, which stays
///   within the same bound.
///
/// The returned length is always the exact number of bytes written, never
/// the allocation size. An all-ASCII string never reallocates.
pub fn encode_string(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  text: &HostString,
) -> Result<GuestSlice, BridgeError> {
  let units = text.as_code_units();
  let len = units.len() as u32;
  let mut ptr = guest.alloc(len)?;

  // The allocation may have grown memory; fetch the view afterwards.
  let view = bridge.byte_view(guest.memory());

  let mut offset: u32 = 0;
  for &unit in units {
    if unit > 0x7F {
      break;
    }
    view.store(at(ptr, offset)?, unit as u8)?;
    offset += 1;
  }

  if (offset as usize) != units.len() {
    let remaining = len - offset;
    let grown = at(offset, remaining.saturating_mul(3))?;
    tracing::trace!(
      target: "host_wasm::marshal",
      ascii_prefix = offset,
      remaining_units = remaining,
      "utf-8 slow path reallocation"
    );
    ptr = guest.realloc(ptr, len, grown)?;

    // The reallocator preserves the ASCII prefix and may have grown memory.
    let view = bridge.byte_view(guest.memory());
    let suffix = String::from_utf16_lossy(&units[offset as usize..]);
    view.write(at(ptr, offset)?, suffix.as_bytes())?;
    offset = at(offset, suffix.len() as u32)?;
  }

  Ok(GuestSlice { ptr, len: offset })
}

/// Encodes `text` in one pass into an allocation sized to the exact encoded
/// byte length.
///
/// This is the strategy for call sites without a reallocator: encode first,
/// then allocate and copy.
pub fn encode_string_exact(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  text: &HostString,
) -> Result<GuestSlice, BridgeError> {
  let encoded = String::from_utf16_lossy(text.as_code_units());
  let bytes = encoded.as_bytes();
  let ptr = guest.alloc(bytes.len() as u32)?;
  let view = bridge.byte_view(guest.memory());
  view.write(ptr, bytes)?;
  Ok(GuestSlice {
    ptr,
    len: bytes.len() as u32,
  })
}

/// Zero-copy byte range at `[ptr, ptr + len)`.
///
/// The guard borrows the current buffer; drop it before the next operation
/// that could grow memory.
pub fn read_bytes<'a>(
  view: &'a ByteView,
  ptr: u32,
  len: u32,
) -> Result<Ref<'a, [u8]>, BridgeError> {
  view.read(ptr, len)
}

/// Zero-copy i32 range at element span `[ptr / 4, ptr / 4 + len)`.
pub fn read_i32s<'a>(view: &'a I32View, ptr: u32, len: u32) -> Result<I32Slice<'a>, BridgeError> {
  view.slice(ptr / 4, len)
}

/// Zero-copy f32 range at element span `[ptr / 4, ptr / 4 + len)`.
pub fn read_f32s<'a>(view: &'a F32View, ptr: u32, len: u32) -> Result<F32Slice<'a>, BridgeError> {
  view.slice(ptr / 4, len)
}

/// Writes the `(ptr, len)` pair of an encoded string into the module's
/// return area at i32 slots `ret / 4` and `ret / 4 + 1`.
///
/// This is the multi-value return convention for string-valued imports.
pub fn write_str_return(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  ret: u32,
  text: &HostString,
) -> Result<(), BridgeError> {
  let slice = encode_string(bridge, guest, text)?;
  let i32s = bridge.i32_view(guest.memory());
  i32s.store(ret / 4 + 1, slice.len as i32)?;
  i32s.store(ret / 4, slice.ptr as i32)?;
  Ok(())
}

/// Like [`write_str_return`], with absent strings written as a zero
/// pointer (the optional-string convention; the module checks the pointer
/// before the length).
pub fn write_optional_str_return(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  ret: u32,
  text: Option<&HostString>,
) -> Result<(), BridgeError> {
  match text {
    Some(text) => write_str_return(bridge, guest, ret, text),
    None => {
      let i32s = bridge.i32_view(guest.memory());
      i32s.store(ret / 4 + 1, 0)?;
      i32s.store(ret / 4, 0)?;
      Ok(())
    }
  }
}

/// Writes an optional number into the module's return area: the presence
/// flag at i32 slot `ret / 4`, the payload at f64 slot `ret / 8 + 1`.
pub fn write_number_return(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  ret: u32,
  value: Option<f64>,
) -> Result<(), BridgeError> {
  let f64s = bridge.f64_view(guest.memory());
  f64s.store(ret / 8 + 1, value.unwrap_or(0.0))?;
  let i32s = bridge.i32_view(guest.memory());
  i32s.store(ret / 4, value.is_some() as i32)?;
  Ok(())
}
