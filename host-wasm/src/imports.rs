//! The import surface: forwarding functions exposed to the module.
//!
//! Everything here is mechanical composition of the bridge primitives — the
//! handle table, the view cache, the marshalling layer, and the closure
//! bridge — in the handful of call shapes the boundary uses:
//!
//! - handles and primitives in, a primitive or a fresh handle out
//! - optional results as handle 0
//! - string results through the `(ptr, len)` return-pair convention
//! - bulk data as `(ptr, len)` ranges over the current memory views
//! - failure-prone host calls wrapped by the guarded boundary, so the
//!   module sees a failure sentinel plus an exception-slot entry instead of
//!   an unwinding host error
//!
//! Raw `u32` parameters are exactly what the module passes across the
//! boundary; handles are reconstructed with [`Handle::from_raw`].

use std::rc::Rc;

use crate::bridge::Bridge;
use crate::closure::{dispatch_nullary, dispatch_unary, GuestCallback};
use crate::error::BridgeError;
use crate::guest::GuestExports;
use crate::handle::Handle;
use crate::hooks::HostHooks;
use crate::marshal;
use crate::render::debug_render;
use crate::string::HostString;
use crate::value::{HostValue, PlatformObject};

/// Decodes a guest-memory string argument (strict UTF-8).
fn guest_str(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  ptr: u32,
  len: u32,
) -> Result<String, BridgeError> {
  let view = bridge.byte_view(guest.memory());
  Ok(marshal::decode_string(&view, ptr, len)?.to_utf8_lossy())
}

/// Resolves a handle that must name a platform object.
fn platform(bridge: &Bridge, handle: u32) -> Result<Rc<dyn PlatformObject>, BridgeError> {
  match bridge.value(Handle::from_raw(handle))? {
    HostValue::Platform(p) => Ok(p.clone()),
    _ => Err(BridgeError::TypeError("handle does not name a platform object")),
  }
}

// ---------------------------------------------------------------------------
// Bridge intrinsics.
// ---------------------------------------------------------------------------

/// Boxes a guest string into a fresh host-string handle.
pub fn string_new(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  ptr: u32,
  len: u32,
) -> Result<Handle, BridgeError> {
  let view = bridge.byte_view(guest.memory());
  let text = marshal::decode_string(&view, ptr, len)?;
  Ok(bridge.alloc(text.into()))
}

/// Releases the module's reference to a handle.
pub fn object_drop_ref(bridge: &mut Bridge, handle: u32) -> Result<(), BridgeError> {
  bridge.take(Handle::from_raw(handle))?;
  Ok(())
}

/// Registers a second handle aliasing the same host value.
pub fn object_clone_ref(bridge: &mut Bridge, handle: u32) -> Result<Handle, BridgeError> {
  bridge.clone_ref(Handle::from_raw(handle))
}

/// The module's half of the closure-drop protocol: consumes the callback
/// handle and releases the baseline reference.
///
/// Returns `true` when the environment is now dead and the module should
/// free it; `false` when an in-flight invocation still holds it (the
/// destructor will run when that call unwinds).
pub fn callback_drop(bridge: &mut Bridge, handle: u32) -> Result<bool, BridgeError> {
  let callback = bridge.callback(Handle::from_raw(handle))?;
  bridge.release(Handle::from_raw(handle));
  Ok(callback.release())
}

/// Whether the handle names the `undefined` value.
pub fn is_undefined(bridge: &Bridge, handle: u32) -> Result<bool, BridgeError> {
  Ok(matches!(
    bridge.value(Handle::from_raw(handle))?,
    HostValue::Undefined
  ))
}

/// Boolean extraction: 0 for `false`, 1 for `true`, 2 for "not a boolean".
pub fn boolean_get(bridge: &Bridge, handle: u32) -> Result<u32, BridgeError> {
  Ok(match bridge.value(Handle::from_raw(handle))?.as_bool() {
    Some(true) => 1,
    Some(false) => 0,
    None => 2,
  })
}

/// Optional-number extraction through the number return-pair convention.
pub fn number_get(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  ret: u32,
  handle: u32,
) -> Result<(), BridgeError> {
  let value = bridge.value(Handle::from_raw(handle))?.as_number();
  marshal::write_number_return(bridge, guest, ret, value)
}

/// SameValue identity comparison of two handles.
pub fn is_same_value(bridge: &Bridge, a: u32, b: u32) -> Result<bool, BridgeError> {
  let a = bridge.value(Handle::from_raw(a))?;
  let b = bridge.value(Handle::from_raw(b))?;
  Ok(a.same_value(b))
}

/// Renders a handle for diagnostics and returns the text through the string
/// return-pair convention.
pub fn debug_text(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  ret: u32,
  handle: u32,
) -> Result<(), BridgeError> {
  let rendered = debug_render(bridge.value(Handle::from_raw(handle))?);
  marshal::write_str_return(bridge, guest, ret, &HostString::from(rendered.as_str()))
}

/// The module raises a host error with a message from its own memory.
///
/// Always fails: the decoded message becomes a thrown host error value.
pub fn throw(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  ptr: u32,
  len: u32,
) -> Result<(), BridgeError> {
  let message = guest_str(bridge, guest, ptr, len)?;
  Err(BridgeError::Throw(HostValue::error(&message)))
}

/// The module's exception-retrieval path: consumes the exception slot.
///
/// Ownership of the returned handle passes to the module; when no capture
/// is pending this returns the `undefined` sentinel.
pub fn take_exception(bridge: &mut Bridge) -> Handle {
  bridge.take_exception().unwrap_or(Handle::UNDEFINED)
}

// ---------------------------------------------------------------------------
// Console and clock.
// ---------------------------------------------------------------------------

/// Logs the rendered form of a handle.
pub fn console_log(
  bridge: &Bridge,
  hooks: &mut dyn HostHooks,
  handle: u32,
) -> Result<(), BridgeError> {
  let rendered = debug_render(bridge.value(Handle::from_raw(handle))?);
  hooks.console_log(&rendered);
  Ok(())
}

/// Logs the rendered form of a handle at error severity.
pub fn console_error(
  bridge: &Bridge,
  hooks: &mut dyn HostHooks,
  handle: u32,
) -> Result<(), BridgeError> {
  let rendered = debug_render(bridge.value(Handle::from_raw(handle))?);
  hooks.console_error(&rendered);
  Ok(())
}

/// Logs a guest-memory string at error severity, then releases the guest
/// buffer.
///
/// The module hands ownership of the region to the host; the free runs even
/// when decoding fails.
pub fn console_error_str(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  hooks: &mut dyn HostHooks,
  ptr: u32,
  len: u32,
) -> Result<(), BridgeError> {
  let decoded = guest_str(bridge, guest, ptr, len);
  guest.free(ptr, len)?;
  hooks.console_error(&decoded?);
  Ok(())
}

/// Current host time in milliseconds.
pub fn now(hooks: &mut dyn HostHooks) -> f64 {
  hooks.now()
}

// ---------------------------------------------------------------------------
// Timers and frame scheduling (guarded).
// ---------------------------------------------------------------------------

/// Schedules a callback through the host's timer facility.
pub fn set_timeout(
  bridge: &mut Bridge,
  hooks: &mut dyn HostHooks,
  callback: u32,
  delay_ms: f64,
) -> Result<i32, BridgeError> {
  bridge.guarded(|bridge| {
    let callback = bridge.value(Handle::from_raw(callback))?.clone();
    hooks.set_timeout(callback, delay_ms).map_err(BridgeError::Throw)
  })
}

/// Withdraws a scheduled timer.
pub fn clear_timeout(hooks: &mut dyn HostHooks, id: i32) {
  hooks.clear_timeout(id);
}

/// Schedules a callback for the next repaint.
pub fn request_animation_frame(
  bridge: &mut Bridge,
  hooks: &mut dyn HostHooks,
  callback: u32,
) -> Result<i32, BridgeError> {
  bridge.guarded(|bridge| {
    let callback = bridge.value(Handle::from_raw(callback))?.clone();
    hooks
      .request_animation_frame(callback)
      .map_err(BridgeError::Throw)
  })
}

/// Withdraws a repaint callback.
pub fn cancel_animation_frame(
  bridge: &mut Bridge,
  hooks: &mut dyn HostHooks,
  id: i32,
) -> Result<(), BridgeError> {
  bridge.guarded(|_| hooks.cancel_animation_frame(id).map_err(BridgeError::Throw))
}

// ---------------------------------------------------------------------------
// Closure construction.
// ---------------------------------------------------------------------------

/// Wraps a module closure environment as a host-invocable no-argument
/// callback and returns its handle.
pub fn closure_wrapper0(bridge: &mut Bridge, a: u32, b: u32, dtor: u32, shim: u32) -> Handle {
  bridge.alloc(HostValue::Callback(Rc::new(GuestCallback::new(
    a,
    b,
    dtor,
    shim,
    dispatch_nullary,
  ))))
}

/// Wraps a module closure environment as a host-invocable single-argument
/// callback (the event-listener shape) and returns its handle.
pub fn closure_wrapper1(bridge: &mut Bridge, a: u32, b: u32, dtor: u32, shim: u32) -> Handle {
  bridge.alloc(HostValue::Callback(Rc::new(GuestCallback::new(
    a,
    b,
    dtor,
    shim,
    dispatch_unary,
  ))))
}

// ---------------------------------------------------------------------------
// Platform object access (the generated getter/setter/method shapes).
// ---------------------------------------------------------------------------

/// Property read with an optional-handle result: absent properties cross
/// the boundary as handle 0.
pub fn get_property(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
) -> Result<Handle, BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  let object = platform(bridge, obj)?;
  Ok(bridge.alloc_optional(object.property(&name)))
}

/// String-valued property read through the optional string return-pair
/// convention.
pub fn get_property_text(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  ret: u32,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
) -> Result<(), BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  let object = platform(bridge, obj)?;
  match object.property(&name) {
    Some(HostValue::String(text)) => marshal::write_optional_str_return(bridge, guest, ret, Some(&text)),
    Some(_) => Err(BridgeError::TypeError("property value is not a string")),
    None => marshal::write_optional_str_return(bridge, guest, ret, None),
  }
}

/// Property write (guarded: setters may throw).
pub fn set_property(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
  value: u32,
) -> Result<(), BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  bridge.guarded(|bridge| {
    let object = platform(bridge, obj)?;
    let value = bridge.value(Handle::from_raw(value))?.clone();
    object.set_property(&name, value).map_err(BridgeError::Throw)
  })
}

/// Zero-argument method call with an optional-handle result (guarded).
pub fn call_method0(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
) -> Result<Handle, BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  bridge.guarded(|bridge| {
    let object = platform(bridge, obj)?;
    let result = object.call(&name, &[]).map_err(BridgeError::Throw)?;
    Ok(bridge.alloc_optional(Some(result)))
  })
}

/// One-argument method call with an optional-handle result (guarded). The
/// argument handle is borrowed, not consumed.
pub fn call_method1(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
  arg: u32,
) -> Result<Handle, BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  bridge.guarded(|bridge| {
    let object = platform(bridge, obj)?;
    let arg = bridge.value(Handle::from_raw(arg))?.clone();
    let result = object.call(&name, &[arg]).map_err(BridgeError::Throw)?;
    Ok(bridge.alloc_optional(Some(result)))
  })
}

/// Method call passing a guest byte range as a binary buffer argument
/// (guarded). The bulk-data shape: the range is copied out of the current
/// byte view at call time.
pub fn call_method_bytes(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
  ptr: u32,
  len: u32,
) -> Result<Handle, BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  bridge.guarded(|bridge| {
    let object = platform(bridge, obj)?;
    let view = bridge.byte_view(guest.memory());
    let bytes: Rc<[u8]> = marshal::read_bytes(&view, ptr, len)?.to_vec().into();
    let result = object
      .call(&name, &[HostValue::Bytes(bytes)])
      .map_err(BridgeError::Throw)?;
    Ok(bridge.alloc_optional(Some(result)))
  })
}

/// Method call passing a guest f32 range as a number-sequence argument
/// (guarded).
pub fn call_method_f32s(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
  ptr: u32,
  len: u32,
) -> Result<(), BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  bridge.guarded(|bridge| {
    let object = platform(bridge, obj)?;
    let values = {
      let view = bridge.f32_view(guest.memory());
      let range = marshal::read_f32s(&view, ptr, len)?;
      range.iter().map(|v| HostValue::Number(v as f64)).collect()
    };
    object
      .call(&name, &[HostValue::Array(Rc::new(values))])
      .map_err(BridgeError::Throw)?;
    Ok(())
  })
}

/// Platform type-tag check (the `instanceof`-style shape). Non-platform
/// values are simply not instances.
pub fn instance_of(
  bridge: &mut Bridge,
  guest: &dyn GuestExports,
  obj: u32,
  name_ptr: u32,
  name_len: u32,
) -> Result<bool, BridgeError> {
  let name = guest_str(bridge, guest, name_ptr, name_len)?;
  Ok(match bridge.value(Handle::from_raw(obj))? {
    HostValue::Platform(p) => p.type_name() == name,
    _ => false,
  })
}
