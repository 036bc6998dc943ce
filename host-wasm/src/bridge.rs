use std::rc::Rc;

use crate::closure::GuestCallback;
use crate::error::BridgeError;
use crate::handle::{Handle, Sentinel};
use crate::memory::{ByteView, F32View, F64View, I32View, LinearMemory, ViewCache};
use crate::table::HandleTable;
use crate::value::HostValue;

/// The host side of the module/host boundary.
///
/// Owns the three pieces of state every import shape touches:
/// - the [`HandleTable`] naming host values for the module,
/// - the [`ViewCache`] of typed windows over the module's linear memory,
/// - the exception slot holding the most recently captured host throw.
///
/// The bridge is purely synchronous: it performs no scheduling and no
/// blocking of its own, it is only invoked at call/return boundaries. It
/// may be reentered from module code running under a closure shim.
pub struct Bridge {
  handles: HandleTable,
  views: ViewCache,
  pending_exception: Option<Handle>,
}

impl Bridge {
  pub fn new() -> Self {
    Self {
      handles: HandleTable::new(),
      views: ViewCache::new(),
      pending_exception: None,
    }
  }

  /// Registers a host value and returns its handle.
  pub fn alloc(&mut self, value: HostValue) -> Handle {
    self.handles.alloc(value)
  }

  /// Registers an optional host value, mapping absent values to
  /// [`Handle::NONE`].
  pub fn alloc_optional(&mut self, value: Option<HostValue>) -> Handle {
    self.handles.alloc_optional(value)
  }

  /// Resolves a handle to the registered value.
  pub fn value(&self, handle: Handle) -> Result<&HostValue, BridgeError> {
    self.handles.get(handle)
  }

  /// Resolves a handle and releases it in one step (ownership transfer from
  /// the module to the host).
  pub fn take(&mut self, handle: Handle) -> Result<HostValue, BridgeError> {
    self.handles.take(handle)
  }

  /// Releases a handle. Reserved handles are immortal no-ops.
  pub fn release(&mut self, handle: Handle) {
    self.handles.release(handle);
  }

  /// Registers a second handle for the value behind `handle`.
  ///
  /// Non-primitive values alias: both handles resolve to the same host
  /// object until each is independently released.
  pub fn clone_ref(&mut self, handle: Handle) -> Result<Handle, BridgeError> {
    let value = self.handles.get(handle)?.clone();
    Ok(self.handles.alloc(value))
  }

  /// Resolves a handle that must name a module-backed callback.
  pub fn callback(&self, handle: Handle) -> Result<Rc<GuestCallback>, BridgeError> {
    match self.handles.get(handle)? {
      HostValue::Callback(callback) => Ok(callback.clone()),
      _ => Err(BridgeError::TypeError("handle does not name a callback")),
    }
  }

  /// Direct access to the handle table.
  pub fn handles(&self) -> &HandleTable {
    &self.handles
  }

  /// The cached byte view over `memory`, rebuilt if stale.
  pub fn byte_view(&mut self, memory: &LinearMemory) -> ByteView {
    self.views.bytes(memory)
  }

  /// The cached i32 view over `memory`, rebuilt if stale.
  pub fn i32_view(&mut self, memory: &LinearMemory) -> I32View {
    self.views.i32s(memory)
  }

  /// The cached f32 view over `memory`, rebuilt if stale.
  pub fn f32_view(&mut self, memory: &LinearMemory) -> F32View {
    self.views.f32s(memory)
  }

  /// The cached f64 view over `memory`, rebuilt if stale.
  pub fn f64_view(&mut self, memory: &LinearMemory) -> F64View {
    self.views.f64s(memory)
  }

  /// Boxes a thrown host value and stores its handle in the exception slot.
  ///
  /// Only the most recent capture is retained; an unconsumed previous
  /// capture is released so its registry slot is not leaked.
  pub fn store_exception(&mut self, value: HostValue) -> Handle {
    let handle = self.handles.alloc(value);
    if let Some(stale) = self.pending_exception.replace(handle) {
      self.handles.release(stale);
    }
    handle
  }

  /// Consumes and clears the exception slot (the module's error-retrieval
  /// path after an import returned a failure sentinel).
  ///
  /// Ownership of the returned handle passes to the caller.
  pub fn take_exception(&mut self) -> Option<Handle> {
    self.pending_exception.take()
  }

  /// Peeks at the exception slot without consuming it.
  pub fn pending_exception(&self) -> Option<Handle> {
    self.pending_exception
  }

  /// The guarded call boundary.
  ///
  /// Runs a fallible host operation. A [`BridgeError::Throw`] is captured:
  /// the thrown value is boxed into the exception slot and the call
  /// evaluates to the return type's failure sentinel, so execution returns
  /// cleanly to the module. Every other error is a protocol-level failure
  /// and propagates unchanged.
  pub fn guarded<T: Sentinel>(
    &mut self,
    f: impl FnOnce(&mut Bridge) -> Result<T, BridgeError>,
  ) -> Result<T, BridgeError> {
    match f(self) {
      Ok(value) => Ok(value),
      Err(BridgeError::Throw(value)) => {
        tracing::debug!(target: "host_wasm::bridge", "captured host exception");
        self.store_exception(value);
        Ok(T::sentinel())
      }
      Err(other) => Err(other),
    }
  }
}

impl Default for Bridge {
  fn default() -> Self {
    Self::new()
  }
}
