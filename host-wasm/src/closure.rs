use std::cell::Cell;
use std::rc::Rc;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::guest::GuestExports;
use crate::value::HostValue;

/// The shared lifetime state of a module-backed callback.
///
/// `a` and `b` are the two opaque words naming the module-side closure
/// environment; `count` tracks how many live references hold the
/// environment alive: the baseline "not yet explicitly dropped" reference
/// plus one per in-flight invocation.
///
/// `a` is zeroed for the duration of each invocation (the in-flight call
/// owns the environment) and restored on unwind unless the count reached
/// zero, in which case the module-side destructor has run and both words
/// are permanently zero.
#[derive(Debug)]
pub struct ClosureState {
  a: Cell<u32>,
  b: Cell<u32>,
  count: Cell<u32>,
}

/// Dispatch adapter for a module-backed callback.
///
/// Receives the environment words snapshotted by the invocation protocol
/// plus the shim index to call, and forwards into the module through
/// [`GuestExports`]. Adapters are plain `fn` pointers; per-callback state
/// lives in [`GuestCallback`], not in captured environment.
pub type InvokeFn = fn(
  &mut Bridge,
  &mut dyn GuestExports,
  shim: u32,
  a: u32,
  b: u32,
  args: &[HostValue],
) -> Result<HostValue, BridgeError>;

/// A host-invocable wrapper around a module-side callback.
///
/// The module hands the host a closure environment as two opaque words plus
/// a destructor entry in its function table; this wrapper makes that triple
/// callable from host subsystems (timers, event listeners) while
/// guaranteeing the destructor runs exactly once, even when an explicit
/// drop races with an in-flight invocation.
pub struct GuestCallback {
  state: Rc<ClosureState>,
  dtor: u32,
  shim: u32,
  invoke: InvokeFn,
}

impl GuestCallback {
  pub fn new(a: u32, b: u32, dtor: u32, shim: u32, invoke: InvokeFn) -> Self {
    Self {
      state: Rc::new(ClosureState {
        a: Cell::new(a),
        b: Cell::new(b),
        count: Cell::new(1),
      }),
      dtor,
      shim,
      invoke,
    }
  }

  /// The current live-reference count.
  pub fn ref_count(&self) -> u32 {
    self.state.count.get()
  }

  /// The current environment words. `(0, _)` while an invocation is in
  /// flight; `(0, 0)` once destroyed.
  pub fn env(&self) -> (u32, u32) {
    (self.state.a.get(), self.state.b.get())
  }

  /// The module's function-table index for the environment destructor.
  pub fn dtor(&self) -> u32 {
    self.dtor
  }

  /// Releases the baseline reference (the host's manual-release hook, used
  /// when a listener is unregistered or the module drops its wrapper).
  ///
  /// Returns `true` when this release was the last reference and the module
  /// may now free the environment itself; the words are zeroed so any later
  /// release or invocation attempt is visibly dead. Releasing an
  /// already-dead callback is a tolerated no-op (cancellation paths may
  /// race), reported as not-freed.
  pub fn release(&self) -> bool {
    let count = self.state.count.get();
    if count == 0 {
      return false;
    }
    self.state.count.set(count - 1);
    if count == 1 {
      self.state.a.set(0);
      self.state.b.set(0);
      tracing::trace!(target: "host_wasm::closure", dtor = self.dtor, "callback released by host");
      return true;
    }
    false
  }
}

impl std::fmt::Debug for GuestCallback {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GuestCallback")
      .field("state", &self.state)
      .field("dtor", &self.dtor)
      .field("shim", &self.shim)
      .finish()
  }
}

/// Invokes a module-backed callback from the host.
///
/// The protocol, in order:
/// 1. increment the reference count (the in-flight call holds the
///    environment alive),
/// 2. snapshot `a` and zero the stored copy,
/// 3. dispatch into the module,
/// 4. decrement the count; if it reached zero run the destructor through the
///    module's function table, otherwise restore `a`.
///
/// Step 4 runs whether or not dispatch failed, which is what makes an
/// explicit drop issued *during* the call (a callback cancelling itself)
/// safe: the environment is freed only after the call unwinds.
pub fn invoke_callback(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  callback: &GuestCallback,
  args: &[HostValue],
) -> Result<HostValue, BridgeError> {
  let state = &callback.state;
  state.count.set(state.count.get() + 1);
  let a = state.a.replace(0);
  let b = state.b.get();

  let result = (callback.invoke)(bridge, guest, callback.shim, a, b, args);

  let count = state.count.get();
  let cleanup = if count == 0 {
    // A double explicit drop raced with this call: the environment was
    // already reported freed, so neither the destructor nor the restore has
    // anything left to act on.
    Ok(())
  } else {
    state.count.set(count - 1);
    if count == 1 {
      tracing::trace!(target: "host_wasm::closure", dtor = callback.dtor, "running callback destructor");
      // `a` was zeroed at entry; zero `b` too so the dead environment reads
      // as (0, 0) from here on.
      state.b.set(0);
      guest.call_table(callback.dtor, a, b)
    } else {
      state.a.set(a);
      Ok(())
    }
  };

  let value = result?;
  cleanup?;
  Ok(value)
}

/// Dispatch adapter for no-argument callbacks (timer ticks, frame
/// callbacks).
pub fn dispatch_nullary(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  shim: u32,
  a: u32,
  b: u32,
  args: &[HostValue],
) -> Result<HostValue, BridgeError> {
  // Extra host arguments are dropped, matching a zero-parameter module
  // signature.
  let _ = args;
  guest.invoke0(bridge, shim, a, b)?;
  Ok(HostValue::Undefined)
}

/// Dispatch adapter for single-value callbacks (event listeners).
///
/// The host argument is boxed into a fresh handle whose ownership passes to
/// the module; the module releases it through the drop-reference import when
/// it is done with the event.
pub fn dispatch_unary(
  bridge: &mut Bridge,
  guest: &mut dyn GuestExports,
  shim: u32,
  a: u32,
  b: u32,
  args: &[HostValue],
) -> Result<HostValue, BridgeError> {
  let arg = args.first().cloned().unwrap_or(HostValue::Undefined);
  let handle = bridge.alloc(arg);
  guest.invoke1(bridge, shim, a, b, handle)?;
  Ok(HostValue::Undefined)
}
