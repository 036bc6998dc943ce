#![allow(dead_code)]

use host_wasm::imports;
use host_wasm::Bridge;
use host_wasm::BridgeError;
use host_wasm::ByteView;
use host_wasm::GuestExports;
use host_wasm::Handle;
use host_wasm::HostHooks;
use host_wasm::HostValue;
use host_wasm::LinearMemory;

/// One recorded closure-shim invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
  pub shim: u32,
  pub a: u32,
  pub b: u32,
  pub arg: Option<u32>,
}

/// A scripted stand-in for an instantiated module.
///
/// Memory is managed by a bump allocator over a real [`LinearMemory`], so
/// allocations that outgrow the current buffer trigger genuine growth (and
/// therefore genuine view invalidation). Every export call is recorded so
/// tests can assert on the exact traffic that crossed the boundary.
pub struct ScriptedGuest {
  memory: LinearMemory,
  brk: u32,
  pub allocs: Vec<(u32, u32)>,
  pub reallocs: Vec<(u32, u32, u32)>,
  pub freed: Vec<(u32, u32)>,
  pub table_calls: Vec<(u32, u32, u32)>,
  pub invocations: Vec<Invocation>,
  /// When set, the next shim invocation issues `callback_drop` on this raw
  /// handle mid-call (a callback cancelling itself).
  pub drop_handle_on_invoke: Option<u32>,
  /// What that mid-call drop reported, when it ran.
  pub mid_invoke_drop_result: Option<bool>,
  /// When set, `invoke1` releases the argument handle before returning, the
  /// way module code drops an event value it has finished with.
  pub release_invoke1_arg: bool,
}

impl ScriptedGuest {
  pub fn new() -> Self {
    Self {
      memory: LinearMemory::new(1),
      // Keep offset 0 unused so a zero pointer always means "absent".
      brk: 8,
      allocs: Vec::new(),
      reallocs: Vec::new(),
      freed: Vec::new(),
      table_calls: Vec::new(),
      invocations: Vec::new(),
      drop_handle_on_invoke: None,
      mid_invoke_drop_result: None,
      release_invoke1_arg: false,
    }
  }

  fn ensure(&mut self, len: u32) {
    while self.brk as usize + len as usize > self.memory.size_bytes() {
      self.memory.grow(1);
    }
  }
}

impl Default for ScriptedGuest {
  fn default() -> Self {
    Self::new()
  }
}

impl GuestExports for ScriptedGuest {
  fn memory(&self) -> &LinearMemory {
    &self.memory
  }

  fn memory_mut(&mut self) -> &mut LinearMemory {
    &mut self.memory
  }

  fn alloc(&mut self, len: u32) -> Result<u32, BridgeError> {
    self.ensure(len);
    let ptr = self.brk;
    self.brk += len;
    self.allocs.push((ptr, len));
    Ok(ptr)
  }

  fn realloc(&mut self, ptr: u32, old_len: u32, new_len: u32) -> Result<u32, BridgeError> {
    self.reallocs.push((ptr, old_len, new_len));
    let preserved = old_len.min(new_len);
    let bytes = ByteView::of(&self.memory).read(ptr, preserved)?.to_vec();

    self.ensure(new_len);
    let next = self.brk;
    self.brk += new_len;
    ByteView::of(&self.memory).write(next, &bytes)?;
    Ok(next)
  }

  fn free(&mut self, ptr: u32, len: u32) -> Result<(), BridgeError> {
    self.freed.push((ptr, len));
    Ok(())
  }

  fn call_table(&mut self, index: u32, a: u32, b: u32) -> Result<(), BridgeError> {
    self.table_calls.push((index, a, b));
    Ok(())
  }

  fn invoke0(&mut self, bridge: &mut Bridge, shim: u32, a: u32, b: u32)
    -> Result<(), BridgeError> {
    self.invocations.push(Invocation {
      shim,
      a,
      b,
      arg: None,
    });
    if let Some(handle) = self.drop_handle_on_invoke.take() {
      self.mid_invoke_drop_result = Some(imports::callback_drop(bridge, handle)?);
    }
    Ok(())
  }

  fn invoke1(
    &mut self,
    bridge: &mut Bridge,
    shim: u32,
    a: u32,
    b: u32,
    arg: Handle,
  ) -> Result<(), BridgeError> {
    self.invocations.push(Invocation {
      shim,
      a,
      b,
      arg: Some(arg.index()),
    });
    if let Some(handle) = self.drop_handle_on_invoke.take() {
      self.mid_invoke_drop_result = Some(imports::callback_drop(bridge, handle)?);
    }
    if self.release_invoke1_arg {
      imports::object_drop_ref(bridge, arg.index())?;
    }
    Ok(())
  }
}

/// A recording implementation of the ambient host capabilities.
pub struct RecordingHooks {
  pub clock: f64,
  pub log: Vec<String>,
  pub errors: Vec<String>,
  pub timers: Vec<(i32, f64, HostValue)>,
  pub frames: Vec<(i32, HostValue)>,
  pub cancelled_timers: Vec<i32>,
  pub cancelled_frames: Vec<i32>,
  next_id: i32,
  /// When set, scheduling calls throw this error message.
  pub fail_scheduling: Option<&'static str>,
}

impl RecordingHooks {
  pub fn new() -> Self {
    Self {
      clock: 0.0,
      log: Vec::new(),
      errors: Vec::new(),
      timers: Vec::new(),
      frames: Vec::new(),
      cancelled_timers: Vec::new(),
      cancelled_frames: Vec::new(),
      next_id: 1,
      fail_scheduling: None,
    }
  }
}

impl Default for RecordingHooks {
  fn default() -> Self {
    Self::new()
  }
}

impl HostHooks for RecordingHooks {
  fn now(&mut self) -> f64 {
    self.clock += 16.0;
    self.clock
  }

  fn console_log(&mut self, text: &str) {
    self.log.push(text.to_string());
  }

  fn console_error(&mut self, text: &str) {
    self.errors.push(text.to_string());
  }

  fn set_timeout(&mut self, callback: HostValue, delay_ms: f64) -> Result<i32, HostValue> {
    if let Some(message) = self.fail_scheduling {
      return Err(HostValue::error(message));
    }
    let id = self.next_id;
    self.next_id += 1;
    self.timers.push((id, delay_ms, callback));
    Ok(id)
  }

  fn clear_timeout(&mut self, id: i32) {
    self.cancelled_timers.push(id);
  }

  fn request_animation_frame(&mut self, callback: HostValue) -> Result<i32, HostValue> {
    if let Some(message) = self.fail_scheduling {
      return Err(HostValue::error(message));
    }
    let id = self.next_id;
    self.next_id += 1;
    self.frames.push((id, callback));
    Ok(id)
  }

  fn cancel_animation_frame(&mut self, id: i32) -> Result<(), HostValue> {
    self.cancelled_frames.push(id);
    Ok(())
  }
}
