use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::handle::Handle;
use crate::memory::LinearMemory;

/// The module exports the host consumes.
///
/// This is intentionally a narrow seam: it models only the exports the
/// bridge itself needs (the linear memory, the allocator trio, function-
/// table calls for closure destructors, and the closure shims). How the
/// module binary is loaded and instantiated is the embedder's business.
///
/// Any of these calls may grow the module's linear memory; callers must
/// refetch views through the cache afterwards rather than retaining one
/// across a call.
pub trait GuestExports {
  /// The module's exported linear memory.
  fn memory(&self) -> &LinearMemory;

  fn memory_mut(&mut self) -> &mut LinearMemory;

  /// The module's allocator export. Returns the offset of a fresh region of
  /// `len` bytes.
  fn alloc(&mut self, len: u32) -> Result<u32, BridgeError>;

  /// The module's reallocator export. Returns the (possibly moved) offset
  /// of a region grown from `old_len` to `new_len` bytes; the first
  /// `min(old_len, new_len)` bytes are preserved.
  fn realloc(&mut self, ptr: u32, old_len: u32, new_len: u32) -> Result<u32, BridgeError>;

  /// The module's deallocator export. Used by the host after it has
  /// extracted bytes it was handed ownership of.
  fn free(&mut self, ptr: u32, len: u32) -> Result<(), BridgeError>;

  /// Calls an entry in the module's indirect function table with the two
  /// closure environment words. This is how closure destructors run.
  fn call_table(&mut self, index: u32, a: u32, b: u32) -> Result<(), BridgeError>;

  /// Invokes a no-argument closure shim export.
  ///
  /// The shim receives `&mut Bridge` because module code running under it
  /// may reenter the bridge (an event handler calling further imports).
  fn invoke0(&mut self, bridge: &mut Bridge, shim: u32, a: u32, b: u32)
    -> Result<(), BridgeError>;

  /// Invokes a single-argument closure shim export. `arg` is a handle whose
  /// ownership passes to the module.
  fn invoke1(
    &mut self,
    bridge: &mut Bridge,
    shim: u32,
    a: u32,
    b: u32,
    arg: Handle,
  ) -> Result<(), BridgeError>;
}
