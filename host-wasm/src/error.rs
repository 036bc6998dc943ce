use crate::value::HostValue;

/// Errors produced by the bridge.
///
/// Two very different failure families share this enum:
///
/// - **Protocol violations** ([`BridgeError::UnallocatedHandle`],
///   [`BridgeError::Encoding`], [`BridgeError::OutOfBounds`],
///   [`BridgeError::TypeError`], [`BridgeError::Guest`]): the module and the
///   host disagree about the boundary state. These are unrecoverable
///   programming errors and propagate to the embedder unchanged.
/// - **Host exceptions** ([`BridgeError::Throw`]): a host capability threw.
///   These are expected at runtime and are captured by
///   [`Bridge::guarded`](crate::Bridge::guarded) into the exception slot
///   instead of crossing into the module.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
  /// A handle was resolved that is out of bounds or not currently allocated.
  ///
  /// Under the intended protocol this never happens: the module only ever
  /// holds handles produced by the registry.
  #[error("unallocated handle: {handle}")]
  UnallocatedHandle { handle: u32 },

  /// Guest bytes were decoded as text but are not valid UTF-8.
  #[error("invalid utf-8 in guest memory")]
  Encoding(#[from] std::str::Utf8Error),

  /// A read or write through a memory view fell outside the current linear
  /// memory.
  #[error("guest memory access out of bounds: offset={offset}, len={len}")]
  OutOfBounds { offset: u64, len: u64 },

  /// An import received a handle naming a value of the wrong shape.
  #[error("type error: {0}")]
  TypeError(&'static str),

  /// A value thrown by a host capability. Captured by the call boundary and
  /// surfaced to the module through the exception slot.
  #[error("host exception")]
  Throw(HostValue),

  /// A module export misbehaved (allocator failure, bad table index, shim
  /// fault).
  #[error("guest fault: {0}")]
  Guest(&'static str),
}
