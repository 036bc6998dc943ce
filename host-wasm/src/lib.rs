//! Host-side bridge runtime for sandboxed linear-memory modules.
//!
//! A compute module compiled to a linear-memory sandbox has no garbage
//! collector, no native object model, and no way to hold references into
//! the host realm. This crate is the boundary layer that makes the two
//! worlds interoperate:
//! - A host-side object registry handing the module opaque integer handles
//!   ([`HandleTable`], [`Handle`])
//! - Identity-checked typed views over the module's growable linear memory
//!   ([`LinearMemory`], [`ViewCache`])
//! - String/byte/array marshalling between host-native representations and
//!   raw module memory ([`marshal`], [`HostString`])
//! - A reference-counted closure protocol so module-owned callbacks can be
//!   invoked repeatedly by the host and destroyed exactly once
//!   ([`GuestCallback`], [`invoke_callback`])
//! - A guarded call boundary that downgrades host exceptions to a failure
//!   sentinel plus an exception-slot entry ([`Bridge::guarded`])
//! - The mechanical import surface built from those primitives ([`imports`])
//!
//! # Handles
//!
//! A handle is an index into the registry's slot vector. Handles below
//! [`Handle::FIRST_DYNAMIC`] are immortal sentinels (`undefined`, `null`,
//! `true`, `false`, plus reserved slack); everything above is allocated
//! through an intrusive free list with deterministic LIFO reuse. A handle
//! resolves to the same host value until it is explicitly released;
//! resolving a released handle is a protocol violation and fails with
//! [`BridgeError::UnallocatedHandle`].
//!
//! # View staleness
//!
//! The module's linear memory replaces its backing buffer when it grows.
//! There is no growth event: the view cache compares buffer identity before
//! every access and lazily rebuilds stale views. Scoped range reads borrow
//! the current buffer and must not be retained across anything that could
//! grow memory.
//!
//! # Concurrency
//!
//! The bridge is single-threaded and purely synchronous; it performs no
//! scheduling of its own. Reentrancy is expected — module code running
//! under a closure shim may call back into the bridge — and the closure
//! reference counting exists precisely to make that safe.

mod bridge;
mod closure;
mod error;
mod guest;
mod handle;
mod hooks;
pub mod imports;
pub mod marshal;
mod memory;
mod render;
mod string;
mod table;
mod value;

pub use crate::bridge::Bridge;
pub use crate::closure::dispatch_nullary;
pub use crate::closure::dispatch_unary;
pub use crate::closure::invoke_callback;
pub use crate::closure::ClosureState;
pub use crate::closure::GuestCallback;
pub use crate::closure::InvokeFn;
pub use crate::error::BridgeError;
pub use crate::guest::GuestExports;
pub use crate::handle::Handle;
pub use crate::handle::Sentinel;
pub use crate::hooks::HostHooks;
pub use crate::marshal::GuestSlice;
pub use crate::memory::ByteView;
pub use crate::memory::F32Slice;
pub use crate::memory::F32View;
pub use crate::memory::F64Slice;
pub use crate::memory::F64View;
pub use crate::memory::I32Slice;
pub use crate::memory::I32View;
pub use crate::memory::LinearMemory;
pub use crate::memory::ViewCache;
pub use crate::memory::PAGE_SIZE;
pub use crate::render::debug_render;
pub use crate::string::HostString;
pub use crate::table::HandleTable;
pub use crate::value::DataObject;
pub use crate::value::ErrorValue;
pub use crate::value::HostValue;
pub use crate::value::PlatformObject;
