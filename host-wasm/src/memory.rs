use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::error::BridgeError;

/// Size of one linear-memory page, in bytes.
pub const PAGE_SIZE: usize = 65536;

type Buffer = Rc<RefCell<Vec<u8>>>;

/// The module's linear memory: a single contiguous, growable byte buffer.
///
/// Growth replaces the backing buffer wholesale (the old contents are copied
/// into a fresh, larger allocation), so **buffer identity changes exactly
/// when memory grows**. Views hold a reference to the buffer they were built
/// over; comparing that reference against the memory's current buffer is the
/// staleness check the [`ViewCache`] performs before every access.
pub struct LinearMemory {
  buffer: Buffer,
}

impl LinearMemory {
  /// Creates a zero-filled memory of `pages` pages.
  pub fn new(pages: usize) -> Self {
    Self {
      buffer: Rc::new(RefCell::new(vec![0; pages * PAGE_SIZE])),
    }
  }

  pub fn size_bytes(&self) -> usize {
    self.buffer.borrow().len()
  }

  pub fn size_pages(&self) -> usize {
    self.size_bytes() / PAGE_SIZE
  }

  /// Grows the memory by `additional_pages` pages.
  ///
  /// The backing buffer is replaced, not extended in place: any view built
  /// before the call still reads the old buffer and must be rebuilt. Stale
  /// views stay memory-safe (they keep the old allocation alive) but see
  /// pre-growth contents.
  pub fn grow(&mut self, additional_pages: usize) {
    let old = self.buffer.borrow();
    let mut next = Vec::with_capacity(old.len() + additional_pages * PAGE_SIZE);
    next.extend_from_slice(&old);
    next.resize(old.len() + additional_pages * PAGE_SIZE, 0);
    drop(old);
    self.buffer = Rc::new(RefCell::new(next));
  }

  pub(crate) fn buffer(&self) -> &Buffer {
    &self.buffer
  }
}

fn span(buffer: &Buffer, offset: u64, len: u64) -> Result<std::ops::Range<usize>, BridgeError> {
  let end = offset
    .checked_add(len)
    .ok_or(BridgeError::OutOfBounds { offset, len })?;
  if end > buffer.borrow().len() as u64 {
    return Err(BridgeError::OutOfBounds { offset, len });
  }
  Ok(offset as usize..end as usize)
}

/// A byte-granular view over linear memory.
///
/// Views are cheap clones sharing the backing buffer; all mutation goes
/// through interior mutability so shared views behave like aliasing typed
/// windows over the same memory. A view is valid only while the buffer it
/// was built over is still the memory's current buffer.
#[derive(Clone)]
pub struct ByteView {
  buffer: Buffer,
}

impl ByteView {
  pub fn of(memory: &LinearMemory) -> Self {
    Self {
      buffer: memory.buffer().clone(),
    }
  }

  /// Whether this view was built over `memory`'s current buffer.
  pub fn backs(&self, memory: &LinearMemory) -> bool {
    Rc::ptr_eq(&self.buffer, memory.buffer())
  }

  /// Whether two views share one backing buffer (i.e. are the same cached
  /// instance or clones of it).
  pub fn same_backing(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.buffer, &other.buffer)
  }

  pub fn len(&self) -> usize {
    self.buffer.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn load(&self, offset: u32) -> Result<u8, BridgeError> {
    let range = span(&self.buffer, offset as u64, 1)?;
    Ok(self.buffer.borrow()[range.start])
  }

  pub fn store(&self, offset: u32, value: u8) -> Result<(), BridgeError> {
    let range = span(&self.buffer, offset as u64, 1)?;
    self.buffer.borrow_mut()[range.start] = value;
    Ok(())
  }

  /// Zero-copy read of `[offset, offset + len)`.
  ///
  /// The returned guard borrows the backing buffer: drop it before the next
  /// operation that could grow memory or write through a view.
  pub fn read(&self, offset: u32, len: u32) -> Result<Ref<'_, [u8]>, BridgeError> {
    let range = span(&self.buffer, offset as u64, len as u64)?;
    Ok(Ref::map(self.buffer.borrow(), |bytes| &bytes[range]))
  }

  pub fn write(&self, offset: u32, bytes: &[u8]) -> Result<(), BridgeError> {
    let range = span(&self.buffer, offset as u64, bytes.len() as u64)?;
    self.buffer.borrow_mut()[range].copy_from_slice(bytes);
    Ok(())
  }
}

macro_rules! element_view {
  ($name:ident, $slice:ident, $ty:ty, $size:literal, $doc:literal) => {
    #[doc = $doc]
    ///
    /// Element-indexed with little-endian encoding at byte offset
    /// `index * element size`. Same staleness rules as [`ByteView`].
    #[derive(Clone)]
    pub struct $name {
      buffer: Buffer,
    }

    impl $name {
      pub fn of(memory: &LinearMemory) -> Self {
        Self {
          buffer: memory.buffer().clone(),
        }
      }

      /// Whether this view was built over `memory`'s current buffer.
      pub fn backs(&self, memory: &LinearMemory) -> bool {
        Rc::ptr_eq(&self.buffer, memory.buffer())
      }

      /// Whether two views share one backing buffer.
      pub fn same_backing(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.buffer, &other.buffer)
      }

      pub fn load(&self, index: u32) -> Result<$ty, BridgeError> {
        let range = span(&self.buffer, index as u64 * $size, $size)?;
        let bytes = self.buffer.borrow();
        let mut raw = [0u8; $size];
        raw.copy_from_slice(&bytes[range]);
        Ok(<$ty>::from_le_bytes(raw))
      }

      pub fn store(&self, index: u32, value: $ty) -> Result<(), BridgeError> {
        let range = span(&self.buffer, index as u64 * $size, $size)?;
        self.buffer.borrow_mut()[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
      }

      /// A scoped, zero-copy element range `[index, index + len)`.
      pub fn slice(&self, index: u32, len: u32) -> Result<$slice<'_>, BridgeError> {
        let range = span(&self.buffer, index as u64 * $size, len as u64 * $size)?;
        Ok($slice {
          bytes: Ref::map(self.buffer.borrow(), |bytes| &bytes[range]),
        })
      }
    }

    /// A scoped element range borrowed from the backing buffer.
    ///
    /// Must not be retained across any operation that could grow memory.
    pub struct $slice<'a> {
      bytes: Ref<'a, [u8]>,
    }

    impl $slice<'_> {
      pub fn len(&self) -> usize {
        self.bytes.len() / $size
      }

      pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
      }

      pub fn get(&self, index: usize) -> Option<$ty> {
        let start = index.checked_mul($size)?;
        let raw: [u8; $size] = self.bytes.get(start..start + $size)?.try_into().ok()?;
        Some(<$ty>::from_le_bytes(raw))
      }

      pub fn iter(&self) -> impl Iterator<Item = $ty> + '_ {
        self.bytes.chunks_exact($size).map(|chunk| {
          let mut raw = [0u8; $size];
          raw.copy_from_slice(chunk);
          <$ty>::from_le_bytes(raw)
        })
      }

      pub fn to_vec(&self) -> Vec<$ty> {
        self.iter().collect()
      }
    }
  };
}

element_view!(I32View, I32Slice, i32, 4, "A 32-bit integer view over linear memory.");
element_view!(F32View, F32Slice, f32, 4, "A 32-bit float view over linear memory.");
element_view!(F64View, F64Slice, f64, 8, "A 64-bit float view over linear memory.");

/// Lazily rebuilt typed views over the module's linear memory.
///
/// There is no explicit "memory grew" event anywhere in the protocol: the
/// only invalidation signal is the buffer-identity comparison performed here
/// before every access. A cached view whose buffer is no longer the memory's
/// current buffer is discarded and rebuilt.
#[derive(Default)]
pub struct ViewCache {
  bytes: Option<ByteView>,
  i32s: Option<I32View>,
  f32s: Option<F32View>,
  f64s: Option<F64View>,
}

impl ViewCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn bytes(&mut self, memory: &LinearMemory) -> ByteView {
    match &self.bytes {
      Some(view) if view.backs(memory) => view.clone(),
      _ => {
        tracing::trace!(target: "host_wasm::memory", kind = "u8", "rebuilding stale memory view");
        let view = ByteView::of(memory);
        self.bytes = Some(view.clone());
        view
      }
    }
  }

  pub fn i32s(&mut self, memory: &LinearMemory) -> I32View {
    match &self.i32s {
      Some(view) if view.backs(memory) => view.clone(),
      _ => {
        tracing::trace!(target: "host_wasm::memory", kind = "i32", "rebuilding stale memory view");
        let view = I32View::of(memory);
        self.i32s = Some(view.clone());
        view
      }
    }
  }

  pub fn f32s(&mut self, memory: &LinearMemory) -> F32View {
    match &self.f32s {
      Some(view) if view.backs(memory) => view.clone(),
      _ => {
        tracing::trace!(target: "host_wasm::memory", kind = "f32", "rebuilding stale memory view");
        let view = F32View::of(memory);
        self.f32s = Some(view.clone());
        view
      }
    }
  }

  pub fn f64s(&mut self, memory: &LinearMemory) -> F64View {
    match &self.f64s {
      Some(view) if view.backs(memory) => view.clone(),
      _ => {
        tracing::trace!(target: "host_wasm::memory", kind = "f64", "rebuilding stale memory view");
        let view = F64View::of(memory);
        self.f64s = Some(view.clone());
        view
      }
    }
  }
}
