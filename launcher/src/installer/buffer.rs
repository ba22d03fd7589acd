//! Transient payload memory
//!
//! A package is loaded completely into RAM before anything is written to
//! flash. The buffer comes from a dedicated `linked_list_allocator` heap so a
//! too-large payload fails cleanly instead of exhausting the global heap.

use core::alloc::Layout;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use linked_list_allocator::Heap;
use spin::Mutex;

/// Locked heap for install payloads.
pub struct PayloadHeap {
    heap: Mutex<Heap>,
}

impl PayloadHeap {
    pub const fn empty() -> Self {
        Self {
            heap: Mutex::new(Heap::empty()),
        }
    }

    /// Heap over a static memory block.
    pub fn from_static(memory: &'static mut [u8]) -> Self {
        let heap = Self::empty();
        // SAFETY: the block is exclusively borrowed for 'static
        unsafe { heap.init(memory.as_mut_ptr(), memory.len()) };
        heap
    }

    /// # Safety
    /// Must only be called once, with memory valid for the heap's lifetime
    /// and not used for anything else.
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        self.heap.lock().init(start, size);
    }

    /// Zeroed buffer of `len` bytes, or `None` if the heap cannot hold it.
    pub fn allocate(&self, len: usize) -> Option<PayloadBuffer<'_>> {
        if len == 0 {
            return Some(PayloadBuffer {
                heap: self,
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let layout = Layout::from_size_align(len, 4).ok()?;
        let ptr = self.heap.lock().allocate_first_fit(layout).ok()?;
        // SAFETY: fresh allocation of `len` bytes
        unsafe { ptr.as_ptr().write_bytes(0, len) };
        Some(PayloadBuffer {
            heap: self,
            ptr,
            len,
        })
    }

    pub fn free(&self) -> usize {
        self.heap.lock().free()
    }

    pub fn size(&self) -> usize {
        self.heap.lock().size()
    }
}

/// Heap-backed byte buffer, returned to its heap on drop.
pub struct PayloadBuffer<'h> {
    heap: &'h PayloadHeap,
    ptr: NonNull<u8>,
    len: usize,
}

impl Deref for PayloadBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes while the buffer lives
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for PayloadBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and uniquely owned by this buffer
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for PayloadBuffer<'_> {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        if let Ok(layout) = Layout::from_size_align(self.len, 4) {
            // SAFETY: ptr came from this heap with the same layout and is freed once
            unsafe { self.heap.heap.lock().deallocate(self.ptr, layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::payload_heap;

    #[test]
    fn test_buffer_is_zeroed_and_returned() {
        let heap = payload_heap(4096);
        let before = heap.free();
        {
            let mut buf = heap.allocate(1000).unwrap();
            assert!(buf.iter().all(|b| *b == 0));
            buf[999] = 7;
            assert!(heap.free() < before);
        }
        assert_eq!(heap.free(), before);
    }

    #[test]
    fn test_oversized_request_fails() {
        let heap = payload_heap(4096);
        assert!(heap.allocate(8192).is_none());
        assert!(heap.allocate(0).is_some());
    }
}
