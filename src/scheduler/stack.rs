//! The shared execution stack every coroutine of a scheduler runs on.

use std::num::NonZeroUsize;
use std::{ffi, io, ptr};

/// Guard paged block of anonymous memory used as a call stack.
#[derive(Debug)]
pub(super) struct Stack {
    pointer: *mut u8,
    length: usize,
    guard_length: usize,
}

impl Stack {
    /// Allocates a general purpose stack.
    /// Demand paging ensures that physical memory is allocated only as necessary, during a page fault.
    /// The stack is protected from overflow using guard pages.
    pub(super) fn new(guard_pages: NonZeroUsize, usable_pages: NonZeroUsize) -> io::Result<Self> {
        let (guard_pages, usable_pages) = (guard_pages.get(), usable_pages.get());

        // page aligned sizes
        let page_size = page_size()?;
        let length = guard_pages
            .checked_add(usable_pages)
            .and_then(|pages| pages.checked_mul(page_size))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "stack size overflows"))?;

        // kernel allocates an unused block of virtual memory
        let pointer = unsafe {
            libc::mmap(
                ptr::null_mut(),
                length,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if pointer == libc::MAP_FAILED {
            let error = io::Error::last_os_error();
            return Err(error);
        }

        // if guarding memory goes wrong then mmap gets cleaned up in Stack's drop
        let stack = Stack {
            pointer: pointer as *mut u8,
            length,
            guard_length: guard_pages * page_size,
        };

        // located at the lowest addresses since the stack grows downward
        let result = unsafe { libc::mprotect(pointer, stack.guard_length, libc::PROT_NONE) };
        if result == -1 {
            let error = io::Error::last_os_error();
            return Err(error);
        }

        Ok(stack)
    }

    /// Upper address of the stack, stack addresses grow downwards.
    pub(super) fn base(&self) -> *mut u8 {
        // safety: part of same allocation, can't overflow
        unsafe { self.pointer.add(self.length) }
    }

    /// Number of bytes usable as stack, excluding guard pages.
    pub(super) fn usable_length(&self) -> usize {
        self.length - self.guard_length
    }

    /// Whether [address] lies in the usable part of the stack.
    /// The base itself counts, it's where an empty stack points.
    pub(super) fn contains(&self, address: *const u8) -> bool {
        let lowest = self.pointer as usize + self.guard_length;
        (lowest..=self.base() as usize).contains(&(address as usize))
    }

    /// Bytes between [address] and the base, which is the footprint of a stack pointing at [address].
    pub(super) fn depth(&self, address: *const u8) -> usize {
        assert!(self.contains(address), "address {address:?} is outside of the shared stack");
        self.base() as usize - address as usize
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let result = unsafe { libc::munmap(self.pointer as *mut ffi::c_void, self.length) };
        assert_eq!(result, 0);
    }
}

pub(super) fn page_size() -> io::Result<usize> {
    let result = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if result <= 0 {
        let error = io::Error::last_os_error();
        return Err(error);
    }

    Ok(result as usize)
}
