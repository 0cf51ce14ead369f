//! Scheduler tunables.

use std::num::NonZeroUsize;

/// Bytes of the shared stack unless configured otherwise.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Sizing of a [Scheduler](crate::Scheduler)'s shared stack.
///
/// ```
/// use std::num::NonZeroUsize;
///
/// let config = costack::Config::default().stack_size(NonZeroUsize::new(64 * 1024).unwrap());
/// let scheduler = costack::Scheduler::with_config(config).unwrap();
/// assert_eq!(scheduler.stack_size(), 64 * 1024);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Total bytes of the shared execution stack, rounded up to whole pages.
    /// Must exceed the deepest call chain any hosted coroutine will use.
    pub stack_size: NonZeroUsize,
    /// Inaccessible pages below the stack, an overflow faults instead of corrupting memory.
    pub guard_pages: NonZeroUsize,
}

impl Config {
    pub fn stack_size(mut self, bytes: NonZeroUsize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn guard_pages(mut self, pages: NonZeroUsize) -> Self {
        self.guard_pages = pages;
        self
    }

    /// Whole pages needed to hold [Config::stack_size].
    pub(crate) fn usable_pages(&self, page_size: usize) -> NonZeroUsize {
        let pages = self.stack_size.get().div_ceil(page_size);
        NonZeroUsize::new(pages).unwrap_or(NonZeroUsize::MIN)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stack_size: NonZeroUsize::new(DEFAULT_STACK_SIZE).unwrap(),
            guard_pages: NonZeroUsize::MIN,
        }
    }
}
