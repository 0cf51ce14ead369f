//! Abstraction over userspace context switching.
//!
//! Provides an implementation for every supported CPU architecture.
//! Callee-saved state is spilled onto the stack being left, so a [Continuation] is fully described
//! by the stack bytes above its stack pointer. This is what lets a suspended coroutine be copied
//! off the shared stack and copied back later.

use std::arch::global_asm;

/// Handle to a stack pointer set up for context switching.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct Continuation(*const ());

impl Continuation {
    /// Placeholder for a continuation that is written by the next [jump].
    pub(super) const fn empty() -> Self {
        Continuation(std::ptr::null())
    }

    /// Lowest stack address still in use by the suspended context.
    pub(super) fn stack_pointer(&self) -> *const u8 {
        self.0 as *const u8
    }
}

/// First function executed on a freshly prepared stack, must never return.
pub(super) type Entry = extern "C" fn(*mut ()) -> !;

extern "C" {
    /// Initializes a stack for context switching.
    ///
    /// Jumping to the returned continuation calls `entry(argument)` on the 16 byte aligned top of `stack`.
    #[link_name = "costack_prepare_stack"]
    pub(super) fn prepare_stack(stack: *mut u8, entry: Entry, argument: *mut ()) -> Continuation;

    /// Executes a context switch.
    ///
    /// Spills registers, sets [from] to updated stack pointer.
    /// Sets stack pointer to [to], restores registers.
    #[link_name = "costack_jump"]
    pub(super) fn jump(from: *mut Continuation, to: *const Continuation);
}

#[cfg(not(target_os = "linux"))]
compile_error!("costack only supports Linux");

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("costack only supports x86_64 and aarch64");

#[cfg(target_arch = "x86_64")]
global_asm!(include_str!("assembly/x86_64.s"));

#[cfg(target_arch = "aarch64")]
global_asm!(include_str!("assembly/aarch64.s"));
