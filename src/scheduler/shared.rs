//! State reachable from both the host and the coroutine side of a context switch.
//!
//! Borrows are short and never held across a [jump](super::context_switch::jump),
//! since the other side borrows the same cell before control comes back.

use std::cell::{RefCell, UnsafeCell};

use super::context_switch::Continuation;
use super::stack::Stack;
use super::table::Table;

/// Cache padded to avoid potential performance hit due to false sharing.
#[repr(align(128))]
pub(super) struct Shared {
    table: RefCell<Table>,
    /// Host side of every switch, written by the jump into a coroutine.
    main: UnsafeCell<Continuation>,
    pub(super) stack: Stack,
}

impl Shared {
    pub(super) fn new(table: Table, stack: Stack) -> Self {
        Shared {
            table: RefCell::new(table),
            main: UnsafeCell::new(Continuation::empty()),
            stack,
        }
    }

    /// Borrow the coroutine table for the duration of [f].
    pub(super) fn table<T>(&self, f: impl FnOnce(&mut Table) -> T) -> T {
        let mut table = self
            .table
            .try_borrow_mut()
            .expect("scheduler state is already borrowed");
        f(&mut table)
    }

    pub(super) fn main(&self) -> *mut Continuation {
        self.main.get()
    }
}
