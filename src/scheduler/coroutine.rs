//! A single logical flow of execution and its lifecycle.

use std::fmt;

use super::backup::Backup;
use super::context_switch::Continuation;
use super::Yielder;

/// Type erased coroutine body.
pub(super) type Body = Box<dyn FnOnce(&Yielder)>;

/// Observable state of a coroutine slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// Spawned but never resumed.
    Ready,
    /// Currently executing, at most one per scheduler.
    Running,
    /// Yielded and waiting to be resumed.
    Suspended,
    /// Slot is empty, either the coroutine returned or it never existed.
    Dead,
}

/// Table index of a coroutine.
///
/// Only identifies a coroutine while it occupies the slot, a later spawn may reuse the index.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoroutineId(usize);

impl CoroutineId {
    /// Position in the scheduler's table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for CoroutineId {
    fn from(index: usize) -> Self {
        CoroutineId(index)
    }
}

impl From<CoroutineId> for usize {
    fn from(id: CoroutineId) -> Self {
        id.0
    }
}

impl fmt::Display for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stored lifecycle, dead coroutines aren't stored at all.
pub(super) enum State {
    /// Body hasn't started, it still owns its closure.
    Ready(Body),
    Running,
    Suspended,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Ready(_) => f.write_str("Ready"),
            State::Running => f.write_str("Running"),
            State::Suspended => f.write_str("Suspended"),
        }
    }
}

#[derive(Debug)]
pub(super) struct Coroutine {
    pub(super) state: State,
    /// Valid while suspended, and only once the backup is restored onto the shared stack.
    pub(super) continuation: Continuation,
    pub(super) backup: Backup,
}

impl Coroutine {
    pub(super) fn new(body: Body) -> Self {
        Coroutine {
            state: State::Ready(body),
            continuation: Continuation::empty(),
            backup: Backup::default(),
        }
    }

    pub(super) fn status(&self) -> Status {
        match self.state {
            State::Ready(_) => Status::Ready,
            State::Running => Status::Running,
            State::Suspended => Status::Suspended,
        }
    }

    /// Marks the coroutine as running, handing out the body if it's the first time.
    pub(super) fn start(&mut self) -> Option<Body> {
        match std::mem::replace(&mut self.state, State::Running) {
            State::Ready(body) => Some(body),
            State::Suspended => None,
            State::Running => panic!("coroutine is already running"),
        }
    }

    pub(super) fn suspend(&mut self) {
        assert!(matches!(self.state, State::Running), "only a running coroutine can suspend");
        self.state = State::Suspended;
    }
}
