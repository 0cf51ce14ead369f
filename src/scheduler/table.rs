//! Slot table of coroutines indexed by reusable integer handles.

use std::any::Any;
use std::collections::TryReserveError;
use std::fmt;

use super::coroutine::{Body, Coroutine, CoroutineId, Status};

/// Slots allocated by a fresh table.
pub(super) const DEFAULT_CAPACITY: usize = 16;

pub(super) struct Table {
    slots: Vec<Option<Box<Coroutine>>>,
    live: usize,
    running: Option<CoroutineId>,
    /// Body of a coroutine that is being resumed for the first time, taken by the trampoline.
    pub(super) entry: Option<Body>,
    /// Payload of a body that unwound, re-raised on the host side.
    pub(super) panic: Option<Box<dyn Any + Send>>,
}

impl Table {
    pub(super) fn new() -> Self {
        let mut slots = Vec::with_capacity(DEFAULT_CAPACITY);
        slots.resize_with(DEFAULT_CAPACITY, || None);

        Table {
            slots,
            live: 0,
            running: None,
            entry: None,
            panic: None,
        }
    }

    pub(super) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub(super) fn len(&self) -> usize {
        self.live
    }

    pub(super) fn running(&self) -> Option<CoroutineId> {
        self.running
    }

    pub(super) fn set_running(&mut self, id: Option<CoroutineId>) {
        self.running = id;
    }

    /// Occupies a slot, doubling the table if every slot is taken.
    ///
    /// The search starts at the live count and wraps around.
    /// After doubling, the coroutine lands on the first new slot, which is the old capacity.
    pub(super) fn insert(&mut self, coroutine: Coroutine) -> Result<CoroutineId, TryReserveError> {
        let capacity = self.capacity();

        if self.live >= capacity {
            self.slots.try_reserve_exact(capacity)?;
            self.slots.resize_with(2 * capacity, || None);
            self.slots[capacity] = Some(Box::new(coroutine));
            self.live += 1;
            return Ok(CoroutineId::from(capacity));
        }

        let index = (0..capacity)
            .map(|i| (i + self.live) % capacity)
            .find(|&index| self.slots[index].is_none())
            .expect("table has a free slot when live count is below capacity");

        self.slots[index] = Some(Box::new(coroutine));
        self.live += 1;
        Ok(CoroutineId::from(index))
    }

    pub(super) fn get(&self, id: CoroutineId) -> Option<&Coroutine> {
        self.slot(id).as_deref()
    }

    pub(super) fn get_mut(&mut self, id: CoroutineId) -> Option<&mut Coroutine> {
        self.check_bounds(id);
        self.slots[id.index()].as_deref_mut()
    }

    pub(super) fn status(&self, id: CoroutineId) -> Status {
        self.get(id).map_or(Status::Dead, Coroutine::status)
    }

    /// Empties the slot, the coroutine is dropped wherever it is in its lifecycle.
    pub(super) fn remove(&mut self, id: CoroutineId) -> Option<Box<Coroutine>> {
        self.check_bounds(id);
        let coroutine = self.slots[id.index()].take()?;

        self.live -= 1;
        if self.running == Some(id) {
            self.running = None;
        }

        Some(coroutine)
    }

    fn slot(&self, id: CoroutineId) -> &Option<Box<Coroutine>> {
        self.check_bounds(id);
        &self.slots[id.index()]
    }

    fn check_bounds(&self, id: CoroutineId) {
        assert!(
            id.index() < self.capacity(),
            "coroutine {id} is out of range, table capacity is {}",
            self.capacity(),
        );
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("capacity", &self.capacity())
            .field("live", &self.live)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
