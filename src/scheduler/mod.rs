//! Coroutine scheduler built around a single shared stack.
//!
//! A coroutine resumed for the first time starts at the top of the shared stack.
//! When it yields, the bytes between its stack pointer and the top are copied off into its backup,
//! leaving the shared stack free for the next coroutine.
//! Resuming copies the backup back to the same addresses before switching into it,
//! so every pointer into its frames stays valid.

use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::{fmt, panic};

pub use coroutine::{CoroutineId, Status};

use crate::{Config, Error, Result};
use context_switch::Continuation;
use coroutine::Coroutine;
use shared::Shared;
use stack::Stack;
use table::Table;

mod backup;
mod context_switch;
mod coroutine;
mod shared;
mod stack;
mod table;

/// Owner of a shared stack and the coroutines that take turns running on it.
///
/// Strictly single-threaded, a scheduler can't be sent to or shared with another thread.
pub struct Scheduler {
    shared: Box<Shared>,
}

impl Scheduler {
    /// Creates a scheduler with a 1 MiB shared stack.
    pub fn open() -> Result<Self> {
        Scheduler::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let usable_pages = config.usable_pages(stack::page_size()?);
        let stack = Stack::new(config.guard_pages, usable_pages)?;

        Ok(Scheduler {
            shared: Box::new(Shared::new(Table::new(), stack)),
        })
    }

    /// Registers a coroutine that starts running [body] on its first [resume](Scheduler::resume).
    pub fn spawn<F>(&mut self, body: F) -> Result<CoroutineId>
    where
        F: FnOnce(&Yielder) + 'static,
    {
        let coroutine = Coroutine::new(Box::new(body));
        self.shared
            .table(|table| table.insert(coroutine))
            .map_err(Error::TableExhausted)
    }

    /// Registers a coroutine from a plain function and the value it's called with.
    pub fn spawn_with<T: 'static>(&mut self, func: fn(&Yielder, T), user_data: T) -> Result<CoroutineId> {
        self.spawn(move |yielder| func(yielder, user_data))
    }

    /// Runs the coroutine until it yields or returns.
    ///
    /// Does nothing if the slot is empty, the coroutine may have already returned.
    /// A panic inside the coroutine removes it and continues unwinding from here.
    ///
    /// # Errors
    /// [Error::BackupExhausted] if the coroutine yielded but its stack couldn't be backed up.
    /// The coroutine is destroyed in that case.
    ///
    /// # Panics
    /// If [id] is outside the table.
    pub fn resume(&mut self, id: CoroutineId) -> Result<()> {
        let shared = &*self.shared;
        let argument = shared as *const Shared as *mut ();

        let target = shared.table(|table| {
            if let Some(running) = table.running() {
                panic!("can't resume coroutine {id} while coroutine {running} is running");
            }

            let coroutine = table.get_mut(id)?;
            let body = coroutine.start();
            if body.is_some() {
                coroutine.continuation =
                    unsafe { context_switch::prepare_stack(shared.stack.base(), trampoline, argument) };
            } else {
                // safety: nothing runs on the shared stack while the host is in control
                unsafe { coroutine.backup.restore(shared.stack.base()) };
            }
            let target = ptr::addr_of!(coroutine.continuation);

            table.entry = body;
            table.set_running(Some(id));
            Some(target)
        });

        let Some(target) = target else {
            return Ok(());
        };

        unsafe { context_switch::jump(shared.main(), target) };

        self.settle(id)
    }

    /// Host side bookkeeping once a coroutine hands control back.
    fn settle(&mut self, id: CoroutineId) -> Result<()> {
        let shared = &*self.shared;

        let (payload, result) = shared.table(|table| {
            debug_assert_eq!(table.running(), None);
            let payload = table.panic.take();

            // completed coroutines have already left the table
            let Some(coroutine) = table.get_mut(id) else {
                return (payload, Ok(()));
            };

            // the shared stack is untouched since the coroutine switched away
            let size = shared.stack.depth(coroutine.continuation.stack_pointer());
            let saved = unsafe { coroutine.backup.save(shared.stack.base(), size) };

            let result = saved.map_err(|source| {
                table.remove(id);
                Error::BackupExhausted { size, source }
            });
            (payload, result)
        });

        if let Some(payload) = payload {
            panic::resume_unwind(payload);
        }

        result
    }

    /// # Panics
    /// If [id] is outside the table.
    pub fn status(&self, id: CoroutineId) -> Status {
        self.shared.table(|table| table.status(id))
    }

    /// Coroutine that is currently executing.
    /// The host only ever sees [None], since it regains control once the coroutine yields or returns.
    pub fn running(&self) -> Option<CoroutineId> {
        self.shared.table(|table| table.running())
    }

    /// Number of slots, doubles whenever a spawn finds them all occupied.
    pub fn capacity(&self) -> usize {
        self.shared.table(|table| table.capacity())
    }

    /// Number of live coroutines.
    pub fn len(&self) -> usize {
        self.shared.table(|table| table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usable bytes of the shared stack.
    pub fn stack_size(&self) -> usize {
        self.shared.stack.usable_length()
    }

    /// Bytes of stack saved at the coroutine's latest suspension, [None] for an empty slot.
    pub fn backup_size(&self, id: CoroutineId) -> Option<usize> {
        self.shared
            .table(|table| table.get(id).map(|coroutine| coroutine.backup.size()))
    }

    /// Bytes allocated for the coroutine's stack backup, [None] for an empty slot.
    pub fn backup_capacity(&self, id: CoroutineId) -> Option<usize> {
        self.shared
            .table(|table| table.get(id).map(|coroutine| coroutine.backup.capacity()))
    }

    /// Destroys every remaining coroutine, whatever its status, and releases the shared stack.
    ///
    /// Values owned by the frames of suspended coroutines are leaked, their destructors never run.
    /// Dropping the scheduler does the same.
    pub fn close(self) {
        drop(self);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.shared.table(|table| {
            f.debug_struct("Scheduler")
                .field("capacity", &table.capacity())
                .field("len", &table.len())
                .field("running", &table.running())
                .field("stack_size", &self.shared.stack.usable_length())
                .finish()
        })
    }
}

/// Entry point of every coroutine, runs on the shared stack.
extern "C" fn trampoline(argument: *mut ()) -> ! {
    // safety: resume passes its scheduler, which outlives the coroutine's execution
    let shared = unsafe { &*(argument as *const Shared) };

    let (id, body) = shared.table(|table| {
        let id = table.running().expect("trampoline entered without a running coroutine");
        let body = table.entry.take().expect("trampoline entered without a body");
        (id, body)
    });

    let yielder = Yielder {
        shared: NonNull::from(shared),
        id,
        _marker: PhantomData,
    };
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| body(&yielder)));

    shared.table(|table| {
        table.panic = result.err();
        table.remove(id);
    });

    // return to the host for good
    let mut dummy = MaybeUninit::uninit();
    unsafe { context_switch::jump(dummy.as_mut_ptr(), shared.main()) };
    unreachable!()
}

/// A coroutine's handle to its own scheduler.
///
/// Only exists while the coroutine's body runs.
pub struct Yielder {
    shared: NonNull<Shared>,
    id: CoroutineId,
    _marker: PhantomData<*mut ()>,
}

impl Yielder {
    /// Suspends the coroutine, returning once it's resumed.
    ///
    /// # Errors
    /// [Error::BackupExhausted] if there's no memory to back up the stack.
    /// The coroutine keeps running without suspending.
    pub fn yield_now(&self) -> Result<()> {
        let shared = self.shared();

        // the few bytes pushed by the switch itself are grown into by the host side save
        let marker = 0u8;
        let size = shared.stack.depth(ptr::addr_of!(marker));

        let (from, to) = shared.table(|table| -> Result<_> {
            assert_eq!(
                table.running(),
                Some(self.id),
                "coroutine {} can only yield while it's running",
                self.id,
            );

            let coroutine = table.get_mut(self.id).expect("running coroutine has a slot");
            coroutine
                .backup
                .reserve(size)
                .map_err(|source| Error::BackupExhausted { size, source })?;
            coroutine.suspend();
            let from = ptr::addr_of_mut!(coroutine.continuation);

            table.set_running(None);
            Ok((from, shared.main() as *const Continuation))
        })?;

        unsafe { context_switch::jump(from, to) };

        Ok(())
    }

    /// Id of the coroutine this yielder belongs to.
    pub fn id(&self) -> CoroutineId {
        self.id
    }

    /// Status of any coroutine on the same scheduler.
    ///
    /// # Panics
    /// If [id] is outside the table.
    pub fn status(&self, id: CoroutineId) -> Status {
        self.shared().table(|table| table.status(id))
    }

    fn shared(&self) -> &Shared {
        // safety: the scheduler is borrowed by resume for as long as the body runs
        unsafe { self.shared.as_ref() }
    }
}

impl fmt::Debug for Yielder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Yielder").field("id", &self.id).finish()
    }
}
