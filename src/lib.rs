//! Cooperative stackful coroutines that time-share a single execution stack.
//!
//! Every coroutine of a [Scheduler] runs on the same fixed-size stack.
//! When a coroutine yields, only the part of the stack it actually uses is copied into a private
//! buffer, and copied back to the very same addresses when it's resumed.
//! Idle coroutines therefore cost as much memory as their stack depth at the last suspension,
//! rather than a whole stack each.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use costack::{Scheduler, Status};
//!
//! let mut scheduler = Scheduler::open().unwrap();
//! let observed = Rc::new(Cell::new(0));
//!
//! let id = scheduler
//!     .spawn({
//!         let observed = observed.clone();
//!         move |yielder| {
//!             let x = 1;
//!             yielder.yield_now().unwrap();
//!             observed.set(x + 1);
//!         }
//!     })
//!     .unwrap();
//!
//! scheduler.resume(id).unwrap();
//! assert_eq!(scheduler.status(id), Status::Suspended);
//!
//! scheduler.resume(id).unwrap();
//! assert_eq!(scheduler.status(id), Status::Dead);
//! assert_eq!(observed.get(), 2);
//! ```
//!
//! Schedulers are single-threaded and independent of each other.

use std::collections::TryReserveError;
use std::io;

pub use config::{Config, DEFAULT_STACK_SIZE};
pub use scheduler::{CoroutineId, Scheduler, Status, Yielder};

mod config;
mod scheduler;

/// Resource exhaustion, the only failures a caller can recover from.
///
/// Misuse such as resuming from inside a running coroutine panics instead.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to map the shared stack")]
    Stack(#[from] io::Error),

    #[error("failed to grow the coroutine table")]
    TableExhausted(#[source] TryReserveError),

    #[error("failed to grow a stack backup to {size} bytes")]
    BackupExhausted {
        size: usize,
        #[source]
        source: TryReserveError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
