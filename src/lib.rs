//! Promise/A+ style chaining on top of rust futures.
//!
//! A [`Promise`] wraps exactly one [`Deferred`] unit. Each `then`, `catch`
//! and `finally` call wires one continuation onto that unit and hands back a
//! new promise over a fresh unit, so a chain is a forward-only sequence of
//! continuations with no links back.
//!
//! ```
//! use promise_chain::{Error, Promise};
//!
//! let value = Promise::resolved()
//!     .then(|()| Ok(1))
//!     .then(|n| Ok(n + 1))
//!     .then_async(|n| async move { Ok::<_, Error>(n * 10) })
//!     .finally(|| println!("finally"))
//!     .wait()
//!     .unwrap();
//! assert_eq!(value, 20);
//! ```
//!
//! Continuations run on a process-wide thread pool, see [`scheduler`].
pub mod combinators;
mod continuation;
mod deferred;
mod error;
mod promise;
pub mod scheduler;

pub use continuation::Continuation;
pub use deferred::{Deferred, Resolver};
pub use error::Error;
pub use promise::{Promise, RejectFn, ResolveFn};
pub use scheduler::SchedulerConfig;
