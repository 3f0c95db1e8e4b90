use crate::{Error, Promise};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The shape of a success handler, fixed when the handler is attached.
///
/// Whatever the shape, running it yields the outcome the next promise in the
/// chain settles with. Nested promises and futures are awaited, so a chain
/// never produces a promise of a promise.
pub enum Continuation<T, U> {
    /// Produces the next value directly. Handlers that return nothing use
    /// `U = ()`.
    Map(Box<dyn FnOnce(T) -> Result<U, Error> + Send>),
    /// Returns a promise whose outcome is adopted.
    Promise(Box<dyn FnOnce(T) -> Promise<U> + Send>),
    /// Returns a future whose outcome is adopted.
    Task(Box<dyn FnOnce(T) -> BoxFuture<'static, Result<U, Error>> + Send>),
}

/// A rejection handler after it has been lifted to produce the next value.
pub(crate) type Recover<U> = Box<dyn FnOnce(Error) -> Result<U, Error> + Send>;

impl<T, U> Continuation<T, U> {
    pub fn map<F>(on_fulfilled: F) -> Self
    where
        F: FnOnce(T) -> Result<U, Error> + Send + 'static,
    {
        Continuation::Map(Box::new(on_fulfilled))
    }

    pub fn promise<F>(on_fulfilled: F) -> Self
    where
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        Continuation::Promise(Box::new(on_fulfilled))
    }

    pub fn task<F, Fut>(on_fulfilled: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, Error>> + Send + 'static,
    {
        Continuation::Task(Box::new(move |value| on_fulfilled(value).boxed()))
    }
}

impl<T, U> Continuation<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    pub(crate) async fn invoke(self, value: T) -> Result<U, Error> {
        match self {
            Continuation::Map(f) => guard(move || f(value)),
            Continuation::Promise(f) => {
                let nested = guard(move || Ok(f(value)))?;
                nested.into_deferred().await
            }
            Continuation::Task(f) => {
                let task = guard(move || Ok(f(value)))?;
                AssertUnwindSafe(task)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(Error::from_panic(payload)))
            }
        }
    }
}

/// Runs a user callback, turning a panic into a rejection.
pub(crate) fn guard<R, F>(callback: F) -> Result<R, Error>
where
    F: FnOnce() -> Result<R, Error>,
{
    catch_unwind(AssertUnwindSafe(callback)).unwrap_or_else(|payload| Err(Error::from_panic(payload)))
}
