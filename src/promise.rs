use crate::continuation::{guard, Recover};
use crate::{combinators, Continuation, Deferred, Error, Resolver};
use futures::executor::block_on;
use futures::future::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The capability handed to a constructor callback to fulfill its promise.
pub type ResolveFn<T> = Box<dyn FnOnce(T) + Send>;
/// The capability handed to a constructor callback to reject its promise.
pub type RejectFn = Box<dyn FnOnce(Error) + Send>;

/// A promise over one deferred unit.
///
/// `Promise<()>` is the untyped promise; any other `T` threads a value through
/// the chain. Every chaining method consumes the promise and returns a new
/// one immediately, the work happens on the host scheduler once the backing
/// unit settles.
///
/// Awaiting a promise yields its value or its error, with aggregate errors
/// unwrapped (see [`Error::unwrap_aggregate`]).
///
/// # Examples
///
/// ```
/// use promise_chain::{Error, Promise};
///
/// let tail = Promise::resolved()
///     .then(|()| Ok(1))
///     .then(|n| Ok(n + 1))
///     .then_promise(|n| {
///         assert_eq!(n, 2);
///         Promise::<()>::reject(Error::msg("x"))
///     });
/// assert_eq!(tail.wait().unwrap_err().to_string(), "x");
/// ```
#[derive(Debug)]
pub struct Promise<T = ()> {
    backing: Deferred<T>,
}

impl Promise<()> {
    /// An already fulfilled untyped promise.
    pub fn resolved() -> Self {
        Promise::resolve(())
    }
}

impl<T> Promise<T> {
    pub fn resolve(value: T) -> Self {
        Promise {
            backing: Deferred::fulfilled(value),
        }
    }

    pub fn reject(error: Error) -> Self {
        Promise {
            backing: Deferred::rejected(error),
        }
    }

    /// Wraps a caller supplied unit.
    pub fn from_deferred(backing: Deferred<T>) -> Self {
        Promise { backing }
    }

    pub fn into_deferred(self) -> Deferred<T> {
        self.backing
    }

    /// A pending promise and the resolver that settles it.
    pub fn pending() -> (Resolver<T>, Self) {
        let (resolver, backing) = Deferred::pending();
        (resolver, Promise { backing })
    }

    /// Runs `callback` synchronously with the two settling capabilities.
    ///
    /// An `Err` returned by the callback (or a panic) rejects the promise
    /// unless a capability was already called. The first settlement wins.
    ///
    /// ```
    /// use promise_chain::{Error, Promise};
    /// use std::thread;
    ///
    /// let promise = Promise::new(|resolve, _reject| {
    ///     thread::spawn(move || resolve(7));
    ///     Ok(())
    /// });
    /// assert_eq!(promise.wait().unwrap(), 7);
    ///
    /// let failed = Promise::<u8>::new(|_resolve, _reject| Err(Error::msg("refused")));
    /// assert_eq!(failed.wait().unwrap_err().to_string(), "refused");
    /// ```
    pub fn new<F>(callback: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(ResolveFn<T>, RejectFn) -> Result<(), Error>,
    {
        let (resolver, promise) = Promise::pending();
        let resolve = {
            let resolver = resolver.clone();
            Box::new(move |value| {
                resolver.resolve(value);
            }) as ResolveFn<T>
        };
        let reject = {
            let resolver = resolver.clone();
            Box::new(move |error| {
                resolver.reject(error);
            }) as RejectFn
        };
        if let Err(error) = guard(move || callback(resolve, reject)) {
            log::debug!("promise constructor failed: {}", error);
            resolver.reject(error);
        }
        promise
    }

    /// The single capability form of [`Promise::new`].
    pub fn with_resolve<F>(callback: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(ResolveFn<T>) -> Result<(), Error>,
    {
        Promise::new(move |resolve, _reject| callback(resolve))
    }

    /// Blocks the current thread until the promise settles.
    ///
    /// Do not call this from a continuation running on the scheduler; await
    /// the promise there instead.
    pub fn wait(self) -> Result<T, Error> {
        block_on(self)
    }

    pub fn is_settled(&self) -> bool {
        self.backing.is_settled()
    }
}

impl<T: Send + 'static> Promise<T> {
    /// Adapts a running asynchronous unit. The future is driven on the host
    /// scheduler.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let (resolver, promise) = Promise::pending();
        crate::scheduler::spawn(async move {
            let outcome = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(Error::from_panic(payload)));
            resolver.settle(outcome);
        });
        promise
    }

    /// Attaches a success handler producing the next value directly.
    ///
    /// A rejection is passed on unchanged.
    pub fn then<U, F>(self, on_fulfilled: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, Error> + Send + 'static,
    {
        self.chain(Continuation::map(on_fulfilled), None)
    }

    /// Attaches a success handler returning a nested promise. The returned
    /// promise adopts the nested promise's outcome.
    pub fn then_promise<U, F>(self, on_fulfilled: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        self.chain(Continuation::promise(on_fulfilled), None)
    }

    /// Attaches a success handler returning a future. The returned promise
    /// adopts the future's outcome.
    pub fn then_async<U, F, Fut>(self, on_fulfilled: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, Error>> + Send + 'static,
    {
        self.chain(Continuation::task(on_fulfilled), None)
    }

    /// Attaches a success handler of any shape together with a rejection
    /// handler.
    ///
    /// The rejection handler sees the unwrapped error. Once it returns `Ok`,
    /// the rejection counts as handled and the returned promise fulfills with
    /// `U::default()`. If it returns `Err`, that error rejects the returned
    /// promise.
    ///
    /// ```
    /// use promise_chain::{Continuation, Error, Promise};
    ///
    /// let recovered = Promise::<u32>::reject(Error::msg("lost"))
    ///     .then_or_else(Continuation::map(|n| Ok(n * 2)), |err| {
    ///         assert_eq!(err.to_string(), "lost");
    ///         Ok(())
    ///     });
    /// assert_eq!(recovered.wait().unwrap(), 0);
    /// ```
    pub fn then_or_else<U, R>(self, on_fulfilled: Continuation<T, U>, on_rejected: R) -> Promise<U>
    where
        U: Default + Send + 'static,
        R: FnOnce(Error) -> Result<(), Error> + Send + 'static,
    {
        let recover: Recover<U> = Box::new(move |error| on_rejected(error).map(|()| U::default()));
        self.chain(on_fulfilled, Some(recover))
    }

    /// Handles a rejection and ends the typed part of the chain.
    ///
    /// On fulfillment the value is discarded. On rejection `on_error` runs
    /// with the unwrapped error. Either way the returned promise fulfills,
    /// unless `on_error` itself fails.
    pub fn catch<F>(self, on_error: F) -> Promise<()>
    where
        F: FnOnce(Error) -> Result<(), Error> + Send + 'static,
    {
        self.then_or_else(Continuation::map(|_| Ok(())), on_error)
    }

    /// Runs `on_final` once the promise settles, whichever way, and passes
    /// the outcome on untouched.
    ///
    /// A panic inside `on_final` rejects the returned promise.
    pub fn finally<F>(self, on_final: F) -> Promise<T>
    where
        F: FnOnce() + Send + 'static,
    {
        let (resolver, promise) = Promise::pending();
        self.backing.on_settled(move |outcome| async move {
            let outcome = guard(move || {
                on_final();
                Ok(())
            })
            .and(outcome);
            resolver.settle(outcome);
        });
        promise
    }

    /// Wires the continuation onto the backing unit and returns the promise
    /// it drives.
    fn chain<U>(self, on_fulfilled: Continuation<T, U>, on_rejected: Option<Recover<U>>) -> Promise<U>
    where
        U: Send + 'static,
    {
        let (resolver, promise) = Promise::pending();
        self.backing.on_settled(move |outcome| async move {
            let outcome = match outcome {
                Ok(value) => on_fulfilled.invoke(value).await,
                Err(error) => match on_rejected {
                    Some(recover) => {
                        let error = error.unwrap_aggregate();
                        guard(move || recover(error))
                    }
                    None => {
                        log::debug!("propagating unhandled rejection: {}", error);
                        Err(error)
                    }
                },
            };
            resolver.settle(outcome);
        });
        promise
    }

    /// Fulfills with every value, in input order, once all inputs fulfill.
    /// See [`combinators::all`].
    pub fn all<I, P>(promises: I) -> Promise<Vec<T>>
    where
        I: IntoIterator<Item = P>,
        P: Into<Promise<T>>,
    {
        combinators::all(promises)
    }

    /// See [`combinators::race`].
    pub fn race<I, P>(promises: I) -> Promise<T>
    where
        T: Default,
        I: IntoIterator<Item = P>,
        P: Into<Promise<T>>,
    {
        combinators::race(promises)
    }

    /// See [`combinators::any`].
    pub fn any<I, P>(promises: I) -> Promise<T>
    where
        T: Default,
        I: IntoIterator<Item = P>,
        P: Into<Promise<T>>,
    {
        combinators::any(promises)
    }
}

impl<T> From<Deferred<T>> for Promise<T> {
    fn from(backing: Deferred<T>) -> Self {
        Promise::from_deferred(backing)
    }
}

impl<T> From<Promise<T>> for Deferred<T> {
    fn from(promise: Promise<T>) -> Self {
        promise.into_deferred()
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.backing)
            .poll(cx)
            .map_err(Error::unwrap_aggregate)
    }
}
