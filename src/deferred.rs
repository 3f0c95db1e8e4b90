//! The deferred unit a promise is backed by.
//!
//! A [`Deferred`] is the single consumer of one asynchronous outcome and a
//! [`Resolver`] is the capability that settles it. Settlement is single-write:
//! the first `resolve`/`reject` wins and every later attempt is a no-op that
//! reports `false`.
use crate::{scheduler, Error};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

/// This `Resolver` settles exactly one [`Deferred`]. It may be cloned; when
/// the last clone goes away without settling, the unit rejects with
/// [`Error::ProducerDropped`].
///
/// # Examples
///
/// ```
/// use promise_chain::Deferred;
/// use futures::executor::block_on;
/// use std::thread;
/// let (resolver, deferred) = Deferred::<String>::pending();
///
/// let task1 = thread::spawn(move || block_on(async {
///     deferred.await.unwrap()
/// }));
/// assert!(resolver.resolve("Hi".into()));
/// assert!(!resolver.resolve("again".into()));
/// assert_eq!(task1.join().expect("The task1 thread has panicked."), "Hi");
/// ```
#[derive(Debug)]
pub struct Resolver<T> {
    handle: Arc<Handle<T>>,
}

#[derive(Debug)]
pub struct Deferred<T> {
    promise: Arc<Mutex<Inner<T>>>,
}

#[derive(Debug)]
enum WakerState {
    Fresh,
    /// The unit is settled; nothing will wake the consumer again.
    Tainted,
}

#[derive(Debug)]
struct Inner<T> {
    outcome: Option<Result<T, Error>>,
    waker: Result<Waker, WakerState>,
}

#[derive(Debug)]
struct Handle<T> {
    promise: Arc<Mutex<Inner<T>>>,
}

fn lock<T>(promise: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    promise.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Handle<T> {
    fn settle(&self, outcome: Result<T, Error>) -> bool {
        let waker = {
            let mut promise = lock(&self.promise);
            match std::mem::replace(&mut promise.waker, Err(WakerState::Tainted)) {
                Err(WakerState::Tainted) => return false,
                waker => {
                    promise.outcome = Some(outcome);
                    waker
                }
            }
        };
        if let Ok(waker) = waker {
            waker.wake()
        }
        true
    }
}

impl<T> Drop for Handle<T> {
    /// If this is an unsettled unit, reject it so the consumer never hangs.
    fn drop(&mut self) {
        if self.settle(Err(Error::ProducerDropped)) {
            log::debug!("resolver dropped before settling; rejecting deferred unit");
        }
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> Resolver<T> {
    /// Fulfills the unit. Returns `false` if it was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Rejects the unit. Returns `false` if it was already settled.
    pub fn reject(&self, error: Error) -> bool {
        self.settle(Err(error))
    }

    pub fn settle(&self, outcome: Result<T, Error>) -> bool {
        let settled = self.handle.settle(outcome);
        if !settled {
            log::trace!("ignoring settlement of an already settled unit");
        }
        settled
    }

    pub fn is_settled(&self) -> bool {
        matches!(lock(&self.handle.promise).waker, Err(WakerState::Tainted))
    }
}

impl<T> Deferred<T> {
    /// A pending unit together with the capability that settles it.
    pub fn pending() -> (Resolver<T>, Self) {
        let inner = Arc::new(Mutex::new(Inner {
            outcome: None,
            waker: Err(WakerState::Fresh),
        }));
        let handle = Handle {
            promise: inner.clone(),
        };
        (
            Resolver {
                handle: Arc::new(handle),
            },
            Deferred { promise: inner },
        )
    }

    pub fn fulfilled(value: T) -> Self {
        Self::settled(Ok(value))
    }

    pub fn rejected(error: Error) -> Self {
        Self::settled(Err(error))
    }

    pub fn settled(outcome: Result<T, Error>) -> Self {
        Deferred {
            promise: Arc::new(Mutex::new(Inner {
                outcome: Some(outcome),
                waker: Err(WakerState::Tainted),
            })),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(lock(&self.promise).waker, Err(WakerState::Tainted))
    }
}

impl<T: Send + 'static> Deferred<T> {
    /// Registers the one continuation of this unit.
    ///
    /// `continuation` runs on the host scheduler once the unit settles and
    /// receives the settled outcome verbatim.
    pub fn on_settled<F, Fut>(self, continuation: F)
    where
        F: FnOnce(Result<T, Error>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        scheduler::spawn(async move {
            let outcome = self.await;
            log::trace!("deferred unit settled (fulfilled: {})", outcome.is_ok());
            continuation(outcome).await
        });
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut promise = lock(&self.promise);
        match promise.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => match promise.waker {
                Err(WakerState::Tainted) => Poll::Ready(Err(Error::Consumed)),
                _ => {
                    promise.waker = Ok(cx.waker().clone());
                    Poll::Pending
                }
            },
        }
    }
}
