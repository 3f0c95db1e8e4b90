//! Combinators over a fixed, ordered collection of promises.
//!
//! Every combinator accepts anything convertible into a [`Promise`], so raw
//! [`Deferred`](crate::Deferred) units and promises mix freely. Arrays work as
//! fixed argument lists.
use crate::{Deferred, Error, Promise, Resolver};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

fn backing_units<T, I, P>(promises: I) -> Vec<Deferred<T>>
where
    I: IntoIterator<Item = P>,
    P: Into<Promise<T>>,
{
    promises
        .into_iter()
        .map(|promise| promise.into().into_deferred())
        .collect()
}

/// Fulfills with the values of all inputs, in input order.
///
/// Rejects as soon as any input rejects, with that input's error; later
/// outcomes are discarded. An empty input fulfills with an empty `Vec`.
///
/// ```
/// use promise_chain::{combinators, Promise};
///
/// let all = combinators::all::<u8, _, _>([Promise::resolve(1), Promise::resolve(2)]);
/// assert_eq!(all.wait().unwrap(), vec![1, 2]);
/// ```
pub fn all<T, I, P>(promises: I) -> Promise<Vec<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = P>,
    P: Into<Promise<T>>,
{
    let units = backing_units(promises);
    if units.is_empty() {
        return Promise::resolve(Vec::new());
    }
    log::trace!("waiting for all of {} units", units.len());
    Promise::from_future(try_join_all(units))
}

/// Settles like whichever input settles first, fulfilled or rejected.
///
/// An empty input fulfills with `T::default()`.
pub fn race<T, I, P>(promises: I) -> Promise<T>
where
    T: Default + Send + 'static,
    I: IntoIterator<Item = P>,
    P: Into<Promise<T>>,
{
    let units = backing_units(promises);
    if units.is_empty() {
        return Promise::resolve(T::default());
    }
    let (resolver, promise) = Promise::pending();
    for unit in units {
        let resolver = resolver.clone();
        unit.on_settled(move |outcome| async move {
            if !resolver.settle(outcome) {
                log::trace!("race already decided; discarding a late outcome");
            }
        });
    }
    promise
}

struct AnyState<T> {
    /// Handed out in completion order, not input order.
    next_slot: AtomicUsize,
    remaining: AtomicUsize,
    fulfilled: AtomicBool,
    failures: Vec<Mutex<Option<Error>>>,
    resolver: Resolver<T>,
}

impl<T> AnyState<T> {
    fn complete(&self, outcome: Result<T, Error>) {
        let slot = self.next_slot.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(value) => {
                if self
                    .fulfilled
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.resolver.resolve(value);
                }
            }
            Err(error) => {
                *self.failures[slot]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(error);
            }
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 && !self.fulfilled.load(Ordering::Acquire) {
            self.reject_all();
        }
    }

    /// Every input rejected. The failures are reported in slot order, so the
    /// error surfaced after unwrapping is the one that completed first.
    fn reject_all(&self) {
        let errors: Vec<Error> = self
            .failures
            .iter()
            .filter_map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).take())
            .collect();
        log::debug!("every input of any() rejected ({} failures)", errors.len());
        self.resolver.reject(Error::Aggregate(errors));
    }
}

/// Fulfills with the value of the first input to fulfill.
///
/// Rejects only once every input has rejected. The rejection is an
/// [`Error::Aggregate`] whose children are ordered by the time each input
/// completed, so awaiting it surfaces the earliest failure. An empty input
/// fulfills with `T::default()`.
pub fn any<T, I, P>(promises: I) -> Promise<T>
where
    T: Default + Send + 'static,
    I: IntoIterator<Item = P>,
    P: Into<Promise<T>>,
{
    let units = backing_units(promises);
    if units.is_empty() {
        return Promise::resolve(T::default());
    }
    let (resolver, promise) = Promise::pending();
    let state = Arc::new(AnyState {
        next_slot: AtomicUsize::new(0),
        remaining: AtomicUsize::new(units.len()),
        fulfilled: AtomicBool::new(false),
        failures: units.iter().map(|_| Mutex::new(None)).collect(),
        resolver,
    });
    for unit in units {
        let state = state.clone();
        unit.on_settled(move |outcome| async move { state.complete(outcome) });
    }
    promise
}
