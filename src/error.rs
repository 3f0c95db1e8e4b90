use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

/// The error carried by a rejected promise.
///
/// Errors are cheap to clone so a settled outcome can be handed to whichever
/// continuation or awaiter ends up observing it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync + 'static>),
    /// A user callback panicked while it ran.
    #[error("callback panicked: {0}")]
    Panicked(String),
    /// Every resolver of a pending unit was dropped before settling it.
    #[error("the promise was abandoned before it settled")]
    ProducerDropped,
    #[error("the deferred outcome was already taken")]
    Consumed,
    /// A container for one or more failures. See [`Error::unwrap_aggregate`].
    #[error("{} error(s) occurred", .0.len())]
    Aggregate(Vec<Error>),
    #[error("scheduler: {0}")]
    Scheduler(String),
}

impl Error {
    pub fn msg(message: impl Display) -> Self {
        Error::Message(message.to_string())
    }

    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(Arc::new(error))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Error::Aggregate(_))
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Other(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Descends through aggregate containers down to the innermost concrete
    /// error.
    ///
    /// Each step follows the first child. An aggregate with no children is
    /// returned as is.
    ///
    /// ```
    /// use promise_chain::Error;
    ///
    /// let nested = Error::Aggregate(vec![Error::Aggregate(vec![Error::msg("boom")])]);
    /// assert_eq!(nested.unwrap_aggregate().to_string(), "boom");
    ///
    /// let empty = Error::Aggregate(vec![]);
    /// assert!(empty.unwrap_aggregate().is_aggregate());
    /// ```
    pub fn unwrap_aggregate(self) -> Error {
        let mut error = self;
        while let Error::Aggregate(inner) = &error {
            match inner.first() {
                Some(first) => error = first.clone(),
                None => break,
            }
        }
        error
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "opaque panic payload".to_string()
        };
        log::warn!("captured panic from promise callback: {}", message);
        Error::Panicked(message)
    }
}
