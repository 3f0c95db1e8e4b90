//! The host scheduler every continuation runs on.
//!
//! A single process-wide `futures` thread pool. It is installed lazily with
//! [`SchedulerConfig::default`] unless [`init`] was called first.
use crate::Error;
use futures::executor::{block_on, ThreadPool};
use std::future::Future;
use std::sync::OnceLock;
use std::thread;

static HOST: OnceLock<Host> = OnceLock::new();

/// Settings for the worker pool that drives continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of worker threads. `None` lets the pool pick one per CPU.
    pub pool_size: Option<usize>,
    pub name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: None,
            name_prefix: String::from("promise-worker-"),
        }
    }
}

impl SchedulerConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn with_name_prefix(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = name_prefix.into();
        self
    }
}

#[derive(Debug)]
enum Host {
    Pool(ThreadPool),
    /// The pool could not be created; each continuation gets its own thread.
    Threads,
}

impl Host {
    fn create(config: &SchedulerConfig) -> Result<Self, Error> {
        if config.pool_size == Some(0) {
            return Err(Error::Scheduler(String::from("pool size must be at least 1")));
        }
        let mut builder = ThreadPool::builder();
        builder.name_prefix(config.name_prefix.clone());
        if let Some(size) = config.pool_size {
            builder.pool_size(size);
        }
        let pool = builder
            .create()
            .map_err(|err| Error::Scheduler(err.to_string()))?;
        Ok(Host::Pool(pool))
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            Host::Pool(pool) => pool.spawn_ok(future),
            Host::Threads => {
                thread::spawn(move || block_on(future));
            }
        }
    }
}

/// Installs the process-wide scheduler.
///
/// Fails if a scheduler is already installed, either by an earlier call or
/// because a promise already needed one.
pub fn init(config: SchedulerConfig) -> Result<(), Error> {
    let host = Host::create(&config)?;
    HOST.set(host)
        .map_err(|_| Error::Scheduler(String::from("scheduler already initialized")))?;
    log::info!("promise scheduler installed: {:?}", config);
    Ok(())
}

pub fn is_initialized() -> bool {
    HOST.get().is_some()
}

fn host() -> &'static Host {
    HOST.get_or_init(|| match Host::create(&SchedulerConfig::default()) {
        Ok(host) => {
            log::debug!("promise scheduler installed with default configuration");
            host
        }
        Err(err) => {
            log::warn!("falling back to thread-per-continuation: {}", err);
            Host::Threads
        }
    })
}

/// Runs `future` to completion on the host scheduler.
pub(crate) fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    host().spawn(future)
}
