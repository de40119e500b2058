//! Owning-thread scheduler
//!
//! All surface mutation and SDK calls happen on one dedicated thread. The
//! state it owns is built on that thread by a factory and never leaves it;
//! other threads reach it by sending closures through a channel. This is the
//! only suspension point in the bridge.
//!
//! Asynchronous operations hand their caller a [`Completion`] and keep the
//! paired [`Resolver`] in the owned state until the capability answers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, trace};

use crate::app::error::PluginError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to spawn owner thread: {0}")]
    SpawnFailed(String),

    #[error("Owner thread has stopped")]
    Stopped,

    #[error("Blocking call issued from the owner thread itself")]
    Reentrant,

    #[error("Timed out waiting for the owner thread")]
    Timeout,
}

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Job<S>),
    Shutdown,
}

/// Cloneable handle for posting work to the owner thread
pub struct Marshal<S> {
    tx: Sender<Message<S>>,
    owner: ThreadId,
}

impl<S> Clone for Marshal<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            owner: self.owner,
        }
    }
}

impl<S> std::fmt::Debug for Marshal<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marshal").field("owner", &self.owner).finish()
    }
}

impl<S> Marshal<S> {
    /// Queue a closure without waiting for it; used for capability callbacks
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<(), SchedulerError> {
        self.tx
            .send(Message::Run(Box::new(job)))
            .map_err(|_| SchedulerError::Stopped)
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Run a closure on the owner thread and wait for its result
    pub fn run<R>(&self, job: impl FnOnce(&mut S) -> R + Send + 'static) -> Result<R, SchedulerError>
    where
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return Err(SchedulerError::Reentrant);
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.post(move |state| {
            let _ = reply_tx.send(job(state));
        })?;
        reply_rx.recv().map_err(|_| SchedulerError::Stopped)
    }
}

/// Dedicated thread owning a value of type `S`
///
/// Dropping the handle drains nothing further: the loop stops at the
/// shutdown marker and the owned state is dropped on its own thread.
pub struct OwnerThread<S> {
    marshal: Marshal<S>,
    thread_handle: Option<JoinHandle<()>>,
}

impl<S: 'static> OwnerThread<S> {
    /// Start the thread and build its state there
    pub fn spawn<F>(name: &str, factory: F) -> Result<Self, SchedulerError>
    where
        F: FnOnce(Marshal<S>) -> S + Send + 'static,
    {
        let (tx, rx) = unbounded::<Message<S>>();
        let (id_tx, id_rx) = bounded::<ThreadId>(1);
        let loop_tx = tx.clone();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let owner = thread::current().id();
                let _ = id_tx.send(owner);
                let state = factory(Marshal { tx: loop_tx, owner });
                Self::message_loop(state, rx);
            })
            .map_err(|err| SchedulerError::SpawnFailed(err.to_string()))?;

        let owner = id_rx.recv().map_err(|_| SchedulerError::Stopped)?;
        debug!(thread = name, "owner thread started");

        Ok(Self {
            marshal: Marshal { tx, owner },
            thread_handle: Some(handle),
        })
    }

    fn message_loop(mut state: S, rx: Receiver<Message<S>>) {
        while let Ok(message) = rx.recv() {
            match message {
                Message::Run(job) => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&mut state)));
                    if let Err(payload) = outcome {
                        error!(panic = panic_message(payload.as_ref()), "owner thread job panicked");
                    }
                }
                Message::Shutdown => break,
            }
        }
        trace!("owner thread loop exited");
    }
}

impl<S> OwnerThread<S> {
    pub fn marshal(&self) -> &Marshal<S> {
        &self.marshal
    }

    pub fn run<R>(&self, job: impl FnOnce(&mut S) -> R + Send + 'static) -> Result<R, SchedulerError>
    where
        R: Send + 'static,
    {
        self.marshal.run(job)
    }

    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> Result<(), SchedulerError> {
        self.marshal.post(job)
    }
}

impl<S> Drop for OwnerThread<S> {
    fn drop(&mut self) {
        let _ = self.marshal.tx.send(Message::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if self.marshal.is_owner_thread() {
                return;
            }
            if handle.join().is_err() {
                error!("owner thread panicked during shutdown");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Create a linked resolver/completion pair
pub fn completion<T>() -> (Resolver<T>, Completion<T>) {
    let (tx, rx) = bounded(1);
    (Resolver { tx: Some(tx) }, Completion { rx })
}

/// Caller's side of an asynchronous operation
#[derive(Debug)]
pub struct Completion<T> {
    rx: Receiver<Result<T, PluginError>>,
}

impl<T> Completion<T> {
    /// A completion that is already settled
    pub fn settled(result: Result<T, PluginError>) -> Self {
        let (resolver, completion) = completion();
        resolver.settle(result);
        completion
    }

    pub fn wait(self) -> Result<T, PluginError> {
        self.rx.recv().unwrap_or(Err(PluginError::Abandoned))
    }

    pub fn wait_timeout(self, timeout: Duration) -> Result<T, PluginError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SchedulerError::Timeout.into()),
            Err(RecvTimeoutError::Disconnected) => Err(PluginError::Abandoned),
        }
    }

    /// Non-blocking check; `None` while the operation is still outstanding
    pub fn try_take(&self) -> Option<Result<T, PluginError>> {
        self.rx.try_recv().ok()
    }
}

/// Owner's side of an asynchronous operation
///
/// Settles exactly once. A resolver dropped without settling rejects its
/// completion with [`PluginError::Abandoned`].
#[derive(Debug)]
pub struct Resolver<T> {
    tx: Option<Sender<Result<T, PluginError>>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: impl Into<PluginError>) {
        self.settle(Err(err.into()));
    }

    pub fn settle(mut self, result: Result<T, PluginError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(PluginError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::StateError;

    #[test]
    fn run_returns_result_from_owner() {
        let owner = OwnerThread::spawn("test-owner", |_| 41_u32).unwrap();
        let value = owner
            .run(|state| {
                *state += 1;
                *state
            })
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn jobs_run_in_post_order() {
        let owner = OwnerThread::spawn("test-owner", |_| Vec::<u32>::new()).unwrap();
        for i in 0..5 {
            owner.post(move |log| log.push(i)).unwrap();
        }
        let log = owner.run(|log| log.clone()).unwrap();
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reentrant_run_is_rejected() {
        struct Looped {
            marshal: Marshal<Looped>,
        }

        let owner = OwnerThread::spawn("test-owner", |marshal| Looped { marshal }).unwrap();
        let result = owner.run(|state: &mut Looped| state.marshal.run(|_| ())).unwrap();
        assert_eq!(result, Err(SchedulerError::Reentrant));
    }

    #[test]
    fn state_is_built_on_owner_thread() {
        let owner = OwnerThread::spawn("test-owner", |_| thread::current().id()).unwrap();
        let built_on = owner.run(|id| *id).unwrap();
        assert_ne!(built_on, thread::current().id());
        assert!(!owner.marshal().is_owner_thread());
    }

    #[test]
    fn panicking_job_does_not_stop_loop() {
        let owner = OwnerThread::spawn("test-owner", |_| 0_u32).unwrap();
        owner.post(|_| panic!("boom")).unwrap();
        assert_eq!(owner.run(|state| *state).unwrap(), 0);
    }

    #[test]
    fn dropped_resolver_rejects() {
        let (resolver, completion) = completion::<u32>();
        drop(resolver);
        assert_eq!(completion.wait(), Err(PluginError::Abandoned));
    }

    #[test]
    fn resolver_settles_once() {
        let (resolver, completion) = completion::<u32>();
        resolver.reject(StateError::NotReady);
        assert_eq!(
            completion.wait_timeout(Duration::from_secs(1)),
            Err(PluginError::State(StateError::NotReady))
        );
    }

    #[test]
    fn outstanding_completion_times_out() {
        let (_resolver, completion) = completion::<u32>();
        assert!(completion.try_take().is_none());
        assert_eq!(
            completion.wait_timeout(Duration::from_millis(10)),
            Err(PluginError::Scheduler(SchedulerError::Timeout))
        );
    }
}
