//! Run a blocking call with an optional wall-clock deadline.
//!
//! Detector and decoder implementations are synchronous and may sit in
//! native inference or decoding code we cannot interrupt. When a deadline is
//! set the call runs on a worker thread and the caller stops waiting once the
//! deadline passes; the abandoned thread finishes in the background and its
//! result is dropped. Without a deadline the call runs inline.
//!
//! [`DeadlineWorker`] keeps one thread alive across a sequence of calls, so a
//! decode cascade costs one thread rather than one per variant. Every
//! timed-out call strands exactly one thread, which exits as soon as that
//! call returns.
//!
//! Panics inside the call are caught in both modes so one misbehaving
//! capability cannot take the page down with it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Why a deadline-bounded call produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeadlineError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("could not start worker thread: {0}")]
    Spawn(String),
}

/// Run `f`, giving up after `deadline` when one is set.
pub fn run_with_deadline<T, F>(deadline: Option<Duration>, f: F) -> Result<T, DeadlineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match deadline {
        Some(limit) => DeadlineWorker::new(limit).run(f),
        None => catch_unwind(AssertUnwindSafe(f))
            .map_err(|p| DeadlineError::Panicked(panic_message(&*p))),
    }
}

// ── Worker ───────────────────────────────────────────────────────────────────

type Job<T> = Box<dyn FnOnce() -> T + Send>;

struct WorkerHandle<T> {
    jobs: mpsc::Sender<Job<T>>,
    results: mpsc::Receiver<thread::Result<T>>,
}

/// Runs calls one at a time on a reused thread, each bounded by `limit`.
///
/// After a timeout the worker is dropped and the next call starts a fresh
/// thread, so `n` calls with `k` timeouts use at most `k + 1` threads.
pub struct DeadlineWorker<T> {
    limit: Duration,
    handle: Option<WorkerHandle<T>>,
}

impl<T: Send + 'static> DeadlineWorker<T> {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            handle: None,
        }
    }

    /// Run `f` on the worker thread and wait at most `limit` for it.
    pub fn run<F>(&mut self, f: F) -> Result<T, DeadlineError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => spawn_worker()?,
        };
        if handle.jobs.send(Box::new(f)).is_err() {
            return Err(DeadlineError::Panicked("worker exited before the call".into()));
        }

        match handle.results.recv_timeout(self.limit) {
            Ok(Ok(value)) => {
                self.handle = Some(handle);
                Ok(value)
            }
            Ok(Err(p)) => {
                self.handle = Some(handle);
                Err(DeadlineError::Panicked(panic_message(&*p)))
            }
            // Dropping the handle closes the job queue; the thread exits
            // once the overrunning call returns.
            Err(mpsc::RecvTimeoutError::Timeout) => Err(DeadlineError::TimedOut(self.limit)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(DeadlineError::Panicked("worker exited without a result".into()))
            }
        }
    }
}

fn spawn_worker<T: Send + 'static>() -> Result<WorkerHandle<T>, DeadlineError> {
    let (job_tx, job_rx) = mpsc::channel::<Job<T>>();
    let (result_tx, result_rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("barscan-capability".into())
        .spawn(move || {
            for job in job_rx {
                let outcome = catch_unwind(AssertUnwindSafe(job));
                // The receiver is gone when the caller already timed out.
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| DeadlineError::Spawn(e.to_string()))?;
    Ok(WorkerHandle {
        jobs: job_tx,
        results: result_rx,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_call_returns_value() {
        assert_eq!(run_with_deadline(None, || 7), Ok(7));
    }

    #[test]
    fn inline_call_stays_on_caller_thread() {
        let caller = thread::current().id();
        assert_eq!(run_with_deadline(None, || thread::current().id()), Ok(caller));
    }

    #[test]
    fn worker_reuses_one_thread_until_a_timeout() {
        let caller = thread::current().id();
        let mut worker = DeadlineWorker::new(Duration::from_millis(200));

        let first = worker.run(|| thread::current().id()).unwrap();
        let second = worker.run(|| thread::current().id()).unwrap();
        assert_ne!(first, caller);
        assert_eq!(first, second);

        let stuck = worker.run(|| {
            thread::sleep(Duration::from_secs(2));
            thread::current().id()
        });
        assert_eq!(stuck, Err(DeadlineError::TimedOut(Duration::from_millis(200))));

        let fresh = worker.run(|| thread::current().id()).unwrap();
        assert_ne!(fresh, first);
        assert_ne!(fresh, caller);
    }

    #[test]
    fn worker_survives_a_panicking_call() {
        let mut worker = DeadlineWorker::new(Duration::from_secs(5));
        let before = worker.run(|| thread::current().id()).unwrap();
        assert_eq!(
            worker.run(|| -> thread::ThreadId { panic!("boom") }),
            Err(DeadlineError::Panicked("boom".into()))
        );
        assert_eq!(worker.run(|| thread::current().id()), Ok(before));
    }

    #[test]
    fn bounded_call_returns_value() {
        assert_eq!(run_with_deadline(Some(Duration::from_secs(5)), || "ok"), Ok("ok"));
    }

    #[test]
    fn slow_call_times_out() {
        let limit = Duration::from_millis(20);
        let result = run_with_deadline(Some(limit), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert_eq!(result, Err(DeadlineError::TimedOut(limit)));
    }

    #[test]
    fn panics_are_captured() {
        let inline = run_with_deadline(None, || -> u8 { panic!("boom") });
        assert_eq!(inline, Err(DeadlineError::Panicked("boom".into())));

        let threaded = run_with_deadline(Some(Duration::from_secs(5)), || -> u8 {
            panic!("{}", String::from("bang"))
        });
        assert_eq!(threaded, Err(DeadlineError::Panicked("bang".into())));
    }
}
