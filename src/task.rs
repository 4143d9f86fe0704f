// one-shot worker tasks
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// The worker thread ended without delivering its result.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("worker task ended without a result")]
pub struct TaskLost;

/// A single result computed on a named worker thread.
///
/// The receiving side is the only consumer; dropping the task discards the
/// result whenever it arrives.
pub struct Task<T> {
    rx: Receiver<T>,
}

impl<T: Send + 'static> Task<T> {
    pub fn spawn<F>(name: &str, f: F) -> io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            // Receiver may be gone if the request was superseded.
            let _ = tx.send(f());
        })?;
        Ok(Self { rx })
    }
}

impl<T> Task<T> {
    /// Non-blocking check for the result.
    pub fn poll(&self) -> Option<Result<T, TaskLost>> {
        match self.rx.try_recv() {
            Ok(v) => Some(Ok(v)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskLost)),
        }
    }

    /// Block until the result arrives or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, TaskLost>> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Some(Ok(v)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(TaskLost)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_result_once() {
        let task = Task::spawn("test", || 42).unwrap();
        assert_eq!(task.wait_timeout(Duration::from_secs(5)), Some(Ok(42)));
        // blocks until the worker drops its sender
        assert_eq!(task.wait_timeout(Duration::from_secs(5)), Some(Err(TaskLost)));
    }

    #[test]
    fn panicking_worker_is_reported_lost() {
        let task: Task<u8> = Task::spawn("boom", || panic!("worker failed")).unwrap();
        assert_eq!(task.wait_timeout(Duration::from_secs(5)), Some(Err(TaskLost)));
    }
}
