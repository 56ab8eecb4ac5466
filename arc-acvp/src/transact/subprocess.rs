#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Subject-under-test running as a child process.
//!
//! Requests are written to the child's stdin in submission order; a reader task
//! takes response frames from its stdout and hands each to the oldest waiting
//! request. Any number of requests may be in flight at once.

use super::{Results, Transactor, check_result_count, wire};
use crate::config::SubprocessConfig;
use crate::error::{AcvpError, SubjectError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type Waiter = oneshot::Sender<Result<Results, SubjectError>>;

/// Waiting requests in the order they were written.
#[derive(Default)]
struct PendingQueue {
    waiters: Mutex<VecDeque<Waiter>>,
    closed: AtomicBool,
}

impl PendingQueue {
    fn fail_all(&self) {
        self.closed.store(true, Ordering::Release);
        let waiters: Vec<Waiter> = self.waiters.lock().drain(..).collect();
        for waiter in waiters {
            let _ = waiter.send(Err(SubjectError::Closed));
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Fails every waiter unless disarmed. A request write dropped part way leaves a
/// partial frame on the subject's stdin, and nothing after it can be paired.
struct WriteGuard<'a> {
    pending: &'a PendingQueue,
    complete: bool,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if !self.complete {
            warn!("Request write did not complete; closing subject transport");
            self.pending.fail_all();
        }
    }
}

/// [`Transactor`] backed by a child process speaking the [`wire`] framing.
pub struct SubprocessTransactor {
    stdin: AsyncMutex<Option<ChildStdin>>,
    child: AsyncMutex<Child>,
    pending: Arc<PendingQueue>,
    reader: JoinHandle<()>,
    timeout: Duration,
}

impl SubprocessTransactor {
    /// Starts the subject described by `config`.
    ///
    /// # Errors
    /// Returns [`AcvpError::Configuration`] if the configuration is invalid or the
    /// process cannot be started.
    pub fn spawn(config: &SubprocessConfig) -> Result<Self, AcvpError> {
        config.validate()?;

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AcvpError::Configuration(format!(
                    "failed to start subject {}: {e}",
                    config.program.display()
                ))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(AcvpError::Configuration("subject stdio was not captured".to_string()));
        };

        let pending = Arc::new(PendingQueue::default());
        let reader = tokio::spawn(pump_responses(stdout, Arc::clone(&pending)));

        info!(program = %config.program.display(), pid = ?child.id(), "Started subject process");

        Ok(Self {
            stdin: AsyncMutex::new(Some(stdin)),
            child: AsyncMutex::new(child),
            pending,
            reader,
            timeout: config.transact_timeout,
        })
    }

    /// Asks the subject for its capability document (`getConfig`).
    ///
    /// # Errors
    /// Returns a [`SubjectError`] if the call fails or the answer is not JSON.
    pub async fn capabilities(&self) -> Result<serde_json::Value, SubjectError> {
        let results = self.transact("getConfig", 1, &[]).await?;
        let document = results.first().map(Vec::as_slice).unwrap_or_default();
        serde_json::from_slice(document)
            .map_err(|e| SubjectError::MalformedResult(format!("getConfig: {e}")))
    }

    /// Closes the subject's stdin and waits for it to exit, killing it if it
    /// does not exit within the transaction timeout.
    ///
    /// # Errors
    /// Returns [`SubjectError::Io`] if waiting on or killing the process fails.
    pub async fn shutdown(&self) -> Result<ExitStatus, SubjectError> {
        drop(self.stdin.lock().await.take());

        let mut child = self.child.lock().await;
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("Subject did not exit after stdin closed; killing it");
                child.kill().await?;
                child.wait().await?
            }
        };
        self.pending.fail_all();
        debug!(?status, "Subject process exited");
        Ok(status)
    }

    async fn submit(
        &self,
        operation: &str,
        args: &[&[u8]],
    ) -> Result<oneshot::Receiver<Result<Results, SubjectError>>, SubjectError> {
        let frame = wire::encode_request(operation, args)?;
        let (tx, rx) = oneshot::channel();

        let mut guard = self.stdin.lock().await;
        let stdin = match guard.as_mut() {
            Some(stdin) if !self.pending.is_closed() => stdin,
            _ => return Err(SubjectError::Closed),
        };
        // Queue before writing so a fast reply always finds its waiter.
        self.pending.waiters.lock().push_back(tx);
        let mut guard = WriteGuard { pending: &self.pending, complete: false };
        let written = async {
            stdin.write_all(&frame).await?;
            stdin.flush().await
        }
        .await;
        if let Err(e) = written {
            error!(operation, "Failed to write request to subject: {}", e);
            return Err(e.into());
        }
        guard.complete = true;
        Ok(rx)
    }
}

#[async_trait]
impl Transactor for SubprocessTransactor {
    async fn transact(
        &self,
        operation: &str,
        expected_results: usize,
        args: &[&[u8]],
    ) -> Result<Results, SubjectError> {
        let rx = self.submit(operation, args).await?;
        let answer = tokio::time::timeout(self.timeout, rx).await.map_err(|_| {
            SubjectError::Timeout { operation: operation.to_string(), after: self.timeout }
        })?;
        let results = answer.map_err(|_| SubjectError::Closed)??;
        check_result_count(operation, expected_results, results)
    }
}

impl Drop for SubprocessTransactor {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn pump_responses(mut stdout: ChildStdout, pending: Arc<PendingQueue>) {
    loop {
        match wire::read_frame(&mut stdout).await {
            Ok(results) => {
                let waiter = pending.waiters.lock().pop_front();
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(Ok(results));
                    }
                    None => {
                        error!("Subject sent a response nobody asked for");
                        break;
                    }
                }
            }
            Err(SubjectError::Closed) => {
                debug!("Subject closed its stdout");
                break;
            }
            Err(e) => {
                error!("Failed to read subject response: {}", e);
                break;
            }
        }
    }
    pending.fail_all();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_rejects_missing_program() {
        let config = SubprocessConfig::new("/nonexistent/acvp-subject");
        let err = SubprocessTransactor::spawn(&config).err();
        assert!(matches!(err, Some(AcvpError::Configuration(_))));
    }

    #[tokio::test]
    async fn spawn_rejects_invalid_config() {
        let config = SubprocessConfig::new("");
        assert!(matches!(SubprocessTransactor::spawn(&config), Err(AcvpError::Configuration(_))));
    }

    #[tokio::test]
    async fn interrupted_write_closes_transport() {
        // `sleep` never reads stdin, so a large request blocks once the pipe is full.
        let config = SubprocessConfig::new("sleep").with_arg("30");
        let subject = SubprocessTransactor::spawn(&config).unwrap();
        let large = vec![0u8; 4 << 20];

        let interrupted = tokio::time::timeout(
            Duration::from_millis(200),
            subject.transact("cSHAKE-128", 1, &[large.as_slice()]),
        )
        .await;
        assert!(interrupted.is_err(), "write should still be blocked");
        assert!(subject.pending.is_closed());

        let err = subject.transact("getConfig", 1, &[]).await.unwrap_err();
        assert!(matches!(err, SubjectError::Closed));
    }

    #[test]
    fn completed_write_keeps_transport_open() {
        let pending = PendingQueue::default();
        let mut guard = WriteGuard { pending: &pending, complete: false };
        guard.complete = true;
        drop(guard);
        assert!(!pending.is_closed());
    }

    #[test]
    fn fail_all_notifies_waiters_and_closes() {
        let pending = PendingQueue::default();
        let (tx, mut rx) = oneshot::channel();
        pending.waiters.lock().push_back(tx);
        pending.fail_all();
        assert!(pending.is_closed());
        assert!(matches!(rx.try_recv(), Ok(Err(SubjectError::Closed))));
    }
}
