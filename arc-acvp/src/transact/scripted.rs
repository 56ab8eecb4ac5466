#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! In-memory [`Transactor`] for tests and dry runs.
//!
//! Results come from a responder closure. Every call is recorded, and an optional
//! delay function controls when each asynchronous completion finishes, which lets
//! tests force completions to arrive out of submission order.

use super::{Completion, Results, Transactor, check_result_count};
use crate::error::SubjectError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Responder = dyn Fn(&str, &[&[u8]]) -> Result<Results, SubjectError> + Send + Sync;
type CompletionDelay = dyn Fn(usize) -> Duration + Send + Sync;

/// One call made against a [`ScriptedTransactor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Position of the call among all calls, starting at 0.
    pub index: usize,
    /// Operation name.
    pub operation: String,
    /// Number of results requested.
    pub expected_results: usize,
    /// Arguments as submitted.
    pub args: Vec<Vec<u8>>,
    /// Whether the call was non-blocking.
    pub asynchronous: bool,
}

#[derive(Default)]
struct ScriptedState {
    calls: Vec<RecordedCall>,
    completion_order: Vec<usize>,
}

/// Scripted subject-under-test.
pub struct ScriptedTransactor {
    responder: Box<Responder>,
    delay: Option<Box<CompletionDelay>>,
    state: Mutex<ScriptedState>,
}

impl ScriptedTransactor {
    /// Transactor answering every call with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &[&[u8]]) -> Result<Results, SubjectError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            state: Mutex::new(ScriptedState::default()),
        }
    }

    /// Delay each asynchronous completion by `delay(call_index)` before it resolves.
    #[must_use]
    pub fn with_completion_delay<D>(mut self, delay: D) -> Self
    where
        D: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    /// Every call made so far, in submission order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Call indices of asynchronous completions, in the order they finished.
    #[must_use]
    pub fn completion_order(&self) -> Vec<usize> {
        self.state.lock().completion_order.clone()
    }

    fn record(
        &self,
        operation: &str,
        expected_results: usize,
        args: Vec<Vec<u8>>,
        asynchronous: bool,
    ) -> usize {
        let mut state = self.state.lock();
        let index = state.calls.len();
        state.calls.push(RecordedCall {
            index,
            operation: operation.to_string(),
            expected_results,
            args,
            asynchronous,
        });
        index
    }

    fn respond(
        &self,
        operation: &str,
        expected_results: usize,
        args: &[&[u8]],
    ) -> Result<Results, SubjectError> {
        let results = (self.responder)(operation, args)?;
        check_result_count(operation, expected_results, results)
    }
}

#[async_trait]
impl Transactor for ScriptedTransactor {
    async fn transact(
        &self,
        operation: &str,
        expected_results: usize,
        args: &[&[u8]],
    ) -> Result<Results, SubjectError> {
        let owned = args.iter().map(|a| a.to_vec()).collect();
        self.record(operation, expected_results, owned, false);
        self.respond(operation, expected_results, args)
    }

    fn transact_async(
        self: Arc<Self>,
        operation: String,
        expected_results: usize,
        args: Vec<Vec<u8>>,
    ) -> Completion {
        let index = self.record(&operation, expected_results, args.clone(), true);
        let delay = self.delay.as_ref().map(|delay| delay(index));
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let borrowed: Vec<&[u8]> = args.iter().map(Vec::as_slice).collect();
            let result = self.respond(&operation, expected_results, &borrowed);
            self.state.lock().completion_order.push(index);
            result
        })
    }
}
