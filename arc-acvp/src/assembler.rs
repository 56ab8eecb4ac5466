#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Ordered assembly of per-group responses.
//!
//! Each group collects its test-case results in a [`GroupResponseBuilder`]. Results
//! that are already known (Monte Carlo chains) are placed directly; asynchronous
//! ones run as tasks tagged with their submission index. Handing the builder to
//! [`ResponseAssembler::checkpoint`] fixes the group's position in the output, and
//! [`ResponseAssembler::drain`] joins the tasks of every group as they finish and
//! returns the groups in checkpoint order with each group's cases in submission
//! order.
//!
//! The first failed task ends the drain, whichever group it belongs to. Dropping the
//! assembler aborts every outstanding task.

use crate::error::{AcvpError, Result};
use crate::xof::types::{TestCaseResponse, TestGroupResponse};
use std::future::{Future, poll_fn};
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

type Joined = std::result::Result<(usize, Result<TestCaseResponse>), JoinError>;

/// Results of one test group, some possibly still in flight.
pub struct GroupResponseBuilder {
    tg_id: u64,
    slots: Vec<Option<TestCaseResponse>>,
    pending: JoinSet<(usize, Result<TestCaseResponse>)>,
}

impl GroupResponseBuilder {
    #[must_use]
    pub fn new(tg_id: u64) -> Self {
        Self { tg_id, slots: Vec::new(), pending: JoinSet::new() }
    }

    /// Number of test cases submitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Appends a result that is already complete.
    pub fn push_ready(&mut self, response: TestCaseResponse) {
        self.slots.push(Some(response));
    }

    /// Appends a result that will be produced by `completion`.
    ///
    /// `completion` starts running immediately on the current tokio runtime.
    pub fn push_pending<F>(&mut self, completion: F)
    where
        F: Future<Output = Result<TestCaseResponse>> + Send + 'static,
    {
        let index = self.slots.len();
        self.slots.push(None);
        self.pending.spawn(async move { (index, completion.await) });
    }

    fn fill(&mut self, joined: Joined) -> Result<()> {
        let (index, response) = joined.map_err(|e| AcvpError::Task(e.to_string()))?;
        let response = response?;
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(response);
        }
        Ok(())
    }

    fn finish(self) -> Result<TestGroupResponse> {
        let tests = self.slots.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| {
            AcvpError::Task(format!("test group {} has an unfinished test case", self.tg_id))
        })?;
        Ok(TestGroupResponse { tg_id: self.tg_id, tests })
    }
}

/// Output buffer of a vector set, in group order.
#[derive(Default)]
pub struct ResponseAssembler {
    groups: Vec<GroupResponseBuilder>,
}

impl ResponseAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes `group` for submissions and appends it to the output order.
    pub fn checkpoint(&mut self, group: GroupResponseBuilder) {
        debug!(tg_id = group.tg_id, tests = group.len(), "Group checkpoint");
        self.groups.push(group);
    }

    /// Waits for all outstanding work and returns the assembled groups.
    ///
    /// # Errors
    /// Returns the first error to complete, from any group. The remaining tasks are
    /// aborted and no partial response is returned.
    pub async fn drain(mut self) -> Result<Vec<TestGroupResponse>> {
        loop {
            let next = poll_fn(|cx| self.poll_next_completion(cx)).await;
            let Some((position, joined)) = next else { break };
            if let Some(group) = self.groups.get_mut(position) {
                group.fill(joined)?;
            }
        }
        self.groups.into_iter().map(GroupResponseBuilder::finish).collect()
    }

    /// Next finished task of any group, with the position of its group.
    fn poll_next_completion(&mut self, cx: &mut Context<'_>) -> Poll<Option<(usize, Joined)>> {
        let mut outstanding = false;
        for (position, group) in self.groups.iter_mut().enumerate() {
            match group.pending.poll_join_next(cx) {
                Poll::Ready(Some(joined)) => return Poll::Ready(Some((position, joined))),
                Poll::Ready(None) => {}
                Poll::Pending => outstanding = true,
            }
        }
        if outstanding { Poll::Pending } else { Poll::Ready(None) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::{SubjectError, VectorLocation};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn digest(tc_id: u64) -> TestCaseResponse {
        TestCaseResponse::digest(tc_id, format!("{tc_id:02x}"), 8)
    }

    #[tokio::test(start_paused = true)]
    async fn reversed_completions_keep_submission_order() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let mut assembler = ResponseAssembler::new();

        for tg_id in 1..=2u64 {
            let mut group = GroupResponseBuilder::new(tg_id);
            for tc_id in 1..=4u64 {
                let finished = Arc::clone(&finished);
                group.push_pending(async move {
                    tokio::time::sleep(Duration::from_millis(100 - tc_id * 10 - tg_id)).await;
                    finished.lock().push((tg_id, tc_id));
                    Ok(digest(tc_id))
                });
            }
            assembler.checkpoint(group);
        }

        let groups = assembler.drain().await.unwrap();
        assert_eq!(groups.iter().map(|g| g.tg_id).collect::<Vec<_>>(), vec![1, 2]);
        for group in &groups {
            let ids: Vec<u64> = group.tests.iter().map(|t| t.tc_id).collect();
            assert_eq!(ids, vec![1, 2, 3, 4]);
        }
        assert_eq!(finished.lock()[0], (2, 4), "latest submission should finish first");
    }

    #[tokio::test]
    async fn ready_and_pending_results_interleave() {
        let mut group = GroupResponseBuilder::new(5);
        group.push_ready(digest(1));
        group.push_pending(async { Ok(digest(2)) });
        group.push_ready(digest(3));
        assert_eq!(group.len(), 3);

        let mut assembler = ResponseAssembler::new();
        assembler.checkpoint(group);
        let groups = assembler.drain().await.unwrap();
        assert_eq!(groups[0].tests, vec![digest(1), digest(2), digest(3)]);
    }

    #[tokio::test]
    async fn empty_group_is_kept() {
        let mut assembler = ResponseAssembler::new();
        assembler.checkpoint(GroupResponseBuilder::new(9));
        let groups = assembler.drain().await.unwrap();
        assert_eq!(groups, vec![TestGroupResponse { tg_id: 9, tests: vec![] }]);
    }

    #[tokio::test]
    async fn drain_surfaces_completion_error() {
        let mut group = GroupResponseBuilder::new(1);
        group.push_pending(async { Ok(digest(1)) });
        group.push_pending(async {
            Err(AcvpError::SubjectFailure {
                location: VectorLocation::case(1, 2),
                source: SubjectError::Closed,
            })
        });
        let mut assembler = ResponseAssembler::new();
        assembler.checkpoint(group);

        let err = assembler.drain().await.unwrap_err();
        assert!(matches!(err, AcvpError::SubjectFailure { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn later_group_failure_is_not_held_behind_slow_group() {
        let started = tokio::time::Instant::now();
        let mut slow = GroupResponseBuilder::new(1);
        slow.push_pending(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(AcvpError::SubjectFailure {
                location: VectorLocation::case(1, 1),
                source: SubjectError::Closed,
            })
        });
        let mut fast = GroupResponseBuilder::new(2);
        fast.push_pending(async {
            Err(AcvpError::SubjectFailure {
                location: VectorLocation::case(2, 2),
                source: SubjectError::Closed,
            })
        });
        let mut assembler = ResponseAssembler::new();
        assembler.checkpoint(slow);
        assembler.checkpoint(fast);

        match assembler.drain().await.unwrap_err() {
            AcvpError::SubjectFailure { location, .. } => {
                assert_eq!(location, VectorLocation::case(2, 2));
            }
            other => unreachable!("unexpected error {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn panicking_completion_is_a_task_error() {
        let mut group = GroupResponseBuilder::new(1);
        group.push_pending(async {
            let missing: Option<TestCaseResponse> = None;
            Ok(missing.expect("completion blew up"))
        });
        let mut assembler = ResponseAssembler::new();
        assembler.checkpoint(group);
        assert!(matches!(assembler.drain().await, Err(AcvpError::Task(_))));
    }
}
