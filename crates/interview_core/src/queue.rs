//! crates/interview_core/src/queue.rs
//!
//! The asynchronous answer-processing queue. Serializes calls to the
//! external analysis backend so at most one is in flight at a time, while
//! new answers keep arriving. The backend mutates shared follow-up ordering
//! and its own graph state, so a single in-flight call plus FIFO queuing
//! gives a total order without a distributed lock.

use crate::domain::{FollowUp, PendingRequest, QaCategory, QaRecord, RequestStatus};
use crate::ports::{AnswerProcessor, CausalGraphSink, ProcessContext};
use crate::session::SessionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How often `wait_until_idle` re-checks for outstanding work.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Breather between consecutive queue items, so a transcript re-render can
/// settle before the next batch of follow-ups lands.
const BETWEEN_ITEMS_DELAY: Duration = Duration::from_millis(50);

struct QueueInner {
    requests: Vec<PendingRequest>,
    /// The single lock guarding "is a request currently processing".
    in_flight: bool,
}

/// FIFO queue of calls to the answer-processing backend.
///
/// `enqueue` appends a pending entry and nudges the worker; the worker task
/// (`run_worker`) drains entries one at a time via `process_next`. Errors
/// are recorded on the entry and never propagate to the enqueuer; callers
/// poll state rather than catch.
pub struct ProcessingQueue {
    session: Arc<Mutex<SessionState>>,
    processor: Arc<dyn AnswerProcessor>,
    graph_sink: Arc<dyn CausalGraphSink>,
    inner: Mutex<QueueInner>,
    work_tx: mpsc::UnboundedSender<()>,
    /// Bound on a single backend call; a stuck call is demoted to `Error`
    /// instead of deadlocking the queue.
    timeout: Duration,
}

impl ProcessingQueue {
    /// Creates the queue plus the receiver half the worker task consumes.
    pub fn new(
        session: Arc<Mutex<SessionState>>,
        processor: Arc<dyn AnswerProcessor>,
        graph_sink: Arc<dyn CausalGraphSink>,
        timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let queue = Self {
            session,
            processor,
            graph_sink,
            inner: Mutex::new(QueueInner {
                requests: Vec::new(),
                in_flight: false,
            }),
            work_tx,
            timeout,
        };
        (queue, work_rx)
    }

    /// Appends a pending request for the given QA record and returns its
    /// id. Does not start processing; the worker picks it up.
    pub async fn enqueue(&self, qa_id: &str) -> Uuid {
        let request = PendingRequest::new(qa_id);
        let id = request.id;
        self.inner.lock().await.requests.push(request);
        let _ = self.work_tx.send(());
        id
    }

    /// Enqueues an answered record unless it is a tutorial question, which
    /// never enters the queue.
    pub async fn enqueue_answer(&self, record: &QaRecord) -> Option<Uuid> {
        if record.category == QaCategory::Tutorial {
            return None;
        }
        Some(self.enqueue(&record.id).await)
    }

    /// Processes the oldest pending request, if any and if nothing is
    /// already in flight. Returns whether an entry was taken.
    pub async fn process_next(&self) -> bool {
        let (request_id, qa_id) = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return false;
            }
            let Some(entry) = inner
                .requests
                .iter_mut()
                .find(|r| r.status == RequestStatus::Pending)
            else {
                return false;
            };
            entry.status = RequestStatus::Processing;
            let taken = (entry.id, entry.qa_id.clone());
            inner.in_flight = true;
            taken
        };

        // Snapshot the full QA list as context for follow-up generation.
        let context = {
            let session = self.session.lock().await;
            session
                .qa_records
                .iter()
                .find(|r| r.id == qa_id)
                .map(|record| ProcessContext {
                    session_id: session.session_id.clone(),
                    prolific_id: session.prolific_id.clone(),
                    qa_record: record.clone(),
                    qa_records: session.qa_records.clone(),
                    current_index: session.current_index,
                })
        };
        let Some(context) = context else {
            warn!(qa_id = %qa_id, "queued QA record no longer exists; dropping request");
            self.finish(request_id, RequestStatus::Error, Some("record not found".into()))
                .await;
            return true;
        };
        let session_id = context.session_id.clone();

        let outcome = match time::timeout(self.timeout, self.processor.process(context)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(qa_id = %qa_id, error = %e, "answer processing failed");
                self.record_processing_error(&qa_id, &e.to_string()).await;
                self.finish(request_id, RequestStatus::Error, Some(e.to_string()))
                    .await;
                return true;
            }
            Err(_) => {
                let msg = format!("backend call exceeded {:?}", self.timeout);
                warn!(qa_id = %qa_id, "{msg}");
                self.record_processing_error(&qa_id, &msg).await;
                self.finish(request_id, RequestStatus::Error, Some(msg)).await;
                return true;
            }
        };

        let follow_ups: Vec<QaRecord> = outcome
            .follow_ups
            .iter()
            .filter(|f| is_valid_follow_up(f))
            .map(|f| {
                QaRecord::follow_up(f.question.trim().to_string(), f.short_label.trim().to_string())
            })
            .collect();

        {
            let mut session = self.session.lock().await;
            if let Some(record) = session.qa_records.iter_mut().find(|r| r.id == qa_id) {
                record.processed = true;
                record.error = None;
                record.touch();
            }
            if !follow_ups.is_empty() {
                info!(qa_id = %qa_id, count = follow_ups.len(), "appending follow-up questions");
                session.append_questions(follow_ups);
            }
        }

        // The graph is forwarded opaquely; a sink failure never fails the
        // request.
        if let (Some(graph), Some(session_id)) = (outcome.causal_graph, session_id) {
            if let Err(e) = self.graph_sink.store_graph(&session_id, graph).await {
                error!(error = %e, "failed to store causal graph");
            }
        }

        self.finish(request_id, RequestStatus::Completed, None).await;
        true
    }

    /// True while analysis work is outstanding: an active queue entry, or
    /// an answered non-tutorial record that was never marked processed
    /// (covers requests lost across a reload). Callers use this to gate
    /// forward navigation into final review.
    pub async fn has_outstanding_work(&self) -> bool {
        {
            let inner = self.inner.lock().await;
            if inner.requests.iter().any(|r| !r.status.is_terminal()) {
                return true;
            }
        }
        let session = self.session.lock().await;
        session.qa_records.iter().any(|r| {
            r.category != QaCategory::Tutorial && r.has_answer() && !r.processed
        })
    }

    /// Waits up to `bound` for outstanding work to clear. Returns whether
    /// the queue went idle; on `false` the caller proceeds with a
    /// user-visible fallback rather than blocking completion forever.
    pub async fn wait_until_idle(&self, bound: Duration) -> bool {
        let deadline = time::Instant::now() + bound;
        loop {
            if !self.has_outstanding_work().await {
                return true;
            }
            if time::Instant::now() >= deadline {
                return false;
            }
            time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Snapshot of all requests, terminal ones included (kept for
    /// debugging).
    pub async fn requests(&self) -> Vec<PendingRequest> {
        self.inner.lock().await.requests.clone()
    }

    /// Restores persisted requests after a reload.
    ///
    /// An entry found `processing` was interrupted mid-call and its outcome
    /// is unknowable: it is demoted to `error`. Any answered, unprocessed,
    /// non-tutorial record without an active entry is then re-enqueued so
    /// lost work is retried.
    pub async fn restore(&self, requests: Vec<PendingRequest>) {
        {
            let mut inner = self.inner.lock().await;
            inner.requests = requests;
            inner.in_flight = false;
            for entry in &mut inner.requests {
                if entry.status == RequestStatus::Processing {
                    warn!(qa_id = %entry.qa_id, "request was interrupted by reload");
                    entry.status = RequestStatus::Error;
                    entry.error = Some("interrupted by reload".to_string());
                }
            }
        }

        let unfinished: Vec<String> = {
            let session = self.session.lock().await;
            session
                .qa_records
                .iter()
                .filter(|r| {
                    r.category != QaCategory::Tutorial && r.has_answer() && !r.processed
                })
                .map(|r| r.id.clone())
                .collect()
        };
        for qa_id in unfinished {
            let has_active = {
                let inner = self.inner.lock().await;
                inner
                    .requests
                    .iter()
                    .any(|r| r.qa_id == qa_id && !r.status.is_terminal())
            };
            if !has_active {
                info!(qa_id = %qa_id, "re-enqueueing unprocessed answer after restore");
                self.enqueue(&qa_id).await;
            }
        }
    }

    /// The worker task: a single consumer that drains the queue whenever
    /// nudged, until cancelled. Replaces timer-based self-rescheduling.
    pub async fn run_worker(
        self: Arc<Self>,
        mut work_rx: mpsc::UnboundedReceiver<()>,
        cancel: CancellationToken,
    ) {
        info!("answer-processing worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("answer-processing worker shutting down");
                    break;
                }
                nudge = work_rx.recv() => {
                    if nudge.is_none() {
                        break;
                    }
                    while self.process_next().await {
                        time::sleep(BETWEEN_ITEMS_DELAY).await;
                    }
                }
            }
        }
    }

    async fn record_processing_error(&self, qa_id: &str, message: &str) {
        // The processed flag is left untouched on failure; only the error
        // string is surfaced on the record.
        let mut session = self.session.lock().await;
        if let Some(record) = session.qa_records.iter_mut().find(|r| r.id == qa_id) {
            record.error = Some(message.to_string());
            record.touch();
        }
    }

    async fn finish(&self, request_id: Uuid, status: RequestStatus, error: Option<String>) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.requests.iter_mut().find(|r| r.id == request_id) {
            entry.status = status;
            entry.error = error;
        }
        inner.in_flight = false;
        let more_pending = inner
            .requests
            .iter()
            .any(|r| r.status == RequestStatus::Pending);
        drop(inner);
        if more_pending {
            let _ = self.work_tx.send(());
        }
    }
}

/// A follow-up candidate must carry more than a token placeholder as its
/// question text and a non-empty short label.
fn is_valid_follow_up(candidate: &FollowUp) -> bool {
    candidate.question.trim().chars().count() > 1 && !candidate.short_label.trim().is_empty()
}
