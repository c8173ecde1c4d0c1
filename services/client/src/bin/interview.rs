//! services/client/src/bin/interview.rs

use client_lib::{
    adapters::{
        FileStorage, HttpAnswerProcessor, HttpGraphSink, HttpQuestionSource, HttpSessionStore,
    },
    config::Config,
    error::ClientError,
};
use interview_core::{
    LocalStorage, ProcessingQueue, QuestionSource, SessionState, SessionStatus, SessionStore,
    StoredSession, SyncService,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting interview client...");

    // --- 2. Initialize Service Adapters ---
    let http = reqwest::Client::new();
    let question_source = HttpQuestionSource::new(http.clone(), config.api_base_url.clone());
    let session_store: Arc<dyn SessionStore> =
        Arc::new(HttpSessionStore::new(http.clone(), config.api_base_url.clone()));
    let processor = Arc::new(HttpAnswerProcessor::new(
        http.clone(),
        config.processing_url.clone(),
    ));
    let graph_sink = Arc::new(HttpGraphSink::new(http, config.api_base_url.clone()));
    let storage = Arc::new(FileStorage::new(config.storage_path.clone()));

    // --- 3. Restore the Persisted Session or Seed a New One ---
    let (state, persisted_requests) = match storage.load().await {
        Ok(Some(stored)) => {
            info!("restoring persisted session");
            stored.into_state()
        }
        Ok(None) => {
            info!("no persisted session; fetching active questions");
            let seeds = question_source.active_questions().await?;
            (SessionState::new(&config.prolific_id, seeds), Vec::new())
        }
        Err(e) => {
            warn!(error = %e, "local storage unreadable; starting a fresh session");
            let seeds = question_source.active_questions().await?;
            (SessionState::new(&config.prolific_id, seeds), Vec::new())
        }
    };
    let session = Arc::new(Mutex::new(state));

    // --- 4. Start the Answer-Processing Worker ---
    let (queue, work_rx) = ProcessingQueue::new(
        session.clone(),
        processor,
        graph_sink,
        config.processing_timeout,
    );
    let queue = Arc::new(queue);
    queue.restore(persisted_requests).await;
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(queue.clone().run_worker(work_rx, cancel.clone()));

    // --- 5. Reconcile With the Persistence Endpoint ---
    let sync = SyncService::new(
        session_store.clone(),
        config.push_retries,
        config.push_backoff,
    );
    let known_id = session.lock().await.session_id.clone();
    if let Some(id) = known_id {
        match session_store.get_status(&id).await {
            Ok(SessionStatus::Completed) => session.lock().await.mark_completed(),
            Ok(SessionStatus::InProgress) => {
                let _ = sync.pull(&session).await;
            }
            Err(e) => warn!(error = %e, "status poll failed; continuing with local state"),
        }
    }
    let outcome = sync.push(&session).await;
    if !outcome.success {
        // Non-fatal: local storage retains the state and the next answer
        // triggers another push.
        warn!(error = ?outcome.error, "initial push failed; continuing locally");
    }

    if session.lock().await.status == SessionStatus::Completed {
        println!("This interview is already completed. Thank you!");
        cancel.cancel();
        let _ = worker.await;
        return Ok(());
    }

    // --- 6. Run the Interview Loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut aborted = false;
    'interview: loop {
        loop {
            let current = {
                let s = session.lock().await;
                s.current_question().filter(|r| !r.has_answer()).cloned()
            };
            let Some(record) = current else { break };

            {
                let s = session.lock().await;
                println!(
                    "\n[{}/{}] {}",
                    s.progress.current, s.progress.total, record.question
                );
            }

            let line = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    // Cancellation stops capture without submitting; the
                    // record stays untouched.
                    info!("input cancelled; nothing recorded for this question");
                    aborted = true;
                    break 'interview;
                }
                line = lines.next_line() => line?,
            };
            let Some(answer) = line else {
                aborted = true;
                break 'interview;
            };

            let recorded = session.lock().await.record_answer(&record.id, &answer);
            if !recorded {
                // Empty input; re-prompt the same question.
                continue;
            }
            let _ = queue.enqueue_answer(&record).await;
            session.lock().await.advance_cursor();

            save_snapshot(&storage, &session, &queue).await;
            let outcome = sync.push(&session).await;
            if !outcome.success {
                warn!("push failed; will retry on the next answer");
            }
        }

        // Every known question is answered; give outstanding analysis
        // work a bounded window to deliver follow-ups.
        if queue.wait_until_idle(config.idle_wait).await {
            let has_new = {
                let mut s = session.lock().await;
                s.advance_cursor();
                s.current_question().map(|r| !r.has_answer()).unwrap_or(false)
            };
            if has_new {
                continue 'interview;
            }
            break;
        }
        warn!("analysis work still outstanding after bounded wait; a follow-up question may be missing");
        break;
    }

    // --- 7. Complete and Shut Down ---
    if aborted {
        info!("interview paused; state saved for the next visit");
        let _ = sync.push(&session).await;
    } else {
        let outcome = sync.complete(&session).await;
        if outcome.success {
            println!("\nThank you! Your responses have been recorded.");
        } else {
            warn!(error = ?outcome.error, "completion push failed; state kept locally");
        }
    }
    save_snapshot(&storage, &session, &queue).await;

    cancel.cancel();
    let _ = worker.await;
    Ok(())
}

/// Persists a snapshot of the session plus the queue to local storage.
/// Failures are logged and absorbed; persistence is best-effort.
async fn save_snapshot(
    storage: &FileStorage,
    session: &Arc<Mutex<SessionState>>,
    queue: &Arc<ProcessingQueue>,
) {
    let requests = queue.requests().await;
    let stored = {
        let s = session.lock().await;
        StoredSession::from_state(&s, &requests)
    };
    if let Err(e) = storage.save(&stored).await {
        warn!(error = %e, "failed to persist session locally");
    }
}
