//! Worker pool dispatcher — fan-out/fan-in over mailbox messages.
//!
//! A fixed number of workers pull message identifiers from a shared queue,
//! fetch and enrich each one, and forward successes to the output sink in
//! completion order. The pool size is a deliberate rate-limit control on the
//! enrichment service, so identifiers are never handled by one-task-per-item
//! spawning.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::enrich::{Enricher, EnrichmentResult};
use crate::error::PipelineError;
use crate::mailbox::{Mailbox, MessageRef};

/// Receiver shared by the worker pool, pulling from one queue.
struct SharedQueue<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> SharedQueue<T> {
    fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Distributes message identifiers to a bounded pool of fetch-and-enrich
/// workers.
pub struct Dispatcher {
    mailbox: Arc<dyn Mailbox>,
    enricher: Arc<dyn Enricher>,
    config: PipelineConfig,
}

impl Dispatcher {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        enricher: Arc<dyn Enricher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            mailbox,
            enricher,
            config,
        }
    }

    /// Batch mode: list, enrich everything, return results in completion
    /// order. Listing failure escalates; per-message failures are absorbed.
    pub async fn collect(
        &self,
        requester: &str,
        query: &str,
    ) -> Result<Vec<EnrichmentResult>, PipelineError> {
        let refs = self
            .mailbox
            .list(query, self.config.list_max)
            .await
            .map_err(|e| PipelineError::Listing(e.to_string()))?;

        let mut rx = self.spawn_pool(refs, requester.to_string(), CancellationToken::new());
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        Ok(results)
    }

    /// Streaming mode: returns the output sink immediately and runs the
    /// pool in the background. The sink closes once every identifier has
    /// been processed or `cancel` fires. Listing failure is treated as zero
    /// results — the caller cannot usefully distinguish the two.
    pub fn stream(
        &self,
        requester: String,
        query: String,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<EnrichmentResult> {
        let (tx, rx) = mpsc::channel(self.config.worker_count.max(1));
        let mailbox = Arc::clone(&self.mailbox);
        let enricher = Arc::clone(&self.enricher);
        let config = self.config.clone();

        tokio::spawn(async move {
            let refs = match mailbox.list(&query, config.list_max).await {
                Ok(refs) => refs,
                Err(e) => {
                    warn!(error = %e, "Listing failed, closing stream empty");
                    return;
                }
            };

            let this = Dispatcher {
                mailbox,
                enricher,
                config,
            };
            let mut pool_rx = this.spawn_pool(refs, requester, cancel);
            while let Some(result) = pool_rx.recv().await {
                if tx.send(result).await.is_err() {
                    // Client side dropped the sink; workers notice through
                    // their own send failures.
                    return;
                }
            }
        });

        rx
    }

    /// Start the worker pool over `refs` and return its output sink.
    ///
    /// The job queue is sized to the identifier count so feeding it never
    /// blocks. The sink closes only after every worker has finished.
    fn spawn_pool(
        &self,
        refs: Vec<MessageRef>,
        requester: String,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<EnrichmentResult> {
        let (out_tx, out_rx) = mpsc::channel(refs.len().max(1));

        if refs.is_empty() {
            debug!("No messages matched, closing sink with zero items");
            return out_rx;
        }

        let (job_tx, job_rx) = mpsc::channel(refs.len());
        for message_ref in refs {
            // Capacity equals the ref count; try_send cannot fail here.
            let _ = job_tx.try_send(message_ref);
        }
        drop(job_tx);

        let jobs = SharedQueue::new(job_rx);
        let worker_count = self.config.worker_count.max(1);

        let handles: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|worker| {
                let jobs = jobs.clone();
                let mailbox = Arc::clone(&self.mailbox);
                let enricher = Arc::clone(&self.enricher);
                let requester = requester.clone();
                let out_tx = out_tx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    worker_loop(worker, jobs, mailbox, enricher, requester, out_tx, cancel)
                        .await;
                })
            })
            .collect();
        drop(out_tx);

        // Join barrier: the sink must not close before every worker is done.
        tokio::spawn(async move {
            for handle in handles {
                let _ = handle.await;
            }
            debug!("Worker pool drained");
        });

        out_rx
    }
}

/// One worker: dequeue, fetch, enrich, forward. Per-identifier errors are
/// logged and skipped; a failed message never aborts the pool.
async fn worker_loop(
    worker: usize,
    jobs: SharedQueue<MessageRef>,
    mailbox: Arc<dyn Mailbox>,
    enricher: Arc<dyn Enricher>,
    requester: String,
    out_tx: mpsc::Sender<EnrichmentResult>,
    cancel: CancellationToken,
) {
    debug!(worker, "Pipeline worker started");

    while let Some(message_ref) = jobs.recv().await {
        if cancel.is_cancelled() {
            debug!(worker, "Cancelled, abandoning remaining work");
            return;
        }

        let message = match mailbox.fetch(&message_ref).await {
            Ok(message) => message,
            Err(e) => {
                warn!(worker, id = %message_ref, error = %e, "Fetch failed, skipping");
                continue;
            }
        };

        let result = match enricher
            .analyze(&requester, &message.subject, &message.snippet, &message.body)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(worker, id = %message_ref, error = %e, "Enrichment failed, skipping");
                continue;
            }
        };

        // Forwarding point: in-flight calls above were allowed to finish,
        // but their results are discarded once cancellation is observed.
        if cancel.is_cancelled() {
            debug!(worker, "Cancelled, discarding completed result");
            return;
        }
        if out_tx.send(result).await.is_err() {
            debug!(worker, "Output sink dropped, stopping");
            return;
        }
    }

    debug!(worker, "Pipeline worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{EnrichError, MailboxError};
    use crate::mailbox::RawMessage;

    /// In-memory mailbox holding `count` messages with ids `m0..mN`.
    struct StubMailbox {
        count: usize,
        fail_list: bool,
    }

    #[async_trait]
    impl Mailbox for StubMailbox {
        async fn list(&self, _query: &str, max: usize) -> Result<Vec<MessageRef>, MailboxError> {
            if self.fail_list {
                return Err(MailboxError::ListFailed("boom".into()));
            }
            Ok((0..self.count.min(max))
                .map(|i| MessageRef::new(format!("m{i}")))
                .collect())
        }

        async fn fetch(&self, id: &MessageRef) -> Result<RawMessage, MailboxError> {
            Ok(RawMessage {
                id: id.clone(),
                subject: format!("Subject {id}"),
                sender: "office@campus.edu".into(),
                date: String::new(),
                body: format!("Body of {id}"),
                snippet: format!("Snippet {id}"),
            })
        }
    }

    /// Deterministic enricher: fails for subjects listed in `fail_subjects`,
    /// optionally sleeping to simulate network latency.
    struct StubEnricher {
        fail_subjects: HashSet<String>,
        delay: Duration,
    }

    impl StubEnricher {
        fn instant() -> Self {
            Self {
                fail_subjects: HashSet::new(),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Enricher for StubEnricher {
        async fn analyze(
            &self,
            _requester: &str,
            subject: &str,
            _snippet: &str,
            _body: &str,
        ) -> Result<EnrichmentResult, EnrichError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_subjects.contains(subject) {
                return Err(EnrichError::RequestFailed("stub failure".into()));
            }
            let mut result = EnrichmentResult::fallback(subject);
            result.category = "placement".into();
            Ok(result)
        }
    }

    fn dispatcher(mailbox: StubMailbox, enricher: StubEnricher, list_max: usize) -> Dispatcher {
        let config = PipelineConfig {
            list_max,
            ..PipelineConfig::default()
        };
        Dispatcher::new(Arc::new(mailbox), Arc::new(enricher), config)
    }

    #[tokio::test]
    async fn failures_are_skipped_and_sink_closes() {
        // 12 refs, 5 workers, 3 deterministic enrichment failures → 9 results.
        let fail_subjects: HashSet<String> = ["m1", "m5", "m9"]
            .iter()
            .map(|id| format!("Subject {id}"))
            .collect();
        let d = dispatcher(
            StubMailbox {
                count: 12,
                fail_list: false,
            },
            StubEnricher {
                fail_subjects,
                delay: Duration::ZERO,
            },
            20,
        );

        let results = tokio::time::timeout(Duration::from_secs(5), d.collect("u1", "q"))
            .await
            .expect("pool hung")
            .unwrap();
        assert_eq!(results.len(), 9);
    }

    #[tokio::test]
    async fn zero_refs_closes_empty_without_error() {
        let d = dispatcher(
            StubMailbox {
                count: 0,
                fail_list: false,
            },
            StubEnricher::instant(),
            10,
        );
        let results = d.collect("u1", "q").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_escalates_in_batch_mode() {
        let d = dispatcher(
            StubMailbox {
                count: 3,
                fail_list: true,
            },
            StubEnricher::instant(),
            10,
        );
        let err = d.collect("u1", "q").await;
        assert!(matches!(err, Err(PipelineError::Listing(_))));
    }

    #[tokio::test]
    async fn listing_failure_closes_stream_empty() {
        let d = dispatcher(
            StubMailbox {
                count: 3,
                fail_list: true,
            },
            StubEnricher::instant(),
            10,
        );
        let mut rx = d.stream("u1".into(), "q".into(), CancellationToken::new());
        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("stream did not close");
        assert!(first.is_none());
    }

    #[tokio::test]
    async fn listing_respects_bound() {
        let d = dispatcher(
            StubMailbox {
                count: 50,
                fail_list: false,
            },
            StubEnricher::instant(),
            10,
        );
        let results = d.collect("u1", "q").await.unwrap();
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn cancellation_stops_forwarding_promptly() {
        let d = dispatcher(
            StubMailbox {
                count: 12,
                fail_list: false,
            },
            StubEnricher {
                fail_subjects: HashSet::new(),
                delay: Duration::from_millis(100),
            },
            20,
        );
        let cancel = CancellationToken::new();
        let mut rx = d.stream("u1".into(), "q".into(), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        // Workers abandon their queue share; the sink closes without
        // delivering the full batch.
        let mut received = 0;
        while let Ok(Some(_)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            received += 1;
        }
        assert!(received < 12, "cancellation did not stop forwarding");
    }

    #[tokio::test]
    async fn cold_runs_are_idempotent_on_required_fields() {
        let run = || async {
            let d = dispatcher(
                StubMailbox {
                    count: 6,
                    fail_list: false,
                },
                StubEnricher::instant(),
                10,
            );
            let mut set: Vec<(String, String)> = d
                .collect("u1", "q")
                .await
                .unwrap()
                .into_iter()
                .map(|r| (r.summary, r.category))
                .collect();
            set.sort();
            set
        };

        // Completion order is nondeterministic, so compare as sorted sets.
        assert_eq!(run().await, run().await);
    }
}
