use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::SystemTime,
};

use futures::StreamExt;
use tokio::{
    sync::{broadcast, mpsc, mpsc::error::TrySendError},
    task::JoinHandle,
};
use tokio_stream::wrappers::ReceiverStream;

use super::{ingest_job, Envelope, IngestJob, IngestReport, IngestSettings};
use crate::{error::ServiceError, store::ReadingStore};

/// Events kept for subscribers that fall behind.
const EVENT_CAPACITY: usize = 64;

/// Terminal outcome of one queued job. Every job produces exactly one.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Completed {
        job_id: u64,
        company: String,
        report: IngestReport,
    },
    Failed {
        job_id: u64,
        company: String,
        error: String,
    },
}

impl IngestEvent {
    pub fn job_id(&self) -> u64 {
        match self {
            Self::Completed { job_id, .. } | Self::Failed { job_id, .. } => *job_id,
        }
    }
}

/// Handle to the background ingest workers.
///
/// Clones share one queue. When the last handle is dropped the workers finish
/// whatever is queued and the [`JoinHandle`] returned by [`IngestQueue::start`]
/// resolves.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<Envelope<IngestJob>>,
    events: broadcast::Sender<IngestEvent>,
    next_id: Arc<AtomicU64>,
}

impl IngestQueue {
    pub fn start<S>(store: Arc<S>, settings: IngestSettings) -> (Self, JoinHandle<()>)
    where
        S: ReadingStore + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel::<Envelope<IngestJob>>(settings.queue_capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let publisher = events.clone();
        let workers = settings.workers.max(1);

        let handle = tokio::spawn(async move {
            ReceiverStream::new(rx)
                .for_each_concurrent(workers, |env| {
                    let store = Arc::clone(&store);
                    let publisher = publisher.clone();
                    async move {
                        let event = run_job(&*store, env, &settings).await;
                        // No subscribers is fine.
                        let _ = publisher.send(event);
                    }
                })
                .await;
            tracing::info!("ingest queue closed, workers stopped");
        });

        let queue = Self {
            tx,
            events,
            next_id: Arc::new(AtomicU64::new(0)),
        };
        (queue, handle)
    }

    /// Queue a file without waiting. Returns the job id.
    pub fn submit(
        &self,
        company: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<u64, ServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let job = IngestJob::new(id, company, file_name, bytes)?;
        let company = job.company.clone();

        match self.tx.try_send(Envelope::new(job)) {
            Ok(()) => {
                metrics::counter!("ingest_jobs_total").increment(1);
                tracing::debug!(job_id = id, company = %company, "ingest job queued");
                Ok(id)
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(job_id = id, company = %company, "ingest queue full, rejecting upload");
                Err(ServiceError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(ServiceError::QueueClosed),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.events.subscribe()
    }
}

async fn run_job<S>(store: &S, env: Envelope<IngestJob>, settings: &IngestSettings) -> IngestEvent
where
    S: ReadingStore + ?Sized,
{
    if let Ok(waited) = SystemTime::now().duration_since(env.received_at) {
        metrics::histogram!("ingest_queue_latency_seconds").record(waited.as_secs_f64());
    }

    let job = env.payload;
    let job_id = job.id;
    let company = job.company.clone();
    let file_name = job.file_name.clone();

    match ingest_job(store, job, settings).await {
        Ok(report) => IngestEvent::Completed {
            job_id,
            company,
            report,
        },
        Err(e) => {
            tracing::error!(job_id, company = %company, file = %file_name, error = %e, "ingest job failed");
            metrics::counter!("ingest_jobs_failed_total").increment(1);
            IngestEvent::Failed {
                job_id,
                company,
                error: e.to_string(),
            }
        }
    }
}
