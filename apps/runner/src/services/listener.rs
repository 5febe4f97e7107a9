//! Event loop: run a job for every checkout that becomes available.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::models::NodeFilter;
use crate::services::job::FstestsJob;
use crate::services::kernelci::{NODE_CHANNEL, ResultsSink};

/// Subscribes to node events and hands matching checkouts to a job.
pub struct CheckoutListener {
    sink: Arc<dyn ResultsSink>,
    filter: NodeFilter,
    max_jobs: Option<usize>,
}

impl CheckoutListener {
    pub fn new(sink: Arc<dyn ResultsSink>) -> Self {
        Self {
            sink,
            filter: NodeFilter::default(),
            max_jobs: None,
        }
    }

    pub fn with_filter(mut self, filter: NodeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Stop after `max_jobs` jobs instead of listening until shutdown.
    pub fn with_max_jobs(mut self, max_jobs: Option<usize>) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    /// Listen until `shutdown` resolves or the job limit is reached and
    /// return the number of jobs started.
    ///
    /// A failing job is logged and does not stop the loop. The subscription
    /// is always released before returning.
    pub async fn run<F>(&self, job: &FstestsJob, shutdown: F) -> AppResult<usize>
    where
        F: Future<Output = ()>,
    {
        let subscription = self.sink.subscribe(NODE_CHANNEL).await?;
        info!(
            "Listening for {} nodes in state {}",
            self.filter.name, self.filter.state
        );

        tokio::pin!(shutdown);
        let mut started = 0;
        let result = loop {
            if self.max_jobs.is_some_and(|max| started >= max) {
                info!("Job limit reached ({})", started);
                break Ok(started);
            }
            let node_id = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(started);
                }
                next = self.next_match(&subscription) => match next {
                    Ok(node_id) => node_id,
                    Err(e) => break Err(e),
                },
            };

            started += 1;
            match job.run(&node_id).await {
                Ok(report) => match report.outcome.failed_stage() {
                    None => info!("Job for {} done", node_id),
                    Some(stage) => warn!("Job for {} failed at stage {}", node_id, stage),
                },
                Err(e) => error!("Job for {} aborted: {}", node_id, e),
            }
        };

        if let Err(e) = self.sink.unsubscribe(&subscription).await {
            warn!("Failed to unsubscribe {}: {}", subscription, e);
        }
        result
    }

    async fn next_match(&self, subscription: &str) -> AppResult<String> {
        loop {
            if let Some(event) = self.sink.listen(subscription).await?
                && self.filter.matches(&event)
            {
                info!("Checkout {} is {}", event.id, self.filter.state);
                return Ok(event.id);
            }
        }
    }
}
