//! Sequential refresh of many portal pages.
//!
//! Items are looked up one at a time with a pause between requests. A
//! [`CancelHandle`] stops the run before the next item or during a pause;
//! a fetch already in flight is allowed to finish.

use crate::api;
use crate::config::BatchConfig;
use crate::fetch::PageSource;
use crate::model::LookupResponse;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub obra_id: String,
    pub url: String,
}

impl BatchItem {
    pub fn new(obra_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            obra_id: obra_id.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    #[serde(rename = "obraId")]
    pub obra_id: String,
    pub url: String,
    pub response: LookupResponse,
}

/// Owner side of a cancellation signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, handed to [`refresh_all`]
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Look up each item in order, pausing `config.delay` between items.
/// Returns one outcome per item processed; a cancelled run returns the
/// outcomes gathered so far.
pub async fn refresh_all(
    source: &(dyn PageSource + Send + Sync),
    items: &[BatchItem],
    config: &BatchConfig,
    cancel: &mut Cancellation,
) -> Vec<BatchOutcome> {
    let take = config.limit.unwrap_or(items.len()).min(items.len());
    let items = &items[..take];
    let mut outcomes = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            info!(done = outcomes.len(), total = items.len(), "refresh cancelled");
            break;
        }

        let response = api::lookup(source, &item.url).await;
        info!(
            obra = %item.obra_id,
            progress = format!("{}/{}", index + 1, items.len()),
            status = response.status_code(),
            found = response.is_found(),
            "refreshed"
        );
        outcomes.push(BatchOutcome {
            obra_id: item.obra_id.clone(),
            url: item.url.clone(),
            response,
        });

        let is_last = index + 1 == items.len();
        if !is_last && !config.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(config.delay) => {}
                _ = cancel.cancelled() => {
                    info!(done = outcomes.len(), total = items.len(), "refresh cancelled");
                    break;
                }
            }
        }
    }

    outcomes
}
