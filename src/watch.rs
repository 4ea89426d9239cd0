//! Polling watcher that streams newly appearing items
//!
//! A single background task polls a listing on a fixed interval and pushes
//! items it has not seen before onto a bounded channel. The consumer side
//! drains the channel until the producer finishes:
//!
//! - a stop signal ends polling after the current round
//! - dropping the consumer ends polling on the next send
//! - the first polling error is delivered as the last message
//!
//! The consumer reports that error only after everything queued before it
//! has been handed out.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Default number of queued items before the poller waits for the consumer
pub const DEFAULT_CAPACITY: usize = 256;

/// Running watch: the item stream plus the means to stop its producer
pub struct Watch<T> {
    items: ReceiverStream<Result<T>>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Starts polling in the background
///
/// `poll` returns the current listing; `key` identifies an item so that it is
/// emitted only the first time it is seen.
pub fn spawn<T, F, Fut, K>(interval: Duration, capacity: usize, mut poll: F, key: K) -> Watch<T>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send,
    K: Fn(&T) -> String + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut seen = HashSet::new();
        let mut ticker = tokio::time::interval(interval);
        let mut round = 0u64;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    debug!("Watch stop requested");
                    break;
                }
                _ = ticker.tick() => {}
            }

            round += 1;
            debug!("Watch poll round {}", round);
            match poll().await {
                Ok(items) => {
                    for item in items {
                        if !seen.insert(key(&item)) {
                            continue;
                        }
                        if tx.send(Ok(item)).await.is_err() {
                            debug!("Watch consumer went away");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Watch poll failed: {:#}", e);
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
        info!("Watch stopped after {} poll rounds", round);
    });

    Watch {
        items: ReceiverStream::new(rx),
        stop: stop_tx,
        task,
    }
}

impl<T> Watch<T> {
    /// Asks the producer to stop; already queued items remain readable
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Next queued item, or `None` once the producer has finished
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.items.next().await
    }

    /// Hands every item to `on_item` until the producer finishes
    ///
    /// `shutdown` resolving triggers [`Watch::stop`]. A producer error is
    /// returned after the remaining items have been drained.
    pub async fn drain<S>(mut self, shutdown: S, mut on_item: impl FnMut(T) -> Result<()>) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stopping = false;
        let mut failure = None;

        loop {
            tokio::select! {
                _ = &mut shutdown, if !stopping => {
                    stopping = true;
                    self.stop();
                }
                item = self.items.next() => match item {
                    Some(Ok(item)) => on_item(item)?,
                    Some(Err(e)) => failure = Some(e),
                    None => break,
                },
            }
        }

        self.task
            .await
            .map_err(|e| anyhow!("watch task failed: {}", e))?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
