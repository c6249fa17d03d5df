use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{RemoteCollection, RemoteError};
use crate::model::Article;

/// Snapshots buffered before the producer waits on the consumer.
const LISTENER_BUFFER: usize = 16;

pub type RemoteEvent = Result<Vec<Article>, RemoteError>;

/// Live subscription to a remote collection.
///
/// Dropping the listener stops the producer task.
pub struct RemoteListener {
    rx: mpsc::Receiver<RemoteEvent>,
    handle: Option<JoinHandle<()>>,
}

impl RemoteListener {
    pub(crate) fn channel() -> (mpsc::Sender<RemoteEvent>, mpsc::Receiver<RemoteEvent>) {
        mpsc::channel(LISTENER_BUFFER)
    }

    pub(crate) fn new(rx: mpsc::Receiver<RemoteEvent>, handle: Option<JoinHandle<()>>) -> Self {
        Self { rx, handle }
    }

    /// Next snapshot or error; `None` once the producer has stopped.
    pub async fn recv(&mut self) -> Option<RemoteEvent> {
        self.rx.recv().await
    }

    /// Poll `remote.query()` every `interval`, emitting a snapshot whenever it
    /// differs from the previous one.
    ///
    /// The first query runs immediately. A failure is emitted once per
    /// failure streak; the next success is always emitted.
    pub fn polling<R>(remote: Arc<R>, interval: Duration) -> Self
    where
        R: RemoteCollection + ?Sized + 'static,
    {
        let (tx, rx) = Self::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<Vec<Article>> = None;
            let mut failing = false;

            loop {
                ticker.tick().await;
                let event = match remote.query().await {
                    Ok(snapshot) => {
                        let unchanged = !failing && last.as_ref() == Some(&snapshot);
                        failing = false;
                        if unchanged {
                            continue;
                        }
                        last = Some(snapshot.clone());
                        Ok(snapshot)
                    }
                    Err(e) => {
                        if failing {
                            tracing::debug!(error = %e, "Remote poll still failing");
                            continue;
                        }
                        tracing::warn!(error = %e, "Remote poll failed");
                        failing = true;
                        Err(e)
                    }
                };
                if tx.send(event).await.is_err() {
                    tracing::debug!("Remote listener dropped, stopping poll");
                    break;
                }
            }
        });
        Self::new(rx, Some(handle))
    }
}

impl Drop for RemoteListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
