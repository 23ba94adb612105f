use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::models::{ContentItem, ContentType};
use crate::tmdb::TmdbApi;

/// Quiet period before a pending keystroke triggers a suggestion query.
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Search-as-you-type driver. Keystrokes go in; debounced suggestion lists
/// come out on a watch channel.
///
/// Each issued query carries a monotonically increasing sequence number,
/// and a completed fetch publishes only if its number is still the latest,
/// so a slow early response can never overwrite a newer one. Blank input
/// clears the suggestions immediately without a network call.
pub struct SuggestionFeed {
    input: mpsc::UnboundedSender<String>,
    results: watch::Receiver<Vec<ContentItem>>,
    task: JoinHandle<()>,
}

impl SuggestionFeed {
    pub fn spawn(catalog: Arc<dyn TmdbApi>, media: ContentType, quiet: Duration) -> Self {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
        let (results_tx, results_rx) = watch::channel(Vec::new());
        let results_tx = Arc::new(results_tx);
        let latest = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(async move {
            let mut pending: Option<String> = None;
            let mut seq: u64 = 0;
            loop {
                tokio::select! {
                    query = input_rx.recv() => match query {
                        Some(q) => {
                            if q.trim().is_empty() {
                                pending = None;
                                seq += 1;
                                latest.store(seq, Ordering::SeqCst);
                                let _ = results_tx.send(Vec::new());
                            } else {
                                // Restarts the quiet period below.
                                pending = Some(q);
                            }
                        }
                        None => break,
                    },
                    _ = sleep(quiet), if pending.is_some() => {
                        if let Some(query) = pending.take() {
                            seq += 1;
                            latest.store(seq, Ordering::SeqCst);
                            let issued = seq;
                            let catalog = Arc::clone(&catalog);
                            let latest = Arc::clone(&latest);
                            let results_tx = Arc::clone(&results_tx);
                            tokio::spawn(async move {
                                match catalog.suggestions(&query, media).await {
                                    Ok(items) => {
                                        if latest.load(Ordering::SeqCst) == issued {
                                            let _ = results_tx.send(items);
                                        } else {
                                            debug!("dropping stale suggestions for '{}'", query);
                                        }
                                    }
                                    Err(err) => {
                                        warn!("suggestion lookup failed for '{}': {}", query, err);
                                    }
                                }
                            });
                        }
                    }
                }
            }
        });

        Self {
            input: input_tx,
            results: results_rx,
            task,
        }
    }

    /// Feed the current contents of the search box.
    pub fn push(&self, query: impl Into<String>) {
        let _ = self.input.send(query.into());
    }

    /// Subscribe to the debounced suggestion lists.
    pub fn results(&self) -> watch::Receiver<Vec<ContentItem>> {
        self.results.clone()
    }

    pub fn shutdown(self) {
        drop(self.input);
        self.task.abort();
    }
}
