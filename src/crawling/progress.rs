//! Progress fan-out per search
//!
//! Each search gets a bounded broadcast channel. Publishing never waits on
//! subscribers; a lagging subscriber skips the events it missed. The latest
//! event is retained so a late subscriber still observes the current state
//! and, for finished searches, the terminal event.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace};

use crate::domain::{ProgressEvent, SearchId};

pub type ProgressStream = BoxStream<'static, ProgressEvent>;

struct Channel {
    sender: broadcast::Sender<ProgressEvent>,
    last: Option<ProgressEvent>,
}

pub struct ProgressHub {
    capacity: usize,
    channels: Mutex<HashMap<SearchId, Channel>>,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<SearchId, Channel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: SearchId) {
        let (sender, _) = broadcast::channel(self.capacity);
        self.channels().entry(id).or_insert(Channel { sender, last: None });
    }

    /// Publish without blocking.
    ///
    /// Progress never moves backwards for a search, and nothing is accepted
    /// after the terminal event.
    pub fn publish(&self, mut event: ProgressEvent) {
        let mut channels = self.channels();
        let Some(channel) = channels.get_mut(&event.search_id) else {
            trace!("Dropping progress event for unknown search {}", event.search_id);
            return;
        };
        if let Some(last) = &channel.last {
            if last.is_terminal() {
                return;
            }
            event.progress = event.progress.max(last.progress);
        }

        channel.last = Some(event.clone());
        // Err only means nobody is listening right now
        let _ = channel.sender.send(event);
    }

    pub fn latest(&self, id: SearchId) -> Option<ProgressEvent> {
        self.channels().get(&id).and_then(|c| c.last.clone())
    }

    /// Stream of events for `id`, ending after the terminal event.
    ///
    /// Starts with the most recent event, if one was published.
    pub fn subscribe(&self, id: SearchId) -> Option<ProgressStream> {
        let channels = self.channels();
        let channel = channels.get(&id)?;
        let receiver = channel.sender.subscribe();
        let replay = channel.last.clone();
        drop(channels);

        let stream = stream::unfold(
            (replay, receiver, false),
            move |(replay, mut receiver, finished)| async move {
                if finished {
                    return None;
                }
                if let Some(event) = replay {
                    let done = event.is_terminal();
                    return Some((event, (None, receiver, done)));
                }
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            let done = event.is_terminal();
                            return Some((event, (None, receiver, done)));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("Progress subscriber for {} lagged by {} events", id, skipped);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            },
        );
        Some(stream.boxed())
    }

    /// Drop the channel for `id`; open streams end after draining
    pub fn remove(&self, id: SearchId) {
        self.channels().remove(&id);
    }
}
