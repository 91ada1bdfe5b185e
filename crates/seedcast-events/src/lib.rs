#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Domain event bus for announcer lifecycle notifications.
//!
//! The bus assigns sequential identifiers and keeps a bounded replay buffer so a
//! late subscriber can catch up from a known id. Internally it uses
//! `tokio::broadcast`; slow subscribers lose the oldest events rather than
//! stalling announcers.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use seedcast_core::{AnnounceEvent, InfoHash, StopReason};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, Receiver, Sender};

/// Identifier assigned to each published event.
pub type EventId = u64;

const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Announcer lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An announcer task began running.
    AnnouncerStarted {
        /// Torrent infohash.
        info_hash: InfoHash,
        /// Torrent display name.
        name: String,
    },
    /// A tracker accepted an announce.
    AnnounceSucceeded {
        /// Torrent infohash.
        info_hash: InfoHash,
        /// Event that was reported.
        event: AnnounceEvent,
        /// Uploaded counter after the announce.
        uploaded: u64,
        /// Seconds until the next announce.
        interval_secs: u64,
        /// Seeders reported by the tracker.
        seeders: u32,
        /// Leechers reported by the tracker.
        leechers: u32,
    },
    /// An announce attempt failed and will be retried.
    AnnounceFailed {
        /// Torrent infohash.
        info_hash: InfoHash,
        /// Event that was attempted.
        event: AnnounceEvent,
        /// Failure classification label.
        error: String,
        /// Failure detail.
        detail: String,
        /// Failures in a row, including this one.
        consecutive_failures: u32,
        /// Seconds until the retry.
        retry_in_secs: u64,
    },
    /// The configured share ratio was met.
    RatioReached {
        /// Torrent infohash.
        info_hash: InfoHash,
        /// Ratio at the time of the check.
        ratio: f64,
        /// Configured target.
        target: f64,
    },
    /// An announcer finished.
    AnnouncerStopped {
        /// Torrent infohash.
        info_hash: InfoHash,
        /// Why it stopped.
        reason: StopReason,
    },
    /// A new configuration snapshot went live.
    SettingsChanged {
        /// Revision of the accepted snapshot.
        revision: u64,
    },
}

impl Event {
    /// Machine-friendly discriminator for the event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AnnouncerStarted { .. } => "announcer_started",
            Self::AnnounceSucceeded { .. } => "announce_succeeded",
            Self::AnnounceFailed { .. } => "announce_failed",
            Self::RatioReached { .. } => "ratio_reached",
            Self::AnnouncerStopped { .. } => "announcer_stopped",
            Self::SettingsChanged { .. } => "settings_changed",
        }
    }

    /// Infohash the event refers to, if any.
    #[must_use]
    pub const fn info_hash(&self) -> Option<InfoHash> {
        match self {
            Self::AnnouncerStarted { info_hash, .. }
            | Self::AnnounceSucceeded { info_hash, .. }
            | Self::AnnounceFailed { info_hash, .. }
            | Self::RatioReached { info_hash, .. }
            | Self::AnnouncerStopped { info_hash, .. } => Some(*info_hash),
            Self::SettingsChanged { .. } => None,
        }
    }
}

/// Event plus its sequence id and publish time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Publish time.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    pub event: Event,
}

/// Shared event bus with replay support.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a bus holding up to `capacity` events for replay; zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event and return its id. Never blocks on subscribers.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe, replaying buffered events newer than `since_id` first.
    ///
    /// The live receiver is registered before the backlog is copied, so an
    /// event published concurrently is delivered exactly once.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let backlog: VecDeque<EventEnvelope> = since_id.map_or_else(VecDeque::new, |since| {
            self.buffer()
                .iter()
                .filter(|item| item.id > since)
                .cloned()
                .collect()
        });
        let replayed = backlog.iter().map(|item| item.id).collect();
        EventStream {
            backlog,
            replayed,
            receiver,
        }
    }

    /// Most recent buffered events, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<EventEnvelope> {
        let buffer = self.buffer();
        let skip = buffer.len().saturating_sub(limit);
        buffer.iter().skip(skip).cloned().collect()
    }

    /// Id of the most recently published event.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.buffer().back().map(|event| event.id)
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber handle returned by [`EventBus::subscribe`].
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    replayed: HashSet<EventId>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Await the next event; `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) if self.replayed.remove(&event.id) => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
