use crate::channel_router::{Reading, ReadingKind};
use crate::error::RowError;
use crate::publisher::Publisher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A sub-device attached to one data logger channel
#[async_trait]
pub trait Actor: Send + Sync {
    /// Channel id as it appears in the CSV labels
    fn channel(&self) -> &str;

    fn add_reading(&self, reading: Reading);

    fn add_cumulated_reading(&self, reading: Reading);

    /// Flushes whatever was collected during the last acquisition
    async fn publish_historic_data(&self);
}

/// Sub-devices keyed by channel id
#[derive(Clone, Default)]
pub struct ActorRegistry {
    actors: HashMap<String, Arc<dyn Actor>>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an actor, replacing any previous one on the same channel
    pub fn register(&mut self, actor: Arc<dyn Actor>) {
        self.actors.insert(actor.channel().to_string(), actor);
    }

    pub fn get(&self, channel_id: &str) -> Option<&Arc<dyn Actor>> {
        self.actors.get(channel_id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Hands a reading to the actor on its channel, picking the update by reading kind
    pub fn dispatch(&self, reading: Reading) -> Result<(), RowError> {
        let actor = self
            .get(&reading.channel_id)
            .ok_or_else(|| RowError::UnknownChannel(reading.channel_id.clone()))?;
        match reading.kind {
            ReadingKind::Cumulative => actor.add_cumulated_reading(reading),
            ReadingKind::Instantaneous => actor.add_reading(reading),
        }
        Ok(())
    }

    pub async fn publish_historic_data(&self) {
        for actor in self.actors.values() {
            actor.publish_historic_data().await;
        }
    }
}

impl fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actors.keys()).finish()
    }
}

#[derive(Debug, Default)]
struct MeterBuffer {
    pending: Vec<Reading>,
    last_total: Option<f64>,
}

/// Stock actor for metered channels.
///
/// Instantaneous readings are passed through as-is. Cumulative totals are turned into the
/// consumption since the previous total; the first total on a channel only sets the baseline.
pub struct MeterActor {
    channel: String,
    publisher: Arc<dyn Publisher>,
    buffer: Mutex<MeterBuffer>,
}

impl MeterActor {
    pub fn new(channel: impl Into<String>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            channel: channel.into(),
            publisher,
            buffer: Mutex::new(MeterBuffer::default()),
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().expect("Shall unlock meter buffer").pending.len()
    }
}

#[async_trait]
impl Actor for MeterActor {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn add_reading(&self, reading: Reading) {
        debug!(
            "Channel {} reading {} at {}",
            self.channel, reading.value, reading.timestamp
        );
        self.buffer
            .lock()
            .expect("Shall unlock meter buffer")
            .pending
            .push(reading);
    }

    fn add_cumulated_reading(&self, reading: Reading) {
        let mut buffer = self.buffer.lock().expect("Shall unlock meter buffer");
        let total = reading.value;
        let previous = buffer.last_total.replace(total);
        match previous {
            None => debug!("Channel {} baseline total {total}", self.channel),
            Some(previous) if total < previous => {
                debug!(
                    "Channel {} total dropped from {previous} to {total}, assuming meter reset",
                    self.channel
                );
                buffer.pending.push(reading);
            }
            Some(previous) => buffer.pending.push(Reading {
                value: total - previous,
                ..reading
            }),
        }
    }

    async fn publish_historic_data(&self) {
        let readings = std::mem::take(
            &mut self
                .buffer
                .lock()
                .expect("Shall unlock meter buffer")
                .pending,
        );
        if readings.is_empty() {
            debug!("No new readings on channel {}", self.channel);
            return;
        }
        self.publisher
            .publish_channel_history(&self.channel, &readings)
            .await;
    }
}
