use crate::channel_router::Reading;
use crate::snapshot::{DeviceState, Snapshot};
use async_trait::async_trait;
use serde_derive::Serialize;
use std::fmt;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Ok,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Pending => "PENDING",
            Status::Ok => "OK",
            Status::Error => "ERROR",
        };
        f.write_str(text)
    }
}

/// Health of a data logger instance as shown to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationalState {
    pub status: Status,
    pub message: String,
}

impl OperationalState {
    pub fn pending() -> Self {
        Self {
            status: Status::Pending,
            message: "Waiting for initialization...".to_string(),
        }
    }

    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: "Halytech Data Logger successfully initialized".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }
}

/// Outward sink for everything a data logger reports
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_operational_state_change(&self, state: &OperationalState);

    /// Every snapshot collected since the last publish, in discovery order
    async fn publish_state_change_history(&self, history: &[Snapshot]);

    /// The current device state, sent once per publish even when unchanged
    async fn publish_state_change(&self, state: &DeviceState);

    /// Buffered readings flushed by a sub-device
    async fn publish_channel_history(&self, channel_id: &str, readings: &[Reading]);
}

/// Writes publications to the log only
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish_operational_state_change(&self, state: &OperationalState) {
        info!("Operational state {}: {}", state.status, state.message);
    }

    async fn publish_state_change_history(&self, history: &[Snapshot]) {
        for snapshot in history {
            info!("State change at {}: {:?}", snapshot.timestamp, snapshot.state);
        }
    }

    async fn publish_state_change(&self, state: &DeviceState) {
        info!("Current state: {state:?}");
    }

    async fn publish_channel_history(&self, channel_id: &str, readings: &[Reading]) {
        info!("Channel {channel_id} published {} readings", readings.len());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Publication {
    OperationalState(OperationalState),
    History(Vec<Snapshot>),
    StateChange(DeviceState),
    ChannelHistory {
        channel_id: String,
        readings: Vec<Reading>,
    },
}

/// Keeps every publication in memory, in the order received
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    publications: Mutex<Vec<Publication>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, publication: Publication) {
        self.publications
            .lock()
            .expect("Shall unlock publications")
            .push(publication);
    }

    pub fn publications(&self) -> Vec<Publication> {
        self.publications
            .lock()
            .expect("Shall unlock publications")
            .clone()
    }

    pub fn operational_states(&self) -> Vec<OperationalState> {
        self.publications()
            .into_iter()
            .filter_map(|p| match p {
                Publication::OperationalState(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn histories(&self) -> Vec<Vec<Snapshot>> {
        self.publications()
            .into_iter()
            .filter_map(|p| match p {
                Publication::History(history) => Some(history),
                _ => None,
            })
            .collect()
    }

    pub fn state_changes(&self) -> Vec<DeviceState> {
        self.publications()
            .into_iter()
            .filter_map(|p| match p {
                Publication::StateChange(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn channel_histories(&self, channel: &str) -> Vec<Vec<Reading>> {
        self.publications()
            .into_iter()
            .filter_map(|p| match p {
                Publication::ChannelHistory {
                    channel_id,
                    readings,
                } if channel_id == channel => Some(readings),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish_operational_state_change(&self, state: &OperationalState) {
        self.record(Publication::OperationalState(state.clone()));
    }

    async fn publish_state_change_history(&self, history: &[Snapshot]) {
        self.record(Publication::History(history.to_vec()));
    }

    async fn publish_state_change(&self, state: &DeviceState) {
        self.record(Publication::StateChange(*state));
    }

    async fn publish_channel_history(&self, channel_id: &str, readings: &[Reading]) {
        self.record(Publication::ChannelHistory {
            channel_id: channel_id.to_string(),
            readings: readings.to_vec(),
        });
    }
}
