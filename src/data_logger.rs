use crate::actor::ActorRegistry;
use crate::battery::battery_level;
use crate::channel_router::{route, Reading, Route};
use crate::config::Settings;
use crate::csv_reader::{parse_row, read_csv_rows};
use crate::error::{AcquisitionError, RowError};
use crate::mail_drop::CsvSource;
use crate::publisher::Publisher;
use crate::reconciler::{CurrentState, StateChangeLog};
use crate::snapshot::{Snapshot, SnapshotBuilder};
use csv::StringRecord;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Ledger {
    state_changes: StateChangeLog,
    current: CurrentState,
}

/// One data logger instance: turns CSV telemetry into device snapshots and sub-device readings.
///
/// The pending state changes and the current state share one lock. Publishing holds it until
/// every publication went out, so reconciliations never interleave.
pub struct DataLogger {
    settings: Settings,
    source: Arc<dyn CsvSource>,
    publisher: Arc<dyn Publisher>,
    actors: ActorRegistry,
    ledger: Mutex<Ledger>,
    cancel: CancellationToken,
}

impl DataLogger {
    pub fn new(
        settings: Settings,
        source: Arc<dyn CsvSource>,
        publisher: Arc<dyn Publisher>,
        actors: ActorRegistry,
    ) -> Self {
        Self {
            settings,
            source,
            publisher,
            actors,
            ledger: Mutex::new(Ledger::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stops accepting acquisition results. Fetches still in flight are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs one acquisition cycle: fetch, parse, route, then publish.
    ///
    /// Any error leaves the device state untouched. Returns the number of snapshots found.
    pub async fn poll_data(&self) -> Result<usize, AcquisitionError> {
        let csv_data = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AcquisitionError::Stopped),
            fetched = self.source.fetch_csv() => fetched?,
        };
        let rows = read_csv_rows(&csv_data)?;

        if self.is_stopped() {
            return Err(AcquisitionError::Stopped);
        }

        let snapshots = self.process_rows(&rows);
        let found = self.append(snapshots).await?;
        self.actors.publish_historic_data().await;
        if found == 0 {
            debug!("No state changes on device.");
        }
        self.publish_historic_data().await;
        Ok(found)
    }

    /// Routes every row and appends the resulting snapshots to the pending state changes
    pub async fn ingest(&self, rows: &[StringRecord]) -> usize {
        let snapshots = self.process_rows(rows);
        self.append(snapshots).await.unwrap_or(0)
    }

    async fn append(&self, snapshots: Vec<Snapshot>) -> Result<usize, AcquisitionError> {
        let mut ledger = self.ledger.lock().await;
        if self.is_stopped() {
            return Err(AcquisitionError::Stopped);
        }
        let found = snapshots.len();
        ledger.state_changes.extend(snapshots);
        Ok(found)
    }

    /// Groups own-device rows into snapshots and hands channel rows to their actors.
    /// Rows that cannot be parsed or routed are skipped.
    pub fn process_rows(&self, rows: &[StringRecord]) -> Vec<Snapshot> {
        let mut builder = SnapshotBuilder::new();

        for record in rows {
            let row = match parse_row(record, self.settings.time_zone) {
                Ok(row) => row,
                Err(e) => {
                    warn!("Error reading csv data: {e}, skipping {record:?}");
                    continue;
                }
            };

            match route(&row.label) {
                Route::Own(channel) => {
                    builder.observe(row.timestamp, channel.field(), row.value);
                    if let Some(level_field) = channel.level_field() {
                        let level = battery_level(row.value, self.settings.max_battery_voltage);
                        builder.observe(row.timestamp, level_field, level);
                    }
                }
                Route::External { channel_id, kind } => {
                    let reading = Reading {
                        channel_id,
                        timestamp: row.timestamp,
                        value: row.value,
                        kind,
                    };
                    if let Err(RowError::UnknownChannel(channel_id)) = self.actors.dispatch(reading) {
                        debug!("Channel {channel_id} not configured, ignoring data.");
                    }
                }
            }
        }

        builder.finish()
    }

    /// Queues a snapshot produced outside of CSV acquisition
    pub async fn push_state_change(&self, snapshot: Snapshot) {
        self.ledger.lock().await.state_changes.push(snapshot);
    }

    /// Publishes all pending state changes, folds them into the current state and clears them.
    /// The current state is published even when nothing was pending.
    pub async fn publish_historic_data(&self) {
        let mut ledger = self.ledger.lock().await;
        if self.is_stopped() {
            debug!("Data logger stopped, not publishing state changes.");
            return;
        }
        let history = ledger.state_changes.take();
        let advanced = ledger.current.reconcile(&history);

        info!("Publishing {} device state changes.", history.len());
        self.publisher.publish_state_change_history(&history).await;
        if advanced > 0 {
            debug!(
                "Current state advanced to {:?}",
                ledger.current.last_published
            );
        }
        self.publisher.publish_state_change(&ledger.current.state).await;
        debug!("Finished publishing historic device state changes.");
    }

    pub async fn current_state(&self) -> CurrentState {
        self.ledger.lock().await.current.clone()
    }

    pub async fn pending_state_changes(&self) -> Vec<Snapshot> {
        self.ledger.lock().await.state_changes.snapshots().to_vec()
    }
}
