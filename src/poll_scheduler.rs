use crate::actor::ActorRegistry;
use crate::battery::battery_level;
use crate::config::{DataLoggerConfig, Settings};
use crate::data_logger::DataLogger;
use crate::error::{AcquisitionError, ConfigError};
use crate::mail_drop::CsvSource;
use crate::publisher::{OperationalState, Publisher};
use crate::snapshot::{DeviceState, Snapshot};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Periods used when the data logger runs without real hardware
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationTiming {
    pub sample_every: Duration,
    pub publish_every: Duration,
}

impl Default for SimulationTiming {
    fn default() -> Self {
        Self {
            sample_every: Duration::from_secs(10),
            publish_every: Duration::from_secs(24),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollMode {
    /// Poll the mail drop every configured interval, starting right away
    Live,
    /// Generate random device states and publish them on a separate timer
    Simulation(SimulationTiming),
}

impl PollMode {
    pub fn from_config(config: &DataLoggerConfig) -> Self {
        if config.simulated {
            PollMode::Simulation(SimulationTiming::default())
        } else {
            PollMode::Live
        }
    }
}

/// Owns the periodic tasks of one data logger and its operational state
pub struct PollScheduler {
    logger: Arc<DataLogger>,
    mode: PollMode,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    operational_state: Mutex<OperationalState>,
}

impl PollScheduler {
    /// Validates the configuration and starts polling.
    ///
    /// Out-of-range values are corrected; an unusable configuration moves the operational state
    /// to error and nothing is started.
    pub async fn start(
        config: &DataLoggerConfig,
        source: Arc<dyn CsvSource>,
        publisher: Arc<dyn Publisher>,
        actors: ActorRegistry,
        mode: PollMode,
    ) -> Result<Self, ConfigError> {
        publisher
            .publish_operational_state_change(&OperationalState::pending())
            .await;
        debug!("Starting halytech data logger {}.", config.name);

        let settings = match Settings::from_config(config) {
            Ok(settings) => settings,
            Err(e) => {
                error!("Cannot start data logger {}: {e}", config.name);
                publisher
                    .publish_operational_state_change(&OperationalState::error(e.to_string()))
                    .await;
                return Err(e);
            }
        };

        let logger = Arc::new(DataLogger::new(settings, source, publisher, actors));
        Ok(Self::run(logger, mode).await)
    }

    /// Spawns the tasks for `mode` on an already configured data logger
    pub async fn run(logger: Arc<DataLogger>, mode: PollMode) -> Self {
        let tasks = match mode {
            PollMode::Live => vec![spawn_live(logger.clone())],
            PollMode::Simulation(timing) => spawn_simulation(logger.clone(), timing),
        };

        let state = OperationalState::ok();
        logger
            .publisher()
            .publish_operational_state_change(&state)
            .await;

        Self {
            logger,
            mode,
            tasks: Mutex::new(tasks),
            operational_state: Mutex::new(state),
        }
    }

    pub fn logger(&self) -> &Arc<DataLogger> {
        &self.logger
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn operational_state(&self) -> OperationalState {
        self.operational_state
            .lock()
            .expect("Shall unlock operational state")
            .clone()
    }

    /// Number of periodic tasks still alive
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .expect("Shall unlock tasks")
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Cancels every periodic task. Safe to call repeatedly and while a cycle is running.
    pub fn stop(&self) {
        self.logger.shutdown();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .expect("Shall unlock tasks")
            .drain(..)
            .collect();
        if !tasks.is_empty() {
            info!("Stopping {} data logger tasks", tasks.len());
        }
        for task in tasks {
            task.abort();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_live(logger: Arc<DataLogger>) -> JoinHandle<()> {
    let period = logger.settings().interval;
    info!("Polling data logger every {} minutes", period.as_secs() / 60);

    tokio::spawn(async move {
        // First tick completes immediately so a cold start does not wait a full period
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = logger.cancellation().clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match logger.poll_data().await {
                        Ok(found) => debug!("Poll found {found} device state changes"),
                        Err(AcquisitionError::Stopped) => break,
                        Err(e) => error!("Data logger poll failed: {e}"),
                    }
                }
            }
        }
        debug!("Live polling task exiting");
    })
}

fn spawn_simulation(logger: Arc<DataLogger>, timing: SimulationTiming) -> Vec<JoinHandle<()>> {
    let sampler = {
        let logger = logger.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + timing.sample_every, timing.sample_every);
            let mut rng = StdRng::from_entropy();
            let cancel = logger.cancellation().clone();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = simulated_snapshot(
                            &mut rng,
                            logger.settings().max_battery_voltage,
                            Utc::now(),
                        );
                        let s = &snapshot.state;
                        debug!(
                            "Simulated device status change ({},{},{},{},{},{}).",
                            s.external_power_voltage,
                            s.battery_one_voltage,
                            s.battery_one_level,
                            s.battery_two_voltage,
                            s.battery_two_level,
                            s.temperature
                        );
                        logger.push_state_change(snapshot).await;
                    }
                }
            }
        })
    };

    let publisher = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + timing.publish_every, timing.publish_every);
        let cancel = logger.cancellation().clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => logger.publish_historic_data().await,
            }
        }
    });

    vec![sampler, publisher]
}

/// Random device state: batteries between 0 and 10 V, temperature between 20 and 30 degrees
pub fn simulated_snapshot<R: Rng>(
    rng: &mut R,
    max_battery_voltage: f64,
    timestamp: DateTime<Utc>,
) -> Snapshot {
    let battery_one_voltage = round_to(rng.gen_range(0.0..=10.0), 3);
    let battery_two_voltage = round_to(rng.gen_range(0.0..=10.0), 3);
    let temperature = round_to(rng.gen_range(20.0..=30.0), 1);

    Snapshot {
        timestamp,
        state: DeviceState {
            external_power_voltage: 0.0,
            battery_one_voltage,
            battery_one_level: battery_level(battery_one_voltage, max_battery_voltage),
            battery_two_voltage,
            battery_two_level: battery_level(battery_two_voltage, max_battery_voltage),
            temperature,
        },
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
