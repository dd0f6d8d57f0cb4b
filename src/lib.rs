//! Halytech Data Logger Library
//!
//! This library ingests CSV telemetry mailed by a Halytech data logger, groups the logger's own
//! readings into timestamped device snapshots, forwards channel readings to attached meters and
//! republishes the history plus a current state view.

pub mod actor;
pub mod battery;
pub mod channel_router;
pub mod config;
pub mod csv_reader;
pub mod data_logger;
pub mod error;
pub mod home_assistant;
pub mod mail_drop;
pub mod poll_scheduler;
pub mod publisher;
pub mod reconciler;
pub mod snapshot;

// Re-export commonly used types for easier access
pub use actor::{Actor, ActorRegistry, MeterActor};
pub use config::{DataLoggerConfig, Settings};
pub use data_logger::DataLogger;
pub use mail_drop::{CsvSource, MailDropSource};
pub use poll_scheduler::{PollMode, PollScheduler, SimulationTiming};
pub use publisher::{LogPublisher, MemoryPublisher, OperationalState, Publisher};
pub use snapshot::{DeviceState, Field, Snapshot};
