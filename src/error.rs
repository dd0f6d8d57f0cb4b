use thiserror::Error;

/// Startup configuration problems that cannot be corrected by falling back to a default.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown time zone `{0}`")]
    UnknownTimeZone(String),

    #[error("Missing configuration value {0}")]
    Missing(&'static str),

    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures that end an acquisition cycle early without touching device state.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("No new message matching subject \"{subject}\" found for user \"{username}\" on server \"{server}\"")]
    NoMatchingMessage {
        subject: String,
        username: String,
        server: String,
    },

    #[error("Attachment {0} is empty")]
    EmptyAttachment(String),

    #[error("Mail drop I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("Data logger stopped, discarding acquisition")]
    Stopped,
}

/// Problems with a single CSV row; the row is skipped and processing continues.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("Row has {0} columns, expected at least 3")]
    TooShort(usize),

    #[error("Cannot parse timestamp `{0}`")]
    Timestamp(String),

    #[error("Local time `{0}` does not exist in the configured time zone")]
    NonexistentLocalTime(String),

    #[error("Cannot parse reading `{0}`")]
    Value(String),

    #[error("Channel {0} not configured")]
    UnknownChannel(String),

    #[error("Unknown device field `{0}`")]
    UnknownField(String),
}
