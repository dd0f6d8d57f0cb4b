use crate::config::DataLoggerConfig;
use crate::error::AcquisitionError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info};

/// Suffix given to attachments once they have been read
pub const PROCESSED_SUFFIX: &str = ".processed";

/// Where CSV telemetry bodies come from
#[async_trait]
pub trait CsvSource: Send + Sync {
    /// Returns the body of the next unread attachment
    async fn fetch_csv(&self) -> Result<String, AcquisitionError>;
}

/// Reads attachments that the mail fetcher saved into a drop directory.
///
/// The oldest file whose name contains the location id is taken and renamed with
/// [`PROCESSED_SUFFIX`] so it is not read twice.
#[derive(Debug, Clone)]
pub struct MailDropSource {
    directory: PathBuf,
    location_id: String,
    subject: String,
    username: String,
    server: String,
}

impl MailDropSource {
    pub fn new(config: &DataLoggerConfig) -> Self {
        Self {
            directory: config.mail_drop.clone(),
            location_id: config.location_id.clone(),
            subject: config.subject.clone(),
            username: config.username.clone(),
            server: config.server.clone(),
        }
    }

    async fn unread_attachments(&self) -> Result<Vec<(SystemTime, PathBuf)>, AcquisitionError> {
        let mut entries = fs::read_dir(&self.directory).await?;
        let mut matching = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(PROCESSED_SUFFIX) {
                continue;
            }
            if !file_name.contains(&self.location_id) {
                debug!("Ignored attachment {file_name}");
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            matching.push((modified, entry.path()));
        }

        matching.sort();
        Ok(matching)
    }
}

#[async_trait]
impl CsvSource for MailDropSource {
    async fn fetch_csv(&self) -> Result<String, AcquisitionError> {
        let attachments = self.unread_attachments().await?;
        let Some((_, path)) = attachments.first() else {
            return Err(AcquisitionError::NoMatchingMessage {
                subject: self.subject.clone(),
                username: self.username.clone(),
                server: self.server.clone(),
            });
        };

        info!(
            "Found {} new attachments matching location \"{}\" for subject \"{}\".",
            attachments.len(),
            self.location_id,
            self.subject
        );
        debug!("Found matching attachment {}", path.display());

        // Marked consumed before decoding
        let bytes = fs::read(path).await?;
        let mut processed = path.clone().into_os_string();
        processed.push(PROCESSED_SUFFIX);
        fs::rename(path, &processed).await?;

        let content = String::from_utf8_lossy(&bytes);
        let content = content.trim().replace("\r\n", "\n");
        if content.is_empty() {
            return Err(AcquisitionError::EmptyAttachment(path.display().to_string()));
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    fn source_for(dir: &Path) -> MailDropSource {
        MailDropSource::new(&DataLoggerConfig {
            mail_drop: dir.to_path_buf(),
            location_id: "SITE42".to_string(),
            subject: "Daily report".to_string(),
            username: "logger".to_string(),
            server: "imap.example.com".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_no_matching_attachment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("OTHER_2024.csv"), "a,b,c").unwrap();

        let err = source_for(dir.path()).fetch_csv().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No new message matching subject \"Daily report\" found for user \"logger\" on server \"imap.example.com\""
        );
    }

    #[tokio::test]
    async fn test_reads_and_marks_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SITE42_2024-01-01.csv");
        std::fs::write(&path, "Flow_reading,2024-01-01T00:00:00,1\r\n\r\n").unwrap();

        let source = source_for(dir.path());
        let body = source.fetch_csv().await.unwrap();
        assert_eq!(body, "Flow_reading,2024-01-01T00:00:00,1");
        assert!(!path.exists());
        assert!(dir.path().join("SITE42_2024-01-01.csv.processed").exists());

        // Already consumed
        assert!(matches!(
            source.fetch_csv().await,
            Err(AcquisitionError::NoMatchingMessage { .. })
        ));
    }

    #[tokio::test]
    async fn test_oldest_attachment_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SITE42_a.csv"), "first,2024-01-01T00:00:00,1").unwrap();
        // Coarse file systems need a visible gap between modification times
        tokio::time::sleep(Duration::from_millis(1100)).await;
        std::fs::write(dir.path().join("SITE42_b.csv"), "second,2024-01-01T00:00:00,2").unwrap();

        let source = source_for(dir.path());
        assert!(source.fetch_csv().await.unwrap().starts_with("first"));
        assert!(source.fetch_csv().await.unwrap().starts_with("second"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_attachment_does_not_block_newer_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("SITE42_a.csv"),
            b"System Temp_reading,2024-01-01T00:00:00,21\xb0\n",
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        std::fs::write(dir.path().join("SITE42_b.csv"), "second,2024-01-01T00:00:00,2").unwrap();

        let source = source_for(dir.path());
        let first = source.fetch_csv().await.unwrap();
        assert!(first.starts_with("System Temp_reading,2024-01-01T00:00:00,21"));
        assert!(first.ends_with('\u{FFFD}'));
        assert!(dir.path().join("SITE42_a.csv.processed").exists());

        assert!(source.fetch_csv().await.unwrap().starts_with("second"));
    }

    #[tokio::test]
    async fn test_empty_attachment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SITE42.csv"), "  \r\n").unwrap();

        let result = source_for(dir.path()).fetch_csv().await;
        assert!(matches!(result, Err(AcquisitionError::EmptyAttachment(_))));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_for(&dir.path().join("missing"));
        assert!(matches!(
            source.fetch_csv().await,
            Err(AcquisitionError::Io(_))
        ));
    }
}
