use halytech_data_logger::{
    config::DataLoggerConfig,
    home_assistant::{HomeAssistantAPI, HomeAssistantPublisher},
    ActorRegistry, LogPublisher, MailDropSource, MeterActor, PollMode, PollScheduler, Publisher,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting halytech data logger bridge");
    let config = DataLoggerConfig::load()?;

    // Publish to Home Assistant when HA_URL is set, otherwise only log
    let home_assistant = HomeAssistantAPI::new();
    let publisher: Arc<dyn Publisher> = if home_assistant.is_configured() {
        Arc::new(HomeAssistantPublisher::new(home_assistant, &config.name))
    } else {
        Arc::new(LogPublisher)
    };

    let mut actors = ActorRegistry::new();
    for channel in &config.channels {
        actors.register(Arc::new(MeterActor::new(channel.as_str(), publisher.clone())));
    }
    info!("Registered {} channel meters", actors.len());

    let source = Arc::new(MailDropSource::new(&config));
    let scheduler = PollScheduler::start(
        &config,
        source,
        publisher,
        actors,
        PollMode::from_config(&config),
    )
    .await?;
    info!("Data logger {} running in {:?} mode", config.name, scheduler.mode());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down data logger {}", config.name);
    scheduler.stop();

    Ok(())
}
