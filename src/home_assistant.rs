use crate::channel_router::Reading;
use crate::publisher::{OperationalState, Publisher};
use crate::snapshot::{DeviceState, Field, Snapshot};
use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use tracing::{debug, warn};

pub struct HomeAssistantAPI {
    endpoint_url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl Default for HomeAssistantAPI {
    fn default() -> Self {
        Self::new()
    }
}

impl HomeAssistantAPI {
    /// Connection details from `HA_URL` and `HA_TOKEN`
    pub fn new() -> Self {
        Self::with_endpoint(
            env::var("HA_URL").unwrap_or_default(),
            env::var("HA_TOKEN").unwrap_or_default(),
        )
    }

    pub fn with_endpoint(endpoint_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            auth_token: auth_token.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint_url.is_empty()
    }

    /// Creates or updates the state of an entity
    pub async fn set_sensor_state(
        &self,
        entity_id: &str,
        state: &str,
        attributes: Value,
    ) -> Result<HASensor, anyhow::Error> {
        if !self.is_configured() {
            anyhow::bail!("No HA connection");
        }
        let result = self
            .client
            .post(format!("{}/api/states/{}", self.endpoint_url, entity_id))
            .bearer_auth(&self.auth_token)
            .json(&StateUpdate { state, attributes })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(result)
    }
}

#[derive(Serialize)]
struct StateUpdate<'a> {
    state: &'a str,
    attributes: Value,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HASensor {
    #[serde(rename = "entity_id")]
    pub entity_id: String,
    pub state: String,
    #[serde(rename = "last_changed", default)]
    pub last_changed: String,
    #[serde(rename = "last_updated", default)]
    pub last_updated: String,
}

/// Mirrors the data logger into Home Assistant sensors named `sensor.<device>_<field>`
pub struct HomeAssistantPublisher {
    api: HomeAssistantAPI,
    entity_prefix: String,
}

impl HomeAssistantPublisher {
    pub fn new(api: HomeAssistantAPI, device_name: &str) -> Self {
        Self {
            api,
            entity_prefix: format!("sensor.{}", slugify(device_name)),
        }
    }

    fn entity(&self, suffix: &str) -> String {
        format!("{}_{}", self.entity_prefix, slugify(suffix))
    }

    async fn send(&self, entity_id: &str, state: &str, attributes: Value) {
        match self.api.set_sensor_state(entity_id, state, attributes).await {
            Ok(sensor) => debug!("Updated {} to {}", sensor.entity_id, sensor.state),
            Err(e) => warn!("Failed to update Home Assistant entity {entity_id}: {e}"),
        }
    }
}

#[async_trait]
impl Publisher for HomeAssistantPublisher {
    async fn publish_operational_state_change(&self, state: &OperationalState) {
        self.send(
            &self.entity("status"),
            &state.status.to_string(),
            json!({ "message": state.message }),
        )
        .await;
    }

    async fn publish_state_change_history(&self, history: &[Snapshot]) {
        // States API only holds the present value
        debug!(
            "Not forwarding {} historic state changes to Home Assistant",
            history.len()
        );
    }

    async fn publish_state_change(&self, state: &DeviceState) {
        for field in Field::ALL {
            self.send(
                &self.entity(field.name()),
                &state.get(field).to_string(),
                json!({ "unit_of_measurement": unit_of(field) }),
            )
            .await;
        }
    }

    async fn publish_channel_history(&self, channel_id: &str, readings: &[Reading]) {
        let Some(latest) = readings.last() else {
            return;
        };
        self.send(
            &self.entity(channel_id),
            &latest.value.to_string(),
            json!({
                "measured_at": latest.timestamp.to_rfc3339(),
                "kind": latest.kind,
                "readings": readings.len(),
            }),
        )
        .await;
    }
}

fn unit_of(field: Field) -> &'static str {
    match field {
        Field::ExternalPowerVoltage | Field::BatteryOneVoltage | Field::BatteryTwoVoltage => "V",
        Field::BatteryOneLevel | Field::BatteryTwoLevel => "%",
        Field::Temperature => "°C",
    }
}

/// Lowercase entity id fragment, splitting camelCase words
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len() + 4);
    let mut previous_lower = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && previous_lower {
                slug.push('_');
            }
            slug.push(c.to_ascii_lowercase());
            previous_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !slug.ends_with('_') {
                slug.push('_');
            }
            previous_lower = false;
        }
    }
    slug.trim_matches('_').to_string()
}
