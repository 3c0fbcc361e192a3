//! Control-bus publishers.
//!
//! [`MqttBus`] talks to the actuator broker over MQTT; [`LoggingBus`] stands
//! in when the bus is disabled in config and only logs what would be sent.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;

use crate::config::BusConfig;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
}

/// Fire-and-forget publisher for actuator commands.
#[async_trait]
pub trait ControlBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError>;
}

// ---------------------------------------------------------------------------
// MqttBus
// ---------------------------------------------------------------------------

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 16;

pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    /// Create the client and spawn its event loop on the current tokio
    /// runtime.  Connection happens in the background; the loop retries
    /// every second while the broker is unreachable.
    pub fn connect(config: &BusConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(10));
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let broker = format!("{}:{}", config.host, config.port);
        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        log::info!("bus: connected to {broker}");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("bus: connection to {broker} failed: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client }
    }
}

#[async_trait]
impl ControlBus for MqttBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// LoggingBus
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LoggingBus;

#[async_trait]
impl ControlBus for LoggingBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        log::info!("bus: (disabled) {topic} <- {payload}");
        Ok(())
    }
}
