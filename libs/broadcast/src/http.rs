//! Pusher-compatible HTTP broadcaster.

use async_trait::async_trait;
use notecast_events::{ChannelSelector, WireMessage};
use notecast_id::SocketId;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;

use crate::{config::ConfigError, BroadcastConfig, BroadcastError, Broadcaster};

const MAX_ERROR_BODY: usize = 512;

/// Posts events to `{base_url}/apps/{app_id}/events`.
#[derive(Debug, Clone)]
pub struct HttpBroadcaster {
    client: reqwest::Client,
    events_url: String,
}

/// Body of the events endpoint. `data` is the payload as a JSON string.
#[derive(Debug, Serialize)]
struct TriggerRequest<'a> {
    name: &'a str,
    channels: Vec<String>,
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    socket_id: Option<&'a SocketId>,
}

impl HttpBroadcaster {
    pub fn new(config: &BroadcastConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    ConfigError::InvalidValue {
                        var: "NOTECAST_BROADCAST_TOKEN",
                        value: "<redacted>".to_string(),
                    }
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            events_url: config.events_url(),
        })
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn broadcast(
        &self,
        channels: &[ChannelSelector],
        message: &WireMessage,
        except: Option<&SocketId>,
    ) -> Result<(), BroadcastError> {
        let body = TriggerRequest {
            name: &message.event_name,
            channels: channels.iter().map(ChannelSelector::wire_name).collect(),
            data: message.payload.to_string(),
            socket_id: except,
        };

        let response = self
            .client
            .post(&self.events_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BroadcastError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), url = %self.events_url, "Broadcast accepted");
            return Ok(());
        }

        let mut text = response.text().await.unwrap_or_default();
        if text.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }

        if status.is_server_error() {
            Err(BroadcastError::Unavailable(format!(
                "status {}: {}",
                status.as_u16(),
                text
            )))
        } else {
            Err(BroadcastError::Rejected {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}
