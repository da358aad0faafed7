use std::time::Duration;

use reqwest::Client;
use shared::{error::ControlError, protocol::FullState};
use tracing::info;
use url::Url;

/// Outbound calls never retry and are bounded by this timeout.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// One-way replication client for the external state API.
///
/// Push is best-effort: with no endpoint configured it is a silent no-op, and
/// callers on the hot path must treat failures as log-only.
#[derive(Clone)]
pub struct SyncBridge {
    http: Client,
    endpoint: Option<Url>,
}

impl SyncBridge {
    pub fn new(endpoint: Option<Url>) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Sends the full snapshot to the external endpoint.
    pub async fn push(&self, state: &FullState) -> Result<(), ControlError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };

        let response = self
            .http
            .post(endpoint.clone())
            .timeout(SYNC_TIMEOUT)
            .json(state)
            .send()
            .await
            .map_err(|error| ControlError::ExternalUnreachable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(ControlError::ExternalError(response.status().as_u16()));
        }

        info!(status = %response.status(), "pushed state to external API");
        Ok(())
    }

    /// Fetches the external copy of the state. Unlike push, an explicit pull
    /// against an unconfigured endpoint is an error the caller sees.
    pub async fn pull(&self) -> Result<FullState, ControlError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(ControlError::NotConfigured);
        };

        let response = self
            .http
            .get(endpoint.clone())
            .timeout(SYNC_TIMEOUT)
            .send()
            .await
            .map_err(|error| ControlError::ExternalUnreachable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(ControlError::ExternalError(response.status().as_u16()));
        }

        response
            .json::<FullState>()
            .await
            .map_err(|error| ControlError::ExternalUnreachable(error.to_string()))
    }
}
