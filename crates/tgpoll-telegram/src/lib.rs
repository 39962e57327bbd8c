//! Telegram Bot API transport (reqwest).
//!
//! This crate implements the `tgpoll-core` UpdateFetcher port over `getUpdates`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tgpoll_core::{
    config::Config,
    domain::{parse_update_list, Update},
    errors::{Error, ErrorResponse},
    ports::{ApiResponse, GetUpdatesBody, UpdateFetcher},
    Result,
};

/// Upper bound on the error body kept in [`ErrorResponse`].
const ERROR_BODY_MAX_CHARS: usize = 500;

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::with_api_url(cfg.telegram_bot_token.clone(), cfg.telegram_api_url.clone())
    }

    /// No client-side timeout: `getUpdates` blocks for the long-poll `timeout`
    /// and cancellation ends it early.
    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.token)
    }

    async fn send_get_updates(&self, body: &GetUpdatesBody) -> Result<ApiResponse<Vec<Update>>> {
        let resp = self
            .http
            .post(self.method_url("getUpdates"))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = text.chars().take(ERROR_BODY_MAX_CHARS).collect::<String>();
            tracing::debug!(%status, offset = body.offset, "getUpdates rejected");
            return Err(Error::Request {
                message: format!("getUpdates failed: {status}"),
                response: Some(ErrorResponse::with_status(status.as_u16(), detail)),
            });
        }

        let bytes = resp.bytes().await.map_err(map_reqwest_err)?;
        let envelope: ApiResponse<Vec<serde_json::Value>> = serde_json::from_slice(&bytes)?;
        Ok(envelope.map_result(parse_update_list))
    }
}

#[async_trait]
impl UpdateFetcher for TelegramClient {
    async fn get_updates(
        &self,
        body: &GetUpdatesBody,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse<Vec<Update>>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = self.send_get_updates(body) => res,
        }
    }
}

// reqwest includes the URL (and thus the token) in its Display output.
fn map_reqwest_err(e: reqwest::Error) -> Error {
    let e = e.without_url();
    let response = e
        .status()
        .map(|status| ErrorResponse::with_status(status.as_u16(), ""));
    Error::Request {
        message: format!("telegram request error: {e}"),
        response,
    }
}
