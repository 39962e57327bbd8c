use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{domain::Update, Result};

/// Body of a `getUpdates` call, sent verbatim as JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GetUpdatesBody {
    pub offset: i64,
    pub limit: u32,
    pub timeout: u32,
    /// Empty means "every kind" on the Telegram side.
    pub allowed_updates: Vec<String>,
}

/// Bot API response envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    /// Convert the payload while keeping the envelope fields.
    pub fn map_result<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            ok: self.ok,
            result: self.result.map(f),
            description: self.description,
            error_code: self.error_code,
        }
    }

    pub fn success(result: T) -> Self {
        Self {
            ok: true,
            result: Some(result),
            description: None,
            error_code: None,
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            description: Some(description.into()),
            error_code: None,
        }
    }
}

/// Port for the `getUpdates` transport.
///
/// Implementations must return promptly (typically `Error::Cancelled`) once `cancel`
/// fires, and must not add a client-side timeout on top of `body.timeout`.
#[async_trait]
pub trait UpdateFetcher: Send + Sync {
    async fn get_updates(
        &self,
        body: &GetUpdatesBody,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse<Vec<Update>>>;
}

/// Port for handing emitted batches to downstream processing.
pub trait UpdateSink: Send + Sync {
    fn emit(&self, updates: Vec<Update>);
}

impl<F> UpdateSink for F
where
    F: Fn(Vec<Update>) + Send + Sync,
{
    fn emit(&self, updates: Vec<Update>) {
        self(updates)
    }
}
