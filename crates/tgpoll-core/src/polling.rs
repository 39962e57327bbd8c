//! `getUpdates` long polling: one poll cycle, the loop around it, and the
//! shutdown-conflict policy.
//!
//! The cursor (`offset`) lives only inside [`run_polling_loop`]. Telegram confirms
//! every update below the offset of the next request, so the cursor advances to
//! `last.update_id + 1` after each successful cycle and is never persisted.

use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
};

use tokio_util::sync::CancellationToken;

use crate::{
    domain::Update,
    filters::matches_restrictions,
    ports::{GetUpdatesBody, UpdateFetcher, UpdateSink},
    Error, Result,
};

/// Telegram answers 409 when two `getUpdates` calls overlap for one bot.
pub const CONFLICT_STATUS: u16 = 409;

/// Sentinel in the allowed-kinds list that selects every kind.
pub const ALL_UPDATES: &str = "*";

pub const DEFAULT_LIMIT: u32 = 50;
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;

/// Static configuration of one trigger activation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollingOptions {
    /// Kinds to request and emit; empty means no kind filter.
    pub allowed_updates: Vec<String>,
    pub limit: u32,
    /// Long-poll duration in seconds, interpreted by Telegram.
    pub timeout: u32,
    pub restrict_chat_ids: HashSet<String>,
    pub restrict_user_ids: HashSet<String>,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            allowed_updates: Vec::new(),
            limit: DEFAULT_LIMIT,
            timeout: DEFAULT_TIMEOUT_SECS,
            restrict_chat_ids: HashSet::new(),
            restrict_user_ids: HashSet::new(),
        }
    }
}

impl PollingOptions {
    fn has_restrictions(&self) -> bool {
        !self.restrict_chat_ids.is_empty() || !self.restrict_user_ids.is_empty()
    }
}

/// Liveness flag plus cancellation signal shared between a trigger and its loop.
#[derive(Debug)]
pub struct PollingControl {
    active: AtomicBool,
    cancel: CancellationToken,
}

impl Default for PollingControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingControl {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the loop inactive, then abort the in-flight request.
    pub fn signal_stop(&self) {
        self.active.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once [`signal_stop`](Self::signal_stop) has been called.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }
}

/// What one poll cycle produced.
#[derive(Clone, Debug, PartialEq)]
pub struct PollOutcome {
    pub next_offset: i64,
    pub updates_to_emit: Vec<Update>,
    pub requested_body: GetUpdatesBody,
}

/// Collapse the `*` sentinel to the empty list Telegram reads as "all kinds".
pub fn normalize_allowed_updates(allowed_updates: Vec<String>) -> Vec<String> {
    if allowed_updates.iter().any(|k| k == ALL_UPDATES) {
        Vec::new()
    } else {
        allowed_updates
    }
}

pub fn build_get_updates_body(offset: i64, options: &PollingOptions) -> GetUpdatesBody {
    GetUpdatesBody {
        offset,
        limit: options.limit,
        timeout: options.timeout,
        allowed_updates: options.allowed_updates.clone(),
    }
}

/// Telegram returns updates in ascending `update_id` order, so the last one decides.
pub fn compute_next_offset(current_offset: i64, updates: &[Update]) -> i64 {
    match updates.last() {
        Some(last) => last.update_id + 1,
        None => current_offset,
    }
}

/// Kind filter first, then chat/user restrictions when any are configured.
pub fn filter_updates_for_emit(updates: Vec<Update>, options: &PollingOptions) -> Vec<Update> {
    let check_restrictions = options.has_restrictions();
    updates
        .into_iter()
        .filter(|u| {
            options.allowed_updates.is_empty()
                || options.allowed_updates.iter().any(|k| k == u.kind_tag())
        })
        .filter(|u| {
            !check_restrictions
                || matches_restrictions(u, &options.restrict_chat_ids, &options.restrict_user_ids)
        })
        .collect()
}

/// A 409 is benign only once the loop has been told to stop: aborting the in-flight
/// long poll can race with the next one and Telegram reports the overlap.
pub fn is_ignorable_conflict(err: &Error, is_active: bool) -> bool {
    if is_active {
        return false;
    }
    err.response()
        .and_then(|r| r.status_code())
        .is_some_and(|status| status == CONFLICT_STATUS)
}

/// One request/response/offset/filter cycle. Never retries.
///
/// A response with `ok: false` or without `result` is an empty poll, not an error.
pub async fn poll_once(
    fetcher: &dyn UpdateFetcher,
    offset: i64,
    options: &PollingOptions,
    cancel: &CancellationToken,
) -> Result<PollOutcome> {
    let requested_body = build_get_updates_body(offset, options);
    let response = fetcher.get_updates(&requested_body, cancel).await?;

    let updates = match response.result {
        Some(updates) if response.ok => updates,
        _ => {
            tracing::debug!(
                offset,
                description = response.description.as_deref().unwrap_or(""),
                "getUpdates returned no result"
            );
            return Ok(PollOutcome {
                next_offset: offset,
                updates_to_emit: Vec::new(),
                requested_body,
            });
        }
    };

    let next_offset = compute_next_offset(offset, &updates);
    let received = updates.len();
    let updates_to_emit = if updates.is_empty() {
        Vec::new()
    } else {
        filter_updates_for_emit(updates, options)
    };

    tracing::debug!(
        offset,
        next_offset,
        received,
        emitted = updates_to_emit.len(),
        "poll cycle complete"
    );

    Ok(PollOutcome {
        next_offset,
        updates_to_emit,
        requested_body,
    })
}

/// Poll until `control` goes inactive or `max_iterations` cycles have run.
///
/// Each non-empty batch goes to `sink` as one unit. A fetch error ends the loop
/// unless it is the shutdown conflict described in [`is_ignorable_conflict`].
pub async fn run_polling_loop(
    fetcher: &dyn UpdateFetcher,
    sink: &dyn UpdateSink,
    options: &PollingOptions,
    control: &PollingControl,
    max_iterations: Option<usize>,
) -> Result<()> {
    let mut offset: i64 = 0;
    let mut iterations: usize = 0;

    while control.is_active() {
        if max_iterations.is_some_and(|max| iterations >= max) {
            return Ok(());
        }
        iterations += 1;

        match poll_once(fetcher, offset, options, control.cancel_token()).await {
            Ok(outcome) => {
                offset = outcome.next_offset;
                if !outcome.updates_to_emit.is_empty() {
                    sink.emit(outcome.updates_to_emit);
                }
            }
            Err(e) if is_ignorable_conflict(&e, control.is_active()) => {
                tracing::debug!("getUpdates 409 during shutdown, ignoring");
                continue;
            }
            Err(e) => {
                // Errors caused by our own stop are part of a clean shutdown.
                if control.is_active() && !matches!(e, Error::Cancelled) {
                    tracing::error!(error = %e, offset, "polling loop stopped");
                } else {
                    tracing::debug!(error = %e, offset, "polling loop stopped during shutdown");
                }
                return Err(e);
            }
        }
    }

    Ok(())
}
