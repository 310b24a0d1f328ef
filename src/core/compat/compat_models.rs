// Compatibility lookup domain models.
//
// These types carry no HTTP or Discord details. The infra layer fills them
// from the remote API and the Discord layer turns them into embeds.

use super::product_codes::ProductCode;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CompatError {
    #[error("Compatibility API error: {0}")]
    Api(String),
    #[error("Thumbnail store error: {0}")]
    Store(String),
}

/// Failure while presenting a result (reacting, sending a reply).
#[derive(Debug, Error)]
#[error("Reply failed: {0}")]
pub struct ReplyError(pub String);

// ============================================================================
// REMOTE RECORDS
// ============================================================================

/// One record as the compatibility API describes a title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TitleInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub thread: Option<u64>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub pr: Option<u64>,
}

/// Outcome of a search against the compatibility API.
///
/// Maintenance and communication errors are signalled by the API itself and
/// are expected outcomes, not transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatOutcome {
    Found(HashMap<String, TitleInfo>),
    Maintenance,
    CommunicationError,
}

// ============================================================================
// DISPLAY
// ============================================================================

/// Which kind of answer a lookup produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    /// A record exists (directly or synthesized from a category tag).
    Known { status: String },
    Unknown,
    Maintenance,
    CommunicationError,
}

/// Rendered outcome of a lookup, ready to be turned into a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayResult {
    /// Code the result is about. `None` when the failure was generic.
    pub code: Option<ProductCode>,
    pub title: String,
    pub state: DisplayState,
    pub thumbnail_url: Option<String>,
    pub date: Option<String>,
    pub commit: Option<String>,
    pub pr: Option<u64>,
    pub thread: Option<u64>,
    /// Compact rendering for moderation/log channels.
    pub for_log: bool,
}

impl DisplayResult {
    pub fn unknown(
        code: Option<&ProductCode>,
        title_hint: Option<&str>,
        for_log: bool,
        thumbnail_url: Option<String>,
    ) -> Self {
        let title = match (title_hint, code) {
            (Some(hint), _) if !hint.trim().is_empty() => hint.trim().to_string(),
            (_, Some(code)) => format!("Product code {code} was not found in compatibility database"),
            _ => "Unknown product code".to_string(),
        };

        Self {
            code: code.cloned(),
            title,
            state: DisplayState::Unknown,
            thumbnail_url,
            date: None,
            commit: None,
            pr: None,
            thread: None,
            for_log,
        }
    }

    pub fn maintenance(code: Option<&ProductCode>) -> Self {
        Self::service_state(
            code,
            "Compatibility list is undergoing maintenance",
            DisplayState::Maintenance,
        )
    }

    pub fn communication_error(code: Option<&ProductCode>) -> Self {
        Self::service_state(
            code,
            "Error communicating with compatibility API, try again later",
            DisplayState::CommunicationError,
        )
    }

    fn service_state(code: Option<&ProductCode>, title: &str, state: DisplayState) -> Self {
        Self {
            code: code.cloned(),
            title: title.to_string(),
            state,
            thumbnail_url: None,
            date: None,
            commit: None,
            pr: None,
            thread: None,
            for_log: false,
        }
    }

    /// Build a result from a record. The record's own title wins over the hint.
    pub fn from_title_info(
        code: &ProductCode,
        info: &TitleInfo,
        title_hint: Option<&str>,
        for_log: bool,
        thumbnail_url: Option<String>,
    ) -> Self {
        let title = info
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(title_hint.filter(|t| !t.trim().is_empty()))
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| code.to_string());

        Self {
            code: Some(code.clone()),
            title,
            state: DisplayState::Known {
                status: info.status.clone().unwrap_or_else(|| "Unknown".to_string()),
            },
            thumbnail_url,
            date: info.date.clone(),
            commit: info.commit.clone(),
            pr: info.pr,
            thread: info.thread,
            for_log,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match &self.state {
            DisplayState::Known { status } => Some(status),
            _ => None,
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Build that a presumed-playable category is credited to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub commit: String,
    pub date: NaiveDate,
    pub pr: u64,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            commit: "8b449ce76c91d5ff7a2829b233befe7d6df4b24f".to_string(),
            date: NaiveDate::from_ymd_opt(2018, 6, 23).unwrap_or_default(),
            pr: 4802,
        }
    }
}

/// Category tags used when the API has no record for a code.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub presumed_playable_categories: Vec<String>,
    pub presumed_playable: Provenance,
    pub presumed_nothing_categories: Vec<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            presumed_playable_categories: vec!["1P".to_string()],
            presumed_playable: Provenance::default(),
            presumed_nothing_categories: ["2P", "2G", "2D", "PP", "PE", "MN"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// Minimal compatibility API surface the service needs.
#[async_trait]
pub trait CompatClient: Send + Sync {
    async fn search(&self, term: &str) -> Result<CompatOutcome, CompatError>;
}

/// Where thumbnails for product codes come from.
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    async fn thumbnail_url(&self, code: &ProductCode) -> Result<Option<String>, CompatError>;
}

/// Who triggered a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyOrigin {
    pub author_id: u64,
    pub is_private: bool,
}

/// Chat-side operations of the reply pipeline.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Show that lookups are in progress.
    async fn mark_working(&self) -> Result<(), ReplyError>;
    /// Remove the in-progress marker.
    async fn clear_working(&self) -> Result<(), ReplyError>;
    /// Flag the origin message after the content override fired.
    async fn flag_override(&self) -> Result<(), ReplyError>;
    async fn send_result(&self, result: &DisplayResult) -> Result<(), ReplyError>;
}
