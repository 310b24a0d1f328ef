// Presentation-only rewrite applied to lookup results right before they are
// posted. It never influences what gets looked up.

use super::compat_models::{DisplayResult, ReplyOrigin};

const REPLACEMENT_TITLE: &str = "How about no (๑•ิཬ•ั๑)";
const REPLACEMENT_THUMBNAIL: &str =
    "https://cdn.discordapp.com/attachments/417347469521715210/516340151589535745/onionoff.png";

#[derive(Debug, Clone)]
pub struct ContentOverride {
    pub author_id: u64,
    /// Lowercase substrings; matched case-insensitively against the title.
    pub blocked_substrings: Vec<String>,
}

impl Default for ContentOverride {
    fn default() -> Self {
        Self {
            author_id: 197163728867688448,
            blocked_substrings: vec!["africa".to_string(), "afrika".to_string()],
        }
    }
}

impl ContentOverride {
    /// Rewrite `result` in place if the rule matches. Returns whether it did.
    pub fn apply(&self, origin: ReplyOrigin, result: &mut DisplayResult) -> bool {
        if origin.is_private || origin.author_id != self.author_id {
            return false;
        }

        let title = result.title.to_lowercase();
        if !self
            .blocked_substrings
            .iter()
            .any(|s| !s.is_empty() && title.contains(&s.to_lowercase()))
        {
            return false;
        }

        result.title = REPLACEMENT_TITLE.to_string();
        if result.thumbnail_url.as_deref().is_some_and(|u| !u.is_empty()) {
            result.thumbnail_url = Some(REPLACEMENT_THUMBNAIL.to_string());
        }
        true
    }
}
