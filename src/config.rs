// Runtime configuration, read from the environment (and `.env`).
//
// Everything except the token has a default so the bot starts with an empty
// environment. Malformed values are logged and replaced by the default.

use crate::core::compat::{CodeLimits, ContentOverride, LookupConfig, Provenance};
use crate::core::nicknames::NicknameConfig;
use chrono::NaiveDate;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub database_path: String,
    pub compat_api_url: String,
    pub compat_api_timeout: Duration,
    /// How many earlier messages to scan for the bot's own replies.
    pub history_throttle: u8,
    /// Earlier messages older than this are ignored.
    pub history_window: Duration,
    pub code_limits: CodeLimits,
    pub lookup: LookupConfig,
    pub content_override: ContentOverride,
    pub nicknames: NicknameConfig,
    pub allow_listed_roles: Vec<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            database_path: "data/compat_bot.db".to_string(),
            compat_api_url: "https://rpcs3.net/compatibility".to_string(),
            compat_api_timeout: Duration::from_secs(30),
            history_throttle: 7,
            history_window: Duration::from_secs(10 * 60),
            code_limits: CodeLimits::default(),
            lookup: LookupConfig::default(),
            content_override: ContentOverride::default(),
            nicknames: NicknameConfig::default(),
            allow_listed_roles: Vec::new(),
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so tests don't have to touch the process env.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let lookup = LookupConfig {
            presumed_playable_categories: parsed("PRESUMED_PLAYABLE_CATEGORIES")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.lookup.presumed_playable_categories),
            presumed_playable: Provenance {
                commit: parsed("PRESUMED_PLAYABLE_COMMIT")
                    .unwrap_or(defaults.lookup.presumed_playable.commit),
                date: parse_or(
                    "PRESUMED_PLAYABLE_DATE",
                    parsed("PRESUMED_PLAYABLE_DATE"),
                    defaults.lookup.presumed_playable.date,
                    |v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok(),
                ),
                pr: number_or(
                    "PRESUMED_PLAYABLE_PR",
                    parsed("PRESUMED_PLAYABLE_PR"),
                    defaults.lookup.presumed_playable.pr,
                ),
            },
            presumed_nothing_categories: parsed("PRESUMED_NOTHING_CATEGORIES")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.lookup.presumed_nothing_categories),
        };

        let content_override = ContentOverride {
            author_id: number_or(
                "CONTENT_OVERRIDE_AUTHOR_ID",
                parsed("CONTENT_OVERRIDE_AUTHOR_ID"),
                defaults.content_override.author_id,
            ),
            blocked_substrings: parsed("CONTENT_OVERRIDE_SUBSTRINGS")
                .map(|v| split_list(&v).into_iter().map(|s| s.to_lowercase()).collect())
                .unwrap_or(defaults.content_override.blocked_substrings),
        };

        let nicknames = NicknameConfig {
            recheck_interval: Duration::from_secs(number_or(
                "FORCED_NICKNAMES_RECHECK_SECS",
                parsed("FORCED_NICKNAMES_RECHECK_SECS"),
                defaults.nicknames.recheck_interval.as_secs(),
            )),
            log_sweep_failures: number_or(
                "NICKNAME_LOG_SWEEP_FAILURES",
                parsed("NICKNAME_LOG_SWEEP_FAILURES"),
                defaults.nicknames.log_sweep_failures,
            ),
        };

        Self {
            database_path: parsed("DATABASE_PATH").unwrap_or(defaults.database_path),
            compat_api_url: parsed("COMPAT_API_URL").unwrap_or(defaults.compat_api_url),
            compat_api_timeout: Duration::from_secs(number_or(
                "COMPAT_API_TIMEOUT_SECS",
                parsed("COMPAT_API_TIMEOUT_SECS"),
                defaults.compat_api_timeout.as_secs(),
            )),
            history_throttle: number_or(
                "PRODUCT_CODE_HISTORY_THROTTLE",
                parsed("PRODUCT_CODE_HISTORY_THROTTLE"),
                defaults.history_throttle,
            ),
            history_window: Duration::from_secs(number_or(
                "PRODUCT_CODE_HISTORY_WINDOW_SECS",
                parsed("PRODUCT_CODE_HISTORY_WINDOW_SECS"),
                defaults.history_window.as_secs(),
            )),
            code_limits: CodeLimits {
                public: number_or(
                    "PRODUCT_CODE_PUBLIC_LIMIT",
                    parsed("PRODUCT_CODE_PUBLIC_LIMIT"),
                    defaults.code_limits.public,
                ),
                private: number_or(
                    "PRODUCT_CODE_PRIVATE_LIMIT",
                    parsed("PRODUCT_CODE_PRIVATE_LIMIT"),
                    defaults.code_limits.private,
                ),
            },
            lookup,
            content_override,
            nicknames,
            allow_listed_roles: parsed("NICKNAME_ALLOWLIST_ROLE_IDS")
                .map(|v| {
                    split_list(&v)
                        .into_iter()
                        .filter_map(|id| match id.parse::<u64>() {
                            Ok(id) => Some(id),
                            Err(_) => {
                                tracing::warn!(value = %id, "Ignoring malformed allow-listed role id");
                                None
                            }
                        })
                        .collect()
                })
                .unwrap_or(defaults.allow_listed_roles),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn number_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    parse_or(key, value, default, |v| v.trim().parse().ok())
}

fn parse_or<T>(
    key: &str,
    value: Option<String>,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    match value {
        None => default,
        Some(raw) => parse(&raw).unwrap_or_else(|| {
            tracing::warn!(key, value = %raw, "Malformed configuration value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> BotConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = config(&[]);
        assert_eq!(config.code_limits, CodeLimits { public: 5, private: 50 });
        assert_eq!(config.history_throttle, 7);
        assert_eq!(config.lookup.presumed_playable.pr, 4802);
        assert_eq!(config.lookup.presumed_nothing_categories.len(), 6);
        assert!(config.nicknames.log_sweep_failures);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = config(&[
            ("PRODUCT_CODE_PUBLIC_LIMIT", "3"),
            ("PRESUMED_PLAYABLE_CATEGORIES", "1P, 1G"),
            ("PRESUMED_PLAYABLE_DATE", "2020-01-31"),
            ("NICKNAME_LOG_SWEEP_FAILURES", "false"),
            ("NICKNAME_ALLOWLIST_ROLE_IDS", "10,20, 30"),
            ("CONTENT_OVERRIDE_SUBSTRINGS", "Atlantis"),
        ]);

        assert_eq!(config.code_limits.public, 3);
        assert_eq!(config.code_limits.private, 50);
        assert_eq!(config.lookup.presumed_playable_categories, vec!["1P", "1G"]);
        assert_eq!(
            config.lookup.presumed_playable.date,
            NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()
        );
        assert!(!config.nicknames.log_sweep_failures);
        assert_eq!(config.allow_listed_roles, vec![10, 20, 30]);
        assert_eq!(config.content_override.blocked_substrings, vec!["atlantis"]);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = config(&[
            ("PRODUCT_CODE_PRIVATE_LIMIT", "lots"),
            ("PRESUMED_PLAYABLE_DATE", "yesterday"),
            ("FORCED_NICKNAMES_RECHECK_SECS", "-5"),
        ]);

        assert_eq!(config.code_limits.private, 50);
        assert_eq!(
            config.lookup.presumed_playable.date,
            NaiveDate::from_ymd_opt(2018, 6, 23).unwrap()
        );
        assert_eq!(
            config.nicknames.recheck_interval,
            Duration::from_secs(3 * 60 * 60)
        );
    }
}
