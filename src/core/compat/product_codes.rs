// Product code extraction.
//
// A product code is four letters (platform/region family) followed by five
// digits, e.g. BLES01234. In free text people write it with a space or a
// hyphen in the middle and in any case; we always hand out the compact
// uppercase form.
//
// See http://www.psdevwiki.com/ps3/Productcode for the letter families.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

static PRODUCT_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        // ASCII-only: no Unicode case folding or non-ASCII digits.
        r"(?i-u)(?P<letters>(?:[BPSUVX][CL]|P[ETU]|NP)[AEHJKPUIX][ABJKLMPQRS]|MRTC)[ \-]?(?P<numbers>[0-9]{5})",
    )
    .expect("product code pattern is valid")
});

/// Normalized product code: uppercase letters immediately followed by digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductCode(String);

impl ProductCode {
    /// Parse a single code, accepting the same separators as the extractor.
    /// Returns `None` unless the whole input is exactly one code.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let caps = PRODUCT_CODE.captures(input)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != input.len() {
            return None;
        }
        Some(Self::from_parts(&caps["letters"], &caps["numbers"]))
    }

    fn from_parts(letters: &str, numbers: &str) -> Self {
        Self(format!("{letters}{numbers}").to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Find all product codes in `input`, uppercased, without separators and
/// deduplicated in first-seen order. Empty input gives an empty list.
pub fn extract_codes(input: &str) -> Vec<ProductCode> {
    if input.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    PRODUCT_CODE
        .captures_iter(input)
        .map(|caps| ProductCode::from_parts(&caps["letters"], &caps["numbers"]))
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

/// How many codes a single message may trigger lookups for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLimits {
    pub public: usize,
    pub private: usize,
}

impl Default for CodeLimits {
    fn default() -> Self {
        Self {
            public: 5,
            private: 50,
        }
    }
}

impl CodeLimits {
    pub fn for_channel(&self, is_private: bool) -> usize {
        if is_private {
            self.private
        } else {
            self.public
        }
    }
}

/// Drop codes the bot already answered recently and cap what is left.
///
/// `previous_replies` is the concatenated text of the bot's recent replies in
/// the channel; a code counts as answered if it appears there in any case.
pub fn select_codes(
    codes: Vec<ProductCode>,
    previous_replies: &str,
    is_private: bool,
    limits: CodeLimits,
) -> Vec<ProductCode> {
    let previous = previous_replies.to_ascii_uppercase();
    codes
        .into_iter()
        .filter(|code| !previous.contains(code.as_str()))
        .take(limits.for_channel(is_private))
        .collect()
}
