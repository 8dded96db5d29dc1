//! Advertisement heuristic consulted before a message is relayed.
//!
//! Pure and deterministic: the verdict depends only on the message snapshot
//! and the configured keyword denylist.

use regex::{Regex, RegexBuilder};

use crate::types::InboundMessage;

/// Keywords blocked when no list is configured.
pub const DEFAULT_BLOCKED_KEYWORDS: &[&str] = &[
    "advertisement",
    "promo code",
    "casino",
    "airdrop",
    "free crypto",
    "investment opportunity",
    "t.me/joinchat",
];

/// Compiled keyword denylist plus the structural advertisement signals.
#[derive(Debug, Clone)]
pub struct AdFilter {
    /// Case-insensitive alternation of the escaped keywords; `None` when the
    /// list is empty.
    keywords: Option<Regex>,
}

impl AdFilter {
    /// Compile a filter from a keyword list. Blank keywords are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the combined pattern exceeds the regex size limit.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let escaped: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        if escaped.is_empty() {
            return Ok(Self { keywords: None });
        }

        let pattern = RegexBuilder::new(&escaped.join("|"))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            keywords: Some(pattern),
        })
    }

    /// Filter with [`DEFAULT_BLOCKED_KEYWORDS`].
    ///
    /// # Errors
    ///
    /// Never fails for the built-in list; the `Result` mirrors [`AdFilter::new`].
    pub fn with_defaults() -> Result<Self, regex::Error> {
        Self::new(DEFAULT_BLOCKED_KEYWORDS)
    }

    /// Whether `message` looks like an advertisement.
    pub fn is_advertisement(&self, message: &InboundMessage) -> bool {
        is_advertisement(message, self.keywords.as_ref())
    }

    /// Whether `text` contains a denylisted keyword.
    pub fn contains_keyword(&self, text: &str) -> bool {
        self.keywords.as_ref().is_some_and(|re| re.is_match(text))
    }
}

/// Any one signal is enough: linked-channel origin, inline-bot relay, a
/// link-opening button, or a denylisted keyword in the text or caption.
pub fn is_advertisement(message: &InboundMessage, keywords: Option<&Regex>) -> bool {
    if message.from_linked_channel || message.via_bot {
        return true;
    }

    if message.buttons.iter().any(|button| button.url.is_some()) {
        return true;
    }

    match (keywords, message.text_content()) {
        (Some(re), Some(text)) => re.is_match(text),
        _ => false,
    }
}
