//! Crisis language detection.
//!
//! A fixed keyword scan over a normalized copy of the message. Matches
//! short-circuit the upstream call entirely: the canned crisis response is
//! stored and returned instead of generated text.

/// Phrases that indicate the user may be in crisis.
const CRISIS_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "want to die",
    "self harm",
    "hurt myself",
    "no reason to live",
    "give up",
];

/// Canned response returned when crisis language is detected.
pub const CRISIS_RESPONSE: &str = "I'm really concerned about what you're sharing. \
Your safety is the most important thing. Please reach out to a mental health \
professional or crisis helpline immediately:\n\n\
India: AASRA - 9820466726 (24/7) | iCall - 9152987821\n\
International: findahelpline.com\n\n\
You don't have to face this alone. Please talk to someone who can help right away.";

/// True if the message contains crisis language.
///
/// The message is lowercased and stripped of punctuation first, so
/// "KILL myself!!!" still matches.
pub fn detect_crisis(message: &str) -> bool {
    let normalized: String = message
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    CRISIS_KEYWORDS
        .iter()
        .any(|keyword| normalized.contains(keyword))
}
