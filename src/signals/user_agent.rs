//! User-Agent automation heuristic.
//!
//! The weakest signal: a case-insensitive match of the User-Agent against
//! substrings used by crawlers, command-line tools and scripted HTTP clients.

use regex::Regex;
use std::sync::LazyLock;

/// Substrings identifying automation tools.
static AUTOMATION_KEYWORDS: &[&str] = &[
    // Generic crawler vocabulary
    "bot",
    "crawler",
    "spider",
    "scraper",
    // Command-line tools
    "curl",
    "wget",
    "httpie",
    // Scripted HTTP clients
    "python-requests",
    "python-urllib",
    "go-http-client",
    "java/",
    "node-fetch",
    "axios",
    "okhttp",
    "libwww-perl",
];

static AUTOMATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = AUTOMATION_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternation}")).unwrap()
});

/// Returns true if the User-Agent names a known automation tool.
pub fn is_automation_agent(user_agent: &str) -> bool {
    AUTOMATION_PATTERN.is_match(user_agent)
}

/// The first automation keyword found, as it appears in the User-Agent.
pub fn matched_keyword(user_agent: &str) -> Option<&str> {
    AUTOMATION_PATTERN.find(user_agent).map(|m| m.as_str())
}
