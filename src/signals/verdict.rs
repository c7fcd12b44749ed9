//! Edge bot-management verdict blob.
//!
//! The blob is a JSON document attached by the edge. Only a handful of fields
//! are meaningful here, all optional:
//!
//! ```json
//! {
//!   "verified_bot": false,
//!   "ja3": { "verified_bot": false, "suspected_bot": true },
//!   "jsDetection": { "passed": true }
//! }
//! ```
//!
//! Parsing is total: any malformed input is reported as
//! [`VerdictParse::Unparseable`] instead of an error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
struct VerdictSchema {
    verified_bot: Option<bool>,
    suspected_bot: Option<bool>,
    ja3: Option<FingerprintSection>,
    #[serde(rename = "jsDetection")]
    js_detection: Option<JsDetectionSection>,
}

#[derive(Debug, Default, Deserialize)]
struct FingerprintSection {
    verified_bot: Option<bool>,
    suspected_bot: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct JsDetectionSection {
    passed: Option<bool>,
    failed: Option<bool>,
}

/// Fields extracted from a well-formed verdict blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerdictBlob {
    pub verified_bot: bool,
    pub suspected_bot: bool,
    /// `Some(true)` passed, `Some(false)` failed, `None` not reported
    pub js_detection: Option<bool>,
}

/// Outcome of parsing a raw verdict header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictParse {
    Parsed(VerdictBlob),
    Unparseable,
}

/// Parse a raw verdict blob. Never fails.
pub fn parse_verdict(raw: &str) -> VerdictParse {
    let schema: VerdictSchema = match serde_json::from_str(raw) {
        Ok(schema) => schema,
        Err(_) => return VerdictParse::Unparseable,
    };

    let ja3 = schema.ja3.unwrap_or_default();
    let js_detection = schema.js_detection.and_then(|js| {
        if js.passed == Some(true) {
            Some(true)
        } else if js.failed == Some(true) {
            Some(false)
        } else {
            None
        }
    });

    VerdictParse::Parsed(VerdictBlob {
        verified_bot: schema.verified_bot.unwrap_or(false) || ja3.verified_bot.unwrap_or(false),
        suspected_bot: schema.suspected_bot.unwrap_or(false)
            || ja3.suspected_bot.unwrap_or(false),
        js_detection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_fields() {
        let parsed = parse_verdict(r#"{"verified_bot": true, "suspected_bot": false}"#);
        assert_eq!(
            parsed,
            VerdictParse::Parsed(VerdictBlob {
                verified_bot: true,
                suspected_bot: false,
                js_detection: None,
            })
        );
    }

    #[test]
    fn test_flags_from_either_section() {
        let parsed = parse_verdict(r#"{"verified_bot": false, "ja3": {"verified_bot": true}}"#);
        assert_eq!(
            parsed,
            VerdictParse::Parsed(VerdictBlob {
                verified_bot: true,
                suspected_bot: false,
                js_detection: None,
            })
        );

        let parsed = parse_verdict(r#"{"suspected_bot": true, "ja3": {"suspected_bot": false}}"#);
        assert!(matches!(parsed, VerdictParse::Parsed(blob) if blob.suspected_bot));
    }

    #[test]
    fn test_fingerprint_section_and_js_detection() {
        let parsed = parse_verdict(
            r#"{"ja3": {"suspected_bot": true}, "jsDetection": {"failed": true}, "score": 12}"#,
        );
        assert_eq!(
            parsed,
            VerdictParse::Parsed(VerdictBlob {
                verified_bot: false,
                suspected_bot: true,
                js_detection: Some(false),
            })
        );
    }

    #[test]
    fn test_passed_wins_over_failed() {
        let parsed = parse_verdict(r#"{"jsDetection": {"passed": true, "failed": true}}"#);
        match parsed {
            VerdictParse::Parsed(blob) => assert_eq!(blob.js_detection, Some(true)),
            VerdictParse::Unparseable => panic!("expected parsed verdict"),
        }
    }

    #[test]
    fn test_empty_js_detection_is_unreported() {
        let parsed = parse_verdict(r#"{"jsDetection": {}}"#);
        match parsed {
            VerdictParse::Parsed(blob) => assert_eq!(blob.js_detection, None),
            VerdictParse::Unparseable => panic!("expected parsed verdict"),
        }
    }

    #[test]
    fn test_malformed_inputs() {
        assert_eq!(parse_verdict("{not json"), VerdictParse::Unparseable);
        assert_eq!(parse_verdict(""), VerdictParse::Unparseable);
        assert_eq!(parse_verdict("42"), VerdictParse::Unparseable);
        assert_eq!(parse_verdict("null"), VerdictParse::Unparseable);
        assert_eq!(
            parse_verdict(r#"{"verified_bot": "yes"}"#),
            VerdictParse::Unparseable
        );
    }
}
