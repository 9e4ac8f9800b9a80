//! MIME part walking and body text extraction.
//!
//! The provider returns each message as a tree of MIME parts with bodies
//! encoded in URL-safe base64. The first non-empty `text/plain` leaf found
//! depth-first wins; everything else (HTML alternatives, attachments) is
//! ignored.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Marker appended when cleaned body text is cut at the length bound.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// One node of the provider's MIME part tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MimePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl MimePart {
    /// Value of the first header literally named `name`, or empty.
    pub fn header(&self, name: &str) -> String {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }
}

/// Extract plain-text body from a MIME part tree, depth-first.
///
/// A `text/plain` part with a non-empty encoded body is decoded, cleaned,
/// and returned. Otherwise children are visited in order and the first
/// non-empty result wins. No plain-text leaf yields an empty string.
pub fn extract_plain_text(part: &MimePart, max_chars: usize) -> String {
    if part.mime_type == "text/plain" {
        if let Some(data) = part.body.data.as_deref() {
            if !data.is_empty() {
                return clean_text(&decode_body(data), max_chars);
            }
        }
    }

    for child in &part.parts {
        let text = extract_plain_text(child, max_chars);
        if !text.is_empty() {
            return text;
        }
    }

    String::new()
}

/// Decode a URL-safe base64 body. The provider pads inconsistently, so
/// trailing `=` is stripped before decoding. Undecodable data becomes empty.
fn decode_body(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    match URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Collapse runs of whitespace to single spaces, trim, and truncate to
/// `max_chars` with a marker. The stable output doubles as cache-key input.
pub fn clean_text(input: &str, max_chars: usize) -> String {
    let cleaned = input.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&cleaned, max_chars, TRUNCATION_MARKER)
}

/// Truncate `s` to at most `max_chars` characters, appending `marker` when
/// anything was cut. Always splits on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize, marker: &str) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &s[..byte_idx], marker),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_part(text: &str) -> MimePart {
        MimePart {
            mime_type: "text/plain".into(),
            body: PartBody {
                data: Some(URL_SAFE_NO_PAD.encode(text)),
            },
            ..Default::default()
        }
    }

    fn container(mime_type: &str, parts: Vec<MimePart>) -> MimePart {
        MimePart {
            mime_type: mime_type.into(),
            parts,
            ..Default::default()
        }
    }

    // ── extract_plain_text ──────────────────────────────────────────

    #[test]
    fn top_level_plain_part() {
        let part = plain_part("Hello  world");
        assert_eq!(extract_plain_text(&part, 2000), "Hello world");
    }

    #[test]
    fn nested_plain_leaf_two_levels_deep_wins() {
        // Non-plain leaves precede the target leaf; walk is depth-first.
        let html = MimePart {
            mime_type: "text/html".into(),
            body: PartBody {
                data: Some(URL_SAFE_NO_PAD.encode("<p>ignored</p>")),
            },
            ..Default::default()
        };
        let image = MimePart {
            mime_type: "image/png".into(),
            body: PartBody {
                data: Some(URL_SAFE_NO_PAD.encode("binaryish")),
            },
            ..Default::default()
        };
        let tree = container(
            "multipart/mixed",
            vec![
                image,
                container(
                    "multipart/alternative",
                    vec![html, plain_part("Deadline is  Friday.")],
                ),
            ],
        );
        assert_eq!(extract_plain_text(&tree, 2000), "Deadline is Friday.");
    }

    #[test]
    fn first_nonempty_plain_leaf_wins_in_order() {
        let tree = container(
            "multipart/mixed",
            vec![plain_part("first"), plain_part("second")],
        );
        assert_eq!(extract_plain_text(&tree, 2000), "first");
    }

    #[test]
    fn no_plain_leaf_returns_empty() {
        let html = MimePart {
            mime_type: "text/html".into(),
            body: PartBody {
                data: Some(URL_SAFE_NO_PAD.encode("<p>hi</p>")),
            },
            ..Default::default()
        };
        let tree = container("multipart/alternative", vec![html]);
        assert_eq!(extract_plain_text(&tree, 2000), "");
    }

    #[test]
    fn plain_part_with_empty_data_is_skipped() {
        let empty = MimePart {
            mime_type: "text/plain".into(),
            body: PartBody {
                data: Some(String::new()),
            },
            ..Default::default()
        };
        let tree = container("multipart/mixed", vec![empty, plain_part("fallback")]);
        assert_eq!(extract_plain_text(&tree, 2000), "fallback");
    }

    #[test]
    fn padded_base64_decodes() {
        let mut part = plain_part("");
        // "padded" encodes to cGFkZGVk with standard padding variants
        part.body.data = Some("cGFkZGVk==".into());
        assert_eq!(extract_plain_text(&part, 2000), "padded");
    }

    // ── clean_text ──────────────────────────────────────────────────

    #[test]
    fn clean_collapses_and_trims_whitespace() {
        assert_eq!(clean_text("  a\t b\n\nc  ", 2000), "a b c");
    }

    #[test]
    fn clean_truncates_with_marker() {
        let long = "x".repeat(3000);
        let cleaned = clean_text(&long, 2000);
        assert_eq!(cleaned.len(), 2000 + TRUNCATION_MARKER.len());
        assert!(cleaned.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn clean_short_input_untouched() {
        assert_eq!(clean_text("short", 2000), "short");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let out = truncate_chars(s, 4, "...");
        assert_eq!(out, "héll...");
    }

    // ── headers ─────────────────────────────────────────────────────

    #[test]
    fn header_first_match_wins_exact_name() {
        let part = MimePart {
            headers: vec![
                Header {
                    name: "subject".into(), // wrong case, must not match
                    value: "lower".into(),
                },
                Header {
                    name: "Subject".into(),
                    value: "Placement drive".into(),
                },
                Header {
                    name: "Subject".into(),
                    value: "second".into(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(part.header("Subject"), "Placement drive");
    }

    #[test]
    fn missing_header_is_empty() {
        let part = MimePart::default();
        assert_eq!(part.header("Subject"), "");
    }
}
