//! Entity Decoding and Escaping
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! and the reverse escaping used by serializers. Both use Cow for zero-copy
//! when nothing needs to change.

use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text(input: &str) -> Cow<'_, str> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

/// Decode all entity references in the input
fn decode_entities(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(amp_offset) = memchr(b'&', &bytes[pos..]) else {
            result.push_str(&input[pos..]);
            break;
        };
        result.push_str(&input[pos..pos + amp_offset]);
        pos += amp_offset;

        match memchr(b';', &bytes[pos..]) {
            Some(semi_offset) => {
                let entity = &input[pos + 1..pos + semi_offset];
                if let Some(decoded) = decode_entity(entity) {
                    result.push(decoded);
                    pos += semi_offset + 1;
                } else {
                    // Unknown entity, keep as-is
                    result.push('&');
                    pos += 1;
                }
            }
            None => {
                result.push('&');
                pos += 1;
            }
        }
    }

    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let code = match numeric.strip_prefix('x').or_else(|| numeric.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Escape character data for element content
#[inline]
pub fn escape_text(input: &str) -> Cow<'_, str> {
    if memchr3(b'&', b'<', b'>', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(escape_with(input, false))
}

/// Escape an attribute value for double-quoted output
#[inline]
pub fn escape_attribute(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    if memchr3(b'&', b'<', b'"', bytes).is_none() && memchr(b'>', bytes).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(escape_with(input, true))
}

fn escape_with(input: &str, quote: bool) -> String {
    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' if quote => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entities_borrows() {
        let decoded = decode_text("plain text");
        assert!(matches!(decoded, Cow::Borrowed(_)));
    }

    #[test]
    fn test_builtin_and_numeric() {
        assert_eq!(decode_text("a &lt; b &amp;&amp; c"), "a < b && c");
        assert_eq!(decode_text("&#65;&#x42;"), "AB");
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(decode_text("&nbsp; &"), "&nbsp; &");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_text("a<b & c>"), "a&lt;b &amp; c&gt;");
        assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
        assert!(matches!(escape_text("safe"), Cow::Borrowed(_)));
    }
}
