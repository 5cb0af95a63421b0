/// Decode `\uXXXX` and `\UXXXXXXXX` escapes into literal characters.
///
/// UTF-16 surrogate pairs written as two `\u` escapes are combined. Returns
/// `None` when the text has no escapes or any escape is malformed.
pub fn unescape_code_points(text: &str) -> Option<String> {
    if !text.contains("\\u") && !text.contains("\\U") {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let (code, consumed) = match tail.as_bytes().get(1) {
            Some(b'u') => (parse_hex(tail.get(2..6)?)?, 6),
            Some(b'U') => (parse_hex(tail.get(2..10)?)?, 10),
            _ => {
                out.push('\\');
                rest = &tail[1..];
                continue;
            }
        };
        rest = &tail[consumed..];

        if (0xD800..0xDC00).contains(&code) {
            let low = rest.strip_prefix("\\u").and_then(|low| parse_hex(low.get(..4)?))?;
            if !(0xDC00..0xE000).contains(&low) {
                return None;
            }
            rest = &rest[6..];
            out.push(char::from_u32(0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00))?);
        } else {
            out.push(char::from_u32(code)?);
        }
    }
    out.push_str(rest);
    Some(out)
}

fn parse_hex(digits: &str) -> Option<u32> {
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_basic_escapes() {
        assert_eq!(unescape_code_points("caf\\u00E9").as_deref(), Some("café"));
        assert_eq!(unescape_code_points("\\U0001F600!").as_deref(), Some("😀!"));
    }

    #[test]
    fn combines_surrogate_pairs() {
        assert_eq!(unescape_code_points("\\uD83D\\uDE00").as_deref(), Some("😀"));
    }

    #[test]
    fn keeps_other_backslashes() {
        assert_eq!(unescape_code_points("a\\n\\u0041").as_deref(), Some("a\\nA"));
    }

    #[test]
    fn malformed_escapes_yield_none() {
        assert_eq!(unescape_code_points("plain"), None);
        assert_eq!(unescape_code_points("\\u12"), None);
        assert_eq!(unescape_code_points("\\u00G1"), None);
        assert_eq!(unescape_code_points("\\uD83Dx"), None);
        assert_eq!(unescape_code_points("\\uDE00"), None);
    }
}
