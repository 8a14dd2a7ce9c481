#![forbid(unsafe_code)]

//! Character escaping for canonical output.
//!
//! - Text: `&`, `<`, `>` and `\r`
//! - Attribute values: `&`, `<`, `"`, `\t`, `\n`, `\r`
//! - PI data: `\r`

fn write_escaped(out: &mut Vec<u8>, s: &str, table: fn(char) -> Option<&'static str>) {
    let mut buf = [0u8; 4];
    for ch in s.chars() {
        match table(ch) {
            Some(entity) => out.extend_from_slice(entity.as_bytes()),
            None => out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes()),
        }
    }
}

fn text_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '\r' => Some("&#xD;"),
        _ => None,
    }
}

fn attr_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '"' => Some("&quot;"),
        '\t' => Some("&#x9;"),
        '\n' => Some("&#xA;"),
        '\r' => Some("&#xD;"),
        _ => None,
    }
}

fn pi_entity(ch: char) -> Option<&'static str> {
    (ch == '\r').then_some("&#xD;")
}

/// Append text node content.
pub fn write_text(out: &mut Vec<u8>, s: &str) {
    write_escaped(out, s, text_entity);
}

/// Append an attribute value.
pub fn write_attr(out: &mut Vec<u8>, s: &str) {
    write_escaped(out, s, attr_entity);
}

/// Append processing instruction data.
pub fn write_pi(out: &mut Vec<u8>, s: &str) {
    write_escaped(out, s, pi_entity);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(f: fn(&mut Vec<u8>, &str), s: &str) -> String {
        let mut out = Vec::new();
        f(&mut out, s);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text() {
        assert_eq!(run(write_text, "plain"), "plain");
        assert_eq!(run(write_text, "a&b<c>d\"e"), "a&amp;b&lt;c&gt;d\"e");
        assert_eq!(run(write_text, "x\ry"), "x&#xD;y");
    }

    #[test]
    fn test_attr() {
        assert_eq!(run(write_attr, "a>b"), "a>b");
        assert_eq!(run(write_attr, "q\"\t\n\r"), "q&quot;&#x9;&#xA;&#xD;");
    }

    #[test]
    fn test_pi_and_multibyte() {
        assert_eq!(run(write_pi, "v\r<"), "v&#xD;<");
        assert_eq!(run(write_text, "Åström"), "Åström");
    }
}
