//! Wire protocol helpers shared by the server and the terminal client.
//!
//! The protocol is plain UTF-8 text: every message in either direction is
//! terminated by `\n`. A server reply may span several lines but is always
//! written as one unit.

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6000;

/// Longest input line the server acts on; anything beyond is cut off.
pub const MAX_LINE_LEN: usize = 512;

/// Returns `host:port` for the default listen/connect address.
pub fn default_addr() -> String {
    format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT)
}

/// Makes sure a message ends with exactly one trailing newline.
pub fn frame(message: &str) -> String {
    let mut framed = message.trim_end_matches(&['\r', '\n'][..]).to_string();
    framed.push('\n');
    framed
}

/// Cleans up a raw input line before it is parsed.
///
/// Strips the line terminator, drops control characters (telnet clients like
/// to send them) and caps the length at [`MAX_LINE_LEN`] characters.
pub fn sanitize(line: &str) -> String {
    line.trim_end_matches(&['\r', '\n'][..])
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .take(MAX_LINE_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_adds_newline() {
        assert_eq!(frame("hello"), "hello\n");
    }

    #[test]
    fn test_frame_collapses_trailing_newlines() {
        assert_eq!(frame("hello\n\n"), "hello\n");
        assert_eq!(frame("hello\r\n"), "hello\n");
    }

    #[test]
    fn test_frame_keeps_inner_newlines() {
        assert_eq!(frame("a\nb"), "a\nb\n");
    }

    #[test]
    fn test_sanitize_strips_terminators_and_control_chars() {
        assert_eq!(sanitize("say hi\r\n"), "say hi");
        assert_eq!(sanitize("lo\u{7}ok"), "look");
        assert_eq!(sanitize("say\ta"), "say\ta");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(MAX_LINE_LEN * 2);
        assert_eq!(sanitize(&long).len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_default_addr() {
        assert_eq!(default_addr(), "127.0.0.1:6000");
    }
}
