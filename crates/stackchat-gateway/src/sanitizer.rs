use stackchat_core::Message;

/// Header values are cut to this many characters before they reach a log line.
const LOGGED_HEADER_CHARS: usize = 200;

/// Cleans inbound chat messages before they reach a provider.
///
/// Control characters other than newlines, carriage returns and tabs are
/// dropped. Content longer than the configured byte limit rejects the whole
/// request.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    max_message_length: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_message_length: 100_000,
        }
    }
}

impl Sanitizer {
    /// A sanitizer with the given per-message byte limit.
    pub fn new(max_message_length: usize) -> Self {
        Self { max_message_length }
    }

    /// Per-message byte limit.
    pub fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    /// Cleans one message body, or explains why it cannot be sent.
    pub fn clean_content(&self, content: &str) -> Result<String, String> {
        if content.len() > self.max_message_length {
            return Err(format!(
                "exceeds maximum length of {} bytes",
                self.max_message_length
            ));
        }
        let cleaned: String = content.chars().filter(|c| is_kept(*c)).collect();
        if cleaned.is_empty() && !content.is_empty() {
            return Err("contains only control characters".to_string());
        }
        Ok(cleaned)
    }

    /// Cleans every message body. The error names the first offending message
    /// by its 1-based position.
    pub fn sanitize_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>, String> {
        messages
            .into_iter()
            .enumerate()
            .map(|(idx, mut message)| {
                if let Some(content) = message.content.take() {
                    let cleaned = self
                        .clean_content(&content)
                        .map_err(|reason| format!("Message {} {reason}", idx + 1))?;
                    message.content = Some(cleaned);
                }
                Ok(message)
            })
            .collect()
    }
}

fn is_kept(c: char) -> bool {
    !c.is_control() || matches!(c, '\n' | '\r' | '\t')
}

/// Printable, length-capped rendering of a client header for log lines.
pub(crate) fn loggable_header(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(LOGGED_HEADER_CHARS)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_content_keeps_text_and_newlines() {
        let s = Sanitizer::default();
        assert_eq!(
            s.clean_content("Tours in Goa under ₹50,000?\r\n\tThanks").unwrap(),
            "Tours in Goa under ₹50,000?\r\n\tThanks"
        );
    }

    #[test]
    fn test_control_chars_stripped() {
        assert_eq!(Sanitizer::default().clean_content("hi\u{0}\u{7}there").unwrap(), "hithere");
    }

    #[test]
    fn test_limit_is_in_bytes() {
        let s = Sanitizer::new(10);
        assert!(s.clean_content("0123456789").is_ok());
        assert!(s.clean_content("01234567890").is_err());
        // Four rupee signs are 12 bytes.
        assert!(s.clean_content(&"₹".repeat(4)).is_err());
    }

    #[test]
    fn test_only_control_chars_rejected() {
        let err = Sanitizer::default().clean_content("\u{1}\u{2}").unwrap_err();
        assert!(err.contains("control characters"));
        assert_eq!(Sanitizer::default().clean_content("").unwrap(), "");
    }

    #[test]
    fn test_sanitize_messages_names_offending_message() {
        let s = Sanitizer::new(20);
        let out = s
            .sanitize_messages(vec![Message::user("a\u{0}b"), Message::assistant_tool_calls(vec![])])
            .unwrap();
        assert_eq!(out[0].text(), "ab");
        assert!(out[1].content.is_none());

        let err = s
            .sanitize_messages(vec![Message::user("ok"), Message::user("x".repeat(21))])
            .unwrap_err();
        assert_eq!(err, "Message 2 exceeds maximum length of 20 bytes");
    }

    #[test]
    fn test_loggable_header() {
        assert_eq!(loggable_header("abc\r\ndef"), "abcdef");
        assert_eq!(loggable_header(&"a".repeat(500)).len(), LOGGED_HEADER_CHARS);
    }
}
