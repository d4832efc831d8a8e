/// A serialised MIME message, as carried by tag 36.
///
/// Only the RFC 822-style header/body split the codec itself needs to
/// round-trip the wire text is modelled here; structural validation of
/// headers or multipart bodies is out of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeMessage {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MimeMessage {
    pub fn new(headers: Vec<(String, String)>, body: impl Into<String>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Render as the RFC 822 text tag 36 wraps: `Key: value` lines, a blank
    /// line, then the body verbatim.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.headers {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
        out
    }

    /// Parse the inverse of [`to_text`](Self::to_text): headers up to the
    /// first blank line, body after it. Lines without a `:` terminate header
    /// parsing early and become part of the body, matching a lenient reader.
    pub fn from_text(text: &str) -> Self {
        let mut headers = Vec::new();
        let mut rest = text;
        loop {
            let line_end = rest.find("\r\n").unwrap_or(rest.len());
            let line = &rest[..line_end];
            if line.is_empty() {
                rest = &rest[line_end.saturating_add(2).min(rest.len())..];
                break;
            }
            match line.split_once(':') {
                Some((k, v)) => headers.push((k.trim().to_string(), v.trim().to_string())),
                None => break,
            }
            if line_end >= rest.len() {
                rest = "";
                break;
            }
            rest = &rest[line_end + 2..];
        }
        MimeMessage::new(headers, rest)
    }
}
