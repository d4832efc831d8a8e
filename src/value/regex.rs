/// A regular expression, as carried by tag 35.
///
/// The wire representation is the pattern text alone (RFC 8949's guidance is
/// PCRE-ish but the codec does not interpret the pattern); `regex::Regex`
/// does not implement `PartialEq`, so equality and cloning are defined over
/// the pattern text and the compiled form is built lazily.
#[derive(Debug, Clone)]
pub struct RegexValue {
    pattern: String,
}

impl RegexValue {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Compile the pattern, surfacing any syntax error the `regex` crate
    /// itself rejects. Not called during decode — tag 35 only needs the
    /// text to round-trip.
    pub fn compile(&self) -> Result<regex::Regex, regex::Error> {
        regex::Regex::new(&self.pattern)
    }
}

impl PartialEq for RegexValue {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for RegexValue {}
