use super::parse::{self, ParseError};

/// A parsed IRC line: `[:source] COMMAND param0 param1 :trailing`.
///
/// `command` is always stored uppercased so handler dispatch can match on it
/// case-insensitively without re-normalizing at every call site. `params`
/// holds every parameter in order, including the trailing one (if present)
/// with its leading `:` already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    /// Forces the last parameter to render as a `:`-prefixed trailing param
    /// even when it doesn't need one by the default rule (§6.2 numerics:
    /// the final human-readable argument always carries a `:`, single token
    /// or not). Not part of the parsed wire grammar — only set by builders.
    pub(crate) force_trailing: bool,
}

impl Message {
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            source: None,
            command: command.into().to_ascii_uppercase(),
            params,
            force_trailing: false,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Marks the last parameter as an explicit trailing param regardless of
    /// its content. Used by [`super::response::numeric`] so a numeric's
    /// final argument always carries a `:` on the wire.
    pub fn with_forced_trailing(mut self) -> Self {
        self.force_trailing = true;
        self
    }

    /// Parse one textual line, already stripped of `\r`/`\n`.
    ///
    /// Empty input produces a [`ParseError::Empty`]; callers on the client
    /// side are expected to turn that into a dispatcher-level "invalid
    /// command" numeric rather than tearing down the connection, while the
    /// federation side treats it as fatal (see `sync::proto`).
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        parse::parse_line(line)
    }

    /// Render this message back to a wire line, without the trailing CRLF.
    ///
    /// A parameter is sent as the trailing (`:`-prefixed) parameter if it is
    /// the last parameter and either contains a space, starts with `:`, or
    /// is empty — the same rule `parse` uses to recognize one.
    pub fn to_line(&self) -> String {
        let mut out = String::new();
        if let Some(source) = &self.source {
            out.push(':');
            out.push_str(source);
            out.push(' ');
        }
        out.push_str(&self.command);

        let last_index = self.params.len().checked_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            out.push(' ');
            let needs_trailing = Some(i) == last_index
                && (self.force_trailing || param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_trailing {
                out.push(':');
            }
            out.push_str(param);
        }
        out
    }

    /// The first parameter, if any.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_simple() {
        let line = "NICK alice";
        let m = Message::parse(line).unwrap();
        assert_eq!(Message::parse(&m.to_line()).unwrap(), m);
    }

    #[test]
    fn round_trip_with_source_and_trailing() {
        let line = ":alice!a@b PRIVMSG #room :hello there world";
        let m = Message::parse(line).unwrap();
        assert_eq!(m.source.as_deref(), Some("alice!a@b"));
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.params, vec!["#room", "hello there world"]);
        assert_eq!(Message::parse(&m.to_line()).unwrap(), m);
    }

    #[test]
    fn build_prefixes_space_containing_last_param() {
        let m = Message::new("PRIVMSG", vec!["#room".into(), "hi there".into()]);
        assert_eq!(m.to_line(), "PRIVMSG #room :hi there");
    }

    #[test]
    fn build_does_not_prefix_non_trailing_params() {
        let m = Message::new("MODE", vec!["#room".into(), "+o".into(), "bob".into()]);
        assert_eq!(m.to_line(), "MODE #room +o bob");
    }

    #[test]
    fn forced_trailing_colons_a_single_token_last_param() {
        let m = Message::new("353", vec!["alice".into(), "=".into(), "#room".into(), "@alice".into()])
            .with_forced_trailing();
        assert_eq!(m.to_line(), "353 alice = #room :@alice");
    }
}
