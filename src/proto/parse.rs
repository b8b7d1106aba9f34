use super::message::Message;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("missing command after source")]
    MissingCommand,
}

/// Parse one line per §4.A's grammar:
///
/// ```text
/// [':' source SPACE] command [SPACE param]* [SPACE ':' trailing]
/// ```
///
/// `command` is matched case-insensitively and stored uppercased. A
/// parameter beginning with `:` consumes the remainder of the line verbatim
/// (spaces included) as the final parameter.
pub fn parse_line(line: &str) -> Result<Message, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    let line = truncate_to_max_len(line);

    let mut rest = line;
    let mut source = None;
    if let Some(stripped) = rest.strip_prefix(':') {
        let (head, tail) = split_once_space(stripped);
        source = Some(head.to_string());
        rest = tail;
    }

    rest = rest.trim_start_matches(' ');
    if rest.is_empty() {
        return Err(ParseError::MissingCommand);
    }

    let (command, mut rest) = split_once_space(rest);
    let command = command.to_ascii_uppercase();

    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing.to_string());
            break;
        }
        let (param, next) = split_once_space(rest);
        params.push(param.to_string());
        rest = next;
    }

    Ok(Message {
        source,
        command,
        params,
        force_trailing: false,
    })
}

/// Oversized lines are truncated rather than rejected (§4.A): a sender that
/// exceeds [`super::MAX_LINE_LEN`] (minus the CRLF terminator) gets its tail
/// cut off, the same tolerance RFC 2812 expects of a compliant server.
fn truncate_to_max_len(line: &str) -> &str {
    let limit = super::MAX_LINE_LEN - 2;
    if line.len() <= limit {
        return line;
    }
    let mut end = limit;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// Split `s` at the first space, returning `(before, after)` with `after`
/// stripped of exactly one leading separator space (if any were consumed).
fn split_once_space(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_is_error() {
        assert_eq!(parse_line(""), Err(ParseError::Empty));
        assert_eq!(parse_line("\r\n"), Err(ParseError::Empty));
    }

    #[test]
    fn command_only() {
        let m = parse_line("PING").unwrap();
        assert_eq!(m.command, "PING");
        assert!(m.params.is_empty());
        assert!(m.source.is_none());
    }

    #[test]
    fn lowercase_command_is_uppercased() {
        let m = parse_line("nick alice").unwrap();
        assert_eq!(m.command, "NICK");
    }

    #[test]
    fn trailing_param_keeps_spaces() {
        let m = parse_line("PRIVMSG #room :hello   world").unwrap();
        assert_eq!(m.params, vec!["#room", "hello   world"]);
    }

    #[test]
    fn source_without_params() {
        let m = parse_line(":irc.example.com PING").unwrap();
        assert_eq!(m.source.as_deref(), Some("irc.example.com"));
        assert_eq!(m.command, "PING");
    }

    #[test]
    fn trailing_can_be_empty() {
        let m = parse_line("TOPIC #room :").unwrap();
        assert_eq!(m.params, vec!["#room", ""]);
    }

    #[test]
    fn missing_command_after_source_is_error() {
        assert_eq!(parse_line(":onlysource"), Err(ParseError::MissingCommand));
    }

    #[test]
    fn oversized_line_is_truncated_not_rejected() {
        let text = "a".repeat(600);
        let line = format!("PRIVMSG #room :{text}");
        let m = parse_line(&line).unwrap();
        assert_eq!(m.command, "PRIVMSG");
        assert!(m.params[1].len() < text.len());
    }
}
