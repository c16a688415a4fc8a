//! SMTP response parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// # Errors
///
/// Returns an error if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };

    let code_str = first
        .get(0..3)
        .ok_or_else(|| Error::Protocol(format!("Reply too short: {first}")))?;
    let code = code_str
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {code_str}")))?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if line.get(0..3) != Some(code_str) {
            return Err(Error::Protocol(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }
        match line.len() {
            3 => message.push(String::new()),
            n if n >= 4 => match line.get(4..) {
                Some(text) => message.push(text.to_string()),
                None => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
            },
            _ => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
        }
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

/// Returns true if the line starts with a three-digit reply code.
#[must_use]
pub fn has_reply_code(line: &str) -> bool {
    line.as_bytes()
        .get(..3)
        .is_some_and(|code| code.iter().all(u8::is_ascii_digit))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Continuation lines use `-` after the code; the last line uses a space or
/// carries no text at all.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    match line.as_bytes().get(3) {
        Some(b' ') => true,
        Some(_) => false,
        None => line.len() == 3,
    }
}
