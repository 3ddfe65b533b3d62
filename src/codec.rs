//! ASCII wire format of the controller.
//!
//! Commands go out as `<MNEMONIC>[=<ARG>]\r`. The controller echoes the
//! command line, then answers with one or more `\n`-terminated lines (a
//! `\r` before the `\n` is trimmed).

use crate::error::{CoolerError, Result};
use std::fmt;

/// Appended to every outgoing command
pub const COMMAND_TERMINATOR: &[u8] = b"\r";

/// Ends every reply line
pub const REPLY_TERMINATOR: &[u8] = b"\n";

/// Decimal places used when rendering numeric arguments
pub const DECIMAL_PRECISION: usize = 2;

/// Fixed replies the controller uses to reject a command. They decode to
/// "no value", never to a reading.
pub const ERROR_TOKENS: &[&str] = &[
    "ERROR",
    "ERR",
    "INVALID",
    "INVALID COMMAND",
    "UNKNOWN COMMAND",
    "?",
    "NO REPLY",
];

const MAX_UNIT_SUFFIX_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Decimal { value: f64, precision: usize },
    Keyword(&'static str),
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Decimal { value, precision } => write!(f, "{:.*}", *precision, value),
            Argument::Keyword(keyword) => f.write_str(keyword),
        }
    }
}

/// A single request: mnemonic plus optional argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    mnemonic: &'static str,
    argument: Option<Argument>,
}

impl Command {
    pub const fn query(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            argument: None,
        }
    }

    pub fn with_decimal(mnemonic: &'static str, value: f64) -> Self {
        Self {
            mnemonic,
            argument: Some(Argument::Decimal {
                value,
                precision: DECIMAL_PRECISION,
            }),
        }
    }

    pub const fn with_keyword(mnemonic: &'static str, keyword: &'static str) -> Self {
        Self {
            mnemonic,
            argument: Some(Argument::Keyword(keyword)),
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn argument(&self) -> Option<&Argument> {
        self.argument.as_ref()
    }

    /// Command text without the terminator; also what the controller echoes.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(argument) => write!(f, "{}={}", self.mnemonic, argument),
            None => f.write_str(self.mnemonic),
        }
    }
}

/// Render `command` into the exact bytes written to the transport.
pub fn encode(command: &Command) -> Vec<u8> {
    let mut bytes = command.render().into_bytes();
    bytes.extend_from_slice(COMMAND_TERMINATOR);
    bytes
}

/// Single value carried by a reply line.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Booleans, or the numbers 0 and 1.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            Scalar::Number(n) if *n == 0.0 => Some(false),
            Scalar::Number(n) if *n == 1.0 => Some(true),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Bool(true) => f.write_str("ON"),
            Scalar::Bool(false) => f.write_str("OFF"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

pub fn is_error_token(payload: &str) -> bool {
    ERROR_TOKENS
        .iter()
        .any(|token| token.eq_ignore_ascii_case(payload))
}

/// Whether `line` is the controller echoing `command` back.
pub fn is_echo(line: &str, command: &Command) -> bool {
    line.trim().eq_ignore_ascii_case(&command.render())
}

fn payload(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw)
        .map(str::trim)
        .map_err(|e| CoolerError::Decode(format!("reply is not valid ASCII: {e}")))
}

/// Decode one reply line as text, without trying numeric or boolean forms.
///
/// Returns `Ok(None)` for an empty payload or a device error token.
pub fn decode_text(raw: &[u8]) -> Result<Option<String>> {
    let text = payload(raw)?;
    if text.is_empty() || is_error_token(text) {
        return Ok(None);
    }
    Ok(Some(text.to_string()))
}

/// Decode one reply line: number first, then on/off keywords, then text.
///
/// Returns `Ok(None)` for an empty payload or a device error token.
pub fn decode_scalar(raw: &[u8]) -> Result<Option<Scalar>> {
    let Some(text) = decode_text(raw)? else {
        return Ok(None);
    };
    if let Some(number) = parse_number(&text) {
        return Ok(Some(Scalar::Number(number)));
    }
    if let Some(flag) = parse_bool(&text) {
        return Ok(Some(Scalar::Bool(flag)));
    }
    Ok(Some(Scalar::Text(text)))
}

/// Split a multi-line reply into trimmed lines, dropping trailing blanks.
pub fn decode_lines(raw: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| CoolerError::Decode(format!("reply is not valid ASCII: {e}")))?;
    let mut lines: Vec<String> = text.split('\n').map(|l| l.trim().to_string()).collect();
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    Ok(lines)
}

fn parse_number(text: &str) -> Option<f64> {
    if let Ok(value) = text.parse::<f64>() {
        return value.is_finite().then_some(value);
    }

    // Trailing unit, e.g. "77.00 K" or "23.5W"
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    if !is_unit_suffix(unit.trim()) {
        return None;
    }
    number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn is_unit_suffix(unit: &str) -> bool {
    !unit.is_empty()
        && unit.chars().count() <= MAX_UNIT_SUFFIX_CHARS
        && unit
            .chars()
            .all(|c| c.is_alphabetic() || c == '%' || c == '°')
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}
