//! Recognition of single trace log lines
//!
//! Three dialects of PGRAPH method line are understood:
//!
//! ```text
//! nv2a_pgraph_method 0: 0x97 -> 0x1800 0x11000F
//! nv2a_pgraph_method 0: 0x97 -> 0x1788 NV097_SET_VERTEX_DATA_ARRAY_FORMAT[40] 0x1402
//! nv2a_pgraph_method 1: 0x39 -> 0x0 (0x14cf0)
//!
//! nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_TRANSFORM_CONSTANT[1]<0xB84> (0x00000000 => 0.000000)
//! nv2a_pgraph_method 0: NV20_KELVIN_PRIMITIVE<0x97> -> NV097_SET_BEGIN_END<0x17fc> (NV097_SET_BEGIN_END_OP_END<0x0>)
//!
//! nv2a_pgraph_method_unhandled 0: 0x97 -> 0x03b8 0x0
//! ```
//!
//! Any other line is not a method and is skipped.

use crate::command::MethodCall;
use crate::utils::{parse_decimal, parse_hex, split_bracketed_hex, split_hex_prefix};
use thiserror::Error;

const METHOD_PREFIX: &str = "nv2a_pgraph_method ";
const UNHANDLED_METHOD_PREFIX: &str = "nv2a_pgraph_method_unhandled";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("failed to process annotated argument '{argument}'")]
    UnrecognisedArgument { argument: String },
}

/// The known shapes of method line, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDialect {
    /// Numeric class and method, optional symbol, raw parameter
    Raw,
    /// Symbolic class and method with a decoded parameter in brackets
    Annotated,
    /// Methods the capturing emulator did not handle
    Unhandled,
}

impl LogDialect {
    pub const PRIORITY: [LogDialect; 3] =
        [LogDialect::Raw, LogDialect::Annotated, LogDialect::Unhandled];

    /// Try to read line as this dialect. Ok(None) means the line does
    /// not have this shape; an error means it does, but the argument
    /// could not be understood.
    pub fn parse(self, line: &str) -> Result<Option<MethodCall>, ParseError> {
        match self {
            LogDialect::Raw => Ok(parse_raw(line)),
            LogDialect::Annotated => parse_annotated(line),
            LogDialect::Unhandled => Ok(parse_unhandled(line)),
        }
    }
}

/// Parse a line with the first dialect that recognises it
pub fn parse_line(line: &str) -> Result<Option<(LogDialect, MethodCall)>, ParseError> {
    for dialect in LogDialect::PRIORITY {
        if let Some(call) = dialect.parse(line)? {
            return Ok(Some((dialect, call)));
        }
    }
    Ok(None)
}

/// Split off the next whitespace-delimited token. The remainder is
/// either empty or starts with whitespace.
fn next_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    Some((&text[..end], &text[end..]))
}

/// Channels are written as a decimal number followed by a colon
fn parse_channel(token: &str) -> Option<u32> {
    parse_decimal(token.strip_suffix(':')?)
}

/// A raw parameter, which may be wrapped in brackets
fn parse_raw_value(token: &str) -> Option<u32> {
    let token = token.strip_prefix('(').unwrap_or(token);
    let token = token.strip_suffix(')').unwrap_or(token);
    parse_hex(token)
}

fn parse_raw(line: &str) -> Option<MethodCall> {
    let rest = line.strip_prefix(METHOD_PREFIX)?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let [channel, class, "->", operation, tail @ ..] = tokens.as_slice() else {
        return None;
    };

    let mut call = MethodCall::new(
        parse_channel(channel)?,
        parse_hex(class)?,
        parse_hex(operation)?,
        0,
    );

    // A symbol is only present if it is followed by the parameter
    match tail {
        [name, value, ..] if parse_raw_value(value).is_some() => {
            call.operation_name = Some(name.to_string());
            call.raw_value = parse_raw_value(value)?;
        }
        [value, ..] => call.raw_value = parse_raw_value(value)?,
        [] => return None,
    }
    Some(call)
}

/// Class tokens are either bare (0x97) or symbolic
/// (NV20_KELVIN_PRIMITIVE<0x97>)
fn parse_class_token(token: &str) -> Option<u32> {
    let token = match token.rsplit_once('<') {
        Some((_, value)) => value,
        None => token,
    };
    parse_hex(token.strip_suffix('>').unwrap_or(token))
}

/// Method tokens are always symbolic: NAME<0x1234>. The name may
/// itself contain '<'; the value is after the last one.
fn parse_symbol_token(token: &str) -> Option<(&str, u32)> {
    let (name, value) = token.strip_suffix('>')?.rsplit_once('<')?;
    if name.is_empty() {
        return None;
    }
    Some((name, parse_hex(value)?))
}

struct AnnotatedLine<'a> {
    channel: u32,
    device_class: u32,
    operation_name: &'a str,
    operation: u32,
    argument: &'a str,
}

fn split_annotated(line: &str) -> Option<AnnotatedLine<'_>> {
    let rest = line.strip_prefix(METHOD_PREFIX)?;
    let (channel, rest) = next_token(rest)?;
    let (class, rest) = next_token(rest)?;
    let (arrow, rest) = next_token(rest)?;
    if arrow != "->" {
        return None;
    }
    let (operation, rest) = next_token(rest)?;
    let (operation_name, operation) = parse_symbol_token(operation)?;

    // The argument runs to the last closing bracket on the line
    let argument = rest.trim_start().strip_prefix('(')?;
    let argument = &argument[..argument.rfind(')')?];
    if argument.is_empty() {
        return None;
    }

    Some(AnnotatedLine {
        channel: parse_channel(channel)?,
        device_class: parse_class_token(class)?,
        operation_name,
        operation,
        argument,
    })
}

fn parse_annotated(line: &str) -> Result<Option<MethodCall>, ParseError> {
    let Some(fields) = split_annotated(line) else {
        return Ok(None);
    };
    let decoded = decode_argument(fields.argument)?;
    Ok(Some(MethodCall {
        channel: fields.channel,
        device_class: fields.device_class,
        operation: fields.operation,
        operation_name: Some(fields.operation_name.to_string()),
        raw_value: decoded.value,
        float_value: decoded.float_value,
        value_description: decoded.description,
    }))
}

fn parse_unhandled(line: &str) -> Option<MethodCall> {
    let rest = line.strip_prefix(UNHANDLED_METHOD_PREFIX)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let [channel, class, "->", operation, value, ..] = tokens.as_slice() else {
        return None;
    };
    Some(MethodCall::new(
        parse_channel(channel)?,
        parse_hex(class)?,
        parse_hex(operation)?,
        parse_hex(value)?,
    ))
}

/// The parameter of an annotated method, after decoding
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArgument {
    pub value: u32,
    pub float_value: Option<f32>,
    pub description: Option<String>,
}

impl DecodedArgument {
    fn plain(value: u32) -> Self {
        Self {
            value,
            float_value: None,
            description: None,
        }
    }

    fn described(value: u32, description: &str) -> Self {
        Self {
            description: Some(description.to_string()),
            ..Self::plain(value)
        }
    }
}

/// The ways an annotated argument can be written, in the order they
/// are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentForm {
    /// 0x3F800000 => 1.000000
    Float,
    /// {BLUE:00 0.000000, GREEN:00 0.000000} <0x0>
    BitField,
    /// NV097_SET_BEGIN_END_OP_TRIANGLE_FAN<0x7>
    Enumerator,
    /// 0x3f800000
    Hex,
    /// 84416 <0x149c0>
    Decimal,
}

impl ArgumentForm {
    pub const PRIORITY: [ArgumentForm; 5] = [
        ArgumentForm::Float,
        ArgumentForm::BitField,
        ArgumentForm::Enumerator,
        ArgumentForm::Hex,
        ArgumentForm::Decimal,
    ];

    pub fn decode(self, argument: &str) -> Option<DecodedArgument> {
        match self {
            ArgumentForm::Float => decode_float(argument),
            ArgumentForm::BitField => decode_bitfield(argument),
            ArgumentForm::Enumerator => decode_enumerator(argument),
            ArgumentForm::Hex => {
                let (value, _) = split_hex_prefix(argument)?;
                Some(DecodedArgument::plain(value))
            }
            ArgumentForm::Decimal => {
                let (_, rest) = next_token(argument)?;
                let (value, _) = split_bracketed_hex(rest.trim_start())?;
                Some(DecodedArgument::plain(value))
            }
        }
    }
}

/// Decode the bracketed argument of an annotated method line
pub fn decode_argument(argument: &str) -> Result<DecodedArgument, ParseError> {
    ArgumentForm::PRIORITY
        .iter()
        .find_map(|form| form.decode(argument))
        .ok_or_else(|| ParseError::UnrecognisedArgument {
            argument: argument.to_string(),
        })
}

fn is_float_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+' | '.')
}

/// Strip leading whitespace, requiring there to be some
fn skip_required_whitespace(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    (trimmed.len() < text.len()).then_some(trimmed)
}

/// The decoded side of the arrow is only a float if it is written
/// with a decimal point; integer decodes (object handles, counts)
/// are the hex value again, so only the raw value is kept.
fn decode_float(argument: &str) -> Option<DecodedArgument> {
    let (value, rest) = split_hex_prefix(argument)?;
    let rest = skip_required_whitespace(rest)?.strip_prefix("=>")?;
    let rest = skip_required_whitespace(rest)?;
    let end = rest.find(|c: char| !is_float_char(c)).unwrap_or(rest.len());
    let literal = &rest[..end];
    let float: f32 = literal.parse().ok()?;
    Some(DecodedArgument {
        float_value: literal.contains('.').then_some(float),
        ..DecodedArgument::plain(value)
    })
}

fn decode_bitfield(argument: &str) -> Option<DecodedArgument> {
    if !argument.starts_with('{') {
        return None;
    }
    let close = argument.rfind('}')?;
    if close < 2 {
        return None;
    }
    let rest = skip_required_whitespace(&argument[close + 1..])?;
    let (value, _) = split_bracketed_hex(rest)?;
    Some(DecodedArgument::described(value, &argument[..=close]))
}

fn decode_enumerator(argument: &str) -> Option<DecodedArgument> {
    let end = argument
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(argument.len());
    if end == 0 {
        return None;
    }
    let (value, _) = split_bracketed_hex(&argument[end..])?;
    Some(DecodedArgument::described(value, &argument[..end]))
}
