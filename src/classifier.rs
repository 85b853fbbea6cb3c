//! Decides what a completed modem line means.
//!
//! Rules are evaluated in a fixed priority order, see [`classify`].

use crate::{CREG_MSG, CREG_QUERY, DEFAULT_ANSWER, DEVICE_ERROR_REGEX, SMS_INDICATOR};
#[cfg(feature = "network-time")]
use crate::GSM_TIME;
use chrono::NaiveDateTime;

/// Network time as broadcast by the modem (`*PSUTTZ`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTime {
    /// Broadcast date and time, as UTC.
    pub datetime: NaiveDateTime,
    /// Offset to UTC, in quarters of an hour.
    pub quarters_to_utc: i32,
    pub dst: bool,
}

/// Engine state the classifier needs to see.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineContext<'a> {
    /// Text of the last command written to the modem.
    pub last_command: &'a str,
    /// Reply pattern of the outstanding command, if a command is outstanding.
    pub expected: Option<&'a str>,
    pub ignore_errors: bool,
    /// An inbound notice was seen and its payload line is awaited.
    pub awaiting_payload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Registration status line; `status` is the extracted digit, if present.
    Registration { status: Option<char>, ready: bool },
    /// Network time broadcast; `None` when the payload could not be parsed.
    NetworkTime(Option<NetworkTime>),
    /// Matches the outstanding command's expected reply.
    Expected,
    /// Explicit `+CME ERROR` / `+CMS ERROR` reply to the outstanding command.
    DeviceError,
    /// Payload line following an inbound notice.
    InboundPayload,
    /// Unsolicited receive indicator.
    InboundNotice,
    Unclassified,
    /// Empty line with nothing waiting for it.
    Empty,
}

/// Classifies one completed line.
pub fn classify(line: &str, ctx: &LineContext<'_>) -> Classified {
    if let Some(status) = registration_status(line, ctx.last_command) {
        let ready: bool = matches!(status, Some('1') | Some('5'));
        return Classified::Registration { status, ready };
    }

    #[cfg(feature = "network-time")]
    if let Some(position) = line.find(GSM_TIME) {
        return Classified::NetworkTime(parse_network_time(&line[position + GSM_TIME.len()..]));
    }

    if let Some(expected) = ctx.expected {
        if reply_matches(line, expected) {
            return Classified::Expected;
        }
        if !ctx.ignore_errors && DEVICE_ERROR_REGEX.is_match(line) {
            return Classified::DeviceError;
        }
    }

    if line.is_empty() {
        return Classified::Empty;
    }

    if ctx.awaiting_payload {
        return Classified::InboundPayload;
    }

    if line.contains(SMS_INDICATOR) {
        return Classified::InboundNotice;
    }

    Classified::Unclassified
}

/// The generic `OK` must match the whole line; any other pattern may appear anywhere in it.
pub fn reply_matches(line: &str, expected: &str) -> bool {
    if expected == DEFAULT_ANSWER {
        line == expected
    } else {
        line.contains(expected)
    }
}

/// Extracts the status digit of a `+CREG:` line.
///
/// The solicited reply to `AT+CREG?` carries the `<n>,` field before the status, the unsolicited
/// push does not, so the digit sits two bytes further in the former.
fn registration_status(line: &str, last_command: &str) -> Option<Option<char>> {
    let position: usize = line.find(CREG_MSG)?;
    let mut offset: usize = position + CREG_MSG.len();
    if last_command.contains(CREG_QUERY) {
        offset += 2;
    }
    Some(line.as_bytes().get(offset).map(|b| *b as char))
}

const MAX_TIME_FIELD: usize = 35;
const TIME_TOKENS: usize = 8;

/// Tolerant parse of `year,month,day,hour,min,sec,"tz",dst`.
///
/// `/` and `:` count as separators, quotes are dropped, anything else that is not a digit or a sign
/// makes the whole broadcast unusable.
#[cfg(feature = "network-time")]
pub fn parse_network_time(payload: &str) -> Option<NetworkTime> {
    let mut normalized: String = String::with_capacity(MAX_TIME_FIELD);
    for c in payload.chars() {
        match c {
            '/' | ':' => normalized.push(','),
            '0'..='9' | '+' | '-' | ',' => normalized.push(c),
            '"' => (),
            _ => {
                log::debug!("Illegal character {c:?} in network time {payload}");
                return None;
            }
        }
        if normalized.len() >= MAX_TIME_FIELD {
            log::debug!("Network time {payload} is too long");
            return None;
        }
    }

    let values: Vec<i32> = normalized
        .split(',')
        .filter(|token| !token.is_empty())
        .take(TIME_TOKENS)
        .map(|token| token.parse::<i32>())
        .collect::<Result<Vec<i32>, _>>()
        .ok()?;
    if values.len() < TIME_TOKENS {
        log::debug!("Network time {payload} has only {} fields", values.len());
        return None;
    }

    let year: i32 = if values[0] < 100 { values[0] + 2000 } else { values[0] };
    let datetime: NaiveDateTime = chrono::NaiveDate::from_ymd_opt(
        year,
        u32::try_from(values[1]).ok()?,
        u32::try_from(values[2]).ok()?,
    )?
    .and_hms_opt(
        u32::try_from(values[3]).ok()?,
        u32::try_from(values[4]).ok()?,
        u32::try_from(values[5]).ok()?,
    )?;

    Some(NetworkTime {
        datetime,
        quarters_to_utc: values[6],
        dst: values[7] != 0,
    })
}
