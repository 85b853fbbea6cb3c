//! Modem configuration sequence.

use crate::{error::Error, sequencer::CMD_TIMEOUT, ResolverReturn, CSCA_REGEX};

/// Routines run in place of a plain command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    /// Parse the service center number out of the `+CSCA:` reply and hand it to the codec.
    StoreServiceCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Command {
        text: &'static str,
        /// Empty means the generic `OK`.
        expect: &'static str,
        timeout: u64,
        retries: u8,
    },
    Custom(Routine),
}

const fn command(text: &'static str, expect: &'static str, timeout: u64, retries: u8) -> InitStep {
    InitStep::Command {
        text,
        expect,
        timeout,
        retries,
    }
}

pub const INIT_STEPS: [InitStep; 14] = [
    // up to 10 attempts, one second apart, while the modem boots
    command("AT", "", 1000, 9),
    command("AT+IPR=115200", "", CMD_TIMEOUT, 0),
    // echo off
    command("ATE0", "", CMD_TIMEOUT, 0),
    // verbose errors
    command("AT+CMEE=2", "", CMD_TIMEOUT, 0),
    // PDU mode
    command("AT+CMGF=0", "", CMD_TIMEOUT, 0),
    command("AT+CNMP=51", "", CMD_TIMEOUT, 0),
    // unsolicited registration with location
    command("AT+CREG=2", "", CMD_TIMEOUT, 0),
    command("AT+CSDH=1", "", CMD_TIMEOUT, 0),
    // drop whatever is still stored
    command("AT+CMGD=1,4", "", 10000, 0),
    // route new messages straight to the link
    command("AT+CNMI=2,2,0,2,0", "", CMD_TIMEOUT, 0),
    command("AT+CREG?", "", CMD_TIMEOUT, 0),
    // network time broadcasts
    command("AT+CLTS=1", "", CMD_TIMEOUT, 0),
    command("AT+CSCA?", crate::CSCA_INDICATOR, 10000, 0),
    InitStep::Custom(Routine::StoreServiceCenter),
];

/// Extracts the service center number from a `+CSCA: "<number>",<type>` reply.
///
/// Only an optional leading `+` followed by digits is accepted.
pub fn parse_service_center(answer: &str) -> ResolverReturn<String> {
    let Some(captured) = CSCA_REGEX.captures(answer) else {
        log::error!("Can't find {} in {answer}", crate::CSCA_INDICATOR);
        return Err(Error::InvalidServiceCenter(answer.to_string()));
    };
    let number: &str = &captured["number"];
    let digits: &str = number.strip_prefix('+').unwrap_or(number);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        log::error!("Bad SCA number {number}");
        return Err(Error::InvalidServiceCenter(answer.to_string()));
    }
    Ok(number.to_string())
}
