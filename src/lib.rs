//! # RPi SIM7000
//!
//! RPi SIM7000 is a Rust crate that drives a SIM7000 cellular modem over a serial link to send and
//! receive SMS in PDU mode, without ever blocking the caller's loop.
//!
//! The core is [`Modem`], a cooperative protocol engine: every call to [`Modem::poll`] checks the
//! armed deadlines, frames the received bytes into lines, classifies them and moves the current
//! flow (power bootstrap, modem initialisation, message transmission or reception) one step
//! further. Only one command is ever outstanding on the link.
//!
//! The engine never restarts itself. When something goes wrong it latches a [`RestartReason`] that
//! the driver observes with [`Modem::needs_restart`]. [`gateway::Gateway`] is such a driver, built
//! on the [`tokio`] runtime with a priority queue of pending requests.
//!
//! ## Example usage
//! ```no_run
//! use rpi_sim7000::{gateway::Gateway, ModemConfig, TaskJoinHandle};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: ModemConfig = ModemConfig::from_file("modem.json")?;
//!     rpi_sim7000::init_logger(config.log_level);
//!
//!     let (mut gateway, handle) = Gateway::from_config(&config)?;
//!     gateway.modem_mut().on_received(|number, date, text| {
//!         println!("{number} wrote at {date}: {text}");
//!     });
//!     // the engine is polled in the background, requests wait until it is idle
//!     tokio::spawn(gateway.run());
//!
//!     let send_sms: TaskJoinHandle<()> = handle.send_sms("+4799999999", "Hello!");
//!
//!     // the .await? returns the task Result or errors with tokio::task::JoinError
//!     match send_sms.await? {
//!         Ok(_) => println!("the SMS has been sent."),
//!         Err(e) => println!("Problem with sending the SMS: {e}"),
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/rpi_sim7000/0.1.0")]

pub mod classifier;
pub mod config;
pub mod framer;
pub mod gateway;
pub mod init;
pub mod modem;
pub mod pdu;
pub mod power;
pub mod sequencer;
pub mod transmit;
pub mod transport;

mod error;

pub use config::{init_logger, ModemConfig};
pub use error::{DecodeError, EncodeError, Error, ErrorKind, RestartReason};
pub use log::LevelFilter as LogLevelFilter;
pub use modem::{LinkSettings, MessageRecord, Mode, Modem, SessionStats};
pub use pdu::{Pdu, PduCodec};

use lazy_static::lazy_static;
use regex::Regex;
use tokio::task::JoinHandle;

/// Every [`gateway::GatewayHandle`] request returns a `TaskJoinHandle<T>`.
pub type TaskJoinHandle<T> = JoinHandle<Result<T, error::Error>>;

const REGEX_COMP_ERROR: &str = "Critical error: Regex compilation has failed.";

/// Generic command acknowledgement.
pub const DEFAULT_ANSWER: &str = "OK";
/// Registration status prefix, solicited or not.
pub const CREG_MSG: &str = "+CREG: ";
/// Registration status query; its reply carries an extra `<n>,` field.
pub const CREG_QUERY: &str = "+CREG?";
/// Unsolicited SMS receive indicator, followed by the PDU line.
pub const SMS_INDICATOR: &str = "+CMT: ";
/// Service center reply prefix.
pub const CSCA_INDICATOR: &str = "+CSCA:";
/// Network time broadcast prefix.
#[cfg(feature = "network-time")]
pub const GSM_TIME: &str = "*PSUTTZ: ";

lazy_static! {
    static ref DEVICE_ERROR_REGEX: Regex =
        Regex::new(r"\+CM[ES] ERROR").expect(REGEX_COMP_ERROR);
    static ref CSCA_REGEX: Regex =
        Regex::new(r#"\+CSCA: ?"(?<number>[^"]*)""#).expect(REGEX_COMP_ERROR);
}

/// Result of every engine operation.
pub type ResolverReturn<T> = Result<T, error::Error>;
