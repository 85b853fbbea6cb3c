//! Hardware seams: serial link, power-key GPIO and clocks.
//!
//! The engine only talks to these traits; [`UartTransport`], [`RppalPower`] and [`SystemClock`]
//! are the Raspberry Pi implementations.

use crate::{classifier::NetworkTime, error::Error, ResolverReturn};
use chrono::{DateTime, Local, TimeZone, Utc};
use rppal::{
    gpio::{Gpio, IoPin, Mode},
    uart::{Parity, Queue, Uart},
};
use std::{collections::HashMap, io, time::Duration, time::Instant};

/// Byte-oriented, non-blocking duplex link to the modem.
pub trait Transport {
    /// Opens (or reopens) the link at the given speed, discarding pending input.
    fn open(&mut self, baud_rate: u32) -> ResolverReturn<()>;
    fn bytes_available(&mut self) -> ResolverReturn<usize>;
    fn read_byte(&mut self) -> ResolverReturn<Option<u8>>;
    fn write(&mut self, bytes: &[u8]) -> ResolverReturn<()>;
}

/// Logical level of the power-key pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PinLevel {
    Active,
    Inactive,
}

/// Two-level output driving the modem power key.
pub trait PowerControl {
    fn configure(&mut self, pin: u8) -> ResolverReturn<()>;
    fn set_level(&mut self, pin: u8, level: PinLevel) -> ResolverReturn<()>;
    /// Stops driving the pin.
    fn release(&mut self, pin: u8) -> ResolverReturn<()>;
}

/// Monotonic milliseconds plus an optional wall clock.
pub trait Clock {
    fn millis(&self) -> u64;

    fn local_time(&self) -> DateTime<Local> {
        Local::now()
    }

    /// Called when the network broadcasts its time.
    fn set_wall_clock(&mut self, _time: &NetworkTime) {}
}

pub struct UartTransport {
    path: String,
    uart: Option<Uart>,
}

impl UartTransport {
    pub fn new(path: &str) -> Self {
        UartTransport {
            path: path.to_string(),
            uart: None,
        }
    }

    fn uart(&mut self) -> ResolverReturn<&mut Uart> {
        self.uart.as_mut().ok_or(Error::NotConnected)
    }
}

impl Transport for UartTransport {
    fn open(&mut self, baud_rate: u32) -> ResolverReturn<()> {
        log::debug!("Opening {} at {baud_rate} bds", self.path);
        let mut uart: Uart = Uart::with_path(&self.path, baud_rate, Parity::None, 8, 1)?;
        uart.set_read_mode(0, Duration::ZERO)?;
        // writes block until the driver took every byte
        uart.set_write_mode(true)?;
        uart.flush(Queue::Input)?;
        self.uart = Some(uart);
        Ok(())
    }

    fn bytes_available(&mut self) -> ResolverReturn<usize> {
        Ok(self.uart()?.input_len()?)
    }

    fn read_byte(&mut self) -> ResolverReturn<Option<u8>> {
        let mut read_buffer: [u8; 1] = [0];
        match self.uart()?.read(&mut read_buffer)? {
            0 => Ok(None),
            _ => Ok(Some(read_buffer[0])),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> ResolverReturn<()> {
        let uart: &mut Uart = self.uart()?;
        write_fully(bytes, |rest| Ok(uart.write(rest)?))
    }
}

/// Repeats `write` until every byte is out; a write accepting nothing is an error.
fn write_fully<F>(bytes: &[u8], mut write: F) -> ResolverReturn<()>
where
    F: FnMut(&[u8]) -> ResolverReturn<usize>,
{
    let mut written: usize = 0;
    while written < bytes.len() {
        match write(&bytes[written..])? {
            0 => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("serial link took {written} of {} bytes", bytes.len()),
                )))
            }
            count => written += count,
        }
    }
    Ok(())
}

pub struct RppalPower {
    gpio: Gpio,
    active_high: bool,
    pins: HashMap<u8, IoPin>,
}

impl RppalPower {
    pub fn new(active_high: bool) -> ResolverReturn<Self> {
        Ok(RppalPower {
            gpio: Gpio::new()?,
            active_high,
            pins: HashMap::new(),
        })
    }

    fn pin(&mut self, pin: u8) -> ResolverReturn<&mut IoPin> {
        if !self.pins.contains_key(&pin) {
            self.configure(pin)?;
        }
        self.pins.get_mut(&pin).ok_or(Error::NotConnected)
    }
}

impl PowerControl for RppalPower {
    fn configure(&mut self, pin: u8) -> ResolverReturn<()> {
        let io_pin: IoPin = self.gpio.get(pin)?.into_io(Mode::Output);
        self.pins.insert(pin, io_pin);
        Ok(())
    }

    fn set_level(&mut self, pin: u8, level: PinLevel) -> ResolverReturn<()> {
        let high: bool = (level == PinLevel::Active) == self.active_high;
        let io_pin: &mut IoPin = self.pin(pin)?;
        io_pin.set_mode(Mode::Output);
        if high {
            io_pin.set_high();
        } else {
            io_pin.set_low();
        }
        Ok(())
    }

    fn release(&mut self, pin: u8) -> ResolverReturn<()> {
        self.pin(pin)?.set_mode(Mode::Input);
        Ok(())
    }
}

/// [`Instant`] based clock whose wall time follows network broadcasts.
pub struct SystemClock {
    start: Instant,
    offset: chrono::Duration,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
            offset: chrono::Duration::zero(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn local_time(&self) -> DateTime<Local> {
        Local::now() + self.offset
    }

    fn set_wall_clock(&mut self, time: &NetworkTime) {
        let network: DateTime<Utc> = Utc.from_utc_datetime(&time.datetime);
        let before: DateTime<Local> = self.local_time();
        self.offset = network.signed_duration_since(Utc::now());
        log::debug!(
            "Date changed from {} to {}",
            before.format("%Y/%m/%d %H:%M:%S"),
            self.local_time().format("%Y/%m/%d %H:%M:%S")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.millis();
        let second = clock.millis();
        assert!(second >= first);
    }

    #[test]
    fn network_time_moves_wall_clock() {
        let mut clock = SystemClock::new();
        let time = NetworkTime {
            datetime: chrono::NaiveDate::from_ymd_opt(2001, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            quarters_to_utc: 0,
            dst: false,
        };
        clock.set_wall_clock(&time);
        assert_eq!(clock.local_time().with_timezone(&Utc).format("%Y").to_string(), "2001");
    }

    #[test]
    fn partial_writes_are_resumed() {
        let mut sent: Vec<u8> = Vec::new();
        write_fully(b"AT+CMGF=0\r", |rest| {
            let count: usize = rest.len().min(3);
            sent.extend_from_slice(&rest[..count]);
            Ok(count)
        })
        .unwrap();
        assert_eq!(sent, b"AT+CMGF=0\r");
    }

    #[test]
    fn stalled_write_is_an_error() {
        let mut calls: usize = 0;
        let result = write_fully(b"AT\r", |rest| {
            calls += 1;
            Ok(if calls == 1 { rest.len() - 1 } else { 0 })
        });
        match result {
            Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::WriteZero),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls, 2);
    }

    #[test]
    fn closed_uart_is_not_connected() {
        let mut transport = UartTransport::new("/dev/null-modem");
        assert!(matches!(transport.bytes_available(), Err(Error::NotConnected)));
        assert!(matches!(transport.write(b"AT"), Err(Error::NotConnected)));
    }
}
