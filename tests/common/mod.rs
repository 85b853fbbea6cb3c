#![allow(dead_code)]

use rpi_sim7000::{
    classifier::NetworkTime,
    pdu::{DeliveredSms, Multipart},
    transport::{Clock, Transport},
    DecodeError, EncodeError, LinkSettings, Modem, Pdu, PduCodec, ResolverReturn,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

pub const SCA_REPLY: &str = "\r\n+CSCA: \"+33609001390\",145\r\n\r\nOK\r\n";
/// "hellohello" from +33607612640.
pub const DELIVER_PDU: &str =
    "07913396050066F0040B913306672146F00000328041102270800AE8329BFD4697D9EC37";

#[derive(Default)]
pub struct ModemState {
    pub input: VecDeque<u8>,
    pub written: Vec<u8>,
    /// Every CR-terminated command, plus `<EOF>` for each Ctrl-Z.
    pub commands: Vec<String>,
    /// Hex bodies written before each Ctrl-Z.
    pub bodies: Vec<String>,
    pub opened: Vec<u32>,
    pub auto_reply: bool,
    line: Vec<u8>,
}

impl ModemState {
    fn reply(&mut self, command: &str) {
        let answer: &str = match command {
            "AT+CSCA?" => SCA_REPLY,
            "AT+CREG?" => "\r\n+CREG: 2,1\r\n\r\nOK\r\n",
            _ if command.starts_with("AT+CMGS=") => "\r\n> ",
            _ => "\r\nOK\r\n",
        };
        self.input.extend(answer.bytes());
    }
}

/// In-memory SIM7000: records what the engine writes, feeds back what the test pushes and, when
/// `auto_reply` is set, answers every command like a healthy modem.
#[derive(Clone, Default)]
pub struct FakeModem(pub Arc<Mutex<ModemState>>);

impl FakeModem {
    pub fn scripted() -> Self {
        FakeModem::default()
    }

    pub fn responsive() -> Self {
        let modem = FakeModem::default();
        modem.state().auto_reply = true;
        modem
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, ModemState> {
        self.0.lock().unwrap()
    }

    pub fn push(&self, text: &str) {
        self.state().input.extend(text.bytes());
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state().input.extend(bytes.iter().copied());
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.state().commands.iter().filter(|c| *c == command).count()
    }

    pub fn last_command(&self) -> Option<String> {
        self.state().commands.last().cloned()
    }
}

impl Transport for FakeModem {
    fn open(&mut self, baud_rate: u32) -> ResolverReturn<()> {
        let mut state = self.state();
        state.opened.push(baud_rate);
        state.input.clear();
        Ok(())
    }

    fn bytes_available(&mut self) -> ResolverReturn<usize> {
        Ok(self.state().input.len())
    }

    fn read_byte(&mut self) -> ResolverReturn<Option<u8>> {
        Ok(self.state().input.pop_front())
    }

    fn write(&mut self, bytes: &[u8]) -> ResolverReturn<()> {
        let mut state = self.state();
        for byte in bytes {
            state.written.push(*byte);
            match byte {
                b'\r' => {
                    let command: String = String::from_utf8_lossy(&state.line).into_owned();
                    state.line.clear();
                    state.commands.push(command.clone());
                    if state.auto_reply {
                        state.reply(&command);
                    }
                }
                0x1a => {
                    let body: String = String::from_utf8_lossy(&state.line).into_owned();
                    state.line.clear();
                    state.bodies.push(body);
                    state.commands.push("<EOF>".to_string());
                    if state.auto_reply {
                        state.input.extend(b"\r\n+CMGS: 7\r\n\r\nOK\r\n".iter().copied());
                    }
                }
                _ => state.line.push(*byte),
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct ManualClock {
    pub now: Arc<AtomicU64>,
    /// Last network time handed to the clock.
    pub wall: Arc<Mutex<Option<NetworkTime>>>,
}

impl ManualClock {
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn set_wall_clock(&mut self, time: &NetworkTime) {
        *self.wall.lock().unwrap() = Some(time.clone());
    }
}

/// Follows tokio's clock, so paused test time drives the engine deadlines.
#[derive(Clone)]
pub struct TokioClock(pub tokio::time::Instant);

impl Clock for TokioClock {
    fn millis(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

/// Built-in codec that refuses its `refuse_at`-th encode (1-based) as too long.
#[derive(Debug, Clone)]
pub struct RefusingCodec {
    pub inner: Pdu,
    pub refuse_at: usize,
    pub encodes: usize,
}

impl RefusingCodec {
    pub fn new(refuse_at: usize) -> Self {
        RefusingCodec {
            inner: Pdu::default(),
            refuse_at,
            encodes: 0,
        }
    }
}

impl PduCodec for RefusingCodec {
    fn set_service_center(&mut self, number: &str) {
        self.inner.set_service_center(number);
    }

    fn service_center(&self) -> &str {
        self.inner.service_center()
    }

    fn encode(
        &mut self,
        number: &str,
        text: &str,
        multipart: Option<Multipart>,
    ) -> Result<usize, EncodeError> {
        self.encodes += 1;
        if self.encodes == self.refuse_at {
            return Err(EncodeError::SixteenBitTooLong);
        }
        self.inner.encode(number, text, multipart)
    }

    fn payload(&self) -> &str {
        self.inner.payload()
    }

    fn decode(&mut self, line: &str) -> Result<DeliveredSms, DecodeError> {
        self.inner.decode(line)
    }
}

pub type TestModem = Modem<FakeModem, Pdu, ManualClock>;

pub struct Bench {
    pub modem: TestModem,
    pub link: FakeModem,
    pub clock: ManualClock,
}

impl Bench {
    pub fn new(link: FakeModem) -> Self {
        let clock = ManualClock::default();
        let modem: TestModem = Modem::new(link.clone(), Pdu::default(), clock.clone());
        Bench { modem, link, clock }
    }

    /// Advances the clock and polls once.
    pub fn tick(&mut self, millis: u64) {
        self.clock.advance(millis);
        self.modem.poll().unwrap();
    }

    /// Polls in 10 ms steps until `done` holds; panics after `max_ticks`.
    pub fn run_until<F: Fn(&TestModem) -> bool>(&mut self, max_ticks: usize, done: F) {
        for _ in 0..max_ticks {
            if done(&self.modem) {
                return;
            }
            self.tick(10);
        }
        assert!(done(&self.modem), "condition not reached: {:?}", self.modem.stats());
    }

    /// Initialises against a healthy modem and waits for the idle state.
    pub fn started() -> Self {
        let mut bench = Bench::new(FakeModem::responsive());
        bench.modem.initialize(LinkSettings::default()).unwrap();
        bench.run_until(100, |modem| modem.is_idle());
        bench
    }
}

pub type Records = Arc<Mutex<Vec<(String, String, String)>>>;

/// Callback storing every (number, date, text) it is called with.
pub fn recorder() -> (Records, impl FnMut(&str, &str, &str) + Send + 'static) {
    let records: Records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    (records, move |number: &str, date: &str, text: &str| {
        sink.lock()
            .unwrap()
            .push((number.to_string(), date.to_string(), text.to_string()))
    })
}
