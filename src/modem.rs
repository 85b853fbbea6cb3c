//! Protocol engine
//!
//! See [`Modem`] to discover available methods.

use crate::{
    classifier::{classify, Classified, LineContext},
    error::{EncodeError, Error, RestartReason},
    framer::{Framed, LineFramer},
    init::{parse_service_center, InitStep, Routine, INIT_STEPS},
    pdu::PduCodec,
    power::{PowerBootstrap, PowerTick},
    sequencer::{CommandSequencer, Continuation, Expiry, Payload, CMD_TIMEOUT},
    transmit::{ChunkPlan, OutboundMessage},
    transport::{Clock, PowerControl, Transport},
    ResolverReturn,
};
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Time allowed between a receive indicator and its PDU line (ms).
pub const RECEIVE_TIMEOUT: u64 = 2000;
/// Wait for the `>` prompt after `AT+CMGS` (ms).
pub const PROMPT_TIMEOUT: u64 = 10000;
/// Wait for the network to accept a chunk (ms).
pub const SEND_TIMEOUT: u64 = 60000;
/// Wait for a storage delete (ms).
pub const DELETE_TIMEOUT: u64 = 20000;

const DEFAULT_BAUD_RATE: u32 = 115200;
const PROMPT: &str = ">";
const SEND_CONFIRMATION: &str = "+CMGS:";
const EOF: u8 = 0x1a;
const MAX_CHUNKS: usize = 255;
const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

type MessageCallback = Box<dyn FnMut(&str, &str, &str) + Send>;
type LineCallback = Box<dyn FnMut(&str) + Send>;

/// Serial link and power key wiring, as given to [`Modem::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub rx_pin: Option<u8>,
    pub tx_pin: Option<u8>,
    /// Power key pin; without it the link is opened right away.
    pub power_pin: Option<u8>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        LinkSettings {
            baud_rate: DEFAULT_BAUD_RATE,
            rx_pin: None,
            tx_pin: None,
            power_pin: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// Power bootstrap or initialisation running.
    Starting,
    Idle,
    Sending,
    Receiving,
    /// [`Modem::initialize`] was never called.
    NotConnected,
}

/// Number, date and text of the last message in one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub number: String,
    pub date: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub commands: u32,
    /// Engine reinitialisations requested by the driver.
    pub resets: u32,
    /// Successful initialisations.
    pub restarts: u32,
    pub sms_read: u32,
    pub sms_forwarded: u32,
    /// Chunks accepted by the network.
    pub sms_sent: u32,
    pub encode_errors: u32,
    pub decode_failures: u32,
}

/// Snapshot returned by [`Modem::stats`] and logged by [`Modem::debug_state`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub mode: Mode,
    pub last_command: String,
    pub expected: Option<String>,
    pub last_answer: String,
    pub registration_ready: bool,
    pub needs_restart: bool,
    pub restart_reason: Option<RestartReason>,
    pub power_step: Option<usize>,
    pub init_step: usize,
    pub first_init_done: bool,
    pub modem_speaking: bool,
    pub ignore_errors: bool,
    pub service_center: String,
    /// Bytes received after the last complete line.
    pub partial_line: String,
    #[serde(flatten)]
    pub counters: Counters,
}

fn debug_log(tag: &str, msg: &str) {
    log::debug!("{} - {msg}", format!("[{tag}]").yellow())
}

/// SIM7000 session: one per serial link.
///
/// Nothing blocks. [`Modem::poll`] must be called from the driver loop; it checks the armed
/// deadlines, consumes every available byte and runs the continuations the replies unlock.
pub struct Modem<T: Transport, C: PduCodec, K: Clock> {
    transport: T,
    codec: C,
    clock: K,
    power: Option<Box<dyn PowerControl + Send>>,
    settings: Option<LinkSettings>,
    mode: Mode,
    framer: LineFramer,
    sequencer: CommandSequencer,
    bootstrap: Option<PowerBootstrap>,
    init_step: usize,
    /// Restart reason of the last command when its failure was ignored.
    ignored_failure: Option<RestartReason>,
    ignore_errors: bool,
    registration_ready: bool,
    restart: Option<RestartReason>,
    /// Arm time of an inbound notice whose PDU line is awaited.
    notice: Option<u64>,
    pending_delete: bool,
    outbound: Option<OutboundMessage>,
    multipart_id: u16,
    encode_error: Option<EncodeError>,
    last_answer: String,
    last_sent: MessageRecord,
    last_received: MessageRecord,
    first_init_done: bool,
    modem_speaking: bool,
    counters: Counters,
    on_received: Option<MessageCallback>,
    on_sent: Option<MessageCallback>,
    on_line: Option<LineCallback>,
}

impl<T: Transport, C: PduCodec, K: Clock> Modem<T, C, K> {
    pub fn new(transport: T, codec: C, clock: K) -> Self {
        Modem {
            transport,
            codec,
            clock,
            power: None,
            settings: None,
            mode: Mode::NotConnected,
            framer: LineFramer::new(),
            sequencer: CommandSequencer::new(),
            bootstrap: None,
            init_step: 0,
            ignored_failure: None,
            ignore_errors: false,
            registration_ready: false,
            restart: None,
            notice: None,
            pending_delete: false,
            outbound: None,
            multipart_id: 0,
            encode_error: None,
            last_answer: String::new(),
            last_sent: MessageRecord::default(),
            last_received: MessageRecord::default(),
            first_init_done: false,
            modem_speaking: false,
            counters: Counters::default(),
            on_received: None,
            on_sent: None,
            on_line: None,
        }
    }

    /// Power key driver used when [`LinkSettings::power_pin`] is set.
    pub fn with_power_control(mut self, power: Box<dyn PowerControl + Send>) -> Self {
        self.power = Some(power);
        self
    }

    /// Called with sender, network timestamp and text of every decoded message.
    pub fn on_received<F: FnMut(&str, &str, &str) + Send + 'static>(&mut self, callback: F) {
        self.on_received = Some(Box::new(callback));
    }

    /// Called with recipient, local send date and text once every chunk is confirmed.
    pub fn on_sent<F: FnMut(&str, &str, &str) + Send + 'static>(&mut self, callback: F) {
        self.on_sent = Some(Box::new(callback));
    }

    /// Called with every line nothing else claimed.
    pub fn on_line<F: FnMut(&str) + Send + 'static>(&mut self, callback: F) {
        self.on_line = Some(Box::new(callback));
    }

    /// Starts (or restarts) the session: power bootstrap if a power pin is given, then the link
    /// is opened and the initialisation sequence runs on the following polls.
    pub fn initialize(&mut self, settings: LinkSettings) -> ResolverReturn<()> {
        log::debug!(
            "Sim7000 begin at {} bds, rx pin {:?}, tx pin {:?}, power pin {:?}",
            settings.baud_rate,
            settings.rx_pin,
            settings.tx_pin,
            settings.power_pin
        );
        self.settings = Some(settings);
        self.restart = None;
        self.ignored_failure = None;
        self.notice = None;
        self.pending_delete = false;
        self.outbound = None;
        self.encode_error = None;
        self.bootstrap = None;
        self.framer.clear();
        self.sequencer.reset();
        self.mode = Mode::Starting;

        let skip_reset: bool = self.first_init_done && !self.modem_speaking;
        self.first_init_done = true;
        self.modem_speaking = false;

        let Some(pin) = settings.power_pin else {
            return self.open();
        };
        if self.power.is_none() {
            log::warn!("No power control for pin {pin}, opening the link directly");
            return self.open();
        }
        if skip_reset {
            log::warn!("Modem stayed silent last session, assuming it is powered off");
        }
        let now: u64 = self.clock.millis();
        if let Some(power) = self.power.as_mut() {
            self.bootstrap = Some(PowerBootstrap::start(power.as_mut(), pin, skip_reset, now)?);
        }
        Ok(())
    }

    /// Runs one engine tick. Only transport and GPIO failures are returned; protocol failures
    /// latch a restart reason instead.
    pub fn poll(&mut self) -> ResolverReturn<()> {
        let now: u64 = self.clock.millis();
        if self.bootstrap.is_some() {
            return self.poll_power(now);
        }
        if self.mode == Mode::NotConnected {
            return Ok(());
        }

        self.check_deadlines(now)?;
        while self.transport.bytes_available()? > 0 {
            let Some(byte) = self.transport.read_byte()? else {
                break;
            };
            self.process_byte(byte)?;
        }

        if self.pending_delete && !self.sequencer.is_pending() {
            self.delete_received()?;
        }
        Ok(())
    }

    /// Queues nothing: returns [`Error::Busy`] unless the engine is idle.
    pub fn send_text(&mut self, number: &str, text: &str) -> ResolverReturn<()> {
        self.ensure_ready()?;
        self.encode_error = None;
        let plan: ChunkPlan = ChunkPlan::new(text);
        log::info!(
            "Sending {:?} message of {} units in {} chunk(s) to {number}",
            plan.encoding,
            plan.length,
            plan.count.max(1)
        );
        if plan.count > MAX_CHUNKS {
            log::error!("Message to {number} needs {} chunks", plan.count);
            self.counters.encode_errors += 1;
            return Err(Error::Encode(EncodeError::MultipartNumbering));
        }
        if plan.is_multipart() {
            self.multipart_id = self.multipart_id.wrapping_add(1);
        }

        self.last_sent = MessageRecord {
            number: number.to_string(),
            date: self.clock.local_time().format(DATE_FORMAT).to_string(),
            text: text.to_string(),
        };
        self.outbound = Some(OutboundMessage::new(number, text, plan, self.multipart_id));
        let sent: ResolverReturn<()> = self.send_next_chunk();
        if sent.is_err() {
            // already reported to the caller
            self.encode_error = None;
        }
        sent
    }

    /// Deletes stored messages (`AT+CMGD=<index>,<flag>`).
    pub fn delete_stored(&mut self, index: u8, flag: u8) -> ResolverReturn<()> {
        self.ensure_ready()?;
        self.issue(
            Payload::Text(format!("AT+CMGD={index},{flag}")),
            Continuation::Idle,
            "",
            DELETE_TIMEOUT,
            0,
        )
    }

    /// Writes an out-of-band command; its reply is not tracked.
    pub fn send_raw(&mut self, command: &str) -> ResolverReturn<()> {
        self.send_untracked(Payload::Text(command.to_string()))
    }

    /// Writes a lone Ctrl-Z, e.g. to leave a stuck message prompt.
    pub fn send_eof(&mut self) -> ResolverReturn<()> {
        self.send_untracked(Payload::Byte(EOF))
    }

    /// Timeouts then advance as if answered, and device errors are no longer matched.
    pub fn set_ignore_errors(&mut self, ignore_errors: bool) {
        self.ignore_errors = ignore_errors;
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle && !self.sequencer.is_pending() && !self.pending_delete
    }

    pub fn is_sending(&self) -> bool {
        self.mode == Mode::Sending
    }

    pub fn is_receiving(&self) -> bool {
        self.mode == Mode::Receiving
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn needs_restart(&self) -> bool {
        self.restart.is_some()
    }

    pub fn restart_reason(&self) -> Option<RestartReason> {
        self.restart
    }

    pub fn acknowledge_restart(&mut self) {
        if let Some(reason) = self.restart.take() {
            log::debug!("Restart for {reason} acknowledged");
        }
    }

    /// Counts a driver-side reinitialisation.
    pub fn mark_reset(&mut self) {
        self.counters.resets += 1;
    }

    pub fn registration_ready(&self) -> bool {
        self.registration_ready
    }

    pub fn last_sent(&self) -> &MessageRecord {
        &self.last_sent
    }

    pub fn last_received(&self) -> &MessageRecord {
        &self.last_received
    }

    /// Encode failure that cut the last message short, cleared by the next send.
    pub fn take_encode_error(&mut self) -> Option<EncodeError> {
        self.encode_error.take()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            mode: self.mode,
            last_command: self.sequencer.last_command().to_string(),
            expected: self.sequencer.pending().map(|pending| pending.expected.clone()),
            last_answer: self.last_answer.clone(),
            registration_ready: self.registration_ready,
            needs_restart: self.needs_restart(),
            restart_reason: self.restart,
            power_step: self.bootstrap.as_ref().map(|bootstrap| bootstrap.step()),
            init_step: self.init_step,
            first_init_done: self.first_init_done,
            modem_speaking: self.modem_speaking,
            ignore_errors: self.ignore_errors,
            service_center: self.codec.service_center().to_string(),
            partial_line: self.framer.partial(),
            counters: Counters {
                commands: self.sequencer.commands_issued(),
                ..self.counters.clone()
            },
        }
    }

    pub fn debug_state(&self) {
        match serde_json::to_string(&self.stats()) {
            Ok(state) => log::info!("{} - {state}", "[sim7000]".yellow()),
            Err(err) => log::error!("Unable to serialize the session state: {err}"),
        }
    }

    fn ensure_ready(&self) -> ResolverReturn<()> {
        if self.mode == Mode::NotConnected {
            return Err(Error::NotConnected);
        }
        if let Some(reason) = self.restart {
            return Err(Error::Restart(reason));
        }
        if !self.is_idle() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn send_untracked(&mut self, payload: Payload) -> ResolverReturn<()> {
        if self.mode == Mode::NotConnected {
            return Err(Error::NotConnected);
        }
        if self.sequencer.is_pending() {
            return Err(Error::Busy);
        }
        self.issue(payload, Continuation::Idle, "", CMD_TIMEOUT, 0)?;
        self.sequencer.release();
        Ok(())
    }

    fn issue(
        &mut self,
        payload: Payload,
        continuation: Continuation,
        expected: &str,
        timeout: u64,
        retries: u8,
    ) -> ResolverReturn<()> {
        let now: u64 = self.clock.millis();
        self.sequencer.send(
            &mut self.transport,
            now,
            payload,
            continuation,
            expected,
            timeout,
            retries,
        )
    }

    fn poll_power(&mut self, now: u64) -> ResolverReturn<()> {
        let done: bool = match (self.bootstrap.as_mut(), self.power.as_mut()) {
            (Some(bootstrap), Some(power)) => bootstrap.tick(power.as_mut(), now)? == PowerTick::Done,
            _ => true,
        };
        if done {
            self.bootstrap = None;
            self.open()?;
        }
        Ok(())
    }

    fn open(&mut self) -> ResolverReturn<()> {
        let baud_rate: u32 = self
            .settings
            .map(|settings| settings.baud_rate)
            .unwrap_or(DEFAULT_BAUD_RATE);
        log::debug!("Opening modem at {baud_rate} bds");
        self.transport.open(baud_rate)?;
        self.framer.clear();
        self.registration_ready = false;
        self.init_step = 0;
        self.advance_init()
    }

    /// Walks [`INIT_STEPS`] from the current index until a command has been issued.
    fn advance_init(&mut self) -> ResolverReturn<()> {
        loop {
            let Some(step) = INIT_STEPS.get(self.init_step) else {
                self.init_complete();
                return Ok(());
            };
            match *step {
                InitStep::Command {
                    text,
                    expect,
                    timeout,
                    retries,
                } => {
                    debug_log(text, &format!("init step {}", self.init_step));
                    return self.issue(
                        Payload::Text(text.to_string()),
                        Continuation::AdvanceInit,
                        expect,
                        timeout,
                        retries,
                    );
                }
                InitStep::Custom(Routine::StoreServiceCenter) => {
                    match parse_service_center(&self.last_answer) {
                        Ok(number) => {
                            log::debug!("Setting SCA to {number}");
                            self.codec.set_service_center(&number);
                            self.last_answer.clear();
                            self.init_step += 1;
                        }
                        Err(_) => {
                            self.latch_restart(RestartReason::BadAnswer);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn init_complete(&mut self) {
        match self.ignored_failure.take() {
            Some(reason) => self.latch_restart(reason),
            None => {
                self.set_idle();
                log::info!(
                    "SMS gateway started, restart count = {}",
                    self.counters.restarts
                );
                self.counters.restarts += 1;
            }
        }
    }

    fn check_deadlines(&mut self, now: u64) -> ResolverReturn<()> {
        if let Some(armed_at) = self.notice {
            if now.saturating_sub(armed_at) >= RECEIVE_TIMEOUT {
                log::error!(
                    "No message {} ms after {}",
                    now.saturating_sub(armed_at),
                    self.sequencer.last_command()
                );
                self.notice = None;
                if self.ignore_errors {
                    self.set_idle();
                } else {
                    self.fail(RestartReason::Timeout);
                }
            }
        }

        match self
            .sequencer
            .check_deadline(&mut self.transport, now, self.ignore_errors)?
        {
            Some(Expiry::Ignored(continuation)) => {
                self.ignored_failure = Some(RestartReason::Timeout);
                self.run_continuation(continuation)
            }
            Some(Expiry::Failed(reason)) => {
                self.fail(reason);
                Ok(())
            }
            Some(Expiry::Retried { .. }) | None => Ok(()),
        }
    }

    fn process_byte(&mut self, byte: u8) -> ResolverReturn<()> {
        self.modem_speaking = true;
        self.sequencer.note_received();
        let prompt: Option<u8> = self.sequencer.pending().and_then(|pending| pending.prompt());
        match self.framer.feed(byte, prompt) {
            Framed::Pending => Ok(()),
            Framed::Line(line) | Framed::Prompt(line) => self.handle_line(line),
            Framed::TooLong(partial) => {
                log::error!("Answer too long: >{partial}<");
                self.sequencer.abort();
                self.notice = None;
                self.fail(RestartReason::TooLong);
                Ok(())
            }
        }
    }

    fn handle_line(&mut self, line: String) -> ResolverReturn<()> {
        let now: u64 = self.clock.millis();
        let ctx = LineContext {
            last_command: self.sequencer.last_command(),
            expected: self
                .sequencer
                .pending()
                .map(|pending| pending.expected.as_str()),
            ignore_errors: self.ignore_errors,
            awaiting_payload: self.notice.is_some(),
        };

        match classify(&line, &ctx) {
            Classified::Registration { status, ready } => {
                log::debug!("Registration status {status:?} in >{line}<");
                self.registration_ready = ready;
            }
            Classified::NetworkTime(Some(time)) => {
                log::debug!("Network time {}", time.datetime);
                self.clock.set_wall_clock(&time);
            }
            Classified::NetworkTime(None) => log::debug!("Ignoring network time >{line}<"),
            Classified::Expected => {
                if let Some(pending) = self.sequencer.pending() {
                    debug_log(
                        &pending.payload.describe(),
                        &format!(
                            "reply in {} ms: >{line}<",
                            now.saturating_sub(pending.started_at)
                        ),
                    );
                }
                self.ignored_failure = None;
                self.last_answer = line;
                if let Some(continuation) = self.sequencer.resolve() {
                    self.run_continuation(continuation)?;
                }
            }
            Classified::DeviceError => {
                log::error!(
                    "Error answer: >{line}<, command was {}",
                    self.sequencer.last_command()
                );
                self.sequencer.abort();
                self.fail(RestartReason::DeviceError);
            }
            Classified::InboundPayload => {
                self.notice = None;
                self.receive(&line)?;
            }
            Classified::InboundNotice => {
                log::debug!("Indicator is >{line}<");
                self.sequencer.set_context(&line);
                self.notice = Some(now);
                self.counters.sms_read += 1;
                if !self.sequencer.is_pending() {
                    self.mode = Mode::Receiving;
                }
            }
            Classified::Unclassified => {
                log::debug!("Ignoring >{line}<");
                if let Some(callback) = self.on_line.as_mut() {
                    callback(&line);
                }
            }
            Classified::Empty => (),
        }
        Ok(())
    }

    fn run_continuation(&mut self, continuation: Continuation) -> ResolverReturn<()> {
        match continuation {
            Continuation::Idle => {
                self.set_idle();
                Ok(())
            }
            Continuation::AdvanceInit => {
                self.init_step += 1;
                self.advance_init()
            }
            Continuation::WriteMessageBody => {
                let payload: String = self.codec.payload().to_string();
                log::debug!("Message: {payload}");
                self.transport.write(payload.as_bytes())?;
                self.issue(
                    Payload::Byte(EOF),
                    Continuation::NextChunk,
                    SEND_CONFIRMATION,
                    SEND_TIMEOUT,
                    0,
                )
            }
            Continuation::NextChunk => {
                self.counters.sms_sent += 1;
                match self.send_next_chunk() {
                    Err(Error::Encode(_)) => Ok(()),
                    other => other,
                }
            }
        }
    }

    fn send_next_chunk(&mut self) -> ResolverReturn<()> {
        let Some(outbound) = self.outbound.as_mut() else {
            self.set_idle();
            return Ok(());
        };
        let Some(chunk) = outbound.next_chunk() else {
            self.outbound = None;
            self.set_idle();
            log::info!("SMS to {} sent", self.last_sent.number);
            if let Some(callback) = self.on_sent.as_mut() {
                callback(&self.last_sent.number, &self.last_sent.date, &self.last_sent.text);
            }
            return Ok(());
        };
        let recipient: String = outbound.recipient.clone();
        let progress: String = format!("{}/{}", outbound.next_index(), outbound.total_chunks());

        match self.codec.encode(&recipient, &chunk.text, chunk.multipart) {
            Ok(length) => {
                debug_log(&progress, &format!("sending to {recipient} >{}<", chunk.text));
                self.mode = Mode::Sending;
                self.issue(
                    Payload::Text(format!("AT+CMGS={length}")),
                    Continuation::WriteMessageBody,
                    PROMPT,
                    PROMPT_TIMEOUT,
                    0,
                )
            }
            Err(err) => {
                log::error!(
                    "Encode error {} sending chunk {progress} to {recipient} >{}<",
                    err.code(),
                    chunk.text
                );
                self.counters.encode_errors += 1;
                self.encode_error = Some(err);
                self.outbound = None;
                self.set_idle();
                Err(Error::Encode(err))
            }
        }
    }

    /// Decodes an inbound PDU line, then frees the storage slot whatever the outcome.
    fn receive(&mut self, line: &str) -> ResolverReturn<()> {
        log::debug!("Message is >{line}<");
        match self.codec.decode(line) {
            Ok(sms) => {
                if sms.overflow {
                    log::warn!("SMS decode overflow, partial message only");
                }
                self.counters.sms_forwarded += 1;
                log::debug!(
                    "Got SMS from {}, sent at {}, >{}<",
                    sms.sender,
                    sms.timestamp,
                    sms.text
                );
                if let Some(callback) = self.on_received.as_mut() {
                    callback(&sms.sender, &sms.timestamp, &sms.text);
                }
                self.last_received = MessageRecord {
                    number: sms.sender,
                    date: sms.timestamp,
                    text: sms.text,
                };
            }
            Err(err) => {
                self.counters.decode_failures += 1;
                log::error!("SMS PDU decode failed: {err}");
            }
        }

        if self.mode == Mode::Receiving {
            self.set_idle();
        }
        if self.sequencer.is_pending() {
            self.pending_delete = true;
            return Ok(());
        }
        self.delete_received()
    }

    fn delete_received(&mut self) -> ResolverReturn<()> {
        self.pending_delete = false;
        self.issue(
            Payload::Text("AT+CMGD=1,2".to_string()),
            Continuation::Idle,
            "",
            DELETE_TIMEOUT,
            0,
        )
    }

    fn latch_restart(&mut self, reason: RestartReason) {
        log::error!("Restart needed: {reason} ({})", reason.code());
        self.restart = Some(reason);
    }

    fn fail(&mut self, reason: RestartReason) {
        self.latch_restart(reason);
        if let Some(outbound) = self.outbound.take() {
            log::warn!(
                "Dropping message to {} at chunk {}/{}",
                outbound.recipient,
                outbound.next_index(),
                outbound.total_chunks()
            );
        }
        self.set_idle();
    }

    fn set_idle(&mut self) {
        self.mode = if self.notice.is_some() {
            Mode::Receiving
        } else {
            Mode::Idle
        };
        log::debug!("Modem is {:?}", self.mode);
    }
}
