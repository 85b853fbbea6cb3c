//! Single-slot command sequencer: "send, wait up to T ms for P, retry up to N times, then C".

use crate::{error::RestartReason, transport::Transport, ResolverReturn, DEFAULT_ANSWER};
use colored::Colorize;

/// Default command timeout (ms).
pub const CMD_TIMEOUT: u64 = 4000;

const LINE_TERMINATOR: &[u8] = b"\r";

/// What happens once the outstanding command resolves successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Nothing else to do, the engine goes idle.
    Idle,
    /// Move the init sequencer to its next step.
    AdvanceInit,
    /// The `>` prompt arrived, write the encoded PDU.
    WriteMessageBody,
    /// The chunk was accepted, send the next one or finish.
    NextChunk,
}

/// Bytes written for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Command text, terminated with CR on the wire. Empty text only waits.
    Text(String),
    /// Single raw byte, written without terminator.
    Byte(u8),
}

impl Payload {
    pub fn describe(&self) -> String {
        match self {
            Payload::Text(text) => text.clone(),
            Payload::Byte(byte) => format!("0x{byte:02x}"),
        }
    }
}

/// The one outstanding command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub payload: Payload,
    pub expected: String,
    pub started_at: u64,
    pub timeout: u64,
    pub retries_max: u8,
    pub continuation: Continuation,
    /// A byte arrived from the modem since the command was (re)issued.
    pub received_any: bool,
}

impl PendingCommand {
    pub fn expired(&self, now: u64) -> bool {
        now.saturating_sub(self.started_at) >= self.timeout
    }

    /// Single-character expectations are matched byte by byte, without waiting for LF.
    pub fn prompt(&self) -> Option<u8> {
        match self.expected.as_bytes() {
            [single] => Some(*single),
            _ => None,
        }
    }
}

/// Outcome of a deadline check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// Errors are ignored, carry on as if the reply arrived.
    Ignored(Continuation),
    /// The identical command was written again.
    Retried { attempt: u8 },
    /// Retry budget exhausted.
    Failed(RestartReason),
}

#[derive(Debug, Default)]
pub struct CommandSequencer {
    pending: Option<PendingCommand>,
    last_command: String,
    retries_used: u8,
    commands_issued: u32,
}

impl CommandSequencer {
    pub fn new() -> Self {
        CommandSequencer::default()
    }

    /// Issues a command and arms the single pending slot.
    ///
    /// The retry counter restarts only when the command text differs from the previous one, so a
    /// step that is re-sent keeps consuming the same budget.
    #[allow(clippy::too_many_arguments)]
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        now: u64,
        payload: Payload,
        continuation: Continuation,
        expected: &str,
        timeout: u64,
        retries_max: u8,
    ) -> ResolverReturn<()> {
        self.commands_issued = self.commands_issued.wrapping_add(1);
        let expected: &str = if expected.is_empty() { DEFAULT_ANSWER } else { expected };
        log::debug!(
            "{} - issuing command, waiting {timeout} ms for {expected}",
            format!("[{}]", payload.describe()).yellow()
        );

        match &payload {
            Payload::Text(text) if text.is_empty() => (),
            Payload::Text(text) => {
                if *text != self.last_command {
                    self.retries_used = 0;
                }
                self.last_command = text.clone();
            }
            Payload::Byte(_) => self.retries_used = 0,
        }
        write_payload(transport, &payload)?;

        self.pending = Some(PendingCommand {
            payload,
            expected: expected.to_string(),
            started_at: now,
            timeout,
            retries_max,
            continuation,
            received_any: false,
        });
        Ok(())
    }

    /// Checks the outstanding command against its deadline.
    pub fn check_deadline<T: Transport>(
        &mut self,
        transport: &mut T,
        now: u64,
        ignore_errors: bool,
    ) -> ResolverReturn<Option<Expiry>> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(None);
        };
        if !pending.expired(now) {
            return Ok(None);
        }

        let elapsed: u64 = now.saturating_sub(pending.started_at);
        let tag = format!("[{}]", pending.payload.describe()).yellow();

        if ignore_errors {
            log::error!("{tag} - ignoring time out after {elapsed} ms");
            let continuation: Continuation = pending.continuation;
            self.pending = None;
            return Ok(Some(Expiry::Ignored(continuation)));
        }

        if self.retries_used < pending.retries_max {
            self.retries_used += 1;
            self.commands_issued = self.commands_issued.wrapping_add(1);
            log::debug!("{tag} - no answer after {elapsed} ms, retry {}", self.retries_used);
            write_payload(transport, &pending.payload)?;
            pending.started_at = now;
            pending.received_any = false;
            return Ok(Some(Expiry::Retried {
                attempt: self.retries_used,
            }));
        }

        let reason: RestartReason = if pending.received_any {
            log::error!("{tag} - partial answer after {elapsed} ms");
            RestartReason::BadAnswer
        } else {
            log::error!("{tag} - timed out after {elapsed} ms");
            RestartReason::Timeout
        };
        self.pending = None;
        Ok(Some(Expiry::Failed(reason)))
    }

    pub fn note_received(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.received_any = true;
        }
    }

    /// Resolves the outstanding command, handing back its continuation.
    pub fn resolve(&mut self) -> Option<Continuation> {
        self.pending.take().map(|pending| pending.continuation)
    }

    /// Drops the outstanding command without running its continuation.
    pub fn abort(&mut self) -> Option<PendingCommand> {
        self.pending.take()
    }

    /// Forgets the outstanding command so its reply is not tracked.
    pub fn release(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_command(&self) -> &str {
        &self.last_command
    }

    /// Records a line as the current command context without writing anything.
    pub fn set_context(&mut self, context: &str) {
        self.last_command = context.to_string();
    }

    pub fn retries_used(&self) -> u8 {
        self.retries_used
    }

    pub fn commands_issued(&self) -> u32 {
        self.commands_issued
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.last_command.clear();
        self.retries_used = 0;
    }
}

fn write_payload<T: Transport>(transport: &mut T, payload: &Payload) -> ResolverReturn<()> {
    match payload {
        Payload::Text(text) if text.is_empty() => Ok(()),
        Payload::Text(text) => {
            transport.write(text.as_bytes())?;
            transport.write(LINE_TERMINATOR)
        }
        Payload::Byte(byte) => transport.write(&[*byte]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct Sink {
        written: Vec<u8>,
    }

    impl Transport for Sink {
        fn open(&mut self, _baud_rate: u32) -> ResolverReturn<()> {
            Ok(())
        }
        fn bytes_available(&mut self) -> ResolverReturn<usize> {
            Ok(0)
        }
        fn read_byte(&mut self) -> ResolverReturn<Option<u8>> {
            Ok(None)
        }
        fn write(&mut self, bytes: &[u8]) -> ResolverReturn<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }
    }

    fn send_at(seq: &mut CommandSequencer, sink: &mut Sink, text: &str, retries: u8) {
        seq.send(
            sink,
            0,
            Payload::Text(text.to_string()),
            Continuation::Idle,
            "",
            1000,
            retries,
        )
        .unwrap();
    }

    #[test]
    fn writes_text_with_terminator_and_defaults_to_ok() {
        let mut seq = CommandSequencer::new();
        let mut sink = Sink::default();
        send_at(&mut seq, &mut sink, "ATE0", 0);
        assert_eq!(sink.written, b"ATE0\r");
        assert_eq!(seq.pending().unwrap().expected, "OK");
        assert_eq!(seq.commands_issued(), 1);
    }

    #[test]
    fn empty_text_only_waits() {
        let mut seq = CommandSequencer::new();
        let mut sink = Sink::default();
        send_at(&mut seq, &mut sink, "", 0);
        assert!(sink.written.is_empty());
        assert!(seq.is_pending());
    }

    #[test]
    fn retries_then_times_out() {
        let mut seq = CommandSequencer::new();
        let mut sink = Sink::default();
        send_at(&mut seq, &mut sink, "AT", 2);

        assert_eq!(seq.check_deadline(&mut sink, 999, false).unwrap(), None);
        assert_eq!(
            seq.check_deadline(&mut sink, 1000, false).unwrap(),
            Some(Expiry::Retried { attempt: 1 })
        );
        assert_eq!(
            seq.check_deadline(&mut sink, 2000, false).unwrap(),
            Some(Expiry::Retried { attempt: 2 })
        );
        assert_eq!(
            seq.check_deadline(&mut sink, 3000, false).unwrap(),
            Some(Expiry::Failed(RestartReason::Timeout))
        );
        assert_eq!(sink.written, b"AT\rAT\rAT\r");
        assert!(!seq.is_pending());
    }

    #[test]
    fn partial_data_is_a_bad_answer() {
        let mut seq = CommandSequencer::new();
        let mut sink = Sink::default();
        send_at(&mut seq, &mut sink, "AT+CSCA?", 0);
        seq.note_received();
        assert_eq!(
            seq.check_deadline(&mut sink, 1000, false).unwrap(),
            Some(Expiry::Failed(RestartReason::BadAnswer))
        );
    }

    #[test]
    fn ignored_errors_hand_back_continuation() {
        let mut seq = CommandSequencer::new();
        let mut sink = Sink::default();
        seq.send(
            &mut sink,
            0,
            Payload::Text("AT+CNMP=51".to_string()),
            Continuation::AdvanceInit,
            "",
            1000,
            3,
        )
        .unwrap();
        assert_eq!(
            seq.check_deadline(&mut sink, 1000, true).unwrap(),
            Some(Expiry::Ignored(Continuation::AdvanceInit))
        );
        assert!(!seq.is_pending());
    }

    #[test]
    fn same_text_keeps_retry_budget() {
        let mut seq = CommandSequencer::new();
        let mut sink = Sink::default();
        send_at(&mut seq, &mut sink, "AT", 1);
        seq.check_deadline(&mut sink, 1000, false).unwrap();
        assert_eq!(seq.retries_used(), 1);

        send_at(&mut seq, &mut sink, "AT", 1);
        assert_eq!(seq.retries_used(), 1);

        send_at(&mut seq, &mut sink, "ATE0", 1);
        assert_eq!(seq.retries_used(), 0);
    }

    #[test]
    fn single_character_expectation_is_a_prompt() {
        let mut seq = CommandSequencer::new();
        let mut sink = Sink::default();
        seq.send(
            &mut sink,
            0,
            Payload::Text("AT+CMGS=23".to_string()),
            Continuation::WriteMessageBody,
            ">",
            10000,
            0,
        )
        .unwrap();
        assert_eq!(seq.pending().unwrap().prompt(), Some(b'>'));
        assert_eq!(seq.resolve(), Some(Continuation::WriteMessageBody));
        assert_eq!(seq.resolve(), None);
    }

    #[test]
    fn write_failures_propagate() {
        struct Broken;
        impl Transport for Broken {
            fn open(&mut self, _baud_rate: u32) -> ResolverReturn<()> {
                Ok(())
            }
            fn bytes_available(&mut self) -> ResolverReturn<usize> {
                Ok(0)
            }
            fn read_byte(&mut self) -> ResolverReturn<Option<u8>> {
                Ok(None)
            }
            fn write(&mut self, _bytes: &[u8]) -> ResolverReturn<()> {
                Err(Error::NotConnected)
            }
        }
        let mut seq = CommandSequencer::new();
        let result = seq.send(
            &mut Broken,
            0,
            Payload::Byte(0x1a),
            Continuation::Idle,
            "",
            1000,
            0,
        );
        assert!(matches!(result, Err(Error::NotConnected)));
        assert!(!seq.is_pending());
    }
}
