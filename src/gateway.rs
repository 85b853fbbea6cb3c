//! Gateway module
//!
//! [`Gateway`] is the driver loop around a [`Modem`]: it polls the engine on a tokio interval,
//! queues requests by priority until the engine is idle, and reinitialises the engine whenever a
//! restart is latched. See [`GatewayHandle`] to discover available requests.

use crate::{
    config::ModemConfig,
    error::{Error, RestartReason},
    modem::{LinkSettings, Modem},
    pdu::{Pdu, PduCodec},
    transport::{Clock, RppalPower, SystemClock, Transport, UartTransport},
    ResolverReturn, TaskJoinHandle,
};
use colored::Colorize;
use priority_queue::PriorityQueue;
use std::{cmp::Reverse, collections::HashMap, time::Duration};
use tokio::{
    spawn,
    sync::{mpsc, oneshot},
    time::{interval, MissedTickBehavior},
};
use uuid::Uuid;

#[derive(PartialEq, PartialOrd, Ord, Eq, Debug, Clone, Copy)]
pub enum TaskPriority {
    NORMAL,
    HIGH,
}

/// Queue order: priority first, then arrival.
type QueueRank = (TaskPriority, Reverse<u64>);

#[derive(Debug, Clone)]
enum Command {
    SendSms { number: String, text: String },
    DeleteStored { index: u8, flag: u8 },
}

impl Command {
    fn priority(&self) -> TaskPriority {
        match self {
            Command::SendSms { .. } => TaskPriority::NORMAL,
            Command::DeleteStored { .. } => TaskPriority::HIGH,
        }
    }
}

struct Request {
    task_id: Uuid,
    command: Command,
    reply: oneshot::Sender<ResolverReturn<()>>,
}

fn debug_log(task_id: &Uuid, msg: &str) {
    log::debug!("{} - {msg}", format!("[{task_id}]").yellow())
}

fn info_log(task_id: &Uuid, msg: &str) {
    log::info!("{} - {msg}", format!("[{task_id}]").yellow())
}

fn respond(request: Request, result: ResolverReturn<()>) {
    match &result {
        Ok(_) => debug_log(&request.task_id, "resolved."),
        Err(err) => log::error!("{} - error: {err}", format!("[{}]", request.task_id).yellow()),
    }
    if request.reply.send(result).is_err() {
        debug_log(&request.task_id, "caller is gone.");
    }
}

/// Cloneable request side of a [`Gateway`].
#[derive(Clone)]
pub struct GatewayHandle {
    sender: mpsc::UnboundedSender<Request>,
}

impl GatewayHandle {
    fn spawn_task(&self, command: Command, log_msg: String) -> TaskJoinHandle<()> {
        let sender: mpsc::UnboundedSender<Request> = self.sender.clone();
        spawn(async move {
            let task_id: Uuid = Uuid::new_v4();
            info_log(&task_id, &log_msg);
            let (reply, response) = oneshot::channel();
            sender
                .send(Request {
                    task_id,
                    command,
                    reply,
                })
                .map_err(|_| Error::NotConnected)?;
            response.await.map_err(|_| Error::NotConnected)?
        })
    }

    /// Resolves once every chunk is confirmed by the network.
    pub fn send_sms(&self, number: &str, text: &str) -> TaskJoinHandle<()> {
        self.spawn_task(
            Command::SendSms {
                number: number.to_string(),
                text: text.to_string(),
            },
            format!("Sending SMS to {number}..."),
        )
    }

    /// Deletes stored messages, ahead of any queued SMS.
    pub fn delete_stored(&self, index: u8, flag: u8) -> TaskJoinHandle<()> {
        self.spawn_task(
            Command::DeleteStored { index, flag },
            format!("Deleting stored messages {index},{flag}..."),
        )
    }
}

pub struct Gateway<T: Transport, C: PduCodec, K: Clock> {
    modem: Modem<T, C, K>,
    settings: LinkSettings,
    poll_interval: Duration,
    requests: Option<mpsc::UnboundedReceiver<Request>>,
    queue: PriorityQueue<Uuid, QueueRank>,
    waiting: HashMap<Uuid, Request>,
    in_flight: Option<Request>,
    arrivals: u64,
}

impl Gateway<UartTransport, Pdu, SystemClock> {
    /// Builds the Raspberry Pi stack described by `config`.
    pub fn from_config(config: &ModemConfig) -> ResolverReturn<(Self, GatewayHandle)> {
        let mut modem: Modem<UartTransport, Pdu, SystemClock> = Modem::new(
            UartTransport::new(&config.port),
            Pdu::default(),
            SystemClock::new(),
        );
        if config.power_pin.is_some() {
            modem = modem.with_power_control(Box::new(RppalPower::new(
                config.power_pin_active_high,
            )?));
        }
        modem.set_ignore_errors(config.ignore_errors);
        Ok(Gateway::new(
            modem,
            config.link_settings(),
            Duration::from_millis(config.poll_interval_ms),
        ))
    }
}

impl<T: Transport, C: PduCodec, K: Clock> Gateway<T, C, K> {
    pub fn new(
        modem: Modem<T, C, K>,
        settings: LinkSettings,
        poll_interval: Duration,
    ) -> (Self, GatewayHandle) {
        let (sender, requests) = mpsc::unbounded_channel();
        let gateway = Gateway {
            modem,
            settings,
            poll_interval,
            requests: Some(requests),
            queue: PriorityQueue::new(),
            waiting: HashMap::new(),
            in_flight: None,
            arrivals: 0,
        };
        (gateway, GatewayHandle { sender })
    }

    /// Engine access, e.g. to register callbacks before [`Gateway::run`].
    pub fn modem_mut(&mut self) -> &mut Modem<T, C, K> {
        &mut self.modem
    }

    /// Initialises the engine and drives it until every handle is dropped and the queue is empty.
    ///
    /// Transport and GPIO failures end the loop; pending requests are then failed.
    pub async fn run(mut self) -> ResolverReturn<Modem<T, C, K>> {
        let result: ResolverReturn<()> = self.drive().await;
        let reason: RestartReason = self.modem.restart_reason().unwrap_or(RestartReason::NeedInit);
        self.fail_all(reason);
        result.map(|_| self.modem)
    }

    async fn drive(&mut self) -> ResolverReturn<()> {
        let Some(mut requests) = self.requests.take() else {
            return Err(Error::NotConnected);
        };
        self.modem.initialize(self.settings)?;
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut closed: bool = false;

        loop {
            tokio::select! {
                request = requests.recv(), if !closed => match request {
                    Some(request) => self.enqueue(request),
                    None => closed = true,
                },
                _ = ticker.tick() => {
                    self.tick()?;
                    if closed && self.queue.is_empty() && self.in_flight.is_none() {
                        log::debug!("All handles dropped, gateway stops.");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn enqueue(&mut self, request: Request) {
        let priority: TaskPriority = request.command.priority();
        debug_log(&request.task_id, &format!("created with {priority:?} priority."));
        self.arrivals += 1;
        self.queue
            .push(request.task_id, (priority, Reverse(self.arrivals)));
        self.waiting.insert(request.task_id, request);
    }

    fn tick(&mut self) -> ResolverReturn<()> {
        self.modem.poll()?;

        if let Some(reason) = self.modem.restart_reason() {
            if let Some(request) = self.in_flight.take() {
                respond(request, Err(Error::Restart(reason)));
            }
            log::warn!("Reinitialising modem after {reason} ({})", reason.code());
            self.modem.acknowledge_restart();
            self.modem.mark_reset();
            return self.modem.initialize(self.settings);
        }

        if !self.modem.is_idle() {
            return Ok(());
        }
        if let Some(request) = self.in_flight.take() {
            let result: ResolverReturn<()> = match self.modem.take_encode_error() {
                Some(err) => Err(Error::Encode(err)),
                None => Ok(()),
            };
            respond(request, result);
        }
        while let Some((task_id, _)) = self.queue.pop() {
            let Some(request) = self.waiting.remove(&task_id) else {
                continue;
            };
            debug_log(&task_id, "removed from the queue.");
            if self.dispatch(request) {
                break;
            }
        }
        Ok(())
    }

    /// Hands a request to the engine; `false` when it was refused and already answered.
    fn dispatch(&mut self, request: Request) -> bool {
        let result: ResolverReturn<()> = match &request.command {
            Command::SendSms { number, text } => self.modem.send_text(number, text),
            Command::DeleteStored { index, flag } => self.modem.delete_stored(*index, *flag),
        };
        match result {
            Ok(_) => {
                self.in_flight = Some(request);
                true
            }
            Err(err) => {
                respond(request, Err(err));
                false
            }
        }
    }

    fn fail_all(&mut self, reason: RestartReason) {
        if let Some(request) = self.in_flight.take() {
            respond(request, Err(Error::Restart(reason)));
        }
        while let Some((task_id, _)) = self.queue.pop() {
            if let Some(request) = self.waiting.remove(&task_id) {
                respond(request, Err(Error::Restart(reason)));
            }
        }
    }
}
