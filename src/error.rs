/// Reason latched when the engine asks the driver for a restart.
///
/// The numeric value is the restart code surfaced by [`crate::Modem::restart_reason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum RestartReason {
    Timeout = 1,
    TooLong = 2,
    BadAnswer = 3,
    DeviceError = 4,
    NeedInit = 5,
}

impl RestartReason {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RestartReason::Timeout => write!(f, "timeout"),
            RestartReason::TooLong => write!(f, "answer too long"),
            RestartReason::BadAnswer => write!(f, "bad answer"),
            RestartReason::DeviceError => write!(f, "device error"),
            RestartReason::NeedInit => write!(f, "initialisation needed"),
        }
    }
}

/// Reasons given by a [`crate::pdu::PduCodec`] when it refuses to encode a message.
///
/// The numeric value is the negative code historically returned by PDU encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum EncodeError {
    Obsolete = -1,
    SixteenBitTooLong = -2,
    SevenBitTooLong = -3,
    MultipartNumbering = -4,
    AddressFormat = -5,
    BufferTooSmall = -6,
    UnsupportedAlphabet = -7,
}

impl EncodeError {
    pub fn code(&self) -> i8 {
        *self as i8
    }
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EncodeError::Obsolete => write!(f, "obsolete message format"),
            EncodeError::SixteenBitTooLong => write!(f, "message too long for UCS-2"),
            EncodeError::SevenBitTooLong => write!(f, "message too long for GSM-7"),
            EncodeError::MultipartNumbering => write!(f, "inconsistent multipart numbering"),
            EncodeError::AddressFormat => write!(f, "bad address format"),
            EncodeError::BufferTooSmall => write!(f, "work buffer too small"),
            EncodeError::UnsupportedAlphabet => write!(f, "8-bit alphabet not supported"),
        }
    }
}

/// Reasons a received PDU line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    NotHex,
    Truncated,
    UnexpectedMessageType(u8),
    UnsupportedAlphabet,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DecodeError::NotHex => write!(f, "payload is not hexadecimal"),
            DecodeError::Truncated => write!(f, "payload is truncated"),
            DecodeError::UnexpectedMessageType(mti) => write!(f, "unexpected message type {mti}"),
            DecodeError::UnsupportedAlphabet => write!(f, "unsupported alphabet"),
        }
    }
}

/// returned by [`Error::kind`] method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadAnswer,
    Busy,
    Config,
    DecodeFailure,
    DeviceError,
    Encode,
    Gpio,
    InvalidServiceCenter,
    Io,
    NotConnected,
    Restart,
    Timeout,
    TooLong,
    Uart,
}

/// RPi SIM7000 Error enum.
#[derive(Debug)]
pub enum Error {
    BadAnswer,
    Busy,
    Config(serde_json::Error),
    DecodeFailure(DecodeError),
    DeviceError,
    Encode(EncodeError),
    Gpio(rppal::gpio::Error),
    InvalidServiceCenter(String),
    Io(std::io::Error),
    NotConnected,
    Restart(RestartReason),
    Timeout,
    TooLong,
    Uart(rppal::uart::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadAnswer => write!(f, "Modem - partial answer received before the deadline."),
            Error::Busy => write!(f, "Modem - a command is already in flight, queue the request and retry when idle."),
            Error::Config(ref err) => write!(f, "Configuration could not be parsed: {}", err),
            Error::DecodeFailure(ref err) => write!(f, "SMS - received PDU could not be decoded: {}", err),
            Error::DeviceError => write!(f, "Modem - device returned an error reply."),
            Error::Encode(ref err) => write!(f, "SMS - message could not be encoded: {} ({})", err, err.code()),
            Error::Gpio(ref err) => write!(f, "GPIO error: {}", err),
            Error::InvalidServiceCenter(ref answer) => write!(f, "Modem - no valid service center number in {answer}."),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::NotConnected => write!(f, "Modem - serial link is not open."),
            Error::Restart(ref reason) => write!(f, "Modem - restart needed: {} ({}).", reason, reason.code()),
            Error::Timeout => write!(f, "Modem - no answer before the deadline."),
            Error::TooLong => write!(f, "Modem - answer exceeded the line buffer."),
            Error::Uart(ref err) => write!(f, "Uart error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadAnswer => ErrorKind::BadAnswer,
            Error::Busy => ErrorKind::Busy,
            Error::Config(ref _e) => ErrorKind::Config,
            Error::DecodeFailure(ref _e) => ErrorKind::DecodeFailure,
            Error::DeviceError => ErrorKind::DeviceError,
            Error::Encode(ref _e) => ErrorKind::Encode,
            Error::Gpio(ref _e) => ErrorKind::Gpio,
            Error::InvalidServiceCenter(ref _a) => ErrorKind::InvalidServiceCenter,
            Error::Io(ref _e) => ErrorKind::Io,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::Restart(ref _r) => ErrorKind::Restart,
            Error::Timeout => ErrorKind::Timeout,
            Error::TooLong => ErrorKind::TooLong,
            Error::Uart(ref _e) => ErrorKind::Uart,
        }
    }
}

impl From<RestartReason> for Error {
    fn from(reason: RestartReason) -> Error {
        match reason {
            RestartReason::Timeout => Error::Timeout,
            RestartReason::TooLong => Error::TooLong,
            RestartReason::BadAnswer => Error::BadAnswer,
            RestartReason::DeviceError => Error::DeviceError,
            RestartReason::NeedInit => Error::Restart(reason),
        }
    }
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Error {
        Error::Encode(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Error {
        Error::DecodeFailure(err)
    }
}

impl From<rppal::uart::Error> for Error {
    fn from(err: rppal::uart::Error) -> Error {
        Error::Uart(err)
    }
}

impl From<rppal::gpio::Error> for Error {
    fn from(err: rppal::gpio::Error) -> Error {
        Error::Gpio(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Config(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
