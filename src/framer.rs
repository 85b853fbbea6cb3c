//! Turns the raw modem byte stream into lines.

/// Longest line the framer accepts before reporting [`Framed::TooLong`].
pub const MAX_LINE: usize = 498;

const NUL: u8 = 0x00;
const LF: u8 = 0x0a;
const CR: u8 = 0x0d;

/// What a single fed byte produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framed {
    /// Byte absorbed, nothing to dispatch yet.
    Pending,
    /// A LF terminated the buffer.
    Line(String),
    /// The awaited single-character prompt arrived; the buffer so far is returned.
    Prompt(String),
    /// The line outgrew [`MAX_LINE`]; the buffer has been cleared.
    TooLong(String),
}

#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        LineFramer {
            buffer: Vec::with_capacity(MAX_LINE),
        }
    }

    /// Feeds one byte. `prompt` is the single-character reply currently awaited, if any.
    pub fn feed(&mut self, byte: u8, prompt: Option<u8>) -> Framed {
        match byte {
            NUL | CR => Framed::Pending,
            LF => Framed::Line(self.take()),
            _ => {
                if self.buffer.len() >= MAX_LINE {
                    let partial: String = self.take();
                    return Framed::TooLong(partial);
                }
                self.buffer.push(byte);
                if prompt == Some(byte) {
                    return Framed::Prompt(self.take());
                }
                Framed::Pending
            }
        }
    }

    /// Bytes of the unfinished line.
    pub fn partial(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn take(&mut self) -> String {
        let line: String = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }
}
