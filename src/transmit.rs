//! Outbound message planning: alphabet choice, encoded length and chunking.
//!
//! A text is measured in transport units. Every character found in [`GSM7_UNITS`] costs one or two
//! septets; the first character missing from the table switches the whole message to UCS-2, where
//! each UTF-16 code unit costs two units. Characters outside the BMP take a surrogate pair.

use crate::pdu::Multipart;
use std::{cmp::Ordering, ops::Range};

/// Units an unsplit 7-bit message may hold.
pub const SEVEN_BIT_CAPACITY: usize = 160;
/// Units per chunk of a split 7-bit message.
pub const SEVEN_BIT_CHUNK: usize = 152;
/// Units an unsplit 16-bit message may hold.
pub const SIXTEEN_BIT_CAPACITY: usize = 70;
/// Units per chunk of a split 16-bit message.
pub const SIXTEEN_BIT_CHUNK: usize = 67;

/// Code point ranges reachable in GSM-7 and their cost in septets, sorted by start.
pub const GSM7_UNITS: [(u32, u32, u8); 27] = [
    (0x0a, 0x0a, 1),     // line feed
    (0x0c, 0x0c, 2),     // form feed
    (0x0d, 0x0d, 1),     // carriage return
    (0x20, 0x5a, 1),     // space to Z
    (0x5b, 0x5e, 2),     // [ \ ] ^
    (0x5f, 0x5f, 1),     // _
    (0x61, 0x7a, 1),     // a to z
    (0x7b, 0x7e, 2),     // { | } ~
    (0xa1, 0xa1, 1),     // ¡
    (0xa3, 0xa5, 1),     // £ ¤ ¥
    (0xa7, 0xa7, 1),     // §
    (0xbf, 0xbf, 1),     // ¿
    (0xc4, 0xc7, 1),     // Ä Å Æ Ç
    (0xc9, 0xc9, 1),     // É
    (0xd1, 0xd1, 1),     // Ñ
    (0xd6, 0xd6, 1),     // Ö
    (0xd8, 0xd8, 1),     // Ø
    (0xdc, 0xdc, 1),     // Ü
    (0xdf, 0xe0, 1),     // ß à
    (0xe4, 0xe6, 1),     // ä å æ
    (0xe8, 0xe9, 1),     // è é
    (0xec, 0xec, 1),     // ì
    (0xf1, 0xf2, 1),     // ñ ò
    (0xf6, 0xf6, 1),     // ö
    (0xf8, 0xf9, 1),     // ø ù
    (0xfc, 0xfc, 1),     // ü
    (0x20ac, 0x20ac, 2), // €
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Encoding {
    SevenBit,
    SixteenBit,
}

impl Encoding {
    pub fn capacity(&self) -> usize {
        match self {
            Encoding::SevenBit => SEVEN_BIT_CAPACITY,
            Encoding::SixteenBit => SIXTEEN_BIT_CAPACITY,
        }
    }

    pub fn chunk_size(&self) -> usize {
        match self {
            Encoding::SevenBit => SEVEN_BIT_CHUNK,
            Encoding::SixteenBit => SIXTEEN_BIT_CHUNK,
        }
    }
}

/// Septets needed for `c`, or `None` when it has no GSM-7 representation.
pub fn gsm7_units(c: char) -> Option<u8> {
    let code: u32 = c as u32;
    GSM7_UNITS
        .binary_search_by(|(start, end, _)| {
            if *end < code {
                Ordering::Less
            } else if *start > code {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .ok()
        .map(|position| GSM7_UNITS[position].2)
}

/// Cost of one character once the encoding is fixed.
pub fn char_units(c: char, encoding: Encoding) -> usize {
    match encoding {
        Encoding::SevenBit => gsm7_units(c).map(usize::from).unwrap_or(0),
        Encoding::SixteenBit => c.len_utf16() * 2,
    }
}

/// Picks the alphabet for the whole text and returns its length in units.
pub fn measure(text: &str) -> (Encoding, usize) {
    let mut length: usize = 0;
    for (position, c) in text.chars().enumerate() {
        match gsm7_units(c) {
            Some(units) => length += usize::from(units),
            None => {
                log::debug!("Switched to UCS-2 on {c:?} (U+{:04X}) at char {position}", c as u32);
                return (Encoding::SixteenBit, text.encode_utf16().count() * 2);
            }
        }
    }
    (Encoding::SevenBit, length)
}

/// How a message is cut into transport-sized pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ChunkPlan {
    pub encoding: Encoding,
    /// Encoded length in units.
    pub length: usize,
    pub chunk_size: usize,
    /// Number of chunks; zero for an unsplit message.
    pub count: usize,
}

impl ChunkPlan {
    pub fn new(text: &str) -> Self {
        let (encoding, length) = measure(text);
        ChunkPlan::for_length(encoding, length)
    }

    pub fn for_length(encoding: Encoding, length: usize) -> Self {
        if length > encoding.capacity() {
            let chunk_size: usize = encoding.chunk_size();
            ChunkPlan {
                encoding,
                length,
                chunk_size,
                count: (length + chunk_size - 1) / chunk_size,
            }
        } else {
            ChunkPlan {
                encoding,
                length,
                chunk_size: length,
                count: 0,
            }
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.count > 0
    }

    /// Unit range covered by chunk `index` (0-based).
    pub fn bounds(&self, index: usize) -> Range<usize> {
        if !self.is_multipart() {
            return 0..self.length;
        }
        let start: usize = (index * self.chunk_size).min(self.length);
        let end: usize = (start + self.chunk_size).min(self.length);
        start..end
    }

    /// Text of chunk `index`: every character whose last unit falls inside [`Self::bounds`].
    ///
    /// A character straddling a boundary moves to the later chunk, so no chunk is left empty and
    /// a chunk never exceeds its bounds by more than one character.
    pub fn chunk_text<'a>(&self, text: &'a str, index: usize) -> &'a str {
        if !self.is_multipart() {
            return text;
        }
        let bounds: Range<usize> = self.bounds(index);
        let mut begin: Option<usize> = None;
        let mut finish: usize = text.len();
        let mut offset: usize = 0;
        for (byte, c) in text.char_indices() {
            let end: usize = offset + char_units(c, self.encoding);
            if end > bounds.end {
                finish = byte;
                break;
            }
            if begin.is_none() && (end > bounds.start || index == 0) {
                begin = Some(byte);
            }
            offset = end;
        }
        match begin {
            Some(begin) => &text[begin..finish],
            None => "",
        }
    }
}

/// A message being transmitted, one chunk per send cycle.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub recipient: String,
    pub text: String,
    pub plan: ChunkPlan,
    pub multipart_id: u16,
    next_index: usize,
}

/// One send cycle's worth of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub multipart: Option<Multipart>,
}

impl OutboundMessage {
    pub fn new(recipient: &str, text: &str, plan: ChunkPlan, multipart_id: u16) -> Self {
        OutboundMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
            plan,
            multipart_id,
            next_index: 0,
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.plan.count.max(1)
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.total_chunks()
    }

    /// Takes the next chunk, advancing the index.
    pub fn next_chunk(&mut self) -> Option<Chunk> {
        if self.is_complete() {
            return None;
        }
        let index: usize = self.next_index;
        self.next_index += 1;
        let multipart: Option<Multipart> = if self.plan.is_multipart() {
            Some(Multipart {
                id: self.multipart_id,
                count: self.plan.count as u8,
                index: self.next_index as u8,
            })
        } else {
            None
        };
        Some(Chunk {
            text: self.plan.chunk_text(&self.text, index).to_string(),
            multipart,
        })
    }
}
