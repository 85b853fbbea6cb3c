//! SMS PDU codec.
//!
//! The engine only needs the [`PduCodec`] trait. [`Pdu`] is the built-in implementation: it encodes
//! SMS-SUBMIT messages (GSM-7 or UCS-2, with a concatenation header for multipart messages) and
//! decodes SMS-DELIVER lines as pushed by the modem after a `+CMT:` indicator.

use crate::error::{DecodeError, EncodeError};

/// Default work buffer, in hex characters.
pub const PDU_BUFFER_LENGTH: usize = 1024;

const MAX_ADDRESS_DIGITS: usize = 20;
const MAX_GSM7_SEPTETS: usize = 160;
const MAX_UD_OCTETS: usize = 140;
const ESCAPE: u8 = 0x1b;

const TYPE_INTERNATIONAL: u8 = 0x91;
const TYPE_UNKNOWN: u8 = 0x81;

/// Position of one chunk in a concatenated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multipart {
    pub id: u16,
    pub count: u8,
    /// 1-based.
    pub index: u8,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredSms {
    pub sender: String,
    /// `yy/MM/dd,hh:mm:ss±zz`, empty when the PDU carries no timestamp.
    pub timestamp: String,
    pub text: String,
    /// The user data was shorter than announced; `text` is partial.
    pub overflow: bool,
}

pub trait PduCodec {
    fn set_service_center(&mut self, number: &str);

    fn service_center(&self) -> &str;

    /// Encodes one message, returning the TPDU length to announce with `AT+CMGS`.
    fn encode(
        &mut self,
        number: &str,
        text: &str,
        multipart: Option<Multipart>,
    ) -> Result<usize, EncodeError>;

    /// Hex payload produced by the last successful [`PduCodec::encode`].
    fn payload(&self) -> &str;

    fn decode(&mut self, line: &str) -> Result<DeliveredSms, DecodeError>;
}

/// GSM 03.38 default alphabet; index is the septet value. 0x1b is the escape slot.
const GSM7_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

/// Extension table, reached through the escape septet.
const GSM7_EXTENSION: [(u8, char); 10] = [
    (0x0a, '\u{0c}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2f, '\\'),
    (0x3c, '['),
    (0x3d, '~'),
    (0x3e, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

fn char_to_gsm7(c: char, septets: &mut Vec<u8>) -> bool {
    if c != '\u{1b}' {
        if let Some(code) = GSM7_BASIC.iter().position(|basic| *basic == c) {
            septets.push(code as u8);
            return true;
        }
    }
    match GSM7_EXTENSION.iter().find(|(_, extended)| *extended == c) {
        Some((code, _)) => {
            septets.push(ESCAPE);
            septets.push(*code);
            true
        }
        None => false,
    }
}

fn gsm7_to_text(septets: &[u8]) -> String {
    let mut text: String = String::with_capacity(septets.len());
    let mut escaped: bool = false;
    for septet in septets {
        let code: u8 = septet & 0x7f;
        if escaped {
            escaped = false;
            match GSM7_EXTENSION.iter().find(|(extended, _)| *extended == code) {
                Some((_, c)) => text.push(*c),
                None => text.push(GSM7_BASIC[code as usize]),
            }
        } else if code == ESCAPE {
            escaped = true;
        } else {
            text.push(GSM7_BASIC[code as usize]);
        }
    }
    text
}

/// Packs septets LSB first, leaving `start_bit` zero bits in front.
fn pack_septets(septets: &[u8], start_bit: usize) -> Vec<u8> {
    let total_bits: usize = start_bit + septets.len() * 7;
    let mut packed: Vec<u8> = vec![0; (total_bits + 7) / 8];
    for (i, septet) in septets.iter().enumerate() {
        let bit: usize = start_bit + i * 7;
        let value: u16 = u16::from(septet & 0x7f) << (bit % 8);
        packed[bit / 8] |= value as u8;
        if value > 0xff {
            packed[bit / 8 + 1] |= (value >> 8) as u8;
        }
    }
    packed
}

/// Reads `count` septets starting at septet position `skip`.
fn unpack_septets(data: &[u8], skip: usize, count: usize) -> Vec<u8> {
    (skip..count)
        .filter_map(|i| {
            let bit: usize = i * 7;
            let low: u16 = u16::from(*data.get(bit / 8)?);
            let high: u16 = u16::from(data.get(bit / 8 + 1).copied().unwrap_or(0));
            Some((((high << 8 | low) >> (bit % 8)) & 0x7f) as u8)
        })
        .collect()
}

fn swapped_bcd(digits: &str) -> Vec<u8> {
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let low: u8 = pair[0] - b'0';
            let high: u8 = pair.get(1).map(|d| d - b'0').unwrap_or(0x0f);
            high << 4 | low
        })
        .collect()
}

fn address_digits(number: &str) -> Result<(u8, &str), EncodeError> {
    let (kind, digits) = match number.strip_prefix('+') {
        Some(digits) => (TYPE_INTERNATIONAL, digits),
        None => (TYPE_UNKNOWN, number),
    };
    if digits.is_empty()
        || digits.len() > MAX_ADDRESS_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(EncodeError::AddressFormat);
    }
    Ok((kind, digits))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn from_hex(line: &str) -> Result<Vec<u8>, DecodeError> {
    let line: &str = line.trim();
    if line.is_empty() || line.len() % 2 != 0 {
        return Err(DecodeError::NotHex);
    }
    (0..line.len())
        .step_by(2)
        .map(|i| {
            line.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or(DecodeError::NotHex)
        })
        .collect()
}

/// Cursor over a decoded PDU.
struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, DecodeError> {
        let byte: u8 = *self.data.get(self.position).ok_or(DecodeError::Truncated)?;
        self.position += 1;
        Ok(byte)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let slice: &'a [u8] = self
            .data
            .get(self.position..self.position + count)
            .ok_or(DecodeError::Truncated)?;
        self.position += count;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice: &'a [u8] = &self.data[self.position.min(self.data.len())..];
        self.position = self.data.len();
        slice
    }
}

fn read_address(reader: &mut Reader<'_>) -> Result<String, DecodeError> {
    let digits: usize = usize::from(reader.byte()?);
    let kind: u8 = reader.byte()?;
    let raw: &[u8] = reader.take((digits + 1) / 2)?;
    if kind & 0x70 == 0x50 {
        return Ok(gsm7_to_text(&unpack_septets(raw, 0, digits * 4 / 7)));
    }
    let mut number: String = String::with_capacity(digits + 1);
    if kind & 0x70 == 0x10 {
        number.push('+');
    }
    for byte in raw {
        for nibble in [byte & 0x0f, byte >> 4] {
            if nibble < 10 {
                number.push(char::from(b'0' + nibble));
            }
        }
    }
    Ok(number)
}

fn read_timestamp(raw: &[u8]) -> String {
    let field = |byte: u8| (byte & 0x0f) * 10 + (byte >> 4);
    let zone: u8 = raw[6];
    let quarters: u8 = (zone & 0x07) * 10 + (zone >> 4);
    let sign: char = if zone & 0x08 != 0 { '-' } else { '+' };
    format!(
        "{:02}/{:02}/{:02},{:02}:{:02}:{:02}{sign}{quarters:02}",
        field(raw[0]),
        field(raw[1]),
        field(raw[2]),
        field(raw[3]),
        field(raw[4]),
        field(raw[5]),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alphabet {
    Gsm7,
    EightBit,
    Ucs2,
}

fn alphabet(dcs: u8) -> Alphabet {
    let from_bits = |bits: u8| match bits & 0x03 {
        1 => Alphabet::EightBit,
        2 => Alphabet::Ucs2,
        _ => Alphabet::Gsm7,
    };
    match dcs >> 4 {
        0x0..=0x7 => from_bits(dcs >> 2),
        0xe => Alphabet::Ucs2,
        0xf if dcs & 0x04 != 0 => Alphabet::EightBit,
        _ => Alphabet::Gsm7,
    }
}

/// Built-in GSM 03.40 codec.
#[derive(Debug, Clone)]
pub struct Pdu {
    service_center: String,
    buffer_length: usize,
    payload: String,
}

impl Pdu {
    pub fn new(buffer_length: usize) -> Self {
        Pdu {
            service_center: String::new(),
            buffer_length,
            payload: String::new(),
        }
    }

    fn encode_service_center(&self) -> Vec<u8> {
        match address_digits(&self.service_center) {
            Ok((kind, digits)) => {
                let bcd: Vec<u8> = swapped_bcd(digits);
                let mut sca: Vec<u8> = vec![bcd.len() as u8 + 1, kind];
                sca.extend(bcd);
                sca
            }
            Err(_) => vec![0x00],
        }
    }
}

impl Default for Pdu {
    fn default() -> Self {
        Pdu::new(PDU_BUFFER_LENGTH)
    }
}

impl PduCodec for Pdu {
    fn set_service_center(&mut self, number: &str) {
        self.service_center = number.to_string();
    }

    fn service_center(&self) -> &str {
        &self.service_center
    }

    fn encode(
        &mut self,
        number: &str,
        text: &str,
        multipart: Option<Multipart>,
    ) -> Result<usize, EncodeError> {
        let (kind, digits) = address_digits(number)?;

        let header: Vec<u8> = match multipart {
            Some(part) if part.count == 0 || part.index == 0 || part.index > part.count => {
                return Err(EncodeError::MultipartNumbering)
            }
            // concatenation, 8-bit reference
            Some(part) => vec![0x05, 0x00, 0x03, part.id as u8, part.count, part.index],
            None => Vec::new(),
        };

        let mut septets: Vec<u8> = Vec::with_capacity(text.len());
        let gsm7: bool = text.chars().all(|c| char_to_gsm7(c, &mut septets));

        let (dcs, user_data_length, user_data): (u8, usize, Vec<u8>) = if gsm7 {
            let header_bits: usize = header.len() * 8;
            let header_septets: usize = (header_bits + 6) / 7;
            let length: usize = header_septets + septets.len();
            if length > MAX_GSM7_SEPTETS {
                return Err(EncodeError::SevenBitTooLong);
            }
            let mut packed: Vec<u8> = pack_septets(&septets, header_septets * 7);
            packed[..header.len()].copy_from_slice(&header);
            (0x00, length, packed)
        } else {
            let mut octets: Vec<u8> = header.clone();
            for unit in text.encode_utf16() {
                octets.extend(unit.to_be_bytes());
            }
            if octets.len() > MAX_UD_OCTETS {
                return Err(EncodeError::SixteenBitTooLong);
            }
            (0x08, octets.len(), octets)
        };

        let first_octet: u8 = if header.is_empty() { 0x01 } else { 0x41 };
        let bcd: Vec<u8> = swapped_bcd(digits);
        let mut tpdu: Vec<u8> = Vec::with_capacity(8 + bcd.len() + user_data.len());
        tpdu.extend([first_octet, 0x00, digits.len() as u8, kind]);
        tpdu.extend(bcd);
        tpdu.extend([0x00, dcs, user_data_length as u8]);
        tpdu.extend(user_data);

        let mut full: Vec<u8> = self.encode_service_center();
        full.extend(&tpdu);
        if full.len() * 2 > self.buffer_length {
            return Err(EncodeError::BufferTooSmall);
        }
        self.payload = to_hex(&full);
        Ok(tpdu.len())
    }

    fn payload(&self) -> &str {
        &self.payload
    }

    fn decode(&mut self, line: &str) -> Result<DeliveredSms, DecodeError> {
        let data: Vec<u8> = from_hex(line)?;
        let mut reader = Reader {
            data: &data,
            position: 0,
        };

        let sca_length: usize = usize::from(reader.byte()?);
        reader.take(sca_length)?;

        let first_octet: u8 = reader.byte()?;
        let has_header: bool = first_octet & 0x40 != 0;
        let (sender, dcs, timestamp) = match first_octet & 0x03 {
            // SMS-DELIVER
            0x00 => {
                let sender: String = read_address(&mut reader)?;
                let _pid: u8 = reader.byte()?;
                let dcs: u8 = reader.byte()?;
                let timestamp: String = read_timestamp(reader.take(7)?);
                (sender, dcs, timestamp)
            }
            // SMS-SUBMIT, as produced by `encode`
            0x01 => {
                let _reference: u8 = reader.byte()?;
                let recipient: String = read_address(&mut reader)?;
                let _pid: u8 = reader.byte()?;
                let dcs: u8 = reader.byte()?;
                match (first_octet >> 3) & 0x03 {
                    0x02 => {
                        reader.byte()?;
                    }
                    0x01 | 0x03 => {
                        reader.take(7)?;
                    }
                    _ => (),
                }
                (recipient, dcs, String::new())
            }
            other => return Err(DecodeError::UnexpectedMessageType(other)),
        };

        let user_data_length: usize = usize::from(reader.byte()?);
        let user_data: &[u8] = reader.rest();
        let header_octets: usize = match (has_header, user_data.first()) {
            (true, Some(length)) => usize::from(*length) + 1,
            (true, None) => return Err(DecodeError::Truncated),
            (false, _) => 0,
        };

        let (text, overflow): (String, bool) = match alphabet(dcs) {
            Alphabet::Gsm7 => {
                let needed: usize = (user_data_length * 7 + 7) / 8;
                let overflow: bool = user_data.len() < needed;
                let available: usize = user_data_length.min(user_data.len() * 8 / 7);
                let skip: usize = (header_octets * 8 + 6) / 7;
                (gsm7_to_text(&unpack_septets(user_data, skip, available)), overflow)
            }
            Alphabet::Ucs2 => {
                let overflow: bool = user_data.len() < user_data_length;
                let end: usize = user_data_length.min(user_data.len());
                let units: Vec<u16> = user_data
                    .get(header_octets.min(end)..end)
                    .unwrap_or_default()
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                let text: String = char::decode_utf16(units)
                    .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect();
                (text, overflow)
            }
            Alphabet::EightBit => return Err(DecodeError::UnsupportedAlphabet),
        };

        Ok(DeliveredSms {
            sender,
            timestamp,
            text,
            overflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference SMS-DELIVER from the SIM7000 manual: "hellohello" from +33607661264.
    const DELIVER_GSM7: &str = "07913396050066F0040B913306672146F00000328041102270800AE8329BFD4697D9EC37";

    #[test]
    fn decodes_reference_deliver() {
        let mut pdu = Pdu::default();
        let sms = pdu.decode(DELIVER_GSM7).unwrap();
        assert_eq!(sms.sender, "+33607612640");
        assert_eq!(sms.timestamp, "23/08/14,01:22:07+08");
        assert_eq!(sms.text, "hellohello");
        assert!(!sms.overflow);
    }

    #[test]
    fn encodes_plain_submit() {
        let mut pdu = Pdu::default();
        let length = pdu.encode("+33612345678", "hello", None).unwrap();
        assert_eq!(pdu.payload(), "0001000B913316325476F8000005E8329BFD06");
        assert_eq!(length, pdu.payload().len() / 2 - 1);
    }

    #[test]
    fn service_center_prefixes_payload() {
        let mut pdu = Pdu::default();
        pdu.set_service_center("+33609001390");
        let length = pdu.encode("0612345678", "hi", None).unwrap();
        assert!(pdu.payload().starts_with("07913306091093F0"));
        assert_eq!(length, pdu.payload().len() / 2 - 8);
    }

    #[test]
    fn round_trip_keeps_recipient_and_text() {
        let mut pdu = Pdu::default();
        pdu.set_service_center("+33609001390");
        for text in ["Plain text", "Brackets [x] {y} ~ € ^ |", "Ünïcødé ✓ ok", "ß à é ñ ¿¡"] {
            pdu.encode("+447700900123", text, None).unwrap();
            let sms = pdu.clone().decode(&pdu.payload().to_string()).unwrap();
            assert_eq!(sms.sender, "+447700900123");
            assert_eq!(sms.text, text);
        }
    }

    #[test]
    fn multipart_header_is_skipped_on_decode() {
        let mut pdu = Pdu::default();
        let text: String = "z".repeat(153);
        pdu.encode("+33612345678", &text, Some(Multipart { id: 0x1234, count: 2, index: 1 }))
            .unwrap();
        assert!(pdu.payload().contains("050003340201"));
        let sms = pdu.clone().decode(&pdu.payload().to_string()).unwrap();
        assert_eq!(sms.text, text);

        pdu.encode("+33612345678", "жж", Some(Multipart { id: 1, count: 2, index: 2 }))
            .unwrap();
        let sms = pdu.clone().decode(&pdu.payload().to_string()).unwrap();
        assert_eq!(sms.text, "жж");
    }

    #[test]
    fn encode_errors() {
        let mut pdu = Pdu::default();
        assert_eq!(pdu.encode("+33 6", "x", None), Err(EncodeError::AddressFormat));
        assert_eq!(pdu.encode("", "x", None), Err(EncodeError::AddressFormat));
        assert_eq!(
            pdu.encode("+336", "x", Some(Multipart { id: 1, count: 2, index: 3 })),
            Err(EncodeError::MultipartNumbering)
        );
        assert_eq!(
            pdu.encode("+336", &"x".repeat(161), None),
            Err(EncodeError::SevenBitTooLong)
        );
        assert_eq!(
            pdu.encode("+336", &"ж".repeat(71), None),
            Err(EncodeError::SixteenBitTooLong)
        );
        let mut tiny = Pdu::new(16);
        assert_eq!(tiny.encode("+336", "hello", None), Err(EncodeError::BufferTooSmall));
    }

    #[test]
    fn truncated_user_data_flags_overflow() {
        let mut pdu = Pdu::default();
        let truncated: &str = &DELIVER_GSM7[..DELIVER_GSM7.len() - 4];
        let sms = pdu.decode(truncated).unwrap();
        assert!(sms.overflow);
        assert!(sms.text.starts_with("hellohe"));
    }

    #[test]
    fn decode_rejects_garbage() {
        let mut pdu = Pdu::default();
        assert_eq!(pdu.decode("+CMT: ,33"), Err(DecodeError::NotHex));
        assert_eq!(pdu.decode("0791"), Err(DecodeError::Truncated));
        assert_eq!(pdu.decode("0002"), Err(DecodeError::UnexpectedMessageType(2)));
    }

    #[test]
    fn eight_bit_payload_is_unsupported() {
        let mut pdu = Pdu::default();
        // DELIVER, DCS 0x04
        let line = "00040B913306672146F00004328041102270800201FF";
        assert_eq!(pdu.decode(line), Err(DecodeError::UnsupportedAlphabet));
    }
}
