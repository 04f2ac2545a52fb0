use crate::error::ChannelError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read, Write};
use strum::IntoStaticStr;

/// Version byte leading every frame
pub const FRAME_VERSION: u8 = 1;

/// Largest payload accepted for a single value (16MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Type tags for the values carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum ValueTag {
    Int = 0x01,
    Float = 0x02,
    Text = 0x03,
}

impl ValueTag {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl TryFrom<u8> for ValueTag {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ValueTag::Int),
            0x02 => Ok(ValueTag::Float),
            0x03 => Ok(ValueTag::Text),
            _ => Err(ChannelError::InvalidTag(value)),
        }
    }
}

/// A single protocol value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Int(_) => ValueTag::Int,
            Value::Float(_) => ValueTag::Float,
            Value::Text(_) => ValueTag::Text,
        }
    }

    /// Append this value as one frame: [version:u8][tag:u8][length:u32][payload...]
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        let payload: Vec<u8> = match self {
            Value::Int(v) => v.to_le_bytes().to_vec(),
            Value::Float(v) => v.to_bits().to_le_bytes().to_vec(),
            Value::Text(s) => s.as_bytes().to_vec(),
        };

        buffer.push(FRAME_VERSION);
        buffer.push(self.tag() as u8);
        buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buffer.extend_from_slice(&payload);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.encode_into(&mut buffer);
        buffer
    }

    /// Read exactly one frame from the reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ChannelError> {
        let mut header = [0u8; 6];
        reader.read_exact(&mut header)?;

        if header[0] != FRAME_VERSION {
            return Err(ChannelError::UnsupportedVersion(header[0]));
        }
        let tag = ValueTag::try_from(header[1])?;
        let payload_length = u32::from_le_bytes([header[2], header[3], header[4], header[5]]);

        let size_ok = match tag {
            ValueTag::Int | ValueTag::Float => payload_length == 8,
            ValueTag::Text => payload_length <= MAX_PAYLOAD_SIZE,
        };
        if !size_ok {
            return Err(ChannelError::InvalidPayloadSize {
                tag: tag.name(),
                size: payload_length,
            });
        }

        let mut payload = vec![0u8; payload_length as usize];
        if payload_length > 0 {
            reader.read_exact(&mut payload)?;
        }

        Self::from_payload(tag, payload)
    }

    fn from_payload(tag: ValueTag, payload: Vec<u8>) -> Result<Self, ChannelError> {
        match tag {
            ValueTag::Int => Ok(Value::Int(i64::from_le_bytes(fixed8(&payload)))),
            ValueTag::Float => Ok(Value::Float(f64::from_bits(u64::from_le_bytes(fixed8(
                &payload,
            ))))),
            ValueTag::Text => String::from_utf8(payload)
                .map(Value::Text)
                .map_err(|_| ChannelError::InvalidString),
        }
    }
}

fn fixed8(payload: &[u8]) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&payload[..8]);
    bytes
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Ordered send/receive of protocol values
///
/// Every request is written with a single `send_values` call and followed by
/// exactly the reads its operation declares.
pub trait Codec {
    /// Write the values in order and flush
    fn send_values(&mut self, values: &[Value]) -> Result<(), ChannelError>;

    /// Block until one complete value has been read
    fn receive_value(&mut self) -> Result<Value, ChannelError>;

    fn receive_text(&mut self) -> Result<String, ChannelError> {
        match self.receive_value()? {
            Value::Text(s) => Ok(s),
            other => Err(ChannelError::UnexpectedValue {
                expected: ValueTag::Text.name(),
                found: other.tag().name(),
            }),
        }
    }

    fn receive_int(&mut self) -> Result<i64, ChannelError> {
        match self.receive_value()? {
            Value::Int(v) => Ok(v),
            other => Err(ChannelError::UnexpectedValue {
                expected: ValueTag::Int.name(),
                found: other.tag().name(),
            }),
        }
    }

    fn receive_float(&mut self) -> Result<f64, ChannelError> {
        match self.receive_value()? {
            Value::Float(v) => Ok(v),
            other => Err(ChannelError::UnexpectedValue {
                expected: ValueTag::Float.name(),
                found: other.tag().name(),
            }),
        }
    }
}

/// Framed value connection over any byte stream
pub struct Connection<T: Read + Write> {
    stream: BufReader<T>,
}

impl<T: Read + Write> Connection<T> {
    pub fn new(transport: T) -> Self {
        Connection {
            stream: BufReader::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        self.stream.get_ref()
    }

    pub fn into_transport(self) -> T {
        self.stream.into_inner()
    }
}

impl<T: Read + Write> Codec for Connection<T> {
    fn send_values(&mut self, values: &[Value]) -> Result<(), ChannelError> {
        let mut bytes = Vec::new();
        for value in values {
            value.encode_into(&mut bytes);
        }
        debug!("📤 Sending {} values ({} bytes)", values.len(), bytes.len());

        let writer = self.stream.get_mut();
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    fn receive_value(&mut self) -> Result<Value, ChannelError> {
        let value = Value::read_from(&mut self.stream)?;
        debug!("📥 Received {} value", value.tag().name());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory duplex stream: reads from a fixed buffer, records writes
    struct MemoryStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MemoryStream {
        fn with_input(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for MemoryStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MemoryStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_frame_layout() {
        let bytes = Value::Text("OK".to_string()).to_bytes();
        assert_eq!(bytes, vec![1, 0x03, 2, 0, 0, 0, b'O', b'K']);

        let bytes = Value::Int(3).to_bytes();
        assert_eq!(&bytes[..6], &[1, 0x01, 8, 0, 0, 0]);
        assert_eq!(&bytes[6..], &3i64.to_le_bytes());
    }

    #[test]
    fn test_float_and_text_are_exact() {
        let radius = 0.1f64 + 0.2f64;
        let text = "1:Centroid=(val1 val2)\nüñí ✓";

        let mut input = Value::Float(radius).to_bytes();
        input.extend(Value::Text(text.to_string()).to_bytes());
        let mut connection = Connection::new(MemoryStream::with_input(input));

        let read_radius = connection.receive_float().unwrap();
        assert_eq!(read_radius.to_bits(), radius.to_bits());
        assert_eq!(connection.receive_text().unwrap(), text);
    }

    #[test]
    fn test_send_values_preserves_order() {
        let mut connection = Connection::new(MemoryStream::with_input(Vec::new()));
        connection
            .send_values(&[Value::Int(0), Value::from("Iris")])
            .unwrap();

        let mut expected = Value::Int(0).to_bytes();
        expected.extend(Value::from("Iris").to_bytes());
        assert_eq!(connection.transport().output, expected);
    }

    #[test]
    fn test_rejects_unknown_version_and_tag() {
        let mut reader = Cursor::new(vec![2, 0x03, 0, 0, 0, 0]);
        assert!(matches!(
            Value::read_from(&mut reader),
            Err(ChannelError::UnsupportedVersion(2))
        ));

        let mut reader = Cursor::new(vec![1, 0x7f, 0, 0, 0, 0]);
        assert!(matches!(
            Value::read_from(&mut reader),
            Err(ChannelError::InvalidTag(0x7f))
        ));
    }

    #[test]
    fn test_rejects_bad_numeric_length() {
        let mut reader = Cursor::new(vec![1, 0x01, 4, 0, 0, 0, 1, 2, 3, 4]);
        assert!(matches!(
            Value::read_from(&mut reader),
            Err(ChannelError::InvalidPayloadSize { tag: "int", size: 4 })
        ));
    }

    #[test]
    fn test_rejects_oversized_text() {
        let mut frame = vec![1, 0x03];
        frame.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_le_bytes());
        let mut reader = Cursor::new(frame);
        assert!(matches!(
            Value::read_from(&mut reader),
            Err(ChannelError::InvalidPayloadSize { tag: "text", .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let mut reader = Cursor::new(vec![1, 0x03, 2, 0, 0, 0, 0xff, 0xfe]);
        assert!(matches!(
            Value::read_from(&mut reader),
            Err(ChannelError::InvalidString)
        ));
    }

    #[test]
    fn test_truncated_frame_is_closed_channel() {
        let mut frame = Value::from("truncated").to_bytes();
        frame.truncate(frame.len() - 3);
        let mut connection = Connection::new(MemoryStream::with_input(frame));
        assert!(matches!(
            connection.receive_value(),
            Err(ChannelError::Closed)
        ));
    }

    #[test]
    fn test_typed_read_fails_on_mismatch() {
        let input = Value::Int(7).to_bytes();
        let mut connection = Connection::new(MemoryStream::with_input(input));
        match connection.receive_text() {
            Err(ChannelError::UnexpectedValue { expected, found }) => {
                assert_eq!(expected, "text");
                assert_eq!(found, "int");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_value_json_forms() {
        let values: Vec<Value> = serde_json::from_str(r#"["OK", 3, 1.5]"#).unwrap();
        assert_eq!(
            values,
            vec![Value::from("OK"), Value::Int(3), Value::Float(1.5)]
        );
    }
}
