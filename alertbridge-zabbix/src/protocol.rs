use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Magic bytes at the start of every frame.
pub const HEADER_MAGIC: &[u8; 4] = b"ZBXD";

/// Protocol flag marking a regular Zabbix frame.
pub const FLAG_PROTOCOL: u8 = 0x01;

/// Protocol flag marking a compressed payload.
pub const FLAG_COMPRESSED: u8 = 0x02;

/// Size of the frame header: magic, flags and the payload length.
pub const HEADER_SIZE: usize = 13;

/// Maximum size of a response payload that is accepted from the server.
pub const MAX_RESPONSE_SIZE: u64 = 16 * 1024 * 1024;

/// The request type of a sender packet.
const SENDER_REQUEST: &str = "sender data";

/// A single value for a trapper item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Technical name of the host the item belongs to.
    pub host: String,
    /// Key of the trapper item.
    pub key: String,
    /// The value in its string representation.
    pub value: String,
    /// Unix timestamp in seconds at which the value was observed.
    ///
    /// If not set, the server uses the time of arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<i64>,
}

impl Metric {
    /// Creates a new metric without a timestamp.
    pub fn new(host: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            key: key.into(),
            value: value.into(),
            clock: None,
        }
    }

    /// Sets the unix timestamp of this metric.
    pub fn with_clock(mut self, clock: i64) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// A batch of metrics as sent to the server.
#[derive(Debug, Serialize)]
pub struct Packet<'a> {
    request: &'static str,
    data: &'a [Metric],
    clock: i64,
}

impl<'a> Packet<'a> {
    /// Creates a sender packet for the given metrics, sent at `clock`.
    pub fn new(data: &'a [Metric], clock: i64) -> Self {
        Self {
            request: SENDER_REQUEST,
            data,
            clock,
        }
    }

    /// Serializes the packet and wraps it in a frame.
    pub fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        let payload = serde_json::to_vec(self)?;
        Ok(encode_frame(&payload))
    }
}

/// Wraps a payload in a frame with the `ZBXD` header.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_slice(HEADER_MAGIC);
    frame.put_u8(FLAG_PROTOCOL);
    frame.put_u64_le(payload.len() as u64);
    frame.put_slice(payload);
    frame.freeze()
}

/// Errors when reading a frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// The frame does not start with `ZBXD`.
    #[error("invalid frame header")]
    InvalidMagic,
    /// The payload is compressed, which is not supported.
    #[error("compressed frames are not supported")]
    Compressed,
    /// The announced payload exceeds [`MAX_RESPONSE_SIZE`].
    #[error("frame payload of {0} bytes exceeds the maximum size")]
    TooLarge(u64),
}

/// Validates a frame header and returns the length of the payload that follows.
pub fn decode_header(header: &[u8; HEADER_SIZE]) -> Result<u64, HeaderError> {
    if &header[..4] != HEADER_MAGIC {
        return Err(HeaderError::InvalidMagic);
    }

    if header[4] & FLAG_COMPRESSED != 0 {
        return Err(HeaderError::Compressed);
    }

    let mut length = [0; 8];
    length.copy_from_slice(&header[5..]);
    let length = u64::from_le_bytes(length);

    if length > MAX_RESPONSE_SIZE {
        return Err(HeaderError::TooLarge(length));
    }

    Ok(length)
}

/// The answer of the server to a sender packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// `"success"` if the packet was accepted.
    pub response: String,
    /// Processing summary of the server.
    #[serde(default)]
    pub info: String,
}

impl Response {
    /// Returns `true` if the server accepted the packet.
    pub fn is_success(&self) -> bool {
        self.response == "success"
    }

    /// Parses the processing summary, if it is in the known format.
    pub fn info(&self) -> Option<ResponseInfo> {
        self.info.parse().ok()
    }
}

/// Processing summary of a sender packet.
///
/// Parsed from the server's `info` string, which looks like
/// `processed: 1; failed: 0; total: 1; seconds spent: 0.000055`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResponseInfo {
    /// Number of values the server accepted.
    pub processed: u64,
    /// Number of values the server rejected, for example because the item does not exist.
    pub failed: u64,
    /// Total number of values in the packet.
    pub total: u64,
    /// Time the server spent processing, in seconds.
    pub seconds_spent: f64,
}

/// Error parsing a [`ResponseInfo`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid response info: {0:?}")]
pub struct ParseInfoError(String);

impl std::str::FromStr for ResponseInfo {
    type Err = ParseInfoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseInfoError(s.to_owned());
        let mut info = Self::default();

        for part in s.split(';') {
            let (name, value) = part.split_once(':').ok_or_else(error)?;
            let value = value.trim();

            match name.trim() {
                "processed" => info.processed = value.parse().map_err(|_| error())?,
                "failed" => info.failed = value.parse().map_err(|_| error())?,
                "total" => info.total = value.parse().map_err(|_| error())?,
                "seconds spent" => info.seconds_spent = value.parse().map_err(|_| error())?,
                _ => (),
            }
        }

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;

    use super::*;

    #[test]
    fn test_packet_serialization() {
        let metrics = [
            Metric::new("web-1", "prometheus.highcpu", "1").with_clock(1_700_000_000),
            Metric::new("db-1", "prometheus.diskfull", "0"),
        ];

        assert_json_snapshot!(Packet::new(&metrics, 1_700_000_005), @r#"
        {
          "request": "sender data",
          "data": [
            {
              "host": "web-1",
              "key": "prometheus.highcpu",
              "value": "1",
              "clock": 1700000000
            },
            {
              "host": "db-1",
              "key": "prometheus.diskfull",
              "value": "0"
            }
          ],
          "clock": 1700000005
        }
        "#);
    }

    #[test]
    fn test_frame_header() {
        let metrics = [Metric::new("web-1", "prometheus.up", "1")];
        let packet = Packet::new(&metrics, 0);
        let frame = packet.to_frame().unwrap();
        let payload = serde_json::to_vec(&packet).unwrap();

        assert_eq!(&frame[..5], b"ZBXD\x01");
        assert_eq!(&frame[5..13], (payload.len() as u64).to_le_bytes());
        assert_eq!(&frame[13..], payload.as_slice());
    }

    #[test]
    fn test_decode_header() {
        let frame = encode_frame(b"{}");
        let header: [u8; HEADER_SIZE] = frame[..HEADER_SIZE].try_into().unwrap();
        assert_eq!(decode_header(&header), Ok(2));
    }

    #[test]
    fn test_decode_header_rejects() {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(b"HTTP");
        assert_eq!(decode_header(&header), Err(HeaderError::InvalidMagic));

        header[..4].copy_from_slice(HEADER_MAGIC);
        header[4] = FLAG_PROTOCOL | FLAG_COMPRESSED;
        assert_eq!(decode_header(&header), Err(HeaderError::Compressed));

        header[4] = FLAG_PROTOCOL;
        header[5..].copy_from_slice(&(MAX_RESPONSE_SIZE + 1).to_le_bytes());
        assert_eq!(
            decode_header(&header),
            Err(HeaderError::TooLarge(MAX_RESPONSE_SIZE + 1))
        );
    }

    #[test]
    fn test_response_info() {
        let response: Response = serde_json::from_str(
            r#"{"response":"success","info":"processed: 2; failed: 1; total: 3; seconds spent: 0.000055"}"#,
        )
        .unwrap();

        assert!(response.is_success());
        similar_asserts::assert_eq!(
            response.info(),
            Some(ResponseInfo {
                processed: 2,
                failed: 1,
                total: 3,
                seconds_spent: 0.000055,
            })
        );
    }

    #[test]
    fn test_response_info_unknown_format() {
        let response = Response {
            response: "failed".to_owned(),
            info: "cannot parse".to_owned(),
        };

        assert!(!response.is_success());
        assert_eq!(response.info(), None);
    }
}
