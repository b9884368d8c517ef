//! Reachability datagram and acknowledgement layout.
//!
//! ```text
//! request:  | packet id (u32 BE) | timestamp ms (u32 BE) | tag "Test_1\0" |
//! ack:      | packet id (u32 BE) | timestamp ms (u32 BE) | hold ms (u32 BE) |
//! ```
//!
//! The reflector copies the id and timestamp into its ack, so the prober can
//! match acks to requests and measure the round trip.

/// Tag carried by UDP reachability requests.
pub const UDP_REACHABILITY_TAG: &[u8; 7] = b"Test_1\0";

/// Prefix of the TCP echo buffer.
pub const TCP_REACHABILITY_TAG: &[u8; 6] = b"Test_2";

/// Size of the TCP echo exchange in each direction.
pub const TCP_ECHO_LEN: usize = 1500;

pub const REQUEST_LEN: usize = 15;
pub const ACK_LEN: usize = 12;

/// A UDP reachability request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub packet_id: u32,
    pub timestamp_ms: u32,
}

impl Request {
    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut buf = [0u8; REQUEST_LEN];
        buf[0..4].copy_from_slice(&self.packet_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp_ms.to_be_bytes());
        buf[8..15].copy_from_slice(UDP_REACHABILITY_TAG);
        buf
    }

    /// Decode a request, or `None` if the datagram is not one.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < REQUEST_LEN || &buf[8..15] != UDP_REACHABILITY_TAG {
            return None;
        }
        Some(Self {
            packet_id: read_u32(buf, 0),
            timestamp_ms: read_u32(buf, 4),
        })
    }
}

/// Acknowledgement for a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub packet_id: u32,
    pub timestamp_ms: u32,
    /// Time the reflector held the request before answering.
    pub hold_ms: u32,
}

impl Ack {
    pub fn for_request(request: &Request, hold_ms: u32) -> Self {
        Self {
            packet_id: request.packet_id,
            timestamp_ms: request.timestamp_ms,
            hold_ms,
        }
    }

    pub fn encode(&self) -> [u8; ACK_LEN] {
        let mut buf = [0u8; ACK_LEN];
        buf[0..4].copy_from_slice(&self.packet_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp_ms.to_be_bytes());
        buf[8..12].copy_from_slice(&self.hold_ms.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < ACK_LEN {
            return None;
        }
        Some(Self {
            packet_id: read_u32(buf, 0),
            timestamp_ms: read_u32(buf, 4),
            hold_ms: read_u32(buf, 8),
        })
    }
}

/// The buffer a TCP echo probe sends and expects back.
pub fn tcp_echo_payload() -> Vec<u8> {
    let mut buf = vec![0u8; TCP_ECHO_LEN];
    buf[..TCP_REACHABILITY_TAG.len()].copy_from_slice(TCP_REACHABILITY_TAG);
    buf
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let bytes = Request {
            packet_id: 0x0102_0304,
            timestamp_ms: 9,
        }
        .encode();
        assert_eq!(&bytes[0..4], &[1, 2, 3, 4]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 9]);
        assert_eq!(&bytes[8..], b"Test_1\0");
    }

    #[test]
    fn test_request_decode_rejects_foreign_datagrams() {
        assert!(Request::decode(b"short").is_none());
        assert!(Request::decode(&[0u8; 32]).is_none());
    }

    #[test]
    fn test_ack_echoes_request() {
        let request = Request {
            packet_id: 77,
            timestamp_ms: 1234,
        };
        let ack = Ack::decode(&Ack::for_request(&request, 3).encode()).unwrap();
        assert_eq!(ack.packet_id, 77);
        assert_eq!(ack.timestamp_ms, 1234);
        assert_eq!(ack.hold_ms, 3);
    }

    #[test]
    fn test_tcp_echo_payload() {
        let payload = tcp_echo_payload();
        assert_eq!(payload.len(), TCP_ECHO_LEN);
        assert!(payload.starts_with(b"Test_2"));
    }
}
