use cascade_types::NodeAddr;

use crate::error::{ProtoError, ProtoResult};

/// Minimum encoded size of a [`FileInfo`] block (mode, offset, size,
/// empty name).
pub const FILE_INFO_MIN_SIZE: usize = 4 + 8 + 8 + 2;

/// Minimum encoded size of a lookup response (empty address, status).
pub const LOOKUP_MIN_SIZE: usize = 2 + 4;

/// Extended placement metadata, present only when the node has a file
/// record for the object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub mode: u32,
    pub offset: u64,
    pub size: u64,
    pub name: String,
}

/// Result of a lookup or write acknowledgement: where the object lives.
///
/// The wire form is layered: an address header, a command status, then an
/// optional [`FileInfo`] block that is only present when the response is
/// larger than the base layers. Absence of the extended block is valid and
/// means "no file metadata available".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupResult {
    /// Address of the node serving the object.
    pub addr: NodeAddr,
    pub status: i32,
    pub info: Option<FileInfo>,
}

impl LookupResult {
    pub fn new(addr: NodeAddr, status: i32, info: Option<FileInfo>) -> Self {
        Self { addr, status, info }
    }

    /// Encode the layered response.
    ///
    /// Layout, big-endian: `[2B addr len][addr][4B status]` and, when file
    /// metadata exists, `[4B mode][8B offset][8B size][2B name len][name]`.
    pub fn encode(&self) -> Vec<u8> {
        let addr = self.addr.as_str().as_bytes();
        let mut buf = Vec::with_capacity(LOOKUP_MIN_SIZE + addr.len());
        buf.extend_from_slice(&(addr.len() as u16).to_be_bytes());
        buf.extend_from_slice(addr);
        buf.extend_from_slice(&self.status.to_be_bytes());
        if let Some(info) = &self.info {
            buf.extend_from_slice(&info.mode.to_be_bytes());
            buf.extend_from_slice(&info.offset.to_be_bytes());
            buf.extend_from_slice(&info.size.to_be_bytes());
            let name = info.name.as_bytes();
            buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
            buf.extend_from_slice(name);
        }
        buf
    }

    /// Decode the layered response, bounds-checked at each layer.
    pub fn decode(buf: &[u8]) -> ProtoResult<Self> {
        if buf.len() < LOOKUP_MIN_SIZE {
            return Err(ProtoError::ShortEnvelope {
                actual: buf.len(),
                min: LOOKUP_MIN_SIZE,
            });
        }
        let addr_len = u16::from_be_bytes(buf[..2].try_into().expect("checked")) as usize;
        let mut at = 2;
        if buf.len() < at + addr_len + 4 {
            return Err(ProtoError::ShortEnvelope {
                actual: buf.len(),
                min: at + addr_len + 4,
            });
        }
        let addr = std::str::from_utf8(&buf[at..at + addr_len])
            .map_err(|_| ProtoError::InvalidUtf8 { field: "addr" })?
            .to_string();
        at += addr_len;
        let status = i32::from_be_bytes(buf[at..at + 4].try_into().expect("checked"));
        at += 4;

        // The extended block is only present when the remaining length
        // permits a complete FileInfo.
        let remaining = &buf[at..];
        let info = if remaining.len() >= FILE_INFO_MIN_SIZE {
            Some(Self::decode_file_info(remaining)?)
        } else if remaining.is_empty() {
            None
        } else {
            // A partial trailing block is malformed, not "absent".
            return Err(ProtoError::ShortEnvelope {
                actual: remaining.len(),
                min: FILE_INFO_MIN_SIZE,
            });
        };

        Ok(Self {
            addr: NodeAddr::new(addr),
            status,
            info,
        })
    }

    fn decode_file_info(buf: &[u8]) -> ProtoResult<FileInfo> {
        let mode = u32::from_be_bytes(buf[..4].try_into().expect("checked"));
        let offset = u64::from_be_bytes(buf[4..12].try_into().expect("checked"));
        let size = u64::from_be_bytes(buf[12..20].try_into().expect("checked"));
        let name_len = u16::from_be_bytes(buf[20..22].try_into().expect("checked")) as usize;
        if buf.len() < FILE_INFO_MIN_SIZE + name_len {
            return Err(ProtoError::ShortEnvelope {
                actual: buf.len(),
                min: FILE_INFO_MIN_SIZE + name_len,
            });
        }
        let name = std::str::from_utf8(&buf[22..22 + name_len])
            .map_err(|_| ProtoError::InvalidUtf8 { field: "name" })?
            .to_string();
        Ok(FileInfo {
            mode,
            offset,
            size,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LookupResult {
        LookupResult::new(
            NodeAddr::new("localhost:1025"),
            0,
            Some(FileInfo {
                mode: 0o644,
                offset: 0,
                size: 11,
                name: "2.xml".into(),
            }),
        )
    }

    #[test]
    fn roundtrip_with_file_info() {
        let lr = sample();
        let decoded = LookupResult::decode(&lr.encode()).unwrap();
        assert_eq!(decoded, lr);
    }

    #[test]
    fn roundtrip_without_file_info() {
        let lr = LookupResult::new(NodeAddr::new("127.0.0.1:1026"), 0, None);
        let decoded = LookupResult::decode(&lr.encode()).unwrap();
        assert_eq!(decoded, lr);
        assert!(decoded.info.is_none());
    }

    #[test]
    fn absent_extended_block_is_not_an_error() {
        let lr = LookupResult::new(NodeAddr::new("n"), -2, None);
        let decoded = LookupResult::decode(&lr.encode()).unwrap();
        assert_eq!(decoded.status, -2);
        assert!(decoded.info.is_none());
    }

    #[test]
    fn short_buffer_is_error() {
        let err = LookupResult::decode(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, ProtoError::ShortEnvelope { .. }));
    }

    #[test]
    fn truncated_address_is_error() {
        // Claims a 10-byte address but provides 2.
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u16.to_be_bytes());
        buf.extend_from_slice(b"ab");
        let err = LookupResult::decode(&buf).unwrap_err();
        assert!(matches!(err, ProtoError::ShortEnvelope { .. }));
    }

    #[test]
    fn partial_file_info_is_error() {
        let mut buf = LookupResult::new(NodeAddr::new("n"), 0, None).encode();
        buf.extend_from_slice(&[1, 2, 3]); // not enough for a FileInfo
        let err = LookupResult::decode(&buf).unwrap_err();
        assert!(matches!(err, ProtoError::ShortEnvelope { .. }));
    }

    #[test]
    fn truncated_name_is_error() {
        let lr = sample();
        let mut buf = lr.encode();
        buf.truncate(buf.len() - 3);
        let err = LookupResult::decode(&buf).unwrap_err();
        assert!(matches!(err, ProtoError::ShortEnvelope { .. }));
    }

    #[test]
    fn non_utf8_address_is_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&[0xff, 0xfe]);
        buf.extend_from_slice(&0i32.to_be_bytes());
        let err = LookupResult::decode(&buf).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidUtf8 { .. }));
    }
}
