//! Common Packet Format and CIP Message Router Requests
//!
//! SendRRData and SendUnitData carry their payload in the common packet
//! format (CPF):
//!
//! ```text
//! interface handle   u32
//! timeout            u16
//! item count         u16
//! item[0..count]     type id u16 | length u16 | data[length]
//! ```
//!
//! An Unconnected Data item (0x00B2) holds a CIP Message Router request;
//! a Connected Data item (0x00B1) holds a 16-bit sequence count followed by
//! the request. Decoding the request is a third, independent layer: a
//! malformed request never invalidates the items around it.

use crate::protocol::wire::{WireError, WireReader};
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Common packet item type ids
pub mod item_id {
    pub const NULL_ADDRESS: u16 = 0x0000;
    pub const LIST_IDENTITY: u16 = 0x000C;
    pub const CONNECTED_ADDRESS: u16 = 0x00A1;
    pub const CONNECTED_DATA: u16 = 0x00B1;
    pub const UNCONNECTED_DATA: u16 = 0x00B2;
    pub const LIST_SERVICES: u16 = 0x0100;
    pub const SOCKADDR_O_TO_T: u16 = 0x8000;
    pub const SOCKADDR_T_TO_O: u16 = 0x8001;
    pub const SEQUENCED_ADDRESS: u16 = 0x8002;
}

/// Errors from the common packet and message router layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CpfError {
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Bytes left over after the last declared item
    #[error("{0} trailing bytes after the last item")]
    TrailingBytes(usize),

    /// Message router request path runs past the end of the item
    #[error("request path of {words} words exceeds item data")]
    PathOverrun { words: u8 },
}

/// Failures while serializing a common packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{0} items do not fit the 16-bit item count")]
    TooManyItems(usize),

    #[error("item {type_id:#06x} data of {len} bytes does not fit the 16-bit length field")]
    ItemTooLarge { type_id: u16, len: usize },
}

/// One type-tagged, length-prefixed element of a common packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonPacketItem {
    pub type_id: u16,
    pub data: Bytes,
}

impl CommonPacketItem {
    pub fn new(type_id: u16, data: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            data: data.into(),
        }
    }

    /// Decodes the message router request carried by a data item.
    ///
    /// Returns `None` for items that do not carry one.
    pub fn message_request(&self) -> Option<Result<MessageRouterRequest, CpfError>> {
        match self.type_id {
            item_id::UNCONNECTED_DATA => Some(MessageRouterRequest::decode(&self.data)),
            item_id::CONNECTED_DATA => {
                let mut reader = WireReader::new(&self.data);
                Some(
                    reader
                        .u16_le()
                        .map_err(CpfError::from)
                        .and_then(|_sequence| MessageRouterRequest::decode(reader.rest())),
                )
            }
            _ => None,
        }
    }
}

/// A count-prefixed list of common packet items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonPacket {
    pub items: Vec<CommonPacketItem>,
}

impl CommonPacket {
    /// Decodes a complete common packet; trailing bytes are an error.
    pub fn decode(buf: &[u8]) -> Result<Self, CpfError> {
        let mut reader = WireReader::new(buf);
        let packet = Self::decode_from(&mut reader)?;

        if !reader.is_empty() {
            return Err(CpfError::TrailingBytes(reader.remaining()));
        }
        Ok(packet)
    }

    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, CpfError> {
        let count = usize::from(reader.u16_le()?);

        // Every item needs at least its 4-byte prefix
        let mut items = Vec::with_capacity(count.min(reader.remaining() / 4));
        for _ in 0..count {
            let type_id = reader.u16_le()?;
            let length = usize::from(reader.u16_le()?);
            let data = reader.take(length)?;
            items.push(CommonPacketItem::new(type_id, Bytes::copy_from_slice(data)));
        }

        Ok(Self { items })
    }

    /// Appends the packet to `buf`; nothing is written if a count or length
    /// overflows its field.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let count = u16::try_from(self.items.len())
            .map_err(|_| EncodeError::TooManyItems(self.items.len()))?;
        let lengths = self
            .items
            .iter()
            .map(|item| {
                u16::try_from(item.data.len()).map_err(|_| EncodeError::ItemTooLarge {
                    type_id: item.type_id,
                    len: item.data.len(),
                })
            })
            .collect::<Result<Vec<u16>, EncodeError>>()?;

        buf.put_u16_le(count);
        for (item, length) in self.items.iter().zip(lengths) {
            buf.put_u16_le(item.type_id);
            buf.put_u16_le(length);
            buf.put_slice(&item.data);
        }
        Ok(())
    }

    pub fn item(&self, type_id: u16) -> Option<&CommonPacketItem> {
        self.items.iter().find(|item| item.type_id == type_id)
    }
}

/// Command data of SendRRData / SendUnitData.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendData {
    pub interface_handle: u32,
    pub timeout: u16,
    pub packet: CommonPacket,
}

impl SendData {
    pub fn decode(buf: &[u8]) -> Result<Self, CpfError> {
        let mut reader = WireReader::new(buf);
        let interface_handle = reader.u32_le()?;
        let timeout = reader.u16_le()?;
        let packet = CommonPacket::decode(reader.rest())?;

        Ok(Self {
            interface_handle,
            timeout,
            packet,
        })
    }

    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.interface_handle);
        buf.put_u16_le(self.timeout);
        self.packet.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// A CIP Message Router request: service, EPATH, request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRouterRequest {
    pub service: u8,
    pub path: Bytes,
    pub data: Bytes,
}

impl MessageRouterRequest {
    pub fn decode(buf: &[u8]) -> Result<Self, CpfError> {
        let mut reader = WireReader::new(buf);
        let service = reader.u8()?;
        let words = reader.u8()?;
        let path = reader
            .take(usize::from(words) * 2)
            .map_err(|_| CpfError::PathOverrun { words })?;

        Ok(Self {
            service,
            path: Bytes::copy_from_slice(path),
            data: Bytes::copy_from_slice(reader.rest()),
        })
    }

    pub fn service_name(&self) -> &'static str {
        service_name(self.service)
    }
}

/// Human-readable name of a CIP service code, for logging.
pub fn service_name(service: u8) -> &'static str {
    match service & 0x7F {
        0x01 => "GetAttributesAll",
        0x02 => "SetAttributesAll",
        0x05 => "Reset",
        0x06 => "Start",
        0x07 => "Stop",
        0x0E => "GetAttributeSingle",
        0x10 => "SetAttributeSingle",
        0x4E => "ForwardClose",
        0x52 => "UnconnectedSend",
        0x54 => "ForwardOpen",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SendRRData body: Get_Attribute_Single on Identity(1)/Instance(1)/Attr(1)
    fn send_rr_data_body() -> Vec<u8> {
        SendData {
            interface_handle: 0,
            timeout: 10,
            packet: CommonPacket {
                items: vec![
                    CommonPacketItem::new(item_id::NULL_ADDRESS, Bytes::new()),
                    CommonPacketItem::new(
                        item_id::UNCONNECTED_DATA,
                        Bytes::from_static(&[0x0E, 0x03, 0x20, 0x01, 0x24, 0x01, 0x30, 0x01]),
                    ),
                ],
            },
        }
        .encode()
        .unwrap()
        .to_vec()
    }

    #[test]
    fn test_decode_send_rr_data() {
        let send = SendData::decode(&send_rr_data_body()).unwrap();
        assert_eq!(send.timeout, 10);
        assert_eq!(send.packet.items.len(), 2);

        let item = send.packet.item(item_id::UNCONNECTED_DATA).unwrap();
        let request = item.message_request().unwrap().unwrap();
        assert_eq!(request.service, 0x0E);
        assert_eq!(request.service_name(), "GetAttributeSingle");
        assert_eq!(&request.path[..], &[0x20, 0x01, 0x24, 0x01, 0x30, 0x01]);
        assert!(request.data.is_empty());
    }

    #[test]
    fn test_item_length_overrun() {
        // count=1, type=0xB2, length=16, only 2 data bytes
        let input = [0x01, 0x00, 0xB2, 0x00, 0x10, 0x00, 0xAA, 0xBB];
        assert!(matches!(
            CommonPacket::decode(&input),
            Err(CpfError::Wire(WireError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_huge_count_does_not_preallocate() {
        let input = [0xFF, 0xFF];
        assert!(CommonPacket::decode(&input).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let input = [0x00, 0x00, 0x99];
        assert_eq!(
            CommonPacket::decode(&input),
            Err(CpfError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_connected_data_skips_sequence_count() {
        let item = CommonPacketItem::new(
            item_id::CONNECTED_DATA,
            Bytes::from_static(&[0x07, 0x00, 0x01, 0x00]),
        );
        let request = item.message_request().unwrap().unwrap();
        assert_eq!(request.service, 0x01);
        assert!(request.path.is_empty());
    }

    #[test]
    fn test_path_overrun() {
        let item = CommonPacketItem::new(
            item_id::UNCONNECTED_DATA,
            Bytes::from_static(&[0x0E, 0x05, 0x20]),
        );
        assert_eq!(
            item.message_request().unwrap(),
            Err(CpfError::PathOverrun { words: 5 })
        );
    }

    #[test]
    fn test_oversized_item_is_rejected() {
        let packet = CommonPacket {
            items: vec![CommonPacketItem::new(
                item_id::UNCONNECTED_DATA,
                vec![0u8; 70_000],
            )],
        };
        let mut buf = BytesMut::new();
        assert_eq!(
            packet.encode_into(&mut buf),
            Err(EncodeError::ItemTooLarge {
                type_id: item_id::UNCONNECTED_DATA,
                len: 70_000,
            })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_too_many_items_is_rejected() {
        let send = SendData {
            packet: CommonPacket {
                items: vec![CommonPacketItem::new(item_id::NULL_ADDRESS, Bytes::new()); 70_000],
            },
            ..SendData::default()
        };
        assert_eq!(send.encode(), Err(EncodeError::TooManyItems(70_000)));
    }

    #[test]
    fn test_address_items_have_no_request() {
        let item = CommonPacketItem::new(item_id::NULL_ADDRESS, Bytes::new());
        assert!(item.message_request().is_none());
    }
}
