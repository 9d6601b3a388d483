//! Account transactions and message header matching
//!
//! Every operation body starts with a 32-bit opcode followed by a 64-bit
//! query id. The query id carries the correlation id of a submitted
//! operation and is echoed back by the contracts.

use hipo_core::{Address, CorrelationId, Nano, UnixTime};

/// Length of the `opcode | query_id` prefix in bytes
pub const HEADER_LEN: usize = 12;

/// Opcode and correlation id at the front of a message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHeader {
    pub opcode: u32,
    pub correlation_id: CorrelationId,
}

impl MessageHeader {
    pub fn new(opcode: u32, correlation_id: CorrelationId) -> Self {
        Self {
            opcode,
            correlation_id,
        }
    }

    /// Parse the header from a raw body; `None` if the body is too short
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < HEADER_LEN {
            return None;
        }
        let opcode = u32::from_be_bytes(body[0..4].try_into().ok()?);
        let query_id = u64::from_be_bytes(body[4..12].try_into().ok()?);
        Some(Self::new(opcode, CorrelationId(query_id)))
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.opcode.to_be_bytes());
        out[4..12].copy_from_slice(&self.correlation_id.0.to_be_bytes());
        out
    }
}

/// An inbound or outbound message of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: Option<Address>,
    pub destination: Option<Address>,
    pub value: Nano,
    pub body: Vec<u8>,
}

impl Message {
    pub fn header(&self) -> Option<MessageHeader> {
        MessageHeader::parse(&self.body)
    }

    pub fn matches(&self, header: &MessageHeader) -> bool {
        self.header().as_ref() == Some(header)
    }
}

/// Position in an account's transaction list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCursor {
    pub lt: u64,
    pub hash: String,
}

/// A transaction of the watched account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub lt: u64,
    pub hash: String,
    pub now: UnixTime,
    pub in_message: Option<Message>,
    pub out_messages: Vec<Message>,
}

impl Transaction {
    pub fn cursor(&self) -> TxCursor {
        TxCursor {
            lt: self.lt,
            hash: self.hash.clone(),
        }
    }

    /// The account sent a message carrying this header
    pub fn has_outgoing(&self, header: &MessageHeader) -> bool {
        self.out_messages.iter().any(|m| m.matches(header))
    }

    /// The account received a message carrying this header
    pub fn has_incoming(&self, header: &MessageHeader) -> bool {
        self.in_message.as_ref().is_some_and(|m| m.matches(header))
    }
}
