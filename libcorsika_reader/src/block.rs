use super::constants::*;

/// Where the caller currently is in the block structure of a file.
///
/// The readers need this to frame the next header correctly: EventIO sub-blocks
/// carry no sync marker, and raw shower payload may contain bit patterns that look
/// like an EVTH tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadState {
    #[default]
    ExpectTopLevel,
    ExpectSubBlock,
    InsideShowerPayload,
}

/// Explicit EventIO header of an object without a dedicated variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub type_code: u16,
    pub version: u16,
    pub identifier: u32,
    pub length: u32,
}

/// A decoded block header. The length is the number of payload bytes the caller
/// must consume before asking for the next header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockHeader {
    RunStart { length: u32 },
    RunEnd { length: u32 },
    EventStart { length: u32 },
    EventEnd { length: u32 },
    Payload { length: u32 },
    Object(ObjectHeader),
}

impl BlockHeader {
    /// Classify a fully unpacked header by its type code
    pub fn from_parts(type_code: u16, version: u16, identifier: u32, length: u32) -> Self {
        match type_code {
            TYPE_RUN_HEADER => Self::RunStart { length },
            TYPE_RUN_END => Self::RunEnd { length },
            TYPE_EVENT_HEADER => Self::EventStart { length },
            TYPE_EVENT_END => Self::EventEnd { length },
            TYPE_RAW_PAYLOAD => Self::Payload { length },
            _ => Self::Object(ObjectHeader {
                type_code,
                version,
                identifier,
                length,
            }),
        }
    }

    pub fn type_code(&self) -> u16 {
        match self {
            Self::RunStart { .. } => TYPE_RUN_HEADER,
            Self::RunEnd { .. } => TYPE_RUN_END,
            Self::EventStart { .. } => TYPE_EVENT_HEADER,
            Self::EventEnd { .. } => TYPE_EVENT_END,
            Self::Payload { .. } => TYPE_RAW_PAYLOAD,
            Self::Object(obj) => obj.type_code,
        }
    }

    pub fn length(&self) -> u32 {
        match self {
            Self::RunStart { length }
            | Self::RunEnd { length }
            | Self::EventStart { length }
            | Self::EventEnd { length }
            | Self::Payload { length } => *length,
            Self::Object(obj) => obj.length,
        }
    }
}
