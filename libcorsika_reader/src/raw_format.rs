use super::block::{BlockHeader, ReadState};
use super::constants::*;
use super::error::BlockReadError;
use super::format::{BlockReader, FormatStream};

/// Reader for the raw CORSIKA layout.
///
/// Raw files are a sequence of 273 word sub-blocks. Header sub-blocks start with
/// an ASCII tag (RUNH, EVTH, EVTE, RUNE) followed by 272 words; shower payload
/// sub-blocks have no tag at all. Fortran record length words may appear
/// between sub-blocks and are dropped.
#[derive(Debug)]
pub struct RawFormat {
    stream: FormatStream,
    has_magic_number: bool,
}

impl RawFormat {
    /// `has_magic_number` records whether the file started with the magic-number
    /// prefix; it shifts the trailer search by one word.
    pub fn new(stream: FormatStream, has_magic_number: bool) -> Self {
        Self {
            stream,
            has_magic_number,
        }
    }

    pub fn has_magic_number(&self) -> bool {
        self.has_magic_number
    }
}

/// Distance in bytes from the end of the file to the n-th trailer candidate (n >= 1)
pub fn trailer_offset(stride: u64, has_magic_number: bool) -> u64 {
    stride * SUB_BLOCK_SIZE + if has_magic_number { WORD_SIZE } else { 0 }
}

impl BlockReader for RawFormat {
    fn next_block(&mut self, state: ReadState) -> Result<Option<BlockHeader>, BlockReadError> {
        let tag = loop {
            match self.stream.read_u32() {
                Ok(RAW_FILLER) => continue,
                Ok(word) => break word,
                Err(BlockReadError::UnexpectedEof) => return Ok(None),
                Err(e) => return Err(e),
            }
        };

        let header = match tag {
            TAG_RUNH => BlockHeader::RunStart { length: BLOCK_SIZE },
            TAG_RUNE => BlockHeader::RunEnd { length: BLOCK_SIZE },
            TAG_EVTH if state != ReadState::InsideShowerPayload => {
                BlockHeader::EventStart { length: BLOCK_SIZE }
            }
            TAG_EVTE => BlockHeader::EventEnd { length: BLOCK_SIZE },
            // Shower data has no tag; the word belongs to the payload
            _ => {
                self.stream.unread_word()?;
                BlockHeader::Payload {
                    length: BLOCK_SIZE + WORD_SIZE as u32,
                }
            }
        };
        Ok(Some(header))
    }

    fn seek_evt_end(&mut self) -> Result<bool, BlockReadError> {
        for stride in 1..=MAX_TRAILER_STRIDES {
            if !self
                .stream
                .seek_before_end(trailer_offset(stride, self.has_magic_number))?
            {
                break;
            }
            match self.stream.read_u32() {
                Ok(TAG_RUNE) => return Ok(true),
                Ok(_) => continue,
                Err(BlockReadError::UnexpectedEof) => continue,
                Err(e) => return Err(e),
            }
        }
        spdlog::debug!(
            "No RUNE found within the last {} sub-blocks",
            MAX_TRAILER_STRIDES
        );
        Ok(false)
    }

    fn is_eventio_format(&self) -> bool {
        false
    }

    fn stream(&mut self) -> &mut FormatStream {
        &mut self.stream
    }
}
