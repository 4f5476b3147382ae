use byteorder::{ByteOrder, LittleEndian};

use super::block::{BlockHeader, ReadState};
use super::constants::*;
use super::error::BlockReadError;
use super::format::{BlockReader, FormatStream};

/// Split the type/version word of an EventIO header into (type, version)
pub fn unpack_type_version(word: u32) -> (u16, u16) {
    (
        (word & TYPE_MASK) as u16,
        ((word & VERSION_MASK) >> VERSION_SHIFT) as u16,
    )
}

pub fn pack_type_version(type_code: u16, version: u16) -> u32 {
    (type_code as u32) | (((version as u32) << VERSION_SHIFT) & VERSION_MASK)
}

/// The top two bits of the length word are flags, not length
pub fn unpack_length(word: u32) -> u32 {
    word & LENGTH_MASK
}

fn has_legacy_header(type_code: u16) -> bool {
    matches!(
        type_code,
        TYPE_RUN_HEADER | TYPE_RUN_END | TYPE_EVENT_HEADER | TYPE_EVENT_END
    )
}

/// Reader for the EventIO container layout used by CORSIKA's IACT option.
///
/// Top-level objects start with the sync marker followed by type/version,
/// identifier and length words. Objects nested inside a top-level object carry
/// the same three words but no sync marker.
#[derive(Debug)]
pub struct EventIoFormat {
    stream: FormatStream,
}

impl EventIoFormat {
    pub fn new(stream: FormatStream) -> Self {
        Self { stream }
    }

    /// Read `N` header words; a short read means the stream is finished
    fn read_header_words<const N: usize>(&mut self) -> Result<Option<[u32; N]>, BlockReadError> {
        let mut buffer = [0u8; 16];
        match self.stream.read_bytes(&mut buffer[..N * 4]) {
            Ok(()) => (),
            Err(BlockReadError::UnexpectedEof) => return Ok(None),
            Err(e) => return Err(e),
        }
        let mut words = [0u32; N];
        LittleEndian::read_u32_into(&buffer[..N * 4], &mut words);
        Ok(Some(words))
    }
}

impl BlockReader for EventIoFormat {
    fn next_block(&mut self, state: ReadState) -> Result<Option<BlockHeader>, BlockReadError> {
        if state == ReadState::ExpectSubBlock {
            let Some([type_word, identifier, length_word]) = self.read_header_words::<3>()? else {
                return Ok(None);
            };
            let (type_code, version) = unpack_type_version(type_word);
            return Ok(Some(BlockHeader::from_parts(
                type_code,
                version,
                identifier,
                unpack_length(length_word),
            )));
        }

        let Some([sync, type_word, identifier, length_word]) = self.read_header_words::<4>()?
        else {
            return Ok(None);
        };
        if sync != SYNC_MARKER {
            spdlog::error!("EventIO stream lost synchronisation, found {sync:#x}");
            return Err(BlockReadError::SyncMarkerMismatch(sync));
        }

        let (type_code, version) = unpack_type_version(type_word);
        let mut length = unpack_length(length_word);
        if has_legacy_header(type_code) {
            // Word count and tag of the classic CORSIKA block
            self.stream.skip(EVENTIO_LEGACY_BYTES as u64)?;
            length = length.saturating_sub(EVENTIO_LEGACY_BYTES);
        }
        Ok(Some(BlockHeader::from_parts(
            type_code, version, identifier, length,
        )))
    }

    fn seek_evt_end(&mut self) -> Result<bool, BlockReadError> {
        // RUNE is always the last, fixed size, object of the file
        if !self.stream.seek_before_end(EVENTIO_RUNE_SIZE)? {
            return Ok(false);
        }
        let Some([sync, type_word, _, length_word]) = self.read_header_words::<4>()? else {
            return Ok(false);
        };
        let (type_code, _) = unpack_type_version(type_word);
        if sync == SYNC_MARKER
            && type_code == TYPE_RUN_END
            && unpack_length(length_word) == EVENTIO_RUNE_LENGTH
        {
            self.stream.skip(EVENTIO_LEGACY_BYTES as u64)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn is_eventio_format(&self) -> bool {
        true
    }

    fn stream(&mut self) -> &mut FormatStream {
        &mut self.stream
    }
}
