use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use super::block::{BlockHeader, ReadState};
use super::constants::{GZIP_MEMORY_WARN_SIZE, MAGIC_NUMBER, SYNC_MARKER, TAG_RUNH, WORD_SIZE};
use super::error::{BlockReadError, CorsikaFormatError};
use super::eventio_format::EventIoFormat;
use super::raw_format::RawFormat;

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// The byte stream underneath a format reader.
///
/// Owns the opened file (or the in-memory copy of a decompressed one) for the
/// lifetime of the reader, behind a read buffer. The total length is taken once at
/// construction and the position is tracked here, so end-of-file and progress
/// queries never touch the underlying file. Short forward skips and unreads stay
/// inside the buffer.
pub struct FormatStream {
    inner: BufReader<Box<dyn ReadSeek + Send>>,
    length: u64,
    position: u64,
}

impl std::fmt::Debug for FormatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatStream")
            .field("length", &self.length)
            .field("position", &self.position)
            .finish()
    }
}

impl FormatStream {
    pub fn new(mut inner: Box<dyn ReadSeek + Send>) -> Result<Self, BlockReadError> {
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: BufReader::new(inner),
            length,
            position: 0,
        })
    }

    /// Wrap an in-memory buffer, mostly useful for tests and decompressed input
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BlockReadError> {
        Self::new(Box::new(Cursor::new(bytes)))
    }

    /// Account for a read of `n_bytes`. A failed read leaves the position
    /// undefined, so it is asked from the stream again.
    fn advance<T>(
        &mut self,
        result: std::io::Result<T>,
        n_bytes: u64,
    ) -> Result<T, BlockReadError> {
        match result {
            Ok(value) => {
                self.position += n_bytes;
                Ok(value)
            }
            Err(e) => {
                self.position = self.inner.stream_position().unwrap_or(self.length);
                Err(e.into())
            }
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, BlockReadError> {
        let result = self.inner.read_u32::<LittleEndian>();
        self.advance(result, WORD_SIZE as u64)
    }

    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<(), BlockReadError> {
        let result = self.inner.read_exact(buffer);
        self.advance(result, buffer.len() as u64)
    }

    pub fn read_floats(&mut self, n_words: usize) -> Result<Vec<f32>, BlockReadError> {
        let mut words = vec![0.0; n_words];
        let result = self.inner.read_f32_into::<LittleEndian>(&mut words);
        self.advance(result, n_words as u64 * WORD_SIZE)?;
        Ok(words)
    }

    /// Move forward by n bytes. Skipping past the end of the stream is a short read.
    pub fn skip(&mut self, n_bytes: u64) -> Result<(), BlockReadError> {
        if self.position + n_bytes > self.length {
            self.inner.seek(SeekFrom::End(0))?;
            self.position = self.length;
            return Err(BlockReadError::UnexpectedEof);
        }
        self.inner.seek_relative(n_bytes as i64)?;
        self.position += n_bytes;
        Ok(())
    }

    /// Step back over the word that was just read
    pub fn unread_word(&mut self) -> Result<(), BlockReadError> {
        self.inner.seek_relative(-(WORD_SIZE as i64))?;
        self.position = self.position.saturating_sub(WORD_SIZE as u64);
        Ok(())
    }

    /// Seek to `offset` bytes before the end of the stream.
    ///
    /// Returns false, without moving, if the stream is shorter than `offset`.
    pub fn seek_before_end(&mut self, offset: u64) -> Result<bool, BlockReadError> {
        if offset > self.length {
            return Ok(false);
        }
        self.position = self.inner.seek(SeekFrom::Start(self.length - offset))?;
        Ok(true)
    }

    pub fn seek_start(&mut self) -> Result<(), BlockReadError> {
        self.position = self.inner.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.length
    }
}

/// Block framing for one of the two CORSIKA encodings.
///
/// A reader is chosen once per file by [`corsika_format_factory`]; afterwards the
/// caller alternates between [`BlockReader::next_block`] and reading exactly the
/// returned number of payload bytes.
pub trait BlockReader: Send + std::fmt::Debug {
    /// Read the next block header.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before a new header.
    fn next_block(&mut self, state: ReadState) -> Result<Option<BlockHeader>, BlockReadError>;

    /// Position the stream at the payload of the RUNE trailer by seeking backward
    /// from the end of the file.
    ///
    /// Returns false if no trailer was found in the search window. This moves the
    /// stream; do not mix it with an ongoing sequential block iteration.
    fn seek_evt_end(&mut self) -> Result<bool, BlockReadError>;

    fn is_eventio_format(&self) -> bool;

    fn stream(&mut self) -> &mut FormatStream;

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<(), BlockReadError> {
        self.stream().read_bytes(buffer)
    }

    fn read_floats(&mut self, n_words: usize) -> Result<Vec<f32>, BlockReadError> {
        self.stream().read_floats(n_words)
    }

    fn skip(&mut self, n_bytes: u64) -> Result<(), BlockReadError> {
        self.stream().skip(n_bytes)
    }

    fn is_eof(&mut self) -> Result<bool, BlockReadError> {
        Ok(self.stream().is_eof())
    }

    fn rewind(&mut self) -> Result<(), BlockReadError> {
        self.stream().seek_start()
    }
}

/// Open a CORSIKA file and select the matching block reader.
///
/// Files ending in `.gz` are decompressed into memory first so the reader can
/// still seek. Failures are logged with the file name before being returned.
pub fn corsika_format_factory(path: &Path) -> Result<Box<dyn BlockReader>, CorsikaFormatError> {
    let result = open_stream(path).and_then(|stream| detect_format(stream, path));
    if let Err(e) = &result {
        spdlog::error!("{e}");
    }
    result
}

fn open_stream(path: &Path) -> Result<FormatStream, CorsikaFormatError> {
    let file = File::open(path).map_err(|e| CorsikaFormatError::OpenFailed(path.to_path_buf(), e))?;
    let is_gzip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gzip {
        let mut bytes = Vec::new();
        GzDecoder::new(BufReader::new(file))
            .read_to_end(&mut bytes)
            .map_err(|e| CorsikaFormatError::DecompressionFailed(path.to_path_buf(), e))?;
        log_decompressed_size(path, bytes.len() as u64);
        Ok(FormatStream::from_bytes(bytes)?)
    } else {
        Ok(FormatStream::new(Box::new(file))?)
    }
}

/// Whether a decompressed input is large enough to warn about the memory it holds
fn is_large_in_memory(size: u64) -> bool {
    size > GZIP_MEMORY_WARN_SIZE
}

fn log_decompressed_size(path: &Path, size: u64) {
    let human_size = human_bytes::human_bytes(size as f64);
    if is_large_in_memory(size) {
        spdlog::warn!(
            "{} decompresses to {human_size}, which is held in memory while it is read",
            path.to_string_lossy()
        );
    } else {
        spdlog::info!("Decompressed {} to {human_size}", path.to_string_lossy());
    }
}

/// Sniff the first words of a stream and construct the matching reader.
///
/// On success the stream is left at the first real block, after any magic-number
/// prefix. `name` is only used for error reporting.
pub fn detect_format(
    mut stream: FormatStream,
    name: &Path,
) -> Result<Box<dyn BlockReader>, CorsikaFormatError> {
    let unrecognized = || CorsikaFormatError::UnrecognizedFormat(name.to_path_buf());
    let mut first_word = match stream.read_u32() {
        Ok(word) => word,
        Err(BlockReadError::UnexpectedEof) => return Err(unrecognized()),
        Err(e) => return Err(e.into()),
    };

    let has_magic_number = first_word == MAGIC_NUMBER;
    if has_magic_number {
        first_word = match stream.read_u32() {
            Ok(word) => word,
            Err(BlockReadError::UnexpectedEof) => return Err(unrecognized()),
            Err(e) => return Err(e.into()),
        };
    }
    stream.unread_word()?;

    if first_word == TAG_RUNH {
        spdlog::info!("Corsika RAW format detected in {}", name.to_string_lossy());
        return Ok(Box::new(RawFormat::new(stream, has_magic_number)));
    }

    if first_word == SYNC_MARKER {
        spdlog::info!("Corsika EventIO format detected in {}", name.to_string_lossy());
        return Ok(Box::new(EventIoFormat::new(stream)));
    }

    Err(unrecognized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TAG_EVTH;

    fn detect(bytes: Vec<u8>) -> Result<Box<dyn BlockReader>, CorsikaFormatError> {
        let stream = FormatStream::from_bytes(bytes).unwrap();
        detect_format(stream, Path::new("test.dat"))
    }

    #[test]
    fn test_detect_raw() {
        let mut bytes = b"RUNH".to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let mut reader = detect(bytes).unwrap();
        assert!(!reader.is_eventio_format());
        assert_eq!(reader.stream().position(), 0);
    }

    #[test]
    fn test_detect_raw_with_magic_number() {
        let mut bytes = MAGIC_NUMBER.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"RUNH");
        bytes.extend_from_slice(&[0u8; 16]);
        let mut reader = detect(bytes).unwrap();
        assert!(!reader.is_eventio_format());
        // The reader starts right at the RUNH tag
        assert_eq!(reader.stream().position(), 4);
    }

    #[test]
    fn test_detect_eventio() {
        let mut bytes = SYNC_MARKER.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let mut reader = detect(bytes).unwrap();
        assert!(reader.is_eventio_format());
        assert_eq!(reader.stream().position(), 0);
    }

    #[test]
    fn test_detect_unknown() {
        assert!(matches!(
            detect(b"JUNKJUNKJUNK".to_vec()),
            Err(CorsikaFormatError::UnrecognizedFormat(_))
        ));
        assert!(matches!(
            detect(Vec::new()),
            Err(CorsikaFormatError::UnrecognizedFormat(_))
        ));
        assert!(matches!(
            detect(MAGIC_NUMBER.to_le_bytes().to_vec()),
            Err(CorsikaFormatError::UnrecognizedFormat(_))
        ));
        // A raw file has to start with the run header
        assert!(matches!(
            detect(TAG_EVTH.to_le_bytes().to_vec()),
            Err(CorsikaFormatError::UnrecognizedFormat(_))
        ));
    }

    #[test]
    fn test_large_decompressed_size() {
        assert!(!is_large_in_memory(0));
        assert!(!is_large_in_memory(GZIP_MEMORY_WARN_SIZE));
        assert!(is_large_in_memory(GZIP_MEMORY_WARN_SIZE + 1));
        assert!(is_large_in_memory(5 * GZIP_MEMORY_WARN_SIZE));
    }

    #[test]
    fn test_skip_past_end() {
        let mut stream = FormatStream::from_bytes(vec![0u8; 8]).unwrap();
        stream.skip(4).unwrap();
        assert!(matches!(stream.skip(8), Err(BlockReadError::UnexpectedEof)));
        assert!(stream.is_eof());
        assert_eq!(stream.position(), 8);
    }

    #[test]
    fn test_position_follows_reads_and_seeks() {
        let bytes: Vec<u8> = (0u8..64).collect();
        let mut file = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut file, &bytes).unwrap();
        let mut stream = FormatStream::new(Box::new(file)).unwrap();
        assert_eq!(stream.len(), 64);

        assert_eq!(stream.read_u32().unwrap(), u32::from_le_bytes([0, 1, 2, 3]));
        stream.unread_word().unwrap();
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read_u32().unwrap(), u32::from_le_bytes([0, 1, 2, 3]));

        stream.skip(12).unwrap();
        assert_eq!(stream.position(), 16);
        let mut buffer = [0u8; 4];
        stream.read_bytes(&mut buffer).unwrap();
        assert_eq!(buffer, [16, 17, 18, 19]);
        assert_eq!(stream.read_floats(2).unwrap().len(), 2);
        assert_eq!(stream.position(), 28);
        stream.unread_word().unwrap();
        assert_eq!(stream.read_u32().unwrap(), u32::from_le_bytes([24, 25, 26, 27]));

        assert!(stream.seek_before_end(8).unwrap());
        assert_eq!(stream.position(), 56);
        assert_eq!(stream.read_u32().unwrap(), u32::from_le_bytes([56, 57, 58, 59]));
        assert!(!stream.seek_before_end(65).unwrap());
        assert_eq!(stream.position(), 60);

        // A short read leaves the position where the stream really is
        let mut buffer = [0u8; 8];
        assert!(matches!(
            stream.read_bytes(&mut buffer),
            Err(BlockReadError::UnexpectedEof)
        ));
        assert_eq!(stream.position(), stream.inner.stream_position().unwrap());

        stream.seek_start().unwrap();
        assert_eq!(stream.position(), 0);
        assert!(!stream.is_eof());
    }
}
