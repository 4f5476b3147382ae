use std::path::PathBuf;
use thiserror::Error;

use super::constants::{MAX_REUSE, SYNC_MARKER};
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum BlockReadError {
    #[error("Block read reached end-of-file in the middle of a block")]
    UnexpectedEof,
    #[error("EventIO block started with {0:#x} instead of the sync marker {sync:#x}", sync=SYNC_MARKER)]
    SyncMarkerMismatch(u32),
    #[error("Block read failed due to IO error: {0}")]
    IOError(std::io::Error),
}

// A short read is the one IO error callers need to tell apart from the rest
impl From<std::io::Error> for BlockReadError {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::IOError(value)
        }
    }
}

#[derive(Debug, Error)]
pub enum CorsikaFormatError {
    #[error("Cannot open file {0:?}: {1}")]
    OpenFailed(PathBuf, std::io::Error),
    #[error("Cannot decompress file {0:?}: {1}")]
    DecompressionFailed(PathBuf, std::io::Error),
    #[error("File {0:?} is neither a CORSIKA raw nor EventIO file (expected RUNH or sync marker {sync:#x})", sync=SYNC_MARKER)]
    UnrecognizedFormat(PathBuf),
    #[error("CorsikaFormat failed due to block read error: {0}")]
    BlockError(#[from] BlockReadError),
}

#[derive(Debug, Error)]
pub enum RunHeaderError {
    #[error("Currently only one observation level is allowed; RUNH has {0}")]
    BadObsLevelCount(i32),
    #[error("Mismatch in stream: run number in RUNE ({rune}) doesn't match RUNH ({runh})")]
    RunNumberMismatch { rune: u32, runh: u32 },
    #[error("RunHeader was given a block of {0} words; too short to decode")]
    ShortBlock(usize),
    #[error("RunHeader failed due to block read error: {0}")]
    BlockError(#[from] BlockReadError),
}

#[derive(Debug, Error)]
pub enum EventHeaderError {
    #[error("Number of reuse of shower is {0}, but maximum implemented is {max}", max=MAX_REUSE)]
    BadReuseCount(i32),
    #[error("Reuse index {0} is outside of the {max} stored impact positions", max=MAX_REUSE)]
    BadReuseIndex(usize),
    #[error("Mismatch in stream: event number in EVTE ({evte}) doesn't match EVTH ({evth})")]
    EventNumberMismatch { evte: u32, evth: u32 },
    #[error("EventHeader reached end-of-file while reading EVTE")]
    EndOfFile,
    #[error("EventHeader was given a block of {0} words; too short to decode")]
    ShortBlock(usize),
    #[error("EventHeader failed due to block read error: {0}")]
    BlockError(BlockReadError),
}

impl From<BlockReadError> for EventHeaderError {
    fn from(value: BlockReadError) -> Self {
        match value {
            BlockReadError::UnexpectedEof => Self::EndOfFile,
            other => Self::BlockError(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum CorsikaReadError {
    #[error("CorsikaRead failed due to format error: {0}")]
    FormatError(#[from] CorsikaFormatError),
    #[error("CorsikaRead failed due to block read error: {0}")]
    BlockError(#[from] BlockReadError),
    #[error("CorsikaRead failed due to RunHeader error: {0}")]
    RunHeaderError(#[from] RunHeaderError),
    #[error("CorsikaRead failed due to EventHeader error: {0}")]
    EventHeaderError(#[from] EventHeaderError),
    #[error("CorsikaRead could not find a RUNE trailer in {0:?}; the file is probably truncated")]
    MissingTrailer(PathBuf),
    #[error("CorsikaRead found block {0} where it is not allowed -- the stream is out of sync")]
    BlockOutOfOrder(u16),
    #[error("CorsikaRead found telescope {0}, but only {1} telescope positions were read")]
    BadTelescopeIndex(u32, usize),
    #[error("CorsikaRead has no files to read")]
    NoFiles,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum SummaryWriterError {
    #[error("SummaryWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("SummaryWriter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to CorsikaRead error: {0}")]
    ReadError(#[from] CorsikaReadError),
    #[error("Processor failed due to SummaryWriter error: {0}")]
    SummaryError(#[from] SummaryWriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
