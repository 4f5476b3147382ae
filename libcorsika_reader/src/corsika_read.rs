use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::block::{BlockHeader, ObjectHeader, ReadState};
use super::constants::*;
use super::error::{BlockReadError, CorsikaReadError};
use super::event_header::EventHeader;
use super::format::{corsika_format_factory, BlockReader};
use super::run_header::RunHeader;

/// Position of the reader inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    NothingRead,
    RunHeaderRead,
    EventHeaderRead,
    EventEnded,
    RunEnded,
}

/// Telescope positions of the array (EventIO object 1201), in cm.
///
/// x points north, y west, z up from the observation level; r is the radius of
/// the sphere around the telescope used by CORSIKA.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelescopePositions {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub r: Vec<f32>,
}

impl TelescopePositions {
    pub fn decode(mut body: &[u8]) -> Result<Self, BlockReadError> {
        let n_telescopes = body.read_i32::<LittleEndian>()?.max(0) as usize;
        // Four columns of 4 bytes per telescope have to fit in the body
        let n_telescopes = n_telescopes.min(body.len() / 16);
        let read_column = |body: &mut &[u8]| -> Result<Vec<f32>, BlockReadError> {
            let mut column = vec![0.0; n_telescopes];
            body.read_f32_into::<LittleEndian>(&mut column)?;
            Ok(column)
        };
        let x = read_column(&mut body)?;
        let y = read_column(&mut body)?;
        let z = read_column(&mut body)?;
        let r = read_column(&mut body)?;
        Ok(Self { x, y, z, r })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// One shower as seen by one array (reuse) and, for EventIO input, one telescope.
///
/// The payload is the undecoded photon data: the concatenated raw sub-blocks of
/// the shower, or the body of a single EventIO photon bunch object. All reuses of
/// a raw shower share one payload allocation.
#[derive(Debug, Clone)]
pub struct CorsikaEvent {
    pub header: EventHeader,
    pub array: u32,
    pub telescope: Option<u32>,
    pub payload: Arc<[u8]>,
}

/// Photon data collected for the current shower until its EVTE is read
#[derive(Debug, Clone)]
struct ShowerPart {
    array: u32,
    telescope: u32,
    x: f32,
    y: f32,
    payload: Vec<u8>,
}

/// Sequential reader over a list of CORSIKA files.
///
/// Drives the block readers through RUNH, EVTH, shower data, EVTE and RUNE and
/// hands out one [`CorsikaEvent`] per array/telescope of every shower. The run
/// header of the file currently read is available through
/// [`CorsikaRead::get_run_header`].
#[derive(Debug, Default)]
pub struct CorsikaRead {
    file_names: Vec<PathBuf>,
    num_file: usize,
    current_file: Option<PathBuf>,
    reader: Option<Box<dyn BlockReader>>,

    run_header: RunHeader,
    evt_header: EventHeader,
    telescopes: TelescopePositions,

    read_state: ReadState,
    phase: RunPhase,
    top_block_length: i64,
    current_array: u32,
    array_offset: (f32, f32),

    raw_event_buffer: Vec<u8>,
    shower_parts: Vec<ShowerPart>,
    pending: VecDeque<CorsikaEvent>,

    array_idx: Option<u32>,
    telescope_idx: Option<u32>,
    force_mode: bool,
    verify_run_number: bool,

    num_events: u64,
    num_total_events: u64,
}

impl CorsikaRead {
    /// Create a reader, optionally with a first file
    pub fn new(path: Option<&Path>) -> Self {
        let mut read = Self {
            verify_run_number: true,
            ..Default::default()
        };
        if let Some(p) = path {
            read.add_file(p);
        }
        read
    }

    /// Read from an already opened block reader instead of a file list
    pub fn from_reader(reader: Box<dyn BlockReader>) -> Self {
        let mut read = Self::new(None);
        read.reader = Some(reader);
        read
    }

    pub fn add_file(&mut self, path: &Path) {
        self.file_names.push(path.to_path_buf());
    }

    pub fn set_force_mode(&mut self, force: bool) {
        self.force_mode = force;
    }

    pub fn set_array_idx(&mut self, idx: Option<u32>) {
        self.array_idx = idx;
    }

    pub fn set_telescope_idx(&mut self, idx: Option<u32>) {
        self.telescope_idx = idx;
    }

    pub fn set_verify_run_number(&mut self, verify: bool) {
        self.verify_run_number = verify;
    }

    pub fn get_run_header(&self) -> &RunHeader {
        &self.run_header
    }

    pub fn get_telescope_positions(&self) -> &TelescopePositions {
        &self.telescopes
    }

    pub fn get_phase(&self) -> RunPhase {
        self.phase
    }

    /// Number of showers (EVTE blocks) read so far
    pub fn get_num_events(&self) -> u64 {
        self.num_events
    }

    /// Number of showers announced by the trailers; see [`Self::calc_num_total_events`]
    pub fn get_num_total_events(&self) -> u64 {
        self.num_total_events
    }

    pub fn get_current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    /// Fraction of the current file consumed so far
    pub fn get_progress(&mut self) -> f32 {
        match self.reader.as_mut() {
            Some(reader) => {
                let stream = reader.stream();
                match stream.len() {
                    0 => 0.0,
                    length => stream.position() as f32 / length as f32,
                }
            }
            None => 0.0,
        }
    }

    /// Sum the number of showers of all files from their RUNE trailers.
    ///
    /// Uses the backward trailer search, so no file is scanned. A file without a
    /// trailer is an error unless force mode is on.
    pub fn calc_num_total_events(&mut self) -> Result<u64, CorsikaReadError> {
        if self.file_names.is_empty() {
            return Err(CorsikaReadError::NoFiles);
        }
        let mut total: u64 = 0;
        for path in &self.file_names {
            let mut reader = corsika_format_factory(path)?;
            if !reader.seek_evt_end()? {
                if self.force_mode {
                    spdlog::warn!(
                        "No RUNE found in {}, file is skipped for the event count",
                        path.to_string_lossy()
                    );
                    continue;
                }
                spdlog::error!(
                    "No RUNE found in {}, the file is probably truncated",
                    path.to_string_lossy()
                );
                return Err(CorsikaReadError::MissingTrailer(path.clone()));
            }
            let mut trailer = RunHeader::new();
            trailer.read_evt_end(reader.as_mut(), false)?;
            total += trailer.get_num_events() as u64;
        }
        self.num_total_events = total;
        Ok(total)
    }

    /// Start again from the first file
    pub fn rewind(&mut self) -> Result<(), CorsikaReadError> {
        if self.file_names.is_empty() {
            if let Some(reader) = self.reader.as_mut() {
                reader.rewind()?;
            }
        } else {
            self.reader = None;
        }
        self.num_file = 0;
        self.num_events = 0;
        self.reset_run();
        Ok(())
    }

    fn reset_run(&mut self) {
        self.phase = RunPhase::NothingRead;
        self.read_state = ReadState::ExpectTopLevel;
        self.top_block_length = 0;
        self.raw_event_buffer.clear();
        self.shower_parts.clear();
        self.pending.clear();
    }

    /// Open the next file of the list.
    ///
    /// Returns false if there are no more files.
    pub fn open_next_file(&mut self) -> Result<bool, CorsikaReadError> {
        self.reader = None;
        let Some(path) = self.file_names.get(self.num_file).cloned() else {
            return Ok(false);
        };
        self.num_file += 1;
        spdlog::info!("Opening file {}...", path.to_string_lossy());
        let mut reader = corsika_format_factory(&path)?;
        spdlog::info!(
            "File size: {}",
            human_bytes::human_bytes(reader.stream().len() as f64)
        );
        self.reader = Some(reader);
        self.current_file = Some(path);
        self.reset_run();
        Ok(true)
    }

    /// Get the next event of the file list.
    ///
    /// Returns `Ok(None)` once all files have been read.
    pub fn next_event(&mut self) -> Result<Option<CorsikaEvent>, CorsikaReadError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            if self.reader.is_none() || self.phase == RunPhase::RunEnded {
                if self.file_names.is_empty() {
                    // A single reader without file list is done after its run
                    return match self.reader {
                        Some(_) => Ok(None),
                        None => Err(CorsikaReadError::NoFiles),
                    };
                }
                if !self.open_next_file()? {
                    return Ok(None);
                }
            }

            if !self.read_next_block()? {
                self.finish_file()?;
            }
        }
    }

    /// The stream ended; without a RUNE this is only acceptable in force mode
    fn finish_file(&mut self) -> Result<(), CorsikaReadError> {
        if self.phase != RunPhase::RunEnded {
            let path = self.current_file.clone().unwrap_or_default();
            if !self.force_mode {
                spdlog::error!(
                    "File {} ended without RUNE block",
                    path.to_string_lossy()
                );
                return Err(CorsikaReadError::MissingTrailer(path));
            }
            spdlog::warn!(
                "File {} ended without RUNE block, continuing in force mode",
                path.to_string_lossy()
            );
        }
        self.phase = RunPhase::RunEnded;
        Ok(())
    }

    fn read_next_block(&mut self) -> Result<bool, CorsikaReadError> {
        let Some(mut reader) = self.reader.take() else {
            return Ok(false);
        };
        let result = self.handle_next_block(reader.as_mut());
        self.reader = Some(reader);
        result
    }

    fn handle_next_block(&mut self, reader: &mut dyn BlockReader) -> Result<bool, CorsikaReadError> {
        let Some(header) = reader.next_block(self.read_state)? else {
            return Ok(false);
        };

        if self.read_state == ReadState::ExpectSubBlock {
            self.handle_sub_block(reader, header)?;
            return Ok(true);
        }

        match header {
            BlockHeader::RunStart { length } => {
                if !matches!(self.phase, RunPhase::NothingRead | RunPhase::RunEnded) {
                    return Err(CorsikaReadError::BlockOutOfOrder(TYPE_RUN_HEADER));
                }
                self.run_header = RunHeader::new();
                self.run_header.read_evt(reader)?;
                skip_rest(reader, length, BLOCK_SIZE)?;
                self.phase = RunPhase::RunHeaderRead;
                spdlog::info!("Read RUNH of run {}", self.run_header.get_run_number());
            }
            BlockHeader::EventStart { length } => {
                if !matches!(self.phase, RunPhase::RunHeaderRead | RunPhase::EventEnded) {
                    return Err(CorsikaReadError::BlockOutOfOrder(TYPE_EVENT_HEADER));
                }
                let words = reader.read_floats(BLOCK_WORDS)?;
                skip_rest(reader, length, BLOCK_SIZE)?;
                if self.phase == RunPhase::RunHeaderRead {
                    self.run_header.read_event_header(&words)?;
                }
                self.evt_header.decode_event_header(&words)?;
                self.evt_header.reset_num_reuse();
                self.evt_header.init_xy()?;
                self.raw_event_buffer.clear();
                self.shower_parts.clear();
                self.phase = RunPhase::EventHeaderRead;
            }
            BlockHeader::Payload { length } => {
                let mut data = vec![0u8; length as usize];
                reader.read_bytes(&mut data)?;
                if self.phase == RunPhase::EventHeaderRead {
                    self.raw_event_buffer.extend_from_slice(&data);
                    self.read_state = ReadState::InsideShowerPayload;
                } else {
                    spdlog::debug!("Dropping {} bytes of padding outside of a shower", length);
                }
            }
            BlockHeader::EventEnd { length } => {
                if self.phase != RunPhase::EventHeaderRead {
                    return Err(CorsikaReadError::BlockOutOfOrder(TYPE_EVENT_END));
                }
                self.evt_header.read_evt_end(reader)?;
                skip_rest(reader, length, BLOCK_SIZE)?;
                self.read_state = ReadState::ExpectTopLevel;
                self.phase = RunPhase::EventEnded;
                self.num_events += 1;
                self.finish_shower(reader.is_eventio_format())?;
            }
            BlockHeader::RunEnd { length } => {
                if self.phase == RunPhase::NothingRead {
                    return Err(CorsikaReadError::BlockOutOfOrder(TYPE_RUN_END));
                }
                self.run_header
                    .read_evt_end(reader, self.verify_run_number)?;
                skip_rest(reader, length, (RUN_END_WORDS * 4) as u32)?;
                self.read_state = ReadState::ExpectTopLevel;
                self.phase = RunPhase::RunEnded;
                spdlog::info!(
                    "Read RUNE of run {} with {} events",
                    self.run_header.get_run_number(),
                    self.run_header.get_num_events()
                );
            }
            BlockHeader::Object(obj) => self.handle_object(reader, obj)?,
        }
        Ok(true)
    }

    fn handle_object(
        &mut self,
        reader: &mut dyn BlockReader,
        obj: ObjectHeader,
    ) -> Result<(), CorsikaReadError> {
        match obj.type_code {
            TYPE_TELESCOPE_POSITIONS => {
                let mut body = vec![0u8; obj.length as usize];
                reader.read_bytes(&mut body)?;
                self.telescopes = TelescopePositions::decode(&body)?;
                spdlog::info!("Read positions of {} telescopes", self.telescopes.len());
            }
            TYPE_TELESCOPE_ARRAY => {
                if self.phase != RunPhase::EventHeaderRead {
                    return Err(CorsikaReadError::BlockOutOfOrder(TYPE_TELESCOPE_ARRAY));
                }
                let selected = self.array_idx.map_or(true, |idx| idx == obj.identifier);
                if selected && obj.length > 0 {
                    self.current_array = obj.identifier;
                    self.array_offset = self.evt_header.get_array_offset(obj.identifier as usize)?;
                    self.top_block_length = obj.length as i64;
                    self.read_state = ReadState::ExpectSubBlock;
                } else {
                    reader.skip(obj.length as u64)?;
                }
            }
            _ => {
                spdlog::debug!(
                    "Skipping object {} (id {}, {} bytes)",
                    obj.type_code,
                    obj.identifier,
                    obj.length
                );
                reader.skip(obj.length as u64)?;
            }
        }
        Ok(())
    }

    /// Objects nested in a telescope array block (1204)
    fn handle_sub_block(
        &mut self,
        reader: &mut dyn BlockReader,
        header: BlockHeader,
    ) -> Result<(), CorsikaReadError> {
        let length = header.length();
        self.top_block_length -= EVENTIO_SUB_HEADER_SIZE + length as i64;

        let photons = match header {
            BlockHeader::Object(obj) if obj.type_code == TYPE_PHOTON_BUNCHES => Some(obj),
            _ => None,
        };
        match photons {
            Some(obj) => self.read_photon_bunches(reader, obj)?,
            None => reader.skip(length as u64)?,
        }

        if self.top_block_length <= 0 {
            self.read_state = ReadState::ExpectTopLevel;
        }
        Ok(())
    }

    fn read_photon_bunches(
        &mut self,
        reader: &mut dyn BlockReader,
        obj: ObjectHeader,
    ) -> Result<(), CorsikaReadError> {
        let telescope = obj.identifier % TELESCOPE_ID_DIVISOR;
        if self.telescope_idx.is_some_and(|idx| idx != telescope) {
            reader.skip(obj.length as u64)?;
            return Ok(());
        }
        let tel = telescope as usize;
        if tel >= self.telescopes.len() {
            return Err(CorsikaReadError::BadTelescopeIndex(
                telescope,
                self.telescopes.len(),
            ));
        }

        let mut payload = vec![0u8; obj.length as usize];
        reader.read_bytes(&mut payload)?;

        // Same axis convention as the array offsets: (west, -north) -> (x, y)
        let (x_off, y_off) = self.array_offset;
        self.shower_parts.push(ShowerPart {
            array: self.current_array,
            telescope,
            x: x_off + self.telescopes.y[tel],
            y: y_off - self.telescopes.x[tel],
            payload,
        });
        Ok(())
    }

    /// Turn the collected shower data into events once the EVTE is known
    fn finish_shower(&mut self, is_eventio: bool) -> Result<(), CorsikaReadError> {
        if is_eventio {
            for part in self.shower_parts.drain(..) {
                let mut header = self.evt_header.clone();
                header.set_telescope_offset(part.array, part.x, part.y);
                self.pending.push_back(CorsikaEvent {
                    header,
                    array: part.array,
                    telescope: Some(part.telescope),
                    payload: Arc::from(part.payload),
                });
            }
            return Ok(());
        }

        // Raw files hold the shower once; every reuse only moves the core
        let payload: Arc<[u8]> = Arc::from(std::mem::take(&mut self.raw_event_buffer));
        let n_reuse = self.evt_header.get_tot_reuse().max(1);
        for reuse in 0..n_reuse {
            if self.array_idx.is_some_and(|idx| idx != reuse) {
                continue;
            }
            let mut header = self.evt_header.clone();
            header.reset_num_reuse();
            for _ in 0..reuse {
                header.inc_num_reuse();
            }
            header.init_xy()?;
            self.pending.push_back(CorsikaEvent {
                header,
                array: reuse,
                telescope: None,
                payload: Arc::clone(&payload),
            });
        }
        Ok(())
    }
}

/// Skip whatever part of a block the decoders did not consume
fn skip_rest(reader: &mut dyn BlockReader, length: u32, consumed: u32) -> Result<(), BlockReadError> {
    let rest = length.saturating_sub(consumed);
    if rest > 0 {
        reader.skip(rest as u64)?;
    }
    Ok(())
}
