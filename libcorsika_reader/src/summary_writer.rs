use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::corsika_read::CorsikaEvent;
use super::error::SummaryWriterError;
use super::run_header::RunHeader;

/// This is the version of the summary format
const FORMAT_VERSION: &str = "1.0";

/// One line of the summary per emitted event
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventSummary {
    pub event: u32,
    pub reuse: u32,
    pub array: u32,
    pub telescope: Option<u32>,
    pub energy: f32,
    pub zd: f32,
    pub az: f32,
    pub x: f32,
    pub y: f32,
    pub impact: f64,
    pub weighted_photons: f32,
    pub payload_bytes: usize,
}

impl From<&CorsikaEvent> for EventSummary {
    fn from(event: &CorsikaEvent) -> Self {
        let header = &event.header;
        Self {
            event: header.get_evt_number(),
            reuse: header.get_num_reuse(),
            array: event.array,
            telescope: event.telescope,
            energy: header.get_total_energy(),
            zd: header.get_zd(),
            az: header.get_az(),
            x: header.get_x(),
            y: header.get_y(),
            impact: header.get_impact(),
            weighted_photons: header.get_weighted_num_photons(),
            payload_bytes: event.payload.len(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    version: String,
    input: &'a Path,
    run_header: &'a RunHeader,
    num_events: usize,
    events: &'a [EventSummary],
}

/// Collects the events of one CORSIKA file and writes them as a YAML document
/// when closed.
#[derive(Debug)]
pub struct SummaryWriter {
    path: PathBuf,
    input: PathBuf,
    events: Vec<EventSummary>,
}

impl SummaryWriter {
    /// Create the writer. The file at path is created immediately so a bad output
    /// location fails before any event is read.
    pub fn new(path: &Path, input: &Path) -> Result<Self, SummaryWriterError> {
        std::fs::File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            input: input.to_path_buf(),
            events: Vec::new(),
        })
    }

    pub fn append_event(&mut self, event: &CorsikaEvent) {
        self.events.push(EventSummary::from(event));
    }

    pub fn get_num_events(&self) -> usize {
        self.events.len()
    }

    /// Write the run header and all events, consume the writer
    pub fn close(self, run_header: &RunHeader) -> Result<(), SummaryWriterError> {
        let summary = RunSummary {
            version: format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION),
            input: &self.input,
            run_header,
            num_events: self.events.len(),
            events: &self.events,
        };
        let mut file = std::fs::File::create(&self.path)?;
        file.write_all(serde_yaml::to_string(&summary)?.as_bytes())?;
        spdlog::info!(
            "Wrote summary of {} events to {}",
            self.events.len(),
            self.path.to_string_lossy()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_header::EventHeader;
    use crate::test_utils::event_header_words;
    use std::sync::Arc;

    #[test]
    fn test_event_summary() {
        let mut header = EventHeader::new();
        header.decode_event_header(&event_header_words(4.0, 2.0)).unwrap();
        header.set_telescope_offset(1, 30.0, -40.0);
        let event = CorsikaEvent {
            header,
            array: 1,
            telescope: Some(2),
            payload: Arc::from(vec![0u8; 12]),
        };
        let summary = EventSummary::from(&event);
        assert_eq!(summary.event, 4);
        assert_eq!(summary.reuse, 1);
        assert_eq!(summary.telescope, Some(2));
        assert_eq!(summary.energy, 1000.0);
        assert_eq!((summary.x, summary.y), (30.0, -40.0));
        assert_eq!(summary.payload_bytes, 12);
    }

    #[test]
    fn test_write_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DAT000001.yml");
        let mut writer = SummaryWriter::new(&path, Path::new("DAT000001")).unwrap();
        let mut header = EventHeader::new();
        header.decode_event_header(&event_header_words(1.0, 1.0)).unwrap();
        writer.append_event(&CorsikaEvent {
            header,
            array: 0,
            telescope: None,
            payload: Arc::from(Vec::new()),
        });
        assert_eq!(writer.get_num_events(), 1);
        writer.close(&RunHeader::new()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("num_events: 1"));
        assert!(text.contains("input: DAT000001"));
    }
}
