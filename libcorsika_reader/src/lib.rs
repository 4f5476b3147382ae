//! # corsika_reader
//!
//! corsika_reader reads the binary output of the CORSIKA air shower simulation, written
//! in Rust. It understands both layouts CORSIKA produces: the raw format of plain
//! CORSIKA runs (optionally prefixed with a magic number) and the EventIO container
//! written by the IACT option. The layout is detected from the first bytes of each
//! file, and files ending in `.gz` are decompressed on the fly.
//!
//! The reader decodes the run header (RUNH), the per shower event headers (EVTH) and
//! both trailers (EVTE, RUNE). Photon data is handed out undecoded, one
//! [`corsika_read::CorsikaEvent`] per reuse of the shower (raw) or per telescope
//! (EventIO), together with the core or telescope position of that event.
//!
//! ## Usage
//!
//! ```no_run
//! use libcorsika_reader::corsika_read::CorsikaRead;
//! use std::path::Path;
//!
//! let mut reader = CorsikaRead::new(Some(Path::new("DAT000001")));
//! while let Some(event) = reader.next_event()? {
//!     println!("{}", event.header);
//! }
//! # Ok::<(), libcorsika_reader::error::CorsikaReadError>(())
//! ```
//!
//! ## Configuration
//!
//! The `corsika_reader_cli` application is driven by a YAML configuration:
//!
//! ```yml
//! input_paths: []
//! output_path: null
//! array_idx: null
//! telescope_idx: null
//! force_mode: false
//! verify_run_number: true
//! print_events: false
//! n_threads: 1
//! ```
//!
//! - `input_paths`: CORSIKA files to read. They are divided amongst the workers.
//! - `output_path`: directory for the per file YAML summaries. `null` writes none.
//! - `array_idx`: only read this array (reuse) index. `null` reads all.
//! - `telescope_idx`: only read this telescope (EventIO only). `null` reads all.
//! - `force_mode`: keep going when a file has no RUNE trailer.
//! - `verify_run_number`: check that RUNE and RUNH agree on the run number.
//! - `print_events`: log every event header.
//! - `n_threads`: number of parallel worker threads. Must be at least 1.
//!
//! ## Output
//!
//! For every input file a summary named after the file (`DAT000001.yml`) is written to
//! the output directory. It contains the run header and one record per event:
//!
//! ```text
//! version, input, num_events
//! run_header - run_number, run_start, program_version, obs_level, energy range, ...
//! events
//! |---- event, reuse, array, telescope, energy, zd, az, x, y, impact, weighted_photons, payload_bytes
//! ```
pub mod block;
pub mod config;
pub mod constants;
pub mod corsika_read;
pub mod error;
pub mod event_header;
pub mod eventio_format;
pub mod format;
pub mod particle;
pub mod process;
pub mod raw_format;
pub mod run_header;
pub mod summary_writer;
pub mod worker_status;

#[cfg(test)]
pub(crate) mod test_utils;
