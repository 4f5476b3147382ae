use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::config::Config;
use super::corsika_read::CorsikaRead;
use super::error::ProcessorError;
use super::summary_writer::SummaryWriter;
use super::worker_status::{BarColor, WorkerStatus};

/// Configure a reader for a single input file
fn create_reader(config: &Config, path: &Path) -> CorsikaRead {
    let mut reader = CorsikaRead::new(Some(path));
    reader.set_array_idx(config.array_idx);
    reader.set_telescope_idx(config.telescope_idx);
    reader.set_force_mode(config.force_mode);
    reader.set_verify_run_number(config.verify_run_number);
    reader
}

/// The main loop of corsika_reader.
///
/// Reads every event of one CORSIKA file, reporting progress through tx, and writes the
/// summary if an output path is configured. Returns the number of events read. If the
/// file fails, a RED status is sent before the error is returned.
pub fn process_file(
    config: &Config,
    path: &Path,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<u64, ProcessorError> {
    let file_name = path.to_string_lossy().to_string();
    let mut last_progress: f32 = 0.0;
    let result = read_file(config, path, tx, worker_id, &file_name, &mut last_progress);
    if result.is_err() {
        // The channel may already be gone, the original error matters more
        let _ = tx.send(WorkerStatus::new(
            last_progress,
            &file_name,
            *worker_id,
            BarColor::RED,
        ));
    }
    result
}

fn read_file(
    config: &Config,
    path: &Path,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
    file_name: &str,
    last_progress: &mut f32,
) -> Result<u64, ProcessorError> {
    let mut reader = create_reader(config, path);

    tx.send(WorkerStatus::new(0.0, file_name, *worker_id, BarColor::MAGENTA))?;
    match reader.calc_num_total_events() {
        Ok(n_total) => spdlog::info!("RUNE announces {n_total} events"),
        Err(e) if config.force_mode => {
            spdlog::warn!("Could not count the events from the trailer: {e}")
        }
        Err(e) => return Err(e.into()),
    }

    let mut writer = match config.get_summary_file_name(path)? {
        Some(summary_path) => Some(SummaryWriter::new(&summary_path, path)?),
        None => None,
    };

    let flush_frac: f32 = 0.01;
    let mut event_counter: u64 = 0;
    tx.send(WorkerStatus::new(0.0, file_name, *worker_id, BarColor::CYAN))?;

    let mut run_header_logged = false;
    while let Some(event) = reader.next_event()? {
        if !run_header_logged {
            spdlog::info!("Run header:\n{}", reader.get_run_header());
            run_header_logged = true;
        }
        if config.print_events {
            spdlog::info!(
                "Event (array {}, telescope {:?}):\n{}",
                event.array,
                event.telescope,
                event.header
            );
        }
        if let Some(w) = writer.as_mut() {
            w.append_event(&event);
        }
        event_counter += 1;

        let progress = reader.get_progress();
        if progress - *last_progress > flush_frac {
            *last_progress = progress;
            tx.send(WorkerStatus::new(
                progress,
                file_name,
                *worker_id,
                BarColor::CYAN,
            ))?;
        }
    }

    if let Some(w) = writer {
        tx.send(WorkerStatus::new(
            *last_progress,
            file_name,
            *worker_id,
            BarColor::GREEN,
        ))?;
        w.close(reader.get_run_header())?;
    }

    *last_progress = 1.0;
    tx.send(WorkerStatus::new(1.0, file_name, *worker_id, BarColor::CYAN))?;
    spdlog::info!(
        "Read {} events from {} showers of {}",
        event_counter,
        reader.get_num_events(),
        file_name
    );
    Ok(event_counter)
}

/// Process a subset of files on one worker
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<PathBuf>,
) -> Result<(), ProcessorError> {
    for path in subset {
        if path.exists() {
            spdlog::info!("Processing file {}...", path.to_string_lossy());
            process_file(&config, &path, &tx, &worker_id)?;
            spdlog::info!("Finished processing file {}.", path.to_string_lossy());
        } else {
            spdlog::info!("File {} does not exist, skipping...", path.to_string_lossy());
        }
    }
    Ok(())
}

/// Divide the input files in to a set of subsets (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<PathBuf>> {
    let n_threads = config.n_threads.max(1) as usize;
    let mut subsets: Vec<Vec<PathBuf>> = vec![Vec::new(); n_threads];

    for (idx, path) in config.input_paths.iter().enumerate() {
        subsets[idx % n_threads].push(path.clone())
    }

    subsets
}
