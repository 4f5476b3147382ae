//! # corsika_reader_cli
//!
//! Part of the corsika_reader crate family.
//!
//! This is the application to read CORSIKA files from the command line.
//!
//! ## Install
//!
//! Use `cargo install --path ./corsika_reader_cli` from the top level repository
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! corsika_reader_cli -p config.yml new
//! ```
//!
//! then fill in the input files and run it with
//!
//! ```bash
//! corsika_reader_cli -p config.yml
//! ```
//!
//! Log messages are written to `./corsika_reader.log`; warnings and errors are also
//! printed to the terminal.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use libcorsika_reader::config::Config;
use libcorsika_reader::error::{ConfigError, ProcessorError};
use libcorsika_reader::process::{create_subsets, process_subset};
use libcorsika_reader::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) -> Result<(), ProcessorError> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(ConfigError::from)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

/// Log to a file, and to the terminal for warnings and worse
fn init_logging() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./corsika_reader.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let stdout_sink = Arc::new(
        spdlog::sink::StdStreamSink::builder()
            .std_stream(spdlog::sink::StdStream::Stdout)
            .level_filter(spdlog::LevelFilter::MoreSevereEqual(spdlog::Level::Warn))
            .build()?,
    );

    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .sink(stdout_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn bar_style(color: &BarColor) -> ProgressStyle {
    let color = match color {
        BarColor::CYAN => "cyan",
        BarColor::MAGENTA => "magenta",
        BarColor::RED => "red",
        BarColor::GREEN => "green",
    };
    ProgressStyle::with_template(&format!(
        "{{prefix}} [{{bar:40.{color}/blue}}] {{pos:>3}}% {{msg}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Apply every status waiting in the channel to its worker's bar
fn update_bars(rx: &Receiver<WorkerStatus>, bars: &[(usize, ProgressBar)]) {
    for status in rx.try_iter() {
        if let Some((_, pb)) = bars.iter().find(|(id, _)| *id == status.worker_id) {
            pb.set_style(bar_style(&status.color));
            pb.set_position((status.progress * 100.0) as u64);
            pb.set_message(status.file_name);
        }
    }
}

/// Drive the bars until every worker has finished.
///
/// The finished check comes before the drain, so the last statuses a worker sent
/// are always shown.
fn monitor_workers<T>(
    workers: &[JoinHandle<T>],
    rx: &Receiver<WorkerStatus>,
    bars: &[(usize, ProgressBar)],
    interval: Duration,
) {
    loop {
        std::thread::sleep(interval);
        let all_finished = workers.iter().all(|w| w.is_finished());
        update_bars(rx, bars);
        if all_finished {
            break;
        }
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("corsika_reader_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    if let Err(e) = init_logging() {
        eprintln!("Could not create logging: {e}");
        return;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        spdlog::error!("A configuration path is required (--path)");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => spdlog::info!("Done."),
            Err(e) => spdlog::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Input files: {}", config.input_paths.len());
    spdlog::info!("Output Path: {:?}", config.output_path);
    spdlog::info!(
        "Array: {:?} Telescope: {:?}",
        config.array_idx,
        config.telescope_idx
    );
    spdlog::info!("Force mode: {}", config.force_mode);
    if !config.is_n_threads_valid() {
        spdlog::error!("Number of threads must be at least 1, got {}", config.n_threads);
        return;
    }

    // Spawn the workers, one progress bar each
    let pb_manager = MultiProgress::new();
    let (tx, rx) = channel::<WorkerStatus>();
    let mut workers = Vec::new();
    let mut bars = Vec::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let conf = config.clone();
        let worker_tx = tx.clone();
        let pb = pb_manager.add(ProgressBar::new(100));
        pb.set_style(bar_style(&BarColor::CYAN));
        pb.set_prefix(format!("Worker {idx}"));
        bars.push((idx, pb));
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    drop(tx);

    // No UI to drive us, so update about once a second
    monitor_workers(&workers, &rx, &bars, Duration::from_secs(1));

    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => spdlog::info!("Worker complete"),
            Ok(Err(e)) => spdlog::error!("Processor error: {e}"),
            Err(_) => spdlog::error!("Failed to join worker!"),
        }
    }
    update_bars(&rx, &bars);
    for (_, pb) in bars {
        pb.finish();
    }

    spdlog::info!("Done.");
}
