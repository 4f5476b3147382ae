/// Color of a worker's progress bar, by processing stage
///
/// MAGENTA while events are counted from the trailers, CYAN while reading,
/// GREEN while the summary is written and RED once the file failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BarColor {
    #[default]
    CYAN,
    MAGENTA,
    RED,
    GREEN,
}

/// Progress message a worker sends over its channel
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub file_name: String,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, file_name: &str, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            file_name: file_name.to_string(),
            worker_id,
            color,
        }
    }
}
