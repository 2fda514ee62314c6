//! Progress events for a batch run

use std::path::{Path, PathBuf};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::stats::RunStatistics;

const KIB: u64 = 1024;

/// Progress update event
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Started {
        total_files: usize,
    },
    /// The output directory is missing and is about to be created
    CreatingOutputDirectory {
        path: PathBuf,
    },
    FileCompleted {
        filename: String,
        /// Jobs not yet finished, counting this one
        remaining: usize,
        total_files: usize,
        source_bytes: u64,
        output_bytes: u64,
    },
    BatchCompleted {
        statistics: RunStatistics,
        elapsed: Duration,
    },
    Aborted {
        error: String,
    },
}

/// Broadcasts progress events to any number of subscribers
///
/// Sending never blocks a worker; with no subscriber the event is dropped.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    sender: broadcast::Sender<ProgressUpdate>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn start(&self, total_files: usize) {
        self.emit(ProgressUpdate::Started { total_files });
    }

    pub fn creating_output_directory(&self, path: &Path) {
        self.emit(ProgressUpdate::CreatingOutputDirectory { path: path.to_path_buf() });
    }

    pub fn file_completed(
        &self,
        filename: String,
        remaining: usize,
        total_files: usize,
        source_bytes: u64,
        output_bytes: u64,
    ) {
        self.emit(ProgressUpdate::FileCompleted {
            filename,
            remaining,
            total_files,
            source_bytes,
            output_bytes,
        });
    }

    pub fn complete_batch(&self, statistics: RunStatistics, elapsed: Duration) {
        self.emit(ProgressUpdate::BatchCompleted { statistics, elapsed });
    }

    pub fn abort(&self, error: String) {
        self.emit(ProgressUpdate::Aborted { error });
    }

    fn emit(&self, update: ProgressUpdate) {
        if self.sender.send(update).is_err() {
            debug!("Progress update dropped: no subscribers");
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a per-file progress line, e.g. `[ 3] IMG_0001.jpg processed, 4120k -> 612k.`
pub fn format_file_line(
    filename: &str,
    remaining: usize,
    total_files: usize,
    source_bytes: u64,
    output_bytes: u64,
) -> String {
    let width = total_files.to_string().len();
    format!(
        "[{}] {}{}{}k {} {}k{}",
        style(format!("{:>width$}", remaining, width = width)).green(),
        filename,
        style(" processed, ").magenta(),
        source_bytes / KIB,
        style("->").magenta(),
        output_bytes / KIB,
        style(".").magenta(),
    )
}

/// Console progress reporter
pub struct ConsoleProgressReporter {
    receiver: broadcast::Receiver<ProgressUpdate>,
    show_bar: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    pub fn new(tracker: &ProgressTracker, show_bar: bool) -> Self {
        Self {
            receiver: tracker.subscribe(),
            show_bar,
            bar: None,
        }
    }

    /// Print progress lines until the batch completes or aborts
    pub async fn start_reporting(mut self) {
        loop {
            let update = match self.receiver.recv().await {
                Ok(update) => update,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Progress reporter fell behind, {} updates lost", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match update {
                ProgressUpdate::Started { total_files } => {
                    if self.show_bar && total_files > 0 {
                        self.bar = Some(new_bar(total_files as u64));
                    }
                }
                ProgressUpdate::CreatingOutputDirectory { path } => {
                    let notice = style(format!(
                        "ATTENTION: Directory '{}' not found and will be created.",
                        path.display()
                    ))
                    .green();
                    match &self.bar {
                        Some(bar) => bar.println(notice.to_string()),
                        None => println!("{}", notice),
                    }
                }
                ProgressUpdate::FileCompleted {
                    filename,
                    remaining,
                    total_files,
                    source_bytes,
                    output_bytes,
                } => {
                    let line = format_file_line(
                        &filename, remaining, total_files, source_bytes, output_bytes,
                    );
                    match &self.bar {
                        Some(bar) => {
                            bar.println(line);
                            bar.inc(1);
                        }
                        None => println!("{}", line),
                    }
                }
                ProgressUpdate::BatchCompleted { .. } => {
                    if let Some(bar) = self.bar.take() {
                        bar.finish_and_clear();
                    }
                    break;
                }
                ProgressUpdate::Aborted { .. } => {
                    if let Some(bar) = self.bar.take() {
                        bar.abandon();
                    }
                    break;
                }
            }
        }
    }
}

fn new_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta})")
    {
        bar.set_style(bar_style.progress_chars("#>-"));
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_updates() {
        let tracker = ProgressTracker::new();
        let mut receiver = tracker.subscribe();

        tracker.start(5);
        let update = receiver.recv().await.unwrap();
        assert!(matches!(update, ProgressUpdate::Started { total_files: 5 }));

        tracker.file_completed("a.jpg".to_string(), 5, 5, 4096, 1024);
        match receiver.recv().await.unwrap() {
            ProgressUpdate::FileCompleted { filename, remaining, source_bytes, .. } => {
                assert_eq!(filename, "a.jpg");
                assert_eq!(remaining, 5);
                assert_eq!(source_bytes, 4096);
            }
            other => panic!("Expected FileCompleted, got {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let tracker = ProgressTracker::new();
        tracker.start(1);
        tracker.abort("nothing listens".to_string());
    }

    #[test]
    fn test_file_line_format() {
        console::set_colors_enabled(false);
        let line = format_file_line("IMG_0001.jpg", 7, 120, 4_219_904, 626_688);
        assert_eq!(line, "[  7] IMG_0001.jpg processed, 4121k -> 612k.");
    }

    #[tokio::test]
    async fn test_reporter_survives_falling_behind() {
        let tracker = ProgressTracker::new();
        let reporter = ConsoleProgressReporter::new(&tracker, false);

        // Overflow the channel before the reporter reads anything
        for i in 0..1500 {
            tracker.file_completed(format!("{}.jpg", i), 1500 - i, 1500, 2048, 1024);
        }
        tracker.complete_batch(RunStatistics::default(), Duration::from_millis(1));

        tokio::time::timeout(Duration::from_secs(5), reporter.start_reporting())
            .await
            .expect("reporter stalled after lagging");
    }

    #[tokio::test]
    async fn test_creating_output_directory_event() {
        let tracker = ProgressTracker::new();
        let mut receiver = tracker.subscribe();

        tracker.creating_output_directory(Path::new("web"));
        match receiver.recv().await.unwrap() {
            ProgressUpdate::CreatingOutputDirectory { path } => assert_eq!(path, PathBuf::from("web")),
            other => panic!("Expected CreatingOutputDirectory, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reporter_stops_on_abort() {
        let tracker = ProgressTracker::new();
        let reporter = ConsoleProgressReporter::new(&tracker, false);
        let handle = tokio::spawn(reporter.start_reporting());

        tracker.start(2);
        tracker.abort("decode failed".to_string());

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("reporter did not stop")
            .unwrap();
    }
}
