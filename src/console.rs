//! Terminal progress display
//!
//! A spinner showing the node the server is currently executing, fed by the
//! monitor's progress channel.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::ProgressUpdate;
use crate::util::units::format_duration;

/// Channel capacity for progress updates
pub const PROGRESS_CHANNEL_SIZE: usize = 100;

/// Text shown next to the spinner for an update
pub fn progress_message(update: &ProgressUpdate) -> String {
    match &update.active_node {
        Some(node) => format!("node {} ({})", node, format_duration(update.elapsed)),
        None => format!("finished in {}", format_duration(update.elapsed)),
    }
}

/// Spawn a spinner task that renders updates until the sender side closes
pub fn spawn_spinner(mut rx: mpsc::Receiver<ProgressUpdate>) -> JoinHandle<()> {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("waiting for server");

    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            pb.set_message(progress_message(&update));
        }
        pb.finish_and_clear();
    })
}
