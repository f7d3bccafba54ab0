use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ncaaparam::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
    current: Arc<Mutex<String>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::new(0)
            .with_style(Self::bar_style())
            .with_message("Initializing...");
        pb.set_draw_target(target);
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
            current: Arc::new(Mutex::new(String::new())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb = self.pb.clone();
        let current = self.current.clone();

        Box::new(move |progress: Progress| {
            let (Ok(pb), Ok(mut current)) = (pb.lock(), current.lock()) else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::BatchStart { total_residues } => {
                    pb.reset();
                    pb.set_length(total_residues);
                    pb.set_position(0);
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
                Progress::ResidueStart { path, .. } => {
                    *current = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    pb.set_message(current.clone());
                }
                Progress::StageStart { name } => {
                    pb.set_message(format!("{}: {}", current, name));
                }
                Progress::ResidueFinish { succeeded } => {
                    if !succeeded {
                        pb.println(format!("  ✗ {}", current));
                    }
                    pb.inc(1);
                }
                Progress::BatchFinish => {
                    pb.disable_steady_tick();
                    pb.finish_with_message("✓ Done");
                }
                Progress::Message(msg) => {
                    pb.println(format!("  {}", msg));
                }
            }
        })
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .expect("Failed to create bar style template")
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::thread;

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = CliProgressHandler::hidden();
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.length(), Some(0));
        assert!(pb.is_finished());
    }

    #[test]
    fn callback_tracks_the_batch() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        callback(Progress::BatchStart { total_residues: 2 });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.length(), Some(2));
            assert_eq!(pb.position(), 0);
            assert!(!pb.is_finished());
        }

        callback(Progress::ResidueStart {
            index: 0,
            path: PathBuf::from("inputs/XYZ.cif"),
        });
        callback(Progress::StageStart { name: "Capping" });
        assert_eq!(handler.pb.lock().unwrap().message(), "XYZ.cif: Capping");

        callback(Progress::ResidueFinish { succeeded: true });
        assert_eq!(handler.pb.lock().unwrap().position(), 1);

        callback(Progress::ResidueFinish { succeeded: false });
        callback(Progress::BatchFinish);
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.position(), 2);
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "✓ Done");
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::BatchStart { total_residues: 1 });
            callback(Progress::ResidueFinish { succeeded: true });
            callback(Progress::BatchFinish);
        })
        .join()
        .unwrap();

        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "✓ Done");
    }
}
