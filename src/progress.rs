use indicatif::ProgressBar;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mirrors the completion counter onto the bar every 100ms and finishes once
/// the target is reached. Purely advisory: the run never waits on it, and the
/// coordinator aborts it when a run ends early.
pub async fn monitor(pb: ProgressBar, completed: Arc<AtomicU64>, total: u64) {
    loop {
        let done = completed.load(Ordering::Relaxed);
        pb.set_position(done);
        if done >= total {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    pb.finish_with_message("finished");
}
