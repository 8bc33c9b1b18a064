//! Pauses between API calls.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested pauses instead of sleeping.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingPause {
    pub pauses: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingPause {
    pub fn taken(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Pause for RecordingPause {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_pause_waits() {
        let start = tokio::time::Instant::now();
        TokioPause.pause(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_recording_pause_keeps_order() {
        let pause = RecordingPause::default();
        pause.pause(Duration::from_secs(1)).await;
        pause.pause(Duration::from_secs(5)).await;
        assert_eq!(
            pause.taken(),
            vec![Duration::from_secs(1), Duration::from_secs(5)]
        );
    }
}
