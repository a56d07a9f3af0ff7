use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::config::{local_hour, SpeakerConfig, DEFAULT_RATE_WPM};

/// Bounded buffer size of the announcement queue.
pub const QUEUE_CAPACITY: usize = 100;

#[async_trait]
/// Backend that performs one announcement and waits for it to finish.
pub trait Announcer: Send + Sync {
    async fn announce(&self, config: &SpeakerConfig, message: &str) -> Result<()>;
}

/// Announcer backed by the macOS `say` command.
pub struct SayAnnouncer;

#[async_trait]
impl Announcer for SayAnnouncer {
    async fn announce(&self, config: &SpeakerConfig, message: &str) -> Result<()> {
        let mut command = tokio::process::Command::new("say");
        command.kill_on_drop(true);
        if !config.voice.is_empty() {
            command.arg("-v").arg(&config.voice);
        }
        if config.rate_wpm != 0 && config.rate_wpm != DEFAULT_RATE_WPM {
            command.arg("-r").arg(config.rate_wpm.to_string());
        }
        command.arg(message);

        let status = command
            .status()
            .await
            .context("failed to launch the say command")?;
        if !status.success() {
            bail!("say exited with status {status}");
        }
        Ok(())
    }
}

type HourSource = Arc<dyn Fn() -> u32 + Send + Sync>;

struct SpeakerShared {
    config: RwLock<SpeakerConfig>,
    announcer: Arc<dyn Announcer>,
    hour_source: HourSource,
    dropped: AtomicUsize,
}

impl SpeakerShared {
    fn config_snapshot(&self) -> SpeakerConfig {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_default()
    }

    async fn deliver(&self, message: &str) {
        let config = self.config_snapshot();
        if !config.enabled {
            return;
        }
        if config.is_quiet_at((self.hour_source)()) {
            // Quiet window: discard, never defer.
            tracing::debug!(message, "announcement suppressed by quiet window");
            return;
        }
        if let Err(error) = self.announcer.announce(&config, message).await {
            // Audible feedback is a convenience, not a correctness
            // requirement.
            tracing::warn!(message, %error, "announcement failed");
        }
    }
}

/// Serializes announcements through a bounded queue and one consuming
/// worker, so no two announcements ever overlap.
pub struct Speaker {
    shared: Arc<SpeakerShared>,
    sender: Mutex<Option<mpsc::Sender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Speaker {
    pub fn new(config: SpeakerConfig) -> Self {
        Self::with_parts(config, Arc::new(SayAnnouncer), Arc::new(local_hour))
    }

    pub fn with_announcer(config: SpeakerConfig, announcer: Arc<dyn Announcer>) -> Self {
        Self::with_parts(config, announcer, Arc::new(local_hour))
    }

    fn with_parts(config: SpeakerConfig, announcer: Arc<dyn Announcer>, hour_source: HourSource) -> Self {
        let shared = Arc::new(SpeakerShared {
            config: RwLock::new(config),
            announcer,
            hour_source,
            dropped: AtomicUsize::new(0),
        });
        let (sender, mut receiver) = mpsc::channel::<String>(QUEUE_CAPACITY);
        let worker_shared = shared.clone();
        // Drain-then-stop: once every sender is gone the loop finishes the
        // buffered messages and exits.
        let worker = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                worker_shared.deliver(&message).await;
            }
        });
        Self {
            shared,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues a message without blocking the caller. When the buffer is
    /// full the new message is dropped with a diagnostic; caller latency
    /// wins over delivery guarantees.
    pub fn enqueue(&self, message: &str) {
        if !self.is_enabled() {
            return;
        }
        let Ok(guard) = self.sender.lock() else {
            return;
        };
        let Some(sender) = guard.as_ref() else {
            tracing::debug!(message, "speaker already closed, announcement dropped");
            return;
        };
        match sender.try_send(message.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(message, "announcement queue full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(message, "speaker already closed, announcement dropped");
            }
        }
    }

    /// Announces synchronously, bypassing the queue, for callers that must
    /// confirm audible output actually happened. Quiet-window suppression
    /// still applies.
    pub async fn speak_blocking(&self, message: &str) -> Result<()> {
        let config = self.shared.config_snapshot();
        if !config.enabled {
            return Ok(());
        }
        if config.is_quiet_at((self.shared.hour_source)()) {
            return Ok(());
        }
        self.shared.announcer.announce(&config, message).await
    }

    pub fn update_config(&self, config: SpeakerConfig) {
        if let Ok(mut guard) = self.shared.config.write() {
            *guard = config;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared
            .config
            .read()
            .map(|config| config.enabled)
            .unwrap_or(false)
    }

    pub fn set_enabled(&self, enabled: bool) {
        if let Ok(mut guard) = self.shared.config.write() {
            guard.enabled = enabled;
        }
    }

    /// Messages dropped because the queue was full.
    pub fn dropped_messages(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Stops intake, drains the buffered messages, and waits for the worker
    /// to exit. Safe to call any number of times.
    pub async fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;

    struct RecordingAnnouncer {
        delivered: Mutex<Vec<String>>,
        started: Notify,
        gate: Notify,
        hold_first: bool,
    }

    impl RecordingAnnouncer {
        fn new(hold_first: bool) -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                started: Notify::new(),
                gate: Notify::new(),
                hold_first,
            })
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().expect("delivered lock").clone()
        }
    }

    #[async_trait]
    impl Announcer for RecordingAnnouncer {
        async fn announce(&self, _config: &SpeakerConfig, message: &str) -> Result<()> {
            let first = {
                let guard = self.delivered.lock().expect("delivered lock");
                guard.is_empty()
            };
            if self.hold_first && first {
                self.started.notify_one();
                self.gate.notified().await;
            }
            self.delivered
                .lock()
                .expect("delivered lock")
                .push(message.to_string());
            Ok(())
        }
    }

    struct FailingAnnouncer;

    #[async_trait]
    impl Announcer for FailingAnnouncer {
        async fn announce(&self, _config: &SpeakerConfig, _message: &str) -> Result<()> {
            bail!("speech backend unavailable")
        }
    }

    fn quiet_config(start: u32, end: u32) -> SpeakerConfig {
        SpeakerConfig {
            quiet_start: start,
            quiet_end: end,
            ..SpeakerConfig::default()
        }
    }

    #[tokio::test]
    async fn functional_messages_are_delivered_in_fifo_order() {
        let announcer = RecordingAnnouncer::new(false);
        let speaker = Speaker::with_announcer(SpeakerConfig::default(), announcer.clone());

        for index in 0..5 {
            speaker.enqueue(&format!("message {index}"));
        }
        speaker.close().await;

        let delivered = announcer.delivered();
        assert_eq!(delivered.len(), 5);
        for (index, message) in delivered.iter().enumerate() {
            assert_eq!(message, &format!("message {index}"));
        }
    }

    #[tokio::test]
    async fn functional_overflow_drops_only_the_newest_message() {
        let announcer = RecordingAnnouncer::new(true);
        let speaker = Speaker::with_announcer(SpeakerConfig::default(), announcer.clone());

        // Park the worker on the first message so the buffer stays full.
        speaker.enqueue("blocked");
        announcer.started.notified().await;

        for index in 0..QUEUE_CAPACITY {
            speaker.enqueue(&format!("queued {index}"));
        }
        assert_eq!(speaker.dropped_messages(), 0);

        speaker.enqueue("overflow");
        assert_eq!(speaker.dropped_messages(), 1);

        announcer.gate.notify_one();
        speaker.close().await;

        let delivered = announcer.delivered();
        assert_eq!(delivered.len(), 1 + QUEUE_CAPACITY);
        assert_eq!(delivered[0], "blocked");
        for index in 0..QUEUE_CAPACITY {
            assert_eq!(delivered[index + 1], format!("queued {index}"));
        }
        assert!(!delivered.contains(&"overflow".to_string()));
    }

    #[tokio::test]
    async fn functional_close_drains_buffered_messages_before_stopping() {
        let announcer = RecordingAnnouncer::new(false);
        let speaker = Speaker::with_announcer(SpeakerConfig::default(), announcer.clone());

        for index in 0..10 {
            speaker.enqueue(&format!("pending {index}"));
        }
        speaker.close().await;

        assert_eq!(announcer.delivered().len(), 10);
    }

    #[tokio::test]
    async fn unit_close_is_idempotent_and_stops_intake() {
        let announcer = RecordingAnnouncer::new(false);
        let speaker = Speaker::with_announcer(SpeakerConfig::default(), announcer.clone());

        speaker.close().await;
        speaker.close().await;
        speaker.enqueue("after close");

        assert!(announcer.delivered().is_empty());
    }

    #[tokio::test]
    async fn unit_disabled_speaker_enqueues_nothing() {
        let announcer = RecordingAnnouncer::new(false);
        let config = SpeakerConfig {
            enabled: false,
            ..SpeakerConfig::default()
        };
        let speaker = Speaker::with_announcer(config, announcer.clone());

        speaker.enqueue("silent");
        speaker.close().await;

        assert!(announcer.delivered().is_empty());
    }

    #[tokio::test]
    async fn functional_quiet_window_discards_instead_of_deferring() {
        let announcer = RecordingAnnouncer::new(false);
        let speaker = Speaker::with_parts(
            quiet_config(22, 7),
            announcer.clone(),
            Arc::new(|| 23),
        );

        speaker.enqueue("night message");
        speaker
            .speak_blocking("night blocking message")
            .await
            .expect("suppressed, not an error");
        speaker.close().await;

        assert!(announcer.delivered().is_empty());
    }

    #[tokio::test]
    async fn functional_speak_blocking_outside_quiet_window_delivers() {
        let announcer = RecordingAnnouncer::new(false);
        let speaker = Speaker::with_parts(
            quiet_config(22, 7),
            announcer.clone(),
            Arc::new(|| 10),
        );

        speaker.speak_blocking("daytime message").await.expect("delivered");
        speaker.close().await;

        assert_eq!(announcer.delivered(), vec!["daytime message".to_string()]);
    }

    #[tokio::test]
    async fn regression_announcement_failure_never_escapes_the_worker() {
        let speaker =
            Speaker::with_announcer(SpeakerConfig::default(), Arc::new(FailingAnnouncer));

        speaker.enqueue("doomed");
        // Draining close would hang if the worker died on the error.
        speaker.close().await;
    }

    #[tokio::test]
    async fn unit_speak_blocking_propagates_backend_errors() {
        let speaker =
            Speaker::with_announcer(SpeakerConfig::default(), Arc::new(FailingAnnouncer));

        let error = speaker
            .speak_blocking("self test")
            .await
            .expect_err("backend failure surfaces to the caller");
        assert!(error.to_string().contains("speech backend unavailable"));
        speaker.close().await;
    }
}
