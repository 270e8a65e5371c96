use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::ProcessError;
use crate::history::{HistoryStore, Processed, ProcessingEntry};
use crate::processor::{Mode, Processor};
use crate::stats::{mode_distribution, Performance, Stats};

/// The processing pipeline behind the dashboard: submissions go through the
/// processor's busy gate, completions land in history and are then announced
/// on the channel returned by [`Session::new`].
pub struct Session {
    processor: Processor,
    history: Arc<Mutex<HistoryStore>>,
    recent_window: chrono::Duration,
    runtime: Handle,
    completions: mpsc::UnboundedSender<Processed>,
}

impl Session {
    pub fn new(
        processor: Processor,
        history: HistoryStore,
        recent_window: chrono::Duration,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<Processed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            processor,
            history: Arc::new(Mutex::new(history)),
            recent_window,
            runtime,
            completions: tx,
        };
        (session, rx)
    }

    /// Starts processing `text` in the background. Rejected requests leave
    /// history untouched.
    pub fn submit_processing(&self, text: impl Into<String>, mode: Mode) -> Result<(), ProcessError> {
        let text = text.into();
        let permit = match self.processor.try_begin(&text) {
            Ok(permit) => permit,
            Err(e) => {
                debug!(mode = mode.id(), reason = %e, "processing request rejected");
                return Err(e);
            }
        };
        debug!(mode = mode.id(), chars = text.chars().count(), "processing submitted");

        // The task needs owned handles: clones share the same gate and store
        let processor = self.processor.clone();
        let history = Arc::clone(&self.history);
        let completions = self.completions.clone();

        // 'async move' takes ownership of everything captured, permit included
        self.runtime.spawn(async move {
            let processed = processor.run(text, mode).await;
            let id = lock(&history).add(processed.clone()).id;
            info!(
                id,
                mode = processed.mode.id(),
                processing_time_ms = processed.processing_time,
                "processing finished"
            );
            // Back to idle only after the entry is in history
            drop(permit);
            // the entry is recorded even when nobody listens any more
            let _ = completions.send(processed);
        });

        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.processor.is_busy()
    }

    pub fn history(&self) -> Vec<ProcessingEntry> {
        lock(&self.history).snapshot()
    }

    pub fn lifetime_operations(&self) -> u64 {
        lock(&self.history).lifetime_operations()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Stats {
        Stats::compute(lock(&self.history).iter(), now, self.recent_window)
    }

    pub fn performance(&self) -> Option<Performance> {
        Performance::compute(lock(&self.history).iter())
    }

    pub fn mode_distribution(&self) -> Vec<(Mode, usize)> {
        mode_distribution(lock(&self.history).iter())
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
        info!("history cleared");
    }
}

fn lock(history: &Mutex<HistoryStore>) -> MutexGuard<'_, HistoryStore> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::DelayRange;

    fn session(delay: DelayRange) -> (Session, mpsc::UnboundedReceiver<Processed>) {
        Session::new(
            Processor::new(delay),
            HistoryStore::default(),
            chrono::Duration::seconds(60),
            Handle::current(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn completed_submission_is_recorded_and_announced() {
        let (session, mut done) = session(DelayRange::new(500, 1500));

        session.submit_processing("Hello World", Mode::Count).unwrap();
        assert!(session.is_busy());

        let processed = done.recv().await.unwrap();
        assert_eq!(processed.output, "Characters: 11, Words: 2");
        assert!(processed.processing_time >= 500 && processed.processing_time <= 1500);
        assert!(!session.is_busy());

        let history = session.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].input, "Hello World");
        assert_eq!(history[0].mode, Mode::Count);
        assert_eq!(history[0].processing_time, processed.processing_time);

        let stats = session.stats(Utc::now());
        assert_eq!(stats.total_operations, 1);
        assert_eq!(stats.recent_operations, 1);
        assert_eq!(stats.average_processing_time_ms, processed.processing_time);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_while_in_flight_is_rejected() {
        let (session, mut done) = session(DelayRange::new(1000, 1000));

        session.submit_processing("abc", Mode::Reverse).unwrap();
        assert_eq!(
            session.submit_processing("def", Mode::Reverse),
            Err(ProcessError::Busy)
        );

        let processed = done.recv().await.unwrap();
        assert_eq!(processed.output, "cba");
        assert_eq!(session.history().len(), 1);

        // idle again
        session.submit_processing("test", Mode::Hash).unwrap();
        assert_eq!(done.recv().await.unwrap().output, "Hash: dGVzdA==");
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_submission_is_rejected() {
        let (session, _done) = session(DelayRange::none());

        assert_eq!(
            session.submit_processing("   ", Mode::Uppercase),
            Err(ProcessError::InvalidInput)
        );
        assert!(!session.is_busy());
        assert!(session.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn history_stays_bounded_across_many_submissions() {
        let (session, mut done) = session(DelayRange::none());

        for n in 0..51 {
            session.submit_processing(format!("run {n}"), Mode::Uppercase).unwrap();
            done.recv().await.unwrap();
        }

        let history = session.history();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].input, "run 50");
        assert_eq!(history[49].input, "run 1");
        assert_eq!(session.lifetime_operations(), 51);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_resets_history_and_stats() {
        let (session, mut done) = session(DelayRange::new(600, 600));
        assert_eq!(session.stats(Utc::now()), Stats::default());

        session.submit_processing("one", Mode::Uppercase).unwrap();
        done.recv().await.unwrap();
        session.submit_processing("two", Mode::Hash).unwrap();
        done.recv().await.unwrap();

        assert_eq!(
            session.mode_distribution(),
            vec![(Mode::Uppercase, 1), (Mode::Hash, 1)]
        );
        assert!(session.performance().is_some());

        session.clear_history();
        assert!(session.history().is_empty());
        assert_eq!(session.stats(Utc::now()), Stats::default());
        assert!(session.performance().is_none());
    }
}
