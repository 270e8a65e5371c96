use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::history::ProcessingEntry;
use crate::processor::Mode;

pub const DEFAULT_RECENT_WINDOW_SECS: i64 = 60;

/// Summary counters over the history. Recomputed on every read because the
/// recent count moves with the clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_operations: usize,
    pub average_processing_time_ms: u64,
    pub recent_operations: usize,
}

impl Stats {
    pub fn compute<'a, I>(entries: I, now: DateTime<Utc>, window: Duration) -> Stats
    where
        I: IntoIterator<Item = &'a ProcessingEntry>,
    {
        let mut total = 0usize;
        let mut sum = 0u64;
        let mut recent = 0usize;

        for entry in entries {
            total += 1;
            sum += entry.processing_time;
            if now.signed_duration_since(entry.timestamp) < window {
                recent += 1;
            }
        }

        let average = if total == 0 {
            0
        } else {
            (sum as f64 / total as f64).round() as u64
        };

        Stats {
            total_operations: total,
            average_processing_time_ms: average,
            recent_operations: recent,
        }
    }
}

/// Spread of processing times. Only defined with at least two entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Performance {
    pub fastest_ms: u64,
    pub slowest_ms: u64,
    pub std_dev_ms: f64,
}

impl Performance {
    pub fn compute<'a, I>(entries: I) -> Option<Performance>
    where
        I: IntoIterator<Item = &'a ProcessingEntry>,
    {
        let times: Vec<u64> = entries.into_iter().map(|e| e.processing_time).collect();
        if times.len() < 2 {
            return None;
        }

        let fastest = times.iter().copied().min()?;
        let slowest = times.iter().copied().max()?;
        let n = times.len() as f64;
        let mean = times.iter().sum::<u64>() as f64 / n;
        // sample variance
        let variance = times
            .iter()
            .map(|&t| {
                let d = t as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / (n - 1.0);

        Some(Performance {
            fastest_ms: fastest,
            slowest_ms: slowest,
            std_dev_ms: variance.sqrt(),
        })
    }
}

/// Uses per mode, in selector order, skipping unused modes.
pub fn mode_distribution<'a, I>(entries: I) -> Vec<(Mode, usize)>
where
    I: IntoIterator<Item = &'a ProcessingEntry>,
{
    let mut counts = [0usize; Mode::ALL.len()];
    for entry in entries {
        if let Some(slot) = Mode::ALL.iter().position(|m| *m == entry.mode) {
            counts[slot] += 1;
        }
    }

    Mode::ALL
        .into_iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .collect()
}
