use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::error::{ModeParseError, ProcessError};
use crate::history::Processed;

/// The text transforms offered by the mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Uppercase,
    Reverse,
    Count,
    Hash,
    Md5,
    WordFrequency,
}

impl Mode {
    /// Selector order.
    pub const ALL: [Mode; 6] = [
        Mode::Uppercase,
        Mode::Reverse,
        Mode::Count,
        Mode::Hash,
        Mode::Md5,
        Mode::WordFrequency,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Mode::Uppercase => "uppercase",
            Mode::Reverse => "reverse",
            Mode::Count => "count",
            Mode::Hash => "hash",
            Mode::Md5 => "md5",
            Mode::WordFrequency => "word_frequency",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Uppercase => "Uppercase",
            Mode::Reverse => "Reverse",
            Mode::Count => "Count",
            Mode::Hash => "Hash",
            Mode::Md5 => "MD5 Hash",
            Mode::WordFrequency => "Word Frequency",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mode::Uppercase => "Convert text to uppercase letters",
            Mode::Reverse => "Reverse the input string",
            Mode::Count => "Count characters and words",
            Mode::Hash => "Generate base64 hash",
            Mode::Md5 => "Generate MD5 hash of the input",
            Mode::WordFrequency => "Find the most frequent word in text",
        }
    }

    fn position(self) -> usize {
        // ALL covers every variant, so the fallback is never taken
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0)
    }

    pub fn next(self) -> Mode {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Mode {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Applies the transform. Total for every input, including the empty string.
    pub fn apply(self, input: &str) -> String {
        match self {
            Mode::Uppercase => input.to_uppercase(),
            Mode::Reverse => input.chars().rev().collect(),
            Mode::Count => format!(
                "Characters: {}, Words: {}",
                input.chars().count(),
                input.split_whitespace().count()
            ),
            Mode::Hash => format!("Hash: {}", STANDARD.encode(input.as_bytes())),
            Mode::Md5 => format!("MD5: {}", md5_hex(input)),
            Mode::WordFrequency => most_frequent_word(input),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(wanted) || m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ModeParseError::Unknown(wanted.to_string()))
    }
}

fn md5_hex(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn most_frequent_word(input: &str) -> String {
    let lowered = input.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    // first-seen order decides ties
    let mut order: Vec<&str> = Vec::new();

    for token in lowered.split_whitespace() {
        let word = token.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | '"' | ';'));
        if word.is_empty() {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for word in order {
        let count = counts[word];
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((word, count));
        }
    }

    match best {
        Some((word, count)) => format!("Most frequent word: '{}' ({} times)", word, count),
        None => "No words found".to_string(),
    }
}

/// Bounds of the artificial processing delay, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        DelayRange { min_ms, max_ms }
    }

    pub fn none() -> Self {
        DelayRange { min_ms: 0, max_ms: 0 }
    }

    /// Uniform draw from `[min, max)`; `min` when the range is empty.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::rng().random_range(self.min_ms..self.max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        DelayRange::new(500, 1500)
    }
}

/// Held for the whole lifetime of one operation. Dropping it puts the
/// processor back to idle.
#[derive(Debug)]
pub struct BusyPermit {
    _permit: OwnedSemaphorePermit,
}

/// Runs transforms behind a busy/idle gate: at most one operation is in
/// flight, further requests are rejected rather than queued.
#[derive(Debug, Clone)]
pub struct Processor {
    delay: DelayRange,
    gate: Arc<Semaphore>,
}

impl Processor {
    pub fn new(delay: DelayRange) -> Self {
        Processor {
            delay,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Validates the input and moves the gate from idle to processing.
    pub fn try_begin(&self, input: &str) -> Result<BusyPermit, ProcessError> {
        if input.trim().is_empty() {
            return Err(ProcessError::InvalidInput);
        }
        let permit = Arc::clone(&self.gate)
            .try_acquire_owned()
            .map_err(|_| ProcessError::Busy)?;
        Ok(BusyPermit { _permit: permit })
    }

    /// Waits out the artificial delay, then transforms. The reported time
    /// covers the wait.
    pub async fn run(&self, input: String, mode: Mode) -> Processed {
        let started = Instant::now();
        tokio::time::sleep(self.delay.sample()).await;
        let output = mode.apply(&input);
        let processing_time = started.elapsed().as_millis() as u64;

        Processed {
            input,
            output,
            mode,
            processing_time,
        }
    }

    pub async fn process(&self, input: String, mode: Mode) -> Result<Processed, ProcessError> {
        let permit = self.try_begin(&input)?;
        let processed = self.run(input, mode).await;
        drop(permit);
        Ok(processed)
    }
}
