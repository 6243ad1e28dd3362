//! Progress accumulator for a streaming research run.
//!
//! The tracker is owned by the stream reducer, which is its only writer.
//! Readers get owned [`ProgressSnapshot`] copies.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::Clock;
use crate::model::ToolKind;

/// Number of recent actions kept for display.
pub const MAX_RECENT_ACTIONS: usize = 5;

/// Category of a recorded action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionTag {
    System,
    Web,
    Code,
    Mcp,
    File,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecentAction {
    pub tag: ActionTag,
    pub description: String,
    pub at: DateTime<Utc>,
}

/// Projected completion of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eta {
    /// No tool call observed yet, or no time elapsed, so there is no rate.
    Unknown,
    /// Budget exhausted or no measurable rate; finishing now.
    Imminent { finish_at: DateTime<Utc> },
    /// Whole minutes remaining (floored) and projected finish time.
    Remaining {
        minutes: u64,
        finish_at: DateTime<Utc>,
    },
}

impl Eta {
    pub fn finish_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Eta::Unknown => None,
            Eta::Imminent { finish_at } | Eta::Remaining { finish_at, .. } => Some(*finish_at),
        }
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Unknown => f.write_str("Calculating..."),
            Eta::Imminent { .. } => f.write_str("0 min"),
            Eta::Remaining { minutes: 0, .. } => f.write_str("< 1 min"),
            Eta::Remaining { minutes, .. } => write!(f, "{minutes} min"),
        }
    }
}

/// Live counters for one research run.
pub struct ProgressTracker {
    clock: Arc<dyn Clock>,
    model: String,
    started_at: DateTime<Utc>,
    tool_call_budget: u32,
    tool_calls_observed: u64,
    counts_by_kind: BTreeMap<ToolKind, u64>,
    recent_actions: VecDeque<RecentAction>,
}

impl ProgressTracker {
    pub fn new(tool_call_budget: u32, model: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            model: model.into(),
            started_at,
            tool_call_budget,
            tool_calls_observed: 0,
            counts_by_kind: BTreeMap::new(),
            recent_actions: VecDeque::with_capacity(MAX_RECENT_ACTIONS + 1),
        }
    }

    pub fn record_tool_call(&mut self, kind: ToolKind) {
        self.tool_calls_observed = self.tool_calls_observed.saturating_add(1);
        let count = self.counts_by_kind.entry(kind).or_insert(0);
        *count = count.saturating_add(1);
    }

    pub fn record_action(&mut self, tag: ActionTag, description: impl Into<String>) {
        self.recent_actions.push_back(RecentAction {
            tag,
            description: description.into(),
            at: self.clock.now(),
        });
        while self.recent_actions.len() > MAX_RECENT_ACTIONS {
            self.recent_actions.pop_front();
        }
    }

    pub fn tool_calls_observed(&self) -> u64 {
        self.tool_calls_observed
    }

    pub fn count(&self, kind: ToolKind) -> u64 {
        self.counts_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn counts_by_kind(&self) -> &BTreeMap<ToolKind, u64> {
        &self.counts_by_kind
    }

    pub fn recent_actions(&self) -> impl Iterator<Item = &RecentAction> {
        self.recent_actions.iter()
    }

    pub fn elapsed(&self) -> Duration {
        (self.clock.now() - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Observed calls over the budget, clamped to `[0, 1]`. Zero budget yields 0.
    pub fn completion_ratio(&self) -> f64 {
        if self.tool_call_budget == 0 {
            return 0.0;
        }
        (self.tool_calls_observed as f64 / f64::from(self.tool_call_budget)).clamp(0.0, 1.0)
    }

    /// Linear projection from the average tool-call rate so far.
    pub fn estimate_remaining(&self) -> Eta {
        if self.tool_calls_observed == 0 {
            return Eta::Unknown;
        }
        let now = self.clock.now();
        let remaining_calls = i128::from(self.tool_call_budget) - i128::from(self.tool_calls_observed);
        if remaining_calls <= 0 {
            return Eta::Imminent { finish_at: now };
        }
        // Calls left but no time measured yet: the rate is undefined.
        let elapsed_secs = self.elapsed().as_secs_f64();
        if elapsed_secs <= 0.0 {
            return Eta::Unknown;
        }
        let rate = self.tool_calls_observed as f64 / elapsed_secs;
        if rate == 0.0 {
            return Eta::Imminent { finish_at: now };
        }
        let remaining_secs = remaining_calls as f64 / rate;
        let finish_at = now
            .checked_add_signed(TimeDelta::milliseconds((remaining_secs * 1000.0).round() as i64))
            .unwrap_or(now);
        Eta::Remaining {
            minutes: (remaining_secs / 60.0).floor() as u64,
            finish_at,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            model: self.model.clone(),
            started_at: self.started_at,
            elapsed: self.elapsed(),
            tool_call_budget: self.tool_call_budget,
            tool_calls_observed: self.tool_calls_observed,
            counts_by_kind: self.counts_by_kind.clone(),
            recent_actions: self.recent_actions.iter().cloned().collect(),
            completion_ratio: self.completion_ratio(),
            eta: self.estimate_remaining(),
        }
    }
}

/// Owned, read-only copy of the tracker state and its derived metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSnapshot {
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub tool_call_budget: u32,
    pub tool_calls_observed: u64,
    pub counts_by_kind: BTreeMap<ToolKind, u64>,
    pub recent_actions: Vec<RecentAction>,
    pub completion_ratio: f64,
    pub eta: Eta,
}

impl ProgressSnapshot {
    pub fn count(&self, kind: ToolKind) -> u64 {
        self.counts_by_kind.get(&kind).copied().unwrap_or(0)
    }
}
