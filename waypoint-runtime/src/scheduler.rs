// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! The per-cycle target scheduler
//!
//! Each fuzzing cycle distributes a nominal number of input executions over
//! the targets by vulnerability score. Targets that received their share are
//! finished; targets that made no coverage progress are paused for a growing
//! number of cycles before they get another chance. When every target is
//! finished the campaign resets around the high-scoring ones; when every
//! target is finished or paused the fuzzer is told to fall back to plain
//! coverage exploration until something new turns up.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
/// Scheduling state of one target
pub enum TargetStatus {
    /// Received its execution share for the campaign
    Finished,
    /// Eligible for budget this cycle
    Active,
    /// Backing off; skipped for a number of cycles
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
/// What the fuzzer should spend the next cycle on
pub enum FuzzingMode {
    /// Bias input selection towards unfinished targets
    Directed,
    /// No target is making progress; explore general coverage
    CovBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Scheduler state for one target block
pub struct TargetState {
    pub status: TargetStatus,
    /// Score from the target list, in `[0, 1]`
    pub vuln_score: f64,
    /// Whether the target block was executed during the current cycle
    pub covered: bool,
    /// Input executions attributed to this target so far
    pub input_execs: u64,
    /// Remaining cycles to skip while paused
    pub cycle_skips: u32,
    /// Length of the previous pause; grows by one per non-progressing pause
    pub prev_cycle_skips: u32,
}

impl TargetState {
    pub fn new(vuln_score: f64) -> Self {
        Self {
            status: TargetStatus::Active,
            vuln_score,
            covered: false,
            input_execs: 0,
            cycle_skips: 0,
            prev_cycle_skips: 1,
        }
    }

    /// Marks the target as executed in the current cycle.
    pub fn mark_covered(&mut self) {
        self.covered = true;
    }

    /// Attributes `count` input executions to this target.
    pub fn add_execs(&mut self, count: u64) {
        self.input_execs += count;
    }

    fn reset(&mut self) {
        *self = Self::new(self.vuln_score);
    }
}

#[derive(Builder, Debug, Clone, Copy)]
/// Inputs of one `update_status` sweep
pub struct CycleParams {
    /// Nominal input executions to distribute this cycle
    pub cycle_length: u64,
    /// Fraction of the computed share to withhold, in `[0, 1]`; exactly 1
    /// collapses every share to a single execution
    #[builder(default = "0.0")]
    pub hc_reduct_factor: f64,
    /// Minimum score a target needs to survive a campaign reset
    #[builder(default = "0.5")]
    pub vuln_score_threshold: f64,
}

/// Folds one finished execution into the target states: every target whose
/// hit flag is raised in the shared area is marked covered and charged one
/// input execution.
///
/// Call after each target run, before the map is reset for the next input.
pub fn record_execution(
    states: &mut [TargetState],
    area: &crate::shm::ShmReader,
) -> anyhow::Result<()> {
    for (target_idx, state) in states.iter_mut().enumerate() {
        if crate::shm::CampaignMaps::target_hit(area, target_idx)? {
            state.mark_covered();
            state.add_execs(1);
        }
    }
    Ok(())
}

/// Runs one scheduling sweep over all targets and picks the campaign mode.
///
/// The sweep is a pure function of the states and the parameters: no
/// clocks, no randomness, O(n) over the targets.
pub fn update_status(states: &mut [TargetState], params: &CycleParams) -> FuzzingMode {
    let mut mode = FuzzingMode::Directed;

    let score_sum: f64 = states
        .iter()
        .filter(|state| {
            matches!(
                state.status,
                TargetStatus::Active | TargetStatus::Paused
            )
        })
        .map(|state| state.vuln_score)
        .sum();

    let mut paused = 0usize;
    let mut finished = 0usize;

    for (index, state) in states.iter_mut().enumerate() {
        if matches!(
            state.status,
            TargetStatus::Active | TargetStatus::Paused
        ) {
            let mut required =
                (params.cycle_length as f64 * (state.vuln_score / score_sum)).round() as i64;

            if params.hc_reduct_factor == 1.0 {
                required = 1;
            } else {
                required -= (required as f64 * params.hc_reduct_factor) as i64;
            }

            let owed = required - state.input_execs as i64;

            if owed <= 0 {
                // Whether active or paused: the target got its share, so it
                // is done for this campaign
                state.status = TargetStatus::Finished;
            } else if state.covered {
                // Progress reactivates immediately and clears the back-off
                state.status = TargetStatus::Active;
                state.cycle_skips = 0;
                state.prev_cycle_skips = 1;
            } else if state.cycle_skips == 0 {
                state.status = TargetStatus::Paused;
                state.cycle_skips = state.prev_cycle_skips;
                state.prev_cycle_skips += 1;
            } else if (state.cycle_skips - 1) == 0 {
                // Paused long enough; give it another chance
                state.status = TargetStatus::Active;
                state.cycle_skips = 0;
            } else {
                state.cycle_skips -= 1;
            }

            trace!(
                "target {}: required = {}, owed = {}, status = {}",
                index,
                required,
                owed,
                state.status
            );

            state.covered = false;
        }

        match state.status {
            TargetStatus::Paused => paused += 1,
            TargetStatus::Finished => finished += 1,
            TargetStatus::Active => {}
        }
    }

    let total = states.len();

    if finished == total {
        // Campaign exhausted; restart around the high-scoring targets
        debug!("All targets finished, resetting high-score targets");
        for state in states.iter_mut() {
            if state.vuln_score >= params.vuln_score_threshold {
                state.reset();
            }
        }
    } else if finished + paused == total {
        mode = FuzzingMode::CovBased;
    }

    mode
}
