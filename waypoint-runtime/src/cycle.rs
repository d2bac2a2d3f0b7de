// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Cycle-length policies
//!
//! The cycle length is the nominal number of input executions one
//! scheduling cycle distributes. It can stay fixed, grow linearly per
//! cycle, or grow with the logarithm of the campaign duration so long
//! campaigns spend more budget per target before the scheduler intervenes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Current cycle length together with its initial value
pub struct CycleLength {
    init: u64,
    current: u64,
}

impl CycleLength {
    pub fn new(init: u64) -> Self {
        Self {
            init,
            current: init,
        }
    }

    /// The cycle length to use for the next cycle
    pub fn get(&self) -> u64 {
        self.current
    }

    /// Fixed policy: always the initial length.
    pub fn update_fixed(&mut self) {
        self.current = self.init;
    }

    /// Linear policy: grow by `increment` per update.
    pub fn update_linear(&mut self, increment: u32) {
        self.current += u64::from(increment);
    }

    /// Logarithmic policy over the campaign duration in seconds.
    pub fn update_logarithmic(&mut self, duration_secs: u32) {
        self.current = ((duration_secs as f32 / 60.0 + 1.0).log2() * 1000.0) as u64 + self.init;
    }
}
