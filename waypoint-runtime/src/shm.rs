// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Shared-memory campaign maps
//!
//! The fuzzer maps four regions before the target starts and hands the file
//! descriptors over; inside the target they back the externally linked map
//! pointers. The target process is the sole writer while it runs and the
//! fuzzer reads only after the target exits, so plain non-atomic access is
//! safe on both sides.
//!
//! Regions are sealed memfds: once the writer mapping exists the size and
//! the seals can never change, which keeps a misbehaving target from
//! resizing the mapping under the fuzzer.

use anyhow::{ensure, Result};
use memfd::{FileSeal, Memfd, MemfdOptions};
use memmap2::{Mmap, MmapMut, MmapOptions};
use waypoint_instrument::layout::{DISTANCE_OFFSET, STEP_OFFSET, TARGET_FLAGS_OFFSET};

/// One sealed shared-memory region
#[derive(Debug)]
pub struct ShmRegion {
    pub size: usize,
    memfd: Memfd,
}

impl ShmRegion {
    pub fn try_new<S>(name: S, size: usize) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let opts = MemfdOptions::default().allow_sealing(true);
        let memfd = opts.create(name)?;

        memfd.as_file().set_len(size as u64)?;
        memfd.add_seal(FileSeal::SealShrink)?;
        memfd.add_seal(FileSeal::SealGrow)?;

        Ok(Self { size, memfd })
    }

    pub fn try_clone(&self) -> Result<Self> {
        let backing_file = self.memfd.as_file().try_clone()?;
        let memfd = Memfd::try_from_file(backing_file)
            .map_err(|_| anyhow::anyhow!("could not adopt backing file"))?;

        Ok(Self {
            size: self.size,
            memfd,
        })
    }

    /// A writable mapping; also seals the region against future reseals.
    pub fn writer(&mut self) -> Result<ShmWriter> {
        let mmap = unsafe { MmapOptions::new().map_mut(self.memfd.as_file())? };

        self.memfd.add_seal(FileSeal::SealSeal)?;

        Ok(ShmWriter {
            size: self.size,
            mmap,
        })
    }

    /// A read-only mapping for the fuzzer side.
    pub fn reader(&self) -> Result<ShmReader> {
        let mmap = unsafe { MmapOptions::new().map(self.memfd.as_file())? };
        Ok(ShmReader {
            size: self.size,
            mmap,
        })
    }
}

/// Writable mapping of a region
pub struct ShmWriter {
    size: usize,
    mmap: MmapMut,
}

impl ShmWriter {
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn write_at(&mut self, data: &[u8], offset: usize) -> Result<()> {
        ensure!(data.len() + offset <= self.size, "write past region end");
        self.mmap.as_mut()[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Zeroes the whole region between executions.
    pub fn reset(&mut self) {
        self.mmap.as_mut().fill(0);
    }
}

/// Read-only mapping of a region
pub struct ShmReader {
    size: usize,
    mmap: Mmap,
}

impl ShmReader {
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn read_at(&self, len: usize, offset: usize) -> Result<&[u8]> {
        ensure!(len + offset <= self.size, "read past region end");
        Ok(&self.mmap.as_ref()[offset..offset + len])
    }

    fn read_u64(&self, offset: usize) -> Result<u64> {
        let bytes = self.read_at(8, offset)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_ne_bytes(raw))
    }
}

/// The four campaign regions with layout-aware accessors
pub struct CampaignMaps {
    /// Coverage bytes, distance accumulator, step counter, target flags
    pub area: ShmRegion,
    /// One byte per basic block id
    pub critical: ShmRegion,
    /// One byte per condition id
    pub cond: ShmRegion,
    /// Two u64 operand snapshots per condition id
    pub cvar: ShmRegion,
}

impl CampaignMaps {
    /// Creates all regions for a campaign over `num_targets` targets,
    /// `num_blocks` instrumentable blocks and `num_conditions` recorded
    /// conditions.
    pub fn try_new(num_targets: usize, num_blocks: usize, num_conditions: usize) -> Result<Self> {
        Ok(Self {
            area: ShmRegion::try_new("waypoint_area", TARGET_FLAGS_OFFSET + num_targets)?,
            critical: ShmRegion::try_new("waypoint_critical", num_blocks.max(1))?,
            // Condition ids start at 1, so one extra slot keeps indexing direct
            cond: ShmRegion::try_new("waypoint_cond", num_conditions + 1)?,
            cvar: ShmRegion::try_new("waypoint_cvar", 16 * (num_conditions + 1))?,
        })
    }

    /// The accumulated block distance of the last execution.
    pub fn distance(reader: &ShmReader) -> Result<u64> {
        reader.read_u64(DISTANCE_OFFSET)
    }

    /// The number of instrumented blocks the last execution stepped
    /// through.
    pub fn steps(reader: &ShmReader) -> Result<u64> {
        reader.read_u64(STEP_OFFSET)
    }

    /// Whether the target with this index was reached.
    pub fn target_hit(reader: &ShmReader, target_idx: usize) -> Result<bool> {
        Ok(reader.read_at(1, TARGET_FLAGS_OFFSET + target_idx)?[0] != 0)
    }

    /// The critical-map flag of a block id: 0 untouched, 1 critical edge
    /// taken, 2 solved edge taken.
    pub fn critical_flag(reader: &ShmReader, block_id: usize) -> Result<u8> {
        Ok(reader.read_at(1, block_id)?[0])
    }

    /// The recorded branch outcome of a condition id: 0 untouched,
    /// 1 false, 2 true.
    pub fn condition_outcome(reader: &ShmReader, cond_id: usize) -> Result<u8> {
        Ok(reader.read_at(1, cond_id)?[0])
    }

    /// The left/right operand snapshots of a condition id.
    pub fn condition_operands(reader: &ShmReader, cond_id: usize) -> Result<(u64, u64)> {
        Ok((
            reader.read_u64(16 * cond_id)?,
            reader.read_u64(16 * cond_id + 8)?,
        ))
    }
}
