// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Shared-memory campaign map checks: layout offsets, cross-mapping
//! visibility, and the between-executions reset

use anyhow::Result;
use waypoint_instrument::layout::{DISTANCE_OFFSET, MAP_SIZE, STEP_OFFSET, TARGET_FLAGS_OFFSET};
use waypoint_runtime::CampaignMaps;

#[test]
fn layout_offsets_are_contiguous() {
    assert_eq!(MAP_SIZE, 1 << 18);
    assert_eq!(DISTANCE_OFFSET, MAP_SIZE);
    assert_eq!(STEP_OFFSET, MAP_SIZE + 8);
    assert_eq!(TARGET_FLAGS_OFFSET, MAP_SIZE + 16);
}

#[test]
fn writes_are_visible_through_a_separate_reader_mapping() -> Result<()> {
    let mut maps = CampaignMaps::try_new(4, 16, 2)?;

    let mut writer = maps.area.writer()?;
    writer.write_at(&1234u64.to_ne_bytes(), DISTANCE_OFFSET)?;
    writer.write_at(&77u64.to_ne_bytes(), STEP_OFFSET)?;
    writer.write_at(&[1], TARGET_FLAGS_OFFSET + 2)?;

    let reader = maps.area.reader()?;
    assert_eq!(CampaignMaps::distance(&reader)?, 1234);
    assert_eq!(CampaignMaps::steps(&reader)?, 77);
    assert!(!CampaignMaps::target_hit(&reader, 0)?);
    assert!(CampaignMaps::target_hit(&reader, 2)?);

    Ok(())
}

#[test]
fn critical_and_condition_maps_read_back() -> Result<()> {
    let mut maps = CampaignMaps::try_new(1, 8, 2)?;

    let mut critical = maps.critical.writer()?;
    critical.write_at(&[1], 3)?;
    critical.write_at(&[2], 5)?;

    let reader = maps.critical.reader()?;
    assert_eq!(CampaignMaps::critical_flag(&reader, 3)?, 1);
    assert_eq!(CampaignMaps::critical_flag(&reader, 5)?, 2);
    assert_eq!(CampaignMaps::critical_flag(&reader, 0)?, 0);

    let mut cond = maps.cond.writer()?;
    cond.write_at(&[2], 1)?;
    let cond_reader = maps.cond.reader()?;
    assert_eq!(CampaignMaps::condition_outcome(&cond_reader, 1)?, 2);

    let mut cvar = maps.cvar.writer()?;
    cvar.write_at(&42u64.to_ne_bytes(), 16)?;
    cvar.write_at(&7u64.to_ne_bytes(), 24)?;
    let cvar_reader = maps.cvar.reader()?;
    assert_eq!(CampaignMaps::condition_operands(&cvar_reader, 1)?, (42, 7));

    Ok(())
}

#[test]
fn reset_zeroes_the_region() -> Result<()> {
    let mut maps = CampaignMaps::try_new(1, 4, 1)?;

    let mut writer = maps.area.writer()?;
    writer.write_at(&u64::MAX.to_ne_bytes(), DISTANCE_OFFSET)?;
    writer.write_at(&[1], TARGET_FLAGS_OFFSET)?;
    writer.reset();

    let reader = maps.area.reader()?;
    assert_eq!(CampaignMaps::distance(&reader)?, 0);
    assert!(!CampaignMaps::target_hit(&reader, 0)?);

    Ok(())
}

#[test]
fn recorded_executions_feed_the_scheduler() -> Result<()> {
    let mut maps = CampaignMaps::try_new(3, 4, 1)?;
    let mut states = vec![
        waypoint_runtime::TargetState::new(0.5),
        waypoint_runtime::TargetState::new(0.5),
        waypoint_runtime::TargetState::new(0.5),
    ];

    let mut writer = maps.area.writer()?;
    writer.write_at(&[1], TARGET_FLAGS_OFFSET)?;
    writer.write_at(&[1], TARGET_FLAGS_OFFSET + 2)?;

    let reader = maps.area.reader()?;
    waypoint_runtime::record_execution(&mut states, &reader)?;

    assert!(states[0].covered);
    assert_eq!(states[0].input_execs, 1);
    assert!(!states[1].covered);
    assert_eq!(states[1].input_execs, 0);
    assert!(states[2].covered);

    Ok(())
}

#[test]
fn writes_past_the_region_end_are_rejected() -> Result<()> {
    let mut maps = CampaignMaps::try_new(1, 4, 1)?;

    let mut writer = maps.critical.writer()?;
    assert!(writer.write_at(&[1], 4).is_err());

    let reader = maps.critical.reader()?;
    assert!(reader.read_at(1, 4).is_err());

    Ok(())
}
