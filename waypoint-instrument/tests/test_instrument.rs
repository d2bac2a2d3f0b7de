// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Rewriter and artefact-writer checks over a small analyzed module

use std::fs::read_to_string;
use tempdir::TempDir;
use waypoint_analysis::{analyze, Target};
use waypoint_instrument::{
    artifacts,
    layout::{AREA_PTR, CRITICAL_BB_PTR, TARGET_FLAGS_OFFSET},
    instrument_module,
};
use waypoint_ir::{
    ids::assign_block_ids, Block, Function, Global, Inst, Module, Op, Terminator, Value,
};

fn analyzed_module() -> (Module, waypoint_analysis::AnalysisState) {
    // f: 0 branches to {1, 2}; 1 -> 3 (target); 2 and 3 return.
    // Block 0 compares a 32-bit local against 5, so the condition is
    // recorded; block 2 leaves the tainted region and is critical.
    let mut module = Module {
        name: "prog".to_string(),
        dwarf_version: 4,
        globals: Vec::<Global>::new(),
        functions: vec![Function {
            name: "f".to_string(),
            filename: "prog.c".to_string(),
            line: Some(10),
            is_declaration: false,
            blocks: vec![
                Block {
                    id: None,
                    insts: vec![
                        Inst::new(Op::Phi {
                            dest: "p".to_string(),
                        }),
                        Inst::with_line(
                            Op::Cmp {
                                dest: "c".to_string(),
                                lhs: Value::Local {
                                    name: "x".to_string(),
                                    width: Some(32),
                                },
                                rhs: Value::ConstInt {
                                    width: 32,
                                    value: 5,
                                },
                            },
                            10,
                        ),
                    ],
                    term: Terminator::Branch {
                        cond: Value::Local {
                            name: "c".to_string(),
                            width: Some(1),
                        },
                        then_dest: 1,
                        else_dest: 2,
                    },
                },
                Block {
                    id: None,
                    insts: vec![Inst::with_line(Op::Other, 11)],
                    term: Terminator::Jump { dest: 3 },
                },
                Block {
                    id: None,
                    insts: vec![Inst::with_line(Op::Other, 12)],
                    term: Terminator::Return,
                },
                Block {
                    id: None,
                    insts: vec![Inst::with_line(Op::Other, 13)],
                    term: Terminator::Return,
                },
            ],
        }],
    };
    assign_block_ids(&mut module);

    let state = analyze(
        &module,
        &[Target {
            filename: "prog.c".to_string(),
            line: 13,
            score: 0.9,
        }],
    )
    .expect("analysis succeeds");

    (module, state)
}

#[test]
fn probes_land_after_phis_and_are_marked() {
    let (mut module, state) = analyzed_module();
    let summary = instrument_module(&mut module, &state);

    assert_eq!(summary.distance_probes, 3);
    assert_eq!(summary.critical_probes, 1);
    assert_eq!(summary.solved_probes, 1);
    assert_eq!(summary.condition_probes, 1);

    let entry = &module.functions[0].blocks[0];
    // The phi stays first; the probe sequence begins right after it
    assert!(entry.insts[0].is_phi());
    assert!(matches!(
        &entry.insts[1].op,
        Op::LoadPtr { global, .. } if global == AREA_PTR
    ));

    for block in &module.functions[0].blocks {
        for inst in &block.insts {
            if inst.nosanitize {
                assert_eq!(inst.line, None);
            }
        }
    }

    // Every map pointer is declared exactly once
    for name in [AREA_PTR, CRITICAL_BB_PTR] {
        assert_eq!(
            module.globals.iter().filter(|g| g.name == name).count(),
            1
        );
    }
}

#[test]
fn critical_and_solved_successors_flag_the_decision() {
    let (mut module, state) = analyzed_module();
    instrument_module(&mut module, &state);

    // Block 2 is the critical successor: it stores 1 at the source id
    let critical = &module.functions[0].blocks[2];
    assert!(matches!(
        &critical.insts[0].op,
        Op::LoadPtr { global, .. } if global == CRITICAL_BB_PTR
    ));
    assert!(critical.insts.iter().any(|inst| matches!(
        &inst.op,
        Op::Store { width: 8, value: Value::ConstInt { value: 1, .. }, .. }
    )));

    // Block 1 is solved: it stores 2, then runs its own distance probe
    let solved = &module.functions[0].blocks[1];
    assert!(solved.insts.iter().any(|inst| matches!(
        &inst.op,
        Op::Store { width: 8, value: Value::ConstInt { value: 2, .. }, .. }
    )));
    assert!(solved.insts.iter().any(|inst| matches!(
        &inst.op,
        Op::LoadPtr { global, .. } if global == AREA_PTR
    )));
}

#[test]
fn target_block_raises_its_hit_flag() {
    let (mut module, state) = analyzed_module();
    instrument_module(&mut module, &state);

    let expected_offset = TARGET_FLAGS_OFFSET as i64;
    let target = &module.functions[0].blocks[3];
    assert!(target.insts.iter().any(|inst| matches!(
        &inst.op,
        Op::Gep { offset: Value::ConstInt { value, .. }, .. } if *value == expected_offset
    )));
}

#[test]
fn condition_probe_precedes_the_terminator() {
    let (mut module, state) = analyzed_module();
    instrument_module(&mut module, &state);

    let branching = &module.functions[0].blocks[0];
    let last = branching.insts.last().expect("instrumented block");
    // The operand snapshot is the final store before the branch
    assert!(matches!(&last.op, Op::Store { width: 64, .. }));
    assert!(branching.insts.iter().any(|inst| matches!(
        &inst.op,
        Op::Cast { kind: waypoint_ir::CastKind::Sext, width: 64, .. }
    )));
}

#[test]
fn rewriting_never_touches_control_flow() {
    let (mut module, state) = analyzed_module();
    let terms_before: Vec<_> = module.functions[0]
        .blocks
        .iter()
        .map(|block| block.term.clone())
        .collect();

    instrument_module(&mut module, &state);

    let terms_after: Vec<_> = module.functions[0]
        .blocks
        .iter()
        .map(|block| block.term.clone())
        .collect();
    assert_eq!(terms_before, terms_after);
}

#[test]
fn artefacts_match_the_analyzed_module() {
    let (module, state) = analyzed_module();
    let dir = TempDir::new("waypoint-artefacts").expect("tempdir");

    artifacts::write_all(dir.path(), &module, &state).expect("artefacts written");

    let distance = read_to_string(dir.path().join("distance.txt")).expect("distance.txt");
    assert_eq!(
        distance,
        "1\n\
         0 0 200 { ln: 10 fl: prog.c }\n\
         1 -1 100 { ln: 11 fl: prog.c }\n\
         3 -1 0 { ln: 13 fl: prog.c }\n"
    );

    let functions = read_to_string(dir.path().join("functions.txt")).expect("functions.txt");
    assert_eq!(functions, "0 { ln: 10 fl: prog.c }\n");

    let targets = read_to_string(dir.path().join("targets.txt")).expect("targets.txt");
    assert_eq!(targets, "1\n0 0.9 { ln: 13 fl: prog.c }\n");

    let conditions =
        read_to_string(dir.path().join("condition_info.txt")).expect("condition_info.txt");
    assert_eq!(conditions, "1 0 int32 int32 var 5\n");

    let matrix = read_to_string(dir.path().join("dm.csv")).expect("dm.csv");
    assert_eq!(matrix, "1:1\n2\n");
}

#[test]
fn instrumented_module_round_trips() {
    let (mut module, state) = analyzed_module();
    instrument_module(&mut module, &state);

    let dir = TempDir::new("waypoint-module").expect("tempdir");
    let path = dir.path().join("prog.ci.bc");
    module.to_file(&path).expect("module stored");

    let reloaded = Module::from_file(&path).expect("module loaded");
    assert_eq!(module, reloaded);
}
