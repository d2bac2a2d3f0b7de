// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Branch-condition analysis checks

use waypoint_analysis::{analyze_conditions, OperandKind};
use waypoint_ir::{Block, Function, Global, Inst, Module, Op, Terminator, Value};

fn int_local(name: &str, width: u32) -> Value {
    Value::Local {
        name: name.to_string(),
        width: Some(width),
    }
}

fn const_int(width: u32, value: i64) -> Value {
    Value::ConstInt { width, value }
}

fn cmp_block(lhs: Value, rhs: Value) -> Vec<Block> {
    vec![
        Block {
            id: None,
            insts: vec![Inst::with_line(
                Op::Cmp {
                    dest: "c".to_string(),
                    lhs,
                    rhs,
                },
                10,
            )],
            term: Terminator::Branch {
                cond: int_local("c", 1),
                then_dest: 1,
                else_dest: 2,
            },
        },
        Block {
            id: None,
            insts: vec![],
            term: Terminator::Return,
        },
        Block {
            id: None,
            insts: vec![],
            term: Terminator::Return,
        },
    ]
}

fn module_with(globals: Vec<Global>, blocks: Vec<Block>) -> Module {
    Module {
        name: "m".to_string(),
        dwarf_version: 4,
        globals,
        functions: vec![Function {
            name: "f".to_string(),
            filename: "m.c".to_string(),
            line: Some(10),
            is_declaration: false,
            blocks,
        }],
    }
}

#[test]
fn wide_integer_comparison_is_recorded() {
    let module = module_with(vec![], cmp_block(int_local("x", 32), const_int(32, 42)));
    let conditions = analyze_conditions(&module);

    assert_eq!(conditions.len(), 1);
    let condition = &conditions[0];
    assert_eq!(condition.id, 1);
    assert_eq!(condition.op1_kind, OperandKind::Int(32));
    assert_eq!(condition.op2_kind, OperandKind::Int(32));
    assert_eq!(condition.op1_repr, "var");
    assert_eq!(condition.op2_repr, "42");
    assert!(condition.records_int_side(0));
    // Constants are printable but not worth snapshotting
    assert!(!condition.records_int_side(1));
    assert!(!condition.records_string());
}

#[test]
fn narrow_comparisons_are_skipped() {
    let module = module_with(vec![], cmp_block(int_local("x", 8), const_int(8, 1)));
    assert!(analyze_conditions(&module).is_empty());
}

#[test]
fn one_wide_side_is_enough() {
    let module = module_with(vec![], cmp_block(int_local("x", 8), int_local("y", 64)));
    let conditions = analyze_conditions(&module);

    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].op1_kind, OperandKind::Int(8));
    assert_eq!(conditions[0].op2_kind, OperandKind::Int(64));
    assert!(!conditions[0].records_int_side(0));
    assert!(conditions[0].records_int_side(1));
}

#[test]
fn negative_constants_print_signed() {
    let module = module_with(vec![], cmp_block(int_local("x", 64), const_int(64, -7)));
    let conditions = analyze_conditions(&module);
    assert_eq!(conditions[0].op2_repr, "-7");
}

fn strcmp_blocks(probed: &str, global: &str) -> Vec<Block> {
    vec![
        Block {
            id: None,
            insts: vec![
                Inst::with_line(
                    Op::Call {
                        dest: Some("r".to_string()),
                        callee: Some("strcmp".to_string()),
                        args: vec![
                            Value::Local {
                                name: probed.to_string(),
                                width: None,
                            },
                            Value::Global {
                                name: global.to_string(),
                            },
                        ],
                    },
                    20,
                ),
                Inst::with_line(
                    Op::Cmp {
                        dest: "c".to_string(),
                        lhs: int_local("r", 32),
                        rhs: const_int(32, 0),
                    },
                    20,
                ),
            ],
            term: Terminator::Branch {
                cond: int_local("c", 1),
                then_dest: 1,
                else_dest: 2,
            },
        },
        Block {
            id: None,
            insts: vec![],
            term: Terminator::Return,
        },
        Block {
            id: None,
            insts: vec![],
            term: Terminator::Return,
        },
    ]
}

#[test]
fn short_string_comparison_reclassifies_the_operands() {
    let module = module_with(
        vec![Global {
            name: ".str".to_string(),
            string_init: Some("magic".to_string()),
        }],
        strcmp_blocks("buf", ".str"),
    );
    let conditions = analyze_conditions(&module);

    assert_eq!(conditions.len(), 1);
    let condition = &conditions[0];
    assert_eq!(condition.op1_kind, OperandKind::Str);
    assert_eq!(condition.op2_kind, OperandKind::StrConst);
    assert_eq!(condition.op1_repr, "var");
    assert_eq!(condition.op2_repr, "magic");
    assert!(condition.records_string());
    assert!(!condition.records_int_side(0));
    // The probed pointer is the snapshot source
    assert_eq!(
        condition.op1,
        Value::Local {
            name: "buf".to_string(),
            width: None,
        }
    );
}

#[test]
fn long_string_constants_are_not_recorded() {
    let module = module_with(
        vec![Global {
            name: ".str".to_string(),
            string_init: Some("much-too-long-to-snapshot".to_string()),
        }],
        strcmp_blocks("buf", ".str"),
    );
    assert!(analyze_conditions(&module).is_empty());
}

#[test]
fn eight_bytes_exactly_still_fits() {
    let module = module_with(
        vec![Global {
            name: ".str".to_string(),
            string_init: Some("12345678".to_string()),
        }],
        strcmp_blocks("buf", ".str"),
    );
    assert_eq!(analyze_conditions(&module).len(), 1);
}

#[test]
fn switches_and_bare_branches_are_ignored() {
    let switch = Block {
        id: None,
        insts: vec![],
        term: Terminator::Switch {
            cond: int_local("x", 32),
            cases: vec![(0, 1), (1, 2)],
            default: 1,
        },
    };
    let ret = Block {
        id: None,
        insts: vec![],
        term: Terminator::Return,
    };
    let module = module_with(vec![], vec![switch, ret.clone(), ret]);

    assert!(analyze_conditions(&module).is_empty());
}

#[test]
fn condition_ids_follow_analysis_order() {
    let mut blocks = cmp_block(int_local("x", 32), const_int(32, 1));
    let mut more = cmp_block(int_local("y", 64), const_int(64, 2));
    // Rewire the second comparison behind the first one's landing pads
    for block in &mut more {
        if let Terminator::Branch {
            then_dest,
            else_dest,
            ..
        } = &mut block.term
        {
            *then_dest += 3;
            *else_dest += 3;
        }
        if let Terminator::Jump { dest } = &mut block.term {
            *dest += 3;
        }
    }
    blocks.append(&mut more);

    let module = module_with(vec![], blocks);
    let conditions = analyze_conditions(&module);

    assert_eq!(conditions.len(), 2);
    assert_eq!(conditions[0].id, 1);
    assert_eq!(conditions[1].id, 2);
    assert_eq!(conditions[0].bb.block, 0);
    assert_eq!(conditions[1].bb.block, 3);
}
