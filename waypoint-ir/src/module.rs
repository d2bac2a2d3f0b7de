// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! The module interchange model
//!
//! A [`Module`] is the serde export the bitcode frontend produces for one
//! compiled program: functions in declaration order, each a vector of basic
//! blocks, each a vector of instructions plus one terminator. The rewriter
//! mutates this model in place and stores it back in the same encoding.

use crate::{
    error::{Error, Result},
    types::{BbId, BlockIdx, LineNumber},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// An operand of an instruction or terminator
pub enum Value {
    /// An SSA local, with its integer width when the type is an integer
    Local {
        name: String,
        #[serde(default)]
        width: Option<u32>,
    },
    /// An integer constant
    ConstInt { width: u32, value: i64 },
    /// The address of a module global
    Global { name: String },
}

impl Value {
    /// The integer width of this value, `None` for non-integer types
    pub fn int_width(&self) -> Option<u32> {
        match self {
            Value::Local { width, .. } => *width,
            Value::ConstInt { width, .. } => Some(*width),
            Value::Global { .. } => None,
        }
    }

    /// The constant integer payload, if this is one
    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Value::ConstInt { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Whether the value is a compile-time constant
    pub fn is_const(&self) -> bool {
        matches!(self, Value::ConstInt { .. } | Value::Global { .. })
    }

    /// The local name, when the value is a local
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Value::Local { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Conversions the rewriter emits around recorded operands
pub enum CastKind {
    /// Zero extension
    Zext,
    /// Sign extension
    Sext,
    /// Reinterpret a pointer as a pointer to a differently sized integer
    Ptr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Instruction payloads
///
/// Only the opcode classes the analyses and the rewriter distinguish are
/// modelled; everything else collapses into [`Op::Other`].
pub enum Op {
    /// SSA phi node; never a valid insertion point
    Phi { dest: String },
    /// Stack slot; resolves target lines through the declared variable
    Alloca {
        dest: String,
        #[serde(default)]
        decl_line: Option<LineNumber>,
    },
    /// Integer or pointer comparison feeding a conditional branch
    Cmp { dest: String, lhs: Value, rhs: Value },
    /// Call site; `callee` is present when statically known
    Call {
        #[serde(default)]
        dest: Option<String>,
        #[serde(default)]
        callee: Option<String>,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Load the pointer held by an external global (shared-map bases)
    LoadPtr { dest: String, global: String },
    /// Pointer offset computation
    Gep {
        dest: String,
        base: String,
        offset: Value,
    },
    /// Memory load of `width` bits through `addr`
    Load {
        dest: String,
        width: u32,
        addr: String,
    },
    /// Memory store of `width` bits through `addr`
    Store {
        width: u32,
        value: Value,
        addr: String,
    },
    /// Integer addition
    Add { dest: String, lhs: Value, rhs: Value },
    /// Width or representation change
    Cast {
        dest: String,
        kind: CastKind,
        width: u32,
        value: Value,
    },
    /// Any opcode the toolchain does not inspect
    Other,
}

impl Op {
    /// The SSA name this instruction defines, if any
    pub fn dest(&self) -> Option<&str> {
        match self {
            Op::Phi { dest }
            | Op::Alloca { dest, .. }
            | Op::Cmp { dest, .. }
            | Op::LoadPtr { dest, .. }
            | Op::Gep { dest, .. }
            | Op::Load { dest, .. }
            | Op::Add { dest, .. }
            | Op::Cast { dest, .. } => Some(dest),
            Op::Call { dest, .. } => dest.as_deref(),
            Op::Store { .. } | Op::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One instruction: opcode payload, optional debug line, and the
/// `nosanitize` mark carried by operations the rewriter inserted
pub struct Inst {
    pub op: Op,
    #[serde(default)]
    pub line: Option<LineNumber>,
    #[serde(default)]
    pub nosanitize: bool,
}

impl Inst {
    /// A frontend instruction with no source line
    pub fn new(op: Op) -> Self {
        Self {
            op,
            line: None,
            nosanitize: false,
        }
    }

    /// A frontend instruction at a source line
    pub fn with_line(op: Op, line: LineNumber) -> Self {
        Self {
            op,
            line: Some(line),
            nosanitize: false,
        }
    }

    /// An inserted probe operation; marked so sanitizer passes skip it
    pub fn probe(op: Op) -> Self {
        Self {
            op,
            line: None,
            nosanitize: true,
        }
    }

    /// Whether this is a phi node
    pub fn is_phi(&self) -> bool {
        matches!(self.op, Op::Phi { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Block terminators; successor references are in-function block indices
pub enum Terminator {
    Jump {
        dest: BlockIdx,
    },
    Branch {
        cond: Value,
        then_dest: BlockIdx,
        else_dest: BlockIdx,
    },
    Switch {
        cond: Value,
        cases: Vec<(i64, BlockIdx)>,
        default: BlockIdx,
    },
    Return,
    Unreachable,
}

impl Terminator {
    /// Successor block indices in terminator operand order
    pub fn successors(&self) -> Vec<BlockIdx> {
        match self {
            Terminator::Jump { dest } => vec![*dest],
            Terminator::Branch {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            Terminator::Switch { cases, default, .. } => {
                let mut succs: Vec<BlockIdx> = cases.iter().map(|(_, dest)| *dest).collect();
                succs.push(*default);
                succs
            }
            Terminator::Return | Terminator::Unreachable => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A basic block
pub struct Block {
    /// Module-wide id, assigned by [`crate::ids::assign_block_ids`]
    #[serde(default)]
    pub id: Option<BbId>,
    pub insts: Vec<Inst>,
    pub term: Terminator,
}

impl Block {
    /// Index of the first instruction that is not a phi node
    ///
    /// Probes are inserted here so they execute after all incoming values
    /// have been merged; equal to `insts.len()` for blocks of only phis.
    pub fn first_insertion_point(&self) -> usize {
        self.insts
            .iter()
            .position(|inst| !inst.is_phi())
            .unwrap_or(self.insts.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A function definition or declaration
pub struct Function {
    pub name: String,
    /// Source file as recorded in the subprogram debug entry
    pub filename: String,
    /// First source line of the subprogram
    #[serde(default)]
    pub line: Option<LineNumber>,
    #[serde(default)]
    pub is_declaration: bool,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A module global; only string-constant initialisers are interesting here
pub struct Global {
    pub name: String,
    #[serde(default)]
    pub string_init: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One compiled program as exported by the frontend
pub struct Module {
    pub name: String,
    /// DWARF version the program was compiled with; 0 means no debug info
    pub dwarf_version: u32,
    #[serde(default)]
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    /// Loads a module from its interchange file.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Stores the module, in the same encoding it was loaded from.
    pub fn to_file<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Fails when the module carries no debug records at all.
    pub fn ensure_debug_info(&self) -> Result<()> {
        if self.dwarf_version == 0 {
            return Err(Error::MissingDebugInfo {
                module: self.name.clone(),
            });
        }
        Ok(())
    }

    /// The string initialiser of a global, if it has one
    pub fn global_string(&self, name: &str) -> Option<&str> {
        self.globals
            .iter()
            .find(|global| global.name == name)
            .and_then(|global| global.string_init.as_deref())
    }

    /// Index of a function by name
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|func| func.name == name)
    }
}
