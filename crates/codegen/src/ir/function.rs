//! Functions.

use super::dfg::DataFlowGraph;
use super::entities::StackSlot;
use super::layout::Layout;
use super::types::Type;
use retarget_entity::PrimaryMap;
use std::fmt;

/// A calling convention: how arguments and return values cross a call
/// boundary, and which registers a callee must preserve.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CallConv {
    /// The x86-64 System V ABI (Linux, macOS, the BSDs).
    SystemV,
    /// The Microsoft x64 calling convention (Windows).
    WindowsFastcall,
    /// The AArch64 procedure call standard.
    Aapcs64,
    /// A convention private to this compilation unit: no external caller
    /// need agree on it, so the backend is free to pick whatever's
    /// cheapest (all registers caller-saved, arguments packed densely).
    Fast,
}

impl CallConv {
    /// The default convention for a given target OS and architecture, per
    /// the platform's standard ABI.
    pub fn triple_default(os: target_lexicon::OperatingSystem, arch: target_lexicon::Architecture) -> Self {
        use target_lexicon::Architecture;
        match arch {
            Architecture::Aarch64(_) => CallConv::Aapcs64,
            Architecture::X86_64 if is_windows(os) => CallConv::WindowsFastcall,
            _ => CallConv::SystemV,
        }
    }
}

fn is_windows(os: target_lexicon::OperatingSystem) -> bool {
    matches!(os, target_lexicon::OperatingSystem::Windows)
}

impl fmt::Display for CallConv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CallConv::SystemV => "system_v",
            CallConv::WindowsFastcall => "windows_fastcall",
            CallConv::Aapcs64 => "aapcs64",
            CallConv::Fast => "fast",
        };
        f.write_str(s)
    }
}

/// A function's parameter and return types plus its calling convention.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature {
    pub params: Vec<Type>,
    pub returns: Vec<Type>,
    pub call_conv: CallConv,
}

impl Signature {
    pub fn new(call_conv: CallConv) -> Self {
        Self {
            params: Vec::new(),
            returns: Vec::new(),
            call_conv,
        }
    }
}

/// A function's stack frame layout: the slots a function has reserved for
/// itself, independent of whatever the register allocator later spills.
#[derive(Clone, Default)]
pub struct StackSlotData {
    pub size: u32,
}

/// A single function's complete IR: its signature, data-flow graph, and
/// layout, plus its own preamble of stack slots.
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
    pub stack_slots: PrimaryMap<StackSlot, StackSlotData>,
}

impl Function {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            signature,
            dfg: DataFlowGraph::new(),
            layout: Layout::new(),
            stack_slots: PrimaryMap::new(),
        }
    }

    pub fn create_stack_slot(&mut self, size: u32) -> StackSlot {
        self.stack_slots.push(StackSlotData { size })
    }

    pub fn create_block(&mut self) -> super::entities::Block {
        self.dfg.make_block()
    }
}
