//! The code buffer that lowering and emission write into: a monotonically
//! growing byte vector, pending branch fixups, relocation records, and a
//! map from the SSA instruction each machine instruction originated from to
//! the code offset it was emitted at (for debuggers).

use crate::ir::{Constant, Inst as SsaInst};
use std::vec::Vec;

/// A byte offset into the emitted code buffer for one function.
pub type CodeOffset = u32;

/// The four on-wire relocation shapes this crate's encoders can emit.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RelocKind {
    /// A full 64-bit absolute address.
    Abs64,
    /// A 32-bit absolute address (only reachable when the caller guarantees
    /// the target fits in the low 4GiB).
    Abs32,
    /// A 32-bit PC-relative offset, as used by `call`/`jmp rel32` and
    /// RIP-relative data references on x86-64.
    PcRel32,
    /// Indirect through the target's GOT entry.
    Got,
    /// Indirect through the target's PLT stub.
    Plt,
}

/// What a relocation's target symbolically refers to, before a
/// `SymbolTable` resolves it to a concrete offset. `UserFunc`/`UserData`
/// name entries the *caller* declares (see the `retarget-module` crate);
/// `LibCall` and `KnownSymbol` name entries this crate or its embedder
/// provides; `ConstantPool` is intra-function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RelocTarget {
    UserFunc(u32),
    UserData(u32),
    LibCall(LibCall),
    KnownSymbol(KnownSymbol),
    /// An offset from the start of the function currently being compiled
    /// (e.g. a jump-adjacent constant pool entry).
    ConstantPool(Constant),
}

/// A runtime support routine a backend may need to call out to (e.g. a
/// software implementation of an operation the ISA has no instruction for).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum LibCall {
    FloorF32,
    FloorF64,
    CeilF32,
    CeilF64,
    TruncF32,
    TruncF64,
    Memcpy,
}

/// A symbol whose meaning is fixed by the platform rather than by the
/// caller's module (e.g. the TLS base accessor).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum KnownSymbol {
    ElfTlsGetAddr,
}

/// One deferred relocation: patch `offset` bytes into the code buffer
/// against `target` at link time, per `kind`'s encoding.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MachReloc {
    pub offset: CodeOffset,
    pub kind: RelocKind,
    pub target: RelocTarget,
    pub addend: i64,
}

/// How a [`PendingFixup`]'s displacement gets written back into the buffer
/// once its label is bound.
#[derive(Copy, Clone, Debug)]
enum FixupEncoding {
    /// `width` raw little-endian bytes hold the byte-granularity
    /// displacement directly (x86's `rel8`/`rel32` branch forms).
    RawBytes { width: u8 },
    /// The displacement, divided by 4 (AArch64 branches encode a
    /// word-granularity offset) and masked to `imm_bits`, is OR'd into the
    /// 4-byte instruction word already emitted at `patch_at`, shifted left
    /// by `shift` (26-bit `B`/`BL` fields start at bit 0; 19-bit `B.cond`/
    /// compare-and-branch fields start at bit 5).
    ArmBranchWord { imm_bits: u8, shift: u8 },
}

/// A forward branch recorded at `branch_offset` whose displacement field
/// can't be filled in until the destination label's final offset is known.
#[derive(Copy, Clone, Debug)]
struct PendingFixup {
    /// Offset of the start of the field to patch (the displacement field
    /// for `RawBytes`, the instruction word for `ArmBranchWord`).
    patch_at: CodeOffset,
    encoding: FixupEncoding,
    /// Offset the displacement is relative to (usually the end of the
    /// branch instruction).
    origin: CodeOffset,
    label: MachLabel,
}

/// An opaque reference to a not-yet-placed code position (a block's entry
/// point), bound to a concrete offset once that block has been emitted.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MachLabel(u32);

impl MachLabel {
    /// Construct the label for the `index`-th block in layout order,
    /// independent of any `MachBuffer`. Lowering assigns these before a
    /// buffer exists; emission later calls [`MachBuffer::get_label`] once
    /// per block, in the same order, which allocates ids `0, 1, 2, ...` and
    /// so reproduces exactly the ids lowering already baked into branch
    /// targets.
    pub fn from_block_index(index: u32) -> Self {
        MachLabel(index)
    }
}

/// The append-only byte buffer machine-code emission writes into, plus the
/// side tables (fixups, relocations, the SSA-to-offset map) that travel
/// with it.
#[derive(Default)]
pub struct MachBuffer {
    data: Vec<u8>,
    relocs: Vec<MachReloc>,
    fixups: Vec<PendingFixup>,
    label_offsets: Vec<Option<CodeOffset>>,
    inst_offsets: Vec<(SsaInst, CodeOffset)>,
}

impl MachBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cur_offset(&self) -> CodeOffset {
        self.data.len() as CodeOffset
    }

    /// Allocate a new, unbound label.
    pub fn get_label(&mut self) -> MachLabel {
        let id = self.label_offsets.len() as u32;
        self.label_offsets.push(None);
        MachLabel(id)
    }

    /// Bind `label` to the buffer's current offset (the caller is about to
    /// emit the block that label names).
    pub fn bind_label(&mut self, label: MachLabel) {
        self.label_offsets[label.0 as usize] = Some(self.cur_offset());
    }

    pub fn put1(&mut self, byte: u8) {
        self.data.push(byte);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn put4_le(&mut self, word: u32) {
        self.data.extend_from_slice(&word.to_le_bytes());
    }

    pub fn put8_le(&mut self, word: u64) {
        self.data.extend_from_slice(&word.to_le_bytes());
    }

    /// Record a relocation at the current offset, advancing by `width`
    /// placeholder bytes for the encoder to have reserved already.
    pub fn add_reloc(&mut self, kind: RelocKind, target: RelocTarget, addend: i64) {
        self.relocs.push(MachReloc {
            offset: self.cur_offset(),
            kind,
            target,
            addend,
        });
    }

    /// Reserve (and zero-fill) a `width`-byte displacement field for a
    /// forward branch to `label`, to be patched once `label` is bound.
    pub fn use_label_at_offset(&mut self, label: MachLabel, width: u8, origin: CodeOffset) {
        let patch_at = self.cur_offset();
        for _ in 0..width {
            self.data.push(0);
        }
        self.fixups.push(PendingFixup {
            patch_at,
            encoding: FixupEncoding::RawBytes { width },
            origin,
            label,
        });
    }

    /// Record that the 4-byte instruction word just emitted at `word_at`
    /// (already written by the caller with its immediate field zeroed) is a
    /// branch to `label`; once `label` is bound, the word-granularity
    /// displacement is OR'd into bits `[shift, shift+imm_bits)`.
    pub fn use_label_in_word(&mut self, label: MachLabel, word_at: CodeOffset, imm_bits: u8, shift: u8) {
        self.fixups.push(PendingFixup {
            patch_at: word_at,
            encoding: FixupEncoding::ArmBranchWord { imm_bits, shift },
            origin: word_at,
            label,
        });
    }

    /// Record that the machine instruction currently being emitted
    /// originated from `ssa_inst`.
    pub fn record_ssa_inst(&mut self, ssa_inst: SsaInst) {
        self.inst_offsets.push((ssa_inst, self.cur_offset()));
    }

    /// Patch every fixup whose label is now bound. Called once after every
    /// block has been emitted, since this crate lowers and emits strictly
    /// in layout order and never emits backward-referencing forward
    /// branches out of order.
    pub fn resolve_fixups(&mut self) {
        for fixup in &self.fixups {
            let target = self.label_offsets[fixup.label.0 as usize]
                .expect("fixup resolved before its label was bound");
            let disp = target as i64 - fixup.origin as i64;
            let at = fixup.patch_at as usize;
            match fixup.encoding {
                FixupEncoding::RawBytes { width: 1 } => {
                    self.data[at] = disp as i8 as u8;
                }
                FixupEncoding::RawBytes { width: 4 } => {
                    self.data[at..at + 4].copy_from_slice(&(disp as i32).to_le_bytes());
                }
                FixupEncoding::RawBytes { width } => panic!("unsupported fixup width {width}"),
                FixupEncoding::ArmBranchWord { imm_bits, shift } => {
                    debug_assert_eq!(disp % 4, 0, "AArch64 branch target must be word-aligned");
                    let word_disp = (disp / 4) as u32;
                    let mask = (1u32 << imm_bits) - 1;
                    let field = (word_disp & mask) << shift;
                    let mut word = u32::from_le_bytes(self.data[at..at + 4].try_into().unwrap());
                    word |= field;
                    self.data[at..at + 4].copy_from_slice(&word.to_le_bytes());
                }
            }
        }
        self.fixups.clear();
    }

    pub fn finish(mut self) -> (Vec<u8>, Vec<MachReloc>, Vec<(SsaInst, CodeOffset)>) {
        self.resolve_fixups();
        (self.data, self.relocs, self.inst_offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_branch_fixup_resolves_to_correct_displacement() {
        let mut buf = MachBuffer::new();
        let label = buf.get_label();
        buf.put1(0xEB); // jmp rel8 opcode
        let origin_after_disp = buf.cur_offset() + 1;
        buf.use_label_at_offset(label, 1, origin_after_disp);
        buf.put1(0x90); // nop, to push the target forward
        buf.bind_label(label);
        let (bytes, _, _) = buf.finish();
        assert_eq!(bytes[1], 1); // one byte (the nop) between branch and target
    }

    #[test]
    fn relocation_records_current_offset() {
        let mut buf = MachBuffer::new();
        buf.put4_le(0); // placeholder
        buf.add_reloc(RelocKind::PcRel32, RelocTarget::UserFunc(3), -4);
        let (_, relocs, _) = buf.finish();
        assert_eq!(relocs.len(), 1);
        assert_eq!(relocs[0].offset, 4);
        assert_eq!(relocs[0].target, RelocTarget::UserFunc(3));
    }
}
