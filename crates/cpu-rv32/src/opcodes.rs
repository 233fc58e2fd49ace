//! Declarative opcode table.
//!
//! Each instruction is one row: a 32-character bit pattern over `{'0','1','-'}`
//! ('-' is don't-care) plus the control fields that steer the unified execute
//! stage. At startup every pattern is compiled once into a `(mask, value)`
//! pair so that matching is `instr & mask == value`; dispatch is a linear
//! first-match scan with the all-dashes catch-all as the final row.
//!
//! The pattern strings are the legible source of truth. Keeping them as text
//! makes the table diffable against the ISA manual; the compile step exists
//! purely so the hot path never re-parses them.

use crate::decode::Decoded;
use std::fmt;

/// ALU operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluMode {
    Add,
    Sub,
    Sll,
    Srl,
    Sra,
    Xor,
    Or,
    And,
    /// Set if equal (branches).
    Seq,
    Slt,
    Sltu,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    /// Result is PC + 4 (link value for JAL/JALR).
    NextInstr,
    /// Result is PC + U-immediate (AUIPC).
    PcUpper20,
    /// Result is the U-immediate (LUI).
    Upper20,
    /// Result is the current CSR value (CSRRx).
    CsrRead,
    /// No result needed.
    Nul,
}

/// CSR update selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrMode {
    Nop,
    Rw,
    Rs,
    Rc,
    Rwi,
    Rsi,
    Rci,
}

/// Next-PC selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcMode {
    NextInstr,
    /// Branch taken when the ALU result is non-zero.
    CondJump,
    /// Branch taken when the ALU result is zero.
    CondJumpInv,
    RelJump,
    Indirect,
}

/// Memory-unit selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    None,
    Load,
    Store,
}

/// Why an exception row halts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    Ecall,
    Ebreak,
    UnknownOpcode,
}

/// Operand rendering for the trace pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceKind {
    /// `rd, x<imm_u>` (LUI/AUIPC).
    RdUpper,
    /// `rd, <imm_j>` (JAL).
    RdJump,
    /// `rd, rs1 + <imm_i>` (JALR, loads).
    RdRs1Offset,
    /// `rs1, rs2, <imm_b>`.
    Branch,
    /// `rs1+<imm_s>, rs2`.
    Store,
    /// `rd, rs1, rs2`.
    RegReg,
    /// `rd, rs1, <imm_i>`.
    RegImm,
    /// `rd, rs1, <shamt>`.
    Shamt,
    /// `rd, rs1, <csrid>`.
    Csr,
    /// `rd, <uimm>, <csrid>`.
    CsrImm,
    /// Bare mnemonic.
    Plain,
    /// `(<instr>)`.
    Unknown,
}

/// One row of the opcode table: pattern plus datapath control bits.
#[derive(Debug)]
pub struct OpcodeRow {
    spec: &'static str,
    mnemonic: &'static str,
    trace: TraceKind,
    /// ALU operand 2 is `imm_i` rather than `regs[rs2]`.
    pub op2_immediate: bool,
    pub alu: AluMode,
    /// Write the ALU result back to `rd` (guarded by `rd != 0`).
    pub store_result: bool,
    pub pc: PcMode,
    pub csr: CsrMode,
    pub memory: MemoryMode,
    /// Significant-byte mask for loads/stores (0xFF / 0xFFFF / 0xFFFFFFFF).
    pub memory_mask: u32,
    /// Sign bit position for loads; zero for unsigned loads.
    pub load_sign_bit: u32,
    /// Set on rows that raise an exception instead of executing
    /// (ECALL/EBREAK/catch-all).
    pub trap: Option<Trap>,
}

impl OpcodeRow {
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    /// Render the operand part of a trace line for this row.
    #[must_use]
    pub fn trace_operands(&self, d: &Decoded, instr: u32) -> String {
        match self.trace {
            TraceKind::RdUpper => format!("r{}, x{:08x}", d.rd, d.imm_u),
            TraceKind::RdJump => format!("r{}, {}", d.rd, d.imm_j as i32),
            TraceKind::RdRs1Offset => {
                format!("r{}, r{} + {}", d.rd, d.rs1, d.imm_i as i32)
            }
            TraceKind::Branch => format!("r{}, r{}, {}", d.rs1, d.rs2, d.imm_b as i32),
            TraceKind::Store => format!("r{}+{}, r{}", d.rs1, d.imm_s as i32, d.rs2),
            TraceKind::RegReg => format!("r{}, r{}, r{}", d.rd, d.rs1, d.rs2),
            TraceKind::RegImm => format!("r{}, r{}, {}", d.rd, d.rs1, d.imm_i as i32),
            TraceKind::Shamt => format!("r{}, r{}, {}", d.rd, d.rs1, d.shamt),
            TraceKind::Csr => format!("r{}, r{}, {}", d.rd, d.rs1, d.csrid),
            TraceKind::CsrImm => format!("r{}, {}, {}", d.rd, d.uimm, d.csrid),
            TraceKind::Plain => String::new(),
            TraceKind::Unknown => format!("({instr:08x})"),
        }
    }
}

/// Plain computational row (no memory traffic, no exception).
const fn op(
    spec: &'static str,
    mnemonic: &'static str,
    trace: TraceKind,
    op2_immediate: bool,
    alu: AluMode,
    store_result: bool,
    pc: PcMode,
    csr: CsrMode,
) -> OpcodeRow {
    OpcodeRow {
        spec,
        mnemonic,
        trace,
        op2_immediate,
        alu,
        store_result,
        pc,
        csr,
        memory: MemoryMode::None,
        memory_mask: 0,
        load_sign_bit: 0,
        trap: None,
    }
}

/// Load row: result comes from the read-data FIFO, masked and sign-extended.
const fn load(spec: &'static str, mnemonic: &'static str, mask: u32, sign: u32) -> OpcodeRow {
    OpcodeRow {
        spec,
        mnemonic,
        trace: TraceKind::RdRs1Offset,
        op2_immediate: false,
        alu: AluMode::Nul,
        store_result: true,
        pc: PcMode::NextInstr,
        csr: CsrMode::Nop,
        memory: MemoryMode::Load,
        memory_mask: mask,
        load_sign_bit: sign,
        trap: None,
    }
}

/// Store row: `regs[rs2]` goes to the write-request FIFO.
const fn store(spec: &'static str, mnemonic: &'static str, mask: u32) -> OpcodeRow {
    OpcodeRow {
        spec,
        mnemonic,
        trace: TraceKind::Store,
        op2_immediate: false,
        alu: AluMode::Nul,
        store_result: false,
        pc: PcMode::NextInstr,
        csr: CsrMode::Nop,
        memory: MemoryMode::Store,
        memory_mask: mask,
        load_sign_bit: 0,
        trap: None,
    }
}

/// Exception row: traced, then the run halts.
const fn trap(spec: &'static str, mnemonic: &'static str, trace: TraceKind, cause: Trap) -> OpcodeRow {
    OpcodeRow {
        spec,
        mnemonic,
        trace,
        op2_immediate: false,
        alu: AluMode::Nul,
        store_result: false,
        pc: PcMode::NextInstr,
        csr: CsrMode::Nop,
        memory: MemoryMode::None,
        memory_mask: 0,
        load_sign_bit: 0,
        trap: Some(cause),
    }
}

use self::{AluMode as A, CsrMode as C, PcMode as P, TraceKind as T};

/// The instruction set. Order matters: first match dispatches, and the
/// all-dashes catch-all must stay last.
#[rustfmt::skip]
static OPCODES: &[OpcodeRow] = &[
    op("-------------------------0010111", "AUIPC",  T::RdUpper,     false, A::PcUpper20, true,  P::NextInstr,    C::Nop),
    op("-------------------------0110111", "LUI",    T::RdUpper,     false, A::Upper20,   true,  P::NextInstr,    C::Nop),
    op("-------------------------1101111", "JAL",    T::RdJump,      false, A::NextInstr, true,  P::RelJump,      C::Nop),
    op("-----------------000-----1100111", "JALR",   T::RdRs1Offset, false, A::NextInstr, true,  P::Indirect,     C::Nop),

    op("-----------------000-----1100011", "BEQ",    T::Branch,      false, A::Seq,       false, P::CondJump,     C::Nop),
    op("-----------------001-----1100011", "BNE",    T::Branch,      false, A::Seq,       false, P::CondJumpInv,  C::Nop),
    op("-----------------100-----1100011", "BLT",    T::Branch,      false, A::Slt,       false, P::CondJump,     C::Nop),
    op("-----------------101-----1100011", "BGE",    T::Branch,      false, A::Slt,       false, P::CondJumpInv,  C::Nop),
    op("-----------------110-----1100011", "BLTU",   T::Branch,      false, A::Sltu,      false, P::CondJump,     C::Nop),
    op("-----------------111-----1100011", "BGEU",   T::Branch,      false, A::Sltu,      false, P::CondJumpInv,  C::Nop),

    load("-----------------000-----0000011", "LB",  0x0000_00FF, 0x0000_0080),
    load("-----------------001-----0000011", "LH",  0x0000_FFFF, 0x0000_8000),
    load("-----------------010-----0000011", "LW",  0xFFFF_FFFF, 0),
    load("-----------------100-----0000011", "LBU", 0x0000_00FF, 0),
    load("-----------------101-----0000011", "LHU", 0x0000_FFFF, 0),

    store("-----------------000-----0100011", "SB", 0x0000_00FF),
    store("-----------------001-----0100011", "SH", 0x0000_FFFF),
    store("-----------------010-----0100011", "SW", 0xFFFF_FFFF),

    op("-----------------000-----0010011", "ADDI",   T::RegImm,      true,  A::Add,       true,  P::NextInstr,    C::Nop),
    op("-----------------010-----0010011", "SLTI",   T::RegImm,      true,  A::Slt,       true,  P::NextInstr,    C::Nop),
    op("-----------------011-----0010011", "SLTIU",  T::RegImm,      true,  A::Sltu,      true,  P::NextInstr,    C::Nop),
    op("-----------------100-----0010011", "XORI",   T::RegImm,      true,  A::Xor,       true,  P::NextInstr,    C::Nop),
    op("-----------------110-----0010011", "ORI",    T::RegImm,      true,  A::Or,        true,  P::NextInstr,    C::Nop),
    op("-----------------111-----0010011", "ANDI",   T::RegImm,      true,  A::And,       true,  P::NextInstr,    C::Nop),
    op("0000000----------001-----0010011", "SLLI",   T::Shamt,       true,  A::Sll,       true,  P::NextInstr,    C::Nop),
    op("0000000----------101-----0010011", "SRLI",   T::Shamt,       true,  A::Srl,       true,  P::NextInstr,    C::Nop),
    op("0100000----------101-----0010011", "SRAI",   T::Shamt,       true,  A::Sra,       true,  P::NextInstr,    C::Nop),

    op("0000000----------000-----0110011", "ADD",    T::RegReg,      false, A::Add,       true,  P::NextInstr,    C::Nop),
    op("0100000----------000-----0110011", "SUB",    T::RegReg,      false, A::Sub,       true,  P::NextInstr,    C::Nop),
    op("0000000----------001-----0110011", "SLL",    T::RegReg,      false, A::Sll,       true,  P::NextInstr,    C::Nop),
    op("0000000----------010-----0110011", "SLT",    T::RegReg,      false, A::Slt,       true,  P::NextInstr,    C::Nop),
    op("0000000----------011-----0110011", "SLTU",   T::RegReg,      false, A::Sltu,      true,  P::NextInstr,    C::Nop),
    op("0000000----------100-----0110011", "XOR",    T::RegReg,      false, A::Xor,       true,  P::NextInstr,    C::Nop),
    op("0000000----------101-----0110011", "SRL",    T::RegReg,      false, A::Srl,       true,  P::NextInstr,    C::Nop),
    op("0100000----------101-----0110011", "SRA",    T::RegReg,      false, A::Sra,       true,  P::NextInstr,    C::Nop),
    op("0000000----------110-----0110011", "OR",     T::RegReg,      false, A::Or,        true,  P::NextInstr,    C::Nop),
    op("0000000----------111-----0110011", "AND",    T::RegReg,      false, A::And,       true,  P::NextInstr,    C::Nop),

    op("0000--------00000000000000001111", "FENCE",  T::Plain,       false, A::Nul,       false, P::NextInstr,    C::Nop),
    op("00000000000000000001000000001111", "FENCEI", T::Plain,       false, A::Nul,       false, P::NextInstr,    C::Nop),

    trap("00000000000000000000000001110011", "ECALL",  T::Plain, Trap::Ecall),
    trap("00000000000100000000000001110011", "EBREAK", T::Plain, Trap::Ebreak),

    op("-----------------001-----1110011", "CSRRW",  T::Csr,         false, A::CsrRead,   true,  P::NextInstr,    C::Rw),
    op("-----------------010-----1110011", "CSRRS",  T::Csr,         false, A::CsrRead,   true,  P::NextInstr,    C::Rs),
    op("-----------------011-----1110011", "CSRRC",  T::Csr,         false, A::CsrRead,   true,  P::NextInstr,    C::Rc),
    op("-----------------101-----1110011", "CSRRWI", T::CsrImm,      false, A::CsrRead,   true,  P::NextInstr,    C::Rwi),
    op("-----------------110-----1110011", "CSRRSI", T::CsrImm,      false, A::CsrRead,   true,  P::NextInstr,    C::Rsi),
    op("-----------------111-----1110011", "CSRRCI", T::CsrImm,      false, A::CsrRead,   true,  P::NextInstr,    C::Rci),

    op("0000001----------000-----0110011", "MUL",    T::RegReg,      false, A::Mul,       true,  P::NextInstr,    C::Nop),
    op("0000001----------001-----0110011", "MULH",   T::RegReg,      false, A::Mulh,      true,  P::NextInstr,    C::Nop),
    op("0000001----------010-----0110011", "MULHSU", T::RegReg,      false, A::Mulhsu,    true,  P::NextInstr,    C::Nop),
    op("0000001----------011-----0110011", "MULHU",  T::RegReg,      false, A::Mulhu,     true,  P::NextInstr,    C::Nop),
    op("0000001----------100-----0110011", "DIV",    T::RegReg,      false, A::Div,       true,  P::NextInstr,    C::Nop),
    op("0000001----------101-----0110011", "DIVU",   T::RegReg,      false, A::Divu,      true,  P::NextInstr,    C::Nop),
    op("0000001----------110-----0110011", "REM",    T::RegReg,      false, A::Rem,       true,  P::NextInstr,    C::Nop),
    op("0000001----------111-----0110011", "REMU",   T::RegReg,      false, A::Remu,      true,  P::NextInstr,    C::Nop),

    trap("--------------------------------", "????", T::Unknown, Trap::UnknownOpcode),
];

/// Opcode-table initialisation failure.
#[derive(Debug, PartialEq, Eq)]
pub enum TableError {
    /// A pattern is not exactly 32 characters.
    BadLength { mnemonic: &'static str, len: usize },
    /// A pattern contains a character outside `{'0','1','-'}`.
    BadCharacter { mnemonic: &'static str, ch: char },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength { mnemonic, len } => {
                write!(f, "opcode {mnemonic}: pattern is {len} characters, expected 32")
            }
            Self::BadCharacter { mnemonic, ch } => {
                write!(f, "opcode {mnemonic}: unknown character {ch:?} in pattern")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// The compiled opcode table.
pub struct OpcodeTable {
    /// `(mask, value)` per row, parallel to [`OPCODES`].
    compiled: Vec<(u32, u32)>,
}

impl OpcodeTable {
    /// Compile every pattern. Fails if any row is malformed.
    pub fn new() -> Result<Self, TableError> {
        let compiled = OPCODES
            .iter()
            .map(|row| Self::compile(row.spec, row.mnemonic))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { compiled })
    }

    fn compile(spec: &str, mnemonic: &'static str) -> Result<(u32, u32), TableError> {
        if spec.len() != 32 {
            return Err(TableError::BadLength {
                mnemonic,
                len: spec.len(),
            });
        }
        let mut mask = 0u32;
        let mut value = 0u32;
        for ch in spec.chars() {
            mask <<= 1;
            value <<= 1;
            match ch {
                '0' => mask |= 1,
                '1' => {
                    mask |= 1;
                    value |= 1;
                }
                '-' => {}
                _ => return Err(TableError::BadCharacter { mnemonic, ch }),
            }
        }
        Ok((mask, value))
    }

    /// Find the first row matching `instr`. The catch-all guarantees a match.
    #[must_use]
    pub fn lookup(&self, instr: u32) -> &'static OpcodeRow {
        for (i, &(mask, value)) in self.compiled.iter().enumerate() {
            if instr & mask == value {
                return &OPCODES[i];
            }
        }
        // Unreachable: the final row matches everything.
        &OPCODES[OPCODES.len() - 1]
    }
}
