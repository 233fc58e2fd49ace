//! The RV32IM core: unified execute stage and cooperative step driver.
//!
//! One call to [`Rv32Cpu::do_op`] advances the pipeline by at most one
//! logical step: queue a fetch, retire a fetch and decode (then execute in
//! the same step), or re-enter a stalled instruction. The memory front-end
//! is pumped by the machine between steps, so a simple instruction takes two
//! steps end to end: one to request the fetch, one to retire and execute it.
//!
//! Stalls keep the whole decoded state intact. A store stalls while the
//! write FIFO is full; a load stalls from dispatch until its response
//! arrives. The step driver counts stalled steps for the front panel.

use std::collections::VecDeque;
use std::fmt;

use crate::bus::MemoryPort;
use crate::csr::CsrFile;
use crate::decode::Decoded;
use crate::opcodes::{AluMode, CsrMode, MemoryMode, OpcodeRow, OpcodeTable, PcMode, TableError, Trap};

/// Reset vector: start of ROM.
pub const RESET_PC: u32 = 0x2040_0000;

/// Trace lines kept between drains of the trace ring.
const TRACE_CAPACITY: usize = 64;

/// A condition that halts the run (but not the process).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// PC was not 4-byte aligned at fetch time.
    MisalignedPc(u32),
    /// The fetch-request FIFO refused the request.
    FetchRequestFailed(u32),
    /// The fetched word does not have the 32-bit encoding marker bits.
    InvalidInstruction(u32),
    /// No opcode row other than the catch-all matched.
    UnknownOpcode(u32),
    Ecall(u32),
    Ebreak(u32),
    /// The write-request FIFO refused a store that was reported as fitting.
    StoreRefused(u32),
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MisalignedPc(pc) => write!(f, "unaligned code fetch at 0x{pc:08x}"),
            Self::FetchRequestFailed(pc) => {
                write!(f, "unable to queue instruction fetch for 0x{pc:08x}")
            }
            Self::InvalidInstruction(i) => write!(f, "invalid instruction 0x{i:08x}"),
            Self::UnknownOpcode(i) => write!(f, "unknown opcode 0x{i:08x}"),
            Self::Ecall(i) => write!(f, "ECALL raised by instruction 0x{i:08x}"),
            Self::Ebreak(i) => write!(f, "EBREAK raised by instruction 0x{i:08x}"),
            Self::StoreRefused(addr) => write!(f, "write request refused for 0x{addr:08x}"),
        }
    }
}

impl std::error::Error for CpuError {}

/// The processor state: registers, CSRs, PC, and pipeline flags.
pub struct Rv32Cpu {
    regs: [u32; 32],
    pc: u32,
    csr: CsrFile,
    table: OpcodeTable,

    /// Instruction cannot retire yet (load data pending / store back-pressure).
    stalled: bool,
    /// A load's read request has been queued and awaits its response.
    read_dispatched: bool,
    /// A fetch has been queued and awaits its word.
    fetch_in_progress: bool,
    /// Steps spent waiting (stall or fetch wait), for the front panel.
    stall_count: u32,

    current_instr: u32,
    decoded: Decoded,

    trace_enabled: bool,
    trace: VecDeque<String>,
}

impl Rv32Cpu {
    /// Build a core with a freshly compiled opcode table, in reset state.
    pub fn new() -> Result<Self, TableError> {
        let mut regs = [0xFFFF_FFFF; 32];
        regs[0] = 0;
        Ok(Self {
            regs,
            pc: RESET_PC,
            csr: CsrFile::new(),
            table: OpcodeTable::new()?,
            stalled: false,
            read_dispatched: false,
            fetch_in_progress: false,
            stall_count: 0,
            current_instr: 0,
            decoded: Decoded::default(),
            trace_enabled: true,
            trace: VecDeque::new(),
        })
    }

    /// Return to the reset state: x0 = 0, x1..x31 all-ones, PC at the reset
    /// vector, CSRs (and therefore the counters) zeroed, pipeline idle.
    pub fn reset(&mut self) {
        self.regs = [0xFFFF_FFFF; 32];
        self.regs[0] = 0;
        self.pc = RESET_PC;
        self.csr.reset();
        self.stalled = false;
        self.read_dispatched = false;
        self.fetch_in_progress = false;
        self.stall_count = 0;
        log::info!("RISC-V reset");
    }

    #[must_use]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Register read for the front panel; out-of-range indices read as zero.
    #[must_use]
    pub fn reg(&self, i: usize) -> u32 {
        if i > 31 { 0 } else { self.regs[i] }
    }

    #[must_use]
    pub fn regs(&self) -> &[u32; 32] {
        &self.regs
    }

    #[must_use]
    pub fn csr(&self) -> &CsrFile {
        &self.csr
    }

    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.csr.cycle_count()
    }

    #[must_use]
    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    #[must_use]
    pub fn stalled(&self) -> bool {
        self.stalled
    }

    /// The most recently fetched instruction word.
    #[must_use]
    pub fn current_instr(&self) -> u32 {
        self.current_instr
    }

    pub fn set_trace(&mut self, on: bool) {
        self.trace_enabled = on;
    }

    #[must_use]
    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// Drain the accumulated trace lines.
    pub fn take_trace(&mut self) -> Vec<String> {
        self.trace.drain(..).collect()
    }

    /// Advance the cycle counter pair. Called once per machine step, before
    /// the memory pump, so MMIO overlays observe the post-increment count.
    pub fn advance_cycle(&mut self) {
        self.csr.advance_cycle();
    }

    /// Run one step of the fetch/decode/execute pipeline.
    ///
    /// On success the time counter advances. An `Err` means the run must
    /// halt; PC and the offending instruction remain visible for the panes.
    pub fn do_op(&mut self, mem: &mut impl MemoryPort) -> Result<(), CpuError> {
        let result = self.do_op_inner(mem);
        if result.is_ok() {
            self.csr.advance_time();
        }
        result
    }

    fn do_op_inner(&mut self, mem: &mut impl MemoryPort) -> Result<(), CpuError> {
        if self.pc & 3 != 0 {
            log::warn!("Attempt to execute unaligned code");
            return Err(CpuError::MisalignedPc(self.pc));
        }

        if !self.stalled {
            if !self.fetch_in_progress {
                if !mem.fetch_request(self.pc) {
                    log::warn!("Unable to fetch instruction");
                    return Err(CpuError::FetchRequestFailed(self.pc));
                }
                self.fetch_in_progress = true;
            } else if !mem.fetch_data_empty() {
                self.fetch_in_progress = false;
                self.current_instr = mem.fetch_data();
                self.decoded = Decoded::new(self.current_instr);
                self.read_dispatched = false;
                if !self.decoded.valid {
                    return Err(CpuError::InvalidInstruction(self.current_instr));
                }
            }
        }

        if self.stalled || self.fetch_in_progress {
            self.stall_count += 1;
        }

        if self.fetch_in_progress {
            return Ok(());
        }

        let row = self.table.lookup(self.current_instr);
        self.execute(row, mem)
    }

    /// The unified datapath: every instruction flows through this once per
    /// non-waiting step, steered entirely by its opcode row.
    fn execute(&mut self, row: &'static OpcodeRow, mem: &mut impl MemoryPort) -> Result<(), CpuError> {
        let d = self.decoded;

        if self.trace_enabled {
            let marker = if self.stalled { '*' } else { ' ' };
            let line = format!(
                "{:08X}:{}{:<7}{}",
                self.pc,
                marker,
                row.mnemonic(),
                row.trace_operands(&d, self.current_instr)
            );
            if self.trace.len() == TRACE_CAPACITY {
                self.trace.pop_front();
            }
            self.trace.push_back(line);
        }

        if let Some(cause) = row.trap {
            log::warn!("Unknown Opcode exception");
            return Err(match cause {
                Trap::Ecall => CpuError::Ecall(self.current_instr),
                Trap::Ebreak => CpuError::Ebreak(self.current_instr),
                Trap::UnknownOpcode => CpuError::UnknownOpcode(self.current_instr),
            });
        }

        // Candidate next-PC values.
        let pc_next = self.pc.wrapping_add(4);
        let pc_cond = self.pc.wrapping_add(d.imm_b);
        let pc_rel = self.pc.wrapping_add(d.imm_j);
        let pc_ind = self.regs[d.rs1 as usize].wrapping_add(d.imm_i) & !1;

        // Operands.
        let op1 = self.regs[d.rs1 as usize];
        let op2 = if row.op2_immediate {
            d.imm_i
        } else {
            self.regs[d.rs2 as usize]
        };
        let shift = op2 & 0x1F;

        let mut res = match row.alu {
            AluMode::Add => op1.wrapping_add(op2),
            AluMode::Sub => op1.wrapping_sub(op2),
            AluMode::Sll => op1 << shift,
            AluMode::Srl => op1 >> shift,
            AluMode::Sra => ((op1 as i32) >> shift) as u32,
            AluMode::Xor => op1 ^ op2,
            AluMode::Or => op1 | op2,
            AluMode::And => op1 & op2,

            AluMode::Seq => u32::from(op1 == op2),
            AluMode::Slt => u32::from((op1 as i32) < (op2 as i32)),
            AluMode::Sltu => u32::from(op1 < op2),

            AluMode::Mul => op1.wrapping_mul(op2),
            AluMode::Mulh => {
                ((i64::from(op1 as i32).wrapping_mul(i64::from(op2 as i32))) >> 32) as u32
            }
            AluMode::Mulhsu => {
                ((i64::from(op1 as i32).wrapping_mul(i64::from(op2))) >> 32) as u32
            }
            AluMode::Mulhu => ((u64::from(op1) * u64::from(op2)) >> 32) as u32,
            AluMode::Div => {
                if op2 == 0 {
                    0xFFFF_FFFF
                } else {
                    (op1 as i32).wrapping_div(op2 as i32) as u32
                }
            }
            AluMode::Divu => {
                if op2 == 0 { 0xFFFF_FFFF } else { op1 / op2 }
            }
            AluMode::Rem => {
                if op2 == 0 {
                    0xFFFF_FFFF
                } else {
                    (op1 as i32).wrapping_rem(op2 as i32) as u32
                }
            }
            AluMode::Remu => {
                if op2 == 0 { 0xFFFF_FFFF } else { op1 % op2 }
            }

            AluMode::NextInstr => pc_next,
            AluMode::PcUpper20 => self.pc.wrapping_add(d.imm_u),
            AluMode::Upper20 => d.imm_u,
            AluMode::CsrRead => self.csr.read(d.csrid),
            AluMode::Nul => 0,
        };

        let csr_res = match row.csr {
            CsrMode::Nop => 0,
            CsrMode::Rw => op1,
            CsrMode::Rs => self.csr.read(d.csrid) | op1,
            CsrMode::Rc => self.csr.read(d.csrid) & !op1,
            CsrMode::Rwi => d.uimm,
            CsrMode::Rsi => self.csr.read(d.csrid) | d.uimm,
            CsrMode::Rci => self.csr.read(d.csrid) & !d.uimm,
        };

        if row.csr != CsrMode::Nop {
            log::info!("CSR 0x{:03x} accessed", d.csrid);
        }

        if row.memory == MemoryMode::Store {
            if mem.write_full() {
                self.stalled = true;
            } else {
                let addr = self.regs[d.rs1 as usize].wrapping_add(d.imm_s);
                self.stalled = false;
                if spans_word_boundary(addr, row.memory_mask) {
                    log::info!("Unaligned write at {:08x} {:08x}", addr, row.memory_mask);
                }
                if !mem.write_request(addr, byte_mask(row.memory_mask), self.regs[d.rs2 as usize]) {
                    return Err(CpuError::StoreRefused(addr));
                }
            }
        }

        // Loads with rd == x0 never dispatch and never stall.
        if row.memory == MemoryMode::Load && d.rd != 0 {
            if self.read_dispatched {
                // Stalled waiting for data.
                if !mem.read_data_empty() {
                    self.stalled = false;
                    res = mem.read_data() & row.memory_mask;
                    if res & row.load_sign_bit != 0 {
                        res |= !row.memory_mask;
                    }
                }
            } else {
                let addr = self.regs[d.rs1 as usize].wrapping_add(d.imm_i);
                self.stalled = true;
                if spans_word_boundary(addr, row.memory_mask) {
                    log::info!("Unaligned read at {:08x} {:08x}", addr, row.memory_mask);
                }
                if mem.read_request(addr) {
                    self.read_dispatched = true;
                }
                // Request queue full: retry on the next step.
            }
        }

        // Writeback: nothing below mutates architectural state while stalled.
        if !self.stalled {
            if row.store_result && d.rd != 0 {
                self.regs[d.rd as usize] = res;
            }

            match row.csr {
                CsrMode::Rw | CsrMode::Rs | CsrMode::Rc if d.rs1 != 0 => {
                    self.csr.write(d.csrid, csr_res);
                }
                CsrMode::Rwi | CsrMode::Rsi | CsrMode::Rci => {
                    self.csr.write(d.csrid, csr_res);
                }
                _ => {}
            }

            self.pc = match row.pc {
                PcMode::NextInstr => pc_next,
                PcMode::CondJump => {
                    if res != 0 { pc_cond } else { pc_next }
                }
                PcMode::CondJumpInv => {
                    if res != 0 { pc_next } else { pc_cond }
                }
                PcMode::RelJump => pc_rel,
                PcMode::Indirect => pc_ind,
            };
        }

        Ok(())
    }
}

#[cfg(feature = "test-utils")]
impl Rv32Cpu {
    /// Test-only register poke. Writes to x0 are ignored.
    pub fn set_reg(&mut self, i: usize, value: u32) {
        if (1..32).contains(&i) {
            self.regs[i] = value;
        }
    }

    /// Test-only PC override.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }
}

/// Convert a significant-byte mask (0xFF/0xFFFF/0xFFFFFFFF) into the 4-bit
/// byte-lane mask the write FIFO carries.
fn byte_mask(memory_mask: u32) -> u8 {
    match memory_mask {
        0x0000_00FF => 0x1,
        0x0000_FFFF => 0x3,
        _ => 0xF,
    }
}

/// Does an access of this width at this address straddle a word boundary?
fn spans_word_boundary(addr: u32, memory_mask: u32) -> bool {
    match addr & 3 {
        1 | 2 => memory_mask == 0xFFFF_FFFF,
        3 => memory_mask != 0x0000_00FF,
        _ => false,
    }
}
