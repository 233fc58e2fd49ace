//! Single-instruction vector tests for the RV32IM ALU.
//!
//! Each vector describes one R-type instruction: the encoding, the initial
//! rs1/rs2 values, and the expected rd. The harness runs the instruction
//! against a flat scripted memory port and checks the result register.
//! Vectors live in a JSON table so new cases are data, not code.

use std::collections::VecDeque;

use cpu_rv32::{MemoryPort, Rv32Cpu, RESET_PC};
use serde::Deserialize;

const FIFO_DEPTH: usize = 8;
const MEM_SIZE: usize = 0x1000;

/// Minimal queued memory: a small code window at the reset vector.
struct FlatPort {
    mem: Vec<u8>,
    fetch_req: VecDeque<u32>,
    fetch_resp: VecDeque<u32>,
}

impl FlatPort {
    fn with_program(words: &[u32]) -> Self {
        let mut mem = vec![0u8; MEM_SIZE];
        for (i, w) in words.iter().enumerate() {
            mem[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        Self {
            mem,
            fetch_req: VecDeque::new(),
            fetch_resp: VecDeque::new(),
        }
    }

    fn pump(&mut self) {
        if let Some(addr) = self.fetch_req.pop_front() {
            let at = (addr.wrapping_sub(RESET_PC) as usize) % MEM_SIZE;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&self.mem[at..at + 4]);
            self.fetch_resp.push_back(u32::from_le_bytes(bytes));
        }
    }
}

impl MemoryPort for FlatPort {
    fn fetch_request(&mut self, addr: u32) -> bool {
        if self.fetch_req.len() == FIFO_DEPTH {
            return false;
        }
        self.fetch_req.push_back(addr);
        true
    }

    fn read_request(&mut self, _addr: u32) -> bool {
        false
    }

    fn write_request(&mut self, _addr: u32, _mask: u8, _value: u32) -> bool {
        false
    }

    fn fetch_data_empty(&self) -> bool {
        self.fetch_resp.is_empty()
    }

    fn read_data_empty(&self) -> bool {
        true
    }

    fn write_full(&self) -> bool {
        true
    }

    fn fetch_data(&mut self) -> u32 {
        self.fetch_resp.pop_front().unwrap_or(0)
    }

    fn read_data(&mut self) -> u32 {
        0
    }
}

#[derive(Deserialize)]
struct Vector {
    name: String,
    /// Instruction encoding, `0x`-prefixed hex. All vectors use rd = x3,
    /// rs1 = x1, rs2 = x2.
    instr: String,
    rs1: u32,
    rs2: u32,
    rd: u32,
}

fn parse_hex(s: &str) -> u32 {
    u32::from_str_radix(s.trim_start_matches("0x"), 16).expect("hex encoding")
}

/// ALU vectors: every RV32M op plus the base-set edge cases.
const ALU_VECTORS: &str = r#"[
    {"name": "add wraps",            "instr": "0x002081B3", "rs1": 4294967295, "rs2": 1,          "rd": 0},
    {"name": "add simple",           "instr": "0x002081B3", "rs1": 5,          "rs2": 12,         "rd": 17},
    {"name": "sub borrows",          "instr": "0x402081B3", "rs1": 0,          "rs2": 1,          "rd": 4294967295},
    {"name": "sll into sign bit",    "instr": "0x002091B3", "rs1": 1,          "rs2": 31,         "rd": 2147483648},
    {"name": "sll masks shift",      "instr": "0x002091B3", "rs1": 1,          "rs2": 33,         "rd": 2},
    {"name": "slt signed",           "instr": "0x0020A1B3", "rs1": 4294967291, "rs2": 3,          "rd": 1},
    {"name": "sltu unsigned",        "instr": "0x0020B1B3", "rs1": 4294967291, "rs2": 3,          "rd": 0},
    {"name": "xor",                  "instr": "0x0020C1B3", "rs1": 4042322160, "rs2": 16711935,   "rd": 4027576335},
    {"name": "srl logical",          "instr": "0x0020D1B3", "rs1": 2147483648, "rs2": 31,         "rd": 1},
    {"name": "sra arithmetic",       "instr": "0x4020D1B3", "rs1": 2147483648, "rs2": 31,         "rd": 4294967295},
    {"name": "or",                   "instr": "0x0020E1B3", "rs1": 2863311530, "rs2": 1431655765, "rd": 4294967295},
    {"name": "and",                  "instr": "0x0020F1B3", "rs1": 4294901760, "rs2": 4278255360, "rd": 4278190080},
    {"name": "mul low half",         "instr": "0x022081B3", "rs1": 65536,      "rs2": 65536,      "rd": 0},
    {"name": "mulh carries",         "instr": "0x022091B3", "rs1": 65536,      "rs2": 65536,      "rd": 1},
    {"name": "mulh signed",          "instr": "0x022091B3", "rs1": 4294967295, "rs2": 4294967295, "rd": 0},
    {"name": "mulhsu mixed",         "instr": "0x0220A1B3", "rs1": 4294967295, "rs2": 2,          "rd": 4294967295},
    {"name": "mulhu unsigned",       "instr": "0x0220B1B3", "rs1": 2147483648, "rs2": 2,          "rd": 1},
    {"name": "div truncates",        "instr": "0x0220C1B3", "rs1": 4294967289, "rs2": 2,          "rd": 4294967293},
    {"name": "div by zero",          "instr": "0x0220C1B3", "rs1": 7,          "rs2": 0,          "rd": 4294967295},
    {"name": "div overflow",         "instr": "0x0220C1B3", "rs1": 2147483648, "rs2": 4294967295, "rd": 2147483648},
    {"name": "divu",                 "instr": "0x0220D1B3", "rs1": 7,          "rs2": 2,          "rd": 3},
    {"name": "divu by zero",         "instr": "0x0220D1B3", "rs1": 7,          "rs2": 0,          "rd": 4294967295},
    {"name": "rem keeps sign",       "instr": "0x0220E1B3", "rs1": 4294967289, "rs2": 2,          "rd": 4294967295},
    {"name": "rem by zero",          "instr": "0x0220E1B3", "rs1": 7,          "rs2": 0,          "rd": 4294967295},
    {"name": "remu",                 "instr": "0x0220F1B3", "rs1": 7,          "rs2": 2,          "rd": 1},
    {"name": "remu by zero",         "instr": "0x0220F1B3", "rs1": 7,          "rs2": 0,          "rd": 4294967295}
]"#;

/// Execute one instruction and return the value left in x3.
fn run_vector(instr: u32, rs1: u32, rs2: u32) -> u32 {
    let mut cpu = Rv32Cpu::new().expect("opcode table compiles");
    let mut port = FlatPort::with_program(&[instr]);
    cpu.set_reg(1, rs1);
    cpu.set_reg(2, rs2);

    for _ in 0..8 {
        cpu.advance_cycle();
        port.pump();
        cpu.do_op(&mut port).expect("step succeeds");
        if cpu.pc() == RESET_PC + 4 {
            return cpu.reg(3);
        }
    }
    panic!("instruction 0x{instr:08x} did not retire");
}

#[test]
fn alu_vectors() {
    let vectors: Vec<Vector> = serde_json::from_str(ALU_VECTORS).expect("vector JSON parses");
    assert!(vectors.len() >= 26);
    for v in &vectors {
        let instr = parse_hex(&v.instr);
        let got = run_vector(instr, v.rs1, v.rs2);
        assert_eq!(got, v.rd, "vector '{}' (0x{instr:08x})", v.name);
    }
}

#[test]
fn fetch_takes_a_full_round_trip() {
    // The port only services one request per pump, so an instruction needs
    // one step to queue the fetch and a second to retire it.
    let mut cpu = Rv32Cpu::new().expect("opcode table compiles");
    let mut port = FlatPort::with_program(&[0x0050_0093]); // addi x1, x0, 5

    cpu.advance_cycle();
    port.pump();
    cpu.do_op(&mut port).expect("queues the fetch");
    assert_eq!(cpu.pc(), RESET_PC, "nothing retires on the request step");

    cpu.advance_cycle();
    port.pump();
    cpu.do_op(&mut port).expect("retires the instruction");
    assert_eq!(cpu.pc(), RESET_PC + 4);
    assert_eq!(cpu.reg(1), 5);
}

#[test]
fn set_pc_redirects_execution() {
    let mut cpu = Rv32Cpu::new().expect("opcode table compiles");
    // Program with the interesting instruction at +8.
    let mut port = FlatPort::with_program(&[0, 0, 0x0050_0093]);
    cpu.set_pc(RESET_PC + 8);
    for _ in 0..4 {
        cpu.advance_cycle();
        port.pump();
        cpu.do_op(&mut port).expect("step succeeds");
        if cpu.pc() == RESET_PC + 12 {
            break;
        }
    }
    assert_eq!(cpu.reg(1), 5);
}
