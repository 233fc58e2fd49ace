//! Top-level FE310 machine.
//!
//! Owns the CPU and the memory front-end and enforces the per-step
//! ordering: bump the cycle counters, pump one memory request (with the
//! fresh cycle count visible to the CLINT taps), then run one CPU step.
//! A step failure halts the run but leaves all state inspectable.

use std::fmt;
use std::path::PathBuf;

use cpu_rv32::{CpuError, Rv32Cpu, TableError};

use crate::frontend::MemoryFrontend;
use crate::map::{MapError, MemoryMap};
use crate::region::MmioContext;

/// Machine construction options.
#[derive(Debug, Default, Clone)]
pub struct Fe310Config {
    /// Directory searched for `ram_<base>.img` seed files. `None` skips
    /// image loading entirely.
    pub image_dir: Option<PathBuf>,
    /// Start with instruction tracing off.
    pub trace_off: bool,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    Cpu(CpuError),
    Memory(MapError),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu(e) => write!(f, "{e}"),
            Self::Memory(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StepError {}

impl From<CpuError> for StepError {
    fn from(e: CpuError) -> Self {
        Self::Cpu(e)
    }
}

impl From<MapError> for StepError {
    fn from(e: MapError) -> Self {
        Self::Memory(e)
    }
}

/// The SoC: RV32IM core wired to the FE310 memory fabric.
pub struct Fe310 {
    cpu: Rv32Cpu,
    memory: MemoryFrontend,
}

impl Fe310 {
    /// Build the machine with the standard memory layout.
    pub fn new(config: &Fe310Config) -> Result<Self, TableError> {
        let map = MemoryMap::fe310(config.image_dir.as_deref());
        let mut cpu = Rv32Cpu::new()?;
        cpu.set_trace(!config.trace_off);
        Ok(Self {
            cpu,
            memory: MemoryFrontend::new(map),
        })
    }

    /// Advance the machine by one step.
    pub fn step(&mut self) -> Result<(), StepError> {
        self.cpu.advance_cycle();
        let ctx = MmioContext {
            cycle: self.cpu.cycle_count(),
        };
        self.memory.run(&ctx)?;
        match self.cpu.do_op(&mut self.memory) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("Instruction : {:08x}", self.cpu.current_instr());
                Err(e.into())
            }
        }
    }

    /// Re-initialise registers and PC and flush the memory FIFOs.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.cpu.reset();
    }

    #[must_use]
    pub fn cpu(&self) -> &Rv32Cpu {
        &self.cpu
    }

    pub fn set_trace(&mut self, on: bool) {
        self.cpu.set_trace(on);
    }

    #[must_use]
    pub fn trace_enabled(&self) -> bool {
        self.cpu.trace_enabled()
    }

    /// Drain pending instruction-trace lines.
    pub fn take_trace(&mut self) -> Vec<String> {
        self.cpu.take_trace()
    }

    /// Drain bytes the UART has flushed towards the terminal pane.
    pub fn take_uart_output(&mut self) -> Vec<u8> {
        self.memory
            .map_mut()
            .uart_mut()
            .map(crate::uart::Uart::take_output)
            .unwrap_or_default()
    }

    /// Feed a host keystroke into the UART rx ring.
    pub fn uart_rx_push(&mut self, byte: u8) {
        if let Some(uart) = self.memory.map_mut().uart_mut() {
            uart.rx_enqueue(byte);
        }
    }

    /// Poke a program into the region based at `addr` (ROM/RAM loading).
    pub fn load_words(&mut self, addr: u32, words: &[u32]) -> bool {
        self.memory.map_mut().load_words(addr, words)
    }

    /// Debug read of `width` bytes, outside the queued pipeline.
    pub fn debug_read(&mut self, addr: u32, width: u8) -> Option<u32> {
        let ctx = MmioContext {
            cycle: self.cpu.cycle_count(),
        };
        self.memory.map_mut().read(addr, width, &ctx).ok()
    }

    #[must_use]
    pub fn memory_map(&self) -> &MemoryMap {
        self.memory.map()
    }
}
