//! Non-blocking memory front-end.
//!
//! Five bounded FIFOs decouple the CPU from address decoding: fetch and
//! read each have a request queue and a response queue, writes have a
//! request queue only. One call to [`MemoryFrontend::run`] services at most
//! one request, in strict priority order: drain a write, else a read, else
//! a fetch. Within a channel requests complete in FIFO order; across
//! channels an in-flight load never blocks fetches queued behind it because
//! the response streams are independent.

use cpu_rv32::MemoryPort;

use crate::fifo::Fifo;
use crate::map::{MapError, MemoryMap};
use crate::region::MmioContext;

#[derive(Debug, Clone, Copy, Default)]
struct WriteRequest {
    addr: u32,
    /// Byte-lane mask (bit 0 = byte 0); population count is the width.
    mask: u8,
    value: u32,
}

pub struct MemoryFrontend {
    map: MemoryMap,
    fetch_requests: Fifo<u32>,
    read_requests: Fifo<u32>,
    write_requests: Fifo<WriteRequest>,
    fetch_responses: Fifo<u32>,
    read_responses: Fifo<u32>,
}

impl MemoryFrontend {
    #[must_use]
    pub fn new(map: MemoryMap) -> Self {
        Self {
            map,
            fetch_requests: Fifo::new(),
            read_requests: Fifo::new(),
            write_requests: Fifo::new(),
            fetch_responses: Fifo::new(),
            read_responses: Fifo::new(),
        }
    }

    #[must_use]
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    /// One pump step. Writes drain first because stores must land before
    /// the reads and fetches queued after them observe memory. Read and
    /// fetch requests are only serviced while their response queue has
    /// room; misses substitute a zero word. A failed write halts the run.
    pub fn run(&mut self, ctx: &MmioContext) -> Result<(), MapError> {
        if let Some(w) = self.write_requests.pop() {
            let width = w.mask.count_ones() as u8;
            self.map.write(w.addr, width, w.value)?;
            return Ok(());
        }

        if !self.read_responses.is_full() {
            if let Some(addr) = self.read_requests.pop() {
                let word = self.map.read(addr, 4, ctx).unwrap_or(0);
                self.read_responses.push(word);
                return Ok(());
            }
        }

        if !self.fetch_responses.is_full() {
            if let Some(addr) = self.fetch_requests.pop() {
                let word = self.map.read(addr, 4, ctx).unwrap_or(0);
                self.fetch_responses.push(word);
            }
        }
        Ok(())
    }

    /// Flush all five FIFOs.
    pub fn reset(&mut self) {
        self.fetch_requests.clear();
        self.read_requests.clear();
        self.write_requests.clear();
        self.fetch_responses.clear();
        self.read_responses.clear();
        log::info!("Memory reset");
    }
}

impl MemoryPort for MemoryFrontend {
    fn fetch_request(&mut self, addr: u32) -> bool {
        self.fetch_requests.push(addr)
    }

    fn read_request(&mut self, addr: u32) -> bool {
        self.read_requests.push(addr)
    }

    fn write_request(&mut self, addr: u32, mask: u8, value: u32) -> bool {
        self.write_requests.push(WriteRequest { addr, mask, value })
    }

    fn fetch_data_empty(&self) -> bool {
        self.fetch_responses.is_empty()
    }

    fn read_data_empty(&self) -> bool {
        self.read_responses.is_empty()
    }

    fn write_full(&self) -> bool {
        self.write_requests.is_full()
    }

    fn fetch_data(&mut self) -> u32 {
        self.fetch_responses.pop().unwrap_or_else(|| {
            log::warn!("Attempt to read empty FIFO fetch_data");
            0
        })
    }

    fn read_data(&mut self) -> u32 {
        self.read_responses.pop().unwrap_or_else(|| {
            log::warn!("Attempt to read empty FIFO read_data");
            0
        })
    }
}
