//! UART region: the one structured peripheral.
//!
//! Two depth-8 byte rings (tx, rx), watermarks, enables, and a divisor,
//! mapped per the FE310 register layout:
//!
//! | Offset | Register |
//! |--------|----------|
//! | 0x00   | txdata: write pushes tx, read returns full flag in bit 31 |
//! | 0x04   | rxdata: read dequeues rx, bit 31 set when empty |
//! | 0x08   | txctrl: enable, stop bits, tx watermark |
//! | 0x0C   | rxctrl: enable, rx watermark |
//! | 0x10   | ie: rx/tx interrupt enables |
//! | 0x14   | ip: watermark-pending flags (read-only) |
//! | 0x18   | div: baud divisor |
//!
//! Whenever `tx_enable` is set, any register write flushes the tx ring
//! byte-by-byte into the output queue the front panel drains.

use crate::fifo::Fifo;
use crate::region::{check_get, check_set, AccessError, MmioContext, Region};

const TXDATA: u32 = 0x00;
const RXDATA: u32 = 0x04;
const TXCTRL: u32 = 0x08;
const RXCTRL: u32 = 0x0C;
const IE: u32 = 0x10;
const IP: u32 = 0x14;
const DIV: u32 = 0x18;

pub struct Uart {
    base: u32,
    size: u32,
    divisor: u16,
    tx: Fifo<u8>,
    rx: Fifo<u8>,
    tx_watermark: u8,
    rx_watermark: u8,
    tx_enable: bool,
    rx_enable: bool,
    tx_irq_enable: bool,
    rx_irq_enable: bool,
    /// 1 or 2.
    stop_bits: u8,
    /// Bytes flushed out of the tx ring, awaiting the UART pane.
    output: Vec<u8>,
}

impl Uart {
    pub fn new(base: u32, size: u32) -> Self {
        log::info!("Set up UART region");
        Self {
            base,
            size,
            divisor: 0xFFFF,
            tx: Fifo::new(),
            rx: Fifo::new(),
            tx_watermark: 0,
            rx_watermark: 0,
            tx_enable: false,
            rx_enable: false,
            tx_irq_enable: false,
            rx_irq_enable: false,
            stop_bits: 1,
            output: Vec::new(),
        }
    }

    /// Host-side receive: push a byte into the rx ring (keyboard input).
    pub fn rx_enqueue(&mut self, byte: u8) {
        if !self.rx_enable {
            log::debug!("UART rx disabled while adding 0x{byte:02x}");
            return;
        }
        if self.rx.push(byte) {
            log::debug!("UART data added to rx queue 0x{byte:02x}");
        } else {
            log::debug!("UART rx queue overflow adding 0x{byte:02x}");
        }
    }

    /// Drain the bytes flushed towards the terminal pane.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Move everything in the tx ring to the output queue.
    fn flush_tx(&mut self) {
        while let Some(byte) = self.tx.pop() {
            self.output.push(byte);
        }
    }
}

impl Region for Uart {
    fn name(&self) -> &'static str {
        "UART"
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn get(&mut self, offset: u32, _ctx: &MmioContext) -> Result<u32, AccessError> {
        check_get(self.base, self.size, offset)?;
        let v = match offset {
            TXDATA => {
                if self.tx.is_full() { 1 << 31 } else { 0 }
            }
            RXDATA => match self.rx.pop() {
                Some(byte) => {
                    log::debug!("UART rx queue read - 0x{byte:02x}");
                    u32::from(byte)
                }
                None => 1 << 31,
            },
            TXCTRL => {
                u32::from(self.tx_enable)
                    | if self.stop_bits == 2 { 2 } else { 0 }
                    | (u32::from(self.tx_watermark) << 16)
            }
            RXCTRL => u32::from(self.rx_enable) | (u32::from(self.rx_watermark) << 16),
            IE => u32::from(self.rx_irq_enable) | (u32::from(self.tx_irq_enable) << 1),
            IP => {
                u32::from(self.tx.len() > usize::from(self.tx_watermark))
                    | (u32::from(self.rx.len() > usize::from(self.rx_watermark)) << 1)
            }
            DIV => u32::from(self.divisor),
            _ => {
                log::info!("UART Rd unknown address 0x{offset:08x}");
                0
            }
        };
        Ok(v)
    }

    fn set(&mut self, offset: u32, _mask: u8, value: u32) -> Result<(), AccessError> {
        check_set(self.base, self.size, offset)?;
        match offset {
            TXDATA => {
                let byte = (value & 0xFF) as u8;
                if self.tx.push(byte) {
                    log::debug!("UART data added to tx queue 0x{byte:02x}");
                } else {
                    log::debug!("UART tx queue overflow adding 0x{byte:02x}");
                }
            }
            RXDATA | IP => {}
            TXCTRL => {
                self.tx_enable = value & 1 != 0;
                self.stop_bits = if value & 2 != 0 { 2 } else { 1 };
                self.tx_watermark = ((value >> 16) & 0x7) as u8;
                log::debug!(
                    "UART set tx_enable = {}, stop_bits = {}, tx_watermark = {}",
                    u8::from(self.tx_enable),
                    self.stop_bits,
                    self.tx_watermark
                );
            }
            RXCTRL => {
                self.rx_enable = value & 1 != 0;
                self.rx_watermark = ((value >> 16) & 0x7) as u8;
                log::debug!(
                    "UART set rx_enable = {}, rx_watermark = {}",
                    u8::from(self.rx_enable),
                    self.rx_watermark
                );
            }
            IE => {
                self.rx_irq_enable = value & 1 != 0;
                self.tx_irq_enable = value & 2 != 0;
            }
            DIV => {
                self.divisor = (value & 0xFFFF) as u16;
                log::debug!("UART Divisor set to 0x{value:08x}");
            }
            _ => {
                log::info!("UART Wr unknown address 0x{offset:08x}: 0x{value:08x}");
            }
        }

        if self.tx_enable {
            self.flush_tx();
        }
        Ok(())
    }

    fn dump(&self) -> String {
        format!("UART 0x{:08x} length 0x{:08x}\n", self.base, self.size)
    }

    fn as_uart(&mut self) -> Option<&mut Uart> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_uart() -> Uart {
        Uart::new(0x1001_3000, 0xFFF)
    }

    fn ctx() -> MmioContext {
        MmioContext::default()
    }

    #[test]
    fn tx_write_with_enable_reaches_the_pane() {
        let mut uart = make_uart();
        uart.set(TXCTRL, 0xF, 1).expect("enable tx");
        uart.set(TXDATA, 0xF, u32::from(b'A')).expect("push byte");
        assert_eq!(uart.take_output(), vec![b'A']);
        assert!(uart.take_output().is_empty(), "drain is destructive");
    }

    #[test]
    fn tx_data_queues_until_enabled() {
        let mut uart = make_uart();
        uart.set(TXDATA, 0xF, 0x41).expect("queued");
        uart.set(TXDATA, 0xF, 0x42).expect("queued");
        assert!(uart.take_output().is_empty(), "nothing flushes while disabled");
        // Enabling via txctrl flushes the backlog.
        uart.set(TXCTRL, 0xF, 1).expect("enable tx");
        assert_eq!(uart.take_output(), vec![0x41, 0x42]);
    }

    #[test]
    fn txdata_read_reports_full_flag() {
        let mut uart = make_uart();
        assert_eq!(uart.get(TXDATA, &ctx()), Ok(0), "not full");
        for i in 0..8 {
            uart.set(TXDATA, 0xF, i).expect("queued");
        }
        assert_eq!(uart.get(TXDATA, &ctx()), Ok(1 << 31), "full");
        // The ninth byte is dropped, not queued.
        uart.set(TXDATA, 0xF, 0x99).expect("accepted and dropped");
        assert_eq!(uart.get(TXDATA, &ctx()), Ok(1 << 31));
    }

    #[test]
    fn rx_read_dequeues_or_flags_empty() {
        let mut uart = make_uart();
        assert_eq!(uart.get(RXDATA, &ctx()), Ok(1 << 31), "empty flag");
        uart.set(RXCTRL, 0xF, 1).expect("enable rx");
        uart.rx_enqueue(0x55);
        uart.rx_enqueue(0x66);
        assert_eq!(uart.get(RXDATA, &ctx()), Ok(0x55));
        assert_eq!(uart.get(RXDATA, &ctx()), Ok(0x66));
        assert_eq!(uart.get(RXDATA, &ctx()), Ok(1 << 31));
    }

    #[test]
    fn rx_enqueue_needs_enable() {
        let mut uart = make_uart();
        uart.rx_enqueue(0x55);
        assert_eq!(uart.get(RXDATA, &ctx()), Ok(1 << 31), "dropped while disabled");
    }

    #[test]
    fn txctrl_round_trips_fields() {
        let mut uart = make_uart();
        // enable, two stop bits, watermark 5
        uart.set(TXCTRL, 0xF, (5 << 16) | 2 | 1).expect("configured");
        assert_eq!(uart.get(TXCTRL, &ctx()), Ok((5 << 16) | 2 | 1));
    }

    #[test]
    fn rxctrl_round_trips_fields() {
        let mut uart = make_uart();
        uart.set(RXCTRL, 0xF, (3 << 16) | 1).expect("configured");
        assert_eq!(uart.get(RXCTRL, &ctx()), Ok((3 << 16) | 1));
    }

    #[test]
    fn interrupt_enables_round_trip() {
        let mut uart = make_uart();
        uart.set(IE, 0xF, 0x3).expect("configured");
        assert_eq!(uart.get(IE, &ctx()), Ok(0x3));
    }

    #[test]
    fn pending_bits_compare_against_watermarks() {
        let mut uart = make_uart();
        // tx watermark 1: pending once more than one byte queued.
        uart.set(TXCTRL, 0xF, 1 << 16).expect("watermark only, no enable");
        uart.set(TXDATA, 0xF, 0x41).expect("one byte");
        assert_eq!(uart.get(IP, &ctx()), Ok(0), "at watermark, not above");
        uart.set(TXDATA, 0xF, 0x42).expect("two bytes");
        assert_eq!(uart.get(IP, &ctx()), Ok(1), "above watermark");

        uart.set(RXCTRL, 0xF, 1).expect("rx enable, watermark 0");
        uart.rx_enqueue(0x55);
        assert_eq!(uart.get(IP, &ctx()), Ok(1 | 2), "rx above watermark too");
    }

    #[test]
    fn divisor_round_trips_low_sixteen_bits() {
        let mut uart = make_uart();
        assert_eq!(uart.get(DIV, &ctx()), Ok(0xFFFF), "reset value");
        uart.set(DIV, 0xF, 0x0001_8ABC).expect("configured");
        assert_eq!(uart.get(DIV, &ctx()), Ok(0x8ABC));
    }

    #[test]
    fn unknown_offsets_log_and_read_zero() {
        let mut uart = make_uart();
        assert_eq!(uart.get(0x20, &ctx()), Ok(0));
        assert!(uart.set(0x20, 0xF, 1).is_ok());
    }

    #[test]
    fn out_of_range_rejected() {
        let mut uart = make_uart();
        // Region size is 0xFFF, so 0xFF8 is the last full word.
        assert!(uart.get(0xFF8, &ctx()).is_ok());
        assert!(uart.get(0xFFC, &ctx()).is_err());
        assert!(uart.set(0xFFD, 0xF, 0).is_err());
    }
}
