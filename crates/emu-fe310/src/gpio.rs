//! GPIO region: every register offset is pass-through storage.
//!
//! Nothing is wired to the pins, so value/input-enable/output-enable and
//! friends simply hold whatever firmware writes. Accesses are logged for
//! the panel.

use crate::region::{check_get, check_set, AccessError, ByteStore, MmioContext, Region};

pub struct Gpio {
    base: u32,
    store: ByteStore,
}

impl Gpio {
    pub fn new(base: u32, size: u32) -> Self {
        log::info!("Set up GPIO region");
        Self {
            base,
            store: ByteStore::new(size),
        }
    }
}

impl Region for Gpio {
    fn name(&self) -> &'static str {
        "GPIO"
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        self.store.size()
    }

    fn get(&mut self, offset: u32, _ctx: &MmioContext) -> Result<u32, AccessError> {
        check_get(self.base, self.size(), offset)?;
        let v = self.store.word(offset);
        log::info!("GPIO Rd address 0x{offset:08x}: 0x{v:08x}");
        Ok(v)
    }

    fn set(&mut self, offset: u32, mask: u8, value: u32) -> Result<(), AccessError> {
        check_set(self.base, self.size(), offset)?;
        log::info!("GPIO Wr address 0x{offset:08x}: 0x{value:08x}");
        self.store.write_masked(offset, mask, value);
        Ok(())
    }

    fn dump(&self) -> String {
        self.store.dump("GPIO", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_are_pass_through() {
        let mut gpio = Gpio::new(0x1001_2000, 0xFFF);
        let ctx = MmioContext::default();
        gpio.set(0x0C, 0xF, 0x0000_00FF).expect("output_en");
        gpio.set(0x10, 0xF, 0x0000_00AA).expect("output_val");
        assert_eq!(gpio.get(0x0C, &ctx), Ok(0x0000_00FF));
        assert_eq!(gpio.get(0x10, &ctx), Ok(0x0000_00AA));
    }
}
