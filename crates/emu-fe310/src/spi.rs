//! SPI region: pass-through storage with the ready bit pinned.
//!
//! Firmware polls `sckdiv`-adjacent status before driving the flash; reads
//! of offset 0 come back with bit 31 set so it never spins.

use crate::region::{check_get, check_set, AccessError, ByteStore, MmioContext, Region};

pub struct Spi {
    base: u32,
    store: ByteStore,
}

impl Spi {
    pub fn new(base: u32, size: u32) -> Self {
        log::info!("Set up SPI region");
        Self {
            base,
            store: ByteStore::new(size),
        }
    }
}

impl Region for Spi {
    fn name(&self) -> &'static str {
        "SPI"
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        self.store.size()
    }

    fn get(&mut self, offset: u32, _ctx: &MmioContext) -> Result<u32, AccessError> {
        check_get(self.base, self.size(), offset)?;
        let mut v = self.store.word(offset);
        if offset == 0 {
            v |= 1 << 31;
        }
        log::info!("SPI Rd address 0x{offset:08x}: 0x{v:08x}");
        Ok(v)
    }

    fn set(&mut self, offset: u32, mask: u8, value: u32) -> Result<(), AccessError> {
        check_set(self.base, self.size(), offset)?;
        log::info!("SPI Wr address 0x{offset:08x}: 0x{value:08x}");
        self.store.write_masked(offset, mask, value);
        Ok(())
    }

    fn dump(&self) -> String {
        self.store.dump("SPI", self.base)
    }
}
