//! PRCI region: clock-generation registers.
//!
//! Pass-through storage except that firmware polling for clock readiness
//! must see the done bits: reads of `hfxosccfg` (offset 0) and `pllcfg`
//! (offset 8) come back with bit 31 set.

use crate::region::{check_get, check_set, AccessError, ByteStore, MmioContext, Region};

pub struct Prci {
    base: u32,
    store: ByteStore,
}

impl Prci {
    pub fn new(base: u32, size: u32) -> Self {
        log::info!("Set up PRCI region");
        Self {
            base,
            store: ByteStore::new(size),
        }
    }
}

impl Region for Prci {
    fn name(&self) -> &'static str {
        "PRCI"
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
        match offset {
            // HF-XOSC ready
            0x0 => v |= 1 << 31,
            // PLL lock
            0x8 => v |= 1 << 31,
            _ => {}
        }
        log::info!("PRCI Rd address 0x{offset:08x}: 0x{v:08x}");
        Ok(v)
    }

    fn set(&mut self, offset: u32, mask: u8, value: u32) -> Result<(), AccessError> {
        check_set(self.base, self.size(), offset)?;
        log::info!("PRCI Wr address 0x{offset:08x}: 0x{value:08x}");
        self.store.write_masked(offset, mask, value);
        Ok(())
    }

    fn dump(&self) -> String {
        self.store.dump("PRCI", self.base)
    }
}
