//! CLINT region: MSIP and timer-compare storage plus live mtime taps.
//!
//! MSIP (offset 0) and mtimecmp (0x4000/0x4004) are ordinary storage; the
//! mtime window at 0xBFF8/0xBFFC returns the halves of the live CPU cycle
//! counter regardless of anything previously written there.

use crate::region::{check_get, check_set, AccessError, ByteStore, MmioContext, Region};

const MSIP: u32 = 0x0000;
const MTIMECMP_LO: u32 = 0x4000;
const MTIMECMP_HI: u32 = 0x4004;
const MTIME_LO: u32 = 0xBFF8;
const MTIME_HI: u32 = 0xBFFC;

pub struct Clint {
    base: u32,
    store: ByteStore,
}

impl Clint {
    pub fn new(base: u32, size: u32) -> Self {
        log::info!("Set up CLINT region");
        Self {
            base,
            store: ByteStore::new(size),
        }
    }
}

impl Region for Clint {
    fn name(&self) -> &'static str {
        "CLINT"
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        self.store.size()
    }

    fn get(&mut self, offset: u32, ctx: &MmioContext) -> Result<u32, AccessError> {
        check_get(self.base, self.size(), offset)?;
        let v = match offset {
            MSIP | MTIMECMP_LO | MTIMECMP_HI => self.store.word(offset),
            MTIME_LO => ctx.cycle as u32,
            MTIME_HI => (ctx.cycle >> 32) as u32,
            _ => {
                log::info!("CLINT Rd of non-register address 0x{offset:08x}");
                return Ok(0);
            }
        };
        log::info!("CLINT Rd address 0x{offset:08x}: 0x{v:08x}");
        Ok(v)
    }

    fn set(&mut self, offset: u32, mask: u8, value: u32) -> Result<(), AccessError> {
        check_set(self.base, self.size(), offset)?;
        log::info!("CLINT Wr address 0x{offset:08x}: 0x{value:08x}");
        self.store.write_masked(offset, mask, value);
        Ok(())
    }

    fn dump(&self) -> String {
        self.store.dump("CLINT", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtime_reads_the_live_cycle_counter() {
        let mut clint = Clint::new(0x0200_0000, 0x10000);
        let ctx = MmioContext {
            cycle: 0x0000_0002_8000_0001,
        };
        assert_eq!(clint.get(MTIME_LO, &ctx), Ok(0x8000_0001));
        assert_eq!(clint.get(MTIME_HI, &ctx), Ok(0x0000_0002));
    }

    #[test]
    fn mtime_ignores_prior_writes() {
        let mut clint = Clint::new(0x0200_0000, 0x10000);
        clint.set(MTIME_LO, 0xF, 0xDEAD_BEEF).expect("in range");
        let ctx = MmioContext { cycle: 7 };
        assert_eq!(clint.get(MTIME_LO, &ctx), Ok(7));
    }

    #[test]
    fn msip_and_mtimecmp_are_storage() {
        let mut clint = Clint::new(0x0200_0000, 0x10000);
        let ctx = MmioContext::default();
        clint.set(MSIP, 0xF, 1).expect("in range");
        clint.set(MTIMECMP_LO, 0xF, 0x1234).expect("in range");
        clint.set(MTIMECMP_HI, 0xF, 0x5678).expect("in range");
        assert_eq!(clint.get(MSIP, &ctx), Ok(1));
        assert_eq!(clint.get(MTIMECMP_LO, &ctx), Ok(0x1234));
        assert_eq!(clint.get(MTIMECMP_HI, &ctx), Ok(0x5678));
    }

    #[test]
    fn non_register_offsets_read_zero() {
        let mut clint = Clint::new(0x0200_0000, 0x10000);
        let ctx = MmioContext { cycle: 99 };
        assert_eq!(clint.get(0x100, &ctx), Ok(0));
    }
}
