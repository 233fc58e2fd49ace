//! ROM region: readable byte storage, writes logged and ignored.

use std::path::Path;

use crate::region::{check_get, check_set, AccessError, ByteStore, MmioContext, Region};

pub struct Rom {
    base: u32,
    store: ByteStore,
}

impl Rom {
    pub fn new(base: u32, size: u32, image_dir: Option<&Path>) -> Self {
        let mut store = ByteStore::new(size);
        if let Some(dir) = image_dir {
            store.load_image(dir, base);
        }
        log::info!("Set up memory region");
        Self { base, store }
    }
}

impl Region for Rom {
    fn name(&self) -> &'static str {
        "ROM"
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        self.store.size()
    }

    fn get(&mut self, offset: u32, _ctx: &MmioContext) -> Result<u32, AccessError> {
        check_get(self.base, self.size(), offset)?;
        Ok(self.store.word(offset))
    }

    fn set(&mut self, offset: u32, _mask: u8, _value: u32) -> Result<(), AccessError> {
        check_set(self.base, self.size(), offset)?;
        log::info!("Attempt to write to ROM");
        Ok(())
    }

    fn dump(&self) -> String {
        self.store.dump("ROM", self.base)
    }

    fn load_words(&mut self, words: &[u32]) -> bool {
        self.store.load_words(words)
    }
}
