//! Banked memory bus.
//!
//! The 16-bit guest address space is four 16 KiB page slots, each mapped
//! to a flash page, a RAM page, or nothing. Unmapped reads return 0xFF
//! and flash writes are silently dropped (the flash programming state
//! machine lives outside this core), so the bus has no fallible paths.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::CalcModel;

/// Bytes per page slot.
pub const PAGE_SIZE: usize = 0x4000;

/// What a page slot is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bank {
    /// Flash (or masked ROM) page. Writes are dropped.
    Flash(u8),
    /// RAM page.
    Ram(u8),
    /// Nothing: reads float high, writes vanish.
    Unmapped,
}

/// Access kind reported to the watch hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// The memory side of the machine bus.
pub struct MemoryBus {
    flash: Vec<u8>,
    ram: Vec<u8>,
    map: [Bank; 4],
    /// Optional watchpoint hook, called for every guest access with the
    /// address, the byte moved, and the access kind.
    watch: Option<Box<dyn FnMut(u16, u8, Access)>>,
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("flash", &self.flash)
            .field("ram", &self.ram)
            .field("map", &self.map)
            .field("watch", &self.watch.is_some())
            .finish()
    }
}

impl MemoryBus {
    /// Create the memory for a model with empty flash and zeroed RAM.
    #[must_use]
    pub fn new(model: CalcModel) -> Self {
        Self {
            flash: vec![0xFF; model.flash_pages() * PAGE_SIZE],
            ram: vec![0; model.ram_pages() * PAGE_SIZE],
            map: Self::boot_map(),
            watch: None,
        }
    }

    /// The mapping in force at power-on: OS code in the low slots, RAM
    /// page 0 on top.
    #[must_use]
    pub fn boot_map() -> [Bank; 4] {
        [Bank::Flash(0), Bank::Flash(0), Bank::Flash(0), Bank::Ram(0)]
    }

    /// Load a ROM image into flash.
    ///
    /// # Errors
    ///
    /// Returns an error if `rom` does not match the model's flash size.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), String> {
        if rom.len() != self.flash.len() {
            return Err(format!(
                "ROM image is {} bytes, expected {}",
                rom.len(),
                self.flash.len()
            ));
        }
        self.flash.copy_from_slice(rom);
        Ok(())
    }

    /// Remap a page slot (0-3).
    pub fn map_page(&mut self, slot: usize, bank: Bank) {
        trace!(slot, ?bank, "remapping page slot");
        self.map[slot & 3] = bank;
    }

    /// The current slot mapping.
    #[must_use]
    pub fn page_map(&self) -> [Bank; 4] {
        self.map
    }

    /// Restore a slot mapping wholesale (state load).
    pub fn set_page_map(&mut self, map: [Bank; 4]) {
        self.map = map;
    }

    /// Install the watchpoint hook.
    pub fn set_watch_hook(&mut self, hook: Box<dyn FnMut(u16, u8, Access)>) {
        self.watch = Some(hook);
    }

    fn bank_for(&self, addr: u16) -> Bank {
        self.map[(addr >> 14) as usize]
    }

    /// Read a byte, firing the watch hook.
    pub fn read(&mut self, addr: u16) -> u8 {
        let value = self.peek(addr);
        if let Some(watch) = &mut self.watch {
            watch(addr, value, Access::Read);
        }
        value
    }

    /// Read a byte without side effects.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        let offset = addr as usize & (PAGE_SIZE - 1);
        match self.bank_for(addr) {
            Bank::Flash(page) => self.flash[page as usize * PAGE_SIZE + offset],
            Bank::Ram(page) => self.ram[page as usize * PAGE_SIZE + offset],
            Bank::Unmapped => 0xFF,
        }
    }

    /// Write a byte. Flash and unmapped writes are dropped.
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Some(watch) = &mut self.watch {
            watch(addr, value, Access::Write);
        }
        let offset = addr as usize & (PAGE_SIZE - 1);
        match self.bank_for(addr) {
            Bank::Ram(page) => self.ram[page as usize * PAGE_SIZE + offset] = value,
            Bank::Flash(_) | Bank::Unmapped => {}
        }
    }

    /// All of RAM, for state persistence.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Restore RAM contents (state load).
    ///
    /// # Errors
    ///
    /// Returns an error on a size mismatch.
    pub fn load_ram(&mut self, data: &[u8]) -> Result<(), String> {
        if data.len() != self.ram.len() {
            return Err(format!(
                "RAM snapshot is {} bytes, expected {}",
                data.len(),
                self.ram.len()
            ));
        }
        self.ram.copy_from_slice(data);
        Ok(())
    }

    /// Clear RAM and restore the boot mapping.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.map = Self::boot_map();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> MemoryBus {
        MemoryBus::new(CalcModel::Ti83Plus)
    }

    #[test]
    fn ram_slot_round_trips() {
        let mut mem = bus();
        mem.write(0xC000, 0x42);
        assert_eq!(mem.read(0xC000), 0x42);
    }

    #[test]
    fn flash_writes_are_dropped() {
        let mut mem = bus();
        let before = mem.read(0x0000);
        mem.write(0x0000, !before);
        assert_eq!(mem.read(0x0000), before);
    }

    #[test]
    fn unmapped_reads_float_high() {
        let mut mem = bus();
        mem.map_page(2, Bank::Unmapped);
        mem.write(0x8000, 0x00);
        assert_eq!(mem.read(0x8000), 0xFF);
    }

    #[test]
    fn remapping_selects_another_ram_page() {
        let mut mem = bus();
        mem.map_page(2, Bank::Ram(1));
        mem.write(0x8000, 0x11);
        mem.map_page(2, Bank::Ram(0));
        mem.write(0x8000, 0x22);
        mem.map_page(2, Bank::Ram(1));
        assert_eq!(mem.read(0x8000), 0x11);
    }

    #[test]
    fn watch_hook_sees_both_kinds() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let mut mem = bus();
        mem.set_watch_hook(Box::new(move |addr, value, kind| {
            sink.borrow_mut().push((addr, value, kind));
        }));

        mem.write(0xC000, 0x5A);
        mem.read(0xC000);
        let log = log.borrow();
        assert_eq!(log[0], (0xC000, 0x5A, Access::Write));
        assert_eq!(log[1], (0xC000, 0x5A, Access::Read));
    }
}
