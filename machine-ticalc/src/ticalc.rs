//! Top-level calculator machine.

use calc_core::{Bus, IoBus};
use cpu_z80::Z80;
use toshiba_t6a04::{CursorMode, Lcd, WordLength, DISPLAY_SIZE};
use tracing::{debug, info, trace};

use crate::clock::Clock;
use crate::memory::{Access, MemoryBus};
use crate::model::CalcModel;
use crate::ports::{PortDevice, Ports};
use crate::savestate::{CpuState, LcdState, SaveState};

/// Configuration for creating a calculator instance.
pub struct TiCalcConfig {
    pub model: CalcModel,
    /// ROM image. Must be the flash size for the model.
    pub rom: Vec<u8>,
}

/// The machine bus: memory, port table, LCD, and clock.
///
/// The CPU accesses all of these through the `Bus`/`IoBus` traits; hosts
/// reach the parts directly through the public fields.
#[derive(Debug)]
pub struct CalcBus {
    pub memory: MemoryBus,
    pub ports: Ports,
    pub lcd: Lcd,
    pub clock: Clock,
}

impl Bus for CalcBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
    }
}

impl IoBus for CalcBus {
    fn read_io(&mut self, port: u8, bus: u8) -> u8 {
        match self.ports.device(port) {
            Some(PortDevice::LcdCommand) => self.lcd.read_command(self.clock.tstates()),
            Some(PortDevice::LcdData) => {
                self.lcd
                    .read_data(self.clock.tstates(), self.clock.elapsed(), bus)
            }
            None => 0xFF,
        }
    }

    fn write_io(&mut self, port: u8, value: u8) {
        match self.ports.device(port) {
            Some(PortDevice::LcdCommand) => self.lcd.write_command(value, self.clock.tstates()),
            Some(PortDevice::LcdData) => {
                self.lcd
                    .write_data(value, self.clock.tstates(), self.clock.elapsed());
            }
            None => {}
        }
    }
}

/// A complete calculator.
#[derive(Debug)]
pub struct TiCalc {
    model: CalcModel,
    cpu: Z80,
    bus: CalcBus,
}

impl TiCalc {
    /// Create a calculator from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM image does not match the model size.
    pub fn new(config: &TiCalcConfig) -> Result<Self, String> {
        let mut memory = MemoryBus::new(config.model);
        memory.load_rom(&config.rom)?;

        let lcd = Lcd::new(
            config.model.lcd_base_level(),
            config.model.display_width(),
            config.model.has_lcd_busy_gate(),
        );

        info!(model = ?config.model, "calculator constructed");
        Ok(Self {
            model: config.model,
            cpu: Z80::new(),
            bus: CalcBus {
                memory,
                ports: Ports::standard(),
                lcd,
                clock: Clock::new(config.model.clock_hz()),
            },
        })
    }

    #[must_use]
    pub fn model(&self) -> CalcModel {
        self.model
    }

    /// Execute one instruction and advance the clock by its cost.
    /// Returns the T-states consumed.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.bus);
        self.bus.clock.advance(cycles);
        cycles
    }

    /// Run until at least `tstates` T-states have elapsed (from now).
    /// Returns the T-states actually consumed; the overshoot is at most
    /// one instruction.
    pub fn run(&mut self, tstates: u64) -> u64 {
        let start = self.bus.clock.tstates();
        while self.bus.clock.tstates() - start < tstates {
            self.step();
        }
        self.bus.clock.tstates() - start
    }

    /// Drive the maskable interrupt line.
    pub fn set_irq(&mut self, asserted: bool) {
        trace!(asserted, "irq line");
        self.cpu.set_irq(asserted);
    }

    /// Latch a non-maskable interrupt.
    pub fn nmi(&mut self) {
        trace!("nmi latched");
        self.cpu.nmi();
    }

    /// Reset the machine: CPU registers, LCD, RAM, bank map, and clock.
    pub fn reset(&mut self) {
        debug!(model = ?self.model, "machine reset");
        self.cpu.reset();
        self.bus.memory.reset();
        self.bus.lcd.reset();
        self.bus.clock.reset();
    }

    /// Render and borrow the current grayscale frame
    /// (driver-native 128x64, one byte per pixel).
    pub fn lcd_image(&mut self) -> &[u8] {
        self.bus.lcd.image()
    }

    /// Install the hook invoked on every grayscale enqueue.
    pub fn set_lcd_enqueue_hook(&mut self, hook: Box<dyn FnMut()>) {
        self.bus.lcd.set_enqueue_hook(hook);
    }

    /// Install the memory watchpoint hook.
    pub fn set_watch_hook(&mut self, hook: Box<dyn FnMut(u16, u8, Access)>) {
        self.bus.memory.set_watch_hook(hook);
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    /// Mutable reference to the CPU.
    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &CalcBus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut CalcBus {
        &mut self.bus
    }

    /// Capture the machine state as flat serde structs. The grayscale
    /// ring is excluded; it re-synthesizes after a load.
    #[must_use]
    pub fn save_state(&self) -> SaveState {
        let lcd = &self.bus.lcd;
        SaveState {
            model: self.model,
            cpu: CpuState {
                regs: self.cpu.regs,
                prefix: self.cpu.prefix(),
                bus: self.cpu.bus_byte(),
                ei_block: self.cpu.ei_blocked(),
                tstates: self.cpu.tstates(),
            },
            lcd: LcdState {
                active: lcd.active,
                word_len: if lcd.word_len == WordLength::Eight { 8 } else { 6 },
                cursor_mode: lcd.cursor_mode.bits(),
                x: lcd.x,
                y: lcd.y,
                z: lcd.z,
                contrast: lcd.contrast,
                last_read: lcd.last_read,
                last_tstate: lcd.last_tstate(),
                display: lcd.display_ram().to_vec(),
            },
            clock_tstates: self.bus.clock.tstates(),
            page_map: self.bus.memory.page_map(),
            ram: self.bus.memory.ram().to_vec(),
        }
    }

    /// Restore the machine from a captured state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state was captured from a different model
    /// or its buffers have the wrong size.
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), String> {
        if state.model != self.model {
            return Err(format!(
                "save state is for {:?}, this machine is {:?}",
                state.model, self.model
            ));
        }
        let display: &[u8; DISPLAY_SIZE] = state
            .lcd
            .display
            .as_slice()
            .try_into()
            .map_err(|_| format!("LCD snapshot is {} bytes", state.lcd.display.len()))?;

        self.bus.memory.load_ram(&state.ram)?;
        self.bus.memory.set_page_map(state.page_map);

        self.cpu.regs = state.cpu.regs;
        self.cpu.set_prefix(state.cpu.prefix);
        self.cpu.set_bus_byte(state.cpu.bus);
        self.cpu.set_ei_blocked(state.cpu.ei_block);
        self.cpu.set_tstates(state.cpu.tstates);

        let lcd = &mut self.bus.lcd;
        lcd.active = state.lcd.active;
        lcd.word_len = if state.lcd.word_len == 6 {
            WordLength::Six
        } else {
            WordLength::Eight
        };
        lcd.cursor_mode = match state.lcd.cursor_mode {
            0..=3 => CursorMode::from_bits(state.lcd.cursor_mode),
            _ => CursorMode::None,
        };
        lcd.x = state.lcd.x;
        lcd.y = state.lcd.y;
        lcd.z = state.lcd.z;
        lcd.contrast = state.lcd.contrast;
        lcd.last_read = state.lcd.last_read;
        lcd.set_last_tstate(state.lcd.last_tstate);
        lcd.load_display_ram(display);

        self.bus.clock.set_tstates(state.clock_tstates);
        Ok(())
    }
}
