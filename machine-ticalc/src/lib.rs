//! Z80 graphing calculator machine.
//!
//! Wires the CPU core to the banked memory bus, the I/O port table, the
//! T-state clock, and the LCD driver. The host drives emulation one
//! instruction at a time through [`TiCalc::step`] and pulls rendered
//! frames with [`TiCalc::lcd_image`].

mod clock;
mod memory;
mod model;
mod ports;
mod savestate;
mod ticalc;

pub use clock::Clock;
pub use memory::{Access, Bank, MemoryBus};
pub use model::CalcModel;
pub use ports::{PortDevice, Ports, LCD_COMMAND_PORT, LCD_DATA_PORT};
pub use savestate::{CpuState, LcdState, SaveState};
pub use ticalc::{CalcBus, TiCalc, TiCalcConfig};
