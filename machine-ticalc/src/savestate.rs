//! Flat save-state structures.
//!
//! The core exposes its state as plain serde structs; actually writing
//! them somewhere is the host's business. The grayscale ring is not
//! captured — it re-synthesizes from display traffic after a load.

use cpu_z80::Registers;
use serde::{Deserialize, Serialize};

use crate::memory::Bank;
use crate::model::CalcModel;

/// CPU state beyond the register file: decode scratch and timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub regs: Registers,
    /// Index prefix in effect (0 outside prefixed decode).
    pub prefix: u8,
    /// Scratch data-bus byte.
    pub bus: u8,
    /// EI-deferral flag.
    pub ei_block: bool,
    /// CPU T-state counter.
    pub tstates: u64,
}

/// LCD driver state. `cursor_mode` and `word_len` use the driver's
/// status-byte encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcdState {
    pub active: bool,
    /// Word length: 6 or 8.
    pub word_len: u8,
    /// Cursor mode bits (0-3 as decoded from the command port, 4 = none).
    pub cursor_mode: u8,
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub contrast: i32,
    pub last_read: u8,
    /// T-state of the last accepted write (busy-gate arming).
    pub last_tstate: u64,
    pub display: Vec<u8>,
}

/// Complete machine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub model: CalcModel,
    pub cpu: CpuState,
    pub lcd: LcdState,
    pub clock_tstates: u64,
    pub page_map: [Bank; 4],
    pub ram: Vec<u8>,
}
