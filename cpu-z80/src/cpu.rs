//! Z80 CPU core with instruction-stepped execution.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

use calc_core::{Bus, Cpu, IoBus};

use crate::flags::{CF, PF, SF, ZF};
use crate::registers::Registers;

/// Z80 CPU.
///
/// The CPU does not own the bus; the bus is passed to `step()` for each
/// instruction. Registers are public so machines can wire reset vectors
/// and hosts can inspect state between instructions.
#[derive(Debug)]
pub struct Z80 {
    /// Main register file.
    pub regs: Registers,

    /// Index prefix in effect for the current instruction (0, 0xDD, 0xFD).
    /// Non-zero only while a prefixed instruction is being decoded.
    prefix: u8,
    /// Scratch data bus: the last fetched opcode byte or I/O value.
    bus: u8,
    /// Set by EI to defer interrupt acceptance by one instruction.
    ei_block: bool,

    /// Level-triggered maskable interrupt line.
    irq: bool,
    /// Latched non-maskable interrupt request.
    nmi_pending: bool,

    /// Total T-states elapsed.
    tstates: u64,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers {
                sp: 0xFFFF,
                ..Registers::default()
            },
            prefix: 0,
            bus: 0,
            ei_block: false,
            irq: false,
            nmi_pending: false,
            tstates: 0,
        }
    }

    /// Total T-states executed since creation or reset.
    #[must_use]
    pub const fn tstates(&self) -> u64 {
        self.tstates
    }

    /// Restore the T-state counter (save-state load).
    pub fn set_tstates(&mut self, tstates: u64) {
        self.tstates = tstates;
    }

    /// The scratch data-bus byte.
    #[must_use]
    pub const fn bus_byte(&self) -> u8 {
        self.bus
    }

    /// Restore the scratch data-bus byte (save-state load).
    pub fn set_bus_byte(&mut self, value: u8) {
        self.bus = value;
    }

    /// The index prefix in effect (0 outside prefixed decode).
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Restore the prefix byte (save-state load).
    pub fn set_prefix(&mut self, prefix: u8) {
        self.prefix = prefix;
    }

    /// True while EI is deferring interrupt acceptance.
    #[must_use]
    pub const fn ei_blocked(&self) -> bool {
        self.ei_block
    }

    /// Restore the EI-deferral flag (save-state load).
    pub fn set_ei_blocked(&mut self, blocked: bool) {
        self.ei_block = blocked;
    }

    /// Execute one instruction (or accept a pending interrupt).
    /// Returns the number of T-states consumed.
    pub fn step<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let cycles = self.step_inner(bus);
        self.tstates += u64::from(cycles);
        cycles
    }

    /// Drive the level-triggered maskable interrupt line.
    pub fn set_irq(&mut self, asserted: bool) {
        self.irq = asserted;
    }

    /// Latch a non-maskable interrupt for the next step.
    pub fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Current program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// True while the CPU sits in HALT.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.regs.halted
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        self.regs = Registers {
            sp: 0xFFFF,
            ..Registers::default()
        };
        self.prefix = 0;
        self.bus = 0;
        self.ei_block = false;
        self.irq = false;
        self.nmi_pending = false;
        self.tstates = 0;
    }

    fn step_inner<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        // Interrupts are sampled at instruction boundaries only.
        if self.nmi_pending {
            return self.accept_nmi(bus);
        }
        if self.irq && self.regs.iff1 && !self.ei_block {
            return self.accept_irq(bus);
        }
        // EI has now deferred exactly one instruction.
        self.ei_block = false;

        if self.regs.halted {
            // Burn an M1 cycle's worth of time until an interrupt arrives.
            self.inc_r();
            return 4;
        }

        self.prefix = 0;
        let mut penalty = 0;
        let mut op = self.fetch_opcode(bus);
        // Each DD/FD costs 4 T-states and reshadows any prior prefix.
        while op == 0xDD || op == 0xFD {
            self.prefix = op;
            penalty += 4;
            op = self.fetch_opcode(bus);
        }

        let cost = match op {
            0xCB => self.execute_cb(bus),
            0xED => self.execute_ed(bus),
            _ => self.execute_main(bus),
        };
        cost + penalty
    }

    // === Fetch helpers ===

    /// Increment R (lower 7 bits only).
    fn inc_r(&mut self) {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
    }

    /// M1-style opcode fetch: latches the bus byte and refreshes R.
    pub(crate) fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let op = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.inc_r();
        self.bus = op;
        op
    }

    /// Fetch an operand byte from the instruction stream.
    pub(crate) fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Fetch a little-endian operand word from the instruction stream.
    pub(crate) fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from(lo) | u16::from(hi) << 8
    }

    pub(crate) fn read16<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = bus.read(addr);
        let hi = bus.read(addr.wrapping_add(1));
        u16::from(lo) | u16::from(hi) << 8
    }

    pub(crate) fn write16<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u16) {
        bus.write(addr, value as u8);
        bus.write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, (value >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, value as u8);
    }

    pub(crate) fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from(lo) | u16::from(hi) << 8
    }

    // === Register selection ===

    /// The effective HL-class register pair (HL, IX, or IY per the prefix).
    pub(crate) fn index_reg(&self) -> u16 {
        match self.prefix {
            0xDD => self.regs.ix,
            0xFD => self.regs.iy,
            _ => self.regs.hl(),
        }
    }

    pub(crate) fn set_index_reg(&mut self, value: u16) {
        match self.prefix {
            0xDD => self.regs.ix = value,
            0xFD => self.regs.iy = value,
            _ => self.regs.set_hl(value),
        }
    }

    /// Fetch the displacement byte and form the `(IX+d)` / `(IY+d)` address.
    pub(crate) fn index_addr<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let d = self.fetch8(bus) as i8;
        self.index_reg().wrapping_add_signed(i16::from(d))
    }

    /// Register by 3-bit field encoding (no index substitution).
    pub(crate) fn reg8(&self, field: u8) -> u8 {
        match field & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            7 => self.regs.a,
            _ => unreachable!("(HL) operand resolved by the caller"),
        }
    }

    pub(crate) fn set_reg8(&mut self, field: u8, value: u8) {
        match field & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            7 => self.regs.a = value,
            _ => unreachable!("(HL) operand resolved by the caller"),
        }
    }

    /// Register by field with the undocumented IXH/IXL/IYH/IYL substitution.
    pub(crate) fn reg8_indexed(&self, field: u8) -> u8 {
        match field & 7 {
            4 => (self.index_reg() >> 8) as u8,
            5 => self.index_reg() as u8,
            _ => self.reg8(field),
        }
    }

    pub(crate) fn set_reg8_indexed(&mut self, field: u8, value: u8) {
        match field & 7 {
            4 => {
                let pair = self.index_reg();
                self.set_index_reg(pair & 0x00FF | u16::from(value) << 8);
            }
            5 => {
                let pair = self.index_reg();
                self.set_index_reg(pair & 0xFF00 | u16::from(value));
            }
            _ => self.set_reg8(field, value),
        }
    }

    /// Evaluate a condition-code field (bits 5:3 of the opcode).
    pub(crate) fn condition(&self, cc: u8) -> bool {
        match cc & 7 {
            0 => self.regs.f & ZF == 0, // NZ
            1 => self.regs.f & ZF != 0, // Z
            2 => self.regs.f & CF == 0, // NC
            3 => self.regs.f & CF != 0, // C
            4 => self.regs.f & PF == 0, // PO
            5 => self.regs.f & PF != 0, // PE
            6 => self.regs.f & SF == 0, // P
            _ => self.regs.f & SF != 0, // M
        }
    }

    // === Interrupts ===

    fn accept_nmi<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.nmi_pending = false;
        self.regs.halted = false;
        self.inc_r();
        self.regs.iff2 = self.regs.iff1;
        self.regs.iff1 = false;
        let pc = self.regs.pc;
        self.push16(bus, pc);
        self.regs.pc = 0x0066;
        11
    }

    fn accept_irq<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.regs.halted = false;
        self.inc_r();
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        let pc = self.regs.pc;
        self.push16(bus, pc);
        match self.regs.im {
            // Mode 0 executes the byte the device drives onto the bus;
            // the calculator boards leave it floating, which decodes as
            // RST 38h. Mode 1 is RST 38h by definition.
            0 | 1 => {
                self.regs.pc = 0x0038;
                13
            }
            _ => {
                let vector = u16::from(self.regs.i) << 8 | u16::from(self.bus);
                self.regs.pc = self.read16(bus, vector);
                19
            }
        }
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: IoBus> Cpu<B> for Z80 {
    fn step(&mut self, bus: &mut B) -> u32 {
        Z80::step(self, bus)
    }

    fn set_irq(&mut self, asserted: bool) {
        Z80::set_irq(self, asserted);
    }

    fn nmi(&mut self) {
        Z80::nmi(self);
    }

    fn reset(&mut self) {
        Z80::reset(self);
    }

    fn pc(&self) -> u16 {
        Z80::pc(self)
    }

    fn is_halted(&self) -> bool {
        Z80::is_halted(self)
    }
}

// Instruction execution split into separate files for readability.
mod execute;
mod execute_cb;
mod execute_ed;
