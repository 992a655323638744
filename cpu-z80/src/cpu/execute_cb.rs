//! CB-table execution: rotates, shifts, and bit operations.
//!
//! With an index prefix the encoding is DDCB/FDCB: a signed displacement
//! byte follows the CB byte, then the sub-opcode. Those two bytes are not
//! M1 fetches, so they do not touch R. Every DDCB/FDCB operation works on
//! `(IX+d)` / `(IY+d)`; the undocumented non-BIT forms additionally copy
//! the result into the register selected by bits 2:0.

#![allow(clippy::cast_possible_wrap)]

use calc_core::IoBus;

use crate::alu::{self, AluResult};
use crate::flags::{CF, HF, PF, SF, X3F, X5F, ZF};

use super::Z80;

impl Z80 {
    pub(super) fn execute_cb<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        if self.prefix == 0 {
            let op = self.fetch_opcode(bus);
            self.execute_cb_plain(bus, op)
        } else {
            let addr = self.index_addr(bus);
            let op = self.fetch8(bus);
            self.execute_cb_indexed(bus, op, addr)
        }
    }

    fn execute_cb_plain<B: IoBus>(&mut self, bus: &mut B, op: u8) -> u32 {
        let field = op & 7;
        let bit = (op >> 3) & 7;

        match op >> 6 {
            // Rotates and shifts
            0 => {
                if field == 6 {
                    let addr = self.regs.hl();
                    let result = self.shift_op(bit, bus.read(addr));
                    bus.write(addr, result.value);
                    self.regs.f = result.flags;
                    15
                } else {
                    let result = self.shift_op(bit, self.reg8(field));
                    self.set_reg8(field, result.value);
                    self.regs.f = result.flags;
                    8
                }
            }
            // BIT b, r
            1 => {
                if field == 6 {
                    let value = bus.read(self.regs.hl());
                    self.bit_flags(bit, value);
                    12
                } else {
                    let value = self.reg8(field);
                    self.bit_flags(bit, value);
                    8
                }
            }
            // RES b, r
            2 => {
                if field == 6 {
                    let addr = self.regs.hl();
                    let value = bus.read(addr) & !(1 << bit);
                    bus.write(addr, value);
                    15
                } else {
                    let value = self.reg8(field) & !(1 << bit);
                    self.set_reg8(field, value);
                    8
                }
            }
            // SET b, r
            _ => {
                if field == 6 {
                    let addr = self.regs.hl();
                    let value = bus.read(addr) | 1 << bit;
                    bus.write(addr, value);
                    15
                } else {
                    let value = self.reg8(field) | 1 << bit;
                    self.set_reg8(field, value);
                    8
                }
            }
        }
    }

    fn execute_cb_indexed<B: IoBus>(&mut self, bus: &mut B, op: u8, addr: u16) -> u32 {
        let field = op & 7;
        let bit = (op >> 3) & 7;
        let value = bus.read(addr);

        match op >> 6 {
            0 => {
                let result = self.shift_op(bit, value);
                bus.write(addr, result.value);
                self.regs.f = result.flags;
                if field != 6 {
                    self.set_reg8(field, result.value);
                }
                23
            }
            1 => {
                self.bit_flags(bit, value);
                20
            }
            2 => {
                let result = value & !(1 << bit);
                bus.write(addr, result);
                if field != 6 {
                    self.set_reg8(field, result);
                }
                23
            }
            _ => {
                let result = value | 1 << bit;
                bus.write(addr, result);
                if field != 6 {
                    self.set_reg8(field, result);
                }
                23
            }
        }
    }

    /// Rotate/shift selected by bits 5:3 of the CB sub-opcode.
    fn shift_op(&self, select: u8, value: u8) -> AluResult {
        let carry = self.regs.f & CF != 0;
        match select & 7 {
            0 => alu::rlc8(value),
            1 => alu::rrc8(value),
            2 => alu::rl8(value, carry),
            3 => alu::rr8(value, carry),
            4 => alu::sla8(value),
            5 => alu::sra8(value),
            6 => alu::sll8(value),
            _ => alu::srl8(value),
        }
    }

    /// BIT b: Z/PV report the tested bit, H set, N clear, carry preserved.
    fn bit_flags(&mut self, bit: u8, value: u8) {
        let tested = value & 1 << bit;
        let mut f = self.regs.f & CF | HF | value & (X5F | X3F);
        if tested == 0 {
            f |= ZF | PF;
        }
        if bit == 7 && tested != 0 {
            f |= SF;
        }
        self.regs.f = f;
    }
}
