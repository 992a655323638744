//! Main-table instruction execution.
//!
//! Handlers return the documented T-state cost for the decoded operand
//! form; the dispatch loop in `step()` separately charges 4 T-states per
//! consumed DD/FD prefix byte. Conditional instructions return the
//! taken/not-taken cost accordingly.

#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use calc_core::IoBus;

use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, X3F, X5F, ZF};

use super::Z80;

impl Z80 {
    /// Execute an unprefixed (or DD/FD-prefixed) main-table instruction.
    pub(super) fn execute_main<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let op = self.bus;

        match op {
            // NOP
            0x00 => 4,

            // HALT
            0x76 => {
                self.regs.halted = true;
                4
            }

            // LD r, r'
            0x40..=0x7F => self.ld_r_r(bus),

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP A, r
            0x80..=0xBF => self.alu_a_r(bus),

            // LD rr, nn
            0x01 | 0x11 | 0x21 | 0x31 => self.ld_rr_nn(bus),

            // LD (BC), A / LD (DE), A
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a);
                7
            }
            0x12 => {
                bus.write(self.regs.de(), self.regs.a);
                7
            }

            // LD A, (BC) / LD A, (DE)
            0x0A => {
                self.regs.a = bus.read(self.regs.bc());
                7
            }
            0x1A => {
                self.regs.a = bus.read(self.regs.de());
                7
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 => self.inc_dec_rr(1),
            0x0B | 0x1B | 0x2B | 0x3B => self.inc_dec_rr(-1),

            // INC r / DEC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => self.inc_dec_r(bus, true),
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => self.inc_dec_r(bus, false),

            // LD r, n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => self.ld_r_n(bus),

            // RLCA
            0x07 => {
                let carry = self.regs.a >> 7;
                self.regs.a = self.regs.a.rotate_left(1);
                self.rotate_a_flags(carry != 0);
                4
            }
            // RRCA
            0x0F => {
                let carry = self.regs.a & 1;
                self.regs.a = self.regs.a.rotate_right(1);
                self.rotate_a_flags(carry != 0);
                4
            }
            // RLA
            0x17 => {
                let carry = self.regs.a >> 7;
                self.regs.a = self.regs.a << 1 | u8::from(self.regs.f & CF != 0);
                self.rotate_a_flags(carry != 0);
                4
            }
            // RRA
            0x1F => {
                let carry = self.regs.a & 1;
                self.regs.a = self.regs.a >> 1 | u8::from(self.regs.f & CF != 0) << 7;
                self.rotate_a_flags(carry != 0);
                4
            }

            // EX AF, AF'
            0x08 => {
                self.regs.swap_af();
                4
            }

            // ADD HL, rr
            0x09 | 0x19 | 0x29 | 0x39 => self.add_hl_rr(),

            // DJNZ e
            0x10 => {
                let d = self.fetch8(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(d));
                    13
                } else {
                    8
                }
            }

            // JR e
            0x18 => {
                let d = self.fetch8(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(d));
                12
            }

            // JR cc, e (NZ/Z/NC/C only)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let d = self.fetch8(bus) as i8;
                if self.condition((self.bus >> 3) & 3) {
                    self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(d));
                    12
                } else {
                    7
                }
            }

            // LD (nn), HL
            0x22 => {
                let addr = self.fetch16(bus);
                let value = self.index_reg();
                self.write16(bus, addr, value);
                if self.prefix == 0 {
                    16
                } else {
                    20
                }
            }
            // LD HL, (nn)
            0x2A => {
                let addr = self.fetch16(bus);
                let value = self.read16(bus, addr);
                self.set_index_reg(value);
                if self.prefix == 0 {
                    16
                } else {
                    20
                }
            }

            // LD (nn), A / LD A, (nn)
            0x32 => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.regs.a);
                13
            }
            0x3A => {
                let addr = self.fetch16(bus);
                self.regs.a = bus.read(addr);
                13
            }

            // DAA
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.f = result.flags;
                4
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f = self.regs.f & (SF | ZF | PF | CF)
                    | HF
                    | NF
                    | self.regs.a & (X5F | X3F);
                4
            }

            // SCF
            0x37 => {
                self.regs.f =
                    self.regs.f & (SF | ZF | PF) | self.regs.a & (X5F | X3F) | CF;
                4
            }

            // CCF
            0x3F => {
                let old = self.regs.f;
                let mut f = old & (SF | ZF | PF) | (self.regs.a | old) & (X5F | X3F);
                if old & CF != 0 {
                    f |= HF;
                } else {
                    f |= CF;
                }
                self.regs.f = f;
                4
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition((self.bus >> 3) & 7) {
                    self.regs.pc = self.pop16(bus);
                    11
                } else {
                    5
                }
            }

            // POP rr
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let pair = (self.bus >> 4) & 3;
                let value = self.pop16(bus);
                match pair {
                    0 => self.regs.set_bc(value),
                    1 => self.regs.set_de(value),
                    2 => {
                        self.set_index_reg(value);
                        if self.prefix != 0 {
                            return 14;
                        }
                    }
                    _ => self.regs.set_af(value),
                }
                10
            }

            // JP cc, nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let addr = self.fetch16(bus);
                if self.condition((self.bus >> 3) & 7) {
                    self.regs.pc = addr;
                }
                10
            }

            // JP nn
            0xC3 => {
                self.regs.pc = self.fetch16(bus);
                10
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let addr = self.fetch16(bus);
                if self.condition((self.bus >> 3) & 7) {
                    let pc = self.regs.pc;
                    self.push16(bus, pc);
                    self.regs.pc = addr;
                    17
                } else {
                    10
                }
            }

            // PUSH rr
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let value = match (self.bus >> 4) & 3 {
                    0 => self.regs.bc(),
                    1 => self.regs.de(),
                    2 => self.index_reg(),
                    _ => self.regs.af(),
                };
                self.push16(bus, value);
                if self.prefix != 0 && self.bus == 0xE5 {
                    15
                } else {
                    11
                }
            }

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let select = (self.bus >> 3) & 7;
                let value = self.fetch8(bus);
                self.apply_alu(select, value);
                7
            }

            // RST
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let target = u16::from(self.bus & 0x38);
                let pc = self.regs.pc;
                self.push16(bus, pc);
                self.regs.pc = target;
                11
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop16(bus);
                10
            }

            // CALL nn
            0xCD => {
                let addr = self.fetch16(bus);
                let pc = self.regs.pc;
                self.push16(bus, pc);
                self.regs.pc = addr;
                17
            }

            // OUT (n), A
            0xD3 => {
                let port = self.fetch8(bus);
                self.bus = self.regs.a;
                bus.write_io(port, self.regs.a);
                11
            }

            // IN A, (n)
            0xDB => {
                let port = self.fetch8(bus);
                self.bus = port;
                self.bus = bus.read_io(port, self.bus);
                self.regs.a = self.bus;
                11
            }

            // EXX
            0xD9 => {
                self.regs.swap_main();
                4
            }

            // EX (SP), HL
            0xE3 => {
                let sp = self.regs.sp;
                let from_stack = self.read16(bus, sp);
                let value = self.index_reg();
                bus.write(sp.wrapping_add(1), (value >> 8) as u8);
                bus.write(sp, value as u8);
                self.set_index_reg(from_stack);
                if self.prefix == 0 {
                    19
                } else {
                    23
                }
            }

            // JP (HL)
            0xE9 => {
                self.regs.pc = self.index_reg();
                if self.prefix == 0 {
                    4
                } else {
                    8
                }
            }

            // EX DE, HL (never index-substituted)
            0xEB => {
                let de = self.regs.de();
                let hl = self.regs.hl();
                self.regs.set_de(hl);
                self.regs.set_hl(de);
                4
            }

            // DI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                4
            }

            // LD SP, HL
            0xF9 => {
                self.regs.sp = self.index_reg();
                if self.prefix == 0 {
                    6
                } else {
                    10
                }
            }

            // EI (acceptance deferred until after the next instruction)
            0xFB => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.ei_block = true;
                4
            }

            _ => unreachable!("all 256 main opcodes are decoded"),
        }
    }

    /// LD r, r' with the register-select fields in bits 5:3 and 2:0.
    ///
    /// With an index prefix, H and L are replaced by the index halves
    /// unless the other operand is `(HL)`: `LD H,(IX+d)` loads H itself,
    /// matching the hardware corner case.
    fn ld_r_r<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let dst = (self.bus >> 3) & 7;
        let src = self.bus & 7;
        let mut time = 4;

        let value = match src {
            6 => {
                if self.prefix == 0 {
                    time += 3;
                    bus.read(self.regs.hl())
                } else {
                    time += 15;
                    let addr = self.index_addr(bus);
                    bus.read(addr)
                }
            }
            4 | 5 if self.prefix != 0 && dst != 6 => {
                time += 4;
                self.reg8_indexed(src)
            }
            _ => self.reg8(src),
        };

        match dst {
            6 => {
                if self.prefix == 0 {
                    time += 3;
                    bus.write(self.regs.hl(), value);
                } else {
                    time += 15;
                    let addr = self.index_addr(bus);
                    bus.write(addr, value);
                }
            }
            4 | 5 if self.prefix != 0 && src != 6 => {
                time += 4;
                self.set_reg8_indexed(dst, value);
            }
            _ => self.set_reg8(dst, value),
        }

        time
    }

    /// The 0x80-0xBF block: ALU operation selected by bits 5:3, source by 2:0.
    fn alu_a_r<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let select = (self.bus >> 3) & 7;
        let src = self.bus & 7;
        let mut time = 4;

        let value = match src {
            6 => {
                if self.prefix == 0 {
                    time += 3;
                    bus.read(self.regs.hl())
                } else {
                    time += 15;
                    let addr = self.index_addr(bus);
                    bus.read(addr)
                }
            }
            4 | 5 if self.prefix != 0 => {
                time += 4;
                self.reg8_indexed(src)
            }
            _ => self.reg8(src),
        };

        self.apply_alu(select, value);
        time
    }

    /// Apply the ALU operation selected by a 3-bit field to A and `value`.
    pub(super) fn apply_alu(&mut self, select: u8, value: u8) {
        let carry = self.regs.f & CF != 0;
        let result = match select & 7 {
            0 => alu::add8(self.regs.a, value, false),
            1 => alu::add8(self.regs.a, value, carry),
            2 => alu::sub8(self.regs.a, value, false),
            3 => alu::sub8(self.regs.a, value, carry),
            4 => alu::and8(self.regs.a, value),
            5 => alu::xor8(self.regs.a, value),
            6 => alu::or8(self.regs.a, value),
            _ => {
                // CP discards the result.
                self.regs.f = alu::cp8(self.regs.a, value).flags;
                return;
            }
        };
        self.regs.a = result.value;
        self.regs.f = result.flags;
    }

    fn ld_rr_nn<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let value = self.fetch16(bus);
        match (self.bus >> 4) & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => {
                self.set_index_reg(value);
                if self.prefix != 0 {
                    return 14;
                }
            }
            _ => self.regs.sp = value,
        }
        10
    }

    fn inc_dec_rr(&mut self, delta: i16) -> u32 {
        match (self.bus >> 4) & 3 {
            0 => self.regs.set_bc(self.regs.bc().wrapping_add_signed(delta)),
            1 => self.regs.set_de(self.regs.de().wrapping_add_signed(delta)),
            2 => {
                let value = self.index_reg().wrapping_add_signed(delta);
                self.set_index_reg(value);
                if self.prefix != 0 {
                    return 10;
                }
            }
            _ => self.regs.sp = self.regs.sp.wrapping_add_signed(delta),
        }
        6
    }

    /// INC r / DEC r with the destination field in bits 5:3. Carry is
    /// preserved.
    fn inc_dec_r<B: IoBus>(&mut self, bus: &mut B, inc: bool) -> u32 {
        let apply = if inc { alu::inc8 } else { alu::dec8 };
        let field = (self.bus >> 3) & 7;

        let (result, time) = match field {
            6 => {
                if self.prefix == 0 {
                    let addr = self.regs.hl();
                    let result = apply(bus.read(addr));
                    bus.write(addr, result.value);
                    (result, 11)
                } else {
                    let addr = self.index_addr(bus);
                    let result = apply(bus.read(addr));
                    bus.write(addr, result.value);
                    (result, 23)
                }
            }
            4 | 5 if self.prefix != 0 => {
                let result = apply(self.reg8_indexed(field));
                self.set_reg8_indexed(field, result.value);
                (result, 8)
            }
            _ => {
                let result = apply(self.reg8(field));
                self.set_reg8(field, result.value);
                (result, 4)
            }
        };

        self.regs.f = self.regs.f & CF | result.flags;
        time
    }

    fn ld_r_n<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let field = (self.bus >> 3) & 7;
        match field {
            6 => {
                if self.prefix == 0 {
                    let value = self.fetch8(bus);
                    bus.write(self.regs.hl(), value);
                    10
                } else {
                    // Displacement precedes the immediate byte.
                    let addr = self.index_addr(bus);
                    let value = self.fetch8(bus);
                    bus.write(addr, value);
                    19
                }
            }
            4 | 5 if self.prefix != 0 => {
                let value = self.fetch8(bus);
                self.set_reg8_indexed(field, value);
                11
            }
            _ => {
                let value = self.fetch8(bus);
                self.set_reg8(field, value);
                7
            }
        }
    }

    fn add_hl_rr(&mut self) -> u32 {
        let lhs = self.index_reg();
        let rhs = match (self.bus >> 4) & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.index_reg(),
            _ => self.regs.sp,
        };
        let (value, flags) = alu::add16(lhs, rhs);
        self.set_index_reg(value);
        self.regs.f = self.regs.f & (SF | ZF | PF) | flags;
        if self.prefix == 0 {
            11
        } else {
            15
        }
    }

    /// Flag update shared by RLCA/RRCA/RLA/RRA: S, Z, P/V are preserved.
    fn rotate_a_flags(&mut self, carry: bool) {
        self.regs.f = self.regs.f & (SF | ZF | PF)
            | self.regs.a & (X5F | X3F)
            | if carry { CF } else { 0 };
    }
}
