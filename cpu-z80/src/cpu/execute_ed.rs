//! ED-table execution: block transfers, block I/O, interrupt-mode and
//! special register loads.
//!
//! The repeating block forms (LDIR, CPIR, INIR, OTIR and the decrementing
//! variants) rewind PC by two bytes while their terminating condition
//! holds, so the outer step loop re-executes them one iteration at a time.
//! Each repeating iteration costs 21 T-states and the terminating one 16,
//! which bounds interrupt latency to a single iteration.

#![allow(clippy::cast_possible_truncation)]

use calc_core::IoBus;

use crate::alu;
use crate::flags::{sz53, sz53p, CF, HF, NF, PF, SF, X3F, X5F, ZF};

use super::Z80;

impl Z80 {
    pub(super) fn execute_ed<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_opcode(bus);

        match op {
            // IN r, (C) — field 6 updates flags only
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                self.bus = self.regs.c;
                let value = bus.read_io(self.regs.c, self.bus);
                self.bus = value;
                let field = (op >> 3) & 7;
                if field != 6 {
                    self.set_reg8(field, value);
                }
                self.regs.f = sz53p(value) | self.regs.f & CF;
                12
            }

            // OUT (C), r — field 6 outputs 0xFF (CMOS parts, as on these boards)
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let field = (op >> 3) & 7;
                let value = if field == 6 { 0xFF } else { self.reg8(field) };
                self.bus = value;
                bus.write_io(self.regs.c, value);
                12
            }

            // SBC HL, rr / ADC HL, rr
            0x42 | 0x52 | 0x62 | 0x72 => {
                let rhs = self.reg16_sp((op >> 4) & 3);
                let carry = self.regs.f & CF != 0;
                let (value, flags) = alu::sbc16(self.regs.hl(), rhs, carry);
                self.regs.set_hl(value);
                self.regs.f = flags;
                15
            }
            0x4A | 0x5A | 0x6A | 0x7A => {
                let rhs = self.reg16_sp((op >> 4) & 3);
                let carry = self.regs.f & CF != 0;
                let (value, flags) = alu::adc16(self.regs.hl(), rhs, carry);
                self.regs.set_hl(value);
                self.regs.f = flags;
                15
            }

            // LD (nn), rr / LD rr, (nn) for all four pairs (BC/DE forms
            // are undocumented but used by guest code)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.fetch16(bus);
                let value = self.reg16_sp((op >> 4) & 3);
                self.write16(bus, addr, value);
                20
            }
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.fetch16(bus);
                let value = self.read16(bus, addr);
                self.set_reg16_sp((op >> 4) & 3, value);
                20
            }

            // NEG (and its undocumented mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.regs.f = result.flags;
                8
            }

            // RETN / RETI: both restore IFF1 from IFF2
            0x45 | 0x55 | 0x65 | 0x75 | 0x4D | 0x5D | 0x6D | 0x7D => {
                self.regs.pc = self.pop16(bus);
                self.regs.iff1 = self.regs.iff2;
                14
            }

            // IM 0 / IM 1 / IM 2
            0x46 | 0x4E | 0x66 | 0x6E => {
                self.regs.im = 0;
                8
            }
            0x56 | 0x76 => {
                self.regs.im = 1;
                8
            }
            0x5E | 0x7E => {
                self.regs.im = 2;
                8
            }

            // LD I, A / LD R, A
            0x47 => {
                self.regs.i = self.regs.a;
                9
            }
            0x4F => {
                self.regs.r = self.regs.a;
                9
            }

            // LD A, I / LD A, R: PV reports IFF2
            0x57 => {
                self.regs.a = self.regs.i;
                self.ld_a_ir_flags();
                9
            }
            0x5F => {
                self.regs.a = self.regs.r;
                self.ld_a_ir_flags();
                9
            }

            // RRD / RLD
            0x67 => {
                let addr = self.regs.hl();
                let m = bus.read(addr);
                bus.write(addr, self.regs.a << 4 | m >> 4);
                self.regs.a = self.regs.a & 0xF0 | m & 0x0F;
                self.regs.f = sz53p(self.regs.a) | self.regs.f & CF;
                18
            }
            0x6F => {
                let addr = self.regs.hl();
                let m = bus.read(addr);
                bus.write(addr, m << 4 | self.regs.a & 0x0F);
                self.regs.a = self.regs.a & 0xF0 | m >> 4;
                self.regs.f = sz53p(self.regs.a) | self.regs.f & CF;
                18
            }

            // Block transfers
            0xA0 => self.block_ld(bus, 1, false),
            0xA8 => self.block_ld(bus, -1, false),
            0xB0 => self.block_ld(bus, 1, true),
            0xB8 => self.block_ld(bus, -1, true),

            // Block compares
            0xA1 => self.block_cp(bus, 1, false),
            0xA9 => self.block_cp(bus, -1, false),
            0xB1 => self.block_cp(bus, 1, true),
            0xB9 => self.block_cp(bus, -1, true),

            // Block input
            0xA2 => self.block_in(bus, 1, false),
            0xAA => self.block_in(bus, -1, false),
            0xB2 => self.block_in(bus, 1, true),
            0xBA => self.block_in(bus, -1, true),

            // Block output
            0xA3 => self.block_out(bus, 1, false),
            0xAB => self.block_out(bus, -1, false),
            0xB3 => self.block_out(bus, 1, true),
            0xBB => self.block_out(bus, -1, true),

            // Every other ED opcode is a two-byte NOP
            _ => 8,
        }
    }

    /// Register pair by 2-bit field with SP in slot 3 (ED-table encoding).
    fn reg16_sp(&self, pair: u8) -> u16 {
        match pair & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    fn set_reg16_sp(&mut self, pair: u8, value: u16) {
        match pair & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    fn ld_a_ir_flags(&mut self) {
        let mut f = sz53(self.regs.a) | self.regs.f & CF;
        if self.regs.iff2 {
            f |= PF;
        }
        self.regs.f = f;
    }

    /// LDI/LDD/LDIR/LDDR. X5/X3 come from bits 1 and 3 of `A + byte`
    /// (the formula is direction-independent); PV reports BC != 0.
    fn block_ld<B: IoBus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        let value = bus.read(self.regs.hl());
        bus.write(self.regs.de(), value);

        self.regs.set_bc(self.regs.bc().wrapping_sub(1));
        self.regs.set_hl(self.regs.hl().wrapping_add_signed(dir));
        self.regs.set_de(self.regs.de().wrapping_add_signed(dir));

        let n = self.regs.a.wrapping_add(value);
        let mut f = self.regs.f & (SF | ZF | CF);
        if n & 0x02 != 0 {
            f |= X5F;
        }
        if n & 0x08 != 0 {
            f |= X3F;
        }
        if self.regs.bc() != 0 {
            f |= PF;
        }
        self.regs.f = f;

        if repeat && self.regs.bc() != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }

    /// CPI/CPD/CPIR/CPDR. Compares A against (HL) without storing;
    /// X5/X3 come from `A - byte - H`; carry is preserved.
    fn block_cp<B: IoBus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        let value = bus.read(self.regs.hl());
        let result = alu::sub8(self.regs.a, value, false);

        self.regs.set_hl(self.regs.hl().wrapping_add_signed(dir));
        self.regs.set_bc(self.regs.bc().wrapping_sub(1));

        let n = result
            .value
            .wrapping_sub(u8::from(result.flags & HF != 0));
        let mut f = NF | result.flags & (SF | ZF | HF) | self.regs.f & CF;
        if n & 0x02 != 0 {
            f |= X5F;
        }
        if n & 0x08 != 0 {
            f |= X3F;
        }
        if self.regs.bc() != 0 {
            f |= PF;
        }
        self.regs.f = f;

        if repeat && self.regs.bc() != 0 && result.value != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }

    /// INI/IND/INIR/INDR. The carry probe is `value + (C ± 1)`.
    fn block_in<B: IoBus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        self.bus = self.regs.c;
        let value = bus.read_io(self.regs.c, self.bus);
        self.bus = value;
        bus.write(self.regs.hl(), value);

        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.set_hl(self.regs.hl().wrapping_add_signed(dir));

        let adjusted_c = self.regs.c.wrapping_add_signed(dir as i8);
        let probe = u16::from(value) + u16::from(adjusted_c);
        self.regs.f = alu::block_io_flags(self.regs.b, value, probe);

        if repeat && self.regs.b != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }

    /// OUTI/OUTD/OTIR/OTDR. The carry probe is `value + L` (after HL moves).
    fn block_out<B: IoBus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        let value = bus.read(self.regs.hl());
        self.bus = value;
        bus.write_io(self.regs.c, value);

        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.set_hl(self.regs.hl().wrapping_add_signed(dir));

        let probe = u16::from(value) + u16::from(self.regs.l);
        self.regs.f = alu::block_io_flags(self.regs.b, value, probe);

        if repeat && self.regs.b != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }
}
