//! T-state cost checks.
//!
//! Guest grayscale code is timed to the cycle, so the documented cost of
//! every operand form matters as much as its effect. These tests pin the
//! costs of representative opcodes, the taken/not-taken splits, and the
//! prefix penalty.

use calc_core::SimpleBus;
use cpu_z80::{Z80, CF, ZF};

/// Execute one instruction from a fresh CPU and return its cost.
fn cycles_of(program: &[u8], setup: impl FnOnce(&mut Z80, &mut SimpleBus)) -> u32 {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, program);
    let mut cpu = Z80::new();
    cpu.regs.sp = 0x8000;
    setup(&mut cpu, &mut bus);
    cpu.step(&mut bus)
}

fn no_setup(_: &mut Z80, _: &mut SimpleBus) {}

#[test]
fn basic_op_costs() {
    assert_eq!(cycles_of(&[0x00], no_setup), 4); // NOP
    assert_eq!(cycles_of(&[0x3E, 0x01], no_setup), 7); // LD A, n
    assert_eq!(cycles_of(&[0x01, 0x00, 0x00], no_setup), 10); // LD BC, nn
    assert_eq!(cycles_of(&[0x02], no_setup), 7); // LD (BC), A
    assert_eq!(cycles_of(&[0x03], no_setup), 6); // INC BC
    assert_eq!(cycles_of(&[0x04], no_setup), 4); // INC B
    assert_eq!(cycles_of(&[0x34], no_setup), 11); // INC (HL)
    assert_eq!(cycles_of(&[0x09], no_setup), 11); // ADD HL, BC
    assert_eq!(cycles_of(&[0x36, 0x00], no_setup), 10); // LD (HL), n
    assert_eq!(cycles_of(&[0x41], no_setup), 4); // LD B, C
    assert_eq!(cycles_of(&[0x46], no_setup), 7); // LD B, (HL)
    assert_eq!(cycles_of(&[0x80], no_setup), 4); // ADD A, B
    assert_eq!(cycles_of(&[0x86], no_setup), 7); // ADD A, (HL)
    assert_eq!(cycles_of(&[0xC3, 0x00, 0x10], no_setup), 10); // JP nn
    assert_eq!(cycles_of(&[0x18, 0x00], no_setup), 12); // JR e
    assert_eq!(cycles_of(&[0xCD, 0x00, 0x10], no_setup), 17); // CALL nn
    assert_eq!(cycles_of(&[0xC9], no_setup), 10); // RET
    assert_eq!(cycles_of(&[0xC5], no_setup), 11); // PUSH BC
    assert_eq!(cycles_of(&[0xC1], no_setup), 10); // POP BC
    assert_eq!(cycles_of(&[0xC7], no_setup), 11); // RST 00h
    assert_eq!(cycles_of(&[0xD3, 0x10], no_setup), 11); // OUT (n), A
    assert_eq!(cycles_of(&[0xDB, 0x10], no_setup), 11); // IN A, (n)
    assert_eq!(cycles_of(&[0xE3], no_setup), 19); // EX (SP), HL
    assert_eq!(cycles_of(&[0xE9], no_setup), 4); // JP (HL)
    assert_eq!(cycles_of(&[0xF9], no_setup), 6); // LD SP, HL
    assert_eq!(cycles_of(&[0x32, 0x00, 0x90], no_setup), 13); // LD (nn), A
    assert_eq!(cycles_of(&[0x22, 0x00, 0x90], no_setup), 16); // LD (nn), HL
}

#[test]
fn conditional_costs_split_on_the_flag() {
    // JR cc: 12 taken, 7 not taken.
    assert_eq!(cycles_of(&[0x28, 0x02], |cpu, _| cpu.regs.f = ZF), 12);
    assert_eq!(cycles_of(&[0x28, 0x02], |cpu, _| cpu.regs.f = 0), 7);

    // JP cc is 10 either way.
    assert_eq!(cycles_of(&[0xCA, 0x00, 0x10], |cpu, _| cpu.regs.f = ZF), 10);
    assert_eq!(cycles_of(&[0xCA, 0x00, 0x10], |cpu, _| cpu.regs.f = 0), 10);

    // CALL cc: 17 taken, 10 not taken.
    assert_eq!(
        cycles_of(&[0xDC, 0x00, 0x10], |cpu, _| cpu.regs.f = CF),
        17
    );
    assert_eq!(cycles_of(&[0xDC, 0x00, 0x10], |cpu, _| cpu.regs.f = 0), 10);

    // RET cc: 11 taken, 5 not taken.
    assert_eq!(cycles_of(&[0xC8], |cpu, _| cpu.regs.f = ZF), 11);
    assert_eq!(cycles_of(&[0xC8], |cpu, _| cpu.regs.f = 0), 5);

    // DJNZ: 13 looping, 8 falling through.
    assert_eq!(cycles_of(&[0x10, 0xFE], |cpu, _| cpu.regs.b = 2), 13);
    assert_eq!(cycles_of(&[0x10, 0xFE], |cpu, _| cpu.regs.b = 1), 8);
}

#[test]
fn prefixed_forms_carry_the_documented_cost_plus_the_prefix_penalty() {
    // LD IX, nn: documented 14, plus the 4 T-state prefix fetch.
    assert_eq!(cycles_of(&[0xDD, 0x21, 0x00, 0x00], no_setup), 14 + 4);
    // LD A, (IX+d): documented 19, plus the prefix fetch.
    assert_eq!(cycles_of(&[0xDD, 0x7E, 0x00], no_setup), 19 + 4);
    // INC (IX+d): documented 23, plus the prefix fetch.
    assert_eq!(cycles_of(&[0xDD, 0x34, 0x00], no_setup), 23 + 4);
    // PUSH IX: documented 15, plus the prefix fetch.
    assert_eq!(cycles_of(&[0xDD, 0xE5], no_setup), 15 + 4);
    // ADD IX, BC: documented 15, plus the prefix fetch.
    assert_eq!(cycles_of(&[0xDD, 0x09], no_setup), 15 + 4);
    // LD IXH, n: documented 11, plus the prefix fetch.
    assert_eq!(cycles_of(&[0xDD, 0x26, 0x00], no_setup), 11 + 4);
}

#[test]
fn cb_and_ed_table_costs() {
    assert_eq!(cycles_of(&[0xCB, 0x00], no_setup), 8); // RLC B
    assert_eq!(cycles_of(&[0xCB, 0x06], no_setup), 15); // RLC (HL)
    assert_eq!(cycles_of(&[0xCB, 0x40], no_setup), 8); // BIT 0, B
    assert_eq!(cycles_of(&[0xCB, 0x46], no_setup), 12); // BIT 0, (HL)
    assert_eq!(cycles_of(&[0xCB, 0x86], no_setup), 15); // RES 0, (HL)

    assert_eq!(cycles_of(&[0xED, 0x44], no_setup), 8); // NEG
    assert_eq!(cycles_of(&[0xED, 0x46], no_setup), 8); // IM 0
    assert_eq!(cycles_of(&[0xED, 0x47], no_setup), 9); // LD I, A
    assert_eq!(cycles_of(&[0xED, 0x57], no_setup), 9); // LD A, I
    assert_eq!(cycles_of(&[0xED, 0x40], no_setup), 12); // IN B, (C)
    assert_eq!(cycles_of(&[0xED, 0x41], no_setup), 12); // OUT (C), B
    assert_eq!(cycles_of(&[0xED, 0x42], no_setup), 15); // SBC HL, BC
    assert_eq!(cycles_of(&[0xED, 0x43, 0x00, 0x90], no_setup), 20); // LD (nn), BC
    assert_eq!(cycles_of(&[0xED, 0x45], no_setup), 14); // RETN
    assert_eq!(cycles_of(&[0xED, 0x67], no_setup), 18); // RRD
    assert_eq!(cycles_of(&[0xED, 0x6A], no_setup), 15); // ADC HL, HL
    assert_eq!(cycles_of(&[0xED, 0x77], no_setup), 8); // ED NOP
    assert_eq!(cycles_of(&[0xED, 0xA0], no_setup), 16); // LDI
    assert_eq!(cycles_of(&[0xED, 0xA1], no_setup), 16); // CPI

    // LDIR: 21 while repeating, 16 terminating.
    assert_eq!(
        cycles_of(&[0xED, 0xB0], |cpu, _| cpu.regs.set_bc(2)),
        21
    );
    assert_eq!(
        cycles_of(&[0xED, 0xB0], |cpu, _| cpu.regs.set_bc(1)),
        16
    );
}

#[test]
fn ddcb_costs() {
    // DD CB d op: documented 23 (20 for BIT), plus the prefix fetch.
    assert_eq!(cycles_of(&[0xDD, 0xCB, 0x00, 0x06], no_setup), 23 + 4); // RLC (IX+0)
    assert_eq!(cycles_of(&[0xDD, 0xCB, 0x00, 0x46], no_setup), 20 + 4); // BIT 0, (IX+0)
    assert_eq!(cycles_of(&[0xDD, 0xCB, 0x00, 0x86], no_setup), 23 + 4); // RES 0, (IX+0)
}

#[test]
fn every_main_opcode_accounts_time() {
    // Sweep the whole main table: each opcode (prefix bytes aside) must
    // consume a plausible nonzero cost and terminate in one step.
    for op in 0u16..=0xFF {
        let op = op as u8;
        if matches!(op, 0xCB | 0xDD | 0xED | 0xFD) {
            continue;
        }
        let cycles = cycles_of(&[op, 0x00, 0x00], |cpu, _| {
            cpu.regs.sp = 0x8000;
        });
        assert!(
            (4..=23).contains(&cycles),
            "opcode {op:#04X} returned {cycles} T-states"
        );
    }
}
