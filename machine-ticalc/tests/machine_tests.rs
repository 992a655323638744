//! Whole-machine tests: guest programs running out of ROM, talking to the
//! LCD through the port table.

use machine_ticalc::{Access, Bank, CalcModel, TiCalc, TiCalcConfig};

/// Build a machine whose ROM page 0 starts with `program`.
fn machine_with_program(model: CalcModel, program: &[u8]) -> TiCalc {
    let mut rom = vec![0xFF; model.rom_size()];
    rom[..program.len()].copy_from_slice(program);
    TiCalc::new(&TiCalcConfig {
        model,
        rom,
    })
    .expect("ROM image matches the model size")
}

fn run_until_halt(calc: &mut TiCalc) {
    for _ in 0..100_000 {
        calc.step();
        if calc.cpu().is_halted() {
            return;
        }
    }
    panic!("program did not halt");
}

#[test]
fn rom_size_is_validated() {
    let result = TiCalc::new(&TiCalcConfig {
        model: CalcModel::Ti83Plus,
        rom: vec![0; 123],
    });
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("expected"));
}

#[test]
fn program_runs_from_rom_and_uses_ram() {
    let calc = &mut machine_with_program(
        CalcModel::Ti82,
        &[
            0x3E, 0x5A, // LD A, 0x5A
            0x32, 0x00, 0xC0, // LD (0xC000), A
            0x76, // HALT
        ],
    );
    run_until_halt(calc);
    assert_eq!(calc.bus().memory.peek(0xC000), 0x5A);
}

#[test]
fn lcd_cursor_advance_through_the_port_table() {
    // Word length 8, cursor X up, X := 63, Y := 0, then write 0xAA.
    let calc = &mut machine_with_program(
        CalcModel::Ti85,
        &[
            0x3E, 0x01, 0xD3, 0x10, // 8-bit words
            0x3E, 0x05, 0xD3, 0x10, // cursor X up
            0x3E, 0xBF, 0xD3, 0x10, // X := 63
            0x3E, 0x20, 0xD3, 0x10, // Y := 0
            0x3E, 0xAA, 0xD3, 0x11, // data write
            0x76, // HALT
        ],
    );
    run_until_halt(calc);

    let lcd = &calc.bus().lcd;
    assert_eq!(lcd.display_ram()[63 * 16], 0xAA);
    assert_eq!(lcd.x, 0, "X wrapped past 63");
    assert_eq!(lcd.y, 0);
}

#[test]
fn lcd_busy_gate_rejects_back_to_back_writes() {
    let calc = &mut machine_with_program(
        CalcModel::Ti83Plus,
        &[
            0x3E, 0x87, 0xD3, 0x10, // X := 7 (accepted)
            0x3E, 0x85, 0xD3, 0x10, // X := 5, a few T-states later: dropped
            0xDB, 0x10, // status read while busy
            0x76, // HALT
        ],
    );
    // Let the power-on window lapse so the first write is accepted.
    calc.bus_mut().clock.advance(1_000);
    run_until_halt(calc);

    assert_eq!(calc.bus().lcd.x, 7, "second write was ignored");
    assert_eq!(
        calc.cpu().regs.a & 0x80,
        0x80,
        "busy status read reports the sign bit"
    );
}

#[test]
fn non_gated_models_accept_back_to_back_writes() {
    let calc = &mut machine_with_program(
        CalcModel::Ti83,
        &[
            0x3E, 0x87, 0xD3, 0x10, // X := 7
            0x3E, 0x85, 0xD3, 0x10, // X := 5 immediately after
            0x76, // HALT
        ],
    );
    run_until_halt(calc);
    assert_eq!(calc.bus().lcd.x, 5);
}

#[test]
fn unhandled_ports_read_high_and_drop_writes() {
    let calc = &mut machine_with_program(
        CalcModel::Ti82,
        &[
            0x3E, 0x12, 0xD3, 0x55, // OUT (0x55), A: dropped
            0xDB, 0x55, // IN A, (0x55)
            0x76, // HALT
        ],
    );
    run_until_halt(calc);
    assert_eq!(calc.cpu().regs.a, 0xFF);
}

#[test]
fn lcd_image_has_driver_native_dimensions() {
    let calc = &mut machine_with_program(CalcModel::Ti83Plus, &[0x76]);
    run_until_halt(calc);
    assert_eq!(calc.lcd_image().len(), 128 * 64);
    assert_eq!(calc.bus().lcd.display_width(), 96);
}

#[test]
fn irq_vectors_through_the_cpu() {
    let calc = &mut machine_with_program(
        CalcModel::Ti82,
        &[
            0x31, 0x00, 0xD0, // LD SP, 0xD000
            0xFB, // EI
            0x00, 0x00, 0x00, // NOPs
        ],
    );
    calc.step(); // LD SP
    calc.step(); // EI
    calc.step(); // deferral NOP
    calc.set_irq(true);
    calc.step();
    assert_eq!(calc.cpu().pc(), 0x0038);
}

#[test]
fn bank_remapping_changes_visible_memory() {
    let calc = &mut machine_with_program(CalcModel::Ti86, &[0x76]);
    run_until_halt(calc);

    let bus = calc.bus_mut();
    bus.memory.map_page(2, Bank::Ram(1));
    bus.memory.write(0x8000, 0xA1);
    bus.memory.map_page(2, Bank::Ram(2));
    bus.memory.write(0x8000, 0xA2);
    bus.memory.map_page(2, Bank::Ram(1));
    assert_eq!(bus.memory.read(0x8000), 0xA1);
}

#[test]
fn watch_hook_observes_guest_writes() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let calc = &mut machine_with_program(
        CalcModel::Ti82,
        &[
            0x3E, 0x77, // LD A, 0x77
            0x32, 0x34, 0xC2, // LD (0xC234), A
            0x76, // HALT
        ],
    );

    let writes = Rc::new(RefCell::new(Vec::new()));
    let sink = writes.clone();
    calc.set_watch_hook(Box::new(move |addr, value, kind| {
        if kind == Access::Write {
            sink.borrow_mut().push((addr, value));
        }
    }));
    run_until_halt(calc);

    assert!(writes.borrow().contains(&(0xC234, 0x77)));
}

#[test]
fn enqueue_hook_fires_on_display_enable() {
    use std::cell::Cell;
    use std::rc::Rc;

    let calc = &mut machine_with_program(
        CalcModel::Ti85,
        &[
            0x3E, 0x03, 0xD3, 0x10, // display on: pushes a snapshot
            0x76, // HALT
        ],
    );
    let hits = Rc::new(Cell::new(0u32));
    let counter = hits.clone();
    calc.set_lcd_enqueue_hook(Box::new(move || counter.set(counter.get() + 1)));
    run_until_halt(calc);

    assert_eq!(hits.get(), 1);
}

#[test]
fn save_state_round_trips_through_json() {
    let calc = &mut machine_with_program(
        CalcModel::Ti82,
        &[
            0x3E, 0x42, // LD A, 0x42
            0x32, 0x00, 0xC0, // LD (0xC000), A
            0x3E, 0x99, 0xD3, 0x10, // X := 25
            0x76, // HALT
        ],
    );
    run_until_halt(calc);
    let state = calc.save_state();

    let json = serde_json::to_string(&state).expect("state serializes");
    let restored = serde_json::from_str(&json).expect("state deserializes");
    assert_eq!(state, restored);

    // Load into a fresh machine of the same model and compare snapshots.
    let fresh = &mut machine_with_program(CalcModel::Ti82, &[0x76]);
    fresh.load_state(&restored).expect("state loads");
    assert_eq!(fresh.save_state(), state);
    assert_eq!(fresh.cpu().regs.a, 0x42);
    assert_eq!(fresh.bus().memory.peek(0xC000), 0x42);
    assert_eq!(fresh.bus().lcd.x, 25);
}

#[test]
fn load_state_rejects_model_mismatch() {
    let a = &mut machine_with_program(CalcModel::Ti82, &[0x76]);
    let state = a.save_state();
    let b = &mut machine_with_program(CalcModel::Ti85, &[0x76]);
    assert!(b.load_state(&state).is_err());
}

#[test]
fn reset_restores_boot_layout() {
    let calc = &mut machine_with_program(
        CalcModel::Ti83Plus,
        &[0x3E, 0x01, 0x32, 0x00, 0xC0, 0x76],
    );
    run_until_halt(calc);
    calc.bus_mut().memory.map_page(2, Bank::Ram(1));

    calc.reset();
    assert_eq!(calc.cpu().pc(), 0);
    assert_eq!(calc.bus().memory.peek(0xC000), 0, "RAM cleared");
    assert_eq!(calc.bus().memory.page_map(), machine_ticalc::MemoryBus::boot_map());
    assert_eq!(calc.bus().clock.tstates(), 0);
}
