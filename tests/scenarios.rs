//! End-to-end key scenarios against the public API.

use mk52::asm::assemble;
use mk52::eeprom::{CAPACITY, LINE_TETRADS};
use mk52::{Calculator, Engine, EngineConfig, ExchangeMode, Key, KeyOutcome, Operation, Status};

fn powered() -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    engine.power_on();
    engine
}

fn press_all(engine: &mut Engine, codes: &[u8]) {
    for &code in codes {
        assert_eq!(engine.press(Key::Code(code)), KeyOutcome::Done, "key {:02X}", code);
    }
}

#[test]
fn digit_entry_fills_the_mantissa_then_the_exponent() {
    let mut engine = powered();
    press_all(&mut engine, &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(engine.display(), " 1234.       ");

    press_all(&mut engine, &[0x05, 0x06, 0x07, 0x08]);
    assert_eq!(engine.display(), " 12345678.   ");

    // VP 9 /-/
    press_all(&mut engine, &[0x0C, 0x09, 0x0B]);
    assert_eq!(engine.display(), " 12345678.-09");
}

#[test]
fn addition_keeps_the_previous_x() {
    let mut engine = powered();
    press_all(&mut engine, &[0x01, 0x0E, 0x02, 0x10]);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.stack.x, " 3.          ");
    assert_eq!(snapshot.stack.x1, " 2.          ");
    assert_eq!(snapshot.display, " 3.          ");
}

#[test]
fn eeprom_data_survives_power_cycle() {
    let mut engine = powered();
    engine.set_eeprom_operation(Operation::Erase);
    engine.set_eeprom_mode(ExchangeMode::Program);
    engine.eeprom_select().unwrap();

    press_all(&mut engine, &[0x20]);
    assert_eq!(engine.display(), " 3.1415926   ");
    engine.set_eeprom_operation(Operation::Write);
    engine.set_eeprom_mode(ExchangeMode::Data);
    engine.eeprom_exchange().unwrap();

    press_all(&mut engine, &[0x0D]);
    assert_eq!(engine.display(), " 0.          ");

    engine.power_off();
    engine.power_on();
    assert_eq!(engine.display(), " 0.          ");

    engine.set_eeprom_operation(Operation::Read);
    engine.eeprom_exchange().unwrap();
    assert_eq!(engine.display(), " 3.1415926   ");
}

#[test]
fn eeprom_program_round_trip() {
    let program = assemble("2\nENTER\n3\n*\nSTOP\nNOP").unwrap();
    let mut engine = powered();
    engine.load_program(&program).unwrap();

    // 1 AAAA SSS: address 0000, six steps.
    press_all(&mut engine, &[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06]);
    assert_eq!(engine.display(), " 10000006.   ");
    engine.eeprom_select().unwrap();
    assert_eq!(engine.eeprom.selection().address, 0);
    assert_eq!(engine.eeprom.selection().steps, 6);
    engine.set_eeprom_operation(Operation::Write);
    engine.set_eeprom_mode(ExchangeMode::Program);
    engine.eeprom_exchange().unwrap();

    engine.power_off();
    engine.power_on();
    assert!(engine.memory.as_bytes().iter().all(|&c| c == 0));

    engine.set_eeprom_operation(Operation::Read);
    engine.eeprom_exchange().unwrap();
    assert_eq!(&engine.memory.as_bytes()[..program.len()], &program[..]);
    assert_eq!(engine.run_limited(100), Status::Stop);
    assert_eq!(engine.display(), " 6.          ");
}

#[test]
fn eeprom_dump_restores_contents() {
    let mut engine = powered();
    press_all(&mut engine, &[0x07]);
    engine.set_eeprom_operation(Operation::Write);
    engine.set_eeprom_mode(ExchangeMode::Data);
    engine.eeprom_exchange().unwrap();

    let mut dump = Vec::new();
    engine.eeprom.export_to(&mut dump).unwrap();
    let text = String::from_utf8(dump).unwrap();
    assert_eq!(text.split_whitespace().count(), CAPACITY);
    assert_eq!(text.lines().next().map(|l| l.split(' ').count()), Some(LINE_TETRADS));

    let expected = engine.eeprom.tetrads().to_vec();
    engine.eeprom.clear();
    assert!(engine.eeprom.tetrads().iter().all(|&t| t == 0));
    engine.eeprom.import_from(text.as_bytes()).unwrap();
    assert_eq!(engine.eeprom.tetrads(), &expected[..]);
}

#[test]
fn assembled_loop_counts_down() {
    let source = "
        5
        P 0
        Cx
    LOOP:
        1
        +
        L0 LOOP
        STOP
    ";
    let mut engine = powered();
    engine.load_program(&assemble(source).unwrap()).unwrap();
    assert_eq!(engine.run_limited(1000), Status::Stop);
    assert_eq!(engine.display(), " 5.          ");
}

#[test]
fn calculator_runs_in_background() {
    let mut calc = Calculator::new(EngineConfig::default());
    calc.power_on();
    let program = assemble("1\n2\nx^2\nSTOP").unwrap();
    calc.load_program(&program).unwrap();
    assert_eq!(calc.press(Key::Code(0x50)), KeyOutcome::Run);
    assert_eq!(calc.wait(), Some(Status::Stop));
    assert_eq!(calc.display(), " 144.        ");
}

#[test]
fn error_display_needs_clear() {
    let mut engine = powered();
    press_all(&mut engine, &[0x01, 0x0E, 0x00]);
    assert_eq!(engine.press(Key::Code(0x13)), KeyOutcome::Error);
    assert_eq!(engine.display(), " ЕГГОГ       ");
    assert_eq!(engine.press(Key::Code(0x05)), KeyOutcome::Error);
    assert_eq!(engine.display(), " ЕГГОГ       ");
    press_all(&mut engine, &[0x0D]);
    assert_eq!(engine.display(), " 0.          ");
}
