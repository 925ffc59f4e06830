//! Execution engine.
//!
//! Implements the fetch-execute cycle, key processing in both modes, the
//! EEPROM exchange commands and the snapshot handed to observers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use log::{debug, error, trace, warn};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::config::EngineConfig;
use crate::cpu::{Address, CallStack, OperandStack, ProgramMemory, RegisterBank};
use crate::cpu::decode::{self, Category, Condition, DecodeError, Instruction};
use crate::cpu::memory::MemoryError;
use crate::decimal::{arith, logic, glyph, AngleMode, ArithmeticError, PackedDecimal, RandomSource};
use crate::decimal::{DISPLAY_WIDTH, ERROR_DISPLAY};
use crate::eeprom::{Eeprom, EepromError, ExchangeMode, Operation};

/// Keyboard mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Keys execute; programs run.
    Execution,
    /// Keys are written into program memory.
    Programming,
}

/// Result of one program step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Continue,
    Stop,
    Error,
}

/// A key or control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// A key carrying an opcode.
    Code(u8),
    /// Move the program counter forward.
    StepForward,
    /// Move the program counter back.
    StepBack,
    /// Switch to programming mode.
    Programming,
    /// Switch back to execution mode.
    Automatic,
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pgm" | "prg" => Ok(Key::Programming),
            "auto" | "aut" => Ok(Key::Automatic),
            "sst" | "fwd" => Ok(Key::StepForward),
            "bst" | "back" => Ok(Key::StepBack),
            other => u8::from_str_radix(other, 16)
                .map(Key::Code)
                .map_err(|_| format!("unknown key: {}", s)),
        }
    }
}

/// What a key press led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOutcome {
    /// The key was handled.
    Done,
    /// The key raised an error; the indicator shows the error text.
    Error,
    /// The key asks for the program to run from the current address.
    Run,
}

/// Errors surfaced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("eeprom error: {0}")]
    Eeprom(#[from] EepromError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("calculator is powered off")]
    PoweredOff,
}

/// Indicator text of the operand stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub x: String,
    pub y: String,
    pub z: String,
    pub t: String,
    pub x1: String,
}

/// Everything an observer sees after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub display: String,
    pub pc: Address,
    pub mode: Mode,
    pub stack: StackSnapshot,
    pub registers: Vec<String>,
    pub calls: Vec<Address>,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]  pc={}  {:?}", self.display, self.pc, self.mode)?;
        writeln!(f, "  X1 [{}]", self.stack.x1)?;
        writeln!(f, "  T  [{}]", self.stack.t)?;
        writeln!(f, "  Z  [{}]", self.stack.z)?;
        writeln!(f, "  Y  [{}]", self.stack.y)?;
        writeln!(f, "  X  [{}]", self.stack.x)?;
        for (i, r) in self.registers.iter().enumerate() {
            writeln!(f, "  R{} [{}]", decode::register_name(i), r)?;
        }
        let calls: Vec<String> = self.calls.iter().map(|a| a.to_string()).collect();
        write!(f, "  calls {}", calls.join(" "))
    }
}

/// Receives step notifications.
pub trait Observer {
    /// Called before each program step.
    fn before_step(&mut self) {}

    /// Called after each program step with the resulting state.
    fn after_step(&mut self, snapshot: &Snapshot);
}

impl<F: FnMut(&Snapshot)> Observer for F {
    fn after_step(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Observer for Silent {
    fn after_step(&mut self, _snapshot: &Snapshot) {}
}

/// The calculator core.
#[derive(Debug, Clone)]
pub struct Engine {
    pub stack: OperandStack,
    pub registers: RegisterBank,
    pub calls: CallStack,
    pub memory: ProgramMemory,
    pub eeprom: Eeprom,
    /// Program counter.
    pub pc: Address,
    /// Steps executed since power on.
    pub cycles: u64,
    config: EngineConfig,
    random: RandomSource,
    mode: Mode,
    powered: bool,
    /// Error text is on the indicator.
    error_shown: bool,
    /// Digits typed after a manual goto.
    pending_goto: Option<Vec<u8>>,
    last_error: Option<EngineError>,
}

impl Engine {
    /// Create a powered-off engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            stack: OperandStack::new(),
            registers: RegisterBank::new(),
            calls: CallStack::new(),
            memory: ProgramMemory::new(),
            eeprom: Eeprom::new(),
            pc: Address::ZERO,
            cycles: 0,
            config,
            random: RandomSource::new(config.random_seed),
            mode: Mode::Execution,
            powered: false,
            error_shown: false,
            pending_goto: None,
            last_error: None,
        }
    }

    /// Power on: every volatile part starts from zero. The EEPROM keeps its
    /// contents and its pending exchange settings.
    pub fn power_on(&mut self) {
        self.stack.reset();
        self.registers.reset();
        self.calls.reset();
        self.memory.clear();
        self.pc = Address::ZERO;
        self.cycles = 0;
        self.random = RandomSource::new(self.config.random_seed);
        self.mode = Mode::Execution;
        self.error_shown = false;
        self.pending_goto = None;
        self.last_error = None;
        self.powered = true;
        debug!("power on");
    }

    pub fn power_off(&mut self) {
        self.powered = false;
        debug!("power off");
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn angle_mode(&self) -> AngleMode {
        self.config.angle_mode
    }

    pub fn set_angle_mode(&mut self, mode: AngleMode) {
        self.config.angle_mode = mode;
    }

    pub fn set_pacing(&mut self, pacing: bool) {
        self.config.pacing = pacing;
    }

    pub fn is_error_shown(&self) -> bool {
        self.error_shown
    }

    /// The error behind the most recent error display.
    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    /// Copy a program into memory from address 00.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), EngineError> {
        self.memory.load_program(program)?;
        Ok(())
    }

    /// Indicator text.
    pub fn display(&self) -> String {
        if !self.powered {
            return " ".repeat(DISPLAY_WIDTH);
        }
        if self.error_shown {
            return ERROR_DISPLAY.to_string();
        }
        match self.mode {
            Mode::Execution => self.stack.display(),
            Mode::Programming => self.program_display(),
        }
    }

    /// The three codes before the program counter, newest first, then the address.
    fn program_display(&self) -> String {
        let mut text = String::with_capacity(DISPLAY_WIDTH + 2);
        text.push(' ');
        let mut at = self.pc;
        for i in 0..3 {
            at = at.prev();
            let code = self.memory.code_at(at);
            if i > 0 {
                text.push(' ');
            }
            text.push(glyph(code >> 4));
            text.push(glyph(code & 0x0F));
        }
        let index = self.pc.index();
        text.push_str("  ");
        text.push(glyph((index / 10) as u8));
        text.push(glyph((index % 10) as u8));
        text
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            display: self.display(),
            pc: self.pc,
            mode: self.mode,
            stack: StackSnapshot {
                x: self.stack.display(),
                y: self.stack.y.render(),
                z: self.stack.z.render(),
                t: self.stack.t.render(),
                x1: self.stack.x1.render(),
            },
            registers: self.registers.render_all(),
            calls: self.calls.entries().to_vec(),
        }
    }

    fn fail(&mut self, err: EngineError) {
        self.error_shown = true;
        self.last_error = Some(err);
    }

    /// Execute the program step at the program counter.
    pub fn step(&mut self) -> Status {
        if !self.powered {
            self.last_error = Some(EngineError::PoweredOff);
            return Status::Error;
        }
        let at = self.pc;
        let instr = match self.memory.fetch_instruction(&mut self.pc) {
            Ok(instr) => instr,
            Err(e) => {
                error!("{}", e);
                self.fail(e.into());
                return Status::Error;
            }
        };
        trace!("{} {}", at, instr);
        self.cycles += 1;

        let status = match self.execute(instr) {
            Ok(status) => status,
            Err(e) => {
                warn!("{} at {}: {}", instr, at, e);
                self.fail(e);
                Status::Error
            }
        };

        if self.config.pacing {
            if let Some(info) = instr.info() {
                std::thread::sleep(Duration::from_millis(info.duration_ms as u64));
            }
        }
        status
    }

    /// One step of a program run: stops with an error when X holds a word
    /// the indicator cannot show.
    pub fn run_step(&mut self) -> Status {
        if self.powered && !self.stack.is_valid() {
            self.fail(ArithmeticError::NotFinite.into());
            return Status::Error;
        }
        self.step()
    }

    /// Run until a stop, an error, or `running` is cleared.
    ///
    /// This is the single-threaded run loop. [`Calculator`](crate::Calculator)
    /// drives [`Engine::run_step`] itself so it can release its lock between
    /// steps.
    ///
    /// Returns the status of the last step, or `Continue` when the run was
    /// cancelled from outside.
    pub fn run(&mut self, running: &AtomicBool, observer: &mut dyn Observer) -> Status {
        debug!("run from {}", self.pc);
        let start = self.cycles;
        let mut status = Status::Continue;
        while running.load(Ordering::Acquire) {
            observer.before_step();
            status = self.run_step();
            observer.after_step(&self.snapshot());
            if status != Status::Continue {
                break;
            }
        }
        running.store(false, Ordering::Release);
        debug!("run ended at {} with {:?} after {} steps", self.pc, status, self.cycles - start);
        status
    }

    /// Run for at most `max_cycles` steps.
    pub fn run_limited(&mut self, max_cycles: u64) -> Status {
        let limit = self.cycles + max_cycles;
        let mut status = Status::Continue;
        while status == Status::Continue && self.cycles < limit {
            status = self.run_step();
        }
        status
    }

    /// Process one key.
    pub fn press(&mut self, key: Key) -> KeyOutcome {
        if !self.powered {
            return KeyOutcome::Done;
        }
        if self.error_shown {
            return self.press_in_error(key);
        }
        match self.mode {
            Mode::Programming => self.press_programming(key),
            Mode::Execution => self.press_execution(key),
        }
    }

    fn press_in_error(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::Code(0x0D) => {
                self.error_shown = false;
                self.last_error = None;
                self.stack.clear_x();
                KeyOutcome::Done
            }
            Key::Programming => {
                self.mode = Mode::Programming;
                KeyOutcome::Error
            }
            Key::Automatic => {
                self.mode = Mode::Execution;
                KeyOutcome::Error
            }
            _ => KeyOutcome::Error,
        }
    }

    fn press_programming(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::Code(code) => {
                self.memory.store_code(self.pc, code);
                self.pc = self.pc.next();
            }
            Key::StepForward => self.pc = self.pc.next(),
            Key::StepBack => self.pc = self.pc.prev(),
            Key::Automatic => self.mode = Mode::Execution,
            Key::Programming => {}
        }
        KeyOutcome::Done
    }

    fn press_execution(&mut self, key: Key) -> KeyOutcome {
        if let Some(mut digits) = self.pending_goto.take() {
            if let Key::Code(d @ 0..=9) = key {
                digits.push(d);
                if digits.len() == 2 {
                    self.pc = Address::from_code((digits[0] << 4) | digits[1]);
                    debug!("goto {}", self.pc);
                } else {
                    self.pending_goto = Some(digits);
                }
                return KeyOutcome::Done;
            }
        }

        match key {
            Key::Code(0x50) => match self.stack.commit_entry() {
                Ok(()) => KeyOutcome::Run,
                Err(e) => {
                    self.fail(e.into());
                    KeyOutcome::Error
                }
            },
            Key::Code(0x51) => {
                self.pending_goto = Some(Vec::with_capacity(2));
                KeyOutcome::Done
            }
            Key::Code(0x52) => {
                self.pc = Address::ZERO;
                KeyOutcome::Done
            }
            Key::Code(0x53) => match self.step() {
                Status::Error => KeyOutcome::Error,
                _ => KeyOutcome::Done,
            },
            Key::Code(code) => {
                let info = match decode::lookup(code) {
                    Some(info) => info,
                    None => {
                        warn!("key code {:02X} has no instruction", code);
                        return KeyOutcome::Done;
                    }
                };
                if info.two_byte {
                    return KeyOutcome::Done;
                }
                match self.execute(Instruction::new(code)) {
                    Ok(_) => KeyOutcome::Done,
                    Err(e) => {
                        warn!("{}: {}", Instruction::new(code), e);
                        self.fail(e);
                        KeyOutcome::Error
                    }
                }
            }
            Key::StepForward => {
                self.pc = self.pc.next();
                KeyOutcome::Done
            }
            Key::StepBack => {
                self.pc = self.pc.prev();
                KeyOutcome::Done
            }
            Key::Programming => match self.stack.commit_entry() {
                Ok(()) => {
                    self.mode = Mode::Programming;
                    KeyOutcome::Done
                }
                Err(e) => {
                    self.fail(e.into());
                    KeyOutcome::Error
                }
            },
            Key::Automatic => KeyOutcome::Done,
        }
    }

    /// Select the EEPROM exchange address from the indicator.
    pub fn eeprom_select(&mut self) -> Result<(), EngineError> {
        if !self.powered {
            return Err(EngineError::PoweredOff);
        }
        self.stack.commit_entry()?;
        let display = self.stack.display();
        self.eeprom.select(&display);
        Ok(())
    }

    pub fn set_eeprom_operation(&mut self, operation: Operation) {
        self.eeprom.set_operation(operation);
    }

    pub fn set_eeprom_mode(&mut self, mode: ExchangeMode) {
        self.eeprom.set_mode(mode);
    }

    /// Run the pending EEPROM exchange.
    pub fn eeprom_exchange(&mut self) -> Result<(), EngineError> {
        if !self.powered {
            return Err(EngineError::PoweredOff);
        }
        self.stack.commit_entry()?;
        self.eeprom
            .exchange(&mut self.memory, &mut self.registers, &mut self.stack.x)?;
        Ok(())
    }

    /// Execute one instruction against the machine state.
    fn execute(&mut self, instr: Instruction) -> Result<Status, EngineError> {
        let info = decode::lookup(instr.opcode).ok_or(DecodeError::UnknownOpcode {
            code: instr.opcode,
            at: self.pc,
        })?;
        let code = instr.opcode;

        match info.category {
            Category::Digit => self.stack.add_digit(code),
            Category::Entry => match code {
                0x0A => self.stack.add_point(),
                0x0B => self.stack.change_sign(),
                _ => self.stack.enter_exponent(),
            },
            Category::Stack => match code {
                0x0D => self.stack.clear_x(),
                0x0E => self.stack.push()?,
                0x0F => self.stack.restore_x()?,
                0x14 => self.stack.swap()?,
                _ => self.stack.rotate()?,
            },
            Category::Unary => {
                let mode = self.config.angle_mode;
                self.stack.unary_operation(|x| unary(code, x, mode))?;
            }
            Category::Binary => self.stack.binary_operation(|x, y| binary(code, x, y))?,
            Category::BinaryKeepY => {
                self.stack.binary_keep_y_operation(|x, y| binary(code, x, y))?
            }
            Category::Constant => {
                let value = match code {
                    0x20 => PackedDecimal::PI,
                    _ => self.random.next_value(),
                };
                self.stack.recall(value)?;
            }
            Category::Store => {
                let x = self.stack.settle_x()?;
                self.registers.store(register(info, code), x);
            }
            Category::Load => {
                let value = self.registers.load(register(info, code));
                self.stack.recall(value)?;
            }
            Category::Stop => {
                self.stack.settle_x()?;
                return Ok(Status::Stop);
            }
            Category::Goto => {
                self.stack.settle_x()?;
                if let Some(target) = instr.target() {
                    self.pc = target;
                }
            }
            Category::Call => {
                self.stack.settle_x()?;
                if let Some(target) = instr.target() {
                    self.calls.push(self.pc);
                    self.pc = target;
                }
            }
            Category::Return => {
                self.stack.settle_x()?;
                self.pc = self.calls.pop();
            }
            Category::Conditional => {
                let x = self.stack.observe_x()?;
                if let (Some(condition), Some(target)) = (info.condition(), instr.target()) {
                    if !holds(condition, &x) {
                        self.pc = target;
                    }
                }
            }
            Category::Loop => {
                self.stack.settle_x()?;
                if let (Some(r), Some(target)) = (info.loop_register(), instr.target()) {
                    if self.registers.modify_and_get(r) != 0 {
                        self.pc = target;
                    }
                }
            }
            Category::IndirectStore => {
                let x = self.stack.settle_x()?;
                let r = self.registers.indirect_register(register(info, code));
                self.registers.store(r, x);
            }
            Category::IndirectLoad => {
                let r = self.registers.indirect_register(register(info, code));
                let value = self.registers.load(r);
                self.stack.recall(value)?;
            }
            Category::IndirectGoto => {
                self.stack.settle_x()?;
                self.pc = self.registers.indirect_address(register(info, code));
            }
            Category::IndirectCall => {
                self.stack.settle_x()?;
                let target = self.registers.indirect_address(register(info, code));
                self.calls.push(self.pc);
                self.pc = target;
            }
            Category::IndirectConditional => {
                let x = self.stack.observe_x()?;
                if let Some(condition) = info.condition() {
                    if !holds(condition, &x) {
                        self.pc = self.registers.indirect_address(register(info, code));
                    }
                }
            }
            Category::NoOp => {
                self.stack.settle_x()?;
            }
        }
        Ok(Status::Continue)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn register(info: &decode::OpcodeInfo, code: u8) -> usize {
    info.register().unwrap_or((code & 0x0F) as usize)
}

fn holds(condition: Condition, x: &PackedDecimal) -> bool {
    let negative = x.is_negative() && !x.is_zero();
    match condition {
        Condition::Negative => negative,
        Condition::Zero => x.is_zero(),
        Condition::NotNegative => !negative,
        Condition::NonZero => !x.is_zero(),
    }
}

fn unary(code: u8, x: &PackedDecimal, mode: AngleMode) -> Result<PackedDecimal, ArithmeticError> {
    match code {
        0x15 => arith::pow10(x),
        0x16 => arith::exp(x),
        0x17 => arith::log10(x),
        0x18 => arith::ln(x),
        0x19 => arith::arcsin(x, mode),
        0x1A => arith::arccos(x, mode),
        0x1B => arith::arctan(x, mode),
        0x1C => arith::sin(x, mode),
        0x1D => arith::cos(x, mode),
        0x1E => arith::tan(x, mode),
        0x21 => arith::sqrt(x),
        0x22 => arith::square(x),
        0x23 => arith::reciprocal(x),
        0x26 => arith::to_degrees_minutes(x),
        0x2A => arith::to_degrees_minutes_seconds(x),
        0x30 => arith::from_degrees_minutes_seconds(x),
        0x31 => Ok(arith::abs(x)),
        0x32 => Ok(arith::sign(x)),
        0x33 => arith::from_degrees_minutes(x),
        0x34 => Ok(arith::integer_part(x)),
        0x35 => arith::fractional_part(x),
        0x3A => Ok(logic::not(x)),
        _ => unreachable!("opcode {:02X} is not a unary function", code),
    }
}

/// Two-operand functions; `x` is the top of the stack, `y` the one below.
fn binary(code: u8, x: &PackedDecimal, y: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    match code {
        0x10 => arith::add(y, x),
        0x11 => arith::subtract(y, x),
        0x12 => arith::multiply(y, x),
        0x13 => arith::divide(y, x),
        0x24 => arith::power(x, y),
        0x36 => Ok(arith::max(x, y)),
        0x37 => Ok(logic::and(x, y)),
        0x38 => Ok(logic::or(x, y)),
        0x39 => Ok(logic::xor(x, y)),
        _ => unreachable!("opcode {:02X} is not a binary function", code),
    }
}
