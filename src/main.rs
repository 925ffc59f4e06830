//! MK-52 Emulator - CLI Entry Point
//!
//! Commands:
//! - `mk52-emu run <program>` - Run an ASM source or hex listing
//! - `mk52-emu keys <sequence>` - Press keys and print the indicator
//! - `mk52-emu asm <source>` - Assemble to a hex listing
//! - `mk52-emu disasm <listing>` - Disassemble a hex listing
//! - `mk52-emu eeprom show <dump>` - Validate and print an EEPROM dump
//! - `mk52-emu test` - Built-in self-test

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use mk52::{AngleMode, Engine, EngineConfig, Key, KeyOutcome, Status};

#[derive(Parser)]
#[command(name = "mk52-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the Elektronika MK-52 programmable calculator")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<String>,
    /// Sleep for each instruction's nominal duration
    #[arg(long, global = true)]
    pacing: bool,
    /// Angle unit for trigonometric instructions
    #[arg(long, value_enum, global = true)]
    angle: Option<Angle>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Angle {
    Rad,
    Grad,
    Deg,
}

impl From<Angle> for AngleMode {
    fn from(angle: Angle) -> Self {
        match angle {
            Angle::Rad => AngleMode::Radian,
            Angle::Grad => AngleMode::Gradian,
            Angle::Deg => AngleMode::Degree,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program from address 00 until it stops
    Run {
        /// Path to the ASM source or hex listing
        program: String,
        /// Maximum number of steps to run
        #[arg(short, long, default_value = "100000")]
        max_cycles: u64,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
        /// EEPROM dump to load before running
        #[arg(long)]
        eeprom: Option<String>,
    },
    /// Press a whitespace-separated key sequence (hex codes, pgm, auto, sst, bst)
    Keys {
        sequence: Vec<String>,
        /// Step limit for runs started by S/P
        #[arg(short, long, default_value = "100000")]
        max_cycles: u64,
    },
    /// Assemble source to a hex listing
    Asm {
        /// Path to the source file
        source: String,
        /// Output listing file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a hex listing
    Disasm {
        /// Path to the listing
        listing: String,
    },
    /// EEPROM dump tools
    Eeprom {
        #[command(subcommand)]
        action: EepromCommand,
    },
    /// Run the built-in self-test
    Test,
}

#[derive(Subcommand)]
enum EepromCommand {
    /// Validate a dump and print its non-empty lines
    Show {
        dump: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let config = engine_config(&cli);

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, json, eeprom }) => {
            run_program(config, &program, max_cycles, trace, json, eeprom.as_deref());
        }
        Some(Commands::Keys { sequence, max_cycles }) => {
            press_keys(config, &sequence, max_cycles);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { listing }) => {
            disassemble_file(&listing);
        }
        Some(Commands::Eeprom { action: EepromCommand::Show { dump } }) => {
            show_eeprom(&dump);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("MK-52 Emulator v0.1.0");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn engine_config(cli: &Cli) -> EngineConfig {
    let mut config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    if cli.pacing {
        config.pacing = true;
    }
    if let Some(angle) = cli.angle {
        config.angle_mode = angle.into();
    }
    config
}

fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

/// Program bytes from an ASM source or a hex listing.
fn load_program_file(path: &str) -> Vec<u8> {
    use mk52::asm::{assemble, parse_listing};

    if path.ends_with(".asm") {
        match assemble(&read_file(path)) {
            Ok(codes) => {
                println!("Assembled {} cells", codes.len());
                codes
            }
            Err(e) => {
                eprintln!("Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match parse_listing(&read_file(path)) {
            Ok(listing) => {
                println!("Loaded {} cells", listing.len());
                listing.codes
            }
            Err(e) => {
                eprintln!("Failed to load listing: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(config: EngineConfig, path: &str, max_cycles: u64, trace: bool, json: bool, eeprom: Option<&str>) {
    use std::sync::atomic::{AtomicBool, Ordering};
    use mk52::asm::disassemble_instruction;
    use mk52::eeprom::load_dump;
    use mk52::Snapshot;

    let program = load_program_file(path);
    if program.is_empty() {
        eprintln!("No program to run");
        std::process::exit(1);
    }

    let mut engine = Engine::new(config);
    if let Some(dump) = eeprom {
        match load_dump(dump) {
            Ok(store) => engine.eeprom = store,
            Err(e) => {
                eprintln!("Failed to load EEPROM dump: {}", e);
                std::process::exit(1);
            }
        }
    }
    engine.power_on();
    if let Err(e) = engine.load_program(&program) {
        eprintln!("Failed to load program: {}", e);
        std::process::exit(1);
    }

    let status = if trace {
        let running = AtomicBool::new(true);
        let program = engine.memory.as_bytes().to_vec();
        let mut steps = 0u64;
        let mut at = engine.pc;
        let mut tracer = |s: &Snapshot| {
            let (text, _) = disassemble_instruction(&program, at.index());
            println!("{}: {:<12} [{}]", at, text, s.display);
            at = s.pc;
            steps += 1;
            if steps >= max_cycles {
                running.store(false, Ordering::Release);
            }
        };
        engine.run(&running, &mut tracer)
    } else {
        engine.run_limited(max_cycles)
    };

    let snapshot = engine.snapshot();
    if json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!();
        println!("{}", snapshot);
        println!("Steps: {}", engine.cycles);
    }

    match status {
        Status::Continue => {
            eprintln!("Reached step limit ({}). Use --max-cycles to increase.", max_cycles);
        }
        Status::Error => {
            if let Some(e) = engine.last_error() {
                eprintln!("Stopped with error: {}", e);
            }
            std::process::exit(1);
        }
        Status::Stop => {}
    }
}

fn press_keys(config: EngineConfig, sequence: &[String], max_cycles: u64) {
    let mut engine = Engine::new(config);
    engine.power_on();

    for token in sequence.iter().flat_map(|s| s.split_whitespace()) {
        let key: Key = match token.parse() {
            Ok(key) => key,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        };
        if engine.press(key) == KeyOutcome::Run {
            engine.run_limited(max_cycles);
        }
    }

    println!("[{}]", engine.display());
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use mk52::asm::{assemble, save_listing, Listing};

    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".lst"));
    println!("Assembling: {} -> {}", source_path, out_path);

    let codes = match assemble(&read_file(source_path)) {
        Ok(codes) => codes,
        Err(e) => {
            eprintln!("Assembly error: {}", e);
            std::process::exit(1);
        }
    };
    println!("Assembled {} cells", codes.len());

    if let Err(e) = save_listing(&out_path, &Listing::from_codes(&codes)) {
        eprintln!("Failed to save listing: {}", e);
        std::process::exit(1);
    }
    println!("Saved to {}", out_path);
}

fn disassemble_file(path: &str) {
    use mk52::asm::{disassemble, load_listing};

    let listing = match load_listing(path) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to load listing: {}", e);
            std::process::exit(1);
        }
    };
    print!("{}", disassemble(&listing.codes));
}

fn show_eeprom(path: &str) {
    use mk52::eeprom::{load_dump, LINE_TETRADS};

    let eeprom = match load_dump(path) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Invalid dump: {}", e);
            std::process::exit(1);
        }
    };
    let mut used = 0;
    for (line, tetrads) in eeprom.tetrads().chunks(LINE_TETRADS).enumerate() {
        if tetrads.iter().all(|&t| t == 0) {
            continue;
        }
        used += 1;
        let digits: String = tetrads.iter().map(|t| format!("{:X}", t)).collect();
        println!("{:04}  {}", line * LINE_TETRADS, digits);
    }
    println!("{} of {} lines in use", used, eeprom.tetrads().len().div_ceil(LINE_TETRADS));
}

fn run_self_test() {
    use mk52::asm::{assemble, disassemble};
    use mk52::decimal::arith;
    use mk52::eeprom::{decode_data_line, encode_data_line};
    use mk52::PackedDecimal;

    println!("MK-52 Emulator Self-Test");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    print!("Packed value round trip... ");
    let mut ok = true;
    for val in [-99_999_999i64, -1, 0, 1, 42, 99_999_999] {
        if PackedDecimal::from_i64(val).to_f64() != val as f64 {
            ok = false;
            break;
        }
    }
    if ok { println!("ok"); passed += 1; }
    else { println!("FAILED"); failed += 1; }

    print!("Addition 2 + 3... ");
    let sum = arith::add(&PackedDecimal::from_i64(2), &PackedDecimal::from_i64(3));
    if sum == Ok(PackedDecimal::from_i64(5)) {
        println!("ok");
        passed += 1;
    } else {
        println!("FAILED (got {:?})", sum);
        failed += 1;
    }

    print!("Keyed arithmetic 4 B^ 5 * ... ");
    let mut engine = Engine::new(EngineConfig::default());
    engine.power_on();
    for code in [0x04, 0x0E, 0x05, 0x12] {
        engine.press(Key::Code(code));
    }
    if engine.display() == " 20.         " {
        println!("ok");
        passed += 1;
    } else {
        println!("FAILED (got [{}])", engine.display());
        failed += 1;
    }

    print!("Division by zero shows error... ");
    let mut engine = Engine::new(EngineConfig::default());
    engine.power_on();
    engine.press(Key::Code(0x01));
    engine.press(Key::Code(0x0E));
    engine.press(Key::Code(0x00));
    if engine.press(Key::Code(0x13)) == KeyOutcome::Error && engine.is_error_shown() {
        println!("ok");
        passed += 1;
    } else {
        println!("FAILED");
        failed += 1;
    }

    print!("Program run to stop... ");
    let mut engine = Engine::new(EngineConfig::default());
    engine.power_on();
    let loaded = assemble("2\nENTER\n3\n+\nSTOP").map(|codes| engine.load_program(&codes));
    let status = engine.run_limited(100);
    if matches!(loaded, Ok(Ok(()))) && status == Status::Stop && engine.display() == " 5.          " {
        println!("ok");
        passed += 1;
    } else {
        println!("FAILED (status {:?}, display [{}])", status, engine.display());
        failed += 1;
    }

    print!("Disassembly reassembles... ");
    let program = [0x01, 0x5D, 0x00, 0x6A, 0x50];
    if assemble(&disassemble(&program)).as_deref() == Ok(&program[..]) {
        println!("ok");
        passed += 1;
    } else {
        println!("FAILED");
        failed += 1;
    }

    print!("EEPROM data line round trip... ");
    let pi = PackedDecimal::PI;
    if decode_data_line(&encode_data_line(&pi)) == Ok(pi) {
        println!("ok");
        passed += 1;
    } else {
        println!("FAILED");
        failed += 1;
    }

    println!();
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("All tests passed!");
    } else {
        std::process::exit(1);
    }
}
