use clap::Parser;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use log::{debug, info, warn};
use rv_cycle_core::board::{self, Board};
use rv_cycle_core::core;
use rv_cycle_core::csr::{ControlStatus, CsRegisters, CycleCounter, TrapCause};
use rv_cycle_core::instruction::Extensions;
use rv_cycle_core::resources::ram;
use rv_cycle_core::simulator::Simulator;
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Program to execute: an ELF file, or a flat binary with `--raw`.
    binary: String,
    /// Load the program as a flat binary instead of an ELF file.
    #[arg(long)]
    raw: bool,
    /// Address a flat binary is loaded at.
    #[arg(long, value_parser = parse_u32, default_value = "0")]
    base: u32,
    /// Reset address. Defaults to the ELF entry point, or to `--base` for flat binaries.
    #[arg(long, value_parser = parse_u32)]
    reset_address: Option<u32>,
    /// RAM size in bytes.
    #[arg(long, value_parser = parse_usize, default_value_t = ram::DEFAULT_SIZE)]
    ram_size: usize,
    /// Wait states of every RAM access.
    #[arg(long, default_value_t = 0)]
    wait_states: u32,
    /// Disable the C extension.
    #[arg(long)]
    no_compressed: bool,
    /// Disable the M extension.
    #[arg(long)]
    no_mul_div: bool,
    /// Shift by 4 bits per tick while possible, instead of 1.
    #[arg(long)]
    two_level_shifter: bool,
    /// Only implement the cycle counter CSRs: no interrupts and no traps.
    #[arg(long)]
    reduced_csr: bool,
    /// Give up after this many ticks.
    #[arg(long, default_value_t = 10_000_000)]
    max_ticks: u64,
    /// Raise the interrupt line at this tick, until the core takes the interrupt. Repeatable.
    #[arg(long, value_name = "TICK")]
    irq_at: Vec<u64>,
    /// Print WORDS memory words starting at ADDR after the run. Repeatable.
    #[arg(long, value_name = "ADDR:WORDS")]
    dump: Vec<Dump>,
    /// Write the words between the `begin_signature` and `end_signature` ELF symbols to this file.
    #[arg(long, short)]
    signature: Option<String>,
    /// Increase log verbosity. Repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Copy, Clone)]
struct Dump {
    address: u32,
    words: u32,
}

impl FromStr for Dump {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, words) = s
            .split_once(':')
            .ok_or_else(|| format!("expected ADDR:WORDS, got `{s}`"))?;
        Ok(Self {
            address: parse_u32(address)?,
            words: parse_u32(words)?,
        })
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal number.
fn parse_u32(s: &str) -> Result<u32, String> {
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    result.map_err(|e| format!("invalid number `{s}`: {e}"))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    parse_u32(s).map(|value| value as usize)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    stderrlog::new()
        // Warnings are always shown.
        .verbosity(1 + args.verbose as usize)
        .modules([module_path!(), "rv_cycle_core"])
        .init()?;

    let buf = std::fs::read(&args.binary)?;
    let elf = if args.raw {
        None
    } else {
        Some(Elf::parse(&buf)?)
    };

    let reset_address = args
        .reset_address
        .or_else(|| elf.as_ref().map(|elf| elf.entry as u32))
        .unwrap_or(args.base);
    let config = board::Config {
        ram_size: args.ram_size,
        wait_states: args.wait_states,
        core: core::Config {
            reset_address,
            extensions: Extensions {
                mul_div: !args.no_mul_div,
                compressed: !args.no_compressed,
            },
            two_level_shifter: args.two_level_shifter,
            ..core::Config::default()
        },
        ..board::Config::default()
    };
    info!("reset address {reset_address:#010x}");

    if args.reduced_csr {
        run(&args, &buf, elf.as_ref(), Board::new(config, CycleCounter::new()))
    } else {
        run(&args, &buf, elf.as_ref(), Board::new(config, CsRegisters::new()))
    }
}

fn load<C: ControlStatus>(
    board: &mut Board<C>,
    buf: &[u8],
    elf: Option<&Elf>,
    base: u32,
) -> Result<(), Box<dyn Error>> {
    let Some(elf) = elf else {
        board.load_physical(base, buf)?;
        return Ok(());
    };

    for h in elf.program_headers.iter().filter(|h| h.p_type == PT_LOAD) {
        debug!(
            "loading segment into memory at [{:#010x?}..{:#010x?}]",
            h.p_paddr,
            h.p_paddr + h.p_memsz,
        );
        let segment = buf
            .get(h.file_range())
            .ok_or("ELF segment extends past the end of the file")?;
        board.load_physical(h.p_paddr as u32, segment)?;
    }
    Ok(())
}

fn run<C: ControlStatus>(
    args: &Args,
    buf: &[u8],
    elf: Option<&Elf>,
    mut board: Board<C>,
) -> Result<(), Box<dyn Error>> {
    load(&mut board, buf, elf, args.base)?;
    info!(
        "{} bytes of RAM with {} wait states",
        board.ram().len(),
        board.ram().wait_states()
    );
    let mut simulator = Simulator::new(board);

    let mut halted = false;
    while simulator.tick_count() < args.max_ticks {
        if args.irq_at.contains(&simulator.tick_count()) {
            simulator.inspect_mut().set_interrupt(true);
        }
        simulator.step();

        let report = simulator.inspect().last_report().clone();
        if report
            .trap
            .is_some_and(|trap| trap.cause == TrapCause::Interrupt)
        {
            simulator.inspect_mut().set_interrupt(false);
        }
        if report
            .retired
            .is_some_and(|retired| retired.is_self_loop())
        {
            halted = true;
            break;
        }
    }
    if !halted {
        warn!("stopped after {} ticks without halting", args.max_ticks);
    }

    let board = simulator.inspect();
    print_summary(board, simulator.tick_count(), halted);

    for dump in &args.dump {
        println!();
        for i in 0..dump.words {
            let address = dump.address.wrapping_add(i * 4);
            match board.read_word(address) {
                Some(word) => println!("{address:#010x}: {word:#010x}"),
                None => println!("{address:#010x}: <unmapped>"),
            }
        }
    }

    if let Some(path) = &args.signature {
        let elf = elf.ok_or("a signature can only be extracted from an ELF file")?;
        write_signature(board, elf, path)?;
    }

    Ok(())
}

fn print_summary<C: ControlStatus>(board: &Board<C>, ticks: u64, halted: bool) {
    let core = board.core();
    println!(
        "{} after {ticks} ticks ({} cycles out of reset)",
        if halted { "halted" } else { "stopped" },
        core.csr().cycles()
    );
    println!("pc = {:#010x}, state {:?}", core.pc(), core.state());

    let registers: Vec<_> = board.registers().iter().collect();
    for row in registers.chunks(4) {
        let line: Vec<String> = row
            .iter()
            .map(|(specifier, value)| format!("{:>4} = {value:#010x}", specifier.abi_name()))
            .collect();
        println!("{}", line.join("  "));
    }
    println!("leds = {:#06b}", board.io().leds());

    let output = board.io().uart_output();
    if !output.is_empty() {
        println!("uart output:");
        println!("{}", String::from_utf8_lossy(output));
    }
}

fn write_signature<C: ControlStatus>(
    board: &Board<C>,
    elf: &Elf,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let mut signature_start = None;
    let mut signature_end = None;
    for sym in elf.syms.iter() {
        let Some(name) = elf.strtab.get_at(sym.st_name) else {
            continue;
        };
        if name == "begin_signature" {
            signature_start = Some(sym.st_value as u32);
        } else if name == "end_signature" {
            signature_end = Some(sym.st_value as u32);
        }
    }
    let signature_start = signature_start.ok_or("missing symbol `begin_signature`")?;
    let signature_end = signature_end.ok_or("missing symbol `end_signature`")?;
    if signature_start > signature_end || signature_start % 4 != 0 {
        return Err(format!(
            "invalid signature range {signature_start:#010x}..{signature_end:#010x}"
        )
        .into());
    }

    let mut file = File::create(path)?;
    for address in (signature_start..signature_end).step_by(4) {
        let word = board
            .read_word(address)
            .ok_or_else(|| format!("signature word {address:#010x} is outside of RAM"))?;
        writeln!(file, "{word:08x}")?;
    }
    Ok(())
}
