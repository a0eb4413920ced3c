use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, miette, IntoDiagnostic, Result};

use nibble::{Air, AirStmt, AsmParser, Emulator, Fault, ProgramSource, Register, StepOutcome};

/// Nibble assembles and runs programs for a tiny 16-bit teaching CPU.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file and print the final machine state
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        /// Print every instruction as it is executed (also `NIBBLE_TRACE=1`)
        #[arg(short, long)]
        trace: bool,
        /// Stop after this many instructions (also `NIBBLE_MAX_STEPS`)
        #[arg(long)]
        max_steps: Option<u64>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Create binary `.bin` file of big-endian words to run later
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output .bin file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Place a watch on a `.asm` file to receive constant assembler updates
    Watch {
        /// `.asm` file to watch
        name: PathBuf,
    },
}

#[derive(Default)]
struct RunOptions {
    trace: bool,
    max_steps: Option<u64>,
    minimal: bool,
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    nibble::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(nibble::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&path, RunOptions::default());
        }
        println!("\n~ nibble v{VERSION} ~");
        println!("{SHORT_INFO}");
        return Ok(());
    };

    match command {
        Command::Run {
            name,
            trace,
            max_steps,
            minimal,
        } => run(
            &name,
            RunOptions {
                trace,
                max_steps,
                minimal,
            },
        ),
        Command::Compile { name, dest } => {
            file_message(Green, "Assembling", &name);
            let (_, air) = assemble_file(&name)?;

            let out_file_name = match dest {
                Some(dest) => dest,
                None => name.with_extension("bin"),
            };
            let mut file = File::create(&out_file_name).into_diagnostic()?;
            for word in air.emit() {
                file.write_all(&word.to_be_bytes()).into_diagnostic()?;
            }

            message(Green, "Finished", "emit binary");
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let _ = assemble_file(&name)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Watch { name } => watch(name),
    }
}

#[derive(Clone, Copy)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

/// Read and assemble a text program, rendering any error against its source.
fn assemble_file(name: &Path) -> Result<(ProgramSource, Air)> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    let source = ProgramSource::parse(&contents).map_err(|e| e.into_report(&contents))?;
    let air = AsmParser::new()
        .parse(&source.asm)
        .map_err(|e| e.into_report(&source.asm))?;
    Ok((source, air))
}

/// Read a binary file of big-endian words.
fn read_binary(name: &Path) -> Result<Vec<u16>> {
    let buffer = fs::read(name).into_diagnostic()?;
    if buffer.len() % 2 != 0 {
        bail!("File is not aligned to 16 bits")
    }
    Ok(buffer
        .chunks_exact(2)
        .map(|word| u16::from_be_bytes([word[0], word[1]]))
        .collect())
}

fn run(name: &Path, opts: RunOptions) -> Result<()> {
    let status = |color, left: &str, right: &str| {
        if !opts.minimal {
            message(color, left, right);
        }
    };
    if !opts.minimal {
        file_message(MsgColor::Green, "Assembling", name);
    }

    let mut emu = Emulator::new();
    let air = match name.extension().and_then(|ext| ext.to_str()) {
        Some("asm") => {
            let (source, air) = assemble_file(name)?;
            if let Some(data) = &source.data {
                emu.load_data(data).into_diagnostic()?;
            }
            emu.load_program(&air.emit()).into_diagnostic()?;
            Some(air)
        }
        Some("bin") => {
            emu.load_program(&read_binary(name)?).into_diagnostic()?;
            None
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };

    let trace = opts.trace || nibble::env::is_trace_enabled();
    let max_steps = opts.max_steps.or(nibble::env::max_steps());

    status(MsgColor::Green, "Running", "assembled program");
    let mut steps: u64 = 0;
    let outcome = loop {
        if max_steps.is_some_and(|max| steps >= max) {
            break None;
        }
        if trace {
            print_trace(&emu, air.as_ref());
        }
        steps += 1;
        match emu.step() {
            StepOutcome::Continued => continue,
            outcome => break Some(outcome),
        }
    };

    print_state(&emu);
    match outcome {
        Some(StepOutcome::Halted) => {
            message(MsgColor::Cyan, "Halted", &format!("after {steps} steps"));
            if !opts.minimal {
                file_message(MsgColor::Green, "Completed", name);
            }
            Ok(())
        }
        // Running off the end of memory stops the machine without an error
        Some(StepOutcome::Faulted(fault @ Fault::PcOutOfBounds { .. })) => {
            message(MsgColor::Red, "Stopped", &fault.to_string());
            Ok(())
        }
        Some(StepOutcome::Faulted(fault)) => Err(miette!("{fault}")),
        Some(StepOutcome::Continued) => unreachable!(),
        None => {
            status(
                MsgColor::Red,
                "Stopped",
                &format!("step limit of {steps} reached"),
            );
            Ok(())
        }
    }
}

/// One line per step: address, raw word, disassembly, and the source line if known.
fn print_trace(emu: &Emulator, air: Option<&Air>) {
    let Some(word) = emu.fetch() else {
        return;
    };
    let disasm = match AirStmt::decode(word) {
        Some(stmt) => stmt.to_string(),
        None => "???".to_string(),
    };
    let source_line = emu
        .pc()
        .checked_sub(emu.offset())
        .and_then(|addr| air?.get(addr))
        .map(|line| format!("; line {}", line.line))
        .unwrap_or_default();
    println!(
        "{:>5}: {:04X}  {:<18} {}",
        emu.pc(),
        word,
        disasm,
        source_line.as_str().dimmed()
    );
}

fn print_state(emu: &Emulator) {
    println!("\n------ Registers ------");
    for row in 0..4 {
        let line: Vec<String> = (0..4)
            .map(|col| {
                let reg = Register::new(row * 4 + col);
                format!("{:<4}= {:<6}", reg.to_string(), emu.register(reg))
            })
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
    println!("--------- PC ----------");
    println!("{}", emu.pc());
    println!("-------- Memory -------");
    print_memory_row(emu, 0);
    print_memory_row(emu, emu.offset());
    println!("-----------------------");
}

fn print_memory_row(emu: &Emulator, start: usize) {
    let end = (start + 8).min(emu.capacity());
    let words: Vec<String> = emu.memory()[start..end]
        .iter()
        .map(|word| format!("{word:04X}"))
        .collect();
    println!("{start:>5}: {}", words.join(" "));
}

fn watch(name: PathBuf) -> Result<()> {
    use MsgColor::*;
    if !name.exists() {
        bail!("File does not exist. Exiting...")
    }
    // Vim breaks if watching a single file
    let folder_path = match name.parent() {
        Some(pth) if pth.is_dir() => pth.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    // Clear screen and move cursor to top left
    print!("\x1B[2J\x1B[2;1H");
    file_message(Green, "Watching", &name);
    message(Cyan, "Help", "press CTRL+C to exit");

    let mut watcher =
        Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

    watcher
        .watch(folder_path, move |event: Event| match event.kind {
            // Watch remove for vim changes
            EventKind::Modify(_) | EventKind::Remove(_) => {
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Green, "Re-checking", "file change detected");
                message(Cyan, "Help", "press CTRL+C to exit");

                // Makes reruns more obvious
                sleep(Duration::from_millis(50));

                match assemble_file(&name) {
                    Ok(_) => message(Green, "Success", "no errors found!"),
                    Err(e) => println!("\n{:?}", e),
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        })
        .into_diagnostic()?;
    watcher.run();
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to nibble, an assembler and emulator for a tiny 16-bit CPU with
16 registers, 4-bit operand fields and 1024 words of memory.
Please use `-h` or `--help` to access the usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
