use std::io::{stdin, stdout, IsTerminal, Write};
use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Report, Result};

use lc3vm::output::{file_message, format_registers, message, MsgColor};
use lc3vm::term::{RawTerminal, TerminalInput, TerminalOutput};
use lc3vm::{ByteInput, InputDevice, Registers, RunEnvironment, RunError, VmState};

/// Run LC3 object images, starting execution at x3000.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// `.obj` images to load, in order. Later images overwrite earlier ones
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long)]
    minimal: bool,
    /// Print the registers once the program halts
    #[arg(short, long)]
    registers: bool,
}

fn main() -> Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    lc3vm::env::init(args.minimal);

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .terminal_links(false)
                .build(),
        )
    }))?;

    // Every image must load before anything runs
    let mut state = VmState::new();
    for path in lc3vm::loader::expand_image_paths(&args.images)? {
        file_message(Green, "Loading", &path);
        lc3vm::load_image_file(&mut state.mem, &path)?;
    }

    message(Green, "Running", "loaded images");
    let (result, registers) = if stdin().is_terminal() {
        let _raw = RawTerminal::acquire().into_diagnostic()?;
        // Redirected output must not pick up the carriage returns raw mode needs
        let output = TerminalOutput::new(stdout().lock(), stdout().is_terminal());
        execute(state, TerminalInput::new(), output)
        // Terminal restored here, before anything else is printed
    } else {
        execute(state, ByteInput::new(stdin()), stdout().lock())
    };

    match result {
        Ok(()) => {
            if args.registers {
                eprint!("{}", format_registers(&registers, lc3vm::env::is_minimal()));
            }
            message(Cyan, "Completed", "program halted");
            Ok(())
        }
        Err(err @ RunError::IllegalOpcode { .. }) => {
            message(Red, "Aborted", "illegal instruction");
            eprintln!("{:?}", Report::new(err));
            std::process::abort()
        }
        Err(err) => Err(err.into()),
    }
}

fn execute<I, W>(state: VmState, input: I, output: W) -> (Result<(), RunError>, Registers)
where
    I: InputDevice,
    W: Write,
{
    let mut env = RunEnvironment::new(state, input, output);
    let result = env.run();
    (result, env.registers().clone())
}
