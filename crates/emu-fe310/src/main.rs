//! FE310 emulator binary.
//!
//! Runs the SoC under the crossterm front panel. Keys:
//! space = single step, `r` = toggle free-run, `R` = reset,
//! `t` = toggle trace, `q` = quit.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::execute;

use emu_fe310::tui::{Display, PaneLogger};
use emu_fe310::{Fe310, Fe310Config};

/// Steps per redraw while free-running.
const RUN_BATCH: u32 = 128;

/// Run state, matching the panel keys: 0 = halted, 1 = single step,
/// 2 = free run.
#[derive(PartialEq, Eq, Clone, Copy)]
enum RunMode {
    Halted,
    SingleStep,
    FreeRun,
}

struct CliArgs {
    image_dir: Option<PathBuf>,
    trace_off: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        image_dir: Some(PathBuf::from(".")),
        trace_off: false,
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--image-dir" => {
                i += 1;
                cli.image_dir = args.get(i).map(PathBuf::from);
            }
            "--no-trace" => {
                cli.trace_off = true;
            }
            other => {
                eprintln!("Unknown argument: {other}");
            }
        }
        i += 1;
    }
    cli
}

fn main() -> ExitCode {
    let cli = parse_args();
    let logger = PaneLogger::install();

    let display = match Display::new(logger) {
        Ok(display) => display,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let config = Fe310Config {
        image_dir: cli.image_dir,
        trace_off: cli.trace_off,
    };
    let mut machine = match Fe310::new(&config) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("Unable to initialise machine: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!("Memory initialised");
    log::info!("RISC-V initialised");
    machine.reset();
    log::info!("Press SPACE to run a single instruction, or 'r' to run. 'q' to quit");

    let result = run_panel(display, &mut machine);
    logger.close();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Display error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// The interactive loop: step, repaint, poll one key.
fn run_panel(mut display: Display, machine: &mut Fe310) -> io::Result<()> {
    let mut out = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;

    let mut run = RunMode::SingleStep;
    let result = (|| -> io::Result<()> {
        loop {
            if run != RunMode::Halted {
                let batch = if run == RunMode::FreeRun { RUN_BATCH } else { 1 };
                for _ in 0..batch {
                    if machine.step().is_err() {
                        run = RunMode::Halted;
                        break;
                    }
                }
                if run == RunMode::SingleStep {
                    run = RunMode::Halted;
                }
            }

            display.absorb(machine);
            display.draw(&mut out, machine)?;

            let wait = if run == RunMode::FreeRun {
                Duration::from_millis(1)
            } else {
                Duration::from_millis(50)
            };
            if event::poll(wait)? {
                if let Event::Key(KeyEvent {
                    code,
                    kind: KeyEventKind::Press,
                    ..
                }) = event::read()?
                {
                    match code {
                        KeyCode::Char(' ') => run = RunMode::SingleStep,
                        KeyCode::Char('r') => {
                            run = if run == RunMode::Halted {
                                RunMode::FreeRun
                            } else {
                                RunMode::Halted
                            };
                        }
                        KeyCode::Char('R') => {
                            machine.reset();
                            run = RunMode::Halted;
                        }
                        KeyCode::Char('t') => {
                            let on = machine.trace_enabled();
                            machine.set_trace(!on);
                        }
                        KeyCode::Char('q') => break,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    })();

    log::info!("RISC-V shutdown");
    log::info!("Memory shutdown");

    execute!(out, LeaveAlternateScreen, Show)?;
    terminal::disable_raw_mode()?;
    out.flush()?;
    result
}
