use anyhow::Context;
use clap::{ArgAction, Parser};
use clap_num::number_range;
use nv2atrace::emit::{emit_commands, EmitOptions, OutputDialect};
use nv2atrace::filter::{draw_boundaries, Selection};
use nv2atrace::trace_file::load_trace;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::Level;

/// Program to convert an nv2a PGRAPH trace log to pbkit code
///
/// The log is a text file written by an emulator with PGRAPH method
/// tracing enabled. Lines of the form
///
/// nv2a_pgraph_method 0: 0x97 -> 0x1800 0x11000F
///
/// (and the annotated and unhandled-method variants) are converted
/// to push-buffer calls which issue the same methods. All other lines
/// are ignored.
///
/// A window of draw calls can be selected with --start-draw or
/// --draw. In that case the code starts with the most recent value
/// of every stateful method set before the window, so that it can be
/// replayed on its own.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the nv2a log to be converted
    log_file: PathBuf,

    /// Path to write the converted commands to (default stdout)
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// The line in the log at which to start processing
    #[arg(long, value_name = "LINE_NUM", value_parser = at_least_one,
          conflicts_with_all = ["start_draw", "max_draws", "draw"])]
    start_line: Option<usize>,

    /// The maximum number of nv2a commands to process
    #[arg(long, value_name = "COMMANDS", value_parser = at_least_one,
          conflicts_with_all = ["start_draw", "max_draws", "draw"])]
    max_commands: Option<usize>,

    /// The draw call in the log at which to start processing
    #[arg(long, value_name = "DRAW_NUM", value_parser = draw_number)]
    start_draw: Option<u32>,

    /// The maximum number of draw calls to process
    #[arg(long, value_name = "DRAWS", value_parser = draw_number, requires = "start_draw")]
    max_draws: Option<u32>,

    /// A single draw call to process (same as --start-draw DRAW_NUM
    /// --max-draws 1)
    #[arg(long, value_name = "DRAW_NUM", value_parser = draw_number,
          conflicts_with_all = ["start_draw", "max_draws"])]
    draw: Option<u32>,

    /// Keep commands that likely target application-specific memory
    #[arg(long)]
    retain_non_portable: bool,

    /// Print the line on which each draw call ends, instead of code
    #[arg(short, long)]
    list: bool,

    /// Emit PBKitPlusPlus commands rather than raw pbkit
    #[arg(short = 'P', long)]
    pbkitplusplus: bool,

    /// Log more about the conversion to stderr (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn at_least_one(s: &str) -> Result<usize, String> {
    number_range(s, 1, usize::MAX)
}

fn draw_number(s: &str) -> Result<u32, String> {
    number_range(s, 1, u32::MAX)
}

impl Args {
    fn selection(&self) -> Selection {
        if let Some(draw) = self.draw {
            Selection::Draws {
                start_draw: draw,
                max_draws: Some(1),
            }
        } else if let Some(start_draw) = self.start_draw {
            Selection::Draws {
                start_draw,
                max_draws: self.max_draws,
            }
        } else if self.start_line.is_some() || self.max_commands.is_some() {
            Selection::Lines {
                start_line: self.start_line,
                max_commands: self.max_commands,
            }
        } else {
            Selection::All
        }
    }

    fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            dialect: if self.pbkitplusplus {
                OutputDialect::PbkitPlusPlus
            } else {
                OutputDialect::Pbkit
            },
            retain_non_portable: self.retain_non_portable,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let entries = load_trace(&args.log_file)
        .with_context(|| format!("failed to read trace log {}", args.log_file.display()))?;

    let text: String = if args.list {
        draw_boundaries(&entries)
            .iter()
            .map(|boundary| format!("{boundary}\n"))
            .collect()
    } else {
        let selected = args.selection().apply(&entries)?;
        emit_commands(&selected, args.emit_options())
    };

    match &args.out {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout().write_all(text.as_bytes())?,
    }
    Ok(())
}
