use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::*;
use log::LevelFilter;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use kernel::{run_program, Config, ExitStatus, Registry, Stdio, Strategy};
use types::ConstantTable;
use vm::memory::DEFAULT_STACK_SIZE;

mod logger;
mod report;

/// Run a static MIPS32 big-endian Linux program
#[derive(Parser, Debug)]
#[command(name = "mipsrun", author, version, about, long_about = None)]
struct Args {
    /// Host directory served as the guest root
    #[arg(long, default_value = "/")]
    root: PathBuf,

    /// Use the instrumented run loop
    #[arg(long)]
    trace: bool,

    /// Print every instruction as it runs
    #[arg(long)]
    disasm: bool,

    /// Print registers with each disassembled instruction
    #[arg(long)]
    regs: bool,

    /// Log function calls and returns
    #[arg(long)]
    funlog: bool,

    /// Wait for Enter at breakpoints
    #[arg(short, long)]
    interactive: bool,

    /// Function names to stop at (comma separated)
    #[arg(long = "break", value_delimiter = ',')]
    breakpoints: Vec<String>,

    /// Log every syscall with its arguments and result
    #[arg(long)]
    strace: bool,

    /// ABI table file overriding the built-in constants
    #[arg(long)]
    constants: Option<PathBuf>,

    /// Initial stack size in bytes
    #[arg(long, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: u32,

    /// More log output; repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log level, overriding -v
    #[arg(long)]
    log_level: Option<LevelFilter>,

    /// Guest environment entry
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Program to run
    program: PathBuf,

    /// Arguments passed to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Args {
    fn config(&self) -> Config {
        let instrumented = self.trace
            || self.disasm
            || self.regs
            || self.funlog
            || self.interactive
            || !self.breakpoints.is_empty();
        Config {
            root: self.root.clone(),
            strategy: if instrumented { Strategy::Instrumented } else { Strategy::Fast },
            disasm: self.disasm,
            regprint: self.regs,
            funlog: self.funlog,
            interactive: self.interactive,
            breakpoints: self.breakpoints.clone(),
            syscall_trace: self.strace,
            stack_size: self.stack_size,
            stdio: Stdio::Inherit,
        }
    }

    fn level(&self) -> LevelFilter {
        let level = self.log_level.unwrap_or_else(|| logger::level_for(self.verbose));
        if self.strace {
            level.max(LevelFilter::Info)
        } else {
            level
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<u8> {
    let args = Args::parse();
    logger::init(args.level()).context("installing logger")?;

    let mut constants = ConstantTable::builtin();
    if let Some(path) = &args.constants {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading constant table {}", path.display()))?;
        let table = ConstantTable::parse(&text)
            .with_context(|| format!("parsing constant table {}", path.display()))?;
        constants.merge(table);
    }

    let image = loader::load_elf(&args.program)
        .with_context(|| format!("loading {}", args.program.display()))?;

    let registry = Registry::with_constants(args.config(), constants);
    registry.add_listener(Arc::new(report::LogListener));

    let argv: Vec<String> = std::iter::once(args.program.to_string_lossy().into_owned())
        .chain(args.args.iter().cloned())
        .collect();
    let status = run_program(&registry, &image, &argv, &args.env)
        .with_context(|| format!("starting {}", args.program.display()))?;

    match status {
        ExitStatus::Crashed => eprintln!("{}", "crashed".red().bold()),
        ExitStatus::Signaled(_) => eprintln!("{}", status.to_string().yellow()),
        ExitStatus::Exited(_) => {}
    }
    Ok(status.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_select_the_instrumented_loop() {
        let args = Args::parse_from(["mipsrun", "--break", "main,foo", "prog", "-x", "y"]);
        assert_eq!(args.breakpoints, vec!["main", "foo"]);
        assert_eq!(args.args, vec!["-x", "y"]);
        assert_eq!(args.config().strategy, Strategy::Instrumented);

        let args = Args::parse_from(["mipsrun", "--root", "/tmp", "prog"]);
        assert_eq!(args.config().strategy, Strategy::Fast);
        assert_eq!(args.config().root, PathBuf::from("/tmp"));
    }

    #[test]
    fn strace_raises_the_log_level() {
        let args = Args::parse_from(["mipsrun", "--strace", "prog"]);
        assert_eq!(args.level(), LevelFilter::Info);
        let args = Args::parse_from(["mipsrun", "-vvvv", "prog"]);
        assert_eq!(args.level(), LevelFilter::Trace);
    }
}
