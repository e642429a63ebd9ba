//! runproc binary entry point.

use std::io::Write;
use std::process::ExitCode;

use runproc::cli::{self, Args, Mode};
use runproc::config::Config;
use runproc::execution::{Command, CommandExecutor, CommandResult};
use runproc::{logging, search, RunprocError};
use tracing::debug;

/// Exit code used when the command cannot be found or started.
const EXIT_NOT_FOUND: u8 = 127;

/// Exit code for usage errors.
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'runproc --help' for more information.");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _ = logging::init_with_filter(config.log_filter());
    debug!(?config, "configuration loaded");

    if let Some(ref name) = args.which {
        return match search::find_command(name) {
            Ok(path) => {
                println!("{}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::from(EXIT_NOT_FOUND)
            }
        };
    }

    if args.command.is_empty() {
        eprintln!("error: no command given");
        eprintln!("Try 'runproc --help' for more information.");
        return ExitCode::from(EXIT_USAGE);
    }

    let executor_config = match config.to_executor_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let command_line = match args.command_line() {
        Ok(line) => line,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let command = Command::new(command_line)
        .maybe_timeout(args.timeout)
        .verbose(config.execution.verbose)
        .ignore_status(args.ignore_status);

    let executor = CommandExecutor::new(executor_config);
    match executor.run_async(command).await {
        Ok(result) => report(&args, &result),
        Err(RunprocError::CommandFailed(result)) => {
            // Show what the command produced before failing.
            let _ = std::io::stdout().write_all(result.stdout());
            let _ = std::io::stderr().write_all(result.stderr());
            eprintln!(
                "error: command '{}' failed with exit status {}",
                result.command(),
                result.exit_status()
            );
            ExitCode::from(status_byte(result.exit_status()))
        }
        Err(RunprocError::Spawn { command, source })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            eprintln!("error: {}: command not found", command);
            ExitCode::from(EXIT_NOT_FOUND)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn report(args: &Args, result: &CommandResult) -> ExitCode {
    let mut stdout = std::io::stdout();
    let written = match args.mode {
        Mode::Full => write!(stdout, "{}", result),
        Mode::Status => writeln!(stdout, "{}", result.exit_status()),
        Mode::Output => stdout.write_all(result.stdout()),
    };
    if let Err(e) = written.and_then(|_| stdout.flush()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match args.mode {
        Mode::Output => ExitCode::SUCCESS,
        Mode::Full | Mode::Status => ExitCode::from(status_byte(result.exit_status())),
    }
}

/// Map an exit status to a shell-style exit byte (signals become 128 + n).
fn status_byte(status: i32) -> u8 {
    if status < 0 {
        (128 + status.unsigned_abs()).min(255) as u8
    } else {
        status.clamp(0, 255) as u8
    }
}
