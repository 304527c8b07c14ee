use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use barkeep::{
    BarError, BarRuntime, BlockRegistry, Config, ExitReason, LogLevel, Logger, ReaderOptions,
    RuntimeConfig, SharedConfig, StdioDriver, StderrSink, max_custom_signal,
};

const NO_INIT_FLAG: &str = "--no-init";

/// Status line generator for i3bar and swaybar.
#[derive(Debug, Parser)]
#[command(name = "barkeep", version, about)]
struct Cli {
    /// Configuration file; searched in $XDG_CONFIG_HOME/barkeep and ~/.config/barkeep.
    config: Option<PathBuf>,
    /// Exit with an error instead of showing a broken configuration on the bar.
    #[arg(long)]
    exit_on_error: bool,
    /// Ask the bar not to pause this process while it is hidden.
    #[arg(long)]
    never_pause: bool,
    /// Continue an existing protocol stream; set when restarting in place.
    #[arg(long, hide = true)]
    no_init: bool,
    /// Minimum log level; overrides the configuration file.
    #[arg(long)]
    log_level: Option<LogLevel>,
    /// Log file; overrides the configuration file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("barkeep: cannot start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(run(&cli));
    match outcome {
        Ok(ExitReason::Shutdown) => ExitCode::SUCCESS,
        Ok(ExitReason::Restart) => {
            runtime.shutdown_background();
            restart()
        }
        // The bar went away; nothing left to report to.
        Err(BarError::OutputClosed(_)) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("barkeep: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> barkeep::Result<ExitReason> {
    let loaded = Config::load(cli.config.as_deref());
    let (config, problem) = match loaded {
        Ok((config, _path)) => (Some(config), None),
        Err(err) if cli.exit_on_error => return Err(err.into()),
        Err(err) => (None, Some(err.to_string())),
    };

    let mut log = config.as_ref().map(|config| config.log.clone()).unwrap_or_default();
    if let Some(level) = cli.log_level {
        log.level = level;
    }
    if let Some(file) = &cli.log_file {
        log.file = Some(file.clone());
    }
    let logger = match log.build_logger() {
        Ok(logger) => logger,
        Err(err) => {
            let fallback = Logger::new(StderrSink).with_level(log.level);
            let _ = fallback.log(LogLevel::Warn, "bar::main", &format!("log file unavailable: {err}"));
            fallback
        }
    };

    let mut runtime_config = RuntimeConfig {
        logger: logger.clone(),
        never_pause: cli.never_pause,
        write_header: !cli.no_init,
        ..RuntimeConfig::default()
    };
    if let Some(config) = &config {
        runtime_config.shutdown_grace = config.runtime.shutdown_grace();
        runtime_config.metrics_interval = config.runtime.metrics_interval();
    }

    let mut runtime = BarRuntime::new(tokio::io::stdout(), runtime_config);
    let mut custom_signals = Vec::new();
    let mut reader = ReaderOptions::default();

    match (config, problem) {
        (Some(config), _) => {
            reader.invert_scrolling = config.invert_scrolling;
            let shared = config.shared();
            match config.block_specs(max_custom_signal()) {
                Ok(specs) => {
                    custom_signals.extend(specs.iter().filter_map(|spec| spec.signal));
                    runtime.spawn_configured(&BlockRegistry::with_builtin(), &shared, specs);
                }
                Err(err) if cli.exit_on_error => return Err(err.into()),
                Err(err) => {
                    runtime.push_failed_block("config", shared, &err.to_string());
                }
            }
        }
        (None, problem) => {
            let message = problem.unwrap_or_default();
            runtime.push_failed_block("config", SharedConfig::default(), &message);
        }
    }

    StdioDriver::new(runtime, tokio::io::stdin(), logger)
        .reader_options(reader)
        .with_signals(custom_signals)
        .run()
        .await
}

/// Replace this process with a fresh copy that continues the same stream.
fn restart() -> ExitCode {
    let mut args: Vec<OsString> = std::env::args_os()
        .filter(|arg| arg.as_os_str() != NO_INIT_FLAG)
        .collect();
    args.push(OsString::from(NO_INIT_FLAG));

    let program = std::env::current_exe()
        .map(PathBuf::into_os_string)
        .ok()
        .or_else(|| args.first().cloned());
    let Some(program) = program.and_then(|program| to_cstring(&program)) else {
        eprintln!("barkeep: cannot determine executable to restart");
        return ExitCode::FAILURE;
    };
    let Some(argv) = args.iter().map(to_cstring).collect::<Option<Vec<_>>>() else {
        eprintln!("barkeep: argument contains a NUL byte");
        return ExitCode::FAILURE;
    };

    match nix::unistd::execvp(&program, &argv) {
        Ok(never) => match never {},
        Err(err) => {
            eprintln!("barkeep: restart failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn to_cstring(arg: &OsString) -> Option<CString> {
    CString::new(arg.as_bytes()).ok()
}
