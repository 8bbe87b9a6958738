use std::process::ExitCode;

use log::error;
use release_installer::install::{Cli, runners};

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(runners::run(&cli));
    if let Err(e) = &result {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
    }
    ExitCode::from(runners::exit_code(&result))
}
