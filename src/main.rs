use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use bomgraph::cli::commands::execute_command;
use bomgraph::cli::{output, Cli, CliError};
use bomgraph::config::Settings;
use bomgraph::exitcode;
use clap::{CommandFactory, Parser};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

fn main() {
    let cli = Cli::parse();

    if cli.info {
        if let Some(a) = Cli::command().get_author() {
            println!("AUTHOR: {}", a)
        }
        if let Some(v) = Cli::command().get_version() {
            println!("VERSION: {}", v)
        }
        if cli.command.is_none() {
            std::process::exit(exitcode::OK);
        }
    }

    let settings = match Settings::load() {
        Ok(settings) => settings.with_overrides(cli.builtin, cli.input.clone(), cli.log.clone()),
        Err(e) => {
            let e = CliError::from(e);
            output::error(&e);
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = setup_logging(cli.debug, settings.log_file.as_deref()) {
        output::error(&format!("cannot open log file: {}", e));
        std::process::exit(exitcode::CANTCREAT);
    }

    if let Err(e) = execute_command(&cli, &settings) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        3 => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -d -d -d");
            LevelFilter::TRACE
        }
    };

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Mutex::new(File::create(path)?))
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter),
        ),
        None => None,
    };
    let stderr_layer = file_layer.is_none().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(filter)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
    Ok(())
}
