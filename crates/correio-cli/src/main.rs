//! Correio CLI - Single entrypoint for the email service
//!
//! This application wires the library crates together and exposes the
//! server plus a handful of operator commands.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ResetPasswordCommand, ServeCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CORREIO_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full, json
    #[arg(
        long,
        default_value = "compact",
        env = "CORREIO_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Reset admin user password
    ResetAdminPassword(ResetPasswordCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();

    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .expect("Invalid RUST_LOG environment variable")
    } else {
        // All correio crates at the requested level, noisy dependencies at warn
        tracing_subscriber::EnvFilter::new(format!(
            "correio_cli={level},\
             correio_core={level},\
             correio_auth={level},\
             correio_email={level},\
             correio_config={level},\
             correio_entities={level},\
             correio_database={level},\
             correio_migrations={level},\
             sqlx=warn,\
             sea_orm=warn,\
             h2=warn,\
             tower=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    // Commands are synchronous and own their runtimes
    match cli.command {
        Commands::Serve(serve_cmd) => serve_cmd.execute(),
        Commands::ResetAdminPassword(reset_cmd) => reset_cmd.execute(),
    }
}
