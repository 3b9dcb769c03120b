mod commands;

use clap::{Parser, Subcommand};
use commands::exit_code_for;
use fixstate_schema::{DEFAULT_CONFIG_FILE, DEFAULT_PROFILE, DEFAULT_SCOPE};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "fixstate",
    version,
    about = "Save and restore the state of integration-test fixture environments."
)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, global = true)]
    trace: bool,

    /// Output results as structured JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot the database, var and media of the configured environment.
    SaveState {
        /// Profile config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Profile naming the environment.
        #[arg(short = 'p', long = "config-profile", default_value = DEFAULT_PROFILE)]
        profile: String,
        /// State archive to write (default: states/<timestamp>.state).
        #[arg(short = 's', long)]
        name: Option<PathBuf>,
    },
    /// Replace the environment's state with a saved archive.
    RestoreState {
        /// State archive to restore.
        name: PathBuf,
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        #[arg(short = 'p', long = "config-profile", default_value = DEFAULT_PROFILE)]
        profile: String,
    },
    /// Select the store the environment runs.
    Init {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        #[arg(short = 'p', long = "config-profile", default_value = DEFAULT_PROFILE)]
        profile: String,
        /// Store (or website) code; empty selects the default store.
        #[arg(long, default_value = "")]
        store: String,
        /// Run scope: store or website.
        #[arg(long, default_value = DEFAULT_SCOPE)]
        scope: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FIXSTATE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let result = match cli.command {
        Commands::SaveState {
            config,
            profile,
            name,
        } => commands::save_state::run(&config, &profile, name.as_deref(), json_output),
        Commands::RestoreState {
            name,
            config,
            profile,
        } => commands::restore_state::run(&name, &config, &profile, json_output),
        Commands::Init {
            config,
            profile,
            store,
            scope,
        } => commands::init::run(&config, &profile, &store, &scope, json_output),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            let label = console::Style::new().red().bold().for_stderr().apply_to("error:");
            eprintln!("{label} {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
