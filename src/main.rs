use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use heystack_provision::commands::{self, ConfigureArgs, KeySource};
use heystack_provision::config::AppConfig;
use heystack_provision::core::bluetooth::{BluestCentral, PromptResolver};
use heystack_provision::keys::KeyFormat;
use heystack_provision::logging;
use log::{error, info};

#[derive(Parser)]
#[command(
    name = "heystack-provision",
    version,
    about = "Provision HeyStack trackers with public keys over Bluetooth LE"
)]
struct Cli {
    /// Config file to use instead of the per-user default
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More output; repeat for trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List trackers advertising in configuration mode
    Scan {
        /// Scan duration in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Write a key file to a tracker
    Configure {
        /// Binary (28-byte records) or hex text key file
        keyfile: PathBuf,
        /// Connect to this address and skip scanning
        #[arg(short, long)]
        address: Option<String>,
        /// Scan duration in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Key file format, guessed from the extension when omitted
        #[arg(short, long, value_enum)]
        format: Option<KeyFormat>,
    },
    /// Show the MAC address and payload a tracker should advertise for a key
    CheckKey {
        /// A .keys file or a directory containing one
        #[arg(default_value = "output")]
        path: PathBuf,
        /// Base64 advertisement key, instead of reading a .keys file
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default config
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(logging::level_for_verbosity(cli.verbose, cli.quiet)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.or_else(AppConfig::default_path);
    let config = match &config_path {
        Some(path) => AppConfig::load_config(path).await?,
        None => AppConfig::default(),
    };

    match cli.command {
        Command::Scan { timeout } => {
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.scan.timeout());
            let central = BluestCentral::new()
                .await
                .context("Bluetooth adapter unavailable")?;
            commands::scan(central, &config, timeout).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Configure {
            keyfile,
            address,
            timeout,
            format,
        } => {
            let args = ConfigureArgs {
                key_file: keyfile,
                format,
                address,
                scan_timeout: timeout
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.scan.timeout()),
            };
            let batch = commands::load_keys(&args).await?;

            let central = BluestCentral::new()
                .await
                .context("Bluetooth adapter unavailable")?;
            let outcome = commands::configure(central, &config, &args, &batch, PromptResolver).await?;

            if outcome.is_success() {
                info!("Configuration complete");
                Ok(ExitCode::SUCCESS)
            } else {
                error!("No keys were written");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::CheckKey { path, key } => {
            let source = match key {
                Some(encoded) => KeySource::Base64(encoded),
                None => KeySource::Path(path),
            };
            commands::check_key(&source).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Init { force } => {
                    let path = config_path
                        .context("No config directory available; pass --config")?;
                    commands::config_init(&path, force).await?;
                }
                ConfigAction::Show => commands::config_show(&config)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
