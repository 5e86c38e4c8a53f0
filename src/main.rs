#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sessiond::{gateway, Config};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `sessiond` - login sessions with idle eviction.
#[derive(Parser, Debug)]
#[command(name = "sessiond")]
#[command(version)]
#[command(about = "Tracks login sessions and evicts idle ones.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and the eviction sweeper
    #[command(long_about = "\
Start the HTTP gateway and the eviction sweeper.

Serves /login, /logout, /update, /status, /sessions and /welcome. \
Bind address defaults to the values in your config file \
(gateway.host / gateway.port).

Examples:
  sessiond serve                  # use config defaults
  sessiond serve -p 8080          # listen on port 8080
  sessiond serve --host 0.0.0.0   # bind to all interfaces
  sessiond serve -p 0             # random available port")]
    Serve {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show the effective configuration
    Status,

    /// Manage configuration
    #[command(long_about = "\
Manage sessiond configuration.

Use 'schema' to dump the JSON Schema for the config file, which \
documents every available key, type, and default value.

Examples:
  sessiond config schema              # print JSON Schema to stdout
  sessiond config schema > schema.json")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `sessiond`.

Examples:
  source <(sessiond completions bash)
  sessiond completions zsh > ~/.zfunc/_sessiond")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("SESSIOND_CONFIG_DIR", config_dir);
    }

    // Completions and schema output must stay stdout-only: no config, no logging.
    match &cli.command {
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout().lock();
            return write_shell_completion(*shell, &mut stdout);
        }
        Commands::Config {
            config_command: ConfigCommands::Schema,
        } => {
            let schema = schemars::schema_for!(Config);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Completions { .. } | Commands::Config { .. } => unreachable!(),

        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting sessiond gateway on {host} (random port)");
            } else {
                info!("Starting sessiond gateway on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Status => {
            print_status(&config);
            Ok(())
        }
    }
}

fn print_status(config: &Config) {
    println!("sessiond Status");
    println!();
    println!("Version:        {}", env!("CARGO_PKG_VERSION"));
    println!("Config:         {}", config.config_path.display());
    println!();
    println!(
        "Gateway:        {}:{} (timeout {}s, body limit {} bytes)",
        config.gateway.host,
        config.gateway.port,
        config.gateway.request_timeout_secs,
        config.gateway.max_body_bytes
    );
    println!(
        "Idle timeout:   {}s (swept every {}s)",
        config.sessions.idle_timeout_secs, config.sessions.sweep_interval_secs
    );
    println!(
        "Server network: {}",
        if config.sessions.has_static_network() {
            format!(
                "static ip={} mac={}",
                config.sessions.server_ip.as_deref().unwrap_or("-"),
                config.sessions.server_mac.as_deref().unwrap_or("-")
            )
        } else {
            "probed at startup".to_string()
        }
    );
    println!("Display tz:     {}", config.display.timezone);
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
