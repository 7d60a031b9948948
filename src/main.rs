#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pda_agent::config::CONFIG_DIR_ENV;
use pda_agent::{agent, ethics, gateway, providers, Config};

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

/// `pda-agent` - a PDA-aligned assistant with wellbeing limits.
#[derive(Parser, Debug)]
#[command(name = "pda-agent")]
#[command(version)]
#[command(
    about = "A PDA-aligned chat assistant with a temporal wellbeing guard.",
    long_about = None
)]
struct Cli {
    /// Directory holding config.toml (default: ~/.pda-agent)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the assistant in the terminal
    #[command(long_about = "\
Chat with the assistant in the terminal.

Reads one message per line and prints the reply prefixed with 'PDA: '. \
An empty line ends the session. Wellbeing limits and ethics notes apply \
exactly as they do over HTTP.

Examples:
  pda-agent agent                              # interactive session
  pda-agent agent -m \"Hoe plan ik mijn dag?\"   # single message
  pda-agent agent --provider openai --model gpt-4o-mini")]
    Agent {
        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,

        /// Session id; wellbeing limits are tracked per session
        #[arg(long, default_value = "cli")]
        session: String,

        /// Provider to use (ollama, openai, custom:<URL>)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Temperature (0.0 - 2.0); defaults to config default_temperature
        #[arg(short, long, value_parser = parse_temperature)]
        temperature: Option<f64>,
    },

    /// Start the OpenAI-compatible HTTP gateway
    #[command(long_about = "\
Start the OpenAI-compatible HTTP gateway.

Serves POST /v1/chat/completions, GET /v1/models, GET /health and \
GET /metrics. Bind address defaults to the values in your config file \
(gateway.host / gateway.port).

Examples:
  pda-agent gateway                  # use config defaults
  pda-agent gateway -p 8080          # listen on port 8080
  pda-agent gateway --host 127.0.0.1 # local only
  pda-agent gateway -p 0             # random available port")]
    Gateway {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show the effective configuration
    Status,

    /// List supported model providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var(CONFIG_DIR_ENV, config_dir);
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Agent {
            message,
            session,
            provider,
            model,
            temperature,
        } => agent::run(config, message, session, provider, model, temperature).await,

        Commands::Gateway { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting pda-agent gateway on {host} (random port)");
            } else {
                info!("Starting pda-agent gateway on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Status => {
            print_status(&config);
            Ok(())
        }

        Commands::Providers => {
            let providers = providers::list_providers();
            let current = config.default_provider.trim().to_ascii_lowercase();
            println!("Supported providers ({} total):\n", providers.len());
            println!("  ID (use in config)  DESCRIPTION");
            println!("  ------------------- -----------");
            for p in &providers {
                let marker = if p.name == current { " (active)" } else { "" };
                let local_tag = if p.local { " [local]" } else { "" };
                println!("  {:<19} {}{}{}", p.name, p.display_name, local_tag, marker);
            }
            println!("\n  custom:<URL>        Any OpenAI-compatible endpoint");
            Ok(())
        }
    }
}

fn print_status(config: &Config) {
    let w = &config.wellbeing;
    let ethics = ethics::create_ethics_filter(&config.ethics);

    println!("pda-agent status");
    println!();
    println!("Config:       {}", config.config_path.display());
    println!("Provider:     {}", config.default_provider);
    println!("Model:        {}", config.default_model);
    println!("Temperature:  {}", config.default_temperature);
    println!(
        "API key:      {}",
        if config.api_key.is_some() { "set" } else { "not set" }
    );
    println!("Timeout:      {}s", config.provider.timeout_secs);
    println!();
    println!("Wellbeing:");
    println!("  Max session:     {} min", w.max_session_minutes);
    println!("  Max messages:    {}", w.max_messages_per_session);
    println!(
        "  Night limit:     {} ({} - {})",
        if w.enforce_night_limit { "on" } else { "off" },
        w.night_start,
        w.night_end
    );
    println!(
        "  Meals:           {} / {} / {} (+/- {} min)",
        w.breakfast_time, w.lunch_time, w.dinner_time, w.meal_window_minutes
    );
    println!("  Screen break:    every {} min", w.break_interval_minutes);
    println!();
    println!(
        "Ethics:         {}",
        if ethics.is_empty() {
            "off".to_string()
        } else {
            ethics.categories().join(", ")
        }
    );
    println!();
    println!("Sessions:");
    println!("  Max live:        {}", config.sessions.max_sessions);
    println!("  Idle timeout:    {} min", config.sessions.idle_timeout_minutes);
    println!();
    println!(
        "Gateway:        {}:{} (model id '{}')",
        config.gateway.host, config.gateway.port, config.gateway.model_id
    );
}
