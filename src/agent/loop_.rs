use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::observability::Metrics;
use crate::turn::{create_turn_dispatcher, TurnDispatcher};

pub const USER_PROMPT: &str = "You: ";
pub const REPLY_PREFIX: &str = "PDA: ";

/// Entry point for `pda-agent agent`.
///
/// With `message` set, runs one turn and prints the reply. Otherwise reads
/// lines from stdin until an empty line or EOF.
pub async fn run(
    mut config: Config,
    message: Option<String>,
    session_id: String,
    provider_override: Option<String>,
    model_override: Option<String>,
    temperature: Option<f64>,
) -> Result<()> {
    if let Some(provider) = provider_override {
        config.default_provider = provider;
    }
    if let Some(model) = model_override {
        config.default_model = model;
    }
    if let Some(temperature) = temperature {
        config.default_temperature = temperature;
    }
    config.validate()?;

    let metrics = Arc::new(Metrics::new()?);
    let dispatcher = create_turn_dispatcher(&config, metrics)?;

    if let Some(message) = message {
        let outcome = dispatcher.handle(&session_id, &message).await?;
        println!("{REPLY_PREFIX}{}", outcome.reply);
        return Ok(());
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    run_interactive(&dispatcher, &session_id, stdin, &mut stdout, &mut stderr).await
}

/// Line-based chat loop over any reader and writer.
///
/// Replies go to `out`. Model failures go to `err` and the loop continues;
/// the turn is not recorded in history.
pub async fn run_interactive<R, W, E>(
    dispatcher: &TurnDispatcher,
    session_id: &str,
    reader: R,
    out: &mut W,
    err: &mut E,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    E: Write,
{
    let mut lines = reader.lines();
    loop {
        write!(out, "{USER_PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            break;
        }

        match dispatcher.handle(session_id, input).await {
            Ok(outcome) => writeln!(out, "{REPLY_PREFIX}{}", outcome.reply)?,
            Err(e) => writeln!(err, "error: {e}")?,
        }
    }
    writeln!(out)?;
    Ok(())
}
