mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use hookmail_core::{ConfigResolver, Configuration};
use hookmail_notify::{NotificationDispatcher, NotificationRequest, SendAttemptResult, TemplateStore};

use crate::cli::{CliArgs, Command};
use crate::config::resolve_template_dir;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = ConfigResolver::from_process()
        .and_then(|resolver| resolver.resolve())
        .context("failed to load configuration")?;
    config.log_summary();

    let command = args.command;
    if let Command::Config = command {
        println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
        return Ok(());
    }

    let template_dir = resolve_template_dir(&config, args.templates.as_deref())?;
    let dispatcher = NotificationDispatcher::from_config(&config, &TemplateStore::new(template_dir))
        .context("failed to set up mail transport")?;

    let success = match command {
        Command::Send(send) => {
            let request = send.into_request()?;
            report(dispatcher.dispatch(&request).await)?
        }
        Command::Custom { subject, message } => {
            report(dispatcher.send_custom(&subject, &message).await)?
        }
        Command::Test => {
            let request = NotificationRequest::new("Info", "test-session")
                .with_message("This is a test email from hookmail.")
                .with_details("If you received this, email delivery works.");
            report(dispatcher.dispatch(&request).await)?
        }
        Command::Verify => verify(&dispatcher, &config).await?,
        Command::Config => true,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn report(result: SendAttemptResult) -> Result<bool> {
    if let Some(err) = &result.error {
        error!(attempt = result.attempt, error = %err, "email not sent");
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.success)
}

async fn verify(dispatcher: &NotificationDispatcher, config: &Configuration) -> Result<bool> {
    let success = dispatcher.verify().await;
    let output = serde_json::json!({
        "success": success,
        "config": config.redacted_summary(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(success)
}
