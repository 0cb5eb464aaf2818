use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hookmail_notify::NotificationRequest;

/// Email notifications for coding-assistant hook events.
///
/// Settings come from the environment, the project's `.hookmail.env` and
/// the user-global `hookmail.env`, in that order.
#[derive(Parser, Debug)]
#[command(name = "hookmail", version, about = "Email notifications for hook events")]
pub struct CliArgs {
    /// Directory holding templates.<lang>.yaml (overrides TEMPLATE_DIR)
    #[arg(long, global = true, env = "HOOKMAIL_TEMPLATES")]
    pub templates: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a notification for a hook event
    Send(SendArgs),

    /// Send an email with a custom subject and message
    Custom {
        #[arg(short, long)]
        subject: String,

        #[arg(short, long)]
        message: String,
    },

    /// Send a test notification
    Test,

    /// Verify the SMTP connection
    Verify,

    /// Show the resolved configuration (password hidden)
    Config,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Event type (Notification, Stop, SubagentStop, ...)
    #[arg(short, long, default_value = "Notification")]
    pub event: String,

    /// Session ID
    #[arg(short, long, default_value = "unknown")]
    pub session: String,

    /// Working directory the event happened in
    #[arg(long)]
    pub cwd: Option<String>,

    /// Message shown in the body
    #[arg(long)]
    pub message: Option<String>,

    /// Extra details appended to the body
    #[arg(long)]
    pub details: Option<String>,

    /// Read the hook's JSON payload from stdin
    #[arg(long)]
    pub stdin: bool,
}

impl SendArgs {
    /// Build the request from stdin (when `--stdin`) or from the flags.
    /// Flags fill whatever the payload leaves out.
    pub fn into_request(self) -> Result<NotificationRequest> {
        if !self.stdin {
            return Ok(self.apply_to(NotificationRequest::new(&self.event, &self.session)));
        }

        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read hook payload from stdin")?;
        let request = parse_payload(&raw)?;
        Ok(self.apply_to(request))
    }

    fn apply_to(&self, mut request: NotificationRequest) -> NotificationRequest {
        if request.session_id.is_empty() {
            request.session_id = self.session.clone();
        }
        request.cwd = request.cwd.or_else(|| self.cwd.clone());
        request.message = request.message.or_else(|| self.message.clone());
        request.details = request.details.or_else(|| self.details.clone());
        request
    }
}

pub fn parse_payload(raw: &str) -> Result<NotificationRequest> {
    serde_json::from_str(raw).context("hook payload is not valid JSON")
}
