//! notifyd-send - show a notification through a running notifyd
//!
//! ```bash
//! notifyd-send "Build" "Running tests"
//! id=$(notifyd-send "Build" "Running tests" --expire-time 0)
//! notifyd-send "Build" "Failed" --replace-id "$id"
//! ```
//!
//! Prints the id the daemon assigned (or kept, on replace).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use notifyd_core::{default_socket_path, NotifyRequest, ServiceCall, ServiceClient, ServiceReply};

/// Send a notification to notifyd
#[derive(Parser, Debug)]
#[command(name = "notifyd-send")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Title line
    summary: String,

    /// Body text
    body: Option<String>,

    /// Sending application name
    #[arg(short = 'a', long, default_value = "notifyd-send")]
    app_name: String,

    /// Id of a live notification to replace
    #[arg(short = 'r', long, default_value_t = 0)]
    replace_id: u32,

    /// Timeout in milliseconds; 0 never expires, negative uses the daemon default
    #[arg(short = 't', long, default_value_t = -1, allow_negative_numbers = true)]
    expire_time: i32,

    /// Daemon socket path
    #[arg(short = 's', long, env = "NOTIFYD_SOCKET", value_name = "PATH")]
    socket_path: Option<PathBuf>,
}

impl Args {
    fn into_request(self) -> NotifyRequest {
        NotifyRequest {
            app_name: self.app_name,
            replaces_id: self.replace_id,
            body: self.body,
            expire_timeout: self.expire_time,
            ..NotifyRequest::new(self.summary)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let socket_path = args.socket_path.clone().unwrap_or_else(default_socket_path);

    let mut client = ServiceClient::connect(&socket_path)
        .await
        .with_context(|| format!("Is notifyd running? No daemon at {}", socket_path.display()))?;

    let reply = client
        .call(&ServiceCall::Notify(args.into_request()))
        .await
        .context("Notify call failed")?;

    match reply {
        ServiceReply::Notified { id } => {
            println!("{id}");
            Ok(())
        }
        ServiceReply::Error { kind, message } => anyhow::bail!("notifyd refused ({kind}): {message}"),
        other => anyhow::bail!("Unexpected reply: {other:?}"),
    }
}
