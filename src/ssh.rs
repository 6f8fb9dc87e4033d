//! Foreground ssh session over a freshly created tunnel.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_SSH_PROGRAM: &str = "ssh";

/// Runs a companion program to completion.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, args: &[String]) -> Result<()>;
}

/// Spawns `ssh` with inherited stdio and waits for it to exit.
pub struct SshLauncher {
    program: String,
}

impl SshLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SshLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_SSH_PROGRAM)
    }
}

#[async_trait]
impl Launcher for SshLauncher {
    async fn launch(&self, args: &[String]) -> Result<()> {
        info!("starting {} {}", self.program, args.join(" "));
        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                Error::CompanionProcessFailure(format!("failed to start {}: {e}", self.program))
            })?;
        debug!("{} exited with {status}", self.program);
        if status.success() {
            Ok(())
        } else {
            Err(Error::CompanionProcessFailure(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

/// `[host, "-p", lport, options...]`; the port pair is left out when the
/// server did not report a local port.
pub fn ssh_args(host: &str, lport: &str, options: &str) -> Vec<String> {
    let mut args = vec![host.to_string()];
    if !lport.is_empty() {
        args.push("-p".to_string());
        args.push(lport.to_string());
    }
    args.extend(options.split_whitespace().map(String::from));
    args
}
