//! Remote-desktop hand-off: write a `.rdp` file and open it with the local
//! remote-desktop client.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_SCREEN_WIDTH: u64 = 1024;
pub const DEFAULT_SCREEN_HEIGHT: u64 = 768;

/// Connection settings written to the `.rdp` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdpFile {
    /// `host:port` of the tunnel's public end.
    pub address: String,
    pub screen_width: u64,
    pub screen_height: u64,
    pub user_name: String,
}

impl RdpFile {
    /// Contents in the `key:type:value` line format.
    pub fn render(&self) -> String {
        let mut lines = vec![format!("full address:s:{}", self.address)];
        if !self.user_name.is_empty() {
            lines.push(format!("username:s:{}", self.user_name));
        }
        lines.extend([
            format!("desktopwidth:i:{}", self.screen_width),
            format!("desktopheight:i:{}", self.screen_height),
            "screen mode id:i:1".to_string(),
            "session bpp:i:32".to_string(),
            "prompt for credentials:i:1".to_string(),
            "authentication level:i:2".to_string(),
        ]);
        let mut out = lines.join("\r\n");
        out.push_str("\r\n");
        out
    }
}

#[async_trait]
pub trait RdpLauncher: Send + Sync {
    async fn launch(&self, file: &RdpFile) -> Result<()>;
}

/// Maps the `.rdp` file path to the program and arguments that open it.
pub type CommandProvider = Box<dyn Fn(&Path) -> (String, Vec<String>) + Send + Sync>;

/// `open` on macOS, `mstsc` on Windows, `xfreerdp` elsewhere.
pub fn default_command_provider() -> CommandProvider {
    Box::new(|path: &Path| {
        let path = path.display().to_string();
        if cfg!(target_os = "macos") {
            ("open".to_string(), vec![path])
        } else if cfg!(windows) {
            ("mstsc".to_string(), vec![path])
        } else {
            ("xfreerdp".to_string(), vec![path])
        }
    })
}

/// Writes the file to a temporary location, runs the client, and copies the
/// client's stdout to `out`. The file is removed afterwards.
pub struct RdpExecutor<W> {
    command_provider: CommandProvider,
    out: Mutex<W>,
}

impl<W: Write + Send> RdpExecutor<W> {
    pub fn new(command_provider: CommandProvider, out: W) -> Self {
        Self {
            command_provider,
            out: Mutex::new(out),
        }
    }

    pub fn into_output(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl<W: Write + Send> RdpLauncher for RdpExecutor<W> {
    async fn launch(&self, file: &RdpFile) -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix("rportcli-")
            .suffix(".rdp")
            .tempfile()?;
        tmp.write_all(file.render().as_bytes())?;
        tmp.flush()?;
        debug!("wrote {}", tmp.path().display());

        let (program, args) = (self.command_provider)(tmp.path());
        info!("starting {program} {}", args.join(" "));
        let output = Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::CompanionProcessFailure(format!("failed to start {program}: {e}")))?;

        {
            let mut out = self
                .out
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            out.write_all(&output.stdout)?;
            out.flush()?;
        }

        let path = tmp.path().to_path_buf();
        tmp.close()?;
        debug!("removed {}", path.display());

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::CompanionProcessFailure(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}
