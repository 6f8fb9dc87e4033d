//! Rendering of API values for the terminal.
//!
//! Every value printed by rportcli implements [`Renderable`]: it serializes
//! for the machine-readable formats and knows its own human form (tables via
//! `tabled`).

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::{Error, Result};
use crate::models::{Client, Job, Me, StatusReport, Tunnel, TunnelCreated};

/// Output format selected with `-o` / `-j`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Human,
    Json,
    JsonPretty,
    Yaml,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "" => Ok(Format::Human),
            "json" => Ok(Format::Json),
            "json-pretty" => Ok(Format::JsonPretty),
            "yaml" => Ok(Format::Yaml),
            other => Err(Error::InvalidInput(format!(
                "unknown output format '{other}', expected human, json, json-pretty or yaml"
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Human => "human",
            Format::Json => "json",
            Format::JsonPretty => "json-pretty",
            Format::Yaml => "yaml",
        })
    }
}

/// A value that can be printed in any [`Format`].
pub trait Renderable: Serialize {
    /// Human-readable form, without a trailing newline.
    fn human(&self) -> String;
}

/// Writes [`Renderable`] values in one fixed format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    format: Format,
}

impl Renderer {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn render<T, W>(&self, out: &mut W, value: &T) -> Result<()>
    where
        T: Renderable + ?Sized,
        W: Write + ?Sized,
    {
        match self.format {
            Format::Human => writeln!(out, "{}", value.human())?,
            Format::Json => {
                serde_json::to_writer(&mut *out, value)?;
                writeln!(out)?;
            }
            Format::JsonPretty => {
                serde_json::to_writer_pretty(&mut *out, value)?;
                writeln!(out)?;
            }
            Format::Yaml => serde_yaml::to_writer(&mut *out, value)?,
        }
        out.flush()?;
        Ok(())
    }
}

/// Two-column KEY/VALUE table under a title line.
fn key_value_table(title: &str, rows: &[(&str, String)]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["KEY", "VALUE"]);
    for (key, value) in rows {
        builder.push_record([(*key).to_string(), value.clone()]);
    }
    format!(
        "{title}\n{}",
        builder.build().with(Style::rounded()).to_string()
    )
}

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "NUM TUNNELS")]
    num_tunnels: usize,
    #[tabled(rename = "REMOTE ADDRESS")]
    address: String,
    #[tabled(rename = "HOSTNAME")]
    hostname: String,
    #[tabled(rename = "OS KERNEL")]
    os_kernel: String,
    #[tabled(rename = "STATE")]
    connection_state: String,
}

impl Renderable for Vec<Client> {
    fn human(&self) -> String {
        if self.is_empty() {
            return "No clients found".to_string();
        }
        let rows: Vec<ClientRow> = self
            .iter()
            .map(|c| ClientRow {
                id: c.id.clone(),
                name: c.name.clone(),
                num_tunnels: c.tunnels.len(),
                address: c.address.clone(),
                hostname: c.hostname.clone(),
                os_kernel: c.os_kernel.clone(),
                connection_state: c.connection_state.clone(),
            })
            .collect();
        format!("Clients\n{}", Table::new(rows).with(Style::rounded()))
    }
}

impl Renderable for Client {
    fn human(&self) -> String {
        key_value_table(
            &format!("Client [{}]", self.id),
            &[
                ("ID", self.id.clone()),
                ("Name", self.name.clone()),
                ("Os", self.os.clone()),
                ("OsArch", self.os_arch.clone()),
                ("OsFamily", self.os_family.clone()),
                ("OsKernel", self.os_kernel.clone()),
                ("Hostname", self.hostname.clone()),
                ("Ipv4", self.ipv4.join(", ")),
                ("Ipv6", self.ipv6.join(", ")),
                ("Tags", self.tags.join(", ")),
                ("Version", self.version.clone()),
                ("Address", self.address.clone()),
                ("Timezone", self.timezone.clone()),
                ("State", self.connection_state.clone()),
                ("Tunnels", self.tunnels.len().to_string()),
            ],
        )
    }
}

#[derive(Tabled)]
struct TunnelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "CLIENT ID")]
    client_id: String,
    #[tabled(rename = "CLIENT NAME")]
    client_name: String,
    #[tabled(rename = "LOCAL")]
    local: String,
    #[tabled(rename = "REMOTE")]
    remote: String,
    #[tabled(rename = "SCHEME")]
    scheme: String,
    #[tabled(rename = "ACL")]
    acl: String,
}

fn host_port(host: &str, port: &str) -> String {
    match (host.is_empty(), port.is_empty()) {
        (_, true) => host.to_string(),
        (true, false) => port.to_string(),
        (false, false) => format!("{host}:{port}"),
    }
}

impl Renderable for Vec<Tunnel> {
    fn human(&self) -> String {
        if self.is_empty() {
            return "No tunnels found".to_string();
        }
        let rows: Vec<TunnelRow> = self
            .iter()
            .map(|t| TunnelRow {
                id: t.id.clone(),
                client_id: t.client_id.clone(),
                client_name: t.client_name.clone(),
                local: host_port(&t.lhost, &t.lport),
                remote: host_port(&t.rhost, &t.rport),
                scheme: t.scheme.clone(),
                acl: t.acl.clone(),
            })
            .collect();
        format!("Tunnels\n{}", Table::new(rows).with(Style::rounded()))
    }
}

impl Renderable for TunnelCreated {
    fn human(&self) -> String {
        let t = &self.tunnel;
        let mut rows = vec![
            ("ID", t.id.clone()),
            ("CLIENT ID", t.client_id.clone()),
            ("LOCAL", host_port(&t.lhost, &t.lport)),
            ("REMOTE", host_port(&t.rhost, &t.rport)),
            ("SCHEME", t.scheme.clone()),
            ("ACL", t.acl.clone()),
        ];
        if let Some(usage) = &self.usage {
            rows.push(("USAGE", usage.clone()));
        }
        key_value_table("Tunnel", &rows)
    }
}

impl Renderable for StatusReport {
    fn human(&self) -> String {
        format!("Status: {}", self.status)
    }
}

impl Renderable for Me {
    fn human(&self) -> String {
        key_value_table(
            "About me",
            &[
                ("Username", self.username.clone()),
                ("Groups", self.groups.join(", ")),
                ("Two FA send to", self.two_fa_send_to.clone()),
            ],
        )
    }
}

impl Renderable for Job {
    fn human(&self) -> String {
        let mut rows = vec![
            ("Client ID", self.client_id.clone()),
            ("Client Name", self.client_name.clone()),
            ("Status", self.status.clone()),
            ("Job ID", self.jid.clone()),
            ("Finished at", self.finished_at.clone().unwrap_or_default()),
        ];
        if !self.error.is_empty() {
            rows.push(("Error", self.error.clone()));
        }
        let mut out = key_value_table("Job", &rows);
        if let Some(result) = &self.result {
            if !result.stdout.is_empty() {
                out.push_str("\nstdout:\n");
                out.push_str(result.stdout.trim_end());
            }
            if !result.stderr.is_empty() {
                out.push_str("\nstderr:\n");
                out.push_str(result.stderr.trim_end());
            }
        }
        out
    }
}
