//! Tunnel provisioner.
//!
//! Creating a tunnel runs these steps in order:
//!
//! 1. Resolve the client id (explicit id, or a unique name match).
//! 2. Derive the scheme from the remote port or the remote port from the
//!    scheme, whichever is missing.
//! 3. Default the ACL to the operator's public IP.
//! 4. Submit the request and render the created tunnel with a usage hint.
//! 5. Optionally hand off to ssh or the remote-desktop client.
//!
//! The ssh hand-off blocks until the session ends, then deletes the tunnel it
//! was created for.

use std::io::Write;
use std::sync::Arc;

use tracing::info;

use crate::client::{url_host, RportClient};
use crate::config::{self, ParameterBag};
use crate::error::{Error, Result};
use crate::ip::IpProvider;
use crate::models::{StatusReport, Tunnel, TunnelCreated};
use crate::output::Renderer;
use crate::rdp::{RdpFile, RdpLauncher, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};
use crate::search::Search;
use crate::ssh::{ssh_args, Launcher};

pub const LOCAL: &str = "local";
pub const REMOTE: &str = "remote";
pub const SCHEME: &str = "scheme";
pub const ACL: &str = "acl";
pub const CHECK_PORT: &str = "check_port";
pub const TUNNEL_ID: &str = "tunnel_id";
pub const LAUNCH_SSH: &str = "launch_ssh";
pub const LAUNCH_RDP: &str = "launch_rdp";
pub const RDP_USER: &str = "rdp_user";
pub const RDP_WIDTH: &str = "rdp_width";
pub const RDP_HEIGHT: &str = "rdp_height";

/// Well-known ports of the schemes rport knows about.
const SCHEME_PORTS: &[(&str, &str)] = &[
    ("ssh", "22"),
    ("rdp", "3389"),
    ("vnc", "5900"),
    ("http", "80"),
    ("https", "443"),
    ("ftp", "21"),
];

pub fn scheme_for_port(port: &str) -> Option<&'static str> {
    SCHEME_PORTS
        .iter()
        .find(|(_, p)| *p == port)
        .map(|(scheme, _)| *scheme)
}

pub fn port_for_scheme(scheme: &str) -> Option<&'static str> {
    SCHEME_PORTS
        .iter()
        .find(|(s, _)| *s == scheme)
        .map(|(_, port)| *port)
}

/// Port part of `host:port` or a bare port.
fn port_of(remote: &str) -> &str {
    remote.rsplit(':').next().unwrap_or(remote)
}

/// Parameters of `PUT /api/v1/clients/:id/tunnels`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelRequest {
    /// `None` lets the server pick a random local port.
    pub local: Option<String>,
    pub remote: String,
    pub scheme: String,
    pub acl: String,
    pub check_port: bool,
}

impl TunnelRequest {
    /// Build a request from user parameters, filling in the scheme or the
    /// remote port from each other. The ACL is left for the caller.
    pub fn derive(params: &ParameterBag) -> Result<Self> {
        let mut remote = params.read_string(REMOTE, "");
        let mut scheme = params.read_string(SCHEME, "");

        if scheme.is_empty() && !remote.is_empty() {
            scheme = scheme_for_port(port_of(&remote))
                .unwrap_or_default()
                .to_string();
        }
        if remote.is_empty() {
            if let Some(port) = port_for_scheme(&scheme) {
                remote = port.to_string();
            }
        }
        if remote.is_empty() {
            return Err(Error::InvalidInput("required option remote is empty".into()));
        }

        let local = Some(params.read_string(LOCAL, "")).filter(|l| !l.is_empty());
        Ok(Self {
            local,
            remote,
            scheme,
            acl: params.read_string(ACL, ""),
            check_port: params.read_bool(CHECK_PORT, true),
        })
    }

    /// Query string pairs in the order the server documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("acl", self.acl.clone()),
            ("check_port", if self.check_port { "1" } else { "0" }.to_string()),
        ];
        if let Some(local) = &self.local {
            pairs.push(("local", local.clone()));
        }
        pairs.push(("remote", self.remote.clone()));
        pairs.push(("scheme", self.scheme.clone()));
        pairs
    }
}

/// How to connect through a fresh tunnel, when the scheme has an obvious
/// client.
pub fn usage_hint(scheme: &str, host: &str, lport: &str) -> Option<String> {
    match scheme {
        "ssh" if lport.is_empty() => Some(format!("ssh {host} -l ${{USER}}")),
        "ssh" => Some(format!("ssh -p {lport} {host} -l ${{USER}}")),
        _ => None,
    }
}

/// Creates, deletes and lists tunnels.
pub struct TunnelController<W> {
    api: Arc<RportClient>,
    search: Search,
    ip_provider: Arc<dyn IpProvider>,
    ssh: Arc<dyn Launcher>,
    rdp: Arc<dyn RdpLauncher>,
    renderer: Renderer,
    out: W,
}

impl<W: Write> TunnelController<W> {
    pub fn new(
        api: Arc<RportClient>,
        search: Search,
        ip_provider: Arc<dyn IpProvider>,
        ssh: Arc<dyn Launcher>,
        rdp: Arc<dyn RdpLauncher>,
        renderer: Renderer,
        out: W,
    ) -> Self {
        Self {
            api,
            search,
            ip_provider,
            ssh,
            rdp,
            renderer,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Every tunnel of every client.
    pub async fn list(&mut self) -> Result<Vec<Tunnel>> {
        let tunnels: Vec<Tunnel> = self
            .api
            .clients()
            .await?
            .into_iter()
            .flat_map(|client| {
                let (id, name) = (client.id, client.name);
                client.tunnels.into_iter().map(move |mut t| {
                    t.client_id.clone_from(&id);
                    t.client_name.clone_from(&name);
                    t
                })
            })
            .collect();
        self.renderer.render(&mut self.out, &tunnels)?;
        Ok(tunnels)
    }

    pub async fn delete(&mut self, params: &ParameterBag) -> Result<()> {
        let client_id = self.search.resolve_client_id(params).await?;
        let tunnel_id = params.read_string(TUNNEL_ID, "");
        if tunnel_id.is_empty() {
            return Err(Error::InvalidInput(
                "required option tunnel-id is empty".into(),
            ));
        }
        self.delete_tunnel(&client_id, &tunnel_id).await
    }

    async fn delete_tunnel(&mut self, client_id: &str, tunnel_id: &str) -> Result<()> {
        self.api.delete_tunnel(client_id, tunnel_id).await?;
        info!("deleted tunnel {tunnel_id} of client {client_id}");
        self.renderer.render(&mut self.out, &StatusReport::ok())
    }

    pub async fn create(&mut self, params: &ParameterBag) -> Result<TunnelCreated> {
        let client_id = self.search.resolve_client_id(params).await?;

        let mut request = TunnelRequest::derive(params)?;
        let ssh_options = params.read_string(LAUNCH_SSH, "");
        let launch_rdp = params.read_bool(LAUNCH_RDP, false);
        if !ssh_options.is_empty() && request.scheme != "ssh" {
            return Err(Error::InvalidInput(format!(
                "option launch-ssh requires the ssh scheme, got '{}'",
                request.scheme
            )));
        }
        if launch_rdp && request.scheme != "rdp" {
            return Err(Error::InvalidInput(format!(
                "option launch-rdp requires the rdp scheme, got '{}'",
                request.scheme
            )));
        }
        let rdp_width = params.read_u64(RDP_WIDTH, DEFAULT_SCREEN_WIDTH)?;
        let rdp_height = params.read_u64(RDP_HEIGHT, DEFAULT_SCREEN_HEIGHT)?;

        if request.acl.is_empty() {
            request.acl = self.ip_provider.ip().await?;
        }

        let tunnel = self.api.create_tunnel(&client_id, &request).await?;
        info!("created tunnel {} on client {client_id}", tunnel.id);

        let server_url = params.read_string(config::SERVER_URL, config::DEFAULT_SERVER_URL);
        let host = url_host(&server_url)?;
        let hint_scheme = if tunnel.scheme.is_empty() {
            request.scheme.as_str()
        } else {
            tunnel.scheme.as_str()
        };
        let created = TunnelCreated {
            usage: usage_hint(hint_scheme, &host, &tunnel.lport),
            tunnel,
        };
        self.renderer.render(&mut self.out, &created)?;

        if !ssh_options.is_empty() {
            let args = ssh_args(&host, &created.tunnel.lport, &ssh_options);
            self.ssh.launch(&args).await?;
            self.renderer.render(&mut self.out, &StatusReport::deletion())?;
            self.delete_tunnel(&client_id, &created.tunnel.id).await?;
        } else if launch_rdp {
            let address = if created.tunnel.lport.is_empty() {
                host
            } else {
                format!("{host}:{}", created.tunnel.lport)
            };
            let file = RdpFile {
                address,
                screen_width: rdp_width,
                screen_height: rdp_height,
                user_name: params.read_string(RDP_USER, ""),
            };
            self.rdp.launch(&file).await?;
        }

        Ok(created)
    }
}
