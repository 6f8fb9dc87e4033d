#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # rportcli
//!
//! Command-line client for rport servers.
//!
//! ## Subcommands
//!
//! - `rportcli client list|get`: client inventory
//! - `rportcli tunnel list|create|delete`: tunnels, with optional ssh/rdp hand-off
//! - `rportcli command`: run a command on clients
//! - `rportcli script`: run a local script on clients
//! - `rportcli me`: the authenticated user
//!
//! Connection settings come from `--config` / `CONFIG_PATH` (JSON) and the
//! `RPORT_SERVER_URL`, `RPORT_USER`, `RPORT_PASSWORD` and `RPORT_API_TOKEN`
//! environment variables.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use rportcli::auth::FallbackAuth;
use rportcli::client::{RportClient, WS_COMMANDS_URL, WS_SCRIPTS_URL};
use rportcli::clients::{ClientController, SEARCH_TERM};
use rportcli::config::{self, ParameterBag};
use rportcli::exec::{self, ExecController};
use rportcli::ip::ApiIpProvider;
use rportcli::output::{Format, Renderer};
use rportcli::rdp::{default_command_provider, RdpExecutor};
use rportcli::search::{Search, CLIENT_ID, CLIENT_NAME};
use rportcli::ssh::SshLauncher;
use rportcli::tunnel::{self, TunnelController};
use rportcli::websocket::{ApiWsUrl, WsOpener};
use rportcli::{Error, Result};

/// Command-line client for rport servers.
#[derive(Parser)]
#[command(name = "rportcli", version)]
struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: human, json, json-pretty or yaml.
    #[arg(short, long, global = true, default_value = "human")]
    output: Format,

    /// Shorthand for `-o json-pretty`.
    #[arg(short = 'j', long, global = true)]
    json_pretty: bool,

    /// Give up after this long, e.g. 30s or 2m.
    #[arg(short, long, global = true, value_parser = config::parse_duration)]
    timeout: Option<Duration>,

    /// Path to the JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Client inventory.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
    /// Tunnel management.
    Tunnel {
        #[command(subcommand)]
        action: TunnelAction,
    },
    /// Run a command on one or more clients.
    Command(CommandArgs),
    /// Run a local script on one or more clients.
    Script(ScriptArgs),
    /// Show the authenticated user.
    Me,
}

#[derive(Subcommand)]
enum ClientAction {
    /// List clients.
    List {
        /// Only clients whose name or id starts with one of these
        /// comma-separated terms.
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one client by id or name.
    Get {
        /// Client id.
        id: Option<String>,
        /// Client name (prefix match, must be unique).
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum TunnelAction {
    /// List the tunnels of all clients.
    List,
    /// Create a tunnel.
    Create(TunnelCreateArgs),
    /// Delete a tunnel.
    Delete {
        #[command(flatten)]
        target: Target,
        /// Id of the tunnel to delete.
        #[arg(long)]
        tunnel_id: Option<String>,
    },
}

/// A single client, by id or by name.
#[derive(Args)]
struct Target {
    /// Client id.
    #[arg(short = 'd', long = "client")]
    client_id: Option<String>,
    /// Client name (prefix match, must be unique).
    #[arg(short, long)]
    name: Option<String>,
}

#[derive(Args)]
struct TunnelCreateArgs {
    #[command(flatten)]
    target: Target,
    /// Local `host:port` to listen on; the server picks a port when omitted.
    #[arg(short, long)]
    local: Option<String>,
    /// Remote `host:port` or port; derived from the scheme when omitted.
    #[arg(short, long)]
    remote: Option<String>,
    /// URI scheme, e.g. ssh or rdp; derived from the remote port when omitted.
    #[arg(short, long)]
    scheme: Option<String>,
    /// Allowed source IPs; defaults to your public IP.
    #[arg(short, long)]
    acl: Option<String>,
    /// Skip the server-side check that the remote port is open.
    #[arg(long)]
    no_check_port: bool,
    /// Start ssh through the tunnel with these extra options, e.g. "-l root".
    #[arg(short = 'b', long, allow_hyphen_values = true)]
    launch_ssh: Option<String>,
    /// Open the remote-desktop client through the tunnel.
    #[arg(long)]
    launch_rdp: bool,
    /// User name for the remote-desktop session.
    #[arg(long)]
    rdp_user: Option<String>,
    /// Remote-desktop screen width.
    #[arg(long)]
    rdp_width: Option<u64>,
    /// Remote-desktop screen height.
    #[arg(long)]
    rdp_height: Option<u64>,
}

impl TunnelCreateArgs {
    fn launches(&self) -> bool {
        self.launch_rdp || self.launch_ssh.as_deref().is_some_and(|o| !o.is_empty())
    }
}

/// Targets and flags shared by `command` and `script`.
#[derive(Args)]
struct ExecArgs {
    /// Comma-separated client ids.
    #[arg(short = 'd', long)]
    cids: Option<String>,
    /// Comma-separated client group ids.
    #[arg(short, long)]
    gids: Option<String>,
    /// Client name (prefix match, must be unique).
    #[arg(short, long)]
    name: Option<String>,
    /// Interpreter, e.g. cmd or powershell.
    #[arg(short, long)]
    interpreter: Option<String>,
    /// Working directory on the client.
    #[arg(long)]
    cwd: Option<String>,
    /// Run as root.
    #[arg(short = 'u', long)]
    sudo: bool,
    /// Run on all clients at once rather than one after another.
    #[arg(short, long)]
    concurrent: bool,
    /// Stop at the first client that fails.
    #[arg(long)]
    abort_on_error: bool,
    /// Seconds the server lets the job run.
    #[arg(long)]
    timeout_sec: Option<u64>,
}

#[derive(Args)]
struct CommandArgs {
    #[command(flatten)]
    exec: ExecArgs,
    /// Command to run.
    #[arg(short = 'e', long)]
    command: Option<String>,
}

#[derive(Args)]
struct ScriptArgs {
    #[command(flatten)]
    exec: ExecArgs,
    /// Path of the script to run.
    #[arg(short = 'f', long)]
    script: Option<String>,
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "" })
}

impl Target {
    fn params(&self, params: &mut Vec<(&'static str, String)>) {
        params.push((CLIENT_ID, self.client_id.clone().unwrap_or_default()));
        params.push((CLIENT_NAME, self.name.clone().unwrap_or_default()));
    }
}

impl ExecArgs {
    fn params(&self, params: &mut Vec<(&'static str, String)>) {
        params.extend([
            (exec::CLIENT_IDS, self.cids.clone().unwrap_or_default()),
            (exec::GROUP_IDS, self.gids.clone().unwrap_or_default()),
            (CLIENT_NAME, self.name.clone().unwrap_or_default()),
            (exec::INTERPRETER, self.interpreter.clone().unwrap_or_default()),
            (exec::CWD, self.cwd.clone().unwrap_or_default()),
            (exec::IS_SUDO, flag(self.sudo)),
            (exec::EXECUTE_CONCURRENTLY, flag(self.concurrent)),
            (exec::ABORT_ON_ERROR, flag(self.abort_on_error)),
            (
                exec::TIMEOUT_SEC,
                self.timeout_sec.map(|t| t.to_string()).unwrap_or_default(),
            ),
        ]);
    }
}

impl Commands {
    /// The command-line layer of the parameter bag.
    fn params(&self) -> ParameterBag {
        let mut params = Vec::new();
        match self {
            Commands::Client {
                action: ClientAction::List { search },
            } => {
                params.push((SEARCH_TERM, search.clone().unwrap_or_default()));
            }
            Commands::Client {
                action: ClientAction::Get { id, name },
            } => {
                params.push((CLIENT_ID, id.clone().unwrap_or_default()));
                params.push((CLIENT_NAME, name.clone().unwrap_or_default()));
            }
            Commands::Tunnel { action } => match action {
                TunnelAction::Create(args) => {
                    args.target.params(&mut params);
                    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
                    let num = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
                    params.extend([
                        (tunnel::LOCAL, opt(&args.local)),
                        (tunnel::REMOTE, opt(&args.remote)),
                        (tunnel::SCHEME, opt(&args.scheme)),
                        (tunnel::ACL, opt(&args.acl)),
                        (
                            tunnel::CHECK_PORT,
                            if args.no_check_port { "0" } else { "" }.to_string(),
                        ),
                        (tunnel::LAUNCH_SSH, opt(&args.launch_ssh)),
                        (tunnel::LAUNCH_RDP, flag(args.launch_rdp)),
                        (tunnel::RDP_USER, opt(&args.rdp_user)),
                        (tunnel::RDP_WIDTH, num(args.rdp_width)),
                        (tunnel::RDP_HEIGHT, num(args.rdp_height)),
                    ]);
                }
                TunnelAction::Delete { target, tunnel_id } => {
                    target.params(&mut params);
                    params.push((tunnel::TUNNEL_ID, tunnel_id.clone().unwrap_or_default()));
                }
                TunnelAction::List => {}
            },
            Commands::Command(args) => {
                args.exec.params(&mut params);
                params.push((exec::COMMAND, args.command.clone().unwrap_or_default()));
            }
            Commands::Script(args) => {
                args.exec.params(&mut params);
                params.push((exec::SCRIPT, args.script.clone().unwrap_or_default()));
            }
            Commands::Me => {}
        }
        ParameterBag::from_values(params)
    }

    /// Whether `--timeout` bounds the whole operation. Jobs use it as their
    /// own deadline and interactive hand-offs are never cut short.
    fn has_overall_deadline(&self) -> bool {
        match self {
            Commands::Command(_) | Commands::Script(_) => false,
            Commands::Tunnel {
                action: TunnelAction::Create(args),
            } => !args.launches(),
            _ => true,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Cancelled),
    };
    if let Err(e) = result {
        eprintln!("rportcli: {e}");
        if e.is_transport() {
            eprintln!("rportcli: check the server url and your credentials");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let params = config::load_params(cli.config.as_deref(), cli.command.params())?;
    let server_url = params.read_string(config::SERVER_URL, config::DEFAULT_SERVER_URL);
    debug!("using server {server_url}");

    let format = if cli.json_pretty {
        Format::JsonPretty
    } else {
        cli.output
    };
    let renderer = Renderer::new(format);
    let api = Arc::new(RportClient::new(
        &server_url,
        Arc::new(FallbackAuth::from_params(&params)),
    )?);
    let search = Search::new(api.clone());

    let deadline = if cli.command.has_overall_deadline() {
        cli.timeout
    } else {
        None
    };
    within(
        deadline,
        dispatch(cli.command, cli.timeout, &params, api, search, renderer),
    )
    .await
}

async fn within<F>(deadline: Option<Duration>, operation: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(limit)),
        },
        None => operation.await,
    }
}

async fn dispatch(
    command: Commands,
    timeout: Option<Duration>,
    params: &ParameterBag,
    api: Arc<RportClient>,
    search: Search,
    renderer: Renderer,
) -> Result<()> {
    let out = std::io::stdout();
    match command {
        Commands::Client { action } => {
            let mut ctl = ClientController::new(api, search, renderer, out);
            match action {
                ClientAction::List { .. } => {
                    ctl.list(params).await?;
                }
                ClientAction::Get { .. } => {
                    ctl.get(params).await?;
                }
            }
        }
        Commands::Me => {
            ClientController::new(api, search, renderer, out).me().await?;
        }
        Commands::Tunnel { action } => {
            let mut ctl = TunnelController::new(
                api,
                search,
                Arc::new(ApiIpProvider::new()?),
                Arc::new(SshLauncher::default()),
                Arc::new(RdpExecutor::new(
                    default_command_provider(),
                    std::io::stdout(),
                )),
                renderer,
                out,
            );
            match action {
                TunnelAction::List => {
                    ctl.list().await?;
                }
                TunnelAction::Create(_) => {
                    ctl.create(params).await?;
                }
                TunnelAction::Delete { .. } => {
                    ctl.delete(params).await?;
                }
            }
        }
        Commands::Command(_) => {
            exec_controller(api, search, renderer, timeout)
                .run_command(params)
                .await?;
        }
        Commands::Script(_) => {
            exec_controller(api, search, renderer, timeout)
                .run_script(params)
                .await?;
        }
    }
    Ok(())
}

fn exec_controller(
    api: Arc<RportClient>,
    search: Search,
    renderer: Renderer,
    deadline: Option<Duration>,
) -> ExecController<std::io::Stdout> {
    let commands = Arc::new(WsOpener::new(ApiWsUrl::new(api.clone(), WS_COMMANDS_URL)));
    let scripts = Arc::new(WsOpener::new(ApiWsUrl::new(api, WS_SCRIPTS_URL)));
    ExecController::new(search, commands, scripts, renderer, std::io::stdout())
        .with_deadline(deadline)
}
