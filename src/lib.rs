#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]

//! rportcli library, the building blocks behind the `rportcli` binary.
//!
//! - `search`: resolve client names and ids against the live inventory
//! - `tunnel`: create, delete and list tunnels, with ssh/rdp hand-off
//! - `exec`: run commands and scripts over the execution channel
//! - `websocket`: WebSocket transport for the execution channel
//! - `ssh`, `rdp`: companion process launchers
//! - `client`: REST client for the rport API
//! - `auth`: credential providers
//! - `config`: layered parameter loading
//! - `output`: human, JSON and YAML rendering

pub mod auth;
pub mod client;
pub mod clients;
pub mod config;
pub mod error;
pub mod exec;
pub mod ip;
pub mod models;
pub mod output;
pub mod rdp;
pub mod search;
pub mod ssh;
pub mod tunnel;
pub mod websocket;

pub use client::RportClient;
pub use config::ParameterBag;
pub use error::{Error, Result};
pub use search::Search;
