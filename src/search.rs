//! Endpoint resolver: turns a user-supplied identifier into clients.
//!
//! A search term is a comma-separated list of sub-terms. A client matches when
//! its id or name starts with any sub-term, compared case-insensitively.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ParameterBag;
use crate::error::{Error, Result};
use crate::models::Client;

pub const CLIENT_ID: &str = "client_id";
pub const CLIENT_NAME: &str = "name";

/// Source of the current client inventory.
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn clients(&self) -> Result<Vec<Client>>;
}

/// All clients matching `term`, in inventory order, without duplicates.
pub fn search_clients(term: &str, clients: &[Client]) -> Vec<Client> {
    let sub_terms: Vec<String> = term
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if sub_terms.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    clients
        .iter()
        .filter(|c| {
            let id = c.id.to_lowercase();
            let name = c.name.to_lowercase();
            sub_terms
                .iter()
                .any(|t| id.starts_with(t.as_str()) || name.starts_with(t.as_str()))
        })
        .filter(|c| seen.insert(c.id.clone()))
        .cloned()
        .collect()
}

/// The single client matching `term`.
pub fn find_one(term: &str, clients: &[Client]) -> Result<Client> {
    let mut found = search_clients(term, clients);
    match found.len() {
        0 => Err(Error::NotFound(term.to_string())),
        1 => Ok(found.remove(0)),
        n => {
            debug!("'{term}' matched {n} clients");
            Err(Error::Ambiguous(term.to_string()))
        }
    }
}

/// Resolver bound to a live client inventory.
#[derive(Clone)]
pub struct Search {
    provider: Arc<dyn ClientProvider>,
}

impl Search {
    pub fn new(provider: Arc<dyn ClientProvider>) -> Self {
        Self { provider }
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Client>> {
        let clients = self.provider.clients().await?;
        Ok(search_clients(term, &clients))
    }

    pub async fn find_one(&self, term: &str) -> Result<Client> {
        let clients = self.provider.clients().await?;
        find_one(term, &clients)
    }

    /// The client id named by `client_id`, or the id of the single client
    /// matching `name`. An explicit id is used as-is without a lookup.
    pub async fn resolve_client_id(&self, params: &ParameterBag) -> Result<String> {
        let client_id = params.read_string(CLIENT_ID, "");
        if !client_id.is_empty() {
            return Ok(client_id);
        }
        let name = params.read_string(CLIENT_NAME, "");
        if name.is_empty() {
            return Err(Error::MissingIdentity);
        }
        Ok(self.find_one(&name).await?.id)
    }
}
