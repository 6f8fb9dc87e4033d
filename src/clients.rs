//! Read-only queries: the client inventory and the current user.

use std::io::Write;
use std::sync::Arc;

use crate::client::RportClient;
use crate::config::ParameterBag;
use crate::error::{Error, Result};
use crate::models::{Client, Me};
use crate::output::Renderer;
use crate::search::{Search, CLIENT_ID, CLIENT_NAME};

/// Comma-separated name/id prefixes narrowing `client list`.
pub const SEARCH_TERM: &str = "search";

pub struct ClientController<W> {
    api: Arc<RportClient>,
    search: Search,
    renderer: Renderer,
    out: W,
}

impl<W: Write> ClientController<W> {
    pub fn new(api: Arc<RportClient>, search: Search, renderer: Renderer, out: W) -> Self {
        Self {
            api,
            search,
            renderer,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub async fn list(&mut self, params: &ParameterBag) -> Result<Vec<Client>> {
        let term = params.read_string(SEARCH_TERM, "");
        let clients = if term.is_empty() {
            self.api.clients().await?
        } else {
            self.search.search(&term).await?
        };
        self.renderer.render(&mut self.out, &clients)?;
        Ok(clients)
    }

    /// One client, by exact id or by unique name match.
    pub async fn get(&mut self, params: &ParameterBag) -> Result<Client> {
        let id = params.read_string(CLIENT_ID, "");
        let client = if id.is_empty() {
            let name = params.read_string(CLIENT_NAME, "");
            if name.is_empty() {
                return Err(Error::MissingIdentity);
            }
            self.search.find_one(&name).await?
        } else {
            self.api
                .clients()
                .await?
                .into_iter()
                .find(|c| c.id == id)
                .ok_or(Error::NotFound(id))?
        };
        self.renderer.render(&mut self.out, &client)?;
        Ok(client)
    }

    pub async fn me(&mut self) -> Result<Me> {
        let me = self.api.me().await?;
        self.renderer.render(&mut self.out, &me)?;
        Ok(me)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BearerAuth;
    use crate::output::Format;
    use crate::testutil::{serve, Recorder};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn controller() -> (ClientController<Vec<u8>>, Recorder) {
        let recorder = Recorder::default();
        let app = Router::new()
            .route(
                "/api/v1/clients",
                get(recorder.handler(|| {
                    Json(json!({"data": [
                        {"id": "123", "name": "SomeName", "os_kernel": "linux"},
                        {"id": "124", "name": "SomeOtherName", "os_kernel": "windows"}
                    ]}))
                })),
            )
            .route(
                "/api/v1/me",
                get(recorder.handler(|| {
                    Json(json!({"data": {"username": "admin", "groups": ["Administrators"], "two_fa_send_to": ""}}))
                })),
            );
        let url = serve(app).await;
        let api = Arc::new(
            RportClient::new(
                &url,
                Arc::new(BearerAuth {
                    token: "tok".into(),
                }),
            )
            .unwrap(),
        );
        let search = Search::new(api.clone());
        (
            ClientController::new(api, search, Renderer::new(Format::Json), Vec::new()),
            recorder,
        )
    }

    #[tokio::test]
    async fn lists_clients() {
        let (mut ctl, recorder) = controller().await;
        let clients = ctl.list(&ParameterBag::default()).await.unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(recorder.requests()[0].auth, "Bearer tok");

        let rendered: serde_json::Value = serde_json::from_slice(&ctl.into_output()).unwrap();
        assert_eq!(rendered[1]["name"], "SomeOtherName");
    }

    #[tokio::test]
    async fn list_narrowed_by_search() {
        let (mut ctl, _) = controller().await;
        let clients = ctl
            .list(&ParameterBag::from_values([(SEARCH_TERM, "someo, 999")]))
            .await
            .unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, "124");
    }

    #[tokio::test]
    async fn gets_by_id_or_name() {
        let (mut ctl, _) = controller().await;
        let by_id = ctl
            .get(&ParameterBag::from_values([(CLIENT_ID, "124")]))
            .await
            .unwrap();
        assert_eq!(by_id.name, "SomeOtherName");

        let by_name = ctl
            .get(&ParameterBag::from_values([(CLIENT_NAME, "somen")]))
            .await
            .unwrap();
        assert_eq!(by_name.id, "123");
    }

    #[tokio::test]
    async fn get_errors() {
        let (mut ctl, _) = controller().await;
        let err = ctl
            .get(&ParameterBag::from_values([(CLIENT_ID, "999")]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown client '999'");

        let err = ctl
            .get(&ParameterBag::from_values([(CLIENT_NAME, "some")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ambiguous(_)));

        let err = ctl.get(&ParameterBag::default()).await.unwrap_err();
        assert!(matches!(err, Error::MissingIdentity));
    }

    #[tokio::test]
    async fn me() {
        let (mut ctl, _) = controller().await;
        let me = ctl.me().await.unwrap();
        assert_eq!(me.username, "admin");
        assert_eq!(me.groups, vec!["Administrators"]);
    }
}
