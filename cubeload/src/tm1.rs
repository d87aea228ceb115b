//! Planning Analytics (TM1) REST API connection
//!
//! One [`Tm1Connection`] holds a single HTTP client with a cookie store, so every query of a
//! run reuses the `TM1SessionId` session that was established by [`Tm1Connection::connect`].
use crate::connection::Connection;
use crate::query::{QueryError, StatusError};
use cubeload_core::ServerConfig;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, info, instrument, warn};

const SESSION_COOKIE: &str = "TM1SessionId";

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Unable to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Unable to reach {root}: {source}")]
    Unreachable {
        root: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server rejected the session: {0}")]
    Rejected(#[from] StatusError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct MdxRequest<'a> {
    #[serde(rename = "MDX")]
    mdx: &'a str,
}

#[derive(Deserialize)]
struct Cellset {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Deserialize)]
struct Collection<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
struct Named {
    #[serde(rename = "Name")]
    name: String,
}

pub struct Tm1Connection {
    client: Client,
    root: String,
    user: String,
    password: String,
    session_id: Option<String>,
    version: String,
}

impl Tm1Connection {
    /// Open a session and verify it by fetching the product version.
    #[instrument(name = "connect", skip_all, fields(address = %server.address))]
    pub async fn connect(server: &ServerConfig) -> Result<Self, ConnectError> {
        let client = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(server.accept_invalid_certs())
            .build()
            .map_err(ConnectError::Client)?;

        let mut conn = Self {
            client,
            root: server.api_root(),
            user: server.user.clone(),
            password: server.password.clone(),
            session_id: None,
            version: String::new(),
        };

        let response = conn
            .request(Method::GET, "Configuration/ProductVersion/$value")
            .send()
            .await
            .map_err(|source| ConnectError::Unreachable {
                root: conn.root.clone(),
                source,
            })?;
        let response = StatusError::check(response).await?;

        conn.session_id = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());
        conn.version = response.text().await?.trim().to_string();

        info!(
            "Connected to {} (version {}, session {})",
            conn.root,
            conn.version,
            conn.session_id.as_deref().unwrap_or("-")
        );
        Ok(conn)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Names of the model (non-control) cubes on the server.
    pub async fn model_cubes(&self) -> Result<Vec<String>, ConnectError> {
        let response = self
            .request(Method::GET, "ModelCubes()?$select=Name")
            .send()
            .await?;
        let cubes: Collection<Named> = StatusError::check(response).await?.json().await?;
        Ok(cubes.value.into_iter().map(|cube| cube.name).collect())
    }

    /// Close the server-side session.
    pub async fn logout(&self) -> Result<(), ConnectError> {
        let response = self
            .request(Method::POST, "ActiveSession/tm1.Close")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await?;
        StatusError::check(response).await?;
        debug!("Session closed");
        Ok(())
    }

    /// Run `f` with this session, then log out whatever `f` returned.
    pub async fn with_session<F, Fut, T, E>(self: Arc<Self>, f: F) -> Result<T, E>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let res = f(Arc::clone(&self)).await;
        if let Err(error) = self.logout().await {
            warn!("Unable to close session: {error}");
        }
        res
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.root, path))
            .basic_auth(&self.user, Some(&self.password))
    }

    async fn delete_cellset(&self, id: &str) -> Result<(), QueryError> {
        let response = self
            .request(Method::DELETE, &format!("Cellsets('{id}')"))
            .send()
            .await?;
        StatusError::check(response).await?;
        Ok(())
    }
}

impl Connection for Tm1Connection {
    async fn execute_mdx(&self, mdx: &str) -> Result<u64, QueryError> {
        let response = self
            .request(Method::POST, "ExecuteMDX")
            .json(&MdxRequest { mdx })
            .send()
            .await?;
        let cellset: Cellset = StatusError::check(response).await?.json().await?;

        let response = self
            .request(Method::GET, &format!("Cellsets('{}')/Cells/$count", cellset.id))
            .send()
            .await?;
        let body = StatusError::check(response).await?.text().await?;
        let count = body
            .trim()
            .parse::<u64>()
            .map_err(|_| QueryError::InvalidResponse(format!("cell count `{}`", body.trim())))?;

        // Cleanup failure does not fail the query.
        if let Err(error) = self.delete_cellset(&cellset.id).await {
            debug!("Unable to delete cellset {}: {error}", cellset.id);
        }

        Ok(count)
    }
}
