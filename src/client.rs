//! HTTP client for the nOps REST API.
//!
//! [`NopsApi`] is the seam the reconciler and resource handlers talk to.
//! [`NopsClient`] implements it over `reqwest`. Tests swap in
//! [`crate::testing::FakeNopsApi`].

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::{Integration, IntegrationResponse, NewProject, Project, UpdateProject};

/// Project collection endpoint.
pub const PROJECTS_PATH: &str = "/c/admin/projectaws/";

/// Integration notification endpoint.
pub const INTEGRATION_PATH: &str = "/c/aws/integration/";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-nops-api-key";

/// Header carrying the AWS account on integration calls.
pub const ACCOUNT_NUMBER_HEADER: &str = "x-aws-account-number";

/// Operations the provider needs from nOps.
///
/// Every call is a single HTTP round trip: no retries, no caching.
#[async_trait::async_trait]
pub trait NopsApi: Send + Sync {
    /// List every project visible to the API key.
    async fn list_projects(&self) -> Result<Vec<Project>, ProviderError>;

    /// Create a project and return the server-assigned record.
    async fn create_project(&self, project: &NewProject) -> Result<Project, ProviderError>;

    /// Patch a project's name and account number.
    async fn update_project(
        &self,
        id: i64,
        project: &UpdateProject,
    ) -> Result<Project, ProviderError>;

    /// Delete a project.
    async fn delete_project(&self, id: i64) -> Result<(), ProviderError>;

    /// Send an integration event for an account.
    async fn notify_integration(
        &self,
        integration: &Integration,
    ) -> Result<IntegrationResponse, ProviderError>;
}

/// `reqwest`-backed nOps client.
#[derive(Debug, Clone)]
pub struct NopsClient {
    http: reqwest::Client,
    host: String,
}

impl NopsClient {
    /// Build a client with the API key installed as a default header.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret()).map_err(|_| {
            ProviderError::Configuration(
                "The nOps API key contains characters that are not allowed in an HTTP header"
                    .to_string(),
            )
        })?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(API_KEY_HEADER, api_key);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            host: config.host.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are sent to.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.host, path);
        debug!(%method, %url, "nOps request");
        self.http.request(method, url)
    }

    async fn send_raw(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), %body, "nOps request failed");
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let body = self.send_raw(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl NopsApi for NopsClient {
    #[instrument(skip(self), name = "nops.list_projects")]
    async fn list_projects(&self) -> Result<Vec<Project>, ProviderError> {
        self.send(self.request(Method::GET, PROJECTS_PATH)).await
    }

    #[instrument(skip(self, project), fields(account_number = %project.account_number), name = "nops.create_project")]
    async fn create_project(&self, project: &NewProject) -> Result<Project, ProviderError> {
        self.send(self.request(Method::POST, PROJECTS_PATH).json(project))
            .await
    }

    #[instrument(skip(self, project), name = "nops.update_project")]
    async fn update_project(
        &self,
        id: i64,
        project: &UpdateProject,
    ) -> Result<Project, ProviderError> {
        let path = format!("{}{}/", PROJECTS_PATH, id);
        self.send(self.request(Method::PATCH, &path).json(project))
            .await
    }

    #[instrument(skip(self), name = "nops.delete_project")]
    async fn delete_project(&self, id: i64) -> Result<(), ProviderError> {
        let path = format!("{}{}/", PROJECTS_PATH, id);
        self.send_raw(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    #[instrument(
        skip(self, integration),
        fields(
            account_number = %integration.account_number,
            request_type = integration.request_type.as_str()
        ),
        name = "nops.notify_integration"
    )]
    async fn notify_integration(
        &self,
        integration: &Integration,
    ) -> Result<IntegrationResponse, ProviderError> {
        let request = self
            .request(Method::POST, INTEGRATION_PATH)
            .header(ACCOUNT_NUMBER_HEADER, integration.account_number.as_str())
            .json(integration);
        self.send(request).await
    }
}
