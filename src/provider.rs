//! The nOps provider.
//!
//! [`NopsProvider`] implements [`ProviderService`] by dispatching each call to
//! the handler module for the resource type. It holds the configured client
//! and nothing else: every operation lists remote projects afresh.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::client::{NopsApi, NopsClient};
use crate::config::{process_env, EnvLookup, ProviderConfig, RawProviderConfig, API_KEY_ENV, HOST_ENV};
use crate::error::ProviderError;
use crate::resources::{integration, notification, project, projects};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation::validate;

/// Provider type name, the prefix of every resource type.
pub const TYPE_NAME: &str = "nops";

/// Provider that onboards AWS accounts to nOps.
pub struct NopsProvider {
    version: String,
    env: EnvLookup,
    api: RwLock<Option<Arc<dyn NopsApi>>>,
}

impl NopsProvider {
    /// Create an unconfigured provider that reads fallbacks from the process
    /// environment.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            env: process_env(),
            api: RwLock::new(None),
        }
    }

    /// Create a provider already bound to `api`.
    pub fn with_api(version: impl Into<String>, api: Arc<dyn NopsApi>) -> Self {
        Self {
            version: version.into(),
            env: process_env(),
            api: RwLock::new(Some(api)),
        }
    }

    /// Replace the environment lookup used by [`ProviderService::configure`].
    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Whether a client has been configured.
    pub async fn is_configured(&self) -> bool {
        self.api.read().await.is_some()
    }

    async fn api(&self) -> Result<Arc<dyn NopsApi>, ProviderError> {
        self.api.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "The provider has not been configured with an nOps API client".to_string(),
            )
        })
    }

    fn resource_schema(&self, resource_type: &str) -> Result<Schema, ProviderError> {
        match resource_type {
            project::TYPE_NAME => Ok(project::schema()),
            integration::TYPE_NAME => Ok(integration::schema()),
            notification::TYPE_NAME => Ok(notification::schema()),
            other => Err(unknown_resource(other)),
        }
    }
}

/// Provider configuration schema.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "nops_api_key",
            Attribute::optional_string().sensitive().with_description(format!(
                "nOps API key that will be used for secure communication with the platform APIs, \
                 may also be provided with an environment variable {}.",
                API_KEY_ENV
            )),
        )
        .with_attribute(
            "nops_host",
            Attribute::optional_string().with_description(format!(
                "nOps API URL, may also be provided with an environment variable {}.",
                HOST_ENV
            )),
        )
}

fn unknown_resource(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(format!("Unknown resource type: {}", resource_type))
}

/// Diff proposed against prior state for the attributes the practitioner
/// sets. Computed attributes are carried from prior state, or `null` while
/// the resource does not exist yet.
fn plan_against_schema(schema: &Schema, prior: Option<Value>, proposed: Value) -> PlanResult {
    let configurable = schema.configurable_attributes();

    let prior = match prior {
        None => {
            let mut planned = proposed.as_object().cloned().unwrap_or_default();
            for name in schema.computed_attributes() {
                planned.insert(name.to_string(), Value::Null);
            }
            let changes = configurable
                .iter()
                .filter_map(|name| {
                    planned
                        .get(*name)
                        .filter(|v| !v.is_null())
                        .map(|v| AttributeChange::added(*name, v.clone()))
                })
                .collect();
            return PlanResult::with_changes(Value::Object(planned), changes, false);
        },
        Some(prior) => prior,
    };

    if proposed.is_null() {
        let changes = configurable
            .iter()
            .filter_map(|name| {
                prior
                    .get(*name)
                    .filter(|v| !v.is_null())
                    .map(|v| AttributeChange::removed(*name, v.clone()))
            })
            .collect();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned: Map<String, Value> = proposed.as_object().cloned().unwrap_or_default();
    for name in schema.computed_attributes() {
        let carried = prior.get(name).cloned().unwrap_or(Value::Null);
        planned.insert(name.to_string(), carried);
    }

    let changes: Vec<AttributeChange> = configurable
        .iter()
        .filter_map(|name| {
            let before = prior.get(*name).cloned().unwrap_or(Value::Null);
            let after = planned.get(*name).cloned().unwrap_or(Value::Null);
            (before != after).then(|| AttributeChange::modified(*name, before, after))
        })
        .collect();

    if changes.is_empty() {
        PlanResult::no_change(Value::Object(planned))
    } else {
        PlanResult::with_changes(Value::Object(planned), changes, false)
    }
}

#[async_trait::async_trait]
impl ProviderService for NopsProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(project::TYPE_NAME, project::schema())
            .with_resource(integration::TYPE_NAME, integration::schema())
            .with_resource(notification::TYPE_NAME, notification::schema())
            .with_data_source(projects::TYPE_NAME, projects::schema())
    }

    /// Type names come from [`ProviderService::schema`], sorted.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.into_keys().collect();
        let mut data_sources: Vec<String> = schema.data_sources.into_keys().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            type_name: TYPE_NAME.to_string(),
            version: self.version.clone(),
            resources,
            data_sources,
        }
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_config_schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let raw: RawProviderConfig = if config.is_null() {
            RawProviderConfig::default()
        } else {
            serde_json::from_value(config)?
        };

        let resolved = match ProviderConfig::resolve(&raw, self.env.as_ref()) {
            Ok(resolved) => resolved,
            Err(ProviderError::Configuration(detail)) => {
                return Ok(vec![Diagnostic::error("Missing nOps API Key")
                    .with_detail(detail)
                    .with_attribute("nops_api_key")]);
            },
            Err(err) => return Err(err),
        };

        debug!(config = ?resolved, "Creating nOps client");
        let client = NopsClient::new(&resolved)?;
        *self.api.write().await = Some(Arc::new(client));
        info!(success = true, "Configured nOps client");

        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        Ok(plan_against_schema(&schema, prior_state, proposed_state))
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let api = self.api().await?;
        match resource_type {
            project::TYPE_NAME => project::create(api.as_ref(), planned_state).await,
            integration::TYPE_NAME => integration::create(api.as_ref(), planned_state).await,
            notification::TYPE_NAME => notification::create(api.as_ref(), planned_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let api = self.api().await?;
        match resource_type {
            project::TYPE_NAME => project::read(api.as_ref(), current_state).await,
            integration::TYPE_NAME => integration::read(api.as_ref(), current_state).await,
            notification::TYPE_NAME => notification::read(api.as_ref(), current_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    #[instrument(skip(self, _prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        _prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let api = self.api().await?;
        match resource_type {
            project::TYPE_NAME => project::update(api.as_ref(), planned_state).await,
            integration::TYPE_NAME => integration::update(api.as_ref(), planned_state).await,
            notification::TYPE_NAME => notification::update(api.as_ref(), planned_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    /// nOps has no delete API for any of these resources; removal is a manual
    /// step in the nOps UI. Only the local binding goes away.
    #[instrument(skip(self, _current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, _current_state: Value) -> Result<(), ProviderError> {
        self.resource_schema(resource_type)?;
        debug!("No remote delete for nOps resources, dropping local state only");
        Ok(())
    }

    #[instrument(skip(self), name = "provider.import")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let api = self.api().await?;
        let state = match resource_type {
            project::TYPE_NAME => project::import(api.as_ref(), id).await?,
            integration::TYPE_NAME => integration::import(api.as_ref(), id).await?,
            notification::TYPE_NAME => {
                return Err(ProviderError::Sdk(format!(
                    "Import not supported for resource type: {}",
                    resource_type
                )))
            },
            other => return Err(unknown_resource(other)),
        };
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, _config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        match data_source_type {
            projects::TYPE_NAME => projects::read(self.api().await?.as_ref()).await,
            other => Err(ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                other
            ))),
        }
    }
}
