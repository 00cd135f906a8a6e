//! Testing utilities for the nOps provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way the host would,
//! without any protocol adapter in between. [`FakeNopsApi`] is an in-memory
//! nOps backend that counts the calls it receives.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nops_provider::provider::NopsProvider;
//! use nops_provider::testing::{FakeNopsApi, ProviderTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_project() {
//!     let api = Arc::new(FakeNopsApi::new());
//!     let tester = ProviderTester::new(NopsProvider::with_api("dev", api.clone()));
//!
//!     let state = tester.lifecycle_create("nops_project", json!({
//!         "name": "prod",
//!         "account_number": "471112641702",
//!         "master_payer_account_number": "580010171808"
//!     })).await.unwrap();
//!
//!     assert_eq!(api.create_calls(), 1);
//!     assert_eq!(state["account_number"], "471112641702");
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::client::NopsApi;
use crate::error::ProviderError;
use crate::models::{
    Integration, IntegrationResponse, NewProject, Project, UpdateProject, NOT_ASSIGNED,
};
use crate::schema::Diagnostic;
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// A test harness for provider implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration. Fails on any error diagnostic.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider. Fails on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Plan a delete, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Fake nOps backend
// =========================================================================

/// Client id the fake assigns to every created project.
pub const FAKE_CLIENT_ID: i64 = 8549;

#[derive(Default)]
struct FakeState {
    projects: Vec<Project>,
    created: Vec<NewProject>,
    notifications: Vec<Integration>,
    failure: Option<(u16, String)>,
}

/// In-memory [`NopsApi`].
///
/// Creates append a pending project (`role_name == "na"`). Integration events
/// complete the listed project for the account the way the backend does once
/// it has assumed the role.
#[derive(Default)]
pub struct FakeNopsApi {
    state: Mutex<FakeState>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    notify_calls: AtomicUsize,
}

impl FakeNopsApi {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that already lists `projects`, in that order.
    pub fn with_projects(projects: Vec<Project>) -> Self {
        let fake = Self::default();
        fake.lock().projects = projects;
        fake
    }

    /// Make every mutating call fail with `status` and `body`. Failed calls
    /// are still counted.
    pub fn fail_mutations(&self, status: u16, body: &str) {
        self.lock().failure = Some((status, body.to_string()));
    }

    /// Number of list calls received.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of create calls received.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of integration events received.
    pub fn notify_calls(&self) -> usize {
        self.notify_calls.load(Ordering::SeqCst)
    }

    /// Create, update, delete and notify calls together.
    pub fn mutation_calls(&self) -> usize {
        self.create_calls()
            + self.update_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
            + self.notify_calls()
    }

    /// Every call received, reads included.
    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.mutation_calls()
    }

    /// Bodies of create calls, in order.
    pub fn created_requests(&self) -> Vec<NewProject> {
        self.lock().created.clone()
    }

    /// Integration events received, in order.
    pub fn notifications(&self) -> Vec<Integration> {
        self.lock().notifications.clone()
    }

    /// Projects the backend currently lists.
    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the state from the assertions
        // of another.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failure(state: &FakeState) -> Result<(), ProviderError> {
        match &state.failure {
            Some((status, body)) => Err(ProviderError::Http {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }

    fn not_found(id: i64) -> ProviderError {
        ProviderError::Http {
            status: 404,
            body: format!("{{\"detail\":\"project {} not found\"}}", id),
        }
    }
}

#[async_trait::async_trait]
impl NopsApi for FakeNopsApi {
    async fn list_projects(&self) -> Result<Vec<Project>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.projects())
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project, ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::check_failure(&state)?;

        let id = state.projects.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let record = Project {
            id,
            client: FAKE_CLIENT_ID,
            arn: String::new(),
            bucket: NOT_ASSIGNED.to_string(),
            account_number: project.account_number.clone(),
            name: project.name.clone(),
            external_id: format!("ext-{}", id),
            role_name: NOT_ASSIGNED.to_string(),
        };
        state.created.push(project.clone());
        state.projects.push(record.clone());
        Ok(record)
    }

    async fn update_project(
        &self,
        id: i64,
        project: &UpdateProject,
    ) -> Result<Project, ProviderError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::check_failure(&state)?;

        let record = state
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        record.name = project.name.clone();
        record.account_number = project.account_number.clone();
        Ok(record.clone())
    }

    async fn delete_project(&self, id: i64) -> Result<(), ProviderError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::check_failure(&state)?;

        let before = state.projects.len();
        state.projects.retain(|p| p.id != id);
        if state.projects.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn notify_integration(
        &self,
        integration: &Integration,
    ) -> Result<IntegrationResponse, ProviderError> {
        self.notify_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        Self::check_failure(&state)?;

        state.notifications.push(integration.clone());
        if let Some(record) = state
            .projects
            .iter_mut()
            .find(|p| p.account_number == integration.account_number)
        {
            record.arn = integration.role_arn.clone();
            record.bucket = integration.bucket_name.clone();
            record.external_id = integration.external_id.clone();
            record.role_name = integration
                .role_arn
                .rsplit('/')
                .next()
                .unwrap_or(NOT_ASSIGNED)
                .to_string();
        }
        Ok(IntegrationResponse {
            status: "ok".to_string(),
        })
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

fn error_summaries(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect()
}

/// Assert that a plan creates the resource: at least one attribute is added
/// and nothing is replaced.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "create plan carries no changes");
    assert_plan_updates_in_place(plan);
}

/// Assert that a plan carries no changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected an empty plan, got changes to {:?}",
        changed_paths(plan)
    );
}

/// Assert that a plan does not require replacement. No nOps resource is
/// ever replaced.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.requires_replace, "plan unexpectedly requires replacement");
}

/// Assert that `path` is among the changed attributes.
///
/// # Panics
///
/// Panics if the plan does not change `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths = changed_paths(plan);
    assert!(
        paths.contains(&path),
        "expected '{}' to change, changed attributes: {:?}",
        path,
        paths
    );
}

/// Assert that `path` is not among the changed attributes.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !changed_paths(plan).contains(&path),
        "expected '{}' to stay unchanged",
        path
    );
}

/// Assert that diagnostics contain no errors. Warnings are fine.
///
/// # Panics
///
/// Panics listing the error summaries.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors = error_summaries(diagnostics);
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

/// Assert that diagnostics contain at least one error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        !error_summaries(diagnostics).is_empty(),
        "expected at least one error diagnostic"
    );
}

/// Assert that some error summary contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors = error_summaries(diagnostics);
    assert!(
        errors.iter().any(|summary| summary.contains(substring)),
        "no error summary contains '{}': {:?}",
        substring,
        errors
    );
}
