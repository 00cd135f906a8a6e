//! `nops_project`: onboards an AWS account as an nOps project.
//!
//! There is no remote update or delete for projects. Update refreshes
//! server-owned fields, delete only drops the local binding.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{from_state, required, timestamp, to_state};
use crate::client::NopsApi;
use crate::error::ProviderError;
use crate::models::Project;
use crate::reconcile::{
    reconcile, refresh_by_account_number, refresh_by_id, DesiredProject, ReconciliationOutcome,
};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "nops_project";

const IMPORT_DOCS_URL: &str = "https://help.nops.io/docs/getting-started/Onboarding/onboarding-aws-with-terraform/#importing-existing-nops-projects";

/// Schema for `nops_project`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description(
            "Resource intended to be used for the initial onboarding of an account to the nOps platform, \
             used for communication with nOps APIs.",
        )
        .with_attribute(
            "id",
            Attribute::computed_int64().with_description("nOps project identifier."),
        )
        .with_attribute(
            "last_updated",
            Attribute::computed_string()
                .with_description("Timestamp when the resource was last updated"),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("nOps project name"),
        )
        .with_attribute(
            "account_number",
            Attribute::required_string()
                .with_description("Target AWS account id to integrate with nOps"),
        )
        .with_attribute(
            "master_payer_account_number",
            Attribute::required_string().with_description(
                "Master payer AWS account id used to conditionally create resources",
            ),
        )
        .with_attribute(
            "role_name",
            Attribute::computed_string().with_description("Name of the IAM role to be used by nOps"),
        )
        .with_attribute(
            "client",
            Attribute::computed_int64().with_description("nOps client ID"),
        )
        .with_attribute(
            "arn",
            Attribute::computed_string().with_description(
                "AWS IAM role ARN to create/update account integration to nOps",
            ),
        )
        .with_attribute(
            "bucket",
            Attribute::computed_string().with_description(
                "AWS S3 bucket name to be used for CUR reports, the initial value is `na`",
            ),
        )
        .with_attribute(
            "external_id",
            Attribute::computed_string().with_description(
                "Identifier to be used by nOps in order to securely assume a role in the target account",
            ),
        )
}

/// State of a `nops_project` instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    /// nOps project id.
    pub id: Option<i64>,
    /// Last time the provider wrote this state.
    pub last_updated: Option<String>,
    /// Project name.
    pub name: Option<String>,
    /// AWS account id, the identity key used for refresh.
    pub account_number: Option<String>,
    /// Master payer AWS account id.
    pub master_payer_account_number: Option<String>,
    /// IAM role ARN.
    pub arn: Option<String>,
    /// CUR bucket.
    pub bucket: Option<String>,
    /// nOps client id.
    pub client: Option<i64>,
    /// External id for role assumption.
    pub external_id: Option<String>,
    /// IAM role name, `"na"` while pending.
    pub role_name: Option<String>,
}

impl ProjectState {
    fn desired(&self) -> Result<DesiredProject, ProviderError> {
        Ok(DesiredProject {
            name: required(&self.name, "name")?.to_string(),
            account_number: required(&self.account_number, "account_number")?.to_string(),
            master_payer_account_number: required(
                &self.master_payer_account_number,
                "master_payer_account_number",
            )?
            .to_string(),
        })
    }

    /// Overwrite every server-owned field from `project`.
    fn apply_record(&mut self, project: &Project) {
        self.id = Some(project.id);
        self.client = Some(project.client);
        self.arn = Some(project.arn.clone());
        self.bucket = Some(project.bucket.clone());
        self.external_id = Some(project.external_id.clone());
        self.role_name = Some(project.role_name.clone());
    }

    /// Fill name and account number when the state does not carry them yet
    /// (after an import by id).
    fn fill_identity(&mut self, project: &Project) {
        if self.account_number.as_deref().map_or(true, str::is_empty) {
            self.account_number = Some(project.account_number.clone());
        }
        if self.name.is_none() {
            self.name = Some(project.name.clone());
        }
    }
}

/// Reconcile the planned project against nOps and bind state to the
/// adopted or created record.
pub async fn create(api: &dyn NopsApi, planned: Value) -> Result<Value, ProviderError> {
    let mut state: ProjectState = from_state(planned)?;
    let desired = state.desired()?;

    let project = match reconcile(api, &desired).await? {
        ReconciliationOutcome::Rejected { existing_id } => {
            return Err(ProviderError::AlreadyExists(format!(
                "a project already exists for this AWS account {} with ID {}, \
                 please review or import by following this documentation: {}",
                desired.account_number, existing_id, IMPORT_DOCS_URL
            )));
        },
        ReconciliationOutcome::Adopted(project) | ReconciliationOutcome::Created(project) => {
            project
        },
    };

    state.apply_record(&project);
    state.account_number = Some(project.account_number);
    state.last_updated = Some(timestamp());
    to_state(&state)
}

/// Refresh server-owned fields. Looks the project up by account number, or
/// by id when the state only carries an id.
pub async fn read(api: &dyn NopsApi, current: Value) -> Result<Value, ProviderError> {
    let mut state: ProjectState = from_state(current)?;

    let project = match (
        state.account_number.as_deref().filter(|a| !a.is_empty()),
        state.id,
    ) {
        (Some(account_number), _) => refresh_by_account_number(api, account_number).await?,
        (None, Some(id)) => refresh_by_id(api, id).await?,
        (None, None) => {
            return Err(ProviderError::InvalidRequest(format!(
                "{} state carries neither account_number nor id",
                TYPE_NAME
            )))
        },
    };
    debug!(
        account_number = %project.account_number,
        name = %project.name,
        "Upstream project data received"
    );

    state.apply_record(&project);
    state.fill_identity(&project);
    to_state(&state)
}

/// Refresh server-owned fields for the planned account number. No remote
/// mutation happens; a project missing upstream is an error.
pub async fn update(api: &dyn NopsApi, planned: Value) -> Result<Value, ProviderError> {
    let mut state: ProjectState = from_state(planned)?;
    let account_number = required(&state.account_number, "account_number")?;

    let project = refresh_by_account_number(api, account_number).await?;
    debug!(
        account_number = %project.account_number,
        name = %project.name,
        "Upstream project data received"
    );

    state.apply_record(&project);
    state.last_updated = Some(timestamp());
    to_state(&state)
}

/// Import an existing project by its numeric nOps id.
pub async fn import(api: &dyn NopsApi, id: &str) -> Result<Value, ProviderError> {
    let id: i64 = id.trim().parse().map_err(|e| {
        ProviderError::InvalidRequest(format!(
            "Error parsing ID for import, please check for a correct project ID: {}",
            e
        ))
    })?;

    let project = refresh_by_id(api, id).await?;
    let mut state = ProjectState::default();
    state.apply_record(&project);
    state.fill_identity(&project);
    to_state(&state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNopsApi;
    use crate::validation::validate;
    use serde_json::json;

    fn onboarded(id: i64, account_number: &str) -> Project {
        Project {
            id,
            client: 8549,
            arn: format!("arn:aws:iam::{}:role/nops", account_number),
            bucket: "cur".to_string(),
            account_number: account_number.to_string(),
            name: "prod".to_string(),
            external_id: "ext".to_string(),
            role_name: "nops".to_string(),
        }
    }

    #[test]
    fn test_schema_requires_identity_fields() {
        let diagnostics = validate(&schema(), &json!({"name": "x"}));
        let missing: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(missing.contains(&"account_number"));
        assert!(missing.contains(&"master_payer_account_number"));
    }

    #[tokio::test]
    async fn test_create_rejects_with_import_hint() {
        let api = FakeNopsApi::with_projects(vec![onboarded(2, "580010171808")]);

        let err = create(
            &api,
            json!({
                "name": "x",
                "account_number": "580010171808",
                "master_payer_account_number": "580010171808"
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::AlreadyExists(_)));
        assert!(err.message().contains("with ID 2"));
        assert!(err.message().contains(IMPORT_DOCS_URL));
        assert_eq!(api.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_master_payer() {
        let api = FakeNopsApi::new();
        let err = create(&api, json!({"name": "x", "account_number": "1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_read_by_id_fills_identity() {
        let api = FakeNopsApi::with_projects(vec![onboarded(5, "471112641702")]);

        let state = read(&api, json!({"id": 5})).await.unwrap();

        assert_eq!(state["account_number"], "471112641702");
        assert_eq!(state["name"], "prod");
        assert_eq!(state["role_name"], "nops");
        assert!(state["master_payer_account_number"].is_null());
    }

    #[tokio::test]
    async fn test_read_keeps_configured_name() {
        let api = FakeNopsApi::with_projects(vec![onboarded(5, "471112641702")]);

        let state = read(
            &api,
            json!({"id": 5, "name": "mine", "account_number": "471112641702"}),
        )
        .await
        .unwrap();

        assert_eq!(state["name"], "mine");
        assert_eq!(state["bucket"], "cur");
    }

    #[tokio::test]
    async fn test_read_without_identity_is_invalid() {
        let api = FakeNopsApi::new();
        let err = read(&api, json!({"name": "x"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_import_parses_numeric_id() {
        let api = FakeNopsApi::with_projects(vec![onboarded(12, "471112641702")]);

        let state = import(&api, "12").await.unwrap();
        assert_eq!(state["id"], 12);
        assert_eq!(state["account_number"], "471112641702");

        let err = import(&api, "twelve").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        let err = import(&api, "13").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
