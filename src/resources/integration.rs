//! `nops_integration`: tells nOps an account has been linked to a project.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{from_state, required, timestamp, to_state};
use crate::client::NopsApi;
use crate::error::ProviderError;
use crate::models::{Integration, RequestType};
use crate::reconcile::{find_by_account_number, notify_integration};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "nops_integration";

/// Schema for `nops_integration`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description(
            "Notifies the nOps platform a new account has linked to a project with the required input values. \
             This resource is mostly used only for secure connection with nOps APIs.",
        )
        .with_attribute(
            "id",
            Attribute::computed_int64().with_description("Integration identifier"),
        )
        .with_attribute(
            "last_updated",
            Attribute::computed_string()
                .with_description("Timestamp when the resource was last updated"),
        )
        .with_attribute(
            "role_arn",
            Attribute::required_string()
                .with_description("AWS IAM role to create/update account integration to nOps"),
        )
        .with_attribute(
            "bucket_name",
            Attribute::required_string()
                .with_description("AWS S3 bucket name to be used for CUR reports"),
        )
        .with_attribute(
            "external_id",
            Attribute::required_string().with_description(
                "Identifier to be used by nOps in order to securely assume a role in the target account",
            ),
        )
        .with_attribute(
            "aws_account_id",
            Attribute::required_string()
                .with_description("Target AWS account id to integrate with nOps"),
        )
}

/// State of a `nops_integration` instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationState {
    /// Id of the project linked to the account, `None` until nOps lists it.
    pub id: Option<i64>,
    /// Last time the provider wrote this state.
    pub last_updated: Option<String>,
    /// IAM role ARN.
    pub role_arn: Option<String>,
    /// CUR bucket name.
    pub bucket_name: Option<String>,
    /// External id for role assumption.
    pub external_id: Option<String>,
    /// AWS account id, the identity key used for refresh.
    pub aws_account_id: Option<String>,
}

/// Build an integration event from configured values.
pub(super) fn integration_event(
    request_type: RequestType,
    role_arn: &Option<String>,
    bucket_name: &Option<String>,
    aws_account_id: &Option<String>,
    external_id: &Option<String>,
) -> Result<Integration, ProviderError> {
    Ok(Integration::new(
        request_type,
        required(role_arn, "role_arn")?,
        required(bucket_name, "bucket_name")?,
        required(aws_account_id, "aws_account_id")?,
        required(external_id, "external_id")?,
    ))
}

async fn notify(
    api: &dyn NopsApi,
    planned: Value,
    request_type: RequestType,
) -> Result<IntegrationState, ProviderError> {
    let mut state: IntegrationState = from_state(planned)?;
    let event = integration_event(
        request_type,
        &state.role_arn,
        &state.bucket_name,
        &state.aws_account_id,
        &state.external_id,
    )?;

    if let Some(project) = notify_integration(api, &event).await? {
        state.id = Some(project.id);
    }
    state.last_updated = Some(timestamp());
    Ok(state)
}

/// Send a `Create` event and record the project id.
pub async fn create(api: &dyn NopsApi, planned: Value) -> Result<Value, ProviderError> {
    let state = notify(api, planned, RequestType::Create).await?;
    info!(
        id = ?state.id,
        aws_account_id = ?state.aws_account_id,
        "Created nOps integration resource"
    );
    to_state(&state)
}

/// Send an `Update` event and record the project id.
pub async fn update(api: &dyn NopsApi, planned: Value) -> Result<Value, ProviderError> {
    let state = notify(api, planned, RequestType::Update).await?;
    info!(
        id = ?state.id,
        last_updated = ?state.last_updated,
        "Updated nOps integration resource"
    );
    to_state(&state)
}

/// Refresh the project id for the account.
pub async fn read(api: &dyn NopsApi, current: Value) -> Result<Value, ProviderError> {
    let mut state: IntegrationState = from_state(current)?;
    let aws_account_id = required(&state.aws_account_id, "aws_account_id")?;

    let projects = api.list_projects().await?;
    match find_by_account_number(aws_account_id, &projects) {
        Some(project) => state.id = Some(project.id),
        None => warn!(aws_account_id, "No nOps project listed for integrated account"),
    }
    to_state(&state)
}

/// Import by AWS account id.
pub async fn import(api: &dyn NopsApi, aws_account_id: &str) -> Result<Value, ProviderError> {
    let state = IntegrationState {
        aws_account_id: Some(aws_account_id.trim().to_string()),
        ..Default::default()
    };
    read(api, to_state(&state)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Project;
    use crate::testing::FakeNopsApi;
    use serde_json::json;

    fn planned() -> Value {
        json!({
            "role_arn": "arn:aws:iam::471112641702:role/nops-integration",
            "bucket_name": "cur-bucket",
            "external_id": "ext-3",
            "aws_account_id": "471112641702",
            "id": null,
            "last_updated": null
        })
    }

    fn pending(id: i64) -> Project {
        Project {
            id,
            account_number: "471112641702".to_string(),
            role_name: "na".to_string(),
            bucket: "na".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_sends_create_event() {
        let api = FakeNopsApi::with_projects(vec![pending(3)]);

        let state = create(&api, planned()).await.unwrap();

        assert_eq!(state["id"], 3);
        assert!(state["last_updated"].is_string());
        let sent = api.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].request_type, RequestType::Create);
        assert_eq!(sent[0].resource_properties.service_bucket, "cur-bucket");
    }

    #[tokio::test]
    async fn test_update_sends_update_event() {
        let api = FakeNopsApi::with_projects(vec![pending(3)]);

        update(&api, planned()).await.unwrap();

        assert_eq!(api.notifications()[0].request_type, RequestType::Update);
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_notify_failure_surfaces() {
        let api = FakeNopsApi::with_projects(vec![pending(3)]);
        api.fail_mutations(400, "bad role");

        let err = create(&api, planned()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 400, .. }));
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_unlisted_account_leaves_id_null() {
        let api = FakeNopsApi::new();
        let state = create(&api, planned()).await.unwrap();
        assert!(state["id"].is_null());
    }

    #[tokio::test]
    async fn test_read_unlisted_account_keeps_id_null() {
        let api = FakeNopsApi::with_projects(vec![Project {
            id: 5,
            account_number: "580010171808".to_string(),
            role_name: "nops".to_string(),
            ..Default::default()
        }]);

        let state = read(&api, planned()).await.unwrap();

        assert!(state["id"].is_null());
        assert_eq!(state["aws_account_id"], "471112641702");
        assert_eq!(state["role_arn"], "arn:aws:iam::471112641702:role/nops-integration");
        assert_eq!(api.list_calls(), 1);
        assert_eq!(api.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_import_by_account_id() {
        let api = FakeNopsApi::with_projects(vec![pending(8)]);

        let state = import(&api, "471112641702").await.unwrap();

        assert_eq!(state["id"], 8);
        assert_eq!(state["aws_account_id"], "471112641702");
        assert_eq!(api.notify_calls(), 0);
    }
}
