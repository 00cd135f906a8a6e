//! `nops_notification`: integration event whose state mirrors the project
//! record nOps keeps for the account.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::integration::integration_event;
use super::{from_state, required, timestamp, to_state};
use crate::client::NopsApi;
use crate::error::ProviderError;
use crate::models::{Project, RequestType};
use crate::reconcile::{find_by_account_number, notify_integration};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "nops_notification";

/// Schema for `nops_notification`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Notification identifier"),
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

/// State of a `nops_notification` instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationState {
    /// Decimal project id.
    pub id: Option<String>,
    /// Last time the provider refreshed this state.
    pub last_updated: Option<String>,
    /// IAM role ARN, refreshed from the project's `arn`.
    pub role_arn: Option<String>,
    /// CUR bucket, refreshed from the project's `bucket`.
    pub bucket_name: Option<String>,
    /// External id for role assumption.
    pub external_id: Option<String>,
    /// AWS account id, the identity key used for refresh.
    pub aws_account_id: Option<String>,
}

impl NotificationState {
    fn apply_record(&mut self, project: &Project) {
        debug!(
            project_id = project.id,
            name = %project.name,
            "Upstream notification project data received"
        );
        self.id = Some(project.id.to_string());
        self.role_arn = Some(project.arn.clone());
        self.bucket_name = Some(project.bucket.clone());
        self.aws_account_id = Some(project.account_number.clone());
        self.external_id = Some(project.external_id.clone());
        self.last_updated = Some(timestamp());
    }
}

async fn notify(
    api: &dyn NopsApi,
    planned: Value,
    request_type: RequestType,
) -> Result<NotificationState, ProviderError> {
    let mut state: NotificationState = from_state(planned)?;
    let event = integration_event(
        request_type,
        &state.role_arn,
        &state.bucket_name,
        &state.aws_account_id,
        &state.external_id,
    )?;

    match notify_integration(api, &event).await? {
        Some(project) => state.apply_record(&project),
        None => state.last_updated = Some(timestamp()),
    }
    Ok(state)
}

/// Send a `Create` event and mirror the account's project.
pub async fn create(api: &dyn NopsApi, planned: Value) -> Result<Value, ProviderError> {
    let state = notify(api, planned, RequestType::Create).await?;
    info!(
        id = ?state.id,
        aws_account_id = ?state.aws_account_id,
        "Created nOps notification resource"
    );
    to_state(&state)
}

/// Send an `Update` event and mirror the account's project.
pub async fn update(api: &dyn NopsApi, planned: Value) -> Result<Value, ProviderError> {
    let state = notify(api, planned, RequestType::Update).await?;
    info!(
        id = ?state.id,
        external_id = ?state.external_id,
        last_updated = ?state.last_updated,
        "Updated nOps notification resource"
    );
    to_state(&state)
}

/// Mirror the account's project into state.
pub async fn read(api: &dyn NopsApi, current: Value) -> Result<Value, ProviderError> {
    let mut state: NotificationState = from_state(current)?;
    let aws_account_id = required(&state.aws_account_id, "aws_account_id")?;

    let projects = api.list_projects().await?;
    match find_by_account_number(aws_account_id, &projects) {
        Some(project) => state.apply_record(project),
        None => warn!(aws_account_id, "No nOps project listed for notified account"),
    }
    to_state(&state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNopsApi;
    use serde_json::json;

    fn planned() -> Value {
        json!({
            "role_arn": "arn:aws:iam::471112641702:role/nops-cur",
            "bucket_name": "cur-bucket",
            "external_id": "ext-9",
            "aws_account_id": "471112641702"
        })
    }

    #[tokio::test]
    async fn test_create_mirrors_project() {
        let api = FakeNopsApi::with_projects(vec![Project {
            id: 9,
            account_number: "471112641702".to_string(),
            role_name: "na".to_string(),
            ..Default::default()
        }]);

        let state = create(&api, planned()).await.unwrap();

        assert_eq!(state["id"], "9");
        assert_eq!(state["role_arn"], "arn:aws:iam::471112641702:role/nops-cur");
        assert_eq!(state["bucket_name"], "cur-bucket");
        assert_eq!(state["external_id"], "ext-9");
        assert_eq!(api.notify_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_sends_update_event() {
        let api = FakeNopsApi::with_projects(vec![Project {
            id: 9,
            account_number: "471112641702".to_string(),
            role_name: "nops-cur".to_string(),
            ..Default::default()
        }]);

        let state = update(&api, planned()).await.unwrap();

        let sent = api.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].request_type, RequestType::Update);
        assert_eq!(sent[0].account_number, "471112641702");
        assert_eq!(state["id"], "9");
        assert_eq!(state["bucket_name"], "cur-bucket");
        assert!(state["last_updated"].is_string());
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_unlisted_account() {
        let api = FakeNopsApi::new();

        let state = create(&api, planned()).await.unwrap();

        assert!(state["id"].is_null());
        assert!(state["last_updated"].is_string());
        assert_eq!(state["role_arn"], "arn:aws:iam::471112641702:role/nops-cur");
        assert_eq!(state["aws_account_id"], "471112641702");
        assert_eq!(api.notify_calls(), 1);
        assert_eq!(api.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_overwrites_from_record() {
        let api = FakeNopsApi::with_projects(vec![Project {
            id: 9,
            arn: "arn:aws:iam::471112641702:role/rotated".to_string(),
            bucket: "new-bucket".to_string(),
            account_number: "471112641702".to_string(),
            external_id: "ext-new".to_string(),
            role_name: "rotated".to_string(),
            ..Default::default()
        }]);

        let state = read(&api, planned()).await.unwrap();

        assert_eq!(state["role_arn"], "arn:aws:iam::471112641702:role/rotated");
        assert_eq!(state["bucket_name"], "new-bucket");
        assert_eq!(state["external_id"], "ext-new");
        assert_eq!(api.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_read_missing_account_keeps_state() {
        let api = FakeNopsApi::new();
        let state = read(&api, planned()).await.unwrap();
        assert!(state["id"].is_null());
        assert_eq!(state["bucket_name"], "cur-bucket");
    }
}
