//! `nops_projects` data source: every project visible to the API key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::to_state;
use crate::client::NopsApi;
use crate::error::ProviderError;
use crate::models::Project;
use crate::schema::{Attribute, AttributeType, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "nops_projects";

/// Schema for `nops_projects`.
pub fn schema() -> Schema {
    let project = AttributeType::object([
        ("id", AttributeType::Int64),
        ("client", AttributeType::Int64),
        ("arn", AttributeType::String),
        ("bucket", AttributeType::String),
    ]);

    Schema::v0().with_attribute(
        "projects",
        Attribute::computed_list(project).with_description("nOps projects"),
    )
}

/// One entry of the `projects` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// nOps project identifier.
    pub id: i64,
    /// nOps client identifier.
    pub client: i64,
    /// IAM role ARN.
    pub arn: String,
    /// CUR bucket.
    pub bucket: String,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            client: project.client,
            arn: project.arn.clone(),
            bucket: project.bucket.clone(),
        }
    }
}

#[derive(Serialize)]
struct ProjectsState {
    projects: Vec<ProjectSummary>,
}

/// List projects in the order nOps returns them.
pub async fn read(api: &dyn NopsApi) -> Result<Value, ProviderError> {
    let projects = api.list_projects().await?;
    debug!(count = projects.len(), "Got project data");

    to_state(&ProjectsState {
        projects: projects.iter().map(ProjectSummary::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNopsApi;
    use crate::validation::validate;

    #[tokio::test]
    async fn test_read_keeps_remote_order() {
        let api = FakeNopsApi::with_projects(vec![
            Project {
                id: 20,
                client: 8549,
                arn: "arn:aws:iam::580010171808:role/na".to_string(),
                ..Default::default()
            },
            Project {
                id: 10,
                client: 8549,
                bucket: "cur".to_string(),
                ..Default::default()
            },
        ]);

        let state = read(&api).await.unwrap();

        assert_eq!(state["projects"][0]["id"], 20);
        assert_eq!(state["projects"][1]["id"], 10);
        assert_eq!(state["projects"][1]["client"], 8549);
        assert_eq!(
            state["projects"][0]["arn"],
            "arn:aws:iam::580010171808:role/na"
        );
        assert_eq!(state["projects"][0]["bucket"], "");
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let api = FakeNopsApi::new();
        let state = read(&api).await.unwrap();
        assert_eq!(state["projects"], serde_json::json!([]));
        assert!(validate(&schema(), &serde_json::json!({})).is_empty());
    }
}
