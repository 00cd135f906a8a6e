//! Wire models for the nOps REST API.

use serde::{Deserialize, Serialize};

/// Marker the backend uses for fields it has not assigned yet.
pub const NOT_ASSIGNED: &str = "na";

/// A project record as returned by `/c/admin/projectaws/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// nOps project identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    /// nOps client identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub client: i64,
    /// IAM role ARN nOps assumes in the account.
    #[serde(default, deserialize_with = "null_as_default")]
    pub arn: String,
    /// CUR bucket, `"na"` until configured.
    #[serde(default, deserialize_with = "null_as_default")]
    pub bucket: String,
    /// AWS account id.
    #[serde(default, deserialize_with = "null_as_default")]
    pub account_number: String,
    /// Project name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Token nOps presents when assuming the role.
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_id: String,
    /// IAM role name, `"na"` while the integration is pending.
    #[serde(default, deserialize_with = "null_as_default")]
    pub role_name: String,
}

impl Project {
    /// Whether the backend discovered this account but has not finished
    /// integrating it.
    pub fn is_pending_integration(&self) -> bool {
        self.role_name == NOT_ASSIGNED
    }
}

/// `null` decodes to the type's zero value, as the backend sends `null` for
/// fields it has not filled in.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of a project create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// AWS account id.
    pub account_number: String,
    /// Master payer AWS account id.
    pub master_payer_account_number: String,
}

/// Body of a project PATCH call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProject {
    /// Project name.
    pub name: String,
    /// AWS account id.
    pub account_number: String,
}

/// Kind of integration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    /// First notification for an account.
    Create,
    /// Role, bucket or external id changed.
    Update,
}

impl RequestType {
    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
        }
    }
}

/// Properties block mirrored inside an integration event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProperties {
    /// CUR bucket name.
    #[serde(rename = "ServiceBucket")]
    pub service_bucket: String,
    /// AWS account id.
    #[serde(rename = "AWSAccountID")]
    pub aws_account_id: String,
    /// IAM role ARN.
    #[serde(rename = "RoleArn")]
    pub role_arn: String,
    /// External id for role assumption.
    #[serde(rename = "ExternalID")]
    pub external_id: String,
}

/// Body of a `/c/aws/integration/` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    /// IAM role ARN.
    pub role_arn: String,
    /// CUR bucket name.
    pub bucket_name: String,
    /// AWS account id, also sent as `X-Aws-Account-Number`.
    pub account_number: String,
    /// External id for role assumption.
    pub external_id: String,
    /// Event kind.
    #[serde(rename = "RequestType")]
    pub request_type: RequestType,
    /// Same values in the CloudFormation custom-resource layout.
    #[serde(rename = "ResourceProperties")]
    pub resource_properties: ResourceProperties,
}

impl Integration {
    /// Build an event, filling `ResourceProperties` from the same values.
    pub fn new(
        request_type: RequestType,
        role_arn: impl Into<String>,
        bucket_name: impl Into<String>,
        account_number: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        let role_arn = role_arn.into();
        let bucket_name = bucket_name.into();
        let account_number = account_number.into();
        let external_id = external_id.into();

        Self {
            resource_properties: ResourceProperties {
                service_bucket: bucket_name.clone(),
                aws_account_id: account_number.clone(),
                role_arn: role_arn.clone(),
                external_id: external_id.clone(),
            },
            role_arn,
            bucket_name,
            account_number,
            external_id,
            request_type,
        }
    }
}

/// Response of an integration call. Only transport success matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationResponse {
    /// Backend status string.
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_decoding_tolerates_nulls() {
        let project: Project = serde_json::from_value(json!({
            "id": 7,
            "client": 8549,
            "arn": null,
            "bucket": "na",
            "account_number": "580010171808",
            "name": "prod",
            "role_name": "na"
        }))
        .unwrap();

        assert_eq!(project.id, 7);
        assert_eq!(project.arn, "");
        assert_eq!(project.external_id, "");
        assert!(project.is_pending_integration());
    }

    #[test]
    fn test_listing_tolerates_null_numbers() {
        let projects: Vec<Project> = serde_json::from_str(
            r#"[{"id":1,"client":null,"account_number":"1","role_name":"na"},
                {"id":null,"client":8549,"account_number":"2","role_name":"nops"}]"#,
        )
        .unwrap();

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].client, 0);
        assert_eq!(projects[0].id, 1);
        assert_eq!(projects[1].id, 0);
        assert_eq!(projects[1].client, 8549);
    }

    #[test]
    fn test_integration_wire_layout() {
        let event = Integration::new(
            RequestType::Create,
            "arn:aws:iam::471112641702:role/nops",
            "cur-bucket",
            "471112641702",
            "ext-1",
        );
        let body = serde_json::to_value(&event).unwrap();

        assert_eq!(body["RequestType"], "Create");
        assert_eq!(body["account_number"], "471112641702");
        assert_eq!(body["ResourceProperties"]["ServiceBucket"], "cur-bucket");
        assert_eq!(body["ResourceProperties"]["AWSAccountID"], "471112641702");
        assert_eq!(
            body["ResourceProperties"]["RoleArn"],
            "arn:aws:iam::471112641702:role/nops"
        );
        assert_eq!(body["ResourceProperties"]["ExternalID"], "ext-1");
    }

    #[test]
    fn test_request_type_spelling() {
        assert_eq!(RequestType::Update.as_str(), "Update");
        assert_eq!(
            serde_json::to_value(RequestType::Update).unwrap(),
            json!("Update")
        );
    }
}
