//! Remote project reconciliation.
//!
//! nOps auto-discovers AWS accounts under a payer and lists them as projects
//! with `role_name == "na"` until the integration finishes. Creating a project
//! therefore has three outcomes, decided from a full listing of remote
//! projects:
//!
//! - the account is already onboarded (role assigned): reject, since a second
//!   project would conflict with it;
//! - the account was discovered but is pending: adopt the existing record
//!   without calling the create endpoint;
//! - the account is unknown: create it.
//!
//! Nothing here caches records. Every operation lists projects afresh.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::NopsApi;
use crate::error::ProviderError;
use crate::models::{Integration, NewProject, Project};

/// A project as declared by the practitioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredProject {
    /// Project name.
    pub name: String,
    /// AWS account to onboard.
    pub account_number: String,
    /// Master payer account of the organization.
    pub master_payer_account_number: String,
}

impl From<&DesiredProject> for NewProject {
    fn from(desired: &DesiredProject) -> Self {
        NewProject {
            name: desired.name.clone(),
            account_number: desired.account_number.clone(),
            master_payer_account_number: desired.master_payer_account_number.clone(),
        }
    }
}

/// Result of reconciling a desired project against nOps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// The account is already fully onboarded by project `existing_id`.
    Rejected {
        /// Id of the onboarded project.
        existing_id: i64,
    },
    /// The account was auto-discovered and is pending integration.
    Adopted(Project),
    /// A new project was created.
    Created(Project),
}

impl ReconciliationOutcome {
    /// The record local state should bind to, if any.
    pub fn record(&self) -> Option<&Project> {
        match self {
            Self::Rejected { .. } => None,
            Self::Adopted(project) | Self::Created(project) => Some(project),
        }
    }
}

/// What to do for a desired project, before any remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Refuse, the account belongs to an onboarded project.
    Reject {
        /// Id of the onboarded project.
        existing_id: i64,
    },
    /// Bind to this pending record.
    Adopt(&'a Project),
    /// Issue a create call.
    Create,
}

/// Decide the reconciliation branch. The first record with a matching
/// account number determines the outcome.
pub fn decide<'a>(desired: &DesiredProject, all_remote: &'a [Project]) -> Decision<'a> {
    match find_by_account_number(&desired.account_number, all_remote) {
        Some(project) if project.is_pending_integration() => Decision::Adopt(project),
        Some(project) => Decision::Reject {
            existing_id: project.id,
        },
        None => Decision::Create,
    }
}

/// First project whose account number matches.
pub fn find_by_account_number<'a>(
    account_number: &str,
    all_remote: &'a [Project],
) -> Option<&'a Project> {
    all_remote
        .iter()
        .find(|project| project.account_number == account_number)
}

/// First project whose id matches.
pub fn find_by_id(id: i64, all_remote: &[Project]) -> Option<&Project> {
    all_remote.iter().find(|project| project.id == id)
}

/// List remote projects and reconcile `desired` against them.
///
/// Issues at most one create call. `Rejected` is returned as an outcome, the
/// caller decides how to surface it.
pub async fn reconcile(
    api: &dyn NopsApi,
    desired: &DesiredProject,
) -> Result<ReconciliationOutcome, ProviderError> {
    let projects = api.list_projects().await?;

    match decide(desired, &projects) {
        Decision::Reject { existing_id } => {
            warn!(
                account_number = %desired.account_number,
                existing_id,
                "Account already onboarded by another project"
            );
            Ok(ReconciliationOutcome::Rejected { existing_id })
        },
        Decision::Adopt(project) => {
            debug!(
                project_id = project.id,
                "Project pending integration found, skipping project creation"
            );
            Ok(ReconciliationOutcome::Adopted(project.clone()))
        },
        Decision::Create => {
            let created = api.create_project(&NewProject::from(desired)).await?;
            info!(
                project_id = created.id,
                name = %created.name,
                "Created nOps project"
            );
            Ok(ReconciliationOutcome::Created(created))
        },
    }
}

/// List remote projects and return the one for `account_number`.
pub async fn refresh_by_account_number(
    api: &dyn NopsApi,
    account_number: &str,
) -> Result<Project, ProviderError> {
    let projects = api.list_projects().await?;
    find_by_account_number(account_number, &projects)
        .cloned()
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Project for AWS account {} wasn't found in nOps, please check or remove from state",
                account_number
            ))
        })
}

/// List remote projects and return the one with `id`.
pub async fn refresh_by_id(api: &dyn NopsApi, id: i64) -> Result<Project, ProviderError> {
    let projects = api.list_projects().await?;
    find_by_id(id, &projects).cloned().ok_or_else(|| {
        ProviderError::NotFound(format!(
            "Project {} wasn't found in nOps, please check or remove from state",
            id
        ))
    })
}

/// Send an integration event, then look up the account's project so the
/// caller can pick up the id the backend assigned.
///
/// Returns `None` if the account is not listed after the notification.
pub async fn notify_integration(
    api: &dyn NopsApi,
    integration: &Integration,
) -> Result<Option<Project>, ProviderError> {
    api.notify_integration(integration).await?;

    let projects = api.list_projects().await?;
    let project = find_by_account_number(&integration.account_number, &projects).cloned();
    match &project {
        Some(project) => debug!(
            project_id = project.id,
            name = %project.name,
            "Upstream project data received after integration event"
        ),
        None => warn!(
            account_number = %integration.account_number,
            "No nOps project listed for account after integration event"
        ),
    }
    Ok(project)
}
