use crate::cloud::IdentityResolver;
use crate::error::{Result, SagectlError};
use async_trait::async_trait;
use aws_sdk_sts::error::DisplayErrorContext;

/// Resolves the execution role from the credentials the process runs with
///
/// Works when the caller already is a role (notebook instances, CI runners
/// with an assumed role). Plain IAM users have no role to hand to the
/// hosting service and are rejected.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    sts: aws_sdk_sts::Client,
    iam: aws_sdk_iam::Client,
}

impl CallerIdentity {
    #[must_use]
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            sts: aws_sdk_sts::Client::new(sdk_config),
            iam: aws_sdk_iam::Client::new(sdk_config),
        }
    }
}

/// Caller ARN classified by what it says about the role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerArn {
    /// Already a role ARN, usable as-is
    Role(String),
    /// Session of an assumed role; the role name needs an IAM lookup for its path
    AssumedRole { account: String, role_name: String },
    NotARole(String),
}

/// Classify an STS caller ARN
#[must_use]
pub fn classify_caller_arn(arn: &str) -> CallerArn {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    let [_, _, service, _, account, resource] = parts.as_slice() else {
        return CallerArn::NotARole(arn.to_string());
    };

    match *service {
        "iam" if resource.starts_with("role/") => CallerArn::Role(arn.to_string()),
        "sts" => match resource.strip_prefix("assumed-role/") {
            Some(rest) => match rest.split('/').next().filter(|name| !name.is_empty()) {
                Some(role_name) => CallerArn::AssumedRole {
                    account: (*account).to_string(),
                    role_name: role_name.to_string(),
                },
                None => CallerArn::NotARole(arn.to_string()),
            },
            None => CallerArn::NotARole(arn.to_string()),
        },
        _ => CallerArn::NotARole(arn.to_string()),
    }
}

#[async_trait]
impl IdentityResolver for CallerIdentity {
    async fn resolve_role(&self) -> Result<String> {
        let output = self.sts.get_caller_identity().send().await.map_err(|e| {
            SagectlError::Identity(format!(
                "Failed to resolve caller identity: {}",
                DisplayErrorContext(&e)
            ))
        })?;

        let arn = output
            .arn()
            .ok_or_else(|| SagectlError::Identity("Caller identity has no ARN".to_string()))?;

        match classify_caller_arn(arn) {
            CallerArn::Role(role) => Ok(role),
            CallerArn::AssumedRole { account, role_name } => {
                tracing::debug!("Caller is a session of {role_name} in {account}");

                let role = self
                    .iam
                    .get_role()
                    .role_name(&role_name)
                    .send()
                    .await
                    .map_err(|e| {
                        SagectlError::Identity(format!(
                            "Failed to look up role {role_name}: {}",
                            aws_sdk_iam::error::DisplayErrorContext(&e)
                        ))
                    })?;

                role.role()
                    .map(|r| r.arn().to_string())
                    .ok_or_else(|| SagectlError::Identity(format!("Role {role_name} not found")))
            }
            CallerArn::NotARole(arn) => Err(SagectlError::Identity(format!(
                "The current AWS identity is not a role: {arn}"
            ))),
        }
    }
}
