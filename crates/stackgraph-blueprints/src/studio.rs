//! Studio stack: an execution identity with the notebook and image-build
//! grants, a Studio domain that runs as it, and a default user profile.

use crate::params::{NetworkParams, StackParams, StudioParams};
use serde_json::{json, Value};
use stackgraph_core::{Error, OutputValue, PropertyValue, Result};
use stackgraph_graph::{NameGenerator, ResourceNode, StackGraph};
use stackgraph_policy::{CapabilityDocument, CapabilityStatement, Identity};
use tracing::info;

pub const EXECUTION_ROLE_PREFIX: &str = "AmazonSageMakerStudioExecutionRole";
pub const DOMAIN_ID: &str = "SageMakerStudioDomain";
pub const USER_PROFILE_ID: &str = "SageMakerStudioUserProfile";

pub const EXECUTION_POLICY: &str = "sagemaker-execution-policy";
pub const CUSTOM_ACCESS_POLICY: &str = "sagemaker-custom-access-policy";
pub const DOCKER_BUILD_POLICY: &str = "sagemaker-docker-build-policy";

const PARTITION: &str = "aws";
const TRUSTED_SERVICES: [&str; 2] = ["sagemaker.amazonaws.com", "codebuild.amazonaws.com"];
const AUTH_MODES: [&str; 2] = ["IAM", "SSO"];
const NETWORK_ACCESS_TYPES: [&str; 2] = ["PublicInternetOnly", "VpcOnly"];

/// Object access across every bucket.
pub fn execution_policy() -> Result<CapabilityDocument> {
    CapabilityDocument::from_statements([CapabilityStatement::allow(
        [
            "s3:GetObject",
            "s3:PutObject",
            "s3:DeleteObject",
            "s3:ListBucket",
        ],
        ["arn:aws:s3:::*"],
    )?])
}

/// Search-domain HTTP access and secret reads, scoped to one region and account.
pub fn custom_access_policy(region: &str, account: &str) -> Result<CapabilityDocument> {
    CapabilityDocument::from_statements([
        CapabilityStatement::allow(
            ["es:ESHttp*"],
            [format!("arn:aws:es:{}:{}:domain/*", region, account)],
        )?
        .with_sid("ReadFromOpenSearch")?,
        CapabilityStatement::allow(
            ["secretsmanager:GetSecretValue"],
            [format!("arn:aws:secretsmanager:{}:{}:secret:*", region, account)],
        )?
        .with_sid("ReadSecretFromSecretsManager")?,
    ])
}

/// Grants the in-notebook image build tooling needs: build projects, their
/// logs, registry push/pull, staging buckets, and passing the role to the
/// build service.
pub fn docker_build_policy() -> Result<CapabilityDocument> {
    CapabilityDocument::from_statements([
        CapabilityStatement::allow(
            [
                "codebuild:DeleteProject",
                "codebuild:CreateProject",
                "codebuild:BatchGetBuilds",
                "codebuild:StartBuild",
            ],
            ["arn:aws:codebuild:*:*:project/sagemaker-studio*"],
        )?,
        CapabilityStatement::allow(
            ["logs:CreateLogStream"],
            ["arn:aws:logs:*:*:log-group:/aws/codebuild/sagemaker-studio*"],
        )?,
        CapabilityStatement::allow(
            ["logs:GetLogEvents", "logs:PutLogEvents"],
            ["arn:aws:logs:*:*:log-group:/aws/codebuild/sagemaker-studio*:log-stream:*"],
        )?,
        CapabilityStatement::allow(["logs:CreateLogGroup"], ["*"])?,
        CapabilityStatement::allow(
            [
                "ecr:BatchGetImage",
                "ecr:BatchCheckLayerAvailability",
                "ecr:CompleteLayerUpload",
                "ecr:DescribeImages",
                "ecr:DescribeRepositories",
                "ecr:GetDownloadUrlForLayer",
                "ecr:InitiateLayerUpload",
                "ecr:ListImages",
                "ecr:PutImage",
                "ecr:UploadLayerPart",
                "ecr:CreateRepository",
                "ecr:GetAuthorizationToken",
                "ec2:DescribeAvailabilityZones",
            ],
            ["*"],
        )?
        .with_sid("ReadWriteFromECR")?,
        CapabilityStatement::allow(["ecr:GetAuthorizationToken"], ["*"])?,
        CapabilityStatement::allow(
            ["s3:GetObject", "s3:DeleteObject", "s3:PutObject"],
            ["arn:aws:s3:::sagemaker-*/*"],
        )?,
        CapabilityStatement::allow(["s3:CreateBucket"], ["arn:aws:s3:::sagemaker*"])?,
        CapabilityStatement::allow(["iam:GetRole", "iam:ListRoles"], ["*"])?,
        CapabilityStatement::allow(["iam:PassRole"], ["arn:aws:iam::*:role/*"])?
            .with_condition(
                "StringLikeIfExists",
                "iam:PassedToService",
                ["codebuild.amazonaws.com"],
            ),
    ])
}

/// The finalized execution identity. Its name carries a five-digit suffix
/// drawn (with replacement) from `names`.
pub fn execution_role(
    stack: &StackParams,
    studio: &StudioParams,
    names: &mut dyn NameGenerator,
) -> Result<Identity> {
    let mut role = Identity::new(format!("{}-{}", EXECUTION_ROLE_PREFIX, names.choose_digits(5)))
        .with_path("/");
    for service in TRUSTED_SERVICES {
        role.add_trust_principal(service)?;
    }
    role.attach_inline_document(EXECUTION_POLICY, &execution_policy()?)?;
    role.attach_inline_document(
        CUSTOM_ACCESS_POLICY,
        &custom_access_policy(&stack.region, &stack.account)?,
    )?;
    role.attach_inline_document(DOCKER_BUILD_POLICY, &docker_build_policy()?)?;
    for managed in &studio.managed_policies {
        role.attach_managed_capability(managed.as_str())?;
    }
    role.finalize()?;
    Ok(role)
}

fn check_params(network: &NetworkParams, studio: &StudioParams) -> Result<()> {
    if network.vpc_id.trim().is_empty() {
        return Err(Error::configuration("studio domain needs a vpc id"));
    }
    if network.public_subnet_ids.is_empty() {
        return Err(Error::configuration(
            "studio domain needs at least one public subnet",
        ));
    }
    if !AUTH_MODES.contains(&studio.auth_mode.as_str()) {
        return Err(Error::configuration(format!(
            "unsupported auth mode {:?}, expected one of {:?}",
            studio.auth_mode, AUTH_MODES
        )));
    }
    if !NETWORK_ACCESS_TYPES.contains(&studio.app_network_access_type.as_str()) {
        return Err(Error::configuration(format!(
            "unsupported app network access type {:?}, expected one of {:?}",
            studio.app_network_access_type, NETWORK_ACCESS_TYPES
        )));
    }
    if studio.user_profile_name.trim().is_empty() {
        return Err(Error::configuration("user profile name must not be blank"));
    }
    Ok(())
}

/// JupyterServer apps only accept the `system` instance type.
fn jupyter_server_settings(image_arn: Option<&str>) -> Value {
    let mut resource_spec = json!({ "instance_type": "system" });
    if let Some(arn) = image_arn {
        resource_spec["sage_maker_image_arn"] = json!(arn);
    }
    json!({ "jupyter_server_app_settings": { "default_resource_spec": resource_spec } })
}

/// Declare the studio stack. The returned graph is still `Building`.
pub fn studio_stack(
    stack: &StackParams,
    network: &NetworkParams,
    studio: &StudioParams,
    names: &mut dyn NameGenerator,
) -> Result<StackGraph> {
    check_params(network, studio)?;

    let role = execution_role(stack, studio, names)?;
    let role_name = role.name().clone();

    let mut graph = StackGraph::new(stack.name.as_str()).with_environment(PARTITION, stack.account.as_str());
    graph.add_identity(role)?;

    graph.add_node(
        ResourceNode::new(DOMAIN_ID, "SageMaker::Domain")
            .with_property("auth_mode", studio.auth_mode.as_str())
            .with_property("domain_name", studio.domain_name.as_str())
            .with_property("execution_role", PropertyValue::role(role_name.clone()))
            .with_property("vpc_id", network.vpc_id.as_str())
            .with_property("subnet_ids", PropertyValue::literal(json!(network.public_subnet_ids)))
            .with_property(
                "app_network_access_type",
                studio.app_network_access_type.as_str(),
            ),
    )?;

    graph.add_node(
        ResourceNode::new(USER_PROFILE_ID, "SageMaker::UserProfile")
            .with_property("domain_id", PropertyValue::reference(DOMAIN_ID, "domain_id"))
            .with_property("user_profile_name", studio.user_profile_name.as_str())
            .with_property(
                "user_settings",
                PropertyValue::literal(jupyter_server_settings(
                    studio.jupyterlab_image_arn.as_deref(),
                )),
            ),
    )?;

    graph.add_output(
        format!("{}-DomainUrl", stack.name),
        OutputValue::reference(DOMAIN_ID, "url"),
    )?;
    graph.add_output(
        format!("{}-DomainId", stack.name),
        OutputValue::reference(USER_PROFILE_ID, "domain_id"),
    )?;
    graph.add_output(
        format!("{}-UserProfileName", stack.name),
        OutputValue::reference(USER_PROFILE_ID, "user_profile_name"),
    )?;

    info!(stack = %stack.name, role = %role_name, "studio stack declared");
    Ok(graph)
}
