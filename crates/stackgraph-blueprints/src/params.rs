//! Stack parameters. Every section deserializes with defaults so a partial
//! config file only needs to name what it changes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackParams {
    /// Stack name; prefixes output and export names.
    pub name: String,
    /// Region substituted into resource patterns.
    pub region: String,
    /// Account substituted into resource patterns.
    pub account: String,
    /// Seed for generated name suffixes.
    pub seed: u64,
}

impl Default for StackParams {
    fn default() -> Self {
        Self {
            name: "RagWithAos".into(),
            region: "us-east-1".into(),
            account: "123456789012".into(),
            seed: 47,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    pub vpc_id: String,
    pub public_subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioParams {
    pub domain_name: String,
    /// `IAM` or `SSO`.
    pub auth_mode: String,
    /// `PublicInternetOnly` or `VpcOnly`.
    pub app_network_access_type: String,
    pub user_profile_name: String,
    /// Image for the default JupyterServer app; omitted when unset.
    pub jupyterlab_image_arn: Option<String>,
    /// Externally managed capability bundles attached to the execution role.
    pub managed_policies: Vec<String>,
}

impl Default for StudioParams {
    fn default() -> Self {
        Self {
            domain_name: "llm-app-rag-workshop".into(),
            auth_mode: "IAM".into(),
            app_network_access_type: "PublicInternetOnly".into(),
            user_profile_name: "default-user".into(),
            jupyterlab_image_arn: None,
            managed_policies: vec![
                "AmazonSageMakerFullAccess".into(),
                "AmazonSageMakerCanvasFullAccess".into(),
                "AWSCloudFormationReadOnlyAccess".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointParams {
    pub model_id: String,
    pub model_version: String,
    pub instance_type: String,
    /// The model license must be accepted before the endpoint can be declared.
    pub accept_eula: bool,
    pub name_prefix: String,
}

impl Default for EndpointParams {
    fn default() -> Self {
        Self {
            model_id: "meta-textgeneration-llama-2-7b".into(),
            model_version: "2.1.0".into(),
            instance_type: "ml.g5.2xlarge".into(),
            accept_eula: true,
            name_prefix: "llama2-endpoint".into(),
        }
    }
}
