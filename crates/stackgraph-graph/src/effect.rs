//! Provisioning effects: the opaque call that turns a declared resource
//! into a live one.
//!
//! The graph only sequences calls and propagates results. What a call does
//! (talk to a control plane, simulate locally, record a journal) is up to
//! the implementation.

use crate::naming::NameGenerator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use stackgraph_core::{Attributes, ResourceId};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProvisioningFailure {
    pub message: String,
}

impl ProvisioningFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One provisioning call per resource, made in dependency order.
#[async_trait::async_trait]
pub trait ProvisioningEffect: Send + Sync {
    /// Create `id` of type `kind` from fully resolved `properties` and return
    /// the attributes the provider generated for it.
    async fn provision(
        &self,
        id: &ResourceId,
        kind: &str,
        properties: &Attributes,
    ) -> Result<Attributes, ProvisioningFailure>;
}

type ProvisionFn =
    dyn Fn(&ResourceId, &str, &Attributes) -> Result<Attributes, ProvisioningFailure> + Send + Sync;

/// Effect backed by a plain closure.
pub struct FnEffect {
    f: Box<ProvisionFn>,
}

impl FnEffect {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ResourceId, &str, &Attributes) -> Result<Attributes, ProvisioningFailure>
            + Send
            + Sync
            + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait::async_trait]
impl ProvisioningEffect for FnEffect {
    async fn provision(
        &self,
        id: &ResourceId,
        kind: &str,
        properties: &Attributes,
    ) -> Result<Attributes, ProvisioningFailure> {
        (self.f)(id, kind, properties)
    }
}

/// Local stand-in for a control plane. Fabricates provider-shaped
/// attributes (`arn`, a generated `<type>_id`, a `url` for domains) so a
/// stack can be resolved end to end without network access.
pub struct SimulatedEffect {
    partition: String,
    region: String,
    account: String,
    names: Mutex<Box<dyn NameGenerator>>,
}

impl SimulatedEffect {
    pub fn new(
        region: impl Into<String>,
        account: impl Into<String>,
        names: impl NameGenerator + 'static,
    ) -> Self {
        Self {
            partition: "aws".into(),
            region: region.into(),
            account: account.into(),
            names: Mutex::new(Box::new(names)),
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// `"SageMaker::UserProfile"` → `("sagemaker", "user-profile", "user_profile")`
    fn split_kind(kind: &str) -> (String, String, String) {
        let (service, ty) = kind.rsplit_once("::").unwrap_or(("resource", kind));
        let service = service.replace("::", "-").to_lowercase();
        let mut words: Vec<String> = Vec::new();
        for c in ty.chars() {
            if c.is_uppercase() || words.is_empty() {
                words.push(String::new());
            }
            if let Some(w) = words.last_mut() {
                w.extend(c.to_lowercase());
            }
        }
        (service, words.join("-"), words.join("_"))
    }

    /// Prefer a `*_name` property as the resource's physical name.
    fn physical_name(id: &ResourceId, properties: &Attributes) -> String {
        properties
            .iter()
            .find(|(k, v)| k.ends_with("name") && v.is_string())
            .and_then(|(_, v)| v.as_str().map(str::to_string))
            .unwrap_or_else(|| id.to_string())
    }
}

#[async_trait::async_trait]
impl ProvisioningEffect for SimulatedEffect {
    async fn provision(
        &self,
        id: &ResourceId,
        kind: &str,
        properties: &Attributes,
    ) -> Result<Attributes, ProvisioningFailure> {
        let (service, arn_type, attr_type) = Self::split_kind(kind);
        let token = {
            let mut names = self
                .names
                .lock()
                .map_err(|_| ProvisioningFailure::new("name generator poisoned"))?;
            names.token(12)
        };
        let prefix = attr_type.chars().next().unwrap_or('r');
        let generated_id = format!("{}-{}", prefix, token);
        let name = Self::physical_name(id, properties);

        let mut attrs = Attributes::new();
        attrs.insert(
            "arn".into(),
            Value::String(format!(
                "arn:{}:{}:{}:{}:{}/{}",
                self.partition, service, self.region, self.account, arn_type, name
            )),
        );
        attrs.insert(format!("{}_id", attr_type), Value::String(generated_id.clone()));
        if attr_type == "domain" {
            attrs.insert(
                "url".into(),
                Value::String(format!(
                    "https://{}.studio.{}.{}.aws",
                    generated_id, self.region, service
                )),
            );
        }
        tracing::debug!(resource = %id, kind, "simulated provisioning");
        Ok(attrs)
    }
}

/// Structured record of one provisioning call, one JSON object per line.
#[derive(Serialize, Clone, Debug)]
pub struct ProvisionEvent {
    pub ts: DateTime<Utc>,
    pub resource: String,
    pub kind: String,
    pub event: String,
    #[serde(flatten)]
    pub data: Value,
}

/// Wraps another effect and appends a [`ProvisionEvent`] per call to a
/// JSONL journal.
pub struct JournalingEffect<E> {
    inner: E,
    path: PathBuf,
}

impl<E: ProvisioningEffect> JournalingEffect<E> {
    pub fn new(inner: E, path: impl AsRef<Path>) -> Self {
        Self {
            inner,
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, event: &ProvisionEvent) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<E: ProvisioningEffect> ProvisioningEffect for JournalingEffect<E> {
    async fn provision(
        &self,
        id: &ResourceId,
        kind: &str,
        properties: &Attributes,
    ) -> Result<Attributes, ProvisioningFailure> {
        let result = self.inner.provision(id, kind, properties).await;
        let (event, data) = match &result {
            Ok(attrs) => ("provisioned", serde_json::json!({ "attributes": attrs })),
            Err(e) => ("failed", serde_json::json!({ "error": e.message })),
        };
        let record = ProvisionEvent {
            ts: Utc::now(),
            resource: id.to_string(),
            kind: kind.to_string(),
            event: event.to_string(),
            data,
        };
        self.append(&record).await.map_err(|e| {
            ProvisioningFailure::new(format!(
                "journal {} not writable: {}",
                self.path.display(),
                e
            ))
        })?;
        result
    }
}
