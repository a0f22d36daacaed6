//! Knowledge base bundle: service role, knowledge base, data source
//!
//! Create order is role -> propagation delay -> knowledge base -> data source.
//! Teardown runs the reverse and treats anything already gone as done.

use crate::reconciler::ProvisionSteps;
use reconciler_clients::{DataSourceApi, DataSourceSpec, RoleApi, StorageBackend, ROLE_ARN_LINK};
use reconciler_core::{
    tolerate_not_found, Error, ManagedResource, Properties, ResourceSpec, Result, ENVIRONMENT_KEY,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Attribute carrying the data source id.
pub const DATA_SOURCE_ID_ATTRIBUTE: &str = "DataSourceId";

const S3_ACCESS_POLICY: &str = "S3Access";
const BEDROCK_ACCESS_POLICY: &str = "BedrockAccess";

/// Account-level settings the bundle needs beyond the declared properties.
#[derive(Clone, Debug)]
pub struct KnowledgeBaseSettings {
    pub region: String,
    pub account_id: String,
    pub propagation_delay: Duration,
    /// Bucket name template; `{account_id}` and `{environment}` are substituted.
    pub documents_bucket: String,
    /// Vector bucket name template, granted to the role alongside documents.
    pub vectors_bucket: String,
    pub inclusion_prefix: String,
    /// Configured vector store, checked against each spec before the role exists.
    pub storage: StorageBackend,
}

impl Default for KnowledgeBaseSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            account_id: String::new(),
            propagation_delay: Duration::from_secs(10),
            documents_bucket: "agentcore-documents-{account_id}-{environment}".into(),
            vectors_bucket: "agentcore-vectors-{account_id}-{environment}".into(),
            inclusion_prefix: "documents/".into(),
            storage: StorageBackend::default(),
        }
    }
}

impl KnowledgeBaseSettings {
    fn bucket_name(&self, template: &str, environment: &str) -> Result<String> {
        if template.contains("{account_id}") && self.account_id.is_empty() {
            return Err(Error::Config(
                "knowledge base buckets need control_plane.account_id".into(),
            ));
        }
        Ok(template
            .replace("{account_id}", &self.account_id)
            .replace("{environment}", environment))
    }
}

pub struct KnowledgeBaseSteps {
    roles: Arc<dyn RoleApi>,
    data_sources: Arc<dyn DataSourceApi>,
    settings: KnowledgeBaseSettings,
}

impl KnowledgeBaseSteps {
    pub fn new(
        roles: Arc<dyn RoleApi>,
        data_sources: Arc<dyn DataSourceApi>,
        settings: KnowledgeBaseSettings,
    ) -> Self {
        Self {
            roles,
            data_sources,
            settings,
        }
    }

    /// `RoleName` if declared, else one role per environment.
    pub fn role_name(properties: &Properties) -> String {
        properties
            .get("RoleName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("bedrock-knowledge-base-role-{}", environment_of(properties)))
    }

    pub fn trust_policy(&self) -> Value {
        let account = &self.settings.account_id;
        json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "Service": "bedrock.amazonaws.com" },
                "Action": "sts:AssumeRole",
                "Condition": {
                    "StringEquals": { "aws:SourceAccount": account },
                    "ArnLike": {
                        "aws:SourceArn": format!(
                            "arn:aws:bedrock:{}:{}:knowledge-base/*",
                            self.settings.region, account
                        )
                    }
                }
            }]
        })
    }

    /// Inline policies attached to a freshly created role.
    pub fn inline_policies(&self, environment: &str) -> Result<Vec<(&'static str, Value)>> {
        let documents = self.settings.bucket_name(&self.settings.documents_bucket, environment)?;
        let vectors = self.settings.bucket_name(&self.settings.vectors_bucket, environment)?;
        let s3 = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:ListBucket"],
                "Resource": [
                    format!("arn:aws:s3:::{documents}"),
                    format!("arn:aws:s3:::{documents}/*"),
                    format!("arn:aws:s3:::{vectors}"),
                    format!("arn:aws:s3:::{vectors}/*"),
                ]
            }]
        });
        let bedrock = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": ["bedrock:InvokeModel"],
                "Resource": [format!("arn:aws:bedrock:{}::foundation-model/*", self.settings.region)]
            }]
        });
        Ok(vec![(S3_ACCESS_POLICY, s3), (BEDROCK_ACCESS_POLICY, bedrock)])
    }

    /// The single data source every knowledge base gets.
    pub fn data_source_spec(&self, spec: &ResourceSpec) -> Result<DataSourceSpec> {
        let bucket_arn = match spec.property("DocumentsBucketArn") {
            Some(arn) => arn.to_string(),
            None => format!(
                "arn:aws:s3:::{}",
                self.settings
                    .bucket_name(&self.settings.documents_bucket, &spec.environment)?
            ),
        };
        let inclusion_prefix = spec
            .property("InclusionPrefix")
            .unwrap_or(self.settings.inclusion_prefix.as_str())
            .to_string();
        Ok(DataSourceSpec {
            name: spec
                .property("DataSourceName")
                .map(str::to_string)
                .unwrap_or_else(|| format!("s3-documents-{}", spec.environment)),
            description: format!("S3 documents for {} environment", spec.environment),
            bucket_arn,
            inclusion_prefixes: vec![inclusion_prefix],
            client_token: spec.client_token.clone(),
        })
    }

    async fn ensure_role(&self, spec: &ResourceSpec) -> Result<String> {
        let name = Self::role_name(&spec.properties);
        if let Some(role) = self.roles.get_role(&name).await? {
            info!("knowledge base role {} exists: {}", name, role.arn);
            return Ok(role.arn);
        }

        let policies = self.inline_policies(&spec.environment)?;
        let description = format!("IAM role for Bedrock Knowledge Base ({})", spec.environment);
        let role = self
            .roles
            .create_role(&name, &self.trust_policy(), &description)
            .await?;
        for (policy_name, document) in &policies {
            self.roles.put_role_policy(&name, policy_name, document).await?;
        }
        info!(
            "knowledge base role {} created, waiting {}s for propagation",
            role.arn,
            self.settings.propagation_delay.as_secs()
        );
        tokio::time::sleep(self.settings.propagation_delay).await;
        Ok(role.arn)
    }

    async fn ensure_data_source(&self, knowledge_base_id: &str, spec: &DataSourceSpec) -> Result<String> {
        let existing = self.data_sources.list_data_sources(knowledge_base_id).await?;
        if let Some(found) = existing.into_iter().find(|ds| ds.name == spec.name) {
            info!("data source {} exists on {}: {}", spec.name, knowledge_base_id, found.id);
            return Ok(found.id);
        }
        let id = self
            .data_sources
            .create_data_source(knowledge_base_id, spec)
            .await?;
        info!("data source {} created on {}: {}", spec.name, knowledge_base_id, id);
        Ok(id)
    }
}

#[async_trait::async_trait]
impl ProvisionSteps for KnowledgeBaseSteps {
    async fn prepare(&self, spec: &mut ResourceSpec) -> Result<()> {
        // Surface configuration errors before the role exists.
        self.data_source_spec(spec)?;
        StorageBackend::resolve(&self.settings.storage, spec)?;
        let role_arn = self.ensure_role(spec).await?;
        spec.links.insert(ROLE_ARN_LINK.into(), role_arn);
        Ok(())
    }

    async fn finish(&self, resource: &mut ManagedResource, spec: &ResourceSpec) -> Result<()> {
        let data_source = self.data_source_spec(spec)?;
        let data_source_id = self.ensure_data_source(&resource.id, &data_source).await?;
        resource
            .extra
            .insert(DATA_SOURCE_ID_ATTRIBUTE.into(), data_source_id);
        if let Some(role_arn) = spec.link(ROLE_ARN_LINK) {
            resource
                .extra
                .entry(ROLE_ARN_LINK.into())
                .or_insert_with(|| role_arn.to_string());
        }
        Ok(())
    }

    async fn before_delete(&self, id: &str) -> Result<()> {
        let data_sources = tolerate_not_found(self.data_sources.list_data_sources(id).await)?
            .unwrap_or_default();
        for ds in data_sources {
            match tolerate_not_found(self.data_sources.delete_data_source(id, &ds.id).await)? {
                Some(()) => info!("data source {} deleted from {}", ds.id, id),
                None => warn!("data source {} already absent from {}", ds.id, id),
            }
        }
        Ok(())
    }

    async fn after_delete(&self, _id: &str, properties: &Properties) -> Result<()> {
        let name = Self::role_name(properties);
        let policies = tolerate_not_found(self.roles.list_role_policies(&name).await)?
            .unwrap_or_default();
        for policy in &policies {
            if tolerate_not_found(self.roles.delete_role_policy(&name, policy).await)?.is_none() {
                warn!("policy {} already absent from role {}", policy, name);
            }
        }
        match tolerate_not_found(self.roles.delete_role(&name).await)? {
            Some(()) => info!("knowledge base role {} deleted", name),
            None => warn!("knowledge base role {} already absent", name),
        }
        Ok(())
    }
}

fn environment_of(properties: &Properties) -> &str {
    properties
        .get(ENVIRONMENT_KEY)
        .and_then(Value::as_str)
        .unwrap_or("development")
}
