//! Knowledge base and data source client (agent build-time control plane)

use crate::client::{
    list_all, required_str, str_field, unwrap_object, DataSource, DataSourceApi, DataSourceSpec,
    ResourceClient,
};
use crate::transport::{ControlPlane, RpcRequest, Service};
use reconciler_core::{Error, ManagedResource, ResourceKind, ResourceSpec, Result, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Spec link carrying the service role ARN, filled in by the role step.
pub const ROLE_ARN_LINK: &str = "RoleArn";

/// Knowledge base statuses include DELETE_UNSUCCESSFUL in place of DELETE_FAILED.
const KB_FAILURE_STATUSES: &[&str] = &[StatusCode::FAILED, "DELETE_UNSUCCESSFUL"];

/// Vector store behind a knowledge base.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageBackend {
    /// Vector-bucket-backed storage.
    S3Vectors {
        vector_bucket_arn: String,
        index_name: String,
    },
    /// Search-cluster-backed storage.
    OpensearchServerless {
        collection_arn: String,
        vector_index_name: String,
        #[serde(default = "default_vector_field")]
        vector_field: String,
        #[serde(default = "default_text_field")]
        text_field: String,
        #[serde(default = "default_metadata_field")]
        metadata_field: String,
    },
}

fn default_vector_field() -> String {
    "embedding".into()
}

fn default_text_field() -> String {
    "text".into()
}

fn default_metadata_field() -> String {
    "metadata".into()
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::S3Vectors {
            vector_bucket_arn: String::new(),
            index_name: "bedrock-knowledge-base-index".into(),
        }
    }
}

impl StorageBackend {
    /// Pick the backend for one spec: `StorageType` selects the variant, and
    /// declared identifiers override the configured ones.
    pub fn resolve(configured: &StorageBackend, spec: &ResourceSpec) -> Result<StorageBackend> {
        let wanted = spec.property("StorageType").map(str::to_ascii_uppercase);
        let base = match (wanted.as_deref(), configured) {
            (None, b) => b.clone(),
            (Some("S3_VECTORS"), b @ StorageBackend::S3Vectors { .. }) => b.clone(),
            (Some("S3_VECTORS"), _) => StorageBackend::default(),
            (Some("OPENSEARCH_SERVERLESS"), b @ StorageBackend::OpensearchServerless { .. }) => {
                b.clone()
            }
            (Some("OPENSEARCH_SERVERLESS"), _) => StorageBackend::OpensearchServerless {
                collection_arn: String::new(),
                vector_index_name: "bedrock-knowledge-base-index".into(),
                vector_field: default_vector_field(),
                text_field: default_text_field(),
                metadata_field: default_metadata_field(),
            },
            (Some(other), _) => {
                return Err(Error::validation(format!("unsupported StorageType {other}")))
            }
        };

        let resolved = match base {
            StorageBackend::S3Vectors {
                vector_bucket_arn,
                index_name,
            } => StorageBackend::S3Vectors {
                vector_bucket_arn: spec
                    .property("VectorBucketArn")
                    .map(str::to_string)
                    .unwrap_or(vector_bucket_arn),
                index_name: spec
                    .property("IndexName")
                    .map(str::to_string)
                    .unwrap_or(index_name),
            },
            StorageBackend::OpensearchServerless {
                collection_arn,
                vector_index_name,
                vector_field,
                text_field,
                metadata_field,
            } => StorageBackend::OpensearchServerless {
                collection_arn: spec
                    .property("CollectionArn")
                    .map(str::to_string)
                    .unwrap_or(collection_arn),
                vector_index_name: spec
                    .property("IndexName")
                    .map(str::to_string)
                    .unwrap_or(vector_index_name),
                vector_field,
                text_field,
                metadata_field,
            },
        };
        resolved.check()?;
        Ok(resolved)
    }

    fn check(&self) -> Result<()> {
        match self {
            Self::S3Vectors {
                vector_bucket_arn, ..
            } if vector_bucket_arn.is_empty() => Err(Error::validation(
                "S3_VECTORS storage needs a vector bucket ARN",
            )),
            Self::OpensearchServerless { collection_arn, .. } if collection_arn.is_empty() => Err(
                Error::validation("OPENSEARCH_SERVERLESS storage needs a collection ARN"),
            ),
            _ => Ok(()),
        }
    }

    /// Wire form of `storageConfiguration`.
    pub fn to_request(&self) -> Value {
        match self {
            Self::S3Vectors {
                vector_bucket_arn,
                index_name,
            } => json!({
                "type": "S3_VECTORS",
                "s3VectorsConfiguration": {
                    "vectorBucketArn": vector_bucket_arn,
                    "indexName": index_name,
                }
            }),
            Self::OpensearchServerless {
                collection_arn,
                vector_index_name,
                vector_field,
                text_field,
                metadata_field,
            } => json!({
                "type": "OPENSEARCH_SERVERLESS",
                "opensearchServerlessConfiguration": {
                    "collectionArn": collection_arn,
                    "vectorIndexName": vector_index_name,
                    "fieldMapping": {
                        "vectorField": vector_field,
                        "textField": text_field,
                        "metadataField": metadata_field,
                    }
                }
            }),
        }
    }
}

pub struct KnowledgeBaseClient {
    rpc: Arc<dyn ControlPlane>,
    embedding_model_arn: String,
    storage: StorageBackend,
}

impl KnowledgeBaseClient {
    pub fn new(
        rpc: Arc<dyn ControlPlane>,
        embedding_model_arn: impl Into<String>,
        storage: StorageBackend,
    ) -> Self {
        Self {
            rpc,
            embedding_model_arn: embedding_model_arn.into(),
            storage,
        }
    }

    fn parse(value: &Value) -> Result<ManagedResource> {
        let kb = unwrap_object(value, "knowledgeBase");
        let id = required_str(kb, &["knowledgeBaseId"], "knowledge base")?;
        let name = str_field(kb, &["name"]).unwrap_or_default();
        let status = str_field(kb, &["status"]).unwrap_or_default();
        let mut resource = ManagedResource::new(id, name, status);
        resource.arn = str_field(kb, &["knowledgeBaseArn"]);
        if let Some(role_arn) = str_field(kb, &["roleArn"]) {
            resource.extra.insert(ROLE_ARN_LINK.into(), role_arn);
        }
        Ok(resource)
    }

    fn parse_data_source(value: &Value) -> Result<DataSource> {
        let ds = unwrap_object(value, "dataSource");
        Ok(DataSource {
            id: required_str(ds, &["dataSourceId"], "data source")?,
            name: str_field(ds, &["name"]).unwrap_or_default(),
            status: str_field(ds, &["status"]).unwrap_or_default().into(),
        })
    }
}

#[async_trait::async_trait]
impl ResourceClient for KnowledgeBaseClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::KnowledgeBase
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<ManagedResource>> {
        let request = RpcRequest::post(Service::BedrockAgent, "ListKnowledgeBases", "/knowledgebases/");
        let items = list_all(self.rpc.as_ref(), request, "knowledgeBaseSummaries").await?;
        items.iter().map(Self::parse).collect()
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<String> {
        let role_arn = spec.link(ROLE_ARN_LINK).ok_or_else(|| {
            Error::validation(format!("knowledge base {} has no service role", spec.name))
        })?;
        let storage = StorageBackend::resolve(&self.storage, spec)?;
        let embedding_model_arn = spec
            .property("EmbeddingModelArn")
            .unwrap_or(self.embedding_model_arn.as_str());
        let description = spec
            .property("Description")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Knowledge base for {} environment", spec.environment));

        let body = json!({
            "name": spec.name,
            "description": description,
            "roleArn": role_arn,
            "knowledgeBaseConfiguration": {
                "type": "VECTOR",
                "vectorKnowledgeBaseConfiguration": {
                    "embeddingModelArn": embedding_model_arn,
                }
            },
            "storageConfiguration": storage.to_request(),
            "clientToken": spec.client_token,
            "tags": { "ConfigHash": spec.config_hash.as_str(), "Environment": spec.environment },
        });
        let response = self
            .rpc
            .call(
                RpcRequest::put(Service::BedrockAgent, "CreateKnowledgeBase", "/knowledgebases/")
                    .with_body(body),
            )
            .await?;
        Ok(Self::parse(&response)?.id)
    }

    async fn get(&self, id: &str) -> Result<ManagedResource> {
        let response = self
            .rpc
            .call(RpcRequest::get(
                Service::BedrockAgent,
                "GetKnowledgeBase",
                format!("/knowledgebases/{id}"),
            ))
            .await?;
        Self::parse(&response)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.rpc
            .call(RpcRequest::delete(
                Service::BedrockAgent,
                "DeleteKnowledgeBase",
                format!("/knowledgebases/{id}"),
            ))
            .await?;
        Ok(())
    }

    fn failure_statuses(&self) -> &[&'static str] {
        KB_FAILURE_STATUSES
    }
}

#[async_trait::async_trait]
impl DataSourceApi for KnowledgeBaseClient {
    async fn list_data_sources(&self, knowledge_base_id: &str) -> Result<Vec<DataSource>> {
        let request = RpcRequest::post(
            Service::BedrockAgent,
            "ListDataSources",
            format!("/knowledgebases/{knowledge_base_id}/datasources/"),
        );
        let items = list_all(self.rpc.as_ref(), request, "dataSourceSummaries").await?;
        items.iter().map(Self::parse_data_source).collect()
    }

    async fn create_data_source(&self, knowledge_base_id: &str, spec: &DataSourceSpec) -> Result<String> {
        let body = json!({
            "name": spec.name,
            "description": spec.description,
            "dataSourceConfiguration": {
                "type": "S3",
                "s3Configuration": {
                    "bucketArn": spec.bucket_arn,
                    "inclusionPrefixes": spec.inclusion_prefixes,
                }
            },
            "clientToken": spec.client_token,
        });
        let response = self
            .rpc
            .call(
                RpcRequest::put(
                    Service::BedrockAgent,
                    "CreateDataSource",
                    format!("/knowledgebases/{knowledge_base_id}/datasources/"),
                )
                .with_body(body),
            )
            .await?;
        Ok(Self::parse_data_source(&response)?.id)
    }

    async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()> {
        self.rpc
            .call(RpcRequest::delete(
                Service::BedrockAgent,
                "DeleteDataSource",
                format!("/knowledgebases/{knowledge_base_id}/datasources/{data_source_id}"),
            ))
            .await?;
        Ok(())
    }
}
