//! cache_list tool implementation.
//!
//! Lists cache partitions, or the entries stored in one of them.

use mbm_sw_client::AssetCacheManager;
use mbm_sw_core::EntryMeta;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Partition to list entries of. Omit to list all partitions.
    #[serde(default)]
    pub partition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionSummary {
    pub name: String,
    pub entries: u64,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheListOutput {
    Partitions {
        /// Current worker phase.
        phase: String,
        partitions: Vec<PartitionSummary>,
    },
    Entries {
        partition: String,
        entries: Vec<EntryMeta>,
    },
}

/// Implementation of the cache_list tool.
pub async fn list_impl(manager: &AssetCacheManager, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let db = manager.storage();

    let output = match params.partition {
        Some(name) => {
            if !db.has_partition(&name).await? {
                return Err(ToolError::UnknownPartition(name).into());
            }
            let entries = db.open_partition(&name).await?.keys().await?;
            CacheListOutput::Entries { partition: name, entries }
        }
        None => {
            let mut partitions = Vec::new();
            for name in db.partition_names().await? {
                let entries = db.open_partition(&name).await?.count().await?;
                partitions.push(PartitionSummary { name, entries });
            }
            CacheListOutput::Partitions { phase: manager.phase().to_string(), partitions }
        }
    };

    json_result(&output)
}
