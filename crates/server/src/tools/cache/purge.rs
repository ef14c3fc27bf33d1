//! cache_purge tool implementation.
//!
//! Deletes a whole partition, or entries older than a given age.

use std::time::Duration;

use mbm_sw_client::AssetCacheManager;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Partition to purge. Alone, deletes the whole partition. With
    /// `older_than_secs`, defaults to the dynamic partition.
    #[serde(default)]
    pub partition: Option<String>,

    /// Delete entries stored more than this many seconds ago.
    #[serde(default)]
    pub older_than_secs: Option<u64>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Partitions deleted outright.
    pub deleted_partitions: Vec<String>,
    /// Number of entries deleted by age.
    pub deleted_entries: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(manager: &AssetCacheManager, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let db = manager.storage();
    let mut output = CachePurgeOutput { deleted_partitions: Vec::new(), deleted_entries: 0 };

    match (params.partition, params.older_than_secs) {
        (None, None) => {
            return Err(ToolError::InvalidInput(
                "At least one of partition or older_than_secs must be specified".to_string(),
            )
            .into());
        }
        (partition, Some(secs)) => {
            let name = partition.unwrap_or_else(|| manager.layout().dynamic_partition.clone());
            if !db.has_partition(&name).await? {
                return Err(ToolError::UnknownPartition(name).into());
            }
            output.deleted_entries = db
                .open_partition(&name)
                .await?
                .purge_older_than(Duration::from_secs(secs))
                .await?;
        }
        (Some(name), None) => {
            if !db.delete_partition(&name).await? {
                return Err(ToolError::UnknownPartition(name).into());
            }
            tracing::info!(partition = %name, "partition purged");
            output.deleted_partitions.push(name);
        }
    }

    json_result(&output)
}
