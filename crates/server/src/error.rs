//! Tool-level errors for the mbm-sw server.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised by tool argument handling, before the worker is involved.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., no purge target).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The named cache partition does not exist.
    #[error("UNKNOWN_PARTITION: {0}")]
    UnknownPartition(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::UnknownPartition(name) => (-32001, format!("no such partition: {name}")),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_codes() {
        let err: McpError = ToolError::InvalidInput("missing target".into()).into();
        assert_eq!(err.code.0, -32602);

        let err: McpError = ToolError::UnknownPartition("mbm-connect-static-v9".into()).into();
        assert_eq!(err.code.0, -32001);
        assert!(err.message.contains("mbm-connect-static-v9"));
    }
}
