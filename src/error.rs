use thiserror::Error;

/// Errors raised while validating a workflow or converting it from its wire format.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Failed to parse workflow JSON: {0}")]
    JsonParseError(String),

    #[error("Node id '{0}' is used more than once")]
    DuplicateNodeId(String),

    #[error("Edge '{edge_id}' references node '{missing_node_id}', which does not exist")]
    DanglingEdge {
        edge_id: String,
        missing_node_id: String,
    },

    #[error("Node '{node_id}' has an unregistered node type: '{type_name}'")]
    UnknownNodeType { node_id: String, type_name: String },

    #[error("Node '{node_id}' carries an invalid data payload: {message}")]
    InvalidNodeData { node_id: String, message: String },

    #[error("Sub-flow of loop '{loop_id}' is malformed: {message}")]
    InvalidSubFlow { loop_id: String, message: String },
}

/// Errors reported by the outbound persistence, session and run-trigger collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("I/O failure at '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Recording session '{0}' is not active")]
    UnknownSession(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Errors that can occur when loading or validating an `EditorConfig`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Could not read configuration file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
}
