//! Prelude module for convenient imports
//!
//! Re-exports the types most callers need to open a flow, record into it, edit it and run it.
//!
//! # Example
//!
//! ```rust,no_run
//! use kiroku::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let config = EditorConfig::from_file("kiroku.json")?;
//! let persistence = JsonFilePersistence::new("flows");
//! let mut editor = Editor::open("checkout", config, Box::new(persistence))?;
//!
//! editor.start_run();
//! for event in Simulator::new("checkout", editor.workflow()) {
//!     editor.handle_progress(&ProgressMessage::ActionProgress(event));
//! }
//! println!("Run finished as {:?}", editor.run_state());
//! # Ok(())
//! # }
//! ```

// Editor facade and configuration
pub use crate::config::{EditorConfig, SavePolicy};
pub use crate::editor::{Editor, PumpReport, SaveState};

// Graph model
pub use crate::graph::{
    ActionData, Edge, GraphStore, LoopData, Node, NodeData, NodeId, NodeKind, Position, Workflow,
};

// Recording
pub use crate::recording::{DeviceMessage, IngestOutcome, InteractionEvent, Recorder};

// Execution
pub use crate::execution::{
    ExecutionMachine, ExecutionView, NodeStatus, ProgressEvent, ProgressMessage, ProgressStatus,
    RunState, Simulator,
};

// Collaborators
pub use crate::gateway::{
    ChannelHub, JsonFilePersistence, LoopbackDevice, MemoryPersistence, PersistenceGateway,
    RunTrigger, SessionControl,
};

// Error types
pub use crate::error::{ConfigError, GatewayError, WorkflowError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
