//! # Kiroku - Recording Workflow Editor Core
//!
//! **Kiroku** turns the live interaction stream of a mobile device into an editable workflow
//! graph, and replays that graph with per-node execution feedback. It is the engine behind a
//! visual automation editor; rendering, device pickers and HTTP routes live elsewhere and talk
//! to it through plain data and a handful of traits.
//!
//! ## Core Workflow
//!
//! 1.  **Open a flow**: create an [`Editor`](editor::Editor) over a
//!     [`PersistenceGateway`](gateway::PersistenceGateway), either empty or loaded from storage.
//! 2.  **Record**: attach a device through a [`ChannelHub`](gateway::ChannelHub), start a
//!     session and `pump()` the channel. Each captured event becomes a node, text input is
//!     coalesced per field, and runs of repeated scrolls or swipes collapse into loop nodes.
//! 3.  **Edit**: insert, connect, delete and wrap nodes in loops. Destructive edits are undoable
//!     and saved right away.
//! 4.  **Run**: start a run and feed it progress events, from a real device or the local
//!     [`Simulator`](execution::Simulator). The [`ExecutionView`](execution::ExecutionView)
//!     tells the renderer which node and edge is running, done or failed.
//!
//! ## Quick Start
//!
//! ```rust
//! use kiroku::prelude::*;
//!
//! let library = MemoryPersistence::new();
//! let mut editor = Editor::new("demo", EditorConfig::default(), Box::new(library.clone()));
//!
//! let hub = ChannelHub::new();
//! let mut device = LoopbackDevice::new(hub.clone(), library);
//! editor.attach_device(&hub, "pixel-7");
//! editor.start_recording(&mut device, "pixel-7")?;
//!
//! for _ in 0..3 {
//!     device.emit("pixel-7", InteractionEvent::new("scroll_down"));
//! }
//! editor.pump();
//!
//! // Three identical scrolls became a single loop.
//! let loops: Vec<&Node> = editor.workflow().loop_nodes().collect();
//! assert_eq!(loops.len(), 1);
//! assert_eq!(loops[0].as_loop().map(|l| l.iterations), Some(3));
//! # Ok::<(), kiroku::error::GatewayError>(())
//! ```

pub mod config;
pub mod editor;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod graph;
pub mod history;
pub mod mutation;
pub mod prelude;
pub mod recording;
