//! # devhop-core
//!
//! Core library for devhop: hop from any client machine into a persistent,
//! named tmux session for a (host, project, tool) triple.
//!
//! ## Design Principles
//!
//! - **Synchronous**: One sequential control flow per invocation, no runtime.
//! - **Stateless**: Projects are listed live and sessions live in tmux. The
//!   only files devhop writes are managed blocks inside user dotfiles.
//! - **Explicit config**: The config file is parsed once into an immutable
//!   [`HopConfig`] and passed by reference.
//! - **Narrow seams**: Picker backends, the remote channel and the
//!   multiplexer sit behind traits so tests can swap them out.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use devhop_core::{config, DispatchOptions, Dispatcher, Paths, Picker, SshChannel};
//!
//! let paths = Paths::from_env()?;
//! let config = config::load(paths.config_file())?;
//! let channel = SshChannel::default();
//! let mut picker = Picker::system();
//! Dispatcher::new(&config, &channel, &mut picker).run(&DispatchOptions::default())?;
//! ```

// Public modules
pub mod config;
pub mod dispatch;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod managed_block;
pub mod multiplexer;
pub mod orchestrate;
pub mod paths;
pub mod picker;
pub mod remote;
pub mod session;

// Re-export commonly used items at crate root
pub use config::{HopConfig, Host, OsClass, Tool};
pub use dispatch::{DispatchOptions, DispatchPlan, DispatchState, Dispatcher, Selection};
pub use error::{HopError, Result};
pub use integrations::Integration;
pub use managed_block::{FileMode, ManagedBlock, MergeOutcome};
pub use multiplexer::{Multiplexer, TmuxMultiplexer};
pub use orchestrate::{Attachment, Orchestrator, Prepared};
pub use paths::Paths;
pub use picker::{Picker, PickerBackend};
pub use remote::{RemoteChannel, SshChannel};
pub use session::{SessionChoice, SessionName};
