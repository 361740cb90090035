//! # Tessera Systems
//!
//! Hierarchical update scheduling over tessera entity stores:
//! - A [`SystemRoot`] owns a tree of groups and leaf systems
//! - Query systems get one query and one command buffer per bound store
//! - Groups run begin hooks, children and end hooks in order
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_systems::{QueryContext, QuerySystem, SystemId, SystemRoot, UpdateTick};
//!
//! #[derive(Default)]
//! struct MoveSystem;
//!
//! impl QuerySystem for MoveSystem {
//!     type Data = (Position,);
//!
//!     fn on_update(&mut self, ctx: &mut QueryContext<'_, Self::Data>) {
//!         let dt = ctx.tick.delta_time;
//!         ctx.query.for_each_entity(ctx.store, |(pos,), _| pos.x += dt);
//!     }
//! }
//!
//! let mut root = SystemRoot::with_store("Systems", &store);
//! root.add_system(SystemId::ROOT, MoveSystem)?;
//! root.update(&UpdateTick::new(0.016, 0.016))?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod changed;
pub mod config;
pub mod error;
pub mod perf;
pub mod registry;
pub mod root;
pub mod system;
pub mod tree;

pub use changed::{ChangedListenerId, SystemChanged, SystemChangedAction};
pub use config::SystemsConfig;
pub use error::{SystemError, SystemResult};
pub use perf::SystemPerf;
pub use registry::{type_key_of, SystemFactory, SystemTypeRegistry, GROUP_TYPE_KEY};
pub use root::{SystemId, SystemRoot};
pub use system::{GroupHooks, QueryContext, QuerySystem, System, SystemContext, UpdateTick};
pub use tree::SystemTree;
