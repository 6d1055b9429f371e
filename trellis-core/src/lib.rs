//! Trellis Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! Computations ("effects") re-run automatically whenever the specific
//! pieces of state they read are modified. It is the reactivity kernel of a
//! UI framework without the rendering.
//!
//! It implements:
//!
//! - A dependency store mapping state locations to the effects reading them
//! - The track/trigger protocol that builds and fires that store
//! - Reactive objects: tracked key/value views over structured state
//! - Ref cells: tracked single values
//!
//! # Architecture
//!
//! - `reactive`: runtime, effects, reactive objects and ref cells
//! - `config`: runtime settings
//! - `error`: error type shared by the crate
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::reactive::Runtime;
//!
//! let runtime = Runtime::new();
//! let count = runtime.ref_cell(0);
//!
//! // Create an effect
//! let reader = count.clone();
//! let _effect = runtime.effect(move || {
//!     println!("Count: {}, Doubled: {}", reader.get(), reader.get() * 2);
//! });
//!
//! // Update the cell
//! count.set(5);
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use reactive::{Effect, Reactive, Ref, Runtime, Target};
