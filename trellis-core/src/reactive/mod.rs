//! Reactive Primitives
//!
//! This module implements the reactive kernel: effects, reactive objects
//! and ref cells, plus the runtime that wires them together.
//!
//! # Concepts
//!
//! ## Reactive objects
//!
//! A [`Reactive`] wraps a structured state object ([`Target`]). Reading a
//! field with [`Reactive::get`] inside an effect subscribes that effect to
//! the field; writing a different value with [`Reactive::set`] re-runs every
//! subscriber.
//!
//! ## Ref cells
//!
//! A [`Ref`] is the same thing for a single value, tracked under the key
//! [`VALUE_KEY`].
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever state it read
//! during its latest run changes. Effects run synchronously: by the time a
//! write returns, every affected effect has run.
//!
//! # Implementation Notes
//!
//! Each [`Runtime`] keeps a stack of running effects. A read consults the
//! top of the stack and, if there is one, records the dependency in the
//! runtime's dependency store. There is no global state: separate runtimes
//! are fully isolated.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod effect;
mod object;
mod ref_cell;
mod runtime;
mod store;
mod subscriber;
mod target;

pub use effect::Effect;
pub use object::Reactive;
pub use ref_cell::{Ref, VALUE_KEY};
pub use runtime::Runtime;
pub use subscriber::SubscriberId;
pub use target::{Identity, Key, Target, TargetId};
