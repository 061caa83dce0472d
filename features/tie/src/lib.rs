//! Runtime dependency resolver.
//!
//! Components are registered on a [Builder], either as instances with
//! [Inject] slots or as factory functions taking their dependencies as `Arc`
//! parameters. A build links every slot to the compatible provider registered
//! last, orders the factories so their arguments exist before they run, and
//! wires everything into the root component.
//!
//! ```rust
//! use std::sync::Arc;
//! use tie::{slots, Builder, Capabilities, Component, Inject, SlotRef};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English {
//!     name: Arc<Name>,
//! }
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         format!("hello {}", self.name.0)
//!     }
//! }
//! impl Component for English {
//!     fn capabilities(caps: &mut Capabilities<Self>) {
//!         caps.add::<dyn Greeter>(|it| it);
//!     }
//! }
//!
//! struct Name(&'static str);
//! impl Component for Name {}
//!
//! #[derive(Default)]
//! struct App {
//!     greeter: Inject<dyn Greeter>,
//! }
//! impl Component for App {
//!     fn slots(&self) -> Vec<SlotRef<'_>> {
//!         slots![self => greeter]
//!     }
//! }
//!
//! let app = Builder::new(App::default())
//!     .with(|name: Arc<Name>| English { name })
//!     .with(Name("world"))
//!     .must_build();
//!
//! assert_eq!(app.greeter.get().greet(), "hello world");
//! ```
//!
//! Capabilities are trait objects, a provider lists the ones it can be
//! injected as in [Component::capabilities]. A component can always be
//! injected as its own type.

mod builder;
mod classify;
mod component;
mod dependency_graph;
mod errors;
mod factories;
mod initiator;
mod ordering;
mod slot;
mod types;
mod validate;

pub use builder::{Builder, Plan, Wiring};
#[doc(hidden)]
pub use classify::{FactoryFn, OwnedInstance, Registration, SharedInstance};
pub use classify::IntoComponent;
pub use component::{Capabilities, Component};
pub use errors::{BuildError, CycleStep, CycleTrace};
pub use factories::{Factory, FactoryOutput, Param};
pub use slot::{Inject, Slot, SlotRef};
pub use types::{DynError, Injectable, Resolved, TypeInfo};
