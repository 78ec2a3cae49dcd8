//! Typed - handler API and payload encoding.
//!
//! # Layers
//! - **Typed**: `Handler<T>` over decoded arguments.
//! - **Dyn**: `BatchHandler`, object safe, what the engine dispatches to.
//! - **Registry**: name → handler, for resolving handlers at startup.
//! - **Codec**: canonical JSON entries shared by producers and the dispenser.

pub mod codec;
pub mod handler;
pub mod registry;

pub use self::handler::{BatchHandler, FnHandler, Handler, TypedHandler, handler_fn};
pub use self::registry::{HandlerRegistry, RegistryError};
