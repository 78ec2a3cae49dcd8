//! Handler traits - what gets called with a batch.
//!
//! # Two layers
//! - `BatchHandler`: object safe, receives the raw `Batch` of JSON values.
//!   This is what the engine stores and dispatches to.
//! - `Handler<T>`: typed, receives `Vec<T>`. `TypedHandler<T, H>` erases it
//!   into a `BatchHandler` by decoding every item first.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::domain::{Batch, HandlerError};

/// A resolved batch handler.
///
/// Handlers are black boxes to the engine: any I/O or further enqueuing is
/// their own business.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Identity used in logs and `TaskFailure`.
    fn name(&self) -> &str;

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError>;
}

/// A handler over decoded task arguments.
///
/// # Example
/// ```ignore
/// #[derive(Deserialize)]
/// struct Email { to: String }
///
/// struct SendEmails;
///
/// #[async_trait]
/// impl Handler<Email> for SendEmails {
///     async fn handle(&self, args: Vec<Email>) -> Result<(), HandlerError> {
///         for email in args { /* ... */ }
///         Ok(())
///     }
/// }
///
/// let handler = TypedHandler::new("send_emails", SendEmails);
/// ```
#[async_trait]
pub trait Handler<T>: Send + Sync
where
    T: DeserializeOwned + Send + 'static,
{
    async fn handle(&self, args: Vec<T>) -> Result<(), HandlerError>;
}

pub struct TypedHandler<T, H> {
    name: String,
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T, H> TypedHandler<T, H>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    pub fn new(name: impl Into<String>, handler: H) -> Self {
        Self {
            name: name.into(),
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, H> BatchHandler for TypedHandler<T, H>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError> {
        let mut args = Vec::with_capacity(batch.len());
        for item in batch {
            let arg: T = serde_json::from_value(item).map_err(|e| format!("json decode: {e}"))?;
            args.push(arg);
        }
        self.handler.handle(args).await
    }
}

/// Closure-backed handler, see [`handler_fn`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// Wrap an async closure as a `BatchHandler`.
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(Batch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FnHandler {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> BatchHandler for FnHandler<F>
where
    F: Fn(Batch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, batch: Batch) -> Result<(), HandlerError> {
        (self.f)(batch).await
    }
}
