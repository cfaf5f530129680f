//! Shared async return-type alias used across facet callbacks and requests.

use std::future::Future;
use std::pin::Pin;

/// A boxed, pinned, `Send` future, the common currency for callback and
/// handler return types throughout the crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
