//! Controller runtime: the machinery around the reconciler.
//!
//! Watching, per-object queueing and concurrency come from
//! `kube::runtime::Controller`. This module adapts a [`Reconcile`](crate::controller::Reconcile)
//! implementation to it:
//!
//! - [`Operator`]: reconciler, retry policy and cancellation, plus [`Operator::run`]
//! - [`reconcile`] / [`error_policy`]: the functions handed to the controller
//! - [`ExponentialBackoff`]: per-object retry delays
//!
//! # Wiring
//!
//! ```ignore
//! let operator = Operator::new(&registry, reconciler, config)?;
//! operator.run(Api::all(client), watcher::Config::default()).await;
//! ```

mod backoff;
mod operator;

pub use backoff::{ExponentialBackoff, MIN_DELAY};
pub use operator::{Operator, error_policy, reconcile};
