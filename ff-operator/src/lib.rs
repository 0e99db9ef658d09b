//! FeatureFlag Kubernetes Operator
//!
//! Keeps the status of `FeatureFlag` custom resources in line with their
//! spec: `status.active` is `spec.enabled && spec.status`.
//!
//! # Custom Resource Definitions
//!
//! - **FeatureFlag**: a feature gate (`deployment.github.com/v1alpha1`)
//!
//! # Example
//!
//! ```yaml
//! apiVersion: deployment.github.com/v1alpha1
//! kind: FeatureFlag
//! metadata:
//!   name: new-checkout
//!   namespace: shop
//! spec:
//!   enabled: true
//!   status: true
//! ```
//!
//! # Reconciliation
//!
//! `kube::runtime::Controller` watches FeatureFlags and, through a
//! [`runtime::Operator`], runs the [`controller::FeatureFlagReconciler`],
//! which reads the flag, computes the status and writes it with an
//! optimistic-concurrency check. Failed attempts are retried with
//! exponential backoff.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod registry;
pub mod runtime;
pub mod store;

pub use config::OperatorConfig;
pub use crd::{FeatureFlag, FeatureFlagSpec, FeatureFlagStatus};
pub use error::{OperatorError, OperatorResult};
