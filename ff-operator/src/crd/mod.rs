//! Custom Resource Definitions for the FeatureFlag operator.
//!
//! - [`FeatureFlag`]: a feature gate whose effective state the operator computes

mod feature_flag;

pub use feature_flag::{FeatureFlag, FeatureFlagSpec, FeatureFlagStatus};
