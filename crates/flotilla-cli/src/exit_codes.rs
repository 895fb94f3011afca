//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;


/// Cluster error - the cluster or the release manager could not be reached
pub const CLUSTER_ERROR: i32 = 3;

/// Partial failure - a non-critical layer failed, the run degraded
pub const PARTIAL_FAILURE: i32 = 6;

/// Deployment failed - a critical layer failed or the global timeout expired
pub const DEPLOYMENT_FAILED: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Configuration error - unreadable or invalid configuration file (sysexits.h EX_CONFIG)
pub const CONFIG_ERROR: i32 = 78;

/// Aborted - the run was interrupted (128 + SIGINT)
pub const ABORTED: i32 = 130;
