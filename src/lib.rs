// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! buildservd keeps one web application's dependency tree, build artifact,
//! and service process in sync with its manifest and source tree: a polling
//! monitor loop fingerprints the inputs, re-runs the delegated install and
//! build commands when they drift, and supervises the serve command as a
//! process group it can restart or tear down as a unit.

pub mod builder;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fingerprint;
pub mod install;
pub mod liveness;
pub mod monitor;
pub mod service;
pub mod shutdown;
pub mod state;

pub use config::SupervisorConfig;
pub use monitor::Supervisor;
