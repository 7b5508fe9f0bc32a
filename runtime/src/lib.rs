// Copyright 2026 Skinforge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Skinforge runtime library: browser-driven template harvesting, stylesheet
//! acquisition and publishing for the skinforge template library.
//!
//! This library crate exposes the runtime modules for the binary and for
//! integration testing.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod harvest;
pub mod pipeline;
pub mod renderer;
