// Copyright 2026 Makerwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Makerwatch renders the MakerWorld model listing in a headless browser,
//! picks the top entries and posts them to a Telegram chat, hourly and on
//! request.
//!
//! This library crate exposes the components for integration testing.

pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod error;
pub mod extract;
pub mod logging;
pub mod model;
pub mod notify;
pub mod renderer;
pub mod scheduler;
pub mod transport;
