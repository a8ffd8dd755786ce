// Copyright 2026 Netsieve Contributors
// SPDX-License-Identifier: Apache-2.0

//! Netsieve library — network-intercepting scraper.
//!
//! Renders a target page in headless Chromium, observes the network
//! responses the page produces, and returns the first one whose URL
//! matches a caller-supplied pseudo file-extension hint (`waitfor`).
//! The capture core is exposed through an HTTP API and a one-shot CLI,
//! both thin adapters over [`capture::capture`].

pub mod capture;
pub mod cli;
pub mod engine;
pub mod error;
pub mod events;
pub mod rest;
