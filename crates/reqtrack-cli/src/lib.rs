// Copyright 2026 Reqtrack Contributors
// SPDX-License-Identifier: MIT

//! Command-line front end for reqtrack: Chromium-backed capture, fallback
//! script fetching, and archive output.

pub mod browser;
pub mod cli;
pub mod http_client;
