//! HTTP server for the nodeflow workflow engine.
//!
//! Loads workflow definitions from disk, wires adapters and integration
//! configuration into a [`RunController`](nodeflow_workflow::RunController)
//! and exposes start, poll and stop over a small JSON API.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod webhook;
