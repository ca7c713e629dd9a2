//! orgtree: editor core for an organizational tree kept behind a REST service.
//!
//! Layers, innermost first:
//! - `domain`: records, the flat store, hierarchy building, expansion, form rules
//! - `infrastructure`: remote store implementations and service wiring
//! - `application`: the mutation engine, remote write queue and editor session
//! - `cli`: argument parsing, rendering and the interactive shell

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
