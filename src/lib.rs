//! Core library for the notixel-tools command line application.
//!
//! The library holds the mapping engine that pairs spreadsheet columns with
//! database properties and the orchestration that pushes a finished mapping
//! to the sync service. Field snapshots and wire types live in
//! [`notixel::tools::model`], the per-direction correspondence store and its
//! invariants in [`notixel::tools::mapping`], remote access behind the traits
//! of [`notixel::tools::remote`], and the run state machine under
//! [`notixel::tools::sync`]. [`notixel::tools::handle`] shares one session
//! between tasks.

pub mod notixel;

pub use notixel::tools::{
    Result, ToolError, config, error, handle, io, mapping, model, remote, sync,
};
