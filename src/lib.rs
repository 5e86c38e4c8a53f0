#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self
)]

//! sessiond: an in-process session registry with idle eviction.
//!
//! [`sessions`] holds the store and its record types, [`infra`] the
//! eviction sweeper, [`gateway`] the HTTP surface and [`config`] the
//! on-disk configuration.

pub mod config;
pub mod gateway;
pub mod infra;
pub mod sessions;

pub use config::Config;
