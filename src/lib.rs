#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::float_cmp,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_literal_bound,
    clippy::unused_self,
    clippy::unnecessary_wraps
)]

pub mod agent;
pub mod config;
pub mod error;
pub mod ethics;
pub mod gateway;
pub mod observability;
pub mod providers;
pub mod sessions;
pub mod turn;
pub mod wellbeing;

pub use config::Config;
pub use error::PdaError;
