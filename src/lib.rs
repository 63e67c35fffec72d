//! affirmation_mixer assembles fixed-length affirmation sessions from
//! pre-recorded clips.
//!
//! Selection, timeline planning, layering and export live here.
//! The `affmix` CLI and webhook server consume this crate.

pub mod assembler;
pub mod asset;
pub mod audio;
pub mod compositor;
pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod selector;
pub mod server;
pub mod timeline;

pub use assembler::{Assembler, AssemblyReport, FsAssembler};
pub use error::{AssemblyError, Result};
