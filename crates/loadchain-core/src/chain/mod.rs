//! Stage chains.
//!
//! A [`StageChain`] is the ordered list of [`Stage`]s applied to files of
//! one [`FileKind`]. Chains are assembled once per configuration and
//! never mutated; a configuration change builds new chains.

mod assembler;
mod file_kind;
mod stage;

pub use assembler::{assemble, assemble_named, AssemblyOptions};
pub use file_kind::FileKind;
pub use stage::{FilePlan, OptionsBag, Stage, StageChain, StageKind};
