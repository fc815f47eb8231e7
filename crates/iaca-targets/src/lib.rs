//! Target resolution for IACA analysis.
//!
//! Maps an IACA architecture tag (`HSW`, `BDW`, `SKL`, `SKX`) to the LLVM
//! code generation configuration for that microarchitecture, and hands out
//! LLVM target machines scoped to a callback.

pub mod arch;
pub mod error;
pub mod machine;

pub use arch::ArchTag;
pub use error::{Result, TargetError};
pub use machine::{with_target_machine, TargetMachineConfig, DEFAULT_TRIPLE};
