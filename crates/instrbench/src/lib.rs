//! Top-level facade crate for instrbench.
//!
//! Re-exports core types and the harness library so users can depend on a single crate.

pub mod core {
    pub use instrbench_core::*;
}

pub mod harness {
    pub use instrbench_harness::*;
}
