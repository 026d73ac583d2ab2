//! Test harness for privileged AF_XDP integration tests: veth pair
//! lifecycle, sudo command execution, and capability re-exec. Used by
//! the `xdp-tests` crate's `harness = false` integration tests, which
//! need a real network namespace and raised capabilities that `cargo
//! test`'s default harness cannot provide.

pub mod command;
pub mod runner;
pub mod veth;

pub use runner::{Host, HostPair, run_test_with_pair};
