//! # External-collaborator utilities
//!
//! Everything in this crate is explicitly out of core scope: the host's
//! interface table is an external collaborator. `xdp-core` never calls
//! into this crate; it only ever receives an already-resolved interface
//! index. These helpers exist so the CLI/demo binaries and the test
//! harness in `xdp-tests` have somewhere to get that index from.

pub mod ifindex;
pub mod mac;
pub mod netlink;

pub use ifindex::{ifindex_by_name, list_interfaces};
pub use mac::mac_by_ifindex;
pub use netlink::{get_links, Link};
