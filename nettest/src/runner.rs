//! A ready-made veth pair for a test closure to run against.

use crate::veth;
use std::future::Future;
use std::io::{ErrorKind, Result};

pub const DEV_PREFIX: &str = "xdpVeth";
pub const IP_PREFIX: &str = "192.168.77.";

pub struct Host {
    pub if_dev: String,
    pub ip: String,
}

impl Host {
    pub fn new(if_dev: String, ip: String) -> Self {
        Host { if_dev, ip }
    }

    /// Resolves this host's current kernel ifindex. Not cached: the
    /// index is only stable for the lifetime of the interface, and
    /// tests that tear down and recreate the pair want a fresh lookup.
    pub fn if_index(&self) -> Result<u32> {
        xdp_util::ifindex_by_name(&self.if_dev)
    }
}

pub struct HostPair {
    pub host0: Host,
    pub host1: Host,
}

impl HostPair {
    pub fn new(host0: Host, host1: Host) -> Self {
        HostPair { host0, host1 }
    }

    pub fn from_prefixes(dev_prefix: &str, ip_prefix: &str) -> Self {
        let host0 = Host::new(format!("{}0", dev_prefix), format!("{}100", ip_prefix));
        let host1 = Host::new(format!("{}1", dev_prefix), format!("{}101", ip_prefix));
        HostPair::new(host0, host1)
    }
}

/// Ensures a veth pair exists, hands it to `test`, then tears it down.
/// Leaves an existing pair in place if one is already up under
/// `DEV_PREFIX`, so repeated test runs in one session don't pay the
/// setup/teardown cost every time.
pub async fn run_test_with_pair<F, Fut>(test: F) -> Result<()>
where
    F: FnOnce(HostPair) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if let Err(e) = veth::check_pair(DEV_PREFIX) {
        if e.kind() == ErrorKind::NotFound {
            veth::setup_pair(DEV_PREFIX, IP_PREFIX)?;
        } else {
            return Err(e);
        }
    }
    let host_pair = HostPair::from_prefixes(DEV_PREFIX, IP_PREFIX);
    test(host_pair).await?;
    veth::teardown_pair(DEV_PREFIX)?;
    Ok(())
}
