//! Interface name <-> index resolution.
//!
//! `xdp-core` takes an already-resolved `ifindex: u32` everywhere; the
//! host's interface table is an external collaborator, never touched
//! by the core. This module is where the CLI and test harness do that
//! resolution, via the same `if_nametoindex`/`if_nameindex` primitives
//! `net-tools` and `iproute2` use.

use std::ffi::{CStr, CString};
use std::io;

/// Resolves an interface name (e.g. "eth0") to its kernel ifindex.
pub fn ifindex_by_name(name: &str) -> Result<u32, io::Error> {
    let cname = CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name has a NUL byte"))?;
    let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if index == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(index)
}

/// Lists every interface the kernel currently knows about, as
/// `(ifindex, name)` pairs. Backs the `list-interfaces` CLI surface.
pub fn list_interfaces() -> Result<Vec<(u32, String)>, io::Error> {
    unsafe {
        let head = libc::if_nameindex();
        if head.is_null() {
            return Err(io::Error::last_os_error());
        }
        let mut result = Vec::new();
        let mut cursor = head;
        while (*cursor).if_index != 0 {
            let name = CStr::from_ptr((*cursor).if_name).to_string_lossy().into_owned();
            result.push(((*cursor).if_index, name));
            cursor = cursor.add(1);
        }
        libc::if_freenameindex(head);
        Ok(result)
    }
}
