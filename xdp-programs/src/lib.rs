//! Build-time support for compiling the in-kernel XDP redirect filter.
//!
//! This crate has no runtime surface; it is consumed from `xdp-core`'s
//! `build.rs` as a build-dependency that invokes `clang -target bpf`
//! directly. The compilation step is a reusable function instead of an
//! inline `Command` in every consumer's `build.rs`.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Maximum number of queues the redirect program's maps are sized for.
/// Keep in sync with `MAX_QUEUES` in `bpf/xdp_redirect.c`.
pub const MAX_QUEUES: u32 = 128;

/// The C source of the redirect filter, embedded so a consuming
/// `build.rs` does not need to resolve this crate's source directory at
/// runtime (only `CARGO_MANIFEST_DIR` is reliable for that, which this
/// crate itself provides via [`source_path`]).
pub const SOURCE: &str = include_str!("../bpf/xdp_redirect.c");

/// Path to the bundled C source file, for consumers that prefer to shell
/// out to `clang` themselves instead of calling [`compile`].
pub fn source_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("bpf/xdp_redirect.c")
}

/// Compiles the redirect filter to a freestanding BPF object file under
/// `out_dir`, returning its path.
///
/// Runs `clang -O2 -target bpf -c <src> -o <dst>`. The object is loaded
/// at runtime by `xdp_core::program` via `libbpf-sys`.
pub fn compile(out_dir: &Path) -> std::io::Result<PathBuf> {
    let dest = out_dir.join("xdp_redirect.o");
    let status = Command::new("clang")
        .arg("-O2")
        .arg("-target")
        .arg("bpf")
        .arg(format!("-DMAX_QUEUES={MAX_QUEUES}"))
        .arg("-c")
        .arg(source_path())
        .arg("-o")
        .arg(&dest)
        .status()?;
    if !status.success() {
        return Err(std::io::Error::other(format!(
            "clang exited with {status} compiling the XDP redirect filter"
        )));
    }
    Ok(dest)
}
