//! Shell-out helpers for driving `ip` through `sudo`, and the
//! capability-escalation dance integration tests need: AF_XDP socket
//! creation and XDP program attach both require `CAP_NET_ADMIN` and
//! `CAP_NET_RAW` (plus `CAP_BPF` on newer kernels), which the test
//! binary does not have by default.

use std::env;
use std::io::{Error, Result};
use std::process::Stdio;

pub fn execute_sudo_command(command: &str) -> Result<()> {
    use std::process::Command;
    let output = Command::new("sudo")
        .arg("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(Error::other(format!(
            "command failed with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    log::info!("sudo# {}", command);
    Ok(())
}

/// Re-execs the current binary with the requested capabilities raised
/// via `setcap`, if they are not already held. A `RESTARTED` env var
/// guards against looping forever across the re-exec.
pub fn restart_with_caps(my_caps: &[caps::Capability]) -> Result<()> {
    let perm_caps =
        caps::read(None, caps::CapSet::Permitted).map_err(|e| Error::other(e.to_string()))?;
    log::info!("permitted caps: {:?}", perm_caps);
    let effect_caps =
        caps::read(None, caps::CapSet::Effective).map_err(|e| Error::other(e.to_string()))?;
    log::info!("effective caps: {:?}", effect_caps);

    if let Ok(val) = env::var("RESTARTED") {
        if val == "1" {
            log::info!("already restarted with capabilities");
            return Ok(());
        }
    }
    unsafe {
        env::set_var("RESTARTED", "1");
    }

    if my_caps.iter().any(|c| !perm_caps.contains(c)) {
        let caps_string = my_caps
            .iter()
            .map(|cap| cap.to_string())
            .collect::<Vec<String>>()
            .join(",");
        let current_prog = env::current_exe()?;
        let current_prog_path = current_prog
            .as_path()
            .to_str()
            .ok_or_else(|| Error::other("current executable path is not valid UTF-8"))?;
        execute_sudo_command(&format!("setcap {caps_string}+eip {current_prog_path}"))?;
        let args: Vec<String> = env::args().collect();
        log::debug!("re-executing: {:?}", args);
        Err(Error::other(exec::execvp(&current_prog, &args).to_string()))
    } else {
        Ok(())
    }
}

/// Initializes logging and, if any capabilities are requested, restarts
/// the process with them raised. Call once at the top of a test binary.
pub fn setup(my_caps: &[caps::Capability]) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    if my_caps.is_empty() {
        Ok(())
    } else {
        restart_with_caps(my_caps)
    }
}
