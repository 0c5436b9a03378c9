//! Local host name lookup.

use tracing::debug;

/// Fallback used when the host name cannot be determined.
const UNKNOWN_HOST: &str = "localhost";

/// Returns the host name of this machine.
pub(crate) fn hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => {
            let name = name.to_string_lossy().into_owned();
            if name.is_empty() { UNKNOWN_HOST.to_string() } else { name }
        }
        Err(e) => {
            debug!(error = %e, "cannot determine host name");
            UNKNOWN_HOST.to_string()
        }
    }
}
