use feedgen_core::{Diagnostics, Severity};
use rayon::ThreadPoolBuilder;
use tracing::{error, warn};

pub fn configure_threads(spec: &str) {
    let count = if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse().unwrap_or_else(|_| num_cpus::get())
    };
    let _ = ThreadPoolBuilder::new().num_threads(count).build_global();
}

/// Emit every collected issue through tracing.
pub fn log_diagnostics(source: &str, diagnostics: &Diagnostics) {
    for issue in &diagnostics.issues {
        match issue.severity {
            Severity::Error => error!(source, "{issue}"),
            Severity::Warning => warn!(source, "{issue}"),
        }
    }
}
