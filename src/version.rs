//! Build version information.

/// Package version, e.g. `0.1.0`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn short() -> &'static str {
    VERSION
}

/// Version string printed by `mpaas -v`.
///
/// `GIT_COMMIT` and `BUILD_TIME` are picked up when set at compile time.
pub fn full_version() -> String {
    let mut version = format!("{} {}", env!("CARGO_PKG_NAME"), VERSION);
    if let Some(commit) = option_env!("GIT_COMMIT") {
        version.push_str(&format!("\ncommit: {}", commit));
    }
    if let Some(time) = option_env!("BUILD_TIME") {
        version.push_str(&format!("\nbuilt: {}", time));
    }
    version
}
