/// Compile-time build metadata produced by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct BuildMetadata {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub timestamp: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

impl BuildMetadata {
    /// Single-line description used by `recurring_core_cli version`.
    pub fn summary(&self) -> String {
        format!(
            "recurring_core {} ({} {}, built {}, {})",
            self.version, self.git_hash, self.profile, self.timestamp, self.rustc
        )
    }
}

/// Returns the statically-embedded build metadata.
pub fn current() -> BuildMetadata {
    BuildMetadata {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("RECURRING_CORE_BUILD_HASH").unwrap_or("unknown"),
        timestamp: option_env!("RECURRING_CORE_BUILD_TIMESTAMP").unwrap_or("unknown"),
        profile: option_env!("RECURRING_CORE_BUILD_PROFILE").unwrap_or("unknown"),
        rustc: option_env!("RECURRING_CORE_BUILD_RUSTC").unwrap_or("unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_mentions_package_version() {
        let meta = current();
        assert!(meta.summary().contains(env!("CARGO_PKG_VERSION")));
    }
}
