//! Version information for agentdock.

/// agentdock version from Cargo.toml
pub const AGENTDOCK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert!(!AGENTDOCK_VERSION.is_empty());
        assert_eq!(AGENTDOCK_VERSION.split('.').count(), 3);
    }
}
