use siteblock_core::BlockedWebsite;

/// Whether a page on `hostname` should be covered.
///
/// Blocking must be enabled and a stored record for exactly this hostname
/// must be marked blocked. Subdomains do not inherit their parent's record.
pub fn should_block(websites: &[BlockedWebsite], enabled: bool, hostname: &str) -> bool {
    if !enabled {
        return false;
    }
    let hostname = hostname.trim();
    websites.iter().any(|w| w.blocked && w.domain == hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Vec<BlockedWebsite> {
        vec![
            BlockedWebsite::new("a.com", "A").with_blocked(true),
            BlockedWebsite::new("b.com", "B"),
        ]
    }

    #[test]
    fn blocked_and_enabled() {
        assert!(should_block(&list(), true, "a.com"));
    }

    #[test]
    fn disabled_never_blocks() {
        assert!(!should_block(&list(), false, "a.com"));
    }

    #[test]
    fn unblocked_or_unknown_hosts_pass() {
        assert!(!should_block(&list(), true, "b.com"));
        assert!(!should_block(&list(), true, "www.a.com"));
        assert!(!should_block(&[], true, "a.com"));
    }
}
