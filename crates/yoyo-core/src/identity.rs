//! Resolves the `user@host` identity recorded on every applied/log row.

/// Returns the `user@host` string used for [`applied_by`](crate) and
/// [`username`](crate)/[`hostname`](crate) bookkeeping columns.
///
/// Falls back to `"unknown"` for either component rather than failing the
/// whole command — bookkeeping identity is diagnostic, not load-bearing.
pub fn current_identity() -> (String, String) {
    (current_user(), current_host())
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn current_host() -> String {
    hostname_from_env().unwrap_or_else(|| "unknown".to_string())
}

fn hostname_from_env() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_identity_never_empty() {
        let (user, host) = current_identity();
        assert!(!user.is_empty());
        assert!(!host.is_empty());
    }
}
