//! Build version string for the command line tools
//!
//! The semantic version always comes from the package manifest; git
//! build information is captured by `build.rs` when the build ran
//! inside a git checkout.

use std::sync::LazyLock;

static LONG: LazyLock<String> = LazyLock::new(|| {
    let semantic = env!("CARGO_PKG_VERSION");
    match (
        option_env!("MSYNC_GIT_DESCRIBE"),
        option_env!("MSYNC_GIT_HASH"),
    ) {
        (Some(describe), _) => format!("{semantic} ({describe})"),
        (None, Some(hash)) => format!("{semantic} ({hash})"),
        (None, None) => semantic.to_string(),
    }
});

/// Version string shown by `--version`.
pub fn long() -> &'static str {
    &LONG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_the_semantic_version() {
        assert!(long().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
