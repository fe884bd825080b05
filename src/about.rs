pub const GEMPRUNE_DISPLAY_VERSION: &str = env!("GEMPRUNE_DISPLAY_VERSION");
pub const GEMPRUNE_BUILD_N: &str = env!("GEMPRUNE_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "gemprune {}\nBuild {}\nPathway-guided pruning reconstruction of genome-scale metabolic models",
        GEMPRUNE_DISPLAY_VERSION, GEMPRUNE_BUILD_N
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_cli_text() {
        let text = version_cli_text();
        assert!(text.starts_with("gemprune "));
        assert!(text.contains(GEMPRUNE_DISPLAY_VERSION));
    }
}
