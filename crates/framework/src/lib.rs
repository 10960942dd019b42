pub mod format;

use std::path::Path;

use analyser_core::models::FrameworkKind;
pub use format::{FormatOutcome, FormatWarning, Formatter, ToolchainFormatter};

/// Build tooling recognized by marker files at the repository root.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameworkProfile {
    pub kind: FrameworkKind,
    pub markers: &'static [&'static str],
    /// Dependency install command, program first.
    pub install: &'static [&'static str],
}

/// Known profiles, in detection priority order.
pub static PROFILES: &[FrameworkProfile] = &[
    FrameworkProfile {
        kind: FrameworkKind::Hardhat,
        markers: &["hardhat.config.ts", "hardhat.config.js"],
        install: &["npm", "install"],
    },
    FrameworkProfile {
        kind: FrameworkKind::Foundry,
        markers: &["foundry.toml", "remappings.txt"],
        install: &["forge", "install"],
    },
    FrameworkProfile {
        kind: FrameworkKind::Truffle,
        markers: &["truffle-config.js", "truffle.js"],
        install: &["npm", "install"],
    },
];

pub static UNKNOWN: FrameworkProfile =
    FrameworkProfile { kind: FrameworkKind::Unknown, markers: &[], install: &[] };

pub fn profile(kind: FrameworkKind) -> &'static FrameworkProfile {
    PROFILES.iter().find(|p| p.kind == kind).unwrap_or(&UNKNOWN)
}

/// Classify a working copy. The first profile with any marker present wins.
pub fn detect(root: &Path) -> &'static FrameworkProfile {
    for profile in PROFILES {
        if let Some(marker) = profile.markers.iter().find(|m| root.join(m).is_file()) {
            tracing::info!("Detected framework {} ({marker})", profile.kind);
            return profile;
        }
    }
    tracing::warn!("No known framework detected in {}", root.display());
    &UNKNOWN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect_with(files: &[&str]) -> FrameworkKind {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }
        detect(dir.path()).kind
    }

    #[test]
    fn detects_each_marker() {
        let cases: &[(&str, FrameworkKind)] = &[
            ("hardhat.config.ts", FrameworkKind::Hardhat),
            ("hardhat.config.js", FrameworkKind::Hardhat),
            ("foundry.toml", FrameworkKind::Foundry),
            ("remappings.txt", FrameworkKind::Foundry),
            ("truffle-config.js", FrameworkKind::Truffle),
            ("truffle.js", FrameworkKind::Truffle),
            ("package.json", FrameworkKind::Unknown),
        ];
        for &(file, expected) in cases {
            assert_eq!(detect_with(&[file]), expected, "{file}");
        }
    }

    #[test]
    fn priority_order_breaks_ties() {
        assert_eq!(detect_with(&["foundry.toml", "hardhat.config.js"]), FrameworkKind::Hardhat);
        assert_eq!(detect_with(&["truffle.js", "remappings.txt"]), FrameworkKind::Foundry);
    }

    #[test]
    fn only_root_markers_count() {
        assert_eq!(detect_with(&["sub/foundry.toml"]), FrameworkKind::Unknown);
        assert_eq!(detect_with(&[]), FrameworkKind::Unknown);
    }

    #[test]
    fn markers_are_disjoint() {
        let mut seen = std::collections::HashSet::new();
        for marker in PROFILES.iter().flat_map(|p| p.markers) {
            assert!(seen.insert(marker), "{marker} used twice");
        }
    }

    #[test]
    fn profile_lookup() {
        assert_eq!(profile(FrameworkKind::Foundry).install, &["forge", "install"]);
        assert_eq!(profile(FrameworkKind::Unknown), &UNKNOWN);
    }
}
