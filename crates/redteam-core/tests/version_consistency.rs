//! Every workspace crate inherits the workspace version, and the internal
//! path dependencies pin that same version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn manifest(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path.join("Cargo.toml")).unwrap();
    text.parse().unwrap()
}

const CRATES: [&str; 3] = [
    "crates/redteam-core",
    "crates/redteam-tools",
    "crates/redteam-cli",
];

#[test]
fn all_crates_use_workspace_version() {
    let root = workspace_root();
    for krate in CRATES {
        let doc = manifest(&root.join(krate));
        let inherited = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool());
        assert_eq!(inherited, Some(true), "{krate} should use version.workspace = true");
    }
}

#[test]
fn internal_dependencies_pin_the_workspace_version() {
    let doc = manifest(&workspace_root());
    let version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    let deps = doc["workspace"]["dependencies"].as_table().unwrap();
    for name in ["redteam-core", "redteam-tools"] {
        let pinned = deps[name]["version"].as_str().unwrap();
        assert_eq!(pinned, version, "{name} dependency version drifted");
    }
}
