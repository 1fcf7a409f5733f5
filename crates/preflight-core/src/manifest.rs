//! `package.json` access for generated apps.
//!
//! Reads the merged dependency set the registry check consumes and wires the
//! end-to-end test runner into an app's scripts. Key order is preserved on
//! write so regenerated manifests diff cleanly.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{PreflightError, Result};
use crate::registry::DependencySpec;

pub const MANIFEST_FILE: &str = "package.json";

/// Dev-dependencies copied from the shared manifest when installing the
/// test runner.
pub const TEST_RUNNER_PACKAGES: [&str; 3] =
    ["start-server-and-test", "cypress", "@testing-library/cypress"];

/// A parsed `package.json` and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    path: PathBuf,
    root: Map<String, Value>,
}

impl PackageManifest {
    /// Read `<dir>/package.json`.
    pub fn read(dir: &Path) -> Result<Self> {
        Self::read_file(&dir.join(MANIFEST_FILE))
    }

    /// Read a manifest from an explicit file path.
    pub fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        match value {
            Value::Object(root) => Ok(Self {
                path: path.to_path_buf(),
                root,
            }),
            _ => Err(PreflightError::Manifest {
                path: path.to_path_buf(),
                message: "top-level value is not an object".to_string(),
            }),
        }
    }

    /// Write back to the file this manifest was read from.
    pub fn write(&self) -> Result<()> {
        let mut content = serde_json::to_string_pretty(&self.root)?;
        content.push('\n');
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Read `<dir>/package.json`, apply `transform`, and write it back.
    pub fn update<F>(dir: &Path, transform: F) -> Result<Self>
    where
        F: FnOnce(&mut PackageManifest) -> Result<()>,
    {
        let mut manifest = Self::read(dir)?;
        transform(&mut manifest)?;
        manifest.write()?;
        Ok(manifest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `name` field, if present.
    pub fn name(&self) -> Option<&str> {
        self.root.get("name").and_then(Value::as_str)
    }

    /// Entries of a string-to-string section such as `dependencies`.
    ///
    /// Missing sections and non-string values are skipped.
    pub fn section(&self, key: &str) -> Vec<(String, String)> {
        self.root
            .get(key)
            .and_then(Value::as_object)
            .map(|section| {
                section
                    .iter()
                    .filter_map(|(name, v)| v.as_str().map(|s| (name.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Combined `devDependencies` + `dependencies`.
    ///
    /// A package listed in both keeps its position from `devDependencies`
    /// and takes its version from `dependencies`.
    pub fn dependency_specs(&self) -> Vec<DependencySpec> {
        let mut merged: Map<String, Value> = Map::new();
        for (name, version) in self
            .section("devDependencies")
            .into_iter()
            .chain(self.section("dependencies"))
        {
            merged.insert(name, Value::String(version));
        }
        merged
            .into_iter()
            .filter_map(|(name, v)| match v {
                Value::String(range) => Some(DependencySpec::new(name, range)),
                _ => None,
            })
            .collect()
    }

    /// Insert or replace `key` in a section, creating the section if needed.
    pub fn set_entry(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        let entry = self
            .root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(map) => {
                map.insert(key.to_string(), Value::String(value.to_string()));
                Ok(())
            }
            _ => Err(PreflightError::Manifest {
                path: self.path.clone(),
                message: format!("`{section}` is not an object"),
            }),
        }
    }

    /// Wire the end-to-end test runner into this manifest.
    ///
    /// Copies the runner's packages from `shared`'s `dependencies` into
    /// `devDependencies`, and adds the `cy:*` and `test:e2e:*` scripts
    /// pointing at `url`.
    pub fn install_test_runner(&mut self, url: &str, shared: &PackageManifest) -> Result<()> {
        let shared_deps = shared.section("dependencies");
        for package in TEST_RUNNER_PACKAGES {
            let version = shared_deps
                .iter()
                .find(|(name, _)| name == package)
                .map(|(_, version)| version.clone())
                .ok_or_else(|| PreflightError::Manifest {
                    path: shared.path.clone(),
                    message: format!("shared dependencies do not include `{package}`"),
                })?;
            self.set_entry("devDependencies", package, &version)?;
        }

        self.set_entry("scripts", "cy:run", "cypress run")?;
        self.set_entry("scripts", "cy:open", "cypress open")?;
        self.set_entry(
            "scripts",
            "test:e2e:dev",
            &format!("start-server-and-test dev {url} cy:open"),
        )?;
        self.set_entry(
            "scripts",
            "test:e2e:run",
            &format!("start-server-and-test dev {url} cy:run"),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, value: serde_json::Value) {
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&value).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn dependency_specs_merge_with_runtime_precedence() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            json!({
                "name": "my-app",
                "devDependencies": { "@internal/dev": "^1.0.0", "@internal/both": "^0.1.0" },
                "dependencies": { "@internal/both": "^2.0.0", "react": "^18.2.0" }
            }),
        );

        let manifest = PackageManifest::read(dir.path()).unwrap();
        assert_eq!(manifest.name(), Some("my-app"));
        assert_eq!(
            manifest.dependency_specs(),
            vec![
                DependencySpec::new("@internal/dev", "^1.0.0"),
                DependencySpec::new("@internal/both", "^2.0.0"),
                DependencySpec::new("react", "^18.2.0"),
            ]
        );
    }

    #[test]
    fn missing_sections_yield_no_dependencies() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), json!({ "name": "bare" }));
        let manifest = PackageManifest::read(dir.path()).unwrap();
        assert!(manifest.dependency_specs().is_empty());
    }

    #[test]
    fn non_object_manifest_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[1, 2]").unwrap();
        let err = PackageManifest::read(dir.path()).unwrap_err();
        assert!(matches!(err, PreflightError::Manifest { .. }));
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let dir = tempdir().unwrap();
        let err = PackageManifest::read(dir.path()).unwrap_err();
        assert!(matches!(err, PreflightError::Io(_)));
    }

    #[test]
    fn install_test_runner_adds_packages_and_scripts() {
        let shared_dir = tempdir().unwrap();
        write_manifest(
            shared_dir.path(),
            json!({
                "dependencies": {
                    "start-server-and-test": "^1.14.0",
                    "cypress": "^9.5.0",
                    "@testing-library/cypress": "^8.0.2",
                    "unrelated": "1.0.0"
                }
            }),
        );
        let app_dir = tempdir().unwrap();
        write_manifest(
            app_dir.path(),
            json!({ "name": "app", "scripts": { "dev": "remix dev" } }),
        );

        let shared = PackageManifest::read(shared_dir.path()).unwrap();
        PackageManifest::update(app_dir.path(), |m| {
            m.install_test_runner("http://localhost:3000", &shared)
        })
        .unwrap();

        let raw = std::fs::read_to_string(app_dir.path().join(MANIFEST_FILE)).unwrap();
        assert!(raw.ends_with('\n'));
        let written: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(written["devDependencies"]["cypress"], "^9.5.0");
        assert_eq!(written["devDependencies"]["start-server-and-test"], "^1.14.0");
        assert!(written["devDependencies"].get("unrelated").is_none());
        assert_eq!(written["scripts"]["dev"], "remix dev");
        assert_eq!(written["scripts"]["cy:run"], "cypress run");
        assert_eq!(
            written["scripts"]["test:e2e:run"],
            "start-server-and-test dev http://localhost:3000 cy:run"
        );
        assert_eq!(
            written["scripts"]["test:e2e:dev"],
            "start-server-and-test dev http://localhost:3000 cy:open"
        );
    }

    #[test]
    fn install_test_runner_requires_shared_packages() {
        let shared_dir = tempdir().unwrap();
        write_manifest(shared_dir.path(), json!({ "dependencies": { "cypress": "9" } }));
        let app_dir = tempdir().unwrap();
        write_manifest(app_dir.path(), json!({}));

        let shared = PackageManifest::read(shared_dir.path()).unwrap();
        let mut app = PackageManifest::read(app_dir.path()).unwrap();
        let err = app
            .install_test_runner("http://localhost:3000", &shared)
            .unwrap_err();
        assert!(err.to_string().contains("start-server-and-test"));
    }

    #[test]
    fn set_entry_rejects_non_object_section() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), json!({ "scripts": "oops" }));
        let mut manifest = PackageManifest::read(dir.path()).unwrap();
        assert!(manifest.set_entry("scripts", "cy:run", "cypress run").is_err());
    }
}
