//! Compiled contract artifacts.
//!
//! Indexes a build output directory (hardhat `artifacts/` or foundry
//! `out/`) by contract name and extracts creation bytecode on demand.
//! Both layouts nest one JSON file per contract under a per-source
//! directory, e.g. `contracts/BeachBar.sol/BeachBar.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alloy::primitives::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactStoreError {
    #[error("failed to read artifacts at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no compiled artifact for contract {0}")]
    UnknownContract(String),
    #[error("contract {0} has no creation bytecode (interface or abstract contract)")]
    NotDeployable(String),
}

/// Creation bytecode in either hardhat (`"0x.."`) or foundry
/// (`{ "object": "0x.." }`) form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreationCode {
    Hardhat(Bytes),
    Foundry { object: Bytes },
}

#[derive(Debug, Deserialize)]
struct CompiledArtifact {
    bytecode: CreationCode,
}

/// Index of compiled artifacts by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    paths: HashMap<String, PathBuf>,
}

impl ArtifactStore {
    /// Walks `root` recursively and indexes every `<Name>.json` file.
    ///
    /// Hardhat debug files (`*.dbg.json`) are skipped. When two files
    /// share a contract name the first one found wins.
    pub fn load(root: &Path) -> Result<Self, ArtifactStoreError> {
        let mut store = Self::default();
        store.index_dir(root)?;

        debug!(root = %root.display(), contracts = store.paths.len(), "Indexed artifacts");
        Ok(store)
    }

    fn index_dir(&mut self, dir: &Path) -> Result<(), ArtifactStoreError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ArtifactStoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| ArtifactStoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();

            if path.is_dir() {
                self.index_dir(&path)?;
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            if file_name.ends_with(".dbg.json") {
                continue;
            }

            let Some(contract) = file_name.strip_suffix(".json") else {
                continue;
            };

            if let Some(existing) = self.paths.get(contract) {
                warn!(
                    contract,
                    kept = %existing.display(),
                    ignored = %path.display(),
                    "Duplicate artifact name"
                );
                continue;
            }

            self.paths.insert(contract.to_string(), path);
        }

        Ok(())
    }

    /// Returns `true` if an artifact named `contract` was indexed.
    pub fn contains(&self, contract: &str) -> bool {
        self.paths.contains_key(contract)
    }

    /// Reads the creation bytecode of `contract`.
    pub fn bytecode(&self, contract: &str) -> Result<Bytes, ArtifactStoreError> {
        let path = self
            .paths
            .get(contract)
            .ok_or_else(|| ArtifactStoreError::UnknownContract(contract.to_string()))?;

        let raw = std::fs::read_to_string(path).map_err(|source| ArtifactStoreError::Io {
            path: path.clone(),
            source,
        })?;

        let artifact: CompiledArtifact =
            serde_json::from_str(&raw).map_err(|source| ArtifactStoreError::Parse {
                path: path.clone(),
                source,
            })?;

        let bytecode = match artifact.bytecode {
            CreationCode::Hardhat(code) | CreationCode::Foundry { object: code } => code,
        };

        if bytecode.is_empty() {
            return Err(ArtifactStoreError::NotDeployable(contract.to_string()));
        }

        Ok(bytecode)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::bytes;

    use super::*;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn reads_hardhat_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("contracts/BeachBar.sol/BeachBar.json"),
            r#"{"contractName":"BeachBar","abi":[],"bytecode":"0x6080604052"}"#,
        );

        let store = ArtifactStore::load(dir.path()).unwrap();

        assert_eq!(store.bytecode("BeachBar").unwrap(), bytes!("0x6080604052"));
    }

    #[test]
    fn reads_foundry_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("YieldBox.sol/YieldBox.json"),
            r#"{"abi":[],"bytecode":{"object":"0x60016002","linkReferences":{}}}"#,
        );

        let store = ArtifactStore::load(dir.path()).unwrap();

        assert_eq!(store.bytecode("YieldBox").unwrap(), bytes!("0x60016002"));
    }

    #[test]
    fn skips_debug_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("contracts/OracleMock.sol/OracleMock.dbg.json"),
            r#"{"buildInfo":"../../build-info/abc.json"}"#,
        );

        let store = ArtifactStore::load(dir.path()).unwrap();

        assert!(!store.contains("OracleMock"));
        assert!(!store.contains("OracleMock.dbg"));
    }

    #[test]
    fn unknown_contract_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::load(dir.path()).unwrap();

        let error = store.bytecode("MultiSwapper").unwrap_err();
        assert!(matches!(error, ArtifactStoreError::UnknownContract(name) if name == "MultiSwapper"));
    }

    #[test]
    fn interface_artifact_is_not_deployable() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("contracts/IOracle.sol/IOracle.json"),
            r#"{"abi":[],"bytecode":"0x"}"#,
        );

        let store = ArtifactStore::load(dir.path()).unwrap();

        assert!(matches!(
            store.bytecode("IOracle").unwrap_err(),
            ArtifactStoreError::NotDeployable(_)
        ));
    }

    #[test]
    fn missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        assert!(matches!(
            ArtifactStore::load(&missing).unwrap_err(),
            ArtifactStoreError::Io { .. }
        ));
    }
}
