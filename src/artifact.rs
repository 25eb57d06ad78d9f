//! Compiled contract artifacts and the registries that resolve them by name.
//!
//! The build-directory registry reads Truffle-style JSON artifacts: one
//! `<ContractName>.json` per contract with `contractName`, `abi` and
//! `bytecode` fields. Unknown fields are ignored.

use alloy_primitives::{hex, keccak256, B256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::{dlog_debug, dlog_trace, dlog_warn};

/// A compiled contract descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(default)]
    pub abi: serde_json::Value,
    /// Hex-encoded creation bytecode, `0x` prefix optional.
    #[serde(default)]
    pub bytecode: String,
}

impl ContractArtifact {
    pub fn new(name: &str, bytecode: &str) -> Self {
        Self {
            contract_name: name.to_string(),
            abi: serde_json::Value::Array(Vec::new()),
            bytecode: bytecode.to_string(),
        }
    }

    /// Artifact with stand-in bytecode derived from the contract name.
    ///
    /// Used when no build directory is configured so that plans can still be
    /// exercised against the local chain.
    pub fn placeholder(name: &str) -> Self {
        let hash = keccak256(name.as_bytes());
        Self::new(name, &format!("0x6080604052{}", hex::encode(hash)))
    }

    /// Decode the creation bytecode.
    pub fn bytecode_bytes(&self) -> std::result::Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.bytecode.trim())
    }

    /// Hash of the creation bytecode.
    pub fn code_hash(&self) -> std::result::Result<B256, hex::FromHexError> {
        Ok(keccak256(self.bytecode_bytes()?))
    }

    /// An artifact whose bytecode is empty cannot be deployed (abstract
    /// contracts and interfaces compile to nothing).
    pub fn is_deployable(&self) -> bool {
        matches!(self.bytecode_bytes(), Ok(code) if !code.is_empty())
    }
}

/// Resolve compiled contract descriptors by name.
pub trait ArtifactRegistry: Send + Sync {
    fn require(&self, name: &str) -> Result<ContractArtifact>;

    /// Names of every artifact the registry can resolve, sorted.
    fn names(&self) -> Vec<String>;
}

/// Registry backed by a map, populated up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    artifacts: BTreeMap<String, ContractArtifact>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a placeholder artifact for each name.
    pub fn with_placeholders<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut registry = Self::new();
        for name in names {
            registry.insert(ContractArtifact::placeholder(name));
        }
        registry
    }

    pub fn insert(&mut self, artifact: ContractArtifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactRegistry for InMemoryRegistry {
    fn require(&self, name: &str) -> Result<ContractArtifact> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ArtifactNotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.artifacts.keys().cloned().collect()
    }
}

/// Registry reading `<dir>/<Name>.json` on each lookup.
#[derive(Debug, Clone)]
pub struct BuildDirRegistry {
    dir: PathBuf,
}

impl BuildDirRegistry {
    pub fn new(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::Validation(format!(
                "artifact directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl ArtifactRegistry for BuildDirRegistry {
    fn require(&self, name: &str) -> Result<ContractArtifact> {
        let path = self.artifact_path(name);
        dlog_debug!("BuildDirRegistry::require {} path={}", name, path.display());
        if !path.is_file() {
            return Err(Error::ArtifactNotFound(name.to_string()));
        }
        let artifact: ContractArtifact = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if artifact.contract_name != name {
            return Err(Error::Validation(format!(
                "{} declares contractName {}",
                path.display(),
                artifact.contract_name
            )));
        }
        dlog_trace!("Artifact {} bytecode={}", name, artifact.bytecode);
        Ok(artifact)
    }

    fn names(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                dlog_warn!("Cannot list {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}
