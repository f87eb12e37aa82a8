use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ethers::abi::Abi;
use ethers::types::Bytes;
use eyre::{bail, Context};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::serde_utils;

/// Hardhat keeps compiler inputs and outputs here, never contract artifacts
pub const BUILD_INFO_DIR: &str = "build-info";

/// Solidity marks library addresses still to be linked as `__$<hash>$__`
const LIBRARY_PLACEHOLDER: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSpec {
    pub path: Option<PathBuf>,
    pub name: String,
}

impl ContractSpec {
    pub fn path_name(path: impl AsRef<Path>, name: impl ToString) -> Self {
        Self {
            path: Some(path.as_ref().to_owned()),
            name: name.to_string(),
        }
    }

    pub fn name(name: impl ToString) -> Self {
        Self {
            path: None,
            name: name.to_string(),
        }
    }
}

impl FromStr for ContractSpec {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let spec = match s.rsplit_once(':') {
            Some((path, name)) => {
                if path.is_empty() {
                    bail!("Missing source path in contract spec {s:?}");
                }

                if Path::new(path).is_absolute() {
                    bail!(
                        "Source path in contract spec {s:?} must be relative to the artifacts directory"
                    );
                }

                Self::path_name(path, name)
            }
            None => Self::name(s),
        };

        if spec.name.is_empty() {
            bail!("Missing contract name in contract spec {s:?}");
        }

        Ok(spec)
    }
}

impl fmt::Display for ContractSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = self.path.as_deref() {
            write!(f, "{}:{}", path.display(), self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Compiler output for a single contract, as written by hardhat or forge
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub abi: Abi,
    pub bytecode: Bytecode,
    #[serde(default)]
    pub link_references: BTreeMap<String, serde_json::Value>,
}

/// Creation code as emitted by the compiler. Kept as text since unlinked
/// code holds placeholders that are not valid hex.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Bytecode {
    /// Hardhat: `"bytecode": "0x..."`
    Hardhat(String),
    /// Forge: `"bytecode": { "object": "0x...", "linkReferences": {...} }`
    Forge {
        object: String,
        #[serde(default, rename = "linkReferences")]
        link_references: BTreeMap<String, serde_json::Value>,
    },
}

/// A contract that is ready to be deployed as is
#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn raw_creation_code(&self) -> &str {
        match &self.bytecode {
            Bytecode::Hardhat(code) => code,
            Bytecode::Forge { object, .. } => object,
        }
    }

    /// Source files of the libraries this contract must be linked against
    pub fn unlinked_libraries(&self) -> Vec<&str> {
        let forge_references = match &self.bytecode {
            Bytecode::Hardhat(_) => None,
            Bytecode::Forge {
                link_references, ..
            } => Some(link_references),
        };

        self.link_references
            .keys()
            .chain(forge_references.into_iter().flat_map(|refs| refs.keys()))
            .map(String::as_str)
            .collect()
    }

    /// Decodes the creation code, refusing anything that would not deploy
    /// as a working contract.
    pub fn into_compiled(
        self,
        spec: &ContractSpec,
    ) -> eyre::Result<CompiledContract> {
        let libraries = self.unlinked_libraries();
        if !libraries.is_empty() {
            bail!(
                "{spec} must be linked against libraries from {} before it can be deployed",
                libraries.join(", ")
            );
        }

        let code = self.raw_creation_code();
        let code = code.strip_prefix("0x").unwrap_or(code);

        if code.contains(LIBRARY_PLACEHOLDER) {
            bail!(
                "{spec} bytecode still holds library placeholders and must be linked before it can be deployed"
            );
        }

        let bytecode = hex::decode(code)
            .with_context(|| format!("Decoding {spec} bytecode"))?;

        if bytecode.is_empty() {
            bail!("{spec} has no bytecode, it is abstract or an interface");
        }

        Ok(CompiledContract {
            abi: self.abi,
            bytecode: bytecode.into(),
        })
    }
}

/// Compiled contracts registry rooted at an artifacts directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Finds the artifact file for `spec`.
    ///
    /// A fully qualified spec maps straight to `<root>/<path>/<name>.json`.
    /// A bare name is searched for across the whole tree and must match
    /// exactly one file.
    #[instrument(skip_all)]
    pub async fn locate(&self, spec: &ContractSpec) -> eyre::Result<PathBuf> {
        let file_name = format!("{}.json", spec.name);

        if let Some(path) = spec.path.as_deref() {
            if path.is_absolute() {
                bail!(
                    "Source path of {spec} must be relative to {}",
                    self.root.display()
                );
            }

            let artifact_path = self.root.join(path).join(&file_name);

            if !artifact_path.exists() {
                bail!(
                    "Artifact for {spec} not found at {} (was it compiled?)",
                    artifact_path.display()
                );
            }

            return Ok(artifact_path);
        }

        let mut candidates = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries =
                tokio::fs::read_dir(&dir).await.with_context(|| {
                    format!("Reading artifacts directory {}", dir.display())
                })?;

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    if entry.file_name() != BUILD_INFO_DIR {
                        pending.push(entry.path());
                    }
                } else if entry.file_name().to_str() == Some(file_name.as_str())
                {
                    candidates.push(entry.path());
                }
            }
        }

        candidates.sort();

        match candidates.len() {
            0 => bail!(
                "Artifact for {spec} not found under {} (was it compiled?)",
                self.root.display()
            ),
            1 => Ok(candidates.remove(0)),
            _ => {
                let found = candidates
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");

                bail!(
                    "Multiple artifacts for {spec}: {found}. Use a fully qualified name like <source path>:{}",
                    spec.name
                )
            }
        }
    }

    #[instrument(skip_all, fields(contract = %spec))]
    pub async fn load(
        &self,
        spec: &ContractSpec,
    ) -> eyre::Result<CompiledContract> {
        let path = self.locate(spec).await?;

        info!("Loading artifact from {}", path.display());

        let artifact: ContractArtifact =
            serde_utils::read_deserialize(&path).await?;

        artifact.into_compiled(spec)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const HARDHAT_ARTIFACT: &str = indoc! {r#"
        {
          "_format": "hh-sol-artifact-1",
          "contractName": "CryptoDevToken",
          "sourceName": "contracts/CryptoDevToken.sol",
          "abi": [
            {
              "inputs": [
                {
                  "internalType": "address",
                  "name": "_cryptoDevsContract",
                  "type": "address"
                }
              ],
              "stateMutability": "nonpayable",
              "type": "constructor"
            }
          ],
          "bytecode": "0x6080604052",
          "deployedBytecode": "0x6080",
          "linkReferences": {},
          "deployedLinkReferences": {}
        }
    "#};

    const FORGE_ARTIFACT: &str = indoc! {r#"
        {
          "abi": [
            {
              "type": "constructor",
              "inputs": [
                { "name": "_cryptoDevsContract", "type": "address", "internalType": "address" }
              ],
              "stateMutability": "nonpayable"
            }
          ],
          "bytecode": { "object": "0x60806040", "linkReferences": {} },
          "deployedBytecode": { "object": "0x6080", "linkReferences": {} }
        }
    "#};

    const INTERFACE_ARTIFACT: &str = indoc! {r#"
        {
          "contractName": "ICryptoDevs",
          "abi": [],
          "bytecode": "0x",
          "linkReferences": {}
        }
    "#};

    const LINKED_ARTIFACT: &str = indoc! {r#"
        {
          "contractName": "NeedsLibrary",
          "abi": [],
          "bytecode": "0x6080604052__$3f1b8e4c0d2a6e9b7c5f1a3d8e2b4c6a0f$__6040",
          "linkReferences": {
            "contracts/Math.sol": {
              "Math": [{ "length": 20, "start": 5 }]
            }
          }
        }
    "#};

    const FORGE_LINKED_ARTIFACT: &str = indoc! {r#"
        {
          "abi": [],
          "bytecode": {
            "object": "0x6080604052__$3f1b8e4c0d2a6e9b7c5f1a3d8e2b4c6a0f$__6040",
            "linkReferences": {
              "src/Math.sol": {
                "Math": [{ "length": 20, "start": 5 }]
              }
            }
          }
        }
    "#};

    const PLACEHOLDER_ONLY_ARTIFACT: &str = indoc! {r#"
        {
          "contractName": "NeedsLibrary",
          "abi": [],
          "bytecode": "0x6080604052__$3f1b8e4c0d2a6e9b7c5f1a3d8e2b4c6a0f$__6040"
        }
    "#};

    fn write_artifact(
        root: &Path,
        relative: impl AsRef<Path>,
        content: &str,
    ) -> eyre::Result<()> {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    #[test]
    fn contract_spec_parsing() -> eyre::Result<()> {
        let bare: ContractSpec = "CryptoDevToken".parse()?;
        assert_eq!(bare, ContractSpec::name("CryptoDevToken"));
        assert_eq!(bare.to_string(), "CryptoDevToken");

        let qualified: ContractSpec =
            "contracts/CryptoDevToken.sol:CryptoDevToken".parse()?;
        assert_eq!(
            qualified,
            ContractSpec::path_name(
                "contracts/CryptoDevToken.sol",
                "CryptoDevToken"
            )
        );
        assert_eq!(
            qualified.to_string(),
            "contracts/CryptoDevToken.sol:CryptoDevToken"
        );

        assert!("contracts/CryptoDevToken.sol:".parse::<ContractSpec>().is_err());
        assert!(":CryptoDevToken".parse::<ContractSpec>().is_err());

        Ok(())
    }

    #[test]
    fn absolute_source_paths_are_rejected() {
        let err = "/etc/CryptoDevToken.sol:CryptoDevToken"
            .parse::<ContractSpec>()
            .unwrap_err();

        assert!(err.to_string().contains("relative"));
    }

    #[tokio::test]
    async fn qualified_spec_stays_inside_artifacts_dir() -> eyre::Result<()> {
        let outside = tempfile::tempdir()?;
        write_artifact(
            outside.path(),
            "CryptoDevToken.sol/CryptoDevToken.json",
            HARDHAT_ARTIFACT,
        )?;

        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(dir.path());

        let escaping = format!(
            "{}:CryptoDevToken",
            outside.path().join("CryptoDevToken.sol").display()
        );

        assert!(escaping.parse::<ContractSpec>().is_err());

        let err = store
            .locate(&ContractSpec::path_name(
                outside.path().join("CryptoDevToken.sol"),
                "CryptoDevToken",
            ))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be relative"));

        Ok(())
    }

    #[tokio::test]
    async fn loads_hardhat_artifact_by_name() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        write_artifact(
            dir.path(),
            "contracts/CryptoDevToken.sol/CryptoDevToken.json",
            HARDHAT_ARTIFACT,
        )?;
        write_artifact(
            dir.path(),
            "contracts/CryptoDevToken.sol/CryptoDevToken.dbg.json",
            r#"{ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/x.json" }"#,
        )?;
        write_artifact(dir.path(), "build-info/CryptoDevToken.json", "{}")?;

        let store = ArtifactStore::new(dir.path());
        let contract = store.load(&ContractSpec::name("CryptoDevToken")).await?;

        assert_eq!(
            contract.bytecode.to_vec(),
            vec![0x60u8, 0x80, 0x60, 0x40, 0x52]
        );
        assert_eq!(
            contract.abi.constructor().map(|c| c.inputs.len()),
            Some(1)
        );

        Ok(())
    }

    #[tokio::test]
    async fn loads_forge_artifact() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        write_artifact(
            dir.path(),
            "CryptoDevToken.sol/CryptoDevToken.json",
            FORGE_ARTIFACT,
        )?;

        let store = ArtifactStore::new(dir.path());
        let contract = store.load(&ContractSpec::name("CryptoDevToken")).await?;

        assert_eq!(contract.bytecode.to_vec(), vec![0x60u8, 0x80, 0x60, 0x40]);

        Ok(())
    }

    #[tokio::test]
    async fn missing_artifact_is_an_error() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        write_artifact(
            dir.path(),
            "contracts/CryptoDevs.sol/CryptoDevs.json",
            HARDHAT_ARTIFACT,
        )?;

        let store = ArtifactStore::new(dir.path());
        let err = store
            .load(&ContractSpec::name("CryptoDevToken"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not found"));

        Ok(())
    }

    #[tokio::test]
    async fn missing_artifacts_dir_is_an_error() {
        let store = ArtifactStore::new("/definitely/not/an/artifacts/dir");

        assert!(store
            .locate(&ContractSpec::name("CryptoDevToken"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn ambiguous_name_requires_qualification() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        write_artifact(
            dir.path(),
            "contracts/CryptoDevToken.sol/CryptoDevToken.json",
            HARDHAT_ARTIFACT,
        )?;
        write_artifact(
            dir.path(),
            "contracts/legacy/CryptoDevToken.sol/CryptoDevToken.json",
            HARDHAT_ARTIFACT,
        )?;

        let store = ArtifactStore::new(dir.path());

        let err = store
            .locate(&ContractSpec::name("CryptoDevToken"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Multiple artifacts"));

        let path = store
            .locate(&"contracts/legacy/CryptoDevToken.sol:CryptoDevToken".parse()?)
            .await?;
        assert_eq!(
            path,
            dir.path()
                .join("contracts/legacy/CryptoDevToken.sol/CryptoDevToken.json")
        );

        Ok(())
    }

    #[tokio::test]
    async fn rejects_interfaces() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        write_artifact(
            dir.path(),
            "contracts/ICryptoDevs.sol/ICryptoDevs.json",
            INTERFACE_ARTIFACT,
        )?;

        let store = ArtifactStore::new(dir.path());
        let err = store
            .load(&ContractSpec::name("ICryptoDevs"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no bytecode"));

        Ok(())
    }

    #[tokio::test]
    async fn rejects_unlinked_bytecode() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        write_artifact(
            dir.path(),
            "contracts/NeedsLibrary.sol/NeedsLibrary.json",
            LINKED_ARTIFACT,
        )?;

        let store = ArtifactStore::new(dir.path());
        let err = store
            .load(&ContractSpec::name("NeedsLibrary"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("contracts/Math.sol"));

        Ok(())
    }

    #[tokio::test]
    async fn rejects_unlinked_forge_bytecode() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        write_artifact(
            dir.path(),
            "NeedsLibrary.sol/NeedsLibrary.json",
            FORGE_LINKED_ARTIFACT,
        )?;

        let store = ArtifactStore::new(dir.path());
        let err = store
            .load(&ContractSpec::name("NeedsLibrary"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("src/Math.sol"));

        Ok(())
    }

    #[test]
    fn placeholders_without_link_references_are_rejected() -> eyre::Result<()>
    {
        let artifact: ContractArtifact =
            serde_json::from_str(PLACEHOLDER_ONLY_ARTIFACT)?;
        assert!(artifact.unlinked_libraries().is_empty());

        let err = artifact
            .into_compiled(&ContractSpec::name("NeedsLibrary"))
            .unwrap_err();

        assert!(err.to_string().contains("library placeholders"));

        Ok(())
    }
}
