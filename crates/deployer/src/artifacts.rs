//! Resolution of compiled contract artifacts into deployable factories.
//!
//! Artifacts are the JSON files emitted by Hardhat (`artifacts/`) or Foundry
//! (`out/`) when compiling contracts. Both contain the contract ABI and its
//! creation bytecode, they only differ in how the bytecode is stored.

use {
    alloy::{
        dyn_abi::{JsonAbiExt, Specifier},
        json_abi::JsonAbi,
        primitives::{Bytes, hex},
    },
    anyhow::{Context, Result, anyhow, bail, ensure},
    serde::Deserialize,
    std::{
        collections::BTreeMap,
        fs,
        path::{Path, PathBuf},
    },
};

/// Directories inside an artifact tree that never contain contract artifacts.
const SKIPPED_DIRS: &[&str] = &["build-info", "cache"];

/// Source of compiled contracts.
#[cfg_attr(test, mockall::automock)]
pub trait Artifacts: Send + Sync {
    /// Resolves a contract by its name into a factory able to deploy it.
    ///
    /// The name is either a bare contract name (`DataContent`) or a fully
    /// qualified one (`contracts/DataContent.sol:DataContent`).
    fn resolve(&self, name: &str) -> Result<ContractFactory>;
}

/// A compiled contract that can be deployed.
#[derive(Debug, Clone)]
pub struct ContractFactory {
    name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

impl ContractFactory {
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Result<Self> {
        let name = name.into();
        ensure!(
            !bytecode.is_empty(),
            "contract {name} has no creation bytecode, it is either abstract or an interface"
        );
        Ok(Self {
            name,
            abi,
            bytecode,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Builds the init code of a deployment transaction: the creation
    /// bytecode followed by the ABI encoded constructor arguments.
    ///
    /// Every argument is coerced from its string form into the type of the
    /// matching constructor parameter.
    pub fn deploy_code(&self, args: &[String]) -> Result<Bytes> {
        let encoded_args = match self.abi.constructor() {
            Some(constructor) => {
                ensure!(
                    constructor.inputs.len() == args.len(),
                    "constructor of {} takes {} arguments but {} were given",
                    self.name,
                    constructor.inputs.len(),
                    args.len(),
                );
                let values = constructor
                    .inputs
                    .iter()
                    .zip(args)
                    .map(|(param, arg)| {
                        let ty = param.resolve().with_context(|| {
                            format!("unsupported constructor parameter type {}", param.ty)
                        })?;
                        ty.coerce_str(arg).with_context(|| {
                            format!(
                                "invalid value {arg:?} for constructor parameter {:?} of type {}",
                                param.name, param.ty
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                constructor
                    .abi_encode_input(&values)
                    .context("failed to encode constructor arguments")?
            }
            None => {
                ensure!(
                    args.is_empty(),
                    "contract {} has no constructor but {} arguments were given",
                    self.name,
                    args.len(),
                );
                Vec::new()
            }
        };

        Ok([self.bytecode.as_ref(), encoded_args.as_slice()]
            .concat()
            .into())
    }
}

/// Artifacts read from a directory of compiler output.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Finds all artifact files matching the given contract name.
    fn find(&self, name: &ContractName<'_>) -> Result<Vec<PathBuf>> {
        ensure!(
            self.root.is_dir(),
            "artifact directory {} does not exist, compile the contracts first",
            self.root.display()
        );

        let file_name = format!("{}.json", name.contract);
        let mut found = Vec::new();
        collect(&self.root, &file_name, &mut found)?;

        if let Some(source) = name.source {
            let suffix = Path::new(source).join(&file_name);
            found.retain(|path| path.ends_with(&suffix));
        }
        found.sort();
        Ok(found)
    }
}

impl Artifacts for ArtifactDir {
    fn resolve(&self, name: &str) -> Result<ContractFactory> {
        let contract_name = ContractName::parse(name)?;
        let path = match self.find(&contract_name)?.as_slice() {
            [] => bail!(
                "no artifact for contract {name} found in {}",
                self.root.display()
            ),
            [path] => path.clone(),
            paths => bail!(
                "multiple artifacts for contract {name}, use a fully qualified name to pick \
                 one of: {}",
                paths
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        tracing::debug!(path = %path.display(), "loading contract artifact");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;
        let artifact: Artifact = serde_json::from_str(&json)
            .with_context(|| format!("malformed artifact {}", path.display()))?;
        let bytecode = artifact
            .creation_code()
            .with_context(|| format!("invalid bytecode in artifact {}", path.display()))?;

        ContractFactory::new(contract_name.contract, artifact.abi, bytecode)
    }
}

fn collect(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            let skipped = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            if !skipped {
                collect(&path, file_name, found)?;
            }
        } else if path.file_name().and_then(|name| name.to_str()) == Some(file_name) {
            found.push(path);
        }
    }
    Ok(())
}

/// A contract name, optionally qualified with the source file defining it.
#[derive(Debug, PartialEq, Eq)]
struct ContractName<'a> {
    source: Option<&'a str>,
    contract: &'a str,
}

impl<'a> ContractName<'a> {
    fn parse(name: &'a str) -> Result<Self> {
        let (source, contract) = match name.rsplit_once(':') {
            Some((source, contract)) => (Some(source), contract),
            None => (None, name),
        };
        ensure!(
            !contract.is_empty() && source.is_none_or(|source| !source.is_empty()),
            "invalid contract name {name:?}"
        );
        Ok(Self { source, contract })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    abi: JsonAbi,
    bytecode: Bytecode,
    #[serde(default)]
    link_references: LinkReferences,
}

/// Library placeholders left in the bytecode, keyed by source and library.
type LinkReferences = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum Bytecode {
    /// Hardhat stores the bytecode as a plain hex string.
    Hex(String),
    /// Foundry wraps it together with its link references.
    #[serde(rename_all = "camelCase")]
    Object {
        object: String,
        #[serde(default)]
        link_references: LinkReferences,
    },
}

impl Artifact {
    fn creation_code(&self) -> Result<Bytes> {
        let (code, link_references) = match &self.bytecode {
            Bytecode::Hex(code) => (code, &self.link_references),
            Bytecode::Object {
                object,
                link_references,
            } => (object, link_references),
        };
        if let Some((source, libraries)) = link_references.iter().next() {
            let libraries = libraries.keys().cloned().collect::<Vec<_>>().join(", ");
            return Err(anyhow!(
                "bytecode needs to be linked against libraries {libraries} from {source}, which \
                 is not supported"
            ));
        }
        Ok(hex::decode(code)?.into())
    }
}
