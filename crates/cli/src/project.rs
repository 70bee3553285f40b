use anyhow::{bail, Context, Result};
use keyhint_index::{FsClasspath, IndexConfig, ModuleClasspath};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// `keyhint.toml`: the modules of a project and where their classpath lives.
///
/// ```toml
/// metadata_file = "META-INF/spring-configuration-metadata.json"
///
/// [[module]]
/// name = "app"
/// roots = ["build/classes/java/main", "libs/spring-boot-autoconfigure.jar"]
/// scan = ["~/.m2/repository/org/springframework/boot"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub metadata_file: Option<String>,
    #[serde(default)]
    pub additional_metadata_file: Option<String>,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    pub name: String,
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    /// Directories searched for archives and exploded roots.
    #[serde(default)]
    pub scan: Vec<PathBuf>,
}

impl ProjectConfig {
    /// Reads `path`, resolving relative roots against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read project config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid project config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolve_paths(base))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        let mut names = HashSet::new();
        for module in &config.modules {
            if module.name.trim().is_empty() {
                bail!("module name must not be empty");
            }
            if !names.insert(module.name.as_str()) {
                bail!("module {} is declared twice", module.name);
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for module in &mut self.modules {
            for path in module.roots.iter_mut().chain(module.scan.iter_mut()) {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        self
    }

    /// Environment defaults with the document locations from this file on top.
    #[must_use]
    pub fn index_config(&self) -> IndexConfig {
        let mut config = IndexConfig::from_env();
        if let Some(file) = &self.metadata_file {
            config.metadata_file = file.clone();
        }
        if let Some(file) = &self.additional_metadata_file {
            config.additional_metadata_file = (!file.trim().is_empty()).then(|| file.clone());
        }
        config
    }

    #[must_use]
    pub fn classpath(&self, config: IndexConfig) -> FsClasspath {
        self.modules
            .iter()
            .fold(FsClasspath::new(config), |classpath, module| {
                classpath.with_module(
                    module.name.clone(),
                    ModuleClasspath {
                        roots: module.roots.clone(),
                        scan: module.scan.clone(),
                    },
                )
            })
    }
}
