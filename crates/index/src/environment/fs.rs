use super::ClasspathEnvironment;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::source::{Fingerprint, SourceDescriptor};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip"];

/// Classpath of one module: explicit roots plus directories scanned for
/// archives and exploded roots.
#[derive(Debug, Clone, Default)]
pub struct ModuleClasspath {
    pub roots: Vec<PathBuf>,
    pub scan: Vec<PathBuf>,
}

/// Classpath backed by directories and `.jar`/`.zip` archives on disk.
#[derive(Debug, Clone, Default)]
pub struct FsClasspath {
    config: IndexConfig,
    modules: BTreeMap<String, ModuleClasspath>,
}

impl FsClasspath {
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            modules: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, classpath: ModuleClasspath) -> Self {
        self.add_module(name, classpath);
        self
    }

    pub fn add_module(&mut self, name: impl Into<String>, classpath: ModuleClasspath) {
        self.modules.insert(name.into(), classpath);
    }

    #[must_use]
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Descriptor of one root. A root that does not exist is reported without
    /// metadata rather than as an error; it may appear later.
    pub fn describe(&self, path: &Path) -> Result<SourceDescriptor> {
        let canonical = match fs::canonicalize(path) {
            Ok(canonical) => canonical,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(SourceDescriptor::new(
                    path,
                    path.display().to_string(),
                    Fingerprint::Missing,
                    false,
                ));
            }
            Err(err) => return Err(err.into()),
        };
        let identity = canonical.display().to_string();

        if canonical.is_dir() {
            let mut fingerprint = Fingerprint::Missing;
            let mut has_metadata_file = false;
            for file in self.config.metadata_files() {
                if let Ok(metadata) = fs::metadata(canonical.join(file)) {
                    fingerprint = fingerprint.combine(Fingerprint::from_fs_metadata(&metadata));
                    has_metadata_file = true;
                }
            }
            return Ok(SourceDescriptor::new(
                canonical,
                identity,
                fingerprint,
                has_metadata_file,
            ));
        }

        if is_archive(&canonical) {
            let fingerprint = Fingerprint::from_fs_metadata(&fs::metadata(&canonical)?);
            let mut archive = open_archive(&canonical)?;
            let has_metadata_file = self
                .config
                .metadata_files()
                .into_iter()
                .any(|file| archive.by_name(file).is_ok());
            return Ok(SourceDescriptor::new(
                canonical,
                identity,
                fingerprint,
                has_metadata_file,
            ));
        }

        Err(IndexError::InvalidRoot(identity))
    }

    fn module_roots(&self, module: &ModuleClasspath) -> Vec<PathBuf> {
        let mut roots = module.roots.clone();
        for dir in &module.scan {
            roots.extend(discover_roots(dir, &self.config.metadata_file));
        }
        roots
    }
}

impl ClasspathEnvironment for FsClasspath {
    fn modules(&self) -> Result<Vec<String>> {
        Ok(self.modules.keys().cloned().collect())
    }

    fn classpath_roots(&self, module: &str) -> Result<Vec<SourceDescriptor>> {
        let classpath = self
            .modules
            .get(module)
            .ok_or_else(|| IndexError::UnknownModule(module.to_string()))?;

        let mut descriptors = Vec::new();
        for root in self.module_roots(classpath) {
            match self.describe(&root) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => log::warn!("Skipping classpath root {}: {err}", root.display()),
            }
        }
        Ok(descriptors)
    }

    fn read_metadata(&self, source: &SourceDescriptor) -> Result<Vec<Vec<u8>>> {
        let root = &source.root_path;
        let mut documents = Vec::new();

        if root.is_dir() {
            for file in self.config.metadata_files() {
                match fs::read(root.join(file)) {
                    Ok(bytes) => documents.push(bytes),
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
            return Ok(documents);
        }

        let mut archive = open_archive(root)?;
        for file in self.config.metadata_files() {
            match archive.by_name(file) {
                Ok(mut entry) => {
                    let mut bytes = Vec::with_capacity(entry.size() as usize);
                    entry.read_to_end(&mut bytes)?;
                    documents.push(bytes);
                }
                Err(ZipError::FileNotFound) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(documents)
    }

    fn watch_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .modules
            .values()
            .flat_map(|module| module.roots.iter().chain(module.scan.iter()))
            .filter(|path| path.exists())
            .cloned()
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

#[must_use]
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

/// Archives and exploded roots (directories holding `metadata_file`) below
/// `dir`, sorted by path. Exploded roots are not descended into.
#[must_use]
pub fn discover_roots(dir: &Path, metadata_file: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(dir).follow_links(true).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Failed to scan {}: {err}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_dir() {
            if path.join(metadata_file).is_file() {
                found.push(path.to_path_buf());
                walker.skip_current_dir();
            }
        } else if is_archive(path) {
            found.push(path.to_path_buf());
        }
    }

    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_METADATA_FILE;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn archive_extension_is_case_insensitive() {
        assert!(is_archive(Path::new("lib/boot.JAR")));
        assert!(is_archive(Path::new("lib/boot.zip")));
        assert!(!is_archive(Path::new("lib/boot.json")));
        assert!(!is_archive(Path::new("lib/jar")));
    }

    #[test]
    fn missing_root_has_no_metadata() {
        let classpath = FsClasspath::new(IndexConfig::default());
        let descriptor = classpath
            .describe(Path::new("/definitely/not/here.jar"))
            .unwrap();
        assert_eq!(descriptor.fingerprint, Fingerprint::Missing);
        assert!(!descriptor.has_metadata_file);
    }

    #[test]
    fn discover_stops_at_exploded_roots() {
        let temp = TempDir::new().unwrap();
        let exploded = temp.path().join("classes");
        let nested = exploded.join("nested");
        fs::create_dir_all(nested.join("META-INF")).unwrap();
        fs::create_dir_all(exploded.join("META-INF")).unwrap();
        fs::write(exploded.join(DEFAULT_METADATA_FILE), "{}").unwrap();
        fs::write(nested.join(DEFAULT_METADATA_FILE), "{}").unwrap();
        fs::write(temp.path().join("lib.jar"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();

        let found = discover_roots(temp.path(), DEFAULT_METADATA_FILE);
        assert_eq!(found, vec![exploded, temp.path().join("lib.jar")]);
    }
}
