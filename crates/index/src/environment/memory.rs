use super::ClasspathEnvironment;
use crate::error::{IndexError, Result};
use crate::source::{Fingerprint, SourceDescriptor, SourceId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone)]
struct MemoryRoot {
    document: Option<String>,
    revision: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    modules: BTreeMap<String, Vec<SourceId>>,
    roots: HashMap<SourceId, MemoryRoot>,
    revision: u64,
}

/// Classpath held in memory, for embedding hosts that already know their
/// module layout and for tests. A root's fingerprint is bumped whenever its
/// document changes.
#[derive(Debug, Default)]
pub struct InMemoryClasspath {
    state: RwLock<MemoryState>,
}

impl InMemoryClasspath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&self, module: &str) {
        self.write(|state| {
            state.modules.entry(module.to_string()).or_default();
        });
    }

    pub fn remove_module(&self, module: &str) {
        self.write(|state| {
            state.modules.remove(module);
        });
    }

    /// Puts `identity` on `module`'s classpath with the given metadata
    /// document (`None` for a root without one). The same identity may be
    /// shared by several modules.
    pub fn put_root(&self, module: &str, identity: &str, document: Option<&str>) {
        self.write(|state| {
            let identity = SourceId::from(identity);
            let classpath = state.modules.entry(module.to_string()).or_default();
            if !classpath.contains(&identity) {
                classpath.push(identity.clone());
            }

            let document = document.map(str::to_string);
            let unchanged = state
                .roots
                .get(&identity)
                .is_some_and(|root| root.document == document);
            if !unchanged {
                state.revision += 1;
                let revision = state.revision;
                state.roots.insert(identity, MemoryRoot { document, revision });
            }
        });
    }

    pub fn remove_root(&self, module: &str, identity: &str) {
        self.write(|state| {
            if let Some(classpath) = state.modules.get_mut(module) {
                classpath.retain(|root| root.as_str() != identity);
            }
        });
    }

    fn write<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl ClasspathEnvironment for InMemoryClasspath {
    fn modules(&self) -> Result<Vec<String>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.modules.keys().cloned().collect())
    }

    fn classpath_roots(&self, module: &str) -> Result<Vec<SourceDescriptor>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let classpath = state
            .modules
            .get(module)
            .ok_or_else(|| IndexError::UnknownModule(module.to_string()))?;

        Ok(classpath
            .iter()
            .filter_map(|identity| {
                let root = state.roots.get(identity)?;
                Some(SourceDescriptor::new(
                    identity.as_str(),
                    identity.clone(),
                    Fingerprint::Revision(root.revision),
                    root.document.is_some(),
                ))
            })
            .collect())
    }

    fn read_metadata(&self, source: &SourceDescriptor) -> Result<Vec<Vec<u8>>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let root = state
            .roots
            .get(&source.container_identity)
            .ok_or_else(|| IndexError::InvalidRoot(source.container_identity.to_string()))?;
        Ok(root
            .document
            .iter()
            .map(|document| document.as_bytes().to_vec())
            .collect())
    }
}
