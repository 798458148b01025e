//! Processing module registry
//!
//! Static catalog of the separation modules a project can run, with their
//! declared dependencies and output artifacts. The catalog is validated into
//! a DAG once, at construction, before any request is served.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::error::{Result, StemflowError};

/// Module that splits the original mix into vocals and instrumental.
pub const VOCAL_INSTRUMENTAL: &str = "vocal_instrumental";
/// Module that splits the vocals stem into lead and backing vocals.
pub const LEAD_BACKING: &str = "lead_backing";
/// Module that splits the instrumental stem into drums, bass and other.
pub const INSTRUMENTS: &str = "instruments";

/// A single processing module.
///
/// Only `id`, `description`, `category` and `depends_on` are advertised to
/// callers; `input` and `produces` are used internally to feed the runner
/// and to detect work that is already done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    /// Unique module identifier (e.g., "lead_backing").
    pub id: String,

    /// Human-readable description.
    pub description: String,

    /// Grouping shown by user interfaces.
    pub category: String,

    /// Modules that must complete before this one, in declaration order.
    pub depends_on: Vec<String>,

    /// Artifact consumed by the module. `None` means the project's original file.
    #[serde(skip)]
    pub input: Option<String>,

    /// Artifact filenames the module writes into the project folder.
    #[serde(skip)]
    pub produces: Vec<String>,
}

/// Build a descriptor from string slices.
pub fn descriptor(
    id: &str,
    description: &str,
    category: &str,
    depends_on: &[&str],
    input: Option<&str>,
    produces: &[&str],
) -> ModuleDescriptor {
    ModuleDescriptor {
        id: id.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        input: input.map(String::from),
        produces: produces.iter().map(|s| s.to_string()).collect(),
    }
}

/// The modules shipped with stemflow, in declaration order.
pub fn builtin_modules() -> Vec<ModuleDescriptor> {
    vec![
        descriptor(
            VOCAL_INSTRUMENTAL,
            "Split the mix into vocals and instrumental",
            "Separation",
            &[],
            None,
            &["vocals.wav", "instrumental.wav"],
        ),
        descriptor(
            LEAD_BACKING,
            "Split the vocals into lead and backing vocals",
            "Vocals",
            &[VOCAL_INSTRUMENTAL],
            Some("vocals.wav"),
            &["lead_vocals.wav", "backing_vocals.wav"],
        ),
        descriptor(
            INSTRUMENTS,
            "Separate the instrumental into drums, bass and other",
            "Instruments",
            &[VOCAL_INSTRUMENTAL],
            Some("instrumental.wav"),
            &["drums.wav", "bass.wav", "other.wav"],
        ),
    ]
}

/// Validated catalog of processing modules.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: Vec<ModuleDescriptor>,
    index: HashMap<String, usize>,
}

impl ModuleRegistry {
    /// Build a registry, rejecting duplicate ids, dangling dependencies and cycles.
    pub fn new(modules: Vec<ModuleDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            if index.insert(module.id.clone(), i).is_some() {
                return Err(StemflowError::DuplicateModule {
                    id: module.id.clone(),
                });
            }
        }

        for module in &modules {
            if let Some(missing) = module.depends_on.iter().find(|d| !index.contains_key(*d)) {
                return Err(StemflowError::UnknownDependency {
                    module: module.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let registry = Self { modules, index };
        let all: Vec<&str> = registry.modules.iter().map(|m| m.id.as_str()).collect();
        registry.resolve_order(&all)?;

        Ok(registry)
    }

    /// Registry holding the built-in modules.
    pub fn builtin() -> Result<Self> {
        Self::new(builtin_modules())
    }

    /// All modules in declaration order.
    pub fn list_modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    /// Get a module by id
    pub fn get(&self, id: &str) -> Option<&ModuleDescriptor> {
        self.index.get(id).map(|&i| &self.modules[i])
    }

    /// Check if a module is registered
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Return the requested ids that are not registered, deduplicated, in
    /// request order. An empty result means the request is valid.
    pub fn validate<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let mut invalid: Vec<String> = Vec::new();
        for id in requested {
            let id: &str = id.as_ref();
            if !self.contains(id) && !invalid.iter().any(|seen| seen == id) {
                invalid.push(id.to_string());
            }
        }
        invalid
    }

    /// Order the requested modules and their transitive dependencies so that
    /// every module comes after everything it depends on.
    ///
    /// Modules with no ordering constraint between them keep registry
    /// declaration order. Each module appears exactly once.
    pub fn resolve_order<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<String>> {
        let invalid = self.validate(requested);
        if !invalid.is_empty() {
            return Err(StemflowError::InvalidModule { ids: invalid });
        }

        let n = self.modules.len();

        // Dependency closure
        let mut included = vec![false; n];
        let mut stack: Vec<usize> = Vec::with_capacity(requested.len());
        for id in requested {
            let id: &str = id.as_ref();
            stack.push(self.index[id]);
        }
        while let Some(idx) = stack.pop() {
            if included[idx] {
                continue;
            }
            included[idx] = true;
            for dep in &self.modules[idx].depends_on {
                if let Some(&dep_idx) = self.index.get(dep) {
                    stack.push(dep_idx);
                }
            }
        }

        // Always emit the earliest declared module whose dependencies are done
        let mut emitted = vec![false; n];
        let mut order = Vec::new();
        loop {
            let next = (0..n).find(|&i| {
                included[i]
                    && !emitted[i]
                    && self.modules[i]
                        .depends_on
                        .iter()
                        .all(|d| self.index.get(d).map_or(false, |&j| emitted[j]))
            });

            match next {
                Some(i) => {
                    emitted[i] = true;
                    order.push(self.modules[i].id.clone());
                }
                None => break,
            }
        }

        let stuck: Vec<String> = (0..n)
            .filter(|&i| included[i] && !emitted[i])
            .map(|i| self.modules[i].id.clone())
            .collect();
        if !stuck.is_empty() {
            return Err(StemflowError::CyclicDependency { modules: stuck });
        }

        Ok(order)
    }

    /// Modules whose declared artifacts are all present in `artifacts`.
    ///
    /// Used for projects that predate the metadata record.
    pub fn infer_completed<S: AsRef<str>>(&self, artifacts: &[S]) -> BTreeSet<String> {
        let mut present: HashSet<&str> = HashSet::with_capacity(artifacts.len());
        for artifact in artifacts {
            present.insert(artifact.as_ref());
        }
        self.modules
            .iter()
            .filter(|m| !m.produces.is_empty())
            .filter(|m| m.produces.iter().all(|p| present.contains(p.as_str())))
            .map(|m| m.id.clone())
            .collect()
    }
}
