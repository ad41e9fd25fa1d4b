//! # Dependency Graph Evaluator
//!
//! Built in a single pass over one tenant's entitlement snapshot. The graph
//! borrows the snapshot, so it cannot outlive the list it was derived from
//! and cannot drift from it.

use std::collections::{BTreeSet, HashMap, HashSet};

use mops_core::{ModuleEntitlement, ModuleKey};

/// Derived lookup structures over one tenant's entitlement snapshot.
#[derive(Debug, Clone)]
pub struct DependencyGraph<'a> {
    modules: &'a [ModuleEntitlement],
    index: HashMap<&'a str, usize>,
    enabled: HashSet<&'a str>,
    /// Dependency key -> positions of enabled modules that list it, in
    /// snapshot order.
    dependents: HashMap<&'a str, Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph from a full snapshot.
    ///
    /// Module keys are assumed unique within the snapshot. If a key repeats,
    /// lookups by key resolve to its first occurrence.
    pub fn build(modules: &'a [ModuleEntitlement]) -> Self {
        let mut index = HashMap::with_capacity(modules.len());
        let mut enabled = HashSet::new();
        let mut dependents: HashMap<&'a str, Vec<usize>> = HashMap::new();

        for (pos, module) in modules.iter().enumerate() {
            let key = module.module_key.as_str();
            index.entry(key).or_insert(pos);
            if !module.enabled {
                continue;
            }
            enabled.insert(key);

            let mut seen = HashSet::new();
            for dep in &module.dependency_keys {
                let dep = dep.as_str();
                // A module never counts as its own dependent.
                if dep == key || !seen.insert(dep) {
                    continue;
                }
                dependents.entry(dep).or_default().push(pos);
            }
        }

        Self {
            modules,
            index,
            enabled,
            dependents,
        }
    }

    /// The snapshot this graph was built from.
    pub fn modules(&self) -> &'a [ModuleEntitlement] {
        self.modules
    }

    /// Look up a module in the snapshot by key.
    pub fn module(&self, key: &str) -> Option<&'a ModuleEntitlement> {
        let modules = self.modules;
        self.index.get(key).map(|&pos| &modules[pos])
    }

    /// Whether the module with this key is enabled. Unknown keys are not.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.enabled.contains(key)
    }

    /// Keys of all enabled modules, in snapshot order.
    pub fn enabled_keys(&self) -> impl Iterator<Item = &'a ModuleKey> + '_ {
        self.modules
            .iter()
            .filter(|m| m.enabled)
            .map(|m| &m.module_key)
    }

    /// Enabled modules that list `key` among their direct dependencies, in
    /// snapshot order. The module named by `key` itself is never included.
    pub fn dependents_of(&self, key: &str) -> Vec<&'a ModuleEntitlement> {
        let modules = self.modules;
        self.dependents
            .get(key)
            .map(|positions| positions.iter().map(|&pos| &modules[pos]).collect())
            .unwrap_or_default()
    }

    /// Dependency keys of `module` that are not enabled, in declaration
    /// order, each listed once.
    pub fn missing_dependencies(&self, module: &ModuleEntitlement) -> Vec<ModuleKey> {
        let mut missing: Vec<ModuleKey> = Vec::new();
        for dep in &module.dependency_keys {
            if !self.is_enabled(dep.as_str()) && !missing.contains(dep) {
                missing.push(dep.clone());
            }
        }
        missing
    }

    /// `(module_key, dependency_key)` pairs whose dependency is not present
    /// in the snapshot at all.
    pub fn unknown_dependencies(&self) -> Vec<(ModuleKey, ModuleKey)> {
        let mut unknown = Vec::new();
        for module in self.modules {
            for dep in &module.dependency_keys {
                if !self.index.contains_key(dep.as_str()) {
                    unknown.push((module.module_key.clone(), dep.clone()));
                }
            }
        }
        unknown
    }

    /// Dependency cycles among the snapshot's modules, regardless of their
    /// enabled state.
    ///
    /// Each cycle is a key path `[a, b, ..]` where `a` depends on `b`, and
    /// the last element depends on `a`. Paths are rotated to start at their
    /// smallest key and reported once. At least one cycle is reported
    /// through every cyclic group; this is a diagnostic and not an
    /// enumeration of every elementary cycle.
    pub fn cycles(&self) -> Vec<Vec<ModuleKey>> {
        let mut marks = vec![Mark::Unvisited; self.modules.len()];
        let mut path = Vec::new();
        let mut found = BTreeSet::new();

        for pos in 0..self.modules.len() {
            if marks[pos] == Mark::Unvisited {
                self.visit(pos, &mut marks, &mut path, &mut found);
            }
        }
        found.into_iter().collect()
    }

    fn visit(
        &self,
        pos: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        found: &mut BTreeSet<Vec<ModuleKey>>,
    ) {
        marks[pos] = Mark::OnPath;
        path.push(pos);

        for dep in &self.modules[pos].dependency_keys {
            let Some(&next) = self.index.get(dep.as_str()) else {
                continue;
            };
            match marks[next] {
                Mark::Unvisited => self.visit(next, marks, path, found),
                Mark::OnPath => {
                    if let Some(start) = path.iter().position(|&p| p == next) {
                        found.insert(self.normalise_cycle(&path[start..]));
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[pos] = Mark::Done;
    }

    fn normalise_cycle(&self, positions: &[usize]) -> Vec<ModuleKey> {
        let keys: Vec<ModuleKey> = positions
            .iter()
            .map(|&p| self.modules[p].module_key.clone())
            .collect();
        let pivot = keys
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let mut rotated = keys[pivot..].to_vec();
        rotated.extend_from_slice(&keys[..pivot]);
        rotated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}
