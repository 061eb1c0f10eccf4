//! Requirement graph resolution
//!
//! Expands a recipe's requirements breadth-first into a [`ResolvedGraph`]:
//!
//! 1. Every constraint seen for a name is kept; the selected version is the
//!    highest one satisfying all of them.
//! 2. If a later constraint excludes a version already selected, the
//!    constraint is carried over and the expansion restarts with it applied
//!    from the start. Constraints only accumulate, so this terminates.
//! 3. Each pending requirement carries the path that reached it; a name
//!    already on its own path is a cycle.
//! 4. Equal-precedence candidates are ordered by index source position, then
//!    by the full version string.
//!
//! Index queries for one breadth level run concurrently and are merged in
//! declaration order before any selection happens. Everything fetched is
//! memoized for the whole resolution, restarts included.

pub mod graph;

pub use graph::{PackageKey, PackageNode, ResolvedGraph};

use crate::error::{KilnError, KilnResult, ResolveError};
use crate::index::{Candidate, IndexSet, PackageMetadata};
use crate::recipe::{Recipe, RequirementSpec, VersionConstraint};
use crate::settings::Settings;
use futures_util::future::join_all;
use semver::{Prerelease, Version};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Resolve a recipe's requirements against an index.
///
/// The index is opened before and closed after resolution, on every path.
/// Nothing is written to disk.
pub async fn resolve(recipe: &Recipe, settings: &Settings, index: &IndexSet) -> KilnResult<ResolvedGraph> {
    index.open().await?;
    let result = Resolver::new(index).run(recipe, settings).await;
    let closed = index.close().await;

    let graph = result?;
    closed?;

    info!("Resolved {} packages for {}", graph.len(), recipe.identity);
    Ok(graph)
}

/// A constraint together with who declared it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Constraint {
    constraint: VersionConstraint,
    requester: String,
}

impl Constraint {
    fn render(&self) -> String {
        format!("{} (from {})", self.constraint, self.requester)
    }
}

/// A requirement waiting to be expanded
#[derive(Debug, Clone)]
struct Pending {
    spec: RequirementSpec,
    /// `name/version` of the declaring package (or the recipe)
    requester: String,
    /// Node index of the declaring package; `None` for the recipe itself
    parent: Option<usize>,
    /// Names from the recipe down to the declaring package
    path: Vec<String>,
}

/// A node selected during the current pass
struct Draft {
    name: String,
    candidate: Candidate,
    path: Vec<String>,
    depth: usize,
    requires: Vec<String>,
    metadata: Option<PackageMetadata>,
}

enum Pass {
    Done(ResolvedGraph),
    /// A selected version was excluded by a later constraint
    Tighten { name: String, constraint: Constraint },
}

struct Resolver<'a> {
    index: &'a IndexSet,
    candidates: HashMap<String, Vec<Candidate>>,
    metadata: HashMap<(String, usize, Version), PackageMetadata>,
}

impl<'a> Resolver<'a> {
    fn new(index: &'a IndexSet) -> Self {
        Self {
            index,
            candidates: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    async fn run(&mut self, recipe: &Recipe, settings: &Settings) -> KilnResult<ResolvedGraph> {
        let mut carried: BTreeMap<String, Vec<Constraint>> = BTreeMap::new();

        loop {
            match self.pass(recipe, settings, &carried).await? {
                Pass::Done(graph) => return Ok(graph),
                Pass::Tighten { name, constraint } => {
                    debug!("Restarting resolution with {} {}", name, constraint.render());
                    let entry = carried.entry(name.clone()).or_default();
                    if entry.contains(&constraint) {
                        return Err(ResolveError::VersionConflict {
                            name,
                            constraints: entry.iter().map(Constraint::render).collect(),
                        }
                        .into());
                    }
                    entry.push(constraint);
                }
            }
        }
    }

    async fn pass(
        &mut self,
        recipe: &Recipe,
        settings: &Settings,
        carried: &BTreeMap<String, Vec<Constraint>>,
    ) -> KilnResult<Pass> {
        let root = recipe.identity.name.clone();
        let root_ref = recipe.identity.to_string();

        let mut constraints = carried.clone();
        let mut selected: HashMap<String, usize> = HashMap::new();
        let mut drafts: Vec<Draft> = Vec::new();
        let mut roots: Vec<String> = Vec::new();

        let mut level: Vec<Pending> = recipe
            .requires
            .iter()
            .map(|spec| Pending {
                spec: spec.clone(),
                requester: root_ref.clone(),
                parent: None,
                path: vec![root.clone()],
            })
            .collect();
        let mut depth = 0;

        while !level.is_empty() {
            self.fetch_candidates(&level).await?;

            let mut fresh = Vec::new();
            for pending in &level {
                let name = &pending.spec.name;

                if let Some(start) = pending.path.iter().position(|n| n == name) {
                    let mut path = pending.path[start..].to_vec();
                    path.push(name.clone());
                    return Err(ResolveError::CyclicRequirement { path }.into());
                }

                let constraint = Constraint {
                    constraint: pending.spec.constraint.clone(),
                    requester: pending.requester.clone(),
                };
                let collected = constraints.entry(name.clone()).or_default();
                collected.push(constraint.clone());

                let idx = match selected.get(name) {
                    Some(&idx) => {
                        if !constraint.constraint.matches(&drafts[idx].candidate.version) {
                            let candidates = self.candidates.get(name).map(Vec::as_slice).unwrap_or(&[]);
                            if pick(candidates, collected).is_none() {
                                return Err(conflict(name, collected).into());
                            }
                            return Ok(Pass::Tighten {
                                name: name.clone(),
                                constraint,
                            });
                        }
                        idx
                    }
                    None => {
                        let candidates = self.candidates.get(name).map(Vec::as_slice).unwrap_or(&[]);
                        if candidates.is_empty() {
                            return Err(ResolveError::PackageNotFound {
                                name: name.clone(),
                                required_by: pending.requester.clone(),
                            }
                            .into());
                        }
                        let candidate = pick(candidates, collected).ok_or_else(|| conflict(name, collected))?;
                        debug!(
                            "Selected {}/{} from {} (required by {})",
                            name,
                            candidate.version,
                            self.index.source_name(candidate.source),
                            pending.requester
                        );

                        let mut path = pending.path.clone();
                        path.push(name.clone());
                        drafts.push(Draft {
                            name: name.clone(),
                            candidate: candidate.clone(),
                            path,
                            depth,
                            requires: Vec::new(),
                            metadata: None,
                        });
                        let idx = drafts.len() - 1;
                        selected.insert(name.clone(), idx);
                        fresh.push(idx);
                        idx
                    }
                };

                debug_assert_eq!(&drafts[idx].name, name);
                let edges = match pending.parent {
                    Some(parent) => &mut drafts[parent].requires,
                    None => &mut roots,
                };
                if !edges.contains(name) {
                    edges.push(name.clone());
                }
            }

            self.fetch_metadata(&mut drafts, &fresh).await?;

            let mut next = Vec::new();
            for idx in fresh {
                let draft = &drafts[idx];
                let metadata = draft.metadata.as_ref().ok_or_else(|| missing_metadata(&draft.name))?;
                let reference = format!("{}/{}", draft.name, draft.candidate.version);
                settings.require(&metadata.settings, &reference)?;

                for spec in &metadata.requires {
                    next.push(Pending {
                        spec: spec.clone(),
                        requester: reference.clone(),
                        parent: Some(idx),
                        path: draft.path.clone(),
                    });
                }
            }
            level = next;
            depth += 1;
        }

        let nodes = drafts
            .into_iter()
            .map(|draft| {
                let metadata = draft.metadata.ok_or_else(|| missing_metadata(&draft.name))?;
                Ok(PackageNode {
                    settings: settings.restrict(&metadata.settings),
                    interface: metadata.interface,
                    source: self.index.source_name(draft.candidate.source).to_string(),
                    name: draft.name,
                    version: draft.candidate.version,
                    requires: draft.requires,
                    depth: draft.depth,
                })
            })
            .collect::<KilnResult<Vec<_>>>()?;

        let graph = ResolvedGraph::new(nodes, roots);
        if let Some(path) = graph.find_cycle() {
            return Err(ResolveError::CyclicRequirement { path }.into());
        }
        Ok(Pass::Done(graph))
    }

    /// List versions for every name in the level not seen yet, concurrently.
    /// The first failure in declaration order is reported.
    async fn fetch_candidates(&mut self, level: &[Pending]) -> Result<(), ResolveError> {
        let mut names: Vec<&str> = Vec::new();
        for pending in level {
            let name = pending.spec.name.as_str();
            if !self.candidates.contains_key(name) && !names.contains(&name) {
                names.push(name);
            }
        }

        let index = self.index;
        let results = join_all(names.iter().map(|name| index.candidates(name))).await;
        for (name, result) in names.into_iter().zip(results) {
            self.candidates.insert(name.to_string(), result?);
        }
        Ok(())
    }

    /// Fetch metadata for newly selected drafts, concurrently
    async fn fetch_metadata(&mut self, drafts: &mut [Draft], fresh: &[usize]) -> Result<(), ResolveError> {
        let index = self.index;
        let missing: Vec<(String, Candidate)> = fresh
            .iter()
            .map(|&idx| (drafts[idx].name.clone(), drafts[idx].candidate.clone()))
            .filter(|(name, c)| {
                !self
                    .metadata
                    .contains_key(&(name.clone(), c.source, c.version.clone()))
            })
            .collect();

        let results = join_all(missing.iter().map(|(name, c)| index.metadata(name, c))).await;
        for ((name, c), result) in missing.into_iter().zip(results) {
            self.metadata.insert((name, c.source, c.version), result?);
        }

        for &idx in fresh {
            let draft = &mut drafts[idx];
            let key = (
                draft.name.clone(),
                draft.candidate.source,
                draft.candidate.version.clone(),
            );
            draft.metadata = self.metadata.get(&key).cloned();
        }
        Ok(())
    }
}

fn missing_metadata(name: &str) -> KilnError {
    KilnError::Internal(format!("no metadata fetched for {}", name))
}

fn conflict(name: &str, constraints: &[Constraint]) -> ResolveError {
    ResolveError::VersionConflict {
        name: name.to_string(),
        constraints: constraints.iter().map(Constraint::render).collect(),
    }
}

/// Semver precedence key (build metadata ignored)
fn precedence(version: &Version) -> (u64, u64, u64, &Prerelease) {
    (version.major, version.minor, version.patch, &version.pre)
}

/// Highest candidate satisfying every constraint.
///
/// Ties on precedence go to the earliest index source, then to the
/// lexicographically smallest identifier.
fn pick<'c>(candidates: &'c [Candidate], constraints: &[Constraint]) -> Option<&'c Candidate> {
    candidates
        .iter()
        .filter(|c| constraints.iter().all(|k| k.constraint.matches(&c.version)))
        .min_by(|a, b| {
            precedence(&b.version)
                .cmp(&precedence(&a.version))
                .then(a.source.cmp(&b.source))
                .then_with(|| a.identifier().cmp(&b.identifier()))
        })
}

/// Whether two versions have the same semver precedence
pub fn same_precedence(a: &Version, b: &Version) -> bool {
    precedence(a).cmp(&precedence(b)) == Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SettingsError;
    use crate::index::{MemoryIndex, PackageIndex};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn meta(name: &str, version: &str, settings: &[&str], requires: &[&str]) -> PackageMetadata {
        let mut body = format!(
            "[package]\nname = \"{}\"\nversion = \"{}\"\nsettings = {:?}\nrequires = {:?}\n",
            name, version, settings, requires
        );
        body.push_str("\n[interface]\nlibs = []\n");
        PackageMetadata::parse(&body).unwrap()
    }

    fn recipe(requires: &[&str]) -> Recipe {
        let body = format!(
            "[recipe]\nname = \"myproject\"\nversion = \"0.1\"\nsettings = [\"os\", \"compiler\", \"build_type\", \"arch\"]\nrequires = {:?}\n",
            requires
        );
        Recipe::parse(&body, Path::new("/src/myproject")).unwrap()
    }

    fn linux_gcc() -> Settings {
        let raw = [
            ("os", "Linux"),
            ("compiler", "gcc"),
            ("compiler.version", "12"),
            ("build_type", "Release"),
            ("arch", "x86_64"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Settings::parse(&raw).unwrap()
    }

    fn single(index: MemoryIndex) -> IndexSet {
        IndexSet::new().with_source(Arc::new(index))
    }

    fn scenario_index() -> IndexSet {
        let full = ["os", "compiler", "build_type", "arch"];
        single(
            MemoryIndex::new("local")
                .with_package(meta("fmt", "10.1.0", &full, &[]))
                .with_package(meta("fmt", "10.2.0", &full, &[]))
                .with_package(meta("libuv", "1.46.0", &full, &[])),
        )
    }

    #[tokio::test]
    async fn empty_recipe_resolves_to_empty_graph() {
        let graph = resolve(&recipe(&[]), &linux_gcc(), &IndexSet::new())
            .await
            .unwrap();
        assert!(graph.is_empty());
        assert!(graph.roots().is_empty());
    }

    #[tokio::test]
    async fn picks_highest_satisfying_versions() {
        let graph = resolve(
            &recipe(&["fmt>=10.0,<11.0", "libuv>=1.40,<2.0"]),
            &linux_gcc(),
            &scenario_index(),
        )
        .await
        .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get("fmt").unwrap().version, Version::new(10, 2, 0));
        assert_eq!(graph.get("libuv").unwrap().version, Version::new(1, 46, 0));
        assert_eq!(graph.roots(), &["fmt".to_string(), "libuv".to_string()]);
    }

    #[tokio::test]
    async fn exact_reference_pins_version() {
        let graph = resolve(&recipe(&["fmt/10.1.0"]), &linux_gcc(), &scenario_index())
            .await
            .unwrap();
        assert_eq!(graph.get("fmt").unwrap().version, Version::new(10, 1, 0));
    }

    #[tokio::test]
    async fn direct_conflict_is_reported() {
        let index = single(
            MemoryIndex::new("local")
                .with_package(meta("x", "1.5.0", &[], &[]))
                .with_package(meta("x", "2.1.0", &[], &[])),
        );
        let err = resolve(&recipe(&["x>=2.0", "x<2.0"]), &linux_gcc(), &index)
            .await
            .unwrap_err();
        match err {
            KilnError::Resolve(ResolveError::VersionConflict { name, constraints }) => {
                assert_eq!(name, "x");
                assert_eq!(constraints.len(), 2);
            }
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[tokio::test]
    async fn transitive_conflict_is_reported() {
        let index = single(
            MemoryIndex::new("local")
                .with_package(meta("a", "1.0.0", &[], &["x<2.0"]))
                .with_package(meta("x", "1.5.0", &[], &[]))
                .with_package(meta("x", "2.1.0", &[], &[])),
        );
        let err = resolve(&recipe(&["a", "x>=2.0"]), &linux_gcc(), &index)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KilnError::Resolve(ResolveError::VersionConflict { ref name, .. }) if name == "x"
        ));
    }

    #[tokio::test]
    async fn later_constraint_tightens_selection() {
        // app picks zlib 1.3 first; png later narrows it to 1.2.x
        let index = single(
            MemoryIndex::new("local")
                .with_package(meta("png", "1.6.0", &[], &["zlib>=1.2,<1.3"]))
                .with_package(meta("zlib", "1.2.13", &[], &[]))
                .with_package(meta("zlib", "1.3.0", &[], &[])),
        );
        let graph = resolve(&recipe(&["zlib>=1.2", "png"]), &linux_gcc(), &index)
            .await
            .unwrap();
        assert_eq!(graph.get("zlib").unwrap().version, Version::new(1, 2, 13));
        assert_eq!(graph.get("png").unwrap().requires, vec!["zlib"]);
    }

    #[tokio::test]
    async fn cycle_reports_full_path() {
        let index = single(
            MemoryIndex::new("local")
                .with_package(meta("a", "1.0.0", &[], &["b"]))
                .with_package(meta("b", "1.0.0", &[], &["a"])),
        );
        let err = resolve(&recipe(&["a"]), &linux_gcc(), &index)
            .await
            .unwrap_err();
        match err {
            KilnError::Resolve(ResolveError::CyclicRequirement { path }) => {
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[tokio::test]
    async fn cycle_between_siblings_is_detected() {
        let index = single(
            MemoryIndex::new("local")
                .with_package(meta("a", "1.0.0", &[], &["b"]))
                .with_package(meta("b", "1.0.0", &[], &["a"])),
        );
        let err = resolve(&recipe(&["a", "b"]), &linux_gcc(), &index)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KilnError::Resolve(ResolveError::CyclicRequirement { .. })
        ));
    }

    #[tokio::test]
    async fn diamond_resolves_once() {
        let index = single(
            MemoryIndex::new("local")
                .with_package(meta("left", "1.0.0", &[], &["base"]))
                .with_package(meta("right", "1.0.0", &[], &["base>=1.1"]))
                .with_package(meta("base", "1.0.0", &[], &[]))
                .with_package(meta("base", "1.1.0", &[], &[])),
        );
        let graph = resolve(&recipe(&["left", "right"]), &linux_gcc(), &index)
            .await
            .unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.get("base").unwrap().version, Version::new(1, 1, 0));
        assert_eq!(graph.get("base").unwrap().depth, 1);
    }

    #[tokio::test]
    async fn unknown_package_is_not_found() {
        let err = resolve(&recipe(&["nope>=1.0"]), &linux_gcc(), &scenario_index())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KilnError::Resolve(ResolveError::PackageNotFound { ref name, ref required_by })
                if name == "nope" && required_by == "myproject/0.1"
        ));
    }

    #[tokio::test]
    async fn dependency_settings_are_restricted() {
        let index = single(
            MemoryIndex::new("local")
                .with_package(meta("header-only", "1.0.0", &[], &[]))
                .with_package(meta("compiled", "1.0.0", &["os", "arch"], &[])),
        );
        let graph = resolve(&recipe(&["header-only", "compiled"]), &linux_gcc(), &index)
            .await
            .unwrap();
        assert!(graph.get("header-only").unwrap().settings.is_empty());
        let compiled = &graph.get("compiled").unwrap().settings;
        assert_eq!(compiled.entries().len(), 2);
        assert!(compiled.build_type.is_none());
    }

    #[tokio::test]
    async fn dependency_missing_axis_fails() {
        let index = single(MemoryIndex::new("local").with_package(meta("needs-libcxx", "1.0.0", &["compiler.libcxx"], &[])));
        let err = resolve(&recipe(&["needs-libcxx"]), &linux_gcc(), &index)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KilnError::Settings(SettingsError::MissingAxis { ref package, .. }) if package == "needs-libcxx/1.0.0"
        ));
    }

    #[tokio::test]
    async fn tie_break_prefers_earliest_source() {
        let first = MemoryIndex::new("first").with_package(meta("fmt", "10.2.0", &[], &[]));
        let second = MemoryIndex::new("second").with_package(meta("fmt", "10.2.0", &[], &[]));
        let index = IndexSet::new()
            .with_source(Arc::new(second.clone()))
            .with_source(Arc::new(first.clone()));
        let graph = resolve(&recipe(&["fmt"]), &linux_gcc(), &index).await.unwrap();
        assert_eq!(graph.get("fmt").unwrap().source, "second");

        let index = IndexSet::new()
            .with_source(Arc::new(first))
            .with_source(Arc::new(second));
        let graph = resolve(&recipe(&["fmt"]), &linux_gcc(), &index).await.unwrap();
        assert_eq!(graph.get("fmt").unwrap().source, "first");
    }

    #[test]
    fn tie_break_uses_identifier_within_source() {
        let candidates = vec![
            Candidate {
                version: Version::parse("1.0.0+zeta").unwrap(),
                source: 0,
            },
            Candidate {
                version: Version::parse("1.0.0+alpha").unwrap(),
                source: 0,
            },
        ];
        let chosen = pick(&candidates, &[]).unwrap();
        assert_eq!(chosen.identifier(), "1.0.0+alpha");
        assert!(same_precedence(&candidates[0].version, &candidates[1].version));
    }

    #[tokio::test]
    async fn resolution_is_deterministic() {
        let a = resolve(&recipe(&["fmt", "libuv"]), &linux_gcc(), &scenario_index())
            .await
            .unwrap();
        let b = resolve(&recipe(&["fmt", "libuv"]), &linux_gcc(), &scenario_index())
            .await
            .unwrap();
        assert_eq!(a.digest(), b.digest());
    }

    /// Counts lifecycle calls to check open/close pairing
    struct Tracked {
        inner: MemoryIndex,
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PackageIndex for Tracked {
        fn name(&self) -> &str {
            "tracked"
        }
        async fn open(&self) -> Result<(), ResolveError> {
            self.opened.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
        async fn close(&self) -> Result<(), ResolveError> {
            self.closed.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
        async fn list_versions(&self, name: &str) -> Result<Vec<Version>, ResolveError> {
            self.inner.list_versions(name).await
        }
        async fn fetch_metadata(&self, name: &str, version: &Version) -> Result<PackageMetadata, ResolveError> {
            self.inner.fetch_metadata(name, version).await
        }
    }

    #[tokio::test]
    async fn index_closed_after_failure() {
        let tracked = Arc::new(Tracked {
            inner: MemoryIndex::new("inner"),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        });
        let index = IndexSet::new().with_source(tracked.clone());
        assert!(resolve(&recipe(&["missing"]), &linux_gcc(), &index).await.is_err());
        assert_eq!(tracked.opened.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(tracked.closed.load(AtomicOrdering::SeqCst), 1);
    }
}
