//! The dependency planner: a pure function over `builder → prerequisites`
//! that partitions builders into topologically-ordered parallel cohorts.

use std::collections::{HashMap, HashSet};

use dispatch_kernel::builder::BuilderName;
use dispatch_kernel::error::PlannerError;

/// A maximal set of builders that may run in parallel at the same
/// dependency depth. Always a list — even a single-builder cohort is a
/// one-element `Vec` — rather than a tagged single-or-many variant; it's
/// simpler and loses no information.
pub type Cohort = Vec<BuilderName>;

/// `builder → prerequisite builders`. A builder absent as a key is treated
/// as having no prerequisites — this lets a builder that only ever appears
/// as someone else's prerequisite be named without also being given an
/// explicit empty entry.
pub type DependencyMap = HashMap<BuilderName, Vec<BuilderName>>;

fn prerequisites_of<'a>(dep: &'a DependencyMap, b: &BuilderName) -> &'a [BuilderName] {
    dep.get(b).map(|v| v.as_slice()).unwrap_or(&[])
}

/// The full set of builders under consideration: every key, plus every
/// builder named as someone's prerequisite.
fn universe(dep: &DependencyMap) -> HashSet<BuilderName> {
    let mut u: HashSet<BuilderName> = dep.keys().cloned().collect();
    for prereqs in dep.values() {
        u.extend(prereqs.iter().cloned());
    }
    u
}

/// Partition `dep` into an ordered sequence of cohorts such that a builder
/// appears in cohort *k* only after all of its prerequisites appear in
/// cohorts `< k`. Iterative Kahn-style layering; raises
/// [`PlannerError::CyclicDependency`] citing every builder that could not
/// be placed once no further progress is possible.
pub fn plan(dep: &DependencyMap) -> Result<Vec<Cohort>, PlannerError> {
    let mut pending = universe(dep);
    let mut done: HashSet<BuilderName> = HashSet::new();
    let mut result = Vec::new();

    while !pending.is_empty() {
        let ready: Vec<BuilderName> = pending
            .iter()
            .filter(|b| prerequisites_of(dep, b).iter().all(|p| done.contains(p)))
            .cloned()
            .collect();

        if ready.is_empty() {
            let mut remaining: Vec<String> =
                pending.iter().map(|b| b.as_str().to_string()).collect();
            remaining.sort();
            return Err(PlannerError::CyclicDependency { remaining });
        }

        for b in &ready {
            pending.remove(b);
            done.insert(b.clone());
        }
        result.push(ready);
    }

    Ok(result)
}

/// The transitive prerequisite closure of `item`, in a topological order
/// ending with `item` (when `include_self` is true) or with `item` removed
/// otherwise.
///
/// Unlike [`plan`], a missing `item` is an error: the argument names a
/// query target, not a graph leaf, so a typo should surface immediately
/// rather than silently resolve to a trivial one-node closure.
pub fn ancestors(
    item: &BuilderName,
    dep: &DependencyMap,
    include_self: bool,
) -> Result<Vec<BuilderName>, PlannerError> {
    if !dep.contains_key(item) {
        return Err(PlannerError::UnknownBuilder {
            item: item.as_str().to_string(),
        });
    }

    let mut resolved = Vec::new();
    let mut on_stack: HashSet<BuilderName> = HashSet::new();
    let mut visited: HashSet<BuilderName> = HashSet::new();

    visit(item, dep, &mut on_stack, &mut visited, &mut resolved)?;

    if !include_self {
        resolved.retain(|b| b != item);
    }
    Ok(resolved)
}

fn visit(
    node: &BuilderName,
    dep: &DependencyMap,
    on_stack: &mut HashSet<BuilderName>,
    visited: &mut HashSet<BuilderName>,
    resolved: &mut Vec<BuilderName>,
) -> Result<(), PlannerError> {
    if visited.contains(node) {
        return Ok(());
    }
    if on_stack.contains(node) {
        return Err(PlannerError::CyclicDependency {
            remaining: vec![node.as_str().to_string()],
        });
    }

    on_stack.insert(node.clone());
    for prereq in prerequisites_of(dep, node) {
        visit(prereq, dep, on_stack, visited, resolved)?;
    }
    on_stack.remove(node);

    visited.insert(node.clone());
    resolved.push(node.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(name: &str) -> BuilderName {
        BuilderName::new(name)
    }

    fn dep_map(pairs: &[(&str, &[&str])]) -> DependencyMap {
        pairs
            .iter()
            .map(|(k, v)| (b(k), v.iter().map(|s| b(s)).collect()))
            .collect()
    }

    #[test]
    fn plan_basic_layers_respect_prerequisites() {
        let dep = dep_map(&[("A", &["B", "C"]), ("B", &["D"]), ("C", &[]), ("D", &[])]);
        let cohorts = plan(&dep).unwrap();

        assert_eq!(cohorts.len(), 3);
        let mut first: Vec<&str> = cohorts[0].iter().map(|x| x.as_str()).collect();
        first.sort();
        assert_eq!(first, vec!["C", "D"]);
        assert_eq!(cohorts[1], vec![b("B")]);
        assert_eq!(cohorts[2], vec![b("A")]);
    }

    #[test]
    fn plan_rejects_cycles() {
        let dep = dep_map(&[("A", &["B"]), ("B", &["A"])]);
        let err = plan(&dep).unwrap_err();
        match err {
            PlannerError::CyclicDependency { mut remaining } => {
                remaining.sort();
                assert_eq!(remaining, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn plan_treats_missing_keys_as_leaves() {
        // B is never a key, only ever a prerequisite.
        let dep = dep_map(&[("A", &["B"])]);
        let cohorts = plan(&dep).unwrap();
        assert_eq!(cohorts, vec![vec![b("B")], vec![b("A")]]);
    }

    #[test]
    fn ancestors_deep_topological_order() {
        let dep = dep_map(&[
            ("A", &["B", "D"]),
            ("B", &["C", "E"]),
            ("C", &["D", "E"]),
            ("D", &[]),
            ("E", &[]),
        ]);

        let order = ancestors(&b("A"), &dep, true).unwrap();
        assert_eq!(
            order,
            vec![b("D"), b("E"), b("C"), b("B"), b("A")]
        );

        assert_eq!(ancestors(&b("E"), &dep, true).unwrap(), vec![b("E")]);
    }

    #[test]
    fn ancestors_without_self_drops_the_query_target() {
        let dep = dep_map(&[("A", &["B"]), ("B", &[])]);
        assert_eq!(ancestors(&b("A"), &dep, false).unwrap(), vec![b("B")]);
    }

    #[test]
    fn ancestors_rejects_unknown_item() {
        let dep = dep_map(&[("A", &[])]);
        let err = ancestors(&b("Z"), &dep, true).unwrap_err();
        assert!(matches!(err, PlannerError::UnknownBuilder { item } if item == "Z"));
    }

    #[test]
    fn ancestors_detects_cycles() {
        let dep = dep_map(&[("A", &["B"]), ("B", &["A"])]);
        let err = ancestors(&b("A"), &dep, true).unwrap_err();
        assert!(matches!(err, PlannerError::CyclicDependency { .. }));
    }
}
