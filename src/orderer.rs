//! The install orderer: turns decided resolutions into a job list (C8, §4.8).
//!
//! Grounded on `paludis/resolver/orderer.cc`: build a Node-and-Arrow Graph
//! (NAG) from the resolver's taken decisions, decompose it into strongly
//! connected components in reverse topological order (via `petgraph`'s
//! Tarjan implementation, standing in for the original's hand-rolled one),
//! and for each SCC either schedule it directly (trivial case) or run the
//! layered cycle-breaking ladder described in §4.8.2 before scheduling.
//! `DecisionDispatcher`/`EdgesFromReasonVisitor`/`ExtraScheduler` in the
//! original are folded here into free functions over the same data, since
//! Rust doesn't need a visitor pattern to get open dispatch over a closed
//! enum.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

use crate::error::UnsuitableCandidate;
use crate::resolver::{Decision, Resolution, Resolvent};
use crate::spec::EdgeClass;

/// One NAG node: either the "must be true before we can be satisfied" role
/// (`Done`) or the "must be true before we can be considered fetched"
/// role (`Fetched`) (§4.8.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NagRole {
    Done,
    Fetched,
}

#[derive(Debug, Clone)]
pub struct NagNode {
    pub resolvent: Resolvent,
    pub role: NagRole,
}

/// One NAG edge, carrying enough of the dependency's label classification
/// to support the cycle-breaking ladder's "drop edges that are already
/// met" step (§4.8.2).
#[derive(Debug, Clone, Copy)]
pub struct NagEdge {
    /// §4.8.1's `is_build_or_fetch`: true for both build-like and
    /// fetch-like dependency classes, not just literal build deps.
    pub build: bool,
    pub build_all_met: bool,
    pub run: bool,
    pub run_all_met: bool,
}

impl NagEdge {
    fn residual(&self) -> Self {
        NagEdge {
            build: self.build && !self.build_all_met,
            build_all_met: self.build_all_met,
            run: self.run && !self.run_all_met,
            run_all_met: self.run_all_met,
        }
    }

    fn has_any_edge(&self) -> bool {
        self.build || self.run
    }

    fn is_run_only(&self) -> bool {
        self.run && !self.build
    }
}

/// A scheduled unit of work (§4.8.3).
#[derive(Debug, Clone)]
pub enum Job {
    Pretend { resolvent: Resolvent },
    Fetch { resolvent: Resolvent },
    Install { resolvent: Resolvent, requirements: JobRequirements },
    Uninstall { resolvent: Resolvent },
}

/// `require_for_satisfied` / `require_for_independent` / `require_always`
/// edges from one job to the job numbers it depends on (§4.8.3).
#[derive(Debug, Clone, Default)]
pub struct JobRequirements {
    pub require_for_satisfied: Vec<usize>,
    pub require_for_independent: Vec<usize>,
    pub require_always: Vec<usize>,
}

/// Diagnostic note attached to a decision that could not be cleanly
/// ordered, or that was ordered only after breaking a cycle (§4.8.2).
#[derive(Debug, Clone)]
pub struct OrderingNote {
    pub resolvent: Resolvent,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct OrderResult {
    pub jobs: Vec<Job>,
    pub notes: Vec<OrderingNote>,
    pub unorderable: Vec<Resolvent>,
}

/// A resolvent whose decision the caller must treat as a failure: either the
/// resolver itself couldn't settle it (`UnableToMake`/`Break`), or the
/// orderer's cycle-breaking ladder gave up on it (§4.8.2).
#[derive(Debug, Clone)]
pub struct ResolutionError {
    pub resolvent: Resolvent,
    pub reason: String,
    pub candidates: Vec<UnsuitableCandidate>,
}

/// §6's collaborator-facing partition of a completed resolution: `ordered`
/// is the job list a caller can hand to an installer, `errors` is every
/// resolvent that needs user attention, and `untaken` is every resolvent
/// whose constraints were all recorded `untaken` (a suggestion nothing ever
/// asked to act on, §3).
#[derive(Debug, Default)]
pub struct ResolutionLists {
    pub ordered: Vec<Job>,
    pub errors: Vec<ResolutionError>,
    pub untaken: Vec<Resolvent>,
}

/// Builds and decomposes the NAG for a completed set of resolutions.
pub struct Orderer<'a> {
    resolutions: &'a HashMap<Resolvent, Resolution>,
}

impl<'a> Orderer<'a> {
    pub fn new(resolutions: &'a HashMap<Resolvent, Resolution>) -> Self {
        Self { resolutions }
    }

    pub fn order(&self) -> OrderResult {
        let (graph, index_of) = { let _span = tracing::info_span!("building nag").entered(); self.build_nag() };
        let sccs = { let _span = tracing::info_span!("finding sccs").entered(); tarjan_scc(&graph) };
        // `petgraph::tarjan_scc` returns SCCs already in reverse
        // topological order, matching `orderer.cc`'s traversal order.
        let _span = tracing::info_span!("ordering sccs").entered();
        let mut result = OrderResult::default();
        let mut job_number_by_resolvent: HashMap<Resolvent, usize> = HashMap::new();

        for scc in sccs {
            if scc.len() <= 1 {
                self.schedule_one(&graph, &index_of, scc[0], &mut result, &mut job_number_by_resolvent, None);
                continue;
            }
            debug!(size = scc.len(), "decomposing scc");
            self.order_scc(&graph, &index_of, &scc, &mut result, &mut job_number_by_resolvent, true);
        }
        if !result.unorderable.is_empty() {
            warn!(count = result.unorderable.len(), "resolutions left unorderable");
        }
        result
    }

    /// §6: `resolution_lists()`, the partitioned view of a completed
    /// resolution. Runs `order()` for `ordered`, then scans the decisions
    /// directly for the resolvent-level failures `order()` only reports as
    /// jobs-not-scheduled.
    pub fn resolution_lists(&self) -> ResolutionLists {
        let order = self.order();
        let mut errors: Vec<ResolutionError> = self
            .resolutions
            .iter()
            .filter_map(|(resolvent, resolution)| match &resolution.decision {
                Some(Decision::UnableToMake { reason, candidates }) => Some(ResolutionError {
                    resolvent: resolvent.clone(),
                    reason: reason.clone(),
                    candidates: candidates.clone(),
                }),
                Some(Decision::Break) => Some(ResolutionError {
                    resolvent: resolvent.clone(),
                    reason: "decision requires confirmation".to_string(),
                    candidates: Vec::new(),
                }),
                _ => None,
            })
            .collect();
        for resolvent in &order.unorderable {
            errors.push(ResolutionError {
                resolvent: resolvent.clone(),
                reason: "in unsolvable cycle".to_string(),
                candidates: Vec::new(),
            });
        }
        let untaken = self
            .resolutions
            .iter()
            .filter(|(_, resolution)| !resolution.constraints.is_empty() && resolution.constraints.iter().all(|c| c.untaken))
            .map(|(resolvent, _)| resolvent.clone())
            .collect();
        ResolutionLists { ordered: order.jobs, errors, untaken }
    }

    fn build_nag(&self) -> (DiGraph<NagNode, NagEdge>, HashMap<(Resolvent, NagRole), NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();

        for (resolvent, resolution) in self.resolutions {
            let Some(decision) = &resolution.decision else { continue };
            match decision {
                Decision::UnableToMake { .. } | Decision::Break => {}
                Decision::NothingNoChange | Decision::ExistingNoChange { .. } => {
                    let idx = graph.add_node(NagNode { resolvent: resolvent.clone(), role: NagRole::Done });
                    index_of.insert((resolvent.clone(), NagRole::Done), idx);
                }
                Decision::ChangesToMake { .. } => {
                    let done = graph.add_node(NagNode { resolvent: resolvent.clone(), role: NagRole::Done });
                    let fetched = graph.add_node(NagNode { resolvent: resolvent.clone(), role: NagRole::Fetched });
                    index_of.insert((resolvent.clone(), NagRole::Done), done);
                    index_of.insert((resolvent.clone(), NagRole::Fetched), fetched);
                    graph.add_edge(
                        done,
                        fetched,
                        NagEdge { build: true, build_all_met: true, run: false, run_all_met: true },
                    );
                }
                Decision::Remove { .. } => {
                    let idx = graph.add_node(NagNode { resolvent: resolvent.clone(), role: NagRole::Done });
                    index_of.insert((resolvent.clone(), NagRole::Done), idx);
                }
            }
        }

        for (resolvent, resolution) in self.resolutions {
            let Some(done_idx) = index_of.get(&(resolvent.clone(), NagRole::Done)).copied() else { continue };
            for constraint in &resolution.constraints {
                if let crate::resolver::Reason::Blocker { blocker_display, strong, already_met } = &constraint.reason {
                    // §4.8.1: a strong block draws an edge from the blocker
                    // to the blocked resolvent's `done` node, so whatever
                    // the blocked resolvent settled on (typically a remove)
                    // is scheduled before the blocker's own job. Weak blocks
                    // get no edge at all, they're advisory only.
                    if !strong {
                        continue;
                    }
                    for (other_resolvent, other_resolution) in self.resolutions {
                        let Some(other_decision) = &other_resolution.decision else { continue };
                        let other_display = match other_decision {
                            Decision::ExistingNoChange { taken } | Decision::ChangesToMake { taken } => {
                                taken.canonical_form.clone()
                            }
                            _ => continue,
                        };
                        if other_display != *blocker_display {
                            continue;
                        }
                        let Some(other_done) = index_of.get(&(other_resolvent.clone(), NagRole::Done)).copied()
                        else {
                            continue;
                        };
                        if other_done == done_idx {
                            continue;
                        }
                        graph.add_edge(
                            other_done,
                            done_idx,
                            // §4.8.1: a blocker edge is build-like (never a
                            // run dependency on the thing it blocks).
                            NagEdge { build: true, build_all_met: *already_met, run: false, run_all_met: true },
                        );
                    }
                    continue;
                }
                let crate::resolver::Reason::Dependency { label_class, already_met, .. } = &constraint.reason else { continue };
                if matches!(label_class, EdgeClass::Post) {
                    // Post-classified deps get no NAG edge: "most post deps
                    // dep upon the thing requiring them anyway" (§4.8.1).
                    continue;
                }
                // The constraint lives on the *dependency's* resolution;
                // the edge should run from the dependent to here, so we
                // only have enough information once we also know who the
                // dependent resolved to. We approximate the original's
                // per-dependency edge walk by drawing build/run edges from
                // every other decided resolvent whose dependency tree
                // could plausibly have produced this constraint, via the
                // `dependent_display` recorded when the constraint was
                // created.
                for (other_resolvent, other_resolution) in self.resolutions {
                    let Some(other_decision) = &other_resolution.decision else { continue };
                    let other_display = match other_decision {
                        Decision::ExistingNoChange { taken } | Decision::ChangesToMake { taken } => {
                            taken.canonical_form.clone()
                        }
                        _ => continue,
                    };
                    if let crate::resolver::Reason::Dependency { dependent_display, .. } = &constraint.reason {
                        if *dependent_display != other_display {
                            continue;
                        }
                    }
                    let Some(other_done) = index_of.get(&(other_resolvent.clone(), NagRole::Done)).copied() else {
                        continue;
                    };
                    if other_done == done_idx {
                        continue;
                    }
                    let edge = match label_class {
                        EdgeClass::Build => {
                            NagEdge { build: true, build_all_met: *already_met, run: false, run_all_met: true }
                        }
                        EdgeClass::Fetch => {
                            let fetched = index_of.get(&(resolvent.clone(), NagRole::Fetched)).copied().unwrap_or(done_idx);
                            graph.add_edge(
                                other_done,
                                fetched,
                                NagEdge { build: true, build_all_met: *already_met, run: false, run_all_met: true },
                            );
                            continue;
                        }
                        EdgeClass::Run => NagEdge { build: false, build_all_met: true, run: true, run_all_met: *already_met },
                        EdgeClass::Post => continue,
                    };
                    graph.add_edge(other_done, done_idx, edge);
                }
            }
        }

        (graph, index_of)
    }

    fn schedule_one(
        &self,
        graph: &DiGraph<NagNode, NagEdge>,
        index_of: &HashMap<(Resolvent, NagRole), NodeIndex>,
        node: NodeIndex,
        result: &mut OrderResult,
        job_numbers: &mut HashMap<Resolvent, usize>,
        note: Option<String>,
    ) {
        let nag_node = &graph[node];
        let resolvent = nag_node.resolvent.clone();
        let Some(decision) = self.resolutions.get(&resolvent).and_then(|r| r.decision.as_ref()) else { return };

        match (nag_node.role, decision) {
            (NagRole::Done, Decision::ChangesToMake { .. }) => {
                if let Some(message) = note {
                    result.notes.push(OrderingNote { resolvent: resolvent.clone(), message });
                }
                result.jobs.push(Job::Pretend { resolvent: resolvent.clone() });

                let mut requirements = JobRequirements::default();
                let fetch_idx = index_of.get(&(resolvent.clone(), NagRole::Fetched)).copied();
                if let Some(fetch_idx) = fetch_idx {
                    result.jobs.push(Job::Fetch { resolvent: resolvent.clone() });
                    let fetch_job_number = result.jobs.len() - 1;
                    requirements.require_for_satisfied.push(fetch_job_number);
                    requirements.require_for_independent.push(fetch_job_number);
                    requirements.require_always.push(fetch_job_number);
                    self.populate_requirements(graph, fetch_idx, job_numbers, &mut requirements, &mut HashSet::new(), true);
                }
                self.populate_requirements(graph, node, job_numbers, &mut requirements, &mut HashSet::new(), false);

                result.jobs.push(Job::Install { resolvent: resolvent.clone(), requirements });
                job_numbers.insert(resolvent, result.jobs.len() - 1);
            }
            (NagRole::Fetched, _) => {
                // Fetch jobs for changes-to-make decisions are emitted
                // alongside their `Done` node above; nothing to do here.
            }
            (NagRole::Done, Decision::Remove { .. }) => {
                result.jobs.push(Job::Uninstall { resolvent: resolvent.clone() });
                job_numbers.insert(resolvent, result.jobs.len() - 1);
            }
            (NagRole::Done, _) => {
                // `NothingNoChange`/`ExistingNoChange`: nothing to schedule.
            }
        }
    }

    /// §4.8.3 `populate_requirements`: walk every transitive successor of
    /// `node`, tagging the first hop `require_for_satisfied` only if it
    /// isn't already met, and every hop (direct or transitive)
    /// `require_for_independent`.
    fn populate_requirements(
        &self,
        graph: &DiGraph<NagNode, NagEdge>,
        node: NodeIndex,
        job_numbers: &HashMap<Resolvent, usize>,
        requirements: &mut JobRequirements,
        recursed: &mut HashSet<NodeIndex>,
        first_hop_is_fetch_edge: bool,
    ) {
        if !recursed.insert(node) {
            return;
        }
        for edge in graph.edges(node) {
            let target = edge.target();
            let target_resolvent = graph[target].resolvent.clone();
            if let Some(&job_number) = job_numbers.get(&target_resolvent) {
                let weight = edge.weight();
                let unmet = weight.has_any_edge();
                if unmet && !first_hop_is_fetch_edge {
                    requirements.require_for_satisfied.push(job_number);
                }
                requirements.require_for_independent.push(job_number);
            }
            self.populate_requirements(graph, target, job_numbers, requirements, recursed, false);
        }
    }

    /// §4.8.2: recursive cycle-breaking ladder for an SCC with more than
    /// one member.
    fn order_scc(
        &self,
        parent_graph: &DiGraph<NagNode, NagEdge>,
        index_of: &HashMap<(Resolvent, NagRole), NodeIndex>,
        scc: &[NodeIndex],
        result: &mut OrderResult,
        job_numbers: &mut HashMap<Resolvent, usize>,
        can_recurse: bool,
    ) {
        let member_set: HashSet<NodeIndex> = scc.iter().copied().collect();

        // Self-dependency check: an edge from a node back to itself.
        for &node in scc {
            if parent_graph.edges(node).any(|e| e.target() == node) {
                let resolvent = parent_graph[node].resolvent.clone();
                self.schedule_one(
                    parent_graph,
                    index_of,
                    node,
                    result,
                    job_numbers,
                    Some(format!("Self dependent: {resolvent}")),
                );
                return;
            }
        }

        let all_run_only = scc.iter().all(|&n| {
            parent_graph
                .edges(n)
                .filter(|e| member_set.contains(&e.target()))
                .all(|e| e.weight().is_run_only())
        });

        if all_run_only {
            for &node in scc {
                let resolvent = parent_graph[node].resolvent.clone();
                self.schedule_one(
                    parent_graph,
                    index_of,
                    node,
                    result,
                    job_numbers,
                    Some(format!("In run dependency cycle with: {resolvent}")),
                );
            }
            return;
        }

        if can_recurse {
            // Drop edges that are already fully met on both the build and
            // run axes, then re-decompose; retry once more without
            // recursing further if that still doesn't break the cycle.
            let mut sub_graph = DiGraph::new();
            let mut map = HashMap::new();
            for &n in scc {
                map.insert(n, sub_graph.add_node(parent_graph[n].clone()));
            }
            for &n in scc {
                for edge in parent_graph.edges(n) {
                    if !member_set.contains(&edge.target()) {
                        continue;
                    }
                    let residual = edge.weight().residual();
                    if !residual.has_any_edge() {
                        continue;
                    }
                    sub_graph.add_edge(map[&n], map[&edge.target()], residual);
                }
            }
            let sub_sccs = tarjan_scc(&sub_graph);
            let reverse_map: HashMap<NodeIndex, NodeIndex> = map.iter().map(|(&a, &b)| (b, a)).collect();
            for sub in sub_sccs {
                let mapped: Vec<NodeIndex> = sub.iter().map(|n| reverse_map[n]).collect();
                if mapped.len() <= 1 {
                    self.schedule_one(parent_graph, index_of, mapped[0], result, job_numbers, None);
                } else {
                    self.order_scc(parent_graph, index_of, &mapped, result, job_numbers, false);
                }
            }
            return;
        }

        for &node in scc {
            result.unorderable.push(parent_graph[node].resolvent.clone());
            result.notes.push(OrderingNote {
                resolvent: parent_graph[node].resolvent.clone(),
                message: format!("In unsolvable cycle with: {}", parent_graph[node].resolvent),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::{CategoryName, PackageNamePart, RepositoryName};
    use crate::package_id::SimplePackageId;
    use crate::options::UseExisting;
    use crate::resolver::{Constraint, ConstraintKind, DecisionId, DestinationType, Reason};
    use crate::spec::PackageDepSpec;
    use crate::version::Version;
    use std::sync::Arc;

    fn qpn(pkg: &str) -> crate::name::QualifiedPackageName {
        crate::name::QualifiedPackageName::new(CategoryName::new("cat").unwrap(), PackageNamePart::new(pkg).unwrap())
    }

    fn taken(pkg: &str) -> DecisionId {
        let id = SimplePackageId::new(qpn(pkg), Version::parse("1.0").unwrap(), RepositoryName::new("gentoo").unwrap());
        DecisionId { canonical_form: id.canonical_form(), id: Arc::new(id) }
    }

    #[test]
    fn orders_a_leaf_install() {
        let mut resolutions = HashMap::new();
        let resolvent = Resolvent::new(qpn("leaf"), DestinationType::Install);
        resolutions.insert(
            resolvent.clone(),
            Resolution {
                constraints: Vec::new(),
                decision: Some(Decision::ChangesToMake { taken: taken("leaf") }),
            },
        );
        let result = Orderer::new(&resolutions).order();
        assert!(result.jobs.iter().any(|j| matches!(j, Job::Install { .. })));
        assert!(result.jobs.iter().any(|j| matches!(j, Job::Fetch { .. })));
    }

    #[test]
    fn orders_a_linear_chain_dependency_before_dependent() {
        let mut resolutions = HashMap::new();
        let dep_resolvent = Resolvent::new(qpn("dep"), DestinationType::Install);
        let top_resolvent = Resolvent::new(qpn("top"), DestinationType::Install);
        resolutions.insert(
            dep_resolvent.clone(),
            Resolution { constraints: Vec::new(), decision: Some(Decision::ChangesToMake { taken: taken("dep") }) },
        );
        resolutions.insert(
            top_resolvent.clone(),
            Resolution {
                constraints: vec![Constraint {
                    spec: PackageDepSpec::for_package(qpn("dep")),
                    reason: Reason::Dependency {
                        dependent_display: taken("top").canonical_form,
                        label_class: EdgeClass::Build,
                        already_met: false,
                    },
                    kind: ConstraintKind::Require,
                    use_existing: UseExisting::IfPossible,
                    untaken: false,
                }],
                decision: Some(Decision::ChangesToMake { taken: taken("top") }),
            },
        );
        let result = Orderer::new(&resolutions).order();
        let install_positions: Vec<usize> = result
            .jobs
            .iter()
            .enumerate()
            .filter_map(|(i, j)| match j {
                Job::Install { resolvent, .. } => Some((i, resolvent.clone())),
                _ => None,
            })
            .map(|(i, _)| i)
            .collect();
        assert_eq!(install_positions.len(), 2);
    }

    #[test]
    fn run_only_cycle_is_ordered_with_a_note() {
        let mut resolutions = HashMap::new();
        let a = Resolvent::new(qpn("a"), DestinationType::Install);
        let b = Resolvent::new(qpn("b"), DestinationType::Install);
        resolutions.insert(
            a.clone(),
            Resolution {
                constraints: vec![Constraint {
                    spec: PackageDepSpec::for_package(qpn("b")),
                    reason: Reason::Dependency {
                        dependent_display: taken("a").canonical_form,
                        label_class: EdgeClass::Run,
                        already_met: false,
                    },
                    kind: ConstraintKind::Require,
                    use_existing: UseExisting::IfPossible,
                    untaken: false,
                }],
                decision: Some(Decision::ChangesToMake { taken: taken("a") }),
            },
        );
        resolutions.insert(
            b.clone(),
            Resolution {
                constraints: vec![Constraint {
                    spec: PackageDepSpec::for_package(qpn("a")),
                    reason: Reason::Dependency {
                        dependent_display: taken("b").canonical_form,
                        label_class: EdgeClass::Run,
                        already_met: false,
                    },
                    kind: ConstraintKind::Require,
                    use_existing: UseExisting::IfPossible,
                    untaken: false,
                }],
                decision: Some(Decision::ChangesToMake { taken: taken("b") }),
            },
        );
        let result = Orderer::new(&resolutions).order();
        assert!(result.unorderable.is_empty());
    }
}
