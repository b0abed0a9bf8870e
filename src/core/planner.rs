//! The planner.
//!
//! Diffs a resolved graph against what is actually on disk and emits an
//! ordered action list. Planning is separated from execution so a plan can
//! be printed, refused, or replayed; the executor in `ops::update` walks
//! the list in order.

use std::collections::BTreeMap;

use crate::core::app::App;
use crate::core::resolver::Resolution;
use crate::core::version::Constraint;
use crate::types::PackageName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Fetch and unpack the package into `modules/`.
    InstallUpdate,
    /// Replay the package's journal and erase it from `modules/`.
    Uninstall,
    /// The package's incoming constraints are mutually unsatisfiable.
    Conflict,
    /// Resolution stalled before this package could be gathered.
    Failure,
}

#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub name: PackageName,
    pub constraint: Constraint,
    /// Packages whose manifests asked for this one, with the constraint
    /// each declared. Empty for uninstalls.
    pub issuers: BTreeMap<PackageName, Constraint>,
}

impl Action {
    /// Whether this action mutates the filesystem when executed.
    pub fn is_effective(&self) -> bool {
        matches!(self.kind, ActionKind::InstallUpdate | ActionKind::Uninstall)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.kind {
            ActionKind::InstallUpdate => "install",
            ActionKind::Uninstall => "uninstall",
            ActionKind::Conflict => "conflict",
            ActionKind::Failure => "failure",
        };
        write!(f, "{verb} {} {}", self.name, self.constraint)?;
        if !self.issuers.is_empty() {
            let issuers: Vec<String> = self
                .issuers
                .iter()
                .map(|(name, c)| format!("{name} wants {c}"))
                .collect();
            write!(f, " ({})", issuers.join(", "))?;
        }
        Ok(())
    }
}

/// Convert a resolution and the on-disk state into an ordered action list.
///
/// A stalled gather yields only `Failure` actions, a conflicted graph only
/// `Conflict` actions; otherwise uninstalls come first (the module set must
/// shrink before it grows, or a stale version would collide with its
/// replacement), then installs. Each group is name-sorted.
pub fn plan(resolution: &Resolution, app: &App) -> Vec<Action> {
    let graph = &resolution.graph;

    if resolution.gather_failed {
        return graph
            .missing()
            .into_iter()
            .map(|(name, req)| Action {
                kind: ActionKind::Failure,
                name,
                constraint: req.constraint,
                issuers: req.issuers,
            })
            .collect();
    }

    let conflicted = graph.conflicted();
    if !conflicted.is_empty() {
        return conflicted
            .into_iter()
            .map(|(name, req)| Action {
                kind: ActionKind::Conflict,
                name,
                constraint: req.constraint,
                issuers: req.issuers,
            })
            .collect();
    }

    let needed = graph.needed();
    let mut actions = Vec::new();

    // The root application is needed by definition but lives at the root,
    // not in modules/; it is never installed or uninstalled.
    //
    // A module goes: when nothing needs it, or when its installed version
    // no longer satisfies the constraint. The latter makes room for the
    // replacement install, which requires an absent module directory.
    for (name, manifest) in &app.installed {
        if name == graph.root() {
            continue;
        }
        let keep = needed
            .get(name)
            .is_some_and(|req| req.constraint.matches(&manifest.version));
        if keep {
            continue;
        }
        actions.push(Action {
            kind: ActionKind::Uninstall,
            name: name.clone(),
            constraint: Constraint::exact(manifest.version.clone()),
            issuers: BTreeMap::new(),
        });
    }

    for (name, req) in needed {
        if name == *graph.root() {
            continue;
        }
        let satisfied = app
            .installed
            .get(&name)
            .is_some_and(|m| req.constraint.matches(&m.version));
        if !satisfied {
            actions.push(Action {
                kind: ActionKind::InstallUpdate,
                name,
                constraint: req.constraint,
                issuers: req.issuers,
            });
        }
    }

    actions
}
