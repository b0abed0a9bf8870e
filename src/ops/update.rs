//! The update operation: make `modules/` agree with the manifest.
//!
//! One update is one pass of resolve, plan, execute. Uninstalls run before
//! installs so a stale version never collides with its replacement. A plan
//! containing conflicts or gather failures executes nothing; the report
//! carries the actions for the caller to present.

use std::path::Path;

use crate::core::app::{App, AppError};
use crate::core::planner::{plan, Action, ActionKind};
use crate::core::resolver::resolve;
use crate::ops::{install, uninstall, OpError};
use crate::supplier::Supplier;

/// What an update did, or would have done.
#[derive(Debug)]
pub struct UpdateReport {
    /// The full plan, in execution order.
    pub actions: Vec<Action>,
    /// How many actions completed before the run ended.
    pub completed: usize,
    /// The error that halted execution, if any.
    pub halted: Option<OpError>,
}

impl UpdateReport {
    /// True when every planned action was executed.
    pub fn is_clean(&self) -> bool {
        self.halted.is_none() && self.actions.iter().all(Action::is_effective)
    }
}

/// Bring the application at `root` in sync with its declared dependencies.
pub fn update(root: &Path, supplier: &dyn Supplier) -> Result<UpdateReport, OpError> {
    let mut app = App::open(root)?;
    let main = app.main.clone().ok_or_else(|| {
        AppError::Config {
            path: root.join(crate::core::manifest::FILE_NAME),
            reason: "file not found".to_string(),
        }
    })?;

    let resolution = resolve(&main, supplier);
    let actions = plan(&resolution, &app);

    let mut completed = 0;
    let mut halted = None;

    if actions.iter().all(Action::is_effective) {
        for action in &actions {
            tracing::debug!("executing: {action}");
            let result = match action.kind {
                ActionKind::Uninstall => uninstall(root, &action.name),
                ActionKind::InstallUpdate => {
                    install(root, &action.name, &action.constraint, supplier)
                }
                ActionKind::Conflict | ActionKind::Failure => unreachable!(),
            };
            match result {
                Ok(()) => completed += 1,
                Err(err) => {
                    tracing::warn!("{} of '{}' failed: {err}", verb(action.kind), action.name);
                    halted = Some(err);
                    break;
                }
            }
        }

        if halted.is_none() {
            // Re-read disk to verify the fixpoint, then refresh the
            // include-path file for the build system.
            app.reinit()?;
            app.write_deps_file()?;
        }
    }

    Ok(UpdateReport {
        actions,
        completed,
        halted,
    })
}

fn verb(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::InstallUpdate => "install",
        ActionKind::Uninstall => "uninstall",
        ActionKind::Conflict => "conflict",
        ActionKind::Failure => "failure",
    }
}
