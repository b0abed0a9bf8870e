//! kiln CLI.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln::core::app::App;
use kiln::core::planner::ActionKind;
use kiln::core::version::Constraint;
use kiln::ops;
use kiln::supplier::{DirSupplier, RegistrySupplier, Supplier};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "kiln - module manager for kiln applications")]
struct Cli {
    /// Application directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Package supplier: a registry URL or a local package directory
    #[arg(long, global = true, env = "KILN_SUPPLIER")]
    supplier: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize modules/ with the application manifest
    Update,
    /// Install a single package without touching the manifest
    Install {
        /// Package name
        name: String,
        /// Version constraint, e.g. '>=1.0.0'
        #[arg(default_value = "*")]
        constraint: String,
    },
    /// Uninstall a single module
    Remove {
        /// Package name
        name: String,
    },
    /// List installed modules
    List,
    /// Print the computed include paths
    Paths,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Update => {
            let supplier = open_supplier(&cli)?;
            let report = ops::update(&cli.root, supplier.as_ref())?;

            if report.actions.is_empty() {
                println!("nothing to do");
                return Ok(());
            }
            for action in &report.actions {
                println!("{action}");
            }
            if let Some(err) = report.halted {
                return Err(err).with_context(|| {
                    format!("halted after {} of {} actions", report.completed, report.actions.len())
                });
            }
            if report
                .actions
                .iter()
                .any(|a| matches!(a.kind, ActionKind::Conflict | ActionKind::Failure))
            {
                bail!("dependencies could not be resolved; nothing was changed");
            }
            println!("{} actions completed", report.completed);
        }
        Commands::Install { name, constraint } => {
            let supplier = open_supplier(&cli)?;
            let constraint: Constraint = constraint
                .parse()
                .with_context(|| format!("invalid constraint '{constraint}'"))?;
            ops::install(&cli.root, &name.as_str().into(), &constraint, supplier.as_ref())?;
            println!("installed {name}");
        }
        Commands::Remove { name } => {
            ops::uninstall(&cli.root, &name.as_str().into())?;
            println!("removed {name}");
        }
        Commands::List => {
            let app = App::open(&cli.root)?;
            for (name, manifest) in &app.installed {
                println!("{name} {}", manifest.version);
            }
        }
        Commands::Paths => {
            let app = App::open(&cli.root)?;
            for path in app.source_paths() {
                println!("-I{}", path.display());
            }
            for path in app.view_paths() {
                println!("-J{}", path.display());
            }
        }
    }

    Ok(())
}

fn open_supplier(cli: &Cli) -> Result<Box<dyn Supplier>> {
    let location = cli
        .supplier
        .clone()
        .context("no supplier configured; pass --supplier or set KILN_SUPPLIER")?;
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(RegistrySupplier::new(location)?))
    } else {
        Ok(Box::new(DirSupplier::new(location)))
    }
}
