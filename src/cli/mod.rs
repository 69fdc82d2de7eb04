//! CLI subcommands — init, validate, plan, apply, status, drift, package,
//! schema.

use crate::artifact::archive;
use crate::core::{executor, parser, planner, resolver, state, types};
use crate::error::{LanzarError, Result};
use crate::provenance::{drift, eventlog};
use crate::provider::local::LocalProvider;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new lanzar project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate lanzar.yaml without touching the control plane
    Validate {
        /// Path to lanzar.yaml
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,
    },

    /// Show execution plan (diff desired vs current)
    Plan {
        /// Path to lanzar.yaml
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,

        /// Control-plane store directory
        #[arg(long, default_value = ".lanzar/store")]
        store: PathBuf,
    },

    /// Converge the stack to desired state
    Apply {
        /// Path to lanzar.yaml
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,

        /// Control-plane store directory
        #[arg(long, default_value = ".lanzar/store")]
        store: PathBuf,

        /// Target specific resource
        #[arg(short, long)]
        resource: Option<String>,

        /// Force re-apply of unchanged resources
        #[arg(long)]
        force: bool,

        /// Plan only, apply nothing
        #[arg(long)]
        dry_run: bool,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Show current state from lock files
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Target specific stack
        #[arg(short, long)]
        stack: Option<String>,
    },

    /// Detect out-of-band changes against the last converged state
    Drift {
        /// Path to lanzar.yaml
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,

        /// Control-plane store directory
        #[arg(long, default_value = ".lanzar/store")]
        store: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Exit non-zero on any drift (for CI/cron)
        #[arg(long)]
        strict: bool,
    },

    /// Build a zip artifact from a source directory
    Package {
        /// Source directory
        #[arg(short, long)]
        source: PathBuf,

        /// Output archive path
        #[arg(short, long)]
        output: PathBuf,

        /// Glob patterns to exclude (relative paths)
        #[arg(short = 'x', long = "exclude")]
        excludes: Vec<String>,
    },

    /// Emit the JSON Schema of lanzar.yaml
    Schema,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan { file, store } => cmd_plan(&file, &store),
        Commands::Apply {
            file,
            store,
            resource,
            force,
            dry_run,
            state_dir,
        } => cmd_apply(&file, &store, &state_dir, resource.as_deref(), force, dry_run),
        Commands::Drift {
            file,
            store,
            state_dir,
            strict,
        } => cmd_drift(&file, &store, &state_dir, strict),
        Commands::Status { state_dir, stack } => cmd_status(&state_dir, stack.as_deref()),
        Commands::Package {
            source,
            output,
            excludes,
        } => cmd_package(&source, &output, &excludes),
        Commands::Schema => cmd_schema(),
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join("lanzar.yaml");
    if config_path.exists() {
        return Err(LanzarError::io(
            format!("{}", config_path.display()),
            std::io::Error::from(std::io::ErrorKind::AlreadyExists),
        ));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| LanzarError::io(format!("cannot create {}", state_dir.display()), e))?;

    let template = r#"version: "1.0"
name: my-stack
description: "Managed by lanzar"

params: {}

resources: {}

policy:
  failure: stop_on_first
  provenance: true
  lock_file: true
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| LanzarError::io(format!("cannot write {}", config_path.display()), e))?;

    println!("Initialized lanzar project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let config = parse_and_validate(file)?;
    println!(
        "OK: {} ({} resources)",
        config.name,
        config.resources.len()
    );
    Ok(())
}

/// Parse and validate a config file, printing every finding on failure.
fn parse_and_validate(file: &Path) -> Result<types::StackConfig> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err(LanzarError::Validation(errors))
}

/// Directory package paths are resolved against.
fn base_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _other => Path::new("."),
    }
}

fn cmd_plan(file: &Path, store: &Path) -> Result<()> {
    let config = parse_and_validate(file)?;
    let resolved = resolver::resolve_config(&config)?;
    let execution_order = resolver::build_execution_order(&resolved)?;
    let artifacts = executor::resolve_artifacts(&resolved, base_dir(file))?;

    let provider = LocalProvider::open(store)?;
    let current = planner::current_states(&provider, &resolved)?;
    let plan = planner::plan(&resolved, &execution_order, &artifacts, &current);

    print_plan(&plan);
    Ok(())
}

/// Display a plan to stdout.
fn print_plan(plan: &types::ExecutionPlan) {
    println!("Planning: {} ({} resources)", plan.name, plan.changes.len());
    println!();

    for change in &plan.changes {
        let symbol = match change.action {
            types::PlanAction::Create => "+",
            types::PlanAction::Update => "~",
            types::PlanAction::Destroy => "-",
            types::PlanAction::NoOp => " ",
        };
        println!("  {} {}", symbol, change.description);
    }

    println!();
    println!(
        "Plan: {} to add, {} to change, {} to destroy, {} unchanged.",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged
    );
}

fn cmd_apply(
    file: &Path,
    store: &Path,
    state_dir: &Path,
    resource_filter: Option<&str>,
    force: bool,
    dry_run: bool,
) -> Result<()> {
    let config = parse_and_validate(file)?;
    let mut provider = LocalProvider::open(store)?;

    let opts = executor::ApplyOptions {
        config: &config,
        base_dir: base_dir(file),
        state_dir,
        force,
        dry_run,
        resource_filter,
    };

    let result = executor::apply(&opts, &mut provider)?;

    if dry_run {
        println!("Dry run — no changes applied.");
        return Ok(());
    }

    println!(
        "{}: {} converged, {} unchanged, {} failed ({:.1}s)",
        result.stack,
        result.resources_converged,
        result.resources_unchanged,
        result.resources_failed,
        result.total_duration.as_secs_f64()
    );

    if result.resources_failed > 0 {
        return Err(LanzarError::ApplyFailed {
            failed: result.resources_failed,
        });
    }

    println!(
        "Apply complete: {} converged, {} unchanged.",
        result.resources_converged, result.resources_unchanged
    );
    Ok(())
}

fn cmd_drift(file: &Path, store: &Path, state_dir: &Path, strict: bool) -> Result<()> {
    let config = parse_and_validate(file)?;

    let Some(lock) = state::load_lock(state_dir, &config.name)? else {
        println!("No state found. Run `lanzar apply` first.");
        return Ok(());
    };

    let provider = LocalProvider::open(store)?;
    println!("Checking {} ({} resources)...", lock.stack, lock.resources.len());
    let findings = drift::detect_drift(&lock, &provider)?;

    if findings.is_empty() {
        println!("No drift detected.");
        return Ok(());
    }

    for f in &findings {
        println!("  DRIFTED: {} ({})", f.resource_id, f.detail);
        println!("    Expected: {}", f.expected_hash);
        println!("    Actual:   {}", f.actual_hash);
        if config.policy.provenance {
            let _ = eventlog::append_event(
                state_dir,
                &config.name,
                types::ProvenanceEvent::DriftDetected {
                    stack: config.name.clone(),
                    resource: f.resource_id.clone(),
                    expected_hash: f.expected_hash.clone(),
                    actual_hash: f.actual_hash.clone(),
                },
            );
        }
    }

    println!();
    println!("Drift detected: {} resource(s)", findings.len());
    if strict {
        return Err(LanzarError::Drift {
            findings: findings.len(),
        });
    }
    Ok(())
}

fn cmd_status(state_dir: &Path, stack_filter: Option<&str>) -> Result<()> {
    let entries = std::fs::read_dir(state_dir)
        .map_err(|e| LanzarError::io(format!("cannot read state dir {}", state_dir.display()), e))?;

    let mut found = false;

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(filter) = stack_filter {
            if name != filter {
                continue;
            }
        }

        if !entry.path().is_dir() {
            continue;
        }

        if let Some(lock) = state::load_lock(state_dir, &name)? {
            found = true;
            println!("Stack: {}", lock.stack);
            println!("  Generated: {}", lock.generated_at);
            println!("  Generator: {}", lock.generator);
            println!("  Resources: {}", lock.resources.len());

            for (id, rl) in &lock.resources {
                let duration = rl
                    .duration_seconds
                    .map(|d| format!(" ({:.2}s)", d))
                    .unwrap_or_default();
                println!(
                    "    {}: {} [{}]{}",
                    id, rl.status, rl.resource_kind, duration
                );
            }
            println!();
        }
    }

    if !found {
        println!("No state found. Run `lanzar apply` first.");
    }

    Ok(())
}

fn cmd_package(source: &Path, output: &Path, excludes: &[String]) -> Result<()> {
    let artifact = archive::build_archive(source, output, excludes)?;
    println!("Packaged {} -> {}", source.display(), artifact.locator);
    println!("  Digest: {}", artifact.digest);
    Ok(())
}

fn cmd_schema() -> Result<()> {
    let schema = schemars::schema_for!(types::StackConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
