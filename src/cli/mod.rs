//! CLI subcommands — init, validate, synth.
//!
//! Thin glue: environment-variable plumbing, file loading, and output
//! printing. All decision logic lives in `core` and `guard`.

use crate::core::builder::{self, Synthesis};
use crate::core::config::{self, EnvironmentContext, StackFile};
use crate::core::graph::Lifecycle;
use crate::core::template::{self, TemplateContext};
use crate::guard::{LookupPolicy, StaticGuard};
use clap::Subcommand;
use std::path::{Path, PathBuf};

/// Default provisioning-script template, baked into the binary.
pub const COMPONENT_TEMPLATE: &str = include_str!("../../assets/ec2-component.yaml");

/// Default monitoring/mail configuration template, baked into the binary.
pub const AGENT_TEMPLATE: &str = include_str!("../../assets/cloudwatch-agent.json");

const STARTER_STACK: &str = r#"version: "1.0"

environments:
  staging:
    resource_name: CdkEC2
    vpc_id: default
    architecture: x86
    image_create: false
"#;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new amibake project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate stack.yaml without touching any environment
    Validate {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,
    },

    /// Compile a profile into its resource graph and print it
    Synth {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,

        /// Environment profile to synthesize
        #[arg(short, long)]
        env: Option<String>,

        /// Treat failed existence lookups as absent instead of aborting
        #[arg(long)]
        optimistic: bool,

        /// Log-group names to treat as already existing
        #[arg(long = "assume-exists")]
        assume_exists: Vec<String>,

        /// Override the embedded component template
        #[arg(long)]
        component_template: Option<PathBuf>,

        /// Override the embedded agent-config template
        #[arg(long)]
        agent_template: Option<PathBuf>,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth {
            file,
            env,
            optimistic,
            assume_exists,
            component_template,
            agent_template,
        } => cmd_synth(
            &file,
            env.as_deref(),
            optimistic,
            &assume_exists,
            component_template.as_deref(),
            agent_template.as_deref(),
        ),
    }
}

/// Deployment target from the conventional CDK environment variables. Read
/// once at the CLI boundary and threaded explicitly from here on.
fn environment_from_process() -> EnvironmentContext {
    EnvironmentContext {
        account: std::env::var("CDK_DEFAULT_ACCOUNT").ok().filter(|a| !a.is_empty()),
        region: std::env::var("CDK_DEFAULT_REGION")
            .ok()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| config::DEFAULT_REGION.to_string()),
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("stack.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path).map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&config_path, STARTER_STACK)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;
    println!("Created {}", config_path.display());
    println!("Edit it, then run: amibake synth");
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let stack = StackFile::load(file).map_err(|e| e.to_string())?;
    let ctx = environment_from_process();

    let mut failures = 0usize;
    for (name, input) in &stack.environments {
        match config::resolve(input, &ctx) {
            Ok(resolved) => println!(
                "  ok    {} ({}, {}, {})",
                name, resolved.resource_name, resolved.architecture, resolved.environment.region
            ),
            Err(e) => {
                failures += 1;
                println!("  error {}: {}", name, e);
            }
        }
    }

    if failures > 0 {
        Err(format!("{} of {} profiles invalid", failures, stack.environments.len()))
    } else {
        println!("{} valid", file.display());
        Ok(())
    }
}

fn load_template(override_path: Option<&Path>, embedded: &'static str) -> Result<String, String> {
    match override_path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read template {}: {}", path.display(), e)),
        None => Ok(embedded.to_string()),
    }
}

fn cmd_synth(
    file: &Path,
    env: Option<&str>,
    optimistic: bool,
    assume_exists: &[String],
    component_template: Option<&Path>,
    agent_template: Option<&Path>,
) -> Result<(), String> {
    let stack = StackFile::load(file).map_err(|e| e.to_string())?;
    let (profile_name, input) = stack.select_profile(env).map_err(|e| e.to_string())?;
    let resolved = config::resolve(input, &environment_from_process()).map_err(|e| e.to_string())?;

    let component_body = load_template(component_template, COMPONENT_TEMPLATE)?;
    let agent_body = load_template(agent_template, AGENT_TEMPLATE)?;

    let ctx = TemplateContext::for_stack(&resolved);
    let artifacts =
        template::render_artifacts(&component_body, &agent_body, &ctx).map_err(|e| e.to_string())?;

    let mut guard = StaticGuard::new();
    for name in assume_exists {
        guard = guard.found(name);
    }
    let policy = if optimistic {
        LookupPolicy::Optimistic
    } else {
        LookupPolicy::Conservative
    };

    let synthesis =
        builder::synthesize(&resolved, &artifacts, &guard, policy).map_err(|e| e.to_string())?;
    print_synthesis(profile_name, &synthesis)
}

fn print_synthesis(profile: &str, synthesis: &Synthesis) -> Result<(), String> {
    let order = synthesis.graph.execution_order().map_err(|e| e.to_string())?;

    println!("Profile: {}", profile);
    println!();
    for name in &order {
        let node = synthesis
            .graph
            .get(name)
            .ok_or_else(|| format!("ordered node '{}' missing from graph", name))?;
        let verb = match node.lifecycle {
            Lifecycle::Owned => "CREATE",
            Lifecycle::Referenced => "REF   ",
        };
        println!("  {} {:<30} {}", verb, node.kind.to_string(), node.name);
    }
    println!();
    println!("Outputs:");
    println!("  pipeline: {}", synthesis.pipeline);
    if let Some(image) = &synthesis.image {
        println!("  image:    {}", image);
    }
    println!();
    println!(
        "{} resources ({} created, {} referenced)",
        synthesis.graph.len(),
        synthesis
            .graph
            .nodes()
            .filter(|n| n.lifecycle == Lifecycle::Owned)
            .count(),
        synthesis
            .graph
            .nodes()
            .filter(|n| n.lifecycle == Lifecycle::Referenced)
            .count(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StackInput;
    use crate::guard::AssumeAbsent;

    #[test]
    fn test_starter_stack_parses_and_resolves() {
        let stack = StackFile::parse(STARTER_STACK).unwrap();
        let (name, input) = stack.select_profile(None).unwrap();
        assert_eq!(name, "staging");
        let resolved = config::resolve(input, &EnvironmentContext::default()).unwrap();
        assert_eq!(resolved.resource_name, "CdkEC2");
    }

    #[test]
    fn test_embedded_templates_render_cleanly() {
        let raw = StackInput {
            resource_name: Some("CdkEC2".to_string()),
            ..StackInput::default()
        };
        let resolved = config::resolve(&raw, &EnvironmentContext::default()).unwrap();
        let ctx = TemplateContext::for_stack(&resolved);
        let artifacts =
            template::render_artifacts(COMPONENT_TEMPLATE, AGENT_TEMPLATE, &ctx).unwrap();
        assert!(artifacts.component_document.contains("CdkEC2Component"));
        assert!(artifacts.agent_config.contains("/CdkEC2/messages"));
        // The agent blob must still be valid JSON after substitution.
        let parsed: serde_json::Value = serde_json::from_str(&artifacts.agent_config).unwrap();
        assert!(parsed["logs"]["logs_collected"]["files"]["collect_list"].is_array());
    }

    #[test]
    fn test_embedded_templates_build_full_graph() {
        let raw = StackInput {
            resource_name: Some("CdkEC2".to_string()),
            ..StackInput::default()
        };
        let resolved = config::resolve(&raw, &EnvironmentContext::default()).unwrap();
        let ctx = TemplateContext::for_stack(&resolved);
        let artifacts =
            template::render_artifacts(COMPONENT_TEMPLATE, AGENT_TEMPLATE, &ctx).unwrap();
        let synthesis =
            builder::synthesize(&resolved, &artifacts, &AssumeAbsent, LookupPolicy::Conservative)
                .unwrap();
        assert_eq!(synthesis.pipeline, "CdkEC2Pipeline");
        assert_eq!(synthesis.graph.execution_order().unwrap().len(), synthesis.graph.len());
    }

    #[test]
    fn test_init_writes_starter() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        let written = std::fs::read_to_string(dir.path().join("stack.yaml")).unwrap();
        assert_eq!(written, STARTER_STACK);
        // Second init refuses to clobber.
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_validate_reports_bad_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        std::fs::write(
            &path,
            "version: \"1.0\"\nenvironments:\n  broken:\n    image_create: true\n",
        )
        .unwrap();
        assert!(cmd_validate(&path).is_err());
    }
}
