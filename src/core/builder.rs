//! Graph construction — expands a resolved [`StackConfig`] plus rendered
//! artifacts into the full resource graph, in provisioning order.
//!
//! Construction is deterministic given its inputs and all-or-nothing: any
//! error aborts the pass with no partial graph. Node order mirrors the real
//! provisioning constraints — log sinks and the configuration parameter
//! first, then the build-host identity chain (role, instance profile),
//! network boundary, infrastructure configuration, recipe, distribution, and
//! finally the pipeline and the optional one-shot image build.

use super::config::{StackConfig, LOG_RETENTION_DAYS};
use super::error::BuildResult;
use super::graph::{ResourceGraph, ResourceKind, ResourceNode};
use super::template::RenderedArtifacts;
use crate::guard::{ExistenceGuard, LookupPolicy};
use serde_json::{json, Value};

/// Fixed description label stamped on the distributed AMI.
pub const AMI_DESCRIPTION: &str = "Custom Amazon Linux AMI with Apache and PHP";

/// Image test timeout, fixed at one hour.
pub const TEST_TIMEOUT_MINUTES: u32 = 60;

/// Wildcard version marker pinning a managed component to its latest release.
pub const LATEST_VERSION: &str = "x.x.x";

/// One build step inside the recipe. Ordering is caller-significant: steps
/// execute in listed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeComponentRef {
    /// AWS-published component, pinned to the wildcard "latest" marker.
    Managed { name: String },
    /// Component node owned by this graph, pinned to its exact version.
    Owned { node: String, version: String },
}

impl RecipeComponentRef {
    fn managed(name: &str) -> Self {
        Self::Managed {
            name: name.to_string(),
        }
    }

    /// Property-bag form. Managed refs resolve to a concrete ARN in the
    /// target region; owned refs stay graph-internal for the emitter.
    pub fn to_value(&self, region: &str) -> Value {
        match self {
            Self::Managed { name } => json!({
                "component_arn":
                    format!("arn:aws:imagebuilder:{region}:aws:component/{name}/{LATEST_VERSION}")
            }),
            Self::Owned { node, version } => json!({
                "component_ref": node,
                "version": version,
            }),
        }
    }
}

/// The recipe's build steps in fixed order: OS update, language runtime,
/// monitoring agent, the owned provisioning component, reboot verification.
pub fn recipe_components(
    config: &StackConfig,
    artifacts: &RenderedArtifacts,
) -> Vec<RecipeComponentRef> {
    vec![
        RecipeComponentRef::managed("update-linux"),
        RecipeComponentRef::managed("php-8-2-linux"),
        RecipeComponentRef::managed("amazon-cloudwatch-agent-linux"),
        RecipeComponentRef::Owned {
            node: config.component_name(),
            version: artifacts.component_version.clone(),
        },
        RecipeComponentRef::managed("reboot-test-linux"),
    ]
}

/// Result of one build pass: the finished graph plus the two identifiers
/// surfaced to the caller.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub graph: ResourceGraph,
    /// Pipeline identifier, always present.
    pub pipeline: String,
    /// Image identifier, present only when an immediate build was requested.
    pub image: Option<String>,
}

fn parent_image_arn(config: &StackConfig) -> String {
    format!(
        "arn:aws:imagebuilder:{}:aws:image/amazon-linux-2023-{}/{}",
        config.environment.region, config.architecture, LATEST_VERSION
    )
}

/// Expand the configuration into the full resource graph.
pub fn synthesize(
    config: &StackConfig,
    artifacts: &RenderedArtifacts,
    guard: &dyn ExistenceGuard,
    policy: LookupPolicy,
) -> BuildResult<Synthesis> {
    let mut graph = ResourceGraph::new();
    let region = config.environment.region.clone();

    // Log sinks, guard-modulated: a pre-existing group becomes a reference
    // node with no create lifecycle.
    for name in config.log_group_names() {
        let exists = guard
            .check_exists(ResourceKind::LogGroup, &name)
            .resolve(policy, ResourceKind::LogGroup, &name)?;
        let node = if exists {
            ResourceNode::reference(ResourceKind::LogGroup, name)
        } else {
            ResourceNode::new(ResourceKind::LogGroup, name)
                .property("retention_days", LOG_RETENTION_DAYS)
        };
        graph.insert(node)?;
    }

    // Monitoring/mail configuration blob, stored as a parameter.
    graph.insert(
        ResourceNode::new(ResourceKind::Parameter, config.parameter_name())
            .property("type", "String")
            .property("value", artifacts.agent_config.clone()),
    )?;

    // Owned provisioning component.
    let component_name = config.component_name();
    graph.insert(
        ResourceNode::new(ResourceKind::Component, &component_name)
            .property("platform", "Linux")
            .property("version", artifacts.component_version.clone())
            .property("data", artifacts.component_document.clone()),
    )?;

    // Build-host role with the resolved policy set, nothing beyond it.
    let role_name = config.role_name();
    let policies: Vec<&str> = config.managed_policies.iter().map(|p| p.as_str()).collect();
    graph.insert(
        ResourceNode::new(ResourceKind::Role, &role_name)
            .property("assumed_by", "ec2.amazonaws.com")
            .property("managed_policies", json!(policies)),
    )?;

    let profile_name = config.instance_profile_name();
    graph.insert(
        ResourceNode::new(ResourceKind::InstanceProfile, &profile_name)
            .property("role", role_name.clone())
            .depends_on(&role_name),
    )?;

    // Egress-open, ingress default-deny boundary in the resolved VPC.
    let sg_name = config.security_group_name();
    graph.insert(
        ResourceNode::new(ResourceKind::SecurityGroup, &sg_name)
            .property("vpc_id", config.vpc_id.clone())
            .property("description", "Allow EC2 ImageBuilder access")
            .property("allow_all_outbound", true),
    )?;

    let infra_name = config.infra_config_name();
    graph.insert(
        ResourceNode::new(ResourceKind::InfrastructureConfiguration, &infra_name)
            .property("instance_profile", profile_name.clone())
            .property("security_groups", json!([sg_name.clone()]))
            .property("terminate_instance_on_failure", true)
            .depends_on(&profile_name)
            .depends_on(&sg_name),
    )?;

    let recipe_name = config.recipe_name();
    let components: Vec<Value> = recipe_components(config, artifacts)
        .iter()
        .map(|c| c.to_value(&region))
        .collect();
    graph.insert(
        ResourceNode::new(ResourceKind::ImageRecipe, &recipe_name)
            .property("version", artifacts.component_version.clone())
            .property("parent_image", parent_image_arn(config))
            .property("components", Value::Array(components))
            .property("uninstall_ssm_agent_after_build", false)
            .depends_on(&component_name),
    )?;

    let distribution_name = config.distribution_name();
    graph.insert(
        ResourceNode::new(ResourceKind::DistributionConfiguration, &distribution_name)
            .property("region", region.clone())
            .property(
                "ami_tags",
                json!({
                    "Name": config.resource_name,
                    "Description": AMI_DESCRIPTION,
                }),
            ),
    )?;

    let pipeline_name = config.pipeline_name();
    graph.insert(
        ResourceNode::new(ResourceKind::ImagePipeline, &pipeline_name)
            .property("tests_enabled", true)
            .property("timeout_minutes", TEST_TIMEOUT_MINUTES)
            .depends_on(&infra_name)
            .depends_on(&recipe_name)
            .depends_on(&distribution_name),
    )?;

    // One-shot build sharing the pipeline's upstream references.
    let image = if config.image_create {
        let image_name = config.image_name();
        graph.insert(
            ResourceNode::new(ResourceKind::Image, &image_name)
                .property("tests_enabled", true)
                .property("timeout_minutes", TEST_TIMEOUT_MINUTES)
                .property("tags", json!({ "Name": config.resource_name }))
                .depends_on(&infra_name)
                .depends_on(&recipe_name)
                .depends_on(&distribution_name),
        )?;
        Some(image_name)
    } else {
        None
    };

    Ok(Synthesis {
        graph,
        pipeline: pipeline_name,
        image,
    })
}
