//! Stack configuration — raw input parsing, environment profiles,
//! defaulting, and derived resource naming.
//!
//! A stack file declares one or more named environment profiles (e.g.
//! `staging`, `production`), each a [`StackInput`]. The resolver merges the
//! selected profile with an explicit [`EnvironmentContext`] into an immutable
//! [`StackConfig`]. Resolution is a pure function over its inputs; nothing is
//! read from the ambient process environment here.

use super::error::{BuildError, BuildResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Region used when neither the profile nor the context names one.
pub const DEFAULT_REGION: &str = "ap-northeast-1";

/// Sentinel VPC selector meaning "the account's default VPC".
pub const DEFAULT_VPC: &str = "default";

/// Log-group retention, fixed at five years.
pub const LOG_RETENTION_DAYS: u32 = 1825;

/// Application log channels collected by the monitoring agent. Each maps to
/// one log-group node per build pass, regardless of feature flags.
pub const LOG_CHANNELS: [&str; 4] = ["messages", "access_log", "error_log", "maillog"];

/// Build-host CPU architecture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    X86,
    Arm64,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86 => write!(f, "x86"),
            Self::Arm64 => write!(f, "arm64"),
        }
    }
}

/// AWS managed policy attached to the build-host role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagedPolicy {
    #[serde(rename = "AmazonSSMManagedInstanceCore")]
    SsmManagedInstanceCore,
    #[serde(rename = "EC2InstanceProfileForImageBuilder")]
    Ec2InstanceProfileForImageBuilder,
    #[serde(rename = "AmazonSSMFullAccess")]
    SsmFullAccess,
    #[serde(rename = "AmazonS3ReadOnlyAccess")]
    S3ReadOnlyAccess,
    #[serde(rename = "SecretsManagerReadWrite")]
    SecretsManagerReadWrite,
    #[serde(rename = "AWSImageBuilderReadOnlyAccess")]
    ImageBuilderReadOnlyAccess,
}

impl ManagedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SsmManagedInstanceCore => "AmazonSSMManagedInstanceCore",
            Self::Ec2InstanceProfileForImageBuilder => "EC2InstanceProfileForImageBuilder",
            Self::SsmFullAccess => "AmazonSSMFullAccess",
            Self::S3ReadOnlyAccess => "AmazonS3ReadOnlyAccess",
            Self::SecretsManagerReadWrite => "SecretsManagerReadWrite",
            Self::ImageBuilderReadOnlyAccess => "AWSImageBuilderReadOnlyAccess",
        }
    }
}

/// The maximal policy set a build host may need. A profile can restrict this;
/// the builder never grants beyond the resolved set.
pub fn default_policies() -> Vec<ManagedPolicy> {
    vec![
        ManagedPolicy::SsmManagedInstanceCore,
        ManagedPolicy::Ec2InstanceProfileForImageBuilder,
        ManagedPolicy::SsmFullAccess,
        ManagedPolicy::S3ReadOnlyAccess,
        ManagedPolicy::SecretsManagerReadWrite,
        ManagedPolicy::ImageBuilderReadOnlyAccess,
    ]
}

/// Deployment target descriptor, threaded explicitly through resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentContext {
    pub account: Option<String>,
    pub region: String,
}

impl Default for EnvironmentContext {
    fn default() -> Self {
        Self {
            account: None,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

/// Environment override block inside a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentInput {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// One named environment profile as written in the stack file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackInput {
    /// Base string every derived resource name is prefixed with. Required.
    #[serde(default)]
    pub resource_name: Option<String>,

    /// Trigger an immediate one-shot image build in addition to the pipeline.
    #[serde(default)]
    pub image_create: bool,

    /// VPC selector; `"default"` means the account's default VPC.
    #[serde(default = "default_vpc")]
    pub vpc_id: String,

    #[serde(default)]
    pub architecture: Architecture,

    /// Secrets Manager reference for SES SMTP credentials.
    #[serde(default)]
    pub ses_credentials: Option<String>,

    #[serde(default)]
    pub admin_user_create: bool,

    #[serde(default)]
    pub ses_enable: bool,

    #[serde(default)]
    pub environment: Option<EnvironmentInput>,

    /// Restrict the role's managed-policy set. Omitted = maximal superset.
    #[serde(default)]
    pub managed_policies: Option<Vec<ManagedPolicy>>,
}

fn default_vpc() -> String {
    DEFAULT_VPC.to_string()
}

impl Default for StackInput {
    fn default() -> Self {
        Self {
            resource_name: None,
            image_create: false,
            vpc_id: default_vpc(),
            architecture: Architecture::default(),
            ses_credentials: None,
            admin_user_create: false,
            ses_enable: false,
            environment: None,
            managed_policies: None,
        }
    }
}

/// Top-level stack file — named environment profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFile {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Named profiles, order-preserving
    #[serde(default)]
    pub environments: IndexMap<String, StackInput>,
}

impl StackFile {
    /// Parse a stack file from a YAML string.
    pub fn parse(yaml: &str) -> BuildResult<Self> {
        let file: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| BuildError::configuration("stack file", e.to_string()))?;
        if file.version != "1.0" {
            return Err(BuildError::configuration(
                "version",
                format!("must be \"1.0\", got \"{}\"", file.version),
            ));
        }
        Ok(file)
    }

    /// Load and parse a stack file from disk.
    pub fn load(path: &Path) -> BuildResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BuildError::configuration("stack file", format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Select a profile by name. With no selector, a file holding exactly one
    /// profile selects it implicitly.
    pub fn select_profile(&self, selector: Option<&str>) -> BuildResult<(&str, &StackInput)> {
        match selector {
            Some(name) => self
                .environments
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| BuildError::UnknownEnvironment {
                    name: name.to_string(),
                    available: self
                        .environments
                        .keys()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                }),
            None => match self.environments.len() {
                0 => Err(BuildError::configuration(
                    "environments",
                    "stack file declares no environments",
                )),
                1 => {
                    let (k, v) = self.environments.first().unwrap();
                    Ok((k.as_str(), v))
                }
                _ => Err(BuildError::configuration(
                    "environments",
                    "multiple environments defined; select one with --env",
                )),
            },
        }
    }
}

/// Fully resolved, immutable configuration for one build pass.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub resource_name: String,
    pub image_create: bool,
    pub vpc_id: String,
    pub architecture: Architecture,
    pub ses_credentials: Option<String>,
    pub admin_user_create: bool,
    pub ses_enable: bool,
    pub environment: EnvironmentContext,
    pub managed_policies: Vec<ManagedPolicy>,
}

/// Merge a profile with the environment context into a [`StackConfig`].
///
/// Precedence for account/region: profile override, then context, then the
/// built-in region default. Pure; fails only on missing required input.
pub fn resolve(input: &StackInput, ctx: &EnvironmentContext) -> BuildResult<StackConfig> {
    let resource_name = match &input.resource_name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => {
            return Err(BuildError::configuration(
                "resource_name",
                "required and must not be empty",
            ))
        }
    };

    let env_override = input.environment.clone().unwrap_or_default();
    let environment = EnvironmentContext {
        account: env_override.account.or_else(|| ctx.account.clone()),
        region: env_override.region.unwrap_or_else(|| ctx.region.clone()),
    };

    Ok(StackConfig {
        resource_name,
        image_create: input.image_create,
        vpc_id: input.vpc_id.clone(),
        architecture: input.architecture,
        ses_credentials: input.ses_credentials.clone(),
        admin_user_create: input.admin_user_create,
        ses_enable: input.ses_enable,
        environment,
        managed_policies: input
            .managed_policies
            .clone()
            .unwrap_or_else(default_policies),
    })
}

impl StackConfig {
    /// Derive a resource name from the base plus a fixed suffix. Applied
    /// exactly once: a base that already carries the suffix is used verbatim,
    /// never double-suffixed.
    pub fn derived_name(&self, suffix: &str) -> String {
        if self.resource_name.ends_with(suffix) {
            self.resource_name.clone()
        } else {
            format!("{}{}", self.resource_name, suffix)
        }
    }

    pub fn role_name(&self) -> String {
        self.derived_name("ImageBuilderRole")
    }

    pub fn instance_profile_name(&self) -> String {
        self.derived_name("InstanceProfile")
    }

    pub fn security_group_name(&self) -> String {
        self.derived_name("SecurityGroup")
    }

    pub fn component_name(&self) -> String {
        self.derived_name("Component")
    }

    pub fn infra_config_name(&self) -> String {
        self.derived_name("InfrastructureConfiguration")
    }

    pub fn recipe_name(&self) -> String {
        self.derived_name("Recipe")
    }

    pub fn distribution_name(&self) -> String {
        self.derived_name("DistributionConfiguration")
    }

    pub fn pipeline_name(&self) -> String {
        self.derived_name("Pipeline")
    }

    pub fn image_name(&self) -> String {
        self.derived_name("Image")
    }

    /// SSM parameter holding the rendered monitoring/mail configuration.
    pub fn parameter_name(&self) -> String {
        self.derived_name("EC2ImageBuilder")
    }

    /// Log group for the build system itself.
    pub fn build_log_group_name(&self) -> String {
        format!("/aws/imagebuilder/{}", self.resource_name)
    }

    /// All five log-group names, application channels first.
    pub fn log_group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = LOG_CHANNELS
            .iter()
            .map(|channel| format!("/{}/{}", self.resource_name, channel))
            .collect();
        names.push(self.build_log_group_name());
        names
    }
}
