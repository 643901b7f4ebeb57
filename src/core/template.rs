//! Placeholder substitution for text artifacts.
//!
//! Templates carry `${Key}` tokens. Rendering replaces every occurrence of
//! each declared key globally, then refuses to ship any output that still
//! contains a placeholder-shaped token — an unresolved token means the
//! template and context disagree, which is a packaging defect, not something
//! to paper over silently.

use super::config::StackConfig;
use super::error::{BuildError, BuildResult};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

/// Version the owned component document is pinned to.
pub const COMPONENT_VERSION: &str = "1.0.0";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[A-Za-z][A-Za-z0-9_]*\}").unwrap());

/// Ordered placeholder-key → string-value mapping.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    entries: IndexMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    /// Booleans render as the literal strings "true"/"false".
    pub fn set_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.set(key, if value { "true" } else { "false" })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Context for one build pass. Absent optionals become empty strings so
    /// every declared token stays resolvable.
    pub fn for_stack(config: &StackConfig) -> Self {
        let mut ctx = Self::new();
        ctx.set("ResourceName", config.resource_name.clone());
        ctx.set("Region", config.environment.region.clone());
        ctx.set(
            "Account",
            config.environment.account.clone().unwrap_or_default(),
        );
        ctx.set(
            "SESCredentials",
            config.ses_credentials.clone().unwrap_or_default(),
        );
        ctx.set_bool("AdminUserCreate", config.admin_user_create);
        ctx.set_bool("SESEnable", config.ses_enable);
        ctx
    }
}

/// Substitute every occurrence of each context key into the template.
///
/// Pure and idempotent: the same template and context always produce
/// byte-identical output. Fails with [`BuildError::UnresolvedPlaceholder`] if
/// a `${...}` token survives substitution.
pub fn render(template: &str, ctx: &TemplateContext) -> BuildResult<String> {
    let mut rendered = template.to_string();
    for (key, value) in &ctx.entries {
        rendered = rendered.replace(&format!("${{{}}}", key), value);
    }

    if let Some(residual) = PLACEHOLDER_RE.find(&rendered) {
        return Err(BuildError::UnresolvedPlaceholder {
            token: residual.as_str().to_string(),
        });
    }

    Ok(rendered)
}

/// The two rendered text artifacts consumed by the graph builder.
#[derive(Debug, Clone)]
pub struct RenderedArtifacts {
    /// Image Builder component document (provisioning script steps).
    pub component_document: String,

    /// CloudWatch-agent + mail configuration blob, stored as an SSM parameter.
    pub agent_config: String,

    /// Exact version the owned component is pinned to.
    pub component_version: String,
}

/// Render both artifact templates against one context.
pub fn render_artifacts(
    component_template: &str,
    agent_template: &str,
    ctx: &TemplateContext,
) -> BuildResult<RenderedArtifacts> {
    Ok(RenderedArtifacts {
        component_document: render(component_template, ctx)?,
        agent_config: render(agent_template, ctx)?,
        component_version: COMPONENT_VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{resolve, EnvironmentContext, StackInput};
    use proptest::prelude::*;

    fn ctx_with(pairs: &[(&str, &str)]) -> TemplateContext {
        let mut ctx = TemplateContext::new();
        for (k, v) in pairs {
            ctx.set(k, *v);
        }
        ctx
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let ctx = ctx_with(&[("ResourceName", "CdkEC2")]);
        let out = render("${ResourceName}/a ${ResourceName}/b", &ctx).unwrap();
        assert_eq!(out, "CdkEC2/a CdkEC2/b");
    }

    #[test]
    fn test_render_bool_literals() {
        let mut ctx = TemplateContext::new();
        ctx.set_bool("SESEnable", true).set_bool("AdminUserCreate", false);
        let out = render("${SESEnable},${AdminUserCreate}", &ctx).unwrap();
        assert_eq!(out, "true,false");
    }

    #[test]
    fn test_render_unresolved_token_rejected() {
        let ctx = ctx_with(&[("ResourceName", "X")]);
        let err = render("${ResourceName} ${Region}", &ctx).unwrap_err();
        match err {
            BuildError::UnresolvedPlaceholder { token } => assert_eq!(token, "${Region}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_empty_value_is_resolved() {
        let ctx = ctx_with(&[("Account", "")]);
        let out = render("account=[${Account}]", &ctx).unwrap();
        assert_eq!(out, "account=[]");
    }

    #[test]
    fn test_render_leaves_non_placeholder_text() {
        let ctx = ctx_with(&[("A", "1")]);
        // Shell `$VAR` and `{braces}` are not placeholder-shaped.
        let out = render("echo $HOME {\"k\": ${A}}", &ctx).unwrap();
        assert_eq!(out, "echo $HOME {\"k\": 1}");
    }

    #[test]
    fn test_context_for_stack() {
        let raw = StackInput {
            resource_name: Some("CdkEC2".to_string()),
            ses_enable: true,
            ses_credentials: Some("smtp-secret".to_string()),
            ..StackInput::default()
        };
        let config = resolve(&raw, &EnvironmentContext::default()).unwrap();
        let ctx = TemplateContext::for_stack(&config);
        assert_eq!(ctx.get("ResourceName"), Some("CdkEC2"));
        assert_eq!(ctx.get("Region"), Some("ap-northeast-1"));
        assert_eq!(ctx.get("Account"), Some(""));
        assert_eq!(ctx.get("SESCredentials"), Some("smtp-secret"));
        assert_eq!(ctx.get("SESEnable"), Some("true"));
        assert_eq!(ctx.get("AdminUserCreate"), Some("false"));
    }

    #[test]
    fn test_render_artifacts_pins_version() {
        let ctx = ctx_with(&[("ResourceName", "X")]);
        let artifacts = render_artifacts("doc ${ResourceName}", "{}", &ctx).unwrap();
        assert_eq!(artifacts.component_document, "doc X");
        assert_eq!(artifacts.component_version, COMPONENT_VERSION);
    }

    proptest! {
        /// Rendering twice with the same context is byte-identical.
        #[test]
        fn prop_render_idempotent(name in "[A-Za-z][A-Za-z0-9]{0,16}", region in "[a-z]{2}-[a-z]{4,9}-[1-3]") {
            let ctx = ctx_with(&[("ResourceName", name.as_str()), ("Region", region.as_str())]);
            let template = "arn:aws:imagebuilder:${Region}:aws:image/${ResourceName} ${ResourceName}";
            let first = render(template, &ctx).unwrap();
            let second = render(template, &ctx).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert!(!PLACEHOLDER_RE.is_match(&first));
        }

        /// No placeholder-shaped token ever survives a successful render.
        #[test]
        fn prop_no_residual_placeholder(value in "[A-Za-z0-9 _./-]{0,24}") {
            let ctx = ctx_with(&[("Key", value.as_str())]);
            let out = render("before ${Key} after", &ctx).unwrap();
            prop_assert!(!PLACEHOLDER_RE.is_match(&out));
        }
    }
}
