use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse front-end configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Settings that shape how files are parsed and how their scopes are built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrontendConfig {
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub parser: ParserOptions,
    #[serde(default)]
    pub target_scope: ResourceScope,
}

impl FrontendConfig {
    pub fn from_toml_str(text: &str) -> Result<FrontendConfig, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureFlags {
    #[serde(default, rename = "extensibility")]
    pub extensibility_enabled: bool,
    #[serde(default, rename = "microsoft-graph-preview")]
    pub microsoft_graph_preview_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParserOptions {
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: default_max_nesting_depth(),
        }
    }
}

fn default_max_nesting_depth() -> usize {
    64
}

/// Deployment scope a template targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceScope {
    Tenant,
    ManagementGroup,
    Subscription,
    #[default]
    ResourceGroup,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFileKind {
    /// `.bicep`
    Template,
    /// `.bicepparam`
    Parameters,
    Test,
}

impl SourceFileKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "bicep" => Some(SourceFileKind::Template),
            "bicepparam" => Some(SourceFileKind::Parameters),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = FrontendConfig::from_toml_str("").expect("config");
        assert_eq!(config, FrontendConfig::default());
        assert_eq!(config.parser.max_nesting_depth, 64);
        assert_eq!(config.target_scope, ResourceScope::ResourceGroup);
        assert!(!config.features.extensibility_enabled);
    }

    #[test]
    fn reads_every_section() {
        let config = FrontendConfig::from_toml_str(
            r#"
target-scope = "managementGroup"

[features]
extensibility = true
microsoft-graph-preview = true

[parser]
max-nesting-depth = 16
"#,
        )
        .expect("config");
        assert_eq!(config.target_scope, ResourceScope::ManagementGroup);
        assert!(config.features.extensibility_enabled);
        assert!(config.features.microsoft_graph_preview_enabled);
        assert_eq!(config.parser.max_nesting_depth, 16);
    }

    #[test]
    fn rejects_unknown_scope() {
        let err = FrontendConfig::from_toml_str("target-scope = \"galaxy\"").expect_err("error");
        assert!(err.to_string().starts_with("failed to parse front-end configuration"));
    }

    #[test]
    fn file_kind_from_extension() {
        assert_eq!(SourceFileKind::from_extension("bicep"), Some(SourceFileKind::Template));
        assert_eq!(
            SourceFileKind::from_extension("bicepparam"),
            Some(SourceFileKind::Parameters)
        );
        assert_eq!(SourceFileKind::from_extension("json"), None);
    }
}
