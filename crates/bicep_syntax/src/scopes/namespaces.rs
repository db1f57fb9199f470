use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::{FeatureFlags, ResourceScope, SourceFileKind};

pub const SYS_NAMESPACE: &str = "sys";
pub const AZ_NAMESPACE: &str = "az";
pub const KUBERNETES_NAMESPACE: &str = "kubernetes";
pub const MICROSOFT_GRAPH_NAMESPACE: &str = "microsoftGraph";

/// Everything a provider needs to decide whether a namespace is available.
#[derive(Debug, Clone, Copy)]
pub struct NamespaceRequest<'a> {
    pub namespace: &'a str,
    pub alias: &'a str,
    pub target_scope: ResourceScope,
    pub features: &'a FeatureFlags,
    pub file_kind: SourceFileKind,
    pub version: Option<&'a str>,
}

pub trait NamespaceProvider {
    fn try_get_namespace(&self, request: &NamespaceRequest<'_>) -> Option<NamespaceType>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceType {
    pub name: String,
    pub alias: String,
    pub version: Option<String>,
    /// The declaration must carry a `with` clause before the namespace is usable.
    pub configuration_required: bool,
    pub is_preview: bool,
}

/// `<name>@<version>` as written in a provider string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSpecification {
    pub name: String,
    pub version: Option<String>,
}

fn specification_regex() -> &'static Regex {
    static SPECIFICATION: OnceLock<Regex> = OnceLock::new();
    SPECIFICATION.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z][A-Za-z0-9_]*)@(?P<version>[A-Za-z0-9][A-Za-z0-9._+\-]*)$")
            .expect("provider specification pattern compiles")
    })
}

pub fn parse_provider_specification(text: &str) -> Option<ProviderSpecification> {
    let captures = specification_regex().captures(text)?;
    Some(ProviderSpecification {
        name: captures["name"].to_string(),
        version: Some(captures["version"].to_string()),
    })
}

/// The namespaces that ship with the language.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltInNamespaceProvider;

impl NamespaceProvider for BuiltInNamespaceProvider {
    fn try_get_namespace(&self, request: &NamespaceRequest<'_>) -> Option<NamespaceType> {
        let namespace = |configuration_required: bool, is_preview: bool| NamespaceType {
            name: request.namespace.to_string(),
            alias: request.alias.to_string(),
            version: request.version.map(str::to_string),
            configuration_required,
            is_preview,
        };
        let resolved = match request.namespace {
            SYS_NAMESPACE => Some(namespace(false, false)),
            AZ_NAMESPACE if request.target_scope != ResourceScope::Local => {
                Some(namespace(false, false))
            }
            KUBERNETES_NAMESPACE => Some(namespace(true, false)),
            MICROSOFT_GRAPH_NAMESPACE if request.features.microsoft_graph_preview_enabled => {
                Some(namespace(false, true))
            }
            _ => None,
        };
        if resolved.is_none() {
            debug!(
                namespace = request.namespace,
                target_scope = ?request.target_scope,
                file_kind = ?request.file_kind,
                "no built-in namespace"
            );
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specification_pattern_compiles_and_anchors() {
        let regex = specification_regex();
        assert!(regex.is_match("az@1.0.0"));
        assert!(regex.is_match("kubernetes@1.0.0-preview+build.1"));
        assert!(!regex.is_match("az"));
        assert!(!regex.is_match(" az@1.0.0"));
        assert!(!regex.is_match("1az@1.0.0"));
        assert!(!regex.is_match("az@"));
    }
}
