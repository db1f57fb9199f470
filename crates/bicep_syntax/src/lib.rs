pub mod config;
pub mod diagnostics;
pub mod keywords;
pub mod lexer;
pub mod parser;
pub mod scopes;
pub mod span;
pub mod syntax;
pub mod token;

use serde::Serialize;

pub use config::{
    ConfigError, FeatureFlags, FrontendConfig, ParserOptions, ResourceScope, SourceFileKind,
};
pub use diagnostics::{render_diagnostics, Diagnostic, DiagnosticSeverity, DiagnosticTree};
pub use lexer::lex;
pub use parser::{parse, parse_file, parse_params, parse_with_options, ParsedProgram};
pub use scopes::{build_scopes, BuiltInNamespaceProvider, LocalScope, NamespaceProvider, ScopeError};
pub use span::TextSpan;
pub use syntax::{NodeId, NodeKind, SyntaxNode};

/// A parsed file together with its scope tree.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedFile {
    pub file_kind: SourceFileKind,
    pub parsed: ParsedProgram,
    pub scope: LocalScope,
}

/// Parses `text` and builds its scopes with the built-in namespaces.
pub fn analyze(
    text: &str,
    file_kind: SourceFileKind,
    config: &FrontendConfig,
) -> Result<AnalyzedFile, ScopeError> {
    analyze_with_provider(text, file_kind, config, &BuiltInNamespaceProvider)
}

pub fn analyze_with_provider(
    text: &str,
    file_kind: SourceFileKind,
    config: &FrontendConfig,
    namespace_provider: &dyn NamespaceProvider,
) -> Result<AnalyzedFile, ScopeError> {
    let parsed = parse_file(text, file_kind, &config.parser);
    let scope = build_scopes(
        &parsed.program,
        namespace_provider,
        &config.features,
        config.target_scope,
        file_kind,
    )?;
    Ok(AnalyzedFile {
        file_kind,
        parsed,
        scope,
    })
}
