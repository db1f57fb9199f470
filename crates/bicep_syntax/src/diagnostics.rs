use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::span::{LineIndex, TextSpan};
use crate::syntax::{NodeId, SyntaxNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticLabel {
    pub message: String,
    pub span: TextSpan,
}

/// Codes are grouped by origin: `E10xx` lexer, `E15xx` missing or unexpected
/// tokens, `E16xx` structural problems found after a successful sub-parse,
/// `E20xx` declaration/scope building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: TextSpan,
    pub labels: Vec<DiagnosticLabel>,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Something that can be reported at a span.
pub trait DiagnosticSource: std::fmt::Display {
    fn code(&self) -> &'static str;

    fn severity(&self) -> DiagnosticSeverity {
        DiagnosticSeverity::Error
    }

    fn at(&self, span: TextSpan) -> Diagnostic {
        Diagnostic {
            code: self.code().to_string(),
            severity: self.severity(),
            message: self.to_string(),
            span,
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("the string at this location is not terminated; terminate the string with a single quote character")]
    UnterminatedString,
    #[error("the multi-line string at this location is not terminated; terminate it with \"'''\"")]
    UnterminatedMultilineString,
    #[error("the multi-line comment at this location is not terminated; terminate it with the \"*/\" character sequence")]
    UnterminatedMultilineComment,
    #[error("the following token is not recognized: \"{0}\"")]
    UnrecognizedToken(String),
    #[error("the specified escape sequence \"{0}\" is not recognized; only \\\\, \\', \\n, \\r, \\t, \\$ and \\u{{...}} are permitted")]
    UnrecognizedEscapeSequence(String),
}

impl DiagnosticSource for LexError {
    fn code(&self) -> &'static str {
        match self {
            LexError::UnterminatedString => "E1001",
            LexError::UnterminatedMultilineString => "E1002",
            LexError::UnterminatedMultilineComment => "E1003",
            LexError::UnrecognizedToken(_) => "E1004",
            LexError::UnrecognizedEscapeSequence(_) => "E1005",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("expected the \"{0}\" character at this location")]
    ExpectedCharacter(&'static str),
    #[error("expected the \"{0}\" keyword at this location")]
    ExpectedKeyword(&'static str),
    #[error("expected a new line character at this location")]
    ExpectedNewLine,
    #[error("this declaration type is not recognized; specify a metadata, parameter, variable, type, function, resource, module, output, test, assert, import or provider declaration")]
    UnrecognizedDeclaration,
    #[error("this declaration type is not recognized; specify a parameter assignment, using, variable, type or import declaration")]
    UnrecognizedParamsDeclaration,
    #[error("expected a declaration after the decorator")]
    ExpectedDeclarationAfterDecorator,
    #[error("expected a {0} identifier at this location")]
    ExpectedIdentifier(&'static str),
    #[error("expected a default value assignment or a new line at this location")]
    ExpectedParameterContinuation,
    #[error("expected a {0} string at this location")]
    ExpectedString(&'static str),
    #[error("expected the \"{{\" character or the \"if\" keyword at this location")]
    ExpectedBodyStartOrIf,
    #[error("expected the \"{{\" character, the \"[\" character, or the \"if\" keyword at this location")]
    ExpectedBodyStartOrIfOrLoopStart,
    #[error("expected a loop item variable identifier or \"(\" at this location")]
    ExpectedLoopItemIdentifierOrVariableBlockStart,
    #[error("this expression is not recognized")]
    UnrecognizedExpression,
    #[error("this type expression is not recognized")]
    UnrecognizedTypeExpression,
    #[error("expected a valid type literal at this location")]
    ExpectedTypeLiteral,
    #[error("object and array literals are not permitted here")]
    ComplexLiteralsNotAllowed,
    #[error("expected a property name at this location")]
    ExpectedPropertyName,
    #[error("expected a property name or \"*\" at this location")]
    ExpectedPropertyNameOrMatcher,
    #[error("expected a function or property name at this location")]
    ExpectedFunctionOrPropertyName,
    #[error("expected a variable or function name at this location")]
    ExpectedVariableOrFunctionName,
    #[error("expected a namespace or decorator name at this location")]
    ExpectedNamespaceOrDecoratorName,
    #[error("expected a comma or a new line separator at this location")]
    ExpectedNewLineOrCommaSeparator,
    #[error("expected a comma separator at this location")]
    ExpectedCommaSeparator,
    #[error("unexpected new line after a comma separator; use either commas or new lines to separate items, not both")]
    UnexpectedNewLineAfterCommaSeparator,
    #[error("unexpected trailing comma in the argument list")]
    UnexpectedTrailingComma,
    #[error("unexpected tokens inside the string interpolation")]
    UnexpectedTokensInInterpolation,
    #[error("expected \"{{\" or \"*\" after the \"import\" keyword")]
    ExpectedImportExpression,
    #[error("expected a provider specification string or identifier at this location")]
    ExpectedProviderSpecification,
    #[error("maximum nesting depth of {0} exceeded")]
    NestingTooDeep(usize),
    #[error("expected loop variable block to consist of exactly 2 elements (item variable and index variable), but found {0}")]
    LoopVariableBlockArity(usize),
    #[error("parentheses must contain exactly one expression")]
    ParenthesesMustHaveExactlyOneItem,
    #[error("array indexers must contain an expression")]
    EmptyIndexerNotAllowed,
    #[error("the integer literal is too large")]
    InvalidInteger,
    #[error("the safe-access operator is not permitted on instance function calls")]
    SafeDereferenceNotPermittedOnInstanceFunctions,
    #[error("expected a local variable identifier at this location")]
    ExpectedLocalVariableIdentifier,
}

impl DiagnosticSource for SyntaxError {
    fn code(&self) -> &'static str {
        match self {
            SyntaxError::ExpectedCharacter(_) => "E1500",
            SyntaxError::ExpectedKeyword(_) => "E1501",
            SyntaxError::ExpectedNewLine => "E1502",
            SyntaxError::UnrecognizedDeclaration => "E1503",
            SyntaxError::UnrecognizedParamsDeclaration => "E1504",
            SyntaxError::ExpectedDeclarationAfterDecorator => "E1505",
            SyntaxError::ExpectedIdentifier(_) => "E1506",
            SyntaxError::ExpectedParameterContinuation => "E1507",
            SyntaxError::ExpectedString(_) => "E1508",
            SyntaxError::ExpectedBodyStartOrIf => "E1509",
            SyntaxError::ExpectedBodyStartOrIfOrLoopStart => "E1510",
            SyntaxError::ExpectedLoopItemIdentifierOrVariableBlockStart => "E1511",
            SyntaxError::UnrecognizedExpression => "E1512",
            SyntaxError::UnrecognizedTypeExpression => "E1513",
            SyntaxError::ExpectedTypeLiteral => "E1514",
            SyntaxError::ComplexLiteralsNotAllowed => "E1515",
            SyntaxError::ExpectedPropertyName => "E1516",
            SyntaxError::ExpectedPropertyNameOrMatcher => "E1517",
            SyntaxError::ExpectedFunctionOrPropertyName => "E1518",
            SyntaxError::ExpectedVariableOrFunctionName => "E1519",
            SyntaxError::ExpectedNamespaceOrDecoratorName => "E1520",
            SyntaxError::ExpectedNewLineOrCommaSeparator => "E1521",
            SyntaxError::ExpectedCommaSeparator => "E1522",
            SyntaxError::UnexpectedNewLineAfterCommaSeparator => "E1523",
            SyntaxError::UnexpectedTrailingComma => "E1524",
            SyntaxError::UnexpectedTokensInInterpolation => "E1525",
            SyntaxError::ExpectedImportExpression => "E1526",
            SyntaxError::ExpectedProviderSpecification => "E1527",
            SyntaxError::NestingTooDeep(_) => "E1528",
            SyntaxError::LoopVariableBlockArity(_) => "E1600",
            SyntaxError::ParenthesesMustHaveExactlyOneItem => "E1601",
            SyntaxError::EmptyIndexerNotAllowed => "E1602",
            SyntaxError::InvalidInteger => "E1603",
            SyntaxError::SafeDereferenceNotPermittedOnInstanceFunctions => "E1604",
            SyntaxError::ExpectedLocalVariableIdentifier => "E1605",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    #[error("provider declarations require the \"extensibility\" feature to be enabled")]
    ImportsAreDisabled,
    #[error("string interpolation is not supported in provider specifications")]
    SpecificationInterpolationUnsupported,
    #[error("the provider specification is not valid; expected \"<name>@<version>\"")]
    InvalidSpecification,
    #[error("the provider namespace \"{0}\" is not recognized")]
    UnrecognizedProvider(String),
}

impl DiagnosticSource for NamespaceError {
    fn code(&self) -> &'static str {
        match self {
            NamespaceError::ImportsAreDisabled => "E2001",
            NamespaceError::SpecificationInterpolationUnsupported => "E2002",
            NamespaceError::InvalidSpecification => "E2003",
            NamespaceError::UnrecognizedProvider(_) => "E2004",
        }
    }
}

/// Diagnostics ordered by position and indexed by the node that carries them,
/// so "does this node have a diagnostic" never needs a tree walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticTree {
    diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    by_node: FxHashMap<NodeId, Vec<usize>>,
}

impl DiagnosticTree {
    pub fn new(entries: Vec<(Option<NodeId>, Diagnostic)>) -> Self {
        let mut entries = entries;
        entries.sort_by_key(|(_, diagnostic)| diagnostic.span.start);
        let mut diagnostics = Vec::with_capacity(entries.len());
        let mut by_node: FxHashMap<NodeId, Vec<usize>> = FxHashMap::default();
        for (index, (node, diagnostic)) in entries.into_iter().enumerate() {
            if let Some(node) = node {
                by_node.entry(node).or_default().push(index);
            }
            diagnostics.push(diagnostic);
        }
        Self {
            diagnostics,
            by_node,
        }
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics attached directly to the node with this id.
    pub fn for_node(&self, id: NodeId) -> impl Iterator<Item = &Diagnostic> {
        self.by_node
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&index| &self.diagnostics[index])
    }

    /// Diagnostics whose span lies inside `span`.
    pub fn within(&self, span: TextSpan) -> impl Iterator<Item = &Diagnostic> {
        let first = self
            .diagnostics
            .partition_point(|diagnostic| diagnostic.span.start < span.start);
        self.diagnostics[first..]
            .iter()
            .take_while(move |diagnostic| diagnostic.span.start <= span.end())
            .filter(move |diagnostic| span.contains_span(diagnostic.span))
    }

    pub fn contains_node(&self, node: &SyntaxNode) -> bool {
        self.by_node.contains_key(&node.id) || self.within(node.span).next().is_some()
    }
}

impl<'a> IntoIterator for &'a DiagnosticTree {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}

pub fn render_diagnostics(path: &str, text: &str, diagnostics: &[Diagnostic]) -> String {
    let index = LineIndex::new(text);
    let mut output = String::new();
    for (position, diagnostic) in diagnostics.iter().enumerate() {
        if position > 0 {
            output.push('\n');
        }
        output.push_str(&render_diagnostic(path, &index, diagnostic));
    }
    output
}

fn render_diagnostic(path: &str, index: &LineIndex, diagnostic: &Diagnostic) -> String {
    let mut output = String::new();
    let start = index.position(diagnostic.span.start);
    let severity = match diagnostic.severity {
        DiagnosticSeverity::Error => "error",
        DiagnosticSeverity::Warning => "warning",
    };
    output.push_str(&format!(
        "{severity}[{}] {}:{}:{} {}\n",
        diagnostic.code, path, start.line, start.column, diagnostic.message
    ));
    for label in &diagnostic.labels {
        let pos = index.position(label.span.start);
        output.push_str(&format!(
            "  note: {} at {}:{}:{}\n",
            label.message, path, pos.line, pos.column
        ));
    }
    output.trim_end().to_string()
}
