//! Lexical scopes and the symbols they declare.
//!
//! The tree is produced once per file by [`build_scopes`] and is immutable
//! afterwards: there are no methods that add scopes or symbols.

use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::span::TextSpan;
use crate::syntax::NodeId;

mod builder;
mod namespaces;

pub use builder::build_scopes;
pub use namespaces::{
    parse_provider_specification, BuiltInNamespaceProvider, NamespaceProvider, NamespaceRequest,
    NamespaceType, ProviderSpecification,
};

/// Name given to symbols whose declaration has no usable identifier.
pub const MISSING_NAME: &str = "<missing>";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("attempted to redefine the scope bound to node {0:?}")]
    DuplicateBinding(NodeId),
    #[error("declared a symbol with no active scope")]
    NoActiveScope,
    #[error("popped a scope that was never pushed")]
    UnbalancedScopes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeResolution {
    /// Names not found here are looked up in the enclosing scope.
    InheritParent,
    /// Only this scope and the file's top-level symbols are visible.
    GlobalsOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalScope {
    name: String,
    declaring_syntax: NodeId,
    binding_syntax: NodeId,
    locals: im::Vector<DeclaredSymbol>,
    children: im::Vector<LocalScope>,
    resolution: ScopeResolution,
}

impl LocalScope {
    pub(crate) fn new(
        name: String,
        declaring_syntax: NodeId,
        binding_syntax: NodeId,
        locals: im::Vector<DeclaredSymbol>,
        children: im::Vector<LocalScope>,
        resolution: ScopeResolution,
    ) -> Self {
        Self {
            name,
            declaring_syntax,
            binding_syntax,
            locals,
            children,
            resolution,
        }
    }

    /// Empty for every scope except named ones; all scopes built today are anonymous.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_syntax(&self) -> NodeId {
        self.declaring_syntax
    }

    pub fn binding_syntax(&self) -> NodeId {
        self.binding_syntax
    }

    pub fn resolution(&self) -> ScopeResolution {
        self.resolution
    }

    pub fn locals(&self) -> &im::Vector<DeclaredSymbol> {
        &self.locals
    }

    pub fn children(&self) -> &im::Vector<LocalScope> {
        &self.children
    }

    /// This scope and every nested scope, pre-order.
    pub fn descendants(&self) -> Vec<&LocalScope> {
        let mut scopes = Vec::new();
        let mut stack = vec![self];
        while let Some(scope) = stack.pop() {
            scopes.push(scope);
            stack.extend(scope.children.iter().rev());
        }
        scopes
    }

    pub fn find_by_binding(&self, binding: NodeId) -> Option<&LocalScope> {
        self.descendants()
            .into_iter()
            .find(|scope| scope.binding_syntax == binding)
    }

    /// First symbol with this name declared directly in this scope.
    pub fn lookup_local(&self, name: &str) -> Option<&DeclaredSymbol> {
        self.locals.iter().find(|symbol| symbol.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub declaring_syntax: NodeId,
    pub name_span: TextSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocalVariableKind {
    ForItem,
    ForIndex,
    LambdaItem,
}

/// Declared type of a provider namespace symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DeclaredType {
    Namespace(NamespaceType),
    Error(Diagnostic),
    /// Error type whose cause was already reported by the parser.
    ErrorEmpty,
}

impl DeclaredType {
    pub fn is_error(&self) -> bool {
        !matches!(self, DeclaredType::Namespace(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SymbolKind {
    Parameter,
    Variable,
    TypeAlias,
    DeclaredFunction,
    Resource {
        resource_type: Option<String>,
        existing: bool,
    },
    Module,
    Test,
    Output,
    Assert,
    Metadata,
    ProviderNamespace {
        declared_type: DeclaredType,
    },
    ParameterAssignment,
    LocalVariable {
        kind: LocalVariableKind,
        /// Source text of the parameter type for typed lambdas.
        declared_type: Option<String>,
    },
    ImportedType {
        original_name: String,
        source_path: Option<String>,
    },
    WildcardImport {
        source_path: Option<String>,
    },
}

#[cfg(test)]
mod tests;
