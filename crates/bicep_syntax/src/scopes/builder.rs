use tracing::debug;

use super::namespaces::{
    parse_provider_specification, NamespaceProvider, NamespaceRequest, ProviderSpecification,
    MICROSOFT_GRAPH_NAMESPACE,
};
use super::{
    DeclaredSymbol, DeclaredType, LocalScope, LocalVariableKind, ScopeError, ScopeResolution,
    SymbolKind, MISSING_NAME,
};
use crate::config::{FeatureFlags, ResourceScope, SourceFileKind};
use crate::diagnostics::{Diagnostic, DiagnosticSource, NamespaceError};
use crate::syntax::{NodeId, NodeKind, SyntaxNode};

/// Walks `program` once and returns its frozen scope tree. The root scope is
/// bound to `program` and only sees top-level names.
///
/// User mistakes never produce an `Err`: they end up as error-typed symbols.
/// An `Err` means the traversal itself lost track of its scope stack.
pub fn build_scopes(
    program: &SyntaxNode,
    namespace_provider: &dyn NamespaceProvider,
    features: &FeatureFlags,
    target_scope: ResourceScope,
    file_kind: SourceFileKind,
) -> Result<LocalScope, ScopeError> {
    let mut builder = ScopeBuilder {
        namespace_provider,
        features,
        target_scope,
        file_kind,
        arena: Vec::new(),
        active: Vec::new(),
    };

    builder.push_scope(program.id, program.id, ScopeResolution::GlobalsOnly)?;
    builder.walk(program)?;
    builder.pop_scope()?;
    if !builder.active.is_empty() {
        return Err(ScopeError::UnbalancedScopes);
    }

    let scope_count = builder.arena.len();
    let symbol_count: usize = builder.arena.iter().map(|scope| scope.locals.len()).sum();
    let root = builder.freeze(0);
    debug!(scope_count, symbol_count, ?file_kind, "built scopes");
    Ok(root)
}

/// A scope that is still being filled. Children are arena indices.
struct ScopeInfo {
    declaring_syntax: NodeId,
    binding_syntax: NodeId,
    resolution: ScopeResolution,
    locals: Vec<DeclaredSymbol>,
    children: Vec<usize>,
}

struct ScopeBuilder<'a> {
    namespace_provider: &'a dyn NamespaceProvider,
    features: &'a FeatureFlags,
    target_scope: ResourceScope,
    file_kind: SourceFileKind,
    arena: Vec<ScopeInfo>,
    active: Vec<usize>,
}

/// Pending work on the walk stack.
enum Step<'n> {
    Visit(&'n SyntaxNode),
    Declare {
        declaration: &'n SyntaxNode,
        name: &'n SyntaxNode,
        kind: SymbolKind,
    },
    DeclareProvider {
        declaration: &'n SyntaxNode,
        specification: &'n SyntaxNode,
        as_clause: Option<&'n SyntaxNode>,
    },
    DeclareImports {
        declaration: &'n SyntaxNode,
        import_expression: &'n SyntaxNode,
        from_clause: &'n SyntaxNode,
    },
    PopScope,
}

impl ScopeBuilder<'_> {
    fn push_scope(
        &mut self,
        declaring_syntax: NodeId,
        binding_syntax: NodeId,
        resolution: ScopeResolution,
    ) -> Result<(), ScopeError> {
        if self
            .active
            .iter()
            .any(|&open| self.arena[open].binding_syntax == binding_syntax)
        {
            return Err(ScopeError::DuplicateBinding(binding_syntax));
        }

        let parent = self.active.last().copied();
        let index = self.arena.len();
        self.arena.push(ScopeInfo {
            declaring_syntax,
            binding_syntax,
            resolution,
            locals: Vec::new(),
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.arena[parent].children.push(index);
        }
        self.active.push(index);
        Ok(())
    }

    fn pop_scope(&mut self) -> Result<(), ScopeError> {
        self.active
            .pop()
            .map(|_| ())
            .ok_or(ScopeError::UnbalancedScopes)
    }

    fn declare(&mut self, symbol: DeclaredSymbol) -> Result<(), ScopeError> {
        let current = *self.active.last().ok_or(ScopeError::NoActiveScope)?;
        self.arena[current].locals.push(symbol);
        Ok(())
    }

    fn declare_named(
        &mut self,
        declaration: &SyntaxNode,
        name: &SyntaxNode,
        kind: SymbolKind,
    ) -> Result<(), ScopeError> {
        self.declare(DeclaredSymbol {
            name: identifier_or_missing(name),
            kind,
            declaring_syntax: declaration.id,
            name_span: name.span,
        })
    }

    fn freeze(&mut self, index: usize) -> LocalScope {
        let locals = std::mem::take(&mut self.arena[index].locals);
        let child_indices = std::mem::take(&mut self.arena[index].children);
        let children = child_indices
            .into_iter()
            .map(|child| self.freeze(child))
            .collect();
        let info = &self.arena[index];
        LocalScope::new(
            String::new(),
            info.declaring_syntax,
            info.binding_syntax,
            locals.into_iter().collect(),
            children,
            info.resolution,
        )
    }

    /// Depth-first walk over `root`'s descendants. Closing work (popping a
    /// scope, declaring the construct's own symbol) is queued beneath the
    /// children so it runs once they are done.
    fn walk<'n>(&mut self, root: &'n SyntaxNode) -> Result<(), ScopeError> {
        let mut steps: Vec<Step<'n>> =
            root.children().into_iter().rev().map(Step::Visit).collect();
        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(node) => {
                    self.visit(node, &mut steps)?;
                    steps.extend(node.children().into_iter().rev().map(Step::Visit));
                }
                Step::Declare {
                    declaration,
                    name,
                    kind,
                } => self.declare_named(declaration, name, kind)?,
                Step::DeclareProvider {
                    declaration,
                    specification,
                    as_clause,
                } => self.declare_provider(declaration, specification, as_clause)?,
                Step::DeclareImports {
                    declaration,
                    import_expression,
                    from_clause,
                } => self.declare_imports(declaration, import_expression, from_clause)?,
                Step::PopScope => self.pop_scope()?,
            }
        }
        Ok(())
    }

    fn visit<'n>(&mut self, node: &'n SyntaxNode, steps: &mut Vec<Step<'n>>) -> Result<(), ScopeError> {
        let declare = |name: &'n SyntaxNode, kind: SymbolKind| Step::Declare {
            declaration: node,
            name,
            kind,
        };
        match &node.kind {
            NodeKind::MetadataDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::Metadata))
            }
            NodeKind::ParameterDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::Parameter))
            }
            NodeKind::VariableDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::Variable))
            }
            NodeKind::TypeDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::TypeAlias))
            }
            NodeKind::FunctionDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::DeclaredFunction))
            }
            NodeKind::ResourceDeclaration {
                name,
                ty,
                existing,
                value,
                ..
            } => {
                self.push_scope(node.id, body_binding(value), ScopeResolution::InheritParent)?;
                let kind = SymbolKind::Resource {
                    resource_type: string_value(ty),
                    existing: existing.is_some(),
                };
                steps.push(declare(name.as_ref(), kind));
                steps.push(Step::PopScope);
            }
            NodeKind::ModuleDeclaration { name, value, .. } => {
                self.push_scope(node.id, body_binding(value), ScopeResolution::InheritParent)?;
                steps.push(declare(name.as_ref(), SymbolKind::Module));
                steps.push(Step::PopScope);
            }
            NodeKind::TestDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::Test))
            }
            NodeKind::OutputDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::Output))
            }
            NodeKind::AssertDeclaration { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::Assert))
            }
            NodeKind::ParameterAssignment { name, .. } => {
                steps.push(declare(name.as_ref(), SymbolKind::ParameterAssignment))
            }
            NodeKind::ProviderDeclaration {
                specification,
                as_clause,
                ..
            } => steps.push(Step::DeclareProvider {
                declaration: node,
                specification,
                as_clause: as_clause.as_deref(),
            }),
            NodeKind::CompileTimeImportDeclaration {
                import_expression,
                from_clause,
                ..
            } => steps.push(Step::DeclareImports {
                declaration: node,
                import_expression,
                from_clause,
            }),
            NodeKind::Lambda {
                variable_section,
                body,
                ..
            } => {
                self.push_scope(node.id, body.id, ScopeResolution::InheritParent)?;
                for (_, variable) in local_variables(variable_section) {
                    self.declare_local(variable, LocalVariableKind::LambdaItem, None)?;
                }
                steps.push(Step::PopScope);
            }
            NodeKind::TypedLambda {
                variable_section,
                body,
                ..
            } => {
                self.push_scope(node.id, body.id, ScopeResolution::GlobalsOnly)?;
                for parameter in variable_section.children() {
                    if let NodeKind::TypedLocalVariable { ty, .. } = &parameter.kind {
                        let declared_type = ty.to_source_text().trim().to_string();
                        self.declare_local(parameter, LocalVariableKind::LambdaItem, Some(declared_type))?;
                    }
                }
                steps.push(Step::PopScope);
            }
            NodeKind::ForExpression {
                variable_section,
                body,
                ..
            } => {
                self.push_scope(node.id, body.id, ScopeResolution::InheritParent)?;
                for (position, variable) in local_variables(variable_section) {
                    let kind = if position == 0 {
                        LocalVariableKind::ForItem
                    } else {
                        LocalVariableKind::ForIndex
                    };
                    self.declare_local(variable, kind, None)?;
                }
                steps.push(Step::PopScope);
            }
            NodeKind::Token(_)
            | NodeKind::SkippedTrivia { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::Program { .. }
            | NodeKind::Decorator { .. }
            | NodeKind::MissingDeclaration { .. }
            | NodeKind::TargetScopeDeclaration { .. }
            | NodeKind::ParameterDefaultValue { .. }
            | NodeKind::ProviderWithClause { .. }
            | NodeKind::AliasAsClause { .. }
            | NodeKind::ImportedSymbolsList { .. }
            | NodeKind::ImportedSymbolsListItem { .. }
            | NodeKind::WildcardImport { .. }
            | NodeKind::CompileTimeImportFromClause { .. }
            | NodeKind::UsingDeclaration { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::NullLiteral { .. }
            | NodeKind::IntegerLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::Array { .. }
            | NodeKind::ArrayItem { .. }
            | NodeKind::Object { .. }
            | NodeKind::ObjectProperty { .. }
            | NodeKind::Parenthesized { .. }
            | NodeKind::UnaryOperation { .. }
            | NodeKind::BinaryOperation { .. }
            | NodeKind::TernaryOperation { .. }
            | NodeKind::FunctionCall { .. }
            | NodeKind::FunctionArgument { .. }
            | NodeKind::InstanceFunctionCall { .. }
            | NodeKind::PropertyAccess { .. }
            | NodeKind::ArrayAccess { .. }
            | NodeKind::ResourceAccess { .. }
            | NodeKind::NonNullAssertion { .. }
            | NodeKind::VariableAccess { .. }
            | NodeKind::LocalVariable { .. }
            | NodeKind::VariableBlock { .. }
            | NodeKind::TypedVariableBlock { .. }
            | NodeKind::TypedLocalVariable { .. }
            | NodeKind::IfCondition { .. }
            | NodeKind::ResourceType { .. }
            | NodeKind::ObjectType { .. }
            | NodeKind::ObjectTypeProperty { .. }
            | NodeKind::ObjectTypeAdditionalProperties { .. }
            | NodeKind::TupleType { .. }
            | NodeKind::TupleTypeItem { .. }
            | NodeKind::UnionType { .. }
            | NodeKind::UnionTypeMember { .. }
            | NodeKind::NullableType { .. }
            | NodeKind::ArrayType { .. }
            | NodeKind::ArrayTypeMember { .. } => {}
        }
        Ok(())
    }

    fn declare_local(
        &mut self,
        variable: &SyntaxNode,
        kind: LocalVariableKind,
        declared_type: Option<String>,
    ) -> Result<(), ScopeError> {
        let name = match &variable.kind {
            NodeKind::LocalVariable { name } | NodeKind::TypedLocalVariable { name, .. } => name,
            _ => return Ok(()),
        };
        self.declare_named(variable, name, SymbolKind::LocalVariable { kind, declared_type })
    }

    fn declare_provider(
        &mut self,
        declaration: &SyntaxNode,
        specification: &SyntaxNode,
        as_clause: Option<&SyntaxNode>,
    ) -> Result<(), ScopeError> {
        let alias = as_clause.and_then(|clause| match &clause.kind {
            NodeKind::AliasAsClause { alias, .. } => Some(alias.as_ref()),
            _ => None,
        });
        let parsed = read_specification(specification);
        let spec_name = parsed.as_ref().ok().map(|spec| spec.name.as_str());

        let (name, name_span) = match (alias, spec_name) {
            (Some(alias), _) => (identifier_or_missing(alias), alias.span),
            (None, Some(spec_name)) => (spec_name.to_string(), specification.span),
            (None, None) => (MISSING_NAME.to_string(), specification.span),
        };

        let declared_type = if !self.features.extensibility_enabled {
            DeclaredType::Error(NamespaceError::ImportsAreDisabled.at(declaration.span))
        } else {
            match parsed {
                Err(Some(diagnostic)) => DeclaredType::Error(diagnostic),
                Err(None) => DeclaredType::ErrorEmpty,
                Ok(spec) => self.resolve_namespace(declaration, &spec, &name),
            }
        };
        if let DeclaredType::Error(diagnostic) = &declared_type {
            debug!(provider = %name, code = %diagnostic.code, "provider namespace did not resolve");
        }

        self.declare(DeclaredSymbol {
            name,
            kind: SymbolKind::ProviderNamespace { declared_type },
            declaring_syntax: declaration.id,
            name_span,
        })
    }

    fn resolve_namespace(
        &self,
        declaration: &SyntaxNode,
        spec: &ProviderSpecification,
        alias: &str,
    ) -> DeclaredType {
        let unrecognized = || {
            DeclaredType::Error(
                NamespaceError::UnrecognizedProvider(spec.name.clone()).at(declaration.span),
            )
        };
        if spec.name == MICROSOFT_GRAPH_NAMESPACE && !self.features.microsoft_graph_preview_enabled {
            return unrecognized();
        }
        let request = NamespaceRequest {
            namespace: &spec.name,
            alias,
            target_scope: self.target_scope,
            features: self.features,
            file_kind: self.file_kind,
            version: spec.version.as_deref(),
        };
        match self.namespace_provider.try_get_namespace(&request) {
            Some(namespace) => DeclaredType::Namespace(namespace),
            None => unrecognized(),
        }
    }

    fn declare_imports(
        &mut self,
        declaration: &SyntaxNode,
        import_expression: &SyntaxNode,
        from_clause: &SyntaxNode,
    ) -> Result<(), ScopeError> {
        let source_path = match &from_clause.kind {
            NodeKind::CompileTimeImportFromClause { path, .. } => string_value(path),
            _ => None,
        };

        match &import_expression.kind {
            NodeKind::ImportedSymbolsList { children, .. } => {
                for item in children {
                    let NodeKind::ImportedSymbolsListItem {
                        original_name,
                        as_clause,
                    } = &item.kind
                    else {
                        continue;
                    };
                    let original = original_name
                        .identifier_text()
                        .map(str::to_string)
                        .or_else(|| string_value(original_name))
                        .unwrap_or_else(|| MISSING_NAME.to_string());
                    let alias = as_clause.as_deref().and_then(alias_of);
                    let (name, name_span) = match alias {
                        Some(alias) => (identifier_or_missing(alias), alias.span),
                        None => (original.clone(), original_name.span),
                    };
                    self.declare(DeclaredSymbol {
                        name,
                        kind: SymbolKind::ImportedType {
                            original_name: original,
                            source_path: source_path.clone(),
                        },
                        declaring_syntax: item.id,
                        name_span,
                    })?;
                }
                Ok(())
            }
            NodeKind::WildcardImport { as_clause, .. } => {
                let (name, name_span) = match alias_of(as_clause) {
                    Some(alias) => (identifier_or_missing(alias), alias.span),
                    None => (MISSING_NAME.to_string(), as_clause.span),
                };
                self.declare(DeclaredSymbol {
                    name,
                    kind: SymbolKind::WildcardImport { source_path },
                    declaring_syntax: declaration.id,
                    name_span,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Resource and module scopes attach to the body, looking through `if`.
fn body_binding(value: &SyntaxNode) -> NodeId {
    match &value.kind {
        NodeKind::IfCondition { body, .. } => body.id,
        _ => value.id,
    }
}

fn identifier_or_missing(name: &SyntaxNode) -> String {
    name.identifier_text().unwrap_or(MISSING_NAME).to_string()
}

fn alias_of(as_clause: &SyntaxNode) -> Option<&SyntaxNode> {
    match &as_clause.kind {
        NodeKind::AliasAsClause { alias, .. } => Some(alias.as_ref()),
        _ => None,
    }
}

/// Value of a string literal without interpolation.
fn string_value(node: &SyntaxNode) -> Option<String> {
    match &node.kind {
        NodeKind::StringLiteral { segment_values, .. } if segment_values.len() == 1 => {
            segment_values.first().cloned()
        }
        _ => None,
    }
}

/// `LocalVariable` nodes of a lambda or loop variable section with their
/// position. A malformed section yields nothing.
fn local_variables(section: &SyntaxNode) -> Vec<(usize, &SyntaxNode)> {
    match &section.kind {
        NodeKind::LocalVariable { .. } => vec![(0, section)],
        NodeKind::VariableBlock { children, .. } => children
            .iter()
            .filter(|child| !matches!(child.kind, NodeKind::Token(_)))
            .enumerate()
            .filter(|(_, child)| matches!(child.kind, NodeKind::LocalVariable { .. }))
            .collect(),
        _ => Vec::new(),
    }
}

/// `Err(None)` when the parser already reported the problem.
fn read_specification(specification: &SyntaxNode) -> Result<ProviderSpecification, Option<Diagnostic>> {
    match &specification.kind {
        NodeKind::Identifier { .. } => Ok(ProviderSpecification {
            name: identifier_or_missing(specification),
            version: None,
        }),
        NodeKind::StringLiteral { segment_values, .. } if segment_values.len() > 1 => Err(Some(
            NamespaceError::SpecificationInterpolationUnsupported.at(specification.span),
        )),
        NodeKind::StringLiteral { .. } => string_value(specification)
            .and_then(|text| parse_provider_specification(&text))
            .ok_or_else(|| Some(NamespaceError::InvalidSpecification.at(specification.span))),
        _ => Err(None),
    }
}
