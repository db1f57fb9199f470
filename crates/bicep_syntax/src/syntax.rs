use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::span::TextSpan;
use crate::token::Token;

/// Identity of a node within one parse. Ids are unique per tree, not across trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxNode {
    pub id: NodeId,
    pub span: TextSpan,
    pub kind: NodeKind,
}

/// Every variant keeps its tokens and child nodes in source order; list-like
/// variants keep separators (commas, newlines, skipped placeholders) in
/// `children`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    Token(Token),
    SkippedTrivia {
        elements: Vec<SyntaxNode>,
        diagnostic: Option<Diagnostic>,
    },
    Identifier {
        child: Box<SyntaxNode>,
    },
    Program {
        children: Vec<SyntaxNode>,
        end_of_file: Box<SyntaxNode>,
    },
    Decorator {
        at: Box<SyntaxNode>,
        expression: Box<SyntaxNode>,
    },
    MissingDeclaration {
        leading_nodes: Vec<SyntaxNode>,
    },
    MetadataDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    TargetScopeDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    ParameterDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        ty: Box<SyntaxNode>,
        modifier: Option<Box<SyntaxNode>>,
    },
    ParameterDefaultValue {
        assignment: Box<SyntaxNode>,
        default_value: Box<SyntaxNode>,
    },
    VariableDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    TypeDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    FunctionDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        lambda: Box<SyntaxNode>,
    },
    ResourceDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        ty: Box<SyntaxNode>,
        existing: Option<Box<SyntaxNode>>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    ModuleDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        path: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    TestDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        path: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    OutputDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        ty: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    AssertDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    ProviderDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        specification: Box<SyntaxNode>,
        with_clause: Option<Box<SyntaxNode>>,
        as_clause: Option<Box<SyntaxNode>>,
    },
    ProviderWithClause {
        keyword: Box<SyntaxNode>,
        config: Box<SyntaxNode>,
    },
    AliasAsClause {
        keyword: Box<SyntaxNode>,
        alias: Box<SyntaxNode>,
    },
    CompileTimeImportDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        import_expression: Box<SyntaxNode>,
        from_clause: Box<SyntaxNode>,
    },
    ImportedSymbolsList {
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    ImportedSymbolsListItem {
        original_name: Box<SyntaxNode>,
        as_clause: Option<Box<SyntaxNode>>,
    },
    WildcardImport {
        wildcard: Box<SyntaxNode>,
        as_clause: Box<SyntaxNode>,
    },
    CompileTimeImportFromClause {
        keyword: Box<SyntaxNode>,
        path: Box<SyntaxNode>,
    },
    UsingDeclaration {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        path: Box<SyntaxNode>,
    },
    ParameterAssignment {
        leading_nodes: Vec<SyntaxNode>,
        keyword: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        assignment: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    BooleanLiteral {
        token: Box<SyntaxNode>,
        value: bool,
    },
    NullLiteral {
        token: Box<SyntaxNode>,
    },
    IntegerLiteral {
        token: Box<SyntaxNode>,
        value: u64,
    },
    /// Plain, interpolated or multi-line string. `parts` alternates string
    /// piece tokens and hole expressions.
    StringLiteral {
        parts: Vec<SyntaxNode>,
        segment_values: Vec<String>,
    },
    Array {
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    ArrayItem {
        value: Box<SyntaxNode>,
    },
    Object {
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    ObjectProperty {
        key: Box<SyntaxNode>,
        colon: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    Parenthesized {
        open: Box<SyntaxNode>,
        expression: Box<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    UnaryOperation {
        operator: Box<SyntaxNode>,
        expression: Box<SyntaxNode>,
    },
    BinaryOperation {
        left: Box<SyntaxNode>,
        operator: Box<SyntaxNode>,
        right: Box<SyntaxNode>,
    },
    TernaryOperation {
        condition: Box<SyntaxNode>,
        newlines_before_question: Vec<SyntaxNode>,
        question: Box<SyntaxNode>,
        true_expression: Box<SyntaxNode>,
        newlines_before_colon: Vec<SyntaxNode>,
        colon: Box<SyntaxNode>,
        false_expression: Box<SyntaxNode>,
    },
    FunctionCall {
        name: Box<SyntaxNode>,
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    FunctionArgument {
        expression: Box<SyntaxNode>,
    },
    InstanceFunctionCall {
        base: Box<SyntaxNode>,
        dot: Box<SyntaxNode>,
        name: Box<SyntaxNode>,
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    PropertyAccess {
        base: Box<SyntaxNode>,
        dot: Box<SyntaxNode>,
        safe_access: Option<Box<SyntaxNode>>,
        property: Box<SyntaxNode>,
    },
    ArrayAccess {
        base: Box<SyntaxNode>,
        open: Box<SyntaxNode>,
        safe_access: Option<Box<SyntaxNode>>,
        index: Box<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    ResourceAccess {
        base: Box<SyntaxNode>,
        double_colon: Box<SyntaxNode>,
        resource_name: Box<SyntaxNode>,
    },
    NonNullAssertion {
        base: Box<SyntaxNode>,
        bang: Box<SyntaxNode>,
    },
    VariableAccess {
        name: Box<SyntaxNode>,
    },
    Lambda {
        variable_section: Box<SyntaxNode>,
        arrow: Box<SyntaxNode>,
        newlines_before_body: Vec<SyntaxNode>,
        body: Box<SyntaxNode>,
    },
    LocalVariable {
        name: Box<SyntaxNode>,
    },
    VariableBlock {
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    TypedLambda {
        variable_section: Box<SyntaxNode>,
        return_type: Box<SyntaxNode>,
        arrow: Box<SyntaxNode>,
        newlines_before_body: Vec<SyntaxNode>,
        body: Box<SyntaxNode>,
    },
    TypedVariableBlock {
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    TypedLocalVariable {
        name: Box<SyntaxNode>,
        ty: Box<SyntaxNode>,
    },
    ForExpression {
        open: Box<SyntaxNode>,
        open_newlines: Vec<SyntaxNode>,
        for_keyword: Box<SyntaxNode>,
        variable_section: Box<SyntaxNode>,
        in_keyword: Box<SyntaxNode>,
        expression: Box<SyntaxNode>,
        colon: Box<SyntaxNode>,
        body: Box<SyntaxNode>,
        close_newlines: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    IfCondition {
        keyword: Box<SyntaxNode>,
        condition: Box<SyntaxNode>,
        body: Box<SyntaxNode>,
    },
    ResourceType {
        keyword: Box<SyntaxNode>,
        ty: Option<Box<SyntaxNode>>,
    },
    ObjectType {
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    ObjectTypeProperty {
        leading_nodes: Vec<SyntaxNode>,
        key: Box<SyntaxNode>,
        colon: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    ObjectTypeAdditionalProperties {
        leading_nodes: Vec<SyntaxNode>,
        asterisk: Box<SyntaxNode>,
        colon: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    TupleType {
        open: Box<SyntaxNode>,
        children: Vec<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    TupleTypeItem {
        leading_nodes: Vec<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    UnionType {
        children: Vec<SyntaxNode>,
    },
    UnionTypeMember {
        value: Box<SyntaxNode>,
    },
    NullableType {
        base: Box<SyntaxNode>,
        question: Box<SyntaxNode>,
    },
    ArrayType {
        item: Box<SyntaxNode>,
        open: Box<SyntaxNode>,
        close: Box<SyntaxNode>,
    },
    ArrayTypeMember {
        value: Box<SyntaxNode>,
    },
}

macro_rules! push_nodes {
    ($out:ident; $($node:expr),* $(,)?) => {{
        $( $out.push(&**$node); )*
    }};
}

macro_rules! push_nodes_mut {
    ($out:ident; $($node:expr),* $(,)?) => {{
        $( $out.push(&mut **$node); )*
    }};
}

macro_rules! push_optional {
    ($out:ident; $node:expr) => {
        $out.extend($node.as_deref())
    };
}

macro_rules! push_optional_mut {
    ($out:ident; $node:expr) => {
        $out.extend($node.as_deref_mut())
    };
}

/// One match over every variant, shared by the shared and mutable child walks.
macro_rules! collect_children {
    ($kind:expr, $out:ident, $push:ident, $optional:ident) => {
        match $kind {
            NodeKind::Token(_) => {}
            NodeKind::SkippedTrivia { elements, .. } => $out.extend(elements),
            NodeKind::Identifier { child } => $push!($out; child),
            NodeKind::Program {
                children,
                end_of_file,
            } => {
                $out.extend(children);
                $push!($out; end_of_file);
            }
            NodeKind::Decorator { at, expression } => $push!($out; at, expression),
            NodeKind::MissingDeclaration { leading_nodes } => $out.extend(leading_nodes),
            NodeKind::MetadataDeclaration {
                leading_nodes,
                keyword,
                name,
                assignment,
                value,
            }
            | NodeKind::VariableDeclaration {
                leading_nodes,
                keyword,
                name,
                assignment,
                value,
            }
            | NodeKind::TypeDeclaration {
                leading_nodes,
                keyword,
                name,
                assignment,
                value,
            }
            | NodeKind::AssertDeclaration {
                leading_nodes,
                keyword,
                name,
                assignment,
                value,
            }
            | NodeKind::ParameterAssignment {
                leading_nodes,
                keyword,
                name,
                assignment,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, name, assignment, value);
            }
            NodeKind::TargetScopeDeclaration {
                leading_nodes,
                keyword,
                assignment,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, assignment, value);
            }
            NodeKind::ParameterDeclaration {
                leading_nodes,
                keyword,
                name,
                ty,
                modifier,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, name, ty);
                $optional!($out; modifier);
            }
            NodeKind::ParameterDefaultValue {
                assignment,
                default_value,
            } => $push!($out; assignment, default_value),
            NodeKind::FunctionDeclaration {
                leading_nodes,
                keyword,
                name,
                lambda,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, name, lambda);
            }
            NodeKind::ResourceDeclaration {
                leading_nodes,
                keyword,
                name,
                ty,
                existing,
                assignment,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, name, ty);
                $optional!($out; existing);
                $push!($out; assignment, value);
            }
            NodeKind::ModuleDeclaration {
                leading_nodes,
                keyword,
                name,
                path,
                assignment,
                value,
            }
            | NodeKind::TestDeclaration {
                leading_nodes,
                keyword,
                name,
                path,
                assignment,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, name, path, assignment, value);
            }
            NodeKind::OutputDeclaration {
                leading_nodes,
                keyword,
                name,
                ty,
                assignment,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, name, ty, assignment, value);
            }
            NodeKind::ProviderDeclaration {
                leading_nodes,
                keyword,
                specification,
                with_clause,
                as_clause,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, specification);
                $optional!($out; with_clause);
                $optional!($out; as_clause);
            }
            NodeKind::ProviderWithClause { keyword, config } => $push!($out; keyword, config),
            NodeKind::AliasAsClause { keyword, alias } => $push!($out; keyword, alias),
            NodeKind::CompileTimeImportDeclaration {
                leading_nodes,
                keyword,
                import_expression,
                from_clause,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, import_expression, from_clause);
            }
            NodeKind::ImportedSymbolsList {
                open,
                children,
                close,
            }
            | NodeKind::Array {
                open,
                children,
                close,
            }
            | NodeKind::Object {
                open,
                children,
                close,
            }
            | NodeKind::VariableBlock {
                open,
                children,
                close,
            }
            | NodeKind::TypedVariableBlock {
                open,
                children,
                close,
            }
            | NodeKind::ObjectType {
                open,
                children,
                close,
            }
            | NodeKind::TupleType {
                open,
                children,
                close,
            } => {
                $push!($out; open);
                $out.extend(children);
                $push!($out; close);
            }
            NodeKind::ImportedSymbolsListItem {
                original_name,
                as_clause,
            } => {
                $push!($out; original_name);
                $optional!($out; as_clause);
            }
            NodeKind::WildcardImport {
                wildcard,
                as_clause,
            } => $push!($out; wildcard, as_clause),
            NodeKind::CompileTimeImportFromClause { keyword, path } => {
                $push!($out; keyword, path)
            }
            NodeKind::UsingDeclaration {
                leading_nodes,
                keyword,
                path,
            } => {
                $out.extend(leading_nodes);
                $push!($out; keyword, path);
            }
            NodeKind::BooleanLiteral { token, .. }
            | NodeKind::NullLiteral { token }
            | NodeKind::IntegerLiteral { token, .. } => $push!($out; token),
            NodeKind::StringLiteral { parts, .. } => $out.extend(parts),
            NodeKind::ArrayItem { value }
            | NodeKind::UnionTypeMember { value }
            | NodeKind::ArrayTypeMember { value } => $push!($out; value),
            NodeKind::ObjectProperty { key, colon, value } => $push!($out; key, colon, value),
            NodeKind::Parenthesized {
                open,
                expression,
                close,
            } => $push!($out; open, expression, close),
            NodeKind::UnaryOperation {
                operator,
                expression,
            } => $push!($out; operator, expression),
            NodeKind::BinaryOperation {
                left,
                operator,
                right,
            } => $push!($out; left, operator, right),
            NodeKind::TernaryOperation {
                condition,
                newlines_before_question,
                question,
                true_expression,
                newlines_before_colon,
                colon,
                false_expression,
            } => {
                $push!($out; condition);
                $out.extend(newlines_before_question);
                $push!($out; question, true_expression);
                $out.extend(newlines_before_colon);
                $push!($out; colon, false_expression);
            }
            NodeKind::FunctionCall {
                name,
                open,
                children,
                close,
            } => {
                $push!($out; name, open);
                $out.extend(children);
                $push!($out; close);
            }
            NodeKind::FunctionArgument { expression } => $push!($out; expression),
            NodeKind::InstanceFunctionCall {
                base,
                dot,
                name,
                open,
                children,
                close,
            } => {
                $push!($out; base, dot, name, open);
                $out.extend(children);
                $push!($out; close);
            }
            NodeKind::PropertyAccess {
                base,
                dot,
                safe_access,
                property,
            } => {
                $push!($out; base, dot);
                $optional!($out; safe_access);
                $push!($out; property);
            }
            NodeKind::ArrayAccess {
                base,
                open,
                safe_access,
                index,
                close,
            } => {
                $push!($out; base, open);
                $optional!($out; safe_access);
                $push!($out; index, close);
            }
            NodeKind::ResourceAccess {
                base,
                double_colon,
                resource_name,
            } => $push!($out; base, double_colon, resource_name),
            NodeKind::NonNullAssertion { base, bang } => $push!($out; base, bang),
            NodeKind::VariableAccess { name } | NodeKind::LocalVariable { name } => {
                $push!($out; name)
            }
            NodeKind::Lambda {
                variable_section,
                arrow,
                newlines_before_body,
                body,
            } => {
                $push!($out; variable_section, arrow);
                $out.extend(newlines_before_body);
                $push!($out; body);
            }
            NodeKind::TypedLambda {
                variable_section,
                return_type,
                arrow,
                newlines_before_body,
                body,
            } => {
                $push!($out; variable_section, return_type, arrow);
                $out.extend(newlines_before_body);
                $push!($out; body);
            }
            NodeKind::TypedLocalVariable { name, ty } => $push!($out; name, ty),
            NodeKind::ForExpression {
                open,
                open_newlines,
                for_keyword,
                variable_section,
                in_keyword,
                expression,
                colon,
                body,
                close_newlines,
                close,
            } => {
                $push!($out; open);
                $out.extend(open_newlines);
                $push!($out; for_keyword, variable_section, in_keyword, expression, colon, body);
                $out.extend(close_newlines);
                $push!($out; close);
            }
            NodeKind::IfCondition {
                keyword,
                condition,
                body,
            } => $push!($out; keyword, condition, body),
            NodeKind::ResourceType { keyword, ty } => {
                $push!($out; keyword);
                $optional!($out; ty);
            }
            NodeKind::ObjectTypeProperty {
                leading_nodes,
                key,
                colon,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; key, colon, value);
            }
            NodeKind::ObjectTypeAdditionalProperties {
                leading_nodes,
                asterisk,
                colon,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; asterisk, colon, value);
            }
            NodeKind::TupleTypeItem {
                leading_nodes,
                value,
            } => {
                $out.extend(leading_nodes);
                $push!($out; value);
            }
            NodeKind::UnionType { children } => $out.extend(children),
            NodeKind::NullableType { base, question } => $push!($out; base, question),
            NodeKind::ArrayType { item, open, close } => $push!($out; item, open, close),
        }
    };
}

impl NodeKind {
    /// Direct children in source order.
    pub fn children(&self) -> Vec<&SyntaxNode> {
        let mut out: Vec<&SyntaxNode> = Vec::new();
        collect_children!(self, out, push_nodes, push_optional);
        out
    }

    fn children_mut(&mut self) -> Vec<&mut SyntaxNode> {
        let mut out: Vec<&mut SyntaxNode> = Vec::new();
        collect_children!(self, out, push_nodes_mut, push_optional_mut);
        out
    }

    /// Childless stand-in left behind when a subtree is moved out.
    fn detached() -> NodeKind {
        NodeKind::SkippedTrivia {
            elements: Vec::new(),
            diagnostic: None,
        }
    }

    fn is_leaf(&self) -> bool {
        match self {
            NodeKind::Token(_) => true,
            NodeKind::SkippedTrivia { elements, .. } => elements.is_empty(),
            _ => false,
        }
    }

    /// Span from the first child to the last one, if there are any.
    pub(crate) fn children_span(&self) -> Option<TextSpan> {
        let children = self.children();
        let first = children.first()?;
        let last = children.last()?;
        Some(TextSpan::between(first.span, last.span))
    }

    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::MissingDeclaration { .. }
                | NodeKind::MetadataDeclaration { .. }
                | NodeKind::TargetScopeDeclaration { .. }
                | NodeKind::ParameterDeclaration { .. }
                | NodeKind::VariableDeclaration { .. }
                | NodeKind::TypeDeclaration { .. }
                | NodeKind::FunctionDeclaration { .. }
                | NodeKind::ResourceDeclaration { .. }
                | NodeKind::ModuleDeclaration { .. }
                | NodeKind::TestDeclaration { .. }
                | NodeKind::OutputDeclaration { .. }
                | NodeKind::AssertDeclaration { .. }
                | NodeKind::ProviderDeclaration { .. }
                | NodeKind::CompileTimeImportDeclaration { .. }
                | NodeKind::UsingDeclaration { .. }
                | NodeKind::ParameterAssignment { .. }
        )
    }
}

impl SyntaxNode {
    pub fn children(&self) -> Vec<&SyntaxNode> {
        self.kind.children()
    }

    pub fn as_token(&self) -> Option<&Token> {
        match &self.kind {
            NodeKind::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.kind, NodeKind::SkippedTrivia { .. })
    }

    /// Text of a well-formed identifier; `None` for malformed ones.
    pub fn identifier_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier { child } => child.as_token().map(|token| token.text.as_str()),
            _ => None,
        }
    }

    /// The `name` child of declarations that have one.
    pub fn declared_name(&self) -> Option<&SyntaxNode> {
        match &self.kind {
            NodeKind::MetadataDeclaration { name, .. }
            | NodeKind::ParameterDeclaration { name, .. }
            | NodeKind::VariableDeclaration { name, .. }
            | NodeKind::TypeDeclaration { name, .. }
            | NodeKind::FunctionDeclaration { name, .. }
            | NodeKind::ResourceDeclaration { name, .. }
            | NodeKind::ModuleDeclaration { name, .. }
            | NodeKind::TestDeclaration { name, .. }
            | NodeKind::OutputDeclaration { name, .. }
            | NodeKind::AssertDeclaration { name, .. }
            | NodeKind::ParameterAssignment { name, .. } => Some(name.as_ref()),
            _ => None,
        }
    }

    /// Depth-first token sequence, including tokens inside skipped trivia.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let NodeKind::Token(token) = &node.kind {
                tokens.push(token);
                continue;
            }
            stack.extend(node.children().into_iter().rev());
        }
        tokens
    }

    /// Rebuilds the covered source text, trivia included.
    pub fn to_source_text(&self) -> String {
        let mut text = String::new();
        for token in self.tokens() {
            token.write_full_text(&mut text);
        }
        text
    }

    pub fn token_at_offset(&self, offset: usize) -> Option<&Token> {
        let tokens = self.tokens();
        tokens
            .iter()
            .find(|token| token.span.contains(offset))
            .or_else(|| tokens.iter().find(|token| token.span.touches(offset)))
            .copied()
    }

    /// Nodes covering `offset`, innermost first and this node last.
    pub fn node_path_at_offset(&self, offset: usize) -> Vec<&SyntaxNode> {
        let mut path = Vec::new();
        if !self.span.touches(offset) {
            return path;
        }
        let mut current = self;
        loop {
            path.push(current);
            let children = current.children();
            let next = children
                .iter()
                .find(|child| child.span.contains(offset))
                .or_else(|| children.iter().find(|child| child.span.touches(offset)));
            match next {
                Some(child) => current = *child,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Splits the node into its parts; the children stay with the kind.
    pub fn into_parts(mut self) -> (NodeId, TextSpan, NodeKind) {
        let kind = std::mem::replace(&mut self.kind, NodeKind::detached());
        (self.id, self.span, kind)
    }

    fn detached() -> SyntaxNode {
        SyntaxNode {
            id: NodeId(u32::MAX),
            span: TextSpan::default(),
            kind: NodeKind::detached(),
        }
    }

    /// Pre-order walk over this node and all its descendants.
    pub fn descendants(&self) -> Vec<&SyntaxNode> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children().into_iter().rev());
        }
        nodes
    }
}

impl Drop for SyntaxNode {
    // Operator and member chains are not depth-limited, so children are
    // detached onto a work list instead of dropped recursively.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_children(&mut self.kind, &mut pending);
        while let Some(mut node) = pending.pop() {
            detach_children(&mut node.kind, &mut pending);
        }
    }
}

fn detach_children(kind: &mut NodeKind, pending: &mut Vec<SyntaxNode>) {
    if kind.is_leaf() {
        return;
    }
    for child in kind.children_mut() {
        if !child.kind.is_leaf() {
            pending.push(std::mem::replace(child, SyntaxNode::detached()));
        }
    }
}
