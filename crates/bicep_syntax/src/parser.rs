use tracing::{debug, trace};

use crate::config::{ParserOptions, SourceFileKind};
use crate::diagnostics::{Diagnostic, DiagnosticSource, DiagnosticTree, SyntaxError};
use crate::keywords;
use crate::lexer::lex;
use crate::span::TextSpan;
use crate::syntax::{NodeId, NodeKind, SyntaxNode};
use crate::token::{Token, TokenKind};

mod declarations;
mod expressions;
mod types;

/// Result of parsing one file.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ParsedProgram {
    pub program: SyntaxNode,
    pub lexing_errors: DiagnosticTree,
    pub parsing_errors: DiagnosticTree,
}

impl ParsedProgram {
    /// Lexing and parsing diagnostics merged in source order.
    pub fn all_diagnostics(&self) -> Vec<&Diagnostic> {
        let mut all: Vec<&Diagnostic> = self
            .lexing_errors
            .iter()
            .chain(self.parsing_errors.iter())
            .collect();
        all.sort_by_key(|diagnostic| diagnostic.span.start);
        all
    }

    /// True when any lexing or parsing diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.lexing_errors.iter().any(Diagnostic::is_error)
            || self.parsing_errors.iter().any(Diagnostic::is_error)
    }

    /// Top-level declarations in source order.
    pub fn declarations(&self) -> Vec<&SyntaxNode> {
        match &self.program.kind {
            NodeKind::Program { children, .. } => children
                .iter()
                .filter(|child| child.kind.is_declaration())
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub fn parse(text: &str) -> ParsedProgram {
    parse_file(text, SourceFileKind::Template, &ParserOptions::default())
}

pub fn parse_with_options(text: &str, options: &ParserOptions) -> ParsedProgram {
    parse_file(text, SourceFileKind::Template, options)
}

pub fn parse_params(text: &str) -> ParsedProgram {
    parse_file(text, SourceFileKind::Parameters, &ParserOptions::default())
}

pub fn parse_file(text: &str, file_kind: SourceFileKind, options: &ParserOptions) -> ParsedProgram {
    let (tokens, lexing_diagnostics) = lex(text);
    let token_count = tokens.len();
    let mut parser = Parser::new(tokens, file_kind, options, &lexing_diagnostics);
    let program = parser.program();

    let parsing_errors = DiagnosticTree::new(collect_parsing_diagnostics(&program));
    let lexing_errors = DiagnosticTree::new(attach_lexing_diagnostics(&program, lexing_diagnostics));
    debug!(
        tokens = token_count,
        lexing_errors = lexing_errors.len(),
        parsing_errors = parsing_errors.len(),
        ?file_kind,
        "parsed program"
    );
    ParsedProgram {
        program,
        lexing_errors,
        parsing_errors,
    }
}

/// Diagnostics live on the nodes that carry them, so only the nodes that made
/// it into the final tree report anything.
fn collect_parsing_diagnostics(program: &SyntaxNode) -> Vec<(Option<NodeId>, Diagnostic)> {
    let mut entries = Vec::new();
    for node in program.descendants() {
        match &node.kind {
            NodeKind::SkippedTrivia {
                diagnostic: Some(diagnostic),
                ..
            } => entries.push((Some(node.id), diagnostic.clone())),
            NodeKind::MissingDeclaration { .. } => {
                let span = TextSpan::empty(node.span.end());
                entries.push((
                    Some(node.id),
                    SyntaxError::ExpectedDeclarationAfterDecorator.at(span),
                ));
            }
            _ => {}
        }
    }
    entries
}

fn attach_lexing_diagnostics(
    program: &SyntaxNode,
    diagnostics: Vec<Diagnostic>,
) -> Vec<(Option<NodeId>, Diagnostic)> {
    let token_nodes: Vec<&SyntaxNode> = program
        .descendants()
        .into_iter()
        .filter(|node| node.as_token().is_some())
        .collect();
    diagnostics
        .into_iter()
        .map(|diagnostic| {
            let index = token_nodes.partition_point(|node| node.span.end() < diagnostic.span.start);
            let owner = token_nodes
                .get(index)
                .filter(|node| node.span.contains_span(diagnostic.span))
                .map(|node| node.id);
            (owner, diagnostic)
        })
        .collect()
}

/// The "expected ... here" signal. It never travels further than the
/// nearest `with_recovery`, which turns it into skipped trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpectedToken {
    pub(crate) span: TextSpan,
    pub(crate) error: SyntaxError,
}

pub(crate) type ParseResult<T> = Result<T, ExpectedToken>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct RecoveryFlags {
    consume_terminator: bool,
    suppress_diagnostics: bool,
}

impl RecoveryFlags {
    pub(crate) const NONE: Self = Self {
        consume_terminator: false,
        suppress_diagnostics: false,
    };
    pub(crate) const SUPPRESS_DIAGNOSTICS: Self = Self {
        consume_terminator: false,
        suppress_diagnostics: true,
    };
    pub(crate) const CONSUME_TERMINATOR: Self = Self {
        consume_terminator: true,
        suppress_diagnostics: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExpressionFlags {
    pub(crate) allow_complex_literals: bool,
    pub(crate) allow_resource_declarations: bool,
}

impl ExpressionFlags {
    pub(crate) const NONE: Self = Self {
        allow_complex_literals: false,
        allow_resource_declarations: false,
    };
    pub(crate) const COMPLEX_LITERALS: Self = Self {
        allow_complex_literals: true,
        allow_resource_declarations: false,
    };
    pub(crate) const RESOURCE_DECLARATIONS: Self = Self {
        allow_complex_literals: true,
        allow_resource_declarations: true,
    };

    pub(crate) fn with_complex_literals(self) -> Self {
        Self {
            allow_complex_literals: true,
            ..self
        }
    }

    pub(crate) fn without_resource_declarations(self) -> Self {
        Self {
            allow_resource_declarations: false,
            ..self
        }
    }
}

/// Once nesting overflows, the rest of the declaration is reported only by
/// that one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NestingState {
    Within,
    Exceeded,
    Reported,
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_id: u32,
    file_kind: SourceFileKind,
    max_depth: usize,
    depth: usize,
    nesting: NestingState,
    lexing_error_spans: Vec<TextSpan>,
}

impl Parser {
    fn new(
        tokens: Vec<Token>,
        file_kind: SourceFileKind,
        options: &ParserOptions,
        lexing_diagnostics: &[Diagnostic],
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            next_id: 0,
            file_kind,
            max_depth: options.max_nesting_depth,
            depth: 0,
            nesting: NestingState::Within,
            lexing_error_spans: lexing_diagnostics.iter().map(|d| d.span).collect(),
        }
    }

    fn program(&mut self) -> SyntaxNode {
        let mut children = Vec::new();
        while !self.is_at_end() {
            let loop_start = self.pos;
            self.nesting = NestingState::Within;
            let declaration = self.declaration();
            let is_statement = declaration.kind.is_declaration();
            children.push(declaration);
            if is_statement {
                // Declarations end at a newline or the end of the file.
                if let Some(newline) = self.with_recovery_optional(
                    RecoveryFlags::CONSUME_TERMINATOR,
                    &[TokenKind::NewLine],
                    |p| p.newline_or_eof(),
                ) {
                    children.push(newline);
                }
            }
            if self.pos == loop_start && !self.is_at_end() {
                children.push(self.skip_current(SyntaxError::UnrecognizedDeclaration));
            }
        }
        let end_of_file = self.read();
        let end = end_of_file
            .as_token()
            .map_or(end_of_file.span.end(), |token| token.full_span().end());
        let id = self.alloc_id();
        SyntaxNode {
            id,
            span: TextSpan::new(0, end),
            kind: NodeKind::Program {
                children,
                end_of_file: Box::new(end_of_file),
            },
        }
    }

    pub(super) fn declaration(&mut self) -> SyntaxNode {
        self.with_recovery(RecoveryFlags::CONSUME_TERMINATOR, &[TokenKind::NewLine], |p| {
            let leading_nodes = p.decorable_leading_nodes();
            let (kind, keyword) = (p.peek_kind(), p.peek().text.clone());
            match kind {
                TokenKind::Identifier => {
                    match p.file_kind {
                        SourceFileKind::Parameters => p.params_declaration(&keyword, leading_nodes),
                        SourceFileKind::Template | SourceFileKind::Test => {
                            p.template_declaration(&keyword, leading_nodes)
                        }
                    }
                }
                TokenKind::NewLine if leading_nodes.is_empty() => p.newline(),
                _ => p.missing_declaration(leading_nodes),
            }
        })
    }

    fn template_declaration(
        &mut self,
        keyword: &str,
        leading_nodes: Vec<SyntaxNode>,
    ) -> ParseResult<SyntaxNode> {
        match keyword {
            keywords::METADATA => self.metadata_declaration(leading_nodes),
            keywords::TARGET_SCOPE => self.target_scope_declaration(leading_nodes),
            keywords::TYPE => self.type_declaration(leading_nodes),
            keywords::PARAM => self.parameter_declaration(leading_nodes),
            keywords::VAR => self.variable_declaration(leading_nodes),
            keywords::FUNC => self.function_declaration(leading_nodes),
            keywords::RESOURCE => self.resource_declaration(leading_nodes),
            keywords::MODULE => self.module_declaration(leading_nodes),
            keywords::OUTPUT => self.output_declaration(leading_nodes),
            keywords::TEST => self.test_declaration(leading_nodes),
            keywords::ASSERT => self.assert_declaration(leading_nodes),
            keywords::IMPORT => self.import_declaration(leading_nodes),
            keywords::PROVIDER => self.provider_declaration(leading_nodes),
            _ => self.missing_declaration(leading_nodes),
        }
    }

    fn params_declaration(
        &mut self,
        keyword: &str,
        leading_nodes: Vec<SyntaxNode>,
    ) -> ParseResult<SyntaxNode> {
        match keyword {
            keywords::USING => self.using_declaration(leading_nodes),
            keywords::PARAM => self.parameter_assignment(leading_nodes),
            keywords::VAR => self.variable_declaration(leading_nodes),
            keywords::TYPE => self.type_declaration(leading_nodes),
            keywords::IMPORT => self.import_declaration(leading_nodes),
            _ => self.missing_declaration(leading_nodes),
        }
    }

    fn missing_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        if leading_nodes.is_empty() {
            let error = match self.file_kind {
                SourceFileKind::Parameters => SyntaxError::UnrecognizedParamsDeclaration,
                SourceFileKind::Template | SourceFileKind::Test => {
                    SyntaxError::UnrecognizedDeclaration
                }
            };
            return Err(self.error_here(error));
        }
        Ok(self.node(NodeKind::MissingDeclaration { leading_nodes }))
    }

    // ---- token reader ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_ahead(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn peek_skip_newlines(&self) -> &Token {
        self.tokens[self.pos..]
            .iter()
            .find(|token| token.kind != TokenKind::NewLine)
            .unwrap_or_else(|| self.peek())
    }

    fn peek_ahead_skip_newlines(&self) -> Option<&Token> {
        self.tokens
            .get(self.pos + 1..)?
            .iter()
            .find(|token| token.kind != TokenKind::NewLine)
    }

    fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::EndOfFile
    }

    fn check(&self, kinds: &[TokenKind]) -> bool {
        !self.is_at_end() && kinds.contains(&self.peek_kind())
    }

    fn check_token(token: Option<&Token>, kinds: &[TokenKind]) -> bool {
        token.is_some_and(|token| kinds.contains(&token.kind))
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        !self.is_at_end() && self.peek().is_keyword(keyword)
    }

    /// Consumes the current token. The end-of-file token is returned but never consumed.
    fn read(&mut self) -> SyntaxNode {
        let token = self.peek().clone();
        if token.kind != TokenKind::EndOfFile {
            self.pos += 1;
        }
        self.token_node(token)
    }

    fn error_here(&self, error: SyntaxError) -> ExpectedToken {
        ExpectedToken {
            span: self.peek().span,
            error,
        }
    }

    fn expect(&mut self, kind: TokenKind, error: SyntaxError) -> ParseResult<SyntaxNode> {
        if self.check(&[kind]) {
            return Ok(self.read());
        }
        Err(self.error_here(error))
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> ParseResult<SyntaxNode> {
        self.optional_keyword(keyword)
            .ok_or_else(|| self.error_here(SyntaxError::ExpectedKeyword(keyword)))
    }

    fn optional_keyword(&mut self, keyword: &str) -> Option<SyntaxNode> {
        self.check_keyword(keyword).then(|| self.read())
    }

    fn newline(&mut self) -> ParseResult<SyntaxNode> {
        self.expect(TokenKind::NewLine, SyntaxError::ExpectedNewLine)
    }

    fn newline_or_eof(&mut self) -> ParseResult<Option<SyntaxNode>> {
        if self.peek_kind() == TokenKind::EndOfFile {
            return Ok(None);
        }
        self.newline().map(Some)
    }

    fn newlines(&mut self) -> Vec<SyntaxNode> {
        let mut newlines = Vec::new();
        while self.check(&[TokenKind::NewLine]) {
            newlines.push(self.read());
        }
        newlines
    }

    // ---- node construction ----

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn token_node(&mut self, token: Token) -> SyntaxNode {
        let id = self.alloc_id();
        SyntaxNode {
            id,
            span: token.span,
            kind: NodeKind::Token(token),
        }
    }

    fn node(&mut self, kind: NodeKind) -> SyntaxNode {
        let span = kind
            .children_span()
            .unwrap_or_else(|| TextSpan::empty(self.peek().span.start));
        let id = self.alloc_id();
        SyntaxNode { id, span, kind }
    }

    fn skipped(
        &mut self,
        span: TextSpan,
        elements: Vec<SyntaxNode>,
        diagnostic: Option<Diagnostic>,
    ) -> SyntaxNode {
        let diagnostic = diagnostic.filter(|diagnostic| self.keep_diagnostic(diagnostic));
        let id = self.alloc_id();
        SyntaxNode {
            id,
            span,
            kind: NodeKind::SkippedTrivia {
                elements,
                diagnostic,
            },
        }
    }

    fn keep_diagnostic(&mut self, diagnostic: &Diagnostic) -> bool {
        match self.nesting {
            NestingState::Within => true,
            NestingState::Exceeded
                if diagnostic.code == SyntaxError::NestingTooDeep(self.max_depth).code() =>
            {
                self.nesting = NestingState::Reported;
                true
            }
            NestingState::Exceeded | NestingState::Reported => false,
        }
    }

    /// Zero-length placeholder at the current token.
    fn skip_empty(&mut self, error: Option<SyntaxError>) -> SyntaxNode {
        let span = TextSpan::empty(self.peek().span.start);
        self.skip_empty_at(span, error)
    }

    fn skip_empty_at(&mut self, span: TextSpan, error: Option<SyntaxError>) -> SyntaxNode {
        let diagnostic = error.map(|error| error.at(span));
        self.skipped(span, Vec::new(), diagnostic)
    }

    /// Wraps already-parsed nodes that are arranged wrongly.
    fn skip(&mut self, elements: Vec<SyntaxNode>, error: Option<SyntaxError>) -> SyntaxNode {
        let span = match (elements.first(), elements.last()) {
            (Some(first), Some(last)) => TextSpan::between(first.span, last.span),
            _ => TextSpan::empty(self.peek().span.start),
        };
        let diagnostic = error.map(|error| error.at(span));
        self.skipped(span, elements, diagnostic)
    }

    /// Consumes exactly one token into skipped trivia.
    fn skip_current(&mut self, error: SyntaxError) -> SyntaxNode {
        let token = self.read();
        self.skip(vec![token], Some(error))
    }

    pub(crate) fn identifier_node(&mut self, child: SyntaxNode) -> SyntaxNode {
        self.node(NodeKind::Identifier {
            child: Box::new(child),
        })
    }

    fn identifier(&mut self, error: SyntaxError) -> ParseResult<SyntaxNode> {
        let token = self.expect(TokenKind::Identifier, error)?;
        Ok(self.identifier_node(token))
    }

    fn identifier_or_skip(&mut self, error: SyntaxError) -> SyntaxNode {
        let child = if self.check(&[TokenKind::Identifier]) {
            self.read()
        } else {
            self.skip_empty(Some(error))
        };
        self.identifier_node(child)
    }

    fn identifier_with_recovery(
        &mut self,
        error: SyntaxError,
        flags: RecoveryFlags,
        terminators: &[TokenKind],
    ) -> SyntaxNode {
        let identifier = self.with_recovery(flags, terminators, |p| p.identifier(error));
        if identifier.is_skipped() {
            return self.identifier_node(identifier);
        }
        identifier
    }

    // ---- recovery ----

    /// Runs `parse`; if it reports a missing token, skips forward to one of
    /// `terminators` and returns the skipped region instead.
    pub(crate) fn with_recovery(
        &mut self,
        flags: RecoveryFlags,
        terminators: &[TokenKind],
        parse: impl FnOnce(&mut Self) -> ParseResult<SyntaxNode>,
    ) -> SyntaxNode {
        let start = self.pos;
        match parse(self) {
            Ok(node) => node,
            Err(expected) => self.synchronize_and_return_trivia(
                start,
                flags,
                expected.error,
                Some(expected.span),
                terminators,
            ),
        }
    }

    pub(crate) fn with_recovery_optional(
        &mut self,
        flags: RecoveryFlags,
        terminators: &[TokenKind],
        parse: impl FnOnce(&mut Self) -> ParseResult<Option<SyntaxNode>>,
    ) -> Option<SyntaxNode> {
        let start = self.pos;
        match parse(self) {
            Ok(node) => node,
            Err(expected) => Some(self.synchronize_and_return_trivia(
                start,
                flags,
                expected.error,
                Some(expected.span),
                terminators,
            )),
        }
    }

    fn synchronize(&mut self, consume_terminator: bool, terminators: &[TokenKind]) {
        while !self.is_at_end() {
            if self.check(terminators) {
                if consume_terminator {
                    self.pos += 1;
                }
                return;
            }
            self.pos += 1;
        }
    }

    /// Skips from `start` to the next terminator. Without an explicit span the
    /// diagnostic covers the skipped tokens, never the terminator.
    fn synchronize_and_return_trivia(
        &mut self,
        start: usize,
        flags: RecoveryFlags,
        error: SyntaxError,
        error_span: Option<TextSpan>,
        terminators: &[TokenKind],
    ) -> SyntaxNode {
        let start = start.min(self.tokens.len() - 1);
        let start_position = self.tokens[start].span.start;
        self.synchronize(false, terminators);
        let skipped_span = self.span_of_range(start, start_position);
        if flags.consume_terminator {
            self.synchronize(true, terminators);
        }
        let span = self.span_of_range(start, start_position);
        let diagnostic = if flags.suppress_diagnostics {
            None
        } else {
            Some(error.at(error_span.unwrap_or(skipped_span)))
        };
        trace!(
            skipped = %span,
            suppressed = flags.suppress_diagnostics,
            code = error.code(),
            "recovered from parse error"
        );
        let tokens: Vec<Token> = self.tokens[start..self.pos.max(start)].to_vec();
        let elements = tokens
            .into_iter()
            .map(|token| self.token_node(token))
            .collect();
        self.skipped(span, elements, diagnostic)
    }

    fn span_of_range(&self, start: usize, start_position: usize) -> TextSpan {
        match (self.tokens.get(start), self.pos.checked_sub(1)) {
            (Some(first), Some(last)) if last >= start => {
                TextSpan::between(first.span, self.tokens[last].span)
            }
            _ => TextSpan::empty(start_position),
        }
    }

    /// Diagnostics for a step are dropped when the previous step already
    /// failed on an empty span, so one missing token yields one error.
    pub(crate) fn suppression_flag(preceding: &SyntaxNode) -> RecoveryFlags {
        let suppress = match &preceding.kind {
            NodeKind::Identifier { child } => child.is_skipped() && child.span.is_empty(),
            NodeKind::SkippedTrivia { .. } => preceding.span.is_empty(),
            _ => false,
        };
        if suppress {
            RecoveryFlags::SUPPRESS_DIAGNOSTICS
        } else {
            RecoveryFlags::NONE
        }
    }

    pub(crate) fn suppression_flag_if(preceding: &SyntaxNode, keep_diagnostics: bool) -> RecoveryFlags {
        match Self::suppression_flag(preceding) {
            RecoveryFlags::NONE if keep_diagnostics => RecoveryFlags::NONE,
            _ => RecoveryFlags::SUPPRESS_DIAGNOSTICS,
        }
    }

    fn has_syntax_error(&self, node: &SyntaxNode) -> bool {
        if self
            .lexing_error_spans
            .iter()
            .any(|span| node.span.contains_span(*span))
        {
            return true;
        }
        node.descendants().iter().any(|descendant| {
            matches!(
                descendant.kind,
                NodeKind::SkippedTrivia {
                    diagnostic: Some(_),
                    ..
                } | NodeKind::MissingDeclaration { .. }
            )
        })
    }

    /// Runs `parse` one nesting level deeper, failing once the configured
    /// depth is reached.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= self.max_depth {
            if self.nesting == NestingState::Within {
                self.nesting = NestingState::Exceeded;
            }
            return Err(self.error_here(SyntaxError::NestingTooDeep(self.max_depth)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ---- shared productions ----

    fn assignment(&mut self) -> ParseResult<SyntaxNode> {
        self.expect(TokenKind::Assignment, SyntaxError::ExpectedCharacter("="))
    }

    /// Decorators and the newlines that must follow each of them.
    fn decorable_leading_nodes(&mut self) -> Vec<SyntaxNode> {
        let mut nodes = Vec::new();
        while self.check(&[TokenKind::At]) {
            nodes.push(self.decorator());
            nodes.push(self.with_recovery(
                RecoveryFlags::CONSUME_TERMINATOR,
                &[TokenKind::NewLine],
                |p| p.newline(),
            ));
            nodes.extend(self.newlines());
        }
        nodes
    }

    fn decorator(&mut self) -> SyntaxNode {
        let at = self.read();
        let expression = self.with_recovery(RecoveryFlags::NONE, &[TokenKind::NewLine], |p| {
            let name = p.identifier(SyntaxError::ExpectedNamespaceOrDecoratorName)?;
            let mut current = if p.check(&[TokenKind::LeftParen]) {
                let (open, children, close) =
                    p.function_call_access(ExpressionFlags::COMPLEX_LITERALS)?;
                p.node(NodeKind::FunctionCall {
                    name: Box::new(name),
                    open: Box::new(open),
                    children,
                    close: Box::new(close),
                })
            } else {
                p.node(NodeKind::VariableAccess {
                    name: Box::new(name),
                })
            };
            while p.check(&[TokenKind::Dot]) {
                let dot = p.read();
                let name = p.identifier_or_skip(SyntaxError::ExpectedFunctionOrPropertyName);
                current = if p.check(&[TokenKind::LeftParen]) {
                    let (open, children, close) =
                        p.function_call_access(ExpressionFlags::COMPLEX_LITERALS)?;
                    p.node(NodeKind::InstanceFunctionCall {
                        base: Box::new(current),
                        dot: Box::new(dot),
                        name: Box::new(name),
                        open: Box::new(open),
                        children,
                        close: Box::new(close),
                    })
                } else {
                    p.node(NodeKind::PropertyAccess {
                        base: Box::new(current),
                        dot: Box::new(dot),
                        safe_access: None,
                        property: Box::new(name),
                    })
                };
            }
            Ok(current)
        });
        self.node(NodeKind::Decorator {
            at: Box::new(at),
            expression: Box::new(expression),
        })
    }

    /// Elements of an array, object, object type, tuple type or import list.
    /// Separators are a comma or a run of newlines per boundary.
    fn array_or_object_elements(
        &mut self,
        closing: TokenKind,
        mut parse_element: impl FnMut(&mut Self) -> SyntaxNode,
    ) -> Vec<SyntaxNode> {
        if self.check(&[closing]) {
            return Vec::new();
        }
        let mut children = Vec::new();
        // A list whose first element shares a line with the opening bracket
        // may not switch from commas to newlines.
        let single_line = !self.check(&[TokenKind::NewLine]);
        let mut used_comma = false;
        children.extend(self.newlines());

        let mut expect_element = true;
        while !self.is_at_end() && self.peek_kind() != closing {
            if !expect_element {
                if self.check(&[TokenKind::NewLine]) {
                    let closes_next = self.peek_skip_newlines().kind == closing;
                    if single_line && used_comma && !closes_next {
                        children.push(self.skip_empty(Some(SyntaxError::ExpectedCommaSeparator)));
                    }
                    children.extend(self.newlines());
                } else if self.check(&[TokenKind::Comma]) {
                    children.push(self.read());
                    used_comma = true;
                    if self.check(&[TokenKind::NewLine]) {
                        children.push(self.skip_empty(Some(
                            SyntaxError::UnexpectedNewLineAfterCommaSeparator,
                        )));
                        children.push(self.read());
                    }
                } else {
                    children.push(self.skip_empty(Some(SyntaxError::ExpectedNewLineOrCommaSeparator)));
                }
                expect_element = true;
                continue;
            }

            let before = self.pos;
            children.push(parse_element(self));
            if self.pos == before
                && !self.is_at_end()
                && !self.check(&[closing, TokenKind::NewLine, TokenKind::Comma])
            {
                children.push(self.skip_current(SyntaxError::UnrecognizedExpression));
            }
            expect_element = false;
        }
        children
    }

    /// Elements of a function call's argument list.
    fn function_elements(
        &mut self,
        closing: TokenKind,
        mut parse_element: impl FnMut(&mut Self) -> SyntaxNode,
    ) -> Vec<SyntaxNode> {
        if self.check(&[closing]) {
            return Vec::new();
        }
        let mut children = Vec::new();
        children.extend(self.newlines());

        let mut expect_element = true;
        while !self.is_at_end() && self.peek_kind() != closing {
            if !expect_element {
                if self.check(&[TokenKind::NewLine]) {
                    if self.peek_skip_newlines().kind != closing {
                        children.push(self.skip_empty(Some(SyntaxError::ExpectedCommaSeparator)));
                    }
                    children.extend(self.newlines());
                } else if self.check(&[TokenKind::Comma]) {
                    children.push(self.read());
                    children.extend(self.newlines());
                    if self.check(&[closing]) {
                        // Still parse an element so tooling sees the extra argument slot.
                        let element = parse_element(self);
                        children.push(self.trailing_comma_placeholder(element));
                    }
                } else {
                    children.push(self.skip_empty(Some(SyntaxError::ExpectedNewLineOrCommaSeparator)));
                }
                expect_element = true;
                continue;
            }

            let before = self.pos;
            children.push(parse_element(self));
            if self.pos == before
                && !self.is_at_end()
                && !self.check(&[closing, TokenKind::NewLine, TokenKind::Comma])
            {
                children.push(self.skip_current(SyntaxError::UnrecognizedExpression));
            }
            expect_element = false;
        }
        children
    }

    /// Rewrites the error of the element parsed after a trailing comma.
    fn trailing_comma_placeholder(&mut self, element: SyntaxNode) -> SyntaxNode {
        let (id, span, kind) = element.into_parts();
        let kind = match kind {
            NodeKind::FunctionArgument { expression } => {
                let (expression_id, expression_span, expression_kind) = (*expression).into_parts();
                let expression = match expression_kind {
                    NodeKind::SkippedTrivia { elements, .. } if elements.is_empty() => {
                        self.skip_empty_at(expression_span, Some(SyntaxError::UnexpectedTrailingComma))
                    }
                    kind => SyntaxNode {
                        id: expression_id,
                        span: expression_span,
                        kind,
                    },
                };
                NodeKind::FunctionArgument {
                    expression: Box::new(expression),
                }
            }
            kind => kind,
        };
        SyntaxNode { id, span, kind }
    }
}

#[cfg(test)]
mod tests;
