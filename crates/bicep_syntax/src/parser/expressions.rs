use super::{ExpressionFlags, ParseResult, Parser, RecoveryFlags};
use crate::diagnostics::{DiagnosticSource, SyntaxError};
use crate::keywords;
use crate::lexer::{try_get_multiline_string_value, try_get_raw_string_segments};
use crate::span::TextSpan;
use crate::syntax::{NodeKind, SyntaxNode};
use crate::token::{Token, TokenKind};

pub(super) const EXPRESSION_TERMINATORS: &[TokenKind] = &[
    TokenKind::StringRightPiece,
    TokenKind::RightBrace,
    TokenKind::RightParen,
    TokenKind::RightSquare,
    TokenKind::NewLine,
];

const HOLE_TERMINATORS: &[TokenKind] = &[
    TokenKind::StringMiddlePiece,
    TokenKind::StringRightPiece,
    TokenKind::NewLine,
];

fn operator_precedence(kind: TokenKind) -> i32 {
    match kind {
        TokenKind::Modulo | TokenKind::Asterisk | TokenKind::Slash => 100,
        TokenKind::Plus | TokenKind::Minus => 90,
        TokenKind::GreaterThan
        | TokenKind::GreaterThanOrEqual
        | TokenKind::LessThan
        | TokenKind::LessThanOrEqual => 80,
        TokenKind::Equals
        | TokenKind::NotEquals
        | TokenKind::EqualsInsensitive
        | TokenKind::NotEqualsInsensitive => 70,
        TokenKind::LogicalAnd => 50,
        TokenKind::LogicalOr => 40,
        TokenKind::DoubleQuestion => 30,
        _ => -1,
    }
}

fn is_unary_operator(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Exclamation | TokenKind::Minus)
}

impl Parser {
    pub(super) fn expression(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        self.nested(|p| p.ternary_expression(flags))
    }

    fn ternary_expression(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        let candidate = self.binary_expression(flags, 0)?;

        let newlines_before_question = if self.peek_skip_newlines().kind == TokenKind::Question {
            self.newlines()
        } else {
            Vec::new()
        };
        if !self.check(&[TokenKind::Question]) {
            return Ok(candidate);
        }

        let question = self.read();
        let true_expression = self.with_recovery(
            RecoveryFlags::NONE,
            &[
                TokenKind::Colon,
                TokenKind::StringRightPiece,
                TokenKind::RightBrace,
                TokenKind::RightParen,
                TokenKind::RightSquare,
                TokenKind::NewLine,
            ],
            |p| p.expression(flags),
        );
        let newlines_before_colon = if !true_expression.is_skipped()
            && self.peek_skip_newlines().kind == TokenKind::Colon
        {
            self.newlines()
        } else {
            Vec::new()
        };
        let colon = self.with_recovery(
            Self::suppression_flag(&true_expression),
            EXPRESSION_TERMINATORS,
            |p| p.expect(TokenKind::Colon, SyntaxError::ExpectedCharacter(":")),
        );
        let false_expression = self.with_recovery(
            Self::suppression_flag(&colon),
            EXPRESSION_TERMINATORS,
            |p| p.expression(flags),
        );

        Ok(self.node(NodeKind::TernaryOperation {
            condition: Box::new(candidate),
            newlines_before_question,
            question: Box::new(question),
            true_expression: Box::new(true_expression),
            newlines_before_colon,
            colon: Box::new(colon),
            false_expression: Box::new(false_expression),
        }))
    }

    fn binary_expression(&mut self, flags: ExpressionFlags, precedence: i32) -> ParseResult<SyntaxNode> {
        let mut current = self.unary_expression(flags)?;
        loop {
            let operator_precedence = operator_precedence(self.peek_kind());
            if operator_precedence <= precedence {
                break;
            }
            let operator = self.read();
            let right = self.with_recovery(RecoveryFlags::NONE, EXPRESSION_TERMINATORS, |p| {
                p.binary_expression(flags, operator_precedence)
            });
            current = self.node(NodeKind::BinaryOperation {
                left: Box::new(current),
                operator: Box::new(operator),
                right: Box::new(right),
            });
        }
        Ok(current)
    }

    fn unary_expression(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        if !is_unary_operator(self.peek_kind()) {
            return self.member_expression(flags);
        }
        let operator = self.read();
        let expression = self.with_recovery(RecoveryFlags::NONE, EXPRESSION_TERMINATORS, |p| {
            p.member_expression(flags)
        });
        Ok(self.node(NodeKind::UnaryOperation {
            operator: Box::new(operator),
            expression: Box::new(expression),
        }))
    }

    fn member_expression(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        let mut current = self.primary_expression(flags)?;
        loop {
            if self.check(&[TokenKind::LeftSquare]) {
                let open = self.read();
                let safe_access = self.check(&[TokenKind::Question]).then(|| self.read());
                let index = if self.check(&[TokenKind::RightSquare]) {
                    // Kept in the tree so completion still works inside `a[]`.
                    self.skip_empty(Some(SyntaxError::EmptyIndexerNotAllowed))
                } else {
                    self.expression(flags)?
                };
                let close = self.expect(TokenKind::RightSquare, SyntaxError::ExpectedCharacter("]"))?;
                current = self.node(NodeKind::ArrayAccess {
                    base: Box::new(current),
                    open: Box::new(open),
                    safe_access: safe_access.map(Box::new),
                    index: Box::new(index),
                    close: Box::new(close),
                });
                continue;
            }

            if self.check(&[TokenKind::Dot]) {
                let dot = self.read();
                let safe_access = self.check(&[TokenKind::Question]).then(|| self.read());
                let name = self.identifier_or_skip(SyntaxError::ExpectedFunctionOrPropertyName);

                if self.check(&[TokenKind::LeftParen]) {
                    let name = match safe_access {
                        Some(marker) => {
                            let span = TextSpan::between(marker.span, name.span);
                            let error = SyntaxError::SafeDereferenceNotPermittedOnInstanceFunctions;
                            let diagnostic = error.at(marker.span);
                            let skipped = self.skipped(span, vec![marker, name], Some(diagnostic));
                            self.identifier_node(skipped)
                        }
                        None => name,
                    };
                    let (open, children, close) = self.function_call_access(flags)?;
                    current = self.node(NodeKind::InstanceFunctionCall {
                        base: Box::new(current),
                        dot: Box::new(dot),
                        name: Box::new(name),
                        open: Box::new(open),
                        children,
                        close: Box::new(close),
                    });
                } else {
                    current = self.node(NodeKind::PropertyAccess {
                        base: Box::new(current),
                        dot: Box::new(dot),
                        safe_access: safe_access.map(Box::new),
                        property: Box::new(name),
                    });
                }
                continue;
            }

            if self.check(&[TokenKind::DoubleColon]) {
                let double_colon = self.read();
                let resource_name = self.identifier_or_skip(SyntaxError::ExpectedFunctionOrPropertyName);
                current = self.node(NodeKind::ResourceAccess {
                    base: Box::new(current),
                    double_colon: Box::new(double_colon),
                    resource_name: Box::new(resource_name),
                });
                continue;
            }

            if self.check(&[TokenKind::Exclamation]) {
                let bang = self.read();
                current = self.node(NodeKind::NonNullAssertion {
                    base: Box::new(current),
                    bang: Box::new(bang),
                });
                continue;
            }

            break;
        }
        Ok(current)
    }

    fn primary_expression(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        match self.peek_kind() {
            TokenKind::Integer
            | TokenKind::NullKeyword
            | TokenKind::TrueKeyword
            | TokenKind::FalseKeyword => self.literal_value(),
            TokenKind::StringComplete | TokenKind::StringLeftPiece => Ok(self.interpolable_string()),
            TokenKind::MultilineString => Ok(self.multiline_string()),
            TokenKind::LeftBrace if flags.allow_complex_literals => self.object(flags),
            TokenKind::LeftSquare if flags.allow_complex_literals => {
                let is_for = self
                    .peek_ahead_skip_newlines()
                    .is_some_and(|token| token.is_keyword(keywords::FOR));
                if is_for {
                    self.for_expression(flags, false)
                } else {
                    self.array()
                }
            }
            TokenKind::LeftBrace | TokenKind::LeftSquare => {
                Err(self.error_here(SyntaxError::ComplexLiteralsNotAllowed))
            }
            TokenKind::LeftParen => self.parenthesized_expression_or_lambda(flags),
            TokenKind::Identifier => self.function_call_or_variable_access(flags),
            _ => Err(self.error_here(SyntaxError::UnrecognizedExpression)),
        }
    }

    pub(super) fn literal_value(&mut self) -> ParseResult<SyntaxNode> {
        match self.peek_kind() {
            TokenKind::TrueKeyword | TokenKind::FalseKeyword => {
                let value = self.peek_kind() == TokenKind::TrueKeyword;
                let token = self.read();
                Ok(self.node(NodeKind::BooleanLiteral {
                    token: Box::new(token),
                    value,
                }))
            }
            TokenKind::NullKeyword => {
                let token = self.read();
                Ok(self.node(NodeKind::NullLiteral {
                    token: Box::new(token),
                }))
            }
            TokenKind::Integer => Ok(self.integer_literal()),
            _ => Err(self.error_here(SyntaxError::UnrecognizedExpression)),
        }
    }

    fn integer_literal(&mut self) -> SyntaxNode {
        let parsed = self.peek().text.parse::<u64>();
        let token = self.read();
        match parsed {
            Ok(value) => self.node(NodeKind::IntegerLiteral {
                token: Box::new(token),
                value,
            }),
            Err(_) => self.skip(vec![token], Some(SyntaxError::InvalidInteger)),
        }
    }

    /// Alternating string pieces and hole expressions. Anything that cannot
    /// form a valid string comes back as skipped trivia.
    pub(super) fn interpolable_string(&mut self) -> SyntaxNode {
        let start_span = self.peek().span;
        let mut parts: Vec<SyntaxNode> = Vec::new();
        let mut first_segment = true;
        loop {
            let (end_kind, continue_kind) = if first_segment {
                (TokenKind::StringComplete, TokenKind::StringLeftPiece)
            } else {
                (TokenKind::StringRightPiece, TokenKind::StringMiddlePiece)
            };
            let current = self.peek_kind();
            let mut had_errors = false;

            if current == end_kind {
                parts.push(self.read());
                let tokens: Vec<Token> = parts
                    .iter()
                    .filter_map(|part| part.as_token().cloned())
                    .collect();
                if let Some(segment_values) = try_get_raw_string_segments(&tokens) {
                    return self.node(NodeKind::StringLiteral {
                        parts,
                        segment_values,
                    });
                }
                // The lexer hands out unterminated pieces; they already carry a lexing error.
                had_errors = true;
            } else if current == continue_kind {
                parts.push(self.read());
                let mut hole = self.with_recovery(RecoveryFlags::NONE, HOLE_TERMINATORS, |p| {
                    p.expression(ExpressionFlags::NONE)
                });
                if !self.check(HOLE_TERMINATORS) {
                    // Fold the leftovers into the hole so pieces and holes stay balanced.
                    let leftover = self.synchronize_and_return_trivia(
                        self.pos,
                        RecoveryFlags::NONE,
                        SyntaxError::UnexpectedTokensInInterpolation,
                        None,
                        HOLE_TERMINATORS,
                    );
                    let span = TextSpan::between(hole.span, leftover.span);
                    hole = self.skipped(span, vec![hole, leftover], None);
                }
                parts.push(hole);
                if self.check(&[TokenKind::NewLine]) || self.is_at_end() {
                    had_errors = true;
                }
            } else {
                let skipped = self.synchronize_and_return_trivia(
                    self.pos,
                    RecoveryFlags::NONE,
                    SyntaxError::UnexpectedTokensInInterpolation,
                    None,
                    HOLE_TERMINATORS,
                );
                parts.push(skipped);
                if !self.check(&[TokenKind::StringMiddlePiece, TokenKind::StringRightPiece]) {
                    had_errors = true;
                }
            }

            if had_errors {
                let span = TextSpan::between_inclusive_and_exclusive(start_span, self.peek().span);
                return self.skipped(span, parts, None);
            }
            first_segment = false;
        }
    }

    pub(super) fn multiline_string(&mut self) -> SyntaxNode {
        let value = try_get_multiline_string_value(self.peek());
        let token = self.read();
        match value {
            Some(value) => self.node(NodeKind::StringLiteral {
                parts: vec![token],
                segment_values: vec![value],
            }),
            None => {
                let span = token.span;
                self.skipped(span, vec![token], None)
            }
        }
    }

    /// Runs `parse` and turns a skipped result into an error at the start token.
    pub(super) fn throw_if_skipped(
        &mut self,
        error: SyntaxError,
        parse: impl FnOnce(&mut Self) -> ParseResult<SyntaxNode>,
    ) -> ParseResult<SyntaxNode> {
        let start_span = self.peek().span;
        let node = parse(self)?;
        if node.is_skipped() {
            return Err(super::ExpectedToken {
                span: start_span,
                error,
            });
        }
        Ok(node)
    }

    fn array(&mut self) -> ParseResult<SyntaxNode> {
        let open = self.expect(TokenKind::LeftSquare, SyntaxError::ExpectedCharacter("["))?;
        let children = self.array_or_object_elements(TokenKind::RightSquare, |p| p.array_item());
        let close = self.expect(TokenKind::RightSquare, SyntaxError::ExpectedCharacter("]"))?;
        Ok(self.node(NodeKind::Array {
            open: Box::new(open),
            children,
            close: Box::new(close),
        }))
    }

    fn array_item(&mut self) -> SyntaxNode {
        self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine, TokenKind::RightSquare],
            |p| {
                let value = p.expression(ExpressionFlags::COMPLEX_LITERALS)?;
                Ok(p.node(NodeKind::ArrayItem {
                    value: Box::new(value),
                }))
            },
        )
    }

    pub(super) fn object(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        let open = self.expect(TokenKind::LeftBrace, SyntaxError::ExpectedCharacter("{"))?;
        let children = self.array_or_object_elements(TokenKind::RightBrace, |p| p.object_property(flags));
        let close = self.expect(TokenKind::RightBrace, SyntaxError::ExpectedCharacter("}"))?;
        Ok(self.node(NodeKind::Object {
            open: Box::new(open),
            children,
            close: Box::new(close),
        }))
    }

    fn object_property(&mut self, flags: ExpressionFlags) -> SyntaxNode {
        self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine, TokenKind::RightBrace],
            |p| {
                // `resource` is only a nested declaration when a name follows it.
                if flags.allow_resource_declarations
                    && p.check_keyword(keywords::RESOURCE)
                    && Self::check_token(p.peek_ahead(), &[TokenKind::Identifier])
                {
                    return Ok(p.declaration());
                }

                let key = p.with_recovery(
                    RecoveryFlags::NONE,
                    &[TokenKind::Colon, TokenKind::NewLine, TokenKind::RightBrace],
                    |p| p.throw_if_skipped(SyntaxError::ExpectedPropertyName, |p| p.property_key()),
                );
                let colon = p.with_recovery(
                    Self::suppression_flag(&key),
                    &[TokenKind::NewLine, TokenKind::RightBrace],
                    |p| p.expect(TokenKind::Colon, SyntaxError::ExpectedCharacter(":")),
                );
                let value = p.with_recovery(
                    Self::suppression_flag(&colon),
                    &[TokenKind::NewLine, TokenKind::RightBrace],
                    |p| p.expression(ExpressionFlags::COMPLEX_LITERALS),
                );
                Ok(p.node(NodeKind::ObjectProperty {
                    key: Box::new(key),
                    colon: Box::new(colon),
                    value: Box::new(value),
                }))
            },
        )
    }

    fn property_key(&mut self) -> ParseResult<SyntaxNode> {
        match self.peek_kind() {
            TokenKind::Identifier => self.identifier(SyntaxError::ExpectedPropertyName),
            TokenKind::StringComplete | TokenKind::StringLeftPiece => Ok(self.interpolable_string()),
            _ => Err(self.error_here(SyntaxError::ExpectedPropertyName)),
        }
    }

    /// `( item, item, ... )` with per-item recovery.
    pub(super) fn parenthesized_expression_list(
        &mut self,
        mut parse_item: impl FnMut(&mut Self) -> ParseResult<SyntaxNode>,
    ) -> ParseResult<(SyntaxNode, Vec<SyntaxNode>, SyntaxNode)> {
        let open = self.expect(TokenKind::LeftParen, SyntaxError::ExpectedCharacter("("))?;
        let mut items = Vec::new();
        while !self.check(&[TokenKind::RightParen]) {
            let item = self.with_recovery(
                RecoveryFlags::NONE,
                &[
                    TokenKind::StringRightPiece,
                    TokenKind::RightBrace,
                    TokenKind::RightParen,
                    TokenKind::RightSquare,
                    TokenKind::NewLine,
                    TokenKind::Comma,
                ],
                &mut parse_item,
            );
            items.push(item);
            if !self.check(&[TokenKind::Comma]) {
                break;
            }
            items.push(self.read());
        }
        let flags = items
            .last()
            .map_or(RecoveryFlags::NONE, Self::suppression_flag);
        let close = self.with_recovery(
            flags,
            &[
                TokenKind::StringRightPiece,
                TokenKind::RightBrace,
                TokenKind::RightSquare,
                TokenKind::NewLine,
            ],
            |p| p.expect(TokenKind::RightParen, SyntaxError::ExpectedCharacter(")")),
        );
        Ok((open, items, close))
    }

    pub(super) fn parenthesized(
        &mut self,
        open: SyntaxNode,
        mut items: Vec<SyntaxNode>,
        close: SyntaxNode,
    ) -> SyntaxNode {
        let expression = match items.len() {
            0 => self.skip_empty_at(
                TextSpan::empty(open.span.end()),
                Some(SyntaxError::ParenthesesMustHaveExactlyOneItem),
            ),
            1 if items[0].as_token().is_some() => self.skip(items, None),
            1 => items.remove(0),
            _ => self.skip(items, Some(SyntaxError::ParenthesesMustHaveExactlyOneItem)),
        };
        self.node(NodeKind::Parenthesized {
            open: Box::new(open),
            expression: Box::new(expression),
            close: Box::new(close),
        })
    }

    /// Reinterprets a parenthesized list as lambda or loop variables.
    fn variable_block(&mut self, open: SyntaxNode, items: Vec<SyntaxNode>, close: SyntaxNode) -> SyntaxNode {
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            let (id, span, kind) = item.into_parts();
            let child = match kind {
                NodeKind::VariableAccess { name } => self.node(NodeKind::LocalVariable { name }),
                kind @ (NodeKind::SkippedTrivia { .. } | NodeKind::Token(_)) => SyntaxNode { id, span, kind },
                kind => self.skip(
                    vec![SyntaxNode { id, span, kind }],
                    Some(SyntaxError::ExpectedLocalVariableIdentifier),
                ),
            };
            children.push(child);
        }
        self.node(NodeKind::VariableBlock {
            open: Box::new(open),
            children,
            close: Box::new(close),
        })
    }

    fn lambda_body_newlines(&mut self) -> Vec<SyntaxNode> {
        // A declaration on the next line means the body is missing, not deferred.
        if keywords::is_declaration_keyword(&self.peek_skip_newlines().text) {
            return Vec::new();
        }
        self.newlines()
    }

    fn lambda_body(&mut self) -> SyntaxNode {
        self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine, TokenKind::RightParen],
            |p| p.expression(ExpressionFlags::COMPLEX_LITERALS),
        )
    }

    fn parenthesized_expression_or_lambda(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        let (open, items, close) = self.parenthesized_expression_list(|p| p.expression(flags))?;
        if !self.check(&[TokenKind::Arrow]) {
            return Ok(self.parenthesized(open, items, close));
        }
        let arrow = self.read();
        let newlines_before_body = self.lambda_body_newlines();
        let body = self.lambda_body();
        let variable_section = self.variable_block(open, items, close);
        Ok(self.node(NodeKind::Lambda {
            variable_section: Box::new(variable_section),
            arrow: Box::new(arrow),
            newlines_before_body,
            body: Box::new(body),
        }))
    }

    pub(super) fn parenthesized_expression(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        let (open, items, close) = self.parenthesized_expression_list(|p| p.expression(flags))?;
        Ok(self.parenthesized(open, items, close))
    }

    fn function_call_or_variable_access(&mut self, flags: ExpressionFlags) -> ParseResult<SyntaxNode> {
        let name = self.identifier(SyntaxError::ExpectedVariableOrFunctionName)?;

        if self.check(&[TokenKind::LeftParen]) {
            let (open, children, close) = self.function_call_access(flags)?;
            return Ok(self.node(NodeKind::FunctionCall {
                name: Box::new(name),
                open: Box::new(open),
                children,
                close: Box::new(close),
            }));
        }

        if self.check(&[TokenKind::Arrow]) {
            let arrow = self.read();
            let newlines_before_body = self.lambda_body_newlines();
            let body = self.lambda_body();
            let variable_section = self.node(NodeKind::LocalVariable {
                name: Box::new(name),
            });
            return Ok(self.node(NodeKind::Lambda {
                variable_section: Box::new(variable_section),
                arrow: Box::new(arrow),
                newlines_before_body,
                body: Box::new(body),
            }));
        }

        Ok(self.node(NodeKind::VariableAccess {
            name: Box::new(name),
        }))
    }

    /// `( args )` after a function name.
    pub(super) fn function_call_access(
        &mut self,
        flags: ExpressionFlags,
    ) -> ParseResult<(SyntaxNode, Vec<SyntaxNode>, SyntaxNode)> {
        let open = self.expect(TokenKind::LeftParen, SyntaxError::ExpectedCharacter("("))?;
        let children = self.function_elements(TokenKind::RightParen, |p| p.function_argument(flags));
        let close = self.expect(TokenKind::RightParen, SyntaxError::ExpectedCharacter(")"))?;
        Ok((open, children, close))
    }

    fn function_argument(&mut self, flags: ExpressionFlags) -> SyntaxNode {
        // Always an argument node, even around skipped trivia, so signature help can count slots.
        let expression = self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine, TokenKind::Comma, TokenKind::RightParen],
            |p| p.expression(flags),
        );
        self.node(NodeKind::FunctionArgument {
            expression: Box::new(expression),
        })
    }

    pub(super) fn for_expression(
        &mut self,
        flags: ExpressionFlags,
        resource_context: bool,
    ) -> ParseResult<SyntaxNode> {
        let open = self.expect(TokenKind::LeftSquare, SyntaxError::ExpectedCharacter("["))?;
        let open_newlines = self.newlines();
        let for_keyword = self.expect_keyword(keywords::FOR)?;
        let variable_section = match self.peek_kind() {
            TokenKind::Identifier => {
                let name = self.identifier(SyntaxError::ExpectedIdentifier("loop variable"))?;
                self.node(NodeKind::LocalVariable {
                    name: Box::new(name),
                })
            }
            TokenKind::LeftParen => self.for_variable_block()?,
            _ => self.skip_empty(Some(SyntaxError::ExpectedLoopItemIdentifierOrVariableBlockStart)),
        };

        let in_flags = if self.has_syntax_error(&variable_section) {
            RecoveryFlags::SUPPRESS_DIAGNOSTICS
        } else {
            RecoveryFlags::NONE
        };
        let in_keyword = self.with_recovery(
            in_flags,
            &[TokenKind::RightSquare, TokenKind::NewLine],
            |p| p.expect_keyword(keywords::IN),
        );
        let expression = self.with_recovery(
            Self::suppression_flag(&in_keyword),
            &[TokenKind::Colon, TokenKind::RightSquare, TokenKind::NewLine],
            |p| p.expression(ExpressionFlags::COMPLEX_LITERALS),
        );
        let colon = self.with_recovery(
            Self::suppression_flag(&expression),
            &[TokenKind::RightSquare, TokenKind::NewLine],
            |p| p.expect(TokenKind::Colon, SyntaxError::ExpectedCharacter(":")),
        );
        let body = self.with_recovery(
            Self::suppression_flag(&colon),
            &[TokenKind::RightSquare, TokenKind::NewLine],
            |p| p.for_body(flags, resource_context),
        );
        let close_newlines = if body.is_skipped() {
            Vec::new()
        } else {
            self.newlines()
        };
        let close = self.with_recovery(
            Self::suppression_flag(&body),
            &[TokenKind::RightSquare, TokenKind::NewLine],
            |p| p.expect(TokenKind::RightSquare, SyntaxError::ExpectedCharacter("]")),
        );

        Ok(self.node(NodeKind::ForExpression {
            open: Box::new(open),
            open_newlines,
            for_keyword: Box::new(for_keyword),
            variable_section: Box::new(variable_section),
            in_keyword: Box::new(in_keyword),
            expression: Box::new(expression),
            colon: Box::new(colon),
            body: Box::new(body),
            close_newlines,
            close: Box::new(close),
        }))
    }

    fn for_variable_block(&mut self) -> ParseResult<SyntaxNode> {
        let (open, items, close) = self.parenthesized_expression_list(|p| p.expression(ExpressionFlags::NONE))?;
        let block = self.variable_block(open, items, close);
        let count = block
            .children()
            .iter()
            .filter(|child| matches!(child.kind, NodeKind::LocalVariable { .. }))
            .count();
        if count != 2 && !self.has_syntax_error(&block) {
            return Ok(self.skip(vec![block], Some(SyntaxError::LoopVariableBlockArity(count))));
        }
        Ok(block)
    }

    fn for_body(&mut self, flags: ExpressionFlags, resource_context: bool) -> ParseResult<SyntaxNode> {
        if !resource_context {
            return self.expression(flags.with_complex_literals());
        }
        match self.peek_kind() {
            TokenKind::LeftBrace => self.object(flags),
            TokenKind::Identifier if self.peek().is_keyword(keywords::IF) => self.if_condition(flags, true),
            _ => Err(self.error_here(SyntaxError::ExpectedBodyStartOrIf)),
        }
    }

    pub(super) fn if_condition(&mut self, flags: ExpressionFlags, inside_for: bool) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::IF)?;
        // Inside a loop `]` must stay available to close the loop.
        let (condition_terminators, body_terminators): (&[TokenKind], &[TokenKind]) = if inside_for {
            (
                &[TokenKind::RightSquare, TokenKind::LeftBrace, TokenKind::NewLine],
                &[TokenKind::RightSquare, TokenKind::NewLine],
            )
        } else {
            (&[TokenKind::LeftBrace, TokenKind::NewLine], &[TokenKind::NewLine])
        };
        let condition = self.with_recovery(RecoveryFlags::NONE, condition_terminators, |p| {
            p.parenthesized_expression(flags.without_resource_declarations())
        });
        let closed = matches!(
            &condition.kind,
            NodeKind::Parenthesized { close, .. } if !close.is_skipped()
        );
        let body = self.with_recovery(
            Self::suppression_flag_if(&condition, closed),
            body_terminators,
            |p| p.object(flags),
        );
        Ok(self.node(NodeKind::IfCondition {
            keyword: Box::new(keyword),
            condition: Box::new(condition),
            body: Box::new(body),
        }))
    }

    /// `(name type, ...) returnType => body` of a `func` declaration.
    pub(super) fn typed_lambda(&mut self) -> ParseResult<SyntaxNode> {
        let (open, items, close) = self.parenthesized_expression_list(|p| {
            p.typed_local_variable(&[TokenKind::NewLine, TokenKind::Comma, TokenKind::RightParen])
        })?;
        let return_type = self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine, TokenKind::RightParen],
            |p| p.type_syntax(false),
        );
        let arrow = self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine, TokenKind::RightParen],
            |p| p.expect(TokenKind::Arrow, SyntaxError::ExpectedCharacter("=>")),
        );
        let newlines_before_body = if arrow.is_skipped() {
            Vec::new()
        } else {
            self.lambda_body_newlines()
        };
        let body = self.lambda_body();
        let variable_section = self.node(NodeKind::TypedVariableBlock {
            open: Box::new(open),
            children: items,
            close: Box::new(close),
        });
        Ok(self.node(NodeKind::TypedLambda {
            variable_section: Box::new(variable_section),
            return_type: Box::new(return_type),
            arrow: Box::new(arrow),
            newlines_before_body,
            body: Box::new(body),
        }))
    }

    fn typed_local_variable(&mut self, terminators: &[TokenKind]) -> ParseResult<SyntaxNode> {
        let name = self.identifier_or_skip(SyntaxError::ExpectedIdentifier("variable"));
        let ty = self.with_recovery(RecoveryFlags::NONE, terminators, |p| p.type_syntax(false));
        Ok(self.node(NodeKind::TypedLocalVariable {
            name: Box::new(name),
            ty: Box::new(ty),
        }))
    }
}
