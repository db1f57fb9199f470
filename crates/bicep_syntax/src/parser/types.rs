use super::expressions::EXPRESSION_TERMINATORS;
use super::{ExpressionFlags, ParseResult, Parser, RecoveryFlags};
use crate::diagnostics::SyntaxError;
use crate::keywords;
use crate::syntax::{NodeKind, SyntaxNode};
use crate::token::TokenKind;

// A union member that fails to parse skips to the end of the member, not the file.
const UNION_MEMBER_TERMINATORS: &[TokenKind] = &[
    TokenKind::Pipe,
    TokenKind::NewLine,
    TokenKind::RightBrace,
    TokenKind::RightSquare,
    TokenKind::RightParen,
    TokenKind::Comma,
];

impl Parser {
    /// A type clause: `resource '<type>'` or a type expression. Outputs may
    /// leave out the resource type string.
    pub(super) fn type_syntax(&mut self, allow_optional_resource_type: bool) -> ParseResult<SyntaxNode> {
        let Some(keyword) = self.optional_keyword(keywords::RESOURCE) else {
            return self.type_expression();
        };
        let ty = self.with_recovery_optional(
            RecoveryFlags::NONE,
            &[TokenKind::Assignment, TokenKind::NewLine],
            |p| {
                if allow_optional_resource_type
                    && !p.check(&[TokenKind::StringComplete, TokenKind::StringLeftPiece])
                {
                    return Ok(None);
                }
                p.throw_if_skipped(SyntaxError::ExpectedString("resource type"), |p| {
                    Ok(p.interpolable_string())
                })
                .map(Some)
            },
        );
        Ok(self.node(NodeKind::ResourceType {
            keyword: Box::new(keyword),
            ty: ty.map(Box::new),
        }))
    }

    pub(super) fn type_expression(&mut self) -> ParseResult<SyntaxNode> {
        self.nested(|p| p.union_type_expression())
    }

    fn has_trailing_union_member(&self) -> bool {
        self.check(&[TokenKind::Pipe])
            || (self.check(&[TokenKind::NewLine])
                && Self::check_token(self.peek_ahead(), &[TokenKind::Pipe]))
    }

    fn union_type_expression(&mut self) -> ParseResult<SyntaxNode> {
        let candidate = self.unary_type_expression()?;
        if !self.has_trailing_union_member() {
            return Ok(candidate);
        }

        let mut children = vec![self.node(NodeKind::UnionTypeMember {
            value: Box::new(candidate),
        })];
        while self.has_trailing_union_member() {
            children.extend(self.newlines());
            children.push(self.read());
            if self.check(&[TokenKind::NewLine]) {
                children.push(self.skip_empty(Some(SyntaxError::ExpectedTypeLiteral)));
                continue;
            }
            children.push(self.with_recovery(RecoveryFlags::NONE, UNION_MEMBER_TERMINATORS, |p| {
                let value = p.unary_type_expression()?;
                Ok(p.node(NodeKind::UnionTypeMember {
                    value: Box::new(value),
                }))
            }));
        }
        Ok(self.node(NodeKind::UnionType { children }))
    }

    fn unary_type_expression(&mut self) -> ParseResult<SyntaxNode> {
        let mut current = self.unary_type_base()?;
        loop {
            match self.peek_kind() {
                TokenKind::Question => {
                    let question = self.read();
                    current = self.node(NodeKind::NullableType {
                        base: Box::new(current),
                        question: Box::new(question),
                    });
                }
                TokenKind::Exclamation => {
                    let bang = self.read();
                    current = self.node(NodeKind::NonNullAssertion {
                        base: Box::new(current),
                        bang: Box::new(bang),
                    });
                }
                _ => return Ok(current),
            }
        }
    }

    fn unary_type_base(&mut self) -> ParseResult<SyntaxNode> {
        if !matches!(self.peek_kind(), TokenKind::Exclamation | TokenKind::Minus) {
            return self.member_type_expression();
        }
        let operator = self.read();
        let expression = self.with_recovery(RecoveryFlags::NONE, EXPRESSION_TERMINATORS, |p| {
            p.member_type_expression()
        });
        Ok(self.node(NodeKind::UnaryOperation {
            operator: Box::new(operator),
            expression: Box::new(expression),
        }))
    }

    fn member_type_expression(&mut self) -> ParseResult<SyntaxNode> {
        let mut current = self.primary_type_expression()?;
        loop {
            if self.check(&[TokenKind::LeftSquare]) {
                let open = self.read();
                if self.check(&[TokenKind::RightSquare]) {
                    let close = self.read();
                    let item = self.node(NodeKind::ArrayTypeMember {
                        value: Box::new(current),
                    });
                    current = self.node(NodeKind::ArrayType {
                        item: Box::new(item),
                        open: Box::new(open),
                        close: Box::new(close),
                    });
                } else {
                    let index = self.expression(ExpressionFlags::NONE)?;
                    let close = self.expect(TokenKind::RightSquare, SyntaxError::ExpectedCharacter("]"))?;
                    current = self.node(NodeKind::ArrayAccess {
                        base: Box::new(current),
                        open: Box::new(open),
                        safe_access: None,
                        index: Box::new(index),
                        close: Box::new(close),
                    });
                }
                continue;
            }

            if self.check(&[TokenKind::Dot]) {
                let dot = self.read();
                let property = self.identifier_or_skip(SyntaxError::ExpectedPropertyName);
                current = self.node(NodeKind::PropertyAccess {
                    base: Box::new(current),
                    dot: Box::new(dot),
                    safe_access: None,
                    property: Box::new(property),
                });
                continue;
            }

            return Ok(current);
        }
    }

    fn primary_type_expression(&mut self) -> ParseResult<SyntaxNode> {
        match self.peek_kind() {
            TokenKind::Integer
            | TokenKind::NullKeyword
            | TokenKind::TrueKeyword
            | TokenKind::FalseKeyword => self.literal_value(),
            TokenKind::StringComplete | TokenKind::StringLeftPiece => Ok(self.interpolable_string()),
            TokenKind::MultilineString => Ok(self.multiline_string()),
            TokenKind::LeftBrace => self.object_type(),
            TokenKind::LeftSquare => self.tuple_type(),
            TokenKind::LeftParen => {
                let (open, items, close) = self.parenthesized_expression_list(|p| p.type_expression())?;
                Ok(self.parenthesized(open, items, close))
            }
            TokenKind::Identifier => {
                let name = self.identifier(SyntaxError::ExpectedIdentifier("type"))?;
                Ok(self.node(NodeKind::VariableAccess {
                    name: Box::new(name),
                }))
            }
            _ => Err(self.error_here(SyntaxError::UnrecognizedTypeExpression)),
        }
    }

    fn object_type(&mut self) -> ParseResult<SyntaxNode> {
        let open = self.expect(TokenKind::LeftBrace, SyntaxError::ExpectedCharacter("{"))?;
        let children = self.array_or_object_elements(TokenKind::RightBrace, |p| p.object_type_property());
        let close = self.expect(TokenKind::RightBrace, SyntaxError::ExpectedCharacter("}"))?;
        Ok(self.node(NodeKind::ObjectType {
            open: Box::new(open),
            children,
            close: Box::new(close),
        }))
    }

    fn object_type_property(&mut self) -> SyntaxNode {
        let leading_nodes = self.decorable_leading_nodes();
        let key = self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::Colon, TokenKind::NewLine, TokenKind::RightBrace],
            |p| {
                p.throw_if_skipped(SyntaxError::ExpectedPropertyName, |p| match p.peek_kind() {
                    TokenKind::Identifier => p.identifier(SyntaxError::ExpectedPropertyName),
                    TokenKind::StringComplete | TokenKind::StringLeftPiece => Ok(p.interpolable_string()),
                    TokenKind::Asterisk => Ok(p.read()),
                    _ => Err(p.error_here(SyntaxError::ExpectedPropertyNameOrMatcher)),
                })
            },
        );
        let colon = self.with_recovery(
            Self::suppression_flag(&key),
            &[TokenKind::NewLine, TokenKind::RightBrace],
            |p| p.expect(TokenKind::Colon, SyntaxError::ExpectedCharacter(":")),
        );
        let value = self.with_recovery(
            Self::suppression_flag(&colon),
            &[TokenKind::NewLine, TokenKind::RightBrace],
            |p| p.type_expression(),
        );

        let is_matcher = key
            .as_token()
            .is_some_and(|token| token.kind == TokenKind::Asterisk);
        if is_matcher {
            return self.node(NodeKind::ObjectTypeAdditionalProperties {
                leading_nodes,
                asterisk: Box::new(key),
                colon: Box::new(colon),
                value: Box::new(value),
            });
        }
        self.node(NodeKind::ObjectTypeProperty {
            leading_nodes,
            key: Box::new(key),
            colon: Box::new(colon),
            value: Box::new(value),
        })
    }

    fn tuple_type(&mut self) -> ParseResult<SyntaxNode> {
        let open = self.expect(TokenKind::LeftSquare, SyntaxError::ExpectedCharacter("["))?;
        let children = self.array_or_object_elements(TokenKind::RightSquare, |p| p.tuple_type_item());
        let close = self.expect(TokenKind::RightSquare, SyntaxError::ExpectedCharacter("]"))?;
        Ok(self.node(NodeKind::TupleType {
            open: Box::new(open),
            children,
            close: Box::new(close),
        }))
    }

    fn tuple_type_item(&mut self) -> SyntaxNode {
        let leading_nodes = self.decorable_leading_nodes();
        let value = self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine, TokenKind::RightSquare],
            |p| p.type_expression(),
        );
        self.node(NodeKind::TupleTypeItem {
            leading_nodes,
            value: Box::new(value),
        })
    }
}
