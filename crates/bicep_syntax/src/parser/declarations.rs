use super::{ExpressionFlags, ParseResult, Parser, RecoveryFlags};
use crate::diagnostics::SyntaxError;
use crate::keywords;
use crate::syntax::{NodeKind, SyntaxNode};
use crate::token::TokenKind;

const STRING_START: &[TokenKind] = &[TokenKind::StringComplete, TokenKind::StringLeftPiece];

impl Parser {
    /// `= value` after `preceding`, each step recovering to the end of the line.
    fn assigned_value(
        &mut self,
        preceding: &SyntaxNode,
        value: impl FnOnce(&mut Self) -> ParseResult<SyntaxNode>,
    ) -> (SyntaxNode, SyntaxNode) {
        let assignment = self.with_recovery(
            Self::suppression_flag(preceding),
            &[TokenKind::NewLine],
            |p| p.assignment(),
        );
        let value = self.with_recovery(Self::suppression_flag(&assignment), &[TokenKind::NewLine], value);
        (assignment, value)
    }

    fn string_value(&mut self, error: SyntaxError) -> ParseResult<SyntaxNode> {
        if !self.check(STRING_START) {
            return Err(self.error_here(error));
        }
        self.throw_if_skipped(error, |p| Ok(p.interpolable_string()))
    }

    pub(super) fn metadata_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::METADATA)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("metadata"),
            RecoveryFlags::NONE,
            &[TokenKind::Assignment, TokenKind::NewLine],
        );
        let (assignment, value) =
            self.assigned_value(&name, |p| p.expression(ExpressionFlags::COMPLEX_LITERALS));
        Ok(self.node(NodeKind::MetadataDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    pub(super) fn target_scope_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::TARGET_SCOPE)?;
        let (assignment, value) =
            self.assigned_value(&keyword, |p| p.expression(ExpressionFlags::COMPLEX_LITERALS));
        Ok(self.node(NodeKind::TargetScopeDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    pub(super) fn type_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::TYPE)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("type"),
            RecoveryFlags::NONE,
            &[TokenKind::Assignment, TokenKind::NewLine],
        );
        let (assignment, value) = self.assigned_value(&name, |p| p.type_expression());
        Ok(self.node(NodeKind::TypeDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    pub(super) fn parameter_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::PARAM)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("parameter"),
            RecoveryFlags::NONE,
            &[TokenKind::Identifier, TokenKind::NewLine],
        );
        let ty = self.with_recovery(
            Self::suppression_flag(&name),
            &[TokenKind::Assignment, TokenKind::LeftBrace, TokenKind::NewLine],
            |p| p.type_syntax(false),
        );
        let modifier = self.with_recovery_optional(
            Self::suppression_flag(&ty),
            &[TokenKind::NewLine],
            |p| match p.peek_kind() {
                TokenKind::EndOfFile | TokenKind::NewLine => Ok(None),
                TokenKind::Assignment => p.parameter_default_value().map(Some),
                _ => Err(p.error_here(SyntaxError::ExpectedParameterContinuation)),
            },
        );
        Ok(self.node(NodeKind::ParameterDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            ty: Box::new(ty),
            modifier: modifier.map(Box::new),
        }))
    }

    fn parameter_default_value(&mut self) -> ParseResult<SyntaxNode> {
        let assignment = self.assignment()?;
        let default_value = self.with_recovery(RecoveryFlags::NONE, &[TokenKind::NewLine], |p| {
            p.expression(ExpressionFlags::COMPLEX_LITERALS)
        });
        Ok(self.node(NodeKind::ParameterDefaultValue {
            assignment: Box::new(assignment),
            default_value: Box::new(default_value),
        }))
    }

    pub(super) fn variable_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::VAR)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("variable"),
            RecoveryFlags::NONE,
            &[TokenKind::Assignment, TokenKind::NewLine],
        );
        let (assignment, value) =
            self.assigned_value(&name, |p| p.expression(ExpressionFlags::COMPLEX_LITERALS));
        Ok(self.node(NodeKind::VariableDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    pub(super) fn function_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::FUNC)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("function"),
            RecoveryFlags::NONE,
            &[TokenKind::LeftParen, TokenKind::NewLine],
        );
        let lambda = self.with_recovery(
            Self::suppression_flag(&name),
            &[TokenKind::NewLine],
            |p| p.typed_lambda(),
        );
        Ok(self.node(NodeKind::FunctionDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            lambda: Box::new(lambda),
        }))
    }

    pub(super) fn resource_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::RESOURCE)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("resource"),
            RecoveryFlags::NONE,
            &[TokenKind::StringComplete, TokenKind::StringLeftPiece, TokenKind::NewLine],
        );
        let ty = self.with_recovery(
            Self::suppression_flag(&name),
            &[TokenKind::Assignment, TokenKind::NewLine],
            |p| p.string_value(SyntaxError::ExpectedString("resource type")),
        );
        let existing = self.optional_keyword(keywords::EXISTING);
        let assignment = self.with_recovery(
            Self::suppression_flag(&ty),
            &[TokenKind::LeftBrace, TokenKind::NewLine],
            |p| p.assignment(),
        );
        let value = self.with_recovery(
            Self::suppression_flag(&assignment),
            &[TokenKind::NewLine],
            |p| p.declaration_body(ExpressionFlags::RESOURCE_DECLARATIONS, ExpressionFlags::RESOURCE_DECLARATIONS),
        );
        Ok(self.node(NodeKind::ResourceDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            ty: Box::new(ty),
            existing: existing.map(Box::new),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    pub(super) fn module_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::MODULE)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("module"),
            RecoveryFlags::NONE,
            &[TokenKind::StringComplete, TokenKind::StringLeftPiece, TokenKind::NewLine],
        );
        let path = self.with_recovery(
            Self::suppression_flag(&name),
            &[TokenKind::Assignment, TokenKind::NewLine],
            |p| p.string_value(SyntaxError::ExpectedString("module path")),
        );
        let assignment = self.with_recovery(
            Self::suppression_flag(&path),
            &[TokenKind::LeftBrace, TokenKind::NewLine],
            |p| p.assignment(),
        );
        let value = self.with_recovery(
            Self::suppression_flag(&assignment),
            &[TokenKind::NewLine],
            |p| p.declaration_body(ExpressionFlags::NONE, ExpressionFlags::COMPLEX_LITERALS),
        );
        Ok(self.node(NodeKind::ModuleDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            path: Box::new(path),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    /// Body of a resource or module: an object, a conditional object or a loop.
    fn declaration_body(
        &mut self,
        flags: ExpressionFlags,
        object_flags: ExpressionFlags,
    ) -> ParseResult<SyntaxNode> {
        self.nested(|p| match p.peek_kind() {
            TokenKind::Identifier if p.peek().is_keyword(keywords::IF) => p.if_condition(flags, false),
            TokenKind::LeftBrace => p.object(object_flags),
            TokenKind::LeftSquare => p.for_expression(flags, true),
            _ => Err(p.error_here(SyntaxError::ExpectedBodyStartOrIfOrLoopStart)),
        })
    }

    pub(super) fn test_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::TEST)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("test"),
            RecoveryFlags::NONE,
            &[TokenKind::StringComplete, TokenKind::StringLeftPiece, TokenKind::NewLine],
        );
        let path = self.with_recovery(
            Self::suppression_flag(&name),
            &[TokenKind::Assignment, TokenKind::NewLine],
            |p| p.string_value(SyntaxError::ExpectedString("test path")),
        );
        let assignment = self.with_recovery(
            Self::suppression_flag(&path),
            &[TokenKind::LeftBrace, TokenKind::NewLine],
            |p| p.assignment(),
        );
        let value = self.with_recovery(
            Self::suppression_flag(&assignment),
            &[TokenKind::NewLine],
            |p| p.object(ExpressionFlags::COMPLEX_LITERALS),
        );
        Ok(self.node(NodeKind::TestDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            path: Box::new(path),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    pub(super) fn output_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::OUTPUT)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("output"),
            RecoveryFlags::NONE,
            &[TokenKind::Identifier, TokenKind::NewLine],
        );
        let ty = self.with_recovery(
            Self::suppression_flag(&name),
            &[TokenKind::Assignment, TokenKind::NewLine],
            |p| p.type_syntax(true),
        );
        let (assignment, value) =
            self.assigned_value(&ty, |p| p.expression(ExpressionFlags::COMPLEX_LITERALS));
        Ok(self.node(NodeKind::OutputDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            ty: Box::new(ty),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    pub(super) fn assert_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::ASSERT)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("assert"),
            RecoveryFlags::NONE,
            &[TokenKind::Assignment, TokenKind::NewLine],
        );
        let (assignment, value) =
            self.assigned_value(&name, |p| p.expression(ExpressionFlags::COMPLEX_LITERALS));
        Ok(self.node(NodeKind::AssertDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }

    /// `import { a, b as c } from 'path'`, `import * as ns from 'path'`, or the
    /// older `import 'spec' ...` spelling of a provider declaration.
    pub(super) fn import_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::IMPORT)?;
        if self.check(STRING_START) {
            return Ok(self.provider_declaration_rest(leading_nodes, keyword));
        }

        let import_expression = self.with_recovery(RecoveryFlags::NONE, &[TokenKind::NewLine], |p| {
            match p.peek_kind() {
                TokenKind::LeftBrace => p.imported_symbols_list(),
                TokenKind::Asterisk => p.wildcard_import(),
                _ => Err(p.error_here(SyntaxError::ExpectedImportExpression)),
            }
        });
        let from_clause = self.with_recovery(
            Self::suppression_flag(&import_expression),
            &[TokenKind::NewLine],
            |p| {
                let keyword = p.expect_keyword(keywords::FROM)?;
                let path = p.string_value(SyntaxError::ExpectedString("import path"))?;
                Ok(p.node(NodeKind::CompileTimeImportFromClause {
                    keyword: Box::new(keyword),
                    path: Box::new(path),
                }))
            },
        );
        Ok(self.node(NodeKind::CompileTimeImportDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            import_expression: Box::new(import_expression),
            from_clause: Box::new(from_clause),
        }))
    }

    fn imported_symbols_list(&mut self) -> ParseResult<SyntaxNode> {
        let open = self.expect(TokenKind::LeftBrace, SyntaxError::ExpectedCharacter("{"))?;
        let children = self.array_or_object_elements(TokenKind::RightBrace, |p| {
            p.with_recovery(
                RecoveryFlags::NONE,
                &[TokenKind::Comma, TokenKind::NewLine, TokenKind::RightBrace],
                |p| p.imported_symbols_list_item(),
            )
        });
        let close = self.expect(TokenKind::RightBrace, SyntaxError::ExpectedCharacter("}"))?;
        Ok(self.node(NodeKind::ImportedSymbolsList {
            open: Box::new(open),
            children,
            close: Box::new(close),
        }))
    }

    fn imported_symbols_list_item(&mut self) -> ParseResult<SyntaxNode> {
        let original_name = match self.peek_kind() {
            TokenKind::StringComplete | TokenKind::StringLeftPiece => self.interpolable_string(),
            _ => self.identifier(SyntaxError::ExpectedIdentifier("imported symbol"))?,
        };
        let as_clause = if self.check_keyword(keywords::AS) {
            Some(self.alias_as_clause()?)
        } else {
            None
        };
        Ok(self.node(NodeKind::ImportedSymbolsListItem {
            original_name: Box::new(original_name),
            as_clause: as_clause.map(Box::new),
        }))
    }

    fn wildcard_import(&mut self) -> ParseResult<SyntaxNode> {
        let wildcard = self.expect(TokenKind::Asterisk, SyntaxError::ExpectedCharacter("*"))?;
        let as_clause = self.alias_as_clause()?;
        Ok(self.node(NodeKind::WildcardImport {
            wildcard: Box::new(wildcard),
            as_clause: Box::new(as_clause),
        }))
    }

    fn alias_as_clause(&mut self) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::AS)?;
        let alias = self.identifier(SyntaxError::ExpectedIdentifier("alias"))?;
        Ok(self.node(NodeKind::AliasAsClause {
            keyword: Box::new(keyword),
            alias: Box::new(alias),
        }))
    }

    pub(super) fn provider_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::PROVIDER)?;
        Ok(self.provider_declaration_rest(leading_nodes, keyword))
    }

    fn provider_declaration_rest(&mut self, leading_nodes: Vec<SyntaxNode>, keyword: SyntaxNode) -> SyntaxNode {
        let specification = self.with_recovery(
            RecoveryFlags::NONE,
            &[TokenKind::NewLine],
            |p| match p.peek_kind() {
                TokenKind::StringComplete | TokenKind::StringLeftPiece => Ok(p.interpolable_string()),
                TokenKind::Identifier => p.identifier(SyntaxError::ExpectedProviderSpecification),
                _ => Err(p.error_here(SyntaxError::ExpectedProviderSpecification)),
            },
        );

        let with_clause = self.optional_keyword(keywords::WITH).map(|with_keyword| {
            let config = self.with_recovery(
                RecoveryFlags::NONE,
                &[TokenKind::NewLine],
                |p| p.object(ExpressionFlags::COMPLEX_LITERALS),
            );
            self.node(NodeKind::ProviderWithClause {
                keyword: Box::new(with_keyword),
                config: Box::new(config),
            })
        });

        let as_clause = self.optional_keyword(keywords::AS).map(|as_keyword| {
            let alias = self.identifier_with_recovery(
                SyntaxError::ExpectedIdentifier("alias"),
                RecoveryFlags::NONE,
                &[TokenKind::NewLine],
            );
            self.node(NodeKind::AliasAsClause {
                keyword: Box::new(as_keyword),
                alias: Box::new(alias),
            })
        });

        self.node(NodeKind::ProviderDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            specification: Box::new(specification),
            with_clause: with_clause.map(Box::new),
            as_clause: as_clause.map(Box::new),
        })
    }

    pub(super) fn using_declaration(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::USING)?;
        let path = self.with_recovery(RecoveryFlags::NONE, &[TokenKind::NewLine], |p| {
            p.string_value(SyntaxError::ExpectedString("template path"))
        });
        Ok(self.node(NodeKind::UsingDeclaration {
            leading_nodes,
            keyword: Box::new(keyword),
            path: Box::new(path),
        }))
    }

    pub(super) fn parameter_assignment(&mut self, leading_nodes: Vec<SyntaxNode>) -> ParseResult<SyntaxNode> {
        let keyword = self.expect_keyword(keywords::PARAM)?;
        let name = self.identifier_with_recovery(
            SyntaxError::ExpectedIdentifier("parameter"),
            RecoveryFlags::NONE,
            &[TokenKind::Assignment, TokenKind::NewLine],
        );
        let (assignment, value) =
            self.assigned_value(&name, |p| p.expression(ExpressionFlags::COMPLEX_LITERALS));
        Ok(self.node(NodeKind::ParameterAssignment {
            leading_nodes,
            keyword: Box::new(keyword),
            name: Box::new(name),
            assignment: Box::new(assignment),
            value: Box::new(value),
        }))
    }
}
