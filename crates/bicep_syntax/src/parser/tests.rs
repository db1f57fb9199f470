use crate::config::ParserOptions;
use crate::parser::{parse, parse_params, parse_with_options, ParsedProgram};
use crate::syntax::{NodeKind, SyntaxNode};

fn codes(parsed: &ParsedProgram) -> Vec<String> {
    parsed
        .all_diagnostics()
        .into_iter()
        .map(|d| d.code.clone())
        .collect()
}

fn parse_clean(text: &str) -> ParsedProgram {
    let parsed = parse(text);
    assert!(
        parsed.all_diagnostics().is_empty(),
        "unexpected diagnostics for {text:?}: {:?}",
        codes(&parsed)
    );
    assert_eq!(parsed.program.to_source_text(), text);
    parsed
}

fn first_declaration(parsed: &ParsedProgram) -> &SyntaxNode {
    parsed.declarations().into_iter().next().expect("declaration")
}

/// The `value` of a `var` declaration.
fn variable_value(parsed: &ParsedProgram) -> &SyntaxNode {
    match &first_declaration(parsed).kind {
        NodeKind::VariableDeclaration { value, .. } => value,
        other => panic!("expected a variable declaration, got {other:?}"),
    }
}

fn count_nodes(node: &SyntaxNode, predicate: impl Fn(&NodeKind) -> bool) -> usize {
    node.descendants()
        .into_iter()
        .filter(|node| predicate(&node.kind))
        .count()
}

#[test]
fn empty_input_produces_an_empty_program() {
    let parsed = parse("");
    assert!(parsed.all_diagnostics().is_empty());
    assert_eq!(parsed.program.span.start, 0);
    assert_eq!(parsed.program.span.length, 0);
    assert!(parsed.declarations().is_empty());
}

#[test]
fn program_span_covers_trailing_comments() {
    let text = "var a = 1\n// trailing\n";
    let parsed = parse_clean(text);
    assert_eq!(parsed.program.span.end(), text.len());
}

#[test]
fn parses_every_template_declaration_kind() {
    let text = "\
metadata info = 'demo'
targetScope = 'resourceGroup'
type name = string
@description('the location')
param location string = 'westus'
var prefix = 'app'
func greet(name string) string => 'hi ${name}'
resource sa 'Microsoft.Storage/storageAccounts@2023-01-01' = {
  name: prefix
}
module mod './mod.bicep' = {
  name: 'mod'
}
test check './check.bicep' = {
  params: {}
}
output id string = sa.id
assert ok = true
import { helper } from './lib.bicep'
provider kubernetes
";
    let parsed = parse_clean(text);
    let kinds: Vec<&str> = parsed
        .declarations()
        .into_iter()
        .map(|node| match node.kind {
            NodeKind::MetadataDeclaration { .. } => "metadata",
            NodeKind::TargetScopeDeclaration { .. } => "targetScope",
            NodeKind::TypeDeclaration { .. } => "type",
            NodeKind::ParameterDeclaration { .. } => "param",
            NodeKind::VariableDeclaration { .. } => "var",
            NodeKind::FunctionDeclaration { .. } => "func",
            NodeKind::ResourceDeclaration { .. } => "resource",
            NodeKind::ModuleDeclaration { .. } => "module",
            NodeKind::TestDeclaration { .. } => "test",
            NodeKind::OutputDeclaration { .. } => "output",
            NodeKind::AssertDeclaration { .. } => "assert",
            NodeKind::CompileTimeImportDeclaration { .. } => "import",
            NodeKind::ProviderDeclaration { .. } => "provider",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "metadata",
            "targetScope",
            "type",
            "param",
            "var",
            "func",
            "resource",
            "module",
            "test",
            "output",
            "assert",
            "import",
            "provider",
        ]
    );
}

#[test]
fn decorators_become_leading_nodes() {
    let parsed = parse_clean("@minLength(3)\n@description('name')\nparam name string\n");
    match &first_declaration(&parsed).kind {
        NodeKind::ParameterDeclaration { leading_nodes, .. } => {
            let decorators = leading_nodes
                .iter()
                .filter(|node| matches!(node.kind, NodeKind::Decorator { .. }))
                .count();
            assert_eq!(decorators, 2);
        }
        other => panic!("expected a parameter, got {other:?}"),
    }
}

#[test]
fn dangling_decorator_reports_missing_declaration() {
    let parsed = parse("@description('x')\n");
    assert_eq!(codes(&parsed), vec!["E1505"]);
    assert!(matches!(
        first_declaration(&parsed).kind,
        NodeKind::MissingDeclaration { .. }
    ));
}

#[test]
fn missing_parameter_name_reports_a_single_error() {
    let text = "param\nvar x = 1\n";
    let parsed = parse(text);
    assert_eq!(codes(&parsed), vec!["E1506"]);
    assert_eq!(parsed.program.to_source_text(), text);
    assert_eq!(parsed.declarations().len(), 2);
}

#[test]
fn missing_variable_value_is_reported_once() {
    let parsed = parse("var x = \n");
    assert_eq!(codes(&parsed), vec!["E1512"]);
}

#[test]
fn missing_variable_name_does_not_cascade() {
    let parsed = parse("var = 1\n");
    assert_eq!(codes(&parsed), vec!["E1506"]);
    match &first_declaration(&parsed).kind {
        NodeKind::VariableDeclaration { name, value, .. } => {
            assert!(name.identifier_text().is_none());
            assert!(matches!(value.kind, NodeKind::IntegerLiteral { value: 1, .. }));
        }
        other => panic!("expected a variable, got {other:?}"),
    }
}

#[test]
fn unknown_keyword_skips_to_the_end_of_the_line() {
    let text = "foo bar baz\nvar x = 1\n";
    let parsed = parse(text);
    assert_eq!(codes(&parsed), vec!["E1503"]);
    assert_eq!(parsed.declarations().len(), 1);
    assert_eq!(parsed.program.to_source_text(), text);
    let skipped = parsed
        .program
        .children()
        .into_iter()
        .find(|node| node.is_skipped())
        .expect("skipped line");
    assert_eq!(skipped.span.start, 0);
    // The terminating newline is consumed with the junk.
    assert_eq!(skipped.span.end(), "foo bar baz\n".len());
}

#[test]
fn declaration_must_end_at_a_newline() {
    let parsed = parse("var x = 1 2\n");
    assert_eq!(codes(&parsed), vec!["E1502"]);
}

#[test]
fn params_files_use_their_own_declaration_set() {
    let text = "using './main.bicep'\nparam location = 'westus'\nvar suffix = 'x'\n";
    let parsed = parse_params(text);
    assert!(parsed.all_diagnostics().is_empty());
    assert_eq!(parsed.program.to_source_text(), text);
    let declarations = parsed.declarations();
    assert!(matches!(declarations[0].kind, NodeKind::UsingDeclaration { .. }));
    assert!(matches!(declarations[1].kind, NodeKind::ParameterAssignment { .. }));
    assert!(matches!(declarations[2].kind, NodeKind::VariableDeclaration { .. }));

    let parsed = parse_params("resource r 'a@1' = {}\n");
    assert_eq!(codes(&parsed), vec!["E1504"]);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let parsed = parse_clean("var a = 1 + 2 * 3");
    match &variable_value(&parsed).kind {
        NodeKind::BinaryOperation { left, right, .. } => {
            assert!(matches!(left.kind, NodeKind::IntegerLiteral { value: 1, .. }));
            assert!(matches!(right.kind, NodeKind::BinaryOperation { .. }));
        }
        other => panic!("expected a binary operation, got {other:?}"),
    }
}

#[test]
fn ternary_wraps_the_whole_comparison() {
    let parsed = parse_clean("var a = 1 + 2 * 3 > 4 ? 5 : 6");
    let NodeKind::TernaryOperation { condition, .. } = &variable_value(&parsed).kind else {
        panic!("expected a ternary");
    };
    let NodeKind::BinaryOperation { left, operator, .. } = &condition.kind else {
        panic!("expected a comparison");
    };
    assert_eq!(operator.as_token().map(|t| t.text.as_str()), Some(">"));
    assert_eq!(left.to_source_text().trim(), "1 + 2 * 3");
}

#[test]
fn coalesce_has_the_lowest_precedence() {
    let parsed = parse_clean("var a = x ?? y || z");
    match &variable_value(&parsed).kind {
        NodeKind::BinaryOperation { operator, right, .. } => {
            assert_eq!(operator.as_token().map(|t| t.text.as_str()), Some("??"));
            assert!(matches!(right.kind, NodeKind::BinaryOperation { .. }));
        }
        other => panic!("expected a binary operation, got {other:?}"),
    }
}

#[test]
fn ternary_may_span_lines() {
    let parsed = parse_clean("var a = cond\n  ? 'yes'\n  : 'no'\n");
    match &variable_value(&parsed).kind {
        NodeKind::TernaryOperation {
            newlines_before_question,
            newlines_before_colon,
            ..
        } => {
            assert_eq!(newlines_before_question.len(), 1);
            assert_eq!(newlines_before_colon.len(), 1);
        }
        other => panic!("expected a ternary, got {other:?}"),
    }
}

#[test]
fn ternary_missing_colon_suppresses_the_false_branch() {
    let parsed = parse("var a = cond ? 1\n");
    assert_eq!(codes(&parsed), vec!["E1500"]);
}

#[test]
fn member_chains_nest_left_to_right() {
    let parsed = parse_clean("var a = foo.bar[0].?baz!::child.list()");
    match &variable_value(&parsed).kind {
        NodeKind::InstanceFunctionCall { base, .. } => {
            assert!(matches!(base.kind, NodeKind::ResourceAccess { .. }));
        }
        other => panic!("expected an instance call, got {other:?}"),
    }
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(
            kind,
            NodeKind::PropertyAccess {
                safe_access: Some(_),
                ..
            }
        )),
        1
    );
}

#[test]
fn single_line_lists_cannot_switch_to_newlines() {
    let parsed = parse("var a = [1, 2\n3]\n");
    assert_eq!(codes(&parsed), vec!["E1522"]);
    let items = count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::ArrayItem { .. }));
    assert_eq!(items, 3);
}

#[test]
fn multi_line_lists_use_newlines() {
    let parsed = parse_clean("var a = [\n  1\n  2\n]\nvar b = {\n  x: 1\n  y: 2\n}\n");
    let items = count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::ArrayItem { .. }));
    let properties = count_nodes(&parsed.program, |kind| {
        matches!(kind, NodeKind::ObjectProperty { .. })
    });
    assert_eq!((items, properties), (2, 2));
}

#[test]
fn comma_followed_by_newline_is_flagged() {
    let parsed = parse("var a = [1,\n2]\n");
    assert_eq!(codes(&parsed), vec!["E1523"]);
}

#[test]
fn missing_separator_keeps_both_elements() {
    let parsed = parse("var a = [1 2]\n");
    assert_eq!(codes(&parsed), vec!["E1521"]);
    let items = count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::ArrayItem { .. }));
    assert_eq!(items, 2);
}

#[test]
fn trailing_comma_in_call_still_yields_an_argument_slot() {
    let parsed = parse("var a = concat(1, 2,)\n");
    assert_eq!(codes(&parsed), vec!["E1524"]);
    let arguments = count_nodes(&parsed.program, |kind| {
        matches!(kind, NodeKind::FunctionArgument { .. })
    });
    assert_eq!(arguments, 3);
}

#[test]
fn blank_lines_before_closing_paren_are_not_separators() {
    parse_clean("var a = concat(\n  1,\n  2\n\n)\n");
    parse_clean("var a = concat(\n  1\n\n  \n)\n");
}

#[test]
fn call_arguments_may_span_lines() {
    parse_clean("var a = concat(\n  1,\n  2\n)\n");
}

#[test]
fn lambdas_use_local_variables() {
    let parsed = parse_clean("var a = map(items, (x, i) => x + i)\nvar b = filter(items, x => x > 1)\n");
    let locals = count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::LocalVariable { .. }));
    assert_eq!(locals, 3);
}

#[test]
fn lambda_parameters_must_be_identifiers() {
    let parsed = parse("var f = (a, 1) => a\n");
    assert_eq!(codes(&parsed), vec!["E1605"]);
}

#[test]
fn parentheses_require_exactly_one_item() {
    assert_eq!(codes(&parse("var a = ()\n")), vec!["E1601"]);
    assert_eq!(codes(&parse("var a = (1, 2)\n")), vec!["E1601"]);
    parse_clean("var a = (1)\n");
}

#[test]
fn for_expression_with_index() {
    let parsed = parse_clean("var a = [for (item, i) in range(0, 3): item * i]\n");
    assert!(matches!(variable_value(&parsed).kind, NodeKind::ForExpression { .. }));
}

#[test]
fn for_variable_block_needs_two_elements() {
    let parsed = parse("var a = [for (x, y, z) in list: x]\n");
    assert_eq!(codes(&parsed), vec!["E1600"]);
    let message = &parsed.parsing_errors.iter().next().expect("diagnostic").message;
    assert!(message.ends_with("found 3"), "{message}");
}

#[test]
fn for_without_variable_suppresses_follow_up_errors() {
    let parsed = parse("var a = [for]\n");
    assert_eq!(codes(&parsed), vec!["E1511"]);
}

#[test]
fn resource_bodies_accept_conditions_and_loops() {
    parse_clean(
        "\
resource a 'A@1' = if (deploy) {
  name: 'a'
}
resource b 'B@1' = [for i in range(0, 2): {
  name: 'b${i}'
}]
resource c 'C@1' = [for i in range(0, 2): if (i > 0) {
  name: 'c'
}]
resource d 'D@1' existing = {
  name: 'd'
}
",
    );
}

#[test]
fn nested_resources_are_declarations_inside_the_body() {
    let parsed = parse_clean(
        "\
resource parent 'A@1' = {
  name: 'p'
  resource child 'B@1' = {
    name: 'c'
  }
}
",
    );
    let resources = count_nodes(&parsed.program, |kind| {
        matches!(kind, NodeKind::ResourceDeclaration { .. })
    });
    assert_eq!(resources, 2);
}

#[test]
fn resource_body_must_be_object_condition_or_loop() {
    let parsed = parse("resource sa 'A@1' = 'nope'\n");
    assert_eq!(codes(&parsed), vec!["E1510"]);
}

#[test]
fn missing_resource_type_does_not_cascade() {
    let parsed = parse("resource sa = {}\n");
    assert_eq!(codes(&parsed), vec!["E1508"]);
}

#[test]
fn string_interpolation_keeps_holes() {
    let parsed = parse_clean("var s = 'a${b}c${d.e}f'\n");
    match &variable_value(&parsed).kind {
        NodeKind::StringLiteral {
            parts,
            segment_values,
        } => {
            assert_eq!(parts.len(), 5);
            assert_eq!(segment_values, &vec!["a".to_string(), "c".to_string(), "f".to_string()]);
        }
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn stray_tokens_in_a_hole_are_skipped() {
    let parsed = parse("var s = 'a${b c}d'\n");
    assert_eq!(codes(&parsed), vec!["E1525"]);
    assert!(matches!(variable_value(&parsed).kind, NodeKind::StringLiteral { .. }));
}

#[test]
fn holes_do_not_allow_complex_literals() {
    let parsed = parse("var s = '${[1]}'\n");
    assert_eq!(codes(&parsed), vec!["E1515"]);
}

#[test]
fn unterminated_string_reports_only_the_lexing_error() {
    let parsed = parse("var s = 'abc\n");
    assert_eq!(codes(&parsed), vec!["E1001"]);
    assert!(parsed.parsing_errors.is_empty());
    assert!(variable_value(&parsed).is_skipped());
}

#[test]
fn multiline_strings_have_a_decoded_value() {
    let parsed = parse_clean("var s = '''\nline one\nline two'''\n");
    match &variable_value(&parsed).kind {
        NodeKind::StringLiteral { segment_values, .. } => {
            assert_eq!(segment_values, &vec!["line one\nline two".to_string()]);
        }
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn structural_errors_wrap_the_parsed_node() {
    let parsed = parse("var a = foo[]\n");
    assert_eq!(codes(&parsed), vec!["E1602"]);

    let parsed = parse("var a = 99999999999999999999\n");
    assert_eq!(codes(&parsed), vec!["E1603"]);
    assert!(variable_value(&parsed).is_skipped());

    let parsed = parse("var a = foo.?bar()\n");
    assert_eq!(codes(&parsed), vec!["E1604"]);
    assert!(matches!(
        variable_value(&parsed).kind,
        NodeKind::InstanceFunctionCall { .. }
    ));
}

#[test]
fn union_types_may_continue_on_the_next_line() {
    let parsed = parse_clean("type color = 'red'\n  | 'green'\n  | 'blue'\n");
    let members = count_nodes(&parsed.program, |kind| {
        matches!(kind, NodeKind::UnionTypeMember { .. })
    });
    assert_eq!(members, 3);
}

#[test]
fn union_member_missing_after_pipe() {
    let parsed = parse("type t = 'a' |\n");
    assert_eq!(codes(&parsed), vec!["E1514"]);
}

#[test]
fn object_and_tuple_types() {
    let parsed = parse_clean(
        "\
type config = {
  @description('the name')
  name: string
  tags: string[]
  size: int?
  *: string
}
type pair = [string, int]
",
    );
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(
            kind,
            NodeKind::ObjectTypeAdditionalProperties { .. }
        )),
        1
    );
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::TupleTypeItem { .. })),
        2
    );
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::ArrayType { .. })),
        1
    );
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::NullableType { .. })),
        1
    );
}

#[test]
fn object_type_key_must_be_a_name_or_matcher() {
    let parsed = parse("type t = {\n  1: string\n}\n");
    assert_eq!(codes(&parsed), vec!["E1517"]);
}

#[test]
fn typed_lambda_function() {
    let parsed = parse_clean("func add(a int, b int) int => a + b\n");
    match &first_declaration(&parsed).kind {
        NodeKind::FunctionDeclaration { lambda, .. } => {
            assert!(matches!(lambda.kind, NodeKind::TypedLambda { .. }));
        }
        other => panic!("expected a function, got {other:?}"),
    }
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(
            kind,
            NodeKind::TypedLocalVariable { .. }
        )),
        2
    );
}

#[test]
fn outputs_may_omit_the_resource_type() {
    let parsed = parse_clean("output sa resource = storage\noutput typed resource 'A@1' = storage\n");
    let types: Vec<bool> = parsed
        .program
        .descendants()
        .into_iter()
        .filter_map(|node| match &node.kind {
            NodeKind::ResourceType { ty, .. } => Some(ty.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(types, vec![false, true]);
}

#[test]
fn parameter_requires_newline_or_default() {
    let parsed = parse("param p string 'x'\n");
    assert_eq!(codes(&parsed), vec!["E1507"]);
}

#[test]
fn compile_time_imports() {
    let parsed = parse_clean(
        "import { a, 'b' as c } from './lib.bicep'\nimport * as lib from './lib.bicep'\n",
    );
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(
            kind,
            NodeKind::ImportedSymbolsListItem { .. }
        )),
        2
    );
    assert_eq!(
        count_nodes(&parsed.program, |kind| matches!(kind, NodeKind::WildcardImport { .. })),
        1
    );
}

#[test]
fn provider_clauses() {
    let parsed = parse_clean("provider 'kubernetes@1.0.0' with {\n  namespace: 'default'\n} as k8s\nimport 'az@1.0.0'\n");
    let declarations = parsed.declarations();
    match &declarations[0].kind {
        NodeKind::ProviderDeclaration {
            with_clause,
            as_clause,
            ..
        } => {
            assert!(with_clause.is_some());
            assert!(as_clause.is_some());
        }
        other => panic!("expected a provider, got {other:?}"),
    }
    assert!(matches!(declarations[1].kind, NodeKind::ProviderDeclaration { .. }));
}

#[test]
fn nesting_limit_is_configurable() {
    let text = "var a = [[[[[1]]]]]\n";
    let parsed = parse_with_options(text, &ParserOptions { max_nesting_depth: 4 });
    assert!(codes(&parsed).contains(&"E1528".to_string()));
    assert_eq!(parsed.program.to_source_text(), text);
    parse_clean(text);
}

#[test]
fn deep_nesting_never_overflows() {
    let text = format!("var a = {}1{}\n", "(".repeat(500), ")".repeat(500));
    let parsed = parse(&text);
    assert_eq!(codes(&parsed), vec!["E1528"]);
    assert_eq!(parsed.program.to_source_text(), text);
}

#[test]
fn nesting_overflow_is_reported_once() {
    let text = format!("var a = {}1{}\nvar b = 2\n", "{a:[(".repeat(30), ")]}".repeat(30));
    let parsed = parse(&text);
    assert_eq!(codes(&parsed), vec!["E1528"]);
    assert_eq!(parsed.declarations().len(), 2);
    assert_eq!(parsed.program.to_source_text(), text);

    // The next declaration reports its own errors again.
    let text = format!("var a = {}1{}\nvar = 2\n", "(".repeat(100), ")".repeat(100));
    assert_eq!(codes(&parse(&text)), vec!["E1528", "E1506"]);
}

#[test]
fn long_operator_chains_parse_and_drop() {
    let text = format!("var a = {}1\n", "1 + ".repeat(100_000));
    let parsed = parse(&text);
    assert!(codes(&parsed).is_empty());
    drop(parsed);

    let text = format!("var b = x{}\n", ".y".repeat(100_000));
    let parsed = parse(&text);
    assert!(codes(&parsed).is_empty());
    drop(parsed);
}

#[test]
fn diagnostics_are_attached_to_their_nodes() {
    let parsed = parse("var a = [1 2]\nvar b = 3\n");
    let declarations = parsed.declarations();
    assert!(parsed.parsing_errors.contains_node(declarations[0]));
    assert!(!parsed.parsing_errors.contains_node(declarations[1]));
    let skipped = parsed
        .program
        .descendants()
        .into_iter()
        .find(|node| node.is_skipped())
        .expect("skipped node");
    assert_eq!(parsed.parsing_errors.for_node(skipped.id).count(), 1);
}

#[test]
fn has_errors_blocks_code_generation() {
    assert!(!parse("var a = 1\n").has_errors());
    assert!(parse("var a = \n").has_errors());
    assert!(parse("var a = 'x\n").has_errors());
}
