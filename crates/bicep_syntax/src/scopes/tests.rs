use super::*;
use crate::config::{FeatureFlags, ResourceScope, SourceFileKind};
use crate::parser::{parse, parse_params, ParsedProgram};
use crate::syntax::{NodeKind, SyntaxNode};

fn extensible() -> FeatureFlags {
    FeatureFlags {
        extensibility_enabled: true,
        microsoft_graph_preview_enabled: false,
    }
}

fn build_with(parsed: &ParsedProgram, features: FeatureFlags, file_kind: SourceFileKind) -> LocalScope {
    build_scopes(
        &parsed.program,
        &BuiltInNamespaceProvider,
        &features,
        ResourceScope::ResourceGroup,
        file_kind,
    )
    .expect("scopes")
}

fn build(text: &str) -> (ParsedProgram, LocalScope) {
    let parsed = parse(text);
    let scope = build_with(&parsed, extensible(), SourceFileKind::Template);
    (parsed, scope)
}

fn names(scope: &LocalScope) -> Vec<&str> {
    scope.locals().iter().map(|symbol| symbol.name.as_str()).collect()
}

fn first_node<'a>(root: &'a SyntaxNode, matches: impl Fn(&NodeKind) -> bool) -> &'a SyntaxNode {
    root.descendants()
        .into_iter()
        .find(|node| matches(&node.kind))
        .expect("node")
}

fn provider_type(text: &str, features: FeatureFlags) -> (String, DeclaredType) {
    let parsed = parse(text);
    let scope = build_with(&parsed, features, SourceFileKind::Template);
    let symbol = scope.locals().front().expect("provider symbol").clone();
    match symbol.kind {
        SymbolKind::ProviderNamespace { declared_type } => (symbol.name, declared_type),
        other => panic!("expected a provider namespace, got {other:?}"),
    }
}

fn error_code(declared_type: &DeclaredType) -> &str {
    match declared_type {
        DeclaredType::Error(diagnostic) => &diagnostic.code,
        other => panic!("expected an error type, got {other:?}"),
    }
}

#[test]
fn top_level_declarations_land_in_the_root_scope() {
    let (parsed, scope) = build(
        "metadata info = 'x'\nparam location string\nvar count = 1\ntype name = string\noutput out int = count\n",
    );
    assert_eq!(scope.resolution(), ScopeResolution::GlobalsOnly);
    assert_eq!(scope.binding_syntax(), parsed.program.id);
    assert_eq!(scope.declaring_syntax(), parsed.program.id);
    assert_eq!(scope.name(), "");
    assert_eq!(names(&scope), vec!["info", "location", "count", "name", "out"]);
    assert!(scope.children().is_empty());

    let location = scope.lookup_local("location").expect("location");
    assert_eq!(location.kind, SymbolKind::Parameter);
    let text = "metadata info = 'x'\nparam location string\n";
    assert_eq!(location.name_span.start, text.find("location").expect("offset"));
    assert_eq!(
        scope.lookup_local("name").map(|symbol| &symbol.kind),
        Some(&SymbolKind::TypeAlias)
    );
}

#[test]
fn nested_resource_scopes_and_symbols() {
    let text = "resource parent 'A/b@2020-01-01' = {\n  name: 'p'\n  resource child 'c' = {\n    name: 'c'\n  }\n}\n";
    let (parsed, scope) = build(text);
    assert!(parsed.all_diagnostics().is_empty(), "{:?}", parsed.all_diagnostics());

    assert_eq!(names(&scope), vec!["parent"]);
    match &scope.locals()[0].kind {
        SymbolKind::Resource {
            resource_type,
            existing,
        } => {
            assert_eq!(resource_type.as_deref(), Some("A/b@2020-01-01"));
            assert!(!existing);
        }
        other => panic!("unexpected symbol {other:?}"),
    }

    assert_eq!(scope.children().len(), 1);
    let parent_body = &scope.children()[0];
    assert_eq!(parent_body.resolution(), ScopeResolution::InheritParent);
    // The child resource is declared in the parent's body scope.
    assert_eq!(names(parent_body), vec!["child"]);
    assert_eq!(parent_body.children().len(), 1);
    assert!(parent_body.children()[0].locals().is_empty());

    let body = first_node(&parsed.program, |kind| matches!(kind, NodeKind::Object { .. }));
    assert_eq!(parent_body.binding_syntax(), body.id);
    assert_eq!(
        scope.find_by_binding(body.id).map(|found| found.declaring_syntax()),
        Some(parent_body.declaring_syntax())
    );
}

#[test]
fn conditional_resource_binds_to_the_if_body() {
    let text = "resource r 'A@1' existing = if (deploy) {\n  name: 'x'\n}\n";
    let (parsed, scope) = build(text);
    let body = match &first_node(&parsed.program, |kind| matches!(kind, NodeKind::IfCondition { .. })).kind {
        NodeKind::IfCondition { body, .. } => body.id,
        _ => unreachable!(),
    };
    assert_eq!(scope.children()[0].binding_syntax(), body);
    assert!(matches!(
        scope.locals()[0].kind,
        SymbolKind::Resource { existing: true, .. }
    ));
}

#[test]
fn module_bodies_open_a_scope() {
    let (_, scope) = build("module m 'mod.bicep' = {\n  name: 'm'\n}\n");
    assert_eq!(names(&scope), vec!["m"]);
    assert_eq!(scope.locals()[0].kind, SymbolKind::Module);
    assert_eq!(scope.children().len(), 1);
    assert_eq!(scope.children()[0].resolution(), ScopeResolution::InheritParent);
}

#[test]
fn for_loop_declares_its_item() {
    let (parsed, scope) = build("var doubled = [for item in range(0, 3): item * 2]\n");
    assert!(parsed.all_diagnostics().is_empty());
    let loop_scope = &scope.children()[0];
    assert_eq!(loop_scope.resolution(), ScopeResolution::InheritParent);
    assert_eq!(loop_scope.locals().len(), 1);
    let item = &loop_scope.locals()[0];
    assert_eq!(item.name, "item");
    assert_eq!(
        item.kind,
        SymbolKind::LocalVariable {
            kind: LocalVariableKind::ForItem,
            declared_type: None,
        }
    );
    // Loop variables never reach the enclosing scope.
    assert_eq!(names(&scope), vec!["doubled"]);
}

#[test]
fn for_loop_with_index() {
    let (_, scope) = build("var pairs = [for (value, i) in list: '${i}-${value}']\n");
    let kinds: Vec<(&str, &SymbolKind)> = scope.children()[0]
        .locals()
        .iter()
        .map(|symbol| (symbol.name.as_str(), &symbol.kind))
        .collect();
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0].0, "value");
    assert!(matches!(
        kinds[0].1,
        SymbolKind::LocalVariable { kind: LocalVariableKind::ForItem, .. }
    ));
    assert_eq!(kinds[1].0, "i");
    assert!(matches!(
        kinds[1].1,
        SymbolKind::LocalVariable { kind: LocalVariableKind::ForIndex, .. }
    ));
}

#[test]
fn bad_loop_variable_block_declares_nothing() {
    let (parsed, scope) = build("var xs = [for (a, b, c) in list: a]\n");
    assert!(!parsed.all_diagnostics().is_empty());
    assert_eq!(scope.children().len(), 1);
    assert!(scope.children()[0].locals().is_empty());
}

#[test]
fn lambdas_inherit_and_declare_parameters() {
    let (parsed, scope) = build("var f = map(list, x => x * 2)\nvar g = reduce(list, 0, (acc, cur) => acc + cur)\n");
    assert_eq!(scope.children().len(), 2);
    assert_eq!(names(&scope.children()[0]), vec!["x"]);
    assert_eq!(names(&scope.children()[1]), vec!["acc", "cur"]);
    for lambda in scope.children() {
        assert_eq!(lambda.resolution(), ScopeResolution::InheritParent);
        assert!(lambda.locals().iter().all(|symbol| matches!(
            symbol.kind,
            SymbolKind::LocalVariable { kind: LocalVariableKind::LambdaItem, declared_type: None }
        )));
    }
    let body = match &first_node(&parsed.program, |kind| matches!(kind, NodeKind::Lambda { .. })).kind {
        NodeKind::Lambda { body, .. } => body.id,
        _ => unreachable!(),
    };
    assert_eq!(scope.children()[0].binding_syntax(), body);
}

#[test]
fn typed_lambdas_only_see_globals() {
    let (parsed, scope) = build("func add(a int, b string[]) int => a\n");
    assert!(parsed.all_diagnostics().is_empty(), "{:?}", parsed.all_diagnostics());
    assert_eq!(names(&scope), vec!["add"]);
    assert_eq!(scope.locals()[0].kind, SymbolKind::DeclaredFunction);

    let function_scope = &scope.children()[0];
    assert_eq!(function_scope.resolution(), ScopeResolution::GlobalsOnly);
    let declared: Vec<Option<&str>> = function_scope
        .locals()
        .iter()
        .map(|symbol| match &symbol.kind {
            SymbolKind::LocalVariable { declared_type, .. } => declared_type.as_deref(),
            _ => None,
        })
        .collect();
    assert_eq!(declared, vec![Some("int"), Some("string[]")]);
}

#[test]
fn lambda_inside_loop_nests_scopes() {
    let (_, scope) = build("var xs = [for item in list: filter(item, y => y)]\n");
    let loop_scope = &scope.children()[0];
    assert_eq!(names(loop_scope), vec!["item"]);
    assert_eq!(loop_scope.children().len(), 1);
    assert_eq!(names(&loop_scope.children()[0]), vec!["y"]);
    assert_eq!(scope.descendants().len(), 3);
}

#[test]
fn long_flat_chains_build_scopes() {
    let text = format!(
        "var a = {}map(xs, x => x)\nvar b = x{}\n",
        "1 + ".repeat(20_000),
        ".y".repeat(20_000)
    );
    let (parsed, scope) = build(&text);
    assert!(parsed.all_diagnostics().is_empty());
    assert_eq!(names(&scope), vec!["a", "b"]);
    assert_eq!(scope.children().len(), 1);
    assert_eq!(names(&scope.children()[0]), vec!["x"]);
}

#[test]
fn missing_names_are_still_declared() {
    let (_, scope) = build("var = 1\n");
    assert_eq!(names(&scope), vec![MISSING_NAME]);
    assert_eq!(scope.locals()[0].kind, SymbolKind::Variable);
}

#[test]
fn compile_time_imports() {
    let (parsed, scope) = build("import {a, b as c} from 'types.bicep'\nimport * as ns from 'other.bicep'\n");
    assert!(parsed.all_diagnostics().is_empty(), "{:?}", parsed.all_diagnostics());
    assert_eq!(names(&scope), vec!["a", "c", "ns"]);
    assert_eq!(
        scope.locals()[1].kind,
        SymbolKind::ImportedType {
            original_name: "b".to_string(),
            source_path: Some("types.bicep".to_string()),
        }
    );
    assert_eq!(
        scope.locals()[2].kind,
        SymbolKind::WildcardImport {
            source_path: Some("other.bicep".to_string()),
        }
    );
}

#[test]
fn parameter_assignments() {
    let parsed = parse_params("using 'main.bicep'\nparam size = 3\n");
    let scope = build_with(&parsed, FeatureFlags::default(), SourceFileKind::Parameters);
    assert_eq!(names(&scope), vec!["size"]);
    assert_eq!(scope.locals()[0].kind, SymbolKind::ParameterAssignment);
}

#[test]
fn providers_need_extensibility() {
    let (name, declared_type) = provider_type("provider 'foo@1.0.0'\n", FeatureFlags::default());
    assert_eq!(name, "foo");
    assert_eq!(error_code(&declared_type), "E2001");
}

#[test]
fn provider_resolves_builtin_namespace() {
    let (name, declared_type) = provider_type("provider 'az@1.0.0' as azure\n", extensible());
    assert_eq!(name, "azure");
    assert_eq!(
        declared_type,
        DeclaredType::Namespace(NamespaceType {
            name: "az".to_string(),
            alias: "azure".to_string(),
            version: Some("1.0.0".to_string()),
            configuration_required: false,
            is_preview: false,
        })
    );
}

#[test]
fn identifier_provider_with_configuration() {
    let (name, declared_type) = provider_type(
        "provider kubernetes with {\n  namespace: 'default'\n} as k8s\n",
        extensible(),
    );
    assert_eq!(name, "k8s");
    match declared_type {
        DeclaredType::Namespace(namespace) => {
            assert_eq!(namespace.name, "kubernetes");
            assert_eq!(namespace.version, None);
            assert!(namespace.configuration_required);
        }
        other => panic!("unexpected type {other:?}"),
    }
}

#[test]
fn provider_failures_become_error_types() {
    let (_, unknown) = provider_type("provider 'foo@1.0.0'\n", extensible());
    assert_eq!(error_code(&unknown), "E2004");

    let (_, interpolated) = provider_type("provider 'az@${version}'\n", extensible());
    assert_eq!(error_code(&interpolated), "E2002");

    let (_, invalid) = provider_type("provider 'az'\n", extensible());
    assert_eq!(error_code(&invalid), "E2003");

    let (name, reported) = provider_type("provider 123\n", extensible());
    assert_eq!(name, MISSING_NAME);
    assert_eq!(reported, DeclaredType::ErrorEmpty);
    assert!(reported.is_error());
}

#[test]
fn graph_namespace_is_preview_gated() {
    let (_, gated) = provider_type("provider 'microsoftGraph@1.0.0'\n", extensible());
    assert_eq!(error_code(&gated), "E2004");

    let features = FeatureFlags {
        extensibility_enabled: true,
        microsoft_graph_preview_enabled: true,
    };
    let (_, enabled) = provider_type("provider 'microsoftGraph@1.0.0'\n", features);
    assert!(matches!(
        enabled,
        DeclaredType::Namespace(NamespaceType { is_preview: true, .. })
    ));
}

#[test]
fn az_is_unavailable_for_local_deployments() {
    let parsed = parse("provider 'az@1.0.0'\n");
    let scope = build_scopes(
        &parsed.program,
        &BuiltInNamespaceProvider,
        &extensible(),
        ResourceScope::Local,
        SourceFileKind::Template,
    )
    .expect("scopes");
    match &scope.locals()[0].kind {
        SymbolKind::ProviderNamespace { declared_type } => assert_eq!(error_code(declared_type), "E2004"),
        other => panic!("unexpected symbol {other:?}"),
    }
}

#[test]
fn specification_strings() {
    assert_eq!(
        parse_provider_specification("az@1.0.0"),
        Some(ProviderSpecification {
            name: "az".to_string(),
            version: Some("1.0.0".to_string()),
        })
    );
    assert_eq!(
        parse_provider_specification("kubernetes@1.0.0-preview").map(|spec| spec.name),
        Some("kubernetes".to_string())
    );
    assert_eq!(parse_provider_specification("az"), None);
    assert_eq!(parse_provider_specification("@1.0"), None);
    assert_eq!(parse_provider_specification("az@"), None);
}

struct OnlyCustom;

impl NamespaceProvider for OnlyCustom {
    fn try_get_namespace(&self, request: &NamespaceRequest<'_>) -> Option<NamespaceType> {
        (request.namespace == "custom").then(|| NamespaceType {
            name: "custom".to_string(),
            alias: request.alias.to_string(),
            version: request.version.map(str::to_string),
            configuration_required: false,
            is_preview: false,
        })
    }
}

#[test]
fn custom_namespace_provider() {
    let parsed = parse("provider 'custom@2.0'\nprovider 'az@1.0.0'\n");
    let scope = build_scopes(
        &parsed.program,
        &OnlyCustom,
        &extensible(),
        ResourceScope::ResourceGroup,
        SourceFileKind::Template,
    )
    .expect("scopes");
    let types: Vec<bool> = scope
        .locals()
        .iter()
        .map(|symbol| match &symbol.kind {
            SymbolKind::ProviderNamespace { declared_type } => declared_type.is_error(),
            _ => true,
        })
        .collect();
    assert_eq!(types, vec![false, true]);
}

#[test]
fn scope_tree_is_built_for_broken_files() {
    let (parsed, scope) = build("resource r 'A@1' = {\n  name: [for x in : x]\n}\n@sys.description('d')\n");
    assert!(parsed.has_errors());
    assert_eq!(names(&scope), vec!["r"]);
    assert!(!scope.children().is_empty());
}

#[test]
fn scopes_serialize_to_json() {
    let (_, scope) = build("var f = x => x\n");
    let json = serde_json::to_value(&scope).expect("serialize");
    assert_eq!(json["resolution"], "GlobalsOnly");
    assert_eq!(json["children"][0]["resolution"], "InheritParent");
    assert_eq!(json["children"][0]["locals"][0]["name"], "x");
}
