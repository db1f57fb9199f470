use bicep_syntax::{analyze, FrontendConfig, SourceFileKind};

#[test]
fn analyzed_file_dumps_to_json() {
    let config = FrontendConfig::from_toml_str("[features]\nextensibility = true\n").expect("config");
    let analyzed = analyze(
        "param name string\nvar upper = map([name], n => toUpper(n))\nprovider 'az@1.0.0'\n",
        SourceFileKind::Template,
        &config,
    )
    .expect("analyze");
    let json = serde_json::to_value(&analyzed).expect("serialize");

    assert_eq!(json["file_kind"], "template");
    let declarations = json["parsed"]["program"]["kind"]["Program"]["children"]
        .as_array()
        .expect("children");
    assert!(declarations[0]["kind"].get("ParameterDeclaration").is_some());

    let scope = &json["scope"];
    assert_eq!(scope["resolution"], "GlobalsOnly");
    let names: Vec<&str> = scope["locals"]
        .as_array()
        .expect("locals")
        .iter()
        .filter_map(|symbol| symbol["name"].as_str())
        .collect();
    assert_eq!(names, vec!["name", "upper", "az"]);
    assert_eq!(scope["children"][0]["locals"][0]["name"], "n");
    assert_eq!(
        scope["locals"][2]["kind"]["ProviderNamespace"]["declared_type"]["Namespace"]["version"],
        "1.0.0"
    );
}

#[test]
fn diagnostics_dump_with_codes_and_spans() {
    let analyzed = analyze("var = 1\n", SourceFileKind::Template, &FrontendConfig::default())
        .expect("analyze");
    let json = serde_json::to_value(&analyzed.parsed.all_diagnostics()).expect("serialize");
    assert_eq!(json[0]["code"], "E1506");
    assert_eq!(json[0]["severity"], "error");
    assert!(json[0]["span"]["start"].is_u64());
}
