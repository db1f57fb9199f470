#![no_main]

use bicep_syntax::{
    build_scopes, parse_file, BuiltInNamespaceProvider, FeatureFlags, ParserOptions, ResourceScope,
    SourceFileKind,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Avoid pathological allocations in the harness itself; libFuzzer will still mutate below this.
    if data.len() > 64 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let features = FeatureFlags {
        extensibility_enabled: true,
        microsoft_graph_preview_enabled: true,
    };
    for kind in [SourceFileKind::Template, SourceFileKind::Parameters] {
        let parsed = parse_file(&src, kind, &ParserOptions::default());
        assert_eq!(parsed.program.to_source_text(), src);
        build_scopes(
            &parsed.program,
            &BuiltInNamespaceProvider,
            &features,
            ResourceScope::ResourceGroup,
            kind,
        )
        .expect("scope builder lost track of its stack");
    }
});
