pub const METADATA: &str = "metadata";
pub const TARGET_SCOPE: &str = "targetScope";
pub const TYPE: &str = "type";
pub const PARAM: &str = "param";
pub const VAR: &str = "var";
pub const FUNC: &str = "func";
pub const RESOURCE: &str = "resource";
pub const MODULE: &str = "module";
pub const OUTPUT: &str = "output";
pub const TEST: &str = "test";
pub const ASSERT: &str = "assert";
pub const IMPORT: &str = "import";
pub const PROVIDER: &str = "provider";
pub const USING: &str = "using";

pub const EXISTING: &str = "existing";
pub const IF: &str = "if";
pub const FOR: &str = "for";
pub const IN: &str = "in";
pub const AS: &str = "as";
pub const WITH: &str = "with";
pub const FROM: &str = "from";

pub const DECLARATION_KEYWORDS: &[&str] = &[
    METADATA,
    TARGET_SCOPE,
    TYPE,
    PARAM,
    VAR,
    FUNC,
    RESOURCE,
    MODULE,
    OUTPUT,
    TEST,
    ASSERT,
    IMPORT,
    PROVIDER,
    USING,
];

pub fn is_declaration_keyword(text: &str) -> bool {
    DECLARATION_KEYWORDS.contains(&text)
}
