//! Reserved names resolved without consulting the owner.

/// Helpers provided by the runtime. Registering a helper under one of these
/// names is an error.
pub const BUILTIN_HELPERS: &[&str] = &[
    "action",
    "array",
    "concat",
    "fn",
    "get",
    "hash",
    "if",
    "unless",
    "log",
    "mut",
    "query-params",
    "readonly",
    "unbound",
    "-hash",
    "-each-in",
    "-normalize-class",
    "-resolve",
    "-track-array",
    "-mount",
    "-outlet",
    "-in-el-null",
];

/// Modifiers provided by the runtime. These win over registered modifiers.
pub const BUILTIN_MODIFIERS: &[&str] = &["action", "on"];

/// Components provided by the platform, targets of the misspelling hint.
pub const PLATFORM_COMPONENTS: &[&str] = &["input", "textarea", "link-to"];

/// Largest edit distance still reported as a likely misspelling.
pub(crate) const MISSPELLING_DISTANCE: usize = 2;

pub(crate) fn builtin_helper(name: &str) -> Option<&'static str> {
    BUILTIN_HELPERS.iter().copied().find(|builtin| *builtin == name)
}

pub(crate) fn builtin_modifier(name: &str) -> Option<&'static str> {
    BUILTIN_MODIFIERS.iter().copied().find(|builtin| *builtin == name)
}

/// The platform component `name` most likely meant, if `name` is a near miss.
pub(crate) fn closest_platform_component(name: &str) -> Option<&'static str> {
    if PLATFORM_COMPONENTS.contains(&name) {
        return None;
    }
    PLATFORM_COMPONENTS
        .iter()
        .copied()
        .min_by_key(|candidate| strsim::levenshtein(name, candidate))
        .filter(|candidate| strsim::levenshtein(name, candidate) <= MISSPELLING_DISTANCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin_helper("concat"), Some("concat"));
        assert_eq!(builtin_helper("-outlet"), Some("-outlet"));
        assert_eq!(builtin_helper("x-concat"), None);
        assert_eq!(builtin_modifier("on"), Some("on"));
        assert_eq!(builtin_modifier("did-insert"), None);
    }

    #[test]
    fn test_closest_platform_component() {
        assert_eq!(closest_platform_component("linkto"), Some("link-to"));
        assert_eq!(closest_platform_component("inptu"), Some("input"));
        assert_eq!(closest_platform_component("text-area"), Some("textarea"));
        assert_eq!(closest_platform_component("input"), None);
        assert_eq!(closest_platform_component("x-widget"), None);
    }
}
