//! Implicit tag resolution for untagged scalars.

use std::sync::OnceLock;

use regex::Regex;

use crate::node::tags;

/// Picks the tag of a scalar that carries none.
pub trait ScalarResolver {
    /// `implicit` is true for plain scalars; quoted and block scalars
    /// always resolve to `str`.
    fn resolve(&self, value: &str, implicit: bool) -> String;
}

/// Compile `(pattern, tag)` rules.
fn compile(rules: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .map(|(pattern, tag)| (Regex::new(pattern).unwrap(), *tag))
        .collect()
}

fn first_match(rules: &[(Regex, &'static str)], value: &str) -> String {
    rules
        .iter()
        .find(|(re, _)| re.is_match(value))
        .map_or(tags::STR, |(_, tag)| *tag)
        .to_string()
}

/// The YAML 1.2 core schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoreScalarResolver;

impl ScalarResolver for CoreScalarResolver {
    fn resolve(&self, value: &str, implicit: bool) -> String {
        static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
        if !implicit {
            return tags::STR.to_string();
        }
        let rules = RULES.get_or_init(|| {
            compile(&[
                (r"^(?:~|null|Null|NULL)?$", tags::NULL),
                (r"^(?:true|True|TRUE|false|False|FALSE)$", tags::BOOL),
                (r"^(?:[-+]?[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+)$", tags::INT),
                (
                    r"^(?:[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
                    tags::FLOAT,
                ),
            ])
        });
        first_match(rules, value)
    }
}

/// The YAML 1.2 JSON schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonScalarResolver;

impl ScalarResolver for JsonScalarResolver {
    fn resolve(&self, value: &str, implicit: bool) -> String {
        static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
        if !implicit {
            return tags::STR.to_string();
        }
        let rules = RULES.get_or_init(|| {
            compile(&[
                (r"^null$", tags::NULL),
                (r"^(?:true|false)$", tags::BOOL),
                (r"^-?(?:0|[1-9][0-9]*)$", tags::INT),
                (r"^-?(?:0|[1-9][0-9]*)(?:\.[0-9]*)?(?:[eE][-+]?[0-9]+)?$", tags::FLOAT),
            ])
        });
        first_match(rules, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_schema() {
        let r = CoreScalarResolver;
        for (value, tag) in [
            ("", tags::NULL),
            ("~", tags::NULL),
            ("Null", tags::NULL),
            ("true", tags::BOOL),
            ("FALSE", tags::BOOL),
            ("yes", tags::STR),
            ("42", tags::INT),
            ("-7", tags::INT),
            ("0o17", tags::INT),
            ("0xFF", tags::INT),
            ("1.5", tags::FLOAT),
            ("1e3", tags::FLOAT),
            (".5", tags::FLOAT),
            ("-.inf", tags::FLOAT),
            (".NaN", tags::FLOAT),
            ("1.2.3", tags::STR),
            ("hello", tags::STR),
        ] {
            assert_eq!(r.resolve(value, true), tag, "{:?}", value);
        }
    }

    #[test]
    #[should_panic]
    fn test_malformed_rule_is_not_skipped() {
        compile(&[(r"^(?:null$", tags::NULL)]);
    }

    #[test]
    fn test_non_plain_is_str() {
        assert_eq!(CoreScalarResolver.resolve("42", false), tags::STR);
        assert_eq!(JsonScalarResolver.resolve("true", false), tags::STR);
    }

    #[test]
    fn test_json_schema() {
        let r = JsonScalarResolver;
        assert_eq!(r.resolve("null", true), tags::NULL);
        assert_eq!(r.resolve("", true), tags::STR);
        assert_eq!(r.resolve("True", true), tags::STR);
        assert_eq!(r.resolve("-0", true), tags::INT);
        assert_eq!(r.resolve("012", true), tags::STR);
        assert_eq!(r.resolve("1.0e5", true), tags::FLOAT);
    }
}
