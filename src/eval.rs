//! Variable substitution: replaces `${name}` occurrences inside string
//! leaves of a document tree with bindings, recursing through maps and
//! lists. Mirrors `octopus/dsl/variable.py`'s `VariableEvaluator`.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

/// Substitute every `${key}` in `s` whose `key` is present in `bindings`.
/// Unknown keys and other substrings are left untouched.
pub fn evaluate_str(s: &str, bindings: &HashMap<String, String>) -> String {
    pattern()
        .replace_all(s, |caps: &regex::Captures| {
            let key = &caps[1];
            match bindings.get(key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Structurally evaluate a YAML value: recurse through mappings and
/// sequences, substituting within every string scalar.
pub fn evaluate_value(value: &Value, bindings: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(evaluate_str(s, bindings)),
        Value::Sequence(items) => {
            Value::Sequence(items.iter().map(|v| evaluate_value(v, bindings)).collect())
        }
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (k, v) in map {
                out.insert(k.clone(), evaluate_value(v, bindings));
            }
            Value::Mapping(out)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_keys_only() {
        let b = bindings(&[("svc_name", "w")]);
        assert_eq!(evaluate_str("${svc_name}", &b), "w");
        assert_eq!(evaluate_str("${unknown}", &b), "${unknown}");
        assert_eq!(evaluate_str("prefix-${svc_name}-suffix", &b), "prefix-w-suffix");
    }

    #[test]
    fn recurses_through_maps_and_lists() {
        let b = bindings(&[("$port", "9090")]);
        let doc: Value = serde_yaml::from_str("ports:\n  - \"${$port}:80\"\nname: static\n").unwrap();
        let evaluated = evaluate_value(&doc, &b);
        let ports = evaluated.get("ports").unwrap().as_sequence().unwrap();
        assert_eq!(ports[0].as_str().unwrap(), "9090:80");
        assert_eq!(evaluated.get("name").unwrap().as_str().unwrap(), "static");
    }

    #[test]
    fn idempotent_on_already_evaluated_value() {
        let b = bindings(&[("$port", "9090")]);
        let once = evaluate_str("${$port}:80", &b);
        let twice = evaluate_str(&once, &b);
        assert_eq!(once, twice);
    }
}
