//! `{{placeholder}}` substitution for assistant prompts.
//!
//! Assistant instructions and greetings may embed `{{key}}` tags that are
//! filled from the dispatch metadata at call time, e.g. a CRM can pass the
//! callee's name per call. Unknown keys render as empty strings so a stale
//! template never leaks braces into a live prompt.

use serde_json::Value;

/// Renders `template`, replacing each `{{key}}` tag with the matching value
/// from `vars`. Keys are trimmed and may use dots to reach nested fields
/// (`{{customer.name}}`). Missing keys and JSON nulls render as "".
pub fn render(template: &str, vars: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                if let Some(value) = lookup(vars, after[..end].trim()) {
                    render_value(&mut out, value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated tag: keep the text verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn lookup<'a>(vars: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = vars;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn render_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // Objects and arrays render as compact JSON.
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_string_values() {
        let vars = json!({"name": "Priya", "company": "Acme"});
        assert_eq!(
            render("Hello {{name}}, welcome to {{ company }}.", &vars),
            "Hello Priya, welcome to Acme."
        );
    }

    #[test]
    fn missing_and_null_keys_render_empty() {
        let vars = json!({"gone": null});
        assert_eq!(render("a{{missing}}b{{gone}}c", &vars), "abc");
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        let vars = json!({"customer": {"name": "Sam", "tier": 2}});
        assert_eq!(
            render("{{customer.name}} is tier {{customer.tier}}", &vars),
            "Sam is tier 2"
        );
    }

    #[test]
    fn non_scalar_values_render_as_json() {
        let vars = json!({"tags": ["a", "b"], "ok": true});
        assert_eq!(render("{{tags}} {{ok}}", &vars), r#"["a","b"] true"#);
    }

    #[test]
    fn unterminated_tag_is_left_verbatim() {
        let vars = json!({"name": "Priya"});
        assert_eq!(render("Hello {{name", &vars), "Hello {{name");
    }

    #[test]
    fn lookup_on_non_object_vars_renders_empty() {
        assert_eq!(render("x{{key}}y", &json!("just a string")), "xy");
    }
}
