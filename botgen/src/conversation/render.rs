//! `{{vars.key}}` substitution for conversation templates.

use std::sync::OnceLock;

use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::template::TextTemplate;

fn vars_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{\{\{?\s*vars\.([A-Za-z0-9_.\-]+)\s*\}?\}\}").ok())
        .as_ref()
}

/// Looks up a dotted path (`user.name`) in the vars.
fn lookup<'a>(vars: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Replaces `{{vars.x}}` and `{{{vars.x}}}` with the var's value. Missing vars render empty.
pub fn render(template: &str, vars: &Map<String, Value>) -> String {
    let Some(pattern) = vars_pattern() else {
        return template.to_string();
    };
    pattern
        .replace_all(template, |caps: &Captures| match lookup(vars, &caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
        .into_owned()
}

/// Renders every string inside a JSON value.
pub fn render_value(value: &Value, vars: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Picks the line text (a random choice) and renders it.
pub fn render_text(text: &TextTemplate, vars: &Map<String, Value>) -> Option<String> {
    match text {
        TextTemplate::Choices(choices) => choices
            .choose(&mut rand::thread_rng())
            .map(|choice| render(choice, vars)),
        TextTemplate::Dynamic(build) => Some(build(vars)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Map<String, Value> {
        match json!({
            "name": "Ada",
            "age": 36,
            "user": { "city": "London", "tags": ["a", "b"] }
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_render_simple_and_triple_braces() {
        assert_eq!(render("Hi {{vars.name}}!", &vars()), "Hi Ada!");
        assert_eq!(render("Hi {{{vars.name}}}!", &vars()), "Hi Ada!");
        assert_eq!(render("{{ vars.age }} years", &vars()), "36 years");
    }

    #[test]
    fn test_render_dotted_paths_and_missing() {
        assert_eq!(render("from {{vars.user.city}}", &vars()), "from London");
        assert_eq!(render("{{vars.user.tags.1}}", &vars()), "b");
        assert_eq!(render("[{{vars.nope}}]", &vars()), "[]");
        assert_eq!(render("no vars here", &vars()), "no vars here");
    }

    #[test]
    fn test_render_value_recurses() {
        let value = json!([{ "title": "{{vars.name}}", "payload": 1 }]);
        assert_eq!(
            render_value(&value, &vars()),
            json!([{ "title": "Ada", "payload": 1 }])
        );
    }

    #[test]
    fn test_render_text_choices() {
        let text = TextTemplate::Choices(vec!["a {{vars.name}}".into(), "b {{vars.name}}".into()]);
        let rendered = render_text(&text, &vars()).unwrap();
        assert!(rendered == "a Ada" || rendered == "b Ada");
        assert_eq!(render_text(&TextTemplate::Choices(vec![]), &vars()), None);
    }
}
