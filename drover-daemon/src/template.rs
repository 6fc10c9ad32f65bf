//! Script template rendering
//!
//! A run's script is stored as a template. Before dispatch it is rendered
//! with the run id, the raw model config text, and every top-level key of
//! the parameters object as string variables.

use minijinja::Environment;
use std::collections::HashMap;
use uuid::Uuid;

/// Parse a parameters JSON object into template variables.
///
/// Values are stringified: `{"epochs": 3}` becomes `epochs = "3"`. Strings
/// keep their content without quotes; anything else renders as compact JSON.
pub fn parse_parameters(parameters: &str) -> anyhow::Result<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(parameters)?;

    let object = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("parameters must be a JSON object"))?;

    let mut variables = HashMap::new();
    for (key, value) in object {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        variables.insert(key.clone(), rendered);
    }

    Ok(variables)
}

/// Render a script template into an executable script.
///
/// `run_id` and `model_config` are reserved variable names and win over
/// parameter keys with the same name.
pub fn render_script(
    template: &str,
    run_id: Uuid,
    model_config: &str,
    parameters: &HashMap<String, String>,
) -> Result<String, minijinja::Error> {
    let mut variables = parameters.clone();
    variables.insert("run_id".to_string(), run_id.to_string());
    variables.insert("model_config".to_string(), model_config.to_string());

    let env = Environment::new();
    env.render_str(template, &variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parameters_stringifies_values() {
        let variables =
            parse_parameters(r#"{"epochs": 3, "lr": 0.001, "name": "resnet", "debug": true}"#)
                .unwrap();

        assert_eq!(variables.get("epochs").unwrap(), "3");
        assert_eq!(variables.get("lr").unwrap(), "0.001");
        assert_eq!(variables.get("name").unwrap(), "resnet");
        assert_eq!(variables.get("debug").unwrap(), "true");
    }

    #[test]
    fn test_parse_parameters_rejects_non_objects() {
        assert!(parse_parameters(r#"[1, 2]"#).is_err());
        assert!(parse_parameters("not json").is_err());
    }

    #[test]
    fn test_render_receives_run_id_model_config_and_parameters() {
        let run_id = Uuid::new_v4();
        let parameters = parse_parameters(r#"{"epochs": 3}"#).unwrap();

        let script = render_script(
            "train --run {{ run_id }} --config '{{ model_config }}' --epochs {{ epochs }}",
            run_id,
            r#"{"layers": 5}"#,
            &parameters,
        )
        .unwrap();

        assert!(script.contains(&run_id.to_string()));
        assert!(script.contains(r#"{"layers": 5}"#));
        assert!(script.contains("--epochs 3"));
    }

    #[test]
    fn test_reserved_names_win_over_parameters() {
        let run_id = Uuid::new_v4();
        let mut parameters = HashMap::new();
        parameters.insert("run_id".to_string(), "spoofed".to_string());

        let script = render_script("{{ run_id }}", run_id, "{}", &parameters).unwrap();
        assert_eq!(script, run_id.to_string());
    }

    #[test]
    fn test_render_fails_on_bad_template() {
        let parameters = HashMap::new();
        assert!(render_script("{{ unclosed", Uuid::new_v4(), "{}", &parameters).is_err());
    }
}
