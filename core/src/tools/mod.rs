use serde_json::Value;

pub mod calculator;
pub mod function;

pub use calculator::SquareRootTool;
pub use function::FunctionTool;

pub fn extract_f64_arg(args: &Value, key: &str) -> anyhow::Result<f64> {
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a finite number", key)),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("'{}' is not a number: {}", key, s)),
        Some(_) => Err(anyhow::anyhow!("'{}' must be a number", key)),
        None => Err(anyhow::anyhow!("Missing '{}' parameter", key)),
    }
}

/// Renders a tool's JSON output the way it is sent back to the model:
/// strings without quotes, everything else as compact JSON.
pub fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_accept_strings_and_integers() {
        let args = json!({ "a": 485906798473894056u64, "b": " 2.5 ", "c": true });
        assert_eq!(extract_f64_arg(&args, "a").unwrap(), 485906798473894056.0);
        assert_eq!(extract_f64_arg(&args, "b").unwrap(), 2.5);
        assert!(extract_f64_arg(&args, "c").is_err());
        assert!(extract_f64_arg(&args, "d").is_err());
    }

    #[test]
    fn string_output_is_unquoted() {
        assert_eq!(render_output(&json!("Berlin")), "Berlin");
        assert_eq!(render_output(&json!({"x": 1})), "{\"x\":1}");
    }
}
