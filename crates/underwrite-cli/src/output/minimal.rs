use serde_json::Value;

/// Headline figures, most important first.
const PRIORITY_KEYS: [&str; 5] = [
    "levered_irr",
    "base_case",
    "level_payment",
    "equity_multiple",
    "exit_proceeds",
];

/// Print just the headline figure of the output.
///
/// Looks for a priority key in the result, then in its `metrics`, then falls
/// back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        let scopes = [Some(result_obj), map.get("metrics")];
        for key in &PRIORITY_KEYS {
            for scope in scopes.iter().flatten() {
                if let Some(val) = scope.get(*key) {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // An unavailable metric
        Value::Null => "--".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
