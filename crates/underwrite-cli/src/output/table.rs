use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
///
/// Scalars of an object go in one Field/Value table; nested objects and
/// arrays of rows (projection years, debt periods, tornado bars) each get
/// their own titled table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_section(None, result);
                print_envelope_notes(map);
            } else {
                print_section(None, value);
            }
        }
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_section(title: Option<&str>, value: &Value) {
    if let Some(t) = title {
        println!("\n{}", t);
    }
    match value {
        Value::Object(map) => {
            print_scalars(map);
            for (key, val) in map {
                match val {
                    Value::Object(_) => print_section(Some(key), val),
                    Value::Array(arr) if is_rows(arr) => {
                        println!("\n{}", key);
                        print_rows(arr);
                    }
                    Value::Array(arr) if is_matrix(arr) => {
                        println!("\n{}", key);
                        print_matrix(arr);
                    }
                    _ => {}
                }
            }
        }
        Value::Array(arr) => print_rows(arr),
        other => println!("{}", format_value(other)),
    }
}

fn print_scalars(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut any = false;
    for (key, val) in map {
        let nested = match val {
            Value::Object(_) => true,
            Value::Array(arr) => is_rows(arr) || is_matrix(arr),
            _ => false,
        };
        if !nested {
            builder.push_record([key.as_str(), &format_value(val)]);
            any = true;
        }
    }
    if any {
        println!("{}", Table::from(builder));
    }
}

fn print_rows(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

/// Grid matrices: one row per axis-1 value.
fn print_matrix(arr: &[Value]) {
    let mut builder = Builder::default();
    for row in arr {
        if let Value::Array(cells) = row {
            builder.push_record(cells.iter().map(format_value).collect::<Vec<_>>());
        }
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn is_rows(arr: &[Value]) -> bool {
    matches!(arr.first(), Some(Value::Object(_)))
}

fn is_matrix(arr: &[Value]) -> bool {
    matches!(arr.first(), Some(Value::Array(_)))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Unavailable metrics
        Value::Null => "--".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
