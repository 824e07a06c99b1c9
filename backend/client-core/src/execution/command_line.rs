use serde_json::{Map, Value};

/// String values longer than this are quoted.
const QUOTE_LENGTH_THRESHOLD: usize = 20;

/// Render `module -key value ...` for the status bar.
///
/// Null and empty-string values are skipped. Strings containing a space or
/// longer than 20 characters are wrapped in double quotes.
pub fn render_command_line(module: &str, args: &Map<String, Value>) -> String {
    let mut line = module.to_string();

    for (key, value) in args {
        let rendered = match value {
            Value::Null => continue,
            Value::String(text) if text.is_empty() => continue,
            Value::String(text)
                if text.contains(' ') || text.chars().count() > QUOTE_LENGTH_THRESHOLD =>
            {
                format!("\"{text}\"")
            }
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        line.push_str(&format!(" -{key} {rendered}"));
    }

    line
}
