//! `{placeholder}` expansion for command argument templates.
//!
//! Each template becomes exactly one argv entry; there is no shell, so
//! values cannot split into extra arguments.

use serde::Serialize;
use serde_json::Value;

use super::PayloadError;

/// Expand every `{name}` in `templates` from the payload's serialized fields.
pub fn expand_args<P: Serialize>(templates: &[String], payload: &P) -> Result<Vec<String>, PayloadError> {
    let fields = serde_json::to_value(payload).map_err(PayloadError::Decode)?;
    templates.iter().map(|t| expand_one(t, &fields)).collect()
}

fn expand_one(template: &str, fields: &Value) -> Result<String, PayloadError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(PayloadError::Invalid(format!(
                "unterminated placeholder in argument template `{template}`"
            )));
        };
        let name = &after[..close];
        let value = field_as_arg(fields, name)?;
        // 先頭 '-' はオプション扱いされるので拒否
        if out.is_empty() && value.starts_with('-') {
            return Err(PayloadError::Invalid(format!(
                "field `{name}` may not start with '-'"
            )));
        }
        out.push_str(&value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn field_as_arg(fields: &Value, name: &str) -> Result<String, PayloadError> {
    match fields.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Null) | None => Err(PayloadError::Invalid(format!(
            "missing field `{name}` for argument template"
        ))),
        Some(_) => Err(PayloadError::Invalid(format!(
            "field `{name}` cannot be used as a command argument"
        ))),
    }
}
