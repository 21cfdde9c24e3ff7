//! Tool input validation.
//!
//! Schema validation is delegated through [`SchemaValidator`] so embedders
//! can swap in their own engine; the default implementation is backed by the
//! `jsonschema` crate.

use serde_json::Value;

/// Validates parsed tool input against a tool's schema descriptor.
pub trait SchemaValidator: Send + Sync {
    /// `Ok(())` when `instance` conforms to `schema`, otherwise a
    /// human-readable reason.
    fn validate(&self, schema: &Value, instance: &Value) -> Result<(), String>;
}

/// Default validator backed by the `jsonschema` crate.
///
/// A schema that is not a JSON object, or fails to compile, is treated as
/// unconstrained: the input passes and a warning is logged. Validation
/// failure messages are capped at the first three errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, instance: &Value) -> Result<(), String> {
        if !schema.is_object() {
            return Ok(());
        }
        let compiled = match jsonschema::validator_for(schema) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("invalid tool schema, skipping validation: {e}");
                return Ok(());
            }
        };
        if compiled.validate(instance).is_err() {
            let mut msgs = Vec::new();
            for err in compiled.iter_errors(instance) {
                msgs.push(format!("{} at {}", err, err.instance_path));
                if msgs.len() >= 3 {
                    break;
                }
            }
            return Err(msgs.join("; "));
        }
        Ok(())
    }
}

/// Parse raw tool-call input text and validate it against the tool schema.
///
/// Empty or whitespace-only input validates as the empty JSON object: many
/// models emit empty strings for tools that take no arguments.
pub(crate) fn parse_tool_input(
    raw: &str,
    schema: &Value,
    validator: &dyn SchemaValidator,
) -> Result<Value, String> {
    let value = if raw.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {e}"))?
    };
    validator.validate(schema, &value)?;
    Ok(value)
}
