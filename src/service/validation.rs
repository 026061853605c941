//! Row validation from field metadata.

use crate::config::ModelFieldConfig;
use crate::error::EngineError;
use crate::sql::{Record, Value};
use regex::Regex;

pub struct DataValidator;

impl DataValidator {
    /// Check a full row: unknown keys, then every field in order. First failure wins.
    pub fn validate(model_id: &str, fields: &[ModelFieldConfig], data: &Record) -> Result<(), EngineError> {
        if fields.is_empty() {
            return Ok(());
        }
        reject_unknown_keys(model_id, fields, data)?;
        for f in fields {
            let val = data.get(&f.column_name);
            if f.is_required() && val.map_or(true, Value::is_blank) {
                return Err(required(f));
            }
            if let Some(v) = val {
                validate_field(f, v)?;
            }
        }
        Ok(())
    }

    /// Check only the keys present in `data` (Update). A present required key may not be blank.
    pub fn validate_partial(model_id: &str, fields: &[ModelFieldConfig], data: &Record) -> Result<(), EngineError> {
        if fields.is_empty() {
            return Ok(());
        }
        reject_unknown_keys(model_id, fields, data)?;
        for f in fields {
            let Some(v) = data.get(&f.column_name) else {
                continue;
            };
            if f.is_required() && v.is_blank() {
                return Err(required(f));
            }
            validate_field(f, v)?;
        }
        Ok(())
    }
}

fn reject_unknown_keys(model_id: &str, fields: &[ModelFieldConfig], data: &Record) -> Result<(), EngineError> {
    // `id` may be system assigned on create.
    match data
        .keys()
        .find(|k| *k != "id" && !fields.iter().any(|f| f.column_name == *k))
    {
        Some(k) => Err(EngineError::validation(k, format!("not defined in model {}", model_id))),
        None => Ok(()),
    }
}

fn required(f: &ModelFieldConfig) -> EngineError {
    EngineError::validation(&f.column_name, format!("{} is required", f.label()))
}

fn validate_field(f: &ModelFieldConfig, v: &Value) -> Result<(), EngineError> {
    if v.is_blank() {
        return Ok(());
    }
    let text = v.to_string();
    if f.is_textual() && f.max_length > 0 {
        let len = text.chars().count();
        if len > f.max_length {
            return Err(EngineError::validation(
                &f.column_name,
                format!("must be at most {} characters (got {})", f.max_length, len),
            ));
        }
    }
    if f.is_numeric() {
        let num = v
            .as_f64()
            .or_else(|| text.trim().parse::<f64>().ok())
            .ok_or_else(|| EngineError::validation(&f.column_name, "must be a number"))?;
        if f.max > f.min {
            if num > f.max {
                return Err(EngineError::validation(&f.column_name, format!("must be at most {}", f.max)));
            }
            if num < f.min {
                return Err(EngineError::validation(&f.column_name, format!("must be at least {}", f.min)));
            }
        }
    }
    if !f.validation_rule.is_empty() {
        let re = Regex::new(&f.validation_rule).map_err(|e| {
            EngineError::validation(&f.column_name, format!("invalid validation rule: {}", e))
        })?;
        if !re.is_match(&text) {
            return Err(EngineError::validation(&f.column_name, "does not match the validation rule"));
        }
    }
    Ok(())
}
