use crate::error::validation::ValidationError;
use crate::file_ops::Selections;
use crate::modules::{FieldKind, FieldSpec, ModuleSpec};
use crate::protocol::JobDescriptor;

use common::ErrorLocation;

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value, json};

/// Largest whole value sent as a JSON integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Raw text state of one module's form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleForm {
    pub values: BTreeMap<String, String>,
    /// Blank means the module's default timeout.
    pub timeout: String,
    pub play_once: bool,
    pub intro_outro: bool,
    pub intro: String,
    pub outro: String,
}

impl ModuleForm {
    /// A form pre-filled with the module's default values.
    pub fn defaults(spec: &ModuleSpec) -> Self {
        let values = spec
            .fields
            .iter()
            .filter(|field| !field.default.is_empty())
            .map(|field| (field.key.to_string(), field.default.to_string()))
            .collect();

        Self {
            values,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn set_flag(&mut self, key: impl Into<String>, on: bool) {
        self.set(key, if on { "true" } else { "false" });
    }

    pub fn is_valid(&self, spec: &ModuleSpec, selections: &Selections) -> bool {
        self.build_args(spec, selections).is_ok()
    }

    /// Build the `args` object, omitting empty optional fields.
    pub fn build_args(
        &self,
        spec: &ModuleSpec,
        selections: &Selections,
    ) -> Result<Map<String, Value>, ValidationError> {
        let mut args = Map::new();

        for field in spec.fields {
            if let Some((other, expected)) = field.when
                && self.get(other).trim() != expected
            {
                continue;
            }

            let raw = self.raw_value(field, selections);
            if raw.is_empty() {
                if field.required && field.kind != FieldKind::Flag {
                    return Err(ValidationError::MissingField {
                        module: spec.name.to_string(),
                        field: field.key.to_string(),
                        location: ErrorLocation::here(),
                    });
                }
                continue;
            }

            if let Some(value) = convert(spec, field, &raw)? {
                args.insert(field.key.to_string(), value);
            }
        }

        Ok(args)
    }

    /// Build the full start payload.
    pub fn build_job(
        &self,
        spec: &ModuleSpec,
        selections: &Selections,
    ) -> Result<JobDescriptor, ValidationError> {
        let args = self.build_args(spec, selections)?;
        let mut job = JobDescriptor::new(spec.name, args);

        let timeout = self.timeout.trim();
        job.timeout = if timeout.is_empty() {
            spec.default_timeout
        } else {
            timeout.parse().map_err(|_| ValidationError::InvalidField {
                module: spec.name.to_string(),
                field: "timeout".to_string(),
                message: format!("'{timeout}' is not a whole number of seconds"),
                location: ErrorLocation::here(),
            })?
        };

        if spec.playback_options {
            job.play_once = self.play_once;
            if self.intro_outro {
                job.intro = non_empty(&self.intro);
                job.outro = non_empty(&self.outro);
            }
        }

        Ok(job)
    }

    fn raw_value(&self, field: &FieldSpec, selections: &Selections) -> String {
        let value = match field.kind {
            FieldKind::Text | FieldKind::PagerMessages => self.get(field.key).to_string(),
            _ => self.get(field.key).trim().to_string(),
        };

        if let FieldKind::File(category) = field.kind
            && value.is_empty()
        {
            return selections.get(category).unwrap_or("").to_string();
        }
        value
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn invalid(spec: &ModuleSpec, field: &FieldSpec, message: String) -> ValidationError {
    ValidationError::InvalidField {
        module: spec.name.to_string(),
        field: field.key.to_string(),
        message,
        location: ErrorLocation::here(),
    }
}

fn convert(
    spec: &ModuleSpec,
    field: &FieldSpec,
    raw: &str,
) -> Result<Option<Value>, ValidationError> {
    let value = match field.kind {
        FieldKind::Float => {
            let number: f64 = raw
                .parse()
                .map_err(|_| invalid(spec, field, format!("'{raw}' is not a number")))?;
            if !number.is_finite() {
                return Err(invalid(spec, field, format!("'{raw}' is not finite")));
            }
            number_value(number)
        }
        FieldKind::Integer => {
            let number: i64 = raw
                .parse()
                .map_err(|_| invalid(spec, field, format!("'{raw}' is not an integer")))?;
            Value::from(number)
        }
        FieldKind::Text => {
            let text = raw.trim();
            if text.is_empty() {
                if field.required {
                    return Err(ValidationError::MissingField {
                        module: spec.name.to_string(),
                        field: field.key.to_string(),
                        location: ErrorLocation::here(),
                    });
                }
                return Ok(None);
            }
            Value::from(text)
        }
        FieldKind::Flag => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" => return Ok(None),
            other => return Err(invalid(spec, field, format!("'{other}' is not a flag"))),
        },
        FieldKind::File(_) => Value::from(raw),
        FieldKind::Choice(options) => {
            if !options.contains(&raw) {
                return Err(invalid(
                    spec,
                    field,
                    format!("'{raw}' is not one of {}", options.join(", ")),
                ));
            }
            Value::from(raw)
        }
        FieldKind::PagerMessages => pager_messages(spec, field, raw)?,
    };

    Ok(Some(value))
}

/// Whole numbers go out as integers so `144500000` is not sent as `144500000.0`.
pub(crate) fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() <= MAX_EXACT_INTEGER {
        Value::from(number as i64)
    } else {
        Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}

fn pager_messages(
    spec: &ModuleSpec,
    field: &FieldSpec,
    raw: &str,
) -> Result<Value, ValidationError> {
    let mut messages = Vec::new();

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (address, text) = line.split_once(':').ok_or_else(|| {
            invalid(spec, field, format!("'{line}' is not in address:message form"))
        })?;

        let address: i64 = address
            .trim()
            .parse()
            .map_err(|_| invalid(spec, field, format!("'{address}' is not a pager address")))?;

        messages.push(json!({ "address": address, "message": text.trim() }));
    }

    if messages.is_empty() {
        return Err(ValidationError::MissingField {
            module: spec.name.to_string(),
            field: field.key.to_string(),
            location: ErrorLocation::here(),
        });
    }

    Ok(Value::Array(messages))
}

/// Per-module form state, created from defaults on first access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleForms {
    forms: BTreeMap<String, ModuleForm>,
}

impl ModuleForms {
    pub fn get(&self, module: &str) -> Option<&ModuleForm> {
        self.forms.get(module)
    }

    pub fn form_mut(&mut self, spec: &ModuleSpec) -> &mut ModuleForm {
        self.forms
            .entry(spec.name.to_string())
            .or_insert_with(|| ModuleForm::defaults(spec))
    }

    pub fn form(&self, spec: &ModuleSpec) -> ModuleForm {
        self.forms
            .get(spec.name)
            .cloned()
            .unwrap_or_else(|| ModuleForm::defaults(spec))
    }

    pub fn insert(&mut self, module: impl Into<String>, form: ModuleForm) {
        self.forms.insert(module.into(), form);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModuleForm)> {
        self.forms.iter()
    }

    /// Point every field holding `old` at `new` after a rename.
    pub fn replace_path(&mut self, old: &str, new: &str) {
        for form in self.forms.values_mut() {
            for value in form.values.values_mut() {
                if *value == old {
                    *value = new.to_string();
                }
            }
            for value in [&mut form.intro, &mut form.outro] {
                if *value == old {
                    *value = new.to_string();
                }
            }
        }
    }

    /// Blank every field holding a deleted path.
    pub fn clear_path(&mut self, path: &str) {
        self.replace_path(path, "");
    }
}
