//! # Worker Options Module
//!
//! Validazione e finalizzazione delle opzioni di un worker.
//!
//! ## Responsabilità:
//! - `OptionSchema`: elenco ordinato `nome → (default, transform)` dichiarato
//!   una sola volta per tipo di worker (come `static`)
//! - `OptionSchema::resolve()`: consuma la mappa fornita dal chiamante, applica
//!   i transform e rifiuta qualsiasi chiave non dichiarata
//! - Helper di coercizione tolleranti (`to_string_list`, `to_integer`, `to_bool`)
//!
//! ## Politica di validazione:
//! - Chiavi sconosciute → `OptimizeError::Configuration` (fatale, nessun worker creato)
//! - Valori non validi dentro un'opzione nota → warning e correzione, mai errore
//!
//! ## Esempio:
//! ```rust,ignore
//! let resolved = SCHEMA.resolve(options)?;
//! let max_quality = resolved.int("max_quality")?;
//! ```

use crate::error::OptimizeError;
use serde_json::{Map, Value};
use tracing::warn;

/// Raw option mapping as supplied by the caller (config file, CLI, tests)
pub type Options = Map<String, Value>;

/// Lenient transform applied to a caller-supplied value
pub type Transform = fn(Value, &mut Warnings) -> Value;

/// One declared option
pub struct OptionSpec {
    pub name: &'static str,
    pub default: fn() -> Value,
    pub transform: Option<Transform>,
}

/// Ordered option declarations for one worker type
pub struct OptionSchema {
    worker: &'static str,
    specs: &'static [OptionSpec],
}

/// Warnings raised by transforms while resolving one option set.
///
/// Every message is logged through `tracing` as soon as it is pushed and kept
/// so the caller can surface it again.
#[derive(Debug)]
pub struct Warnings {
    worker: &'static str,
    messages: Vec<String>,
}

impl Warnings {
    fn new(worker: &'static str) -> Self {
        Self {
            worker,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: String) {
        warn!(worker = self.worker, "{}", message);
        self.messages.push(message);
    }
}

impl OptionSchema {
    pub const fn new(worker: &'static str, specs: &'static [OptionSpec]) -> Self {
        Self { worker, specs }
    }

    /// Declared option names, in declaration order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|spec| spec.name)
    }

    /// Consume `input`, producing the final option values.
    ///
    /// Fails with `Configuration` naming every key the schema does not declare.
    pub fn resolve(&self, mut input: Options) -> Result<ResolvedOptions, OptimizeError> {
        let mut warnings = Warnings::new(self.worker);
        let mut values = Map::new();

        for spec in self.specs {
            let value = match input.remove(spec.name) {
                Some(raw) => match spec.transform {
                    Some(transform) => transform(raw, &mut warnings),
                    None => raw,
                },
                None => (spec.default)(),
            };
            values.insert(spec.name.to_string(), value);
        }

        if !input.is_empty() {
            let mut keys: Vec<String> = input.into_iter().map(|(key, _)| key).collect();
            keys.sort();
            return Err(OptimizeError::Configuration {
                worker: self.worker.to_string(),
                keys,
            });
        }

        Ok(ResolvedOptions {
            worker: self.worker,
            values,
            warnings: warnings.messages,
        })
    }
}

/// Fully validated options of one worker instance. Immutable once built.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    worker: &'static str,
    values: Map<String, Value>,
    warnings: Vec<String>,
}

impl ResolvedOptions {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Warnings raised by lenient transforms during resolution
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn int(&self, name: &str) -> Result<i64, OptimizeError> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.type_error(name, "an integer"))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, OptimizeError> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.type_error(name, "a boolean"))
    }

    pub fn optional_bool(&self, name: &str) -> Result<Option<bool>, OptimizeError> {
        match self.get(name) {
            Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            _ => Err(self.type_error(name, "a boolean or null")),
        }
    }

    pub fn strings(&self, name: &str) -> Result<Vec<String>, OptimizeError> {
        let items = self
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| self.type_error(name, "a list"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.type_error(name, "a list of strings"))
            })
            .collect()
    }

    fn type_error(&self, name: &str, expected: &str) -> OptimizeError {
        OptimizeError::InvalidConfig(format!(
            "option {} of {} is not {}",
            name, self.worker, expected
        ))
    }
}

/// Coerce any value into a list of strings.
///
/// A string becomes a one-element list, an array has each element stringified,
/// null becomes an empty list and any other scalar its JSON text.
pub fn to_string_list(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(scalar_to_string).collect(),
        other => vec![scalar_to_string(other)],
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Coerce a value into an integer, falling back to `default` for values that
/// have no integer reading. Null reads as 0.
pub fn to_integer(value: Value, default: i64, name: &str, warnings: &mut Warnings) -> i64 {
    match value {
        Value::Null => 0,
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => n.as_f64().map(|f| f.trunc() as i64).unwrap_or(default),
        },
        Value::String(s) => match leading_integer(&s) {
            Some(i) => i,
            None => {
                warnings.push(format!("Option {} is not a number: {:?}, using 0", name, s));
                0
            }
        },
        other => {
            warnings.push(format!(
                "Option {} expects a number, got {}, using {}",
                name, other, default
            ));
            default
        }
    }
}

/// Leading optionally-signed decimal integer of `s`, ignoring leading whitespace
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with('-') || s.starts_with('+'));
    let digits_len = s[digits_start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits_len == 0 {
        return None;
    }
    s[..digits_start + digits_len].parse().ok()
}

/// Truthiness: null and false are false, everything else is true
pub fn to_bool(value: Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn double_level(value: Value, warnings: &mut Warnings) -> Value {
        json!(to_integer(value, 1, "level", warnings) * 2)
    }

    static SCHEMA: OptionSchema = OptionSchema::new(
        "sample",
        &[
            OptionSpec {
                name: "level",
                default: || json!(1),
                transform: Some(double_level),
            },
            OptionSpec {
                name: "name",
                default: || json!("x"),
                transform: None,
            },
        ],
    );

    fn options(value: Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_are_not_transformed() {
        let resolved = SCHEMA.resolve(Options::new()).unwrap();
        assert_eq!(resolved.int("level").unwrap(), 1);
        assert_eq!(resolved.get("name"), Some(&json!("x")));
        assert!(resolved.warnings().is_empty());
    }

    #[test]
    fn test_supplied_values_are_transformed() {
        let resolved = SCHEMA.resolve(options(json!({"level": "4"}))).unwrap();
        assert_eq!(resolved.int("level").unwrap(), 8);
    }

    #[test]
    fn test_unknown_keys_are_rejected_by_name() {
        let err = SCHEMA
            .resolve(options(json!({"level": 2, "zeta": 1, "alpha": true})))
            .unwrap_err();
        match err {
            OptimizeError::Configuration { worker, keys } => {
                assert_eq!(worker, "sample");
                assert_eq!(keys, vec!["alpha".to_string(), "zeta".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_to_string_list() {
        assert_eq!(to_string_list(json!("exif")), vec!["exif"]);
        assert_eq!(to_string_list(json!(["a", 1, true])), vec!["a", "1", "true"]);
        assert!(to_string_list(Value::Null).is_empty());
    }

    #[test]
    fn test_to_integer_is_lenient() {
        let mut warnings = Warnings::new("sample");
        assert_eq!(to_integer(json!(85), 100, "q", &mut warnings), 85);
        assert_eq!(to_integer(json!(85.9), 100, "q", &mut warnings), 85);
        assert_eq!(to_integer(json!(" 70abc"), 100, "q", &mut warnings), 70);
        assert_eq!(to_integer(Value::Null, 100, "q", &mut warnings), 0);
        assert!(warnings.messages.is_empty());

        assert_eq!(to_integer(json!("abc"), 100, "q", &mut warnings), 0);
        assert_eq!(to_integer(json!(true), 100, "q", &mut warnings), 100);
        assert_eq!(warnings.messages.len(), 2);
    }

    #[test]
    fn test_to_bool() {
        assert!(!to_bool(Value::Null));
        assert!(!to_bool(json!(false)));
        assert!(to_bool(json!(0)));
        assert!(to_bool(json!("no")));
    }

    #[test]
    fn test_typed_getters_report_mismatch() {
        let resolved = SCHEMA.resolve(Options::new()).unwrap();
        assert!(resolved.boolean("name").is_err());
        assert!(resolved.strings("level").is_err());
        assert!(resolved.int("missing").is_err());
    }
}
