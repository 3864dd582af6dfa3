use crate::policy::TimerPolicy;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A typed experimental parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Color([u8; 4]),
    Text(String),
    Number(f64),
    Integer(i64),
    Timer(TimerPolicy),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Color([r, g, b, a]) => write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}"),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Timer(t) => f.write_str(t.name()),
        }
    }
}

/// Named experimental parameters of a display.
///
/// Parameters are defined exactly once when the display is constructed and
/// may be reassigned (same name, same variant) any time before the display
/// is handed to the presentation queue.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    values: HashMap<String, ParamValue>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a fresh parameter. Redefinition is an error.
    pub fn define(&mut self, name: &str, value: ParamValue) -> Result<()> {
        if self.values.contains_key(name) {
            bail!("parameter {name} already defined");
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Override an existing parameter with a value of the same variant.
    pub fn assign(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match self.values.get_mut(name) {
            None => bail!("parameter {name} is not defined"),
            Some(slot) => {
                if std::mem::discriminant(slot) != std::mem::discriminant(&value) {
                    bail!("parameter {name} cannot change type");
                }
                *slot = value;
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn color(&self, name: &str) -> Result<[u8; 4]> {
        match self.values.get(name) {
            Some(ParamValue::Color(c)) => Ok(*c),
            _ => bail!("missing color parameter {name}"),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(s)) => Ok(s),
            _ => bail!("missing text parameter {name}"),
        }
    }

    pub fn number(&self, name: &str) -> Result<f64> {
        match self.values.get(name) {
            Some(ParamValue::Number(n)) => Ok(*n),
            _ => bail!("missing number parameter {name}"),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64> {
        match self.values.get(name) {
            Some(ParamValue::Integer(i)) => Ok(*i),
            _ => bail!("missing integer parameter {name}"),
        }
    }

    pub fn timer(&self, name: &str) -> Result<TimerPolicy> {
        match self.values.get(name) {
            Some(ParamValue::Timer(t)) => Ok(t.clone()),
            _ => bail!("missing timer parameter {name}"),
        }
    }

    /// Substitute `%Name%` references with the named parameter's display
    /// string. Unknown names are left verbatim, percent signs included.
    pub fn expand(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end) => {
                    let name = &after[..end];
                    match self.values.get(name) {
                        Some(value) => {
                            out.push_str(&value.to_string());
                            rest = &after[end + 1..];
                        }
                        None => {
                            out.push('%');
                            rest = after;
                        }
                    }
                }
                None => {
                    out.push('%');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_twice_is_an_error() {
        let mut params = ParamTable::new();
        params.define("Color", ParamValue::Color([0, 0, 0, 255])).unwrap();
        assert!(params.define("Color", ParamValue::Color([255, 255, 255, 255])).is_err());
    }

    #[test]
    fn assign_overrides_defined_parameter() {
        let mut params = ParamTable::new();
        params.define("Duration", ParamValue::Integer(500)).unwrap();
        params.assign("Duration", ParamValue::Integer(750)).unwrap();
        assert_eq!(params.integer("Duration").unwrap(), 750);
    }

    #[test]
    fn assign_rejects_undefined_name_and_type_change() {
        let mut params = ParamTable::new();
        params.define("Text", ParamValue::Text("hi".into())).unwrap();
        assert!(params.assign("Nope", ParamValue::Integer(1)).is_err());
        assert!(params.assign("Text", ParamValue::Integer(1)).is_err());
    }

    #[test]
    fn typed_getter_reports_wrong_variant() {
        let mut params = ParamTable::new();
        params.define("FontSize", ParamValue::Number(32.0)).unwrap();
        assert!(params.color("FontSize").is_err());
        assert_eq!(params.number("FontSize").unwrap(), 32.0);
    }

    #[test]
    fn expand_substitutes_known_names() {
        let mut params = ParamTable::new();
        params.define("TrialCounter", ParamValue::Integer(7)).unwrap();
        assert_eq!(params.expand("Trial %TrialCounter%"), "Trial 7");
    }

    #[test]
    fn expand_leaves_unknown_names_verbatim() {
        let params = ParamTable::new();
        assert_eq!(params.expand("Trial %TrialCounter%"), "Trial %TrialCounter%");
        assert_eq!(params.expand("100% done"), "100% done");
    }

    #[test]
    fn expand_handles_adjacent_references() {
        let mut params = ParamTable::new();
        params.define("A", ParamValue::Integer(1)).unwrap();
        params.define("B", ParamValue::Integer(2)).unwrap();
        assert_eq!(params.expand("%A%%B%"), "12");
    }
}
