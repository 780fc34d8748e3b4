//! Preset model and step parsing.
//!
//! A preset is a named sequence of step strings applied to one device:
//!
//! ```json
//! {
//!   "name": "movie night",
//!   "device": "living room",
//!   "steps": ["backlight(45)", "contrast(80)", "volume(14)", "HDMI_2"]
//! }
//! ```
//!
//! Step syntax is `name(arg, ...)` or a bare name. The engine decides what
//! a name means; this module only parses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A named sequence of steps for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    /// Device reference: a configured device name or an IP address.
    pub device: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// One parsed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub args: Vec<String>,
}

impl Step {
    /// Parse `name(arg, ...)` or a bare `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStep`] for empty input, unbalanced
    /// parentheses, or an empty name.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidStep(raw.to_string()));
        }

        let Some(open) = raw.find('(') else {
            return Ok(Self {
                name: raw.to_string(),
                args: Vec::new(),
            });
        };

        if !raw.ends_with(')') {
            return Err(Error::InvalidStep(raw.to_string()));
        }
        let name = raw[..open].trim();
        if name.is_empty() {
            return Err(Error::InvalidStep(raw.to_string()));
        }

        let inner = &raw[open + 1..raw.len() - 1];
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|a| a.trim().to_string()).collect()
        };

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    /// Positional argument as a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStep`] when the argument is missing.
    pub fn str_arg(&self, index: usize) -> Result<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidStep(format!("{}: missing argument {index}", self.name)))
    }

    /// Positional argument as an integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStep`] when missing or not a number.
    pub fn int_arg(&self, index: usize) -> Result<i32> {
        self.str_arg(index)?
            .parse()
            .map_err(|_| Error::InvalidStep(format!("{}: argument {index} is not a number", self.name)))
    }

    /// Positional argument as a boolean (`true`/`false`, `on`/`off`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStep`] when missing or not boolean-shaped.
    pub fn bool_arg(&self, index: usize) -> Result<bool> {
        match self.str_arg(index)?.to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" => Ok(false),
            _ => Err(Error::InvalidStep(format!(
                "{}: argument {index} is not a boolean",
                self.name
            ))),
        }
    }

    /// Positional argument as a JSON value: numbers become numbers,
    /// `true`/`false` become booleans, everything else stays a string.
    /// That is the shape the settings service expects for values like
    /// `backlight(80)` versus `pictureMode(game)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStep`] when the argument is missing.
    pub fn json_arg(&self, index: usize) -> Result<Value> {
        let raw = self.str_arg(index)?;
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(Value::from(n));
        }
        match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Ok(Value::from(raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_step_with_one_arg() {
        let step = Step::parse("backlight(80)").unwrap();
        assert_eq!(step.name, "backlight");
        assert_eq!(step.args, vec!["80"]);
    }

    #[test]
    fn test_parse_step_with_multiple_args() {
        let step = Step::parse("toast(hello there, world)").unwrap();
        assert_eq!(step.name, "toast");
        assert_eq!(step.args, vec!["hello there", "world"]);
    }

    #[test]
    fn test_parse_bare_step() {
        let step = Step::parse("HDMI_2").unwrap();
        assert_eq!(step.name, "HDMI_2");
        assert!(step.args.is_empty());
    }

    #[test]
    fn test_parse_empty_parens() {
        let step = Step::parse("screenOff()").unwrap();
        assert_eq!(step.name, "screenOff");
        assert!(step.args.is_empty());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let step = Step::parse("  volume( 12 )  ").unwrap();
        assert_eq!(step.name, "volume");
        assert_eq!(step.args, vec!["12"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Step::parse("").is_err());
        assert!(Step::parse("   ").is_err());
        assert!(Step::parse("volume(12").is_err());
        assert!(Step::parse("(12)").is_err());
    }

    #[test]
    fn test_int_arg() {
        let step = Step::parse("volume(12)").unwrap();
        assert_eq!(step.int_arg(0).unwrap(), 12);
        assert!(step.int_arg(1).is_err());

        let step = Step::parse("volume(loud)").unwrap();
        assert!(step.int_arg(0).is_err());
    }

    #[test]
    fn test_bool_arg_accepts_on_off() {
        let step = Step::parse("mute(on)").unwrap();
        assert!(step.bool_arg(0).unwrap());
        let step = Step::parse("mute(false)").unwrap();
        assert!(!step.bool_arg(0).unwrap());
        let step = Step::parse("mute(maybe)").unwrap();
        assert!(step.bool_arg(0).is_err());
    }

    #[test]
    fn test_json_arg_types() {
        let step = Step::parse("backlight(80)").unwrap();
        assert_eq!(step.json_arg(0).unwrap(), Value::from(80));

        let step = Step::parse("pictureMode(game)").unwrap();
        assert_eq!(step.json_arg(0).unwrap(), Value::from("game"));

        let step = Step::parse("energySaving(false)").unwrap();
        assert_eq!(step.json_arg(0).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_preset_round_trip() {
        let json = r#"{
            "name": "movie night",
            "device": "living room",
            "steps": ["backlight(45)", "HDMI_2"]
        }"#;
        let preset: Preset = serde_json::from_str(json).unwrap();
        assert_eq!(preset.name, "movie night");
        assert_eq!(preset.steps.len(), 2);

        let back = serde_json::to_string(&preset).unwrap();
        assert!(back.contains("movie night"));
    }
}
