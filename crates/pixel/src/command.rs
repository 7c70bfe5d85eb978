//! A verb with ordered keyword arguments.

use std::fmt;

use crate::Value;

/// One engine command, e.g. `Vision ( engine = "…", command = "…" ) ;`.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    verb: String,
    args: Vec<(String, Value)>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    /// Append a keyword argument. Order is preserved when rendering.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.push((key.into(), value.into()));
        self
    }

    /// Append a keyword argument only when a value is present.
    pub fn arg_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.arg(key, value),
            None => self,
        }
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &[(String, Value)] {
        &self.args
    }

    /// First argument with the given key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.args.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The command as it reads back after a render/parse round trip.
    pub fn normalized(&self) -> Self {
        Self {
            verb: self.verb.clone(),
            args: self
                .args
                .iter()
                .map(|(k, v)| (k.clone(), v.normalized()))
                .collect(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            return write!(f, "{}();", self.verb);
        }

        write!(f, "{} ( ", self.verb)?;
        for (i, (key, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", key, value)?;
        }
        f.write_str(" ) ;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_commands() {
        let test_cases = vec![
            (
                "no arguments",
                Command::new("MyRemoteModelsStatus"),
                "MyRemoteModelsStatus();",
            ),
            (
                "single string argument",
                Command::new("RemoteModelShutdown").arg("engine", "abc"),
                r#"RemoteModelShutdown ( engine = "abc" ) ;"#,
            ),
            (
                "list argument",
                Command::new("MyEngines").arg("engineTypes", vec!["MODEL"]),
                r#"MyEngines ( engineTypes = ["MODEL"] ) ;"#,
            ),
            (
                "speech synthesis",
                Command::new("LLM")
                    .arg("engine", "f8716fe5")
                    .arg("command", "Hello world")
                    .arg(
                        "paramValues",
                        Value::List(vec![Value::map([("voice", "af_bella"), ("speed", "1")])]),
                    ),
                r#"LLM ( engine = "f8716fe5", command = "Hello world", paramValues = [{"voice":"af_bella","speed":"1"}] ) ;"#,
            ),
            (
                "user text with double quotes",
                Command::new("Vision")
                    .arg("engine", "e")
                    .arg("command", r#"<OCR> read "this""#),
                r#"Vision ( engine = "e", command = "<OCR> read 'this'" ) ;"#,
            ),
        ];

        for (description, command, expected) in test_cases {
            assert_eq!(command.to_string(), expected, "{}", description);
        }
    }

    #[test]
    fn test_arg_opt_skips_missing_values() {
        let command = Command::new("LLM")
            .arg_opt("seed", Some(42u32))
            .arg_opt::<u32>("other", None);

        assert_eq!(command.args().len(), 1);
        assert_eq!(command.get("seed"), Some(&Value::Number(42.0)));
        assert_eq!(command.get("other"), None);
    }
}
