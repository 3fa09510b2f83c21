// Message templating - `{placeholder}` substitution for configured subjects and bodies

use std::collections::BTreeMap;

use crate::config::MessageTemplate;
use crate::notify::Notification;

/// Shown in place of an optional value the student left blank
pub const NOT_ENTERED: &str = "(未入力)";

/// Values available to a template, keyed by placeholder name without braces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    values: BTreeMap<&'static str, String>,
}

impl MessageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Like `with`, but blank values render as `(未入力)`
    pub fn with_optional(self, key: &'static str, value: &str) -> Self {
        let value = if value.trim().is_empty() {
            NOT_ENTERED.to_string()
        } else {
            value.trim().to_string()
        };
        self.with(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Replace every `{key}` known to the context; unknown placeholders stay as written
pub fn render(template: &str, context: &MessageContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl MessageTemplate {
    pub fn render(&self, recipient: &str, context: &MessageContext) -> Notification {
        Notification::new(
            recipient,
            render(&self.subject, context),
            render(&self.body, context),
        )
    }
}
