use std::fmt::Display;

use tracing::field::display;

/// Key-value pairs attached to a log line.
pub type Fields<'a> = &'a [(&'a str, &'a dyn Display)];

/// The logging capability the runner needs. Any structured logger can
/// implement it.
pub trait Logger {
    fn info(&self, msg: &str, fields: Fields<'_>);
    fn warn(&self, msg: &str, fields: Fields<'_>);
    fn error(&self, msg: &str, fields: Fields<'_>);
}

/// Forwards to `tracing`, tagging every event with a component name.
///
/// The keys the runner uses (`id`, `count`, `schema`, `table`, `error`) become
/// event fields of the same name. Any other pairs are joined into a single
/// `fields = "key=value ..."` field.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: String,
}

impl TracingLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("flowmig::runner")
    }
}

macro_rules! emit {
    ($level:ident, $component:expr, $msg:expr, $fields:expr) => {{
        let f = EventFields::new($fields);
        tracing::$level!(
            component = %$component,
            id = f.id.as_deref().map(display),
            count = f.count.as_deref().map(display),
            schema = f.schema.as_deref().map(display),
            table = f.table.as_deref().map(display),
            error = f.error.as_deref().map(display),
            fields = f.rest.as_deref().map(display),
            "{}",
            $msg
        );
    }};
}

impl Logger for TracingLogger {
    fn info(&self, msg: &str, fields: Fields<'_>) {
        emit!(info, self.component, msg, fields);
    }

    fn warn(&self, msg: &str, fields: Fields<'_>) {
        emit!(warn, self.component, msg, fields);
    }

    fn error(&self, msg: &str, fields: Fields<'_>) {
        emit!(error, self.component, msg, fields);
    }
}

/// Fields sorted into the named event fields, with leftovers rendered as
/// `key=value key=value`.
#[derive(Debug, Default, PartialEq)]
struct EventFields {
    id: Option<String>,
    count: Option<String>,
    schema: Option<String>,
    table: Option<String>,
    error: Option<String>,
    rest: Option<String>,
}

impl EventFields {
    fn new(fields: Fields<'_>) -> Self {
        let mut out = Self::default();
        let mut rest = Vec::new();
        for (key, value) in fields {
            let slot = match *key {
                "id" => &mut out.id,
                "count" => &mut out.count,
                "schema" => &mut out.schema,
                "table" => &mut out.table,
                "error" => &mut out.error,
                _ => {
                    rest.push(format!("{key}={value}"));
                    continue;
                }
            };
            *slot = Some(value.to_string());
        }
        if !rest.is_empty() {
            out.rest = Some(rest.join(" "));
        }
        out
    }
}

impl<L: Logger + ?Sized> Logger for Box<L> {
    fn info(&self, msg: &str, fields: Fields<'_>) {
        (**self).info(msg, fields)
    }

    fn warn(&self, msg: &str, fields: Fields<'_>) {
        (**self).warn(msg, fields)
    }

    fn error(&self, msg: &str, fields: Fields<'_>) {
        (**self).error(msg, fields)
    }
}

impl<L: Logger + ?Sized> Logger for std::sync::Arc<L> {
    fn info(&self, msg: &str, fields: Fields<'_>) {
        (**self).info(msg, fields)
    }

    fn warn(&self, msg: &str, fields: Fields<'_>) {
        (**self).warn(msg, fields)
    }

    fn error(&self, msg: &str, fields: Fields<'_>) {
        (**self).error(msg, fields)
    }
}
