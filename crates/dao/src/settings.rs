//! Query Settings Parser - the list/find query language
//!
//! Supported list parameters:
//! - `$expand` / `expand`: association names or dotted paths, comma-delimited or array
//! - `$select` / `select`: property names, comma-delimited or array
//! - `$filter`: VARCHAR property names matched by substring
//! - `$sort`, `$order`, `$limit`, `$offset`: passed to the statement builder
//! - any other key: a condition on the property of that name; string values may carry a
//!   `>`, `>=`, `<` or `<=` prefix selecting a range comparison

use serde_json::{Map, Value};

use crate::descriptor::OrmDescriptor;
use crate::error::{DaoError, DaoResult};
use crate::value::parse_number;

/// Normalize a comma-delimited string or an array of strings into trimmed names
pub fn parse_names(value: &Value, what: &str) -> DaoResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(split_names(s)),
        Value::Array(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => names.extend(split_names(s)),
                    other => {
                        return Err(DaoError::invalid(format!(
                            "{} array components are expected to be strings but found {}",
                            what, other
                        )))
                    }
                }
            }
            Ok(names)
        }
        other => Err(DaoError::invalid(format!(
            "{} is expected to be string or array of strings but was {}",
            what, other
        ))),
    }
}

fn split_names(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn collect_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().flat_map(|name| split_names(name.as_ref())).collect()
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn parse_count(value: &Value, what: &str) -> DaoResult<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| DaoError::invalid(format!("{} is expected to be a non-negative integer but was {}", what, value)))
}

/// Comparison selected by a condition value prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
}

impl ComparisonOperator {
    pub fn as_sql(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::Like => "LIKE",
        }
    }
}

/// Split a condition value into its comparison operator and the bare value
pub fn split_comparison(value: &Value) -> (ComparisonOperator, Value) {
    let Value::String(s) = value else {
        return (ComparisonOperator::Equal, value.clone());
    };
    let (operator, rest) = if let Some(rest) = s.strip_prefix(">=") {
        (ComparisonOperator::GreaterThanOrEqual, rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (ComparisonOperator::LessThanOrEqual, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (ComparisonOperator::GreaterThan, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (ComparisonOperator::LessThan, rest)
    } else {
        return (ComparisonOperator::Equal, value.clone());
    };
    (operator, Value::String(rest.trim().to_string()))
}

/// Per-call list settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySettings {
    pub select: Option<Vec<String>>,
    pub expand: Option<Vec<String>>,
    pub filter: Option<Vec<String>>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Property name → equality/comparison value
    pub conditions: Map<String, Value>,
}

impl QuerySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the object form used by callers (`{"$select": "a,b", "name": "x", ...}`)
    pub fn from_value(value: &Value) -> DaoResult<Self> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(DaoError::invalid(format!(
                    "list settings are expected to be an object but were {}",
                    other
                )))
            }
        };

        let mut settings = Self::default();
        for (key, value) in object {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "$select" | "select" => settings.select = Some(parse_names(value, "select")?),
                "$expand" | "expand" => settings.expand = Some(parse_names(value, "expand")?),
                "$filter" => settings.filter = Some(parse_names(value, "$filter")?),
                "$sort" => settings.sort = Some(value_text(value)),
                "$order" => settings.order = Some(value_text(value)),
                "$limit" => settings.limit = Some(parse_count(value, "$limit")?),
                "$offset" => settings.offset = Some(parse_count(value, "$offset")?),
                other if other.starts_with('$') => {
                    tracing::debug!("Ignoring unsupported list operator {}", other);
                }
                other => {
                    settings.conditions.insert(other.to_string(), value.clone());
                }
            }
        }
        Ok(settings)
    }

    pub fn select<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select = Some(collect_names(names));
        self
    }

    pub fn expand<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expand = Some(collect_names(names));
        self
    }

    pub fn filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter = Some(collect_names(names));
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Add an equality (or prefixed comparison) condition on a property
    pub fn condition(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.conditions.insert(name.into(), value);
        }
        self
    }

    /// Make sure `name` is among the selected properties, if a selection is set
    pub(crate) fn ensure_selected(&mut self, name: &str) {
        if let Some(select) = self.select.as_mut() {
            push_unique(select, name);
        }
    }

    /// Keep only `$filter` fields naming declared VARCHAR properties with a value and
    /// rewrite those values to substring patterns. Dropped fields lose their condition.
    pub(crate) fn resolve_filter(&mut self, orm: &OrmDescriptor) {
        let Some(requested) = self.filter.take() else {
            return;
        };
        let mut kept = Vec::with_capacity(requested.len());
        for name in requested {
            let is_text = orm.property(&name).map_or(false, |p| p.property_type.is_varchar());
            match self.conditions.get(&name) {
                Some(value) if is_text => {
                    let pattern = format!("%{}%", value_text(value));
                    self.conditions.insert(name.clone(), Value::String(pattern));
                    push_unique(&mut kept, &name);
                }
                _ => {
                    tracing::debug!("Dropping $filter field {} for table {}", name, orm.table());
                    self.conditions.remove(&name);
                }
            }
        }
        self.filter = Some(kept);
    }

    pub(crate) fn is_filtered(&self, name: &str) -> bool {
        self.filter
            .as_ref()
            .map_or(false, |fields| fields.iter().any(|f| f == name))
    }

    /// Bind values for the conditions: comparison prefixes stripped, numeric-looking
    /// strings for non-VARCHAR properties turned into numbers
    pub(crate) fn bindings(&self, orm: &OrmDescriptor) -> Map<String, Value> {
        self.conditions
            .iter()
            .map(|(name, value)| {
                let value = if self.is_filtered(name) {
                    value.clone()
                } else {
                    split_comparison(value).1
                };
                let numeric = orm
                    .property(name)
                    .filter(|p| !p.property_type.is_varchar())
                    .and(value.as_str())
                    .and_then(parse_number);
                let value = numeric.map(Value::Number).unwrap_or(value);
                (name.clone(), value)
            })
            .collect()
    }

    /// Merge defaults underneath the explicit settings
    pub(crate) fn with_defaults(mut self, defaults: &Map<String, Value>) -> DaoResult<Self> {
        if defaults.is_empty() {
            return Ok(self);
        }
        let base = Self::from_value(&Value::Object(defaults.clone()))?;
        self.select = self.select.or(base.select);
        self.expand = self.expand.or(base.expand);
        self.filter = self.filter.or(base.filter);
        self.sort = self.sort.or(base.sort);
        self.order = self.order.or(base.order);
        self.limit = self.limit.or(base.limit);
        self.offset = self.offset.or(base.offset);
        for (name, value) in base.conditions {
            self.conditions.entry(name).or_insert(value);
        }
        Ok(self)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Options of a single-entity read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub select: Option<Vec<String>>,
    pub expand: Option<Vec<String>>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select = Some(collect_names(names));
        self
    }

    pub fn expand<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expand = Some(collect_names(names));
        self
    }
}

/// Object form of a find call: `{"id": .., "$expand": .., "$select": ..}`
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub id: Value,
    pub options: FindOptions,
}

impl FindQuery {
    pub fn from_value(value: &Value) -> DaoResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| DaoError::invalid(format!("find arguments are expected to be an object but were {}", value)))?;
        let id = object
            .get("id")
            .filter(|id| !id.is_null())
            .cloned()
            .ok_or_else(|| DaoError::invalid("Illegal argument for id parameter: missing"))?;
        let names = |keys: [&str; 2], what: &str| -> DaoResult<Option<Vec<String>>> {
            keys.iter()
                .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
                .map(|v| parse_names(v, what))
                .transpose()
        };
        Ok(Self {
            id,
            options: FindOptions {
                expand: names(["$expand", "expand"], "expand")?,
                select: names(["$select", "select"], "select")?,
            },
        })
    }
}
