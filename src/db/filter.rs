//! Filter and sort compilation
//!
//! List requests carry a filter tree such as
//! `{ "active": { "$eq": "true" }, "$or": [{ "name": { "$containsi": "x" } }] }`.
//! The controller forwards it untouched; this module is where the entity
//! store interprets it, producing a SQL condition plus bind values for the
//! configured backend. Attributes live in the `data` JSON column, so field
//! paths become `json_extract` / `JSON_EXTRACT` expressions, except for the
//! store-owned `id`, `createdAt` and `updatedAt` columns.

use serde_json::{Map, Value};

use crate::config::DatabaseDriver;

/// Maximum nesting depth of a filter tree
const MAX_DEPTH: usize = 16;

/// Value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// JSON literal used with MySQL's `CAST(? AS JSON)`
    fn to_json_literal(&self) -> String {
        match self {
            SqlValue::Null => "null".to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => Value::from(*f).to_string(),
            SqlValue::Text(s) => Value::String(s.clone()).to_string(),
        }
    }
}

/// Errors raised while interpreting filters or sort expressions
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("Unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid value for {operator}: {message}")]
    InvalidValue { operator: String, message: String },

    #[error("Invalid sort direction '{direction}' for field '{field}'")]
    InvalidSortDirection { field: String, direction: String },

    #[error("Filter nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// A SQL fragment with its bind values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

/// Where a field path points
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Column(&'static str),
    Json(String),
}

/// SQL dialect helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Mysql,
}

impl From<DatabaseDriver> for Dialect {
    fn from(driver: DatabaseDriver) -> Self {
        match driver {
            DatabaseDriver::Sqlite => Dialect::Sqlite,
            DatabaseDriver::Mysql => Dialect::Mysql,
        }
    }
}

impl Dialect {
    /// Expression yielding the typed value at a target
    fn value_expr(&self, target: &Target) -> String {
        match (self, target) {
            (_, Target::Column(col)) => (*col).to_string(),
            (Dialect::Sqlite, Target::Json(path)) => format!("json_extract(data, '{}')", path),
            (Dialect::Mysql, Target::Json(path)) => format!("JSON_EXTRACT(data, '{}')", path),
        }
    }

    /// Expression yielding the target as plain text
    fn text_expr(&self, target: &Target) -> String {
        match (self, target) {
            (Dialect::Mysql, Target::Json(path)) => {
                format!("JSON_UNQUOTE(JSON_EXTRACT(data, '{}'))", path)
            }
            _ => self.value_expr(target),
        }
    }

    /// Placeholder for a value compared against a target
    fn placeholder(&self, target: &Target) -> &'static str {
        match (self, target) {
            (Dialect::Mysql, Target::Json(_)) => "CAST(? AS JSON)",
            _ => "?",
        }
    }

    /// Convert a comparison value to what the placeholder expects
    fn comparison_bind(&self, target: &Target, value: SqlValue) -> SqlValue {
        match (self, target, value) {
            (Dialect::Mysql, Target::Json(_), value) => SqlValue::Text(value.to_json_literal()),
            // json_extract reports JSON booleans as 1 / 0
            (Dialect::Sqlite, _, SqlValue::Bool(b)) => SqlValue::Int(i64::from(b)),
            (_, _, value) => value,
        }
    }

    fn like_escape(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "ESCAPE '\\'",
            Dialect::Mysql => "ESCAPE '\\\\'",
        }
    }

    /// Case-sensitive substring test
    fn contains(&self, text: &str) -> String {
        match self {
            Dialect::Sqlite => format!("instr({}, ?) > 0", text),
            Dialect::Mysql => format!("LOCATE(CAST(? AS BINARY), CAST({} AS BINARY)) > 0", text),
        }
    }

    /// Case-sensitive prefix test, one bind
    fn starts_with(&self, text: &str) -> String {
        match self {
            Dialect::Sqlite => format!("instr({}, ?) = 1", text),
            Dialect::Mysql => format!("LOCATE(CAST(? AS BINARY), CAST({} AS BINARY)) = 1", text),
        }
    }

    /// Case-sensitive suffix test, the needle is bound twice
    fn ends_with(&self, text: &str) -> String {
        match self {
            Dialect::Sqlite => format!("substr({}, -length(?)) = ?", text),
            Dialect::Mysql => format!(
                "RIGHT(CAST({} AS BINARY), LENGTH(CAST(? AS BINARY))) = CAST(? AS BINARY)",
                text
            ),
        }
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn resolve_target(path: &[String], relation_fields: &[&str]) -> Result<Target, FilterError> {
    if let Some(bad) = path.iter().find(|s| !is_valid_segment(s)) {
        return Err(FilterError::InvalidField(bad.clone()));
    }

    match path {
        [] => Err(FilterError::InvalidField(String::new())),
        [single] => Ok(match single.as_str() {
            "id" => Target::Column("id"),
            "createdAt" => Target::Column("created_at"),
            "updatedAt" => Target::Column("updated_at"),
            _ => Target::Json(format!("$.{}", single)),
        }),
        // Relations are stored as bare ids
        [relation, id] if id == "id" && relation_fields.contains(&relation.as_str()) => {
            Ok(Target::Json(format!("$.{}", relation)))
        }
        _ => Ok(Target::Json(format!("$.{}", path.join(".")))),
    }
}

/// Typed interpretations of a value for equality tests.
///
/// Query strings only carry text, so `"true"` also matches a stored boolean
/// and `"12"` a stored number, while still matching the literal string.
fn equality_candidates(operator: &str, value: &Value) -> Result<Vec<SqlValue>, FilterError> {
    match value {
        Value::Null => Ok(vec![SqlValue::Null]),
        Value::Bool(b) => Ok(vec![SqlValue::Bool(*b)]),
        Value::Number(_) => Ok(vec![ordered_value(operator, value)?]),
        Value::String(s) => {
            let typed = ordered_value(operator, value)?;
            let text = SqlValue::Text(s.clone());
            if typed == text {
                Ok(vec![text])
            } else {
                Ok(vec![typed, text])
            }
        }
        _ => Err(FilterError::InvalidValue {
            operator: operator.to_string(),
            message: "expected a scalar".to_string(),
        }),
    }
}

/// Single typed interpretation of a value, used for ordering comparisons
fn ordered_value(operator: &str, value: &Value) -> Result<SqlValue, FilterError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Bool(*b)),
        Value::Number(n) => Ok(match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => SqlValue::Float(n.as_f64().unwrap_or_default()),
        }),
        Value::String(s) => Ok(match s.as_str() {
            "true" => SqlValue::Bool(true),
            "false" => SqlValue::Bool(false),
            _ => {
                if let Ok(i) = s.parse::<i64>() {
                    SqlValue::Int(i)
                } else if let Some(f) = s.parse::<f64>().ok().filter(|f| f.is_finite()) {
                    SqlValue::Float(f)
                } else {
                    SqlValue::Text(s.clone())
                }
            }
        }),
        _ => Err(FilterError::InvalidValue {
            operator: operator.to_string(),
            message: "expected a scalar".to_string(),
        }),
    }
}

fn text_value(operator: &str, value: &Value) -> Result<String, FilterError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(FilterError::InvalidValue {
            operator: operator.to_string(),
            message: "expected text".to_string(),
        }),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !matches!(s.as_str(), "" | "false" | "0"),
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::Null => false,
        _ => true,
    }
}

/// Elements of an array-valued operand; the query-string parser leaves
/// sparse indexes as objects, and a lone scalar counts as one element
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        other => vec![other],
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

struct Compiler<'a> {
    dialect: Dialect,
    relation_fields: &'a [&'a str],
    binds: Vec<SqlValue>,
}

impl<'a> Compiler<'a> {
    fn node(&mut self, node: &Map<String, Value>, path: &[String], depth: usize) -> Result<String, FilterError> {
        if depth > MAX_DEPTH {
            return Err(FilterError::TooDeep(MAX_DEPTH));
        }

        let mut parts = Vec::new();
        for (key, value) in node {
            let part = if key.starts_with('$') {
                self.operator(key, value, path, depth)?
            } else {
                let mut child = path.to_vec();
                child.push(key.clone());
                self.field(value, &child, depth)?
            };
            parts.push(part);
        }
        Ok(join(parts, "AND"))
    }

    fn field(&mut self, value: &Value, path: &[String], depth: usize) -> Result<String, FilterError> {
        match value {
            Value::Object(map) => self.node(map, path, depth + 1),
            Value::Array(_) => self.comparison("$in", value, path),
            _ => self.comparison("$eq", value, path),
        }
    }

    fn operator(&mut self, op: &str, value: &Value, path: &[String], depth: usize) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let mut parts = Vec::new();
                for item in as_list(value) {
                    let map = item.as_object().ok_or_else(|| FilterError::InvalidValue {
                        operator: op.to_string(),
                        message: "expected a list of filter objects".to_string(),
                    })?;
                    parts.push(self.node(map, path, depth + 1)?);
                }
                Ok(join(parts, if op == "$and" { "AND" } else { "OR" }))
            }
            "$not" => {
                let map = value.as_object().ok_or_else(|| FilterError::InvalidValue {
                    operator: op.to_string(),
                    message: "expected a filter object".to_string(),
                })?;
                Ok(format!("NOT ({})", self.node(map, path, depth + 1)?))
            }
            _ if path.is_empty() => Err(FilterError::InvalidValue {
                operator: op.to_string(),
                message: "operator must be applied to a field".to_string(),
            }),
            _ => self.comparison(op, value, path),
        }
    }

    fn push(&mut self, target: &Target, value: SqlValue) -> &'static str {
        let bind = self.dialect.comparison_bind(target, value);
        self.binds.push(bind);
        self.dialect.placeholder(target)
    }

    fn push_list(&mut self, target: &Target, values: Vec<SqlValue>) -> String {
        values
            .into_iter()
            .map(|v| self.push(target, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn comparison(&mut self, op: &str, value: &Value, path: &[String]) -> Result<String, FilterError> {
        let target = resolve_target(path, self.relation_fields)?;
        let expr = self.dialect.value_expr(&target);

        let sql = match op {
            "$eq" | "$ne" => {
                let candidates = equality_candidates(op, value)?;
                if candidates == [SqlValue::Null] {
                    let negation = if op == "$eq" { "" } else { "NOT " };
                    format!("{} IS {}NULL", expr, negation)
                } else {
                    let positive = format!("{} IN ({})", expr, self.push_list(&target, candidates));
                    if op == "$eq" {
                        positive
                    } else {
                        format!("({} IS NULL OR NOT ({}))", expr, positive)
                    }
                }
            }
            "$lt" | "$lte" | "$gt" | "$gte" => {
                let symbol = match op {
                    "$lt" => "<",
                    "$lte" => "<=",
                    "$gt" => ">",
                    _ => ">=",
                };
                let bound = ordered_value(op, value)?;
                format!("{} {} {}", expr, symbol, self.push(&target, bound))
            }
            "$in" | "$nin" => {
                let mut candidates = Vec::new();
                for item in as_list(value) {
                    candidates.extend(equality_candidates(op, item)?);
                }
                candidates.retain(|c| *c != SqlValue::Null);
                match (op, candidates.is_empty()) {
                    ("$in", true) => "1 = 0".to_string(),
                    (_, true) => "1 = 1".to_string(),
                    ("$in", false) => format!("{} IN ({})", expr, self.push_list(&target, candidates)),
                    _ => format!(
                        "({} IS NULL OR {} NOT IN ({}))",
                        expr,
                        expr,
                        self.push_list(&target, candidates)
                    ),
                }
            }
            "$between" => {
                let bounds = as_list(value);
                let [low, high] = bounds.as_slice() else {
                    return Err(FilterError::InvalidValue {
                        operator: op.to_string(),
                        message: "expected exactly two bounds".to_string(),
                    });
                };
                let low = ordered_value(op, low)?;
                let high = ordered_value(op, high)?;
                let low_ph = self.push(&target, low);
                let high_ph = self.push(&target, high);
                format!("{} BETWEEN {} AND {}", expr, low_ph, high_ph)
            }
            "$contains" | "$notContains" => {
                let needle = text_value(op, value)?;
                self.binds.push(SqlValue::Text(needle));
                let text = self.dialect.text_expr(&target);
                let test = self.dialect.contains(&text);
                if op == "$contains" {
                    test
                } else {
                    format!("({} IS NULL OR NOT ({}))", text, test)
                }
            }
            "$containsi" | "$notContainsi" => {
                let needle = text_value(op, value)?;
                self.binds.push(SqlValue::Text(format!("%{}%", escape_like(&needle))));
                let text = self.dialect.text_expr(&target);
                let test = format!("LOWER({}) LIKE LOWER(?) {}", text, self.dialect.like_escape());
                if op == "$containsi" {
                    test
                } else {
                    format!("({} IS NULL OR NOT ({}))", text, test)
                }
            }
            "$startsWith" | "$endsWith" => {
                let needle = text_value(op, value)?;
                let text = self.dialect.text_expr(&target);
                if needle.is_empty() {
                    format!("{} IS NOT NULL", text)
                } else if op == "$startsWith" {
                    self.binds.push(SqlValue::Text(needle));
                    self.dialect.starts_with(&text)
                } else {
                    self.binds.push(SqlValue::Text(needle.clone()));
                    self.binds.push(SqlValue::Text(needle));
                    self.dialect.ends_with(&text)
                }
            }
            "$null" | "$notNull" => {
                let wants_null = is_truthy(value) == (op == "$null");
                if wants_null {
                    format!("{} IS NULL", expr)
                } else {
                    format!("{} IS NOT NULL", expr)
                }
            }
            other => return Err(FilterError::UnknownOperator(other.to_string())),
        };

        Ok(sql)
    }
}

fn join(parts: Vec<String>, glue: &str) -> String {
    match parts.len() {
        0 => "1 = 1".to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(&format!(" {} ", glue))),
    }
}

/// Compile a filter tree into a SQL condition.
///
/// `relation_fields` names the attributes holding relation ids, so
/// `filters[region][id][$eq]=3` addresses the stored id. A missing or empty
/// tree compiles to `1 = 1`.
pub fn compile_filters(
    filters: Option<&Value>,
    dialect: Dialect,
    relation_fields: &[&str],
) -> Result<SqlFragment, FilterError> {
    let mut compiler = Compiler {
        dialect,
        relation_fields,
        binds: Vec::new(),
    };

    let sql = match filters {
        None | Some(Value::Null) => "1 = 1".to_string(),
        Some(Value::Object(map)) => compiler.node(map, &[], 0)?,
        Some(_) => {
            return Err(FilterError::InvalidValue {
                operator: "filters".to_string(),
                message: "expected an object".to_string(),
            })
        }
    };

    Ok(SqlFragment {
        sql,
        binds: compiler.binds,
    })
}

/// Compile `field:direction` entries into an `ORDER BY` clause.
///
/// The record id is appended as a tiebreaker so pages are stable.
pub fn compile_sort(sort: &[String], dialect: Dialect, relation_fields: &[&str]) -> Result<String, FilterError> {
    let mut terms = Vec::new();
    let mut has_id = false;

    for entry in sort {
        let (field, direction) = match entry.split_once(':') {
            Some((field, direction)) => (field.trim(), direction.trim().to_ascii_lowercase()),
            None => (entry.trim(), "asc".to_string()),
        };
        let direction = match direction.as_str() {
            "asc" => "ASC",
            "desc" => "DESC",
            _ => {
                return Err(FilterError::InvalidSortDirection {
                    field: field.to_string(),
                    direction,
                })
            }
        };

        let path: Vec<String> = field.split('.').map(str::to_string).collect();
        let target = resolve_target(&path, relation_fields)?;
        has_id |= target == Target::Column("id");
        terms.push(format!("{} {}", dialect.value_expr(&target), direction));
    }

    if !has_id {
        terms.push("id ASC".to_string());
    }

    Ok(format!("ORDER BY {}", terms.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sqlite(filters: Value) -> SqlFragment {
        compile_filters(Some(&filters), Dialect::Sqlite, &["region"]).unwrap()
    }

    #[test]
    fn test_empty_filters() {
        let fragment = compile_filters(None, Dialect::Sqlite, &[]).unwrap();
        assert_eq!(fragment.sql, "1 = 1");
        assert!(fragment.binds.is_empty());

        assert_eq!(sqlite(json!({})).sql, "1 = 1");
    }

    #[test]
    fn test_eq_boolean_string_matches_typed_and_text() {
        let fragment = sqlite(json!({ "active": { "$eq": "true" } }));
        assert_eq!(fragment.sql, "json_extract(data, '$.active') IN (?, ?)");
        assert_eq!(fragment.binds, vec![SqlValue::Int(1), SqlValue::Text("true".into())]);
    }

    #[test]
    fn test_eq_plain_text_single_bind() {
        let fragment = sqlite(json!({ "name": { "$eq": "Nuevo" } }));
        assert_eq!(fragment.sql, "json_extract(data, '$.name') IN (?)");
        assert_eq!(fragment.binds, vec![SqlValue::Text("Nuevo".into())]);
    }

    #[test]
    fn test_implicit_eq_and_in() {
        let eq = sqlite(json!({ "slug": "talca" }));
        assert_eq!(eq.sql, "json_extract(data, '$.slug') IN (?)");

        let in_list = sqlite(json!({ "id": ["1", "2"] }));
        assert_eq!(in_list.sql, "id IN (?, ?, ?, ?)");
        assert_eq!(
            in_list.binds,
            vec![
                SqlValue::Int(1),
                SqlValue::Text("1".into()),
                SqlValue::Int(2),
                SqlValue::Text("2".into())
            ]
        );
    }

    #[test]
    fn test_store_columns() {
        let fragment = sqlite(json!({ "createdAt": { "$gte": "2024-01-01" } }));
        assert_eq!(fragment.sql, "created_at >= ?");
        assert_eq!(fragment.binds, vec![SqlValue::Text("2024-01-01".into())]);
    }

    #[test]
    fn test_relation_id_path() {
        let fragment = sqlite(json!({ "region": { "id": { "$eq": 3 } } }));
        assert_eq!(fragment.sql, "json_extract(data, '$.region') IN (?)");
        assert_eq!(fragment.binds, vec![SqlValue::Int(3)]);
    }

    #[test]
    fn test_nested_json_path() {
        let fragment = sqlite(json!({ "details": { "color": { "$eq": "red" } } }));
        assert_eq!(fragment.sql, "json_extract(data, '$.details.color') IN (?)");
    }

    #[test]
    fn test_or_of_containsi() {
        let fragment = sqlite(json!({
            "$or": [
                { "name": { "$containsi": "50%" } },
                { "description": { "$containsi": "auto" } }
            ]
        }));
        assert_eq!(
            fragment.sql,
            "(LOWER(json_extract(data, '$.name')) LIKE LOWER(?) ESCAPE '\\' OR \
             LOWER(json_extract(data, '$.description')) LIKE LOWER(?) ESCAPE '\\')"
        );
        assert_eq!(
            fragment.binds,
            vec![SqlValue::Text("%50\\%%".into()), SqlValue::Text("%auto%".into())]
        );
    }

    #[test]
    fn test_or_from_indexed_object() {
        let fragment = sqlite(json!({ "$or": { "0": { "a": "1" }, "1": { "b": "x" } } }));
        assert!(fragment.sql.contains(" OR "));
    }

    #[test]
    fn test_ne_keeps_missing_values() {
        let fragment = sqlite(json!({ "banned": { "$ne": "true" } }));
        assert_eq!(
            fragment.sql,
            "(json_extract(data, '$.banned') IS NULL OR NOT (json_extract(data, '$.banned') IN (?, ?)))"
        );
    }

    #[test]
    fn test_null_operators() {
        assert_eq!(sqlite(json!({ "a": { "$null": "true" } })).sql, "json_extract(data, '$.a') IS NULL");
        assert_eq!(sqlite(json!({ "a": { "$null": "false" } })).sql, "json_extract(data, '$.a') IS NOT NULL");
        assert_eq!(sqlite(json!({ "a": { "$notNull": true } })).sql, "json_extract(data, '$.a') IS NOT NULL");
        assert_eq!(sqlite(json!({ "a": { "$eq": null } })).sql, "json_extract(data, '$.a') IS NULL");
    }

    #[test]
    fn test_empty_in_and_nin() {
        assert_eq!(sqlite(json!({ "a": { "$in": [] } })).sql, "1 = 0");
        assert_eq!(sqlite(json!({ "a": { "$nin": [] } })).sql, "1 = 1");
    }

    #[test]
    fn test_between_and_ordering() {
        let fragment = sqlite(json!({ "price": { "$between": ["10", "20.5"] }, "stock": { "$lt": 3 } }));
        assert_eq!(
            fragment.sql,
            "(json_extract(data, '$.price') BETWEEN ? AND ? AND json_extract(data, '$.stock') < ?)"
        );
        assert_eq!(
            fragment.binds,
            vec![SqlValue::Int(10), SqlValue::Float(20.5), SqlValue::Int(3)]
        );
    }

    #[test]
    fn test_not_wraps_subtree() {
        let fragment = sqlite(json!({ "$not": { "active": "false" } }));
        assert_eq!(fragment.sql, "NOT (json_extract(data, '$.active') IN (?, ?))");
    }

    #[test]
    fn test_mysql_casts_json_comparisons() {
        let fragment = compile_filters(
            Some(&json!({ "active": { "$eq": "true" }, "id": { "$gt": "4" } })),
            Dialect::Mysql,
            &[],
        )
        .unwrap();
        assert_eq!(
            fragment.sql,
            "(JSON_EXTRACT(data, '$.active') IN (CAST(? AS JSON), CAST(? AS JSON)) AND id > ?)"
        );
        assert_eq!(
            fragment.binds,
            vec![
                SqlValue::Text("true".into()),
                SqlValue::Text("\"true\"".into()),
                SqlValue::Int(4)
            ]
        );
    }

    #[test]
    fn test_mysql_case_sensitive_contains() {
        let fragment = compile_filters(Some(&json!({ "name": { "$contains": "Ab" } })), Dialect::Mysql, &[]).unwrap();
        assert_eq!(
            fragment.sql,
            "LOCATE(CAST(? AS BINARY), CAST(JSON_UNQUOTE(JSON_EXTRACT(data, '$.name')) AS BINARY)) > 0"
        );
    }

    #[test]
    fn test_prefix_and_suffix() {
        let starts = sqlite(json!({ "buyOrder": { "$startsWith": "WO-" } }));
        assert_eq!(starts.sql, "instr(json_extract(data, '$.buyOrder'), ?) = 1");
        assert_eq!(starts.binds, vec![SqlValue::Text("WO-".into())]);

        let ends = sqlite(json!({ "email": { "$endsWith": "@waldo.click" } }));
        assert_eq!(ends.sql, "substr(json_extract(data, '$.email'), -length(?)) = ?");
        assert_eq!(ends.binds.len(), 2);

        let empty = sqlite(json!({ "name": { "$startsWith": "" } }));
        assert_eq!(empty.sql, "json_extract(data, '$.name') IS NOT NULL");
    }

    #[test]
    fn test_rejects_unknown_operator() {
        let err = compile_filters(Some(&json!({ "a": { "$like": "x" } })), Dialect::Sqlite, &[]).unwrap_err();
        assert_eq!(err, FilterError::UnknownOperator("$like".into()));
    }

    #[test]
    fn test_rejects_injection_in_field_names() {
        let err = compile_filters(
            Some(&json!({ "name') OR 1=1 --": { "$eq": "x" } })),
            Dialect::Sqlite,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::InvalidField(_)));
    }

    #[test]
    fn test_rejects_operator_without_field() {
        let err = compile_filters(Some(&json!({ "$eq": "x" })), Dialect::Sqlite, &[]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidValue { .. }));
    }

    #[test]
    fn test_rejects_non_object_filters() {
        assert!(compile_filters(Some(&json!("active")), Dialect::Sqlite, &[]).is_err());
    }

    #[test]
    fn test_sort_compilation() {
        let order = compile_sort(&["name:asc".into(), "createdAt:DESC".into()], Dialect::Sqlite, &[]).unwrap();
        assert_eq!(order, "ORDER BY json_extract(data, '$.name') ASC, created_at DESC, id ASC");

        let by_id = compile_sort(&["id:desc".into()], Dialect::Mysql, &[]).unwrap();
        assert_eq!(by_id, "ORDER BY id DESC");

        let bare = compile_sort(&["price".into()], Dialect::Mysql, &[]).unwrap();
        assert_eq!(bare, "ORDER BY JSON_EXTRACT(data, '$.price') ASC, id ASC");
    }

    #[test]
    fn test_sort_rejects_bad_direction() {
        let err = compile_sort(&["name:up".into()], Dialect::Sqlite, &[]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidSortDirection { .. }));
    }
}
