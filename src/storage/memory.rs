//! In-memory reference engine.
//!
//! Implements [`StorageEngine`] over plain maps, covering the statement and
//! predicate subset the table handlers emit: `CREATE TABLE` / `DROP TABLE`
//! through `execute`, `AND`-joined `column=literal` / `column=?` predicates,
//! and a single-key `column [ASC|DESC]` order-by. Serves as the crate's test
//! double and as a starting point for embedders without a real engine.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{StorageEngine, StorageError, StorageResult, Values};

/// Rows of one table, keyed by assigned row id.
#[derive(Debug, Default)]
struct TableData {
    next_row_id: i64,
    rows: BTreeMap<i64, Values>,
}

impl TableData {
    fn assign_row_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }
}

/// In-memory storage engine.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<BTreeMap<String, TableData>>,
}

impl MemoryEngine {
    /// Creates an engine with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored in `table`, for assertions.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .map(|data| data.rows.len())
            .unwrap_or(0)
    }

    /// True when `table` exists.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.read().unwrap().contains_key(table)
    }
}

impl StorageEngine for MemoryEngine {
    fn execute(&self, sql: &str) -> StorageResult<()> {
        let statement = sql.trim();
        let upper = statement.to_ascii_uppercase();

        if upper.starts_with("CREATE TABLE") {
            let name = statement_table_name(statement, "CREATE TABLE".len());
            self.tables
                .write()
                .unwrap()
                .entry(name)
                .or_default();
            Ok(())
        } else if upper.starts_with("DROP TABLE") {
            let name = statement_table_name(statement, "DROP TABLE".len());
            let removed = self.tables.write().unwrap().remove(&name).is_some();

            if removed || upper.contains("IF EXISTS") {
                Ok(())
            } else {
                Err(StorageError::UnknownTable(name))
            }
        } else {
            Err(StorageError::Engine(format!(
                "unsupported statement: {}",
                statement
            )))
        }
    }

    fn select(
        &self,
        table: &str,
        columns: &[String],
        predicate: Option<&str>,
        args: &[Value],
        order_by: Option<&str>,
    ) -> StorageResult<Vec<Values>> {
        let terms = parse_predicate(predicate)?;
        let mut rows = {
            let tables = self.tables.read().unwrap();
            let data = tables
                .get(table)
                .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;

            let mut matched = Vec::new();
            for row in data.rows.values() {
                if row_matches(row, &terms, args)? {
                    matched.push(row.clone());
                }
            }
            matched
        };

        if let Some(order) = order_by.map(str::trim).filter(|o| !o.is_empty()) {
            let mut parts = order.split_whitespace();
            let key = parts.next().unwrap_or("_id").to_string();
            let descending = parts
                .next()
                .map(|direction| direction.eq_ignore_ascii_case("DESC"))
                .unwrap_or(false);

            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&key), b.get(&key));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if columns.is_empty() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        let value = row.get(column).cloned().unwrap_or(Value::Null);
                        (column.clone(), value)
                    })
                    .collect()
            })
            .collect())
    }

    fn insert(&self, table: &str, values: &Values) -> StorageResult<i64> {
        let mut tables = self.tables.write().unwrap();
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;

        let row_id = data.assign_row_id();
        let mut row = values.clone();
        row.insert("_id".to_string(), Value::from(row_id));
        data.rows.insert(row_id, row);
        Ok(row_id)
    }

    fn update(
        &self,
        table: &str,
        values: &Values,
        predicate: Option<&str>,
        args: &[Value],
    ) -> StorageResult<usize> {
        let terms = parse_predicate(predicate)?;
        let mut tables = self.tables.write().unwrap();
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;

        let mut count = 0;
        for row in data.rows.values_mut() {
            if row_matches(row, &terms, args)? {
                for (column, value) in values {
                    // The row-id key is the map key; it never changes.
                    if column != "_id" {
                        row.insert(column.clone(), value.clone());
                    }
                }
                count += 1;
            }
        }
        Ok(count)
    }

    fn delete(
        &self,
        table: &str,
        predicate: Option<&str>,
        args: &[Value],
    ) -> StorageResult<usize> {
        let terms = parse_predicate(predicate)?;
        let mut tables = self.tables.write().unwrap();
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;

        let mut doomed = Vec::new();
        for (row_id, row) in &data.rows {
            if row_matches(row, &terms, args)? {
                doomed.push(*row_id);
            }
        }
        for row_id in &doomed {
            data.rows.remove(row_id);
        }
        Ok(doomed.len())
    }
}

/// Extracts the table name following a statement keyword, skipping the
/// optional `IF [NOT] EXISTS` clause.
fn statement_table_name(statement: &str, keyword_len: usize) -> String {
    let mut rest = statement[keyword_len..].trim_start();
    let upper = rest.to_ascii_uppercase();

    if upper.starts_with("IF NOT EXISTS") {
        rest = rest["IF NOT EXISTS".len()..].trim_start();
    } else if upper.starts_with("IF EXISTS") {
        rest = rest["IF EXISTS".len()..].trim_start();
    }
    rest.split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()
        .unwrap_or("")
        .to_string()
}

/// One `column = operand` conjunct.
#[derive(Debug)]
struct Term {
    column: String,
    operand: Operand,
}

#[derive(Debug)]
enum Operand {
    /// `?`, bound positionally from the args slice
    Placeholder,
    Literal(Value),
}

fn parse_predicate(predicate: Option<&str>) -> StorageResult<Vec<Term>> {
    let predicate = match predicate.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };

    predicate
        .split(" AND ")
        .map(|conjunct| {
            let mut term = conjunct.trim();
            while term.starts_with('(') && term.ends_with(')') && term.len() >= 2 {
                term = term[1..term.len() - 1].trim();
            }
            let (column, raw_value) = term.split_once('=').ok_or_else(|| {
                StorageError::UnsupportedPredicate(predicate.to_string())
            })?;
            let column = column.trim();
            let raw_value = raw_value.trim();

            if column.is_empty() || raw_value.is_empty() {
                return Err(StorageError::UnsupportedPredicate(predicate.to_string()));
            }
            let operand = if raw_value == "?" {
                Operand::Placeholder
            } else {
                Operand::Literal(parse_literal(raw_value))
            };
            Ok(Term {
                column: column.to_string(),
                operand,
            })
        })
        .collect()
}

fn parse_literal(raw: &str) -> Value {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Value::from(integer);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::from(float);
    }
    Value::String(raw.to_string())
}

/// Evaluates the conjunction against one row. Placeholders consume args
/// positionally even after the row has already failed a term, so every row
/// sees identical bindings.
fn row_matches(row: &Values, terms: &[Term], args: &[Value]) -> StorageResult<bool> {
    let mut arg_index = 0;
    let mut matched = true;

    for term in terms {
        let expected = match &term.operand {
            Operand::Placeholder => {
                let bound = args.get(arg_index).ok_or_else(|| {
                    StorageError::UnsupportedPredicate(
                        "predicate placeholder without bound argument".to_string(),
                    )
                })?;
                arg_index += 1;
                bound
            }
            Operand::Literal(value) => value,
        };

        if matched {
            matched = row
                .get(&term.column)
                .map(|actual| values_equal(actual, expected))
                .unwrap_or(false);
        }
    }
    Ok(matched)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
        return a == b;
    }
    left == right
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.parse().ok(),
        _ => None,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            match (a, b) {
                (Value::String(x), Value::String(y)) => x.cmp(y),
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                _ => a.to_string().cmp(&b.to_string()),
            }
        }
    }
}
