use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::file::{BufferPoolManager, DiskManager, FileError, FreeSpaceManager, BUFFER_POOL_SIZE};
use crate::lexer_parser::{
    self, BinaryOperator, CreateTableStatement, DeleteStatement, Expression, InsertStatement,
    Literal, SelectStatement, Statement, UnaryOperator, UpdateStatement,
};
use crate::record::{
    Column, ColumnType, RecordError, Schema, Value, DEFAULT_VARCHAR_LENGTH,
};


#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Table {0} does not exist")]
    TableNotFound(String),

    #[error("Column {0} not found")]
    ColumnNotFound(String),

    #[error("Invalid column type: {0}")]
    InvalidColumnType(String),

    #[error("Cannot convert {value} to {target}")]
    TypeError { value: String, target: String },

    #[error("Column count does not match value count")]
    ColumnCountMismatch,

    #[error("Only literal values are supported in INSERT")]
    NonLiteralInsert,

    #[error("Cannot evaluate the value for column {0}")]
    EvaluationFailed(String),

    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Outcome of one executed statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// DDL and DML: the number of rows the statement touched
    RowsAffected(usize),
    /// SELECT: projected column names and the matching rows
    ResultSet {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

/// An open database: the storage stack composed bottom-up, plus the
/// statement executor that drives it with sequential scans.
pub struct Database {
    pool: Arc<Mutex<BufferPoolManager>>,
    catalog: Catalog,
}

impl Database {
    /// Open (or create) the database file with the default pool size
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        Self::open_with_pool_size(path, BUFFER_POOL_SIZE)
    }

    pub fn open_with_pool_size<P: AsRef<Path>>(path: P, pool_size: usize) -> DatabaseResult<Self> {
        let disk = DiskManager::open(path)?;
        let pool = Arc::new(Mutex::new(BufferPoolManager::new(pool_size, disk)));
        let free_space = Arc::new(FreeSpaceManager::new(pool.clone()));
        let catalog = Catalog::open(pool.clone(), free_space)?;
        Ok(Self { pool, catalog })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Parse and execute a SQL string, returning one result per statement
    pub fn execute_sql(&mut self, sql: &str) -> DatabaseResult<Vec<QueryResult>> {
        let statements = lexer_parser::parse(sql).map_err(DatabaseError::Parse)?;
        let mut results = Vec::with_capacity(statements.len());
        for statement in &statements {
            results.push(self.execute(statement)?);
        }
        Ok(results)
    }

    pub fn execute(&mut self, statement: &Statement) -> DatabaseResult<QueryResult> {
        match statement {
            Statement::CreateTable(stmt) => self.execute_create_table(stmt),
            Statement::Insert(stmt) => self.execute_insert(stmt),
            Statement::Select(stmt) => self.execute_select(stmt),
            Statement::Delete(stmt) => self.execute_delete(stmt),
            Statement::Update(stmt) => self.execute_update(stmt),
        }
    }

    /// Write all cached pages back to the file
    pub fn flush(&mut self) -> DatabaseResult<()> {
        self.pool.lock().unwrap().flush_all()?;
        Ok(())
    }

    fn execute_create_table(&mut self, stmt: &CreateTableStatement) -> DatabaseResult<QueryResult> {
        let mut columns = Vec::with_capacity(stmt.columns.len());
        for def in &stmt.columns {
            let column_type = ColumnType::parse(&def.type_name)
                .ok_or_else(|| DatabaseError::InvalidColumnType(def.type_name.clone()))?;
            let max_length = match column_type {
                ColumnType::Varchar => def.max_length.unwrap_or(DEFAULT_VARCHAR_LENGTH),
                ColumnType::Integer => 0,
            };
            columns.push(Column::new(
                def.name.clone(),
                column_type,
                max_length,
                def.nullable,
            ));
        }

        self.catalog
            .create_table(&stmt.table_name, Schema::new(columns))?;
        Ok(QueryResult::RowsAffected(0))
    }

    fn execute_insert(&mut self, stmt: &InsertStatement) -> DatabaseResult<QueryResult> {
        let schema = self.schema_of(&stmt.table_name)?;

        let mut encoded_rows = Vec::with_capacity(stmt.rows.len());
        for row in &stmt.rows {
            let mut values = vec![Value::Null; schema.column_count()];
            if stmt.columns.is_empty() {
                // no column list: values follow schema order
                if row.len() != schema.column_count() {
                    return Err(DatabaseError::ColumnCountMismatch);
                }
                for (index, expr) in row.iter().enumerate() {
                    let column = schema.column(index).ok_or(DatabaseError::ColumnCountMismatch)?;
                    values[index] = literal_to_value(expr, column.column_type())?;
                }
            } else {
                if stmt.columns.len() != row.len() {
                    return Err(DatabaseError::ColumnCountMismatch);
                }
                for (name, expr) in stmt.columns.iter().zip(row) {
                    let index = schema
                        .column_index(name)
                        .ok_or_else(|| DatabaseError::ColumnNotFound(name.clone()))?;
                    let column = schema
                        .column(index)
                        .ok_or_else(|| DatabaseError::ColumnNotFound(name.clone()))?;
                    values[index] = literal_to_value(expr, column.column_type())?;
                }
            }
            encoded_rows.push(schema.serialize_record(&values)?);
        }

        let table = self
            .catalog
            .get_table(&stmt.table_name)
            .ok_or_else(|| DatabaseError::TableNotFound(stmt.table_name.clone()))?;
        for bytes in &encoded_rows {
            table.insert_record(bytes)?;
        }
        Ok(QueryResult::RowsAffected(encoded_rows.len()))
    }

    fn execute_select(&mut self, stmt: &SelectStatement) -> DatabaseResult<QueryResult> {
        let schema = self.schema_of(&stmt.table_name)?;

        let mut selected = Vec::new();
        let mut column_names = Vec::new();
        for expr in &stmt.select_list {
            match expr {
                Expression::Identifier(name) if name == "*" => {
                    for (index, column) in schema.columns().iter().enumerate() {
                        selected.push(index);
                        column_names.push(column.name().to_string());
                    }
                }
                Expression::Identifier(name) => {
                    let index = schema
                        .column_index(name)
                        .ok_or_else(|| DatabaseError::ColumnNotFound(name.clone()))?;
                    selected.push(index);
                    column_names.push(name.clone());
                }
                _ => {
                    return Err(DatabaseError::Unsupported(
                        "only column names and * are allowed in a SELECT list",
                    ))
                }
            }
        }

        let table = self
            .catalog
            .get_table(&stmt.table_name)
            .ok_or_else(|| DatabaseError::TableNotFound(stmt.table_name.clone()))?;
        let mut rows = Vec::new();
        for item in table.iter() {
            let (_, bytes) = item?;
            let values = schema.deserialize_record(&bytes)?;
            if !matches_filter(stmt.filter.as_ref(), &schema, &values) {
                continue;
            }
            rows.push(selected.iter().map(|&index| values[index].clone()).collect());
        }

        Ok(QueryResult::ResultSet {
            columns: column_names,
            rows,
        })
    }

    fn execute_delete(&mut self, stmt: &DeleteStatement) -> DatabaseResult<QueryResult> {
        let schema = self.schema_of(&stmt.table_name)?;
        let table = self
            .catalog
            .get_table(&stmt.table_name)
            .ok_or_else(|| DatabaseError::TableNotFound(stmt.table_name.clone()))?;

        let mut victims = Vec::new();
        for item in table.iter() {
            let (rid, bytes) = item?;
            let values = schema.deserialize_record(&bytes)?;
            if matches_filter(stmt.filter.as_ref(), &schema, &values) {
                victims.push(rid);
            }
        }

        let mut deleted = 0;
        for rid in victims {
            table.delete_record(rid)?;
            deleted += 1;
        }
        Ok(QueryResult::RowsAffected(deleted))
    }

    fn execute_update(&mut self, stmt: &UpdateStatement) -> DatabaseResult<QueryResult> {
        let schema = self.schema_of(&stmt.table_name)?;

        let mut assignments = Vec::with_capacity(stmt.assignments.len());
        for (name, expr) in &stmt.assignments {
            let index = schema
                .column_index(name)
                .ok_or_else(|| DatabaseError::ColumnNotFound(name.clone()))?;
            assignments.push((index, expr));
        }

        let table = self
            .catalog
            .get_table(&stmt.table_name)
            .ok_or_else(|| DatabaseError::TableNotFound(stmt.table_name.clone()))?;

        let mut updates = Vec::new();
        for item in table.iter() {
            let (rid, bytes) = item?;
            let values = schema.deserialize_record(&bytes)?;
            if !matches_filter(stmt.filter.as_ref(), &schema, &values) {
                continue;
            }
            let mut updated = values.clone();
            for (index, expr) in &assignments {
                let column = schema
                    .column(*index)
                    .ok_or(DatabaseError::ColumnCountMismatch)?;
                updated[*index] = assignment_value(column, expr, &schema, &values)?;
            }
            updates.push((rid, updated));
        }

        let mut changed = 0;
        for (rid, values) in updates {
            let bytes = schema.serialize_record(&values)?;
            table.update_record(rid, &bytes)?;
            changed += 1;
        }
        Ok(QueryResult::RowsAffected(changed))
    }

    fn schema_of(&self, table_name: &str) -> DatabaseResult<Schema> {
        self.catalog
            .get_schema(table_name)
            .cloned()
            .ok_or_else(|| DatabaseError::TableNotFound(table_name.to_string()))
    }
}

/// True when the filter is absent or evaluates to a non-zero INTEGER
fn matches_filter(filter: Option<&Expression>, schema: &Schema, row: &[Value]) -> bool {
    match filter {
        None => true,
        Some(expr) => match evaluate(expr, schema, row) {
            Some(value) => truthy(&value),
            None => false,
        },
    }
}

fn truthy(value: &Value) -> bool {
    matches!(value, Value::Integer(v) if *v != 0)
}

/// Evaluate an expression against one row. `None` means the expression has
/// no value here (unknown column, arithmetic on non-integers, division by
/// zero); WHERE treats that as a non-match.
fn evaluate(expr: &Expression, schema: &Schema, row: &[Value]) -> Option<Value> {
    match expr {
        Expression::Literal(literal) => match literal {
            Literal::Null => Some(Value::Null),
            Literal::Number(n) => i32::try_from(*n).ok().map(Value::Integer),
            Literal::String(s) => Some(Value::Varchar(s.clone())),
            Literal::Boolean(b) => Some(Value::Integer(if *b { 1 } else { 0 })),
        },
        Expression::Identifier(name) => {
            let index = schema.column_index(name)?;
            row.get(index).cloned()
        }
        Expression::BinaryOp { op, left, right } => {
            let left = evaluate(left, schema, row)?;
            let right = evaluate(right, schema, row)?;
            evaluate_binary(*op, left, right)
        }
        Expression::UnaryOp { op, operand } => {
            let operand = evaluate(operand, schema, row)?;
            match op {
                UnaryOperator::Not => Some(Value::Integer(if truthy(&operand) { 0 } else { 1 })),
                UnaryOperator::Minus => match operand {
                    Value::Integer(v) => Some(Value::Integer(v.wrapping_neg())),
                    _ => None,
                },
            }
        }
    }
}

/// Comparisons yield INTEGER 0/1; AND/OR collapse NULL to false; INTEGER
/// arithmetic wraps around on overflow
fn evaluate_binary(op: BinaryOperator, left: Value, right: Value) -> Option<Value> {
    use BinaryOperator::*;
    match op {
        Equal | NotEqual | LessThan | LessEqual | GreaterThan | GreaterEqual => Some(
            Value::Integer(if compare_values(&left, &right, op) { 1 } else { 0 }),
        ),
        And => Some(Value::Integer((truthy(&left) && truthy(&right)) as i32)),
        Or => Some(Value::Integer((truthy(&left) || truthy(&right)) as i32)),
        Plus | Minus | Multiply | Divide => match (left, right) {
            (Value::Integer(l), Value::Integer(r)) => match op {
                Plus => Some(Value::Integer(l.wrapping_add(r))),
                Minus => Some(Value::Integer(l.wrapping_sub(r))),
                Multiply => Some(Value::Integer(l.wrapping_mul(r))),
                Divide => {
                    if r == 0 {
                        None
                    } else {
                        Some(Value::Integer(l.wrapping_div(r)))
                    }
                }
                _ => None,
            },
            _ => None,
        },
    }
}

/// NULLs and mixed types never compare as anything
fn compare_values(left: &Value, right: &Value, op: BinaryOperator) -> bool {
    let ordering = match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l.cmp(r),
        (Value::Varchar(l), Value::Varchar(r)) => l.cmp(r),
        _ => return false,
    };
    match op {
        BinaryOperator::Equal => ordering == Ordering::Equal,
        BinaryOperator::NotEqual => ordering != Ordering::Equal,
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    }
}

/// INSERT accepts literals only (a leading minus is folded into the number)
fn literal_to_value(expr: &Expression, target: ColumnType) -> DatabaseResult<Value> {
    let literal = fold_literal(expr).ok_or(DatabaseError::NonLiteralInsert)?;
    convert_literal(&literal, target)
}

fn fold_literal(expr: &Expression) -> Option<Literal> {
    match expr {
        Expression::Literal(literal) => Some(literal.clone()),
        Expression::UnaryOp {
            op: UnaryOperator::Minus,
            operand,
        } => match operand.as_ref() {
            Expression::Literal(Literal::Number(n)) => Some(Literal::Number(n.wrapping_neg())),
            _ => None,
        },
        _ => None,
    }
}

/// Convert a literal into a value of the column's type; numeric strings
/// convert to INTEGER, numbers render into VARCHAR
fn convert_literal(literal: &Literal, target: ColumnType) -> DatabaseResult<Value> {
    match (literal, target) {
        (Literal::Null, _) => Ok(Value::Null),
        (Literal::Number(n), ColumnType::Integer) => {
            i32::try_from(*n)
                .map(Value::Integer)
                .map_err(|_| DatabaseError::TypeError {
                    value: n.to_string(),
                    target: target.to_string(),
                })
        }
        (Literal::Number(n), ColumnType::Varchar) => Ok(Value::Varchar(n.to_string())),
        (Literal::String(s), ColumnType::Varchar) => Ok(Value::Varchar(s.clone())),
        (Literal::String(s), ColumnType::Integer) => {
            s.trim()
                .parse::<i32>()
                .map(Value::Integer)
                .map_err(|_| DatabaseError::TypeError {
                    value: s.clone(),
                    target: target.to_string(),
                })
        }
        (Literal::Boolean(b), ColumnType::Integer) => Ok(Value::Integer(if *b { 1 } else { 0 })),
        (Literal::Boolean(b), ColumnType::Varchar) => Ok(Value::Varchar(b.to_string())),
    }
}

/// A SET value: literals are converted to the column type, everything else
/// is evaluated against the old row and must already have the right type
fn assignment_value(
    column: &Column,
    expr: &Expression,
    schema: &Schema,
    row: &[Value],
) -> DatabaseResult<Value> {
    if let Some(literal) = fold_literal(expr) {
        return convert_literal(&literal, column.column_type());
    }
    match evaluate(expr, schema, row) {
        Some(Value::Null) => Ok(Value::Null),
        Some(value) => {
            if value.column_type() == Some(column.column_type()) {
                Ok(value)
            } else {
                Err(DatabaseError::TypeError {
                    value: value.to_string(),
                    target: column.column_type().to_string(),
                })
            }
        }
        None => Err(DatabaseError::EvaluationFailed(column.name().to_string())),
    }
}
