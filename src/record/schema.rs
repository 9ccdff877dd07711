use std::collections::HashMap;

use super::error::{RecordError, RecordResult};
use super::value::{ColumnType, Value};

/// Maximum length assumed for VARCHAR columns declared without one
pub const DEFAULT_VARCHAR_LENGTH: usize = 255;

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    max_length: usize,
    nullable: bool,
}

impl Column {
    pub fn new(name: String, column_type: ColumnType, max_length: usize, nullable: bool) -> Self {
        Self {
            name,
            column_type,
            max_length,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Maximum length of a VARCHAR column. Used for worst-case record size
    /// accounting, never enforced at runtime.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_variable_length(&self) -> bool {
        self.column_type.is_variable_length()
    }
}

/// Ordered column list with a name lookup table, plus the row codec.
///
/// Serialized row layout:
///
/// ```text
/// [null bitmap][var offsets][fixed payload][var payload]
/// ```
///
/// The bitmap holds one bit per column (set = null). The offset vector holds
/// one u32 per VARCHAR column and is omitted entirely for schemas without
/// any; entries are filled in order for the non-null VARCHARs and point at
/// each column's length-prefixed data, so the deserializer can jump straight
/// to a string without scanning the fixed region.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
    name_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let name_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            columns,
            name_index,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find a column's position by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    fn null_bitmap_size(&self) -> usize {
        self.columns.len().div_ceil(8)
    }

    fn var_column_count(&self) -> usize {
        self.columns.iter().filter(|c| c.is_variable_length()).count()
    }

    fn header_size(&self) -> usize {
        self.null_bitmap_size() + self.var_column_count() * 4
    }

    /// Exact serialized size of this value vector
    pub fn record_size(&self, values: &[Value]) -> RecordResult<usize> {
        if values.len() != self.columns.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        Ok(self.header_size() + values.iter().map(Value::serialized_size).sum::<usize>())
    }

    /// Largest row this schema can produce, with every VARCHAR at its
    /// maximum length
    pub fn max_record_size(&self) -> usize {
        self.header_size()
            + self
                .columns
                .iter()
                .map(|c| match c.column_type {
                    ColumnType::Integer => 4,
                    ColumnType::Varchar => 4 + c.max_length,
                })
                .sum::<usize>()
    }

    /// Serialize a row. The value vector must match the schema in count and,
    /// for non-null values, in type; nulls are recorded in the bitmap only.
    pub fn serialize_record(&self, values: &[Value]) -> RecordResult<Vec<u8>> {
        let size = self.record_size(values)?;
        for (value, column) in values.iter().zip(&self.columns) {
            if let Some(value_type) = value.column_type() {
                if value_type != column.column_type {
                    return Err(RecordError::TypeMismatch {
                        expected: column.column_type.to_string(),
                        actual: value_type.to_string(),
                    });
                }
            }
        }

        let mut buffer = vec![0u8; size];
        for (i, value) in values.iter().enumerate() {
            if value.is_null() {
                buffer[i / 8] |= 1 << (i % 8);
            }
        }

        let bitmap_size = self.null_bitmap_size();
        let mut data_offset = self.header_size();

        for value in values {
            if let Value::Integer(v) = value {
                buffer[data_offset..data_offset + 4].copy_from_slice(&v.to_le_bytes());
                data_offset += 4;
            }
        }

        let mut var_slot = 0;
        for value in values {
            if let Value::Varchar(s) = value {
                let offset_pos = bitmap_size + var_slot * 4;
                buffer[offset_pos..offset_pos + 4]
                    .copy_from_slice(&(data_offset as u32).to_le_bytes());
                buffer[data_offset..data_offset + 4]
                    .copy_from_slice(&(s.len() as u32).to_le_bytes());
                data_offset += 4;
                buffer[data_offset..data_offset + s.len()].copy_from_slice(s.as_bytes());
                data_offset += s.len();
                var_slot += 1;
            }
        }

        Ok(buffer)
    }

    /// Deserialize a row produced by `serialize_record` on this schema
    pub fn deserialize_record(&self, data: &[u8]) -> RecordResult<Vec<Value>> {
        if data.len() < self.header_size() {
            return Err(RecordError::Deserialization(format!(
                "record of {} bytes is shorter than the {}-byte header",
                data.len(),
                self.header_size()
            )));
        }

        let bitmap_size = self.null_bitmap_size();
        let mut values = Vec::with_capacity(self.columns.len());
        let mut fixed_offset = self.header_size();
        let mut var_slot = 0;

        for (i, column) in self.columns.iter().enumerate() {
            if data[i / 8] & (1 << (i % 8)) != 0 {
                values.push(Value::Null);
                continue;
            }
            match column.column_type {
                ColumnType::Integer => {
                    let v = read_u32(data, fixed_offset)? as i32;
                    values.push(Value::Integer(v));
                    fixed_offset += 4;
                }
                ColumnType::Varchar => {
                    let var_offset = read_u32(data, bitmap_size + var_slot * 4)? as usize;
                    let len = read_u32(data, var_offset)? as usize;
                    let bytes = data.get(var_offset + 4..var_offset + 4 + len).ok_or_else(|| {
                        RecordError::Deserialization(format!(
                            "column {} extends past the record end",
                            column.name
                        ))
                    })?;
                    let s = String::from_utf8(bytes.to_vec()).map_err(|e| {
                        RecordError::Deserialization(format!("invalid UTF-8: {}", e))
                    })?;
                    values.push(Value::Varchar(s));
                    var_slot += 1;
                }
            }
        }

        Ok(values)
    }
}

fn read_u32(data: &[u8], offset: usize) -> RecordResult<u32> {
    let bytes = data.get(offset..offset + 4).ok_or_else(|| {
        RecordError::Deserialization(format!("offset {} is out of bounds", offset))
    })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> Schema {
        Schema::new(vec![
            Column::new("id".to_string(), ColumnType::Integer, 0, false),
            Column::new("name".to_string(), ColumnType::Varchar, 50, true),
            Column::new("age".to_string(), ColumnType::Integer, 0, true),
        ])
    }

    #[test]
    fn test_column_lookup() {
        let schema = users_schema();
        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.column_index("id"), Some(0));
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("age"), Some(2));
        assert_eq!(schema.column_index("missing"), None);
        assert_eq!(schema.column(1).unwrap().name(), "name");
        assert!(schema.column(3).is_none());
    }

    #[test]
    fn test_roundtrip_plain_row() {
        let schema = users_schema();
        let values = vec![
            Value::Integer(1),
            Value::Varchar("Alice".to_string()),
            Value::Integer(25),
        ];

        let bytes = schema.serialize_record(&values).unwrap();
        assert_eq!(bytes.len(), schema.record_size(&values).unwrap());
        assert_eq!(schema.deserialize_record(&bytes).unwrap(), values);
    }

    #[test]
    fn test_roundtrip_with_nulls() {
        let schema = users_schema();
        let values = vec![Value::Integer(2), Value::Null, Value::Null];

        let bytes = schema.serialize_record(&values).unwrap();
        // bit 1 and bit 2 of the null bitmap
        assert_eq!(bytes[0], 0b0000_0110);
        assert_eq!(schema.deserialize_record(&bytes).unwrap(), values);
    }

    #[test]
    fn test_roundtrip_null_varchar_between_live_ones() {
        let schema = Schema::new(vec![
            Column::new("a".to_string(), ColumnType::Varchar, 10, true),
            Column::new("b".to_string(), ColumnType::Varchar, 10, true),
            Column::new("c".to_string(), ColumnType::Varchar, 10, true),
        ]);
        let values = vec![
            Value::Varchar("left".to_string()),
            Value::Null,
            Value::Varchar("right".to_string()),
        ];

        let bytes = schema.serialize_record(&values).unwrap();
        assert_eq!(schema.deserialize_record(&bytes).unwrap(), values);
    }

    #[test]
    fn test_roundtrip_fixed_only_schema() {
        let schema = Schema::new(vec![
            Column::new("x".to_string(), ColumnType::Integer, 0, false),
            Column::new("y".to_string(), ColumnType::Integer, 0, false),
        ]);
        let values = vec![Value::Integer(-7), Value::Integer(i32::MAX)];

        let bytes = schema.serialize_record(&values).unwrap();
        // 1-byte bitmap, no offset vector, two integers
        assert_eq!(bytes.len(), 1 + 8);
        assert_eq!(schema.deserialize_record(&bytes).unwrap(), values);
    }

    #[test]
    fn test_wide_schema_bitmap() {
        let columns = (0..9)
            .map(|i| Column::new(format!("c{}", i), ColumnType::Integer, 0, true))
            .collect();
        let schema = Schema::new(columns);

        let mut values = vec![Value::Integer(0); 9];
        values[8] = Value::Null;

        let bytes = schema.serialize_record(&values).unwrap();
        // nine columns need a two-byte bitmap
        assert_eq!(bytes.len(), 2 + 8 * 4);
        assert_eq!(bytes[1], 0b0000_0001);
        assert_eq!(schema.deserialize_record(&bytes).unwrap(), values);
    }

    #[test]
    fn test_empty_string_roundtrip() {
        let schema = users_schema();
        let values = vec![
            Value::Integer(3),
            Value::Varchar(String::new()),
            Value::Null,
        ];

        let bytes = schema.serialize_record(&values).unwrap();
        assert_eq!(schema.deserialize_record(&bytes).unwrap(), values);
    }

    #[test]
    fn test_value_count_mismatch() {
        let schema = users_schema();
        let result = schema.serialize_record(&[Value::Integer(1)]);
        assert!(matches!(result, Err(RecordError::SchemaMismatch(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = users_schema();
        let result = schema.serialize_record(&[
            Value::Varchar("oops".to_string()),
            Value::Null,
            Value::Null,
        ]);
        assert!(matches!(result, Err(RecordError::TypeMismatch { .. })));
    }

    #[test]
    fn test_max_record_size() {
        let schema = users_schema();
        // bitmap(1) + offsets(4) + id(4) + name(4 + 50) + age(4)
        assert_eq!(schema.max_record_size(), 1 + 4 + 4 + 54 + 4);
    }
}
