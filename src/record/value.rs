use std::fmt;

/// Column data types supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Varchar,
}

impl ColumnType {
    /// Tag stored in the catalog's column table
    pub fn to_tag(self) -> i32 {
        match self {
            ColumnType::Integer => 1,
            ColumnType::Varchar => 2,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(ColumnType::Integer),
            2 => Some(ColumnType::Varchar),
            _ => None,
        }
    }

    /// Parse a SQL type name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("integer") || name.eq_ignore_ascii_case("int") {
            Some(ColumnType::Integer)
        } else if name.eq_ignore_ascii_case("varchar")
            || name.eq_ignore_ascii_case("text")
            || name.eq_ignore_ascii_case("string")
        {
            Some(ColumnType::Varchar)
        } else {
            None
        }
    }

    pub fn is_variable_length(self) -> bool {
        matches!(self, ColumnType::Varchar)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::Varchar => write!(f, "VARCHAR"),
        }
    }
}

/// A single typed value; `Null` belongs to no column type
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    Varchar(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Varchar(_) => Some(ColumnType::Varchar),
        }
    }

    /// Bytes this value occupies in a serialized row; nulls occupy none
    pub fn serialized_size(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Integer(_) => 4,
            Value::Varchar(s) => 4 + s.len(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Varchar(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags_roundtrip() {
        assert_eq!(ColumnType::from_tag(ColumnType::Integer.to_tag()), Some(ColumnType::Integer));
        assert_eq!(ColumnType::from_tag(ColumnType::Varchar.to_tag()), Some(ColumnType::Varchar));
        assert_eq!(ColumnType::from_tag(0), None);
        assert_eq!(ColumnType::from_tag(9), None);
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(ColumnType::parse("INTEGER"), Some(ColumnType::Integer));
        assert_eq!(ColumnType::parse("int"), Some(ColumnType::Integer));
        assert_eq!(ColumnType::parse("VarChar"), Some(ColumnType::Varchar));
        assert_eq!(ColumnType::parse("TEXT"), Some(ColumnType::Varchar));
        assert_eq!(ColumnType::parse("string"), Some(ColumnType::Varchar));
        assert_eq!(ColumnType::parse("FLOAT"), None);
    }

    #[test]
    fn test_serialized_sizes() {
        assert_eq!(Value::Null.serialized_size(), 0);
        assert_eq!(Value::Integer(-5).serialized_size(), 4);
        assert_eq!(Value::Varchar("hello".to_string()).serialized_size(), 9);
    }

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.column_type(), None);
        assert_eq!(Value::Integer(1).column_type(), Some(ColumnType::Integer));
        assert_eq!(
            Value::Varchar(String::new()).column_type(),
            Some(ColumnType::Varchar)
        );
    }
}
