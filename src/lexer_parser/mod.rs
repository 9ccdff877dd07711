mod lexer;
mod parser;

pub use lexer::{lexer, Keyword, Op, SqlToken};
pub use parser::{
    parser, BinaryOperator, ColumnDefinition, CreateTableStatement, DeleteStatement, Expression,
    InsertStatement, Literal, SelectStatement, Statement, UnaryOperator, UpdateStatement,
};

use chumsky::Parser;

/// Tokenize and parse a SQL string into statements
pub fn parse(input: &str) -> Result<Vec<Statement>, String> {
    let tokens = lexer()
        .parse(input)
        .into_result()
        .map_err(|errs| format!("Lexer errors: {:?}", errs))?;

    let tokens: Vec<SqlToken> = tokens
        .into_iter()
        .filter(|token| !matches!(token, SqlToken::Comment(_)))
        .collect();

    let result = parser()
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errs| format!("Parser errors: {:?}", errs));
    result
}
