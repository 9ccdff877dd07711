use chumsky::prelude::*;

/// Reserved words, recognized case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Create,
    Table,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Delete,
    Update,
    Set,
    And,
    Or,
    Not,
    Null,
    True,
    False,
}

impl Keyword {
    fn from_ident(word: &str) -> Option<Self> {
        let keyword = match word.to_ascii_uppercase().as_str() {
            "CREATE" => Keyword::Create,
            "TABLE" => Keyword::Table,
            "INSERT" => Keyword::Insert,
            "INTO" => Keyword::Into,
            "VALUES" => Keyword::Values,
            "SELECT" => Keyword::Select,
            "FROM" => Keyword::From,
            "WHERE" => Keyword::Where,
            "DELETE" => Keyword::Delete,
            "UPDATE" => Keyword::Update,
            "SET" => Keyword::Set,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "NULL" => Keyword::Null,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            _ => return None,
        };
        Some(keyword)
    }
}

/// Comparison and arithmetic operator tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlToken {
    Keyword(Keyword),
    Identifier(String),
    Number(i64),
    StringLit(String),
    Op(Op),
    Symbol(char),
    Comment(String),
}

pub fn lexer<'a>() -> impl Parser<'a, &'a str, Vec<SqlToken>, extra::Err<Rich<'a, char>>> {
    let comment = just("--")
        .ignore_then(none_of("\n").repeated().collect::<String>())
        .map(SqlToken::Comment)
        .padded();

    let number = text::int(10)
        .to_slice()
        .map(|s: &str| SqlToken::Number(s.parse().unwrap()))
        .padded();

    let string = just('\'')
        .ignore_then(none_of("'").repeated().collect::<String>())
        .then_ignore(just('\''))
        .map(SqlToken::StringLit)
        .padded();

    let word = text::ascii::ident()
        .map(|s: &str| match Keyword::from_ident(s) {
            Some(keyword) => SqlToken::Keyword(keyword),
            None => SqlToken::Identifier(s.to_string()),
        })
        .padded();

    let op = choice((
        just("<=").to(Op::Le),
        just(">=").to(Op::Ge),
        just("<>").to(Op::Ne),
        just("!=").to(Op::Ne),
        just("=").to(Op::Eq),
        just("<").to(Op::Lt),
        just(">").to(Op::Gt),
        just("+").to(Op::Plus),
        just("-").to(Op::Minus),
        just("*").to(Op::Star),
        just("/").to(Op::Slash),
    ))
    .map(SqlToken::Op)
    .padded();

    let symbol = one_of("(),;").map(SqlToken::Symbol).padded();

    choice((comment, string, number, word, op, symbol))
        .repeated()
        .collect()
}
