use chumsky::prelude::*;

use super::lexer::{Keyword as K, Op, SqlToken as T};

/// A parsed SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStatement),
    Insert(InsertStatement),
    Select(SelectStatement),
    Delete(DeleteStatement),
    Update(UpdateStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub type_name: String,
    pub max_length: Option<usize>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    /// Empty when no column list was given; values then follow schema order
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Column references; `*` arrives as the identifier `*`
    pub select_list: Vec<Expression>,
    pub table_name: String,
    pub filter: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub filter: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub assignments: Vec<(String, Expression)>,
    pub filter: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(i64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// Parse a token stream into statements; `;` separators are optional
pub fn parser<'a>() -> impl Parser<'a, &'a [T], Vec<Statement>, extra::Err<Rich<'a, T>>> {
    statement()
        .then_ignore(just(T::Symbol(';')).or_not())
        .repeated()
        .collect()
}

fn statement<'a>() -> impl Parser<'a, &'a [T], Statement, extra::Err<Rich<'a, T>>> {
    choice((
        create_table().map(Statement::CreateTable),
        insert().map(Statement::Insert),
        select().map(Statement::Select),
        delete().map(Statement::Delete),
        update().map(Statement::Update),
    ))
}

fn identifier<'a>() -> impl Parser<'a, &'a [T], String, extra::Err<Rich<'a, T>>> + Clone {
    select! { T::Identifier(name) => name }
}

fn create_table<'a>() -> impl Parser<'a, &'a [T], CreateTableStatement, extra::Err<Rich<'a, T>>> {
    let length = select! { T::Number(n) => n }
        .delimited_by(just(T::Symbol('(')), just(T::Symbol(')')));

    let not_null = just(T::Keyword(K::Not)).ignore_then(just(T::Keyword(K::Null)));

    let column = identifier()
        .then(identifier())
        .then(length.or_not())
        .then(not_null.or_not())
        .map(|(((name, type_name), max_length), not_null)| ColumnDefinition {
            name,
            type_name,
            max_length: max_length.map(|n| n as usize),
            nullable: not_null.is_none(),
        });

    just(T::Keyword(K::Create))
        .ignore_then(just(T::Keyword(K::Table)))
        .ignore_then(identifier())
        .then(
            column
                .separated_by(just(T::Symbol(',')))
                .at_least(1)
                .collect()
                .delimited_by(just(T::Symbol('(')), just(T::Symbol(')'))),
        )
        .map(|(table_name, columns)| CreateTableStatement {
            table_name,
            columns,
        })
}

fn insert<'a>() -> impl Parser<'a, &'a [T], InsertStatement, extra::Err<Rich<'a, T>>> {
    let column_list = identifier()
        .separated_by(just(T::Symbol(',')))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(T::Symbol('(')), just(T::Symbol(')')));

    let value_row = expression()
        .separated_by(just(T::Symbol(',')))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(T::Symbol('(')), just(T::Symbol(')')));

    just(T::Keyword(K::Insert))
        .ignore_then(just(T::Keyword(K::Into)))
        .ignore_then(identifier())
        .then(column_list.or_not())
        .then_ignore(just(T::Keyword(K::Values)))
        .then(
            value_row
                .separated_by(just(T::Symbol(',')))
                .at_least(1)
                .collect(),
        )
        .map(|((table_name, columns), rows)| InsertStatement {
            table_name,
            columns: columns.unwrap_or_default(),
            rows,
        })
}

fn select<'a>() -> impl Parser<'a, &'a [T], SelectStatement, extra::Err<Rich<'a, T>>> {
    let item = choice((
        just(T::Op(Op::Star)).to(Expression::Identifier("*".to_string())),
        expression(),
    ));

    just(T::Keyword(K::Select))
        .ignore_then(
            item.separated_by(just(T::Symbol(',')))
                .at_least(1)
                .collect(),
        )
        .then_ignore(just(T::Keyword(K::From)))
        .then(identifier())
        .then(where_clause().or_not())
        .map(|((select_list, table_name), filter)| SelectStatement {
            select_list,
            table_name,
            filter,
        })
}

fn delete<'a>() -> impl Parser<'a, &'a [T], DeleteStatement, extra::Err<Rich<'a, T>>> {
    just(T::Keyword(K::Delete))
        .ignore_then(just(T::Keyword(K::From)))
        .ignore_then(identifier())
        .then(where_clause().or_not())
        .map(|(table_name, filter)| DeleteStatement { table_name, filter })
}

fn update<'a>() -> impl Parser<'a, &'a [T], UpdateStatement, extra::Err<Rich<'a, T>>> {
    let assignment = identifier()
        .then_ignore(just(T::Op(Op::Eq)))
        .then(expression());

    just(T::Keyword(K::Update))
        .ignore_then(identifier())
        .then_ignore(just(T::Keyword(K::Set)))
        .then(
            assignment
                .separated_by(just(T::Symbol(',')))
                .at_least(1)
                .collect(),
        )
        .then(where_clause().or_not())
        .map(|((table_name, assignments), filter)| UpdateStatement {
            table_name,
            assignments,
            filter,
        })
}

fn where_clause<'a>() -> impl Parser<'a, &'a [T], Expression, extra::Err<Rich<'a, T>>> {
    just(T::Keyword(K::Where)).ignore_then(expression())
}

/// Expression grammar, loosest first: OR, AND, `= <>`, `< <= > >=`, `+ -`,
/// `* /`, then NOT and unary minus
fn expression<'a>() -> impl Parser<'a, &'a [T], Expression, extra::Err<Rich<'a, T>>> {
    recursive(|expr| {
        let literal = select! {
            T::Number(n) => Expression::Literal(Literal::Number(n)),
            T::StringLit(s) => Expression::Literal(Literal::String(s)),
            T::Keyword(K::Null) => Expression::Literal(Literal::Null),
            T::Keyword(K::True) => Expression::Literal(Literal::Boolean(true)),
            T::Keyword(K::False) => Expression::Literal(Literal::Boolean(false)),
        };

        let primary = choice((
            literal,
            select! { T::Identifier(name) => Expression::Identifier(name) },
            expr.delimited_by(just(T::Symbol('(')), just(T::Symbol(')'))),
        ));

        let unary_op = choice((
            just(T::Keyword(K::Not)).to(UnaryOperator::Not),
            just(T::Op(Op::Minus)).to(UnaryOperator::Minus),
        ));
        let unary = unary_op
            .repeated()
            .foldr(primary, |op, operand| Expression::UnaryOp {
                op,
                operand: Box::new(operand),
            });

        let product_op = choice((
            just(T::Op(Op::Star)).to(BinaryOperator::Multiply),
            just(T::Op(Op::Slash)).to(BinaryOperator::Divide),
        ));
        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), binary);

        let sum_op = choice((
            just(T::Op(Op::Plus)).to(BinaryOperator::Plus),
            just(T::Op(Op::Minus)).to(BinaryOperator::Minus),
        ));
        let sum = product.clone().foldl(sum_op.then(product).repeated(), binary);

        let comparison_op = choice((
            just(T::Op(Op::Le)).to(BinaryOperator::LessEqual),
            just(T::Op(Op::Ge)).to(BinaryOperator::GreaterEqual),
            just(T::Op(Op::Lt)).to(BinaryOperator::LessThan),
            just(T::Op(Op::Gt)).to(BinaryOperator::GreaterThan),
        ));
        let comparison = sum.clone().foldl(comparison_op.then(sum).repeated(), binary);

        let equality_op = choice((
            just(T::Op(Op::Eq)).to(BinaryOperator::Equal),
            just(T::Op(Op::Ne)).to(BinaryOperator::NotEqual),
        ));
        let equality = comparison
            .clone()
            .foldl(equality_op.then(comparison).repeated(), binary);

        let and = equality.clone().foldl(
            just(T::Keyword(K::And))
                .to(BinaryOperator::And)
                .then(equality)
                .repeated(),
            binary,
        );

        and.clone().foldl(
            just(T::Keyword(K::Or))
                .to(BinaryOperator::Or)
                .then(and)
                .repeated(),
            binary,
        )
    })
}

fn binary(left: Expression, (op, right): (BinaryOperator, Expression)) -> Expression {
    Expression::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
