use std::io::{self, Write};

use tinydb::database::{Database, QueryResult};

fn main() {
    env_logger::init();

    let db_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tinydb.db".to_string());

    let mut db = match Database::open(&db_file) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", db_file, e);
            std::process::exit(1);
        }
    };

    println!("tinydb - type 'help' for help, 'exit' to leave");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("tinydb> ");
        stdout.flush().unwrap();

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if line == "help" {
            print_help();
            continue;
        }

        match db.execute_sql(line) {
            Ok(results) => {
                for result in results {
                    print_result(&result);
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

fn print_result(result: &QueryResult) {
    match result {
        QueryResult::RowsAffected(count) => println!("{} row(s) affected", count),
        QueryResult::ResultSet { columns, rows } => {
            println!("{}", columns.join(","));
            for row in rows {
                let fields: Vec<String> = row.iter().map(|value| value.to_string()).collect();
                println!("{}", fields.join(","));
            }
            println!("{} row(s)", rows.len());
        }
    }
}

fn print_help() {
    println!("Supported statements:");
    println!("  CREATE TABLE name (col TYPE [NOT NULL], ...)   types: INTEGER, VARCHAR(n)");
    println!("  INSERT INTO name [(cols)] VALUES (v, ...), ...");
    println!("  SELECT cols|* FROM name [WHERE expr]");
    println!("  UPDATE name SET col = expr, ... [WHERE expr]");
    println!("  DELETE FROM name [WHERE expr]");
}
