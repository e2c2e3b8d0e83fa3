//! Table-name extraction from raw SQL text.
//!
//! # Responsibility
//! - Find the tables a raw statement targets so it can be routed to a bind.
//!
//! # Invariants
//! - Names are returned lowercased, unqualified and unquoted, in order of
//!   first appearance, without duplicates.
//! - Literals and comments never contribute names.

use once_cell::sync::Lazy;
use regex::Regex;

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)/\*.*?\*/|--[^\n]*|'(?:[^']|'')*'").expect("noise pattern is valid")
});

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"]|"")*"|`[^`]*`|\[[^\]]*\]|[A-Za-z_][A-Za-z0-9_$]*|\S"#)
        .expect("token pattern is valid")
});

const TABLE_KEYWORDS: &[&str] = &["FROM", "JOIN", "INTO", "UPDATE"];

// Words that may follow a table reference and are never aliases.
const RESERVED: &[&str] = &[
    "AS", "CROSS", "DEFAULT", "DELETE", "EXCEPT", "FROM", "FULL", "GROUP", "HAVING", "INNER",
    "INSERT", "INTERSECT", "JOIN", "LEFT", "LIMIT", "NATURAL", "OFFSET", "ON", "OR", "ORDER",
    "OUTER", "RETURNING", "RIGHT", "SELECT", "SET", "UNION", "UPDATE", "USING", "VALUES",
    "WHERE", "WINDOW",
];

/// Extracts referenced table names from SQL text.
pub trait TableNameExtractor: Send + Sync {
    fn find_table_names(&self, sql: &str) -> Vec<String>;
}

/// Tokenizing extractor that reads identifiers after `FROM`, `JOIN`, `INTO`
/// and `UPDATE`, including comma-separated `FROM` lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTableExtractor;

impl TableNameExtractor for RegexTableExtractor {
    fn find_table_names(&self, sql: &str) -> Vec<String> {
        let cleaned = NOISE.replace_all(sql, " ");
        let tokens: Vec<&str> = TOKEN
            .find_iter(&cleaned)
            .map(|token| token.as_str())
            .collect();

        let mut tables = Vec::new();
        let mut index = 0;
        while index < tokens.len() {
            let keyword = tokens[index].to_ascii_uppercase();
            index += 1;
            if !TABLE_KEYWORDS.contains(&keyword.as_str()) {
                continue;
            }

            // `UPDATE OR REPLACE t`, `INSERT OR IGNORE INTO t`.
            if keyword == "UPDATE" && is_word(&tokens, index, "OR") {
                index += 2;
            }

            loop {
                let Some((name, next)) = read_table(&tokens, index) else {
                    break;
                };
                if !tables.contains(&name) {
                    tables.push(name);
                }
                index = skip_alias(&tokens, next);

                if keyword == "FROM" && tokens.get(index) == Some(&",") {
                    index += 1;
                    continue;
                }
                break;
            }
        }
        tables
    }
}

/// Reads a possibly qualified identifier starting at `index`.
fn read_table(tokens: &[&str], index: usize) -> Option<(String, usize)> {
    let first = *tokens.get(index)?;
    if !is_identifier(first) {
        return None;
    }
    let mut last = first;
    let mut next = index + 1;
    while tokens.get(next) == Some(&".") {
        match tokens.get(next + 1) {
            Some(part) if is_identifier(part) => {
                last = part;
                next += 2;
            }
            _ => break,
        }
    }
    Some((unquote(last).to_ascii_lowercase(), next))
}

fn skip_alias(tokens: &[&str], index: usize) -> usize {
    let mut index = index;
    if is_word(tokens, index, "AS") {
        index += 1;
    }
    match tokens.get(index) {
        Some(token) if is_identifier(token) => index + 1,
        _ => index,
    }
}

fn is_word(tokens: &[&str], index: usize, word: &str) -> bool {
    tokens
        .get(index)
        .is_some_and(|token| token.eq_ignore_ascii_case(word))
}

fn is_identifier(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    if matches!(first, '"' | '`' | '[') {
        return token.len() > 2;
    }
    (first.is_ascii_alphabetic() || first == '_')
        && !RESERVED.contains(&token.to_ascii_uppercase().as_str())
}

fn unquote(token: &str) -> String {
    match token.chars().next() {
        Some('"') => token[1..token.len() - 1].replace("\"\"", "\""),
        Some('`') | Some('[') => token[1..token.len() - 1].to_string(),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{RegexTableExtractor, TableNameExtractor};

    fn tables(sql: &str) -> Vec<String> {
        RegexTableExtractor.find_table_names(sql)
    }

    #[test]
    fn finds_select_and_join_tables() {
        assert_eq!(
            tables(
                "select o.id from Orders o inner join customers AS c on c.id = o.customer_id \
                 left join main.regions r on r.id = c.region_id where o.total > 10"
            ),
            vec!["orders", "customers", "regions"]
        );
    }

    #[test]
    fn finds_comma_separated_from_lists() {
        assert_eq!(
            tables("SELECT * FROM a, b AS bee, \"Quoted Name\" q WHERE a.id = b.id"),
            vec!["a", "b", "quoted name"]
        );
    }

    #[test]
    fn finds_dml_targets() {
        assert_eq!(tables("INSERT INTO audit_log (id) VALUES (1)"), vec!["audit_log"]);
        assert_eq!(tables("insert or replace into `cache` values (1)"), vec!["cache"]);
        assert_eq!(tables("UPDATE accounts SET balance = 0"), vec!["accounts"]);
        assert_eq!(tables("update or ignore [users] set x = 1"), vec!["users"]);
        assert_eq!(tables("DELETE FROM sessions WHERE id = 3"), vec!["sessions"]);
    }

    #[test]
    fn follows_subselects_and_deduplicates() {
        assert_eq!(
            tables(
                "SELECT * FROM (SELECT id FROM reports) sub JOIN reports r ON r.id = sub.id \
                 WHERE r.id IN (SELECT report_id FROM shares)"
            ),
            vec!["reports", "shares"]
        );
    }

    #[test]
    fn ignores_literals_and_comments() {
        assert_eq!(
            tables("SELECT 'from fake' FROM real_table -- join other\n/* from ghost */"),
            vec!["real_table"]
        );
    }

    #[test]
    fn returns_nothing_without_tables() {
        assert!(tables("SELECT 1").is_empty());
        assert!(tables("").is_empty());
        assert!(tables("PRAGMA user_version").is_empty());
    }
}
