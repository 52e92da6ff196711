//! Dialect capability profiles.
//!
//! Backends differ in what they report after an insert and in a handful of
//! syntax details. Everything the engine needs to know about a backend is a
//! flag or template on [`DialectProfile`]; no code path checks which vendor
//! it is talking to.
//!
//! # Generated-key behavior of the presets
//!
//! | Preset       | keys per row | identifiers only | ternary counts | ignore                  |
//! |--------------|--------------|------------------|----------------|-------------------------|
//! | postgres     | yes          | no               | no             | ON CONFLICT DO NOTHING  |
//! | mysql        | yes          | yes              | yes            | INSERT IGNORE           |
//! | mariadb      | yes          | yes              | yes            | INSERT IGNORE           |
//! | sqlite       | no           | yes              | no             | INSERT OR IGNORE        |
//! | h2           | no           | no               | no             | -                       |
//! | oracle       | no           | no               | no             | -                       |
//! | sql_server   | no           | yes              | no             | -                       |

use serde::{Deserialize, Serialize};

/// How bound parameters are written in statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceholderStyle {
    /// `?`
    Question,
    /// `$1`, `$2`, ...
    Numbered,
}

/// Where the ignore-on-conflict keyword goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreSyntax {
    /// `INSERT IGNORE INTO ...`
    InsertIgnore,
    /// `INSERT OR IGNORE INTO ...`
    InsertOrIgnore,
    /// `INSERT INTO ... ON CONFLICT DO NOTHING`
    OnConflictDoNothing,
}

/// Statement form used when every column is left to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultValuesForm {
    /// `INSERT INTO t DEFAULT VALUES`
    DefaultValues,
    /// `INSERT INTO t () VALUES ()`
    EmptyValues,
}

/// Behavioral profile of one database backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectProfile {
    pub name: String,
    /// Driver reports one generated key per inserted row (not only the last).
    pub supports_multiple_generated_keys: bool,
    /// Generated-key listings can be restricted to identifier columns.
    pub supports_only_identifiers_in_generated_keys: bool,
    /// Affected-row counts do not map 1:1 onto inserted rows.
    pub supports_ternary_affected_row_values: bool,
    pub ignore_syntax: Option<IgnoreSyntax>,
    /// Statement text may carry a `RETURNING` clause.
    pub supports_returning: bool,
    pub placeholder_style: PlaceholderStyle,
    pub identifier_quote: char,
    /// Template for a next-sequence-value expression; `{}` is the sequence name.
    pub sequence_next_value: Option<String>,
    pub default_values_form: DefaultValuesForm,
}

const RESERVED_WORDS: &[&str] = &[
    "default", "from", "group", "index", "key", "order", "select", "table", "user", "values",
    "where",
];

impl DialectProfile {
    pub fn postgres() -> Self {
        Self {
            name: "postgres".to_string(),
            supports_multiple_generated_keys: true,
            supports_only_identifiers_in_generated_keys: false,
            supports_ternary_affected_row_values: false,
            ignore_syntax: Some(IgnoreSyntax::OnConflictDoNothing),
            supports_returning: true,
            placeholder_style: PlaceholderStyle::Numbered,
            identifier_quote: '"',
            sequence_next_value: Some("nextval('{}')".to_string()),
            default_values_form: DefaultValuesForm::DefaultValues,
        }
    }

    pub fn mysql() -> Self {
        Self {
            name: "mysql".to_string(),
            supports_multiple_generated_keys: true,
            supports_only_identifiers_in_generated_keys: true,
            supports_ternary_affected_row_values: true,
            ignore_syntax: Some(IgnoreSyntax::InsertIgnore),
            supports_returning: false,
            placeholder_style: PlaceholderStyle::Question,
            identifier_quote: '`',
            sequence_next_value: None,
            default_values_form: DefaultValuesForm::EmptyValues,
        }
    }

    pub fn mariadb() -> Self {
        Self {
            name: "mariadb".to_string(),
            supports_returning: true,
            sequence_next_value: Some("NEXTVAL({})".to_string()),
            ..Self::mysql()
        }
    }

    pub fn sqlite() -> Self {
        Self {
            name: "sqlite".to_string(),
            supports_multiple_generated_keys: false,
            supports_only_identifiers_in_generated_keys: true,
            supports_ternary_affected_row_values: false,
            ignore_syntax: Some(IgnoreSyntax::InsertOrIgnore),
            supports_returning: false,
            placeholder_style: PlaceholderStyle::Question,
            identifier_quote: '"',
            sequence_next_value: None,
            default_values_form: DefaultValuesForm::DefaultValues,
        }
    }

    pub fn h2() -> Self {
        Self {
            name: "h2".to_string(),
            supports_multiple_generated_keys: false,
            supports_only_identifiers_in_generated_keys: false,
            supports_ternary_affected_row_values: false,
            ignore_syntax: None,
            supports_returning: false,
            placeholder_style: PlaceholderStyle::Question,
            identifier_quote: '"',
            sequence_next_value: Some("NEXT VALUE FOR {}".to_string()),
            default_values_form: DefaultValuesForm::DefaultValues,
        }
    }

    pub fn oracle() -> Self {
        Self {
            name: "oracle".to_string(),
            sequence_next_value: Some("{}.NEXTVAL".to_string()),
            ..Self::h2()
        }
    }

    pub fn sql_server() -> Self {
        Self {
            name: "sql_server".to_string(),
            supports_multiple_generated_keys: false,
            supports_only_identifiers_in_generated_keys: true,
            supports_ternary_affected_row_values: false,
            ignore_syntax: None,
            supports_returning: false,
            placeholder_style: PlaceholderStyle::Question,
            identifier_quote: '"',
            sequence_next_value: Some("NEXT VALUE FOR {}".to_string()),
            default_values_form: DefaultValuesForm::DefaultValues,
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::postgres()),
            "mysql" => Some(Self::mysql()),
            "mariadb" => Some(Self::mariadb()),
            "sqlite" => Some(Self::sqlite()),
            "h2" => Some(Self::h2()),
            "oracle" => Some(Self::oracle()),
            "sql_server" | "sqlserver" | "mssql" => Some(Self::sql_server()),
            _ => None,
        }
    }

    /// Placeholder for the 1-based parameter position.
    pub fn placeholder(&self, position: usize) -> String {
        match self.placeholder_style {
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::Numbered => format!("${}", position),
        }
    }

    /// Quote an identifier unless it is a plain lowercase, non-reserved name.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        if is_plain_identifier(identifier) {
            return identifier.to_string();
        }
        let q = self.identifier_quote;
        let escaped = identifier.replace(q, &format!("{}{}", q, q));
        format!("{}{}{}", q, escaped, q)
    }

    /// Inline next-value expression for a sequence, if the dialect has one.
    pub fn next_value_expr(&self, sequence: &str) -> Option<String> {
        self.sequence_next_value
            .as_ref()
            .map(|template| template.replace("{}", &self.quote_identifier(sequence)))
    }

    /// Assemble the final INSERT text around a rendered column list and
    /// VALUES body.
    ///
    /// `columns` is empty when every column is left to the database.
    /// Returns `None` when `ignore` is requested but the dialect has no
    /// ignore syntax.
    pub fn finish_insert(
        &self,
        table: &str,
        columns: &[String],
        values: &[String],
        ignore: bool,
        returning: Option<&[String]>,
    ) -> Option<String> {
        let ignore_syntax = match (ignore, self.ignore_syntax) {
            (false, _) => None,
            (true, Some(syntax)) => Some(syntax),
            (true, None) => return None,
        };

        let verb = match ignore_syntax {
            Some(IgnoreSyntax::InsertIgnore) => "INSERT IGNORE INTO",
            Some(IgnoreSyntax::InsertOrIgnore) => "INSERT OR IGNORE INTO",
            _ => "INSERT INTO",
        };

        let mut sql = format!("{} {}", verb, self.quote_identifier(table));
        if columns.is_empty() {
            match self.default_values_form {
                DefaultValuesForm::DefaultValues => sql.push_str(" DEFAULT VALUES"),
                DefaultValuesForm::EmptyValues => sql.push_str(" () VALUES ()"),
            }
        } else {
            sql.push_str(&format!(
                " ({}) VALUES ({})",
                columns.join(", "),
                values.join(", ")
            ));
        }

        if ignore_syntax == Some(IgnoreSyntax::OnConflictDoNothing) {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }

        if let Some(returning) = returning {
            if self.supports_returning && !returning.is_empty() {
                sql.push_str(&format!(" RETURNING {}", returning.join(", ")));
            }
        }

        Some(sql)
    }
}

fn is_plain_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_WORDS.contains(&identifier)
}

// =============================================================================
// TESTS
// =============================================================================
