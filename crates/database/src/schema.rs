//! mschema: the compact schema description embedded in SQL prompts.

use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub primary_key: bool,
    pub comment: Option<String>,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MSchema {
    pub db_id: String,
    pub tables: Vec<TableSchema>,
}

impl Display for ColumnSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "({}:{}", self.name, self.data_type.to_uppercase())?;
        if self.primary_key {
            write!(f, ", Primary Key")?;
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            write!(f, ", {comment}")?;
        }
        if !self.examples.is_empty() {
            write!(f, ", Examples: [{}]", self.examples.join(", "))?;
        }
        write!(f, ")")
    }
}

impl Display for TableSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "# Table: {}", self.name)?;
        writeln!(f, "[")?;
        let columns: Vec<String> = self.columns.iter().map(ToString::to_string).collect();
        writeln!(f, "{}", columns.join(",\n"))?;
        write!(f, "]")
    }
}

impl Display for MSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "【DB_ID】 {}", self.db_id)?;
        write!(f, "【Schema】")?;
        for table in &self.tables {
            write!(f, "\n{table}")?;
        }
        Ok(())
    }
}
