//! Query outcomes and their text renderings.

/// Rows of a successful query, every cell already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// More rows were available than were fetched.
    pub truncated: bool,
}

/// Outcome of executing one SQL statement. Execution errors are data here,
/// not `Err`, because they feed the repair loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(QueryResult),
    Failure { error: String },
}

impl FetchOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }
}

const NO_COLUMNS: &str = "执行成功，无返回结果";

/// Renders an outcome as a markdown table; failures render as their error text.
#[must_use]
pub fn to_markdown(outcome: &FetchOutcome) -> String {
    let result = match outcome {
        FetchOutcome::Success(result) => result,
        FetchOutcome::Failure { error } => return error.clone(),
    };
    if result.columns.is_empty() {
        return NO_COLUMNS.to_owned();
    }

    let mut out = String::new();
    push_markdown_row(&mut out, &result.columns);
    out.push('|');
    for _ in &result.columns {
        out.push_str(" --- |");
    }
    out.push('\n');
    for row in &result.rows {
        push_markdown_row(&mut out, row);
    }
    if result.truncated {
        out.push_str(&format!("\n(showing first {} rows)\n", result.rows.len()));
    }
    out
}

fn push_markdown_row(out: &mut String, cells: &[String]) {
    out.push('|');
    for cell in cells {
        out.push(' ');
        out.push_str(&cell.replace('|', "\\|").replace(['\r', '\n'], " "));
        out.push_str(" |");
    }
    out.push('\n');
}

/// Header line followed by comma-joined rows.
#[must_use]
pub fn to_csv(result: &QueryResult) -> String {
    std::iter::once(result.columns.join(","))
        .chain(result.rows.iter().map(|row| row.join(",")))
        .collect::<Vec<_>>()
        .join("\n")
}
