//! Extraction of fenced code blocks from model output.

const FENCE: &str = "```";
const SQL_OPENER: &str = "```sql";

/// Pull the SQL statement out of a model response.
///
/// Takes the body between the first `` ```sql `` opener and the next fence,
/// then tries any fence opened at the start of a line, and finally falls
/// back to the trimmed response.
#[must_use]
pub fn extract_sql(content: &str) -> String {
    sql_block(content)
        .or_else(|| line_fence_block(content))
        .unwrap_or_else(|| content.trim())
        .to_owned()
}

/// First non-empty body after a `` ```sql `` opener (any case). The body may
/// sit on the opener's own line.
fn sql_block(content: &str) -> Option<&str> {
    let lower = content.to_ascii_lowercase();
    let mut from = 0_usize;
    while let Some(pos) = lower.get(from..)?.find(SQL_OPENER) {
        let body_start = from.saturating_add(pos).saturating_add(SQL_OPENER.len());
        // ```sqlite and friends are other languages
        if lower.as_bytes().get(body_start).is_some_and(u8::is_ascii_alphanumeric) {
            from = body_start;
            continue;
        }
        let rest = content.get(body_start..)?;
        let end = rest.find(FENCE)?;
        let body = rest.get(..end)?.trim();
        if !body.is_empty() {
            return Some(body);
        }
        from = body_start.saturating_add(end).saturating_add(FENCE.len());
    }
    None
}

/// First non-empty block whose opening fence starts a line. Backticks in
/// running prose never open a block.
fn line_fence_block(content: &str) -> Option<&str> {
    let mut from = 0_usize;
    while let Some(pos) = content.get(from..)?.find(FENCE) {
        let start = from.saturating_add(pos);
        let after = start.saturating_add(FENCE.len());
        let at_line_start =
            content.get(..start)?.rsplit('\n').next().is_some_and(|p| p.trim().is_empty());
        if !at_line_start {
            from = after;
            continue;
        }

        let rest = content.get(after..)?;
        let first_line = rest.split('\n').next().unwrap_or_default();
        let body_from = if first_line.contains(FENCE) || !rest.contains('\n') {
            0
        } else {
            first_line.len().saturating_add(1)
        };
        let tail = rest.get(body_from..)?;
        let end = tail.find(FENCE)?;
        let body = tail.get(..end)?.trim();
        if !body.is_empty() {
            return Some(body);
        }
        from = after.saturating_add(body_from).saturating_add(end).saturating_add(FENCE.len());
    }
    None
}
