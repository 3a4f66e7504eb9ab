/// Minimal CSV field handling for two-column manifests
///
/// Quoting follows the usual spreadsheet dialect: a field is wrapped in
/// double quotes when it contains a comma, a quote or a line break, and
/// embedded quotes are doubled.

/// Split one manifest line into fields
pub fn split_row(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    // Set after a closing quote: only a comma may follow
    let mut closed = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => {
                    in_quotes = false;
                    closed = true;
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut field));
                closed = false;
            }
            '"' if field.is_empty() && !closed => in_quotes = true,
            _ if closed => return Err(format!("unexpected character {:?} after closing quote", c)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

/// Quote a field if it needs it
pub fn encode_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render one row, newline included
pub fn encode_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| encode_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}
