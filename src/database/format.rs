//! Result rendering
//!
//! Query results go back to the model as text. Rows are rendered the way a
//! Python DB-API cursor prints them (`[(1, 'AC/DC'), (2, 'Accept')]`), which
//! is the shape chat models have seen most often for tool output.

/// A single decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    /// Binary payload, rendered by size only
    Bytes(usize),
}

impl CellValue {
    /// Literal form used inside tuples
    pub fn repr(&self) -> String {
        match self {
            CellValue::Null => "None".to_string(),
            CellValue::Int(v) => v.to_string(),
            CellValue::Float(v) => format_float(*v),
            CellValue::Text(s) => quote_text(s),
            CellValue::Bool(true) => "True".to_string(),
            CellValue::Bool(false) => "False".to_string(),
            CellValue::Bytes(len) => format!("<{} bytes>", len),
        }
    }

    /// Unquoted form used for schema metadata and sample rows
    pub fn plain(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            other => other.repr(),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

fn quote_text(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\n', "\\n");
    if escaped.contains('\'') && !escaped.contains('"') {
        format!("\"{}\"", escaped)
    } else {
        format!("'{}'", escaped.replace('\'', "\\'"))
    }
}

/// Render one row as a tuple
pub fn render_row(row: &[CellValue]) -> String {
    let cells: Vec<String> = row.iter().map(CellValue::repr).collect();
    if cells.len() == 1 {
        format!("({},)", cells[0])
    } else {
        format!("({})", cells.join(", "))
    }
}

/// Render a result set; no rows renders as an empty string
pub fn render_rows(rows: &[Vec<CellValue>]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = rows.iter().map(|r| render_row(r)).collect();
    format!("[{}]", rendered.join(", "))
}

/// Render sample rows as a tab-separated block with a header line
pub fn render_sample(columns: &[String], rows: &[Vec<CellValue>]) -> String {
    let mut out = columns.join("\t");
    for row in rows {
        out.push('\n');
        let cells: Vec<String> = row.iter().map(CellValue::plain).collect();
        out.push_str(&cells.join("\t"));
    }
    out
}
