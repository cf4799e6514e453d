//! Delimited-text output for reports.
//!
//! Most reports replace the delimiter and newlines inside a field with a
//! space. [`CsvStyle::Quote`] keeps the field intact and wraps it in double
//! quotes instead.

pub const DELIMITER: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvStyle {
    #[default]
    Sanitize,
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CsvWriter {
    style: CsvStyle,
}

impl CsvWriter {
    pub const fn new(style: CsvStyle) -> Self {
        Self { style }
    }

    pub const fn style(&self) -> CsvStyle {
        self.style
    }

    pub fn header_line(&self, headers: &[&str]) -> String {
        let mut line = headers.join(",");
        line.push('\n');
        line
    }

    pub fn line<S: AsRef<str>>(&self, fields: &[S]) -> String {
        let mut line = String::new();
        for (index, field) in fields.iter().enumerate() {
            if index > 0 {
                line.push(DELIMITER);
            }
            match self.style {
                CsvStyle::Sanitize => line.push_str(&sanitize(field.as_ref())),
                CsvStyle::Quote => line.push_str(&quote(field.as_ref())),
            }
        }
        line.push('\n');
        line
    }
}

pub fn sanitize(field: &str) -> String {
    field.replace([DELIMITER, '\n'], " ")
}

pub fn quote(field: &str) -> String {
    if !field.contains([DELIMITER, '\n', '"']) {
        return field.to_string();
    }
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_delimiters_and_newlines() {
        let writer = CsvWriter::default();
        assert_eq!(
            writer.line(&["a,b", "line1\nline2", "plain"]),
            "a b,line1 line2,plain\n"
        );
        assert_eq!(writer.header_line(&["Name", "Count"]), "Name,Count\n");
    }

    #[test]
    fn quote_wraps_only_offending_fields() {
        let writer = CsvWriter::new(CsvStyle::Quote);
        assert_eq!(
            writer.line(&["x,y", "say \"hi\"", "ok", "two\nlines"]),
            "\"x,y\",\"say \"\"hi\"\"\",ok,\"two\nlines\"\n"
        );
    }

    #[test]
    fn empty_fields_keep_their_slot() {
        let writer = CsvWriter::default();
        assert_eq!(writer.line(&["", "b", ""]), ",b,\n");
    }
}
