use cardops_recon::Table;
use unicode_width::UnicodeWidthStr;

/// Widest column rendered in a terminal table.
const MAX_COL_WIDTH: usize = 40;

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `width` display columns, adding ".." if truncated.
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    if width < 3 {
        return s
            .chars()
            .find(|ch| unicode_width::UnicodeWidthChar::width(*ch).unwrap_or(0) <= width)
            .map(String::from)
            .unwrap_or_default();
    }

    // Stop at width - 2 to leave room for ".."
    let budget = width - 2;
    let mut used = 0;
    let mut end_byte = 0;
    for (i, ch) in s.char_indices() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            end_byte = i;
            break;
        }
        used += cw;
        end_byte = i + ch.len_utf8();
    }
    format!("{}..", &s[..end_byte])
}

/// Pad or truncate a string to exactly `width` display columns.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let sw = display_width(s);
    if sw > width {
        truncate_display(s, width)
    } else {
        format!("{}{}", s, " ".repeat(width - sw))
    }
}

/// Aligned plain-text rendering: header, dashes, then at most `limit` rows.
/// Nulls print as empty cells.
pub(crate) fn render_table(table: &Table, limit: usize) -> String {
    let shown = &table.rows[..table.rows.len().min(limit)];
    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(c, name)| {
            shown
                .iter()
                .filter_map(|row| row.get(c).and_then(|v| v.as_deref()))
                .map(display_width)
                .chain(std::iter::once(display_width(name)))
                .max()
                .unwrap_or(0)
                .min(MAX_COL_WIDTH)
        })
        .collect();

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells.iter().zip(&widths).map(|(s, w)| pad_right(s, *w)).collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&line(table.columns.iter().map(String::as_str).collect()));
    out.push('\n');
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(dashes.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in shown {
        out.push_str(&line(row.iter().map(|v| v.as_deref().unwrap_or("")).collect()));
        out.push('\n');
    }
    if table.len() > shown.len() {
        out.push_str(&format!("... {} more rows\n", table.len() - shown.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_width_cjk() {
        assert_eq!(display_width("hello"), 5);
        assert_eq!(display_width("你好"), 4);
    }

    #[test]
    fn truncate_cuts() {
        assert_eq!(truncate_display("hello world", 7), "hello..");
        assert_eq!(truncate_display("hi", 5), "hi");
        assert_eq!(truncate_display("hello", 1), "h");
    }

    #[test]
    fn pad_right_short_and_long() {
        assert_eq!(pad_right("ab", 4), "ab  ");
        assert_eq!(pad_right("abcdef", 5), "abc..");
    }

    #[test]
    fn renders_aligned_rows_and_overflow() {
        let table = Table::from_rows(
            vec!["Metric".into(), "Value".into()],
            vec![
                vec![Some("Total Records".into()), Some("7".into())],
                vec![Some("Missing".into()), None],
                vec![Some("Extra".into()), Some("1".into())],
            ],
        );
        let text = render_table(&table, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Metric         Value");
        assert_eq!(lines[1], "-------------  -----");
        assert_eq!(lines[2], "Total Records  7");
        assert_eq!(lines[3], "Missing");
        assert_eq!(lines[4], "... 1 more rows");
    }
}
