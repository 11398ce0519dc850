use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", render_table(headers, &rows));
}

/// Left-aligned columns separated by two spaces, a dashed rule under the
/// header, no trailing whitespace. Cells beyond the header count are dropped.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let width = |s: &str| s.chars().count();
    let mut widths: Vec<usize> = headers.iter().map(|h| width(*h)).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(width(cell.as_str()));
        }
    }

    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let mut out = pad_line(headers.iter().copied(), &widths);
    out += &pad_line(rule.iter().map(String::as_str), &widths);
    for row in rows {
        out += &pad_line(row.iter().map(String::as_str), &widths);
    }
    out
}

fn pad_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect();
    let mut line = padded.join("  ").trim_end().to_string();
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let rows = vec![
            vec!["k1".to_string(), "active".to_string(), String::new()],
            vec!["release-2026".to_string(), "grace".to_string(), "1800000000000".to_string()],
        ];
        let table = render_table(&["KEY_ID", "STATE", "GRACE_UNTIL_MS"], &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "KEY_ID        STATE   GRACE_UNTIL_MS");
        assert_eq!(lines[1], "------------  ------  --------------");
        assert_eq!(lines[2], "k1            active");
        assert_eq!(lines[3], "release-2026  grace   1800000000000");
    }

    #[test]
    fn header_only_table() {
        assert_eq!(render_table(&["A", "BB"], &[]), "A  BB\n-  --\n");
    }
}
