//! Fixed-width table output for job reports.
//!
//! The jobs print their run reports to stdout for cron mail and operator
//! terminals; this keeps the formatting in one place.

/// Prints a fixed-width table with a header row and separator.
///
/// ## Example
/// ```text
/// STORE      COMMISSIONS  TOTAL
/// ---------  -----------  ------
/// store-a    3            45.00
/// store-b    1            8.00
/// ```
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() && cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let header_line = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header_line.trim_end());

    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{separator}");

    for row in rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // print_table writes to stdout; the test just exercises width handling
    // for rows wider than their header.
    #[test]
    fn test_print_table_does_not_panic() {
        print_table(
            &["STORE", "TOTAL"],
            &[
                vec!["store-with-a-long-id".to_string(), "45.00".to_string()],
                vec!["s".to_string(), "8.00".to_string()],
            ],
        );
        print_table(&["EMPTY"], &[]);
    }
}
