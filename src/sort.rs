use std::cmp::Ordering;

use crate::table::{HeaderRow, RowEvent};

/// Column the table is ordered by, remembered across snapshot replacement.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SortColumn {
    pub index: usize,
    pub col_count: usize,
    pub asc: bool,
}

impl Default for SortColumn {
    fn default() -> Self {
        Self {
            index: 0,
            col_count: 0,
            asc: true,
        }
    }
}

impl SortColumn {
    pub fn new(index: usize, asc: bool) -> Self {
        Self {
            index,
            col_count: 0,
            asc,
        }
    }

    /// Keeps the index pointing at the same logical column when the header
    /// grows or shrinks (namespace column appearing or disappearing).
    pub fn adjust(&mut self, col_count: usize) {
        if self.col_count != 0 && col_count != self.col_count {
            let shifted = self.index as isize + col_count as isize - self.col_count as isize;
            self.index = shifted.max(0) as usize;
        }
        self.col_count = col_count;
        if col_count > 0 && self.index >= col_count {
            self.index = col_count - 1;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sorter<'a> {
    header: &'a HeaderRow,
    column: usize,
    ascending: bool,
}

impl<'a> Sorter<'a> {
    pub fn new(header: &'a HeaderRow, column: usize, ascending: bool) -> Self {
        Self {
            header,
            column,
            ascending,
        }
    }

    /// Stable in-place sort. Descending order reverses the comparison, so
    /// equal keys keep their input order either way.
    pub fn sort(&self, rows: &mut [RowEvent]) {
        if rows.len() < 2 || self.column >= self.header.len() {
            return;
        }

        let numeric = self.header.is_numeric_col(self.column);
        let age = self.header.is_age_col(self.column);

        rows.sort_by(|left, right| {
            let lhs = field(left, self.column);
            let rhs = field(right, self.column);
            let ordering = if age {
                compare_age(lhs, rhs)
            } else if numeric {
                compare_numeric(lhs, rhs)
            } else {
                lhs.cmp(rhs)
            };
            if self.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }

    #[cfg(test)]
    fn sorted(&self, rows: &[RowEvent]) -> Vec<RowEvent> {
        let mut out = rows.to_vec();
        self.sort(&mut out);
        out
    }
}

fn field(event: &RowEvent, index: usize) -> &str {
    event.row.fields.get(index).map(String::as_str).unwrap_or("")
}

fn digit_runs(value: &str) -> Vec<u64> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(|run| run.parse::<u64>().unwrap_or(u64::MAX))
        .collect()
}

/// Compares digit runs as numbers so "2/5" orders before "10/10".
/// Values without digits order before those with digits.
pub fn compare_numeric(left: &str, right: &str) -> Ordering {
    let lhs = digit_runs(left);
    let rhs = digit_runs(right);
    match (lhs.is_empty(), rhs.is_empty()) {
        (true, true) => left.cmp(right),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => lhs.cmp(&rhs).then_with(|| left.cmp(right)),
    }
}

/// Parses compact durations such as `5m`, `2d3h` or `45s` into seconds.
pub fn parse_age(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            'y' => 31_536_000,
            _ => return None,
        };
        let amount = digits.parse::<u64>().ok()?;
        total = total.saturating_add(amount.saturating_mul(unit));
        digits.clear();
    }

    digits.is_empty().then_some(total)
}

fn compare_age(left: &str, right: &str) -> Ordering {
    match (parse_age(left), parse_age(right)) {
        (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

#[cfg(test)]
mod tests {
    use super::{SortColumn, Sorter, compare_numeric, parse_age};
    use crate::table::tests::{ready_header, row, table};
    use std::cmp::Ordering;

    fn names(rows: &[crate::table::RowEvent]) -> Vec<&str> {
        rows.iter().map(|event| event.row.fields[0].as_str()).collect()
    }

    #[test]
    fn numeric_column_orders_by_value_not_text() {
        let data = table(vec![
            row("ns/a", &["a", "1/3", "1m"]),
            row("ns/b", &["b", "10/10", "1m"]),
            row("ns/c", &["c", "2/5", "1m"]),
        ]);
        let sorted = Sorter::new(&data.header, 1, true).sorted(&data.rows);
        let ready = sorted
            .iter()
            .map(|event| event.row.fields[1].as_str())
            .collect::<Vec<_>>();
        assert_eq!(ready, vec!["1/3", "2/5", "10/10"]);
    }

    #[test]
    fn equal_keys_keep_input_order_in_both_directions() {
        let data = table(vec![
            row("ns/b", &["b", "1/1", "1m"]),
            row("ns/a", &["a", "1/1", "1m"]),
            row("ns/c", &["c", "0/1", "1m"]),
        ]);
        let asc = Sorter::new(&data.header, 1, true).sorted(&data.rows);
        assert_eq!(names(&asc), vec!["c", "b", "a"]);

        let desc = Sorter::new(&data.header, 1, false).sorted(&data.rows);
        assert_eq!(names(&desc), vec!["b", "a", "c"]);
    }

    #[test]
    fn sorting_leaves_the_source_rows_alone() {
        let data = table(vec![
            row("ns/b", &["b", "1/1", "1m"]),
            row("ns/a", &["a", "1/1", "1m"]),
        ]);
        let _ = Sorter::new(&data.header, 0, true).sorted(&data.rows);
        assert_eq!(names(&data.rows), vec!["b", "a"]);
    }

    #[test]
    fn empty_and_singleton_inputs_are_untouched() {
        let header = ready_header();
        let mut empty = Vec::new();
        Sorter::new(&header, 0, false).sort(&mut empty);
        assert!(empty.is_empty());

        let data = table(vec![row("ns/a", &["a", "1/1", "1m"])]);
        let sorted = Sorter::new(&header, 0, false).sorted(&data.rows);
        assert_eq!(sorted, data.rows);
    }

    #[test]
    fn age_column_orders_by_duration() {
        let data = table(vec![
            row("ns/a", &["a", "1/1", "2h"]),
            row("ns/b", &["b", "1/1", "45s"]),
            row("ns/c", &["c", "1/1", "3d"]),
            row("ns/d", &["d", "1/1", "5m"]),
        ]);
        let sorted = Sorter::new(&data.header, 2, true).sorted(&data.rows);
        assert_eq!(names(&sorted), vec!["b", "d", "a", "c"]);
        assert_eq!(parse_age("2d3h"), Some(2 * 86_400 + 3 * 3_600));
        assert_eq!(parse_age("-"), None);
    }

    #[test]
    fn numeric_compare_puts_missing_values_first() {
        assert_eq!(compare_numeric("-", "0"), Ordering::Less);
        assert_eq!(compare_numeric("3", "3"), Ordering::Equal);
    }

    #[test]
    fn sort_column_shifts_when_namespace_column_appears() {
        let mut sort = SortColumn {
            index: 0,
            col_count: 3,
            asc: true,
        };
        sort.adjust(4);
        assert_eq!(sort.index, 1);
        assert_eq!(sort.col_count, 4);

        sort.adjust(3);
        assert_eq!(sort.index, 0);
        sort.adjust(2);
        assert_eq!(sort.index, 0);
    }

    #[test]
    fn first_adjust_only_records_the_column_count() {
        let mut sort = SortColumn::new(2, true);
        sort.adjust(7);
        assert_eq!(sort.index, 2);
        assert_eq!(sort.col_count, 7);
    }
}
