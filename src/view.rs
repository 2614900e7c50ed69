//! Stateful table component.
//!
//! `TableView` owns the stored snapshot together with sort state, filter
//! buffer, marks and selection. Every state change reruns the whole
//! reconciliation pass and regenerates [`DrawnTable`] from scratch.

use std::collections::HashSet;

use ratatui::style::Color;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthStr;

use crate::filter::{FilterQuery, filter};
use crate::model::split_fqn;
use crate::render::{ColorerFn, RowColor, SortBinding, default_colorer};
use crate::sort::{SortColumn, Sorter, compare_numeric};
use crate::table::{Align, RowEvent, RowEventKind, TableData, diff};

/// Pure transform applied to every stored snapshot before filtering.
pub type DecorateFn = fn(TableData) -> TableData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStyles {
    pub fg: Color,
    pub bg: Color,
    pub cursor: Color,
    pub mark: Color,
    pub header_fg: Color,
    pub header_bg: Color,
    pub add: Color,
    pub modify: Color,
    pub delete: Color,
    pub error: Color,
    pub pending: Color,
    pub completed: Color,
}

impl Default for TableStyles {
    fn default() -> Self {
        Self {
            fg: Color::White,
            bg: Color::Rgb(16, 27, 44),
            cursor: Color::Rgb(24, 36, 58),
            mark: Color::Rgb(236, 72, 153),
            header_fg: Color::Rgb(52, 211, 153),
            header_bg: Color::Rgb(16, 27, 44),
            add: Color::Rgb(96, 165, 250),
            modify: Color::Rgb(190, 242, 100),
            delete: Color::Rgb(140, 156, 178),
            error: Color::Rgb(248, 113, 113),
            pending: Color::Rgb(251, 191, 36),
            completed: Color::Rgb(100, 116, 139),
        }
    }
}

impl TableStyles {
    pub fn row_color(&self, color: RowColor) -> Color {
        match color {
            RowColor::Normal => self.fg,
            RowColor::Added => self.add,
            RowColor::Modified => self.modify,
            RowColor::Deleted => self.delete,
            RowColor::Error => self.error,
            RowColor::Pending => self.pending,
            RowColor::Completed => self.completed,
        }
    }
}

/// Filter text buffer driven by `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdBuff {
    text: String,
    active: bool,
}

impl CmdBuff {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn push(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn pop(&mut self) {
        self.text.pop();
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.active = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMark {
    Up,
    Down,
    Changed,
}

impl DeltaMark {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::Changed => "Δ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnCell {
    pub text: String,
    pub align: Align,
    pub color: Color,
    pub dim: bool,
    pub delta: Option<DeltaMark>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnRow {
    pub id: String,
    pub kind: RowEventKind,
    pub marked: bool,
    pub cells: Vec<DrawnCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawnTable {
    pub title: String,
    pub header: Vec<DrawnCell>,
    pub rows: Vec<DrawnRow>,
}

pub struct TableView {
    base_title: String,
    data: TableData,
    visible: TableData,
    sort: SortColumn,
    cmd_buff: CmdBuff,
    marks: HashSet<String>,
    selected: Option<usize>,
    selected_id: Option<String>,
    colorer: ColorerFn,
    decorate: Option<DecorateFn>,
    sort_bindings: &'static [SortBinding],
    styles: TableStyles,
    filter_error: Option<String>,
    drawn: DrawnTable,
}

impl TableView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            base_title: title.into(),
            data: TableData::default(),
            visible: TableData::default(),
            sort: SortColumn::default(),
            cmd_buff: CmdBuff::default(),
            marks: HashSet::new(),
            selected: None,
            selected_id: None,
            colorer: default_colorer,
            decorate: None,
            sort_bindings: &[],
            styles: TableStyles::default(),
            filter_error: None,
            drawn: DrawnTable::default(),
        }
    }

    /// Points the view at another resource kind. Stored rows, marks and the
    /// filter are dropped; `empty` carries the scope and header to show
    /// until the first snapshot lands.
    pub fn reset(
        &mut self,
        title: impl Into<String>,
        empty: TableData,
        colorer: ColorerFn,
        sort_bindings: &'static [SortBinding],
        sort: SortColumn,
    ) {
        self.base_title = title.into();
        self.colorer = colorer;
        self.sort_bindings = sort_bindings;
        self.sort = sort;
        self.data = empty;
        self.visible = TableData::default();
        self.marks.clear();
        self.cmd_buff.reset();
        self.selected = None;
        self.selected_id = None;
        self.filter_error = None;
        self.reconcile();
    }

    pub fn set_decorate_fn(&mut self, decorate: Option<DecorateFn>) {
        self.decorate = decorate;
    }

    pub fn set_styles(&mut self, styles: TableStyles) {
        self.styles = styles;
        self.paint();
    }

    pub fn styles(&self) -> &TableStyles {
        &self.styles
    }

    /// Stores a fresh snapshot and reconciles everything against it.
    /// Marks on ids the snapshot no longer carries are dropped.
    pub fn update(&mut self, data: TableData) {
        self.marks.retain(|id| data.find(id).is_some());
        self.data = diff(&self.data, data);
        self.reconcile();
    }

    fn reconcile(&mut self) {
        let decorated = match self.decorate {
            Some(decorate) => decorate(self.data.clone()),
            None => self.data.clone(),
        };

        let mut visible = if self.cmd_buff.is_empty() {
            self.filter_error = None;
            decorated
        } else {
            match filter(self.cmd_buff.text(), &decorated) {
                Ok(filtered) => {
                    self.filter_error = None;
                    filtered
                }
                Err(error) => {
                    warn!(filter = self.cmd_buff.text(), error = %error, "filter failed");
                    self.filter_error = Some(error.to_string());
                    decorated
                }
            }
        };

        self.sort.adjust(visible.header.len());
        Sorter::new(&visible.header, self.sort.index, self.sort.asc).sort(&mut visible.rows);
        self.visible = visible;

        self.paint();
        self.restore_selection();
        debug!(
            title = %self.drawn.title,
            rows = self.visible.len(),
            "table reconciled"
        );

        // `visible` keeps its Delete rows until the next cycle so the cursor
        // indexes the same rows that are drawn.
        self.data.settle();
    }

    /// Regenerates the drawn cells from the current visible rows.
    fn paint(&mut self) {
        let header = &self.visible.header;
        let scope = &self.visible.scope;

        let mut rows = self
            .visible
            .rows
            .iter()
            .map(|event| self.paint_row(event))
            .collect::<Vec<_>>();

        let mut header_cells = header
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let mut text = column.name.clone();
                if index == self.sort.index {
                    text.push_str(if self.sort.asc { "↑" } else { "↓" });
                }
                DrawnCell {
                    text,
                    align: column.align,
                    color: self.styles.header_fg,
                    dim: false,
                    delta: None,
                }
            })
            .collect::<Vec<_>>();

        let pads = column_pads(&header_cells, &rows);
        pad_cells(&mut header_cells, &pads);
        for row in &mut rows {
            pad_cells(&mut row.cells, &pads);
        }

        self.drawn = DrawnTable {
            title: self.title_for(scope.label()),
            header: header_cells,
            rows,
        };
    }

    fn paint_row(&self, event: &RowEvent) -> DrawnRow {
        let header = &self.visible.header;
        let marked = self.marks.contains(&event.row.id);
        let color = if marked {
            self.styles.mark
        } else {
            self.styles
                .row_color((self.colorer)(&self.visible.scope, event))
        };
        let dim = event.kind == RowEventKind::Delete;

        let cells = event
            .row
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let column = header.get(index);
                let mut text = match column.and_then(|column| column.decorator) {
                    Some(decorator) => decorator(field),
                    None => field.clone(),
                };
                let delta = match (column, event.deltas.get(index)) {
                    (Some(column), Some(previous)) if !column.age => {
                        Some(delta_mark(column.numeric, previous, field))
                    }
                    _ => None,
                };
                if let Some(mark) = delta {
                    text.push_str(mark.symbol());
                }
                DrawnCell {
                    text,
                    align: column.map(|column| column.align).unwrap_or_default(),
                    color,
                    dim,
                    delta,
                }
            })
            .collect();

        DrawnRow {
            id: event.row.id.clone(),
            kind: event.kind,
            marked,
            cells,
        }
    }

    fn title_for(&self, scope: String) -> String {
        let mut title = format!("{}({scope})[{}]", self.base_title, self.live_count());
        if !self.cmd_buff.is_empty() {
            title.push_str(&format!(" </{}>", self.cmd_buff.text()));
        }
        title
    }

    fn restore_selection(&mut self) {
        let by_id = self.selected_id.as_deref().and_then(|id| {
            self.visible
                .rows
                .iter()
                .position(|event| event.row.id == id && event.kind != RowEventKind::Delete)
        });
        self.selected = by_id.or_else(|| self.live_index(0, true));
        self.selected_id = self
            .selected
            .and_then(|index| self.visible.rows.get(index))
            .map(|event| event.row.id.clone());
    }

    pub fn drawn(&self) -> &DrawnTable {
        &self.drawn
    }

    pub fn title(&self) -> &str {
        &self.drawn.title
    }

    /// Authoritative stored snapshot.
    pub fn data(&self) -> &TableData {
        &self.data
    }

    /// Rows as currently displayed, after filtering and sorting.
    #[cfg(test)]
    pub fn filtered(&self) -> &TableData {
        &self.visible
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    /// Namespace and name of the selected row.
    pub fn selected_target(&self) -> Option<(Option<String>, String)> {
        self.selected_item().map(|id| {
            let (namespace, name) = split_fqn(id);
            (namespace.map(str::to_string), name.to_string())
        })
    }

    /// Nearest row at or after `index` (before it when `forward` is false)
    /// that is not a dimmed Delete row, falling back to the other direction.
    fn live_index(&self, index: usize, forward: bool) -> Option<usize> {
        let rows = &self.visible.rows;
        if rows.is_empty() {
            return None;
        }
        let index = index.min(rows.len() - 1);
        let live = |i: &usize| rows[*i].kind != RowEventKind::Delete;
        let after = || (index..rows.len()).find(live);
        let before = || (0..=index).rev().find(live);
        if forward {
            after().or_else(before)
        } else {
            before().or_else(after)
        }
    }

    fn select_toward(&mut self, index: usize, forward: bool) {
        self.selected = self.live_index(index, forward);
        self.selected_id = self
            .selected
            .and_then(|index| self.visible.rows.get(index))
            .map(|event| event.row.id.clone());
    }

    pub fn select(&mut self, index: usize) {
        self.select_toward(index, true);
    }

    pub fn select_next(&mut self, step: usize) {
        let index = self.selected.map_or(0, |index| index.saturating_add(step));
        self.select_toward(index, true);
    }

    pub fn select_previous(&mut self, step: usize) {
        let index = self.selected.map_or(0, |index| index.saturating_sub(step));
        self.select_toward(index, false);
    }

    pub fn select_first(&mut self) {
        self.select_toward(0, true);
    }

    pub fn select_last(&mut self) {
        self.select_toward(self.visible.len().saturating_sub(1), false);
    }

    /// Drawn rows, including any dimmed Delete rows of the last cycle.
    pub fn row_count(&self) -> usize {
        self.visible.len()
    }

    /// Displayed rows that still exist in the cluster.
    pub fn live_count(&self) -> usize {
        self.visible
            .rows
            .iter()
            .filter(|event| event.kind != RowEventKind::Delete)
            .count()
    }

    pub fn sort_column(&self) -> SortColumn {
        self.sort
    }

    pub fn sort_bindings(&self) -> &'static [SortBinding] {
        self.sort_bindings
    }

    /// Sorts by `offset` from the NAME column; `-1` is the last column and
    /// `-2` the namespace column. Picking the current column flips direction.
    pub fn sort_col_cmd(&mut self, offset: isize, asc: bool) -> bool {
        let header = &self.visible.header;
        let index = match offset {
            -2 if header.has_namespace() => 0,
            -2 => return false,
            -1 => header.len().saturating_sub(1),
            offset if offset >= 0 => header.name_col() + offset as usize,
            _ => return false,
        };
        if index >= header.len() {
            return false;
        }

        if self.sort.index == index {
            self.sort.asc = !self.sort.asc;
        } else {
            self.sort.index = index;
            self.sort.asc = asc;
        }
        self.reconcile();
        true
    }

    pub fn sort_invert_cmd(&mut self) {
        self.sort.asc = !self.sort.asc;
        self.reconcile();
    }

    /// Applies the kind-specific shortcut bound to `key`, if any.
    pub fn sort_by_key(&mut self, key: char) -> bool {
        let Some(binding) = self
            .sort_bindings
            .iter()
            .find(|binding| binding.key == key)
            .copied()
        else {
            return false;
        };
        self.sort_col_cmd(binding.offset, true)
    }

    pub fn cmd_buff(&self) -> &CmdBuff {
        &self.cmd_buff
    }

    pub fn filter_error(&self) -> Option<&str> {
        self.filter_error.as_deref()
    }

    pub fn activate_filter(&mut self) {
        self.cmd_buff.set_active(true);
    }

    pub fn filter_push(&mut self, c: char) {
        self.cmd_buff.push(c);
        self.reconcile();
    }

    pub fn filter_pop(&mut self) {
        self.cmd_buff.pop();
        self.reconcile();
    }

    /// Replaces the buffer without activating it, e.g. for drill-downs.
    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.cmd_buff.set(text);
        self.cmd_buff.set_active(false);
        self.reconcile();
    }

    /// Ends editing. An invalid query is dropped; its error is returned.
    pub fn commit_filter(&mut self) -> Option<String> {
        self.cmd_buff.set_active(false);
        let error = FilterQuery::parse(self.cmd_buff.text())
            .err()
            .map(|error| error.to_string());
        if error.is_some() {
            self.cmd_buff.reset();
            self.reconcile();
        }
        error
    }

    pub fn clear_filter(&mut self) {
        self.cmd_buff.reset();
        self.reconcile();
    }

    pub fn is_marked(&self, id: &str) -> bool {
        self.marks.contains(id)
    }

    pub fn marked_ids(&self) -> Vec<String> {
        let mut ids = self.marks.iter().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn has_marks(&self) -> bool {
        !self.marks.is_empty()
    }

    /// Toggles the mark on the selected row and moves the cursor down.
    pub fn toggle_mark(&mut self) {
        let Some(id) = self.selected_id.clone() else {
            return;
        };
        if !self.marks.remove(&id) {
            self.marks.insert(id);
        }
        self.paint();
        self.select_next(1);
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear();
        self.paint();
    }
}

fn delta_mark(numeric: bool, previous: &str, current: &str) -> DeltaMark {
    if !numeric {
        return DeltaMark::Changed;
    }
    match compare_numeric(current, previous) {
        std::cmp::Ordering::Greater => DeltaMark::Up,
        std::cmp::Ordering::Less => DeltaMark::Down,
        std::cmp::Ordering::Equal => DeltaMark::Changed,
    }
}

fn column_pads(header: &[DrawnCell], rows: &[DrawnRow]) -> Vec<usize> {
    let mut pads = header
        .iter()
        .map(|cell| cell.text.width())
        .collect::<Vec<_>>();
    for row in rows {
        for (index, cell) in row.cells.iter().enumerate() {
            if let Some(width) = pads.get_mut(index) {
                *width = (*width).max(cell.text.width());
            }
        }
    }
    pads
}

fn pad_cells(cells: &mut [DrawnCell], pads: &[usize]) {
    for (cell, width) in cells.iter_mut().zip(pads) {
        let fill = width.saturating_sub(cell.text.width());
        cell.text = match cell.align {
            Align::Left => format!("{}{}", cell.text, " ".repeat(fill)),
            Align::Right => format!("{}{}", " ".repeat(fill), cell.text),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::{DeltaMark, TableView};
    use crate::model::NamespaceScope;
    use crate::table::tests::{ready_header, row, table};
    use crate::table::{Header, HeaderRow, RowEventKind, TableData};

    fn drawn_row<'a>(view: &'a TableView, id: &str) -> Option<&'a super::DrawnRow> {
        view.drawn().rows.iter().find(|row| row.id == id)
    }

    fn two_rows(b_ready: &str) -> TableData {
        table(vec![
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/b", &["b", b_ready, "2m"]),
        ])
    }

    fn all_scope(rows: &[(&str, &str, &str)]) -> TableData {
        let mut header = vec![Header::new("NAMESPACE")];
        header.extend(ready_header().0);
        let mut data = TableData::new(NamespaceScope::All, HeaderRow(header));
        for (namespace, name, ready) in rows {
            data.push(row(
                &format!("{namespace}/{name}"),
                &[namespace, name, ready, "1m"],
            ))
            .expect("arity");
        }
        data
    }

    #[test]
    fn drawn_rows_match_header_arity() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        let width = view.drawn().header.len();
        assert_eq!(width, 3);
        assert!(view.drawn().rows.iter().all(|row| row.cells.len() == width));
        assert!(
            view.filtered()
                .rows
                .iter()
                .all(|event| event.row.fields.len() == view.filtered().header.len())
        );
    }

    #[test]
    fn changed_field_is_flagged_for_exactly_one_cycle() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        view.update(two_rows("1/1"));

        let b = drawn_row(&view, "ns/b").expect("row b drawn");
        assert_eq!(b.kind, RowEventKind::Update);
        assert_eq!(b.cells[1].delta, Some(DeltaMark::Up));
        assert!(b.cells[1].text.contains('↑'));
        assert!(b.cells.iter().enumerate().all(|(i, cell)| i == 1 || cell.delta.is_none()));

        let a = drawn_row(&view, "ns/a").expect("row a drawn");
        assert_eq!(a.kind, RowEventKind::Unchanged);

        view.sort_invert_cmd();
        let b = drawn_row(&view, "ns/b").expect("row b drawn");
        assert!(b.cells.iter().all(|cell| cell.delta.is_none()));
    }

    #[test]
    fn vanished_row_is_drawn_dimmed_once_then_dropped() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        view.update(table(vec![row("ns/a", &["a", "1/1", "5m"])]));

        let gone = drawn_row(&view, "ns/b").expect("deleted row still drawn");
        assert_eq!(gone.kind, RowEventKind::Delete);
        assert!(gone.cells.iter().all(|cell| cell.dim));
        assert!(view.data().find("ns/b").is_none());

        view.update(table(vec![row("ns/a", &["a", "1/1", "5m"])]));
        assert!(drawn_row(&view, "ns/b").is_none());
        assert!(
            view.filtered()
                .rows
                .iter()
                .all(|event| event.row.id != "ns/b")
        );
    }

    fn three_rows() -> TableData {
        table(vec![
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/b", &["b", "1/1", "4m"]),
            row("ns/c", &["c", "1/1", "3m"]),
        ])
    }

    fn highlighted(view: &TableView) -> Option<&str> {
        view.selected_index()
            .and_then(|index| view.drawn().rows.get(index))
            .map(|row| row.id.as_str())
    }

    #[test]
    fn cursor_skips_dimmed_rows_and_matches_the_drawn_row() {
        let mut view = TableView::new("Pods");
        view.update(three_rows());
        view.select(2);
        assert_eq!(view.selected_item(), Some("ns/c"));

        view.update(table(vec![
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/c", &["c", "1/1", "3m"]),
        ]));
        assert_eq!(view.title(), "Pods(ns)[2]");
        assert_eq!(view.row_count(), 3);
        assert_eq!(highlighted(&view), Some("ns/c"));

        view.select_previous(1);
        assert_eq!(view.selected_item(), Some("ns/a"));
        assert_eq!(highlighted(&view), view.selected_item());

        view.select_next(1);
        assert_eq!(view.selected_item(), Some("ns/c"));
        assert_eq!(highlighted(&view), view.selected_item());

        view.select(1);
        assert_eq!(view.selected_item(), Some("ns/c"));
        view.select_first();
        assert_eq!(highlighted(&view), Some("ns/a"));

        view.update(table(vec![
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/c", &["c", "1/1", "3m"]),
        ]));
        assert_eq!(view.row_count(), 2);
        assert_eq!(highlighted(&view), Some("ns/a"));
    }

    #[test]
    fn only_deleted_rows_leave_nothing_selected() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("1/1"));
        view.update(table(Vec::new()));
        assert_eq!(view.row_count(), 2);
        assert_eq!(view.selected_item(), None);
        view.select_last();
        assert_eq!(view.selected_index(), None);
        assert_eq!(view.title(), "Pods(ns)[0]");
    }

    #[test]
    fn marks_on_vanished_ids_are_dropped() {
        let mut view = TableView::new("Pods");
        view.update(three_rows());
        view.select(0);
        view.toggle_mark();
        view.toggle_mark();
        assert_eq!(view.marked_ids(), vec!["ns/a", "ns/b"]);

        view.update(table(vec![
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/c", &["c", "1/1", "3m"]),
        ]));
        assert_eq!(view.marked_ids(), vec!["ns/a"]);
        assert!(drawn_row(&view, "ns/b").is_some_and(|row| !row.marked));
    }

    #[test]
    fn marks_survive_snapshot_replacement() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        view.select(1);
        assert_eq!(view.selected_item(), Some("ns/b"));
        view.toggle_mark();
        assert!(view.is_marked("ns/b"));
        assert!(drawn_row(&view, "ns/b").is_some_and(|row| row.marked));

        view.update(two_rows("1/1"));
        assert!(view.is_marked("ns/b"));
        let b = drawn_row(&view, "ns/b").expect("row b drawn");
        assert!(b.marked);
        assert_eq!(b.cells[0].color, view.styles().mark);

        view.clear_marks();
        assert!(!view.has_marks());
    }

    #[test]
    fn sort_column_follows_namespace_column() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        assert_eq!(view.sort_column().index, 0);
        assert_eq!(view.sort_column().col_count, 3);

        view.update(all_scope(&[("ns", "a", "1/1"), ("ns", "b", "0/1")]));
        assert_eq!(view.sort_column().index, 1);
        assert!(view.drawn().header[1].text.starts_with("NAME↑"));
    }

    #[test]
    fn sort_col_cmd_toggles_and_resolves_special_columns() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));

        assert!(!view.sort_col_cmd(-2, true));
        assert!(view.sort_col_cmd(1, true));
        assert_eq!(view.sort_column().index, 1);
        assert!(view.sort_column().asc);
        assert_eq!(view.drawn().rows[0].id, "ns/b");

        assert!(view.sort_col_cmd(1, true));
        assert!(!view.sort_column().asc);
        assert_eq!(view.drawn().rows[0].id, "ns/a");

        assert!(view.sort_col_cmd(-1, true));
        assert_eq!(view.sort_column().index, 2);
        assert!(!view.sort_col_cmd(7, true));
    }

    #[test]
    fn filter_keystrokes_narrow_rows_and_update_title() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        view.activate_filter();
        view.filter_push('a');

        assert_eq!(view.row_count(), 1);
        assert_eq!(view.selected_item(), Some("ns/a"));
        assert_eq!(view.title(), "Pods(ns)[1] </a>");

        view.clear_filter();
        assert_eq!(view.title(), "Pods(ns)[2]");
    }

    #[test]
    fn invalid_filter_shows_unfiltered_rows_and_is_dropped_on_commit() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        view.activate_filter();
        view.filter_push('a');
        view.filter_push('(');

        assert_eq!(view.row_count(), 2);
        assert!(view.filter_error().is_some());
        assert_eq!(view.cmd_buff().text(), "a(");

        let error = view.commit_filter();
        assert!(error.is_some());
        assert!(view.cmd_buff().is_empty());
        assert!(!view.cmd_buff().is_active());
        assert!(view.filter_error().is_none());
    }

    #[test]
    fn selection_follows_row_identity() {
        let mut view = TableView::new("Pods");
        view.update(two_rows("0/1"));
        view.select(1);
        assert_eq!(view.selected_target(), Some((Some("ns".to_string()), "b".to_string())));

        view.update(table(vec![
            row("ns/0", &["0", "1/1", "1m"]),
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/b", &["b", "0/1", "2m"]),
        ]));
        assert_eq!(view.selected_item(), Some("ns/b"));
        assert_eq!(view.selected_index(), Some(2));

        view.update(table(vec![row("ns/a", &["a", "1/1", "5m"])]));
        assert_eq!(view.selected_item(), Some("ns/a"));
        assert_eq!(view.selected_index(), Some(1));
    }

    #[test]
    fn decorate_hook_runs_before_filtering() {
        fn shout(mut data: TableData) -> TableData {
            for event in &mut data.rows {
                event.row.fields[0] = event.row.fields[0].to_uppercase();
            }
            data
        }

        let mut view = TableView::new("Pods");
        view.set_decorate_fn(Some(shout));
        view.update(two_rows("0/1"));
        assert!(view.drawn().rows[0].cells[0].text.starts_with('A'));
        assert_eq!(view.data().rows[0].row.fields[0], "a");
    }

    #[test]
    fn cells_are_padded_to_column_width() {
        let mut view = TableView::new("Pods");
        view.update(table(vec![
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/long", &["longer-name", "10/10", "2m"]),
        ]));
        let drawn = view.drawn();
        let widths = drawn
            .rows
            .iter()
            .map(|row| row.cells[0].text.chars().count())
            .collect::<Vec<_>>();
        assert_eq!(widths, vec![11, 11]);
        assert!(drawn.rows[0].cells[1].text.starts_with(' '));
    }
}
