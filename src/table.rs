//! Resource-agnostic tabular snapshot model.
//!
//! A [`TableData`] is one complete table for a resource kind at a point in
//! time. Snapshots are replaced wholesale; [`diff`] derives the per-row event
//! kind and per-field deltas by comparing two whole snapshots on row identity.

use std::collections::{BTreeMap, HashMap};

use crate::model::NamespaceScope;

pub const NAMESPACE_COLUMN: &str = "NAMESPACE";
pub const NAME_COLUMN: &str = "NAME";
pub const MISSING_VALUE: &str = "-";

/// Pure display transform applied to a column's cells.
pub type Decorator = fn(&str) -> String;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct Header {
    pub name: String,
    pub align: Align,
    pub numeric: bool,
    pub age: bool,
    pub decorator: Option<Decorator>,
}

impl Header {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            align: Align::Left,
            numeric: false,
            age: false,
            decorator: None,
        }
    }

    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self.align = Align::Right;
        self
    }

    pub fn age(mut self) -> Self {
        self.age = true;
        self
    }

    pub fn decorated(mut self, decorator: Decorator) -> Self {
        self.decorator = Some(decorator);
        self
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.align == other.align
            && self.numeric == other.numeric
            && self.age == other.age
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderRow(pub Vec<Header>);

impl HeaderRow {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Header> {
        self.0.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0
            .iter()
            .position(|header| header.name.eq_ignore_ascii_case(name))
    }

    pub fn has_namespace(&self) -> bool {
        self.0
            .first()
            .is_some_and(|header| header.name == NAMESPACE_COLUMN)
    }

    /// Index of the NAME column; shifted by one when a namespace column leads.
    pub fn name_col(&self) -> usize {
        self.index_of(NAME_COLUMN)
            .unwrap_or(usize::from(self.has_namespace()))
    }

    pub fn is_age_col(&self, index: usize) -> bool {
        self.0.get(index).is_some_and(|header| header.age)
    }

    pub fn is_numeric_col(&self, index: usize) -> bool {
        self.0.get(index).is_some_and(|header| header.numeric)
    }
}

impl FromIterator<Header> for HeaderRow {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub fields: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl Row {
    pub fn new(id: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            id: id.into(),
            fields,
            labels: BTreeMap::new(),
        }
    }
}

/// Previous value per field, kept only until the change has been drawn once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deltas(pub Vec<Option<String>>);

impl Deltas {
    pub fn blank(arity: usize) -> Self {
        Self(vec![None; arity])
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|delta| delta.as_deref())
    }

    pub fn changed_columns(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(index, delta)| delta.as_ref().map(|_| index))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RowEventKind {
    Add,
    Update,
    Unchanged,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowEvent {
    pub row: Row,
    pub kind: RowEventKind,
    pub deltas: Deltas,
}

impl RowEvent {
    pub fn added(row: Row) -> Self {
        let arity = row.fields.len();
        Self {
            row,
            kind: RowEventKind::Add,
            deltas: Deltas::blank(arity),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub scope: NamespaceScope,
    pub header: HeaderRow,
    pub rows: Vec<RowEvent>,
}

impl Default for TableData {
    fn default() -> Self {
        Self::new(NamespaceScope::All, HeaderRow::default())
    }
}

impl TableData {
    pub fn new(scope: NamespaceScope, header: HeaderRow) -> Self {
        Self {
            scope,
            header,
            rows: Vec::new(),
        }
    }

    /// Same scope and header, no rows.
    pub fn empty_like(&self) -> Self {
        Self::new(self.scope.clone(), self.header.clone())
    }

    /// Appends a freshly rendered row. Rows whose arity disagrees with the
    /// header are rejected and handed back to the caller.
    pub fn push(&mut self, row: Row) -> Result<(), Row> {
        if row.fields.len() != self.header.len() {
            return Err(row);
        }
        self.rows.push(RowEvent::added(row));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&RowEvent> {
        self.rows.iter().find(|event| event.row.id == id)
    }

    /// Drops the transient decorations of the last diff: deleted rows go away
    /// and deltas are cleared.
    pub fn settle(&mut self) {
        self.rows
            .retain(|event| event.kind != RowEventKind::Delete);
        for event in &mut self.rows {
            if !event.deltas.is_blank() {
                event.deltas = Deltas::blank(event.row.fields.len());
            }
        }
    }
}

/// Reconciles `next` against `previous` on row identity.
///
/// Age columns are ignored when deciding whether a row changed. Rows that
/// vanished are appended with [`RowEventKind::Delete`] when the header shape
/// is unchanged; when the header changed (scope switch) rows cannot be
/// compared field by field and persist as unchanged.
pub fn diff(previous: &TableData, mut next: TableData) -> TableData {
    let same_shape = previous.header == next.header;
    let known = previous
        .rows
        .iter()
        .filter(|event| event.kind != RowEventKind::Delete)
        .map(|event| (event.row.id.as_str(), &event.row))
        .collect::<HashMap<_, _>>();

    for event in &mut next.rows {
        let arity = event.row.fields.len();
        let Some(before) = known.get(event.row.id.as_str()) else {
            event.kind = RowEventKind::Add;
            event.deltas = Deltas::blank(arity);
            continue;
        };

        if !same_shape {
            event.kind = RowEventKind::Unchanged;
            event.deltas = Deltas::blank(arity);
            continue;
        }

        let deltas = Deltas(
            event
                .row
                .fields
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    let old = before.fields.get(index)?;
                    (old != field && !next.header.is_age_col(index)).then(|| old.clone())
                })
                .collect(),
        );
        event.kind = if deltas.is_blank() {
            RowEventKind::Unchanged
        } else {
            RowEventKind::Update
        };
        event.deltas = deltas;
    }

    if same_shape {
        let current = next
            .rows
            .iter()
            .map(|event| event.row.id.clone())
            .collect::<std::collections::HashSet<_>>();
        let gone = previous
            .rows
            .iter()
            .filter(|event| event.kind != RowEventKind::Delete)
            .filter(|event| !current.contains(&event.row.id))
            .map(|event| RowEvent {
                row: event.row.clone(),
                kind: RowEventKind::Delete,
                deltas: Deltas::blank(event.row.fields.len()),
            })
            .collect::<Vec<_>>();
        next.rows.extend(gone);
    }

    next
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Header, HeaderRow, Row, RowEventKind, TableData, diff};
    use crate::model::NamespaceScope;

    pub(crate) fn ready_header() -> HeaderRow {
        HeaderRow(vec![
            Header::new("NAME"),
            Header::new("READY").numeric(),
            Header::new("AGE").age(),
        ])
    }

    pub(crate) fn row(id: &str, fields: &[&str]) -> Row {
        Row::new(id, fields.iter().map(|field| field.to_string()).collect())
    }

    pub(crate) fn table(rows: Vec<Row>) -> TableData {
        let mut data = TableData::new(NamespaceScope::Named("ns".to_string()), ready_header());
        for row in rows {
            data.push(row).expect("fixture arity");
        }
        data
    }

    #[test]
    fn push_rejects_rows_with_wrong_arity() {
        let mut data = table(Vec::new());
        assert!(data.push(row("ns/a", &["a", "1/1"])).is_err());
        assert!(data.push(row("ns/a", &["a", "1/1", "5m"])).is_ok());
        assert!(data.rows.iter().all(|event| event.row.fields.len() == data.header.len()));
    }

    #[test]
    fn changed_field_yields_update_with_single_delta() {
        let before = table(vec![row("ns/x", &["x", "3", "1m"])]);
        let after = diff(&before, table(vec![row("ns/x", &["x", "5", "2m"])]));

        let event = after.find("ns/x").expect("row present");
        assert_eq!(event.kind, RowEventKind::Update);
        assert_eq!(event.deltas.changed_columns(), vec![1]);
        assert_eq!(event.deltas.get(1), Some("3"));
    }

    #[test]
    fn new_ids_are_adds_and_equal_rows_are_unchanged() {
        let before = table(vec![row("ns/a", &["a", "1/1", "5m"])]);
        let after = diff(
            &before,
            table(vec![
                row("ns/a", &["a", "1/1", "6m"]),
                row("ns/b", &["b", "0/1", "1s"]),
            ]),
        );

        assert_eq!(after.find("ns/a").map(|e| e.kind), Some(RowEventKind::Unchanged));
        assert_eq!(after.find("ns/b").map(|e| e.kind), Some(RowEventKind::Add));
    }

    #[test]
    fn vanished_ids_only_appear_as_deletes() {
        let before = table(vec![
            row("ns/a", &["a", "1/1", "5m"]),
            row("ns/b", &["b", "0/1", "2m"]),
        ]);
        let after = diff(&before, table(vec![row("ns/a", &["a", "1/1", "5m"])]));

        let gone = after
            .rows
            .iter()
            .filter(|event| event.row.id == "ns/b")
            .collect::<Vec<_>>();
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].kind, RowEventKind::Delete);

        let settled = {
            let mut data = after.clone();
            data.settle();
            data
        };
        assert!(settled.find("ns/b").is_none());
        assert!(settled.rows.iter().all(|event| event.deltas.is_blank()));
    }

    #[test]
    fn deleted_rows_are_not_deleted_twice() {
        let first = table(vec![row("ns/a", &["a", "1/1", "5m"])]);
        let second = diff(&first, table(Vec::new()));
        let third = diff(&second, table(Vec::new()));
        assert!(third.is_empty());
    }

    #[test]
    fn header_change_keeps_rows_comparable_by_identity() {
        let before = table(vec![row("ns/a", &["a", "1/1", "5m"])]);
        let mut wide = TableData::new(
            NamespaceScope::All,
            HeaderRow(vec![
                Header::new("NAMESPACE"),
                Header::new("NAME"),
                Header::new("READY").numeric(),
                Header::new("AGE").age(),
            ]),
        );
        wide.push(row("ns/a", &["ns", "a", "1/1", "5m"])).expect("arity");
        let after = diff(&before, wide);

        assert_eq!(after.len(), 1);
        assert_eq!(after.rows[0].kind, RowEventKind::Unchanged);
    }

    #[test]
    fn name_col_accounts_for_namespace_column() {
        assert_eq!(ready_header().name_col(), 0);
        let wide = HeaderRow(vec![Header::new("NAMESPACE"), Header::new("NAME")]);
        assert!(wide.has_namespace());
        assert_eq!(wide.name_col(), 1);
    }
}
