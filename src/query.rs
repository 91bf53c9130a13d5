use crate::cell::Row;
use crate::dataset::Dataset;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Filter value that accepts any row whose cell is non-blank.
pub const HAS_VALUE: &str = "__HAS_VALUE__";

/// Per-column allow lists. Rows must pass every column (AND); within a
/// column any listed value passes (OR).
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct FilterState {
    columns: BTreeMap<String, BTreeSet<String>>,
}

impl FilterState {
    /// Replaces the accepted values of `column`. An empty set removes the
    /// column constraint.
    pub fn set_filter(&mut self, column: &str, values: BTreeSet<String>) {
        if values.is_empty() {
            self.columns.remove(column);
        } else {
            self.columns.insert(column.to_string(), values);
        }
    }

    /// Adds or removes a single value, dropping the column once its set
    /// becomes empty.
    pub fn toggle_value(&mut self, column: &str, value: &str) {
        let mut values = self.values(column).cloned().unwrap_or_default();
        if !values.remove(value) {
            values.insert(value.to_string());
        }
        self.set_filter(column, values);
    }

    pub fn values(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.columns.get(column)
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.columns.iter()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.columns.iter().all(|(column, accepted)| {
            if accepted.contains(HAS_VALUE) {
                row.get(column).is_some_and(|value| !value.is_blank())
            } else {
                accepted.contains(&row.text(column))
            }
        })
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(column: &str) -> Self {
        SortSpec {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn descending(column: &str) -> Self {
        SortSpec {
            column: column.to_string(),
            descending: true,
        }
    }
}

/// Everything the view depends on besides the dataset.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct ViewQuery {
    pub filters: FilterState,
    pub search: String,
    pub sort: Option<SortSpec>,
    pub show_only_changed: bool,
}

/// A row of the derived view with its position in the live dataset, so
/// edits made through the view land on the right row.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewRow {
    pub position: usize,
    pub row: Arc<Row>,
}

enum Search<'a> {
    Column { header: &'a str, needle: String },
    Anywhere(String),
}

impl<'a> Search<'a> {
    fn plan(query: &str, headers: &'a [String]) -> Option<Self> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        if let Some((prefix, rest)) = query.split_once(':') {
            let prefix = prefix.trim().to_lowercase();
            if !prefix.is_empty() {
                if let Some(header) = headers.iter().find(|h| h.to_lowercase() == prefix) {
                    return Some(Search::Column {
                        header: header.as_str(),
                        needle: rest.trim().to_lowercase(),
                    });
                }
            }
        }

        Some(Search::Anywhere(query.to_lowercase()))
    }

    fn matches(&self, row: &Row, headers: &[String]) -> bool {
        match self {
            Search::Column { header, needle } => row.text(header).to_lowercase().contains(needle),
            Search::Anywhere(needle) => headers
                .iter()
                .any(|h| row.text(h).to_lowercase().contains(needle)),
        }
    }
}

/// Derive the visible rows of a dataset
///
/// Stages run in a fixed order: changed-only, then search, then column
/// filters, then a stable sort. The dataset is never modified.
///
/// # Arguments
/// * `dataset` - Live rows and their snapshot
/// * `query` - Filters, search text, sort and the changed-only flag
///
/// # Returns
/// * `Vec<ViewRow>` - Surviving rows, each carrying its live position
///
/// # Examples
/// ```
/// use sheetdesk::{CellValue, Dataset, ViewQuery, derive_view, parse_grid};
///
/// let grid: Vec<Vec<CellValue>> = vec![
///     vec!["ID".into(), "Name".into()],
///     vec!["1".into(), "Soap".into()],
/// ];
/// let mut dataset = Dataset::default();
/// dataset.load(&parse_grid(&grid));
///
/// let query = ViewQuery { search: "soap".to_string(), ..ViewQuery::default() };
/// assert_eq!(derive_view(&dataset, &query)[0].position, 0);
/// ```
pub fn derive_view(dataset: &Dataset, query: &ViewQuery) -> Vec<ViewRow> {
    let headers = dataset.headers();
    let mut view: Vec<ViewRow> = dataset
        .rows()
        .iter()
        .enumerate()
        .map(|(position, row)| ViewRow {
            position,
            row: Arc::clone(row),
        })
        .collect();

    if query.show_only_changed {
        view.retain(|v| dataset.row_changed(&v.row));
        debug!("changed-only kept {} rows", view.len());
    }

    if let Some(search) = Search::plan(&query.search, headers) {
        view.retain(|v| search.matches(&v.row, headers));
        debug!("search {:?} kept {} rows", query.search, view.len());
    }

    if !query.filters.is_empty() {
        view.retain(|v| query.filters.matches(&v.row));
        debug!("{} column filters kept {} rows", query.filters.len(), view.len());
    }

    if let Some(sort) = &query.sort {
        view.sort_by(|a, b| compare_rows(&a.row, &b.row, sort));
    }

    view
}

/// Entries kept by a distribution unless asked otherwise.
pub const DEFAULT_TOP_VALUES: usize = 10;

/// Label counted for rows whose value is missing.
pub const EMPTY_LABEL: &str = "(Empty)";

/// Distribution of `column` over `view`
///
/// Missing values count under `EMPTY_LABEL`. Values are ordered by count,
/// highest first; ties keep the order in which values first appear.
///
/// # Arguments
/// * `view` - Rows to count, usually the derived view
/// * `column` - Header to count by
/// * `limit` - Maximum number of entries returned
///
/// # Returns
/// * `Vec<(String, usize)>` - The `limit` most frequent values and their counts
pub fn value_counts(view: &[ViewRow], column: &str, limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: BTreeMap<String, usize> = BTreeMap::new();

    for item in view {
        let value = match item.row.get(column) {
            Some(value) if !value.is_missing() => value.stringify(),
            _ => EMPTY_LABEL.to_string(),
        };
        match slots.get(&value) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(value.clone(), counts.len());
                counts.push((value, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

fn compare_rows(a: &Row, b: &Row, sort: &SortSpec) -> Ordering {
    let a = a.get(&sort.column);
    let b = b.get(&sort.column);
    let a_missing = a.is_none_or(|v| v.is_missing());
    let b_missing = b.is_none_or(|v| v.is_missing());

    // Blanks go last in both directions
    match (a_missing, b_missing) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let a = a.map(|v| v.stringify()).unwrap_or_default();
            let b = b.map(|v| v.stringify()).unwrap_or_default();
            let ordering = natural_cmp(&a, &b);
            if sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

/// Decomposes `text`, drops combining marks and lowercases, so accents and
/// case never decide an ordering.
fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two cell strings the way a person reads them
///
/// Accents and case are ignored, and runs of digits are compared by numeric
/// value, so "9" sorts before "10" and "Éclat" sorts next to "eclat".
///
/// # Arguments
/// * `a` - Left-hand value
/// * `b` - Right-hand value
///
/// # Returns
/// * `Ordering` - `Equal` for values differing only by accent, case or
///   leading zeros
///
/// # Examples
/// ```
/// use sheetdesk::query::natural_cmp;
/// use std::cmp::Ordering;
///
/// assert_eq!(natural_cmp("item 9", "item 10"), Ordering::Less);
/// assert_eq!(natural_cmp("Éclat", "Zeta"), Ordering::Less);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = fold(a);
    let b = fold(b);
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let ordering = compare_digit_runs(&take_digits(&mut a_chars), &take_digits(&mut b_chars));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.cmp(&y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_order_is_numeric_and_case_blind() {
        assert_eq!(natural_cmp("9", "10"), Ordering::Less);
        assert_eq!(natural_cmp("item 20", "item 3"), Ordering::Greater);
        assert_eq!(natural_cmp("Apple", "apple"), Ordering::Equal);
        assert_eq!(natural_cmp("007", "7"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "ab"), Ordering::Less);
    }

    #[test]
    fn natural_order_ignores_accents() {
        assert_eq!(natural_cmp("Éclat", "Zeta"), Ordering::Less);
        assert_eq!(natural_cmp("éclat", "Eclat"), Ordering::Equal);
        assert_eq!(natural_cmp("Crème 2", "creme 10"), Ordering::Less);
    }

    fn view_of(values: &[&str]) -> Vec<ViewRow> {
        values
            .iter()
            .enumerate()
            .map(|(position, value)| {
                let mut row = Row::new(position);
                row.set("Brand", (*value).into());
                ViewRow {
                    position,
                    row: Arc::new(row),
                }
            })
            .collect()
    }

    #[test]
    fn value_counts_orders_by_frequency() {
        let view = view_of(&["B", "A", "", "A", "B", "A", "C"]);
        assert_eq!(
            value_counts(&view, "Brand", 10),
            vec![
                ("A".to_string(), 3),
                ("B".to_string(), 2),
                (EMPTY_LABEL.to_string(), 1),
                ("C".to_string(), 1),
            ]
        );
        assert_eq!(value_counts(&view, "Brand", 1), vec![("A".to_string(), 3)]);
        assert!(value_counts(&[], "Brand", 10).is_empty());
    }

    #[test]
    fn toggling_last_value_drops_the_column() {
        let mut filters = FilterState::default();
        filters.toggle_value("Brand", "A");
        assert_eq!(filters.len(), 1);
        filters.toggle_value("Brand", "A");
        assert!(filters.is_empty());
        assert!(filters.values("Brand").is_none());
    }

    #[test]
    fn has_value_sentinel_overrides_membership() {
        let mut filters = FilterState::default();
        filters.set_filter(
            "Size",
            [HAS_VALUE.to_string(), "S".to_string()].into_iter().collect(),
        );

        let mut row = Row::new(0);
        row.set("Size", "XL".into());
        assert!(filters.matches(&row));

        row.set("Size", " ".into());
        assert!(!filters.matches(&row));
        assert!(!filters.matches(&Row::new(1)));
    }

    #[test]
    fn search_plan_routes_known_prefix() {
        let headers = vec!["Brand".to_string(), "Name".to_string()];
        assert!(matches!(
            Search::plan(" brand : Aceb ", &headers),
            Some(Search::Column { header: "Brand", ref needle }) if needle == "aceb"
        ));
        assert!(matches!(
            Search::plan("Unknown:xyz", &headers),
            Some(Search::Anywhere(ref q)) if q == "unknown:xyz"
        ));
        assert!(Search::plan("   ", &headers).is_none());
    }
}
