use std::cmp::Ordering;

use crate::domain::pull_request::{Column, PrRow};

/// Column values compare numerically when fully numeric, otherwise as
/// lowercase text. Numbers sort before text.
#[derive(Debug, Clone)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(value: &str) -> Self {
        if is_numeric(value)
            && let Ok(n) = value.parse::<f64>()
        {
            return SortKey::Number(n);
        }
        SortKey::Text(value.to_lowercase())
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
        }
    }
}

/// Digits with at most one decimal point.
fn is_numeric(value: &str) -> bool {
    let digits = value.replacen('.', "", 1);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: Column,
    pub descending: bool,
}

impl SortState {
    /// Ascending on a new column, flipped on a repeated one.
    pub fn toggle(current: Option<SortState>, column: Column) -> SortState {
        match current {
            Some(state) if state.column == column => SortState {
                column,
                descending: !state.descending,
            },
            _ => SortState {
                column,
                descending: false,
            },
        }
    }
}

pub fn sort_rows(rows: &mut [PrRow], sort: SortState) {
    rows.sort_by(|a, b| {
        let ord = SortKey::of(a.value(sort.column)).compare(&SortKey::of(b.value(sort.column)));
        if sort.descending { ord.reverse() } else { ord }
    });
}
