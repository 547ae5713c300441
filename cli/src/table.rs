// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use colored::{Color, Colorize};

/// Plain-text table over rows of `T`, one column per `C`.
pub struct Table<'a, T, C: Column<T>> {
    columns: &'a [C],
    data: &'a [T],
    separator: &'a str,
}

impl<'a, T, C: Column<T>> Table<'a, T, C> {
    pub fn new(columns: &'a [C], data: &'a [T]) -> Self {
        Self {
            columns,
            data,
            separator: "  ",
        }
    }

    fn widths(&self, cells: &[Vec<String>]) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(col.name().chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

impl<T, C: Column<T>> fmt::Display for Table<'_, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .data
            .iter()
            .map(|row| self.columns.iter().map(|col| col.format(row)).collect())
            .collect();
        let widths = self.widths(&cells);
        let last = self.columns.len().saturating_sub(1);

        for (i, (col, width)) in self.columns.iter().zip(&widths).enumerate() {
            let name = pad(col.name(), *width, col.padding_direction(), i == last);
            write!(f, "{}", name.as_str().bold())?;
            if i < last {
                f.write_str(self.separator)?;
            }
        }
        writeln!(f)?;

        for (row, data) in cells.iter().zip(self.data) {
            for (i, ((col, width), cell)) in self.columns.iter().zip(&widths).zip(row).enumerate() {
                let cell = pad(cell, *width, col.padding_direction(), i == last);
                match col.color(data) {
                    Some(color) => write!(f, "{}", cell.as_str().color(color))?,
                    None => f.write_str(&cell)?,
                }
                if i < last {
                    f.write_str(self.separator)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub trait Column<T> {
    fn name(&self) -> &'static str;

    fn format(&self, data: &T) -> String;

    fn padding_direction(&self) -> PaddingDirection {
        PaddingDirection::Left
    }

    fn color(&self, _data: &T) -> Option<Color> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingDirection {
    Left,
    Right,
}

fn pad(cell: &str, width: usize, direction: PaddingDirection, last: bool) -> String {
    match direction {
        // last column does not need padding if it's left-aligned
        PaddingDirection::Left if last => cell.to_string(),
        PaddingDirection::Left => format!("{cell:<width$}"),
        PaddingDirection::Right => format!("{cell:>width$}"),
    }
}
