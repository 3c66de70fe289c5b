use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate, Weekday};
use unicode_width::UnicodeWidthStr;

use crate::date_field::DateField;
use crate::datetime::{CalendarDay, month_title, weekday_labels};
use crate::dismiss::DismissHost;
use crate::error::PanelError;
use crate::panel::FilterPanel;
use crate::position::FlyoutPosition;
use crate::schema::{FieldKind, FilterConfig, FilterFieldSchema, SelectOption};
use crate::store::FilterValues;

/// Render model for one field, chosen by its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWidget<'a> {
    Text {
        field: &'a FilterFieldSchema,
        value: &'a str,
    },
    Number {
        field: &'a FilterFieldSchema,
        value: &'a str,
    },
    Select {
        field: &'a FilterFieldSchema,
        options: &'a [SelectOption],
        value: &'a str,
    },
    Date {
        field: &'a FilterFieldSchema,
        text: &'a str,
        open: bool,
        position: Option<FlyoutPosition>,
        month_anchor: Option<NaiveDate>,
    },
}

impl<'a> FieldWidget<'a> {
    pub fn field(&self) -> &'a FilterFieldSchema {
        match self {
            FieldWidget::Text { field, .. }
            | FieldWidget::Number { field, .. }
            | FieldWidget::Select { field, .. }
            | FieldWidget::Date { field, .. } => field,
        }
    }
}

pub fn dispatch_field<'a, H: DismissHost>(
    field: &'a FilterFieldSchema,
    values: &'a FilterValues,
    date: Option<&'a DateField<H>>,
) -> FieldWidget<'a> {
    let value = values.get(&field.key).unwrap_or_default();
    match field.kind {
        FieldKind::Text => FieldWidget::Text { field, value },
        FieldKind::Number => FieldWidget::Number { field, value },
        FieldKind::Select => FieldWidget::Select {
            field,
            options: &field.options,
            value,
        },
        FieldKind::Date => {
            let view = date.and_then(DateField::view);
            FieldWidget::Date {
                field,
                text: date.map(DateField::text).unwrap_or(value),
                open: view.is_some(),
                position: view.map(|view| view.position()),
                month_anchor: view.map(|view| view.month_anchor()),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView<'a> {
    pub title: &'a str,
    pub rows: Vec<Vec<FieldWidget<'a>>>,
    pub active_count: usize,
}

impl<H: DismissHost + Clone> FilterPanel<H> {
    /// Rows of dispatched widgets for the open panel.
    pub fn view(&self) -> Result<PanelView<'_>, PanelError> {
        let config = self.config().ok_or(PanelError::NotOpen)?;
        let values = self.values()?;
        let rows = config
            .rows()
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|field| dispatch_field(field, values, self.date_field(&field.key).ok()))
                    .collect()
            })
            .collect();

        Ok(PanelView {
            title: config.title(),
            rows,
            active_count: values.active_count(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    #[tracing::instrument(skip(self, config))]
    pub fn print_rows(&mut self, config: &FilterConfig) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.paint(config.title(), "1"))?;

        let headers = vec!["Row".to_string(), "Left".to_string(), "Right".to_string()];
        let rows = config
            .rows()
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let mut cells = vec![(idx + 1).to_string()];
                cells.extend(row.iter().map(|field| describe_field(field)));
                if row.len() == 1 && row[0].width == crate::schema::WidthHint::Full {
                    cells[1] = format!("{} (full)", cells[1]);
                }
                cells.resize(3, String::new());
                cells
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, grid))]
    pub fn print_calendar(
        &mut self,
        anchor: NaiveDate,
        grid: &[CalendarDay],
        week_start: Weekday,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let cells: Vec<String> = grid.iter().map(|day| self.day_cell(day)).collect();
        write_calendar(&mut out, anchor, &cells, week_start)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, config, values))]
    pub fn print_values(&mut self, config: &FilterConfig, values: &FilterValues) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["Field".to_string(), "Type".to_string(), "Value".to_string()];
        let rows = config
            .fields()
            .iter()
            .map(|field| {
                let raw = values.get(&field.key).unwrap_or_default();
                let shown = match field.option_label(raw) {
                    Some(label) if !raw.is_empty() => format!("{raw} ({label})"),
                    _ => raw.to_string(),
                };
                vec![field.key.clone(), field.kind.to_string(), shown]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn day_cell(&self, day: &CalendarDay) -> String {
        let label = format!("{:>2}", day.date.day());
        if day.is_selected {
            self.paint(&format!("[{label}]"), "7")
        } else if day.is_today {
            self.paint(&format!("*{label}"), "33")
        } else if !day.is_current_month {
            self.paint(&format!(" {label}"), "2")
        } else {
            format!(" {label}")
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn describe_field(field: &FilterFieldSchema) -> String {
    format!("{} [{}]", field.label, field.kind)
}

fn write_calendar<W: Write>(
    mut writer: W,
    anchor: NaiveDate,
    cells: &[String],
    week_start: Weekday,
) -> anyhow::Result<()> {
    writeln!(writer, "{}", month_title(anchor))?;
    for label in weekday_labels(week_start) {
        write!(writer, "{label:>4} ")?;
    }
    writeln!(writer)?;

    for week in cells.chunks(7) {
        for cell in week {
            let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = 4_usize.saturating_sub(visible);
            write!(writer, "{}{} ", " ".repeat(padding), cell)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::config::DatePickerSettings;
    use crate::datetime::{FixedClock, generate_calendar_grid};
    use crate::dismiss::NoopDismissHost;
    use crate::position::{Placement, Rect, TriggerGeometry};
    use crate::store::AppliedFilters;

    fn config() -> FilterConfig {
        FilterConfig::new(
            "Songs",
            vec![
                FilterFieldSchema::text("search", "Search"),
                FilterFieldSchema::select(
                    "status",
                    "Status",
                    vec![SelectOption::new("draft", "Draft")],
                ),
                FilterFieldSchema::date("dateFrom", "From").full_width(),
                FilterFieldSchema::number("minPlays", "Min plays"),
            ],
        )
        .expect("valid config")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn view_dispatches_each_field_by_type() {
        let mut panel = FilterPanel::new(
            NoopDismissHost,
            Rc::new(FixedClock(date(2024, 6, 20))),
            DatePickerSettings::default(),
        );
        let applied: AppliedFilters = [("status".to_string(), "draft".to_string())].into();
        panel.open(&config(), &applied);
        panel
            .date_field_mut("dateFrom")
            .expect("date field")
            .focus(TriggerGeometry::new(Rect::new(900.0, 1000.0), 1000.0));

        let view = panel.view().expect("open view");
        assert_eq!(view.title, "Songs");
        assert_eq!(view.active_count, 1);
        assert_eq!(view.rows.len(), 3);

        assert!(matches!(view.rows[0][0], FieldWidget::Text { value: "", .. }));
        assert!(matches!(
            view.rows[0][1],
            FieldWidget::Select { value: "draft", ref options, .. } if options.len() == 1
        ));
        match &view.rows[1][0] {
            FieldWidget::Date {
                open,
                position,
                month_anchor,
                ..
            } => {
                assert!(*open);
                assert_eq!(position.map(|p| p.placement), Some(Placement::Left));
                assert_eq!(*month_anchor, Some(date(2024, 6, 20)));
            }
            other => panic!("expected date widget, got {other:?}"),
        }
        assert!(matches!(view.rows[2][0], FieldWidget::Number { .. }));
        assert_eq!(view.rows[2][0].field().key, "minPlays");
    }

    #[test]
    fn view_requires_open_panel() {
        let panel = FilterPanel::new(
            NoopDismissHost,
            Rc::new(FixedClock(date(2024, 6, 20))),
            DatePickerSettings::default(),
        );
        assert_eq!(panel.view().err(), Some(PanelError::NotOpen));
    }

    #[test]
    fn table_pads_to_widest_cell() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["long cell".to_string(), "x".to_string()]],
        )
        .expect("write table");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A         B ");
        assert_eq!(lines[1], "--------- - ");
        assert_eq!(lines[2], "long cell x ");
    }

    #[test]
    fn calendar_text_has_six_weeks() {
        let anchor = date(2024, 6, 1);
        let grid = generate_calendar_grid(anchor, None, date(2024, 6, 20), Weekday::Sun);
        let renderer = Renderer::new(false);
        let cells: Vec<String> = grid.iter().map(|day| renderer.day_cell(day)).collect();

        let mut out = Vec::new();
        write_calendar(&mut out, anchor, &cells, Weekday::Sun).expect("write calendar");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "June 2024");
        assert_eq!(lines.len(), 8);
        assert!(lines[1].trim_start().starts_with("Su"));
        assert!(text.contains("*20"));
        assert_eq!(strip_ansi("\x1b[1mhi\x1b[0m"), "hi");
    }
}
