use std::rc::Rc;

use chrono::NaiveDate;
use tracing::{debug, trace};

use crate::config::DatePickerSettings;
use crate::datetime::{
    CalendarDay, Clock, clamp_grid_anchor, format_display, format_iso, generate_calendar_grid,
    parse_date_input, parse_iso, shift_month,
};
use crate::dismiss::{DismissEvent, DismissHost, DismissSubscription};
use crate::position::{FlyoutPosition, TriggerGeometry, resolve_flyout};

/// State that lives only while a flyout is open.
#[derive(Debug)]
pub struct DateViewState {
    month_anchor: NaiveDate,
    position: FlyoutPosition,
    _listeners: DismissSubscription,
}

impl DateViewState {
    pub fn month_anchor(&self) -> NaiveDate {
        self.month_anchor
    }

    pub fn position(&self) -> FlyoutPosition {
        self.position
    }
}

/// One date-typed filter field: the typed text, the externally owned
/// selection, and an optional open flyout.
///
/// Opening and closing only happen through the user-action methods below;
/// there is no setter for the open state.
pub struct DateField<H: DismissHost> {
    key: String,
    text: String,
    selected: Option<NaiveDate>,
    view: Option<DateViewState>,
    host: H,
    clock: Rc<dyn Clock>,
    settings: DatePickerSettings,
}

impl<H: DismissHost> DateField<H> {
    pub fn new(
        key: impl Into<String>,
        value: &str,
        host: H,
        clock: Rc<dyn Clock>,
        settings: DatePickerSettings,
    ) -> Self {
        let mut field = Self {
            key: key.into(),
            text: String::new(),
            selected: None,
            view: None,
            host,
            clock,
            settings,
        };
        field.sync_value(value);
        field
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// What the text input shows, including unparsed keystrokes.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selected(&self) -> Option<NaiveDate> {
        self.selected
    }

    pub fn is_open(&self) -> bool {
        self.view.is_some()
    }

    pub fn view(&self) -> Option<&DateViewState> {
        self.view.as_ref()
    }

    /// Re-reads the ISO value after it changed outside this field.
    pub fn sync_value(&mut self, value: &str) {
        self.selected = parse_iso(value);
        self.text = self.selected.map(format_display).unwrap_or_default();
        trace!(key = %self.key, value, "synced date field");
    }

    pub fn focus(&mut self, geometry: TriggerGeometry) {
        if !self.is_open() {
            self.open(geometry, "focus");
        }
    }

    pub fn toggle(&mut self, geometry: TriggerGeometry) {
        if self.is_open() {
            self.close("toggle");
        } else {
            self.open(geometry, "toggle");
        }
    }

    pub fn dismiss(&mut self, event: DismissEvent) {
        if self.is_open() {
            self.close(match event {
                DismissEvent::OutsideClick => "outside-click",
                DismissEvent::Escape => "escape",
            });
        }
    }

    /// Records typed text. Returns the value to store when the text
    /// resolves to a date (or was erased), `None` while it is still
    /// unparseable.
    pub fn input(&mut self, text: &str) -> Option<String> {
        self.text = text.to_string();

        if text.trim().is_empty() {
            self.selected = None;
            return Some(String::new());
        }

        let date = parse_date_input(text)?;
        self.selected = Some(date);
        if let Some(view) = self.view.as_mut() {
            view.month_anchor = clamp_grid_anchor(date);
        }
        Some(format_iso(date))
    }

    /// Commits a day from the grid and closes the flyout.
    pub fn select_day(&mut self, date: NaiveDate) -> String {
        self.selected = Some(date);
        self.text = format_display(date);
        self.close("select");
        format_iso(date)
    }

    pub fn select_today(&mut self) -> String {
        let today = self.clock.today();
        self.select_day(today)
    }

    pub fn previous_month(&mut self) {
        self.shift_anchor(-1);
    }

    pub fn next_month(&mut self) {
        self.shift_anchor(1);
    }

    /// The 42-day grid for the open flyout.
    pub fn grid(&self) -> Option<Vec<CalendarDay>> {
        let view = self.view.as_ref()?;
        Some(generate_calendar_grid(
            view.month_anchor,
            self.selected,
            self.clock.today(),
            self.settings.week_start,
        ))
    }

    pub fn settings(&self) -> DatePickerSettings {
        self.settings
    }

    fn shift_anchor(&mut self, months: i32) {
        if let Some(view) = self.view.as_mut() {
            view.month_anchor = shift_month(view.month_anchor, months);
            trace!(key = %self.key, anchor = %view.month_anchor, "moved month anchor");
        }
    }

    fn open(&mut self, geometry: TriggerGeometry, reason: &str) {
        let position = resolve_flyout(geometry, self.settings.metrics);
        let month_anchor = clamp_grid_anchor(self.selected.unwrap_or_else(|| self.clock.today()));
        let listeners = self.host.subscribe(&self.key);
        debug!(key = %self.key, reason, anchor = %month_anchor, "opened date flyout");
        self.view = Some(DateViewState {
            month_anchor,
            position,
            _listeners: listeners,
        });
    }

    fn close(&mut self, reason: &str) {
        if self.view.take().is_some() {
            debug!(key = %self.key, reason, "closed date flyout");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::*;
    use crate::datetime::FixedClock;
    use crate::dismiss::TrackingDismissHost;
    use crate::position::{Placement, Rect};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn geometry() -> TriggerGeometry {
        TriggerGeometry::new(Rect::new(100.0, 300.0), 1280.0)
    }

    fn field(value: &str, host: &TrackingDismissHost) -> DateField<TrackingDismissHost> {
        DateField::new(
            "dateFrom",
            value,
            host.clone(),
            Rc::new(FixedClock(date(2024, 6, 20))),
            DatePickerSettings::default(),
        )
    }

    #[test]
    fn displays_stored_iso_value() {
        let host = TrackingDismissHost::new();
        let field = field("2024-03-05", &host);
        assert_eq!(field.text(), "03/05/2024");
        assert_eq!(field.selected(), Some(date(2024, 3, 5)));

        let empty = DateField::new(
            "d",
            "garbage",
            host.clone(),
            Rc::new(FixedClock(date(2024, 6, 20))),
            DatePickerSettings::default(),
        );
        assert_eq!(empty.text(), "");
        assert_eq!(empty.selected(), None);
    }

    #[test]
    fn focus_opens_once_and_anchors_on_selection() {
        let host = TrackingDismissHost::new();
        let mut field = field("2023-11-02", &host);

        field.focus(geometry());
        field.focus(geometry());
        assert!(field.is_open());
        assert_eq!(host.active(), 1);
        assert_eq!(host.acquired(), 1);

        let view = field.view().expect("open view");
        assert_eq!(view.month_anchor(), date(2023, 11, 2));
        assert_eq!(view.position().placement, Placement::Right);
    }

    #[test]
    fn anchor_defaults_to_today() {
        let host = TrackingDismissHost::new();
        let mut field = field("", &host);
        field.toggle(geometry());
        assert_eq!(field.view().map(DateViewState::month_anchor), Some(date(2024, 6, 20)));
    }

    #[test]
    fn every_exit_path_releases_listeners() {
        let host = TrackingDismissHost::new();
        let mut field = field("", &host);

        field.toggle(geometry());
        field.toggle(geometry());
        assert_eq!(host.active(), 0);

        field.focus(geometry());
        field.dismiss(DismissEvent::Escape);
        assert_eq!(host.active(), 0);

        field.focus(geometry());
        field.dismiss(DismissEvent::OutsideClick);
        assert_eq!(host.active(), 0);

        field.focus(geometry());
        field.select_day(date(2024, 6, 1));
        assert_eq!(host.active(), 0);

        field.focus(geometry());
        drop(field);
        assert_eq!(host.active(), 0);
        assert_eq!(host.acquired(), 5);
    }

    #[test]
    fn rapid_cycles_do_not_accumulate_listeners() {
        let host = TrackingDismissHost::new();
        let mut field = field("", &host);
        for _ in 0..50 {
            field.focus(geometry());
            field.focus(geometry());
            field.dismiss(DismissEvent::Escape);
            field.dismiss(DismissEvent::Escape);
        }
        assert_eq!(host.active(), 0);
        assert_eq!(host.acquired(), 50);
    }

    #[test]
    fn typing_keeps_raw_text_until_parseable() {
        let host = TrackingDismissHost::new();
        let mut field = field("", &host);
        field.focus(geometry());

        assert_eq!(field.input("06/1"), None);
        assert_eq!(field.text(), "06/1");
        assert_eq!(field.selected(), None);

        assert_eq!(field.input("02/31/2024"), None);
        assert_eq!(field.text(), "02/31/2024");

        assert_eq!(field.input("06/15/2024"), Some("2024-06-15".to_string()));
        assert_eq!(field.selected(), Some(date(2024, 6, 15)));
        assert!(field.is_open());

        assert_eq!(field.input(""), Some(String::new()));
        assert_eq!(field.selected(), None);
    }

    #[test]
    fn typed_date_moves_open_anchor() {
        let host = TrackingDismissHost::new();
        let mut field = field("", &host);
        field.focus(geometry());
        field.input("1999-01-09");
        assert_eq!(field.view().map(DateViewState::month_anchor), Some(date(1999, 1, 9)));
    }

    #[test]
    fn typed_date_at_range_limit_keeps_a_whole_grid() {
        let host = TrackingDismissHost::new();
        let mut field = field("", &host);
        field.focus(geometry());
        assert_eq!(field.input("+262142-12-15"), Some("+262142-12-15".to_string()));
        assert_eq!(field.selected(), Some(date(262142, 12, 15)));

        let anchor = field.view().map(DateViewState::month_anchor).expect("open");
        assert_eq!((anchor.year(), anchor.month()), (262142, 11));
        field.next_month();
        assert_eq!(field.view().map(DateViewState::month_anchor), Some(anchor));

        let grid = field.grid().expect("grid while open");
        assert_eq!(grid.len(), 42);
        assert!(grid.windows(2).all(|pair| pair[0].date.succ_opt() == Some(pair[1].date)));
    }

    #[test]
    fn selecting_commits_and_closes() {
        let host = TrackingDismissHost::new();
        let mut field = field("", &host);
        field.focus(geometry());

        let iso = field.select_day(date(2024, 7, 4));
        assert_eq!(iso, "2024-07-04");
        assert_eq!(field.text(), "07/04/2024");
        assert!(!field.is_open());
    }

    #[test]
    fn today_ignores_displayed_month() {
        let host = TrackingDismissHost::new();
        let mut field = field("2020-01-15", &host);
        field.focus(geometry());
        for _ in 0..14 {
            field.previous_month();
        }

        let iso = field.select_today();
        let expected = format_iso(
            parse_date_input(&format_display(date(2024, 6, 20))).expect("today parses"),
        );
        assert_eq!(iso, expected);
        assert!(!field.is_open());
    }

    #[test]
    fn navigation_only_moves_open_flyout() {
        let host = TrackingDismissHost::new();
        let mut field = field("2024-12-10", &host);
        field.next_month();
        assert!(field.view().is_none());

        field.focus(geometry());
        field.next_month();
        let anchor = field.view().map(DateViewState::month_anchor).expect("open");
        assert_eq!((anchor.year(), anchor.month()), (2025, 1));

        field.previous_month();
        field.previous_month();
        let anchor = field.view().map(DateViewState::month_anchor).expect("open");
        assert_eq!((anchor.year(), anchor.month()), (2024, 11));
    }

    #[test]
    fn grid_marks_selection_and_today() {
        let host = TrackingDismissHost::new();
        let mut field = field("2024-06-03", &host);
        assert!(field.grid().is_none());

        field.focus(geometry());
        let grid = field.grid().expect("grid while open");
        assert_eq!(grid.len(), 42);
        let selected: Vec<_> = grid.iter().filter(|day| day.is_selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].date, date(2024, 6, 3));
        assert_eq!(grid.iter().filter(|day| day.is_today).count(), 1);
    }
}
