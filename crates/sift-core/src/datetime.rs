use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  Months,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};

/// On-screen format, zero padded.
pub const DISPLAY_FORMAT: &str =
  "%m/%d/%Y";
/// Wire format exchanged with callers.
pub const ISO_FORMAT: &str = "%Y-%m-%d";
/// Every month grid spans six weeks.
pub const GRID_DAYS: usize = 42;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct CalendarDay {
  pub date:             NaiveDate,
  pub is_current_month: bool,
  pub is_today:         bool,
  pub is_selected:      bool
}

/// Source of the real current date.
pub trait Clock {
  fn today(&self) -> NaiveDate;
}

/// Reads the wall clock. Without a
/// configured timezone the machine's
/// local date is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
  timezone: Option<Tz>
}

impl SystemClock {
  #[must_use]
  pub fn new(
    timezone: Option<Tz>
  ) -> Self {
    Self {
      timezone
    }
  }
}

impl Clock for SystemClock {
  fn today(&self) -> NaiveDate {
    match self.timezone {
      | Some(tz) => today_in_timezone(tz),
      | None => {
        Local::now().date_naive()
      }
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
  fn today(&self) -> NaiveDate {
    self.0
  }
}

#[must_use]
pub fn today_in_timezone(
  timezone: Tz
) -> NaiveDate {
  to_local_date(Utc::now(), timezone)
}

#[must_use]
pub fn to_local_date(
  dt: DateTime<Utc>,
  timezone: Tz
) -> NaiveDate {
  dt.with_timezone(&timezone)
    .date_naive()
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

pub fn parse_week_start(
  raw: &str
) -> Option<Weekday> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | _ => None
  }
}

#[must_use]
pub fn format_display(
  date: NaiveDate
) -> String {
  date.format(DISPLAY_FORMAT).to_string()
}

#[must_use]
pub fn format_iso(
  date: NaiveDate
) -> String {
  date.format(ISO_FORMAT).to_string()
}

/// Parses a wire value. Only the
/// date-only ISO form is accepted.
pub fn parse_iso(
  value: &str
) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(
    value.trim(),
    ISO_FORMAT
  )
  .ok()
}

/// Resolves free text typed into a date
/// field.
///
/// `MM/DD/YYYY` is tried first and must
/// name a real calendar day, so
/// `02/31/2024` is refused rather than
/// rolled into March. Years past 9999
/// carry a sign, as `format_display`
/// writes them. ISO input is the
/// fallback, then RFC 3339. Anything
/// else yields `None` and the caller
/// keeps the raw text.
#[tracing::instrument(level = "trace")]
pub fn parse_date_input(
  input: &str
) -> Option<NaiveDate> {
  let token = input.trim();
  if token.is_empty() {
    return None;
  }

  if let Some(date) =
    parse_display_date(token)
  {
    return Some(date);
  }

  parse_calendar_date(token)
}

fn display_date_regex()
-> Option<&'static Regex> {
  static DISPLAY_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  DISPLAY_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<month>\d{1,2})/(?P<day>\d{1,2})/(?P<year>[+-]?\d{4,})$"
      )
      .map_err(|err| {
        tracing::error!(error = %err, "internal regex compile failure");
      })
      .ok()
    })
    .as_ref()
}

fn parse_display_date(
  token: &str
) -> Option<NaiveDate> {
  let caps =
    display_date_regex()?.captures(token)?;
  let month = caps
    .name("month")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let day = caps
    .name("day")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let year = caps
    .name("year")?
    .as_str()
    .parse::<i32>()
    .ok()?;

  let date =
    NaiveDate::from_ymd_opt(year, month, day)?;
  (date.year() == year
    && date.month() == month
    && date.day() == day)
    .then_some(date)
}

fn parse_calendar_date(
  token: &str
) -> Option<NaiveDate> {
  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, ISO_FORMAT
    )
  {
    return Some(date);
  }

  // A full timestamp resolves to the
  // calendar day it was written in.
  DateTime::parse_from_rfc3339(token)
    .ok()
    .map(|dt| dt.date_naive())
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|next| next.pred_opt())
  .unwrap_or(NaiveDate::MAX)
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

#[must_use]
pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

/// Moves the anchor by whole calendar
/// months. The day of month is clamped
/// into the target month.
#[must_use]
pub fn shift_month(
  anchor: NaiveDate,
  months: i32
) -> NaiveDate {
  let total = anchor.year() as i64 * 12
    + anchor.month0() as i64
    + months as i64;
  let year = total.div_euclid(12) as i32;
  let month =
    total.rem_euclid(12) as u32 + 1;

  let day = anchor
    .day()
    .min(days_in_month(year, month));
  let shifted = NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(if months < 0 {
    NaiveDate::MIN
  } else {
    NaiveDate::MAX
  });
  clamp_grid_anchor(shifted)
}

/// Earliest and latest anchors whose
/// six-week window fits inside chrono's
/// date range, whatever the week start.
#[must_use]
pub fn grid_anchor_bounds()
-> (NaiveDate, NaiveDate) {
  let lower = NaiveDate::MIN
    .checked_add_months(Months::new(1))
    .map(|date| {
      first_day_of_month(
        date.year(),
        date.month()
      )
    })
    .unwrap_or(NaiveDate::MIN);
  let upper = NaiveDate::MAX
    .checked_sub_months(Months::new(1))
    .map(|date| {
      last_day_of_month(
        date.year(),
        date.month()
      )
    })
    .unwrap_or(NaiveDate::MAX);
  (lower, upper)
}

#[must_use]
pub fn clamp_grid_anchor(
  anchor: NaiveDate
) -> NaiveDate {
  let (lower, upper) =
    grid_anchor_bounds();
  anchor.clamp(lower, upper)
}

/// Builds the six-week grid shown for
/// the anchor's month. Only the anchor's
/// year and month matter. Anchors in the
/// first or last month chrono can
/// represent show the neighbouring month
/// instead.
#[must_use]
pub fn generate_calendar_grid(
  anchor: NaiveDate,
  selected: Option<NaiveDate>,
  today: NaiveDate,
  week_start: Weekday
) -> Vec<CalendarDay> {
  let anchor = clamp_grid_anchor(anchor);
  let first = first_day_of_month(
    anchor.year(),
    anchor.month()
  );
  let grid_start =
    start_of_week(first, week_start);

  (0..GRID_DAYS as i64)
    .map(|offset| {
      let date =
        add_days(grid_start, offset);
      CalendarDay {
        date,
        is_current_month: date.year()
          == anchor.year()
          && date.month()
            == anchor.month(),
        is_today: date == today,
        is_selected: selected
          == Some(date)
      }
    })
    .collect()
}

pub fn weekday_labels(
  week_start: Weekday
) -> [&'static str; 7] {
  match week_start {
    | Weekday::Mon => {
      [
        "Mo", "Tu", "We", "Th", "Fr",
        "Sa", "Su"
      ]
    }
    | _ => {
      [
        "Su", "Mo", "Tu", "We", "Th",
        "Fr", "Sa"
      ]
    }
  }
}

#[must_use]
pub fn month_title(
  anchor: NaiveDate
) -> String {
  anchor.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
  use chrono::{
    Datelike,
    NaiveDate,
    TimeZone,
    Utc,
    Weekday
  };

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn display_round_trip() {
    let parsed =
      parse_date_input("06/15/2024")
        .expect("parse display date");
    assert_eq!(
      format_display(parsed),
      "06/15/2024"
    );
    assert_eq!(
      format_iso(parsed),
      "2024-06-15"
    );
  }

  #[test]
  fn format_then_parse_is_identity() {
    let mut day = date(1999, 12, 25);
    for _ in 0..800 {
      assert_eq!(
        parse_date_input(&format_display(
          day
        )),
        Some(day)
      );
      assert_eq!(
        parse_iso(&format_iso(day)),
        Some(day)
      );
      day = add_days(day, 3);
    }
  }

  #[test]
  fn display_round_trips_outside_four_digit_years()
  {
    for day in [
      date(10000, 1, 5),
      date(262_000, 7, 31),
      date(-44, 3, 15),
      date(0, 2, 29),
    ] {
      let shown = format_display(day);
      assert_eq!(
        parse_date_input(&shown),
        Some(day),
        "{shown}"
      );
    }
    assert_eq!(
      format_display(date(10000, 1, 5)),
      "01/05/+10000"
    );
    assert_eq!(
      shift_month(date(9999, 12, 1), 1),
      date(10000, 1, 1)
    );
    assert_eq!(
      parse_date_input("01/05/10000"),
      Some(date(10000, 1, 5))
    );
    assert_eq!(
      parse_date_input("01/05/+999"),
      None
    );
  }

  #[test]
  fn rejects_overflowing_display_dates()
  {
    assert_eq!(
      parse_date_input("02/31/2024"),
      None
    );
    assert_eq!(
      parse_date_input("13/01/2024"),
      None
    );
    assert_eq!(
      parse_date_input("02/30/2023"),
      None
    );
    assert_eq!(
      parse_date_input("02/29/2024"),
      Some(date(2024, 2, 29))
    );
  }

  #[test]
  fn falls_back_to_iso() {
    assert_eq!(
      parse_date_input("2024-06-15"),
      Some(date(2024, 6, 15))
    );
    assert_eq!(
      parse_date_input(
        "2024-06-15T23:30:00+02:00"
      ),
      Some(date(2024, 6, 15))
    );
    assert_eq!(
      parse_date_input("2024-02-31"),
      None
    );
  }

  #[test]
  fn partial_input_is_unresolved() {
    for text in [
      "", "0", "06/", "06/15", "06/15/",
      "06/15/20", "june", "aa/bb/cccc",
      "06/15/2024/1",
    ] {
      assert_eq!(
        parse_date_input(text),
        None,
        "{text:?}"
      );
    }
  }

  #[test]
  fn grid_always_has_six_full_weeks() {
    let mut anchor = date(2023, 1, 1);
    for _ in 0..36 {
      for week_start in
        [Weekday::Sun, Weekday::Mon]
      {
        let grid = generate_calendar_grid(
          anchor,
          None,
          date(2000, 1, 1),
          week_start
        );
        assert_eq!(grid.len(), GRID_DAYS);
        assert_eq!(
          grid[0].date.weekday(),
          week_start
        );
        assert_eq!(
          grid[41].date.weekday(),
          week_start.pred()
        );
        assert!(grid[0].date <= first_day_of_month(anchor.year(), anchor.month()));
        assert!(
          grid
            .windows(2)
            .all(|pair| add_days(pair[0].date, 1) == pair[1].date)
        );
        let in_month = grid
          .iter()
          .filter(|day| day.is_current_month)
          .count() as u32;
        assert_eq!(
          in_month,
          days_in_month(
            anchor.year(),
            anchor.month()
          )
        );
      }
      anchor = shift_month(anchor, 1);
    }
  }

  #[test]
  fn grid_stays_whole_at_range_limits() {
    let (lower, upper) =
      grid_anchor_bounds();
    for anchor in [
      NaiveDate::MAX,
      NaiveDate::MIN,
      upper,
      lower,
    ] {
      for week_start in
        [Weekday::Sun, Weekday::Mon]
      {
        let first_pass = generate_calendar_grid(
          anchor,
          None,
          date(2000, 1, 1),
          week_start
        );
        let grid = generate_calendar_grid(
          anchor,
          Some(first_pass[0].date),
          date(2000, 1, 1),
          week_start
        );
        assert_eq!(grid.len(), GRID_DAYS);
        assert_eq!(
          grid[0].date.weekday(),
          week_start
        );
        assert_eq!(
          grid[41].date.weekday(),
          week_start.pred()
        );
        assert!(grid.windows(2).all(|pair| {
          pair[0].date.succ_opt()
            == Some(pair[1].date)
        }));
        assert_eq!(
          grid
            .iter()
            .filter(|day| day.is_selected)
            .count(),
          1
        );
        assert!(
          grid
            .iter()
            .any(|day| day.is_current_month)
        );
      }
    }
  }

  #[test]
  fn month_shift_stops_at_range_limits() {
    let (lower, upper) =
      grid_anchor_bounds();
    assert_eq!(shift_month(upper, 1), upper);
    assert_eq!(
      shift_month(upper, i32::MAX),
      upper
    );
    assert_eq!(
      shift_month(lower, -1),
      lower
    );
    assert_eq!(
      shift_month(lower, i32::MIN),
      lower
    );
    assert!(shift_month(upper, -1) < upper);
    assert_eq!(
      clamp_grid_anchor(NaiveDate::MAX),
      upper
    );
  }

  #[test]
  fn grid_ignores_anchor_day_of_month() {
    let early = generate_calendar_grid(
      date(2024, 6, 1),
      None,
      date(2024, 6, 10),
      Weekday::Sun
    );
    let late = generate_calendar_grid(
      date(2024, 6, 30),
      None,
      date(2024, 6, 10),
      Weekday::Sun
    );
    assert_eq!(early, late);
  }

  #[test]
  fn today_flag_only_inside_window() {
    let anchor = date(2024, 6, 15);
    let grid = generate_calendar_grid(
      anchor,
      None,
      date(2024, 7, 3),
      Weekday::Sun
    );
    assert_eq!(
      grid
        .iter()
        .filter(|day| day.is_today)
        .count(),
      1
    );
    let today = grid
      .iter()
      .find(|day| day.is_today)
      .expect("today in window");
    assert!(!today.is_current_month);

    let far = generate_calendar_grid(
      anchor,
      None,
      date(2025, 1, 1),
      Weekday::Sun
    );
    assert!(far.iter().all(|day| !day.is_today));
  }

  #[test]
  fn selection_uses_calendar_day_equality()
  {
    let instant = Utc
      .with_ymd_and_hms(
        2024, 6, 15, 23, 59, 0
      )
      .single()
      .expect("valid instant");
    let selected = to_local_date(
      instant,
      chrono_tz::UTC
    );
    let grid = generate_calendar_grid(
      date(2024, 6, 1),
      Some(selected),
      date(2024, 6, 1),
      Weekday::Sun
    );
    let marked: Vec<_> = grid
      .iter()
      .filter(|day| day.is_selected)
      .collect();
    assert_eq!(marked.len(), 1);
    assert_eq!(
      marked[0].date,
      date(2024, 6, 15)
    );
  }

  #[test]
  fn month_shift_rolls_years() {
    assert_eq!(
      shift_month(date(2024, 12, 15), 1),
      date(2025, 1, 15)
    );
    assert_eq!(
      shift_month(date(2024, 1, 15), -1),
      date(2023, 12, 15)
    );
    assert_eq!(
      shift_month(date(2024, 1, 31), 1),
      date(2024, 2, 29)
    );
    assert_eq!(
      shift_month(date(2024, 3, 10), -27),
      date(2021, 12, 10)
    );
  }

  #[test]
  fn timezone_and_week_start_parsing() {
    assert_eq!(
      parse_timezone(
        "America/Chicago",
        "test"
      ),
      Some(chrono_tz::America::Chicago)
    );
    assert_eq!(
      parse_timezone("Mars/Olympus", "test"),
      None
    );
    assert_eq!(
      parse_week_start("Monday"),
      Some(Weekday::Mon)
    );
    assert_eq!(
      parse_week_start("friday"),
      None
    );
  }

  #[test]
  fn labels_and_title() {
    assert_eq!(
      weekday_labels(Weekday::Sun)[0],
      "Su"
    );
    assert_eq!(
      weekday_labels(Weekday::Mon)[6],
      "Su"
    );
    assert_eq!(
      month_title(date(2024, 6, 15)),
      "June 2024"
    );
  }
}
