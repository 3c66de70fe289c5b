use std::rc::Rc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::cli::{Command, KeyVal, MonthArg};
use crate::config::Settings;
use crate::datetime::{
    Clock, format_display, format_iso, generate_calendar_grid, month_title, parse_date_input,
};
use crate::dismiss::NoopDismissHost;
use crate::panel::{FilterPanel, PanelCallbacks};
use crate::position::{Rect, TriggerGeometry, resolve_flyout};
use crate::presets::{Screen, load_filter_config};
use crate::render::Renderer;
use crate::schema::{FieldKind, FilterConfig};
use crate::store::{AppliedFilters, FilterValues};

#[instrument(skip(settings, clock, renderer, command), fields(command = command.name()))]
pub fn dispatch(
    settings: &Settings,
    clock: &dyn Clock,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!("dispatching command");

    match command {
        Command::Rows { source } => cmd_rows(renderer, &source),
        Command::Calendar { month, selected } => {
            cmd_calendar(settings, clock, renderer, month, selected.as_deref())
        }
        Command::Parse { text } => cmd_parse(&text),
        Command::Place {
            left,
            right,
            viewport,
        } => cmd_place(settings, left, right, viewport),
        Command::Apply {
            source,
            applied,
            set,
            json,
        } => cmd_apply(settings, renderer, &source, applied, &set, json),
        Command::Screens => cmd_screens(),
    }
}

fn cmd_rows(renderer: &mut Renderer, source: &str) -> anyhow::Result<()> {
    let config = load_filter_config(source)?;
    info!(fields = config.fields().len(), "command rows");
    renderer.print_rows(&config)
}

fn cmd_calendar(
    settings: &Settings,
    clock: &dyn Clock,
    renderer: &mut Renderer,
    month: Option<MonthArg>,
    selected: Option<&str>,
) -> anyhow::Result<()> {
    let selected = match selected {
        Some(raw) => Some(
            parse_date_input(raw).ok_or_else(|| anyhow!("cannot read `{raw}` as a date"))?,
        ),
        None => None,
    };
    let today = clock.today();
    let anchor = month
        .map(|MonthArg(first)| first)
        .or(selected)
        .unwrap_or(today);
    let week_start = settings.date_picker.week_start;

    let grid = generate_calendar_grid(anchor, selected, today, week_start);
    info!(month = %month_title(anchor), "command calendar");
    renderer.print_calendar(anchor, &grid, week_start)
}

fn cmd_parse(text: &str) -> anyhow::Result<()> {
    match parse_date_input(text) {
        Some(date) => println!("{} {}", format_iso(date), format_display(date)),
        None => println!("unresolved"),
    }
    Ok(())
}

fn cmd_place(settings: &Settings, left: f64, right: f64, viewport: f64) -> anyhow::Result<()> {
    if right < left {
        return Err(anyhow!("trigger right edge {right} is left of its left edge {left}"));
    }
    let geometry = TriggerGeometry::new(Rect::new(left, right), viewport);
    let position = resolve_flyout(geometry, settings.date_picker.metrics);
    println!(
        "placement={} width={}",
        position.placement.as_key(),
        position.width
    );
    Ok(())
}

#[instrument(skip(settings, renderer, applied, set))]
fn cmd_apply(
    settings: &Settings,
    renderer: &mut Renderer,
    source: &str,
    applied: Vec<KeyVal>,
    set: &[KeyVal],
    json: bool,
) -> anyhow::Result<()> {
    let config = load_filter_config(source)?;
    let applied: AppliedFilters = applied.into_iter().map(|kv| (kv.key, kv.value)).collect();
    let clock: Rc<dyn Clock> = Rc::new(settings.clock());

    let values = run_apply_session(&config, &applied, set, settings, clock)?;

    if json {
        let out = serde_json::to_string_pretty(&values)?;
        println!("{out}");
        return Ok(());
    }
    renderer.print_values(&config, &values)
}

/// Callbacks that keep what the panel emitted.
#[derive(Debug, Default)]
struct Emitted {
    applied: Option<FilterValues>,
    closed: bool,
}

impl PanelCallbacks for Emitted {
    fn on_apply(&mut self, values: FilterValues) {
        self.applied = Some(values);
    }

    fn on_clear(&mut self) {}

    fn on_close(&mut self) {
        self.closed = true;
    }
}

/// Drives one open, edit, apply cycle. Date fields take their edits as
/// typed text so either input format is accepted.
pub fn run_apply_session(
    config: &FilterConfig,
    applied: &AppliedFilters,
    edits: &[KeyVal],
    settings: &Settings,
    clock: Rc<dyn Clock>,
) -> anyhow::Result<FilterValues> {
    let mut panel = FilterPanel::new(NoopDismissHost, clock, settings.date_picker);
    panel.open(config, applied);

    for edit in edits {
        let kind = config
            .field(&edit.key)
            .map(|field| field.kind)
            .ok_or_else(|| anyhow!("`{}` is not a field of {}", edit.key, config.title()))?;

        if kind == FieldKind::Date {
            let mut handle = panel.date_field_mut(&edit.key)?;
            handle.input(&edit.value)?;
            if !edit.value.trim().is_empty() && handle.field().selected().is_none() {
                warn!(key = %edit.key, text = %edit.value, "date text did not resolve; value kept");
            }
        } else {
            panel
                .set_value(&edit.key, edit.value.clone())
                .with_context(|| format!("failed to set `{}`", edit.key))?;
        }
    }

    let mut emitted = Emitted::default();
    panel.apply(&mut emitted)?;
    debug!(closed = emitted.closed, "panel session finished");
    emitted
        .applied
        .ok_or_else(|| anyhow!("panel closed without emitting values"))
}

fn cmd_screens() -> anyhow::Result<()> {
    for screen in Screen::ALL {
        let config = screen.config()?;
        println!("{screen}\t{}", config.title());
    }
    Ok(())
}
