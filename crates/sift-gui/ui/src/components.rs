use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Datelike, NaiveDate, Weekday};
use gloo::events::EventListener;
use sift_core::config::DatePickerSettings;
use sift_core::datetime::{CalendarDay, Clock, SystemClock, month_title, weekday_labels};
use sift_core::dismiss::DismissEvent;
use sift_core::error::PanelError;
use sift_core::panel::{DateFieldHandle, FilterPanel, PanelCallbacks};
use sift_core::position::{FlyoutPosition, TriggerGeometry};
use sift_core::render::FieldWidget;
use sift_core::schema::{FilterConfig, WidthHint};
use sift_core::store::{AppliedFilters, FilterValues};
use wasm_bindgen::JsCast;
use web_sys::{
    Event, FocusEvent, HtmlInputElement, HtmlSelectElement, InputEvent, KeyboardEvent, MouseEvent,
};
use yew::{
    Callback, Html, Properties, TargetCast, classes, function_component, html, use_effect_with,
    use_force_update, use_mut_ref, use_state,
};

use crate::dom::{GlooDismissHost, trigger_geometry};

type Panel = FilterPanel<GlooDismissHost>;

#[derive(Properties, PartialEq)]
pub struct FilterPanelProps {
    pub config: FilterConfig,
    pub applied: AppliedFilters,
    pub open: bool,
    pub settings: DatePickerSettings,
    pub on_apply: Callback<FilterValues>,
    pub on_clear: Callback<()>,
    pub on_close: Callback<()>,
}

#[derive(Clone)]
struct Outlets {
    on_apply: Callback<FilterValues>,
    on_clear: Callback<()>,
    on_close: Callback<()>,
}

/// Collects what the panel emitted so it can be forwarded after the
/// panel borrow is released.
#[derive(Default)]
struct Outcome {
    applied: Option<FilterValues>,
    cleared: bool,
    closed: bool,
}

impl PanelCallbacks for Outcome {
    fn on_apply(&mut self, values: FilterValues) {
        self.applied = Some(values);
    }

    fn on_clear(&mut self) {
        self.cleared = true;
    }

    fn on_close(&mut self) {
        self.closed = true;
    }
}

impl Outcome {
    fn forward(self, outlets: &Outlets) {
        if let Some(values) = self.applied {
            outlets.on_apply.emit(values);
        }
        if self.cleared {
            outlets.on_clear.emit(());
        }
        if self.closed {
            outlets.on_close.emit(());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PanelAction {
    Apply,
    Clear,
    Cancel,
    Dismiss(DismissEvent),
}

#[derive(Debug, Clone)]
enum DateAction {
    Focus(TriggerGeometry),
    Toggle(TriggerGeometry),
    Input(String),
    Pick(NaiveDate),
    Today,
    PreviousMonth,
    NextMonth,
}

fn run_panel_action(panel: &Rc<RefCell<Panel>>, outlets: &Outlets, action: PanelAction) {
    let mut outcome = Outcome::default();
    let result = {
        let Ok(mut panel) = panel.try_borrow_mut() else {
            tracing::warn!(?action, "filter panel busy; action dropped");
            return;
        };
        match action {
            PanelAction::Apply => panel.apply(&mut outcome).map(drop),
            PanelAction::Clear => panel.clear(&mut outcome),
            PanelAction::Cancel => panel.cancel(&mut outcome),
            PanelAction::Dismiss(event) => panel.dismiss(event, &mut outcome).map(drop),
        }
    };
    if let Err(error) = result {
        tracing::warn!(%error, ?action, "filter panel action ignored");
    }
    outcome.forward(outlets);
}

fn run_date_action(
    field: &mut DateFieldHandle<'_, GlooDismissHost>,
    action: DateAction,
) -> Result<(), PanelError> {
    match action {
        DateAction::Focus(geometry) => field.focus(geometry),
        DateAction::Toggle(geometry) => field.toggle(geometry),
        DateAction::Input(text) => return field.input(&text),
        DateAction::Pick(date) => return field.select_day(date).map(drop),
        DateAction::Today => return field.select_today().map(drop),
        DateAction::PreviousMonth => field.previous_month(),
        DateAction::NextMonth => field.next_month(),
    }
    Ok(())
}

#[function_component(FilterPanelView)]
pub fn filter_panel_view(props: &FilterPanelProps) -> Html {
    let force_update = use_force_update();
    let dismissal = use_state(|| None::<(String, DismissEvent)>);
    let panel = {
        let setter = dismissal.setter();
        let settings = props.settings;
        use_mut_ref(move || {
            let host = GlooDismissHost::new(Callback::from(move |message| {
                setter.set(Some(message));
            }));
            let clock: Rc<dyn Clock> = Rc::new(SystemClock::new(None));
            FilterPanel::new(host, clock, settings)
        })
    };
    let outlets = Outlets {
        on_apply: props.on_apply.clone(),
        on_clear: props.on_clear.clone(),
        on_close: props.on_close.clone(),
    };

    {
        let panel = panel.clone();
        let force_update = force_update.clone();
        use_effect_with(
            (props.open, props.config.clone(), props.applied.clone()),
            move |(open, config, applied)| {
                {
                    let mut panel = panel.borrow_mut();
                    if *open {
                        panel.open(config, applied);
                    } else if panel.is_open()
                        && let Err(error) = panel.cancel(&mut Outcome::default())
                    {
                        tracing::warn!(%error, "failed to close filter panel");
                    }
                }
                force_update.force_update();
                || ()
            },
        );
    }

    {
        let panel = panel.clone();
        let dismissal = dismissal.clone();
        let force_update = force_update.clone();
        use_effect_with((*dismissal).clone(), move |message| {
            if let Some((owner, event)) = message {
                match panel.borrow_mut().date_field_mut(owner) {
                    Ok(mut field) => field.dismiss(*event),
                    Err(error) => {
                        tracing::debug!(%error, owner = %owner, "dismissal for a field no longer shown");
                    }
                }
                dismissal.set(None);
                force_update.force_update();
            }
            || ()
        });
    }

    {
        let panel = panel.clone();
        let outlets = outlets.clone();
        let force_update = force_update.clone();
        use_effect_with(props.open, move |open| {
            let document = web_sys::window().and_then(|window| window.document());
            let listener = document.filter(|_| *open).map(|document| {
                EventListener::new(&document, "keydown", move |event| {
                    let escape = event
                        .dyn_ref::<KeyboardEvent>()
                        .and_then(|key| DismissEvent::from_key(&key.key()));
                    if let Some(escape) = escape {
                        let panel = panel.clone();
                        let outlets = outlets.clone();
                        let force_update = force_update.clone();
                        wasm_bindgen_futures::spawn_local(async move {
                            run_panel_action(&panel, &outlets, PanelAction::Dismiss(escape));
                            force_update.force_update();
                        });
                    }
                })
            });
            move || drop(listener)
        });
    }

    let on_value = {
        let panel = panel.clone();
        let force_update = force_update.clone();
        Callback::from(move |(key, value): (String, String)| {
            if let Err(error) = panel.borrow_mut().set_value(&key, value) {
                tracing::warn!(%error, key = %key, "filter value rejected");
            }
            force_update.force_update();
        })
    };

    let on_date = {
        let panel = panel.clone();
        let force_update = force_update.clone();
        Callback::from(move |(key, action): (String, DateAction)| {
            let result = match panel.borrow_mut().date_field_mut(&key) {
                Ok(mut field) => run_date_action(&mut field, action),
                Err(error) => Err(error),
            };
            if let Err(error) = result {
                tracing::warn!(%error, key = %key, "date action ignored");
            }
            force_update.force_update();
        })
    };

    let action = |action: PanelAction| {
        let panel = panel.clone();
        let outlets = outlets.clone();
        let force_update = force_update.clone();
        Callback::from(move |_: MouseEvent| {
            run_panel_action(&panel, &outlets, action);
            force_update.force_update();
        })
    };

    let panel_ref = panel.borrow();
    let Ok(view) = panel_ref.view() else {
        return html! {};
    };
    let week_start = props.settings.week_start;

    let rows: Vec<Html> = view
        .rows
        .iter()
        .map(|row| {
            let cells: Vec<Html> = row
                .iter()
                .map(|widget| {
                    let grid = match widget {
                        FieldWidget::Date {
                            field, open: true, ..
                        } => panel_ref
                            .date_field(&field.key)
                            .ok()
                            .and_then(|date| date.grid()),
                        _ => None,
                    };
                    field_view(widget, grid, week_start, &on_value, &on_date)
                })
                .collect();
            html! { <div class="filter-row">{ for cells }</div> }
        })
        .collect();

    html! {
        <>
            <div
                class="filter-backdrop"
                onmousedown={action(PanelAction::Dismiss(DismissEvent::OutsideClick))}
            ></div>
            <div class="panel filter-panel" role="dialog">
                <div class="header">
                    <span>{ view.title }</span>
                    <span class="badge">{ format!("{} active", view.active_count) }</span>
                </div>
                <div class="filter-rows">{ for rows }</div>
                <div class="filter-actions">
                    <button type="button" class="secondary" onclick={action(PanelAction::Clear)}>{ "Clear" }</button>
                    <button type="button" class="secondary" onclick={action(PanelAction::Cancel)}>{ "Cancel" }</button>
                    <button type="button" class="primary" onclick={action(PanelAction::Apply)}>{ "Apply" }</button>
                </div>
            </div>
        </>
    }
}

fn field_view(
    widget: &FieldWidget<'_>,
    grid: Option<Vec<CalendarDay>>,
    week_start: Weekday,
    on_value: &Callback<(String, String)>,
    on_date: &Callback<(String, DateAction)>,
) -> Html {
    let field = widget.field();
    let key = field.key.clone();
    let placeholder = field.placeholder.clone().unwrap_or_default();
    let class = classes!(
        "filter-field",
        (field.width == WidthHint::Full).then_some("full")
    );

    let control = match widget {
        FieldWidget::Text { value, .. } | FieldWidget::Number { value, .. } => {
            let input_type = if matches!(widget, FieldWidget::Number { .. }) {
                "number"
            } else {
                "text"
            };
            let on_value = on_value.clone();
            let oninput = move |e: InputEvent| {
                let input: HtmlInputElement = e.target_unchecked_into();
                on_value.emit((key.clone(), input.value()));
            };
            html! {
                <input type={input_type} value={value.to_string()} {placeholder} {oninput} />
            }
        }
        FieldWidget::Select { options, value, .. } => {
            let on_value = on_value.clone();
            let onchange = move |e: Event| {
                let select: HtmlSelectElement = e.target_unchecked_into();
                on_value.emit((key.clone(), select.value()));
            };
            html! {
                <select {onchange}>
                    <option value="" selected={value.is_empty()}>{ "Any" }</option>
                    {
                        for options.iter().map(|option| html! {
                            <option value={option.value.clone()} selected={option.value == *value}>
                                { &option.label }
                            </option>
                        })
                    }
                </select>
            }
        }
        FieldWidget::Date {
            text,
            position,
            month_anchor,
            ..
        } => {
            let flyout = match (position, month_anchor, grid) {
                (Some(position), Some(anchor), Some(grid)) => Some((*position, *anchor, grid)),
                _ => None,
            };
            date_field_view(key, text, placeholder, flyout, week_start, on_date)
        }
    };

    html! {
        <div {class}>
            <label class="filter-label">{ &field.label }</label>
            { control }
        </div>
    }
}

fn date_field_view(
    key: String,
    text: &str,
    placeholder: String,
    flyout: Option<(FlyoutPosition, NaiveDate, Vec<CalendarDay>)>,
    week_start: Weekday,
    on_date: &Callback<(String, DateAction)>,
) -> Html {
    let onfocus = {
        let on_date = on_date.clone();
        let key = key.clone();
        move |e: FocusEvent| {
            if let Some(geometry) = trigger_geometry(&e) {
                on_date.emit((key.clone(), DateAction::Focus(geometry)));
            }
        }
    };
    let oninput = {
        let on_date = on_date.clone();
        let key = key.clone();
        move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            on_date.emit((key.clone(), DateAction::Input(input.value())));
        }
    };
    let ontoggle = {
        let on_date = on_date.clone();
        let key = key.clone();
        move |e: MouseEvent| {
            if let Some(geometry) = trigger_geometry(&e) {
                on_date.emit((key.clone(), DateAction::Toggle(geometry)));
            }
        }
    };

    let calendar = match flyout {
        Some((position, anchor, grid)) => {
            calendar_view(&key, position, anchor, &grid, week_start, on_date)
        }
        None => html! {},
    };

    html! {
        <div class="date-field" data-date-field={key.clone()}>
            <div class="date-input">
                <input type="text" value={text.to_string()} {placeholder} {onfocus} {oninput} />
                <button type="button" class="calendar-toggle" onclick={ontoggle}>{ "▾" }</button>
            </div>
            { calendar }
        </div>
    }
}

fn calendar_view(
    key: &str,
    position: FlyoutPosition,
    anchor: NaiveDate,
    grid: &[CalendarDay],
    week_start: Weekday,
    on_date: &Callback<(String, DateAction)>,
) -> Html {
    let emit = |action: DateAction| {
        let on_date = on_date.clone();
        let key = key.to_string();
        Callback::from(move |_: MouseEvent| on_date.emit((key.clone(), action.clone())))
    };
    let class = classes!(
        "date-flyout",
        format!("align-{}", position.placement.as_key())
    );
    let style = format!("width:{}px;", position.width);

    html! {
        <div {class} {style}>
            <div class="flyout-header">
                <button type="button" onclick={emit(DateAction::PreviousMonth)}>{ "‹" }</button>
                <span class="flyout-title">{ month_title(anchor) }</span>
                <button type="button" onclick={emit(DateAction::NextMonth)}>{ "›" }</button>
            </div>
            <div class="flyout-grid">
                {
                    for weekday_labels(week_start).into_iter().map(|label| html! {
                        <span class="weekday">{ label }</span>
                    })
                }
                {
                    for grid.iter().map(|day| {
                        let class = classes!(
                            "day",
                            (!day.is_current_month).then_some("outside"),
                            day.is_today.then_some("today"),
                            day.is_selected.then_some("selected")
                        );
                        html! {
                            <button type="button" {class} onclick={emit(DateAction::Pick(day.date))}>
                                { day.date.day() }
                            </button>
                        }
                    })
                }
            </div>
            <div class="flyout-footer">
                <button type="button" onclick={emit(DateAction::Today)}>{ "Today" }</button>
            </div>
        </div>
    }
}
