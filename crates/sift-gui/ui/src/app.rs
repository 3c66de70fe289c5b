use std::collections::BTreeMap;

use sift_core::config::DatePickerSettings;
use sift_core::presets::Screen;
use sift_core::schema::FilterConfig;
use sift_core::store::{
  AppliedFilters,
  FilterValues,
  active_filter_count
};
use yew::{
  Callback,
  Html,
  MouseEvent,
  classes,
  function_component,
  html,
  use_memo,
  use_state
};

use crate::components::FilterPanelView;

#[function_component(App)]
pub fn app() -> Html {
  let screen =
    use_state(|| Screen::Songs);
  let applied = use_state(
    BTreeMap::<Screen, AppliedFilters>::new
  );
  let panel_open = use_state(|| false);
  let settings =
    DatePickerSettings::default();

  let config =
    use_memo(*screen, |screen| {
      screen.config()
    });
  let current_applied = applied
    .get(&*screen)
    .cloned()
    .unwrap_or_default();

  let on_apply = {
    let applied = applied.clone();
    let screen = *screen;
    Callback::from(
      move |values: FilterValues| {
        tracing::info!(
          screen = %screen,
          active = values.active_count(),
          "committed filters"
        );
        let mut next = (*applied).clone();
        next.insert(
          screen,
          values.into_map()
        );
        applied.set(next);
      }
    )
  };

  let on_clear = {
    let applied = applied.clone();
    let screen = *screen;
    Callback::from(move |()| {
      tracing::info!(
        screen = %screen,
        "cleared filters"
      );
      let mut next = (*applied).clone();
      next.remove(&screen);
      applied.set(next);
    })
  };

  let on_close = {
    let panel_open = panel_open.clone();
    Callback::from(move |()| {
      panel_open.set(false)
    })
  };

  let on_open = {
    let panel_open = panel_open.clone();
    move |_: MouseEvent| {
      panel_open.set(true)
    }
  };

  let tabs = Screen::ALL.into_iter().map(
    |item| {
      let screen = screen.clone();
      let class = classes!(
        "item",
        (item == *screen)
          .then_some("active")
      );
      html! {
          <div {class} onclick={move |_| screen.set(item)}>
              { item.as_key() }
          </div>
      }
    }
  );

  let body = match &*config {
    | Ok(config) => {
      html! {
          <>
              { applied_summary(config, &current_applied) }
              <FilterPanelView
                  config={config.clone()}
                  applied={current_applied.clone()}
                  open={*panel_open}
                  {settings}
                  {on_apply}
                  {on_clear}
                  {on_close}
              />
          </>
      }
    }
    | Err(error) => {
      tracing::error!(
        screen = %*screen,
        %error,
        "built-in filter config is invalid"
      );
      html! {
          <div class="error">{ error.to_string() }</div>
      }
    }
  };

  let active =
    active_filter_count(&current_applied);

  html! {
      <div class="layout">
          <div class="panel sidebar">
              <div class="header">{ "Screens" }</div>
              { for tabs }
          </div>
          <div class="panel main">
              <div class="header">
                  <span>{ screen.as_key() }</span>
                  <button type="button" class="primary" onclick={on_open}>
                      { if active == 0 { "Filters".to_string() } else { format!("Filters ({active})") } }
                  </button>
              </div>
              { body }
          </div>
      </div>
  }
}

fn applied_summary(
  config: &FilterConfig,
  applied: &AppliedFilters
) -> Html {
  let chips: Vec<Html> = config
    .fields()
    .iter()
    .filter_map(|field| {
      let value = applied
        .get(&field.key)
        .filter(|value| !value.is_empty())?;
      let shown = field
        .option_label(value)
        .unwrap_or(value.as_str());
      Some(html! {
          <span class="badge">{ format!("{}: {shown}", field.label) }</span>
      })
    })
    .collect();

  if chips.is_empty() {
    return html! {
        <div class="details muted">{ "No filters applied." }</div>
    };
  }

  html! {
      <div class="details chips">{ for chips }</div>
  }
}
