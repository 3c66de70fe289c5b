use gloo::events::EventListener;
use sift_core::dismiss::{
  DismissEvent,
  DismissHost,
  DismissSubscription
};
use sift_core::position::{
  Rect,
  TriggerGeometry
};
use wasm_bindgen::JsCast;
use web_sys::{
  Element,
  Event,
  KeyboardEvent
};
use yew::Callback;

/// Marks the wrapper holding a date
/// input and its flyout. Clicks inside
/// it are never outside clicks.
pub const DATE_FIELD_ATTR: &str =
  "data-date-field";

/// Routes document clicks and Escape
/// presses back to the owning date
/// field.
#[derive(Clone)]
pub struct GlooDismissHost {
  on_dismiss:
    Callback<(String, DismissEvent)>
}

impl GlooDismissHost {
  pub fn new(
    on_dismiss: Callback<(
      String,
      DismissEvent
    )>
  ) -> Self {
    Self {
      on_dismiss
    }
  }
}

impl DismissHost for GlooDismissHost {
  fn subscribe(
    &self,
    owner: &str
  ) -> DismissSubscription {
    let Some(document) =
      web_sys::window()
        .and_then(|window| {
          window.document()
        })
    else {
      tracing::warn!(
        owner,
        "no document; flyout opens \
         without dismiss listeners"
      );
      return DismissSubscription::new(
        owner,
        ()
      );
    };

    let click = {
      let owner = owner.to_string();
      let on_dismiss =
        self.on_dismiss.clone();
      EventListener::new(
        &document,
        "mousedown",
        move |event| {
          if !is_inside_field(
            event, &owner
          ) {
            emit_later(
              &on_dismiss,
              &owner,
              DismissEvent::OutsideClick
            );
          }
        }
      )
    };

    let keydown = {
      let owner = owner.to_string();
      let on_dismiss =
        self.on_dismiss.clone();
      EventListener::new(
        &document,
        "keydown",
        move |event| {
          let dismiss = event
            .dyn_ref::<KeyboardEvent>()
            .and_then(|key| {
              DismissEvent::from_key(
                &key.key()
              )
            });
          if let Some(dismiss) = dismiss
          {
            emit_later(
              &on_dismiss,
              &owner,
              dismiss
            );
          }
        }
      )
    };

    tracing::trace!(
      owner,
      "registered document listeners"
    );
    DismissSubscription::new(
      owner,
      (click, keydown)
    )
  }
}

/// Emits after the current handler
/// returns, so the listener being run is
/// not dropped from inside itself.
fn emit_later(
  on_dismiss: &Callback<(
    String,
    DismissEvent
  )>,
  owner: &str,
  event: DismissEvent
) {
  let on_dismiss = on_dismiss.clone();
  let owner = owner.to_string();
  wasm_bindgen_futures::spawn_local(
    async move {
      on_dismiss.emit((owner, event));
    }
  );
}

fn event_element(
  event: &Event
) -> Option<Element> {
  event
    .target()?
    .dyn_into::<Element>()
    .ok()
}

fn is_inside_field(
  event: &Event,
  owner: &str
) -> bool {
  let selector = format!(
    "[{DATE_FIELD_ATTR}=\"{owner}\"]"
  );
  event_element(event)
    .and_then(|element| {
      element
        .closest(&selector)
        .ok()
        .flatten()
    })
    .is_some()
}

/// Measures the date field wrapper that
/// received `event` against the current
/// viewport.
pub fn trigger_geometry(
  event: &Event
) -> Option<TriggerGeometry> {
  let element = event_element(event)?;
  let wrapper = element
    .closest(&format!(
      "[{DATE_FIELD_ATTR}]"
    ))
    .ok()
    .flatten()
    .unwrap_or(element);
  let rect =
    wrapper.get_bounding_client_rect();
  let viewport_width = web_sys::window()?
    .inner_width()
    .ok()?
    .as_f64()?;

  Some(TriggerGeometry::new(
    Rect::new(rect.left(), rect.right()),
    viewport_width
  ))
}
