use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::DatePickerSettings;
use crate::date_field::DateField;
use crate::datetime::{CalendarDay, Clock};
use crate::dismiss::{DismissEvent, DismissHost};
use crate::error::PanelError;
use crate::position::TriggerGeometry;
use crate::schema::{FieldKind, FilterConfig, FilterFieldSchema};
use crate::store::{AppliedFilters, FilterStore, FilterValues};

/// The caller's side of a panel session.
pub trait PanelCallbacks {
    /// Receives the buffer verbatim on Apply.
    fn on_apply(&mut self, values: FilterValues);
    fn on_clear(&mut self);
    fn on_close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Closed,
    Open,
}

/// What a dismissal ended up closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dismissed {
    /// An open date flyout absorbed the event; the panel stays open.
    Flyout { key: String },
    Panel,
}

struct Session<H: DismissHost> {
    id: Uuid,
    config: FilterConfig,
    store: FilterStore,
    date_fields: BTreeMap<String, DateField<H>>,
}

/// Open/close state machine for one filter panel.
///
/// Each `open` builds a fresh buffer from the caller's applied filters;
/// Apply, Cancel and Clear all drop it, which also releases any flyout
/// listeners still held by date fields.
pub struct FilterPanel<H: DismissHost + Clone> {
    host: H,
    clock: Rc<dyn Clock>,
    settings: DatePickerSettings,
    session: Option<Session<H>>,
}

impl<H: DismissHost + Clone> FilterPanel<H> {
    pub fn new(host: H, clock: Rc<dyn Clock>, settings: DatePickerSettings) -> Self {
        Self {
            host,
            clock,
            settings,
            session: None,
        }
    }

    pub fn state(&self) -> PanelState {
        if self.session.is_some() {
            PanelState::Open
        } else {
            PanelState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Opens the panel, or re-initializes it when already open (the
    /// same panel is reused across screens).
    #[instrument(skip_all, fields(config = %config.title()))]
    pub fn open(&mut self, config: &FilterConfig, applied: &AppliedFilters) {
        let store = FilterStore::new(config, applied);
        let date_fields = config
            .fields()
            .iter()
            .filter(|field| field.kind == FieldKind::Date)
            .map(|field| {
                let value = store.get(&field.key).unwrap_or_default();
                let date = DateField::new(
                    field.key.clone(),
                    value,
                    self.host.clone(),
                    Rc::clone(&self.clock),
                    self.settings,
                );
                (field.key.clone(), date)
            })
            .collect();

        let id = Uuid::new_v4();
        if let Some(previous) = self.session.replace(Session {
            id,
            config: config.clone(),
            store,
            date_fields,
        }) {
            debug!(previous = %previous.id, "re-initialized open filter panel");
        }
        info!(session = %id, "opened filter panel");
    }

    /// Re-seeds an open panel after the caller's inputs changed.
    pub fn refresh(&mut self, config: &FilterConfig, applied: &AppliedFilters) {
        if self.is_open() {
            self.open(config, applied);
        }
    }

    pub fn config(&self) -> Option<&FilterConfig> {
        self.session.as_ref().map(|session| &session.config)
    }

    pub fn values(&self) -> Result<&FilterValues, PanelError> {
        Ok(self.session()?.store.values())
    }

    pub fn rows(&self) -> Result<Vec<Vec<&FilterFieldSchema>>, PanelError> {
        Ok(self.session()?.config.rows())
    }

    pub fn set_value(&mut self, key: &str, value: impl Into<String>) -> Result<(), PanelError> {
        let session = self.session_mut()?;
        let value = value.into();
        if let Some(date) = session.date_fields.get_mut(key) {
            date.sync_value(&value);
        }
        session.store.set_value(key, value)
    }

    pub fn date_field(&self, key: &str) -> Result<&DateField<H>, PanelError> {
        let session = self.session()?;
        session
            .date_fields
            .get(key)
            .ok_or_else(|| missing_date_field(&session.config, key))
    }

    /// Mutable access to a date field wired to the buffer.
    pub fn date_field_mut(&mut self, key: &str) -> Result<DateFieldHandle<'_, H>, PanelError> {
        let session = self.session.as_mut().ok_or(PanelError::NotOpen)?;
        match session.date_fields.get_mut(key) {
            Some(field) => Ok(DateFieldHandle {
                field,
                store: &mut session.store,
            }),
            None => Err(missing_date_field(&session.config, key)),
        }
    }

    /// Key of the date field whose flyout is open, if any.
    pub fn open_flyout(&self) -> Option<&str> {
        self.session
            .as_ref()?
            .date_fields
            .values()
            .find(|field| field.is_open())
            .map(DateField::key)
    }

    /// Routes an outside click or Escape. An open flyout closes first;
    /// otherwise the panel is cancelled.
    pub fn dismiss(
        &mut self,
        event: DismissEvent,
        callbacks: &mut dyn PanelCallbacks,
    ) -> Result<Dismissed, PanelError> {
        if let Some(key) = self.open_flyout().map(str::to_string) {
            if let Some(field) = self.session_mut()?.date_fields.get_mut(&key) {
                field.dismiss(event);
            }
            return Ok(Dismissed::Flyout { key });
        }
        self.cancel(callbacks)?;
        Ok(Dismissed::Panel)
    }

    #[instrument(skip_all)]
    pub fn apply(&mut self, callbacks: &mut dyn PanelCallbacks) -> Result<FilterValues, PanelError> {
        let session = self.close_session()?;
        let values = session.store.apply();
        drop(session);
        info!(active = values.active_count(), "applied filters");
        callbacks.on_apply(values.clone());
        callbacks.on_close();
        Ok(values)
    }

    #[instrument(skip_all)]
    pub fn cancel(&mut self, callbacks: &mut dyn PanelCallbacks) -> Result<(), PanelError> {
        drop(self.close_session()?);
        info!("cancelled filter panel");
        callbacks.on_close();
        Ok(())
    }

    /// Blanks the buffer, notifies the caller, and closes. Defaults are
    /// not restored and the panel never stays open.
    #[instrument(skip_all)]
    pub fn clear(&mut self, callbacks: &mut dyn PanelCallbacks) -> Result<(), PanelError> {
        let mut session = self.close_session()?;
        session.store.clear();
        drop(session);
        info!("cleared filters");
        callbacks.on_clear();
        callbacks.on_close();
        Ok(())
    }

    fn close_session(&mut self) -> Result<Session<H>, PanelError> {
        let session = self.session.take().ok_or_else(|| {
            warn!("filter panel action while closed");
            PanelError::NotOpen
        })?;
        debug!(session = %session.id, "closing filter panel");
        Ok(session)
    }

    fn session(&self) -> Result<&Session<H>, PanelError> {
        self.session.as_ref().ok_or(PanelError::NotOpen)
    }

    fn session_mut(&mut self) -> Result<&mut Session<H>, PanelError> {
        self.session.as_mut().ok_or(PanelError::NotOpen)
    }
}

fn missing_date_field(config: &FilterConfig, key: &str) -> PanelError {
    if config.field(key).is_some() {
        PanelError::NotADateField { key: key.to_string() }
    } else {
        PanelError::UnknownField { key: key.to_string() }
    }
}

/// A date field borrowed together with the buffer it writes into.
pub struct DateFieldHandle<'a, H: DismissHost> {
    field: &'a mut DateField<H>,
    store: &'a mut FilterStore,
}

impl<H: DismissHost> DateFieldHandle<'_, H> {
    pub fn field(&self) -> &DateField<H> {
        self.field
    }

    pub fn focus(&mut self, geometry: TriggerGeometry) {
        self.field.focus(geometry);
    }

    pub fn toggle(&mut self, geometry: TriggerGeometry) {
        self.field.toggle(geometry);
    }

    pub fn dismiss(&mut self, event: DismissEvent) {
        self.field.dismiss(event);
    }

    pub fn previous_month(&mut self) {
        self.field.previous_month();
    }

    pub fn next_month(&mut self) {
        self.field.next_month();
    }

    pub fn grid(&self) -> Option<Vec<CalendarDay>> {
        self.field.grid()
    }

    /// Typed text. The buffer only changes once the text resolves.
    pub fn input(&mut self, text: &str) -> Result<(), PanelError> {
        match self.field.input(text) {
            Some(value) => self.store.set_value(self.field.key(), value),
            None => Ok(()),
        }
    }

    pub fn select_day(&mut self, date: NaiveDate) -> Result<String, PanelError> {
        let iso = self.field.select_day(date);
        self.store.set_value(self.field.key(), iso.clone())?;
        Ok(iso)
    }

    pub fn select_today(&mut self) -> Result<String, PanelError> {
        let iso = self.field.select_today();
        self.store.set_value(self.field.key(), iso.clone())?;
        Ok(iso)
    }
}
