use super::filters::{Bound, Choice, DateRange, FilterInput, Filters, show_deleted_options};
use super::resource::{MutationOutcome, QueryStatus, Resource, ResourceList, report_failure};
use crate::session::SessionStore;
use crate::state::QueryCache;
use crate::toast::Toasts;
use jiff::civil::DateTime;
use payloads::requests::{NewEvent, PublishedToggle};
use payloads::{APIClient, ClientError, Event, EventId, ImageFile, Request};
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Events;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    pub title: String,
    pub description: String,
    pub published: Choice,
    pub ticket_link: Choice,
    pub start: DateRange,
    pub end: DateRange,
    pub show_deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventFilter {
    Title(String),
    Description(String),
    Published(Choice),
    TicketLink(Choice),
    Start(Bound, Option<DateTime>),
    End(Bound, Option<DateTime>),
    ShowDeleted(bool),
}

impl Filters for EventFilters {
    type Change = EventFilter;

    fn apply(&mut self, change: EventFilter) {
        match change {
            EventFilter::Title(title) => self.title = title,
            EventFilter::Description(description) => self.description = description,
            EventFilter::Published(choice) => self.published = choice,
            EventFilter::TicketLink(choice) => self.ticket_link = choice,
            EventFilter::Start(bound, value) => self.start.set(bound, value),
            EventFilter::End(bound, value) => self.end.set(bound, value),
            EventFilter::ShowDeleted(show) => self.show_deleted = show,
        }
    }

    fn inputs() -> Vec<FilterInput> {
        vec![
            FilterInput::text("Título", "title").placeholder("Buscar por título"),
            FilterInput::text("Descripción", "description")
                .placeholder("Buscar por descripción"),
            FilterInput::select("Publicado", "published", Choice::options()),
            FilterInput::select("Boletos", "ticketLink", Choice::options()),
            FilterInput::datetime("Inicio desde", "start.lower"),
            FilterInput::datetime("Inicio hasta", "start.upper"),
            FilterInput::datetime("Fin desde", "end.lower"),
            FilterInput::datetime("Fin hasta", "end.upper"),
            FilterInput::select("¿Mostrar eliminados?", "showDeleted", show_deleted_options()),
        ]
    }
}

impl Resource for Events {
    const ENDPOINT: &'static str = "events";
    const DEFAULT_SORT: &'static str = "start";

    type Entity = Event;
    type Draft = NewEvent;
    type Filters = EventFilters;

    fn id(event: &Event) -> &str {
        &event.id.0
    }

    fn created_message(_: &Event) -> String {
        "Evento creado correctamente".to_string()
    }

    fn edited_message(_: &Event) -> String {
        "Evento editado correctamente".to_string()
    }

    fn deleted_message() -> String {
        "Evento eliminado correctamente".to_string()
    }

    /// Write endpoints answer with categories expanded; list rows hold ids.
    fn to_row(event: Event) -> Event {
        event.with_category_ids()
    }
}

/// What the event form does on submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitAction {
    Add(NewEvent),
    Edit(Event),
}

impl ResourceList<Events> {
    /// Upload a flyer, returning its stored URL. Failures are reported the
    /// same way as failed writes.
    #[tracing::instrument(skip_all, fields(file_name = %image.file_name))]
    pub async fn upload_image(&self, image: &ImageFile) -> Result<String, ClientError> {
        let result = self
            .client()
            .upload_image(image, self.token(), self.on_refresh())
            .await;
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    /// Submit the event form. A chosen image is uploaded first and becomes
    /// the flyer; if the upload fails nothing is written.
    pub async fn submit(
        &self,
        action: SubmitAction,
        image: Option<ImageFile>,
    ) -> MutationOutcome<Event> {
        let flyer = match image {
            Some(image) => match self.upload_image(&image).await {
                Ok(url) => Some(url),
                Err(e) => return MutationOutcome::RolledBack(e),
            },
            None => None,
        };

        match action {
            SubmitAction::Add(mut draft) => {
                if let Some(flyer) = flyer {
                    draft.flyer = flyer;
                }
                self.add(draft).await
            }
            SubmitAction::Edit(mut event) => {
                if let Some(flyer) = flyer {
                    event.flyer = flyer;
                }
                self.edit(event).await
            }
        }
    }
}

/// A single event, as shown on its detail page.
#[derive(Debug, Clone)]
pub struct EventDetail {
    id: EventId,
    client: APIClient,
    session: SessionStore,
    toasts: Toasts,
    cache: QueryCache<Events>,
    status: Arc<Mutex<QueryStatus>>,
}

impl EventDetail {
    pub fn new(
        id: EventId,
        client: APIClient,
        session: SessionStore,
        toasts: Toasts,
        cache: QueryCache<Events>,
    ) -> Self {
        Self {
            id,
            client,
            session,
            toasts,
            cache,
            status: Arc::new(Mutex::new(QueryStatus::Idle)),
        }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// The last fetched version of the event, if any.
    pub fn event(&self) -> Option<Event> {
        self.cache.detail(&self.id.0)
    }

    pub fn status(&self) -> QueryStatus {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_status(&self, status: QueryStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn on_refresh(&self) -> impl FnOnce(&str) + use<> {
        let session = self.session.clone();
        move |token: &str| session.set_token(token)
    }

    #[tracing::instrument(skip(self), fields(id = %self.id))]
    pub async fn fetch(&self) -> Result<Event, ClientError> {
        self.set_status(QueryStatus::Loading);
        let request = Request::get(format!("{}/{}", Events::ENDPOINT, self.id))
            .token(self.session.token());
        match self.client.crud::<Event>(&request, self.on_refresh()).await {
            Ok(envelope) => {
                self.cache.set_detail(self.id.0.as_str(), envelope.data.clone());
                self.set_status(QueryStatus::Success);
                Ok(envelope.data)
            }
            Err(e) => {
                self.set_status(QueryStatus::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Flip between published and draft. Not optimistic: the detail updates
    /// once the server confirms.
    #[tracing::instrument(skip(self), fields(id = %self.id))]
    pub async fn toggle_published(&self) -> MutationOutcome<Event> {
        let current = match self.event() {
            Some(event) => event,
            None => match self.fetch().await {
                Ok(event) => event,
                Err(e) => return self.fail(e),
            },
        };

        let body = PublishedToggle {
            published: !current.published,
        };
        let request = match Request::put(format!("{}/{}", Events::ENDPOINT, self.id), &body) {
            Ok(request) => request.token(self.session.token()),
            Err(e) => return self.fail(e),
        };
        match self.client.crud::<Event>(&request, self.on_refresh()).await {
            Ok(envelope) => {
                let saved = envelope.data;
                self.cache.cancel();
                self.cache.set_detail(self.id.0.as_str(), saved.clone());
                self.cache.invalidate();
                self.toasts.success(if saved.published {
                    "El evento se ha publicado correctamente"
                } else {
                    "El evento se ha convertido en borrador correctamente"
                });
                MutationOutcome::Committed(saved)
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, error: ClientError) -> MutationOutcome<Event> {
        report_failure(&self.toasts, &self.session, &error);
        MutationOutcome::RolledBack(error)
    }
}
