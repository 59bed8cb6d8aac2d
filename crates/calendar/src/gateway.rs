//! Window and conflict semantics over a [`CalendarBackend`].
//!
//! Booking precondition: callers must only create an event after an
//! availability check for the same `(calendar_id, start, end)` window
//! within the same attempt. The booking tool enforces this by re-checking
//! immediately before the insert; the gateway itself performs no retries
//! and no ordering of its own.

use std::sync::Arc;

use tracing::info;

use scheduly_core::time::Slot;

use crate::{CalendarBackend, CalendarError, EventReference};

/// Result of one booking attempt. A taken slot is a structured refusal,
/// not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked(EventReference),
    SlotTaken,
}

#[derive(Clone)]
pub struct CalendarGateway {
    backend: Arc<dyn CalendarBackend>,
}

impl CalendarGateway {
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        Self { backend }
    }

    /// True iff no event overlaps `[start, end)` on the calendar.
    ///
    /// A backend failure propagates as [`CalendarError`]; it is never
    /// collapsed into "available".
    pub async fn check_availability(
        &self,
        calendar_id: &str,
        slot: Slot,
    ) -> Result<bool, CalendarError> {
        let events = self.backend.list_events(calendar_id, slot.start, slot.end()).await?;
        let available = events.is_empty();

        info!(
            event_name = "calendar.availability_checked",
            calendar_id,
            start = %slot.start_iso(),
            duration_minutes = slot.duration_minutes,
            available,
            "availability check completed"
        );

        Ok(available)
    }

    pub async fn create_event(
        &self,
        calendar_id: &str,
        slot: Slot,
        summary: &str,
    ) -> Result<EventReference, CalendarError> {
        let reference =
            self.backend.insert_event(calendar_id, summary, slot.start, slot.end()).await?;

        info!(
            event_name = "calendar.event_created",
            calendar_id,
            start = %slot.start_iso(),
            duration_minutes = slot.duration_minutes,
            event_id = %reference.id,
            "event created"
        );

        Ok(reference)
    }

    /// Re-checks availability and inserts only if the slot is still free.
    /// The stale-assumption defense for `book_appointment`: the reasoning
    /// step's earlier check is not trusted at insert time.
    pub async fn book_if_available(
        &self,
        calendar_id: &str,
        slot: Slot,
        summary: &str,
    ) -> Result<BookingOutcome, CalendarError> {
        if !self.check_availability(calendar_id, slot).await? {
            info!(
                event_name = "calendar.booking_refused",
                calendar_id,
                start = %slot.start_iso(),
                "slot no longer available at insert time"
            );
            return Ok(BookingOutcome::SlotTaken);
        }

        // Known race: a concurrent booking can land between the check
        // above and this insert. The backend's transactional guarantees
        // are unspecified, so the narrow window is accepted.
        let reference = self.create_event(calendar_id, slot, summary).await?;
        Ok(BookingOutcome::Booked(reference))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime};

    use scheduly_core::time::Slot;

    use super::{BookingOutcome, CalendarGateway};
    use crate::{CalendarBackend, CalendarError, EventRecord, EventReference};

    fn slot() -> Slot {
        let start = NaiveDate::from_ymd_opt(2025, 7, 4)
            .and_then(|date| date.and_hms_opt(14, 0, 0))
            .expect("valid test date");
        Slot::new(start, 60)
    }

    fn busy_event(start: NaiveDateTime, end: NaiveDateTime) -> EventRecord {
        EventRecord {
            id: "evt-1".to_string(),
            summary: Some("standup".to_string()),
            start: Some(start),
            end: Some(end),
        }
    }

    /// Backend whose listed events change per call, for racing-booking
    /// scenarios. `list_responses` is consumed front to back; the last
    /// entry repeats.
    struct ScriptedBackend {
        list_responses: Vec<Result<Vec<EventRecord>, CalendarError>>,
        list_calls: AtomicUsize,
        insert_calls: AtomicUsize,
        insert_fails: bool,
    }

    impl ScriptedBackend {
        fn free() -> Self {
            Self {
                list_responses: vec![Ok(Vec::new())],
                list_calls: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
                insert_fails: false,
            }
        }

        fn busy() -> Self {
            let window = slot();
            Self {
                list_responses: vec![Ok(vec![busy_event(window.start, window.end())])],
                list_calls: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
                insert_fails: false,
            }
        }

        fn erroring() -> Self {
            Self {
                list_responses: vec![Err(CalendarError::Api {
                    status: 503,
                    message: "backend unavailable".to_string(),
                })],
                list_calls: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
                insert_fails: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl CalendarBackend for ScriptedBackend {
        async fn list_events(
            &self,
            _calendar_id: &str,
            _time_min: NaiveDateTime,
            _time_max: NaiveDateTime,
        ) -> Result<Vec<EventRecord>, CalendarError> {
            let index = self.list_calls.fetch_add(1, Ordering::SeqCst);
            let clamped = index.min(self.list_responses.len() - 1);
            match &self.list_responses[clamped] {
                Ok(events) => Ok(events.clone()),
                Err(CalendarError::Api { status, message }) => {
                    Err(CalendarError::Api { status: *status, message: message.clone() })
                }
                Err(_) => Err(CalendarError::Auth("scripted failure".to_string())),
            }
        }

        async fn insert_event(
            &self,
            _calendar_id: &str,
            _summary: &str,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> Result<EventReference, CalendarError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if self.insert_fails {
                return Err(CalendarError::Api {
                    status: 500,
                    message: "insert failed".to_string(),
                });
            }
            Ok(EventReference {
                id: "created-1".to_string(),
                html_link: Some("https://calendar.example/created-1".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn zero_overlapping_events_means_available() {
        let gateway = CalendarGateway::new(Arc::new(ScriptedBackend::free()));
        let available = gateway.check_availability("primary", slot()).await.expect("check");
        assert!(available);
    }

    #[tokio::test]
    async fn one_overlapping_event_means_unavailable() {
        let gateway = CalendarGateway::new(Arc::new(ScriptedBackend::busy()));
        let available = gateway.check_availability("primary", slot()).await.expect("check");
        assert!(!available);
    }

    #[tokio::test]
    async fn backend_error_is_never_treated_as_available() {
        let gateway = CalendarGateway::new(Arc::new(ScriptedBackend::erroring()));
        let result = gateway.check_availability("primary", slot()).await;
        assert!(matches!(result, Err(CalendarError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn booking_refuses_when_slot_is_taken() {
        let backend = Arc::new(ScriptedBackend::busy());
        let gateway = CalendarGateway::new(backend.clone());

        let outcome =
            gateway.book_if_available("primary", slot(), "Meeting").await.expect("booking");

        assert_eq!(outcome, BookingOutcome::SlotTaken);
        assert_eq!(backend.insert_calls.load(Ordering::SeqCst), 0, "no insert after refusal");
    }

    #[tokio::test]
    async fn booking_inserts_only_after_a_fresh_availability_check() {
        let backend = Arc::new(ScriptedBackend::free());
        let gateway = CalendarGateway::new(backend.clone());

        let outcome =
            gateway.book_if_available("primary", slot(), "Meeting").await.expect("booking");

        assert!(matches!(outcome, BookingOutcome::Booked(ref reference) if reference.id == "created-1"));
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1, "one in-attempt check");
        assert_eq!(backend.insert_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_taken_between_assumption_and_insert_is_a_refusal_not_an_error() {
        // The reasoning step saw the slot free earlier; by insert time the
        // backend reports a conflict. book_if_available's own re-check
        // catches it.
        let window = slot();
        let backend = Arc::new(ScriptedBackend {
            list_responses: vec![Ok(vec![busy_event(window.start, window.end())])],
            list_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            insert_fails: false,
        });
        let gateway = CalendarGateway::new(backend.clone());

        let outcome =
            gateway.book_if_available("primary", window, "Meeting").await.expect("booking");

        assert_eq!(outcome, BookingOutcome::SlotTaken);
        assert_eq!(backend.insert_calls.load(Ordering::SeqCst), 0);
    }
}
