use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::Session;
use crate::backend::{BackendClient, BackendError};
use crate::eligibility::{Eligibility, EligibilityEvaluator};
use crate::membership::Membership;
use crate::models::{ReservationResponse, ScheduledClass};
use crate::reconciler::reconcile;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Class {0} not found")]
    UnknownClass(String),
    #[error("You already booked this class")]
    AlreadyBooked,
    #[error("You have not booked this class")]
    NotBooked,
    #[error("This class is full")]
    ClassFull,
    #[error("{}", .0.message)]
    NotEligible(Eligibility),
    #[error("Another request for this class is still in progress")]
    InProgress,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Reservations and cancellations currently waiting on the backend, keyed by
/// student and class.
#[derive(Clone, Default)]
pub struct InFlight {
    pending: Arc<Mutex<HashSet<(String, String)>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, student_id: &str, class_id: &str) -> Option<InFlightGuard> {
        let key = (student_id.to_string(), class_id.to_string());
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if !pending.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            pending: Arc::clone(&self.pending),
            key,
        })
    }

    pub fn is_pending(&self, student_id: &str, class_id: &str) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.contains(&(student_id.to_string(), class_id.to_string()))
    }
}

pub struct InFlightGuard {
    pending: Arc<Mutex<HashSet<(String, String)>>>,
    key: (String, String),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&self.key);
    }
}

#[derive(Clone, Copy, Debug)]
enum Action {
    Reserve,
    Cancel,
}

/// Local view of one student's booking page: the class list, the membership
/// snapshot and the set of classes already booked.
pub struct BookingSession {
    session: Session,
    evaluator: EligibilityEvaluator,
    in_flight: InFlight,
    today: NaiveDate,
    classes: Vec<ScheduledClass>,
    membership: Option<Membership>,
    booked: HashSet<String>,
}

impl BookingSession {
    pub fn new(
        session: Session,
        evaluator: EligibilityEvaluator,
        in_flight: InFlight,
        today: NaiveDate,
    ) -> Self {
        Self {
            session,
            evaluator,
            in_flight,
            today,
            classes: Vec::new(),
            membership: None,
            booked: HashSet::new(),
        }
    }

    pub async fn load(
        backend: &BackendClient,
        session: Session,
        evaluator: EligibilityEvaluator,
        in_flight: InFlight,
        today: NaiveDate,
    ) -> Result<Self, BackendError> {
        let mut booking = Self::new(session, evaluator, in_flight, today);
        booking.refresh(backend).await?;
        Ok(booking)
    }

    pub async fn refresh(&mut self, backend: &BackendClient) -> Result<(), BackendError> {
        let (classes, membership, booked) = futures::try_join!(
            backend.fetch_classes(),
            backend.fetch_membership(&self.session),
            backend.fetch_booked_class_ids(&self.session),
        )?;
        debug!(
            student = self.session.student_id(),
            classes = classes.len(),
            booked = booked.len(),
            has_membership = membership.is_some(),
            "booking page loaded"
        );
        self.classes = classes;
        self.membership = membership;
        self.booked = booked.into_iter().collect();
        Ok(())
    }

    pub fn set_classes(&mut self, classes: Vec<ScheduledClass>) {
        self.classes = classes;
    }

    pub fn set_membership(&mut self, membership: Option<Membership>) {
        self.membership = membership;
    }

    pub fn set_booked<I: IntoIterator<Item = String>>(&mut self, booked: I) {
        self.booked = booked.into_iter().collect();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn classes(&self) -> &[ScheduledClass] {
        &self.classes
    }

    pub fn membership(&self) -> Option<&Membership> {
        self.membership.as_ref()
    }

    pub fn booked(&self) -> &HashSet<String> {
        &self.booked
    }

    pub fn is_booked(&self, class_id: &str) -> bool {
        self.booked.contains(class_id)
    }

    pub fn evaluator(&self) -> &EligibilityEvaluator {
        &self.evaluator
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn eligibility(&self, class: &ScheduledClass) -> Eligibility {
        self.evaluator
            .evaluate(self.membership.as_ref(), &class.class_type, self.today)
    }

    fn class(&self, class_id: &str) -> Result<&ScheduledClass, BookingError> {
        self.classes
            .iter()
            .find(|c| c.id == class_id)
            .ok_or_else(|| BookingError::UnknownClass(class_id.to_string()))
    }

    pub async fn reserve(
        &mut self,
        backend: &BackendClient,
        class_id: &str,
    ) -> Result<(), BookingError> {
        self.session.require_token()?;
        let class = self.class(class_id)?;
        if self.is_booked(class_id) {
            return Err(BookingError::AlreadyBooked);
        }
        let eligibility = self.eligibility(class);
        if !eligibility.bookable {
            return Err(BookingError::NotEligible(eligibility));
        }
        if class.spots_left() == 0 {
            return Err(BookingError::ClassFull);
        }
        let class_type = class.class_type.clone();

        let _guard = self
            .in_flight
            .try_acquire(self.session.student_id(), class_id)
            .ok_or(BookingError::InProgress)?;
        let response = backend.reserve(&self.session, class_id).await?;
        self.apply(Action::Reserve, class_id, &class_type, response);
        Ok(())
    }

    pub async fn cancel(
        &mut self,
        backend: &BackendClient,
        class_id: &str,
    ) -> Result<(), BookingError> {
        self.session.require_token()?;
        let class_type = self.class(class_id)?.class_type.clone();
        if !self.is_booked(class_id) {
            return Err(BookingError::NotBooked);
        }

        let _guard = self
            .in_flight
            .try_acquire(self.session.student_id(), class_id)
            .ok_or(BookingError::InProgress)?;
        let response = backend.cancel(&self.session, class_id).await?;
        self.apply(Action::Cancel, class_id, &class_type, response);
        Ok(())
    }

    /// Mirrors a confirmed reservation change locally.
    fn apply(
        &mut self,
        action: Action,
        class_id: &str,
        class_type: &str,
        response: ReservationResponse,
    ) {
        if let Some(update) = &response.remaining_classes {
            self.membership = self
                .membership
                .as_ref()
                .map(|previous| reconcile(previous, class_type, update).membership);
        }

        let student_id = self.session.student_id().to_string();
        let class = self.classes.iter_mut().find(|c| c.id == class_id);
        match action {
            Action::Reserve => {
                self.booked.insert(class_id.to_string());
                if let Some(class) = class
                    && !class.participants.contains(&student_id)
                {
                    class.participants.push(student_id.clone());
                }
            }
            Action::Cancel => {
                self.booked.remove(class_id);
                if let Some(class) = class {
                    class.participants.retain(|p| p != &student_id);
                }
            }
        }

        info!(
            student = %student_id,
            class_id,
            ?action,
            membership_type = response.membership_type.as_deref().unwrap_or("unknown"),
            remaining = self.membership.as_ref().map(Membership::total_available),
            "reservation updated"
        );
    }
}
