// Booking session flow: results → guest details → confirmation.
// Each step rebuilds its state from the URL and the visitor's booking cache.

use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    backend::{BackendError, HotelBackend, OfferRef},
    cache::{BookingCache, CachedSelection},
    criteria::{encode_pairs, SearchCriteria},
    guest::{FieldErrors, GuestForm},
    models::{Evaluation, Hotel, Offer, SelectedHotel, SelectedHotelRef, SelectedOffer},
    pricing::{self, BreakdownOutcome, PriceSummary},
    session::{self, Clock, SessionError, SessionTimer},
};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("the booking session has expired")]
    Expired,

    #[error("no room is currently selected")]
    NoSelection,

    #[error("the selected room changed while the request was in flight")]
    Superseded,

    #[error("{} field(s) need attention", .0.len())]
    Invalid(FieldErrors),

    #[error("payment was not confirmed: {0}")]
    PaymentDeclined(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub fn results_url(search_query: &str) -> String {
    format!("/results?{search_query}")
}

pub fn guest_details_url(criteria: &SearchCriteria, hotel_code: &str, hotel_search_code: &str) -> String {
    let mut pairs = vec![
        ("hotelSearchCode".to_string(), hotel_search_code.to_string()),
        ("hotelCode".to_string(), hotel_code.to_string()),
        ("checkInDate".to_string(), criteria.check_in.format("%Y-%m-%d").to_string()),
        ("checkOutDate".to_string(), criteria.check_out.format("%Y-%m-%d").to_string()),
    ];
    pairs.extend(criteria.query_pairs());
    format!("/booking-payment?{}", encode_pairs(&pairs))
}

pub fn confirmation_url(booking_code: &str) -> String {
    format!("/booking-confirmation?booking_code={}", urlencoding::encode(booking_code))
}

/// Persists the pick and starts the session window. Returns where to go next.
pub fn select_offer(
    cache: &BookingCache,
    clock: &dyn Clock,
    criteria: &SearchCriteria,
    hotel: &Hotel,
    offer: &Offer,
) -> String {
    let nights = criteria.nights();
    let info = hotel.hotel_info.clone().unwrap_or_default();

    let selected_hotel = SelectedHotel {
        hotel_code: hotel.hotel_code.clone(),
        hotel_name: hotel.hotel_name.clone(),
        hotel_image: hotel.hotel_image.clone(),
        address: info.address.clone(),
        stars: info.stars(),
        check_in: criteria.check_in.format("%Y-%m-%d").to_string(),
        check_out: criteria.check_out.format("%Y-%m-%d").to_string(),
        total_rooms: criteria.rooms.len(),
        search_query: criteria.to_query(),
    };
    let per_night_price = if nights == 0 {
        Decimal::ZERO
    } else {
        (offer.total_price / Decimal::from(nights)).round_dp(2)
    };
    let selected_offer = SelectedOffer {
        hotel_code: hotel.hotel_code.clone(),
        hotel_name: hotel.hotel_name.clone(),
        hotel_search_code: offer.hotel_search_code.clone(),
        total_price: offer.total_price,
        per_night_price,
        currency: offer.currency.clone(),
        room_labels: offer.rooms.clone(),
        room_summary: offer.room_summary(),
        room_basis: offer.room_basis.clone(),
        facilities: info.facilities,
        remark: offer.remark.clone(),
        special: offer.special.clone(),
        cancellation_policies: offer.cancellation_policies.clone(),
    };
    let reference = SelectedHotelRef {
        hotel_code: hotel.hotel_code.clone(),
        hotel_search_code: offer.hotel_search_code.clone(),
        selection_id: Uuid::new_v4(),
    };

    cache.save_selection(&selected_hotel, &selected_offer, &reference);
    cache.start_session(clock.now());
    tracing::info!(
        hotel_code = %hotel.hotel_code,
        hotel_search_code = %offer.hotel_search_code,
        selection_id = %reference.selection_id,
        "Offer selected, booking session started"
    );

    guest_details_url(criteria, &hotel.hotel_code, &offer.hotel_search_code)
}

#[derive(Debug)]
pub enum SessionEntry {
    /// Nothing to resume; go back to the results.
    Abort,
    /// Show the blocking expiry notice.
    Expired,
    Active {
        timer: SessionTimer,
        selection: CachedSelection,
    },
}

pub fn enter_guest_details(cache: &BookingCache, clock: &dyn Clock, timeout: Duration) -> SessionEntry {
    let timer = match SessionTimer::initialize(cache, clock, timeout) {
        Ok(timer) => timer,
        Err(SessionError::NotStarted) => return SessionEntry::Abort,
    };
    if timer.is_expired() {
        return SessionEntry::Expired;
    }
    match cache.selection() {
        Some(selection) => SessionEntry::Active { timer, selection },
        None => {
            tracing::warn!(scope = cache.store().scope(), "Session marker present without a selection");
            SessionEntry::Abort
        }
    }
}

/// The visitor acknowledged the expiry notice.
pub fn expire_session(cache: &BookingCache) {
    session::expire(cache);
}

/// Explicit back-navigation from the guest-details screen. The selection stays so
/// the results page can still highlight it.
pub fn leave_session(cache: &BookingCache) {
    tracing::debug!(scope = cache.store().scope(), "Leaving booking session");
    session::cleanup(cache);
}

/// Evaluation and price breakdown for the guest-details screen. Either call may
/// fail without affecting the other.
#[derive(Debug)]
pub struct OfferDetails {
    pub evaluation: Option<Evaluation>,
    pub price: PriceSummary,
}

pub async fn fetch_offer_details(
    backend: &dyn HotelBackend,
    cache: &BookingCache,
    selection: &CachedSelection,
    nights: u32,
) -> Result<OfferDetails, FlowError> {
    let reference = selection.reference.as_ref().ok_or(FlowError::NoSelection)?;
    let offer_ref = OfferRef {
        hotel_search_code: selection.offer.hotel_search_code.clone(),
        hotel_code: selection.offer.hotel_code.clone(),
        check_in: selection.hotel.check_in.clone(),
    };

    let (evaluation, breakdown) = tokio::join!(
        backend.booking_evaluation(&offer_ref),
        backend.price_breakdown(&offer_ref)
    );
    ensure_current(cache, reference.selection_id)?;

    let evaluation = evaluation
        .inspect_err(|e| tracing::warn!(error = %e, "Booking evaluation failed"))
        .ok();
    let breakdown = breakdown.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Price breakdown failed, showing estimate");
        BreakdownOutcome::Unavailable
    });

    let authoritative = evaluation
        .as_ref()
        .and_then(|e| e.total_price)
        .unwrap_or(selection.offer.total_price);
    let price = pricing::reconcile(&breakdown, authoritative, nights, &selection.offer.currency);

    Ok(OfferDetails { evaluation, price })
}

fn ensure_current(cache: &BookingCache, selection_id: Uuid) -> Result<(), FlowError> {
    match cache.selected_ref() {
        Some(current) if current.selection_id == selection_id => Ok(()),
        Some(_) => {
            tracing::info!(%selection_id, "Discarding response for a superseded selection");
            Err(FlowError::Superseded)
        }
        None => Err(FlowError::NoSelection),
    }
}

/// What the guest-details screen posts back.
pub struct BookingRequest<'a> {
    pub criteria: &'a SearchCriteria,
    pub hotel_code: &'a str,
    pub hotel_search_code: &'a str,
    pub selection_id: Uuid,
    pub form: &'a GuestForm,
}

impl BookingRequest<'_> {
    pub fn payload(&self) -> Vec<(String, String)> {
        let mut payload = vec![
            ("hotelSearchCode".to_string(), self.hotel_search_code.to_string()),
            ("hotelCode".to_string(), self.hotel_code.to_string()),
            ("checkIn".to_string(), self.criteria.check_in.format("%Y-%m-%d").to_string()),
            ("checkOut".to_string(), self.criteria.check_out.format("%Y-%m-%d").to_string()),
            ("currency".to_string(), self.criteria.currency.clone()),
            ("nationality".to_string(), self.criteria.nationality.clone()),
            ("totalRooms".to_string(), self.criteria.rooms.len().to_string()),
        ];
        payload.extend(self.form.to_payload());
        payload
    }
}

/// Verifies payment, books, and clears the visitor's booking state.
/// Returns the confirmation URL.
pub async fn submit_booking(
    backend: &dyn HotelBackend,
    cache: &BookingCache,
    clock: &dyn Clock,
    timeout: Duration,
    request: BookingRequest<'_>,
) -> Result<String, FlowError> {
    let mut timer = SessionTimer::initialize(cache, clock, timeout)?;
    if timer.is_expired() {
        return Err(FlowError::Expired);
    }
    ensure_current(cache, request.selection_id)?;

    let errors = request.form.validate();
    if !errors.is_empty() {
        return Err(FlowError::Invalid(errors));
    }

    match backend.verify_payment(&request.form.payment_reference).await {
        Ok(verification) => tracing::info!(message = %verification.message, "Payment verified"),
        Err(BackendError::Rejected { message, .. }) => return Err(FlowError::PaymentDeclined(message)),
        Err(e) => return Err(e.into()),
    }
    // The visitor may have picked another room while payment was being checked
    ensure_current(cache, request.selection_id)?;

    let receipt = backend.book_hotel(&request.payload()).await?;

    if ensure_current(cache, request.selection_id).is_ok() {
        timer.cleanup(cache);
        cache.clear_all();
    }
    Ok(confirmation_url(&receipt.booking_code))
}
