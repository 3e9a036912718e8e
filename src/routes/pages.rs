// Server-rendered screens of the booking flow

use askama::Template;
use axum::{
    extract::{Form, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use cached::Cached;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use super::Visitor;
use crate::{
    backend::BackendError,
    cache::{BookingCache, CachedSelection},
    criteria::{SearchCriteria, MAX_ROOMS},
    error::{AppError, AppResult},
    flow::{self, BookingRequest, FlowError, SessionEntry},
    guest::{FieldErrors, GuestForm, ADULT_TITLES},
    models::{BookingConfirmation, Hotel, HotelSearchPage, RoomGuests},
    pricing::{self, PriceSummary},
    remarks::{self, PolicyInfo, RemarkSection},
    session::SessionTimer,
    AppState,
};

fn render<T: Template>(template: T) -> AppResult<Response> {
    Ok(Html(template.render()?).into_response())
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn star_marks(stars: u8) -> String {
    "★".repeat(stars as usize)
}

fn plural(count: u32, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}

fn guest_summary(criteria: &SearchCriteria) -> String {
    let mut parts = vec![plural(criteria.total_adults(), "adult", "adults")];
    if criteria.total_children() > 0 {
        parts.push(plural(criteria.total_children(), "child", "children"));
    }
    parts.push(plural(criteria.rooms.len() as u32, "room", "rooms"));
    parts.join(", ")
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> AppResult<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing form field '{key}'")))
}

fn today(state: &AppState) -> NaiveDate {
    chrono::DateTime::from_timestamp(state.clock.now(), 0)
        .map(|d| d.date_naive())
        .unwrap_or_else(|| chrono::Utc::now().date_naive())
}

// --- Search form ---

struct RoomFields {
    number: usize,
    adults: u32,
    children: u32,
    ages: String,
}

struct RoomChoice {
    value: usize,
    selected_attr: &'static str,
}

#[derive(Template)]
#[template(path = "search.html")]
struct SearchTemplate {
    destination: String,
    destination_display: String,
    check_in: String,
    check_out: String,
    currency: String,
    nationality: String,
    rooms: Vec<RoomFields>,
    room_choices: Vec<RoomChoice>,
    filters: FilterFields,
    error: Option<String>,
}

// Optional filters, echoed back as typed
struct FilterFields {
    room_basis: String,
    star_levels: String,
    min_price: String,
    max_price: String,
    amenities: String,
}

pub async fn search_page(
    State(app_state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let defaults = &app_state.settings.defaults;
    let requested_rooms = params
        .get("totalRooms")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_ROOMS);

    let (criteria, error) = if params.contains_key("destination") {
        match SearchCriteria::from_query(&params, defaults) {
            Ok(criteria) => (Some(criteria), None),
            Err(e) => (None, Some(e.to_string())),
        }
    } else {
        (None, None)
    };

    let field = |key: &str| params.get(key).cloned().unwrap_or_default();
    let filters = FilterFields {
        room_basis: field("roomBasis"),
        star_levels: field("starLevels"),
        min_price: field("minPrice"),
        max_price: field("maxPrice"),
        amenities: field("amenities"),
    };
    let tomorrow = today(&app_state).checked_add_days(Days::new(1));
    let template = match criteria {
        Some(criteria) => {
            let mut rooms: Vec<RoomFields> = criteria
                .rooms
                .iter()
                .enumerate()
                .map(|(i, room)| RoomFields {
                    number: i + 1,
                    adults: room.adults,
                    children: room.children,
                    ages: room.children_ages.iter().map(u32::to_string).collect::<Vec<_>>().join(","),
                })
                .collect();
            for number in rooms.len() + 1..=requested_rooms {
                rooms.push(RoomFields { number, adults: 1, children: 0, ages: String::new() });
            }
            rooms.truncate(requested_rooms.max(1));
            SearchTemplate {
                destination: criteria.destination,
                destination_display: criteria.destination_display,
                check_in: criteria.check_in.to_string(),
                check_out: criteria.check_out.to_string(),
                currency: criteria.currency,
                nationality: criteria.nationality,
                rooms,
                room_choices: Vec::new(),
                filters,
                error,
            }
        }
        None => SearchTemplate {
            destination: field("destination"),
            destination_display: field("destinationDisplay"),
            check_in: tomorrow.map(|d| d.to_string()).unwrap_or_default(),
            check_out: tomorrow
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .map(|d| d.to_string())
                .unwrap_or_default(),
            currency: defaults.currency.clone(),
            nationality: defaults.nationality.clone(),
            rooms: (1..=requested_rooms)
                .map(|number| RoomFields { number, adults: 1, children: 0, ages: String::new() })
                .collect(),
            room_choices: Vec::new(),
            filters,
            error,
        },
    };

    let rooms_shown = template.rooms.len();
    render(SearchTemplate {
        room_choices: (1..=MAX_ROOMS)
            .map(|value| RoomChoice {
                value,
                selected_attr: if value == rooms_shown { "selected" } else { "" },
            })
            .collect(),
        ..template
    })
}

// --- Results ---

struct OfferView {
    hotel_search_code: String,
    room_summary: String,
    room_basis: String,
    total: String,
    per_night: String,
    currency: String,
    policies: Vec<String>,
    deadline: Option<String>,
    non_refundable: bool,
    selected: bool,
}

struct HotelView {
    hotel_code: String,
    name: String,
    image: Option<String>,
    address: Option<String>,
    stars: String,
    from_price: Option<String>,
    offers: Vec<OfferView>,
}

impl HotelView {
    fn new(hotel: &Hotel, nights: u32, cache: &BookingCache) -> Self {
        let nights_dec = Decimal::from(nights.max(1));
        let info = hotel.hotel_info.clone().unwrap_or_default();
        Self {
            hotel_code: hotel.hotel_code.clone(),
            name: hotel.hotel_name.clone(),
            image: hotel.hotel_image.clone(),
            address: info.address,
            stars: star_marks(hotel.stars()),
            from_price: hotel
                .lowest_offer()
                .map(|o| format!("{} {}", o.currency, money(o.total_price))),
            offers: hotel
                .offers
                .iter()
                .map(|offer| OfferView {
                    hotel_search_code: offer.hotel_search_code.clone(),
                    room_summary: offer.room_summary(),
                    room_basis: offer.room_basis.clone().unwrap_or_default(),
                    total: money(offer.total_price),
                    per_night: money((offer.total_price / nights_dec).round_dp(2)),
                    currency: offer.currency.clone(),
                    policies: offer.cancellation_policies.iter().map(|p| p.describe()).collect(),
                    deadline: offer.cxl_deadline.clone().filter(|d| !d.trim().is_empty()),
                    non_refundable: offer.non_ref.unwrap_or(false),
                    selected: cache.is_currently_selected(&hotel.hotel_code, &offer.hotel_search_code),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "results.html")]
struct ResultsTemplate {
    destination: String,
    check_in: String,
    check_out: String,
    nights: u32,
    guests: String,
    hotels: Vec<HotelView>,
    hidden: Vec<(String, String)>,
    page: u32,
    total_pages: u32,
    prev_url: Option<String>,
    next_url: Option<String>,
    search_url: String,
    error: Option<String>,
}

fn page_param(params: &HashMap<String, String>) -> u32 {
    params
        .get("page")
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

// Searches through the short-lived page cache
async fn search(app_state: &AppState, criteria: &SearchCriteria, page: u32) -> Result<HotelSearchPage, BackendError> {
    let key = format!("{}&page={page}", criteria.to_query());
    let hit = app_state
        .search_cache
        .lock()
        .ok()
        .and_then(|mut cache| cache.cache_get(&key).cloned());
    if let Some(found) = hit {
        tracing::debug!(key, "Search cache hit");
        return Ok(found);
    }

    let found = app_state.backend.search_hotels(criteria, page).await?;
    if let Ok(mut cache) = app_state.search_cache.lock() {
        cache.cache_set(key, found.clone());
    }
    Ok(found)
}

pub async fn results_page(
    State(app_state): State<AppState>,
    visitor: Visitor,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let criteria = SearchCriteria::from_query(&params, &app_state.settings.defaults)?;
    let page = page_param(&params);
    let cache = app_state.booking_cache(&visitor);
    let query = criteria.to_query();

    let (hotels, current, total_pages, error) = match search(&app_state, &criteria, page).await {
        Ok(found) => {
            let hotels: Vec<HotelView> = found
                .hotels
                .iter()
                .filter(|h| {
                    let facilities = h.hotel_info.as_ref().map(|i| i.facilities.as_slice()).unwrap_or_default();
                    criteria.filters.matches_amenities(facilities)
                })
                .map(|h| HotelView::new(h, criteria.nights(), &cache))
                .collect();
            if hotels.len() < found.hotels.len() {
                tracing::debug!(
                    shown = hotels.len(),
                    returned = found.hotels.len(),
                    amenities = ?criteria.filters.amenities,
                    "Filtered hotels by amenities"
                );
            }
            (hotels, found.page.max(1), found.total_pages.max(1), None)
        }
        Err(e) => {
            tracing::error!(error = %e, destination = %criteria.destination, "Hotel search failed");
            (Vec::new(), page, 1, Some("We could not load hotels right now. Please try again.".to_string()))
        }
    };

    let page_url = |p: u32| format!("{}&page={p}", flow::results_url(&query));
    let mut hidden = criteria.query_pairs();
    hidden.push(("page".to_string(), current.to_string()));

    render(ResultsTemplate {
        destination: criteria.destination_display.clone(),
        check_in: criteria.check_in.to_string(),
        check_out: criteria.check_out.to_string(),
        nights: criteria.nights(),
        guests: guest_summary(&criteria),
        hotels,
        hidden,
        page: current,
        total_pages,
        prev_url: (current > 1).then(|| page_url(current - 1)),
        next_url: (current < total_pages).then(|| page_url(current + 1)),
        search_url: format!("/?{query}"),
        error,
    })
}

pub async fn select_offer(
    State(app_state): State<AppState>,
    visitor: Visitor,
    Form(params): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let criteria = SearchCriteria::from_query(&params, &app_state.settings.defaults)?;
    let hotel_code = required(&params, "hotelCode")?;
    let hotel_search_code = required(&params, "hotelSearchCode")?;

    let found = search(&app_state, &criteria, page_param(&params)).await?;
    let (hotel, offer) = found
        .find(hotel_code, hotel_search_code)
        .ok_or_else(|| AppError::NotFound("This room is no longer available.".to_string()))?;

    let cache = app_state.booking_cache(&visitor);
    let url = flow::select_offer(&cache, app_state.clock.as_ref(), &criteria, hotel, offer);
    Ok(Redirect::to(&url).into_response())
}

// --- Guest details and payment ---

struct TitleOption {
    value: &'static str,
    selected_attr: &'static str,
}

struct AdultView {
    prefix: String,
    first_name: String,
    last_name: String,
    titles: Vec<TitleOption>,
    title_error: Option<&'static str>,
    first_error: Option<&'static str>,
    last_error: Option<&'static str>,
}

struct ChildView {
    prefix: String,
    first_name: String,
    last_name: String,
    age: String,
    first_error: Option<&'static str>,
    last_error: Option<&'static str>,
    age_error: Option<&'static str>,
}

struct RoomView {
    number: usize,
    adults: Vec<AdultView>,
    children: Vec<ChildView>,
}

struct RequestOption {
    name: &'static str,
    label: &'static str,
    checked_attr: &'static str,
}

struct PriceView {
    pending: bool,
    currency: String,
    subtotal: String,
    taxes: String,
    total: String,
    per_night: String,
    estimate: String,
    mixed_currencies: bool,
}

impl PriceView {
    fn new(summary: &PriceSummary, selection: &CachedSelection) -> Self {
        Self {
            pending: summary.is_pending(),
            currency: if summary.is_pending() {
                selection.offer.currency.clone()
            } else {
                summary.currency.clone()
            },
            subtotal: money(summary.subtotal),
            taxes: money(summary.taxes),
            total: money(summary.total),
            per_night: money(summary.per_night),
            estimate: money(pricing::naive_estimate(selection.offer.per_night_price, summary.nights)),
            mixed_currencies: summary.mixed_currencies,
        }
    }
}

fn error_for(errors: &FieldErrors, field: String) -> Option<&'static str> {
    errors.iter().find(|e| e.field == field).map(|e| e.message)
}

fn room_views(form: &GuestForm, errors: &FieldErrors) -> Vec<RoomView> {
    form.rooms
        .iter()
        .map(|room| RoomView {
            number: room.number,
            adults: room
                .adults
                .iter()
                .map(|a| AdultView {
                    prefix: a.prefix.clone(),
                    first_name: a.first_name.clone(),
                    last_name: a.last_name.clone(),
                    titles: ADULT_TITLES
                        .iter()
                        .map(|t| TitleOption {
                            value: t,
                            selected_attr: if a.title == *t { "selected" } else { "" },
                        })
                        .collect(),
                    title_error: error_for(errors, format!("{}_title", a.prefix)),
                    first_error: error_for(errors, format!("{}_first_name", a.prefix)),
                    last_error: error_for(errors, format!("{}_last_name", a.prefix)),
                })
                .collect(),
            children: room
                .children
                .iter()
                .map(|c| ChildView {
                    prefix: c.prefix.clone(),
                    first_name: c.first_name.clone(),
                    last_name: c.last_name.clone(),
                    age: c.age.map(|a| a.to_string()).unwrap_or_else(|| "?".to_string()),
                    first_error: error_for(errors, format!("{}_first_name", c.prefix)),
                    last_error: error_for(errors, format!("{}_last_name", c.prefix)),
                    age_error: error_for(errors, format!("{}_age", c.prefix)),
                })
                .collect(),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "booking_payment.html")]
struct BookingPaymentTemplate {
    hotel_name: String,
    hotel_image: Option<String>,
    address: Option<String>,
    stars: String,
    check_in: String,
    check_out: String,
    nights: u32,
    guests: String,
    room_summary: String,
    room_basis: String,
    facilities: Vec<String>,
    policies: Vec<String>,
    special: Option<String>,
    price: PriceView,
    remark_sections: Vec<RemarkSection>,
    raw_remarks: String,
    policy: PolicyInfo,
    cancellation: Option<String>,
    rooms: Vec<RoomView>,
    late_arrival_hours: String,
    late_arrival_minutes: String,
    late_arrival_error: Option<&'static str>,
    options: Vec<RequestOption>,
    notes: String,
    terms_checked_attr: &'static str,
    terms_error: Option<&'static str>,
    payment_reference: String,
    payment_error: Option<&'static str>,
    hidden: Vec<(String, String)>,
    back_hidden: Vec<(String, String)>,
    remaining_secs: u64,
    remaining_label: String,
    notice: Option<String>,
}

#[derive(Template)]
#[template(path = "session_expired.html")]
struct SessionExpiredTemplate {
    hidden: Vec<(String, String)>,
}

fn expired_page(criteria: &SearchCriteria) -> AppResult<Response> {
    render(SessionExpiredTemplate { hidden: criteria.query_pairs() })
}

fn redirect_to_results(criteria: &SearchCriteria) -> Response {
    Redirect::to(&flow::results_url(&criteria.to_query())).into_response()
}

// Guest-details URL for whatever is selected now
fn redirect_to_current(cache: &BookingCache, criteria: &SearchCriteria) -> Response {
    match cache.selected_ref() {
        Some(current) => {
            Redirect::to(&flow::guest_details_url(criteria, &current.hotel_code, &current.hotel_search_code)).into_response()
        }
        None => redirect_to_results(criteria),
    }
}

struct BookingScreen<'a> {
    criteria: &'a SearchCriteria,
    timer: SessionTimer,
    selection: CachedSelection,
    form: GuestForm,
    errors: FieldErrors,
    notice: Option<String>,
}

async fn booking_page(app_state: &AppState, cache: &BookingCache, screen: BookingScreen<'_>) -> AppResult<Response> {
    let BookingScreen { criteria, timer, selection, form, errors, notice } = screen;
    // Priced on the stay that was picked, whatever the URL dates say now
    let nights = selection.stay_nights().unwrap_or_else(|| criteria.nights());

    let details = match flow::fetch_offer_details(app_state.backend.as_ref(), cache, &selection, nights).await {
        Ok(details) => details,
        Err(FlowError::Superseded) => return Ok(redirect_to_current(cache, criteria)),
        Err(e) => {
            tracing::warn!(error = %e, "Guest details unavailable");
            return Ok(redirect_to_results(criteria));
        }
    };

    let raw_remarks = details.evaluation.as_ref().map(|e| e.remarks.clone()).unwrap_or_default();
    let cancellation = remarks::extract_cancellation(&raw_remarks)
        .map(|c| format!("From {}: {}% cancellation charge", c.starting, c.percentage.normalize()));

    let selection_id = selection
        .reference
        .as_ref()
        .map(|r| r.selection_id.to_string())
        .unwrap_or_default();
    let mut hidden = vec![
        ("hotelCode".to_string(), selection.offer.hotel_code.clone()),
        ("hotelSearchCode".to_string(), selection.offer.hotel_search_code.clone()),
        ("selection_id".to_string(), selection_id),
    ];
    hidden.extend(criteria.query_pairs());

    let remaining = timer.remaining();
    let requests = &form.requests;
    let template = BookingPaymentTemplate {
        hotel_name: selection.hotel.hotel_name.clone(),
        hotel_image: selection.hotel.hotel_image.clone(),
        address: selection.hotel.address.clone(),
        stars: star_marks(selection.hotel.stars),
        check_in: selection.hotel.check_in.clone(),
        check_out: selection.hotel.check_out.clone(),
        nights,
        guests: guest_summary(criteria),
        room_summary: selection.offer.room_summary.clone(),
        room_basis: selection.offer.room_basis.clone().unwrap_or_default(),
        facilities: selection.offer.facilities.clone(),
        policies: selection.offer.cancellation_policies.iter().map(|p| p.describe()).collect(),
        special: selection.offer.special.clone().filter(|s| !s.trim().is_empty()),
        price: PriceView::new(&details.price, &selection),
        remark_sections: remarks::parse_remarks(&raw_remarks),
        policy: remarks::extract_policy_info(&raw_remarks),
        raw_remarks: remarks::decode_entities(&raw_remarks),
        cancellation,
        rooms: room_views(&form, &errors),
        late_arrival_hours: requests.late_arrival_hours.clone(),
        late_arrival_minutes: requests.late_arrival_minutes.clone(),
        late_arrival_error: errors.get("late_arrival_hours").or(errors.get("late_arrival_minutes")).map(|_| {
            "Enter a valid arrival time"
        }),
        options: requests
            .options()
            .into_iter()
            .map(|(name, label, checked)| RequestOption {
                name,
                label,
                checked_attr: if checked { "checked" } else { "" },
            })
            .collect(),
        notes: form.notes.clone(),
        terms_checked_attr: if form.terms_accepted { "checked" } else { "" },
        terms_error: error_for(&errors, "terms".to_string()),
        payment_reference: form.payment_reference.clone(),
        payment_error: error_for(&errors, "payment_reference".to_string()),
        hidden,
        back_hidden: criteria.query_pairs(),
        remaining_secs: remaining,
        remaining_label: format!("{:02}:{:02}", remaining / 60, remaining % 60),
        notice,
    };
    render(template)
}

pub async fn booking_payment_page(
    State(app_state): State<AppState>,
    visitor: Visitor,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let criteria = SearchCriteria::from_query(&params, &app_state.settings.defaults)?;
    let cache = app_state.booking_cache(&visitor);
    let timeout = app_state.settings.session.timeout();

    match flow::enter_guest_details(&cache, app_state.clock.as_ref(), timeout) {
        SessionEntry::Abort => Ok(redirect_to_results(&criteria)),
        SessionEntry::Expired => expired_page(&criteria),
        SessionEntry::Active { timer, selection } => {
            let form = GuestForm::from_criteria(&criteria);
            let screen = BookingScreen {
                criteria: &criteria,
                timer,
                selection,
                form,
                errors: FieldErrors::default(),
                notice: None,
            };
            booking_page(&app_state, &cache, screen).await
        }
    }
}

pub async fn submit_booking(
    State(app_state): State<AppState>,
    visitor: Visitor,
    Form(params): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let criteria = SearchCriteria::from_query(&params, &app_state.settings.defaults)?;
    let hotel_code = required(&params, "hotelCode")?;
    let hotel_search_code = required(&params, "hotelSearchCode")?;
    let selection_id = required(&params, "selection_id")
        .ok()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| AppError::BadRequest("missing or malformed selection id".to_string()))?;

    let mut form = GuestForm::from_criteria(&criteria);
    form.apply_input(&params);

    let cache = app_state.booking_cache(&visitor);
    let timeout = app_state.settings.session.timeout();
    let request = BookingRequest {
        criteria: &criteria,
        hotel_code,
        hotel_search_code,
        selection_id,
        form: &form,
    };

    let (errors, notice) =
        match flow::submit_booking(app_state.backend.as_ref(), &cache, app_state.clock.as_ref(), timeout, request).await {
            Ok(url) => return Ok(Redirect::to(&url).into_response()),
            Err(FlowError::Expired) => return expired_page(&criteria),
            Err(FlowError::Session(_)) | Err(FlowError::NoSelection) => return Ok(redirect_to_results(&criteria)),
            Err(FlowError::Superseded) => return Ok(redirect_to_current(&cache, &criteria)),
            Err(FlowError::Invalid(errors)) => (errors, None),
            Err(FlowError::PaymentDeclined(message)) => {
                tracing::info!(%message, "Payment declined");
                (FieldErrors::default(), Some(format!("Payment was not confirmed: {message}")))
            }
            Err(FlowError::Backend(e)) => {
                tracing::error!(error = %e, "Booking failed");
                (
                    FieldErrors::default(),
                    Some("The booking could not be completed. Please try again.".to_string()),
                )
            }
        };

    // Back to the form with everything the visitor entered
    match flow::enter_guest_details(&cache, app_state.clock.as_ref(), timeout) {
        SessionEntry::Active { timer, selection } => {
            let screen = BookingScreen { criteria: &criteria, timer, selection, form, errors, notice };
            booking_page(&app_state, &cache, screen).await
        }
        SessionEntry::Expired => expired_page(&criteria),
        SessionEntry::Abort => Ok(redirect_to_results(&criteria)),
    }
}

// Where "back to results" should land: the stored selection's search, else the posted criteria
fn return_url(app_state: &AppState, cache: &BookingCache, params: &HashMap<String, String>) -> String {
    cache
        .selection()
        .map(|s| s.hotel.search_query)
        .or_else(|| {
            SearchCriteria::from_query(params, &app_state.settings.defaults)
                .ok()
                .map(|c| c.to_query())
        })
        .map(|query| flow::results_url(&query))
        .unwrap_or_else(|| "/".to_string())
}

pub async fn leave_booking(
    State(app_state): State<AppState>,
    visitor: Visitor,
    Form(params): Form<HashMap<String, String>>,
) -> Redirect {
    let cache = app_state.booking_cache(&visitor);
    let url = return_url(&app_state, &cache, &params);
    flow::leave_session(&cache);
    Redirect::to(&url)
}

pub async fn acknowledge_expiry(
    State(app_state): State<AppState>,
    visitor: Visitor,
    Form(params): Form<HashMap<String, String>>,
) -> Redirect {
    let cache = app_state.booking_cache(&visitor);
    let url = return_url(&app_state, &cache, &params);
    flow::expire_session(&cache);
    Redirect::to(&url)
}

// --- Confirmation ---

struct ConfirmationView {
    booking_code: String,
    booking_reference: String,
    status: String,
    hotel_name: String,
    address: Option<String>,
    check_in: String,
    check_out: String,
    nights: u32,
    room_basis: String,
    total_price: String,
    currency: String,
    cancellation_deadline: String,
    leader: String,
    adults: u32,
    children: u32,
    rooms: Vec<RoomGuests>,
    remark_sections: Vec<RemarkSection>,
}

impl From<BookingConfirmation> for ConfirmationView {
    fn from(confirmation: BookingConfirmation) -> Self {
        let (adults, children) = confirmation.guest_totals();
        let rooms = confirmation.guests_by_room();
        let leader = if confirmation.leader.name.trim().is_empty() {
            rooms
                .first()
                .and_then(|r| r.guests.first())
                .map(|g| g.name.clone())
                .unwrap_or_default()
        } else {
            confirmation.leader.name.clone()
        };
        Self {
            remark_sections: remarks::parse_remarks(&confirmation.remarks),
            booking_code: confirmation.booking_code,
            booking_reference: confirmation.booking_reference,
            status: confirmation.booking_status,
            hotel_name: confirmation.hotel_name,
            address: confirmation.address,
            check_in: confirmation.check_in,
            check_out: confirmation.check_out,
            nights: confirmation.nights,
            room_basis: confirmation.room_basis,
            total_price: confirmation.total_price,
            currency: confirmation.currency,
            cancellation_deadline: confirmation.cancellation_deadline,
            leader,
            adults,
            children,
            rooms,
        }
    }
}

#[derive(Template)]
#[template(path = "confirmation.html")]
struct ConfirmationTemplate {
    requested_code: String,
    confirmation: Option<ConfirmationView>,
}

pub async fn booking_confirmation(
    State(app_state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let Some(code) = params.get("booking_code").map(|c| c.trim()).filter(|c| !c.is_empty()) else {
        return render(ConfirmationTemplate { requested_code: String::new(), confirmation: None });
    };

    let (details, voucher) = tokio::join!(
        app_state.backend.booking_details(code),
        app_state.backend.voucher_request(code)
    );
    match voucher {
        Ok(status) => tracing::info!(booking_code = code, %status, "Voucher request answered"),
        Err(e) => tracing::warn!(booking_code = code, error = %e, "Voucher request failed"),
    }

    let confirmation = details
        .inspect_err(|e| tracing::warn!(booking_code = code, error = %e, "Booking details unavailable"))
        .ok()
        .map(ConfirmationView::from);
    render(ConfirmationTemplate { requested_code: code.to_string(), confirmation })
}
