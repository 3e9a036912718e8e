// Data structures shared between the backend client, the booking flow and the pages.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// The backend is inconsistent about codes and categories: sometimes numbers, sometimes strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = string_or_number(deserializer)?;
    Ok(if s.is_empty() { None } else { Some(s) })
}

// --- Search results ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Hotel {
    #[serde(deserialize_with = "string_or_number")]
    pub hotel_code: String,
    pub hotel_name: String,
    #[serde(default)]
    pub hotel_image: Option<String>,
    #[serde(default, rename = "hotelInfo")]
    pub hotel_info: Option<HotelInfo>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

impl Hotel {
    pub fn offer(&self, hotel_search_code: &str) -> Option<&Offer> {
        self.offers.iter().find(|o| o.hotel_search_code == hotel_search_code)
    }

    pub fn stars(&self) -> u8 {
        self.hotel_info.as_ref().map_or(0, HotelInfo::stars)
    }

    /// Cheapest offer, used for the "from" price on the results page.
    pub fn lowest_offer(&self) -> Option<&Offer> {
        self.offers.iter().min_by(|a, b| a.total_price.cmp(&b.total_price))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelInfo {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
}

impl HotelInfo {
    pub fn stars(&self) -> u8 {
        self.category
            .as_deref()
            .and_then(|c| c.trim().parse::<f32>().ok())
            .map_or(0, |c| c.clamp(0.0, 5.0) as u8)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Offer {
    pub hotel_search_code: String,
    pub currency: String,
    pub total_price: Decimal,
    #[serde(default)]
    pub rooms: Vec<String>,
    #[serde(default)]
    pub room_basis: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub special: Option<String>,
    #[serde(default)]
    pub cancellation_policies: Vec<CancellationPolicy>,
    #[serde(default, rename = "CxlDeadLine")]
    pub cxl_deadline: Option<String>,
    #[serde(default)]
    pub non_ref: Option<bool>,
    #[serde(default)]
    pub availability: Option<u32>,
}

impl Offer {
    pub fn room_summary(&self) -> String {
        format_room_labels(&self.rooms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CancellationPolicy {
    pub starting: String,
    pub value: Decimal,
    #[serde(default)]
    pub based_on: Option<String>,
}

impl CancellationPolicy {
    pub fn describe(&self) -> String {
        let basis = match self.based_on.as_deref() {
            Some("BOOKINGPRICE") => "total price",
            _ => "booking",
        };
        format!("From {}: {}% of {}", self.starting, self.value.normalize(), basis)
    }
}

/// Collapses repeated room labels: `["Double", "Double", "Suite"]` becomes
/// `"2 × Double + 1 × Suite"`, keeping first-seen order.
pub fn format_room_labels(labels: &[String]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        let label = label.trim();
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
        .iter()
        .map(|(label, count)| format!("{count} × {label}"))
        .collect::<Vec<_>>()
        .join(" + ")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotelSearchPage {
    pub hotels: Vec<Hotel>,
    pub page: u32,
    pub total_pages: u32,
}

impl HotelSearchPage {
    pub fn find(&self, hotel_code: &str, hotel_search_code: &str) -> Option<(&Hotel, &Offer)> {
        self.hotels
            .iter()
            .filter(|h| h.hotel_code == hotel_code)
            .find_map(|h| h.offer(hotel_search_code).map(|o| (h, o)))
    }
}

// --- Guest-details screen inputs ---

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub remarks: String,
    // The authoritative price for the whole stay, when the backend supplies one
    pub total_price: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub from_date: String,
    pub to_date: String,
    pub price: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomBreakdown {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(alias = "price_breakdown", alias = "entries")]
    pub breakdown: Vec<BreakdownEntry>,
}

// --- Persisted selection (visitor storage) ---

/// Hotel half of a selection, as shown on the guest-details screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedHotel {
    pub hotel_code: String,
    pub hotel_name: String,
    pub hotel_image: Option<String>,
    pub address: Option<String>,
    pub stars: u8,
    pub check_in: String,
    pub check_out: String,
    pub total_rooms: usize,
    // Criteria query string, so the flow can always navigate back to the same results
    pub search_query: String,
}

/// A chosen room/rate combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedOffer {
    pub hotel_code: String,
    pub hotel_name: String,
    pub hotel_search_code: String,
    pub total_price: Decimal,
    pub per_night_price: Decimal,
    pub currency: String,
    pub room_labels: Vec<String>,
    pub room_summary: String,
    pub room_basis: Option<String>,
    pub facilities: Vec<String>,
    pub remark: Option<String>,
    pub special: Option<String>,
    pub cancellation_policies: Vec<CancellationPolicy>,
}

/// Identifier pair of the current selection. `selection_id` changes on every pick,
/// which lets slow responses for an older pick be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedHotelRef {
    pub hotel_code: String,
    pub hotel_search_code: String,
    pub selection_id: Uuid,
}

// --- Confirmation ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedGuest {
    #[serde(default, deserialize_with = "string_or_number")]
    pub person_id: String,
    #[serde(default)]
    pub title: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedChild {
    #[serde(default, deserialize_with = "string_or_number")]
    pub person_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub child_age: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedRoom {
    #[serde(default, deserialize_with = "string_or_number")]
    pub room_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub adults: Vec<BookedGuest>,
    #[serde(default)]
    pub children: Vec<BookedChild>,
    #[serde(default)]
    pub total_adults: u32,
    #[serde(default)]
    pub total_children: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedRoomType {
    #[serde(default, rename = "type")]
    pub room_type: String,
    #[serde(default)]
    pub adults_count: u32,
    #[serde(default)]
    pub rooms: Vec<BookedRoom>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingLeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub person_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    #[serde(deserialize_with = "string_or_number")]
    pub booking_code: String,
    #[serde(default)]
    pub booking_reference: String,
    #[serde(default)]
    pub booking_status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub total_price: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub check_in: String,
    #[serde(default)]
    pub check_out: String,
    #[serde(default)]
    pub nights: u32,
    #[serde(default)]
    pub cancellation_deadline: String,
    #[serde(default)]
    pub hotel_name: String,
    #[serde(default)]
    pub room_basis: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub leader: BookingLeader,
    #[serde(default)]
    pub rooms: Vec<BookedRoomType>,
    #[serde(default)]
    pub remarks: String,
}

/// One line of the confirmation's guest list.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestLine {
    pub name: String,
    pub is_leader: bool,
    pub age: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomGuests {
    pub room_number: usize,
    pub category: String,
    pub guests: Vec<GuestLine>,
}

impl BookingConfirmation {
    pub fn guest_totals(&self) -> (u32, u32) {
        self.rooms
            .iter()
            .flat_map(|group| group.rooms.iter())
            .fold((0, 0), |(adults, children), room| {
                (adults.saturating_add(room.total_adults), children.saturating_add(room.total_children))
            })
    }

    /// Guests grouped per booked room; the first adult of the first room leads the booking.
    pub fn guests_by_room(&self) -> Vec<RoomGuests> {
        self.rooms
            .iter()
            .flat_map(|group| group.rooms.iter())
            .enumerate()
            .map(|(index, room)| {
                let adults = room.adults.iter().enumerate().map(|(i, a)| GuestLine {
                    name: format!("{} {} {}", a.title, a.first_name, a.last_name).trim().to_string(),
                    is_leader: index == 0 && i == 0,
                    age: None,
                });
                let children = room.children.iter().map(|c| GuestLine {
                    name: format!("{} {}", c.first_name, c.last_name),
                    is_leader: false,
                    age: Some(c.child_age.clone()),
                });
                RoomGuests {
                    room_number: index + 1,
                    category: room.category.clone(),
                    guests: adults.chain(children).collect(),
                }
            })
            .collect()
    }
}
