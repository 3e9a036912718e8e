// Search criteria and their URL query representation.
// Every screen after the search form rebuilds its state from these parameters.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::{collections::HashMap, str::FromStr};

use crate::{config::SearchDefaults, pricing};

pub const MAX_ROOMS: usize = 9;
pub const MAX_ADULTS_PER_ROOM: u32 = 9;
pub const MAX_CHILDREN_PER_ROOM: u32 = 6;
pub const MAX_CHILD_AGE: u32 = 17;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("missing search parameter '{0}'")]
    Missing(&'static str),

    #[error("invalid date '{value}' for '{field}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("check-out must be after check-in")]
    EmptyStay,

    #[error("invalid number '{value}' for '{field}'")]
    InvalidNumber { field: String, value: String },

    #[error("between 1 and 9 rooms can be booked, got {0}")]
    RoomCount(usize),

    #[error("room {0} needs at least one adult")]
    NoAdults(usize),

    #[error("'{field}' allows at most {max}, got {value}")]
    TooMany { field: String, value: u32, max: u32 },

    #[error("child age {age} in '{field}' is over 17")]
    ChildAge { field: String, age: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOccupancy {
    pub adults: u32,
    pub children: u32,
    pub children_ages: Vec<u32>,
}

impl RoomOccupancy {
    pub fn child_age(&self, index: usize) -> Option<u32> {
        self.children_ages.get(index).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub destination: String,
    pub destination_display: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub currency: String,
    pub nationality: String,
    pub rooms: Vec<RoomOccupancy>,
    pub filters: SearchFilters,
}

/// Optional narrowing of a search. Room basis, star levels and the price range go
/// to the backend; amenities are matched against the returned hotels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub room_basis: Vec<String>,
    pub star_levels: Vec<u8>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub amenities: Vec<String>,
}

fn split_list(raw: Option<&String>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_price(params: &HashMap<String, String>, key: &str) -> Result<Option<Decimal>, CriteriaError> {
    match params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => Decimal::from_str(raw)
            .ok()
            .filter(|price| !price.is_sign_negative())
            .map(Some)
            .ok_or_else(|| CriteriaError::InvalidNumber {
                field: key.to_string(),
                value: raw.to_string(),
            }),
    }
}

impl SearchFilters {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, CriteriaError> {
        Ok(Self {
            room_basis: split_list(params.get("roomBasis")),
            // Star levels outside 1..=5 are not offered by the search form
            star_levels: split_list(params.get("starLevels"))
                .iter()
                .filter_map(|level| level.parse::<u8>().ok())
                .filter(|level| (1..=5).contains(level))
                .collect(),
            min_price: parse_price(params, "minPrice")?,
            max_price: parse_price(params, "maxPrice")?,
            amenities: split_list(params.get("amenities")),
        })
    }

    /// Present filters only, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !self.room_basis.is_empty() {
            pairs.push(("roomBasis".to_string(), self.room_basis.join(",")));
        }
        if !self.star_levels.is_empty() {
            let levels = self.star_levels.iter().map(u8::to_string).collect::<Vec<_>>().join(",");
            pairs.push(("starLevels".to_string(), levels));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice".to_string(), min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice".to_string(), max.to_string()));
        }
        if !self.amenities.is_empty() {
            pairs.push(("amenities".to_string(), self.amenities.join(",")));
        }
        pairs
    }

    /// The form fields the backend search expects. Absent filters are sent empty.
    pub fn backend_form(&self) -> Vec<(String, String)> {
        let levels = self.star_levels.iter().map(u8::to_string).collect::<Vec<_>>().join(",");
        vec![
            ("roomBasis".to_string(), self.room_basis.join(",")),
            ("starLevels".to_string(), levels),
            ("minPrice".to_string(), self.min_price.map(|p| p.to_string()).unwrap_or_default()),
            ("maxPrice".to_string(), self.max_price.map(|p| p.to_string()).unwrap_or_default()),
        ]
    }

    /// A hotel passes when no amenities are requested or it lists any of them.
    /// Matching is a case-insensitive substring test against the hotel's facilities.
    pub fn matches_amenities(&self, facilities: &[String]) -> bool {
        if self.amenities.is_empty() {
            return true;
        }
        self.amenities.iter().any(|wanted| {
            let wanted = wanted.to_lowercase();
            facilities.iter().any(|facility| facility.to_lowercase().contains(&wanted))
        })
    }
}

fn parse_date(params: &HashMap<String, String>, keys: &[&'static str]) -> Result<NaiveDate, CriteriaError> {
    let (field, raw) = keys
        .iter()
        .find_map(|k| params.get(*k).filter(|v| !v.trim().is_empty()).map(|v| (*k, v)))
        .ok_or(CriteriaError::Missing(keys[0]))?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| CriteriaError::InvalidDate {
        field,
        value: raw.clone(),
    })
}

fn parse_count(params: &HashMap<String, String>, key: String, default: u32) -> Result<u32, CriteriaError> {
    match params.get(&key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| CriteriaError::InvalidNumber {
            field: key.clone(),
            value: raw.to_string(),
        }),
    }
}

fn parse_bounded(params: &HashMap<String, String>, key: String, default: u32, max: u32) -> Result<u32, CriteriaError> {
    let value = parse_count(params, key.clone(), default)?;
    if value > max {
        return Err(CriteriaError::TooMany { field: key, value, max });
    }
    Ok(value)
}

impl SearchCriteria {
    /// Rebuilds criteria from query parameters. The guest-details screen names its
    /// dates `checkInDate`/`checkOutDate`; both spellings are accepted.
    pub fn from_query(params: &HashMap<String, String>, defaults: &SearchDefaults) -> Result<Self, CriteriaError> {
        let destination = params
            .get("destination")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or(CriteriaError::Missing("destination"))?;
        let destination_display = params
            .get("destinationDisplay")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| destination.clone());

        let check_in = parse_date(params, &["checkIn", "checkInDate"])?;
        let check_out = parse_date(params, &["checkOut", "checkOutDate"])?;
        if check_out <= check_in {
            return Err(CriteriaError::EmptyStay);
        }

        let non_empty = |key: &str, default: &str| {
            params
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let total_rooms = parse_count(params, "totalRooms".to_string(), 1)? as usize;
        if total_rooms == 0 || total_rooms > MAX_ROOMS {
            return Err(CriteriaError::RoomCount(total_rooms));
        }

        let mut rooms = Vec::with_capacity(total_rooms);
        for n in 1..=total_rooms {
            let adults = parse_bounded(params, format!("adult{n}"), 1, MAX_ADULTS_PER_ROOM)?;
            if adults == 0 {
                return Err(CriteriaError::NoAdults(n));
            }
            let children = parse_bounded(params, format!("children{n}"), 0, MAX_CHILDREN_PER_ROOM)?;

            let ages_key = format!("childrenAges{n}");
            let children_ages: Vec<u32> = params
                .get(&ages_key)
                .map(|raw| {
                    raw.split(',')
                        .filter_map(|age| age.trim().parse::<u32>().ok())
                        .take(children as usize)
                        .collect()
                })
                .unwrap_or_default();
            if let Some(&age) = children_ages.iter().find(|&&age| age > MAX_CHILD_AGE) {
                return Err(CriteriaError::ChildAge { field: ages_key, age });
            }
            rooms.push(RoomOccupancy { adults, children, children_ages });
        }

        Ok(Self {
            destination,
            destination_display,
            check_in,
            check_out,
            currency: non_empty("currency", &defaults.currency),
            nationality: non_empty("nationality", &defaults.nationality),
            rooms,
            filters: SearchFilters::from_query(params)?,
        })
    }

    /// Query parameters in the order the screens exchange them. `childrenAges{N}` is
    /// left out for rooms without children, and filters only appear when set.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("destination".to_string(), self.destination.clone()),
            ("destinationDisplay".to_string(), self.destination_display.clone()),
            ("checkIn".to_string(), self.check_in.format(DATE_FORMAT).to_string()),
            ("checkOut".to_string(), self.check_out.format(DATE_FORMAT).to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("nationality".to_string(), self.nationality.clone()),
            ("totalRooms".to_string(), self.rooms.len().to_string()),
        ];
        for (i, room) in self.rooms.iter().enumerate() {
            let n = i + 1;
            pairs.push((format!("adult{n}"), room.adults.to_string()));
            pairs.push((format!("children{n}"), room.children.to_string()));
            if room.children > 0 {
                let ages = room.children_ages.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
                pairs.push((format!("childrenAges{n}"), ages));
            }
        }
        pairs.extend(self.filters.query_pairs());
        pairs
    }

    pub fn to_query(&self) -> String {
        encode_pairs(&self.query_pairs())
    }

    pub fn nights(&self) -> u32 {
        pricing::nights_between(self.check_in, self.check_out)
    }

    pub fn total_adults(&self) -> u32 {
        self.rooms.iter().map(|r| r.adults).sum()
    }

    pub fn total_children(&self) -> u32 {
        self.rooms.iter().map(|r| r.children).sum()
    }
}

pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
