// Guest-and-payment form: one entry per traveller from the search occupancy, special
// requests, notes and the payment reference. Posted as flat `room{R}_adult{A}_*` fields.

use std::collections::HashMap;

use crate::criteria::SearchCriteria;

pub const ADULT_TITLES: &[&str] = &["mr", "mrs", "ms", "miss", "dr"];
pub const CHILD_TITLE: &str = "child";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdultGuest {
    // Field-name prefix, e.g. `room1_adult2`
    pub prefix: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildGuest {
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    /// Taken from the search and never from the posted form.
    pub age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomForm {
    pub number: usize,
    pub adults: Vec<AdultGuest>,
    pub children: Vec<ChildGuest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialRequests {
    pub late_arrival_hours: String,
    pub late_arrival_minutes: String,
    pub connecting_rooms: bool,
    pub adjoining_rooms: bool,
    pub non_smoking: bool,
    pub honeymoon: bool,
    pub extra_bed: bool,
}

impl SpecialRequests {
    const FLAGS: [(&'static str, &'static str); 5] = [
        ("connecting_rooms", "If possible, provide connecting rooms"),
        ("adjoining_rooms", "If possible, provide adjoining rooms"),
        ("non_smoking", "Non-smoking room"),
        ("honeymoon", "Special treatment for honeymooners"),
        ("extra_bed", "Extra bed"),
    ];

    fn flag(&self, name: &str) -> bool {
        match name {
            "connecting_rooms" => self.connecting_rooms,
            "adjoining_rooms" => self.adjoining_rooms,
            "non_smoking" => self.non_smoking,
            "honeymoon" => self.honeymoon,
            "extra_bed" => self.extra_bed,
            _ => false,
        }
    }

    /// `(field name, label, checked)` for each checkbox on the form.
    pub fn options(&self) -> Vec<(&'static str, &'static str, bool)> {
        Self::FLAGS.iter().map(|(name, label)| (*name, *label, self.flag(name))).collect()
    }

    /// `HH:MM`, when an hour was given.
    pub fn late_arrival(&self) -> Option<String> {
        let hours: u32 = self.late_arrival_hours.trim().parse().ok()?;
        let minutes: u32 = self.late_arrival_minutes.trim().parse().unwrap_or(0);
        Some(format!("{hours:02}:{minutes:02}"))
    }

    pub fn selected(&self) -> Vec<&'static str> {
        Self::FLAGS.iter().map(|(name, _)| *name).filter(|name| self.flag(name)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    fn push(&mut self, field: impl Into<String>, message: &'static str) {
        self.0.push(FieldError { field: field.into(), message });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestForm {
    pub rooms: Vec<RoomForm>,
    pub requests: SpecialRequests,
    pub notes: String,
    pub terms_accepted: bool,
    pub payment_reference: String,
}

fn checked(input: &HashMap<String, String>, name: &str) -> bool {
    input
        .get(name)
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes"))
}

impl GuestForm {
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        let rooms = criteria
            .rooms
            .iter()
            .enumerate()
            .map(|(r, occupancy)| {
                let number = r + 1;
                let adults = (1..=occupancy.adults)
                    .map(|a| AdultGuest {
                        prefix: format!("room{number}_adult{a}"),
                        title: "mr".to_string(),
                        first_name: String::new(),
                        last_name: String::new(),
                    })
                    .collect();
                let children = (0..occupancy.children as usize)
                    .map(|c| ChildGuest {
                        prefix: format!("room{number}_child{}", c + 1),
                        first_name: String::new(),
                        last_name: String::new(),
                        age: occupancy.child_age(c),
                    })
                    .collect();
                RoomForm { number, adults, children }
            })
            .collect();

        Self {
            rooms,
            requests: SpecialRequests::default(),
            notes: String::new(),
            terms_accepted: false,
            payment_reference: String::new(),
        }
    }

    /// Merges posted fields. Unknown fields and posted child ages are ignored;
    /// unchecked boxes are absent from a form post and read as `false`.
    pub fn apply_input(&mut self, input: &HashMap<String, String>) {
        let text = |name: String| input.get(&name).map(|v| v.trim().to_string());

        for room in &mut self.rooms {
            for adult in &mut room.adults {
                if let Some(title) = text(format!("{}_title", adult.prefix)).filter(|t| !t.is_empty()) {
                    adult.title = title.to_ascii_lowercase();
                }
                if let Some(first) = text(format!("{}_first_name", adult.prefix)) {
                    adult.first_name = first;
                }
                if let Some(last) = text(format!("{}_last_name", adult.prefix)) {
                    adult.last_name = last;
                }
            }
            for child in &mut room.children {
                if let Some(first) = text(format!("{}_first_name", child.prefix)) {
                    child.first_name = first;
                }
                if let Some(last) = text(format!("{}_last_name", child.prefix)) {
                    child.last_name = last;
                }
            }
        }

        self.requests = SpecialRequests {
            late_arrival_hours: text("late_arrival_hours".into()).unwrap_or_default(),
            late_arrival_minutes: text("late_arrival_minutes".into()).unwrap_or_default(),
            connecting_rooms: checked(input, "connecting_rooms"),
            adjoining_rooms: checked(input, "adjoining_rooms"),
            non_smoking: checked(input, "non_smoking"),
            honeymoon: checked(input, "honeymoon"),
            extra_bed: checked(input, "extra_bed"),
        };
        self.notes = text("notes".into()).unwrap_or_default();
        self.terms_accepted = checked(input, "terms");
        self.payment_reference = text("payment_reference".into()).unwrap_or_default();
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        for room in &self.rooms {
            for adult in &room.adults {
                if !ADULT_TITLES.contains(&adult.title.as_str()) {
                    errors.push(format!("{}_title", adult.prefix), "Choose a title");
                }
                if adult.first_name.is_empty() {
                    errors.push(format!("{}_first_name", adult.prefix), "First name is required");
                }
                if adult.last_name.is_empty() {
                    errors.push(format!("{}_last_name", adult.prefix), "Last name is required");
                }
            }
            for child in &room.children {
                if child.first_name.is_empty() {
                    errors.push(format!("{}_first_name", child.prefix), "First name is required");
                }
                if child.last_name.is_empty() {
                    errors.push(format!("{}_last_name", child.prefix), "Last name is required");
                }
                if child.age.is_none() {
                    errors.push(format!("{}_age", child.prefix), "Child age is missing from the search");
                }
            }
        }

        let hours = self.requests.late_arrival_hours.as_str();
        if !hours.is_empty() && !hours.parse::<u32>().is_ok_and(|h| h < 24) {
            errors.push("late_arrival_hours", "Hours must be between 0 and 23");
        }
        let minutes = self.requests.late_arrival_minutes.as_str();
        if !minutes.is_empty() && !minutes.parse::<u32>().is_ok_and(|m| m < 60) {
            errors.push("late_arrival_minutes", "Minutes must be between 0 and 59");
        }

        if !self.terms_accepted {
            errors.push("terms", "Accept the terms and conditions to continue");
        }
        if self.payment_reference.is_empty() {
            errors.push("payment_reference", "Payment reference is required");
        }
        errors
    }

    pub fn lead_guest(&self) -> Option<&AdultGuest> {
        self.rooms.first().and_then(|r| r.adults.first())
    }

    /// Guest and request fields of the booking request, in form order.
    pub fn to_payload(&self) -> Vec<(String, String)> {
        let mut payload = Vec::new();
        for room in &self.rooms {
            for adult in &room.adults {
                payload.push((format!("{}_title", adult.prefix), adult.title.clone()));
                payload.push((format!("{}_first_name", adult.prefix), adult.first_name.clone()));
                payload.push((format!("{}_last_name", adult.prefix), adult.last_name.clone()));
            }
            for child in &room.children {
                payload.push((format!("{}_title", child.prefix), CHILD_TITLE.to_string()));
                payload.push((format!("{}_first_name", child.prefix), child.first_name.clone()));
                payload.push((format!("{}_last_name", child.prefix), child.last_name.clone()));
                if let Some(age) = child.age {
                    payload.push((format!("{}_age", child.prefix), age.to_string()));
                }
            }
        }
        if let Some(time) = self.requests.late_arrival() {
            payload.push(("late_arrival".to_string(), time));
        }
        let selected = self.requests.selected();
        if !selected.is_empty() {
            payload.push(("special_requests".to_string(), selected.join(",")));
        }
        if !self.notes.is_empty() {
            payload.push(("notes".to_string(), self.notes.clone()));
        }
        payload.push(("payment_reference".to_string(), self.payment_reference.clone()));
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SearchDefaults,
        criteria::{RoomOccupancy, SearchFilters},
    };
    use chrono::NaiveDate;

    fn criteria(rooms: Vec<RoomOccupancy>) -> SearchCriteria {
        SearchCriteria {
            destination: "LON".into(),
            destination_display: "London".into(),
            check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            currency: "USD".into(),
            nationality: "NG".into(),
            rooms,
            filters: SearchFilters::default(),
        }
    }

    fn input(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn entries_follow_occupancy_and_child_age_is_locked() {
        let mut form = GuestForm::from_criteria(&criteria(vec![RoomOccupancy {
            adults: 3,
            children: 1,
            children_ages: vec![5],
        }]));
        assert_eq!(form.rooms.len(), 1);
        assert_eq!(form.rooms[0].adults.len(), 3);
        assert!(form.rooms[0].adults.iter().all(|a| a.title == "mr"));
        assert_eq!(form.rooms[0].children[0].age, Some(5));
        assert_eq!(form.rooms[0].adults[2].prefix, "room1_adult3");

        form.apply_input(&input(&[("room1_child1_age", "9"), ("room1_child1_first_name", "Sam")]));
        assert_eq!(form.rooms[0].children[0].age, Some(5));
        assert_eq!(form.rooms[0].children[0].first_name, "Sam");
    }

    #[test]
    fn two_room_query_yields_locked_child_in_second_room() {
        let query = "destination=LON&checkIn=2025-06-01&checkOut=2025-06-03&totalRooms=2\
                     &adult1=2&children1=0&adult2=1&children2=1&childrenAges2=5";
        let params: HashMap<String, String> = query
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let defaults = SearchDefaults { currency: "USD".into(), nationality: "NG".into() };
        let criteria = SearchCriteria::from_query(&params, &defaults).unwrap();

        let mut form = GuestForm::from_criteria(&criteria);
        assert_eq!(form.rooms.len(), 2);
        assert_eq!(form.rooms[0].adults.len(), 2);
        assert!(form.rooms[0].children.is_empty());
        assert_eq!(form.rooms[1].adults.len(), 1);
        assert_eq!(form.rooms[1].children.len(), 1);
        assert_eq!(form.rooms[1].children[0].age, Some(5));
        assert_eq!(form.rooms[1].children[0].prefix, "room2_child1");

        form.apply_input(&input(&[("room2_child1_age", "11")]));
        assert_eq!(form.rooms[1].children[0].age, Some(5));
        let adults: usize = form.rooms.iter().map(|r| r.adults.len()).sum();
        assert_eq!(adults, 3);
    }

    #[test]
    fn empty_form_reports_each_missing_field() {
        let form = GuestForm::from_criteria(&criteria(vec![
            RoomOccupancy { adults: 1, children: 0, children_ages: vec![] },
            RoomOccupancy { adults: 1, children: 1, children_ages: vec![] },
        ]));
        let errors = form.validate();
        assert_eq!(errors.get("room1_adult1_first_name"), Some("First name is required"));
        assert_eq!(errors.get("room2_child1_age"), Some("Child age is missing from the search"));
        assert!(errors.get("terms").is_some());
        assert!(errors.get("payment_reference").is_some());
        assert!(errors.get("room1_adult1_title").is_none());
        // 2 adults x 2 names, child x 2 names + age, terms, payment
        assert_eq!(errors.len(), 9);
    }

    #[test]
    fn completed_form_builds_the_payload() {
        let mut form = GuestForm::from_criteria(&criteria(vec![RoomOccupancy {
            adults: 1,
            children: 1,
            children_ages: vec![7],
        }]));
        form.apply_input(&input(&[
            ("room1_adult1_title", "MS"),
            ("room1_adult1_first_name", " Ada "),
            ("room1_adult1_last_name", "Byron"),
            ("room1_child1_first_name", "Sam"),
            ("room1_child1_last_name", "Byron"),
            ("late_arrival_hours", "22"),
            ("late_arrival_minutes", "5"),
            ("non_smoking", "on"),
            ("honeymoon", "on"),
            ("terms", "on"),
            ("payment_reference", "PAY-42"),
        ]));
        assert!(form.validate().is_empty());
        assert_eq!(form.lead_guest().map(|g| g.first_name.as_str()), Some("Ada"));

        let payload: HashMap<String, String> = form.to_payload().into_iter().collect();
        assert_eq!(payload["room1_adult1_title"], "ms");
        assert_eq!(payload["room1_adult1_first_name"], "Ada");
        assert_eq!(payload["room1_child1_age"], "7");
        assert_eq!(payload["room1_child1_title"], "child");
        assert_eq!(payload["late_arrival"], "22:05");
        assert_eq!(payload["special_requests"], "non_smoking,honeymoon");
        assert_eq!(payload["payment_reference"], "PAY-42");
        assert!(!payload.contains_key("notes"));
    }

    #[test]
    fn out_of_range_arrival_time_is_rejected() {
        let mut form = GuestForm::from_criteria(&criteria(vec![RoomOccupancy {
            adults: 1,
            children: 0,
            children_ages: vec![],
        }]));
        form.apply_input(&input(&[("late_arrival_hours", "25"), ("late_arrival_minutes", "x")]));
        let errors = form.validate();
        assert!(errors.get("late_arrival_hours").is_some());
        assert!(errors.get("late_arrival_minutes").is_some());
    }
}
