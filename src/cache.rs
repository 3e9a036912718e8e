// Typed access to the booking entries kept in visitor storage.

use crate::{
    config::StorageKeys,
    models::{SelectedHotel, SelectedHotelRef, SelectedOffer},
    pricing,
    store::PersistenceStore,
};

/// Everything the guest-details screen needs from a room pick.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSelection {
    pub hotel: SelectedHotel,
    pub offer: SelectedOffer,
    pub reference: Option<SelectedHotelRef>,
}

impl CachedSelection {
    /// Nights of the stay recorded when the offer was picked. `None` when either
    /// stored date is unreadable.
    pub fn stay_nights(&self) -> Option<u32> {
        let check_in = pricing::parse_stay_date(&self.hotel.check_in)?;
        let check_out = pricing::parse_stay_date(&self.hotel.check_out)?;
        Some(pricing::nights_spanned(check_in, check_out))
    }
}

#[derive(Clone)]
pub struct BookingCache {
    store: PersistenceStore,
    keys: StorageKeys,
}

impl BookingCache {
    pub fn new(store: PersistenceStore, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn save_selection(&self, hotel: &SelectedHotel, offer: &SelectedOffer, reference: &SelectedHotelRef) {
        self.store.save(&self.keys.hotel_info, hotel);
        self.store.save(&self.keys.room_info, offer);
        self.store.save(&self.keys.selected_hotel, reference);
    }

    /// Both blobs or nothing: a half-written selection is not shown.
    pub fn selection(&self) -> Option<CachedSelection> {
        let hotel = self.store.load(&self.keys.hotel_info)?;
        let offer = self.store.load(&self.keys.room_info)?;
        Some(CachedSelection { hotel, offer, reference: self.selected_ref() })
    }

    pub fn selected_ref(&self) -> Option<SelectedHotelRef> {
        self.store.load(&self.keys.selected_hotel)
    }

    pub fn is_currently_selected(&self, hotel_code: &str, hotel_search_code: &str) -> bool {
        self.selected_ref()
            .is_some_and(|r| r.hotel_code == hotel_code && r.hotel_search_code == hotel_search_code)
    }

    pub fn clear_selection(&self) {
        self.store.clear(&[&self.keys.hotel_info, &self.keys.room_info, &self.keys.selected_hotel]);
    }

    /// Replaces any earlier marker.
    pub fn start_session(&self, now: i64) {
        self.store.clear(&[&self.keys.session_start]);
        self.store.save(&self.keys.session_start, &now);
    }

    pub fn session_start(&self) -> Option<i64> {
        self.store.load(&self.keys.session_start)
    }

    pub fn clear_session_start(&self) {
        self.store.clear(&[&self.keys.session_start]);
    }

    pub fn clear_all(&self) {
        self.clear_session_start();
        self.clear_selection();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use uuid::Uuid;

    pub(crate) fn memory_cache() -> BookingCache {
        BookingCache::new(
            PersistenceStore::new(Arc::new(MemoryStorage::new()), "visitor"),
            StorageKeys::default(),
        )
    }

    pub(crate) fn sample_selection() -> (SelectedHotel, SelectedOffer, SelectedHotelRef) {
        let hotel = SelectedHotel {
            hotel_code: "H1".into(),
            hotel_name: "Harbour View".into(),
            hotel_image: None,
            address: Some("1 Quay".into()),
            stars: 4,
            check_in: "2025-06-01".into(),
            check_out: "2025-06-03".into(),
            total_rooms: 1,
            search_query: "destination=X".into(),
        };
        let offer = SelectedOffer {
            hotel_code: "H1".into(),
            hotel_name: "Harbour View".into(),
            hotel_search_code: "HSC-1".into(),
            total_price: Decimal::from(200),
            per_night_price: Decimal::from(100),
            currency: "USD".into(),
            room_labels: vec!["Double".into()],
            room_summary: "1 × Double".into(),
            room_basis: Some("BB".into()),
            facilities: vec![],
            remark: None,
            special: None,
            cancellation_policies: vec![],
        };
        let reference = SelectedHotelRef {
            hotel_code: "H1".into(),
            hotel_search_code: "HSC-1".into(),
            selection_id: Uuid::new_v4(),
        };
        (hotel, offer, reference)
    }

    #[test]
    fn selection_round_trips_and_clears() {
        let cache = memory_cache();
        let (hotel, offer, reference) = sample_selection();
        assert_eq!(cache.selection(), None);

        cache.save_selection(&hotel, &offer, &reference);
        let cached = cache.selection().unwrap();
        assert_eq!(cached.offer, offer);
        assert_eq!(cached.reference, Some(reference));
        assert!(cache.is_currently_selected("H1", "HSC-1"));
        assert!(!cache.is_currently_selected("H1", "HSC-2"));

        cache.clear_selection();
        assert_eq!(cache.selection(), None);
        assert!(!cache.is_currently_selected("H1", "HSC-1"));
    }

    #[test]
    fn clear_all_removes_the_session_marker_too() {
        let cache = memory_cache();
        let (hotel, offer, reference) = sample_selection();
        cache.save_selection(&hotel, &offer, &reference);
        cache.start_session(1_000);
        cache.start_session(2_000);
        assert_eq!(cache.session_start(), Some(2_000));

        cache.clear_all();
        assert_eq!(cache.session_start(), None);
        assert_eq!(cache.selection(), None);
    }

    #[test]
    fn stay_nights_come_from_the_stored_dates() {
        let (mut hotel, offer, reference) = sample_selection();
        let selection = CachedSelection { hotel: hotel.clone(), offer: offer.clone(), reference: Some(reference) };
        assert_eq!(selection.stay_nights(), Some(2));

        hotel.check_out = "soon".into();
        let unreadable = CachedSelection { hotel, offer, reference: None };
        assert_eq!(unreadable.stay_nights(), None);
    }
}
