/// Integration tests: run the store against a real SQLite file in a temp dir.

use std::sync::Arc;
use std::thread;

use segora_db::Database;
use segora_db::models::{ListingPatch, MessageRow, NewChat, NewListing, OwnerWrite, ReportRow};
use segora_types::filters::{ListingFilters, RawListingFilters, SortOrder};
use uuid::Uuid;

const ELEKTRONIK: &str = "00000000-0000-0000-0000-000000000001";
const AKADEMIK: &str = "00000000-0000-0000-0000-000000000002";

fn fresh_db() -> Database {
    let dir = std::env::temp_dir().join(format!("segora_db_test_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    Database::open(&dir.join("segora.db")).unwrap()
}

fn user(db: &Database, email: &str) -> String {
    let id = Uuid::new_v4().to_string();
    assert!(db.create_user(&id, email, "hash", None, Some("untirta")).unwrap());
    id
}

struct ListingSpec<'a> {
    title: &'a str,
    price: i64,
    rating: Option<f64>,
    category: &'a str,
    campus: &'a str,
}

impl Default for ListingSpec<'_> {
    fn default() -> Self {
        Self {
            title: "Kalkulator",
            price: 10_000,
            rating: None,
            category: ELEKTRONIK,
            campus: "untirta",
        }
    }
}

fn listing(db: &Database, seller: &str, spec: ListingSpec<'_>) -> String {
    let id = Uuid::new_v4().to_string();
    db.insert_listing(&NewListing {
        id: id.clone(),
        title: spec.title.to_string(),
        description: String::new(),
        price: spec.price,
        image_url: Some(format!("https://img.test/{}.jpg", id)),
        category_id: spec.category.to_string(),
        seller_id: seller.to_string(),
        seller_name: "penjual".to_string(),
        seller_avatar: None,
        seller_major: Some("Teknik".to_string()),
        campus: Some(spec.campus.to_string()),
        offer_type: "product".to_string(),
        rating: spec.rating,
        created_at: segora_db::now(),
    })
    .unwrap();
    id
}

fn new_chat(user_a: &str, user_b: &str, item_id: &str) -> NewChat {
    NewChat {
        id: Uuid::new_v4().to_string(),
        user_a: user_a.to_string(),
        user_b: user_b.to_string(),
        item_id: item_id.to_string(),
        item_title: "Kalkulator".to_string(),
        item_image: None,
        created_at: segora_db::now(),
    }
}

fn prices(db: &Database, filters: &ListingFilters) -> Vec<i64> {
    db.query_listings(filters, None)
        .unwrap()
        .into_iter()
        .map(|l| l.price)
        .collect()
}

// -- Conversations --

#[test]
fn find_or_create_returns_the_same_chat_twice() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    let (first, created) = db.find_or_create_chat(&new_chat(&buyer, &seller, &item)).unwrap();
    assert!(created);
    assert_eq!(first.user_a, buyer);
    assert_eq!(first.user_b, seller);

    let (second, created) = db.find_or_create_chat(&new_chat(&buyer, &seller, &item)).unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);

    assert_eq!(db.list_chats_for_user(&buyer).unwrap().len(), 1);
    assert_eq!(db.list_chats_for_user(&seller).unwrap().len(), 1);
}

#[test]
fn pair_is_unordered() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    let (a, _) = db.find_or_create_chat(&new_chat(&buyer, &seller, &item)).unwrap();
    let (b, created) = db.find_or_create_chat(&new_chat(&seller, &buyer, &item)).unwrap();
    assert!(!created);
    assert_eq!(a.id, b.id);
}

#[test]
fn same_pair_different_listing_gets_a_new_chat() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let first_item = listing(&db, &seller, ListingSpec::default());
    let second_item = listing(&db, &seller, ListingSpec { title: "Buku", ..Default::default() });

    let (a, _) = db.find_or_create_chat(&new_chat(&buyer, &seller, &first_item)).unwrap();
    let (b, created) = db.find_or_create_chat(&new_chat(&buyer, &seller, &second_item)).unwrap();
    assert!(created);
    assert_ne!(a.id, b.id);
}

#[test]
fn concurrent_find_or_create_never_duplicates() {
    let db = Arc::new(fresh_db());
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            let chat = new_chat(&buyer, &seller, &item);
            thread::spawn(move || db.find_or_create_chat(&chat).unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let created = results.iter().filter(|(_, created)| *created).count();
    assert_eq!(created, 1);
    assert!(results.iter().all(|(row, _)| row.id == results[0].0.id));
    assert_eq!(db.list_chats_for_user(&buyer).unwrap().len(), 1);
}

#[test]
fn messages_are_ordered_and_marked_read_for_the_reader_only() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());
    let (chat, _) = db.find_or_create_chat(&new_chat(&buyer, &seller, &item)).unwrap();

    for (sender, content) in [(&buyer, "Halo kak"), (&seller, "Halo, masih ada"), (&buyer, "COD?")] {
        db.insert_message(&MessageRow {
            id: Uuid::new_v4().to_string(),
            chat_id: chat.id.clone(),
            sender_id: sender.clone(),
            content: content.to_string(),
            is_read: false,
            created_at: segora_db::now(),
        })
        .unwrap();
    }

    let contents: Vec<String> = db
        .get_messages(&chat.id)
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["Halo kak", "Halo, masih ada", "COD?"]);

    assert_eq!(db.mark_chat_read(&chat.id, &seller).unwrap(), 2);
    assert_eq!(db.mark_chat_read(&chat.id, &seller).unwrap(), 0);

    let unread_from_seller = db
        .get_messages(&chat.id)
        .unwrap()
        .into_iter()
        .filter(|m| !m.is_read)
        .count();
    assert_eq!(unread_from_seller, 1);
}

// -- Listing queries --

#[test]
fn sort_by_price_ascending() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    for price in [30_000, 10_000, 20_000] {
        listing(&db, &seller, ListingSpec { price, ..Default::default() });
    }

    let filters = ListingFilters { sort: SortOrder::PriceAsc, ..Default::default() };
    assert_eq!(prices(&db, &filters), vec![10_000, 20_000, 30_000]);

    let filters = ListingFilters { sort: SortOrder::PriceDesc, ..Default::default() };
    assert_eq!(prices(&db, &filters), vec![30_000, 20_000, 10_000]);
}

#[test]
fn sort_by_rating_descending_puts_unrated_last() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    for rating in [Some(4.2), None, Some(5.0), Some(3.8)] {
        listing(&db, &seller, ListingSpec { rating, ..Default::default() });
    }

    let filters = ListingFilters { sort: SortOrder::Rating, ..Default::default() };
    let ratings: Vec<Option<f64>> = db
        .query_listings(&filters, None)
        .unwrap()
        .into_iter()
        .map(|l| l.rating)
        .collect();
    assert_eq!(ratings, vec![Some(5.0), Some(4.2), Some(3.8), None]);
}

#[test]
fn empty_facets_return_the_unfiltered_set() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    for price in [5_000, 15_000, 25_000] {
        listing(&db, &seller, ListingSpec { price, ..Default::default() });
    }

    let empty = ListingFilters::try_from(RawListingFilters {
        search: Some(String::new()),
        min_price: Some(String::new()),
        max_price: Some(String::new()),
        min_rating: Some("0".into()),
        category: Some(String::new()),
        campus: Some(String::new()),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(prices(&db, &empty), prices(&db, &ListingFilters::default()));
    assert_eq!(prices(&db, &empty).len(), 3);
}

#[test]
fn contradictory_price_range_is_empty_not_an_error() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    for price in [5_000, 15_000, 60_000] {
        listing(&db, &seller, ListingSpec { price, ..Default::default() });
    }

    let filters = ListingFilters {
        min_price: Some(50_000),
        max_price: Some(10_000),
        ..Default::default()
    };
    assert!(db.query_listings(&filters, None).unwrap().is_empty());
}

#[test]
fn facets_combine_conjunctively() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    listing(&db, &seller, ListingSpec { title: "Kalkulator Casio", price: 90_000, rating: Some(4.5), ..Default::default() });
    listing(&db, &seller, ListingSpec { title: "kalkulator bekas", price: 20_000, rating: Some(4.8), ..Default::default() });
    listing(&db, &seller, ListingSpec { title: "Kalkulator murah", price: 15_000, rating: Some(3.0), ..Default::default() });
    listing(&db, &seller, ListingSpec { title: "Modul Kalkulus", price: 20_000, rating: Some(5.0), category: AKADEMIK, ..Default::default() });
    listing(&db, &seller, ListingSpec { title: "Kalkulator UI", price: 20_000, rating: Some(5.0), campus: "ui", ..Default::default() });

    let filters = ListingFilters {
        search: Some("KALKULATOR".into()),
        max_price: Some(50_000),
        min_rating: Some(4.0),
        category: Some(ELEKTRONIK.parse().unwrap()),
        campus: Some("untirta".into()),
        ..Default::default()
    };
    let titles: Vec<String> = db
        .query_listings(&filters, None)
        .unwrap()
        .into_iter()
        .map(|l| l.title)
        .collect();
    assert_eq!(titles, vec!["kalkulator bekas"]);
}

#[test]
fn search_treats_wildcards_literally() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    listing(&db, &seller, ListingSpec { title: "Diskon 50% jaket", ..Default::default() });
    listing(&db, &seller, ListingSpec { title: "Jaket 50 ribu", ..Default::default() });

    let filters = ListingFilters { search: Some("50%".into()), ..Default::default() };
    assert_eq!(db.query_listings(&filters, None).unwrap().len(), 1);
}

#[test]
fn search_folds_non_ascii_case() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let id = listing(&db, &seller, ListingSpec { title: "Kopi CAFÉ Bandung", ..Default::default() });
    listing(&db, &seller, ListingSpec { title: "Kopi sachet", ..Default::default() });

    let search = |term: &str| {
        let filters = ListingFilters { search: Some(term.into()), ..Default::default() };
        db.query_listings(&filters, None)
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect::<Vec<_>>()
    };
    assert_eq!(search("café"), vec!["Kopi CAFÉ Bandung"]);
    assert_eq!(search("CAFÉ"), vec!["Kopi CAFÉ Bandung"]);

    let patch = ListingPatch { title: Some("Teh ÉCLAIR".into()), ..Default::default() };
    assert_eq!(db.update_listing(&id, &seller, &patch).unwrap().0, OwnerWrite::Done);
    assert!(search("café").is_empty());
    assert_eq!(search("éclair"), vec!["Teh ÉCLAIR"]);
}

#[test]
fn pages_are_capped_and_offset() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    for price in 1..=25 {
        listing(&db, &seller, ListingSpec { price, ..Default::default() });
    }

    let first = ListingFilters { sort: SortOrder::PriceAsc, ..Default::default() };
    assert_eq!(prices(&db, &first).len(), 20);

    let second = ListingFilters { sort: SortOrder::PriceAsc, offset: Some(20), ..Default::default() };
    assert_eq!(prices(&db, &second), vec![21, 22, 23, 24, 25]);

    assert_eq!(db.query_listings(&ListingFilters::recommendations(), None).unwrap().len(), 4);
}

// -- Listing lifecycle --

#[test]
fn viewing_counts_views() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    db.view_listing(&item, None).unwrap();
    let row = db.view_listing(&item, None).unwrap().unwrap();
    assert_eq!(row.views, 2);
    assert_eq!(row.category_name.as_deref(), Some("Elektronik"));
    assert!(db.view_listing(&Uuid::new_v4().to_string(), None).unwrap().is_none());
}

#[test]
fn only_the_owner_edits_or_deletes() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let other = user(&db, "other@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    let patch = ListingPatch { price: Some(1), ..Default::default() };
    let (outcome, _) = db.update_listing(&item, &other, &patch).unwrap();
    assert_eq!(outcome, OwnerWrite::NotOwner);

    let (outcome, row) = db.update_listing(&item, &seller, &patch).unwrap();
    assert_eq!(outcome, OwnerWrite::Done);
    assert_eq!(row.unwrap().price, 1);

    assert_eq!(db.delete_listing(&item, &other).unwrap(), OwnerWrite::NotOwner);
    assert_eq!(db.delete_listing(&item, &seller).unwrap(), OwnerWrite::Done);
    assert_eq!(db.delete_listing(&item, &seller).unwrap(), OwnerWrite::NotFound);
}

// -- Favorites --

#[test]
fn favorite_twice_then_remove_restores_membership() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    let is_favorite = |db: &Database| {
        db.get_listing(&item, Some(&buyer)).unwrap().unwrap().is_favorite
    };
    assert_eq!(is_favorite(&db), Some(false));

    assert!(db.add_favorite(&Uuid::new_v4().to_string(), &buyer, &item).unwrap());
    assert!(!db.add_favorite(&Uuid::new_v4().to_string(), &buyer, &item).unwrap());
    assert_eq!(is_favorite(&db), Some(true));
    assert_eq!(db.list_favorites(&buyer).unwrap().len(), 1);

    assert!(db.remove_favorite(&buyer, &item).unwrap());
    assert!(!db.remove_favorite(&buyer, &item).unwrap());
    assert_eq!(is_favorite(&db), Some(false));
    assert!(db.list_favorites(&buyer).unwrap().is_empty());
}

#[test]
fn deleting_a_listing_drops_its_favorites() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    db.add_favorite(&Uuid::new_v4().to_string(), &buyer, &item).unwrap();
    db.delete_listing(&item, &seller).unwrap();
    assert!(db.list_favorites(&buyer).unwrap().is_empty());
}

// -- Profiles --

#[test]
fn setup_shop_makes_the_user_a_seller() {
    let db = fresh_db();
    let id = user(&db, "toko@kampus.ac.id");

    assert!(!db.get_profile(&id).unwrap().unwrap().is_seller);
    let profile = db.setup_shop(&id, "Toko Budi", Some("Alat tulis")).unwrap().unwrap();
    assert!(profile.is_seller);
    assert_eq!(profile.shop_name.as_deref(), Some("Toko Budi"));
    assert_eq!(profile.campus.as_deref(), Some("untirta"));
}

// -- Reports --

fn report(item_id: &str, reporter: &str, rating: u8) -> ReportRow {
    ReportRow {
        id: Uuid::new_v4().to_string(),
        item_id: item_id.to_string(),
        reporter_id: reporter.to_string(),
        rating,
        review: None,
        reason: None,
        details: None,
        created_at: segora_db::now(),
    }
}

#[test]
fn reviews_average_into_the_listing_rating() {
    let db = fresh_db();
    let seller = user(&db, "seller@kampus.ac.id");
    let buyer = user(&db, "buyer@kampus.ac.id");
    let item = listing(&db, &seller, ListingSpec::default());

    assert_eq!(db.insert_report(&report(&item, &buyer, 5)).unwrap(), Some(5.0));
    assert_eq!(db.insert_report(&report(&item, &buyer, 4)).unwrap(), Some(4.5));

    // A complaint without a rating does not move the average.
    assert_eq!(db.insert_report(&report(&item, &buyer, 0)).unwrap(), None);
    let row = db.get_listing(&item, None).unwrap().unwrap();
    assert_eq!(row.rating, Some(4.5));

    let filters = ListingFilters { min_rating: Some(4.0), ..Default::default() };
    assert_eq!(db.query_listings(&filters, None).unwrap().len(), 1);
}

// -- Users --

#[test]
fn duplicate_email_is_refused_without_a_write() {
    let db = fresh_db();
    let first = user(&db, "budi@kampus.ac.id");

    let second = Uuid::new_v4().to_string();
    assert!(!db.create_user(&second, "budi@kampus.ac.id", "hash", None, None).unwrap());
    assert!(db.get_profile(&second).unwrap().is_none());
    assert!(db.get_profile(&first).unwrap().is_some());
}

#[test]
fn concurrent_registration_creates_one_user() {
    let db = Arc::new(fresh_db());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || {
                let id = Uuid::new_v4().to_string();
                db.create_user(&id, "rebutan@kampus.ac.id", "hash", None, None).unwrap()
            })
        })
        .collect();

    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|created| *created)
        .count();
    assert_eq!(created, 1);
}
