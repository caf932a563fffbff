use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::schema::{RawNumber, RawRecord, RawTable};
use crate::utils::round2;

/// Five categories, each with five products and a typical ticket price.
const CATALOG: [(&str, [&str; 5], f64); 5] = [
    (
        "Sports",
        [
            "Tennis Racket",
            "Golf Clubs",
            "Baseball Glove",
            "Soccer Ball",
            "Fitness Bands",
        ],
        80.0,
    ),
    (
        "Fashion",
        ["Menswear", "Womenswear", "Sneakers", "Handbag", "Accessories"],
        60.0,
    ),
    (
        "Electronics",
        [
            "Television",
            "Laptop",
            "Refrigerator",
            "Washing Machine",
            "Air Conditioner",
        ],
        100.0,
    ),
    (
        "Groceries",
        [
            "Fresh Produce",
            "Packaged Food",
            "Beverages",
            "Snacks",
            "Condiments",
        ],
        25.0,
    ),
    (
        "Household",
        [
            "Stationery",
            "Daily Goods",
            "Pet Supplies",
            "Furniture",
            "Gift Sets",
        ],
        40.0,
    ),
];

const REGIONS: [&str; 5] = ["Tokyo", "Osaka", "Nagoya", "Fukuoka", "Sapporo"];
const GENDERS: [&str; 2] = ["female", "male"];
const PAYMENT_METHODS: [&str; 3] = ["cash", "credit card", "e-money"];

/// Relative spread of amounts around each category's base price.
const AMOUNT_SIGMA: f64 = 0.3;

/// Generates a deterministic retail-flavored upload starting on
/// 2024-01-01: `per_day` transactions for each of `days` days, drawn from
/// a fixed catalog of categories, products, customers, and regions. The
/// same seed always produces the same table, and every row passes
/// ingestion unchanged.
pub fn sample_table(days: u32, per_day: u32, seed: u64) -> RawTable {
    let mut rng = StdRng::seed_from_u64(seed);
    // AMOUNT_SIGMA is positive; construction cannot fail.
    let noise = Normal::new(1.0, AMOUNT_SIGMA).unwrap();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let mut rows = Vec::with_capacity((days as usize) * (per_day as usize));
    for offset in 0..days {
        let date = start + Days::new(u64::from(offset));
        for _ in 0..per_day {
            let (category, products, base_price) = CATALOG[rng.gen_range(0..CATALOG.len())];
            let product = products[rng.gen_range(0..products.len())];

            let factor: f64 = noise.sample(&mut rng);
            let amount = round2((base_price * factor).max(1.0));

            rows.push(RawRecord {
                date: Some(date.format("%Y-%m-%d").to_string()),
                product: Some(product.to_string()),
                customer: Some(format!("customer-{}", rng.gen_range(1..=5))),
                amount: Some(RawNumber::Number(amount)),
                category: Some(category.to_string()),
                region: Some(REGIONS[rng.gen_range(0..REGIONS.len())].to_string()),
                age: Some(RawNumber::Number(f64::from(rng.gen_range(20..=70u32)))),
                gender: Some(GENDERS[rng.gen_range(0..GENDERS.len())].to_string()),
                payment_method: Some(
                    PAYMENT_METHODS[rng.gen_range(0..PAYMENT_METHODS.len())].to_string(),
                ),
            });
        }
    }

    RawTable::new(rows)
}
