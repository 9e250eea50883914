use std::time::Duration;

use chrono::{Days, NaiveDate};
use rand::Rng;
use tokio::time::sleep;

use crate::models::{InvoiceRecord, InvoiceStatus};

pub const DEFAULT_TOTAL: usize = 20_000;
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

const BATCH_PAUSE: Duration = Duration::from_millis(100);
const ID_PREFIX: &str = "CHV";

const VENDORS: [&str; 10] = [
    "Halliburton",
    "Schlumberger",
    "Baker Hughes",
    "Weatherford",
    "National Oilwell Varco",
    "TechnipFMC",
    "Transocean",
    "Saipem",
    "Fluor",
    "Aker Solutions",
];

const SERVICE_CATEGORIES: [&str; 10] = [
    "Drilling",
    "Well Completion",
    "Seismic Survey",
    "Equipment Rental",
    "Maintenance",
    "Pipeline Services",
    "Environmental Services",
    "Refinery Services",
    "Offshore Services",
    "Safety Training",
];

const STATES: [&str; 10] = [
    "Texas",
    "Louisiana",
    "California",
    "Alaska",
    "New Mexico",
    "Oklahoma",
    "Colorado",
    "Wyoming",
    "North Dakota",
    "Pennsylvania",
];

fn date_window() -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid window start");
    let end = NaiveDate::from_ymd_opt(2024, 7, 12).expect("valid window end");
    (start, end)
}

/// Generate exactly `count` synthetic invoices. Sequence numbers continue from
/// `seq_offset` so batched callers get unique IDs across the whole run.
pub fn generate_batch(count: usize, seq_offset: usize) -> Vec<InvoiceRecord> {
    let mut rng = rand::thread_rng();
    let (window_start, window_end) = date_window();
    let window_days = (window_end - window_start).num_days() as u64;

    (0..count)
        .map(|i| {
            let invoice_date = window_start + Days::new(rng.gen_range(0..=window_days));
            let due_date = invoice_date + Days::new(rng.gen_range(15..45));
            InvoiceRecord {
                invoice_id: format!(
                    "{}-{}-{:06}",
                    ID_PREFIX,
                    invoice_date.format("%Y"),
                    seq_offset + i + 1
                ),
                vendor_name: VENDORS[rng.gen_range(0..VENDORS.len())].to_string(),
                service_category: SERVICE_CATEGORIES[rng.gen_range(0..SERVICE_CATEGORIES.len())]
                    .to_string(),
                invoice_amount: rng.gen_range(50_000..10_000_000) as f64 / 100.0,
                invoice_date,
                due_date,
                status: if rng.gen_bool(0.9) {
                    InvoiceStatus::Paid
                } else {
                    InvoiceStatus::Pending
                },
                state: STATES[rng.gen_range(0..STATES.len())].to_string(),
                well_name: format!("Well-{}", rng.gen_range(1..=1000)),
            }
        })
        .collect()
}

/// Generate `total` invoices in chunks of `batch_size`, reporting the percent
/// completed after each chunk and pausing briefly between chunks so a
/// cooperative host stays responsive. The final report is exactly 100.
pub async fn load_dataset<F>(total: usize, batch_size: usize, mut on_progress: F) -> Vec<InvoiceRecord>
where
    F: FnMut(f64),
{
    if total == 0 {
        on_progress(100.0);
        return Vec::new();
    }

    let batch_size = batch_size.max(1);
    let mut records = Vec::with_capacity(total);
    while records.len() < total {
        let remaining = total - records.len();
        let batch = generate_batch(remaining.min(batch_size), records.len());
        records.extend(batch);
        on_progress(records.len() as f64 / total as f64 * 100.0);
        if records.len() < total {
            sleep(BATCH_PAUSE).await;
        }
    }
    records
}
