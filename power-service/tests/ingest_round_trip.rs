use power_service::{
    pipeline::{clean_rows, persist_readings, IngestSettings},
    query::{query_readings, QueryRequest},
    sources::{read_rows, SheetFormat},
    store::MemoryStore,
    transform::{Layout, SAMPLES_PER_DAY},
};

/// Wide export with the two header rows and one active-power row per day.
/// Reactive rows are interleaved as in real exports.
fn wide_csv(days: &[(&str, usize)]) -> Vec<u8> {
    let mut text = String::from("数据日期,类型,单位\n日期,类型,单位");
    for slot in 0..SAMPLES_PER_DAY {
        text.push_str(&format!(",{:02}:{:02}", slot / 4, (slot % 4) * 15));
    }
    text.push('\n');

    for (day, samples) in days {
        let cells: Vec<String> = (0..*samples).map(|i| format!("{}.25", 100 + i)).collect();
        text.push_str(&format!("{day},有功功率,kW,{}\n", cells.join(",")));
        text.push_str(&format!("{day},无功功率,kvar,{}\n", cells.join(",")));
    }
    text.into_bytes()
}

#[tokio::test]
async fn only_complete_days_survive_in_order() {
    let bytes = wide_csv(&[
        ("2024-05-03", SAMPLES_PER_DAY),
        ("2024-05-01", SAMPLES_PER_DAY),
        ("2024-05-04", SAMPLES_PER_DAY - 1),
        ("2024-05-02", SAMPLES_PER_DAY),
    ]);
    let settings = IngestSettings::default();

    let rows = read_rows(SheetFormat::Csv, &bytes).unwrap();
    let cleaned = clean_rows(&rows, "acme", &settings).unwrap();

    assert_eq!(cleaned.layout, Layout::Wide);
    // The short day row is rejected before any grouping.
    assert_eq!(cleaned.rows_skipped, 1);
    assert_eq!(cleaned.days_kept, 3);
    assert_eq!(cleaned.days_dropped, 0);
    assert_eq!(cleaned.readings.len(), 3 * SAMPLES_PER_DAY);
    assert!(cleaned.readings.windows(2).all(|w| w[0].ts < w[1].ts));

    let store = MemoryStore::new();
    let outcome = persist_readings(&store, &cleaned.readings, 100).await;
    assert_eq!(outcome.persisted, 3 * SAMPLES_PER_DAY);
    assert_eq!(outcome.failures, 0);

    let resp = query_readings(
        &store,
        &QueryRequest {
            start_time: "2024-05-01 00:00:00".to_string(),
            end_time: "2024-05-04 23:45:00".to_string(),
            company: "acme".to_string(),
        },
        settings.offset,
    )
    .await
    .unwrap();

    assert_eq!(resp.data.len(), 3 * SAMPLES_PER_DAY);
    assert_eq!(resp.data[0].time, "2024-05-01 00:00:00");
    assert_eq!(resp.data[0].power, 100.25);
    assert_eq!(resp.data.last().unwrap().time, "2024-05-03 23:45:00");
    assert!(resp.data.iter().all(|p| !p.time.starts_with("2024-05-04")));
}

#[test]
fn tall_file_repeating_half_a_day_is_not_complete() {
    let mut text = String::from("序号,数据时间,瞬时有功\n");
    for pass in 0..2 {
        for slot in 0..SAMPLES_PER_DAY / 2 {
            let n = pass * SAMPLES_PER_DAY / 2 + slot + 1;
            text.push_str(&format!("{n},2024-05-01 {:02}:{:02}:00,{}\n", slot / 4, (slot % 4) * 15, 10 + slot));
        }
    }

    let rows = read_rows(SheetFormat::Csv, text.as_bytes()).unwrap();
    let cleaned = clean_rows(&rows, "acme", &IngestSettings::default()).unwrap();

    assert_eq!(cleaned.layout, Layout::Tall);
    assert_eq!(cleaned.candidates, SAMPLES_PER_DAY);
    assert_eq!(cleaned.days_kept, 0);
    assert_eq!(cleaned.days_dropped, 1);
    assert!(cleaned.readings.is_empty());
}

#[test]
fn wide_file_splitting_a_day_over_two_rows_is_not_complete() {
    let bytes = wide_csv(&[("2024-05-01", SAMPLES_PER_DAY / 2), ("2024-05-01", SAMPLES_PER_DAY / 2)]);

    let rows = read_rows(SheetFormat::Csv, &bytes).unwrap();
    let cleaned = clean_rows(&rows, "acme", &IngestSettings::default()).unwrap();

    assert_eq!(cleaned.rows_skipped, 2);
    assert_eq!(cleaned.days_kept, 0);
    assert!(cleaned.readings.is_empty());
}

#[tokio::test]
async fn tall_file_with_partial_timestamps_round_trips() {
    let mut text = String::from("序号,数据时间,瞬时有功\n");
    for slot in 0..SAMPLES_PER_DAY {
        text.push_str(&format!("{},03-10 {:02}:{:02},{}\n", slot + 1, slot / 4, (slot % 4) * 15, 20 + slot));
    }
    // A blank power cell on the next day leaves that day incomplete.
    text.push_str("97,03-11 00:00,\n98,03-11 00:15,5\n");

    let settings = IngestSettings {
        assumed_year: 2023,
        ..IngestSettings::default()
    };
    let rows = read_rows(SheetFormat::Csv, text.as_bytes()).unwrap();
    let cleaned = clean_rows(&rows, "globex", &settings).unwrap();

    assert_eq!(cleaned.layout, Layout::Tall);
    assert_eq!(cleaned.rows_skipped, 1);
    assert_eq!(cleaned.days_kept, 1);
    assert_eq!(cleaned.days_dropped, 1);

    let store = MemoryStore::new();
    persist_readings(&store, &cleaned.readings, 500).await;

    let resp = query_readings(
        &store,
        &QueryRequest {
            start_time: "2023-03-10 00:00:00".to_string(),
            end_time: "2023-03-11 23:45:00".to_string(),
            company: "globex".to_string(),
        },
        settings.offset,
    )
    .await
    .unwrap();
    assert_eq!(resp.data.len(), SAMPLES_PER_DAY);
    assert_eq!(resp.data[95].time, "2023-03-10 23:45:00");
}
