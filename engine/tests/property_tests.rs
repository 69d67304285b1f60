use proptest::prelude::*;
use termgenius_engine::config::Config;
use termgenius_engine::context::{truncate_reference, MAX_REFERENCE_CHARS, TRUNCATION_MARKER};
use termgenius_engine::ingest::{extract_records, parse_bytes, Cell, SourceFormat};

fn student_row() -> impl Strategy<Value = (Option<String>, u8, u8)> {
    (
        prop::option::of("[A-Z][a-z]{1,8}( [A-Z][a-z]{1,8})?"),
        1..=8u8,
        1..=8u8,
    )
}

fn grid(rows: &[(Option<String>, u8, u8)]) -> Vec<Vec<Cell>> {
    let mut grid = vec![vec![
        Cell::from("Student Name"),
        Cell::from("Crit A"),
        Cell::from("Crit B"),
    ]];
    for (name, a, b) in rows {
        let name = match name {
            Some(name) => Cell::from(name.as_str()),
            None => Cell::Empty,
        };
        grid.push(vec![name, Cell::from(*a as i64), Cell::from(*b as i64)]);
    }
    grid
}

// Rows without a name never become students, named rows always do, in order
proptest! {
    #[test]
    fn test_blank_names_are_skipped(rows in prop::collection::vec(student_row(), 0..30)) {
        let records = extract_records(&grid(&rows));

        let expected: Vec<&String> = rows.iter().filter_map(|(name, _, _)| name.as_ref()).collect();
        prop_assert_eq!(records.len(), expected.len());
        for (record, name) in records.iter().zip(expected) {
            prop_assert_eq!(&record.name, name);
        }
    }
}

// The average of scale values stays on the scale
proptest! {
    #[test]
    fn test_score_within_scale(rows in prop::collection::vec(student_row(), 1..20)) {
        for record in extract_records(&grid(&rows)) {
            prop_assert!((1..=8).contains(&record.score));
        }
    }
}

// Extraction is repeatable apart from generated ids
proptest! {
    #[test]
    fn test_extraction_is_repeatable(rows in prop::collection::vec(student_row(), 0..20)) {
        let grid = grid(&rows);
        let first = extract_records(&grid);
        let second = extract_records(&grid);

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert!(a.same_content(b));
            prop_assert_ne!(&a.id, &b.id);
        }
    }
}

// Arbitrary bytes never panic the CSV path
proptest! {
    #[test]
    fn test_csv_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = parse_bytes(bytes, SourceFormat::Csv);
    }
}

// Reference text is capped with a marker
proptest! {
    #[test]
    fn test_reference_truncation(len in 0..(MAX_REFERENCE_CHARS * 2)) {
        let text = "x".repeat(len);
        let truncated = truncate_reference(&text);

        if len <= MAX_REFERENCE_CHARS {
            prop_assert_eq!(truncated, text);
        } else {
            prop_assert!(truncated.ends_with(TRUNCATION_MARKER));
            prop_assert_eq!(truncated.len(), MAX_REFERENCE_CHARS + TRUNCATION_MARKER.len());
        }
    }
}

// Configuration survives a TOML round trip
proptest! {
    #[test]
    fn test_config_round_trip(
        log_level in "error|warn|info|debug|trace",
        timeout in 1..=600u64,
        model in "gemini-[a-z0-9.-]{1,12}",
        title in "[A-Za-z ]{0,20}",
        enabled in any::<bool>(),
    ) {
        let mut config = Config::default_config();
        config.core.log_level = log_level;
        config.llm.timeout_secs = timeout;
        config.llm.gemini.model = model;

        let toml_string = toml::to_string_pretty(&config).expect("Failed to serialize config");
        let toml_string = format!(
            "{}\n[[units]]\ntitle = {:?}\n\n[units.criteria.B]\nenabled = {}\n",
            toml_string, title, enabled
        );

        let parsed = Config::from_toml(&toml_string).expect("Failed to parse config");
        prop_assert_eq!(&parsed.core.log_level, &config.core.log_level);
        prop_assert_eq!(parsed.llm.timeout_secs, config.llm.timeout_secs);
        prop_assert_eq!(&parsed.llm.gemini.model, &config.llm.gemini.model);

        let units = parsed.initial_units();
        prop_assert_eq!(units.len(), 1);
        prop_assert_eq!(&units[0].title, &title);
        prop_assert_eq!(units[0].criteria[sdk::CriterionKey::B].enabled, enabled);
    }
}
