use mrmc::naming::{discover_partials, parse_partial_name, partial_file_name, PartialName};
use mrmc::RunLayout;
use proptest::prelude::*;
use std::fs;

fn header_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9_.-]{0,11}"
}

/// Tags never start/end with '_' and never contain the "__" separator.
fn tag_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9.-]{0,4}(_[a-z0-9.-]{1,4}){0,2})?"
}

proptest! {
    #[test]
    fn name_then_parse_recovers_tag_and_index(
        header in header_strategy(),
        tag in tag_strategy(),
        index in proptest::option::of(0usize..100_000),
    ) {
        let name = partial_file_name(&header, &tag, index);
        prop_assert_eq!(
            parse_partial_name(&header, &name),
            Some(PartialName { tag: tag.clone(), index })
        );
    }

    #[test]
    fn discovery_scan_recovers_every_written_file(
        header in header_strategy(),
        tags in proptest::collection::btree_set(tag_strategy(), 1..4),
        njobs in 1usize..5,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), &header).unwrap();
        let mut expected = Vec::new();
        for tag in &tags {
            for i in 0..njobs {
                fs::write(layout.partial_path(tag, Some(i)), "").unwrap();
                expected.push(PartialName { tag: tag.clone(), index: Some(i) });
            }
        }
        // Noise the scan must ignore.
        fs::write(layout.log_path(), "").unwrap();
        fs::write(layout.capture_path(0, "out"), "").unwrap();
        fs::write(layout.job_descriptor_path(), "").unwrap();

        expected.sort();
        prop_assert_eq!(discover_partials(&layout).unwrap(), expected);
    }
}
