use packdat::prelude::*;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use tempfile::tempdir;

/// Names of 1..=128 bytes, including multi-byte characters
fn asset_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./é]{1,64}"
}

fn asset_content() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(Vec::new()),
        prop::collection::vec(any::<u8>(), 1..4096),
    ]
}

fn assets() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    prop::collection::vec((asset_name(), asset_content()), 1..40)
}

fn fail(e: Error) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

/// Write everything, decode it back and compare record by record.
fn round_trip(
    container: &Container,
    input: &[(String, Vec<u8>)],
) -> std::result::Result<(), TestCaseError> {
    let mut writer = container.open_write().map_err(fail)?;
    let mut written = Vec::with_capacity(input.len());
    for (name, data) in input {
        written.push(writer.write_bytes(name, data).map_err(fail)?);
    }
    writer.finish().map_err(fail)?;

    let decoded = container.enumerate().map_err(fail)?;
    prop_assert_eq!(&decoded, &written);

    let mut reader = container.open_read().map_err(fail)?;
    for ((name, data), asset) in input.iter().zip(&decoded) {
        prop_assert_eq!(&asset.name, name);
        prop_assert_eq!(asset.size as usize, data.len());
        prop_assert_eq!(asset.crc32, crc32fast::hash(data));
        if data.is_empty() {
            prop_assert_eq!(asset.offset, 0);
        }
        prop_assert_eq!(&reader.read_asset(asset).map_err(fail)?, data);
    }
    prop_assert!(container.validate().map_err(fail)?.is_clean());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Pack round trip preserves order, sizes and CRCs
    #[test]
    fn pack_round_trip(input in assets()) {
        let dir = tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let container = Container::open(dir.path().join("prop.pack")).map_err(fail)?;
        round_trip(&container, &input)?;
    }

    /// Dat round trip with caps small enough to force spanning
    #[test]
    fn dat_round_trip(input in assets(), cap in 256u64..5000) {
        let dir = tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let options = ContainerOptions::new()
            .with_data_file_cap(cap)
            .with_copy_buffer_size(1000);
        let container = Container::open(dir.path().join("prop_manifest.dat"))
            .map_err(fail)?
            .with_options(options);
        round_trip(&container, &input)?;
    }

    /// Appending in two sessions decodes the same as one session
    #[test]
    fn pack_append_matches_single_session(first in assets(), second in assets()) {
        let dir = tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let container = Container::open(dir.path().join("twice.pack")).map_err(fail)?;

        let mut writer = container.open_write().map_err(fail)?;
        for (name, data) in &first {
            writer.write_bytes(name, data).map_err(fail)?;
        }
        writer.finish().map_err(fail)?;

        let mut writer = container.open_append().map_err(fail)?;
        for (name, data) in &second {
            writer.write_bytes(name, data).map_err(fail)?;
        }
        writer.finish().map_err(fail)?;

        let names: Vec<String> = container
            .enumerate()
            .map_err(fail)?
            .into_iter()
            .map(|a| a.name)
            .collect();
        let expected: Vec<String> = first.iter().chain(&second).map(|(n, _)| n.clone()).collect();
        prop_assert_eq!(names, expected);
        prop_assert!(container.validate().map_err(fail)?.is_clean());
    }
}
