//! Small-buffer containers: hybrid arrays and hybrid strings

mod common;

use common::*;
use synthlens::memory::samples;
use synthlens::shape::Indexer;
use synthlens::*;
use test_case::test_case;

fn inline_address(image: &MemoryImage, array: &ValueRef) -> u64 {
    image.field(array, "m_StaticData").unwrap().address
}

fn external_address(image: &MemoryImage, array: &ValueRef) -> u64 {
    let pointer = image.field(array, "m_pElements").unwrap();
    image.unsigned_value(&pointer, 0)
}

#[test_case(&[1, 2, 3], 4, Storage::Inline ; "below local capacity")]
#[test_case(&[1, 2, 3, 4], 4, Storage::Inline ; "at local capacity")]
#[test_case(&[1, 2, 3, 4, 5], 4, Storage::External ; "above local capacity")]
#[test_case(&[9, 8], 1, Storage::External ; "single inline slot")]
fn test_hybrid_array_sources_elements(values: &[u32], local_capacity: u64, expected: Storage) {
    let mut builder = ImageBuilder::new();
    let array = samples::hybrid_array(&mut builder, values, local_capacity).unwrap();
    let image = builder.finish();
    let inspector = inspector(&image);
    let mut view = inspector.view(&array).unwrap();

    let Indexer::Hybrid(indexer) = &view.descriptor().indexer else {
        panic!("hybrid array must use the hybrid indexer");
    };
    assert_eq!(indexer.local_capacity(), local_capacity as usize);
    assert_eq!(indexer.storage(&image).unwrap(), expected);

    let base = match expected {
        Storage::Inline => inline_address(&image, &array),
        Storage::External => external_address(&image, &array),
    };
    for (index, value) in values.iter().enumerate() {
        let element = view.try_element_at(index).unwrap();
        assert_eq!(element.address, base + 4 * index as u64);
        assert_eq!(image.unsigned_value(&element, 0), u64::from(*value));
    }
    assert_eq!(
        view.try_element_at(values.len()),
        Err(LensError::OutOfRange {
            index: values.len(),
            count: values.len()
        })
    );
}

#[test]
fn test_external_regime_never_reads_inline_buffer() {
    let image = samples::standard().unwrap();
    let array = image.symbol("large").unwrap();
    let inline = inline_address(&image, &array);
    let inspector = inspector(&image);
    let mut view = inspector.view(&array).unwrap();

    assert_eq!(view.count(), 10);
    for index in 0..10 {
        let element = view.try_element_at(index).unwrap();
        assert!(
            element.address < inline || element.address >= inline + 16,
            "element {index} came from the inline buffer"
        );
    }
    assert_eq!(
        scalars(&image, &mut view),
        (1..=10u64).map(Some).collect::<Vec<_>>()
    );
}

#[test]
fn test_hybrid_count_ceiling_is_lower() {
    let live = LiveImage::new(samples::standard().unwrap());
    let array = live.symbol("small");
    live.set_field(array, "m_uiCount", 0x1000_0001);

    let inspector = Inspector::new(&live, ShapeRegistry::with_defaults(), EngineConfig::default());
    let view = inspector.view(&array).unwrap();
    assert_eq!(view.count(), 0);
    assert_eq!(
        view.try_count(),
        Err(LensError::Degraded {
            declared: 0x1000_0001,
            ceiling: 0x1000_0000
        })
    );
}

#[test]
fn test_short_string_reads_inline_buffer() {
    let image = samples::standard().unwrap();
    let string = image.symbol("greeting").unwrap();
    let inspector = inspector(&image);
    let view = inspector.view(&string).unwrap();

    assert_eq!(view.count(), 5);
    let Indexer::Hybrid(indexer) = &view.descriptor().indexer else {
        panic!("strings use the hybrid indexer");
    };
    assert_eq!(indexer.local_capacity(), 16);
    assert_eq!(indexer.storage(&image).unwrap(), Storage::Inline);
    assert_eq!(view.content().as_deref(), Some(&b"hello"[..]));
    assert_eq!(view.summary(), "\"hello\"");
    assert_eq!(inspector.summary(&string).as_deref(), Some("\"hello\""));
}

#[test]
fn test_long_string_reads_external_buffer() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let view = view(&inspector, &image, "long_text");

    assert_eq!(view.summary(), "\"the quick brown fox jumps over the lazy dog\"");
    assert_eq!(view.character_count(), Some(43));
}

#[test]
fn test_character_count_differs_from_byte_count() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let view = view(&inspector, &image, "unicode");

    assert_eq!(view.count(), "größe".len());
    assert_eq!(view.character_count(), Some(5));
    assert_eq!(view.summary(), "\"größe\"");
}

#[test]
fn test_string_builder_uses_string_layout() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let view = view(&inspector, &image, "builder");
    assert_eq!(view.descriptor().kind, ContainerKind::HybridString);
    assert_eq!(view.summary(), "\"Data/Textures/Stone.dds\"");
}

#[test]
fn test_preview_limit_truncates_content() {
    let image = samples::standard().unwrap();
    let config = EngineConfig::default().with_string_preview_limit(9);
    let inspector = Inspector::new(&image, ShapeRegistry::with_defaults(), config);
    let value = image.symbol("long_text").unwrap();

    assert_eq!(inspector.summary(&value).as_deref(), Some("\"the quick\""));
}

#[test]
fn test_preview_cut_inside_multibyte_character() {
    let image = samples::standard().unwrap();
    // "größe": g r ö(2 bytes) ß(2 bytes) e; 3 bytes end inside "ö"
    let config = EngineConfig::default().with_string_preview_limit(3);
    let inspector = Inspector::new(&image, ShapeRegistry::with_defaults(), config);
    let value = image.symbol("unicode").unwrap();

    assert_eq!(inspector.summary(&value).as_deref(), Some("\"gr\""));
}

#[test]
fn test_empty_string_summary() {
    let mut builder = ImageBuilder::new();
    let string = samples::hybrid_string(&mut builder, "", 16).unwrap();
    let image = builder.finish();
    let inspector = inspector(&image);

    assert_eq!(inspector.summary(&string).as_deref(), Some("<empty>"));
}

#[test]
fn test_corrupt_string_count_summarizes_empty() {
    let live = LiveImage::new(samples::standard().unwrap());
    let string = live.symbol("greeting");
    let data = live.0.borrow().field(&string, "m_Data").unwrap();
    live.set_field(data, "m_uiCount", 0xFFFF_FFFF);

    let inspector = Inspector::new(&live, ShapeRegistry::with_defaults(), EngineConfig::default());
    assert_eq!(inspector.summary(&string).as_deref(), Some("<empty>"));
}
