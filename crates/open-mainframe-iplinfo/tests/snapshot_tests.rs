//! End-to-end snapshot flows over synthetic storage.

mod common;

use common::*;
use open_mainframe_iplinfo::layout::{CVT, CVTEXT2, CVTEXT2_PTR, ECVT, IPA, PSA, PSACVT};
use open_mainframe_iplinfo::output::{render_json, render_text};
use open_mainframe_iplinfo::{
    resolve, AddressingMode, ControlBlockLocator, IplInfoConfig, LayoutCatalog, LinkFault,
    RootHandle, SnapshotAssembler, SnapshotError, SnapshotField, StorageImage, TextEncoding,
    TraversalError,
};

#[test]
fn test_snapshot_matches_placed_bytes() {
    let image = sample_image();
    let snapshot = SnapshotAssembler::zos().unwrap().snapshot_from(&image).unwrap();

    assert_eq!(snapshot.load_dataset(), "EC");
    assert_eq!(snapshot.parmlib_dataset_name(), "SYS1.PARMLIB(PARMLIB00)");
    assert_eq!(snapshot.device_id(), "0742");
    assert_eq!(snapshot.iodf_id(), "01");

    let parmlib = snapshot.value(SnapshotField::ParmlibDatasetName);
    assert_eq!(parmlib.raw(), TextEncoding::Ebcdic.encode("SYS1.PARMLIB(PARMLIB00)"));
    assert_eq!(parmlib.width(), 44);
    assert_eq!(parmlib.len(), 23);
}

#[test]
fn test_snapshot_is_idempotent() {
    let image = sample_image();
    let assembler = SnapshotAssembler::zos().unwrap();
    let first = assembler.snapshot_from(&image).unwrap();
    let second = assembler.snapshot_from(&image).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_null_psa_link_fails_at_step_zero() {
    let mut image = sample_image();
    image.write(16, &[0; 4]);
    let catalog = LayoutCatalog::zos().unwrap();
    let path = catalog
        .chain_path("ext2", &[(PSA, PSACVT), (CVT, CVTEXT2_PTR)], CVTEXT2)
        .unwrap();

    let recording = RecordingSpace::new(image);
    let root = RootHandle::new(&recording, 0);
    let err = resolve(&root, &path).unwrap_err();
    assert!(matches!(
        err,
        TraversalError::BrokenLink { step: 0, ref block, fault: LinkFault::Null, .. } if block == PSA
    ));
    // Only the PSA itself was read.
    assert_eq!(recording.reads(), vec![(0, 20)]);
}

#[test]
fn test_corrupted_ecvt_link_stops_before_extraction() {
    let mut image = sample_image();
    image.write((ECVT_AT + 392) as u64, &[0xFF; 4]);
    let recording = RecordingSpace::new(image);
    let root = RootHandle::new(&recording, 0);

    let err = SnapshotAssembler::zos()
        .unwrap()
        .build_snapshot(&root)
        .unwrap_err();
    match err {
        SnapshotError::Traversal {
            field,
            source: TraversalError::BrokenLink { step, block, .. },
        } => {
            assert_eq!(field, SnapshotField::LoadDataset);
            assert_eq!(step, 2);
            assert_eq!(block, ECVT);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let touched_ipa_or_ext2 = recording
        .reads()
        .iter()
        .any(|&(address, _)| address >= IPA_AT as u64);
    assert!(!touched_ipa_or_ext2);
}

#[test]
fn test_reads_stay_within_declared_blocks() {
    let recording = RecordingSpace::new(sample_image());
    let root = RootHandle::new(&recording, 0);
    SnapshotAssembler::zos().unwrap().build_snapshot(&root).unwrap();

    let catalog = LayoutCatalog::zos().unwrap();
    let size = |name| catalog.require_block(name).unwrap().size();
    for (address, len) in recording.reads() {
        let expected = match address as usize {
            0 => size(PSA),
            CVT_AT => size(CVT),
            ECVT_AT => size(ECVT),
            IPA_AT => size(IPA),
            EXT2_AT => size(CVTEXT2),
            other => panic!("unexpected read at {other:#x}"),
        };
        assert_eq!(len, expected, "read at {address:#x}");
    }
}

#[test]
fn test_ipa_mapped_to_exact_size() {
    let dump = flat_dump(&SAMPLE, TextEncoding::Ebcdic);
    let mut image = StorageImage::new(AddressingMode::Amode31).with_root(0);
    image.map(0, dump[..IPA_AT].to_vec()).unwrap();
    image.map(IPA_AT as u64, dump[IPA_AT..IPA_AT + 96].to_vec()).unwrap();
    image.map(EXT2_AT as u64, dump[EXT2_AT..].to_vec()).unwrap();

    let snapshot = SnapshotAssembler::zos().unwrap().snapshot_from(&image).unwrap();
    assert_eq!(snapshot.device_id(), "0742");
}

#[test]
fn test_concurrent_snapshots_agree() {
    let image = sample_image();
    let assembler = SnapshotAssembler::zos().unwrap();
    let expected = assembler.snapshot_from(&image).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| assembler.snapshot_from(&image).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_missing_root_is_recoverable() {
    let image = StorageImage::new(AddressingMode::Amode31);
    assert_eq!(image.locate().unwrap_err(), TraversalError::NoRoot);
    let err = SnapshotAssembler::zos().unwrap().snapshot_from(&image).unwrap_err();
    assert!(err.to_string().contains("no control-block root"));
}

#[test]
fn test_iodf_override_from_config() {
    let mut dump = flat_dump(&SAMPLE, TextEncoding::Ebcdic);
    dump[EXT2_AT + 4..EXT2_AT + 8].copy_from_slice(&TextEncoding::Ebcdic.encode("A1B2"));
    let image = image_from(dump);

    let config = IplInfoConfig::from_toml_str(
        "[[layout.overrides]]\nblock = \"CVTEXT2\"\nfield = \"IODF_ID\"\noffset = 4\nwidth = 4\n",
    )
    .unwrap();
    let assembler = SnapshotAssembler::new(&config.catalog().unwrap()).unwrap();
    assert_eq!(assembler.snapshot_from(&image).unwrap().iodf_id(), "A1B2");
}

#[test]
fn test_renders_text_and_json() {
    let image = sample_image();
    let snapshot = SnapshotAssembler::zos().unwrap().snapshot_from(&image).unwrap();

    assert_eq!(
        render_text(&snapshot),
        "USED LOADEC IN SYS1.PARMLIB(PARMLIB00) ON 0742\nIODF 01\n"
    );

    let json: serde_json::Value = serde_json::from_str(&render_json(&snapshot).unwrap()).unwrap();
    assert_eq!(json["load_dataset"], "EC");
    assert_eq!(json["parmlib_dataset_name"], "SYS1.PARMLIB(PARMLIB00)");
    assert_eq!(json["device_id"], "0742");
    assert_eq!(json["iodf_id"], "01");
}
