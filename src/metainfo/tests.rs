use super::*;
use std::path::{Path, PathBuf};

fn three_files(piece_size: u64) -> ContentDescriptor {
    ContentDescriptor::multi_file(
        "content",
        vec![
            FileEntry::new(["a"], 20_000),
            FileEntry::new(["sub", "b"], 50_000),
            FileEntry::new(["c"], 30_000),
        ],
        piece_size,
    )
}

#[test]
fn test_derived_sizes() {
    let content = three_files(16384);
    assert_eq!(content.total_size(), 100_000);
    assert_eq!(content.piece_count(), 7);
    assert_eq!(content.max_piece_index(), 6);
    assert_eq!(content.file_offset(0), 0);
    assert_eq!(content.file_offset(1), 20_000);
    assert_eq!(content.file_offset(2), 70_000);
}

#[test]
fn test_piece_length_invariant() {
    let content = three_files(16384);
    for index in 0..content.max_piece_index() {
        assert_eq!(content.piece_length(index), 16384);
    }
    assert_eq!(content.piece_length(6), 100_000 - 6 * 16384);

    let exact = ContentDescriptor::single_file("exact", 4 * 16384, 16384);
    assert_eq!(exact.piece_count(), 4);
    assert_eq!(exact.piece_length(3), 16384);
}

#[test]
fn test_validate_accepts_well_formed_content() {
    assert!(three_files(16384).validate().is_ok());
    assert!(ContentDescriptor::single_file("x", 1, 1 << 24).validate().is_ok());
}

#[test]
fn test_validate_piece_size() {
    for size in [0, 6, 8192, 16384 + 1, 1 << 25] {
        let err = three_files(size).validate().unwrap_err();
        assert!(matches!(err, MetainfoError::PieceSize { .. }), "{size}");
    }
}

#[test]
fn test_validate_structure() {
    let empty = ContentDescriptor::multi_file("x", Vec::new(), 16384);
    assert_eq!(empty.validate(), Err(MetainfoError::EmptyContent));

    let unnamed = ContentDescriptor::single_file("", 10, 16384);
    assert_eq!(unnamed.validate(), Err(MetainfoError::MissingField("name")));

    let traversal =
        ContentDescriptor::multi_file("x", vec![FileEntry::new(["..", "etc"], 1)], 16384);
    assert_eq!(
        traversal.validate(),
        Err(MetainfoError::InvalidField("file path"))
    );

    let no_path = ContentDescriptor::multi_file(
        "x",
        vec![FileEntry::new(Vec::<String>::new(), 1)],
        16384,
    );
    assert_eq!(
        no_path.validate(),
        Err(MetainfoError::MissingField("file path"))
    );
}

#[test]
fn test_fs_paths() {
    let content = three_files(16384);
    let root = Path::new("/data/content");
    assert_eq!(
        content.fs_path(root, 1),
        PathBuf::from("/data/content/sub/b")
    );

    let single = ContentDescriptor::single_file("movie.mkv", 10, 16384);
    assert_eq!(
        single.fs_path(Path::new("/data/renamed.mkv"), 0),
        PathBuf::from("/data/renamed.mkv")
    );
}

#[test]
fn test_content_paths_start_with_name() {
    let content = three_files(16384);
    assert_eq!(content.content_path(1), PathBuf::from("content/sub/b"));

    let single = ContentDescriptor::single_file("movie.mkv", 10, 16384);
    assert_eq!(single.content_path(0), PathBuf::from("movie.mkv"));
}

#[test]
fn test_fs_root_name_substitution() {
    let content = three_files(16384);
    let root = Path::new("/data/other");
    assert_eq!(content.fs_root(root, true), PathBuf::from("/data/other"));
    assert_eq!(content.fs_root(root, false), PathBuf::from("/data/content"));
}

#[test]
fn test_hash_piece_known_digest() {
    let digest = hash_piece(b"abc");
    let expected = [
        0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50, 0xc2,
        0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
    ];
    assert_eq!(digest, expected);
}

#[test]
fn test_digest_blob_rejects_partial_digest() {
    let err = DigestBlob::from_bytes(vec![0u8; 41]).unwrap_err();
    assert_eq!(err, MetainfoError::DigestBlobLength(41));
    assert!(DigestBlob::from_bytes(vec![0u8; 40]).is_ok());
}

#[test]
fn test_digest_blob_indexing() {
    let digests: Vec<PieceDigest> = (0u8..4).map(|i| [i; 20]).collect();
    let blob = DigestBlob::from_digests(digests.clone());

    assert_eq!(blob.len(), 4);
    assert_eq!(blob.as_bytes().len(), 80);
    assert_eq!(blob.get(2), Some([2; 20]));
    assert_eq!(blob.get(4), None);
    assert_eq!(blob.iter().collect::<Vec<_>>(), digests);
}

#[test]
fn test_digest_blob_sorts_collected_digests() {
    let unsorted = vec![(2, [2u8; 20]), (0, [0u8; 20]), (1, [1u8; 20])];
    let blob = DigestBlob::from_unsorted(unsorted);
    assert_eq!(&blob.as_bytes()[..20], &[0u8; 20]);
    assert_eq!(&blob.as_bytes()[40..], &[2u8; 20]);
}
