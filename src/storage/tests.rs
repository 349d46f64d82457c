use super::*;
use crate::metainfo::{hash_piece, ContentDescriptor, DigestBlob, FileEntry};
use rand::RngCore;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn content(files: &[(&str, u64)], piece_size: u64) -> ContentDescriptor {
    ContentDescriptor::multi_file(
        "content",
        files
            .iter()
            .map(|(name, size)| FileEntry::new([*name], *size))
            .collect(),
        piece_size,
    )
}

fn write_content(root: &Path, content: &ContentDescriptor) -> Vec<u8> {
    let mut stream = Vec::new();
    for (index, file) in content.files().iter().enumerate() {
        let mut data = vec![0u8; file.size as usize];
        rand::rng().fill_bytes(&mut data);
        let path = content.fs_path(root, index);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, &data).unwrap();
        stream.extend_from_slice(&data);
    }
    stream
}

#[test]
fn test_file_position() {
    let content = content(&[("a", 3), ("b", 5), ("c", 10), ("d", 6)], 4);
    let mapper = PieceMapper::new(&content);
    let positions: Vec<u64> = content
        .files()
        .iter()
        .map(|f| mapper.file_position(f).unwrap())
        .collect();
    assert_eq!(positions, vec![0, 3, 8, 18]);
}

#[test]
fn test_unknown_file_is_rejected() {
    let content = content(&[("a", 3)], 4);
    let mapper = PieceMapper::new(&content);
    let stranger = FileEntry::new(["z"], 3);
    assert!(matches!(
        mapper.file_position(&stranger),
        Err(StorageError::FileNotInContent { .. })
    ));
}

#[test]
fn test_piece_index_bounds() {
    let content = content(&[("a", 8), ("b", 16)], 6);
    let mapper = PieceMapper::new(&content);
    assert_eq!(content.total_size(), 24);
    assert_eq!(content.max_piece_index(), 3);

    assert!(mapper.files_at_piece_index(3).is_ok());
    for index in [4, u32::MAX] {
        assert!(matches!(
            mapper.files_at_piece_index(index),
            Err(StorageError::PieceIndexOutOfBounds { max: 3, .. })
        ));
        assert!(matches!(
            mapper.read_piece(index, Path::new("/nonexistent")),
            Err(StorageError::PieceIndexOutOfBounds { .. })
        ));
    }
}

#[test]
fn test_piece_indexes_of_file() {
    let content = content(&[("a", 6), ("b", 23), ("c", 1)], 6);
    let mapper = PieceMapper::new(&content);
    let [a, b, c] = [&content.files()[0], &content.files()[1], &content.files()[2]];

    assert_eq!(mapper.piece_indexes_of_file(b, false).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(mapper.piece_indexes_of_file(b, true).unwrap(), vec![1, 2, 3]);
    assert_eq!(mapper.piece_indexes_of_file(a, true).unwrap(), vec![0]);
    assert_eq!(mapper.piece_indexes_of_file(c, false).unwrap(), vec![4]);
    assert!(mapper.piece_indexes_of_file(c, true).unwrap().is_empty());
}

#[test]
fn test_small_file_inside_one_piece_is_never_exclusive() {
    let content = content(&[("a", 2), ("b", 1), ("c", 3)], 8);
    let mapper = PieceMapper::new(&content);
    let b = &content.files()[1];
    assert_eq!(mapper.piece_indexes_of_file(b, false).unwrap(), vec![0]);
    assert!(mapper.piece_indexes_of_file(b, true).unwrap().is_empty());
}

#[test]
fn test_file_at_position() {
    let content = content(&[("a", 3), ("empty", 0), ("b", 5)], 4);
    let mapper = PieceMapper::new(&content);

    assert_eq!(mapper.file_at_position(0).unwrap().path, vec!["a"]);
    assert_eq!(mapper.file_at_position(2).unwrap().path, vec!["a"]);
    assert_eq!(mapper.file_at_position(3).unwrap().path, vec!["b"]);
    assert_eq!(mapper.file_at_position(7).unwrap().path, vec!["b"]);
    assert!(matches!(
        mapper.file_at_position(8),
        Err(StorageError::PositionOutOfBounds { position: 8, max: 7 })
    ));
}

#[test]
fn test_byte_ranges() {
    let content = content(&[("a", 3), ("empty", 0), ("b", 5)], 4);
    let mapper = PieceMapper::new(&content);
    let files = content.files();

    assert_eq!(mapper.byte_range_of_file(&files[0]).unwrap(), Some(0..=2));
    assert_eq!(mapper.byte_range_of_file(&files[1]).unwrap(), None);
    assert_eq!(mapper.byte_range_of_file(&files[2]).unwrap(), Some(3..=7));

    let names = |first, last| -> Vec<String> {
        mapper
            .files_in_byte_range(first, last)
            .unwrap()
            .iter()
            .map(|f| f.path.join("/"))
            .collect()
    };
    assert_eq!(names(0, 0), vec!["a"]);
    assert_eq!(names(2, 3), vec!["a", "b"]);
    assert_eq!(names(3, 3), vec!["b"]);
    assert_eq!(names(0, 100), vec!["a", "b"]);
    assert!(matches!(
        mapper.files_in_byte_range(5, 4),
        Err(StorageError::InvalidByteRange { .. })
    ));
}

#[test]
fn test_files_at_piece_index_clips_final_piece() {
    let content = content(&[("a", 8), ("b", 16)], 6);
    let mapper = PieceMapper::new(&content);
    let names: Vec<_> = mapper
        .files_at_piece_index(1)
        .unwrap()
        .iter()
        .map(|f| f.path.join("/"))
        .collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(mapper.files_at_piece_index(3).unwrap().len(), 1);
}

#[test]
fn test_absolute_and_relative_piece_indexes() {
    let content = content(&[("a", 50 * 16), ("b", 100 * 16)], 16);
    let mapper = PieceMapper::new(&content);
    let b = &content.files()[1];
    let relative = [0, 1, 70, 75, 1000, -1000, -3, -2, -1];

    let absolute = mapper.absolute_piece_indexes(b, &relative).unwrap();
    assert_eq!(
        absolute,
        BTreeSet::from([50, 51, 120, 125, 147, 148, 149])
    );

    let relative = mapper.relative_piece_indexes(b, &relative).unwrap();
    assert_eq!(relative, BTreeSet::from([0, 1, 70, 75, 97, 98, 99]));
}

#[test]
fn test_read_piece_spans_files() {
    let temp = TempDir::new().unwrap();
    let content = content(&[("a", 20_000), ("b", 50_000), ("c", 30_000)], 16384);
    let stream = write_content(temp.path(), &content);
    let mapper = PieceMapper::new(&content);

    for index in 0..content.piece_count() {
        let piece = mapper.read_piece(index, temp.path()).unwrap();
        let start = index as usize * 16384;
        let expected_len = content.piece_length(index) as usize;
        assert_eq!(piece.len(), expected_len);
        assert_eq!(&piece[..], &stream[start..start + expected_len]);
    }
    assert_eq!(mapper.read_piece(6, temp.path()).unwrap().len(), 100_000 - 6 * 16384);
}

#[test]
fn test_read_piece_size_mismatch() {
    let temp = TempDir::new().unwrap();
    let content = content(&[("a", 20_000), ("b", 50_000)], 16384);
    write_content(temp.path(), &content);
    fs::write(temp.path().join("b"), vec![0u8; 49_999]).unwrap();

    let mapper = PieceMapper::new(&content);
    assert!(mapper.read_piece(0, temp.path()).is_ok());
    match mapper.read_piece(1, temp.path()) {
        Err(StorageError::FileSize {
            actual, expected, ..
        }) => {
            assert_eq!(actual, Some(49_999));
            assert_eq!(expected, 50_000);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_file() {
    let temp = TempDir::new().unwrap();
    let content = content(&[("a", 20_000), ("b", 50_000)], 16384);
    write_content(temp.path(), &content);
    fs::remove_file(temp.path().join("b")).unwrap();

    let mapper = PieceMapper::new(&content);
    let err = mapper.read_piece(2, temp.path()).unwrap_err();
    assert!(matches!(err, StorageError::PathNotFound { .. }));
    assert!(err.is_not_found());

    assert_eq!(mapper.piece_digest(2, temp.path()).unwrap(), None);
    assert!(mapper.piece_digest(0, temp.path()).unwrap().is_some());
}

#[test]
fn test_file_in_place_of_parent_dir_is_missing() {
    let temp = TempDir::new().unwrap();
    let content = ContentDescriptor::multi_file(
        "content",
        vec![FileEntry::new(["sub", "x"], 100)],
        16384,
    );
    fs::write(temp.path().join("sub"), b"regular file").unwrap();

    let mapper = PieceMapper::new(&content);
    let err = mapper.read_piece(0, temp.path()).unwrap_err();
    assert!(matches!(err, StorageError::PathNotFound { .. }));
    assert_eq!(mapper.piece_digest(0, temp.path()).unwrap(), None);

    let io_err = fs::metadata(temp.path().join("sub").join("x")).unwrap_err();
    let err = StorageError::from_metadata(&temp.path().join("sub").join("x"), &io_err);
    assert!(matches!(err, StorageError::PathNotFound { .. }));

    let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
    let err = StorageError::from_metadata(Path::new("x"), &denied);
    assert!(matches!(err, StorageError::Read { .. }));
    assert!(!err.is_not_found());
}

#[test]
fn test_verify_piece() {
    let temp = TempDir::new().unwrap();
    let content = content(&[("a", 20_000), ("b", 12_768)], 16384);
    let stream = write_content(temp.path(), &content);
    let blob = DigestBlob::from_digests(stream.chunks(16384).map(hash_piece));

    let mapper = PieceMapper::new(&content);
    assert_eq!(mapper.verify_piece(0, temp.path(), &blob).unwrap(), Some(true));
    assert_eq!(mapper.verify_piece(1, temp.path(), &blob).unwrap(), Some(true));

    let mut corrupt = stream[16384..20_000].to_vec();
    corrupt[0] ^= 0xff;
    let mut a = stream[..16384].to_vec();
    a.extend_from_slice(&corrupt);
    fs::write(temp.path().join("a"), &a).unwrap();
    assert_eq!(mapper.verify_piece(1, temp.path(), &blob).unwrap(), Some(false));

    fs::remove_file(temp.path().join("b")).unwrap();
    assert_eq!(mapper.verify_piece(1, temp.path(), &blob).unwrap(), None);
}

#[test]
fn test_handle_cache_is_bounded() {
    let temp = TempDir::new().unwrap();
    let content = content(&[("a", 16384), ("b", 16384), ("c", 16384)], 16384);
    write_content(temp.path(), &content);

    let mapper = PieceMapper::with_max_open_files(&content, 2);
    for index in 0..3 {
        mapper.read_piece(index, temp.path()).unwrap();
        assert!(mapper.open_files() <= 2);
    }
    assert_eq!(mapper.open_files(), 2);

    mapper.close();
    assert_eq!(mapper.open_files(), 0);
}

#[test]
fn test_open_file_cache_evicts_oldest() {
    let temp = TempDir::new().unwrap();
    let paths: Vec<_> = (0..3)
        .map(|i| {
            let path = temp.path().join(format!("f{i}"));
            fs::write(&path, b"x").unwrap();
            path
        })
        .collect();

    let mut cache = OpenFileCache::new(2);
    cache.get_or_open(&paths[0]).unwrap();
    cache.get_or_open(&paths[1]).unwrap();
    cache.get_or_open(&paths[0]).unwrap();
    cache.get_or_open(&paths[2]).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(!cache.contains(&paths[0]));
    assert!(cache.contains(&paths[1]));
    assert!(cache.contains(&paths[2]));

    assert!(cache.get_or_open(&temp.path().join("missing")).is_err());
    cache.close_all();
    assert!(cache.is_empty());
}

#[test]
fn test_content_error_message_is_one_based() {
    let single = StorageError::Content {
        piece_index: 2,
        piece_size: 16384,
        files: vec!["content/a".into()],
    };
    assert_eq!(single.to_string(), "corruption in piece 3, in content/a");

    let joint = StorageError::Content {
        piece_index: 0,
        piece_size: 16384,
        files: vec!["content/a".into(), "content/b".into()],
    };
    assert_eq!(
        joint.to_string(),
        "corruption in piece 1, at least one of these files is corrupt: content/a, content/b"
    );
}
