use strand_fs::{
    Error, FallbackStrategy, Filesystem, LocalFilesystem, MoveOptions, copy_file, move_file,
};
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;

#[test]
fn test_move_same_volume_needs_no_fallback() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("incoming.bin");
    let dest = dir.path().join("placed.bin");
    std::fs::write(&src, "incoming").unwrap();

    let options = MoveOptions::new().fallback(FallbackStrategy::Error);
    move_file(&src, &dest, options).unwrap();

    assert!(!src.exists());
    assert_eq!(std::fs::read(&dest).unwrap(), b"incoming");
}

#[test]
fn test_copy_file_missing_source() {
    let dir = tempdir().unwrap();
    let err = copy_file(dir.path().join("missing"), dir.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::Copy { .. }));
    assert_eq!(err.path(), Some(dir.path().join("out").as_path()));
}

#[tokio::test]
async fn test_local_filesystem_round_trip() {
    let dir = tempdir().unwrap();
    let fs = LocalFilesystem::new();
    let staging = dir.path().join("staging");
    let final_dir = dir.path().join("final");

    fs.create_dir_all(&staging).await.unwrap();
    fs.create_dir_all(&final_dir).await.unwrap();

    let temp = staging.join("photo.jpg_abc.jpg");
    let mut stream = fs.open_sequential_write(&temp).await.unwrap();
    for part in [b"aa".as_slice(), b"bb", b"cc"] {
        stream.write_all(part).await.unwrap();
    }
    stream.shutdown().await.unwrap();

    let dest = final_dir.join("photo.jpg");
    std::fs::write(&dest, "stale").unwrap();
    fs.move_file(&temp, &dest).await.unwrap();

    assert!(!fs.exists(&temp).await.unwrap());
    assert_eq!(std::fs::read(&dest).unwrap(), b"aabbcc");

    let copy = final_dir.join("copy.jpg");
    assert_eq!(fs.copy_file(&dest, &copy).await.unwrap(), 6);
    fs.remove_file(&dest).await.unwrap();
    assert!(fs.exists(&copy).await.unwrap());
}

#[tokio::test]
async fn test_size_of_missing_file_is_read_error() {
    let dir = tempdir().unwrap();
    let fs = LocalFilesystem::new();
    let err = fs.size(&dir.path().join("ghost")).await.unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
    assert!(err.is_not_found());
}
