use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scribble.log");

    assert!(scribble_overlay::logging::init(true, Some(path.clone())));
    tracing::info!("overlay ready");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("overlay ready"));

    assert!(
        !scribble_overlay::logging::init(false, None),
        "second init must not replace the subscriber"
    );
}
