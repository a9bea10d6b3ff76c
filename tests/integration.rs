use adb_host::{AdbClient, CancelToken, TrackerEvent};

#[tokio::test]
#[ignore] // Requires: adb start-server
async fn test_real_server_version() {
    let client = AdbClient::new();
    let version = client.server_version().await.unwrap();
    assert!(version > 0, "version should be positive, got {}", version);
    println!("ADB server version: {}", version);
}

#[tokio::test]
#[ignore] // Requires: adb start-server
async fn test_real_list_devices() {
    let client = AdbClient::new();
    let devices = client.devices().await.unwrap();
    println!("Found {} device(s):", devices.len());
    for d in &devices {
        println!("  {} - {}", d.serial, d.state);
    }
}

#[tokio::test]
#[ignore] // Requires: adb start-server
async fn test_real_track_devices_first_snapshot() {
    let client = AdbClient::new();
    let mut tracker = client.track_devices().await.unwrap();
    // The first snapshot reports every present device as an add, then one
    // aggregate event.
    loop {
        match tracker.next_event().await.unwrap() {
            Some(TrackerEvent::Add(d)) => println!("  present: {}", d.serial),
            Some(TrackerEvent::ChangeSet(diff)) => {
                assert!(diff.removed.is_empty());
                assert!(diff.changed.is_empty());
                break;
            }
            other => panic!("unexpected first-snapshot event: {:?}", other),
        }
    }
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_shell_echo() {
    let client = AdbClient::new();
    let output = client.shell(None, "echo hello").await.unwrap();
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("hello"), "unexpected output: {:?}", text);
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_shell_args_escaping() {
    let client = AdbClient::new();
    let tricky = "it's a $test; echo owned";
    let output = client.shell_args(None, &["echo", tricky]).await.unwrap();
    let text = String::from_utf8_lossy(&output);
    assert_eq!(text.trim_end(), tricky);
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_stat() {
    let client = AdbClient::new();
    let stat = client.stat(None, "/sdcard").await.unwrap();
    assert!(stat.exists());
    println!("Mode: {:o}, Size: {}", stat.mode, stat.size);
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_stat_missing_path() {
    let client = AdbClient::new();
    let stat = client
        .stat(None, "/definitely/not/a/real/path")
        .await
        .unwrap();
    assert!(!stat.exists());
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_list_dir() {
    let client = AdbClient::new();
    let entries = client.list_dir(None, "/sdcard").await.unwrap();
    for entry in &entries {
        assert_ne!(entry.name, ".");
        assert_ne!(entry.name, "..");
        println!("  {:o} {:>8} {}", entry.mode, entry.size, entry.name);
    }
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_push_pull_round_trip() {
    let client = AdbClient::new();
    let dir = tempfile::tempdir().unwrap();

    let local = dir.path().join("source.txt");
    tokio::fs::write(&local, b"round trip payload").await.unwrap();

    let remote = "/data/local/tmp/adb_host_round_trip.txt";
    let pushed = client.push(None, &local, remote).await.unwrap();
    assert_eq!(pushed, 18);

    let pulled_path = dir.path().join("pulled.txt");
    let pulled = client.pull(None, remote, &pulled_path).await.unwrap();
    assert_eq!(pulled, 18);

    let content = tokio::fs::read(&pulled_path).await.unwrap();
    assert_eq!(content, b"round trip payload");

    client
        .shell_args(None, &["rm", "-f", remote])
        .await
        .unwrap();
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_properties() {
    let client = AdbClient::new();
    let props = client.properties(None).await.unwrap();
    assert!(
        props.contains_key("ro.build.version.sdk"),
        "expected ro.build.version.sdk in {} properties",
        props.len()
    );
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected booted device
async fn test_real_wait_boot_complete_already_booted() {
    let client = AdbClient::new();
    let cancel = CancelToken::new();
    client.wait_boot_complete(None, &cancel).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires: adb start-server + connected device
async fn test_real_framebuffer_header() {
    let client = AdbClient::new();
    let mut fb = client.framebuffer(None).await.unwrap();
    assert!(fb.meta.width > 0);
    assert!(fb.meta.height > 0);
    // Drain and verify the advertised size is honored.
    let mut total = 0u64;
    while let Some(chunk) = fb.next_chunk().await.unwrap() {
        total += chunk.len() as u64;
    }
    assert_eq!(total, fb.meta.size as u64);
}
