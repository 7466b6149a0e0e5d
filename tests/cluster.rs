use std::path::{Path, PathBuf};
use bfs::{Client, Config, Error, MissingBlock, MissingBlockPolicy};

const B: u64 = 16;

fn config(dir: &Path, n_nodes: usize) -> Config {
    Config {
        block_size: B,
        nodes: (1..=n_nodes).map(|i| i.to_string()).collect(),
        ..Config::in_dir(dir)
    }
}

fn write_source(dir: &Path, name: &str, len: usize) -> (PathBuf, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
    let path = dir.join("src").join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, &data).unwrap();
    (path, data)
}

fn block_path(cfg: &Config, node: &str, file: &str, block: u64) -> PathBuf {
    cfg.node_dir(node).join(file).join(format!("block_{block}"))
}

fn assigned_nodes(client: &Client, file: &str) -> Vec<String> {
    client
        .master()
        .lock()
        .unwrap()
        .get_blocks(file)
        .into_iter()
        .map(|a| a.node_id)
        .collect()
}

#[test]
fn test_round_trip_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 4);
    let client = bfs::start(&cfg).unwrap();

    let b = B as usize;
    for (i, size) in [0, 1, b - 1, b, b + 1, 5 * b].into_iter().enumerate() {
        let name = format!("file-{i}.bin");
        let (src, data) = write_source(dir.path(), &name, size);
        let out = dir.path().join(format!("out-{i}.bin"));

        let added = client.add_file(&src).unwrap();
        assert_eq!(added.size, size as u64);
        assert_eq!(added.assignments.len() as u64, (size as u64).div_ceil(B));

        let report = client.read_file(&name, &out).unwrap();
        assert!(report.is_complete(), "size {size}");
        assert_eq!(std::fs::read(&out).unwrap(), data, "size {size}");
    }
}

#[test]
fn test_zero_byte_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2);
    let client = bfs::start(&cfg).unwrap();
    let (src, _) = write_source(dir.path(), "empty", 0);
    let out = dir.path().join("empty.out");

    let added = client.add_file(&src).unwrap();
    assert!(added.assignments.is_empty());
    assert_eq!(client.list_files(), vec!["empty"]);
    assert_eq!(client.master().lock().unwrap().cursor(), 0);

    let report = client.read_file("empty", &out).unwrap();
    assert_eq!(report.blocks_written, 0);
    assert!(out.exists());
    assert_eq!(std::fs::metadata(&out).unwrap().len(), 0);
}

#[test]
fn test_add_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 3);
    let client = bfs::start(&cfg).unwrap();
    let (src, _) = write_source(dir.path(), "a.bin", 40);

    let first = client.add_file(&src).unwrap();
    let stored: Vec<Vec<u8>> = first
        .assignments
        .iter()
        .map(|a| std::fs::read(block_path(&cfg, &a.node_id, "a.bin", a.block_num)).unwrap())
        .collect();
    let cursor = client.master().lock().unwrap().cursor();

    let second = client.add_file(&src).unwrap();

    assert_eq!(first.assignments, second.assignments);
    assert_eq!(client.master().lock().unwrap().cursor(), cursor);
    for (a, data) in second.assignments.iter().zip(&stored) {
        assert_eq!(&std::fs::read(block_path(&cfg, &a.node_id, "a.bin", a.block_num)).unwrap(), data);
    }
    assert_eq!(client.du(), 40);
}

#[test]
fn test_add_with_changed_block_count() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 3);
    let client = bfs::start(&cfg).unwrap();
    let (src, _) = write_source(dir.path(), "a.bin", 20);
    let original = client.add_file(&src).unwrap();

    write_source(dir.path(), "a.bin", 50);
    let err = client.add_file(&src).unwrap_err();

    assert!(matches!(err, Error::ConsistencyMismatch { recorded: 2, requested: 4, .. }));
    assert_eq!(client.master().lock().unwrap().get_blocks("a.bin"), original.assignments);
}

#[test]
fn test_round_robin_placement() {
    let n = 4;
    for c in 0..n {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), n);
        let client = bfs::start(&cfg).unwrap();

        // Move the cursor to `c` with a file of `c` blocks.
        let (warmup, _) = write_source(dir.path(), "warmup", c * B as usize);
        client.add_file(&warmup).unwrap();
        assert_eq!(client.master().lock().unwrap().cursor(), c);

        for k in 1..=n {
            let dir = tempfile::tempdir().unwrap();
            let cfg = Config {
                metadata_path: dir.path().join("metadata.json"),
                storage_dir: dir.path().join("nodes"),
                ..cfg.clone()
            };
            std::fs::copy(client.master().lock().unwrap().metadata_path(), &cfg.metadata_path).unwrap();

            // A fresh cluster picks up the persisted cursor.
            let client = bfs::start(&cfg).unwrap();
            let (src, _) = write_source(dir.path(), "f", k * B as usize);
            client.add_file(&src).unwrap();

            let expected: Vec<String> = (0..k).map(|i| ((c + i) % n + 1).to_string()).collect();
            assert_eq!(assigned_nodes(&client, "f"), expected, "c={c} k={k}");
        }
    }
}

#[test]
fn test_missing_block_best_effort() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 3);
    let client = bfs::start(&cfg).unwrap();
    let (src, data) = write_source(dir.path(), "a.bin", 3 * B as usize + 5);
    let out = dir.path().join("a.out");
    client.add_file(&src).unwrap();

    // Block 1 lives on node 2.
    std::fs::remove_file(block_path(&cfg, "2", "a.bin", 1)).unwrap();

    let report = client.read_file("a.bin", &out).unwrap();
    assert_eq!(report.missing, vec![MissingBlock { block_num: 1, node_id: "2".to_string() }]);
    assert_eq!(report.blocks_written, 3);

    let b = B as usize;
    let expected: Vec<u8> = [&data[..b], &data[2 * b..]].concat();
    assert_eq!(std::fs::read(&out).unwrap(), expected);
}

#[test]
fn test_missing_block_abort() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        missing_blocks: MissingBlockPolicy::Abort,
        ..config(dir.path(), 3)
    };
    let client = bfs::start(&cfg).unwrap();
    let (src, _) = write_source(dir.path(), "a.bin", 3 * B as usize);
    let out = dir.path().join("a.out");
    client.add_file(&src).unwrap();

    std::fs::remove_file(block_path(&cfg, "3", "a.bin", 2)).unwrap();

    let err = client.read_file("a.bin", &out).unwrap_err();
    assert!(matches!(err, Error::BlockNotFound { block: 2, ref node, .. } if node == "3"));
    assert!(!out.exists());
}

#[test]
fn test_unknown_file_read() {
    let dir = tempfile::tempdir().unwrap();
    let client = bfs::start(&config(dir.path(), 2)).unwrap();
    let out = dir.path().join("nope.out");

    let err = client.read_file("nope", &out).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(ref name) if name == "nope"));
    assert!(!out.exists());
}

#[test]
fn test_restart_keeps_files() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2);
    let (src, data) = write_source(dir.path(), "a.bin", 50);
    bfs::start(&cfg).unwrap().add_file(&src).unwrap();

    let client = bfs::start(&cfg).unwrap();
    let out = dir.path().join("a.out");

    assert_eq!(client.list_files(), vec!["a.bin"]);
    assert_eq!(client.du(), 50);
    client.read_file("a.bin", &out).unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), data);
}

#[test]
fn test_corrupt_block_fails_read() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2);
    let client = bfs::start(&cfg).unwrap();
    let (src, _) = write_source(dir.path(), "a.bin", 20);
    let out = dir.path().join("a.out");
    client.add_file(&src).unwrap();

    std::fs::write(block_path(&cfg, "1", "a.bin", 0), b"garbage").unwrap();

    let err = client.read_file("a.bin", &out).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { block: 0, .. }));
    assert!(!out.exists());
}

#[test]
fn test_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let client = bfs::start(&config(dir.path(), 2)).unwrap();

    let err = client.add_file(dir.path().join("missing.bin")).unwrap_err();
    assert!(matches!(err, Error::SourceNotFound(_)));
    assert!(!dir.path().join("metadata.json").exists());
}

#[test]
fn test_invalid_name_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2);
    let client = bfs::start(&cfg).unwrap();
    let (src, _) = write_source(dir.path(), "a\\b.bin", 20);

    let err = client.add_file(&src).unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)));
    assert!(client.list_files().is_empty());
    assert!(!cfg.metadata_path.exists());

    let out = dir.path().join("a.out");
    assert!(matches!(client.read_file("a\\b.bin", &out), Err(Error::FileNotFound(_))));
}
