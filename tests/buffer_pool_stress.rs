//! Buffer pool stress test with concurrent random range access.
//!
//! Workers read, write and flush random byte ranges that may span pages,
//! through a pool much smaller than the data set, so hits, evictions and
//! write-backs interleave. Writes are additive (each byte gets a value added,
//! wrapping), which makes the final content independent of the order the
//! writes landed in and checkable against a log.

use std::ops::Range;
use std::sync::Arc;

use pagepool::storage::{BufferPool, BufferPoolConfig, FileStorage, PAGE_SIZE, PageId, Storage};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// Test context containing shared resources.
struct TestContext {
    pool: BufferPool<FileStorage>,
    write_log: Mutex<Vec<WriteRecord>>,
    config: TestConfig,
    _temp_dir: TempDir,
}

#[derive(Debug, Clone)]
struct TestConfig {
    pool_size: usize,
    total_pages: usize,
    num_workers: usize,
    ops_per_worker: usize,
    /// Maximum bytes per access range (controls page-spanning).
    max_range_size: usize,
}

impl TestConfig {
    fn short() -> Self {
        Self {
            pool_size: 16,
            total_pages: 48,
            num_workers: 8,
            ops_per_worker: 60,
            max_range_size: PAGE_SIZE * 2,
        }
    }

    fn long() -> Self {
        Self {
            pool_size: 50,
            total_pages: 200,
            num_workers: 32,
            ops_per_worker: 200,
            max_range_size: PAGE_SIZE * 3,
        }
    }
}

/// A logged write: `add_value` was added to every byte in the range.
#[derive(Debug, Clone, Copy)]
struct WriteRecord {
    /// Starting byte offset in the global address space.
    start_offset: usize,
    length: usize,
    add_value: u8,
}

/// Splits a global byte range into per-page offset ranges.
fn page_ranges(start_offset: usize, length: usize) -> Vec<(PageId, Range<usize>)> {
    if length == 0 {
        return vec![];
    }

    let range_end = start_offset + length;
    let first_page = start_offset / PAGE_SIZE;
    let last_page = (range_end - 1) / PAGE_SIZE;

    (first_page..=last_page)
        .map(|page_num| {
            let page_start = page_num * PAGE_SIZE;
            let overlap_start = start_offset.max(page_start);
            let overlap_end = range_end.min(page_start + PAGE_SIZE);
            (
                PageId::new(page_num as u64),
                (overlap_start - page_start)..(overlap_end - page_start),
            )
        })
        .collect()
}

async fn worker_task(ctx: Arc<TestContext>, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let address_space = ctx.config.total_pages * PAGE_SIZE;

    for _ in 0..ctx.config.ops_per_worker {
        let length = rng.gen_range(1..=ctx.config.max_range_size.min(address_space));
        let start_offset = rng.gen_range(0..=(address_space - length));

        match rng.gen_range(0..10) {
            0..=1 => {
                let record = WriteRecord {
                    start_offset,
                    length,
                    add_value: rng.r#gen(),
                };
                perform_write(&ctx, record).await;
            }
            2 => {
                let page_id = PageId::new((start_offset / PAGE_SIZE) as u64);
                ctx.pool.flush_page(page_id).await.unwrap();
            }
            _ => perform_read(&ctx, start_offset, length).await,
        }

        tokio::task::yield_now().await;
    }
}

async fn perform_write(ctx: &TestContext, record: WriteRecord) {
    ctx.write_log.lock().push(record);

    for (page_id, range) in page_ranges(record.start_offset, record.length) {
        let handle = ctx.pool.fetch_page(page_id).await.unwrap();
        {
            let mut page = ctx.pool.write_page(&handle).await.unwrap();
            for byte in &mut page[range] {
                *byte = byte.wrapping_add(record.add_value);
            }
        }
        assert!(ctx.pool.unpin_page(page_id, true).await);
    }
}

async fn perform_read(ctx: &TestContext, start_offset: usize, length: usize) {
    for (page_id, range) in page_ranges(start_offset, length) {
        let handle = ctx.pool.fetch_page(page_id).await.unwrap();
        {
            let page = ctx.pool.read_page(&handle).await.unwrap();
            let _sum: u32 = page[range].iter().map(|&b| b as u32).sum();
        }
        assert!(ctx.pool.unpin_page(page_id, false).await);
    }
}

/// Flushes everything and compares storage byte-for-byte with the write log.
async fn verify_final_state(ctx: &TestContext) {
    ctx.pool.flush_all().await.expect("flush_all failed");

    let mut expected = vec![0u8; ctx.config.total_pages * PAGE_SIZE];
    {
        let log = ctx.write_log.lock();
        println!("Verifying {} write records...", log.len());
        for record in log.iter() {
            for byte in &mut expected[record.start_offset..record.start_offset + record.length] {
                *byte = byte.wrapping_add(record.add_value);
            }
        }
    }

    let mut mismatches = 0;
    let mut buf = vec![0u8; PAGE_SIZE];
    for page_num in 0..ctx.config.total_pages {
        let page_id = PageId::new(page_num as u64);
        ctx.pool.storage().read_page(page_id, &mut buf).await.unwrap();

        let page_start = page_num * PAGE_SIZE;
        for (offset, (&actual, &wanted)) in buf
            .iter()
            .zip(&expected[page_start..page_start + PAGE_SIZE])
            .enumerate()
        {
            if actual != wanted {
                if mismatches < 10 {
                    eprintln!(
                        "Mismatch at page {} offset {}: expected {}, got {}",
                        page_num, offset, wanted, actual
                    );
                }
                mismatches += 1;
            }
        }
    }

    assert_eq!(
        mismatches, 0,
        "Found {} mismatches in final verification",
        mismatches
    );
}

async fn run_stress(config: TestConfig) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage = FileStorage::open(temp_dir.path().join("test.db"))
        .await
        .expect("Failed to open FileStorage");
    for _ in 0..config.total_pages {
        storage.allocate_page().await.unwrap();
    }

    let pool = BufferPool::new(storage, BufferPoolConfig::new(config.pool_size));
    let ctx = Arc::new(TestContext {
        pool,
        write_log: Mutex::new(Vec::new()),
        config,
        _temp_dir: temp_dir,
    });

    let mut handles = Vec::new();
    for index in 0..ctx.config.num_workers {
        let ctx = Arc::clone(&ctx);
        let seed = index as u64 * 12345;
        handles.push(tokio::spawn(worker_task(ctx, seed)));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .unwrap_or_else(|e| panic!("Worker {} task panicked: {:?}", i, e));
    }

    // Every pin was released.
    for page_num in 0..ctx.config.total_pages {
        let pins = ctx.pool.pin_count(PageId::new(page_num as u64)).await;
        assert!(matches!(pins, None | Some(0)), "page {page_num} left pinned");
    }
    assert_eq!(
        ctx.pool.replacer_size().await,
        ctx.pool.page_table_size().await
    );

    verify_final_state(&ctx).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_buffer_pool_stress_short() {
    run_stress(TestConfig::short()).await;
}

// To run: cargo test --test buffer_pool_stress -- --ignored --nocapture
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_buffer_pool_stress_concurrent_range_access() {
    let config = TestConfig::long();
    println!("Starting buffer pool stress test with config: {:?}", config);
    run_stress(config).await;
    println!("Stress test passed!");
}
