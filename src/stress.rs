//! Synthetic data-server load against the configured backing root.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Args;
use tracing::{debug, info, trace};

use dsgate::backing::local::LocalBackingFs;
use dsgate::backing::{BackingError, BackingFs as _, OpenFlags};
use dsgate::cache::fileinfo::CacheStats;
use dsgate::config::Config;
use dsgate::ds::{DataServerWire, DsError, Stability};
use dsgate::export::Export;

const BLOCK_SIZE: u32 = 4096;
const BLOCKS_PER_FILE: u64 = 16;

#[derive(Debug, Args)]
pub struct StressArgs {
    /// Number of worker threads.
    #[arg(long, default_value_t = 8)]
    workers: usize,

    /// Operations per worker.
    #[arg(long, default_value_t = 10_000)]
    ops: usize,

    /// Number of distinct inodes to spread the load over.
    #[arg(long, default_value_t = 2_000)]
    inodes: u32,
}

/// Outcome of a stress run.
pub struct Report {
    pub ops: u64,
    pub failed: u64,
    pub stats: CacheStats,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "operations:  {} ({} failed)", self.ops, self.failed)?;
        writeln!(f, "entries:     {} / capacity {}", s.entries, s.capacity)?;
        writeln!(f, "hits:        {}", s.hits)?;
        writeln!(f, "misses:      {}", s.misses)?;
        writeln!(f, "evictions:   {}", s.evictions)?;
        write!(f, "erased:      {}", s.erased)
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Read,
    Write(Stability),
    Commit,
}

impl Op {
    fn random(rng: &mut fastrand::Rng) -> Self {
        match rng.u8(0..8) {
            0..=3 => Self::Read,
            4 => Self::Write(Stability::Unstable),
            5 => Self::Write(Stability::DataSync),
            6 => Self::Write(Stability::FileSync),
            _ => Self::Commit,
        }
    }
}

/// Create one backing file per inode so data-server opens find them.
fn populate(fs: &LocalBackingFs, inodes: u32) -> Result<(), BackingError> {
    for inode in 1..=u64::from(inodes) {
        let handle = fs.open(inode, OpenFlags::RDWR | OpenFlags::CREATE)?;
        fs.close(handle)?;
    }
    debug!(inodes, root = ?fs.root(), "backing files ready");
    Ok(())
}

fn run_op(
    export: &Export<LocalBackingFs>,
    rng: &mut fastrand::Rng,
    inodes: u32,
    payload: &[u8],
) -> Result<(), DsError> {
    let big_endian = rng.bool();
    let wire = DataServerWire::new(rng.u32(1..=inodes))?.encode(big_endian);
    let mut handle = export.make_ds_handle(&wire, big_endian)?;
    let offset = rng.u64(0..BLOCKS_PER_FILE) * u64::from(BLOCK_SIZE);

    let op = Op::random(rng);
    trace!(inode = handle.inode(), ?op, offset, "stress op");
    match op {
        Op::Read => {
            handle.read(offset, BLOCK_SIZE)?;
        }
        Op::Write(stability) => {
            handle.write(offset, payload, stability)?;
        }
        Op::Commit => handle.commit(offset, BLOCK_SIZE)?,
    }
    Ok(())
}

/// Run the workload described by `args` and shut the export down afterwards.
pub fn run(config: &Config, args: &StressArgs) -> Result<Report, BackingError> {
    let fs = LocalBackingFs::new(&config.backing.root)?;
    let inodes = args.inodes.max(1);
    populate(&fs, inodes)?;

    let export = Export::new(1, fs, &config.fileinfo_cache);
    let failed = AtomicU64::new(0);
    info!(
        workers = args.workers,
        ops = args.ops,
        inodes,
        "starting stress run"
    );

    std::thread::scope(|scope| {
        for worker in 0..args.workers {
            let export = &export;
            let failed = &failed;
            scope.spawn(move || {
                let mut rng = fastrand::Rng::with_seed(worker as u64);
                let payload = vec![u8::try_from(worker % 256).unwrap_or(0); BLOCK_SIZE as usize];
                for _ in 0..args.ops {
                    if let Err(e) = run_op(export, &mut rng, inodes, &payload) {
                        debug!(worker, error = %e, "stress op failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let stats = export.stats();
    export.shutdown();
    Ok(Report {
        ops: (args.workers * args.ops) as u64,
        failed: failed.into_inner(),
        stats,
    })
}
