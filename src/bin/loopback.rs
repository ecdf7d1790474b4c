use clap::Parser;
use overtcp_rs::chan::{Endpoint, LinkParams, LinkWorld};
use overtcp_rs::conn::{Config, Connection};
use overtcp_rs::exec::{Moment, Scheduler, World};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "loopback",
    about = "Pump a byte stream across an in-memory lossy overlay link"
)]
struct Args {
    /// Bytes to transfer from A to B
    #[arg(long, default_value_t = 100_000)]
    bytes: usize,

    /// Maximum segment size announced by both endpoints
    #[arg(long, default_value_t = 1200)]
    mss: u16,

    /// Per-frame loss probability [0, 1)
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Per-frame duplication probability [0, 1)
    #[arg(long, default_value_t = 0.0)]
    duplicate: f64,

    /// One-way link latency in milliseconds
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,

    /// Seed for the deterministic link RNG
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Disable sender-side small-segment aggregation
    #[arg(long)]
    no_delay: bool,

    /// Disable frame checksums
    #[arg(long)]
    no_checksum: bool,

    /// Abort the connection after this long without progress (0 = never)
    #[arg(long, default_value_t = 60_000)]
    user_timeout_ms: u64,

    /// Write the sender's diagnostic event log to this JSON file
    #[arg(long)]
    trace_json: Option<PathBuf>,

    /// Give up after this much simulated time (ms)
    #[arg(long, default_value_t = 600_000)]
    until_ms: u64,
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let client = Config {
        active_open: true,
        base_mss: args.mss,
        no_delay: args.no_delay,
        checksum: !args.no_checksum,
        user_timeout_ms: args.user_timeout_ms,
        ..Config::default()
    };
    let server = Config {
        active_open: false,
        base_mss: args.mss,
        checksum: !args.no_checksum,
        user_timeout_ms: args.user_timeout_ms,
        ..Config::default()
    };

    let mut a = Connection::new(LinkWorld::A, client);
    if args.trace_json.is_some() {
        a.enable_trace();
    }
    let b = Connection::new(LinkWorld::B, server);
    let params = LinkParams {
        latency_ms: args.latency_ms,
        loss: args.loss,
        duplicate: args.duplicate,
        seed: args.seed,
    };
    let mut world = LinkWorld::new(Endpoint::new(a), Endpoint::new(b), params);
    let mut sched = Scheduler::default();

    let ep = &mut world.b;
    ep.conn.open(&mut sched, &mut ep.chan);
    let ep = &mut world.a;
    ep.conn.open(&mut sched, &mut ep.chan);
    world.on_tick(&mut sched);

    let payload = pattern(args.bytes);
    let ep = &mut world.a;
    ep.conn.send(&mut sched, &mut ep.chan, &payload);
    world.on_tick(&mut sched);

    // 以 500ms 为步长推进，在 B 端持续读出
    let mut received = Vec::with_capacity(payload.len());
    let mut done_at = None;
    let mut t = 0u64;
    while t < args.until_ms {
        t = (t + 500).min(args.until_ms);
        sched.run_until(Moment::from_millis(t), &mut world);
        let ep = &mut world.b;
        let chunk = ep.conn.read(&mut sched, &mut ep.chan, usize::MAX);
        received.extend_from_slice(&chunk);
        world.on_tick(&mut sched);
        if received.len() >= payload.len() && done_at.is_none() {
            done_at = Some(sched.now());
            break;
        }
    }

    // 有序关闭并把关闭过程也跑完
    let ep = &mut world.a;
    ep.conn.close(&mut sched, &mut ep.chan);
    let ep = &mut world.b;
    ep.conn.close(&mut sched, &mut ep.chan);
    world.on_tick(&mut sched);
    sched.run_until(Moment::from_millis(args.until_ms), &mut world);

    let stats = world.stats().clone();
    let elapsed = done_at.map(|m| m.0).unwrap_or(args.until_ms);
    println!("transferred {} of {} bytes in {} ms", received.len(), payload.len(), elapsed);
    println!("retransmissions {}", world.a.conn.retransmission_count);
    println!(
        "link forwarded {} dropped {} duplicated {}",
        stats.forwarded, stats.dropped, stats.duplicated
    );
    println!(
        "final states a={} b={}",
        world.a.conn.state(),
        world.b.conn.state()
    );

    if let Some(path) = &args.trace_json {
        if let Some(log) = world.a.conn.take_trace() {
            let json = log.to_json().expect("serialize trace events");
            fs::write(path, json).expect("write trace json");
            eprintln!("wrote trace events to {}", path.display());
        }
    }

    let ok = received == payload;
    println!("verify {}", if ok { "ok" } else { "FAILED" });
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
