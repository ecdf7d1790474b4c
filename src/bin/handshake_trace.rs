use clap::Parser;
use overtcp_rs::chan::{Endpoint, LinkParams, LinkWorld};
use overtcp_rs::conn::{Config, Connection};
use overtcp_rs::exec::{Moment, Scheduler, World};

/// 固定初始序列号跑一次完整的握手 + 挥手，把主动端的诊断事件
/// 流以 JSON 打到标准输出。适合肉眼核对序列号与状态迁移。
#[derive(Debug, Parser)]
#[command(
    name = "handshake-trace",
    about = "Dump the client-side event log of one connection lifecycle as JSON"
)]
struct Args {
    /// One-way link latency in milliseconds
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,

    /// 2·MSL wait is twice this value (ms)
    #[arg(long, default_value_t = 1000)]
    msl_ms: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    let client = Config {
        active_open: true,
        iss: Some(100),
        max_segment_lifetime_ms: args.msl_ms,
        ..Config::default()
    };
    let server = Config {
        active_open: false,
        iss: Some(500),
        max_segment_lifetime_ms: args.msl_ms,
        ..Config::default()
    };

    let mut a = Connection::new(LinkWorld::A, client);
    a.enable_trace();
    let b = Connection::new(LinkWorld::B, server);
    let params = LinkParams {
        latency_ms: args.latency_ms,
        ..LinkParams::default()
    };
    let mut world = LinkWorld::new(Endpoint::new(a), Endpoint::new(b), params);
    let mut sched = Scheduler::default();

    let ep = &mut world.b;
    ep.conn.open(&mut sched, &mut ep.chan);
    let ep = &mut world.a;
    ep.conn.open(&mut sched, &mut ep.chan);
    world.on_tick(&mut sched);
    sched.run_until(Moment::from_millis(1_000), &mut world);

    let ep = &mut world.a;
    ep.conn.emit_status(&sched, &mut ep.chan);
    let ep = &mut world.a;
    ep.conn.close(&mut sched, &mut ep.chan);
    world.on_tick(&mut sched);
    sched.run_until(Moment::from_millis(2_000), &mut world);
    let ep = &mut world.b;
    ep.conn.close(&mut sched, &mut ep.chan);
    world.on_tick(&mut sched);
    sched.run(&mut world);

    let log = world.a.conn.take_trace().expect("trace enabled");
    println!("{}", log.to_json().expect("serialize trace events"));
}
