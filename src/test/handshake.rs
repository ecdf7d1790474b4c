use crate::chan::{ConnEvent, Endpoint, LinkParams, LinkWorld};
use crate::conn::{Config, Connection, State, TransportError};
use crate::exec::{Moment, Promise, PromiseState, Scheduler, World};

fn make_world(client: Config, server: Config, params: LinkParams) -> (Scheduler, LinkWorld) {
    let a = Connection::new(LinkWorld::A, client);
    let b = Connection::new(LinkWorld::B, server);
    (
        Scheduler::default(),
        LinkWorld::new(Endpoint::new(a), Endpoint::new(b), params),
    )
}

fn open_both(sched: &mut Scheduler, world: &mut LinkWorld) -> (Promise, Promise) {
    let ep = &mut world.b;
    let pb = ep.conn.open(sched, &mut ep.chan);
    let ep = &mut world.a;
    let pa = ep.conn.open(sched, &mut ep.chan);
    world.on_tick(sched);
    (pa, pb)
}

fn client_cfg() -> Config {
    Config {
        active_open: true,
        iss: Some(100),
        ..Config::default()
    }
}

fn server_cfg() -> Config {
    Config {
        active_open: false,
        iss: Some(500),
        ..Config::default()
    }
}

#[test]
fn three_way_handshake_reaches_established() {
    let (mut sched, mut world) = make_world(client_cfg(), server_cfg(), LinkParams::default());
    let (pa, pb) = open_both(&mut sched, &mut world);
    sched.run_until(Moment::from_millis(100), &mut world);

    assert_eq!(world.a.conn.state(), State::Established);
    assert_eq!(world.b.conn.state(), State::Established);
    assert!(pa.is_fulfilled());
    assert!(pb.is_fulfilled());

    let snap = world.a.conn.status().expect("client tcb");
    assert_eq!(snap.snd_nxt, 101);
    assert_eq!(snap.rcv_nxt, 501);
    let snap = world.b.conn.status().expect("server tcb");
    assert_eq!(snap.snd_nxt, 501);
    assert_eq!(snap.rcv_nxt, 101);

    let events = world.a.chan.take_events();
    assert!(events.contains(&ConnEvent::Established {
        snd_nxt: 101,
        rcv_nxt: 501
    }));
    let events = world.b.chan.take_events();
    assert!(events.contains(&ConnEvent::Established {
        snd_nxt: 501,
        rcv_nxt: 101
    }));
}

#[test]
fn both_sides_converge_on_minimum_mss() {
    let client = Config {
        base_mss: 1000,
        ..client_cfg()
    };
    let server = Config {
        base_mss: 400,
        ..server_cfg()
    };
    let (mut sched, mut world) = make_world(client, server, LinkParams::default());
    open_both(&mut sched, &mut world);
    sched.run_until(Moment::from_millis(100), &mut world);

    assert_eq!(world.a.conn.status().expect("client tcb").send_mss, 400);
    assert_eq!(world.b.conn.status().expect("server tcb").send_mss, 400);
}

#[test]
fn simultaneous_open_converges_to_established() {
    // 两端都主动打开：SYN 在链路上交错，双方经 SYN_RECEIVED
    // 与挑战 ACK 的应答收敛到 ESTABLISHED
    let peer = Config {
        active_open: true,
        iss: Some(500),
        ..Config::default()
    };
    let (mut sched, mut world) = make_world(client_cfg(), peer, LinkParams::default());
    let (pa, pb) = open_both(&mut sched, &mut world);
    sched.run_until(Moment::from_millis(100), &mut world);

    assert_eq!(world.a.conn.state(), State::Established);
    assert_eq!(world.b.conn.state(), State::Established);
    assert!(pa.is_fulfilled());
    assert!(pb.is_fulfilled());

    let snap = world.a.conn.status().expect("a tcb");
    assert_eq!(snap.snd_nxt, 101);
    assert_eq!(snap.rcv_nxt, 501);
    let snap = world.b.conn.status().expect("b tcb");
    assert_eq!(snap.snd_nxt, 501);
    assert_eq!(snap.rcv_nxt, 101);

    // 双方的 SYN 都已被确认：之后不该出现任何重传
    sched.run_until(Moment::from_millis(5_000), &mut world);
    assert_eq!(world.a.conn.retransmission_count, 0);
    assert_eq!(world.b.conn.retransmission_count, 0);
}

#[test]
fn syn_against_closed_peer_is_refused() {
    // 服务端从未 open：保持 CLOSED，以 RST 拒绝
    let (mut sched, mut world) = make_world(client_cfg(), server_cfg(), LinkParams::default());
    let ep = &mut world.a;
    let pa = ep.conn.open(&mut sched, &mut ep.chan);
    world.on_tick(&mut sched);
    sched.run_until(Moment::from_millis(100), &mut world);

    assert_eq!(world.a.conn.state(), State::Closed);
    assert_eq!(pa.state(), PromiseState::Failed(TransportError::Refused));
    let events = world.a.chan.take_events();
    assert!(events.contains(&ConnEvent::Closed {
        cause: Some(TransportError::Refused)
    }));
}

#[test]
fn data_queued_before_establishment_flows_afterwards() {
    let (mut sched, mut world) = make_world(client_cfg(), server_cfg(), LinkParams::default());
    open_both(&mut sched, &mut world);
    // 握手尚未完成时就提交数据
    let ep = &mut world.a;
    let send_p = ep.conn.send(&mut sched, &mut ep.chan, b"early bytes");
    assert!(send_p.is_fulfilled());
    world.on_tick(&mut sched);

    sched.run_until(Moment::from_millis(200), &mut world);
    let ep = &mut world.b;
    let got = ep.conn.read(&mut sched, &mut ep.chan, 64);
    assert_eq!(got, b"early bytes");
}
