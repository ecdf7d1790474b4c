use crate::chan::{ConnEvent, Endpoint, LinkParams, LinkWorld};
use crate::conn::{Config, Connection, State, TransportError};
use crate::exec::{Moment, Scheduler, World};

fn cfg(active: bool, iss: u32) -> Config {
    Config {
        active_open: active,
        iss: Some(iss),
        max_segment_lifetime_ms: 100,
        ..Config::default()
    }
}

fn establish() -> (Scheduler, LinkWorld) {
    let a = Connection::new(LinkWorld::A, cfg(true, 100));
    let b = Connection::new(LinkWorld::B, cfg(false, 500));
    let mut world = LinkWorld::new(Endpoint::new(a), Endpoint::new(b), LinkParams::default());
    let mut sched = Scheduler::default();
    let ep = &mut world.b;
    ep.conn.open(&mut sched, &mut ep.chan);
    let ep = &mut world.a;
    ep.conn.open(&mut sched, &mut ep.chan);
    world.on_tick(&mut sched);
    sched.run_until(Moment::from_millis(100), &mut world);
    assert_eq!(world.a.conn.state(), State::Established);
    assert_eq!(world.b.conn.state(), State::Established);
    world.a.chan.take_events();
    world.b.chan.take_events();
    (sched, world)
}

#[test]
fn orderly_close_walks_fin_states_and_frees_after_msl() {
    let (mut sched, mut world) = establish();

    // 本端发起关闭
    let ep = &mut world.a;
    let close_a = ep.conn.close(&mut sched, &mut ep.chan);
    assert_eq!(world.a.conn.state(), State::FinWait1);
    assert!(world.a.chan.take_events().contains(&ConnEvent::Closing {
        initiated_by_remote: false
    }));
    world.on_tick(&mut sched);

    sched.run_until(Moment::from_millis(150), &mut world);
    assert_eq!(world.a.conn.state(), State::FinWait2);
    assert_eq!(world.b.conn.state(), State::CloseWait);
    assert!(world.b.chan.take_events().contains(&ConnEvent::Closing {
        initiated_by_remote: true
    }));
    assert!(close_a.is_pending());

    // 对端随后关闭自己的方向
    let ep = &mut world.b;
    let close_b = ep.conn.close(&mut sched, &mut ep.chan);
    assert_eq!(world.b.conn.state(), State::LastAck);
    world.on_tick(&mut sched);

    sched.run_until(Moment::from_millis(250), &mut world);
    assert_eq!(world.b.conn.state(), State::Closed);
    assert!(close_b.is_fulfilled());
    assert!(world.b.chan.take_events().contains(&ConnEvent::Closed { cause: None }));
    // 关闭发起方还在 2·MSL 等待里
    assert_eq!(world.a.conn.state(), State::FinWait2);

    sched.run_until(Moment::from_millis(600), &mut world);
    assert_eq!(world.a.conn.state(), State::Closed);
    assert!(close_a.is_fulfilled());
    assert!(world.a.chan.take_events().contains(&ConnEvent::Closed { cause: None }));
    assert!(world.a.conn.status().is_none());
}

#[test]
fn simultaneous_fin_passes_through_closing_state() {
    let (mut sched, mut world) = establish();

    // 两端在任何分段交换之前同时关闭
    let ep = &mut world.a;
    let close_a = ep.conn.close(&mut sched, &mut ep.chan);
    let ep = &mut world.b;
    let close_b = ep.conn.close(&mut sched, &mut ep.chan);
    assert_eq!(world.a.conn.state(), State::FinWait1);
    assert_eq!(world.b.conn.state(), State::FinWait1);
    world.on_tick(&mut sched);

    sched.run_until(Moment::from_millis(1000), &mut world);
    assert_eq!(world.a.conn.state(), State::Closed);
    assert_eq!(world.b.conn.state(), State::Closed);
    assert!(close_a.is_fulfilled());
    assert!(close_b.is_fulfilled());
}

#[test]
fn remote_reset_terminates_with_reset_cause() {
    let (mut sched, mut world) = establish();

    let ep = &mut world.b;
    let abort_p = ep.conn.abort(&mut sched, &mut ep.chan);
    assert!(abort_p.is_fulfilled());
    assert_eq!(world.b.conn.state(), State::Closed);
    assert!(world.b.chan.take_events().contains(&ConnEvent::Closed {
        cause: Some(TransportError::Aborted)
    }));
    world.on_tick(&mut sched);

    sched.run_until(Moment::from_millis(200), &mut world);
    assert_eq!(world.a.conn.state(), State::Closed);
    assert!(world.a.chan.take_events().contains(&ConnEvent::Closed {
        cause: Some(TransportError::Reset)
    }));
    assert!(world.a.conn.status().is_none());
}
