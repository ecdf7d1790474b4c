//! 连接状态机
//!
//! 顶层驱动：用户调用（open/send/close/abort/read/status）与
//! 入站分段都汇聚到这里，按当前状态分派，读写 TCB，产出出站
//! 分段与边界事件。一条连接的所有处理都在其调度器上串行执行。
//!
//! 出站分段先进出站队列（捎带合并发生在入队时），每个入口
//! 方法结束时统一冲刷到通道。

use super::config::Config;
use super::error::TransportError;
use super::outgoing::OutgoingSegmentQueue;
use super::retransmission::{RetransmissionTimeout, TimerHandle};
use super::state::State;
use super::tcb::{Tcb, TcbSnapshot};
use crate::chan::{Channel, ConnEvent, ConnId};
use crate::exec::{Event, Moment, Promise, Scheduler, World};
use crate::seg::{Segment, SegmentOption, serial};
use crate::trace::TraceLog;
use tracing::{debug, warn};

pub struct Connection {
    id: ConnId,
    cfg: Config,
    state: State,
    tcb: Option<Tcb>,
    out: OutgoingSegmentQueue,
    rtx_timer: Option<TimerHandle>,
    user_timer: Option<TimerHandle>,
    persist_timer: Option<TimerHandle>,
    open_promise: Option<Promise>,
    close_promise: Option<Promise>,
    /// 本端 FIN 占用的序列号（已发出时）。
    fin_sent: Option<u32>,
    /// close 已受理但发送缓冲未清空，FIN 延后。
    close_pending: bool,
    msl_scheduled: bool,
    trace: Option<TraceLog>,
    pub retransmission_count: u64,
}

impl Connection {
    pub fn new(id: ConnId, cfg: Config) -> Connection {
        Connection {
            id,
            cfg,
            state: State::Closed,
            tcb: None,
            out: OutgoingSegmentQueue::new(),
            rtx_timer: None,
            user_timer: None,
            persist_timer: None,
            open_promise: None,
            close_promise: None,
            fin_sent: None,
            close_pending: false,
            msl_scheduled: false,
            trace: None,
            retransmission_count: 0,
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// 打开诊断日志（首条为配置快照）。
    pub fn enable_trace(&mut self) {
        let mut log = TraceLog::new();
        log.meta(Moment::ZERO, self.cfg.clone());
        self.trace = Some(log);
    }

    pub fn take_trace(&mut self) -> Option<TraceLog> {
        self.trace.take()
    }

    /// 诊断快照。连接未分配 TCB 时为 `None`。
    pub fn status(&self) -> Option<TcbSnapshot> {
        self.tcb.as_ref().map(Tcb::snapshot)
    }

    /// 上抛一次状态快照事件并记入日志。
    pub fn emit_status(&mut self, sched: &Scheduler, chan: &mut dyn Channel) {
        if let Some(snap) = self.status() {
            if let Some(t) = &mut self.trace {
                t.tcb(sched.now(), snap.clone());
            }
            chan.notify(ConnEvent::Status(snap));
        }
    }

    // ------------------------------------------------------------------
    // 用户调用
    // ------------------------------------------------------------------

    /// 打开连接：主动端分配 TCB、发出 SYN；被动端进入 LISTEN。
    /// 返回的信号在连接进入 ESTABLISHED 时兑现。
    pub fn open(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel) -> Promise {
        if self.state != State::Closed || self.tcb.is_some() {
            return self
                .open_promise
                .clone()
                .unwrap_or_else(|| Promise::failed(TransportError::Closing));
        }
        let iss = self.choose_iss();
        let mut tcb = Tcb::new(&self.cfg, iss);
        let p = Promise::new();
        self.open_promise = Some(p.clone());

        if self.cfg.active_open {
            let mut syn = Segment::syn(iss);
            syn.set_option(SegmentOption::MaximumSegmentSize(self.cfg.base_mss));
            tcb.snd_nxt = serial::add(iss, 1);
            self.tcb = Some(tcb);
            self.set_state(sched.now(), State::SynSent);
            self.push_reliable(sched, syn);
        } else {
            self.tcb = Some(tcb);
            self.set_state(sched.now(), State::Listen);
        }
        self.flush(sched.now(), chan);
        p
    }

    /// 发送应用字节。字节进入发送缓冲即告完成；实际分段发出
    /// 受窗口与聚合策略约束。
    pub fn send(
        &mut self,
        sched: &mut Scheduler,
        chan: &mut dyn Channel,
        bytes: &[u8],
    ) -> Promise {
        if !self.state.can_accept_send() {
            return Promise::failed(match self.state {
                State::Closed => TransportError::Closed,
                _ => TransportError::Closing,
            });
        }
        let Some(tcb) = self.tcb.as_mut() else {
            return Promise::failed(TransportError::Closed);
        };
        tcb.send_buffer.enqueue(bytes);
        if matches!(self.state, State::Established | State::CloseWait) {
            self.segmentize(sched);
            self.flush(sched.now(), chan);
        }
        Promise::fulfilled()
    }

    /// 向应用交付至多 `max` 个已按序接收的字节。接收窗口随之
    /// 重开；从零窗口恢复时主动通告一次窗口更新。
    pub fn read(
        &mut self,
        sched: &mut Scheduler,
        chan: &mut dyn Channel,
        max: usize,
    ) -> Vec<u8> {
        let Some(tcb) = self.tcb.as_mut() else {
            return Vec::new();
        };
        let was_zero = tcb.rcv_wnd == 0;
        let bytes = tcb.receive_buffer.consume(max);
        tcb.rcv_wnd = self
            .cfg
            .receive_budget
            .saturating_sub(tcb.receive_buffer.readable_bytes() as u32);
        let reopened = was_zero && tcb.rcv_wnd > 0;
        if reopened && self.state.is_synchronized() {
            let ack = Segment::ack(tcb.snd_nxt, tcb.rcv_nxt);
            self.push_control(sched.now(), ack);
            self.flush(sched.now(), chan);
        }
        bytes
    }

    /// 有序关闭。返回的信号在两个方向的 FIN 交换完成、连接
    /// 终结时兑现。
    pub fn close(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel) -> Promise {
        match self.state {
            State::Closed => Promise::failed(TransportError::Closed),
            State::Listen | State::SynSent => {
                // 尚未同步：直接终结
                self.set_state(sched.now(), State::Closed);
                self.release(sched.now(), chan, Some(TransportError::Closing));
                Promise::fulfilled()
            }
            State::SynReceived | State::Established => {
                let p = Promise::new();
                self.close_promise = Some(p.clone());
                self.close_pending = true;
                chan.notify(ConnEvent::Closing {
                    initiated_by_remote: false,
                });
                self.set_state(sched.now(), State::FinWait1);
                self.segmentize(sched);
                self.maybe_send_fin(sched);
                self.flush(sched.now(), chan);
                p
            }
            State::CloseWait => {
                let p = Promise::new();
                self.close_promise = Some(p.clone());
                self.close_pending = true;
                self.set_state(sched.now(), State::LastAck);
                self.segmentize(sched);
                self.maybe_send_fin(sched);
                self.flush(sched.now(), chan);
                p
            }
            _ => self
                .close_promise
                .clone()
                .unwrap_or_else(|| Promise::failed(TransportError::Closing)),
        }
    }

    /// 立即中止：发出 RST，同步释放全部缓冲，未决操作以
    /// `Aborted` 失败。
    pub fn abort(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel) -> Promise {
        if self.state == State::Closed {
            return Promise::fulfilled();
        }
        if self.state.is_synchronized() {
            if let Some(tcb) = self.tcb.as_ref() {
                self.out.push(Segment::rst_ack(tcb.snd_nxt, tcb.rcv_nxt));
            }
        }
        self.set_state(sched.now(), State::Closed);
        self.release(sched.now(), chan, Some(TransportError::Aborted));
        self.flush(sched.now(), chan);
        Promise::fulfilled()
    }

    // ------------------------------------------------------------------
    // 入站分段分派
    // ------------------------------------------------------------------

    pub fn on_segment(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel, seg: Segment) {
        let now = sched.now();
        debug!(state = %self.state, %seg, "收到分段");
        if let Some(t) = &mut self.trace {
            t.recv_seg(now, &seg);
        }
        match self.state {
            State::Closed => self.on_segment_closed(&seg),
            State::Listen => self.on_segment_listen(sched, &seg),
            State::SynSent => self.on_segment_syn_sent(sched, chan, &seg),
            _ => self.on_segment_synchronized(sched, chan, &seg),
        }
        self.flush(now, chan);
    }

    /// CLOSED：除 RST 外一律以 RST 回应。
    fn on_segment_closed(&mut self, seg: &Segment) {
        if seg.is_rst() {
            return;
        }
        let reply = if seg.is_ack() {
            Segment::rst(seg.ack)
        } else {
            Segment::rst_ack(0, serial::add(seg.seq, seg.seq_len()))
        };
        self.out.push(reply);
    }

    /// LISTEN：只认 SYN，选定 ISS 并回 SYN+ACK。
    fn on_segment_listen(&mut self, sched: &mut Scheduler, seg: &Segment) {
        if seg.is_rst() {
            return;
        }
        if seg.is_ack() {
            self.out.push(Segment::rst(seg.ack));
            return;
        }
        if !seg.is_syn() {
            return;
        }
        let Some(tcb) = self.tcb.as_mut() else {
            return;
        };
        tcb.irs = seg.seq;
        tcb.rcv_nxt = serial::add(seg.seq, 1);
        if let Some(mss) = seg.mss_option() {
            tcb.negotiate_mss(mss);
        }
        tcb.snd_nxt = serial::add(tcb.iss, 1);
        tcb.snd_wnd = seg.window;
        tcb.max_snd_wnd = seg.window;
        tcb.snd_wl1 = seg.seq;
        tcb.snd_wl2 = 0;
        let iss = tcb.iss;
        let rcv_nxt = tcb.rcv_nxt;
        let mut reply = Segment::syn_ack(iss, rcv_nxt);
        reply.set_option(SegmentOption::MaximumSegmentSize(self.cfg.base_mss));
        self.set_state(sched.now(), State::SynReceived);
        self.push_reliable(sched, reply);
    }

    /// SYN_SENT：期待 SYN+ACK；同时开的对向 SYN 转入
    /// SYN_RECEIVED。
    fn on_segment_syn_sent(
        &mut self,
        sched: &mut Scheduler,
        chan: &mut dyn Channel,
        seg: &Segment,
    ) {
        let now = sched.now();
        let Some(tcb) = self.tcb.as_mut() else {
            return;
        };
        if seg.is_ack() && !tcb.is_acceptable_ack(seg.ack) {
            if !seg.is_rst() {
                self.out.push(Segment::rst(seg.ack));
            }
            return;
        }
        if seg.is_rst() {
            if seg.is_ack() {
                // 握手被对端拒绝
                self.set_state(now, State::Closed);
                self.release(now, chan, Some(TransportError::Refused));
            }
            return;
        }
        if !seg.is_syn() {
            return;
        }
        tcb.irs = seg.seq;
        tcb.rcv_nxt = serial::add(seg.seq, 1);
        if let Some(mss) = seg.mss_option() {
            tcb.negotiate_mss(mss);
        }
        tcb.rtt.note_inbound(seg);
        if seg.is_ack() {
            tcb.snd_una = seg.ack;
            tcb.rtx.remove_acked(seg.ack);
            tcb.rtt.on_ack(now, seg);
            tcb.snd_wnd = seg.window;
            tcb.max_snd_wnd = seg.window;
            tcb.snd_wl1 = seg.seq;
            tcb.snd_wl2 = seg.ack;
            let (snd_nxt, rcv_nxt) = (tcb.snd_nxt, tcb.rcv_nxt);
            self.cancel_rtx_timer();
            self.cancel_user_timer();
            self.set_state(now, State::Established);
            self.push_control(now, Segment::ack(snd_nxt, rcv_nxt));
            chan.notify(ConnEvent::Established { snd_nxt, rcv_nxt });
            if let Some(p) = self.open_promise.take() {
                p.try_fulfill();
            }
            // 握手期间排队的数据现在可以分段发出
            self.segmentize(sched);
        } else {
            // 同时打开
            let iss = tcb.iss;
            let rcv_nxt = tcb.rcv_nxt;
            let mut reply = Segment::syn_ack(iss, rcv_nxt);
            reply.set_option(SegmentOption::MaximumSegmentSize(self.cfg.base_mss));
            self.set_state(now, State::SynReceived);
            self.push_control(now, reply);
        }
    }

    /// 已同步状态（SYN_RECEIVED 及之后）的统一处理。
    fn on_segment_synchronized(
        &mut self,
        sched: &mut Scheduler,
        chan: &mut dyn Channel,
        seg: &Segment,
    ) {
        let now = sched.now();

        // 1. 序列检查：占用序列号的分段必须恰好接在 rcv_nxt 上
        //    （乱序重组不在范围内），否则回挑战 ACK 提示对端。
        {
            let Some(tcb) = self.tcb.as_mut() else {
                return;
            };
            if seg.seq_len() > 0 && seg.seq != tcb.rcv_nxt {
                if seg.is_rst() {
                    return;
                }
                debug!(seq = seg.seq, rcv_nxt = tcb.rcv_nxt, "非按序分段，回挑战 ACK");
                let challenge = Segment::ack(tcb.snd_nxt, tcb.rcv_nxt);
                self.push_control(now, challenge);
                return;
            }
            tcb.rtt.note_inbound(seg);
        }

        // 2. RST：立即中止
        if seg.is_rst() {
            self.set_state(now, State::Closed);
            self.release(now, chan, Some(TransportError::Reset));
            return;
        }

        // 3. 同步状态里的 SYN：挑战 ACK 后忽略
        if seg.is_syn() {
            if let Some(tcb) = self.tcb.as_ref() {
                let challenge = Segment::ack(tcb.snd_nxt, tcb.rcv_nxt);
                self.push_control(now, challenge);
            }
            return;
        }

        // 4. ACK 处理
        let mut ack_advanced = false;
        let mut dup_ack_retransmit = false;
        if seg.is_ack() {
            let Some(tcb) = self.tcb.as_mut() else {
                return;
            };
            if tcb.is_acceptable_ack(seg.ack) {
                tcb.snd_una = seg.ack;
                tcb.rtx.remove_acked(seg.ack);
                tcb.rtt.on_ack(now, seg);
                tcb.on_new_ack();
                ack_advanced = true;
            } else if serial::greater_than(seg.ack, tcb.snd_nxt) {
                // 确认了尚未发送的数据
                let challenge = Segment::ack(tcb.snd_nxt, tcb.rcv_nxt);
                self.push_control(now, challenge);
                return;
            } else if seg.ack == tcb.snd_una
                && seg.payload.is_empty()
                && !seg.is_syn()
                && !seg.is_fin()
                && seg.window == tcb.snd_wnd
                && !tcb.rtx.is_empty()
            {
                // RFC 5681 意义上的重复确认；第三个触发快速重传
                dup_ack_retransmit = tcb.on_duplicate_ack();
            }
            // 其余重复确认（ack ≤ snd_una）只用于窗口更新
            if let Some(tcb) = self.tcb.as_mut() {
                tcb.update_snd_wnd(seg);
            }
        }
        if dup_ack_retransmit {
            self.fast_retransmit(sched, chan);
        }

        if ack_advanced {
            self.cancel_rtx_timer();
            self.cancel_user_timer();
            let rtx_empty = self
                .tcb
                .as_ref()
                .map(|t| t.rtx.is_empty())
                .unwrap_or(true);
            if !rtx_empty {
                self.arm_rtx_timer(sched);
                self.arm_user_timer(sched);
            }
            // 确认推动的状态迁移
            match self.state {
                State::SynReceived => {
                    let (snd_nxt, rcv_nxt) = match self.tcb.as_ref() {
                        Some(t) => (t.snd_nxt, t.rcv_nxt),
                        None => return,
                    };
                    self.set_state(now, State::Established);
                    chan.notify(ConnEvent::Established { snd_nxt, rcv_nxt });
                    if let Some(p) = self.open_promise.take() {
                        p.try_fulfill();
                    }
                }
                State::FinWait1 if self.fin_acked() => {
                    self.set_state(now, State::FinWait2);
                }
                State::Closing if self.fin_acked() => {
                    self.enter_time_wait(sched);
                }
                State::LastAck if self.fin_acked() => {
                    self.set_state(now, State::Closed);
                    self.release(now, chan, None);
                    return;
                }
                _ => {}
            }
        }

        // 5. 载荷交付（接收窗口允许的前缀）
        let mut queue_ack = false;
        let mut payload_fully_accepted = true;
        if !seg.payload.is_empty() {
            if self.state.can_receive_data() {
                let Some(tcb) = self.tcb.as_mut() else {
                    return;
                };
                let accept = seg.payload.len().min(tcb.rcv_wnd as usize);
                if accept > 0 {
                    tcb.rcv_nxt = serial::add(tcb.rcv_nxt, accept as u32);
                    tcb.receive_buffer.append(seg.payload[..accept].to_vec());
                    tcb.rcv_wnd = self
                        .cfg
                        .receive_budget
                        .saturating_sub(tcb.receive_buffer.readable_bytes() as u32);
                    let readable = tcb.receive_buffer.readable_bytes();
                    chan.notify(ConnEvent::DataReadable { readable });
                }
                payload_fully_accepted = accept == seg.payload.len();
                queue_ack = true;
            } else {
                // 对端 FIN 之后不再接收数据
                payload_fully_accepted = false;
                queue_ack = true;
            }
        }

        // 6. FIN：仅当其载荷全部落位、FIN 位恰好接在 rcv_nxt 上
        if seg.is_fin() && payload_fully_accepted {
            if let Some(tcb) = self.tcb.as_mut() {
                tcb.rcv_nxt = serial::add(tcb.rcv_nxt, 1);
            }
            queue_ack = true;
            match self.state {
                State::Established => {
                    self.set_state(now, State::CloseWait);
                    chan.notify(ConnEvent::Closing {
                        initiated_by_remote: true,
                    });
                }
                State::FinWait1 => {
                    if self.fin_acked() {
                        self.set_state(now, State::FinWait2);
                        self.enter_time_wait(sched);
                    } else {
                        self.set_state(now, State::Closing);
                    }
                }
                State::FinWait2 => {
                    self.enter_time_wait(sched);
                }
                // 其余状态里是重传的 FIN，再确认即可
                _ => {}
            }
        }

        if queue_ack {
            if let Some(tcb) = self.tcb.as_ref() {
                let ack = Segment::ack(tcb.snd_nxt, tcb.rcv_nxt);
                self.push_control(now, ack);
            }
        }

        // 7. 确认或窗口更新可能放开了发送窗口
        self.segmentize(sched);
        self.maybe_send_fin(sched);
    }

    // ------------------------------------------------------------------
    // 定时器回调
    // ------------------------------------------------------------------

    /// 重传超时：复核未过期后重发最早的在途分段，RTO 退避，
    /// 应用丢包响应，重新挂定时器。
    pub(crate) fn on_retransmission_timeout(
        &mut self,
        sched: &mut Scheduler,
        chan: &mut dyn Channel,
        seq: u32,
    ) {
        let now = sched.now();
        self.rtx_timer = None;
        if self.state == State::Closed {
            return;
        }
        let Some(tcb) = self.tcb.as_mut() else {
            return;
        };
        // 挂定时器之后确认已推进到该序列号之后 ⇒ 不重传
        if serial::less_than(seq, tcb.snd_una) {
            self.arm_rtx_timer(sched);
            return;
        }
        let Some(oldest) = tcb.rtx.peek_oldest().cloned() else {
            return;
        };
        tcb.rtt.back_off();
        tcb.on_timeout_loss();
        let rto = tcb.rtt.rto();
        let copy = Self::finalize(&self.cfg, tcb, oldest, now);
        self.retransmission_count += 1;
        warn!(%copy, rto, "重传");
        if let Some(t) = &mut self.trace {
            t.send_seg(now, &copy, true);
        }
        chan.send_segment(copy);
        self.arm_rtx_timer(sched);
    }

    /// 零窗口探测：对端持续通告零窗口时发出 1 字节探测，迫使其
    /// 回以携带当前窗口的确认。探测走重传队列，未获确认时随 RTO
    /// 指数退避重发。
    pub(crate) fn on_zero_window_probe(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel) {
        self.persist_timer = None;
        if !matches!(
            self.state,
            State::Established | State::CloseWait | State::FinWait1 | State::LastAck
        ) {
            return;
        }
        let probe = {
            let Some(tcb) = self.tcb.as_mut() else {
                return;
            };
            if tcb.send_buffer.is_empty() {
                return;
            }
            if tcb.snd_wnd > 0 {
                None
            } else {
                let byte = tcb.send_buffer.dequeue_up_to(1);
                let seq = tcb.snd_nxt;
                let ack = tcb.rcv_nxt;
                tcb.snd_nxt = serial::add(seq, 1);
                Some(Segment::data(seq, ack, byte))
            }
        };
        match probe {
            Some(seg) => {
                debug!(%seg, "零窗口探测");
                self.push_reliable(sched, seg);
            }
            // 定时器挂起期间窗口已重开：恢复正常分段发送
            None => self.segmentize(sched),
        }
        self.flush(sched.now(), chan);
    }

    /// 第三个重复确认触发的快速重传：不等定时器到期，立刻重发
    /// 最早的在途分段并进入快速恢复。
    fn fast_retransmit(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel) {
        let now = sched.now();
        let Some(tcb) = self.tcb.as_mut() else {
            return;
        };
        let Some(oldest) = tcb.rtx.peek_oldest().cloned() else {
            return;
        };
        tcb.on_fast_retransmit_loss();
        let copy = Self::finalize(&self.cfg, tcb, oldest, now);
        self.retransmission_count += 1;
        debug!(%copy, "快速重传");
        if let Some(t) = &mut self.trace {
            t.send_seg(now, &copy, true);
        }
        chan.send_segment(copy);
    }

    /// 用户超时：放弃连接，所有未决操作以超时原因失败。
    pub(crate) fn on_user_timeout(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel) {
        self.user_timer = None;
        if self.state == State::Closed {
            return;
        }
        let now = sched.now();
        warn!(id = self.id, "用户超时，中止连接");
        if let Some(tcb) = self.tcb.as_ref() {
            self.out.push(Segment::rst_ack(tcb.snd_nxt, tcb.rcv_nxt));
        }
        self.set_state(now, State::Closed);
        self.release(now, chan, Some(TransportError::UserTimeout));
        self.flush(now, chan);
    }

    /// 2·MSL 等待结束：连接终结。
    pub(crate) fn on_msl_expired(&mut self, sched: &mut Scheduler, chan: &mut dyn Channel) {
        if !matches!(self.state, State::FinWait2 | State::Closing) {
            return;
        }
        let now = sched.now();
        self.set_state(now, State::Closed);
        self.release(now, chan, None);
    }

    // ------------------------------------------------------------------
    // 内部工具
    // ------------------------------------------------------------------

    fn choose_iss(&self) -> u32 {
        self.cfg
            .iss
            .unwrap_or_else(|| (self.id.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32) as u32)
    }

    fn set_state(&mut self, now: Moment, to: State) {
        if self.state == to {
            return;
        }
        debug!(from = %self.state, to = %to, "状态迁移");
        if let Some(t) = &mut self.trace {
            t.state(now, self.state, to);
        }
        self.state = to;
    }

    fn fin_acked(&self) -> bool {
        match (&self.tcb, self.fin_sent) {
            (Some(tcb), Some(fin_seq)) => serial::greater_than(tcb.snd_una, fin_seq),
            _ => false,
        }
    }

    /// 给出站分段盖窗口与时间戳。
    fn finalize(cfg: &Config, tcb: &mut Tcb, mut seg: Segment, now: Moment) -> Segment {
        if !seg.is_rst() {
            seg.window = tcb.rcv_wnd;
        }
        if cfg.timestamps {
            tcb.rtt.stamp_outbound(&mut seg, now);
        }
        seg
    }

    /// 可靠发送：登记进重传队列并挂定时器。
    fn push_reliable(&mut self, sched: &mut Scheduler, seg: Segment) {
        let now = sched.now();
        let Some(tcb) = self.tcb.as_mut() else {
            return;
        };
        let seg = Self::finalize(&self.cfg, tcb, seg, now);
        tcb.rtx.enqueue(seg.clone());
        self.out.push(seg);
        self.arm_rtx_timer(sched);
        if self.user_timer.is_none() {
            self.arm_user_timer(sched);
        }
    }

    /// 纯控制分段：只进出站队列，不要求确认。
    fn push_control(&mut self, now: Moment, seg: Segment) {
        match self.tcb.as_mut() {
            Some(tcb) => {
                let seg = Self::finalize(&self.cfg, tcb, seg, now);
                self.out.push(seg);
            }
            None => self.out.push(seg),
        }
    }

    /// 把发送缓冲切成分段发出，受
    /// `min(send_mss, min(cwnd, snd_wnd) − 在途)` 约束；
    /// Nagle 聚合：不足整段且已有在途数据时等待。
    fn segmentize(&mut self, sched: &mut Scheduler) {
        if !matches!(
            self.state,
            State::Established | State::CloseWait | State::FinWait1 | State::LastAck
        ) {
            return;
        }
        loop {
            let seg = {
                let Some(tcb) = self.tcb.as_mut() else {
                    return;
                };
                if tcb.send_buffer.is_empty() {
                    return;
                }
                let cap = tcb.send_mss.min(tcb.usable_window()) as usize;
                if cap == 0 {
                    // 零窗口且无在途分段可招来确认 ⇒ 只有探测能打破僵局
                    if tcb.snd_wnd == 0 && tcb.rtx.is_empty() {
                        break;
                    }
                    return;
                }
                let avail = tcb.send_buffer.len();
                if !self.cfg.no_delay
                    && avail < tcb.send_mss as usize
                    && tcb.flight_size() > 0
                    && !self.close_pending
                {
                    return;
                }
                let chunk = tcb.send_buffer.dequeue_up_to(cap);
                let seq = tcb.snd_nxt;
                let ack = tcb.rcv_nxt;
                tcb.snd_nxt = serial::add(seq, chunk.len() as u32);
                let mut seg = Segment::data(seq, ack, chunk);
                if tcb.send_buffer.is_empty() {
                    seg.ctl |= crate::seg::PSH;
                }
                seg
            };
            self.push_reliable(sched, seg);
        }
        self.arm_persist_timer(sched);
    }

    /// close 受理后，发送缓冲排空时补发 FIN。
    fn maybe_send_fin(&mut self, sched: &mut Scheduler) {
        if !self.close_pending || self.fin_sent.is_some() {
            return;
        }
        let fin = {
            let Some(tcb) = self.tcb.as_mut() else {
                return;
            };
            if !tcb.send_buffer.is_empty() {
                return;
            }
            let seq = tcb.snd_nxt;
            let fin = Segment::fin_ack(seq, tcb.rcv_nxt);
            tcb.snd_nxt = serial::add(seq, 1);
            self.fin_sent = Some(seq);
            fin
        };
        self.push_reliable(sched, fin);
    }

    fn arm_rtx_timer(&mut self, sched: &mut Scheduler) {
        if self.rtx_timer.is_some() {
            return;
        }
        let Some(tcb) = self.tcb.as_ref() else {
            return;
        };
        let Some(oldest) = tcb.rtx.peek_oldest() else {
            return;
        };
        let seq = oldest.seq;
        let rto = tcb.rtt.rto();
        if let Some(t) = &mut self.trace {
            t.rto(sched.now(), seq, rto);
        }
        let handle = TimerHandle::new();
        self.rtx_timer = Some(handle.clone());
        sched.schedule_after(
            rto,
            RetransmissionTimeout {
                id: self.id,
                handle,
                seq,
            },
        );
    }

    fn cancel_rtx_timer(&mut self) {
        if let Some(h) = self.rtx_timer.take() {
            h.cancel();
        }
    }

    fn arm_user_timer(&mut self, sched: &mut Scheduler) {
        if self.cfg.user_timeout_ms == 0 {
            return;
        }
        let handle = TimerHandle::new();
        self.user_timer = Some(handle.clone());
        sched.schedule_after(
            self.cfg.user_timeout_ms,
            UserTimeoutExpired {
                id: self.id,
                handle,
            },
        );
    }

    fn cancel_user_timer(&mut self) {
        if let Some(h) = self.user_timer.take() {
            h.cancel();
        }
    }

    /// 零窗口僵持时挂探测定时器，首次探测等一个当前 RTO。
    fn arm_persist_timer(&mut self, sched: &mut Scheduler) {
        if self.persist_timer.is_some() {
            return;
        }
        let Some(tcb) = self.tcb.as_ref() else {
            return;
        };
        let rto = tcb.rtt.rto();
        debug!(rto, "挂零窗口探测定时器");
        let handle = TimerHandle::new();
        self.persist_timer = Some(handle.clone());
        sched.schedule_after(
            rto,
            ZeroWindowProbe {
                id: self.id,
                handle,
            },
        );
    }

    fn cancel_persist_timer(&mut self) {
        if let Some(h) = self.persist_timer.take() {
            h.cancel();
        }
    }

    /// 同步释放：清空三个缓冲，所有未决信号按 `cause` 收尾，
    /// 上抛 `Closed` 事件。之后观察不到任何半释放状态。
    fn release(&mut self, _now: Moment, chan: &mut dyn Channel, cause: Option<TransportError>) {
        self.cancel_rtx_timer();
        self.cancel_user_timer();
        self.cancel_persist_timer();
        self.close_pending = false;
        if let Some(mut tcb) = self.tcb.take() {
            tcb.rtx
                .release_all(cause.unwrap_or(TransportError::Closed));
            let dropped_unsent = tcb.send_buffer.clear();
            let dropped_unread = tcb.receive_buffer.clear();
            if dropped_unsent + dropped_unread > 0 {
                debug!(dropped_unsent, dropped_unread, "释放未送达字节");
            }
        }
        if let Some(p) = self.open_promise.take() {
            match cause {
                Some(c) => p.try_fail(c),
                None => p.try_fulfill(),
            };
        }
        if let Some(p) = self.close_promise.take() {
            match cause {
                Some(c) => p.try_fail(c),
                None => p.try_fulfill(),
            };
        }
        chan.notify(ConnEvent::Closed { cause });
    }

    fn enter_time_wait(&mut self, sched: &mut Scheduler) {
        if self.msl_scheduled {
            return;
        }
        self.msl_scheduled = true;
        let wait = 2 * self.cfg.max_segment_lifetime_ms;
        debug!(wait_ms = wait, "进入 2·MSL 等待");
        sched.schedule_after(wait, MslExpired { id: self.id });
    }

    /// 把出站队列冲刷到通道（按入队顺序，捎带合并已完成）。
    fn flush(&mut self, now: Moment, chan: &mut dyn Channel) {
        for seg in self.out.drain() {
            debug!(%seg, "发送分段");
            if let Some(t) = &mut self.trace {
                t.send_seg(now, &seg, false);
            }
            chan.send_segment(seg);
        }
    }
}

/// 用户超时事件。认领失败说明超时已被确认进度取消。
pub struct UserTimeoutExpired {
    pub id: ConnId,
    pub handle: TimerHandle,
}

impl Event for UserTimeoutExpired {
    fn execute(self: Box<Self>, sched: &mut Scheduler, world: &mut dyn World) {
        if !self.handle.try_fire() {
            return;
        }
        let Some(ep) = world.endpoint_mut(self.id) else {
            return;
        };
        ep.conn.on_user_timeout(sched, &mut ep.chan);
    }
}

/// 零窗口探测到期事件。连接释放时定时器被取消。
pub struct ZeroWindowProbe {
    pub id: ConnId,
    pub handle: TimerHandle,
}

impl Event for ZeroWindowProbe {
    fn execute(self: Box<Self>, sched: &mut Scheduler, world: &mut dyn World) {
        if !self.handle.try_fire() {
            return;
        }
        let Some(ep) = world.endpoint_mut(self.id) else {
            return;
        };
        ep.conn.on_zero_window_probe(sched, &mut ep.chan);
    }
}

/// 2·MSL 等待到期事件。
pub struct MslExpired {
    pub id: ConnId,
}

impl Event for MslExpired {
    fn execute(self: Box<Self>, sched: &mut Scheduler, world: &mut dyn World) {
        let Some(ep) = world.endpoint_mut(self.id) else {
            return;
        };
        ep.conn.on_msl_expired(sched, &mut ep.chan);
    }
}
