mod ack_rules;
mod buffers;
mod codec;
mod handshake;
mod rtt;
mod segment;
mod teardown;
