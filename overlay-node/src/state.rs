//! Per-round traffic counters.
//!
//! Send-origin and receive counters are independently guarded, exactly as
//! spec'd: the forwarder only ever touches the send mutex (and only for
//! locally originated packets), the receive loops only ever touch the
//! receive mutex. Neither task blocks on the other's lock.

use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct SendStats {
    pub sent: u32,
    pub total_sent: i64,
}

#[derive(Debug, Default)]
pub struct ReceiveStats {
    pub received: u32,
    pub relayed: u32,
    pub total_received: i64,
}

#[derive(Debug, Default)]
pub struct Stats {
    pub send: Mutex<SendStats>,
    pub receive: Mutex<ReceiveStats>,
}

impl Stats {
    pub fn record_sent(&self, payload: i32) {
        let mut s = self.send.lock().expect("send stats mutex poisoned");
        s.sent += 1;
        s.total_sent += payload as i64;
    }

    pub fn record_received(&self, payload: i32) {
        let mut s = self.receive.lock().expect("receive stats mutex poisoned");
        s.received += 1;
        s.total_received += payload as i64;
    }

    pub fn record_relayed(&self) {
        let mut s = self.receive.lock().expect("receive stats mutex poisoned");
        s.relayed += 1;
    }

    pub fn sent_count(&self) -> u32 {
        self.send.lock().expect("send stats mutex poisoned").sent
    }
}
