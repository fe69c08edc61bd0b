//! Simulated unreliable network between replicas.
//!
//! Messages can be lost (and later retransmitted), duplicated, or delivered
//! out of order. Randomness comes from a seeded LCG so every run with the
//! same seed and schedule behaves identically.

use std::collections::VecDeque;
use tracker_state::Payload;

/// What replicas send each other.
#[derive(Debug, Clone)]
pub enum SyncMessage {
    /// Changes since the sender's last delta reset.
    Delta(Payload),
    /// The sender's whole state.
    Full(Payload),
    /// Ask the receiver to answer with a `Full`.
    FullRequest,
}

/// A message addressed to one replica (cluster indices).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: usize,
    pub to: usize,
    pub message: SyncMessage,
}

/// Network configuration for simulation
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Probability of message loss (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability of message duplication (0.0 - 1.0)
    pub dup_rate: f64,
    /// Probability of message reordering (0.0 - 1.0)
    pub reorder_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            dup_rate: 0.0,
            reorder_rate: 0.0,
        }
    }
}

impl NetworkConfig {
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Default::default()
        }
    }

    pub fn with_dups(dup_rate: f64) -> Self {
        Self {
            dup_rate,
            ..Default::default()
        }
    }

    pub fn reordering(reorder_rate: f64) -> Self {
        Self {
            reorder_rate,
            ..Default::default()
        }
    }

    /// Loss, duplication and reordering all at once.
    pub fn chaotic() -> Self {
        Self {
            loss_rate: 0.1,
            dup_rate: 0.2,
            reorder_rate: 0.3,
        }
    }
}

/// Counters for what the network did to the traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub sent: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub duplicated: usize,
    pub reordered: usize,
}

#[derive(Debug)]
pub struct NetworkSimulator {
    in_flight: VecDeque<Envelope>,
    lost: Vec<Envelope>,
    config: NetworkConfig,
    rng_state: u64,
    stats: NetworkStats,
}

impl NetworkSimulator {
    pub fn new(config: NetworkConfig) -> Self {
        Self::with_seed(config, 12345)
    }

    pub fn with_seed(config: NetworkConfig, seed: u64) -> Self {
        Self {
            in_flight: VecDeque::new(),
            lost: Vec::new(),
            config,
            rng_state: seed,
            stats: NetworkStats::default(),
        }
    }

    /// Simple LCG random number generator
    fn next_random(&mut self) -> f64 {
        self.rng_state = self.rng_state.wrapping_mul(1103515245).wrapping_add(12345);
        ((self.rng_state >> 16) & 0x7fff) as f64 / 32768.0
    }

    pub fn send(&mut self, envelope: Envelope) {
        self.stats.sent += 1;

        if self.next_random() < self.config.loss_rate {
            self.stats.dropped += 1;
            self.lost.push(envelope);
            return;
        }

        if self.next_random() < self.config.dup_rate {
            self.stats.duplicated += 1;
            self.in_flight.push_back(envelope.clone());
        }

        if self.next_random() < self.config.reorder_rate && !self.in_flight.is_empty() {
            let pos = (self.next_random() * self.in_flight.len() as f64) as usize;
            self.stats.reordered += 1;
            self.in_flight.insert(pos.min(self.in_flight.len()), envelope);
        } else {
            self.in_flight.push_back(envelope);
        }
    }

    pub fn receive(&mut self) -> Option<Envelope> {
        let envelope = self.in_flight.pop_front()?;
        self.stats.delivered += 1;
        Some(envelope)
    }

    /// Put every lost message back on the wire.
    pub fn retransmit_lost(&mut self) {
        self.in_flight.extend(self.lost.drain(..));
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn lost_count(&self) -> usize {
        self.lost.len()
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(from: usize, to: usize) -> Envelope {
        Envelope {
            from,
            to,
            message: SyncMessage::FullRequest,
        }
    }

    #[test]
    fn test_reliable_network_is_fifo() {
        let mut net = NetworkSimulator::new(NetworkConfig::default());
        net.send(request(0, 1));
        net.send(request(0, 2));

        assert_eq!(net.in_flight_count(), 2);
        assert_eq!(net.receive().map(|e| e.to), Some(1));
        assert_eq!(net.receive().map(|e| e.to), Some(2));
        assert!(net.receive().is_none());
    }

    #[test]
    fn test_total_loss_then_retransmit() {
        let mut net = NetworkSimulator::new(NetworkConfig::lossy(1.0));
        net.send(request(0, 1));

        assert!(net.is_empty());
        assert_eq!(net.lost_count(), 1);

        net.retransmit_lost();
        assert_eq!(net.lost_count(), 0);
        assert!(net.receive().is_some());
    }

    #[test]
    fn test_duplication_counts() {
        let mut net = NetworkSimulator::new(NetworkConfig::with_dups(1.0));
        net.send(request(0, 1));

        assert_eq!(net.in_flight_count(), 2);
        assert_eq!(net.stats().duplicated, 1);
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let run = |seed| {
            let mut net = NetworkSimulator::with_seed(NetworkConfig::chaotic(), seed);
            for to in 0..20 {
                net.send(request(0, to));
            }
            let mut order = Vec::new();
            while let Some(envelope) = net.receive() {
                order.push(envelope.to);
            }
            order
        };
        assert_eq!(run(7), run(7));
    }
}
