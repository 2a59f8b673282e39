//! Choosing a concrete peer for messages sent to a service.

use mocknet_types::{PeerAddress, ServiceInfo};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// How a message addressed to a service picks one of its providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServicePeerAllocationStrategy {
    /// Uniformly random provider from the fabric's seeded RNG.
    #[default]
    Random,
    /// Providers in registration order, cycling per service.
    RoundRobin,
}

#[derive(Debug)]
pub(crate) struct Allocator {
    strategy: ServicePeerAllocationStrategy,
    rng: ChaCha8Rng,
    cursors: HashMap<ServiceInfo, usize>,
}

impl Allocator {
    pub(crate) fn new(strategy: ServicePeerAllocationStrategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: ChaCha8Rng::seed_from_u64(seed),
            cursors: HashMap::new(),
        }
    }

    pub(crate) fn pick(
        &mut self,
        service: &ServiceInfo,
        providers: &[PeerAddress],
    ) -> Option<PeerAddress> {
        if providers.is_empty() {
            return None;
        }
        let index = match self.strategy {
            ServicePeerAllocationStrategy::Random => self.rng.gen_range(0..providers.len()),
            ServicePeerAllocationStrategy::RoundRobin => {
                let cursor = self.cursors.entry(service.clone()).or_insert(0);
                let index = *cursor % providers.len();
                *cursor = cursor.wrapping_add(1);
                index
            }
        };
        Some(providers[index])
    }
}
