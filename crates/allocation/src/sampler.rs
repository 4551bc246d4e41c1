//! Per-request ad draws against the active snapshot.

use crate::snapshot::{Snapshot, SnapshotHandle};
use adserve_core::types::{Ad, PublisherId};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServeError {
    /// No refresh cycle has published a snapshot yet.
    #[error("Ad serving temporarily unavailable")]
    NotReady,

    #[error("No ad available for publisher {0}")]
    NoAdAvailable(PublisherId),
}

#[derive(Debug, Clone)]
pub struct Sampler {
    snapshots: Arc<SnapshotHandle>,
}

impl Sampler {
    pub fn new(snapshots: Arc<SnapshotHandle>) -> Self {
        Self { snapshots }
    }

    pub fn serve(&self, publisher_id: PublisherId) -> Result<Ad, ServeError> {
        self.serve_with(publisher_id, &mut rand::thread_rng())
    }

    /// Draw against a single snapshot loaded once for the whole request.
    pub fn serve_with<R: Rng + ?Sized>(
        &self,
        publisher_id: PublisherId,
        rng: &mut R,
    ) -> Result<Ad, ServeError> {
        metrics::counter!("serve.requests").increment(1);

        let Some(snapshot) = self.snapshots.load() else {
            metrics::counter!("serve.not_ready").increment(1);
            return Err(ServeError::NotReady);
        };

        let result = draw(&snapshot, publisher_id, rng);
        if result.is_err() {
            metrics::counter!("serve.no_ad").increment(1);
        }
        result
    }

    pub fn snapshots(&self) -> &Arc<SnapshotHandle> {
        &self.snapshots
    }
}

pub fn draw<R: Rng + ?Sized>(
    snapshot: &Snapshot,
    publisher_id: PublisherId,
    rng: &mut R,
) -> Result<Ad, ServeError> {
    let distribution = snapshot
        .distribution(publisher_id)
        .map_err(|_| ServeError::NoAdAvailable(publisher_id))?;

    let u: f64 = rng.gen();
    distribution
        .pick(u)
        .and_then(|ad_id| snapshot.ad(ad_id))
        .cloned()
        .ok_or(ServeError::NoAdAvailable(publisher_id))
}
