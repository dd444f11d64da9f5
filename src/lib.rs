//! Time-of-flight between the cosmic ray tagger (trigger detector) and the
//! photon detection system (light detector).
//!
//! For every trigger hit inside the beam window, each enabled [`Policy`]
//! looks for a coincident light signal. Hits that are not part of any
//! [`TriggerTrack`](event::TriggerTrack) produce a [`ToFRecord`] immediately.
//! Matches of hits that belong to a track are buffered, and a single record
//! per track (and policy) is produced once the whole event has been scanned.
use crate::event::{Event, TriggerHit};
use crate::filter::accepts_trigger_hit;
use crate::policy::MatchCandidate;
use crate::track::{belongs_to_track, TrackAccumulator};
use bon::bon;
use std::collections::BTreeMap;

/// Coincidence between signals.
pub mod coincidence;
/// Matching parameters.
pub mod config;
/// Detector data of a single event.
pub mod event;
/// Cuts on the input signals.
pub mod filter;
/// Matching policies.
pub mod policy;
/// Output records.
pub mod record;
/// Track membership and track-level aggregation.
pub mod track;

pub use config::Config;
pub use policy::Policy;
pub use record::ToFRecord;

/// A trait that defines the interface for an observer of the matching.
///
/// The default implementation of all methods is a no-op. Users are expected to
/// override the methods they are interested in.
#[allow(unused_variables)]
pub trait Observer {
    /// Called when a trigger hit passes the beam window and charge cuts.
    fn on_trigger_hit(&mut self, hit_id: usize, hit: &TriggerHit) {}
    /// Called when a policy finds a match for a trigger hit.
    fn on_match(&mut self, policy: Policy, hit_id: usize, candidate: &MatchCandidate) {}
    /// Called when the match of a track hit is buffered for aggregation.
    fn on_buffered(&mut self, policy: Policy, track_id: usize, hit_id: usize) {}
    /// Called for every record that is produced.
    fn on_record(&mut self, record: &ToFRecord) {}
}

impl Observer for () {}

/// Per-event time-of-flight matching.
pub struct Matcher<O> {
    config: Config,
    observer: O,
}

#[bon]
impl<O> Matcher<O> {
    #[builder]
    pub fn new(config: Config, observer: O) -> Self {
        Self { config, observer }
    }
}

impl<O> Matcher<O> {
    /// Matching parameters used for every event.
    pub fn config(&self) -> &Config {
        &self.config
    }
    /// Consume the matcher and return its observer.
    pub fn into_observer(self) -> O {
        self.observer
    }
}

impl<O: Observer> Matcher<O> {
    /// Compute all the time-of-flight records of an event.
    ///
    /// Records of lonely hits come first, in trigger hit order (and policy
    /// order for each hit). They are followed by the track records, grouped by
    /// policy and in track order.
    pub fn produce(&mut self, event: &Event) -> Vec<ToFRecord> {
        let mut records = Vec::new();
        let mut tracks: BTreeMap<Policy, BTreeMap<usize, TrackAccumulator>> = BTreeMap::new();
        let mut considered = 0;

        let dangling = event.dangling_associations();
        if dangling > 0 {
            log::warn!("skipping {dangling} flash association(s) to missing light hits");
        }

        for (hit_id, hit) in event.trigger_hits.iter().enumerate() {
            if !accepts_trigger_hit(&self.config, hit) {
                continue;
            }
            considered += 1;
            self.observer.on_trigger_hit(hit_id, hit);

            let track_id = belongs_to_track(hit, &event.trigger_tracks);
            for policy in self.config.policies.iter() {
                let Some(candidate) = policy.find(&self.config, event, hit) else {
                    continue;
                };
                log::trace!(
                    "{policy}: trigger hit `{hit_id}` at {} ns matched light at {} ns",
                    hit.time,
                    candidate.light_time
                );
                self.observer.on_match(policy, hit_id, &candidate);

                match track_id {
                    Some(track_id) => {
                        tracks
                            .entry(policy)
                            .or_default()
                            .entry(track_id)
                            .or_default()
                            .push(hit.time, candidate);
                        self.observer.on_buffered(policy, track_id, hit_id);
                    }
                    None => {
                        let record = ToFRecord::from_hit(policy, hit_id, hit, &candidate);
                        self.observer.on_record(&record);
                        records.push(record);
                    }
                }
            }
        }
        let lonely = records.len();

        for (policy, accumulators) in tracks {
            for (track_id, accumulator) in accumulators {
                // Membership is decided against this same collection.
                let Some(track) = event.trigger_tracks.get(track_id) else {
                    continue;
                };
                if let Some(record) = accumulator.aggregate(policy, track_id, track) {
                    self.observer.on_record(&record);
                    records.push(record);
                }
            }
        }

        log::debug!(
            "{considered}/{} trigger hits in beam window, {lonely} hit records, {} track records",
            event.trigger_hits.len(),
            records.len() - lonely
        );
        records
    }
}
