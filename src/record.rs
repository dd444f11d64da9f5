use crate::event::{Region, TriggerHit};
use crate::policy::{MatchCandidate, Policy};

/// Time-of-flight between the trigger detector and the light-collection
/// detector.
///
/// All times are in nanoseconds. Exactly one of `frm_hit` and `frm_trk` is
/// set. Identifiers are `None` when the policy that produced the record does
/// not provide them.
#[derive(Clone, Debug, PartialEq)]
pub struct ToFRecord {
    pub policy: Policy,
    /// `crt_time - pmt_time`.
    pub tof: f64,
    /// Produced by a trigger hit that is not part of any track.
    pub frm_hit: bool,
    /// Produced by a track.
    pub frm_trk: bool,
    pub crt_time: f64,
    pub pmt_time: f64,
    pub crt_tagger: String,
    pub crt_hit_id: Option<usize>,
    pub crt_trk_id: Option<usize>,
    pub pmt_hit_id: Option<usize>,
    pub pmt_flash_id: Option<usize>,
    pub flash_tpc_id: Option<Region>,
}

impl ToFRecord {
    fn new(policy: Policy, crt: &TriggerHit, candidate: &MatchCandidate) -> Self {
        Self {
            policy,
            tof: crt.time - candidate.light_time,
            frm_hit: false,
            frm_trk: false,
            crt_time: crt.time,
            pmt_time: candidate.light_time,
            crt_tagger: crt.tagger.clone(),
            crt_hit_id: None,
            crt_trk_id: None,
            pmt_hit_id: candidate.light_hit,
            pmt_flash_id: candidate.flash.map(|f| f.index),
            flash_tpc_id: candidate.flash.map(|f| f.region),
        }
    }

    /// Record of a trigger hit that is not part of any track.
    pub fn from_hit(
        policy: Policy,
        hit_id: usize,
        hit: &TriggerHit,
        candidate: &MatchCandidate,
    ) -> Self {
        Self {
            frm_hit: true,
            crt_hit_id: Some(hit_id),
            ..Self::new(policy, hit, candidate)
        }
    }

    /// Record of a track. `first` is the earliest hit of the track.
    pub fn from_track(
        policy: Policy,
        track_id: usize,
        first: &TriggerHit,
        candidate: &MatchCandidate,
    ) -> Self {
        Self {
            frm_trk: true,
            crt_trk_id: Some(track_id),
            ..Self::new(policy, first, candidate)
        }
    }
}
