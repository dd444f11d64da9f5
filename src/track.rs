use crate::event::{TriggerHit, TriggerTrack};
use crate::policy::{MatchCandidate, Policy};
use crate::record::ToFRecord;

/// Index of the first track that contains a hit equal to `hit` (see
/// [`TriggerHit::same_signal`]). Returns `None` for lonely hits.
///
/// # Examples
///
/// ```
/// use tof::event::{TriggerHit, TriggerTrack};
/// use tof::track::belongs_to_track;
///
/// let hit = TriggerHit::builder().time(10.0).pe(5.0).build();
/// let other = TriggerHit::builder().time(20.0).pe(5.0).build();
/// let tracks = vec![
///     TriggerTrack::new(vec![other.clone()]),
///     TriggerTrack::new(vec![other, hit.clone()]),
/// ];
///
/// assert_eq!(belongs_to_track(&hit, &tracks), Some(1));
/// ```
pub fn belongs_to_track(hit: &TriggerHit, tracks: &[TriggerTrack]) -> Option<usize> {
    tracks
        .iter()
        .position(|track| track.hits().iter().any(|h| h.same_signal(hit)))
}

/// Match found for one of the hits of a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferedMatch {
    /// Time of the trigger hit that produced the match.
    pub trigger_time: f64,
    pub candidate: MatchCandidate,
}

/// All the matches found by a single [`Policy`] for the hits of a track.
#[derive(Clone, Debug, Default)]
pub struct TrackAccumulator {
    matches: Vec<BufferedMatch>,
}

impl TrackAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trigger_time: f64, candidate: MatchCandidate) {
        self.matches.push(BufferedMatch {
            trigger_time,
            candidate,
        });
    }

    pub fn matches(&self) -> &[BufferedMatch] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The buffered match with the earliest trigger time. Ties go to the
    /// first match that was buffered.
    pub fn representative(&self) -> Option<&BufferedMatch> {
        let mut min_time = f64::MAX;
        let mut min_index = 0;
        for (index, m) in self.matches.iter().enumerate() {
            if m.trigger_time < min_time {
                min_time = m.trigger_time;
                min_index = index;
            }
        }

        self.matches.get(min_index)
    }

    /// Build the track-level record.
    ///
    /// The trigger time is always the one of the first hit of the track,
    /// while the light side comes from [`Self::representative`]. These are not
    /// necessarily the same hit (e.g. when the first hit of the track had no
    /// match).
    pub fn aggregate(
        &self,
        policy: Policy,
        track_id: usize,
        track: &TriggerTrack,
    ) -> Option<ToFRecord> {
        let first = track.first()?;
        let representative = self.representative()?;

        Some(ToFRecord::from_track(
            policy,
            track_id,
            first,
            &representative.candidate,
        ))
    }
}
