use crate::coincidence::light_time_ns;
use bon::bon;
use std::fmt;

/// A [`TriggerHit`] is a signal from the fast trigger/veto detector.
///
/// All times are in nanoseconds.
#[derive(Clone, Debug)]
pub struct TriggerHit {
    pub time: f64,
    /// Charge amplitude (PE).
    pub pe: f64,
    pub plane: i32,
    pub position: [f64; 3],
    pub position_err: [f64; 3],
    pub tagger: String,
}

#[bon]
impl TriggerHit {
    #[builder]
    pub fn new(
        time: f64,
        pe: f64,
        #[builder(default)] plane: i32,
        #[builder(default)] position: [f64; 3],
        #[builder(default)] position_err: [f64; 3],
        #[builder(into, default)] tagger: String,
    ) -> Self {
        Self {
            time,
            pe,
            plane,
            position,
            position_err,
            tagger,
        }
    }
}

impl TriggerHit {
    /// Returns `true` if both hits describe the same detector signal.
    ///
    /// Every timing, plane, position, and tagger field has to be exactly equal
    /// (no floating point tolerance). The charge is not compared.
    ///
    /// # Examples
    ///
    /// ```
    /// use tof::event::TriggerHit;
    ///
    /// let a = TriggerHit::builder().time(10.0).pe(50.0).tagger("top").build();
    /// let b = TriggerHit::builder().time(10.0).pe(20.0).tagger("top").build();
    /// let c = TriggerHit::builder().time(10.0).pe(50.0).tagger("bottom").build();
    ///
    /// assert!(a.same_signal(&b));
    /// assert!(!a.same_signal(&c));
    /// ```
    pub fn same_signal(&self, other: &TriggerHit) -> bool {
        self.time == other.time
            && self.plane == other.plane
            && self.position == other.position
            && self.position_err == other.position_err
            && self.tagger == other.tagger
    }
}

/// Group of [`TriggerHit`]s reconstructed as a single particle crossing the
/// trigger detector.
///
/// Hits are always kept in ascending time order.
#[derive(Clone, Debug, Default)]
pub struct TriggerTrack {
    hits: Vec<TriggerHit>,
}

impl TriggerTrack {
    /// Create a new track. The hits are sorted by time.
    pub fn new(mut hits: Vec<TriggerHit>) -> Self {
        hits.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { hits }
    }
    /// Hits in the track, earliest first.
    pub fn hits(&self) -> &[TriggerHit] {
        &self.hits
    }
    /// Earliest hit in the track.
    pub fn first(&self) -> Option<&TriggerHit> {
        self.hits.first()
    }
}

impl FromIterator<TriggerHit> for TriggerTrack {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = TriggerHit>,
    {
        Self::new(iter.into_iter().collect())
    }
}

/// A single hit of the light-collection detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightHit {
    /// Peak time in microseconds.
    pub peak_time: f64,
    pub pe: f64,
}

impl LightHit {
    /// Peak time in nanoseconds, corrected by the optical delay.
    pub fn time_ns(&self, optical_delay: f64) -> f64 {
        light_time_ns(self.peak_time, optical_delay)
    }
}

/// Which of the two flash times is used by a matching policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeBase {
    /// Flash time relative to the trigger.
    Relative,
    /// Absolute flash time.
    Absolute,
}

/// Optical flash, i.e. a cluster of [`LightHit`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct LightFlash {
    /// Relative time in microseconds.
    pub time: f64,
    /// Absolute time in microseconds.
    pub abs_time: f64,
    pub total_pe: f64,
    /// Indices of the associated hits in [`Event::light_hits`].
    pub hits: Vec<usize>,
}

#[bon]
impl LightFlash {
    /// If not given, the absolute time is the same as the relative time.
    #[builder]
    pub fn new(
        time: f64,
        abs_time: Option<f64>,
        total_pe: f64,
        #[builder(default)] hits: Vec<usize>,
    ) -> Self {
        Self {
            time,
            abs_time: abs_time.unwrap_or(time),
            total_pe,
            hits,
        }
    }
}

impl LightFlash {
    /// Flash time in nanoseconds, corrected by the optical delay.
    pub fn time_ns(&self, base: TimeBase, optical_delay: f64) -> f64 {
        let time = match base {
            TimeBase::Relative => self.time,
            TimeBase::Absolute => self.abs_time,
        };
        light_time_ns(time, optical_delay)
    }
}

/// Light-detector region in which a flash was reconstructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    Tpc0,
    Tpc1,
}

impl Region {
    /// All regions, in the order their flashes are scanned.
    pub const ALL: [Region; 2] = [Region::Tpc0, Region::Tpc1];

    pub fn index(self) -> usize {
        match self {
            Region::Tpc0 => 0,
            Region::Tpc1 => 1,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Identifies a flash within an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlashId {
    pub region: Region,
    /// Index within the collection of flashes of `region`.
    pub index: usize,
}

/// All the detector data of a single event.
///
/// Missing collections are simply empty.
#[derive(Clone, Debug, Default)]
pub struct Event {
    pub trigger_hits: Vec<TriggerHit>,
    pub trigger_tracks: Vec<TriggerTrack>,
    pub light_hits: Vec<LightHit>,
    pub flashes: [Vec<LightFlash>; 2],
}

#[bon]
impl Event {
    #[builder]
    pub fn new(
        #[builder(default)] trigger_hits: Vec<TriggerHit>,
        #[builder(default)] trigger_tracks: Vec<TriggerTrack>,
        #[builder(default)] light_hits: Vec<LightHit>,
        #[builder(default)] tpc0_flashes: Vec<LightFlash>,
        #[builder(default)] tpc1_flashes: Vec<LightFlash>,
    ) -> Self {
        Self {
            trigger_hits,
            trigger_tracks,
            light_hits,
            flashes: [tpc0_flashes, tpc1_flashes],
        }
    }
}

impl Event {
    /// Flashes reconstructed in the given region.
    pub fn flashes(&self, region: Region) -> &[LightFlash] {
        &self.flashes[region.index()]
    }
    /// Iterate over the flashes of all regions, [`Region::Tpc0`] first.
    pub fn all_flashes(&self) -> impl Iterator<Item = (FlashId, &LightFlash)> + '_ {
        Region::ALL.into_iter().flat_map(move |region| {
            self.flashes(region)
                .iter()
                .enumerate()
                .map(move |(index, flash)| (FlashId { region, index }, flash))
        })
    }
    /// Light hits associated with a flash, with their identifier.
    ///
    /// Associations that don't point to a light hit of this event are skipped
    /// (see [`Event::dangling_associations`]).
    pub fn flash_hits<'a>(
        &'a self,
        flash: &'a LightFlash,
    ) -> impl Iterator<Item = (usize, &'a LightHit)> + 'a {
        flash
            .hits
            .iter()
            .filter_map(move |&id| self.light_hits.get(id).map(|hit| (id, hit)))
    }
    /// Number of flash to light hit associations, across all regions, that
    /// don't point to a light hit of this event.
    pub fn dangling_associations(&self) -> usize {
        self.all_flashes()
            .flat_map(|(_, flash)| &flash.hits)
            .filter(|&&id| id >= self.light_hits.len())
            .count()
    }
}
