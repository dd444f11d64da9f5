use crate::coincidence::is_coincident;
use crate::config::Config;
use crate::event::{Event, FlashId, LightFlash, TimeBase, TriggerHit};
use crate::filter::{accepts_flash, accepts_light_hit};
use std::fmt;

/// Strategy used to pick the light signal matched to a trigger hit.
///
/// The declaration order is the order in which enabled policies are run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Policy {
    /// Coincident light hit with the largest PE.
    LargestHit,
    /// Coincident light hit closest in time.
    ClosestHit,
    /// Coincident flash with the largest PE (relative time).
    LargestFlash,
    /// Coincident flash closest in time (relative time).
    ClosestFlash,
    /// Earliest hit of the coincident flash with the largest PE (absolute
    /// time).
    LargestFlashEarliestHit,
    /// Earliest hit of the coincident flash closest in time (relative time).
    ClosestFlashEarliestHit,
}

impl Policy {
    /// All policies, in the order they are run.
    pub const ALL: [Policy; 6] = [
        Policy::LargestHit,
        Policy::ClosestHit,
        Policy::LargestFlash,
        Policy::ClosestFlash,
        Policy::LargestFlashEarliestHit,
        Policy::ClosestFlashEarliestHit,
    ];

    fn index(self) -> usize {
        self as usize
    }
    /// Name of the policy as used in configuration files.
    pub fn key(self) -> &'static str {
        match self {
            Policy::LargestHit => "largest_hit",
            Policy::ClosestHit => "closest_hit",
            Policy::LargestFlash => "largest_flash",
            Policy::ClosestFlash => "closest_flash",
            Policy::LargestFlashEarliestHit => "largest_flash_earliest_hit",
            Policy::ClosestFlashEarliestHit => "closest_flash_earliest_hit",
        }
    }

    fn ranking(self) -> Ranking {
        match self {
            Policy::LargestHit | Policy::LargestFlash | Policy::LargestFlashEarliestHit => {
                Ranking::Largest
            }
            Policy::ClosestHit | Policy::ClosestFlash | Policy::ClosestFlashEarliestHit => {
                Ranking::Closest
            }
        }
    }
    /// Flash time base used by the policy. `None` if the policy matches light
    /// hits directly.
    pub fn time_base(self) -> Option<TimeBase> {
        match self {
            Policy::LargestHit | Policy::ClosestHit => None,
            Policy::LargestFlash | Policy::ClosestFlash | Policy::ClosestFlashEarliestHit => {
                Some(TimeBase::Relative)
            }
            Policy::LargestFlashEarliestHit => Some(TimeBase::Absolute),
        }
    }
    /// Returns `true` if the light time is taken from the earliest hit of the
    /// selected flash.
    pub fn uses_earliest_hit(self) -> bool {
        matches!(
            self,
            Policy::LargestFlashEarliestHit | Policy::ClosestFlashEarliestHit
        )
    }

    /// Find the light signal matched to `hit`. Returns `None` if there are no
    /// coincident candidates.
    ///
    /// Candidates are scanned in event order and ties are resolved in favour
    /// of the first one seen.
    pub fn find(self, config: &Config, event: &Event, hit: &TriggerHit) -> Option<MatchCandidate> {
        match self.time_base() {
            None => self.find_light_hit(config, event, hit),
            Some(base) => self.find_flash(base, config, event, hit),
        }
    }

    fn find_light_hit(
        self,
        config: &Config,
        event: &Event,
        hit: &TriggerHit,
    ) -> Option<MatchCandidate> {
        let mut best = Best::new(self.ranking());
        for (id, light_hit) in event.light_hits.iter().enumerate() {
            if !accepts_light_hit(config, light_hit) {
                continue;
            }
            let time = light_hit.time_ns(config.optical_delay);
            if is_coincident(hit.time, time, config.coincidence_window) {
                best.offer(light_hit.pe, (hit.time - time).abs(), (id, time));
            }
        }

        best.into_inner().map(|(id, light_time)| MatchCandidate {
            light_time,
            light_hit: Some(id),
            flash: None,
        })
    }

    fn find_flash(
        self,
        base: TimeBase,
        config: &Config,
        event: &Event,
        hit: &TriggerHit,
    ) -> Option<MatchCandidate> {
        let mut best = Best::new(self.ranking());
        for (id, flash) in event.all_flashes() {
            if !accepts_flash(config, flash) {
                continue;
            }
            let time = flash.time_ns(base, config.optical_delay);
            if is_coincident(hit.time, time, config.coincidence_window) {
                best.offer(flash.total_pe, (hit.time - time).abs(), (id, flash, time));
            }
        }
        let (id, flash, flash_time) = best.into_inner()?;

        if !self.uses_earliest_hit() {
            return Some(MatchCandidate {
                light_time: flash_time,
                light_hit: None,
                flash: Some(id),
            });
        }
        let candidate = match earliest_hit(config, event, flash) {
            Some((hit_id, light_time)) => MatchCandidate {
                light_time,
                light_hit: Some(hit_id),
                flash: Some(id),
            },
            None => MatchCandidate {
                light_time: flash_time,
                light_hit: None,
                flash: Some(id),
            },
        };
        Some(candidate)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// Associated hits are not subject to the light hit threshold nor to the
// coincidence window.
fn earliest_hit(config: &Config, event: &Event, flash: &LightFlash) -> Option<(usize, f64)> {
    let mut min_time = f64::MAX;
    let mut earliest = None;
    for (id, hit) in event.flash_hits(flash) {
        let time = hit.time_ns(config.optical_delay);
        if time < min_time {
            min_time = time;
            earliest = Some((id, time));
        }
    }

    earliest
}

#[derive(Clone, Copy, Debug)]
enum Ranking {
    Largest,
    Closest,
}

// Running best of a linear scan. Only a strictly better score replaces the
// current best.
struct Best<C> {
    ranking: Ranking,
    score: f64,
    item: Option<C>,
}

impl<C> Best<C> {
    fn new(ranking: Ranking) -> Self {
        let score = match ranking {
            // Candidates with a non-positive amplitude are never selected.
            Ranking::Largest => 0.0,
            Ranking::Closest => f64::MAX,
        };
        Self {
            ranking,
            score,
            item: None,
        }
    }

    fn offer(&mut self, amplitude: f64, delta_t: f64, item: C) {
        let (score, is_better) = match self.ranking {
            Ranking::Largest => (amplitude, amplitude > self.score),
            Ranking::Closest => (delta_t, delta_t < self.score),
        };
        if is_better {
            self.score = score;
            self.item = Some(item);
        }
    }

    fn into_inner(self) -> Option<C> {
        self.item
    }
}

/// Light signal matched to a trigger hit by a [`Policy`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchCandidate {
    /// Light time in nanoseconds, already corrected by the optical delay.
    pub light_time: f64,
    /// Index of the matched light hit (or earliest hit of the matched flash).
    pub light_hit: Option<usize>,
    pub flash: Option<FlashId>,
}

/// Set of enabled [`Policy`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PolicySet {
    inner: [bool; 6],
}

impl PolicySet {
    /// Creates a new empty set.
    pub fn new() -> Self {
        Self::default()
    }
    /// Adds a policy to the set. Returns whether the policy was newly
    /// inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use tof::policy::{Policy, PolicySet};
    ///
    /// let mut set = PolicySet::new();
    ///
    /// assert_eq!(set.insert(Policy::ClosestHit), true);
    /// assert_eq!(set.insert(Policy::ClosestHit), false);
    /// ```
    pub fn insert(&mut self, policy: Policy) -> bool {
        let was_inserted = !self.inner[policy.index()];
        self.inner[policy.index()] = true;

        was_inserted
    }
    /// Removes a policy from the set. Returns whether the policy was present.
    pub fn remove(&mut self, policy: Policy) -> bool {
        let was_present = self.inner[policy.index()];
        self.inner[policy.index()] = false;

        was_present
    }
    pub fn contains(&self, policy: Policy) -> bool {
        self.inner[policy.index()]
    }
    pub fn is_empty(&self) -> bool {
        !self.inner.contains(&true)
    }
    /// Iterate over the enabled policies in run order.
    ///
    /// # Examples
    ///
    /// ```
    /// use tof::policy::{Policy, PolicySet};
    ///
    /// let set = PolicySet::from([Policy::ClosestFlash, Policy::LargestHit]);
    /// assert_eq!(
    ///     set.iter().collect::<Vec<_>>(),
    ///     vec![Policy::LargestHit, Policy::ClosestFlash]
    /// );
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = Policy> + '_ {
        Policy::ALL.into_iter().filter(|p| self.contains(*p))
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Policy>,
    {
        let mut set = Self::new();
        for policy in iter {
            set.insert(policy);
        }

        set
    }
}

impl<const N: usize> From<[Policy; N]> for PolicySet {
    fn from(arr: [Policy; N]) -> Self {
        Self::from_iter(arr)
    }
}
