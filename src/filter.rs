//! Cuts applied to the detector signals before they are considered for a
//! match.
//!
//! Amplitude cuts reject signals below the threshold, so NaN amplitudes pass.
#![allow(clippy::neg_cmp_op_on_partial_ord)]
use crate::config::Config;
use crate::event::{LightFlash, LightHit, TriggerHit};

/// Returns `true` if the trigger hit is inside the (inclusive) beam window
/// and above the charge threshold.
pub fn accepts_trigger_hit(config: &Config, hit: &TriggerHit) -> bool {
    let in_beam = hit.time >= config.beam_window_low && hit.time <= config.beam_window_high;
    in_beam && !(hit.pe < config.trigger_hit_threshold)
}

/// Returns `true` if the light hit is not below the hit PE threshold.
pub fn accepts_light_hit(config: &Config, hit: &LightHit) -> bool {
    !(hit.pe < config.hit_pe_threshold)
}

/// Returns `true` if the flash is not below the flash PE threshold.
pub fn accepts_flash(config: &Config, flash: &LightFlash) -> bool {
    !(flash.total_pe < config.flash_pe_threshold)
}
