/// This is a general example of how you would typically run the time-of-flight
/// matching on a sequence of events. Events are simulated: cosmic ray tagger
/// hits arrive as a Poisson process during the beam spill, and most of them
/// produce light in the photon detectors a fixed delay later.
use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};
use serde_json::json;
use tof::event::{Event, LightFlash, LightHit, TriggerHit, TriggerTrack};
use tof::{Config, Matcher};
use uom::si::f64::{Frequency, Time};
use uom::si::{
    frequency::megahertz,
    time::{microsecond, nanosecond},
};

const TAGGERS: [&str; 4] = [
    "volTaggerTopHigh_0",
    "volTaggerTopLow_0",
    "volTaggerSideRight_0",
    "volTaggerSideLeft_0",
];

struct Parameters {
    spill: Time,
    trigger_rate: Frequency,
    light_noise_rate: Frequency,
    light_delay: Time,
    light_jitter: Time,
    // Probability that a trigger hit produces light.
    light_probability: f64,
    // Probability that a trigger hit is part of a two-hit track.
    track_probability: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    // ===========================================
    // These are most likely your free parameters:
    let n_events = 20;
    let parameters = Parameters {
        spill: Time::new::<microsecond>(1.6),
        trigger_rate: Frequency::new::<megahertz>(5.0),
        light_noise_rate: Frequency::new::<megahertz>(20.0),
        light_delay: Time::new::<nanosecond>(40.0),
        light_jitter: Time::new::<nanosecond>(2.0),
        light_probability: 0.8,
        track_probability: 0.3,
    };
    // ===========================================

    // ===========================================
    // Then, this is your matching configuration:
    let config = format!(
        "coincidence_window: 50
optical_delay: {delay}
trigger_hit_threshold: 100
hit_pe_threshold: 5
flash_pe_threshold: 20
beam_window_low: 0
beam_window_high: {spill}
largest_hit: true
closest_hit: true
largest_flash: true
closest_flash: true
largest_flash_earliest_hit: true
closest_flash_earliest_hit: true",
        delay = parameters.light_delay.get::<nanosecond>(),
        spill = parameters.spill.get::<nanosecond>(),
    );
    let config: Config = config.parse().context("invalid matching configuration")?;
    // ===========================================

    log::info!("Simulating {n_events} events");
    let mut matcher = Matcher::builder().config(config).observer(()).build();
    let mut rng = rand::rng();
    let mut total = 0;
    for event_id in 0..n_events {
        let event = simulate_event(&parameters, &mut rng)?;

        for record in matcher.produce(&event) {
            total += 1;
            let line = json!({
                "event": event_id,
                "policy": record.policy.to_string(),
                "tof": record.tof,
                "frm_hit": record.frm_hit,
                "frm_trk": record.frm_trk,
                "crt_time": record.crt_time,
                "pmt_time": record.pmt_time,
                "crt_tagger": record.crt_tagger,
                "crt_hit_id": record.crt_hit_id,
                "crt_trk_id": record.crt_trk_id,
                "pmt_hit_id": record.pmt_hit_id,
                "pmt_flash_id": record.pmt_flash_id,
                "flash_tpc_id": record.flash_tpc_id.map(|r| r.index()),
            });
            println!("{line}");
        }
    }
    log::info!("Produced {total} time-of-flight records");

    Ok(())
}

// Arrival times (in ns) of a Poisson process of the given rate, restricted to
// the spill.
fn arrival_times<R: Rng>(rate: Frequency, spill: Time, rng: &mut R) -> Result<Vec<f64>> {
    let gap = Exp::new(rate.get::<megahertz>() / 1e3).context("invalid arrival rate")?;
    let spill = spill.get::<nanosecond>();

    let mut times = Vec::new();
    let mut time = gap.sample(rng);
    while time < spill {
        times.push(time);
        time += gap.sample(rng);
    }
    Ok(times)
}

fn simulate_event<R: Rng>(parameters: &Parameters, rng: &mut R) -> Result<Event> {
    let trigger_times = arrival_times(parameters.trigger_rate, parameters.spill, rng)?;
    let noise_times = arrival_times(parameters.light_noise_rate, parameters.spill, rng)?;

    let trigger_pe = Normal::new(300.0, 80.0).context("invalid trigger PE distribution")?;
    let signal_pe = Exp::new(1.0 / 60.0).context("invalid signal PE distribution")?;
    let noise_pe = Exp::new(1.0 / 3.0).context("invalid noise PE distribution")?;
    let jitter = Normal::new(0.0, parameters.light_jitter.get::<nanosecond>())
        .context("invalid jitter distribution")?;
    let delay = parameters.light_delay.get::<nanosecond>();

    let mut event = Event::default();
    for time in trigger_times {
        let hit = TriggerHit::builder()
            .time(time)
            .pe(trigger_pe.sample(rng))
            .plane(rng.random_range(0..4))
            .position([
                rng.random_range(-400.0..400.0),
                rng.random_range(-400.0..400.0),
                rng.random_range(-200.0..700.0),
            ])
            .position_err([2.5, 2.5, 2.5])
            .tagger(TAGGERS[rng.random_range(0..TAGGERS.len())])
            .build();
        if rng.random_bool(parameters.track_probability) {
            let mut second = hit.clone();
            second.time += rng.random_range(1.0..10.0);
            second.tagger = TAGGERS[rng.random_range(0..TAGGERS.len())].to_string();
            event
                .trigger_tracks
                .push(TriggerTrack::new(vec![hit.clone(), second.clone()]));
            event.trigger_hits.push(second);
        }
        event.trigger_hits.push(hit);

        if rng.random_bool(parameters.light_probability) {
            let light_time = time + delay + jitter.sample(rng);
            let mut hits = Vec::new();
            let mut total_pe = 0.0;
            for _ in 0..rng.random_range(1..6) {
                let pe = signal_pe.sample(rng);
                total_pe += pe;
                hits.push(event.light_hits.len());
                event.light_hits.push(LightHit {
                    peak_time: (light_time + rng.random_range(0.0..8.0)) / 1e3,
                    pe,
                });
            }
            let flash = LightFlash::builder()
                .time(light_time / 1e3)
                .total_pe(total_pe)
                .hits(hits)
                .build();
            event.flashes[rng.random_range(0..2)].push(flash);
        }
    }
    for time in noise_times {
        event.light_hits.push(LightHit {
            peak_time: time / 1e3,
            pe: noise_pe.sample(rng),
        });
    }

    Ok(event)
}
