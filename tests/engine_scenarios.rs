//! End-to-end capture scenarios driven through the public API: synthetic
//! PCM in, events and takes out, no audio device required.

use crossbeam_channel::{unbounded, Receiver};
use std::sync::Arc;
use voicegate::engine::{feed_pcm, RecorderEngine};
use voicegate::hub::{EventHub, HostEvent, HostEventKind};
use voicegate::{CancelReason, EngineConfig, EngineEvent, SaturatePolicy};

const RATE: u32 = 16_000;
const BLOCK: usize = 128;

fn engine(config: EngineConfig) -> (RecorderEngine, Receiver<EngineEvent>) {
    let (tx, rx) = unbounded();
    (RecorderEngine::new(config, tx), rx)
}

fn base_config() -> EngineConfig {
    EngineConfig {
        sample_rate: RATE,
        min_duration: 0.0,
        ..EngineConfig::default()
    }
}

fn seconds(n: f32) -> usize {
    (n * RATE as f32).round() as usize
}

fn tone(len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| (i as f32 * 0.05).sin() * amplitude)
        .collect()
}

fn terminal(events: &Receiver<EngineEvent>) -> EngineEvent {
    events
        .try_iter()
        .find(|e| matches!(e, EngineEvent::Stopped { .. } | EngineEvent::Canceled { .. }))
        .expect("no terminal event emitted")
}

#[test]
fn manual_take_is_delivered_verbatim() {
    let (mut engine, rx) = engine(base_config());
    engine.start();
    let speech = tone(seconds(0.5), 0.6);
    feed_pcm(&mut engine, &speech, BLOCK);
    engine.stop();

    match terminal(&rx) {
        EngineEvent::Stopped { take } => {
            assert_eq!(take.samples(), speech.as_slice());
            assert_eq!(take.duration(), take.len() as f32 / RATE as f32);
        }
        other => panic!("expected stopped, got {other:?}"),
    }
}

#[test]
fn silence_is_kept_when_auto_stop_is_off() {
    // Default gates: min_duration 0.15s, auto_stop disabled. A second of
    // pure silence is still a valid take.
    let config = EngineConfig {
        sample_rate: RATE,
        ..EngineConfig::default()
    };
    let (mut engine, rx) = engine(config);
    engine.start();
    feed_pcm(&mut engine, &vec![0.0f32; seconds(1.0)], BLOCK);
    engine.stop();

    match terminal(&rx) {
        EngineEvent::Stopped { take } => assert_eq!(take.len(), seconds(1.0)),
        other => panic!("expected stopped, got {other:?}"),
    }
}

#[test]
fn armed_take_waits_for_speech_and_keeps_the_preroll_margin() {
    let config = EngineConfig {
        auto_start: true,
        margin_before: 0.1,
        ..base_config()
    };
    let (mut engine, rx) = engine(config);
    engine.start();

    // A full second of room tone, then speech. Only the trailing 0.1s of
    // the room tone survives in front of the first speech block.
    feed_pcm(&mut engine, &vec![0.005f32; seconds(1.0)], BLOCK);
    let speech = tone(seconds(0.4), 0.6);
    feed_pcm(&mut engine, &speech, BLOCK);
    engine.stop();

    match terminal(&rx) {
        EngineEvent::Stopped { take } => {
            // Rolling margin trims in whole pre-roll steps, so the retained
            // pre-roll is at most the margin plus one block.
            let preroll = take.len() - speech.len();
            assert!(preroll >= seconds(0.1) - BLOCK && preroll <= seconds(0.1) + BLOCK);
            // Speech itself is intact from its first sample.
            assert_eq!(&take.samples()[preroll..], speech.as_slice());
        }
        other => panic!("expected stopped, got {other:?}"),
    }
}

#[test]
fn silence_after_speech_ends_the_take_and_trims_the_tail() {
    let config = EngineConfig {
        auto_stop: true,
        stop_duration: 0.2,
        margin_after: 0.05,
        ..base_config()
    };
    let (mut engine, rx) = engine(config);
    engine.start();

    let speech_len = seconds(0.5);
    feed_pcm(&mut engine, &tone(speech_len, 0.6), BLOCK);
    feed_pcm(&mut engine, &vec![0.0f32; seconds(1.0)], BLOCK);

    match terminal(&rx) {
        EngineEvent::Stopped { take } => {
            // Silence accumulates in whole blocks, so the detected run can
            // overshoot stop_duration by up to one block before the trim.
            let kept_tail = take.len() - speech_len;
            assert!(kept_tail >= seconds(0.05));
            assert!(kept_tail <= seconds(0.05) + BLOCK);
        }
        other => panic!("expected stopped, got {other:?}"),
    }
}

#[test]
fn clipped_take_is_rejected_under_cancel_policy() {
    let config = EngineConfig {
        on_saturate: SaturatePolicy::Cancel,
        ..base_config()
    };
    let (mut engine, rx) = engine(config);
    engine.start();
    feed_pcm(&mut engine, &tone(seconds(0.2), 0.6), BLOCK);
    feed_pcm(&mut engine, &[1.0f32; BLOCK], BLOCK);

    match terminal(&rx) {
        EngineEvent::Canceled { reason } => assert_eq!(reason, CancelReason::Saturated),
        other => panic!("expected canceled, got {other:?}"),
    }
}

#[test]
fn blip_shorter_than_min_duration_is_rejected() {
    let config = EngineConfig {
        min_duration: 0.5,
        ..base_config()
    };
    let (mut engine, rx) = engine(config);
    engine.start();
    feed_pcm(&mut engine, &tone(seconds(0.1), 0.6), BLOCK);
    engine.stop();

    match terminal(&rx) {
        EngineEvent::Canceled { reason } => assert_eq!(reason, CancelReason::TooShort),
        other => panic!("expected canceled, got {other:?}"),
    }
}

#[test]
fn pause_and_resume_splice_the_take_together() {
    let (mut engine, rx) = engine(base_config());
    engine.start();
    let first = tone(seconds(0.2), 0.5);
    feed_pcm(&mut engine, &first, BLOCK);
    engine.pause();
    // Audio during the pause never reaches the take.
    feed_pcm(&mut engine, &[0.9f32; BLOCK], BLOCK);
    engine.start();
    let second = tone(seconds(0.2), 0.5);
    feed_pcm(&mut engine, &second, BLOCK);
    engine.stop();

    match terminal(&rx) {
        EngineEvent::Stopped { take } => {
            assert_eq!(take.len(), first.len() + second.len());
            assert_eq!(&take.samples()[..first.len()], first.as_slice());
            assert_eq!(&take.samples()[first.len()..], second.as_slice());
        }
        other => panic!("expected stopped, got {other:?}"),
    }
}

#[test]
fn delivered_take_survives_wav_round_trip() {
    let (mut engine, rx) = engine(base_config());
    engine.start();
    feed_pcm(&mut engine, &tone(seconds(0.25), 0.7), BLOCK);
    engine.stop();

    let take = match terminal(&rx) {
        EngineEvent::Stopped { take } => take,
        other => panic!("expected stopped, got {other:?}"),
    };
    let bytes = take.to_wav().expect("wav encoding");

    let mut reader = hound::WavReader::new(bytes.as_slice()).expect("wav decoding");
    assert_eq!(reader.spec().sample_rate, RATE);
    assert_eq!(reader.spec().channels, 1);
    let decoded: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| s.unwrap() as f32 / 32_767.0)
        .collect();
    assert_eq!(decoded.len(), take.len());
    // Two quantization steps of slack: rounding plus the off-by-one nudge
    // applied to sniffable sample values.
    for (original, decoded) in take.samples().iter().zip(&decoded) {
        assert!((original - decoded).abs() <= 2.0 / 32_767.0 + f32::EPSILON);
    }
}

#[test]
fn worker_session_delivers_takes_through_the_hub() {
    let worker = voicegate::worker::spawn(base_config());

    let mut hub = EventHub::new();
    let (delivered_tx, delivered_rx) = unbounded();
    hub.on(HostEventKind::Stopped, move |event| {
        if let HostEvent::Engine(EngineEvent::Stopped { take }) = event {
            let _ = delivered_tx.send(take.clone());
        }
    });
    hub.fire(HostEvent::Ready { sample_rate: RATE });

    worker.handle.start();
    for chunk in tone(seconds(0.3), 0.5).chunks(BLOCK) {
        assert!(worker.handle.push_block(Arc::from(chunk)));
    }

    // Commands drain before queued blocks, so stop only once the engine
    // reports the full 0.3s as recorded.
    let deadline = std::time::Duration::from_secs(2);
    let mut stopped = false;
    loop {
        let event = worker.events.recv_timeout(deadline).expect("engine event");
        if let EngineEvent::Recording { duration, .. } = &event {
            if !stopped && *duration >= 0.3 - 1e-6 {
                worker.handle.stop();
                stopped = true;
            }
        }
        let terminal = matches!(event, EngineEvent::Stopped { .. });
        hub.fire(HostEvent::Engine(event));
        if terminal {
            break;
        }
    }

    let take = delivered_rx.try_recv().expect("hub delivered the take");
    assert_eq!(take.len(), seconds(0.3));

    // A late subscriber still learns the session rate.
    let (ready_tx, ready_rx) = unbounded();
    hub.on(HostEventKind::Ready, move |event| {
        if let HostEvent::Ready { sample_rate } = event {
            let _ = ready_tx.send(*sample_rate);
        }
    });
    assert_eq!(ready_rx.try_recv(), Ok(RATE));

    worker.shutdown();
}
