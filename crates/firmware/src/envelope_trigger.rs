//! Tasks related to the [envelope trigger](`EnvelopeTrigger`) feature.

use crate::{BridgeMutex, TriggerReceiver};
use cv_bridge_lib::configuration::{CycleConfig, EnvelopeTrigger, TRIGGER_PULSE_WIDTH};
use defmt::error;
use embassy_futures::select::{Either, select};
use embassy_stm32::{exti::ExtiInput, gpio::Output};
use embassy_time::{Instant, Timer};

/// Provisional input and status indicator for the envelope trigger setting.
///
/// Presently this has two states: break end (no LED) and note change (solid LED). Each button press advances to the
/// next state and applies it to every channel.
#[embassy_executor::task]
pub async fn select_envelope_trigger(
    mut button: ExtiInput<'static>,
    mut led: Output<'static>,
    bridge: &'static BridgeMutex,
) -> ! {
    let mut envelope_trigger = EnvelopeTrigger::default();
    loop {
        button.wait_for_rising_edge().await;

        envelope_trigger = envelope_trigger.cycle();
        bridge.lock().await.set_envelope_trigger(envelope_trigger);

        match envelope_trigger {
            EnvelopeTrigger::BreakEnd => {
                led.set_low();
            }
            EnvelopeTrigger::NoteChange => {
                led.set_high();
            }
        }
    }
}

/// Ends each trigger pulse once it has lasted [`TRIGGER_PULSE_WIDTH`].
///
/// Receives the ordinal of every channel whose trigger fired. A channel firing again before its pulse ends has its
/// pulse extended.
#[embassy_executor::task]
pub async fn release_triggers(
    bridge: &'static BridgeMutex,
    fired: TriggerReceiver<'static>,
) -> ! {
    let mut deadlines: [Option<Instant>; crate::NUM_CHANNELS] = [None; crate::NUM_CHANNELS];
    loop {
        let next = deadlines.iter().flatten().min().copied();
        let event = match next {
            Some(deadline) => select(fired.receive(), Timer::at(deadline)).await,
            None => Either::First(fired.receive().await),
        };

        match event {
            Either::First(ordinal) => {
                if let Some(deadline) = deadlines.get_mut(ordinal) {
                    *deadline = Some(Instant::now() + TRIGGER_PULSE_WIDTH);
                }
            }
            Either::Second(()) => {
                let now = Instant::now();
                let mut bridge = bridge.lock().await;
                for (ordinal, deadline) in deadlines.iter_mut().enumerate() {
                    if deadline.is_some_and(|expiry| expiry <= now) {
                        *deadline = None;
                        if let Err(err) = bridge.release_trigger(ordinal) {
                            error!("{}", err);
                        }
                    }
                }
            }
        }
    }
}
