//! CV Bridge is [Embassy](https://embassy.dev)-based firmware which turns USB MIDI notes into
//! [CV/gate](https://en.wikipedia.org/wiki/CV/gate) signals for analog synthesizers. The firmware runs on the
//! [Nucleo-F767ZI development board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by
//! an F7-series STM32 microcontroller.
//!
//! Each analog channel drives a gate, a trigger and a pitch control voltage. The board has a two-channel DAC, hence two
//! analog channels. Notes on MIDI channel 1 play analog channel 0 and notes on MIDI channel 2 play analog channel 1.
//!
//! For details about the hardware or how to use the device, see the `README`.

#![no_std]
#![no_main]

mod envelope_trigger;
mod io;

use crate::io::{DacOutput, SurfaceLog};
use cv_bridge_lib::{
    channel::{AnalogChannel, ChannelConfig, ChannelSettings},
    configuration::{RoutingTable, ZeroVelocity},
    dispatcher::{Dispatcher, Operation, UsbMidiHandler},
    usb_midi,
};
use defmt::{panic, *};
use embassy_executor::Spawner;
use embassy_stm32::{
    Config, bind_interrupts,
    dac::Dac,
    exti::ExtiInput,
    gpio::{Level, Output, Pull, Speed},
    peripherals,
    time::Hertz,
    usb,
};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
    mutex,
};
use embassy_usb::{Builder, UsbDevice, class::midi::MidiClass, driver::EndpointError};
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
    }
);

/// Number of analog channels, one per DAC output.
pub const NUM_CHANNELS: usize = 2;

type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

/// The dispatcher together with every analog channel it drives.
pub type Bridge = Dispatcher<Output<'static>, Output<'static>, DacOutput, SurfaceLog, NUM_CHANNELS>;
/// Gives the MIDI and trigger tasks exclusive access to the [`Bridge`] in turn.
pub type BridgeMutex = mutex::Mutex<CriticalSectionRawMutex, Bridge>;

const TRIGGER_QUEUE_LEN: usize = 8;
type TriggerSender<'a> = Sender<'a, CriticalSectionRawMutex, usize, TRIGGER_QUEUE_LEN>;
type TriggerReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, usize, TRIGGER_QUEUE_LEN>;

/// Carries the ordinals of channels whose trigger fired, so that their pulses can be ended on time.
static TRIGGERS: Channel<CriticalSectionRawMutex, usize, TRIGGER_QUEUE_LEN> = Channel::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing CV Bridge");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410: most peripheral clocks are derived from their bus clock, but the 48MHz clock used for USB OTG FS
            // is derived from main PLL VCO (PLLQ clock) or PLLSAI VCO (PLLSAI clock)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    // per RM0410 (the reference manual for the chip), DAC channel 1 outputs on port A, pin 4, and channel 2 on pin 5
    let (dac_ch1, dac_ch2) = Dac::new(p.DAC1, p.DMA1_CH5, p.DMA1_CH6, p.PA4, p.PA5).split();

    // Bring up every channel before anything can reach them; a channel that fails to come up leaves its hardware in
    // an undefined state, so there's no point carrying on without it.
    let settings = ChannelSettings::default();
    let channels = [
        unwrap!(AnalogChannel::init(
            0,
            ChannelConfig {
                gate: Output::new(p.PG0, Level::Low, Speed::Low),
                trigger: Output::new(p.PG1, Level::Low, Speed::Low),
                dac: DacOutput::Ch1(dac_ch1),
            },
            settings,
        )),
        unwrap!(AnalogChannel::init(
            1,
            ChannelConfig {
                gate: Output::new(p.PG2, Level::Low, Speed::Low),
                trigger: Output::new(p.PG3, Level::Low, Speed::Low),
                dac: DacOutput::Ch2(dac_ch2),
            },
            settings,
        )),
    ];

    static BRIDGE: StaticCell<BridgeMutex> = StaticCell::new();
    let bridge = BRIDGE.init(mutex::Mutex::new(
        Dispatcher::new(channels, SurfaceLog::default())
            .with_routing(RoutingTable::per_midi_channel(NUM_CHANNELS as u8))
            // keyboards using running status release notes with a zero-velocity NoteOn
            .with_zero_velocity(ZeroVelocity::NoteOff),
    ));

    let button = ExtiInput::new(p.PC13, p.EXTI13, Pull::None);
    let blue_led = Output::new(p.PB7, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(envelope_trigger::select_envelope_trigger(
        button, blue_led, bridge
    )));

    unwrap!(spawner.spawn(envelope_trigger::release_triggers(
        bridge,
        TRIGGERS.receiver()
    )));

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    // See docs on `vbus_detection` for details.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, 0x1209/0x0001 is a test ID reserved for development use
    let vendor_id = 0x1209;
    let product_id = 0x0001;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Pawpaw Works");
    config.product = Some("CV Bridge");
    config.self_powered = true;
    config.max_power = 0;

    // Create embassy-usb DeviceBuilder using the driver and config.
    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    // Create classes on the builder.
    let class = MidiClass::new(&mut builder, 0, 1, 64);

    // Build the builder.
    let usb = builder.build();

    unwrap!(spawner.spawn(usb_task(usb)));
    unwrap!(spawner.spawn(midi_task(class, bridge, TRIGGERS.sender())));
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

#[embassy_executor::task]
async fn midi_task(
    mut class: MidiClass<'static, UsbDriver>,
    bridge: &'static BridgeMutex,
    triggers: TriggerSender<'static>,
) -> ! {
    loop {
        class.wait_connection().await;
        info!("USB connected");
        let _ = process_midi(&mut class, bridge, &triggers).await;
        info!("USB disconnected");
    }
}

#[doc(hidden)]
struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Helper function which interprets data received over USB.
///
/// Extracts MIDI from bytes, hands each message to the bridge, and schedules the end of any trigger pulse it starts.
async fn process_midi<'d, T: usb::Instance + 'd>(
    class: &mut MidiClass<'d, usb::Driver<'d, T>>,
    bridge: &'static BridgeMutex,
    triggers: &TriggerSender<'static>,
) -> Result<(), Disconnected> {
    let mut buf = [0; 64];
    loop {
        let n = class.read_packet(&mut buf).await?;
        let mut bridge = bridge.lock().await;
        for msg in usb_midi::messages(&buf[..n]) {
            let fired = match bridge.on_message(&msg) {
                Ok(dispatch) => dispatch
                    .channel
                    .filter(|_| dispatch.operation.contains(Operation::Trigger)),
                Err(err) => {
                    error!("{}", err);
                    // the channel still completes the message, so a pulse may have started regardless
                    let ordinal = usize::from(err.channel);
                    bridge
                        .channel(ordinal)
                        .filter(|channel| channel.trigger_is_high())
                        .map(|_| ordinal)
                }
            };

            if let Some(ordinal) = fired {
                schedule_release(triggers, ordinal);
            }
        }
    }
}

fn schedule_release(triggers: &TriggerSender<'static>, ordinal: usize) {
    if triggers.try_send(ordinal).is_err() {
        warn!(
            "Trigger queue full; pulse on channel {} will last until the gate closes",
            ordinal
        );
    }
}
