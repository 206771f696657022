//#![deny(warnings)]
#![no_main]
#![no_std]

#[rtic::app(device = stm32f1xx_hal::pac, peripherals = true, dispatchers = [PVD, WWDG])]
mod app {
    use core::fmt::Write;
    use dwt_systick_monotonic::{DwtSystick, ExtU32};
    use embedded_graphics::{
        mono_font::{MonoFont, MonoTextStyleBuilder},
        pixelcolor::BinaryColor,
        prelude::*,
        text::{Baseline, Text},
    };
    use embedded_hal::timer::CountDown;
    use embedded_sdmmc::{
        Controller, Directory, File, Mode as FileMode, SdMmcSpi, TimeSource, Timestamp, Volume,
        VolumeIdx,
    };
    use heapless::{String, Vec};
    use profont::{PROFONT_18_POINT, PROFONT_24_POINT, PROFONT_9_POINT};
    use rtic::Monotonic;
    use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};
    use stm32f103_cuckoo_clock::{
        button::{Button, ButtonEvent, Gesture, GestureDetector, DEBOUNCE_MS, LONG_PRESS_MS},
        display::{clock_text, seconds_text, setting_text, temperature_text, Field, Surface},
        playback::{ClipError, DecodeError},
        rtc::Rtc,
        wav::{ClipSource, SampleSink, WavPlayer},
        sample::Uptime,
        ClockConfig, ClockContext, Command, Instant, Temperature, TimeSample,
    };
    use stm32f1xx_hal::gpio::{
        gpioa::{PA0, PA1, PA2, PA4, PA5, PA6, PA7},
        gpiob::{PB10, PB11, PB6, PB7},
        gpioc::PC13,
        Alternate, Edge, ExtiPin, Floating, Input, OpenDrain, Output, Pin, PullUp, PushPull, CRL,
    };
    use stm32f1xx_hal::{
        i2c::{BlockingI2c, DutyCycle, Mode},
        pac::{EXTI, I2C1, I2C2, SPI1, TIM2, TIM3},
        prelude::*,
        pwm::{Channel, Pwm, C1},
        spi::{Spi, Spi1NoRemap},
        timer::{CountDownTimer, Tim2NoRemap, Timer},
    };

    type Display = Ssd1306<
        I2CInterface<BlockingI2c<I2C1, (PB6<Alternate<OpenDrain>>, PB7<Alternate<OpenDrain>>)>>,
        DisplaySize128x32,
        BufferedGraphicsMode<DisplaySize128x32>,
    >;

    type ClockRtc =
        Rtc<BlockingI2c<I2C2, (PB10<Alternate<OpenDrain>>, PB11<Alternate<OpenDrain>>)>>;

    type SdSpi = Spi<
        SPI1,
        Spi1NoRemap,
        (
            PA5<Alternate<PushPull>>,
            PA6<Input<Floating>>,
            PA7<Alternate<PushPull>>,
        ),
        u8,
    >;

    type Card = Controller<SdMmcSpi<SdSpi, PA4<Output<PushPull>>>, NoClock>;

    type AudioPwm = Pwm<TIM2, Tim2NoRemap, C1, PA0<Alternate<PushPull>>>;

    const FREQ: u32 = 72_000_000;
    const TICKS_PER_MS: u32 = FREQ / 1_000;
    #[monotonic(binds = SysTick, default = true)]
    type MyMono = DwtSystick<FREQ>;

    const CONFIG: ClockConfig = ClockConfig::DEFAULT;
    const TICK_MS: u32 = 200;
    const AUDIO_CARRIER_HZ: u32 = 72_000;
    const GESTURE_QUEUE: usize = 4;

    /// Clips are only read, file timestamps are never written.
    pub struct NoClock;

    impl TimeSource for NoClock {
        fn get_timestamp(&self) -> Timestamp {
            Timestamp {
                year_since_1970: 0,
                zero_indexed_month: 0,
                zero_indexed_day: 0,
                hours: 0,
                minutes: 0,
                seconds: 0,
            }
        }
    }

    /// Root directory of the SD card, `None` when the card did not mount.
    pub struct SdClips {
        card: Card,
        mount: Option<(Volume, Directory)>,
    }

    impl SdClips {
        fn new(mut card: Card) -> Self {
            let mount = Self::mount(&mut card);
            Self { card, mount }
        }

        fn mount(card: &mut Card) -> Option<(Volume, Directory)> {
            if let Err(e) = card.device().init() {
                defmt::error!("SD card init failed: {}", defmt::Debug2Format(&e));
                return None;
            }
            let volume = match card.get_volume(VolumeIdx(0)) {
                Ok(v) => v,
                Err(e) => {
                    defmt::error!("no FAT volume: {}", defmt::Debug2Format(&e));
                    return None;
                }
            };
            match card.open_root_dir(&volume) {
                Ok(root) => {
                    defmt::info!("SD card mounted");
                    Some((volume, root))
                }
                Err(e) => {
                    defmt::error!("no root directory: {}", defmt::Debug2Format(&e));
                    None
                }
            }
        }
    }

    impl ClipSource for SdClips {
        type File = File;

        fn open(&mut self, name: &str) -> Result<File, ClipError> {
            let (volume, root) = self.mount.as_mut().ok_or(ClipError::NotFound)?;
            self.card
                .open_file_in_dir(volume, root, name, FileMode::ReadOnly)
                .map_err(|e| match e {
                    embedded_sdmmc::Error::FileNotFound => ClipError::NotFound,
                    e => {
                        defmt::warn!("opening {=str} failed: {}", name, defmt::Debug2Format(&e));
                        ClipError::Decode(DecodeError::ReadFailed)
                    }
                })
        }

        fn read(&mut self, file: &mut File, buf: &mut [u8]) -> Result<usize, ClipError> {
            let (volume, _) = self.mount.as_ref().ok_or(ClipError::NotFound)?;
            self.card
                .read(volume, file, buf)
                .map_err(|_| ClipError::Decode(DecodeError::ReadFailed))
        }

        fn close(&mut self, file: File) {
            if let Some((volume, _)) = self.mount.as_ref() {
                self.card.close_file(volume, file).ok();
            }
        }
    }

    /// 8 bit samples as PWM duty, paced by a count-down timer.
    pub struct PwmSpeaker {
        pwm: AudioPwm,
        pacer: CountDownTimer<TIM3>,
        max_duty: u16,
    }

    impl SampleSink for PwmSpeaker {
        fn start(&mut self, sample_rate: u32) {
            self.pacer.start(sample_rate.hz());
            self.pwm.set_duty(Channel::C1, self.max_duty / 2);
            self.pwm.enable(Channel::C1);
        }

        fn write(&mut self, sample: u8) {
            nb::block!(self.pacer.wait()).ok();
            let duty = u32::from(sample) * u32::from(self.max_duty) / 255;
            self.pwm.set_duty(Channel::C1, duty as u16);
        }

        fn stop(&mut self) {
            self.pwm.disable(Channel::C1);
        }
    }

    pub struct Screen {
        display: Display,
    }

    fn draw_txt(d: &mut Display, font: &MonoFont, str: &str, at: Point) {
        let text_style = MonoTextStyleBuilder::new()
            .font(font)
            .text_color(BinaryColor::On)
            .build();

        Text::with_baseline(str, at, text_style, Baseline::Top)
            .draw(d)
            .ok();
    }

    impl Screen {
        fn flush(&mut self) {
            if self.display.flush().is_err() {
                defmt::warn!("display flush failed");
            }
        }
    }

    impl Surface for Screen {
        fn clock(&mut self, time: TimeSample, temperature: Option<Temperature>) {
            let d = &mut self.display;
            d.clear();
            draw_txt(d, &PROFONT_24_POINT, &clock_text(time), Point::new(0, 2));
            draw_txt(d, &PROFONT_9_POINT, &seconds_text(time), Point::new(86, 0));
            if let Some(t) = temperature {
                draw_txt(d, &PROFONT_9_POINT, &temperature_text(t), Point::new(86, 18));
            }
            self.flush();
        }

        fn setting(&mut self, field: Field, draft: TimeSample) {
            let d = &mut self.display;
            d.clear();
            draw_txt(d, &PROFONT_9_POINT, setting_text(field), Point::new(18, 0));
            let mut buf: String<8> = String::new();
            let (h, m) = (draft.hours, draft.minutes);
            match field {
                Field::Hours => write!(buf, "[{:02}]:{:02}", h, m),
                Field::Minutes => write!(buf, "{:02}:[{:02}]", h, m),
            }
            .ok();
            draw_txt(d, &PROFONT_18_POINT, buf.as_str(), Point::new(4, 12));
            self.flush();
        }

        fn message(&mut self, text: &str) {
            let d = &mut self.display;
            d.clear();
            draw_txt(d, &PROFONT_9_POINT, text, Point::new(0, 10));
            self.flush();
        }
    }

    #[shared]
    struct Shared {
        gestures: Vec<(Button, Gesture), GESTURE_QUEUE>,
        mode_pin: PA1<Input<PullUp>>,
        adjust_pin: PA2<Input<PullUp>>,
        exti: EXTI,
    }

    #[local]
    struct Local {
        led: PC13<Output<PushPull>>,
        screen: Screen,
        rtc: ClockRtc,
        player: WavPlayer<SdClips, PwmSpeaker>,
    }

    #[init]
    fn init(mut c: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::info!("Starting !!!");

        // workaround, see: https://github.com/knurling-rs/defmt/issues/322
        #[cfg(debug_assertions)]
        c.device.DBGMCU.cr.modify(|_, w| {
            w.dbg_sleep().set_bit();
            w.dbg_standby().set_bit();
            w.dbg_stop().set_bit()
        });
        #[cfg(debug_assertions)]
        c.device.RCC.ahbenr.modify(|_, w| w.dma1en().enabled());

        let mut flash = c.device.FLASH.constrain();
        let rcc = c.device.RCC.constrain();

        let clocks = rcc
            .cfgr
            .use_hse(8.mhz())
            .sysclk(FREQ.hz())
            .pclk1(36.mhz())
            .freeze(&mut flash.acr);
        let mut afio = c.device.AFIO.constrain();

        let mut gpioc = c.device.GPIOC.split();
        let mut led = gpioc.pc13.into_push_pull_output(&mut gpioc.crh);
        led.set_high();

        let mut gpioa = c.device.GPIOA.split();
        let mut gpiob = c.device.GPIOB.split();

        // Buttons
        let mut mode_pin = gpioa.pa1.into_pull_up_input(&mut gpioa.crl);
        mode_pin.make_interrupt_source(&mut afio);
        mode_pin.enable_interrupt(&mut c.device.EXTI);
        mode_pin.trigger_on_edge(&mut c.device.EXTI, Edge::Falling);

        let mut adjust_pin = gpioa.pa2.into_pull_up_input(&mut gpioa.crl);
        adjust_pin.make_interrupt_source(&mut afio);
        adjust_pin.enable_interrupt(&mut c.device.EXTI);
        adjust_pin.trigger_on_edge(&mut c.device.EXTI, Edge::Falling);

        // Set up I2C for the display.
        let scl = gpiob.pb6.into_alternate_open_drain(&mut gpiob.crl);
        let sda = gpiob.pb7.into_alternate_open_drain(&mut gpiob.crl);
        let i2c = BlockingI2c::i2c1(
            c.device.I2C1,
            (scl, sda),
            &mut afio.mapr,
            Mode::Fast {
                frequency: 400_000.hz(),
                duty_cycle: DutyCycle::Ratio2to1,
            },
            clocks,
            1000,
            10,
            1000,
            1000,
        );

        let interface = I2CDisplayInterface::new(i2c);
        let mut display = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        display.init().unwrap();
        display.set_brightness(Brightness::BRIGHTEST).unwrap();
        display.clear();
        display.flush().unwrap();

        // Set up I2C for the RTC.
        let scl = gpiob.pb10.into_alternate_open_drain(&mut gpiob.crh);
        let sda = gpiob.pb11.into_alternate_open_drain(&mut gpiob.crh);
        let i2c = BlockingI2c::i2c2(
            c.device.I2C2,
            (scl, sda),
            Mode::Standard {
                frequency: 100_000.hz(),
            },
            clocks,
            1000,
            10,
            1000,
            1000,
        );
        let mut rtc = Rtc::new(i2c);
        match rtc.lost_power() {
            Ok(false) => {}
            Ok(true) => defmt::warn!("RTC oscillator stopped, time needs setting"),
            Err(e) => defmt::error!("RTC not responding: {}", defmt::Debug2Format(&e)),
        }

        // SD card
        let sck = gpioa.pa5.into_alternate_push_pull(&mut gpioa.crl);
        let miso = gpioa.pa6;
        let mosi = gpioa.pa7.into_alternate_push_pull(&mut gpioa.crl);
        let mut cs = gpioa.pa4.into_push_pull_output(&mut gpioa.crl);
        cs.set_high();
        let spi = Spi::spi1(
            c.device.SPI1,
            (sck, miso, mosi),
            &mut afio.mapr,
            embedded_hal::spi::MODE_0,
            2.mhz(),
            clocks,
        );
        let clips = SdClips::new(Controller::new(SdMmcSpi::new(spi, cs), NoClock));

        // Audio
        let audio_pin = gpioa.pa0.into_alternate_push_pull(&mut gpioa.crl);
        let mut pwm = Timer::new(c.device.TIM2, &clocks).pwm::<Tim2NoRemap, _, _, _>(
            audio_pin,
            &mut afio.mapr,
            AUDIO_CARRIER_HZ.hz(),
        );
        pwm.disable(Channel::C1);
        let max_duty = pwm.get_max_duty();
        let pacer = Timer::new(c.device.TIM3, &clocks).start_count_down(8.khz());
        let player = WavPlayer::new(
            clips,
            PwmSpeaker {
                pwm,
                pacer,
                max_duty,
            },
        );

        let mut dcb = c.core.DCB;
        let dwt = c.core.DWT;
        let systick = c.core.SYST;
        let mono = DwtSystick::new(&mut dcb, dwt, systick, clocks.sysclk().0);

        control::spawn_after(500.millis()).unwrap();

        (
            Shared {
                gestures: Vec::new(),
                mode_pin,
                adjust_pin,
                exti: c.device.EXTI,
            },
            Local {
                led,
                screen: Screen { display },
                rtc,
                player,
            },
            init::Monotonics(mono),
        )
    }

    fn uptime_now(uptime: &mut Uptime) -> Instant {
        uptime.advance(monotonics::now().ticks(), TICKS_PER_MS)
    }

    #[task(shared = [gestures],
           local = [screen, rtc, player,
                    ctx: ClockContext = ClockContext::new(CONFIG),
                    temperature: Option<Temperature> = None,
                    uptime: Uptime = Uptime::new()],
           priority = 1)]
    fn control(cx: control::Context) {
        let control::LocalResources {
            screen,
            rtc,
            player,
            ctx,
            temperature,
            uptime,
        } = cx.local;
        let mut gestures = cx.shared.gestures;

        control::spawn_after(TICK_MS.millis()).unwrap();

        // keep the uptime accumulating even when the RTC is unreadable,
        // the tick counter wraps every minute
        uptime_now(uptime);

        let sample = match rtc.time() {
            Ok(t) => TimeSample::from(t),
            Err(e) => {
                defmt::warn!("RTC read failed: {}", defmt::Debug2Format(&e));
                return;
            }
        };

        let pending = gestures.lock(|g| {
            let p = g.clone();
            g.clear();
            p
        });
        for (button, gesture) in pending {
            defmt::debug!("{} {}", button, gesture);
            let now = uptime_now(uptime);
            match ctx.on_gesture(button, gesture, sample) {
                Command::None => {}
                Command::SetTime(t) => match t.to_time().map(|t| rtc.set_time(t)) {
                    Some(Ok(())) => defmt::info!("time set to {}", t),
                    Some(Err(e)) => defmt::error!("RTC write failed: {}", defmt::Debug2Format(&e)),
                    None => defmt::warn!("invalid time {}", t),
                },
                Command::Announce => {
                    ctx.announce_now(sample, now, player);
                }
            }
        }

        if sample.seconds == 30 || temperature.is_none() {
            match rtc.temperature() {
                Ok(t) => *temperature = Some(t),
                Err(e) => defmt::warn!("temperature read failed: {}", defmt::Debug2Format(&e)),
            }
        }

        let now = uptime_now(uptime);
        if let Some(report) = ctx.tick(sample, now, player) {
            defmt::info!("played {} clips, skipped {}", report.played, report.skipped);
        }

        if ctx.needs_redraw(sample) {
            let now = uptime_now(uptime);
            ctx.render(screen, sample, *temperature, now);
        }
    }

    #[task(binds = EXTI1, shared = [mode_pin, exti], local = [], priority = 2)]
    fn mode_isr(cx: mode_isr::Context) {
        let btn = cx.shared.mode_pin;
        let exti = cx.shared.exti;

        (btn, exti).lock(|btn, exti| {
            btn.disable_interrupt(exti);
            btn.clear_interrupt_pending_bit();
            btn_debouncer::spawn_after(DEBOUNCE_MS.millis(), Button::Mode).ok();
        });
    }

    #[task(binds = EXTI2, shared = [adjust_pin, exti], local = [], priority = 2)]
    fn adjust_isr(cx: adjust_isr::Context) {
        let btn = cx.shared.adjust_pin;
        let exti = cx.shared.exti;

        (btn, exti).lock(|btn, exti| {
            btn.disable_interrupt(exti);
            btn.clear_interrupt_pending_bit();
            btn_debouncer::spawn_after(DEBOUNCE_MS.millis(), Button::Adjust).ok();
        });
    }

    fn debounce<const N: u8>(
        btn: &mut Pin<Input<PullUp>, CRL, 'A', N>,
        exti: &mut EXTI,
        is_pressed: &mut bool,
    ) -> Option<ButtonEvent> {
        let ev = if *is_pressed {
            if btn.is_high() {
                btn.trigger_on_edge(exti, Edge::Falling);
                *is_pressed = false;
                Some(ButtonEvent::Released)
            } else {
                None
            }
        } else if btn.is_low() {
            btn.trigger_on_edge(exti, Edge::Rising);
            *is_pressed = true;
            Some(ButtonEvent::Pressed)
        } else {
            None
        };
        btn.enable_interrupt(exti);
        ev
    }

    #[task(local = [is_pressed: [bool; 2] = [false; 2]],
        shared = [mode_pin, adjust_pin, exti],
        priority = 2,
        capacity = 2)]
    fn btn_debouncer(cx: btn_debouncer::Context, button: Button) {
        let btn_debouncer::SharedResources {
            mut mode_pin,
            mut adjust_pin,
            mut exti,
        } = cx.shared;
        let is_pressed = &mut cx.local.is_pressed[button.index()];

        let ev = match button {
            Button::Mode => {
                (&mut mode_pin, &mut exti).lock(|btn, exti| debounce(btn, exti, is_pressed))
            }
            Button::Adjust => {
                (&mut adjust_pin, &mut exti).lock(|btn, exti| debounce(btn, exti, is_pressed))
            }
        };

        if let Some(ev) = ev {
            btn_detector::spawn(button, ev).ok();
        }
    }

    #[task(local = [detectors: [GestureDetector; 2] = [GestureDetector::new(); 2],
                    handles: [Option<btn_detector::SpawnHandle>; 2] = [None, None]],
        shared = [gestures],
        capacity = 4,
        priority = 2)]
    fn btn_detector(cx: btn_detector::Context, button: Button, ev: ButtonEvent) {
        let detector = &mut cx.local.detectors[button.index()];
        let handle = &mut cx.local.handles[button.index()];
        let mut gestures = cx.shared.gestures;

        let was_waiting = detector.waiting();
        let gesture = detector.handle(ev);

        if !was_waiting && detector.waiting() {
            let timeout = LONG_PRESS_MS.millis();
            *handle = btn_detector::spawn_after(timeout, button, ButtonEvent::Timeout).ok();
        } else if ev == ButtonEvent::Released {
            // we have a short press
            if let Some(handle) = handle.take() {
                handle.cancel().ok();
            }
        }

        if let Some(gesture) = gesture {
            gestures.lock(|g| {
                if g.push((button, gesture)).is_err() {
                    defmt::warn!("gesture dropped, queue full");
                }
            });
        }
    }

    #[idle(local = [led])]
    fn idle(cx: idle::Context) -> ! {
        loop {
            cx.local.led.set_high();
            rtic::export::wfi();
            cx.local.led.set_low();
        }
    }
}
