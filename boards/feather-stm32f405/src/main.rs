#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod ccmram;
mod device_id;
mod eth;
mod network;
mod platform;
mod pms_uart;
mod tls_buffers;

stm32_tim2_monotonic!(Mono, 1_000_000);

/// How often the node checks whether a cycle is due
const NODE_POLL_INTERVAL_MS: u64 = 1_000;

#[app(device = embassy_stm32, peripherals = true, dispatchers = [SPI1, SPI3, UART4])]
mod app {
    use super::*;
    use core::cell::RefCell;

    use airnode_core::{CycleIo, CycleReport, Node, NodeConfig};
    use airnode_hal::scd4x::Scd4x;
    use airnode_hal::SystemControl;
    use defmt::{error, info, Debug2Format};
    use embassy_futures::select::select4;
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::i2c::{self, I2c};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::rng::Rng;
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::usart::{self, UartRx};
    use embassy_sync::blocking_mutex::Mutex;
    use embassy_time::{Delay, Duration};
    use static_cell::{ConstStaticCell, StaticCell};

    use network::{
        manager, sntp, BoardConfig, EthernetLink, HttpsUploader, NetworkConfig, SharedRng,
        SharedRngCell, SntpConfig, SntpService, TcpBuffers, TlsTransport,
    };
    use platform::{CcmWallClock, CortexReset, MonoClock};
    use pms_uart::PmsSerial;

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type ExtiChannel = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;

    struct NetworkPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        int: PinPC2,
        exti: ExtiChannel,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    /// SCD4x bus and the RNG for TLS
    struct NodePeripherals {
        i2c: embassy_stm32::Peri<'static, peripherals::I2C1>,
        scl: embassy_stm32::Peri<'static, peripherals::PB6>,
        sda: embassy_stm32::Peri<'static, peripherals::PB7>,
        rng: embassy_stm32::Peri<'static, peripherals::RNG>,
    }

    /// PM sensor UART (Feather `RX` pin)
    struct PmsPeripherals {
        usart: embassy_stm32::Peri<'static, peripherals::USART3>,
        rx: embassy_stm32::Peri<'static, peripherals::PB11>,
        dma: embassy_stm32::Peri<'static, peripherals::DMA1_CH1>,
    }

    // RNG interrupt binding for hardware random number generator
    embassy_stm32::bind_interrupts!(struct RngIrqs {
        RNG => embassy_stm32::rng::InterruptHandler<peripherals::RNG>;
    });

    embassy_stm32::bind_interrupts!(struct PmsUartIrqs {
        USART3 => embassy_stm32::usart::InterruptHandler<peripherals::USART3>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {}

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Air-quality node starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // Configure PLL for system clock and RNG (48MHz required for RNG)
        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz (USB/RNG clock)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(config);
        info!("PLL configured: SYSCLK=84MHz, PLLQ=48MHz for RNG");

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };
        let node_periph = NodePeripherals {
            i2c: p.I2C1,
            scl: p.PB6,
            sda: p.PB7,
            rng: p.RNG,
        };
        let pms_periph = PmsPeripherals {
            usart: p.USART3,
            rx: p.PB11,
            dma: p.DMA1_CH1,
        };

        let board = BoardConfig::default();
        pms_rx::spawn(pms_periph, board.pms_baud).ok();
        network_task::spawn(net_periph, node_periph).ok();

        (Shared {}, Local {})
    }

    /// PM sensor receive pump
    #[task(priority = 1)]
    async fn pms_rx(_cx: pms_rx::Context, periph: PmsPeripherals, baud: u32) {
        static DMA_BUF: ConstStaticCell<[u8; pms_uart::DMA_BUFFER_LEN]> =
            ConstStaticCell::new([0; pms_uart::DMA_BUFFER_LEN]);

        let mut config = usart::Config::default();
        config.baudrate = baud;

        match UartRx::new(periph.usart, PmsUartIrqs, periph.rx, periph.dma, config) {
            Ok(rx) => {
                info!("PMS UART listening at {} baud", baud);
                pms_uart::pump(rx.into_ring_buffered(DMA_BUF.take())).await
            }
            // the node keeps running on cached or missing PM values
            Err(e) => error!("PMS UART configuration failed: {:?}", Debug2Format(&e)),
        }
    }

    /// Network task - owns the stack and runs the node
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn network_task(
        _cx: network_task::Context,
        periph: NetworkPeripherals,
        node_periph: NodePeripherals,
    ) -> ! {
        use embassy_net::{Config, StackResources};

        info!("Network task started");
        let net_config = NetworkConfig::default();
        let board = BoardConfig::default();

        // Setup ethernet peripherals
        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let cs = Output::new(periph.cs, Level::High, Speed::VeryHigh);
        let reset = Output::new(periph.reset, Level::High, Speed::Low);
        let int = ExtiInput::new(periph.int, periph.exti, Pull::Up);

        let eth_periph = eth::EthPeripherals {
            spi,
            cs,
            reset,
            int,
        };

        let (device, mut w5500_runner) =
            match eth::init_w5500(eth_periph, net_config.mac_addr).await {
                Ok(parts) => parts,
                Err(e) => {
                    error!("Ethernet unavailable ({}), restarting", e);
                    Mono::delay(10.secs()).await;
                    CortexReset.restart()
                }
            };

        static RESOURCES: StaticCell<StackResources<5>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            net_config.seed,
        );
        info!("Network stack initialized with DHCP");

        static RNG: StaticCell<SharedRngCell> = StaticCell::new();
        let rng = SharedRng::new(RNG.init(Mutex::new(RefCell::new(Rng::new(
            node_periph.rng,
            RngIrqs,
        )))));
        info!("Hardware RNG initialized");

        static TIME_TCP: ConstStaticCell<TcpBuffers> = ConstStaticCell::new(TcpBuffers::new());
        static UPLOAD_TCP: ConstStaticCell<TcpBuffers> = ConstStaticCell::new(TcpBuffers::new());
        let timeout = Duration::from_millis(net_config.connect_timeout_ms);
        let time_transport = TlsTransport::new(stack, rng, TIME_TCP.take(), timeout);
        let upload_transport = TlsTransport::new(stack, rng, UPLOAD_TCP.take(), timeout);

        let mut i2c_config = i2c::Config::default();
        i2c_config.frequency = Hertz(board.i2c_frequency_hz);
        let i2c = I2c::new_blocking(node_periph.i2c, node_periph.scl, node_periph.sda, i2c_config);
        let sensor = Scd4x::with_address(i2c, Delay, board.scd4x_address);

        let board_id = device_id::board_id(board.board_id_prefix);
        info!("Board id: {}", board_id.as_str());

        let mut node = Node::new(
            NodeConfig::default(),
            sensor,
            Delay,
            SntpService,
            time_transport,
            CcmWallClock,
        );
        let mut uploader =
            HttpsUploader::new(upload_transport, board.upload_host, board.upload_port, board_id);
        let mut link = EthernetLink::new(stack);
        let mut serial = PmsSerial;
        let clock = MonoClock;

        let app_logic = async {
            manager::wait_for_config(&stack).await;
            serial.flush();
            node.start(&mut Delay).await;

            loop {
                let io = CycleIo {
                    serial: &mut serial,
                    clock: &clock,
                    link: &mut link,
                    sink: &mut uploader,
                };
                if let Some(report) = node.poll(io).await {
                    log_report(&report);
                    node.restart_if_requested(&report, &mut CortexReset, &mut Delay)
                        .await;
                }
                Mono::delay(NODE_POLL_INTERVAL_MS.millis()).await;
            }
        };

        select4(
            w5500_runner.run(),
            net_runner.run(),
            sntp::run(stack, SntpConfig::default()),
            app_logic,
        )
        .await;

        error!("Network task ended unexpectedly, restarting");
        CortexReset.restart()
    }

    fn log_report(report: &CycleReport) {
        info!(
            "Cycle: gas {:?}, pm {:?} ({:?}), ts {:?}, upload {:?}",
            report.gas.result,
            report.pm,
            report.pm_source,
            report.timestamp.as_deref(),
            report.upload
        );
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
