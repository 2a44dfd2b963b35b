use chrono::{DateTime, Duration, TimeZone, Utc};
use phasor_gateway::channel::common::{DataFormat, FrameImage, NominalFrequency};
use phasor_gateway::channel::frame::DataFrame;
use phasor_gateway::concentrator::{Concentrator, FramePublisher, Measurement};
use phasor_gateway::config::{
    AnalogSetup, DeviceSetup, DigitalSetup, GatewayConfig, MeasurementMapping, PhasorSetup,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct CapturePublisher {
    images: Vec<Vec<u8>>,
}

impl FramePublisher for CapturePublisher {
    fn publish(&mut self, frame_bytes: &[u8]) {
        self.images.push(frame_bytes.to_vec());
    }
}

fn device(acronym: &str, id_code: u16, format: DataFormat) -> DeviceSetup {
    DeviceSetup {
        acronym: acronym.to_string(),
        id_code,
        is_virtual: false,
        data_format: format,
        nominal_frequency: NominalFrequency::Hz60,
        phasors: vec![
            PhasorSetup {
                label: "VA".to_string(),
                scale: 10.0,
            },
            PhasorSetup {
                label: "IA".to_string(),
                scale: 1.0,
            },
        ],
        analogs: vec![AnalogSetup {
            label: "MW".to_string(),
            multiplier: 1.0,
            adder: 0.0,
        }],
        digitals: vec![DigitalSetup {
            label: "BREAKER".to_string(),
        }],
    }
}

fn mapping(key: &str, reference: &str) -> MeasurementMapping {
    MeasurementMapping {
        key: key.to_string(),
        signal_reference: reference.to_string(),
        multiplier: 1.0,
        adder: 0.0,
    }
}

fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        frames_per_second: 30,
        lag_seconds: 1.0,
        lead_seconds: 1.0,
        process_data_valid_flag: true,
        auto_publish_config: Some(false),
        has_command_channel: true,
        source_offset_seconds: 0,
        time_adjustment_seconds: 0.0,
        data_loss_interval_seconds: 5.0,
        devices: vec![
            device("EAST", 1, DataFormat::Float32),
            device("WEST", 2, DataFormat::Float32),
        ],
        mappings: vec![
            mapping("PPA:1", "EAST-PM1"),
            mapping("PPA:2", "EAST-PA1"),
            mapping("PPA:3", "EAST-FQ"),
            mapping("PPA:4", "EAST-DF"),
            mapping("PPA:5", "EAST-AV1"),
            mapping("PPA:6", "EAST-DV1"),
            mapping("PPA:7", "EAST-SF"),
            mapping("PPA:10", "EAST-PA2"),
            // One source measurement feeding both devices
            mapping("PPA:8", "WEST-PM2"),
            mapping("PPA:8", "EAST-PM2"),
            mapping("PPA:9", "WEST-FQ"),
        ],
    }
}

fn measurement(key: &str, timestamp: DateTime<Utc>, value: f64) -> Measurement {
    Measurement {
        key: key.to_string(),
        timestamp,
        value,
    }
}

#[test]
fn full_frame_assembly_and_publication() {
    init_logging();
    let config = gateway_config();
    let mut concentrator = Concentrator::build(&config).unwrap();
    let mut publisher = CapturePublisher { images: vec![] };
    let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

    concentrator.queue_measurements(
        &[
            measurement("PPA:1", now, 133_000.0),
            measurement("PPA:2", now, -12.5),
            measurement("PPA:3", now, 59.97),
            measurement("PPA:4", now, -0.01),
            measurement("PPA:5", now, 481.25),
            measurement("PPA:6", now, 0x00FF as f64),
            measurement("PPA:7", now, 0x2000 as f64),
            measurement("PPA:8", now, 12_345.0),
            measurement("PPA:9", now, 60.01),
            measurement("PPA:10", now, 45.0),
        ],
        now,
    );

    let published = concentrator.publish_due(&mut publisher, now + Duration::seconds(2));
    assert_eq!(published, 1);

    // Parse the published image back through the channel model
    let templates = config.cell_templates();
    let image = &publisher.images[0];
    let mut frame = DataFrame::from_templates(Utc::now(), &templates);
    let consumed = frame.parse_image(image, 0, image.len()).unwrap();
    assert_eq!(consumed, image.len());

    let east = &frame.cells[0];
    assert!((east.phasors[0].magnitude - 133_000.0).abs() < 1.0);
    assert!((east.phasors[0].angle + 12.5).abs() < 0.01);
    assert!((east.phasors[1].magnitude - 12_345.0).abs() < 0.5);
    assert!((east.frequency.frequency - 59.97).abs() < 1e-3);
    assert!((east.frequency.dfdt + 0.01).abs() < 1e-3);
    assert!((east.analogs[0].value - 481.25).abs() < 1e-3);
    assert_eq!(east.digitals[0].word, 0x00FF);
    // Status measurement landed (time-invalid bit), and every expected
    // value arrived so the data-valid pass left the cell untouched
    assert!(!east.time_is_valid());
    assert!(east.data_is_valid());

    let west = &frame.cells[1];
    assert!((west.phasors[1].magnitude - 12_345.0).abs() < 0.5);
    assert!((west.frequency.frequency - 60.01).abs() < 1e-3);
    // WEST was only partially reported, so it publishes data-invalid
    assert!(!west.data_is_valid());

    let status = concentrator.status(now + Duration::seconds(2));
    // PPA:8 placed twice (two destinations), the other nine keys once
    assert_eq!(status.sorted_measurements, 11);
    assert_eq!(status.published_frames, 1);
    assert_eq!(status.discarded_measurements, 0);
    assert_eq!(status.placement_defects, 0);
}

#[test]
fn steady_state_cadence_produces_one_frame_per_bucket() {
    init_logging();
    let config = gateway_config();
    let mut concentrator = Concentrator::build(&config).unwrap();
    let mut publisher = CapturePublisher { images: vec![] };
    let start = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

    // One second of mid-bucket measurements at exactly the frame rate
    for i in 0..30i64 {
        let ts = start + Duration::microseconds((i * 1_000_000 + 500_000) / 30);
        concentrator.queue_measurements(&[measurement("PPA:3", ts, 60.0)], ts);
    }
    let published = concentrator.publish_due(&mut publisher, start + Duration::seconds(3));
    assert_eq!(published, 30);

    // Timestamps increase monotonically across published frames
    let templates = config.cell_templates();
    let mut last: Option<DateTime<Utc>> = None;
    for image in &publisher.images {
        let mut frame = DataFrame::from_templates(Utc::now(), &templates);
        frame.parse_image(image, 0, image.len()).unwrap();
        if let Some(previous) = last {
            assert!(frame.timestamp > previous);
        }
        last = Some(frame.timestamp);
    }
}

#[test]
fn configuration_reload_swaps_cross_reference_atomically() {
    init_logging();
    let config = gateway_config();
    let mut concentrator = Concentrator::build(&config).unwrap();
    let before = concentrator.cross_reference();
    assert!(before.resolve("PPA:1").is_some());

    let mut updated = gateway_config();
    updated.mappings = vec![mapping("PPA:50", "EAST-FQ")];
    concentrator.reload_configuration(&updated).unwrap();

    // The old handle still resolves the old table; a fresh handle sees the
    // replacement
    assert!(before.resolve("PPA:1").is_some());
    let after = concentrator.cross_reference();
    assert!(after.resolve("PPA:1").is_none());
    assert!(after.resolve("PPA:50").is_some());
}

#[test]
fn mixed_format_devices_serialize_per_cell() {
    init_logging();
    let mut config = gateway_config();
    config.devices[1] = device("WEST", 2, DataFormat::FixedInt16);
    config.process_data_valid_flag = false;
    let mut concentrator = Concentrator::build(&config).unwrap();
    let mut publisher = CapturePublisher { images: vec![] };
    let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

    concentrator.queue_measurements(
        &[
            measurement("PPA:8", now, 9_000.0),
            measurement("PPA:9", now, 59.9),
        ],
        now,
    );
    concentrator.publish_due(&mut publisher, now + Duration::seconds(2));

    let templates = config.cell_templates();
    let image = &publisher.images[0];
    let mut frame = DataFrame::from_templates(Utc::now(), &templates);
    frame.parse_image(image, 0, image.len()).unwrap();

    // Float cell is exact, fixed cell within one scale step
    assert!((frame.cells[0].phasors[1].magnitude - 9_000.0).abs() < 0.5);
    assert!((frame.cells[1].phasors[1].magnitude - 9_000.0).abs() <= 2.0);
    assert!((frame.cells[1].frequency.frequency - 59.9).abs() < 1e-3);
}
