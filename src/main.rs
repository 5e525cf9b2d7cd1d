use std::path::Path;

use food_detection::{
    config::DetectorConfig, report::DetectionReport, run_detection, telemetry::init_telemetry,
};

fn main() {
    init_telemetry();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        let usage = DetectionReport::failure("Usage: detect_food <image_path> <model_path>");
        println!("{}", usage.to_json());
        std::process::exit(1);
    }

    let report = run_detection(
        Path::new(&args[1]),
        Path::new(&args[2]),
        &DetectorConfig::default(),
    );
    println!("{}", report.to_json());
}
