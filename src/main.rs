use eframe::egui;

use geocanvas::app::GeoCanvasApp;
use geocanvas::settings::AppSettings;
use geocanvas::{cli, log_info, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();
    log_info!(
        "Listing {}/{} @ {} (relayout={}, hit_test={})",
        settings.listing_repo,
        settings.listing_path,
        settings.listing_ref,
        settings.relayout_policy.as_str(),
        settings.hit_test_order.as_str()
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.window_width, settings.window_height])
            .with_min_inner_size([320.0, 240.0])
            .with_title("Geometric Images"),
        ..Default::default()
    };

    eframe::run_native(
        "GeoCanvas",
        options,
        Box::new(move |cc| Box::new(GeoCanvasApp::new(cc, settings))),
    )
}
