mod app;
mod backend;
mod chat;
mod citation;
mod event;
mod theme;
mod upload;
mod viewer;

use app::PagemarkApp;
use backend::BackendClient;
use eframe::egui;
use std::sync::mpsc;
use theme::Theme;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base = backend::api_base_from_env();
    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pagemark-runtime")
        .build()?;

    let backend = BackendClient::new(base, tx, runtime.handle().clone())?;
    let app = PagemarkApp::new(rx, backend);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 560.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Pagemark",
        native_options,
        Box::new(move |creation_context| {
            Theme::default().apply_visuals(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
