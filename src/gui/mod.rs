#[cfg(feature = "gui")]
mod app;

#[cfg(feature = "gui")]
pub fn launch(config: crate::config::Config) -> anyhow::Result<()> {
    use std::sync::Arc;

    use crate::core::coordinator::Coordinator;
    use crate::core::player;
    use crate::sources::jamendo::JamendoClient;

    let client = JamendoClient::new(&config.catalog)?;
    let coordinator = Coordinator::new(
        Arc::new(client),
        player::from_config(&config.playback),
        config.fetch_settings(),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([420.0, 720.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Jamendo",
        options,
        Box::new(move |cc| Ok(Box::new(app::JamendoApp::new(cc, config, coordinator)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI 실행에 실패했습니다: {}", e))
}
