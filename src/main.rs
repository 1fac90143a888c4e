fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_colors(true)
        .with_threads(true)
        .with_local_timestamps()
        .init()?;

    let channels = medilink_bridge::BridgeChannels::default();
    // the realtime transport plugs into socket_tx; nothing feeds it here
    let (_socket_tx, socket_rx) = medilink_bridge::socket::socket_channel(64);
    medilink_backend::run(channels.backend_rx, channels.backend_tx, socket_rx);

    channels
        .frontend_tx
        .blocking_send(medilink_bridge::MessageToBackend::ConfigurationRequest)?;

    let mut frontend_rx = channels.frontend_rx;
    while let Some(message) = frontend_rx.blocking_recv() {
        log::info!("Backend push: {message:?}");
    }

    Ok(())
}
