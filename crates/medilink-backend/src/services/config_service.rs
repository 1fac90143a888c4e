/// Handles an incoming configuration request (see
/// [`medilink_bridge::MessageToBackend::ConfigurationRequest`]).
pub(crate) async fn handle_config_request(context: super::AppContextHandle) {
    let config = {
        let state = context.state.read().await;
        state.config.clone()
    };
    context
        .send(medilink_bridge::MessageFromBackend::ConfigurationResponse(
            config,
        ))
        .await;
}
