//! Peer connection construction and negotiation
//!
//! Answering-side helpers: build a configured `RTCPeerConnection`,
//! answer an inbound offer (waiting for ICE gathering to finish so no
//! partial answer is sent), and add trickled remote candidates.

use std::sync::Arc;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use super::SessionError;
use crate::config::IceServerConfig;

/// Create a peer connection with default codecs and the configured
/// ICE servers.
pub async fn build_peer_connection(
    ice_servers: &[IceServerConfig],
) -> Result<Arc<RTCPeerConnection>, SessionError> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| SessionError::ConnectionFailed(format!("failed to register codecs: {}", e)))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
        SessionError::ConnectionFailed(format!("failed to register interceptors: {}", e))
    })?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let ice_servers = ice_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect();

    let config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    let peer_connection = api.new_peer_connection(config).await.map_err(|e| {
        SessionError::ConnectionFailed(format!("failed to create peer connection: {}", e))
    })?;

    Ok(Arc::new(peer_connection))
}

/// Answer an inbound SDP offer and return the local answer SDP once
/// ICE gathering has completed.
pub async fn answer_offer(
    peer_connection: &Arc<RTCPeerConnection>,
    sdp: &str,
) -> Result<String, SessionError> {
    let offer = RTCSessionDescription::offer(sdp.to_string())
        .map_err(|e| SessionError::Sdp(format!("invalid SDP offer: {}", e)))?;

    peer_connection
        .set_remote_description(offer)
        .await
        .map_err(|e| SessionError::Sdp(format!("failed to set remote description: {}", e)))?;

    let answer = peer_connection
        .create_answer(None)
        .await
        .map_err(|e| SessionError::Sdp(format!("failed to create answer: {}", e)))?;

    let mut gather_complete = peer_connection.gathering_complete_promise().await;

    peer_connection
        .set_local_description(answer.clone())
        .await
        .map_err(|e| SessionError::Sdp(format!("failed to set local description: {}", e)))?;

    // No partial answer: the envelope carries the fully gathered SDP.
    let _ = gather_complete.recv().await;

    if let Some(local) = peer_connection.local_description().await {
        return Ok(local.sdp);
    }
    Ok(answer.sdp)
}

/// Add a trickled remote ICE candidate.
pub async fn add_remote_candidate(
    peer_connection: &Arc<RTCPeerConnection>,
    candidate: &str,
    mid: Option<&str>,
) -> Result<(), SessionError> {
    let init = RTCIceCandidateInit {
        candidate: candidate.to_string(),
        sdp_mid: mid.map(|s| s.to_string()),
        sdp_mline_index: None,
        username_fragment: None,
    };

    peer_connection
        .add_ice_candidate(init)
        .await
        .map_err(|e| SessionError::Ice(format!("failed to add ICE candidate: {}", e)))
}
