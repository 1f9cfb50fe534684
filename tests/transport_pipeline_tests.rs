// Wire-level behavior of a session, observed from the agent's side of the
// transport. The test plays the agent by hand through a channel peer.

use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use vivavoce::api::MemoryBackend;
use vivavoce::audio::{NullSink, TRANSPORT_FRAME_BYTES};
use vivavoce::realtime::{ClientEvent, ServerEvent};
use vivavoce::session::{
    EndReason, Lifecycle, SessionController, SessionSettings, Speaker,
};

mod common;

#[tokio::test]
async fn test_armed_session_sends_exactly_the_full_frames() {
    let connector = common::ManualConnector::new();
    let handoff = connector.handoff.clone();

    // One mic burst of 2500 samples: one full transport frame plus a 100
    // sample tail that must never go out on its own.
    let (capture, gate) =
        common::ScriptedCapture::new(vec![common::mic_frame(vec![7i16; 2500], 0)]).gated();

    let mut controller = SessionController::new(
        common::test_interview("tide"),
        SessionSettings::default(),
        Arc::new(connector),
        Arc::new(MemoryBackend::new()),
    );
    controller
        .prepare(Box::new(capture), Box::new(NullSink))
        .await
        .unwrap();
    controller.connect().await.unwrap();

    let mut peer = handoff.take().expect("connector hands the peer over");

    // The opening message carries the interview's agent settings verbatim.
    match peer.rx.recv().await {
        Some(ClientEvent::SessionUpdate { session }) => {
            assert_eq!(session.voice, "coral");
            assert_eq!(session.instructions, "Ask about X");
            assert_eq!(session.turn_detection.kind, "server_vad");
        }
        other => panic!("expected session.update first, got {:?}", other),
    }

    let handle = controller.handle();
    let run = tokio::spawn(controller.run());

    // No audio may arrive before the agent acknowledges the session.
    peer.tx.send(ServerEvent::SessionCreated).await.unwrap();
    for _ in 0..200 {
        if handle.lifecycle() == Lifecycle::Active {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.lifecycle(), Lifecycle::Active);

    // Release the mic burst now that the transport is armed.
    gate.send(true).unwrap();

    let event = timeout(Duration::from_secs(2), peer.rx.recv())
        .await
        .expect("audio should arrive promptly")
        .expect("transport still open");
    let audio = match event {
        ClientEvent::AppendAudio { audio } => audio,
        other => panic!("expected an audio append, got {:?}", other),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(audio.as_bytes())
        .unwrap();
    assert_eq!(bytes.len(), TRANSPORT_FRAME_BYTES);
    assert!(bytes
        .chunks_exact(2)
        .all(|pair| i16::from_le_bytes([pair[0], pair[1]]) == 7));

    // The 100-sample tail stays buffered; no short frame follows it.
    let quiet = timeout(Duration::from_millis(300), peer.rx.recv()).await;
    assert!(quiet.is_err(), "tail below one frame must not be sent");

    handle.stop().await;
    let summary = run.await.unwrap();
    assert_eq!(summary.end_reason, Some(EndReason::UserStop));
}

#[tokio::test]
async fn test_queued_deltas_discarded_once_stopped() {
    let connector = common::ManualConnector::new();
    let handoff = connector.handoff.clone();

    let mut controller = SessionController::new(
        common::test_interview("tide"),
        SessionSettings::default(),
        Arc::new(connector),
        Arc::new(MemoryBackend::new()),
    );
    controller
        .prepare(
            Box::new(common::ScriptedCapture::new(Vec::new())),
            Box::new(NullSink),
        )
        .await
        .unwrap();
    controller.connect().await.unwrap();

    let peer = handoff.take().expect("connector hands the peer over");

    // Three transcript deltas are already queued when the stop lands.
    for text in ["never ", "shown ", "text"] {
        peer.tx
            .send(ServerEvent::AudioTranscriptDelta {
                delta: text.to_string(),
            })
            .await
            .unwrap();
    }

    let handle = controller.handle();
    handle.stop().await;
    let summary = controller.run().await;

    // The queued deltas were dropped, not dispatched: nothing but the
    // connection marker made it into the transcript.
    let entries = handle.transcript().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].speaker, Speaker::System);
    assert_eq!(entries[0].text, "<< Connecting to interview session... >>");

    assert_eq!(summary.end_reason, Some(EndReason::UserStop));
    assert_eq!(handle.lifecycle(), Lifecycle::Ended);
}

#[tokio::test]
async fn test_empty_interview_skips_upload_with_warning() {
    let backend = Arc::new(MemoryBackend::new());
    let connector = common::ManualConnector::new();
    let handoff = connector.handoff.clone();

    let mut controller = SessionController::new(
        common::test_interview("tide"),
        SessionSettings::default(),
        Arc::new(connector),
        backend.clone(),
    );
    controller
        .prepare(
            Box::new(common::ScriptedCapture::new(Vec::new())),
            Box::new(NullSink),
        )
        .await
        .unwrap();
    controller.connect().await.unwrap();

    // The agent goes away without ever acknowledging the session.
    drop(handoff.take());

    let summary = controller.run().await;

    assert_eq!(summary.end_reason, Some(EndReason::StreamClosed));
    let message = summary.end_message.expect("teardown always reports");
    assert_eq!(message.text, "Warning: No recording data captured to upload.");
    assert!(!message.is_error);
    assert_eq!(backend.upload_attempts().await, 0);
}
