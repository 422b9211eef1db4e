//! Integration tests for the full client -> protocol -> TCP round trip.
//!
//! Each test spins up a mock simulator that speaks the JSON-line protocol
//! over a real socket, then drives it through the [`SimulatorClient`]
//! façade.

mod common;

use common::{connected_client, Exchange};

// ---------------------------------------------------------------------------
// 1. Click accepted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn click_ok_returns_true() {
    let mut client = connected_client(vec![Exchange::line(r#"{"status":"ok","cmd":"click"}"#)]).await;

    assert!(client.click("btn_heart").await);
    client.disconnect();
}

// ---------------------------------------------------------------------------
// 2. Click rejected, stream stays usable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn click_error_returns_false_and_stream_stays_framed() {
    let mut client = connected_client(vec![
        Exchange::line(r#"{"status":"error","cmd":"click","error":"widget_not_found"}"#),
        Exchange::line(r#"{"status":"ok","cmd":"wait"}"#),
    ])
    .await;

    assert!(!client.click("btn_missing").await);
    // No stray read happened after the error line; the next exchange works.
    assert!(client.wait(10).await);
    client.disconnect();
}

// ---------------------------------------------------------------------------
// 3. get_state returns the text field
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_state_returns_label_text() {
    let mut client = connected_client(vec![Exchange::line(
        r#"{"status":"ok","cmd":"get_state","text":"10:32"}"#,
    )])
    .await;

    assert_eq!(client.get_state("lbl_time").await.as_deref(), Some("10:32"));
    client.disconnect();
}

// ---------------------------------------------------------------------------
// 4. get_state idempotence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_state_twice_returns_same_text() {
    let mut client = connected_client(vec![
        Exchange::line(r#"{"status":"ok","cmd":"get_state","text":"72 bpm"}"#),
        Exchange::line(r#"{"status":"ok","cmd":"get_state","text":"72 bpm"}"#),
    ])
    .await;

    let first = client.get_state("lbl_bpm").await;
    let second = client.get_state("lbl_bpm").await;
    assert_eq!(first.as_deref(), Some("72 bpm"));
    assert_eq!(first, second);
    client.disconnect();
}

// ---------------------------------------------------------------------------
// 5. Every input command maps ok -> true
// ---------------------------------------------------------------------------

#[tokio::test]
async fn input_commands_succeed_in_sequence() {
    let ok = |cmd: &str| Exchange::line(&format!(r#"{{"status":"ok","cmd":"{cmd}"}}"#));
    let mut client = connected_client(vec![
        ok("longpress"),
        ok("swipe"),
        ok("drag"),
        ok("click_at"),
        ok("mouse_move"),
        ok("key"),
        ok("set_text"),
        ok("wait"),
    ])
    .await;

    assert!(client.longpress("btn_alarm", 1500).await);
    assert!(client.swipe(240, 400, 240, 100).await);
    assert!(client.drag(10, 10, 200, 200).await);
    assert!(client.click_at(100, 150).await);
    assert!(client.mouse_move(50, 60).await);
    assert!(client.key(13).await);
    assert!(client.set_text("lbl_name", "Alice").await);
    assert!(client.wait(100).await);
    client.disconnect();
}

// ---------------------------------------------------------------------------
// 6. Malformed response line
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_response_maps_to_false() {
    let mut client = connected_client(vec![Exchange::line("garbage that is not json")]).await;

    assert!(!client.click("btn_heart").await);
    client.disconnect();
}

// ---------------------------------------------------------------------------
// 7. Peer closes before responding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn peer_close_before_response_maps_to_false() {
    let mut client = connected_client(vec![Exchange::no_reply()]).await;

    assert!(!client.click("btn_heart").await);
    assert!(!client.is_connected());
}
