//! End-to-end tests: protocol lines in, reply lines out, through the full
//! reader/actor/writer pipeline.

use std::sync::atomic::AtomicBool;

use approx::assert_relative_eq;
use tokio::io::AsyncReadExt;

use projmap_core::{Mode, Point};
use projmap_overlay::infrastructure::storage::OverlayConfig;
use projmap_overlay::infrastructure::{OverlayRun, OverlayRuntime, ReadEnd};

/// Runs `script` through a fresh runtime and returns the run summary and
/// everything the overlay wrote.
async fn run_script(script: &str) -> (OverlayRun, String) {
    let (overlay_out, mut controller_in) = tokio::io::duplex(1 << 16);
    let runtime = OverlayRuntime::start(overlay_out, &OverlayConfig::default());
    let running = AtomicBool::new(true);

    let run = runtime.serve(script.as_bytes(), &running).await.unwrap();

    let mut written = String::new();
    controller_in.read_to_string(&mut written).await.unwrap();
    (run, written)
}

#[tokio::test]
async fn test_rect_commands_and_query_produce_one_reply() {
    // Arrange
    let script = concat!(
        r#"{"op":"AddRects","rectangles":[[0,0,1,1],[1.2,0,1,1],[2.4,0,1,1]]}"#,
        "\n",
        r#"{"op":"SetRectColor","id":1,"color":"red"}"#,
        "\n",
        r#"{"op":"GetRects"}"#,
        "\n",
    );

    // Act
    let (run, written) = run_script(script).await;

    // Assert
    assert_eq!(run.end, ReadEnd::EndOfStream);
    assert_eq!(run.lines_written, 1);
    assert_eq!(
        written,
        "[[0.0,0.0,1.0,1.0],[1.2,0.0,1.0,1.0],[2.4,0.0,1.0,1.0]]\n"
    );
    let shapes = run.service.session().rectangles().shapes();
    assert_eq!(shapes[1].color().to_string(), "red");
}

#[tokio::test]
async fn test_bad_lines_are_skipped_and_quit_stops_reading() {
    // Arrange
    let script = concat!(
        "this is not json\n",
        "\n",
        r#"{"op":"Explode"}"#,
        "\n",
        r#"{"op":"AddRect","rectangle":[1,1,2,2]}"#,
        "\n",
        r#"{"op":"Quit"}"#,
        "\n",
        r#"{"op":"AddRect","rectangle":[5,5,1,1]}"#,
        "\n",
    );

    // Act
    let (run, written) = run_script(script).await;

    // Assert
    assert_eq!(run.end, ReadEnd::Quit);
    assert!(written.is_empty());
    assert_eq!(run.service.rectangles().len(), 1);
}

#[tokio::test]
async fn test_line_with_invalid_utf8_does_not_end_the_session() {
    // Arrange
    let mut script = Vec::new();
    script.extend_from_slice(b"{\"op\":\"AddRect\",\"rectangle\":[0,0,1,1]}\n");
    script.extend_from_slice(b"{\"op\":\"\xff\xfe\"}\n");
    script.extend_from_slice(b"{\"op\":\"AddRect\",\"rectangle\":[2,0,1,1]}\n");
    script.extend_from_slice(b"{\"op\":\"GetRects\"}\n");
    let (overlay_out, mut controller_in) = tokio::io::duplex(1 << 16);
    let runtime = OverlayRuntime::start(overlay_out, &OverlayConfig::default());
    let running = AtomicBool::new(true);

    // Act
    let run = runtime.serve(&script[..], &running).await.unwrap();

    // Assert
    assert_eq!(run.end, ReadEnd::EndOfStream);
    assert_eq!(run.service.rectangles().len(), 2);
    let mut written = String::new();
    controller_in.read_to_string(&mut written).await.unwrap();
    assert_eq!(written, "[[0.0,0.0,1.0,1.0],[2.0,0.0,1.0,1.0]]\n");
}

#[tokio::test]
async fn test_set_then_get_transformation_round_trips_matrices() {
    // Arrange
    let script = concat!(
        r#"{"op":"SetTransformation","matrix":[[2,0,5],[0,2,7],[0,0,1]],"reverseMatrix":[[0.5,0,-2.5],[0,0.5,-3.5],[0,0,1]]}"#,
        "\n",
        r#"{"op":"GetTransformation"}"#,
        "\n",
    );

    // Act
    let (run, written) = run_script(script).await;

    // Assert
    assert_eq!(run.service.mode(), Mode::Drawing);
    let reply: serde_json::Value = serde_json::from_str(written.trim_end()).unwrap();
    assert_eq!(reply["matrix"][0][2], 5.0);
    assert_eq!(reply["reverseMatrix"][1][1], 0.5);
}

#[tokio::test]
async fn test_get_transformation_before_calibration_answers_with_error() {
    let (run, written) = run_script("{\"op\":\"GetTransformation\"}\n").await;

    assert_eq!(run.lines_written, 1);
    let reply: serde_json::Value = serde_json::from_str(written.trim_end()).unwrap();
    assert_eq!(reply["error"]["op"], "GetTransformation");
}

#[tokio::test]
async fn test_host_clicks_calibrate_and_place_a_rectangle() {
    // Arrange
    let (overlay_out, mut controller_in) = tokio::io::duplex(1 << 16);
    let runtime = OverlayRuntime::start(overlay_out, &OverlayConfig::default());
    let mut snapshots = runtime.subscribe();
    let handle = runtime.handle();
    let running = AtomicBool::new(true);

    // Act
    handle
        .submit_line(r#"{"op":"SetInitSize","size":[10,5]}"#.to_string())
        .await
        .unwrap();
    for (x, y) in [(100.0, 100.0), (700.0, 100.0), (700.0, 500.0), (100.0, 500.0)] {
        handle.pointer_click(Point::new(x, y)).await.unwrap();
    }
    handle.pointer_click(Point::new(700.0, 500.0)).await.unwrap();
    handle
        .submit_line(r#"{"op":"GetRects"}"#.to_string())
        .await
        .unwrap();
    drop(handle);

    let run = runtime.serve(&b""[..], &running).await.unwrap();

    // Assert
    assert_eq!(run.service.mode(), Mode::Drawing);
    let rects = run.service.rectangles();
    assert_eq!(rects.len(), 1);
    assert_relative_eq!(rects[0].rect.pos_x, 10.0, epsilon = 1e-6);
    assert_relative_eq!(rects[0].rect.pos_y, 5.0, epsilon = 1e-6);

    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.mode, Mode::Drawing);
    assert!(snapshot.shapes[0].polygon.is_some());

    let mut written = String::new();
    controller_in.read_to_string(&mut written).await.unwrap();
    let reply: Vec<[f64; 4]> = serde_json::from_str(written.trim_end()).unwrap();
    assert_eq!(reply.len(), 1);
    assert_relative_eq!(reply[0][2], 1.2);
}

#[tokio::test]
async fn test_cleared_running_flag_stops_before_reading() {
    let (overlay_out, _controller_in) = tokio::io::duplex(1 << 16);
    let runtime = OverlayRuntime::start(overlay_out, &OverlayConfig::default());
    let running = AtomicBool::new(false);

    let run = runtime
        .serve(&b"{\"op\":\"AddRect\",\"rectangle\":[0,0,1,1]}\n"[..], &running)
        .await
        .unwrap();

    assert_eq!(run.end, ReadEnd::Shutdown);
    assert!(run.service.rectangles().is_empty());
}
