use automation_model::{MessageContent, Role};
use stream_api::ndjson::MAX_INCOMPLETE_BYTES;
use stream_api::{FrameDecoder, StreamFrame};

fn delta_text(frame: &StreamFrame) -> Option<String> {
    match frame {
        StreamFrame::Delta(delta) => delta.content.as_ref().map(|content| content.text().into_owned()),
        _ => None,
    }
}

#[test]
fn ndjson_frames_split_across_chunks_are_reassembled() {
    let mut decoder = FrameDecoder::default();

    assert!(decoder
        .feed(br#"{"id":"m1","type":"ai","data":{"content":"Hel"#)
        .is_empty());
    let frames = decoder.feed(b"lo\"}}\n{\"ping\":true}\n");

    assert_eq!(frames.len(), 2);
    assert_eq!(delta_text(&frames[0]).as_deref(), Some("Hello"));
    assert_eq!(frames[1], StreamFrame::Ping);
    assert!(decoder.is_empty_buffer());
}

#[test]
fn ndjson_split_utf8_sequence_is_not_corrupted() {
    let line = "{\"id\":\"m1\",\"type\":\"ai\",\"data\":{\"content\":\"caf\u{e9}\"}}\n";
    let bytes = line.as_bytes();
    let split = line.find('\u{e9}').expect("accented char") + 1;

    let mut decoder = FrameDecoder::default();
    assert!(decoder.feed(&bytes[..split]).is_empty());
    let frames = decoder.feed(&bytes[split..]);

    assert_eq!(delta_text(&frames[0]).as_deref(), Some("caf\u{e9}"));
}

#[test]
fn ndjson_ignores_lines_that_are_not_json_objects_or_arrays() {
    let frames = FrameDecoder::parse_lines(concat!(
        "event: message\n",
        "data: {\"ping\":true}\n",
        "\n",
        "42\n",
        "{\"ping\":true}\n",
    ));

    assert_eq!(frames, vec![StreamFrame::Ping]);
}

#[test]
fn ndjson_top_level_array_yields_one_frame_per_element() {
    let frames = FrameDecoder::parse_lines(
        r#"[{"ping":true},{"id":"t1","type":"tool","data":{"content":"ok","tool_call_id":"c1"}}]"#,
    );

    assert_eq!(frames.len(), 2);
    let StreamFrame::Delta(delta) = &frames[1] else {
        panic!("second element should be a delta");
    };
    assert_eq!(delta.role, Role::Tool);
    assert_eq!(delta.tool_call_id.as_deref(), Some("c1"));
}

#[test]
fn ndjson_incomplete_line_is_retried_with_the_next_line() {
    let mut decoder = FrameDecoder::default();

    let frames = decoder.feed(b"{\"id\":\"m1\",\"type\":\"ai\",\"data\":{\"content\":\"a\n");
    assert!(frames.is_empty());
    assert!(decoder.pending_incomplete_bytes() > 0);

    let frames = decoder.feed(b"b\"}}\n");
    assert_eq!(frames.len(), 1);
    assert_eq!(delta_text(&frames[0]).as_deref(), Some("ab"));
    assert_eq!(decoder.pending_incomplete_bytes(), 0);
}

#[test]
fn ndjson_failed_retry_drops_buffer_and_keeps_the_new_line() {
    let mut decoder = FrameDecoder::default();

    assert!(decoder
        .feed(b"{\"id\":\"m1\",\"type\":\"ai\",\"data\":{\"content\":\"x\n")
        .is_empty());
    let frames = decoder.feed(b"{\"ping\":true}\n");

    assert_eq!(frames, vec![StreamFrame::Ping]);
    assert_eq!(decoder.pending_incomplete_bytes(), 0);
}

#[test]
fn ndjson_malformed_line_is_skipped_without_buffering() {
    let mut decoder = FrameDecoder::default();

    let frames = decoder.feed(b"{broken}\n{\"ping\":true}\n");

    assert_eq!(frames, vec![StreamFrame::Ping]);
    assert_eq!(decoder.pending_incomplete_bytes(), 0);
}

#[test]
fn ndjson_oversized_incomplete_text_is_not_buffered() {
    let mut decoder = FrameDecoder::default();
    let line = format!("{{\"a\":\"{}\n", "x".repeat(MAX_INCOMPLETE_BYTES + 1));

    assert!(decoder.feed(line.as_bytes()).is_empty());
    assert_eq!(decoder.pending_incomplete_bytes(), 0);
}

#[test]
fn ndjson_finish_flushes_trailing_line_without_newline() {
    let mut decoder = FrameDecoder::default();

    assert!(decoder
        .feed(br#"{"id":"h1","type":"human","data":{"content":"make a step"}}"#)
        .is_empty());
    let frames = decoder.finish();

    assert_eq!(frames.len(), 1);
    let StreamFrame::Delta(delta) = &frames[0] else {
        panic!("expected delta");
    };
    assert_eq!(delta.role, Role::Human);
    assert_eq!(delta.content, Some(MessageContent::Text("make a step".to_owned())));
    assert!(decoder.is_empty_buffer());
}
