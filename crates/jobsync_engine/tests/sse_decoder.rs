use jobsync_engine::{EventTooLarge, SseDecoder, SseFrame};
use pretty_assertions::assert_eq;

fn data(text: &str) -> SseFrame {
    SseFrame::Event {
        event: None,
        id: None,
        data: text.to_string(),
    }
}

#[test]
fn events_split_across_chunks_are_reassembled() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.push(b"da").unwrap().is_empty());
    assert!(decoder.push(b"ta: {\"file_id\":").unwrap().is_empty());
    assert!(decoder.push(b"3}\n").unwrap().is_empty());
    assert_eq!(decoder.push(b"\n").unwrap(), vec![data("{\"file_id\":3}")]);
}

#[test]
fn crlf_line_endings_are_accepted() {
    let mut decoder = SseDecoder::default();
    let frames = decoder.push(b"data: a\r\n\r\ndata: b\r\n\r\n").unwrap();
    assert_eq!(frames, vec![data("a"), data("b")]);
}

#[test]
fn comments_are_surfaced_separately() {
    let mut decoder = SseDecoder::default();
    let frames = decoder.push(b": keepalive\n\n").unwrap();
    assert_eq!(frames, vec![SseFrame::Comment("keepalive".to_string())]);
}

#[test]
fn event_name_and_id_are_attached() {
    let mut decoder = SseDecoder::default();
    let frames = decoder.push(b"id: 17\nevent: status\ndata: x\n\ndata: y\n\n").unwrap();
    assert_eq!(
        frames,
        vec![
            SseFrame::Event {
                event: Some("status".to_string()),
                id: Some("17".to_string()),
                data: "x".to_string(),
            },
            // The last id carries over; the event name does not.
            SseFrame::Event {
                event: None,
                id: Some("17".to_string()),
                data: "y".to_string(),
            },
        ]
    );
}

#[test]
fn blank_line_without_data_dispatches_nothing() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.push(b"event: ping\n\n").unwrap().is_empty());
    assert_eq!(decoder.push(b"data: after\n\n").unwrap(), vec![data("after")]);
}

#[test]
fn retry_and_unknown_fields_are_ignored() {
    let mut decoder = SseDecoder::default();
    let frames = decoder.push(b"retry: 100\nfoo: bar\ndata\ndata: z\n\n").unwrap();
    assert_eq!(frames, vec![data("\nz")]);
}

#[test]
fn oversized_partial_line_is_rejected() {
    let mut decoder = SseDecoder::new(16);
    assert!(decoder.push(b"data: 0123456").unwrap().is_empty());
    assert_eq!(
        decoder.push(b"789abcdef"),
        Err(EventTooLarge {
            limit: 16,
            pending: 22,
        })
    );
}

#[test]
fn oversized_multi_line_event_is_rejected() {
    let mut decoder = SseDecoder::new(16);
    assert!(decoder.push(b"data: 01234567
").unwrap().is_empty());
    assert!(matches!(
        decoder.push(b"data: 89abcdef
"),
        Err(EventTooLarge { limit: 16, .. })
    ));
}

#[test]
fn many_small_events_in_one_chunk_stay_under_the_limit() {
    let mut decoder = SseDecoder::new(16);
    let chunk = b"data: a\n\n".repeat(100);
    let frames = decoder.push(&chunk).unwrap();
    assert_eq!(frames.len(), 100);
}

#[test]
fn line_trickled_byte_by_byte_is_decoded_once_complete() {
    let mut decoder = SseDecoder::default();
    for byte in b"data: slow" {
        assert!(decoder.push(&[*byte]).unwrap().is_empty());
    }
    assert_eq!(decoder.push(b"\n\n").unwrap(), vec![data("slow")]);
}
