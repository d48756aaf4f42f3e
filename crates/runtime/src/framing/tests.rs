use serde_json::json;

use super::*;

fn frames(results: Vec<Result<ResponseFrame>>) -> Vec<ResponseFrame> {
	results.into_iter().map(|r| r.unwrap()).collect()
}

#[test]
fn test_unterminated_document_yields_nothing() {
	let mut buffer = FrameBuffer::default();

	let decoded = buffer.push(br#"{"id":"a","body":1}"#);
	assert!(decoded.is_empty());
	assert_eq!(buffer.pending_len(), 19);

	let decoded = frames(buffer.push(b"\n"));
	assert_eq!(decoded.len(), 1);
	assert_eq!(decoded[0].id, "a");
	assert_eq!(decoded[0].body, json!(1));
	assert!(buffer.is_empty());
}

#[test]
fn test_split_after_every_byte() {
	let wire = b"{\"id\":\"a\",\"body\":1}\n";
	let mut buffer = FrameBuffer::default();
	let mut decoded = Vec::new();

	for byte in wire.iter() {
		decoded.extend(frames(buffer.push(std::slice::from_ref(byte))));
	}

	assert_eq!(
		decoded,
		vec![ResponseFrame {
			id: "a".into(),
			body: json!(1)
		}]
	);
	assert!(buffer.is_empty());
}

#[test]
fn test_two_frames_in_one_chunk_are_both_delivered() {
	let mut buffer = FrameBuffer::default();

	let decoded = frames(buffer.push(b"{\"id\":\"a\",\"body\":1}\n{\"id\":\"b\",\"body\":2}\n"));

	assert_eq!(decoded.len(), 2);
	assert_eq!(decoded[0].id, "a");
	assert_eq!(decoded[1].id, "b");
	assert_eq!(decoded[1].body, json!(2));
	assert!(buffer.is_empty());
}

#[test]
fn test_trailing_partial_frame_is_retained() {
	let mut buffer = FrameBuffer::default();

	let decoded = frames(buffer.push(b"{\"id\":\"a\",\"body\":1}\n{\"id\":\"b\","));
	assert_eq!(decoded.len(), 1);
	assert_eq!(buffer.pending_len(), b"{\"id\":\"b\",".len());

	let decoded = frames(buffer.push(b"\"body\":\"two\"}\n"));
	assert_eq!(decoded.len(), 1);
	assert_eq!(decoded[0].id, "b");
	assert_eq!(decoded[0].body, json!("two"));
	assert!(buffer.is_empty());
}

#[test]
fn test_crlf_and_blank_lines_are_tolerated() {
	let mut buffer = FrameBuffer::default();

	let decoded = frames(buffer.push(b"\n\r\n{\"id\":\"a\",\"body\":\"<p>2</p>\"}\r\n"));

	assert_eq!(decoded.len(), 1);
	assert_eq!(decoded[0].body, json!("<p>2</p>"));
}

#[test]
fn test_html_body_with_escaped_newlines() {
	let body = "<div>\n<pre>2</pre>\n</div>";
	let line = format!("{}\n", serde_json::to_string(&json!({"id": "x", "body": body})).unwrap());
	let mut buffer = FrameBuffer::default();

	let decoded = frames(buffer.push(line.as_bytes()));

	assert_eq!(decoded[0].body, json!(body));
}

#[test]
fn test_malformed_frame_reports_protocol_error() {
	let mut buffer = FrameBuffer::default();

	let decoded = buffer.push(b"{\"id\":\"a\",\"body\":1}\nnot json\n{\"id\":\"b\",\"body\":2}\n");

	assert_eq!(decoded.len(), 2);
	assert_eq!(decoded[0].as_ref().unwrap().id, "a");
	match &decoded[1] {
		Err(Error::Protocol(msg)) => assert!(msg.contains("malformed response frame")),
		other => panic!("Expected protocol error, got {:?}", other),
	}
	assert!(buffer.is_empty());
}

#[test]
fn test_frame_without_id_is_malformed() {
	let mut buffer = FrameBuffer::default();

	let decoded = buffer.push(b"{\"body\":1}\n");

	assert!(matches!(decoded.as_slice(), [Err(Error::Protocol(_))]));
}

#[test]
fn test_oversized_partial_frame() {
	let mut buffer = FrameBuffer::new(16);

	assert!(buffer.push(b"{\"id\":\"a\",").is_empty());
	let decoded = buffer.push(b"\"body\":\"0123456789\"");

	assert!(matches!(
		decoded.as_slice(),
		[Err(Error::FrameTooLarge { limit: 16 })]
	));
	assert!(buffer.is_empty());
}

#[test]
fn test_limit_applies_to_partial_frame_only() {
	let mut buffer = FrameBuffer::new(32);
	let wire = format!(
		"{}\n",
		serde_json::to_string(&json!({"id": "a", "body": "x".repeat(100)})).unwrap()
	);

	let decoded = frames(buffer.push(wire.as_bytes()));

	assert_eq!(decoded.len(), 1);
	assert!(buffer.is_empty());
}
