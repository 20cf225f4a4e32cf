use crate::JobEvent;

/// Sentinel data payloads the server sends to keep idle connections alive.
const KEEP_ALIVE_PAYLOADS: [&str; 2] = [": keepalive", "keepalive"];

/// What a single inbound stream payload turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    KeepAlive,
    Event(JobEvent),
    Malformed(String),
}

pub fn classify_payload(data: &str) -> Inbound {
    let trimmed = data.trim();
    if KEEP_ALIVE_PAYLOADS.contains(&trimmed) {
        return Inbound::KeepAlive;
    }
    match serde_json::from_str::<JobEvent>(trimmed) {
        Ok(event) => Inbound::Event(event),
        Err(err) => Inbound::Malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobStatus;

    #[test]
    fn keep_alive_sentinel_is_recognised() {
        assert_eq!(classify_payload(": keepalive"), Inbound::KeepAlive);
        assert_eq!(classify_payload("keepalive\n"), Inbound::KeepAlive);
    }

    #[test]
    fn camel_case_event_parses() {
        let inbound =
            classify_payload(r#"{"jobId":2,"status":"transcribed","payload":"hello"}"#);
        assert_eq!(
            inbound,
            Inbound::Event(JobEvent::new(2, JobStatus::Transcribed).with_payload("hello"))
        );
    }

    #[test]
    fn backend_field_names_are_accepted() {
        let inbound = classify_payload(
            r#"{"file_id":7,"status":"processing","message":"Transcription job started."}"#,
        );
        assert_eq!(
            inbound,
            Inbound::Event(
                JobEvent::new(7, JobStatus::Processing).with_message("Transcription job started.")
            )
        );

        let inbound = classify_payload(r#"{"file_id":7,"status":"pending"}"#);
        assert_eq!(inbound, Inbound::Event(JobEvent::new(7, JobStatus::Queued)));
    }

    #[test]
    fn broken_or_incomplete_payloads_are_malformed() {
        assert!(matches!(classify_payload("{not json"), Inbound::Malformed(_)));
        assert!(matches!(
            classify_payload(r#"{"status":"queued"}"#),
            Inbound::Malformed(_)
        ));
        assert!(matches!(
            classify_payload(r#"{"jobId":1,"status":"exploded"}"#),
            Inbound::Malformed(_)
        ));
        assert!(matches!(classify_payload(""), Inbound::Malformed(_)));
    }
}
