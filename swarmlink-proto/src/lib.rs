//! Wire protocol for the swarmlink signaling channel.
//!
//! Every frame on the wire is a JSON object carrying a mandatory string
//! `type` tag. Inbound frames decode into [`Request`], outbound frames are
//! built as [`Response`]; the forwarded kinds (`forward`, `offer`, `answer`)
//! are re-serialized from their parsed [`Request`] form so the delivered
//! payload carries the server-stamped sender and nothing else.
//!
//! Decoding is two-phase: the tag is peeked first, so a frame with an
//! unrecognized tag is [`ProtocolError::UnknownType`] while a recognized
//! frame with a missing or malformed field is [`ProtocolError::Validation`].
//! Field names are fixed by the protocol (`fileID`, `peerConnID`, ...) and
//! do not follow Rust casing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Malformed or incomplete message.
    #[error("invalid message: {0}")]
    Validation(String),
    /// Well-formed message with a tag outside the recognized set.
    #[error("unknown message type `{0}`")]
    UnknownType(String),
}

/// Join the swarm for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    #[serde(rename = "fileID")]
    pub file_id: String,
}

/// Opaque payload relayed verbatim from one peer to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forward {
    #[serde(default)]
    pub from: String,
    pub to: String,
    pub data: String,
}

/// A session-description exchange (`offer` or `answer`), relayed verbatim.
///
/// `pieceID` is mandatory on offers — the receiving peer needs to know which
/// piece the data channel is being negotiated for. Answers may omit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(default)]
    pub from: String,
    pub to: String,
    #[serde(rename = "peerConnID")]
    pub peer_conn_id: String,
    pub sdp: String,
    #[serde(rename = "pieceID", default, skip_serializing_if = "Option::is_none")]
    pub piece_id: Option<String>,
}

/// Ask which pieces have ever been advertised for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
}

/// Advertise or retract one held piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "peerID", default)]
    pub peer_id: String,
    pub name: String,
    #[serde(rename = "pieceID")]
    pub piece_id: String,
    pub action: PieceAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceAction {
    Add,
    Remove,
}

/// Ask which peers currently hold a piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Need {
    pub name: String,
    #[serde(rename = "pieceID")]
    pub piece_id: String,
}

/// The closed set of inbound messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    Join(Join),
    Forward(Forward),
    Offer(Signal),
    Answer(Signal),
    Info(Info),
    Action(Action),
    Need(Need),
}

/// Responses synthesized by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    JoinResponse {
        #[serde(rename = "peerID")]
        peer_id: String,
        #[serde(rename = "peerList")]
        peer_list: Vec<String>,
    },
    InfoResponse {
        name: String,
        #[serde(rename = "pieceList")]
        piece_list: Vec<String>,
    },
    NeedResponse {
        name: String,
        #[serde(rename = "pieceID")]
        piece_id: String,
        #[serde(rename = "peerList")]
        peer_list: Vec<String>,
    },
}

#[derive(Deserialize)]
struct Tag {
    r#type: String,
}

const KNOWN_TYPES: [&str; 7] = ["join", "forward", "offer", "answer", "info", "action", "need"];

/// Decode one inbound frame.
///
/// The tag is inspected before the full decode so that an unrecognized
/// `type` is reported as [`ProtocolError::UnknownType`] rather than a
/// generic parse failure. Sender fields are whatever the wire said —
/// callers must [`Request::stamp_sender`] before trusting them.
pub fn parse_request(text: &str) -> Result<Request, ProtocolError> {
    let tag: Tag =
        serde_json::from_str(text).map_err(|e| ProtocolError::Validation(e.to_string()))?;
    if !KNOWN_TYPES.contains(&tag.r#type.as_str()) {
        return Err(ProtocolError::UnknownType(tag.r#type));
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::Validation(e.to_string()))
}

impl Request {
    /// Overwrite the sender-identifying field with the server's
    /// authoritative peer ID. Peers cannot forge messages as one another:
    /// whatever they put in `from` / `peerID` is discarded here.
    pub fn stamp_sender(&mut self, peer_id: &str) {
        match self {
            Request::Forward(f) => f.from = peer_id.to_string(),
            Request::Offer(s) | Request::Answer(s) => s.from = peer_id.to_string(),
            Request::Action(a) => a.peer_id = peer_id.to_string(),
            Request::Join(_) | Request::Info(_) | Request::Need(_) => {}
        }
    }

    /// Reject frames whose required fields are present but empty.
    ///
    /// An empty string is treated the same as an absent field, matching the
    /// behavior peers already rely on.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Request::Join(j) => require(&j.file_id, "fileID", "join"),
            Request::Forward(f) => {
                require(&f.from, "from", "forward")?;
                require(&f.to, "to", "forward")?;
                require(&f.data, "data", "forward")
            }
            Request::Offer(s) => {
                validate_signal(s, "offer")?;
                match s.piece_id.as_deref() {
                    Some(p) if !p.is_empty() => Ok(()),
                    _ => Err(missing("pieceID", "offer")),
                }
            }
            Request::Answer(s) => {
                validate_signal(s, "answer")?;
                match s.piece_id.as_deref() {
                    Some("") => Err(missing("pieceID", "answer")),
                    _ => Ok(()),
                }
            }
            Request::Info(i) => require(&i.name, "name", "info"),
            Request::Action(a) => {
                require(&a.peer_id, "peerID", "action")?;
                require(&a.name, "name", "action")?;
                require(&a.piece_id, "pieceID", "action")
            }
            Request::Need(n) => {
                require(&n.name, "name", "need")?;
                require(&n.piece_id, "pieceID", "need")
            }
        }
    }
}

fn validate_signal(s: &Signal, kind: &str) -> Result<(), ProtocolError> {
    require(&s.from, "from", kind)?;
    require(&s.to, "to", kind)?;
    require(&s.peer_conn_id, "peerConnID", kind)?;
    require(&s.sdp, "sdp", kind)
}

fn require(value: &str, field: &str, kind: &str) -> Result<(), ProtocolError> {
    if value.is_empty() {
        Err(missing(field, kind))
    } else {
        Ok(())
    }
}

fn missing(field: &str, kind: &str) -> ProtocolError {
    ProtocolError::Validation(format!("no {field} field in {kind} message"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> Request {
        parse_request(text).expect("should parse")
    }

    #[test]
    fn parses_every_request_kind() {
        assert!(matches!(
            parse_ok(r#"{"type":"join","fileID":"f1"}"#),
            Request::Join(_)
        ));
        assert!(matches!(
            parse_ok(r#"{"type":"forward","from":"a","to":"b","data":"x"}"#),
            Request::Forward(_)
        ));
        assert!(matches!(
            parse_ok(
                r#"{"type":"offer","from":"a","to":"b","peerConnID":"pc1","sdp":"v=0","pieceID":"p1"}"#
            ),
            Request::Offer(_)
        ));
        assert!(matches!(
            parse_ok(r#"{"type":"answer","from":"a","to":"b","peerConnID":"pc1","sdp":"v=0"}"#),
            Request::Answer(_)
        ));
        assert!(matches!(
            parse_ok(r#"{"type":"info","name":"f1"}"#),
            Request::Info(_)
        ));
        assert!(matches!(
            parse_ok(r#"{"type":"action","name":"f1","pieceID":"p1","action":"add"}"#),
            Request::Action(_)
        ));
        assert!(matches!(
            parse_ok(r#"{"type":"need","name":"f1","pieceID":"p1"}"#),
            Request::Need(_)
        ));
    }

    #[test]
    fn unknown_tag_is_its_own_error() {
        let err = parse_request(r#"{"type":"bogus","x":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(t) if t == "bogus"));
    }

    #[test]
    fn missing_tag_is_validation_error() {
        let err = parse_request(r#"{"fileID":"f1"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn non_json_is_validation_error() {
        let err = parse_request("not json at all").unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn missing_required_field_is_validation_error() {
        let err = parse_request(r#"{"type":"join"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));

        let err = parse_request(r#"{"type":"need","name":"f1"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn action_outside_add_remove_is_rejected() {
        let err = parse_request(r#"{"type":"action","name":"f1","pieceID":"p1","action":"purge"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn empty_fields_fail_validation() {
        let req = parse_ok(r#"{"type":"join","fileID":""}"#);
        assert!(req.validate().is_err());

        let mut req = parse_ok(r#"{"type":"forward","to":"b","data":""}"#);
        req.stamp_sender("A");
        assert!(req.validate().is_err());
    }

    #[test]
    fn offer_requires_piece_id_answer_does_not() {
        let mut offer =
            parse_ok(r#"{"type":"offer","from":"x","to":"b","peerConnID":"pc","sdp":"v=0"}"#);
        offer.stamp_sender("A");
        assert!(offer.validate().is_err());

        let mut answer =
            parse_ok(r#"{"type":"answer","from":"x","to":"b","peerConnID":"pc","sdp":"v=0"}"#);
        answer.stamp_sender("A");
        assert!(answer.validate().is_ok());
    }

    #[test]
    fn stamp_overwrites_wire_sender() {
        let mut req = parse_ok(r#"{"type":"forward","from":"IMPOSTER","to":"b","data":"hi"}"#);
        req.stamp_sender("A");
        match &req {
            Request::Forward(f) => assert_eq!(f.from, "A"),
            other => panic!("unexpected variant: {other:?}"),
        }

        let mut req = parse_ok(r#"{"type":"action","peerID":"IMPOSTER","name":"f","pieceID":"p","action":"add"}"#);
        req.stamp_sender("A");
        match &req {
            Request::Action(a) => assert_eq!(a.peer_id, "A"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn forward_reserializes_with_exact_field_names() {
        let mut req = parse_ok(r#"{"type":"forward","from":"IMPOSTER","to":"B","data":"hello"}"#);
        req.stamp_sender("A");
        let out: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            out,
            serde_json::json!({"type":"forward","from":"A","to":"B","data":"hello"})
        );
    }

    #[test]
    fn offer_keeps_wire_casing_on_reserialize() {
        let req = parse_ok(
            r#"{"type":"offer","from":"a","to":"b","peerConnID":"pc1","sdp":"v=0","pieceID":"p1"}"#,
        );
        let out = serde_json::to_value(&req).unwrap();
        assert_eq!(out["type"], "offer");
        assert_eq!(out["peerConnID"], "pc1");
        assert_eq!(out["pieceID"], "p1");
    }

    #[test]
    fn answer_without_piece_id_omits_the_field() {
        let req = parse_ok(r#"{"type":"answer","from":"a","to":"b","peerConnID":"pc1","sdp":"v=0"}"#);
        let out = serde_json::to_value(&req).unwrap();
        assert!(out.get("pieceID").is_none());
    }

    #[test]
    fn responses_serialize_with_wire_tags() {
        let resp = Response::JoinResponse {
            peer_id: "A".into(),
            peer_list: vec!["A".into()],
        };
        let out = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            out,
            serde_json::json!({"type":"joinResponse","peerID":"A","peerList":["A"]})
        );

        let resp = Response::NeedResponse {
            name: "f1".into(),
            piece_id: "p7".into(),
            peer_list: vec![],
        };
        let out = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            out,
            serde_json::json!({"type":"needResponse","name":"f1","pieceID":"p7","peerList":[]})
        );

        let resp = Response::InfoResponse {
            name: "f1".into(),
            piece_list: vec!["p1".into()],
        };
        let out = serde_json::to_value(&resp).unwrap();
        assert_eq!(out["type"], "infoResponse");
        assert_eq!(out["pieceList"], serde_json::json!(["p1"]));
    }
}
