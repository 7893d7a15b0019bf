/// Client → server control messages
///
/// These carry a session's identity and topic interest. They are sent at most
/// once: while the live channel is down they are dropped, and the client
/// rebuilds the server's view by retransmitting its full topic set on reopen.
use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::topic::Topic;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Authenticate { user_id: Uuid },
    SubscribeClass { class_id: Uuid },
    UnsubscribeClass { class_id: Uuid },
    SubscribeOrganization { organization_id: Uuid },
    UnsubscribeOrganization { organization_id: Uuid },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPayload {
    user_id: Uuid,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassPayload {
    class_id: Uuid,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationPayload {
    organization_id: Uuid,
}

impl ControlMessage {
    pub const AUTHENTICATE: &'static str = "authenticate";
    pub const SUBSCRIBE_CLASS: &'static str = "subscribe_class";
    pub const UNSUBSCRIBE_CLASS: &'static str = "unsubscribe_class";
    pub const SUBSCRIBE_ORGANIZATION: &'static str = "subscribe_organization";
    pub const UNSUBSCRIBE_ORGANIZATION: &'static str = "unsubscribe_organization";

    /// Control message announcing interest in a topic
    pub fn subscribe(topic: Topic) -> Self {
        match topic {
            Topic::Class(class_id) => ControlMessage::SubscribeClass { class_id },
            Topic::Organization(organization_id) => {
                ControlMessage::SubscribeOrganization { organization_id }
            }
        }
    }

    /// Control message withdrawing interest in a topic
    pub fn unsubscribe(topic: Topic) -> Self {
        match topic {
            Topic::Class(class_id) => ControlMessage::UnsubscribeClass { class_id },
            Topic::Organization(organization_id) => {
                ControlMessage::UnsubscribeOrganization { organization_id }
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::Authenticate { .. } => Self::AUTHENTICATE,
            ControlMessage::SubscribeClass { .. } => Self::SUBSCRIBE_CLASS,
            ControlMessage::UnsubscribeClass { .. } => Self::UNSUBSCRIBE_CLASS,
            ControlMessage::SubscribeOrganization { .. } => Self::SUBSCRIBE_ORGANIZATION,
            ControlMessage::UnsubscribeOrganization { .. } => Self::UNSUBSCRIBE_ORGANIZATION,
        }
    }

    /// Topic this message refers to, if any
    pub fn topic(&self) -> Option<Topic> {
        match self {
            ControlMessage::Authenticate { .. } => None,
            ControlMessage::SubscribeClass { class_id }
            | ControlMessage::UnsubscribeClass { class_id } => Some(Topic::Class(*class_id)),
            ControlMessage::SubscribeOrganization { organization_id }
            | ControlMessage::UnsubscribeOrganization { organization_id } => {
                Some(Topic::Organization(*organization_id))
            }
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            ControlMessage::Authenticate { user_id } => {
                Envelope::new(self.kind(), &UserPayload { user_id: *user_id })
            }
            ControlMessage::SubscribeClass { class_id }
            | ControlMessage::UnsubscribeClass { class_id } => {
                Envelope::new(self.kind(), &ClassPayload { class_id: *class_id })
            }
            ControlMessage::SubscribeOrganization { organization_id }
            | ControlMessage::UnsubscribeOrganization { organization_id } => Envelope::new(
                self.kind(),
                &OrganizationPayload {
                    organization_id: *organization_id,
                },
            ),
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind.as_str() {
            Self::AUTHENTICATE => {
                let p: UserPayload = envelope.decode_data()?;
                Ok(ControlMessage::Authenticate { user_id: p.user_id })
            }
            Self::SUBSCRIBE_CLASS => {
                let p: ClassPayload = envelope.decode_data()?;
                Ok(ControlMessage::SubscribeClass { class_id: p.class_id })
            }
            Self::UNSUBSCRIBE_CLASS => {
                let p: ClassPayload = envelope.decode_data()?;
                Ok(ControlMessage::UnsubscribeClass { class_id: p.class_id })
            }
            Self::SUBSCRIBE_ORGANIZATION => {
                let p: OrganizationPayload = envelope.decode_data()?;
                Ok(ControlMessage::SubscribeOrganization {
                    organization_id: p.organization_id,
                })
            }
            Self::UNSUBSCRIBE_ORGANIZATION => {
                let p: OrganizationPayload = envelope.decode_data()?;
                Ok(ControlMessage::UnsubscribeOrganization {
                    organization_id: p.organization_id,
                })
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.to_envelope()?.to_json()
    }

    /// Parse a raw text frame into a control message
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(&Envelope::parse(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_subscribe_class_wire_shape() {
        let class_id = Uuid::new_v4();
        let json = ControlMessage::subscribe(Topic::class(class_id)).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "subscribe_class");
        assert_eq!(value["data"]["classId"], class_id.to_string());
    }

    #[test]
    fn test_authenticate_parses() {
        let user_id = Uuid::new_v4();
        let text = format!(
            r#"{{"type":"authenticate","data":{{"userId":"{}"}},"timestamp":1}}"#,
            user_id
        );
        assert_eq!(
            ControlMessage::from_json(&text).unwrap(),
            ControlMessage::Authenticate { user_id }
        );
    }

    #[test]
    fn test_organization_topic_maps_both_ways() {
        let org = Uuid::new_v4();
        let sub = ControlMessage::subscribe(Topic::organization(org));
        let unsub = ControlMessage::unsubscribe(Topic::organization(org));

        assert_eq!(sub.kind(), "subscribe_organization");
        assert_eq!(unsub.kind(), "unsubscribe_organization");
        assert_eq!(sub.topic(), Some(Topic::organization(org)));
        assert_eq!(unsub.topic(), Some(Topic::organization(org)));
    }

    #[test]
    fn test_unknown_control_type() {
        let err = ControlMessage::from_json(r#"{"type":"shutdown","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(t) if t == "shutdown"));
    }

    #[test]
    fn test_bad_class_id_is_invalid_payload() {
        let err =
            ControlMessage::from_json(r#"{"type":"subscribe_class","data":{"classId":"nope"}}"#)
                .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }
}
