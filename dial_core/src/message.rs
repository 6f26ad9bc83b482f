//! Messages, their scheduling metadata and the causal message tree.

use crate::address::Address;
use crate::color::Color;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Logical simulation time.
pub type Time = u64;

/// Free-form payload carried by messages and states.
pub type Payload = serde_json::Map<String, Value>;

/// A point on the logical clock: arrival time plus index within that time.
///
/// Ordering is lexicographic, `time` first, which gives the total
/// delivery order of the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub time: Time,
    pub theta: usize,
}

impl Position {
    /// The very first position, `(0, 0)`.
    pub const ORIGIN: Position = Position { time: 0, theta: 0 };

    pub const fn new(time: Time, theta: usize) -> Self {
        Self { time, theta }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.time, self.theta)
    }
}

/// Unique message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// The placeholder id of a message that has not been enqueued yet.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true for the placeholder id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A message travelling between algorithm instances.
///
/// The content (title, color, data, addresses) is fixed once the message
/// is enqueued, apart from explicit edits of pending messages. The
/// scheduling fields and the parent/child links are maintained by the
/// simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    title: String,
    color: Color,
    data: Payload,
    source: Address,
    target: Address,

    parent: Option<MessageId>,
    children: Vec<MessageId>,
    is_lost: bool,
    is_self_message: bool,
    self_message_delay: Option<Time>,
    creation: Position,
    arrival: Position,
}

impl Message {
    /// Creates a draft message from `source` to `target`.
    ///
    /// The id is assigned when the message enters a simulator.
    pub fn new(source: Address, target: Address) -> Self {
        Self {
            id: MessageId::nil(),
            title: String::new(),
            color: Color::default(),
            data: Payload::new(),
            source,
            target,
            parent: None,
            children: Vec::new(),
            is_lost: false,
            is_self_message: false,
            self_message_delay: None,
            creation: Position::ORIGIN,
            arrival: Position::ORIGIN,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = data;
        self
    }

    /// Sets a single payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Uses a caller-chosen id instead of a generated one.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Links an injected message to an already delivered parent.
    pub fn with_parent(mut self, parent: MessageId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Fixes the creation point of an initial message.
    pub fn created_at(mut self, creation: Position) -> Self {
        self.creation = creation;
        self
    }

    /// Marks an initial message as lost in transit.
    pub fn with_lost(mut self, lost: bool) -> Self {
        self.is_lost = lost;
        self
    }

    /// Fresh draft with the same content and addresses.
    pub fn copy(&self) -> Self {
        self.copy_with(self.source.clone(), self.target.clone())
    }

    /// Fresh draft with the same content, sent from `source` to `target`.
    pub fn copy_with(&self, source: Address, target: Address) -> Self {
        Self::new(source, target)
            .with_title(self.title.clone())
            .with_color(self.color)
            .with_data(self.data.clone())
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Returns a single payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    /// Id of the message whose delivery produced this one.
    pub fn parent(&self) -> Option<MessageId> {
        self.parent
    }

    /// Ids of the messages produced by delivering this one, in send order.
    pub fn children(&self) -> &[MessageId] {
        &self.children
    }

    pub fn is_lost(&self) -> bool {
        self.is_lost
    }

    pub fn is_self_message(&self) -> bool {
        self.is_self_message
    }

    pub fn self_message_delay(&self) -> Option<Time> {
        self.self_message_delay
    }

    pub fn creation(&self) -> Position {
        self.creation
    }

    pub fn arrival(&self) -> Position {
        self.arrival
    }

    /// Serializable view of this message.
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            id: self.id,
            parent: self.parent,
            children: self.children.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            color: self.color,
            title: self.title.clone(),
            creation: self.creation,
            arrival: self.arrival,
            is_lost: self.is_lost,
            is_self_message: self.is_self_message,
            self_message_delay: self.self_message_delay,
            data: self.data.clone(),
        }
    }

    pub(crate) fn set_id(&mut self, id: MessageId) {
        self.id = id;
        if self.title.is_empty() {
            self.title = id.to_string();
        }
    }

    pub(crate) fn set_arrival(&mut self, arrival: Position) {
        self.arrival = arrival;
    }

    pub(crate) fn set_creation(&mut self, creation: Position) {
        self.creation = creation;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<MessageId>) {
        self.parent = parent;
    }

    pub(crate) fn set_lost(&mut self, lost: bool) {
        self.is_lost = lost;
    }

    pub(crate) fn mark_self_message(&mut self, delay: Time) {
        self.is_self_message = true;
        self.self_message_delay = Some(delay);
    }

    pub(crate) fn push_child(&mut self, child: MessageId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: MessageId) {
        self.children.retain(|id| *id != child);
    }

    pub(crate) fn take_children(&mut self) -> Vec<MessageId> {
        std::mem::take(&mut self.children)
    }

    pub(crate) fn apply(&mut self, patch: MessagePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(data) = patch.data {
            self.data = data;
        }
        if let Some(source) = patch.source {
            self.source = source;
        }
        if let Some(target) = patch.target {
            self.target = target;
        }
    }
}

/// Serializable summary of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub parent: Option<MessageId>,
    pub children: Vec<MessageId>,
    pub source: Address,
    pub target: Address,
    pub color: Color,
    pub title: String,
    pub creation: Position,
    pub arrival: Position,
    pub is_lost: bool,
    pub is_self_message: bool,
    pub self_message_delay: Option<Time>,
    pub data: Payload,
}

/// Edit of a pending message's content. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessagePatch {
    pub title: Option<String>,
    pub color: Option<Color>,
    pub data: Option<Payload>,
    pub source: Option<Address>,
    pub target: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(node: &str) -> Address {
        Address::new(node, "flooding", "main")
    }

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(1, 5) < Position::new(2, 0));
        assert!(Position::new(2, 0) < Position::new(2, 1));
        assert_eq!(Position::ORIGIN, Position::default());
        assert_eq!(Position::new(3, 1).to_string(), "3/1");
    }

    #[test]
    fn test_builder() {
        let message = Message::new(address("A"), address("B"))
            .with_title("hello")
            .with_color(Color::RED)
            .with_field("hops", 3);

        assert!(message.id().is_nil());
        assert_eq!(message.title(), "hello");
        assert_eq!(message.color(), Color::RED);
        assert_eq!(message.field("hops"), Some(&Value::from(3)));
        assert_eq!(message.parent(), None);
        assert!(message.children().is_empty());
        assert!(!message.is_lost());
    }

    #[test]
    fn test_copy_drops_identity_and_links() {
        let mut original = Message::new(address("A"), address("B")).with_title("t");
        original.set_id(MessageId(Uuid::from_u128(7)));
        original.set_parent(Some(MessageId(Uuid::from_u128(1))));
        original.push_child(MessageId(Uuid::from_u128(9)));

        let copy = original.copy_with(address("B"), address("C"));
        assert!(copy.id().is_nil());
        assert_eq!(copy.parent(), None);
        assert!(copy.children().is_empty());
        assert_eq!(copy.title(), "t");
        assert_eq!(copy.source(), &address("B"));
        assert_eq!(copy.target(), &address("C"));
    }

    #[test]
    fn test_set_id_fills_empty_title() {
        let mut message = Message::new(address("A"), address("B"));
        let id = MessageId(Uuid::from_u128(42));
        message.set_id(id);
        assert_eq!(message.title(), id.to_string());
    }

    #[test]
    fn test_summary_json_shape() {
        let mut message = Message::new(address("A"), address("B")).with_title("x");
        message.set_arrival(Position::new(4, 2));
        let json = serde_json::to_value(message.summary()).unwrap();

        assert_eq!(json["source"], "A/flooding/main");
        assert_eq!(json["color"], "#FFFFFF");
        assert_eq!(json["arrival"]["time"], 4);
        assert_eq!(json["arrival"]["theta"], 2);
        assert_eq!(json["is_lost"], false);
    }

    #[test]
    fn test_summary_round_trips_through_json() {
        let mut message = Message::new(address("A"), address("B"))
            .with_field("hops", 3)
            .with_lost(true);
        message.set_arrival(Position::new(7, 1));
        let summary = message.summary();

        let json = serde_json::to_string(&summary).unwrap();
        let parsed: MessageSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);

        let mut value = serde_json::to_value(&summary).unwrap();
        value["target"] = "B/flooding/a/b".into();
        assert!(serde_json::from_value::<MessageSummary>(value).is_err());
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let patch: MessagePatch = serde_json::from_str(r##"{"color": "#00FF00"}"##).unwrap();
        assert_eq!(patch.color, Some(Color::GREEN));

        assert!(serde_json::from_str::<MessagePatch>(r#"{"arrival": 3}"#).is_err());
    }
}
