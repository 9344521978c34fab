use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flag marking a message as visible only to the invoking user.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Autocomplete,
    ModalSubmit,
}

impl TryFrom<u8> for InteractionKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(InteractionKind::Ping),
            2 => Ok(InteractionKind::ApplicationCommand),
            3 => Ok(InteractionKind::MessageComponent),
            4 => Ok(InteractionKind::Autocomplete),
            5 => Ok(InteractionKind::ModalSubmit),
            other => Err(format!("unknown interaction type {}", other)),
        }
    }
}

// Inbound interaction payloads
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: Option<InteractionData>,
}

impl Interaction {
    /// Guild interactions carry the user inside `member`, DMs carry it directly.
    pub fn user_id(&self) -> Option<&str> {
        self.member
            .as_ref()
            .map(|m| m.user.id.as_str())
            .or_else(|| self.user.as_ref().map(|u| u.id.as_str()))
    }

    pub fn roles(&self) -> &[String] {
        self.member.as_ref().map(|m| m.roles.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

impl InteractionData {
    pub fn option(&self, name: &str) -> Option<&CommandOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn focused(&self) -> Option<&CommandOption> {
        self.options.iter().find(|o| o.focused)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub focused: bool,
}

impl CommandOption {
    /// Option value rendered as text; integer options become their decimal form.
    pub fn as_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

// Outbound message payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
    #[serde(skip)]
    pub file: Option<FileUpload>,
}

impl MessagePayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Self::default()
        }
    }

    pub fn ephemeral(mut self) -> Self {
        self.flags = Some(self.flags.unwrap_or(0) | EPHEMERAL_FLAG);
        self
    }

    pub fn is_ephemeral(&self) -> bool {
        self.flags.map_or(false, |f| f & EPHEMERAL_FLAG != 0)
    }

    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components;
        self
    }

    /// Attaches a local file; the upload is referenced as attachment 0.
    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.attachments = vec![AttachmentRef {
            id: 0,
            filename: file.filename.clone(),
        }];
        self.file = Some(file);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentRef {
    pub id: u32,
    pub filename: String,
}

/// Local file sent alongside a message as multipart form data.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub path: std::path::PathBuf,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
}

/// Message component. Action rows, buttons and string selects share one
/// flat shape keyed by `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl Component {
    pub const ACTION_ROW: u8 = 1;
    pub const BUTTON: u8 = 2;
    pub const STRING_SELECT: u8 = 3;

    pub fn row(components: Vec<Component>) -> Self {
        Self {
            kind: Self::ACTION_ROW,
            components,
            ..Self::default()
        }
    }

    pub fn button(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            kind: Self::BUTTON,
            custom_id: Some(custom_id.into()),
            label: Some(label.into()),
            style: Some(style as u8),
            ..Self::default()
        }
    }

    pub fn select(
        custom_id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self {
            kind: Self::STRING_SELECT,
            custom_id: Some(custom_id.into()),
            placeholder: Some(placeholder.into()),
            min_values: Some(1),
            max_values: Some(1),
            options,
            ..Self::default()
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[cfg(test)]
    /// Depth-first walk over this component and its children.
    pub fn walk(&self) -> Vec<&Component> {
        let mut out = vec![self];
        for child in &self.components {
            out.extend(child.walk());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Pong = 1,
    ChannelMessage = 4,
    DeferredUpdateMessage = 6,
    AutocompleteResult = 8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallbackData {
    Message(MessagePayload),
    Choices { choices: Vec<Choice> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CallbackData>,
}

impl InteractionResponse {
    fn new(kind: CallbackKind, data: Option<CallbackData>) -> Self {
        Self { kind: kind as u8, data }
    }

    pub fn pong() -> Self {
        Self::new(CallbackKind::Pong, None)
    }

    pub fn message(payload: MessagePayload) -> Self {
        Self::new(CallbackKind::ChannelMessage, Some(CallbackData::Message(payload)))
    }

    pub fn deferred_update() -> Self {
        Self::new(CallbackKind::DeferredUpdateMessage, None)
    }

    pub fn autocomplete(choices: Vec<Choice>) -> Self {
        Self::new(CallbackKind::AutocompleteResult, Some(CallbackData::Choices { choices }))
    }

    pub fn payload(&self) -> Option<&MessagePayload> {
        match &self.data {
            Some(CallbackData::Message(payload)) => Some(payload),
            _ => None,
        }
    }
}
