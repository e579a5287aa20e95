//! Slack Block Kit types.
//!
//! Only the subset needed for deployment notifications and approval buttons.
//!
//! See: <https://api.slack.com/block-kit>

use serde::{Deserialize, Serialize};

/// Message posted to an incoming webhook or an interaction `response_url`
#[derive(Debug, Clone, Serialize)]
pub struct WebhookMessage {
    pub blocks: Vec<Block>,

    /// Plain text fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Replace the message that carried the clicked button
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replace_original: bool,
}

impl WebhookMessage {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            text: None,
            replace_original: false,
        }
    }

    #[must_use]
    pub fn replacing_original(mut self, replace: bool) -> Self {
        self.replace_original = replace;
        self
    }
}

/// Block Kit block types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Section with a text and/or two-column fields
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<Text>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<Text>>,
    },
    Context {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<Text>,
    },
    Actions {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<ActionElement>,
    },
    Divider,
}

impl Block {
    /// Section holding a single markdown text
    pub fn text(text: impl Into<String>) -> Self {
        Block::Section {
            text: Some(Text::mrkdwn(text)),
            fields: None,
        }
    }

    /// Section holding markdown fields
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Block::Section {
            text: None,
            fields: Some(fields.into_iter().map(Text::mrkdwn).collect()),
        }
    }
}

/// Text object types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Text {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl Text {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText {
            text: text.into(),
            emoji: true,
        }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

/// Action block elements
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button {
        text: Text,
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<ButtonStyle>,
    },
}

/// Button style (affects color)
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

// =============================================================================
// Interaction payloads
// =============================================================================

/// Slack interaction payload from button clicks
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type", default)]
    pub interaction_type: Option<String>,
    pub user: InteractionUser,
    #[serde(default)]
    pub actions: Vec<InteractionAction>,
    #[serde(default)]
    pub response_url: Option<String>,
}

/// User who triggered an interaction
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Action that was triggered
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionAction {
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}
