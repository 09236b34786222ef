//! Cards mirrored from the external card-tracking tool.
//!
//! Job, red and yellow cards share one data shape ([`CardData`]); the
//! variant carries whatever is specific to that kind of card.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardStatus {
  #[default]
  Unknown,
  NotStarted,
  InProgress,
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
  #[default]
  Incomplete,
  Complete,
}

// ─── Card contents ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckItem {
  pub check_item_id: String,
  pub name:          String,
  #[serde(default)]
  pub state:         CheckState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
  pub checklist_id: String,
  pub name:         String,
  #[serde(default)]
  pub items:        Vec<CheckItem>,
}

impl Checklist {
  pub fn completed_items(&self) -> usize {
    self
      .items
      .iter()
      .filter(|i| i.state == CheckState::Complete)
      .count()
  }

  pub fn is_complete(&self) -> bool {
    self.completed_items() == self.items.len()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id: String,
  pub author:     Option<String>,
  pub text:       String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
  pub attachment_id: String,
  pub name:          String,
  pub url:           String,
  pub added_at:      Option<DateTime<Utc>>,
}

/// Fields common to every card kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardData {
  /// The card's id in the external tool.
  pub card_id:        String,
  pub name:           String,
  #[serde(default)]
  pub status:         CardStatus,
  /// Name of the list (column) holding the card. Used as a hint to resolve
  /// the card's production position.
  #[serde(default)]
  pub list_name:      Option<String>,
  /// When the card moved into `list_name`.
  #[serde(default)]
  pub moved_at:       Option<DateTime<Utc>>,
  #[serde(default)]
  pub area_of_origin: Option<String>,
  #[serde(default)]
  pub created_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_at:   Option<DateTime<Utc>>,
  #[serde(default)]
  pub checklists:     Vec<Checklist>,
  #[serde(default)]
  pub comments:       Vec<Comment>,
  #[serde(default)]
  pub attachments:    Vec<Attachment>,
}

// ─── Card ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCard {
  #[serde(flatten)]
  pub data:         CardData,
  /// Estimated labour for the task.
  #[serde(default)]
  pub task_minutes: Option<u32>,
}

/// A defect that blocks progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedCard {
  #[serde(flatten)]
  pub data:       CardData,
  #[serde(default)]
  pub flag_issue: Option<String>,
}

/// A back-ordered part or other non-blocking issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YellowCard {
  #[serde(flatten)]
  pub data: CardData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CardKind {
  Job,
  Red,
  Yellow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Card {
  Job(JobCard),
  Red(RedCard),
  Yellow(YellowCard),
}

impl Card {
  pub fn kind(&self) -> CardKind {
    match self {
      Self::Job(_) => CardKind::Job,
      Self::Red(_) => CardKind::Red,
      Self::Yellow(_) => CardKind::Yellow,
    }
  }

  pub fn data(&self) -> &CardData {
    match self {
      Self::Job(c) => &c.data,
      Self::Red(c) => &c.data,
      Self::Yellow(c) => &c.data,
    }
  }

  pub fn card_id(&self) -> &str { &self.data().card_id }

  pub fn status(&self) -> CardStatus { self.data().status }

  pub fn is_open(&self) -> bool { self.status() != CardStatus::Completed }
}
