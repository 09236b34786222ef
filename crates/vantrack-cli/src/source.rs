//! JSON-file implementations of the engine's source traits.

use std::{
  future::Future,
  path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use vantrack_core::{
  catalog::CatalogDefinition,
  source::{BoardMention, BoardSource, CatalogSource, UnitDetail, UnitLoader},
};

use crate::error::SourceError;

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
  let bytes = tokio::fs::read(path)
    .await
    .map_err(|source| SourceError::Io { path: path.to_path_buf(), source })?;
  serde_json::from_slice(&bytes)
    .map_err(|source| SourceError::Json { path: path.to_path_buf(), source })
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileCatalogSource {
  path: PathBuf,
}

impl FileCatalogSource {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl CatalogSource for FileCatalogSource {
  type Error = SourceError;

  fn load_catalog(
    &self,
  ) -> impl Future<Output = Result<CatalogDefinition, SourceError>> + Send + '_ {
    read_json(&self.path)
  }
}

// ─── Board ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileBoardSource {
  path: PathBuf,
}

impl FileBoardSource {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl BoardSource for FileBoardSource {
  type Error = SourceError;

  fn list_board(
    &self,
  ) -> impl Future<Output = Result<Vec<BoardMention>, SourceError>> + Send + '_ {
    read_json(&self.path)
  }
}

// ─── Unit detail ─────────────────────────────────────────────────────────────

/// Reads `<details_dir>/<external id>.json` for each unit, and searches the
/// board listing for unit names when an id has to be looked up.
#[derive(Debug, Clone)]
pub struct FileUnitLoader {
  details_dir: PathBuf,
  board_path:  PathBuf,
}

impl FileUnitLoader {
  pub fn new(details_dir: impl Into<PathBuf>, board_path: impl Into<PathBuf>) -> Self {
    Self {
      details_dir: details_dir.into(),
      board_path:  board_path.into(),
    }
  }

  fn detail_path(&self, external_id: &str) -> Result<PathBuf, SourceError> {
    let valid = !external_id.is_empty()
      && external_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
      return Err(SourceError::InvalidExternalId(external_id.to_string()));
    }
    Ok(self.details_dir.join(format!("{external_id}.json")))
  }
}

impl UnitLoader for FileUnitLoader {
  type Error = SourceError;

  fn load_unit<'a>(
    &'a self,
    external_id: &'a str,
  ) -> impl Future<Output = Result<UnitDetail, SourceError>> + Send + 'a {
    async move {
      let path = self.detail_path(external_id)?;
      read_json(&path).await
    }
  }

  /// Board ids of every listing entry whose name equals `unit_name`,
  /// ignoring case.
  fn search_boards<'a>(
    &'a self,
    unit_name: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, SourceError>> + Send + 'a {
    async move {
      let mentions: Vec<BoardMention> = read_json(&self.board_path).await?;
      let mut ids: Vec<String> = mentions
        .into_iter()
        .filter(|m| m.name.trim().eq_ignore_ascii_case(unit_name))
        .filter_map(|m| m.external_id)
        .collect();
      ids.sort();
      ids.dedup();
      Ok(ids)
    }
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vantrack-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
  }

  const BOARD: &str = r#"[
    { "name": "G2-1", "external_id": "b1", "due": "2024-04-01T00:00:00Z" },
    { "name": "g2-2", "external_id": "b2" },
    { "name": "G2-2", "external_id": "b9" },
    { "name": "G2-3" }
  ]"#;

  #[tokio::test]
  async fn loads_unit_detail_by_external_id() {
    let dir = scratch_dir();
    fs::write(
      dir.join("b1.json"),
      r#"{ "cards": [
        { "type": "job", "card_id": "c1", "name": "Fit loom", "list_name": "Bay 1",
          "moved_at": "2024-03-01T08:00:00Z", "task_minutes": 90 },
        { "type": "red", "card_id": "c2", "name": "Cracked panel", "flag_issue": "damage" }
      ] }"#,
    )
    .unwrap();
    let loader = FileUnitLoader::new(&dir, dir.join("board.json"));

    let detail = loader.load_unit("b1").await.unwrap();
    assert_eq!(detail.cards.len(), 2);
    assert_eq!(detail.cards[0].card_id(), "c1");
    assert_eq!(detail.cards[0].data().list_name.as_deref(), Some("Bay 1"));

    let missing = loader.load_unit("b404").await.unwrap_err();
    assert!(matches!(missing, SourceError::Io { .. }));
    fs::remove_dir_all(dir).ok();
  }

  #[tokio::test]
  async fn rejects_ids_that_are_not_file_names() {
    let dir = scratch_dir();
    let loader = FileUnitLoader::new(&dir, dir.join("board.json"));
    let err = loader.load_unit("../secrets").await.unwrap_err();
    assert!(matches!(err, SourceError::InvalidExternalId(_)));
    fs::remove_dir_all(dir).ok();
  }

  #[tokio::test]
  async fn searches_the_board_listing_by_name() {
    let dir = scratch_dir();
    let board = dir.join("board.json");
    fs::write(&board, BOARD).unwrap();
    let loader = FileUnitLoader::new(&dir, &board);

    assert_eq!(loader.search_boards("G2-1").await.unwrap(), ["b1"]);
    assert_eq!(loader.search_boards("G2-2").await.unwrap(), ["b2", "b9"]);
    assert!(loader.search_boards("G2-3").await.unwrap().is_empty());

    let mentions = FileBoardSource::new(&board).list_board().await.unwrap();
    assert_eq!(mentions.len(), 4);
    assert!(mentions[0].due.is_some());
    fs::remove_dir_all(dir).ok();
  }

  #[tokio::test]
  async fn malformed_catalog_is_a_parse_error() {
    let dir = scratch_dir();
    let path = dir.join("catalog.json");
    fs::write(&path, "{ not json").unwrap();
    let err = FileCatalogSource::new(&path).load_catalog().await.unwrap_err();
    assert!(matches!(err, SourceError::Json { .. }));
    fs::remove_dir_all(dir).ok();
  }
}
