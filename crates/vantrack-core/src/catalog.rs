//! The location catalog: workspaces, lines, models and every line-location,
//! loaded once at startup and immutable afterwards.

use std::{collections::BTreeMap, sync::Arc};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::CatalogError,
  location::{
    AreaOfOrigin, LineLocation, Line, Location, LocationType, Model, Sentinels,
    Workspace,
  },
  unit::UnitName,
};

// ─── Definition (input) ──────────────────────────────────────────────────────

/// The serialised shape of a catalog as returned by a catalog source.
/// Lines are referenced by name within their workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDefinition {
  pub workspaces: Vec<WorkspaceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDefinition {
  pub name:      String,
  #[serde(default)]
  pub lines:     Vec<LineDefinition>,
  #[serde(default)]
  pub locations: Vec<LocationDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDefinition {
  pub name:            String,
  #[serde(default)]
  pub models:          Vec<ModelDefinition>,
  #[serde(default)]
  pub areas_of_origin: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
  pub name:   String,
  pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationDefinition {
  pub name:          String,
  #[serde(default)]
  pub description:   Option<String>,
  pub location_type: LocationType,
  #[serde(default)]
  pub bindings:      Vec<BindingDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingDefinition {
  /// Line name; required.
  #[serde(default)]
  pub line:            Option<String>,
  /// Order along the line. For bays this is the bay number and is required.
  #[serde(default)]
  pub order:           Option<Decimal>,
  /// Display names keyed by service type.
  #[serde(default)]
  pub display_names:   BTreeMap<String, String>,
  #[serde(default)]
  pub inventory_names: Vec<String>,
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Input to [`CatalogBuilder::add_location`].
#[derive(Debug, Clone)]
pub struct NewLocation {
  pub workspace_id:  Uuid,
  pub name:          String,
  pub description:   Option<String>,
  pub location_type: LocationType,
  pub bindings:      Vec<NewBinding>,
}

impl NewLocation {
  /// A bay on a single line, numbered `bay_number`.
  pub fn bay(
    workspace_id: Uuid,
    name: impl Into<String>,
    line_id: Option<Uuid>,
    bay_number: Option<Decimal>,
  ) -> Self {
    Self {
      workspace_id,
      name: name.into(),
      description: None,
      location_type: LocationType::Bay,
      bindings: vec![NewBinding::new(line_id, bay_number)],
    }
  }
}

/// A line binding for a [`NewLocation`].
#[derive(Debug, Clone, Default)]
pub struct NewBinding {
  pub line_id:         Option<Uuid>,
  pub order:           Option<Decimal>,
  pub display_names:   BTreeMap<String, String>,
  pub inventory_names: Vec<String>,
}

impl NewBinding {
  pub fn new(line_id: Option<Uuid>, order: Option<Decimal>) -> Self {
    Self { line_id, order, ..Default::default() }
  }

  pub fn display_name(
    mut self,
    service_type: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    self.display_names.insert(service_type.into(), name.into());
    self
  }
}

/// Incrementally assembles a [`Catalog`], validating each addition.
pub struct CatalogBuilder {
  sentinels:    Sentinels,
  service_type: String,
  workspaces:   Vec<Workspace>,
  lines:        Vec<Line>,
  models:       Vec<Arc<Model>>,
  areas:        Vec<AreaOfOrigin>,
  locations:    Vec<Arc<Location>>,
  bindings:     Vec<Arc<LineLocation>>,
}

impl CatalogBuilder {
  /// `service_type` selects which display names are used when resolving
  /// external list names.
  pub fn new(sentinels: Sentinels, service_type: impl Into<String>) -> Self {
    Self {
      sentinels,
      service_type: service_type.into(),
      workspaces: Vec::new(),
      lines: Vec::new(),
      models: Vec::new(),
      areas: Vec::new(),
      locations: Vec::new(),
      bindings: Vec::new(),
    }
  }

  pub fn add_workspace(&mut self, name: impl Into<String>) -> Uuid {
    let workspace_id = Uuid::new_v4();
    self.workspaces.push(Workspace { workspace_id, name: name.into() });
    workspace_id
  }

  pub fn add_line(
    &mut self,
    workspace_id: Uuid,
    name: impl Into<String>,
  ) -> Result<Uuid, CatalogError> {
    if !self.workspaces.iter().any(|w| w.workspace_id == workspace_id) {
      return Err(CatalogError::UnknownWorkspace(workspace_id.to_string()));
    }
    let line_id = Uuid::new_v4();
    self.lines.push(Line { line_id, workspace_id, name: name.into() });
    Ok(line_id)
  }

  pub fn add_model(
    &mut self,
    line_id: Uuid,
    name: impl Into<String>,
    prefix: impl Into<String>,
  ) -> Result<Uuid, CatalogError> {
    self.line_name(line_id)?;
    let prefix = prefix.into();
    if self
      .models
      .iter()
      .any(|m| m.prefix.eq_ignore_ascii_case(&prefix))
    {
      return Err(CatalogError::DuplicateModelPrefix { prefix });
    }
    let model_id = Uuid::new_v4();
    self.models.push(Arc::new(Model {
      model_id,
      line_id,
      name: name.into(),
      prefix,
    }));
    Ok(model_id)
  }

  pub fn add_area_of_origin(
    &mut self,
    line_id: Uuid,
    name: impl Into<String>,
  ) -> Result<Uuid, CatalogError> {
    self.line_name(line_id)?;
    let area_id = Uuid::new_v4();
    self.areas.push(AreaOfOrigin { area_id, line_id, name: name.into() });
    Ok(area_id)
  }

  /// Add a location and its line bindings. Bays must name a line and a bay
  /// number, and may not share an order with another bay on the same line.
  pub fn add_location(&mut self, input: NewLocation) -> Result<Uuid, CatalogError> {
    if !self.workspaces.iter().any(|w| w.workspace_id == input.workspace_id) {
      return Err(CatalogError::UnknownWorkspace(input.workspace_id.to_string()));
    }
    let is_bay = input.location_type == LocationType::Bay;
    if is_bay && input.bindings.is_empty() {
      return Err(CatalogError::MissingLine { name: input.name });
    }

    // Validate every binding before touching the catalog.
    let mut resolved: Vec<(Uuid, String, Decimal, NewBinding)> = Vec::new();
    for binding in input.bindings {
      let Some(line_id) = binding.line_id else {
        return Err(CatalogError::MissingLine { name: input.name });
      };
      let line_name = self.line_name(line_id)?.to_string();
      let order = match binding.order {
        Some(order) => order,
        None if is_bay => {
          return Err(CatalogError::MissingBayNumber { name: input.name });
        }
        None => Decimal::ZERO,
      };
      if is_bay {
        let collides = self
          .bindings
          .iter()
          .filter(|b| b.location_type() == LocationType::Bay)
          .map(|b| (b.line_id, b.order))
          .chain(resolved.iter().map(|(l, _, o, _)| (Some(*l), *o)))
          .any(|(l, o)| l == Some(line_id) && o == order);
        if collides {
          return Err(CatalogError::DuplicateBayOrder {
            name: input.name,
            line: line_name,
            order,
          });
        }
      }
      resolved.push((line_id, line_name, order, binding));
    }

    let location_id = Uuid::new_v4();
    let location = Arc::new(Location {
      location_id,
      workspace_id: Some(input.workspace_id),
      name: input.name,
      description: input.description,
      location_type: input.location_type,
    });
    for (line_id, line_name, order, binding) in resolved {
      self.bindings.push(Arc::new(LineLocation {
        binding_id: Uuid::new_v4(),
        line_id: Some(line_id),
        line_name: Some(line_name),
        order,
        location: Arc::clone(&location),
        display_names: binding.display_names,
        inventory_names: binding.inventory_names,
      }));
    }
    self.locations.push(location);
    Ok(location_id)
  }

  pub fn build(mut self) -> Catalog {
    self
      .bindings
      .sort_by(|a, b| LineLocation::compare(a, b));
    Catalog {
      sentinels:    self.sentinels,
      service_type: self.service_type,
      workspaces:   self.workspaces,
      lines:        self.lines,
      models:       self.models,
      areas:        self.areas,
      locations:    self.locations,
      bindings:     self.bindings,
    }
  }

  fn line_name(&self, line_id: Uuid) -> Result<&str, CatalogError> {
    self
      .lines
      .iter()
      .find(|l| l.line_id == line_id)
      .map(|l| l.name.as_str())
      .ok_or(CatalogError::UnknownLineId(line_id))
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Every known location and line-location, plus the shared sentinels.
#[derive(Debug, Clone)]
pub struct Catalog {
  sentinels:    Sentinels,
  service_type: String,
  workspaces:   Vec<Workspace>,
  lines:        Vec<Line>,
  models:       Vec<Arc<Model>>,
  areas:        Vec<AreaOfOrigin>,
  locations:    Vec<Arc<Location>>,
  /// Sorted by `(order, line)`.
  bindings:     Vec<Arc<LineLocation>>,
}

impl Catalog {
  /// Build a catalog from its serialised definition, applying the same
  /// validation as [`CatalogBuilder`].
  pub fn from_definition(
    definition: &CatalogDefinition,
    sentinels: Sentinels,
    service_type: impl Into<String>,
  ) -> Result<Self, CatalogError> {
    let mut builder = CatalogBuilder::new(sentinels, service_type);
    for ws in &definition.workspaces {
      let workspace_id = builder.add_workspace(&ws.name);
      let mut line_ids: BTreeMap<&str, Uuid> = BTreeMap::new();
      for line in &ws.lines {
        let line_id = builder.add_line(workspace_id, &line.name)?;
        line_ids.insert(line.name.as_str(), line_id);
        for model in &line.models {
          builder.add_model(line_id, &model.name, &model.prefix)?;
        }
        for area in &line.areas_of_origin {
          builder.add_area_of_origin(line_id, area)?;
        }
      }
      for loc in &ws.locations {
        let mut bindings = Vec::with_capacity(loc.bindings.len());
        for b in &loc.bindings {
          let line_id = match &b.line {
            Some(name) => Some(
              *line_ids
                .get(name.as_str())
                .ok_or_else(|| CatalogError::UnknownLine(name.clone()))?,
            ),
            None => None,
          };
          bindings.push(NewBinding {
            line_id,
            order: b.order,
            display_names: b.display_names.clone(),
            inventory_names: b.inventory_names.clone(),
          });
        }
        builder.add_location(NewLocation {
          workspace_id,
          name: loc.name.clone(),
          description: loc.description.clone(),
          location_type: loc.location_type,
          bindings,
        })?;
      }
    }
    Ok(builder.build())
  }

  pub fn sentinels(&self) -> &Sentinels { &self.sentinels }

  pub fn service_type(&self) -> &str { &self.service_type }

  pub fn workspaces(&self) -> &[Workspace] { &self.workspaces }

  pub fn lines(&self) -> &[Line] { &self.lines }

  pub fn line(&self, line_id: Uuid) -> Option<&Line> {
    self.lines.iter().find(|l| l.line_id == line_id)
  }

  pub fn line_by_name(&self, name: &str) -> Option<&Line> {
    self.lines.iter().find(|l| l.name.eq_ignore_ascii_case(name))
  }

  pub fn models(&self) -> &[Arc<Model>] { &self.models }

  pub fn locations(&self) -> &[Arc<Location>] { &self.locations }

  pub fn areas_of_origin(&self, line_id: Uuid) -> impl Iterator<Item = &AreaOfOrigin> {
    self.areas.iter().filter(move |a| a.line_id == line_id)
  }

  pub fn area_of_origin_by_name(&self, line_id: Uuid, name: &str) -> Option<&AreaOfOrigin> {
    self
      .areas_of_origin(line_id)
      .find(|a| a.name.to_lowercase() == name.trim().to_lowercase())
  }

  /// All bindings on `line_id`, ordered by `order`.
  pub fn bindings_for_line(&self, line_id: Uuid) -> impl Iterator<Item = &Arc<LineLocation>> {
    self
      .bindings
      .iter()
      .filter(move |b| b.line_id == Some(line_id))
  }

  /// The bay positions of `line_id`, ascending by order.
  pub fn bay_positions_for_line(&self, line_id: Uuid) -> Vec<Arc<LineLocation>> {
    self
      .bindings_for_line(line_id)
      .filter(|b| b.location_type() == LocationType::Bay)
      .cloned()
      .collect()
  }

  /// Find the position on `line_id` whose display name for the configured
  /// service type matches `display_name`, ignoring case. The sentinels are
  /// bound to every line and match on their own names.
  pub fn resolve_location_by_display_name(
    &self,
    line_id: Uuid,
    display_name: &str,
  ) -> Option<Arc<LineLocation>> {
    let wanted = display_name.trim().to_lowercase();
    if wanted.is_empty() {
      return None;
    }
    let on_line = self.bindings_for_line(line_id).find(|b| {
      b.display_name(&self.service_type)
        .is_some_and(|n| n.trim().to_lowercase() == wanted)
    });
    let sentinel = || {
      [self.sentinels.pre_production(), self.sentinels.post_production()]
        .into_iter()
        .find(|s| s.name().to_lowercase() == wanted)
    };
    on_line.or_else(sentinel).cloned()
  }

  /// Split a raw unit name into its model and sequence number. The longest
  /// matching model prefix wins; prefixes match case-insensitively and may
  /// be followed by a single `-`, `#` or space before the digits.
  pub fn resolve_unit_name(&self, raw: &str) -> Option<UnitName> {
    let raw = raw.trim();
    let mut candidates: Vec<&Arc<Model>> = self
      .models
      .iter()
      .filter(|m| {
        !m.prefix.is_empty()
          && raw
            .get(..m.prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&m.prefix))
      })
      .collect();
    candidates.sort_by_key(|m| std::cmp::Reverse(m.prefix.len()));

    candidates.into_iter().find_map(|model| {
      let rest = &raw[model.prefix.len()..];
      let rest = rest
        .strip_prefix(['-', '#', ' '])
        .unwrap_or(rest);
      let digits: String =
        rest.chars().take_while(|c| c.is_ascii_digit()).collect();
      let number = digits.parse::<u32>().ok()?;
      Some(UnitName { model: Arc::clone(model), number })
    })
  }
}
