//! Per-resource query configuration.
//!
//! A [`ResourceQueryConfig`] is built once per resource (usually at router
//! construction) and shared behind an `Arc`. It owns the explicit
//! `field name -> column` map that every user-supplied field name is
//! resolved through, so unknown names never reach SQL.
//!
//! ```rust,ignore
//! let config = ResourceQueryConfig::<attendance::Entity>::builder("attendance")
//!     .searchable([attendance::Column::Id, attendance::Column::UserId])
//!     .default_sort(attendance::Column::Date, SortOrder::Desc)
//!     .date_column(attendance::Column::Date)
//!     .join(JoinSpec::left(attendance::Relation::Employee))
//!     .field("employee_name", employee::Column::Name)
//!     .build()?;
//!
//! // per request, scoped to the caller
//! let mine = config.scoped(Condition::all().add(attendance::Column::UserId.eq(&principal.id)));
//! ```

use chrono::{FixedOffset, Offset, Utc};
use sea_orm::{
    ColumnTrait, ColumnType, Condition, EntityTrait, IdenStatic, Iterable, JoinType,
    PrimaryKeyToColumn, RelationDef, RelationTrait,
    sea_query::{ColumnRef, DynIden, IntoIden, SimpleExpr},
};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::models::SortOrder;

const DEFAULT_DATE_FIELD: &str = "created_at";

/// A resolved, table-qualified column together with its declared type
#[derive(Clone)]
pub struct ColumnHandle {
    table: DynIden,
    column: DynIden,
    column_type: ColumnType,
}

impl ColumnHandle {
    pub fn of<C: ColumnTrait>(column: C) -> Self {
        Self {
            table: C::EntityName::default().into_iden(),
            column: column.into_iden(),
            column_type: column.def().get_column_type().clone(),
        }
    }

    /// `"table"."column"`
    #[must_use]
    pub fn expr(&self) -> SimpleExpr {
        SimpleExpr::Column(ColumnRef::TableColumn(
            self.table.clone(),
            self.column.clone(),
        ))
    }

    #[must_use]
    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    #[must_use]
    pub fn column_name(&self) -> String {
        self.column.to_string()
    }

    #[must_use]
    pub fn table_name(&self) -> String {
        self.table.to_string()
    }
}

impl fmt::Debug for ColumnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({:?})", self.table_name(), self.column_name(), self.column_type)
    }
}

/// A join applied identically to the data and the count query
#[derive(Clone)]
pub struct JoinSpec {
    join_type: JoinType,
    relation: Arc<dyn Fn() -> RelationDef + Send + Sync>,
}

impl JoinSpec {
    /// `LEFT JOIN` along a declared relation
    pub fn left<R>(relation: R) -> Self
    where
        R: RelationTrait + Send + Sync + 'static,
    {
        Self::left_def(move || relation.def())
    }

    /// `LEFT JOIN` along an ad hoc relation definition, e.g. one carrying an
    /// extra `on_condition`
    pub fn left_def<F>(relation: F) -> Self
    where
        F: Fn() -> RelationDef + Send + Sync + 'static,
    {
        Self {
            join_type: JoinType::LeftJoin,
            relation: Arc::new(relation),
        }
    }

    #[must_use]
    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    #[must_use]
    pub fn relation(&self) -> RelationDef {
        (self.relation)()
    }
}

impl fmt::Debug for JoinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinSpec")
            .field("join_type", &self.join_type)
            .finish_non_exhaustive()
    }
}

/// Problems detected while building a [`ResourceQueryConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The entity declares no primary key column
    NoPrimaryKey,
    /// Counting distinct rows needs a single-column primary key
    CompositePrimaryKey,
    /// A default sort or date field name is not in the field map
    UnknownField(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPrimaryKey => write!(f, "entity has no primary key column"),
            Self::CompositePrimaryKey => {
                write!(f, "list queries require a single-column primary key")
            }
            Self::UnknownField(name) => write!(f, "unknown field '{name}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Static, validated query configuration for one resource
pub struct ResourceQueryConfig<E: EntityTrait> {
    resource_name: &'static str,
    fields: Arc<BTreeMap<String, ColumnHandle>>,
    primary_key: ColumnHandle,
    searchable: Arc<[ColumnHandle]>,
    default_sort: Arc<[(String, SortOrder)]>,
    date_field: Option<String>,
    joins: Arc<[JoinSpec]>,
    projection: Option<Arc<[(String, SimpleExpr)]>>,
    timezone: FixedOffset,
    base_condition: Option<Condition>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityTrait> Clone for ResourceQueryConfig<E> {
    fn clone(&self) -> Self {
        Self {
            resource_name: self.resource_name,
            fields: Arc::clone(&self.fields),
            primary_key: self.primary_key.clone(),
            searchable: Arc::clone(&self.searchable),
            default_sort: Arc::clone(&self.default_sort),
            date_field: self.date_field.clone(),
            joins: Arc::clone(&self.joins),
            projection: self.projection.clone(),
            timezone: self.timezone,
            base_condition: self.base_condition.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: EntityTrait> fmt::Debug for ResourceQueryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceQueryConfig")
            .field("resource_name", &self.resource_name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("searchable", &self.searchable)
            .field("default_sort", &self.default_sort)
            .field("date_field", &self.date_field)
            .field("joins", &self.joins.len())
            .field("base_condition", &self.base_condition.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: EntityTrait> ResourceQueryConfig<E> {
    pub fn builder(resource_name: &'static str) -> ResourceQueryConfigBuilder<E> {
        ResourceQueryConfigBuilder::new(resource_name)
    }

    /// Copy of this configuration with `condition` AND-ed into the base
    /// condition. The shared configuration is left untouched.
    #[must_use]
    pub fn scoped(&self, condition: Condition) -> Self {
        let mut scoped = self.clone();
        scoped.base_condition = Some(match scoped.base_condition.take() {
            Some(existing) => Condition::all().add(existing).add(condition),
            None => condition,
        });
        scoped
    }

    #[must_use]
    pub fn resource_name(&self) -> &'static str {
        self.resource_name
    }

    /// Resolve a user-supplied field name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ColumnHandle> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn primary_key(&self) -> &ColumnHandle {
        &self.primary_key
    }

    #[must_use]
    pub fn searchable(&self) -> &[ColumnHandle] {
        &self.searchable
    }

    #[must_use]
    pub fn default_sort(&self) -> &[(String, SortOrder)] {
        &self.default_sort
    }

    #[must_use]
    pub fn date_field(&self) -> Option<&str> {
        self.date_field.as_deref()
    }

    #[must_use]
    pub fn date_column(&self) -> Option<&ColumnHandle> {
        self.date_field.as_deref().and_then(|name| self.field(name))
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    #[must_use]
    pub fn projection(&self) -> Option<&[(String, SimpleExpr)]> {
        self.projection.as_deref()
    }

    #[must_use]
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    #[must_use]
    pub fn base_condition(&self) -> Option<&Condition> {
        self.base_condition.as_ref()
    }
}

/// Builder for [`ResourceQueryConfig`]
pub struct ResourceQueryConfigBuilder<E: EntityTrait> {
    resource_name: &'static str,
    fields: BTreeMap<String, ColumnHandle>,
    searchable: Vec<ColumnHandle>,
    default_sort: Vec<(String, SortOrder)>,
    date_field: Option<String>,
    joins: Vec<JoinSpec>,
    projection: Vec<(String, SimpleExpr)>,
    timezone: FixedOffset,
    base_condition: Option<Condition>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityTrait> ResourceQueryConfigBuilder<E> {
    fn new(resource_name: &'static str) -> Self {
        let fields = E::Column::iter()
            .map(|column| (column.as_str().to_string(), ColumnHandle::of(column)))
            .collect();
        Self {
            resource_name,
            fields,
            searchable: Vec::new(),
            default_sort: Vec::new(),
            date_field: None,
            joins: Vec::new(),
            projection: Vec::new(),
            timezone: Utc.fix(),
            base_condition: None,
            _entity: PhantomData,
        }
    }

    /// Columns OR-combined by the `search` parameter, in order
    #[must_use]
    pub fn searchable<C, I>(mut self, columns: I) -> Self
    where
        C: ColumnTrait,
        I: IntoIterator<Item = C>,
    {
        self.searchable
            .extend(columns.into_iter().map(ColumnHandle::of));
        self
    }

    /// Append a default sort entry by column
    #[must_use]
    pub fn default_sort(mut self, column: E::Column, order: SortOrder) -> Self {
        self.default_sort
            .push((column.as_str().to_string(), order));
        self
    }

    /// Append a default sort entry by field name (checked in `build`)
    #[must_use]
    pub fn default_sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.default_sort.push((field.into(), order));
        self
    }

    /// Timestamp column targeted by `from_date`/`to_date`
    #[must_use]
    pub fn date_column(mut self, column: E::Column) -> Self {
        self.date_field = Some(column.as_str().to_string());
        self
    }

    /// Timestamp field targeted by `from_date`/`to_date`, by name
    #[must_use]
    pub fn date_field(mut self, field: impl Into<String>) -> Self {
        self.date_field = Some(field.into());
        self
    }

    /// Expose a column (of this or a joined table) under `name` for
    /// filtering and sorting
    #[must_use]
    pub fn field<C: ColumnTrait>(mut self, name: impl Into<String>, column: C) -> Self {
        self.fields.insert(name.into(), ColumnHandle::of(column));
        self
    }

    /// Alternative name for a column of this table, e.g. `createdAt`
    #[must_use]
    pub fn alias(self, name: impl Into<String>, column: E::Column) -> Self {
        self.field(name, column)
    }

    #[must_use]
    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a column to the JSON projection; when any projection entry is
    /// present only projected columns are returned by JSON list queries
    #[must_use]
    pub fn select_as<C: ColumnTrait>(mut self, alias: impl Into<String>, column: C) -> Self {
        self.projection
            .push((alias.into(), ColumnHandle::of(column).expr()));
        self
    }

    #[must_use]
    pub fn select_expr(mut self, alias: impl Into<String>, expr: SimpleExpr) -> Self {
        self.projection.push((alias.into(), expr));
        self
    }

    /// Offset that defines local midnight for date bounds (default UTC)
    #[must_use]
    pub fn timezone(mut self, offset: FixedOffset) -> Self {
        self.timezone = offset;
        self
    }

    /// Condition applied to every query of this resource
    #[must_use]
    pub fn base_condition(mut self, condition: Condition) -> Self {
        self.base_condition = Some(condition);
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Fails when the entity has no single-column primary key or when a
    /// default sort or date field does not name a known field.
    pub fn build(self) -> Result<ResourceQueryConfig<E>, ConfigError> {
        let mut keys = E::PrimaryKey::iter();
        let primary_key = keys
            .next()
            .map(|key| ColumnHandle::of(key.into_column()))
            .ok_or(ConfigError::NoPrimaryKey)?;
        if keys.next().is_some() {
            return Err(ConfigError::CompositePrimaryKey);
        }

        if let Some((unknown, _)) = self
            .default_sort
            .iter()
            .find(|(field, _)| !self.fields.contains_key(field))
        {
            return Err(ConfigError::UnknownField(unknown.clone()));
        }

        let date_field = match self.date_field {
            Some(field) if self.fields.contains_key(&field) => Some(field),
            Some(field) => return Err(ConfigError::UnknownField(field)),
            None => self
                .fields
                .contains_key(DEFAULT_DATE_FIELD)
                .then(|| DEFAULT_DATE_FIELD.to_string()),
        };

        Ok(ResourceQueryConfig {
            resource_name: self.resource_name,
            fields: Arc::new(self.fields),
            primary_key,
            searchable: self.searchable.into(),
            default_sort: self.default_sort.into(),
            date_field,
            joins: self.joins.into(),
            projection: (!self.projection.is_empty()).then(|| self.projection.into()),
            timezone: self.timezone,
            base_condition: self.base_condition,
            _entity: PhantomData,
        })
    }
}
