//! Predicate building and evaluation
//!
//! [`Specification::build`] turns an optional entity filter into a validated
//! [`Predicate`] over the entity's [`Schema`]. Nested relation filters become
//! left joins. A missing filter yields the always-true predicate.
//!
//! Predicates are backend-neutral. [`Predicate::evaluate`] gives the
//! reference semantics over [`Record`]s; SQL backends translate the same
//! tree into joins and WHERE clauses.

use std::fmt;

use crate::entity::{Cardinality, Entity, Record, Related, Schema};
use crate::error::{Error, Result};

use super::node::{Constraint, Criteria, FilterNode};
use super::value::{FilterCondition, FilterValue};

/// A boolean predicate over an entity and its relationships
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row
    All,
    /// A single field condition
    Condition(FilterCondition),
    /// A predicate on a related entity reached through a left join
    Join {
        /// Relationship name
        relation: String,
        /// Relationship cardinality
        cardinality: Cardinality,
        /// Predicate on the related entity
        predicate: Box<Predicate>,
    },
    /// Every predicate holds
    And(Vec<Predicate>),
    /// At least one predicate holds
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate against a record
    ///
    /// Joins follow left-join semantics: a record with no related row is
    /// tested against an all-null row, so only `IS NULL` conditions can hold
    /// there. A to-many join holds when any related row satisfies the nested
    /// predicate.
    pub fn evaluate(&self, record: &dyn Record) -> bool {
        match self {
            Self::All => true,
            Self::Condition(condition) => {
                condition.test(record.value(&condition.field).as_ref())
            }
            Self::Join {
                relation,
                predicate,
                ..
            } => match record.related(relation) {
                Related::One(Some(related)) => predicate.evaluate(related),
                Related::One(None) => predicate.evaluate(&NullRecord),
                Related::Many(related) if related.is_empty() => predicate.evaluate(&NullRecord),
                Related::Many(related) => related.into_iter().any(|r| predicate.evaluate(r)),
                Related::Unknown => false,
            },
            Self::And(parts) => parts.iter().all(|p| p.evaluate(record)),
            Self::Or(parts) => parts.iter().any(|p| p.evaluate(record)),
        }
    }

    /// Whether evaluating the predicate joins a to-many relationship
    pub fn has_to_many_join(&self) -> bool {
        match self {
            Self::All | Self::Condition(_) => false,
            Self::Join {
                cardinality,
                predicate,
                ..
            } => *cardinality == Cardinality::ToMany || predicate.has_to_many_join(),
            Self::And(parts) | Self::Or(parts) => parts.iter().any(Predicate::has_to_many_join),
        }
    }

    /// Dotted paths of every joined relationship, in traversal order
    pub fn join_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_joins("", &mut paths);
        paths
    }

    fn collect_joins(&self, prefix: &str, paths: &mut Vec<String>) {
        match self {
            Self::All | Self::Condition(_) => {}
            Self::Join {
                relation,
                predicate,
                ..
            } => {
                let path = if prefix.is_empty() {
                    relation.clone()
                } else {
                    format!("{}.{}", prefix, relation)
                };
                if !paths.contains(&path) {
                    paths.push(path.clone());
                }
                predicate.collect_joins(&path, paths);
            }
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_joins(prefix, paths);
                }
            }
        }
    }

    fn combine(mut parts: Vec<Predicate>, inclusive: bool) -> Self {
        match parts.len() {
            0 => Self::All,
            1 => parts.remove(0),
            _ if inclusive => Self::Or(parts),
            _ => Self::And(parts),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "TRUE"),
            Self::Condition(condition) => write!(f, "{}", condition),
            Self::Join {
                relation,
                predicate,
                ..
            } => write!(f, "{}.({})", relation, predicate),
            Self::And(parts) | Self::Or(parts) => {
                let joiner = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", joiner)?;
                    }
                    write!(f, "{}", part)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A row with every field null and no related rows
struct NullRecord;

impl Record for NullRecord {
    fn value(&self, _field: &str) -> Option<FilterValue> {
        Some(FilterValue::Null)
    }

    fn related(&self, _relation: &str) -> Related<'_> {
        Related::One(None)
    }
}

/// A validated query predicate for one entity type
///
/// # Example
///
/// ```rust,ignore
/// let spec = Specification::build::<Company, _>(Some(&filter))?;
/// if spec.requires_distinct() {
///     // select distinct root rows
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Specification {
    /// Entity type name
    pub entity: &'static str,
    /// The predicate
    pub predicate: Predicate,
    /// Caller asked for duplicate root rows to be suppressed
    pub distinct: bool,
}

impl Specification {
    /// The always-true specification
    pub fn all(entity: &'static str) -> Self {
        Self {
            entity,
            predicate: Predicate::All,
            distinct: false,
        }
    }

    /// Specification matching entities whose id is in the list
    pub fn by_ids<E: Entity>(ids: &[E::Id]) -> Self {
        Self {
            entity: E::name(),
            predicate: Predicate::Condition(FilterCondition::in_list("id", ids.to_vec())),
            distinct: false,
        }
    }

    /// Build and validate the specification for an optional filter
    ///
    /// Fails with [`Error::InvalidFilterField`] when the filter names a field
    /// or relationship the entity does not declare, applies a filter to a
    /// field of the wrong kind, or compares against a value of the wrong
    /// type.
    pub fn build<E: Entity, C: Criteria + ?Sized>(filter: Option<&C>) -> Result<Self> {
        let schema = E::schema();
        let Some(filter) = filter else {
            return Ok(Self::all(schema.name));
        };
        let node = filter.to_filter();
        let predicate = Predicate::combine(leaves(schema, schema, &node, "")?, node.inclusive);
        tracing::trace!(entity = schema.name, predicate = %predicate, "built specification");
        Ok(Self {
            entity: schema.name,
            predicate,
            distinct: node.distinct,
        })
    }

    /// Whether the read must collapse duplicate root rows
    ///
    /// True when the caller asked for it or a to-many join could fan out.
    pub fn requires_distinct(&self) -> bool {
        self.distinct || self.predicate.has_to_many_join()
    }

    /// Whether the record satisfies the predicate
    pub fn matches(&self, record: &dyn Record) -> bool {
        self.predicate.evaluate(record)
    }
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} WHERE {}", self.entity, self.predicate)?;
        if self.distinct {
            write!(f, " DISTINCT")?;
        }
        Ok(())
    }
}

/// Leaf predicates of `node`, each relation leaf wrapped in its own join
///
/// Leaves of nested relation nodes are hoisted next to the node's own field
/// leaves, so the root node's `inclusive` flag combines all of them.
fn leaves(
    root: &Schema,
    schema: &Schema,
    node: &FilterNode,
    path: &str,
) -> Result<Vec<Predicate>> {
    let qualified = |name: &str| {
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", path, name)
        }
    };
    let mut parts = Vec::with_capacity(node.constraints.len());
    for constraint in &node.constraints {
        match constraint {
            Constraint::Field {
                name,
                family,
                conditions,
            } => {
                let field = schema.field(name).ok_or_else(|| {
                    Error::invalid_filter_field(root.name, qualified(name), "unknown field")
                })?;
                if !family.accepts(field.kind) {
                    return Err(Error::invalid_filter_field(
                        root.name,
                        qualified(name),
                        format!("{} filter cannot apply to a {} field", family, field.kind),
                    ));
                }
                for condition in conditions {
                    if !condition.operator.accepts(field.kind) {
                        return Err(Error::invalid_filter_field(
                            root.name,
                            qualified(name),
                            format!("operator {} not supported on {} fields", condition.operator, field.kind),
                        ));
                    }
                    if !condition.value.compatible_with(field.kind) {
                        return Err(Error::invalid_filter_field(
                            root.name,
                            qualified(name),
                            format!(
                                "{} value not comparable with {} field",
                                condition.value.type_name(),
                                field.kind
                            ),
                        ));
                    }
                    parts.push(Predicate::Condition(condition.clone()));
                }
            }
            Constraint::Relation { name, node } => {
                let relation = schema.relation(name).ok_or_else(|| {
                    Error::invalid_filter_field(root.name, qualified(name), "unknown relationship")
                })?;
                let nested = leaves(root, (relation.target)(), node, &qualified(name))?;
                parts.extend(nested.into_iter().map(|leaf| Predicate::Join {
                    relation: relation.name.to_string(),
                    cardinality: relation.cardinality,
                    predicate: Box::new(leaf),
                }));
            }
        }
    }
    Ok(parts)
}
