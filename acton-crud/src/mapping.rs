//! DTO and entity conversion
//!
//! A [`Mapper`] converts between the presentation-facing DTO of an entity and
//! the entity itself. DTOs share the entity's identifier type, so operation
//! ids pass through a mapping unchanged.

use serde::{de::DeserializeOwned, Serialize};

use crate::entity::{Entity, Identified};
use crate::error::Result;
use crate::repository::Page;

/// Conversion between an entity and its DTO
///
/// Implementations must round-trip: `to_dto(to_entity(dto)?) == dto`.
///
/// # Example
///
/// ```rust,ignore
/// struct CompanyMapper;
///
/// impl Mapper for CompanyMapper {
///     type Entity = Company;
///     type Dto = CompanyDto;
///
///     fn to_entity(&self, dto: CompanyDto) -> Result<Company> {
///         Ok(Company { id: dto.id, name: dto.name, departments: Vec::new() })
///     }
///
///     fn to_dto(&self, entity: Company) -> CompanyDto {
///         CompanyDto { id: entity.id, name: entity.name }
///     }
/// }
/// ```
pub trait Mapper: Send + Sync + 'static {
    /// Persisted type
    type Entity: Entity;

    /// Presentation type
    type Dto: Identified<Id = <Self::Entity as Identified>::Id>
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Convert an incoming DTO; a DTO that cannot be represented is an error
    fn to_entity(&self, dto: Self::Dto) -> Result<Self::Entity>;

    /// Convert an outgoing entity
    fn to_dto(&self, entity: Self::Entity) -> Self::Dto;

    fn to_entities(&self, dtos: Vec<Self::Dto>) -> Result<Vec<Self::Entity>> {
        dtos.into_iter().map(|dto| self.to_entity(dto)).collect()
    }

    fn to_dtos(&self, entities: Vec<Self::Entity>) -> Vec<Self::Dto> {
        entities.into_iter().map(|e| self.to_dto(e)).collect()
    }

    fn to_dto_page(&self, page: Page<Self::Entity>) -> Page<Self::Dto> {
        page.map(|e| self.to_dto(e))
    }
}
