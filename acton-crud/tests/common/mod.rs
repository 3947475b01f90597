//! Shared fixtures: companies with departments, employees with a department

#![allow(dead_code)]

use acton_crud::entity::{Entity, FieldDef, Identified, Record, RelationDef, Related, Schema};
use acton_crud::filter::{
    BooleanFilter, CollectionFilter, Criteria, FilterNode, FilterValue, NumberFilter, TextFilter,
};
use acton_crud::mapping::Mapper;
use acton_crud::{Error, Result};
use serde::{Deserialize, Serialize};

pub static COMPANY: Schema = Schema::new(
    "company",
    &[
        FieldDef::integer("id"),
        FieldDef::text("name"),
        FieldDef::integer("founded"),
        FieldDef::collection("tags"),
    ],
    &[RelationDef::to_many("departments", department_schema)],
);

pub static DEPARTMENT: Schema = Schema::new(
    "department",
    &[
        FieldDef::integer("id"),
        FieldDef::text("name"),
        FieldDef::text("manager_name"),
        FieldDef::float("budget"),
    ],
    &[],
);

pub static EMPLOYEE: Schema = Schema::new(
    "employee",
    &[
        FieldDef::integer("id"),
        FieldDef::text("name"),
        FieldDef::float("salary"),
        FieldDef::boolean("active"),
    ],
    &[RelationDef::to_one("department", department_schema)],
);

fn department_schema() -> &'static Schema {
    &DEPARTMENT
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Department {
    pub id: Option<i64>,
    pub name: String,
    pub manager_name: Option<String>,
    pub budget: f64,
}

impl Record for Department {
    fn value(&self, field: &str) -> Option<FilterValue> {
        match field {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "manager_name" => Some(self.manager_name.clone().into()),
            "budget" => Some(self.budget.into()),
            _ => None,
        }
    }

    fn related(&self, _relation: &str) -> Related<'_> {
        Related::Unknown
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub founded: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub departments: Vec<Department>,
}

acton_crud::entity_identity!(Company);

impl Identified for Company {
    type Id = i64;

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }
}

impl Record for Company {
    fn value(&self, field: &str) -> Option<FilterValue> {
        match field {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.clone().into()),
            "founded" => Some(self.founded.into()),
            "tags" => Some(self.tags.clone().into()),
            _ => None,
        }
    }

    fn related(&self, relation: &str) -> Related<'_> {
        match relation {
            "departments" => {
                Related::Many(self.departments.iter().map(|d| d as &dyn Record).collect())
            }
            _ => Related::Unknown,
        }
    }
}

impl Entity for Company {
    fn schema() -> &'static Schema {
        &COMPANY
    }

    fn with_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Employee {
    pub id: Option<i64>,
    pub name: String,
    pub salary: f64,
    pub active: bool,
    pub department: Option<Department>,
}

acton_crud::entity_identity!(Employee);

impl Identified for Employee {
    type Id = i64;

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }
}

impl Record for Employee {
    fn value(&self, field: &str) -> Option<FilterValue> {
        match field {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "salary" => Some(self.salary.into()),
            "active" => Some(self.active.into()),
            _ => None,
        }
    }

    fn related(&self, relation: &str) -> Related<'_> {
        match relation {
            "department" => Related::One(self.department.as_ref().map(|d| d as &dyn Record)),
            _ => Related::Unknown,
        }
    }
}

impl Entity for Employee {
    fn schema() -> &'static Schema {
        &EMPLOYEE
    }

    fn with_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentDto {
    pub id: Option<i64>,
    pub name: String,
    pub manager_name: Option<String>,
    pub budget: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDto {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub founded: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub departments: Vec<DepartmentDto>,
}

impl Identified for CompanyDto {
    type Id = i64;

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }
}

pub struct CompanyMapper;

impl Mapper for CompanyMapper {
    type Entity = Company;
    type Dto = CompanyDto;

    fn to_entity(&self, dto: CompanyDto) -> Result<Company> {
        let departments = dto
            .departments
            .into_iter()
            .map(|d| {
                if d.budget < 0.0 {
                    return Err(Error::bad_request(format!(
                        "department {} has a negative budget",
                        d.name
                    )));
                }
                Ok(Department {
                    id: d.id,
                    name: d.name,
                    manager_name: d.manager_name,
                    budget: d.budget,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Company {
            id: dto.id,
            name: dto.name,
            founded: dto.founded,
            tags: dto.tags,
            departments,
        })
    }

    fn to_dto(&self, entity: Company) -> CompanyDto {
        CompanyDto {
            id: entity.id,
            name: entity.name,
            founded: entity.founded,
            tags: entity.tags,
            departments: entity
                .departments
                .into_iter()
                .map(|d| DepartmentDto {
                    id: d.id,
                    name: d.name,
                    manager_name: d.manager_name,
                    budget: d.budget,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DepartmentFilter {
    pub name: Option<TextFilter>,
    pub manager_name: Option<TextFilter>,
    pub budget: Option<NumberFilter<f64>>,
    pub inclusive: bool,
}

impl Criteria for DepartmentFilter {
    fn to_filter(&self) -> FilterNode {
        FilterNode::new()
            .inclusive(self.inclusive)
            .field_opt("name", self.name.as_ref())
            .field_opt("manager_name", self.manager_name.as_ref())
            .field_opt("budget", self.budget.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompanyFilter {
    pub id: Option<NumberFilter<i64>>,
    pub name: Option<TextFilter>,
    pub founded: Option<NumberFilter<i64>>,
    pub tags: Option<CollectionFilter<String>>,
    pub departments: Option<DepartmentFilter>,
    pub distinct: bool,
    pub inclusive: bool,
}

impl Criteria for CompanyFilter {
    fn to_filter(&self) -> FilterNode {
        FilterNode::new()
            .distinct(self.distinct)
            .inclusive(self.inclusive)
            .field_opt("id", self.id.as_ref())
            .field_opt("name", self.name.as_ref())
            .field_opt("founded", self.founded.as_ref())
            .field_opt("tags", self.tags.as_ref())
            .relation_opt("departments", self.departments.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub name: Option<TextFilter>,
    pub salary: Option<NumberFilter<f64>>,
    pub active: Option<BooleanFilter>,
    pub department: Option<DepartmentFilter>,
}

impl Criteria for EmployeeFilter {
    fn to_filter(&self) -> FilterNode {
        FilterNode::new()
            .field_opt("name", self.name.as_ref())
            .field_opt("salary", self.salary.as_ref())
            .field_opt("active", self.active.as_ref())
            .relation_opt("department", self.department.as_ref())
    }
}

pub fn department(name: &str, manager: Option<&str>, budget: f64) -> Department {
    Department {
        id: None,
        name: name.to_string(),
        manager_name: manager.map(str::to_string),
        budget,
    }
}

pub fn company(name: &str, departments: Vec<Department>) -> Company {
    Company {
        id: None,
        name: Some(name.to_string()),
        founded: Some(2000),
        tags: Vec::new(),
        departments,
    }
}

pub fn employee(name: &str, salary: f64, department: Option<Department>) -> Employee {
    Employee {
        id: None,
        name: name.to_string(),
        salary,
        active: true,
        department,
    }
}

/// Acme Corp (Lee manages Ops), Acme Labs (Kim), Globex (Lee)
pub fn sample_companies() -> Vec<Company> {
    vec![
        company(
            "Acme Corp",
            vec![
                department("Ops", Some("Lee"), 1000.0),
                department("Sales", Some("Park"), 500.0),
            ],
        ),
        company("Acme Labs", vec![department("Research", Some("Kim"), 2000.0)]),
        company("Globex", vec![department("Ops", Some("Lee"), 750.0)]),
    ]
}

/// Companies with `per_company` departments each, all managed by Lee
pub fn wide_companies(count: usize, per_company: usize) -> Vec<Company> {
    (0..count)
        .map(|i| {
            let departments = (0..per_company)
                .map(|d| department(&format!("Dept {}", d), Some("Lee"), 100.0 * d as f64))
                .collect();
            company(&format!("Company {:02}", i), departments)
        })
        .collect()
}

pub fn name_contains(text: &str) -> TextFilter {
    TextFilter::new().contains(text)
}

pub fn managed_by(manager: &str) -> DepartmentFilter {
    DepartmentFilter {
        manager_name: Some(TextFilter::new().equal(manager)),
        ..Default::default()
    }
}
