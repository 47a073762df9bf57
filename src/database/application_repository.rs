use crate::database::error::DatabaseError;
use crate::database::repository::ApplicationRepository;
use crate::payments::types::{VisaDuration, VisaType};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    InReview,
    Completed,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::InReview => "in_review",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherPassport {
    pub country_of_issue: Option<String>,
    pub passport_number: Option<String>,
    pub date_of_issue: Option<NaiveDate>,
    pub place_of_issue: Option<String>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relative {
    pub name: Option<String>,
    pub nationality: Option<String>,
    pub previous_nationality: Option<String>,
    pub place_of_birth: Option<String>,
    pub country_of_birth: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDetails {
    pub father: Option<Relative>,
    pub mother: Option<Relative>,
    pub marital_status: Option<String>,
    pub spouse: Option<Relative>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityQuestionnaire {
    pub arrested_or_convicted: bool,
    pub refused_entry_or_deported: bool,
    pub engaged_in_trafficking: bool,
    pub engaged_in_cyber_crime: bool,
    pub engaged_in_terrorism: bool,
    pub expressed_extremist_views: bool,
    pub sought_asylum: bool,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceContacts {
    pub india: Option<Contact>,
    pub home_country: Option<Contact>,
}

/// Visa application entity
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisaApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub surname: Option<String>,
    pub given_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub nationality_by_birth: Option<bool>,
    pub country_of_birth: Option<String>,
    pub city_of_birth: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub passport_number: Option<String>,
    pub passport_place_of_issue: Option<String>,
    pub passport_country_of_issue: Option<String>,
    pub passport_issue_date: Option<NaiveDate>,
    pub passport_expiry_date: Option<NaiveDate>,
    pub other_passport: Option<Json<OtherPassport>>,
    pub present_address: Option<Json<Address>>,
    pub permanent_address: Option<Json<Address>>,
    pub visa_type: Option<VisaType>,
    pub visa_duration: Option<VisaDuration>,
    pub arrival_date: Option<NaiveDate>,
    pub port_of_arrival: Option<String>,
    pub port_of_exit: Option<String>,
    pub family: Option<Json<FamilyDetails>>,
    pub security: Option<Json<SecurityQuestionnaire>>,
    pub reference_contacts: Option<Json<ReferenceContacts>>,
    pub status: ApplicationStatus,
    pub is_locked: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VisaApplication {
    /// A fresh, empty draft owned by `user_id`
    pub fn new_draft(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            surname: None,
            given_name: None,
            date_of_birth: None,
            gender: None,
            nationality: None,
            nationality_by_birth: None,
            country_of_birth: None,
            city_of_birth: None,
            email: None,
            phone: None,
            passport_number: None,
            passport_place_of_issue: None,
            passport_country_of_issue: None,
            passport_issue_date: None,
            passport_expiry_date: None,
            other_passport: None,
            present_address: None,
            permanent_address: None,
            visa_type: None,
            visa_duration: None,
            arrival_date: None,
            port_of_arrival: None,
            port_of_exit: None,
            family: None,
            security: None,
            reference_contacts: None,
            status: ApplicationStatus::Draft,
            is_locked: false,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Still editable: draft status and not locked
    pub fn is_editable(&self) -> bool {
        self.status == ApplicationStatus::Draft && !self.is_locked
    }

    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given_name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Partial update sent by the form wizard; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationDraft {
    pub surname: Option<String>,
    pub given_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub nationality_by_birth: Option<bool>,
    pub country_of_birth: Option<String>,
    pub city_of_birth: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub passport_number: Option<String>,
    pub passport_place_of_issue: Option<String>,
    pub passport_country_of_issue: Option<String>,
    pub passport_issue_date: Option<NaiveDate>,
    pub passport_expiry_date: Option<NaiveDate>,
    pub other_passport: Option<OtherPassport>,
    pub present_address: Option<Address>,
    pub permanent_address: Option<Address>,
    pub visa_type: Option<VisaType>,
    pub visa_duration: Option<VisaDuration>,
    pub arrival_date: Option<NaiveDate>,
    pub port_of_arrival: Option<String>,
    pub port_of_exit: Option<String>,
    pub family: Option<FamilyDetails>,
    pub security: Option<SecurityQuestionnaire>,
    pub reference_contacts: Option<ReferenceContacts>,
}

impl ApplicationDraft {
    /// Merge present fields into `application`
    pub fn apply_to(&self, application: &mut VisaApplication) {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    application.$field = Some(value.clone());
                })*
            };
        }
        macro_rules! merge_json {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    application.$field = Some(Json(value.clone()));
                })*
            };
        }

        merge!(
            surname,
            given_name,
            date_of_birth,
            gender,
            nationality,
            nationality_by_birth,
            country_of_birth,
            city_of_birth,
            email,
            phone,
            passport_number,
            passport_place_of_issue,
            passport_country_of_issue,
            passport_issue_date,
            passport_expiry_date,
            visa_type,
            visa_duration,
            arrival_date,
            port_of_arrival,
            port_of_exit
        );
        merge_json!(
            other_passport,
            present_address,
            permanent_address,
            family,
            security,
            reference_contacts
        );
        application.updated_at = Utc::now();
    }
}

const APPLICATION_COLUMNS: &str = "id, user_id, surname, given_name, date_of_birth, gender, \
     nationality, nationality_by_birth, country_of_birth, city_of_birth, email, phone, \
     passport_number, passport_place_of_issue, passport_country_of_issue, passport_issue_date, \
     passport_expiry_date, other_passport, present_address, permanent_address, visa_type, \
     visa_duration, arrival_date, port_of_arrival, port_of_exit, family, security, \
     reference_contacts, status, is_locked, submitted_at, created_at, updated_at";

/// INSERT of every column in [`APPLICATION_COLUMNS`], bound in that order
fn insert_sql() -> String {
    let placeholders: Vec<String> = (1..=APPLICATION_COLUMNS.split(',').count())
        .map(|n| format!("${}", n))
        .collect();
    format!(
        "INSERT INTO visa_applications ({columns}) VALUES ({values}) RETURNING {columns}",
        columns = APPLICATION_COLUMNS,
        values = placeholders.join(", ")
    )
}

/// Postgres-backed application repository
pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn create(&self, application: &VisaApplication) -> Result<VisaApplication, DatabaseError> {
        sqlx::query_as::<_, VisaApplication>(&insert_sql())
            .bind(application.id)
            .bind(application.user_id)
            .bind(&application.surname)
            .bind(&application.given_name)
            .bind(application.date_of_birth)
            .bind(&application.gender)
            .bind(&application.nationality)
            .bind(application.nationality_by_birth)
            .bind(&application.country_of_birth)
            .bind(&application.city_of_birth)
            .bind(&application.email)
            .bind(&application.phone)
            .bind(&application.passport_number)
            .bind(&application.passport_place_of_issue)
            .bind(&application.passport_country_of_issue)
            .bind(application.passport_issue_date)
            .bind(application.passport_expiry_date)
            .bind(&application.other_passport)
            .bind(&application.present_address)
            .bind(&application.permanent_address)
            .bind(application.visa_type)
            .bind(application.visa_duration)
            .bind(application.arrival_date)
            .bind(&application.port_of_arrival)
            .bind(&application.port_of_exit)
            .bind(&application.family)
            .bind(&application.security)
            .bind(&application.reference_contacts)
            .bind(application.status)
            .bind(application.is_locked)
            .bind(application.submitted_at)
            .bind(application.created_at)
            .bind(application.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VisaApplication>, DatabaseError> {
        sqlx::query_as::<_, VisaApplication>(&format!(
            "SELECT {} FROM visa_applications WHERE id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_draft(
        &self,
        id: Uuid,
        draft: &ApplicationDraft,
    ) -> Result<Option<VisaApplication>, DatabaseError> {
        // COALESCE keeps absent fields; the status/lock guard makes the write a
        // no-op (None) once the application has been submitted.
        sqlx::query_as::<_, VisaApplication>(&format!(
            "UPDATE visa_applications SET
                surname = COALESCE($2, surname),
                given_name = COALESCE($3, given_name),
                date_of_birth = COALESCE($4, date_of_birth),
                gender = COALESCE($5, gender),
                nationality = COALESCE($6, nationality),
                nationality_by_birth = COALESCE($7, nationality_by_birth),
                country_of_birth = COALESCE($8, country_of_birth),
                city_of_birth = COALESCE($9, city_of_birth),
                email = COALESCE($10, email),
                phone = COALESCE($11, phone),
                passport_number = COALESCE($12, passport_number),
                passport_place_of_issue = COALESCE($13, passport_place_of_issue),
                passport_country_of_issue = COALESCE($14, passport_country_of_issue),
                passport_issue_date = COALESCE($15, passport_issue_date),
                passport_expiry_date = COALESCE($16, passport_expiry_date),
                other_passport = COALESCE($17, other_passport),
                present_address = COALESCE($18, present_address),
                permanent_address = COALESCE($19, permanent_address),
                visa_type = COALESCE($20, visa_type),
                visa_duration = COALESCE($21, visa_duration),
                arrival_date = COALESCE($22, arrival_date),
                port_of_arrival = COALESCE($23, port_of_arrival),
                port_of_exit = COALESCE($24, port_of_exit),
                family = COALESCE($25, family),
                security = COALESCE($26, security),
                reference_contacts = COALESCE($27, reference_contacts),
                updated_at = NOW()
             WHERE id = $1 AND status = 'draft' AND is_locked = false
             RETURNING {}",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .bind(&draft.surname)
        .bind(&draft.given_name)
        .bind(draft.date_of_birth)
        .bind(&draft.gender)
        .bind(&draft.nationality)
        .bind(draft.nationality_by_birth)
        .bind(&draft.country_of_birth)
        .bind(&draft.city_of_birth)
        .bind(&draft.email)
        .bind(&draft.phone)
        .bind(&draft.passport_number)
        .bind(&draft.passport_place_of_issue)
        .bind(&draft.passport_country_of_issue)
        .bind(draft.passport_issue_date)
        .bind(draft.passport_expiry_date)
        .bind(draft.other_passport.clone().map(Json))
        .bind(draft.present_address.clone().map(Json))
        .bind(draft.permanent_address.clone().map(Json))
        .bind(draft.visa_type)
        .bind(draft.visa_duration)
        .bind(draft.arrival_date)
        .bind(&draft.port_of_arrival)
        .bind(&draft.port_of_exit)
        .bind(draft.family.clone().map(Json))
        .bind(draft.security.clone().map(Json))
        .bind(draft.reference_contacts.clone().map(Json))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn delete_draft(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM visa_applications WHERE id = $1 AND status = 'draft' AND is_locked = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_submitted(
        &self,
        id: Uuid,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<VisaApplication>, DatabaseError> {
        sqlx::query_as::<_, VisaApplication>(&format!(
            "UPDATE visa_applications
             SET status = 'submitted', submitted_at = $2, is_locked = true, updated_at = NOW()
             WHERE id = $1 AND status = 'draft' AND is_locked = false
             RETURNING {}",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .bind(submitted_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
